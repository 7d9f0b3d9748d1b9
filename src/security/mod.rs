//! SQL validation and rate limiting.

pub mod rate_limiter;
pub mod validator;

pub use rate_limiter::{
    Admission, RateLimitRejection, RateLimitStatus, RateLimiter, RateLimiterBuilder,
};
pub use validator::{ComplexityCheck, Rejection, SqlValidator, ValidationVerdict};
