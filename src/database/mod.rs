//! Database abstraction layer.
//!
//! Tools talk to Oracle through the [`OracleDriver`] trait. The shipped
//! implementation, [`OrdsDriver`], goes through Oracle REST Data Services.

pub mod ords;
pub mod result;
pub mod sql;
pub mod traits;

pub use ords::OrdsDriver;
pub use result::*;
pub use sql::apply_row_limit;
pub use traits::OracleDriver;

use crate::config::OracleConfig;
use crate::error::DbResult;
use std::sync::Arc;

/// Create the Oracle driver for this configuration.
///
/// No connection is made here; call [`OracleDriver::ping`] to check
/// reachability.
pub fn create_driver(config: &OracleConfig) -> DbResult<Arc<dyn OracleDriver>> {
    let driver = OrdsDriver::new(config)?;
    Ok(Arc::new(driver))
}
