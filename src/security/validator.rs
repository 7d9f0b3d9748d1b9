//! SQL query and identifier validator.
//!
//! Classifies raw text as safe or unsafe without executing anything:
//! SELECT-only shape, a deny-list of dangerous constructs, structural
//! complexity bounds, and string-concatenation heuristics. Table names are
//! checked against the Oracle identifier grammar and a reserved-word list.

use crate::error::{SecurityError, SecurityResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::{debug, warn};

/// Maximum number of opening parentheses in a query.
pub const MAX_PARENTHESES: usize = 15;
/// Maximum number of `SELECT` tokens in a query.
pub const MAX_SELECT_COUNT: usize = 8;
/// Maximum number of `JOIN` tokens in a query.
pub const MAX_JOIN_COUNT: usize = 10;
/// Maximum query length in characters.
pub const MAX_QUERY_LENGTH: usize = 5000;
/// Oracle identifier length limit.
pub const MAX_TABLE_NAME_LENGTH: usize = 128;

/// A deny-list entry: a stable rule id and its compiled pattern.
struct BlockedPattern {
    rule: &'static str,
    regex: Regex,
}

/// Deny-list applied to the normalized (trimmed, uppercased) query.
///
/// Every pattern is case-insensitive, multiline and dot-matches-newline.
/// All patterns are compile-time constants, so expect() is safe here.
static BLOCKED_PATTERNS: Lazy<Vec<BlockedPattern>> = Lazy::new(|| {
    [
        (
            "dml_ddl_keyword",
            r"\b(INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|TRUNCATE|GRANT|REVOKE)\b",
        ),
        ("procedure_execution", r"\b(EXEC|EXECUTE)\b|\b(SP|XP)_"),
        ("line_comment", r"--.*"),
        ("block_comment", r"/\*.*?\*/"),
        ("multiple_statements", r";.*"),
        ("union_select", r"\bUNION\b.*\bSELECT\b"),
        ("time_based", r"\b(WAITFOR|DELAY)\b"),
        ("file_access", r"\b(LOAD_FILE|INTO\s+OUTFILE)\b"),
        ("system_namespace", r"\b(DBMS|UTL)_|\bSYS\."),
        ("dual_connect_by", r"\bDUAL\b.*\bCONNECT\s+BY\b"),
        ("function_subselect", r"\b(CHR|ASCII|SUBSTR)\b.*\bSELECT\b"),
        (
            "xml_package",
            r"\b(DBMS_XMLQUERY|DBMS_XMLGEN|EXTRACTVALUE)\b",
        ),
        ("context_disclosure", r"\b(SYS_CONTEXT|USERENV)\b"),
        ("pipe_lock_package", r"\b(DBMS_PIPE|DBMS_LOCK)\b"),
        ("java_execution", r"\b(JAVA_CALL|DBMS_JAVA)\b"),
        ("network_file_package", r"\b(UTL_HTTP|UTL_FILE|UTL_TCP)\b"),
        ("export_extension", r"\bDBMS_EXPORT_EXTENSION\b"),
    ]
    .into_iter()
    .map(|(rule, pattern)| BlockedPattern {
        rule,
        regex: Regex::new(&format!("(?ims){pattern}"))
            .expect("Invalid regex: blocked pattern"),
    })
    .collect()
});

/// String-concatenation shapes checked against the raw query.
static CONCAT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"'\s*\|\|\s*'").expect("Invalid regex: single-quote || pattern"),
        Regex::new(r"'\s*\+\s*'").expect("Invalid regex: single-quote + pattern"),
        Regex::new(r#""\s*\|\|\s*""#).expect("Invalid regex: double-quote || pattern"),
    ]
});

/// Oracle identifier grammar.
static TABLE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_#$]*$").expect("Invalid regex: identifier pattern")
});

/// Substrings that mark a table name as a system object.
const RESERVED_TABLE_WORDS: &[&str] = &[
    "SYS",
    "SYSTEM",
    "DUAL",
    "USER",
    "ALL_TABLES",
    "DBA_TABLES",
    "V$SESSION",
    "V$DATABASE",
    "GV$",
    "X$",
];

/// Structural bound that a query exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityCheck {
    Parentheses,
    SelectCount,
    JoinCount,
    Length,
}

impl ComplexityCheck {
    /// Machine-readable identifier used in logs.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Parentheses => "parentheses",
            Self::SelectCount => "select_count",
            Self::JoinCount => "join_count",
            Self::Length => "length",
        }
    }

    /// Human-readable description of the failed bound.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Parentheses => "Too many parentheses",
            Self::SelectCount => "Too many SELECT statements",
            Self::JoinCount => "Too many JOIN operations",
            Self::Length => "Query too long",
        }
    }
}

/// Why a query or table name was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    EmptyInput,
    Structural,
    Pattern {
        rule: &'static str,
    },
    Complexity {
        check: ComplexityCheck,
        count: usize,
        limit: usize,
    },
    Concatenation,
    ReservedWord {
        word: &'static str,
    },
}

/// Outcome of a validation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    pub accepted: bool,
    pub reason: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
}

impl ValidationVerdict {
    fn accept(reason: &'static str) -> Self {
        Self {
            accepted: true,
            reason: reason.into(),
            rejection: None,
        }
    }

    fn reject(rejection: Rejection, reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            accepted: false,
            reason: reason.into(),
            rejection: Some(rejection),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Convert into a `Result` so callers can propagate rejections with `?`.
    pub fn into_result(self) -> SecurityResult<()> {
        let Some(rejection) = self.rejection else {
            return Ok(());
        };

        Err(match rejection {
            Rejection::EmptyInput => SecurityError::EmptyInput(self.reason),
            Rejection::Structural => SecurityError::StructuralRejection(self.reason),
            Rejection::Pattern { rule } => SecurityError::PatternRejection { rule },
            Rejection::Complexity { check, .. } => SecurityError::ComplexityRejection {
                check: check.id(),
                reason: self.reason,
            },
            Rejection::Concatenation => SecurityError::ConcatenationRejection,
            Rejection::ReservedWord { word } => SecurityError::ReservedWordRejection(word),
        })
    }
}

/// SQL query validator.
///
/// Stateless: the rule tables are process-wide statics, so the validator is
/// freely `Copy` and safe to call from any number of tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlValidator;

impl SqlValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a SQL query for read-only, injection-free execution.
    pub fn validate_query(&self, query: &str) -> ValidationVerdict {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return ValidationVerdict::reject(Rejection::EmptyInput, "Query cannot be empty");
        }

        let normalized = trimmed.to_uppercase();
        let query_hash = fingerprint(query);

        if !normalized.starts_with("SELECT") {
            warn!(
                query_hash,
                "Security validation failed: non-SELECT query attempted"
            );
            return ValidationVerdict::reject(
                Rejection::Structural,
                "Only SELECT queries are allowed",
            );
        }

        // Bound the input before running the deny-list over it.
        let length = query.chars().count();
        if length > MAX_QUERY_LENGTH {
            return Self::complexity_rejection(
                ComplexityCheck::Length,
                length,
                MAX_QUERY_LENGTH,
                query_hash,
            );
        }

        if let Some(pattern) = BLOCKED_PATTERNS
            .iter()
            .find(|p| p.regex.is_match(&normalized))
        {
            warn!(
                rule = pattern.rule,
                query_hash, "Security validation failed: blocked pattern detected"
            );
            return ValidationVerdict::reject(
                Rejection::Pattern { rule: pattern.rule },
                format!("Query contains blocked pattern: {}", pattern.rule),
            );
        }

        let checks = [
            (
                ComplexityCheck::Parentheses,
                query.matches('(').count(),
                MAX_PARENTHESES,
            ),
            (
                ComplexityCheck::SelectCount,
                normalized.matches("SELECT").count(),
                MAX_SELECT_COUNT,
            ),
            (
                ComplexityCheck::JoinCount,
                normalized.matches("JOIN").count(),
                MAX_JOIN_COUNT,
            ),
            (ComplexityCheck::Length, length, MAX_QUERY_LENGTH),
        ];

        if let Some(&(check, count, limit)) = checks.iter().find(|(_, count, limit)| count > limit)
        {
            return Self::complexity_rejection(check, count, limit, query_hash);
        }

        if CONCAT_PATTERNS.iter().any(|p| p.is_match(query)) {
            warn!(
                query_hash,
                "Security validation failed: suspicious concatenation pattern"
            );
            return ValidationVerdict::reject(
                Rejection::Concatenation,
                "Query contains suspicious string concatenation",
            );
        }

        debug!(query_length = length, query_hash, "Security validation passed");
        ValidationVerdict::accept("Query validated successfully")
    }

    /// Validate a table name before it is bound into a catalog lookup.
    pub fn validate_table_name(&self, table_name: &str) -> ValidationVerdict {
        if table_name.trim().is_empty() {
            return ValidationVerdict::reject(Rejection::EmptyInput, "Table name cannot be empty");
        }

        if !TABLE_NAME_REGEX.is_match(table_name) {
            warn!(
                table_name_length = table_name.len(),
                "Security validation failed: invalid table name format"
            );
            return ValidationVerdict::reject(Rejection::Structural, "Invalid table name format");
        }

        let length = table_name.chars().count();
        if length > MAX_TABLE_NAME_LENGTH {
            warn!(
                table_name_length = length,
                "Security validation failed: table name too long"
            );
            return ValidationVerdict::reject(
                Rejection::Complexity {
                    check: ComplexityCheck::Length,
                    count: length,
                    limit: MAX_TABLE_NAME_LENGTH,
                },
                "Table name too long",
            );
        }

        let upper = table_name.to_uppercase();
        if let Some(&word) = RESERVED_TABLE_WORDS.iter().find(|w| upper.contains(*w)) {
            warn!(
                reserved_word = word,
                "Security validation failed: reserved word in table name"
            );
            return ValidationVerdict::reject(
                Rejection::ReservedWord { word },
                format!("Table name contains reserved word: {word}"),
            );
        }

        debug!("Table name validation passed");
        ValidationVerdict::accept("Table name validated successfully")
    }

    fn complexity_rejection(
        check: ComplexityCheck,
        count: usize,
        limit: usize,
        query_hash: u64,
    ) -> ValidationVerdict {
        warn!(
            check = check.id(),
            count,
            limit,
            query_hash,
            "Security validation failed: query complexity exceeded"
        );
        ValidationVerdict::reject(
            Rejection::Complexity {
                check,
                count,
                limit,
            },
            format!("Query too complex: {}", check.message()),
        )
    }
}

/// Stable-per-process fingerprint so log lines can be correlated without
/// carrying query text.
pub fn fingerprint(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}
