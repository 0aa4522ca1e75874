//! Errors that stop an operation before any lead is touched.
//!
//! Per-lead failures (composition and delivery) live in their own crates and
//! never escape a campaign run. The two kinds here are the ones that do reach
//! the caller:
//!
//! - [`ConfigurationError`]: a secret or setting the operation needs is absent
//! - [`ValidationError`]: operator input was rejected before a run started

use thiserror::Error;

/// A required credential or setting is missing or unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The environment variable that should hold a secret is not set.
    #[error("Missing secret: environment variable {0} is not set")]
    MissingSecret(String),

    /// A required configuration field is missing.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A configuration value is present but invalid.
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Operator input that can never start a run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No leads to send to")]
    NoLeads,

    #[error("Instruction must not be blank")]
    BlankInstruction,

    /// The lead list header does not name every required column.
    #[error("CSV must have columns: name, email, company")]
    MissingColumns,

    /// The header was fine but no row carried all three fields.
    #[error("No valid rows found in CSV")]
    NoValidRows,

    #[error("No addresses to check")]
    NoAddresses,
}
