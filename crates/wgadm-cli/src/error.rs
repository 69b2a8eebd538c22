//! CLI error types.

use std::io;

use thiserror::Error;
use wgadm_provision::ProvisionError;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// A provisioning procedure failed.
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),
    /// Writing output failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
