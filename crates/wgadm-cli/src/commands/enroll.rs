//! Client enrollment command implementation.

use std::io::Write;

use wgadm_provision::{enroll, Capabilities, Settings};

use crate::error::CliError;
use crate::output::OutputFormat;

/// Add-client command executor.
pub struct EnrollCommand {
    settings: Settings,
}

impl EnrollCommand {
    /// Create a new enrollment command.
    #[must_use]
    pub const fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Execute the enrollment command.
    ///
    /// # Errors
    ///
    /// Returns an error if enrollment or output fails.
    pub fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        caps: &Capabilities,
    ) -> Result<(), CliError> {
        let report = enroll(&self.settings, caps)?;
        format.write(writer, &report)?;
        Ok(())
    }
}
