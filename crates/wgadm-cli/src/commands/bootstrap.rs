//! Server bootstrap command implementation.

use std::io::Write;

use wgadm_provision::{bootstrap, Capabilities, Settings};

use crate::error::CliError;
use crate::output::OutputFormat;

/// Bootstrap command executor.
pub struct BootstrapCommand {
    settings: Settings,
}

impl BootstrapCommand {
    /// Create a new bootstrap command.
    #[must_use]
    pub const fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Execute the bootstrap command.
    ///
    /// # Errors
    ///
    /// Returns an error if any bootstrap step or output fails.
    pub fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        caps: &Capabilities,
    ) -> Result<(), CliError> {
        let report = bootstrap(&self.settings, caps)?;
        format.write(writer, &report)?;
        Ok(())
    }
}
