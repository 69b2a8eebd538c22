//! Client listing command implementation.

use std::io::Write;

use wgadm_provision::{list_clients, Settings};

use crate::error::CliError;
use crate::output::{ClientList, OutputFormat};

/// List-clients command executor.
pub struct ListCommand {
    settings: Settings,
}

impl ListCommand {
    /// Create a new list command.
    #[must_use]
    pub const fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Execute the list command.
    ///
    /// # Errors
    ///
    /// Returns an error if the server config cannot be read or output fails.
    pub fn execute<W: Write>(&self, writer: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let list = ClientList {
            clients: list_clients(&self.settings)?,
        };
        format.write(writer, &list)?;
        Ok(())
    }
}
