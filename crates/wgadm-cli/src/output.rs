//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use serde::Serialize;
use wgadm_provision::{BootstrapReport, ClientEntry, EnrolledClient, EnrollmentReport};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Get the current format.
    #[must_use]
    pub const fn format(&self) -> Format {
        self.format
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

fn write_client<W: Write>(writer: &mut W, client: &EnrolledClient) -> Result<(), CliError> {
    writeln!(writer, "Client")?;
    writeln!(writer, "  Name:           {}", client.name)?;
    writeln!(writer, "  Address:        {}/32", client.address)?;
    writeln!(writer, "  Public Key:     {}", client.public_key)?;
    writeln!(writer, "  Endpoint:       {}", client.endpoint)?;
    writeln!(writer, "  Config:         {}", client.artifacts.config_path.display())?;
    writeln!(writer, "  QR Code:        {}", client.artifacts.qr_path.display())?;
    if !client.qr_terminal.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Scan with the WireGuard mobile app:")?;
        writeln!(writer)?;
        write!(writer, "{}", client.qr_terminal)?;
        if !client.qr_terminal.ends_with('\n') {
            writeln!(writer)?;
        }
    }
    Ok(())
}

impl TableDisplay for BootstrapReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Server Bootstrapped")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Config:           {}", self.server_config.display())?;
        if self.replaced_existing {
            writeln!(writer, "                  (previous config replaced)")?;
        }
        writeln!(writer, "Public Key:       {}", self.server_public_key)?;
        writeln!(writer, "Address:          {}", self.network)?;
        writeln!(writer, "Listen Port:      {}/udp", self.listen_port)?;
        writeln!(writer, "NAT Interface:    {}", self.uplink_interface)?;
        writeln!(writer, "Service:          {}", self.service)?;
        writeln!(writer)?;
        writeln!(writer, "Host")?;
        if self.packages.is_empty() {
            writeln!(writer, "  Packages:       skipped")?;
        } else {
            writeln!(writer, "  Packages:       {}", self.packages.join(", "))?;
        }
        if self.forwarding_added.is_empty() {
            writeln!(writer, "  Forwarding:     already enabled")?;
        } else {
            writeln!(writer, "  Forwarding:     added {}", self.forwarding_added.join(", "))?;
        }
        let firewall = if self.firewall_enabled { "enabled" } else { "already active" };
        writeln!(writer, "  Firewall:       {firewall}")?;
        writeln!(writer)?;
        write_client(writer, &self.client)
    }
}

impl TableDisplay for EnrollmentReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Client Added")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Server Config:    {}", self.server_config.display())?;
        writeln!(writer, "Server Address:   {}", self.network)?;
        writeln!(writer, "Allocation:       {}", self.strategy)?;
        writeln!(writer, "Peers Before:     {}", self.existing_peers)?;
        writeln!(writer, "Service:          {}", self.service)?;
        writeln!(writer)?;
        write_client(writer, &self.client)
    }
}

/// Peers of the server config.
#[derive(Debug, Clone, Serialize)]
pub struct ClientList {
    /// Entries in file order.
    pub clients: Vec<ClientEntry>,
}

impl TableDisplay for ClientList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.clients.is_empty() {
            writeln!(writer, "No clients enrolled.")?;
            return Ok(());
        }

        writeln!(writer, "{:<4} {:<12} {:<18} {:<44}", "#", "NAME", "ADDRESS", "PUBLIC KEY")?;
        writeln!(writer, "{}", "─".repeat(80))?;
        for entry in &self.clients {
            let name = entry.name.as_deref().unwrap_or("-");
            let address = entry
                .address
                .map_or_else(|| entry.allowed_ips.join(","), |a| a.to_string());
            writeln!(
                writer,
                "{:<4} {:<12} {:<18} {:<44}",
                entry.position, name, address, entry.public_key
            )?;
        }
        writeln!(writer)?;
        writeln!(writer, "Total: {} client(s)", self.clients.len())?;
        Ok(())
    }
}
