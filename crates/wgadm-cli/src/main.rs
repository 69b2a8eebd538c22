//! wgadm binary entrypoint.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use wgadm_cli::cli::{Cli, Commands};
use wgadm_cli::commands::{BootstrapCommand, EnrollCommand, ListCommand};
use wgadm_cli::output::OutputFormat;
use wgadm_provision::Capabilities;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), wgadm_cli::CliError> {
    let format = OutputFormat::new(cli.format);
    let settings = cli.settings();
    let mut stdout = io::stdout().lock();
    debug!(
        command = ?cli.command,
        server_config = %settings.server_config_path().display(),
        "running"
    );

    match cli.command {
        Commands::Bootstrap { .. } => {
            let caps = Capabilities::system(&settings);
            BootstrapCommand::new(settings).execute(&mut stdout, &format, &caps)?;
        }
        Commands::AddClient => {
            let caps = Capabilities::system(&settings);
            EnrollCommand::new(settings).execute(&mut stdout, &format, &caps)?;
        }
        Commands::ListClients => {
            ListCommand::new(settings).execute(&mut stdout, &format)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgadm_cli::cli::Format;

    #[test]
    fn cli_parses_bootstrap() {
        let cli = Cli::parse_from(["wgadm", "bootstrap"]);
        assert!(matches!(cli.command, Commands::Bootstrap { skip_packages: false }));
    }

    #[test]
    fn cli_parses_add_client() {
        let cli = Cli::parse_from(["wgadm", "add-client"]);
        assert!(matches!(cli.command, Commands::AddClient));
    }

    #[test]
    fn cli_respects_format_flag() {
        let cli = Cli::parse_from(["wgadm", "--format", "json", "list-clients"]);
        assert_eq!(cli.format, Format::Json);
    }

    #[test]
    fn cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["wgadm", "remove-client"]).is_err());
    }

    #[test]
    fn list_against_missing_config_fails() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let config_dir = dir.path().join("absent");
        let cli = Cli::parse_from([
            "wgadm",
            "--config-dir",
            config_dir.to_str().expect("utf-8 path"),
            "list-clients",
        ]);
        assert!(run(&cli).is_err());
    }
}
