//! Allow-listed execution of host tools.
//!
//! Every external program the procedures touch is named in
//! [`AllowedProgram`]. Arguments are passed straight to the program with no
//! shell in between, and arguments carrying NUL, CR or LF are rejected
//! before anything runs.
//!
//! ```rust,no_run
//! use wgadm_provision::command::{AllowedProgram, SafeCommand};
//!
//! # fn example() -> Result<(), wgadm_provision::command::CommandError> {
//! let output = SafeCommand::new(AllowedProgram::Systemctl)
//!     .args(["restart", "wg-quick@wg0"])
//!     .execute()?;
//! assert!(output.success());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

/// Programs that may be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum AllowedProgram {
    /// `ip` from iproute2, for routes and addresses.
    Ip,
    /// `sysctl`, to reload kernel parameters.
    Sysctl,
    /// `ufw`, the uncomplicated firewall.
    Ufw,
    /// `systemctl`, to manage the `wg-quick` unit.
    Systemctl,
    /// `apt-get`, to install packages.
    AptGet,
}

impl AllowedProgram {
    /// Get the program name to execute.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Sysctl => "sysctl",
            Self::Ufw => "ufw",
            Self::Systemctl => "systemctl",
            Self::AptGet => "apt-get",
        }
    }
}

impl fmt::Display for AllowedProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during command execution.
#[derive(Debug, Error)]
pub enum CommandError {
    /// An argument was rejected before execution.
    #[error("invalid argument {argument:?}: contains {character:?}")]
    InvalidArgument {
        /// The offending argument.
        argument: String,
        /// The forbidden character.
        character: char,
    },

    /// The program could not be started.
    #[error("failed to execute {program}: {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The command returned a non-zero exit code.
    #[error("command '{command}' exited with code {exit_code}: {stderr}")]
    NonZeroExit {
        /// The command that was executed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Standard error output.
        stderr: String,
    },
}

/// Characters that are never allowed in command arguments.
const FORBIDDEN_CHARS: &[char] = &['\0', '\n', '\r'];

/// Validate a command argument.
///
/// # Errors
///
/// Returns an error if the argument contains forbidden characters.
pub fn validate_argument(arg: &str) -> Result<(), CommandError> {
    match arg.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        Some(character) => Err(CommandError::InvalidArgument {
            argument: arg.to_string(),
            character,
        }),
        None => Ok(()),
    }
}

/// Output from a command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Standard output.
    pub stdout: Vec<u8>,
    /// Standard error.
    pub stderr: Vec<u8>,
    /// Exit status code (0 for success, -1 when killed by a signal).
    pub exit_code: i32,
}

impl CommandOutput {
    /// Get stdout as a UTF-8 string, replacing invalid characters.
    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Get stderr as a UTF-8 string, replacing invalid characters.
    #[must_use]
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Check if the command succeeded (exit code 0).
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A command builder that validates all inputs.
#[derive(Debug)]
pub struct SafeCommand {
    program: AllowedProgram,
    args: Vec<String>,
    env_vars: Vec<(String, String)>,
    error: Option<CommandError>,
}

impl SafeCommand {
    /// Create a new command for the given program.
    #[must_use]
    pub fn new(program: AllowedProgram) -> Self {
        Self {
            program,
            args: Vec::new(),
            env_vars: Vec::new(),
            error: None,
        }
    }

    /// Add a single argument to the command.
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        let arg = arg.as_ref();
        match validate_argument(arg) {
            Ok(()) => self.args.push(arg.to_string()),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    /// Add multiple arguments to the command.
    #[must_use]
    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        args.into_iter().fold(self, |cmd, arg| cmd.arg(arg))
    }

    /// Set an environment variable for the command.
    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        if let Err(e) = validate_argument(key).and_then(|()| validate_argument(value)) {
            self.error.get_or_insert(e);
            return self;
        }
        self.env_vars.push((key.to_string(), value.to_string()));
        self
    }

    /// Check if an argument was rejected.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error.is_some()
    }

    /// Build the command description for logging.
    fn command_description(&self) -> String {
        let mut description = self.program.as_str().to_string();
        for arg in &self.args {
            description.push(' ');
            description.push_str(arg);
        }
        description
    }

    /// Execute the command and return the output.
    ///
    /// # Errors
    ///
    /// Returns an error if an argument was rejected, the program could not
    /// be started, or it returned a non-zero exit code.
    pub fn execute(self) -> Result<CommandOutput, CommandError> {
        let description = self.command_description();
        let output = self.execute_unchecked()?;
        if !output.success() {
            return Err(CommandError::NonZeroExit {
                command: description,
                exit_code: output.exit_code,
                stderr: output.stderr_lossy().trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Execute the command without checking the exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if an argument was rejected or the program could not
    /// be started.
    pub fn execute_unchecked(mut self) -> Result<CommandOutput, CommandError> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }

        debug!(command = %self.command_description(), "running");

        let program = self.program.as_str();
        let mut cmd = Command::new(program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        let output = cmd.output().map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

        Ok(CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_argument_accepts_plain_values() {
        assert!(validate_argument("--force").is_ok());
        assert!(validate_argument("51820/udp").is_ok());
        assert!(validate_argument("").is_ok());
    }

    #[test]
    fn validate_argument_rejects_control_chars() {
        assert!(validate_argument("value\0").is_err());
        assert!(validate_argument("line1\nline2").is_err());
        assert!(validate_argument("text\r").is_err());
    }

    #[test]
    fn builder_collects_args() {
        let cmd = SafeCommand::new(AllowedProgram::Ufw).args(["allow", "51820/udp"]);
        assert!(!cmd.has_errors());
        assert_eq!(cmd.command_description(), "ufw allow 51820/udp");
    }

    #[test]
    fn rejected_arg_fails_before_spawn() {
        let cmd = SafeCommand::new(AllowedProgram::Systemctl).arg("restart").arg("wg-quick@wg0\n");
        assert!(cmd.has_errors());
        assert!(matches!(cmd.execute(), Err(CommandError::InvalidArgument { .. })));
    }

    #[test]
    fn rejected_env_is_recorded() {
        let cmd = SafeCommand::new(AllowedProgram::AptGet).env("DEBIAN_FRONTEND", "non\ninteractive");
        assert!(cmd.has_errors());
    }

    #[test]
    fn program_names() {
        assert_eq!(AllowedProgram::Ip.as_str(), "ip");
        assert_eq!(AllowedProgram::AptGet.to_string(), "apt-get");
    }

    #[test]
    fn command_output_methods() {
        let output = CommandOutput {
            stdout: b"active\n".to_vec(),
            stderr: Vec::new(),
            exit_code: 0,
        };
        assert!(output.success());
        assert_eq!(output.stdout_lossy(), "active\n");
        assert!(output.stderr_lossy().is_empty());
    }
}
