//! Rebuild executor
//!
//! Runs the user's cacheable command. Expressed as a trait so the
//! workflows can be driven without spawning real processes.

use crate::error::{DircacheError, DircacheResult};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Capability to run a rebuild command
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command`, optionally from `working_dir`
    ///
    /// Returns `CommandFailure` when the command exits unsuccessfully.
    async fn run(&self, command: &str, working_dir: Option<&Path>) -> DircacheResult<()>;
}

/// Runs commands through the platform shell with inherited stdio
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl ShellRunner {
    /// Create a shell runner
    pub fn new() -> Self {
        Self
    }

    fn shell_command(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, working_dir: Option<&Path>) -> DircacheResult<()> {
        info!("Running cacheable command: {}", command);

        let mut cmd = Self::shell_command(command);
        if let Some(dir) = working_dir {
            debug!("Working directory: {}", dir.display());
            cmd.current_dir(dir);
        }

        let status = cmd
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| DircacheError::command_failed(command, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(DircacheError::CommandFailure {
                command: command.to_string(),
                code: status.code(),
            })
        }
    }
}
