//! External tool invocation.
//!
//! Every pipeline stage shells out to one external command with a
//! "exit code 0 means success" contract. Output is captured so failures
//! carry the full diagnostics. The invoker sits behind a trait so the
//! step executors can be exercised without spawning real processes.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, SubflowError};

/// A single external command invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub description: String,
}

impl ToolCommand {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(program: P, description: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    pub fn current_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Command line as shown in error reports and logs.
    pub fn rendered(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Seam between the pipeline and the operating system.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Run a command to completion, capturing output. Non-zero exit maps
    /// to `SubflowError::ExternalProcess`.
    async fn run(&self, command: &ToolCommand) -> Result<()>;

    /// Open a file with the platform's default application. Callers treat
    /// failures as best-effort and only log them.
    fn open_in_editor(&self, path: &Path) -> Result<()>;
}

/// Invoker backed by real child processes.
pub struct SystemInvoker;

#[async_trait]
impl ToolInvoker for SystemInvoker {
    async fn run(&self, command: &ToolCommand) -> Result<()> {
        debug!("Executing {}: {}", command.description, command.rendered());

        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args);
        if let Some(cwd) = &command.cwd {
            cmd.current_dir(cwd);
        }

        let output = cmd.output().await?;

        if !output.status.success() {
            return Err(SubflowError::ExternalProcess {
                command: command.rendered(),
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        debug!("{} completed successfully", command.description);
        Ok(())
    }

    #[cfg(target_os = "windows")]
    fn open_in_editor(&self, path: &Path) -> Result<()> {
        std::process::Command::new("cmd")
            .args(["/C", "start", ""])
            .arg(path)
            .spawn()?;
        Ok(())
    }

    #[cfg(target_os = "macos")]
    fn open_in_editor(&self, path: &Path) -> Result<()> {
        std::process::Command::new("open").arg(path).spawn()?;
        Ok(())
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    fn open_in_editor(&self, path: &Path) -> Result<()> {
        std::process::Command::new("xdg-open").arg(path).spawn()?;
        Ok(())
    }
}

/// Verify a converter binary responds to `-version` (ffmpeg convention).
pub fn check_converter<P: AsRef<Path>>(binary: P) -> Result<()> {
    let binary = binary.as_ref();
    let output = std::process::Command::new(binary)
        .arg("-version")
        .output()
        .map_err(|e| {
            SubflowError::Config(format!("Converter not found at {}: {}", binary.display(), e))
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(SubflowError::Config(format!(
            "Converter at {} failed its version check",
            binary.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_command_line() {
        let cmd = ToolCommand::new("ffmpeg", "Subtitle conversion")
            .arg("-y")
            .args(["-i", "demo.ass"])
            .arg("demo.srt");
        assert_eq!(cmd.rendered(), "ffmpeg -y -i demo.ass demo.srt");
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_diagnostics() {
        let invoker = SystemInvoker;
        let cmd = ToolCommand::new("sh", "Failing command")
            .arg("-c")
            .arg("echo out; echo err >&2; exit 3");

        match invoker.run(&cmd).await {
            Err(SubflowError::ExternalProcess {
                command,
                code,
                stdout,
                stderr,
            }) => {
                assert!(command.starts_with("sh -c"));
                assert_eq!(code, Some(3));
                assert!(stdout.contains("out"));
                assert!(stderr.contains("err"));
            }
            other => panic!("expected ExternalProcess error, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_successful_command() {
        let invoker = SystemInvoker;
        let cmd = ToolCommand::new("sh", "True command").arg("-c").arg("exit 0");
        assert!(invoker.run(&cmd).await.is_ok());
    }
}
