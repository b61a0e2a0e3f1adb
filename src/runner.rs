use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use tokio::process::Command;

/// What a finished subprocess left behind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Subprocess invocation, injected so tests never touch the real `aws` binary.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program` to completion and captures its output.
    async fn output(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput>;

    /// Starts `program` without waiting for it.
    fn spawn(&self, program: &str, args: &[&str]) -> io::Result<()>;
}

pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn output(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput> {
        tracing::debug!("running {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn spawn(&self, program: &str, args: &[&str]) -> io::Result<()> {
        tracing::debug!("spawning {} {}", program, args.join(" "));
        // the child keeps running after the handle is dropped
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(())
    }
}
