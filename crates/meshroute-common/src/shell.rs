//! Shell command execution for firewall backends.
//!
//! Commands are run through `/bin/sh -c`; every interpolated value must go
//! through [`shellquote`].
//!
//! # Example
//!
//! ```ignore
//! use meshroute_common::shell::{self, IPTABLES_CMD, shellquote};
//!
//! let cmd = format!("{} -t nat -S POSTROUTING -m comment --comment {}",
//!     IPTABLES_CMD, shellquote("route-1"));
//! let rules = shell::exec_or_throw(&cmd).await?;
//! ```

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{RouteMgrError, RouteMgrResult};

/// Path to the `iptables` command for NAT/forwarding rules.
pub const IPTABLES_CMD: &str = "/sbin/iptables";

/// Path to the `sysctl` command for kernel forwarding switches.
pub const SYSCTL_CMD: &str = "/sbin/sysctl";

/// Matches the characters that keep their meaning inside double quotes:
/// `$`, `` ` ``, `"`, `\` and newline.
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Quotes a string for safe use in shell commands.
///
/// ```
/// use meshroute_common::shell::shellquote;
///
/// assert_eq!(shellquote("wt0"), "\"wt0\"");
/// assert_eq!(shellquote("a$b"), "\"a\\$b\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Result of a shell command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns stdout and stderr joined for error messages.
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Executes a shell command asynchronously.
///
/// Only a spawn failure is an error; a non-zero exit is reported through
/// [`ExecResult::exit_code`].
pub async fn exec(cmd: &str) -> RouteMgrResult<ExecResult> {
    tracing::debug!(command = %cmd, "Executing shell command");

    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| RouteMgrError::ShellExec {
            command: cmd.to_string(),
            source: e,
        })?;

    let result = ExecResult {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    };

    if !result.success() {
        tracing::warn!(
            command = %cmd,
            exit_code = result.exit_code,
            stderr = %result.stderr,
            "Command failed"
        );
    }

    Ok(result)
}

/// Executes a shell command and turns a non-zero exit into an error.
pub async fn exec_or_throw(cmd: &str) -> RouteMgrResult<String> {
    let result = exec(cmd).await?;
    if result.success() {
        Ok(result.stdout)
    } else {
        Err(RouteMgrError::ShellCommandFailed {
            command: cmd.to_string(),
            exit_code: result.exit_code,
            output: result.combined_output(),
        })
    }
}

/// Runs commands for a firewall backend.
///
/// [`ShellRunner`] executes them; [`DryRunRunner`] only records them.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `cmd`, failing on spawn error or non-zero exit.
    async fn run(&self, cmd: &str) -> RouteMgrResult<()>;
}

/// Executes commands with [`exec_or_throw`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, cmd: &str) -> RouteMgrResult<()> {
        exec_or_throw(cmd).await.map(|_| ())
    }
}

/// Records commands instead of executing them.
#[derive(Debug, Default)]
pub struct DryRunRunner {
    captured: Mutex<Vec<String>>,
}

impl DryRunRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every command seen so far, oldest first.
    pub fn captured_commands(&self) -> Vec<String> {
        self.captured.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for DryRunRunner {
    async fn run(&self, cmd: &str) -> RouteMgrResult<()> {
        tracing::info!(command = %cmd, "dry-run: not executing");
        self.captured.lock().push(cmd.to_string());
        Ok(())
    }
}
