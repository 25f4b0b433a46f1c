//! Narrow abstraction over external process execution, with an explicit
//! timeout on every call and a single seam (`wrap_for_host`) that decides
//! whether a mutating command runs directly or via `nsenter` into the host
//! namespaces.
//!
//! Generalizes the scattered `run_command`/`run_command_output` call sites
//! across the old `ifconfig.rs`, `root/services.rs`, and `root/ntp.rs` into
//! one async, timeout-bearing trait.

use crate::error::{AgentError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

pub const READ_TIMEOUT: Duration = Duration::from_secs(10);
pub const MUTATE_TIMEOUT: Duration = Duration::from_secs(30);
pub const NETPLAN_TRY_TIMEOUT: Duration = Duration::from_secs(120);

/// Output of a completed external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ensure_success(&self, program: &str, args: &[&str]) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(AgentError::network(format!(
                "`{program} {}` failed: {}",
                args.join(" "),
                self.stderr.trim()
            )))
        }
    }
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Runs a read-only probe (`ip addr show`, `cat /etc/os-release`, ...).
    /// Never routed through `nsenter` even in container mode, since reading
    /// `/host`-prefixed paths is sufficient for probes.
    async fn run_read_only(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Runs a command that mutates host state (`netplan apply`, `ip link
    /// set`, `systemctl restart`). In container mode this is transparently
    /// wrapped with `nsenter --target 1 --mount --uts --ipc --net --pid`.
    async fn run_mutating(
        &self,
        program: &str,
        args: &[&str],
        timeout_override: Option<Duration>,
    ) -> Result<CommandOutput>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerMode {
    Auto,
    Forced,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct RealCommandExecutor {
    container_mode: ContainerMode,
}

impl RealCommandExecutor {
    #[must_use]
    pub fn new(container_mode: ContainerMode) -> Self {
        Self { container_mode }
    }

    /// True when mutating commands should be dispatched through `nsenter`
    /// into the host's namespaces. Encapsulates the container/host boundary
    /// in one place so call sites never branch on it themselves.
    #[must_use]
    pub fn in_container(&self) -> bool {
        match self.container_mode {
            ContainerMode::Forced => true,
            ContainerMode::Disabled => false,
            ContainerMode::Auto => std::path::Path::new("/host").exists(),
        }
    }

    fn wrap_for_host<'a>(&self, program: &'a str, args: &'a [&'a str]) -> (String, Vec<String>) {
        if self.in_container() {
            let mut wrapped = vec![
                "--target".to_string(),
                "1".to_string(),
                "--mount".to_string(),
                "--uts".to_string(),
                "--ipc".to_string(),
                "--net".to_string(),
                "--pid".to_string(),
                "--".to_string(),
                program.to_string(),
            ];
            wrapped.extend(args.iter().map(|a| a.to_string()));
            ("nsenter".to_string(), wrapped)
        } else {
            (program.to_string(), args.iter().map(|a| a.to_string()).collect())
        }
    }

    async fn exec(program: &str, args: &[String], budget: Duration) -> Result<CommandOutput> {
        let fut = TokioCommand::new(program).args(args).output();
        match timeout(budget, fut).await {
            Ok(Ok(output)) => Ok(CommandOutput {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(e)) => Err(AgentError::system(format!("executing {program}"), e)),
            Err(_) => Err(AgentError::timeout(format!(
                "{program} {}",
                args.join(" ")
            ))),
        }
    }
}

#[async_trait]
impl CommandExecutor for RealCommandExecutor {
    async fn run_read_only(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let owned: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        Self::exec(program, &owned, READ_TIMEOUT).await
    }

    async fn run_mutating(
        &self,
        program: &str,
        args: &[&str],
        timeout_override: Option<Duration>,
    ) -> Result<CommandOutput> {
        let (program, args) = self.wrap_for_host(program, args);
        let budget = timeout_override.unwrap_or(MUTATE_TIMEOUT);
        Self::exec(&program, &args, budget).await
    }
}

#[cfg(test)]
pub mod fake {
    use super::{CommandExecutor, CommandOutput, Duration, Result};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a scripted sequence of responses, recording every call made
    /// against it so tests can assert on command ordering.
    #[derive(Default)]
    pub struct ScriptedCommandExecutor {
        responses: Mutex<VecDeque<Result<CommandOutput>>>,
        pub calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl ScriptedCommandExecutor {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_ok(&self, stdout: impl Into<String>) {
            self.responses
                .lock()
                .expect("scripted executor lock poisoned")
                .push_back(Ok(CommandOutput {
                    success: true,
                    stdout: stdout.into(),
                    stderr: String::new(),
                }));
        }

        pub fn push_failure(&self, stderr: impl Into<String>) {
            self.responses
                .lock()
                .expect("scripted executor lock poisoned")
                .push_back(Ok(CommandOutput {
                    success: false,
                    stdout: String::new(),
                    stderr: stderr.into(),
                }));
        }

        fn record(&self, program: &str, args: &[&str]) {
            self.calls.lock().expect("scripted executor lock poisoned").push((
                program.to_string(),
                args.iter().map(|a| a.to_string()).collect(),
            ));
        }

        fn pop(&self) -> Result<CommandOutput> {
            self.responses
                .lock()
                .expect("scripted executor lock poisoned")
                .pop_front()
                .unwrap_or(Ok(CommandOutput {
                    success: true,
                    stdout: String::new(),
                    stderr: String::new(),
                }))
        }
    }

    #[async_trait]
    impl CommandExecutor for ScriptedCommandExecutor {
        async fn run_read_only(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
            self.record(program, args);
            self.pop()
        }

        async fn run_mutating(
            &self,
            program: &str,
            args: &[&str],
            _timeout_override: Option<Duration>,
        ) -> Result<CommandOutput> {
            self.record(program, args);
            self.pop()
        }
    }
}
