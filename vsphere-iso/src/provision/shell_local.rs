//! Runs commands on the build host against the booted guest.

use super::{ProvisionContext, Provisioner};
use crate::errors::{BuildError, BuildResult};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs each inline command through `sh -c`.
///
/// The guest is exported to the command as `GUEST_ADDRESS`, `GUEST_PORT`
/// and `GUEST_USER`, alongside any configured `KEY=VALUE` pairs.
#[derive(Debug, Clone, Default)]
pub struct ShellLocalProvisioner {
    inline: Vec<String>,
    env: Vec<(String, String)>,
}

impl ShellLocalProvisioner {
    /// Creates a provisioner running the given commands in order.
    #[must_use]
    pub fn new(inline: Vec<String>) -> Self {
        Self {
            inline,
            env: Vec::new(),
        }
    }

    /// Adds `KEY=VALUE` environment pairs. Malformed entries are ignored.
    #[must_use]
    pub fn with_env(mut self, vars: &[String]) -> Self {
        self.env.extend(vars.iter().filter_map(|var| {
            var.split_once('=')
                .filter(|(key, _)| !key.is_empty())
                .map(|(key, value)| (key.to_string(), value.to_string()))
        }));
        self
    }

    async fn run_command(&self, command: &str, ctx: &ProvisionContext) -> BuildResult<()> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .env("GUEST_ADDRESS", &ctx.target.address)
            .env("GUEST_PORT", ctx.target.port.to_string())
            .env("GUEST_USER", &ctx.target.username)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let ui = ctx.ui.clone();
        let pump = async move {
            if let Some(out) = stdout {
                let mut lines = BufReader::new(out).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    ui.message(&line);
                }
            }
        };
        let ui = ctx.ui.clone();
        let pump_err = async move {
            if let Some(err) = stderr {
                let mut lines = BufReader::new(err).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    ui.error(&line);
                }
            }
        };

        let run = async {
            let ((), (), status) = tokio::join!(pump, pump_err, child.wait());
            status
        };

        tokio::select! {
            status = run => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(BuildError::Provision(format!(
                        "command '{command}' exited with {}",
                        status.code().map_or_else(|| "a signal".to_string(), |c| format!("status {c}"))
                    )))
                }
            }
            () = ctx.cancel.cancelled() => {
                // The child is killed when it goes out of scope.
                Err(BuildError::Cancelled(ctx.cancel.reason_or_default()))
            }
        }
    }
}

#[async_trait]
impl Provisioner for ShellLocalProvisioner {
    fn name(&self) -> &'static str {
        "shell-local"
    }

    async fn provision(&self, ctx: ProvisionContext) -> BuildResult<()> {
        for command in &self.inline {
            if ctx.cancel.is_cancelled() {
                return Err(BuildError::Cancelled(ctx.cancel.reason_or_default()));
            }
            debug!(command = %command, target = %ctx.target, "running shell-local command");
            ctx.ui.say(&format!("Executing local command: {command}"));
            if let Err(err) = self.run_command(command, &ctx).await {
                warn!(command = %command, error = %err, "shell-local command failed");
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::provision::GuestTarget;
    use crate::ui::{RecordingUi, UiLevel};
    use std::sync::Arc;
    use std::time::Duration;

    fn context(ui: Arc<RecordingUi>) -> ProvisionContext {
        ProvisionContext {
            target: GuestTarget {
                address: "10.0.0.7".into(),
                port: 2222,
                username: "builder".into(),
                password: String::new(),
            },
            ui,
            cancel: Arc::new(CancellationToken::new()),
        }
    }

    #[test]
    fn test_with_env_skips_malformed() {
        let p = ShellLocalProvisioner::new(vec![])
            .with_env(&["A=1".into(), "NOPE".into(), "=x".into(), "B=two=2".into()]);
        assert_eq!(
            p.env,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "two=2".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_exports_guest_and_streams_output() {
        let ui = Arc::new(RecordingUi::new());
        let p = ShellLocalProvisioner::new(vec![
            "echo \"$GUEST_USER@$GUEST_ADDRESS:$GUEST_PORT $FLAVOR\"".into(),
        ])
        .with_env(&["FLAVOR=minimal".into()]);

        p.provision(context(ui.clone())).await.unwrap();

        assert_eq!(
            ui.lines_of(UiLevel::Message),
            vec!["builder@10.0.0.7:2222 minimal".to_string()]
        );
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_provision_error() {
        let ui = Arc::new(RecordingUi::new());
        let p = ShellLocalProvisioner::new(vec!["exit 3".into(), "echo unreachable".into()]);

        let err = p.provision(context(ui.clone())).await.unwrap_err();
        assert!(matches!(err, BuildError::Provision(ref m) if m.contains("status 3")));
        assert!(!ui.contains("unreachable"));
    }

    #[tokio::test]
    async fn test_cancel_kills_command() {
        let ui = Arc::new(RecordingUi::new());
        let ctx = context(ui);
        let token = Arc::clone(&ctx.cancel);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel("operator interrupt");
        });

        let p = ShellLocalProvisioner::new(vec!["sleep 30".into()]);
        let err = tokio::time::timeout(Duration::from_secs(5), p.provision(ctx))
            .await
            .unwrap()
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
