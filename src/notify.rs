//! Notification sinks. The desktop sink shells out to the platform notifier; the console sink is
//! the in-app fallback and always works.

use std::io::Write;

use ansi_term::Colour;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::{info, warn};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    async fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// Prints a highlighted toast to stderr and rings the terminal bell.
pub struct ConsoleNotifier;

#[async_trait]
impl NotificationSink for ConsoleNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        let mut stderr = std::io::stderr().lock();
        writeln!(
            stderr,
            "\x07{} {}",
            Colour::Yellow.bold().paint(title),
            Colour::White.dimmed().paint(body)
        )?;
        Ok(())
    }
}

/// System notification through `notify-send` (Linux) or `osascript` (macOS).
pub struct DesktopNotifier;

impl DesktopNotifier {
    fn command(title: &str, body: &str) -> Result<Command> {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "linux")] {
                let mut command = Command::new("notify-send");
                command.args(["--app-name", "Chronify", title, body]);
                Ok(command)
            }
            else if #[cfg(target_os = "macos")] {
                let mut command = Command::new("osascript");
                command.args([
                    "-e",
                    &format!(
                        "display notification {:?} with title {:?}",
                        body, title
                    ),
                ]);
                Ok(command)
            }
            else {
                let _ = (title, body);
                Err(anyhow!("Desktop notifications aren't supported on this platform"))
            }
        }
    }
}

#[async_trait]
impl NotificationSink for DesktopNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        let status = Self::command(title, body)?
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await?;
        if !status.success() {
            return Err(anyhow!("Notifier exited with {status}"));
        }
        Ok(())
    }
}

/// Tries `primary` and falls back to `fallback` when it fails.
pub struct FallbackNotifier<P, F> {
    primary: P,
    fallback: F,
}

impl<P: NotificationSink, F: NotificationSink> FallbackNotifier<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl<P: NotificationSink, F: NotificationSink> NotificationSink for FallbackNotifier<P, F> {
    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        match self.primary.notify(title, body).await {
            Ok(_) => {
                info!("Sent notification \"{title}\"");
                Ok(())
            }
            Err(e) => {
                warn!("Primary notifier failed, using fallback {e:?}");
                self.fallback.notify(title, body).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[tokio::test]
    async fn fallback_is_used_when_primary_fails() {
        let mut primary = MockNotificationSink::new();
        primary
            .expect_notify()
            .times(1)
            .returning(|_, _| Err(anyhow!("no permission")));
        let mut fallback = MockNotificationSink::new();
        fallback
            .expect_notify()
            .withf(|title, body| title.to_string() == "title" && body.to_string() == "body")
            .times(1)
            .returning(|_, _| Ok(()));

        FallbackNotifier::new(primary, fallback)
            .notify("title", "body")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn fallback_is_skipped_when_primary_works() {
        let mut primary = MockNotificationSink::new();
        primary.expect_notify().times(1).returning(|_, _| Ok(()));
        let mut fallback = MockNotificationSink::new();
        fallback.expect_notify().never();

        FallbackNotifier::new(primary, fallback)
            .notify("title", "body")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn console_notifier_never_fails() {
        ConsoleNotifier.notify("Are you working?", "body").await.unwrap();
    }
}
