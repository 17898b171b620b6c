//! Payload fetching through an external transfer client.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, bail};
use async_trait::async_trait;
use marquee_config::FetchSettings;
use marquee_core::{ContentLocator, PayloadFetcher};
use tokio::process::Command;
use tracing::{debug, info};

/// Runs `<command> <args..> --dir=<destination> <locator>` and waits for it to exit.
///
/// The client's stdout is discarded so it can never interleave with the
/// worker's terminal message; its stderr is inherited.
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    command: String,
    args: Vec<String>,
}

impl CommandFetcher {
    /// Fetcher for an explicit command line.
    #[must_use]
    pub const fn new(command: String, args: Vec<String>) -> Self {
        Self { command, args }
    }

    /// Fetcher built from configuration.
    #[must_use]
    pub fn from_settings(settings: &FetchSettings) -> Self {
        Self::new(settings.command.clone(), settings.args.clone())
    }

    fn command_for(&self, locator: &ContentLocator, destination: &Path) -> Command {
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .arg(format!("--dir={}", destination.display()))
            .arg(locator.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl PayloadFetcher for CommandFetcher {
    async fn fetch(&self, locator: &ContentLocator, destination: &Path) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(destination)
            .await
            .with_context(|| format!("failed to create {}", destination.display()))?;
        debug!(command = %self.command, destination = %destination.display(), "starting fetch client");
        let status = self
            .command_for(locator, destination)
            .status()
            .await
            .with_context(|| format!("failed to launch {}", self.command))?;
        if !status.success() {
            bail!("{} exited with {status}", self.command);
        }
        info!(destination = %destination.display(), "payload materialized");
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn magnet() -> ContentLocator {
        ContentLocator::Magnet(format!("magnet:?xt=urn:btih:{}", "a".repeat(40)))
    }

    #[tokio::test]
    async fn fetch_passes_destination_and_locator() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let destination = dir.path().join("job");
        // $1 is `--dir=<destination>`, $2 the locator.
        let fetcher = CommandFetcher::new(
            "/bin/sh".into(),
            vec![
                "-c".into(),
                r#"d="${1#--dir=}"; printf '%s' "$2" > "$d/locator.txt""#.into(),
                "fetch".into(),
            ],
        );
        fetcher.fetch(&magnet(), &destination).await?;

        let written = tokio::fs::read_to_string(destination.join("locator.txt")).await?;
        assert_eq!(written, magnet().as_str());
        Ok(())
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_failure() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let fetcher = CommandFetcher::new("/bin/sh".into(), vec!["-c".into(), "exit 3".into()]);
        let err = fetcher
            .fetch(&magnet(), dir.path())
            .await
            .expect_err("fetch should fail");
        assert!(err.to_string().contains("exited with"));
        Ok(())
    }
}
