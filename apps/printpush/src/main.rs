//! printpush entry point.

mod config;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, bail};
use clap::Parser;
use printpush_notify::{ActionHandler, NotificationQueue, NotifyError};
use printpush_protocol::DeviceEvent;
use printpush_upload::{FixedJobName, UploadError};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "printpush")]
#[command(about = "Upload sliced G-code to an OctoPrint server", long_about = None)]
struct Cli {
    /// G-code file to upload
    gcode: PathBuf,

    /// Name to store the file under (default: the input file's name)
    #[arg(long)]
    file_name: Option<String>,

    /// OctoPrint base URL
    #[arg(long)]
    url: Option<String>,

    /// OctoPrint API key
    #[arg(long)]
    api_key: Option<String>,

    /// Display name of the printer
    #[arg(long)]
    name: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long)]
    insecure: bool,

    /// Request timeout in seconds (0 disables it)
    #[arg(long)]
    timeout: Option<u64>,

    /// Configuration file to use instead of the default one
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Overrides file settings with the flags that were given.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.url {
            config.base_url = url.clone();
        }
        if let Some(key) = &self.api_key {
            config.api_key = key.clone();
        }
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if self.insecure {
            config.accept_invalid_certs = true;
        }
        if let Some(secs) = self.timeout {
            config.timeout_secs = secs;
        }
    }

    fn upload_name(&self) -> Option<String> {
        self.file_name.clone().or_else(|| {
            self.gcode
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_owned)
        })
    }
}

/// Prints the URL instead of launching a browser.
struct PrintUrl;

impl ActionHandler for PrintUrl {
    fn open_url(&self, url: &str) -> Result<(), NotifyError> {
        println!("Open Browser: {url}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting printpush");

    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(c) => {
            tracing::info!(name = %c.name, "configuration loaded");
            c
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            AppConfig::default()
        }
    };
    cli.apply(&mut config);

    if config.base_url.is_empty() {
        bail!("no OctoPrint URL configured; pass --url or set base_url in the config file");
    }

    let lines = read_lines(&cli.gcode)?;
    let queue = Arc::new(Mutex::new(NotificationQueue::new()));
    let endpoint = config.endpoint();
    tracing::info!(endpoint = %endpoint.description(), "endpoint configured");
    let session = printpush_octoprint::session(endpoint)
        .context("failed to create HTTP client")?
        .with_notifier(queue.clone())
        .with_job_names(Arc::new(FixedJobName(config.job_name.clone())));
    let session = Arc::new(session);

    let events = session
        .take_events()
        .context("event stream already taken")?;
    let printer = tokio::spawn(print_events(events));

    let canceller = {
        let session = session.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                session.cancel();
            }
        })
    };

    let result = session.submit(&lines[..], cli.upload_name().as_deref()).await;

    canceller.abort();
    let _ = canceller.await;
    drop(session);
    let _ = printer.await;

    match result {
        Ok(_) => {
            open_browser_links(&queue);
            Ok(())
        }
        Err(UploadError::Cancelled) => {
            println!("Upload cancelled.");
            Ok(())
        }
        Err(e) => Err(e).context("upload failed"),
    }
}

/// Reads a G-code file as lines, keeping their line endings.
fn read_lines(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(split_lines(&content))
}

fn split_lines(content: &str) -> Vec<String> {
    content.split_inclusive('\n').map(str::to_owned).collect()
}

async fn print_events(mut events: mpsc::UnboundedReceiver<DeviceEvent>) {
    let mut shown = 0u32;
    while let Some(event) = events.recv().await {
        if let DeviceEvent::WriteProgress { percent, .. } = &event {
            if let Some(step) = progress_step(*percent, shown) {
                shown = step;
                println!("{step}%");
            }
        } else if let Some(line) = describe(&event) {
            println!("{line}");
        }
    }
}

/// The next 10 % step reached by `percent`, if it passes `shown`.
fn progress_step(percent: f64, shown: u32) -> Option<u32> {
    let step = (percent / 10.0).floor() as u32 * 10;
    (step > shown).then_some(step)
}

fn describe(event: &DeviceEvent) -> Option<String> {
    match event {
        DeviceEvent::WriteStarted(job) => Some(format!("Uploading {}...", job.file_name)),
        DeviceEvent::WriteProgress { .. } | DeviceEvent::WriteFinished(_) => None,
        DeviceEvent::WriteSuccess(job) => Some(format!("Uploaded {}", job.file_name)),
        DeviceEvent::WriteError { reason, .. } => Some(format!("Upload failed: {reason}")),
        DeviceEvent::WriteCancelled(job) => Some(format!("Cancelled {}", job.file_name)),
        DeviceEvent::TlsWarning { errors } => {
            Some(format!("SSL warning: {}", errors.join(", ")))
        }
    }
}

/// Runs the "Open Browser" action of any remaining notification.
fn open_browser_links(queue: &Mutex<NotificationQueue>) {
    let mut queue = queue.lock().unwrap_or_else(|e| e.into_inner());
    let ids: Vec<_> = queue
        .iter()
        .filter(|(_, n)| n.action("open_browser").is_some())
        .map(|(id, _)| id)
        .collect();
    for id in ids {
        if let Err(e) = queue.trigger(id, "open_browser", &PrintUrl) {
            tracing::warn!(error = %e, "notification action failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printpush_notify::{Notification, PostAction};
    use printpush_protocol::JobInfo;

    fn job() -> JobInfo {
        JobInfo {
            id: 1,
            file_name: "part.gcode".into(),
        }
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "printpush",
            "part.gcode",
            "--url",
            "https://printer.lan",
            "--insecure",
            "--timeout",
            "0",
        ]);
        let mut config = AppConfig {
            api_key: "from-file".into(),
            ..AppConfig::default()
        };
        cli.apply(&mut config);

        assert_eq!(config.base_url, "https://printer.lan");
        assert_eq!(config.api_key, "from-file");
        assert!(config.accept_invalid_certs);
        assert_eq!(config.timeout_secs, 0);
    }

    #[test]
    fn upload_name_defaults_to_input_file() {
        let cli = Cli::parse_from(["printpush", "/tmp/benchy.gcode"]);
        assert_eq!(cli.upload_name().as_deref(), Some("benchy.gcode"));

        let cli = Cli::parse_from(["printpush", "/tmp/benchy.gcode", "--file-name", "boat"]);
        assert_eq!(cli.upload_name().as_deref(), Some("boat"));
    }

    #[test]
    fn lines_keep_their_endings() {
        assert_eq!(
            split_lines("G28\r\nG1 X10\nM84"),
            vec!["G28\r\n", "G1 X10\n", "M84"]
        );
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn read_lines_missing_file() {
        let err = read_lines(Path::new("/nonexistent/part.gcode")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn describe_events() {
        assert_eq!(
            describe(&DeviceEvent::WriteStarted(job())).as_deref(),
            Some("Uploading part.gcode...")
        );
        assert_eq!(describe(&DeviceEvent::WriteFinished(job())), None);
        assert_eq!(
            describe(&DeviceEvent::WriteError {
                job: job(),
                reason: "server returned 500: disk full".into(),
            })
            .as_deref(),
            Some("Upload failed: server returned 500: disk full")
        );
    }

    #[test]
    fn progress_printed_in_steps() {
        assert_eq!(progress_step(9.9, 0), None);
        assert_eq!(progress_step(50.0, 0), Some(50));
        assert_eq!(progress_step(57.5, 50), None);
        assert_eq!(progress_step(100.0, 90), Some(100));
    }

    #[test]
    fn open_browser_links_consumes_actions() {
        let queue = Mutex::new(NotificationQueue::new());
        {
            let mut q = queue.lock().unwrap();
            q.push(Notification::info("plain"));
            q.push(
                Notification::success("Saved to Shop as part.gcode").with_action(
                    PostAction::OpenBrowser {
                        url: "http://octopi.local".into(),
                    },
                ),
            );
        }

        open_browser_links(&queue);

        let q = queue.lock().unwrap();
        assert_eq!(q.len(), 1);
        assert_eq!(q.iter().next().unwrap().1.title, "plain");
    }
}
