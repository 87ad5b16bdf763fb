//! monitorctl: diagnostics CLI for the contact monitor engine.
//!
//! Drives the engine against a JSON contact-list file standing in for the
//! device contact store, which makes the whole detection path exercisable
//! on a dev machine: edit the file, run `check` (or `watch`), and watch
//! detections route.
//!
//! ## Subcommands
//!
//! - `check`: one detection pass
//! - `start` / `stop`: toggle persisted monitoring
//! - `status`: print the engine snapshot as JSON
//! - `watch`: run the polling loop in the foreground for a while
//! - `test-notification`: route one synthetic contact
//! - `reset`: forget all known contacts

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use contact_monitor::{
    FileSnapshotSource, LogNotificationDispatcher, MonitorConfig, MonitorError, MonitorService,
    NoopRegistrar, PendingContact, StoragePaths,
};

#[derive(Parser)]
#[command(name = "monitorctl")]
#[command(about = "Context CRM contact monitor diagnostics")]
#[command(version)]
struct Cli {
    /// Storage root (default: ~/.context-crm/monitor)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Contact list file (default: <root>/contacts.json)
    #[arg(long, global = true)]
    contacts: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one detection pass against the contact list
    Check,

    /// Enable monitoring (persisted; auto-resumes on next run)
    Start,

    /// Disable monitoring (persisted)
    Stop,

    /// Print the engine status snapshot as JSON
    Status,

    /// Poll in the foreground for a while, logging every detection
    Watch {
        /// How long to keep polling
        #[arg(long, default_value_t = 60)]
        seconds: u64,

        /// Poll interval in seconds
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },

    /// Route one synthetic contact through the notification path
    TestNotification,

    /// Forget all known contacts and queued detections
    Reset,
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        tracing::error!(error = %err, "monitorctl failed");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: Cli) -> Result<(), MonitorError> {
    let paths = match cli.root {
        Some(root) => StoragePaths::with_root(root),
        None => StoragePaths::resolve()?,
    };
    let contacts_path = cli
        .contacts
        .unwrap_or_else(|| paths.contacts_fixture_file());

    let mut config = MonitorConfig::default();
    if let Commands::Watch { interval, .. } = &cli.command {
        config.steady_interval = Duration::from_secs((*interval).max(1));
    }

    let service = MonitorService::new(
        Arc::new(FileSnapshotSource::new(contacts_path)),
        Arc::new(LogNotificationDispatcher),
        Arc::new(NoopRegistrar),
        paths,
        config,
    );
    service.set_navigation_callback(Arc::new(|contact: PendingContact| {
        info!(
            id = %contact.id,
            name = ?contact.name,
            phone = ?contact.phone,
            "Would open capture screen"
        );
    }));

    match cli.command {
        Commands::Check => {
            service.initialize()?;
            service.check_for_new_contacts()?;
            print_status(&service)?;
        }
        Commands::Start => {
            service.initialize()?;
            service.start_monitoring()?;
            // The polling thread stops when the service drops; the
            // persisted flag makes the next run auto-resume.
            info!("Monitoring enabled");
        }
        Commands::Stop => {
            service.stop_monitoring();
            // stop_monitoring persisted false; report the resulting state.
            info!(enabled = service.monitoring_state(), "Monitoring disabled");
        }
        Commands::Status => {
            service.initialize()?;
            print_status(&service)?;
        }
        Commands::Watch { seconds, .. } => {
            service.initialize()?;
            service.start_monitoring()?;
            info!(seconds, "Watching for contact changes");
            thread::sleep(Duration::from_secs(seconds));
        }
        Commands::TestNotification => {
            service.initialize()?;
            service.test_notification()?;
        }
        Commands::Reset => {
            service.initialize()?;
            service.reset()?;
            info!("Known contacts cleared");
        }
    }
    Ok(())
}

fn print_status(service: &MonitorService) -> Result<(), MonitorError> {
    let status = service.status();
    let rendered =
        serde_json::to_string_pretty(&status).map_err(|source| MonitorError::Serialization {
            context: "status snapshot".to_string(),
            source,
        })?;
    println!("{}", rendered);
    Ok(())
}
