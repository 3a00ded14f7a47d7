//! # taskboard
//!
//! Dashboard binary: wires settings, logging, the simulated server, the
//! event channel and the dashboard consumers, then runs a scripted edit
//! session and prints what the dashboard ended up showing.

#![deny(unsafe_code)]

mod seed;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use taskboard_core::auth::{Credential, DEFAULT_TOKEN_TTL_MS, Identity, MemoryCredentialStore, Role};
use taskboard_core::events::{Event, now_ms};
use taskboard_core::logging::init_subscriber;
use taskboard_core::model::{ProjectPatch, ProjectStatus, Task, TaskPatch, TaskPriority, TaskStatus};
use taskboard_realtime::{ChannelConfig, EventChannel, SimulatedConfig, SimulatedTransport};
use taskboard_settings::{TaskboardSettings, load_settings_from_path, settings_path};
use taskboard_state::{Dashboard, EditError, TaskList};
use tracing::{info, warn};

/// Taskboard real-time dashboard session.
#[derive(Parser, Debug)]
#[command(name = "taskboard", about = "Run a scripted real-time dashboard session")]
struct Cli {
    /// Identity to sign in as.
    #[arg(long, default_value = "3")]
    user_id: String,

    /// Role of the signed-in identity (developer, project-manager, admin).
    #[arg(long, default_value = "developer")]
    role: Role,

    /// Settings file (defaults to `~/.taskboard/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level (overrides settings; `RUST_LOG` still wins).
    #[arg(long)]
    log_level: Option<String>,

    /// Seconds to keep listening after the scripted edits.
    #[arg(long, default_value_t = 2)]
    run_for_secs: u64,
}

impl Cli {
    fn load_settings(&self) -> Result<TaskboardSettings> {
        let path = self.settings.clone().unwrap_or_else(settings_path);
        let mut settings = load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        Ok(settings)
    }
}

fn report(step: &str, result: Result<Event, EditError>) {
    match result {
        Ok(_) => info!(step, "edit sent"),
        Err(err) if err.applied_locally() => warn!(step, error = %err, "edit kept locally, not sent"),
        Err(err) => warn!(step, error = %err, "edit rejected"),
    }
}

/// Create, update, bulk update, delete, then touch a project.
fn scripted_session(dashboard: &Dashboard) {
    let project_id = dashboard
        .projects
        .snapshot()
        .first()
        .map(|p| p.id.clone())
        .unwrap_or_default();

    let task = Task {
        priority: TaskPriority::High,
        ..Task::new(
            TaskList::next_task_id(),
            project_id.clone(),
            "Review real-time sync",
        )
    };
    let new_id = task.id.clone();
    report("create", dashboard.tasks.create_task(task));

    report(
        "update",
        dashboard
            .tasks
            .update_task(&new_id, TaskPatch::status(TaskStatus::InProgress)),
    );

    let open: Vec<String> = dashboard
        .tasks
        .snapshot()
        .into_iter()
        .filter(|t| t.project_id == project_id && t.status == TaskStatus::Todo)
        .map(|t| t.id)
        .collect();
    let bulk = dashboard
        .tasks
        .bulk_update(&open, &TaskPatch::status(TaskStatus::Review));
    for (id, err) in &bulk.failed {
        warn!(task_id = %id, error = %err, "bulk update entry failed");
    }
    info!(sent = bulk.sent.len(), failed = bulk.failed.len(), "bulk update");

    report("delete", dashboard.tasks.delete_task(&new_id));

    report(
        "project",
        dashboard.projects.update_project(
            &project_id,
            ProjectPatch {
                status: Some(ProjectStatus::InProgress),
                progress: Some(60),
                ..ProjectPatch::default()
            },
        ),
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings = args.load_settings()?;
    init_subscriber(&settings.logging.level, settings.logging.format);
    info!(user_id = %args.user_id, role = %args.role, "starting taskboard");

    let credential = Credential::new(format!("demo-token-{}", args.user_id));
    let store = Arc::new(MemoryCredentialStore::new());
    store.sign_in(
        credential.clone(),
        Identity::new(args.user_id.clone(), args.role),
        Some(now_ms() + DEFAULT_TOKEN_TTL_MS),
    );

    let transport = Arc::new(SimulatedTransport::new(SimulatedConfig::from_settings(&settings)));
    let channel = EventChannel::new(transport, store, ChannelConfig::from_settings(&settings));
    let dashboard = Dashboard::init(channel, seed::demo(), settings.feed.activity_capacity);

    let _ = dashboard.connect(credential).context("Failed to start connecting")?;
    if let Err(err) = dashboard.channel().wait_until_connected().await {
        warn!(error = %err, "channel did not connect; edits stay local");
    }

    scripted_session(&dashboard);

    tokio::select! {
        () = tokio::time::sleep(Duration::from_secs(args.run_for_secs)) => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            info!("interrupted");
        }
    }

    let summary = dashboard.teardown();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard_realtime::ConnectionState;

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["taskboard"]).unwrap();
        assert_eq!(cli.user_id, "3");
        assert_eq!(cli.role, Role::Developer);
        assert_eq!(cli.run_for_secs, 2);
        assert!(cli.settings.is_none());
    }

    #[test]
    fn cli_parses_role_aliases() {
        let cli = Cli::try_parse_from(["taskboard", "--role", "pm", "--user-id", "2"]).unwrap();
        assert_eq!(cli.role, Role::ProjectManager);
        assert!(Cli::try_parse_from(["taskboard", "--role", "intern"]).is_err());
    }

    #[test]
    fn log_level_flag_overrides_settings() {
        let dir = std::env::temp_dir().join(format!("taskboard-cli-{}", std::process::id()));
        let cli = Cli::try_parse_from([
            "taskboard",
            "--settings",
            dir.join("missing.json").to_str().unwrap(),
            "--log-level",
            "debug",
        ])
        .unwrap();
        let settings = cli.load_settings().unwrap();
        assert_eq!(settings.logging.level, "debug");
    }

    #[tokio::test(start_paused = true)]
    async fn scripted_session_leaves_consistent_view() {
        let store = Arc::new(MemoryCredentialStore::signed_in(
            Credential::new("t"),
            Identity::new("3", Role::Developer),
        ));
        let transport = Arc::new(SimulatedTransport::new(SimulatedConfig::default().without_presence()));
        let channel = EventChannel::new(transport, store, ChannelConfig::default());
        let dashboard = Dashboard::init(channel, seed::demo(), 20);
        let _ = dashboard.connect(Credential::new("t")).unwrap();
        dashboard.channel().wait_until_connected().await.unwrap();

        scripted_session(&dashboard);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let summary = dashboard.teardown();
        assert_eq!(summary.connection, ConnectionState::Disconnected);
        // The created task was deleted again.
        assert_eq!(summary.tasks.len(), seed::demo().tasks.len());
        let landing = summary.tasks.iter().find(|t| t.id == "3").unwrap();
        assert_eq!(landing.status, TaskStatus::Review);
        assert_eq!(summary.projects[0].progress, 60);
        // create, update, one bulk entry, delete, project
        assert_eq!(summary.activity.len(), 5);
        assert_eq!(summary.activity[0].message, "Updated project: 1");
    }
}
