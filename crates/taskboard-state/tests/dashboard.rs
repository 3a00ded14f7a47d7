//! Consumers merging live traffic from the simulated server.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use parking_lot::Mutex;
use taskboard_core::auth::{Credential, Identity, MemoryCredentialStore, Role};
use taskboard_core::events::{Event, EventBody, EventKind, ProjectUpdate, TaskRef, TaskUpdate};
use taskboard_core::model::{Project, ProjectPatch, ProjectStatus, Task, TaskPatch, TaskStatus};
use taskboard_realtime::{
    ChannelConfig, ChannelError, ConnectionState, EventChannel, SimulatedConfig, SimulatedTransport,
    Subscription,
};
use taskboard_state::{Dashboard, EditError, IndicatorStatus, Seed, TaskList, TaskScope};
use tokio::time::sleep;

const ECHO: Duration = Duration::from_millis(100);
const TICK: Duration = Duration::from_millis(1);

struct Harness {
    dashboard: Dashboard,
    transport: Arc<SimulatedTransport>,
}

fn seed() -> Seed {
    Seed {
        projects: vec![
            Project {
                id: "p1".into(),
                name: "Website Redesign".into(),
                ..Project::default()
            },
            Project {
                id: "p2".into(),
                name: "Mobile App".into(),
                ..Project::default()
            },
        ],
        tasks: vec![
            Task::new("a", "p1", "Wireframes"),
            Task::new("b", "p1", "Copy"),
            Task::new("c", "p2", "Push notifications"),
        ],
    }
}

fn credential() -> Credential {
    Credential::new("token-for-user-3")
}

fn harness_with(sim: SimulatedConfig, capacity: usize) -> Harness {
    let transport = Arc::new(SimulatedTransport::new(sim));
    let store = Arc::new(MemoryCredentialStore::signed_in(
        credential(),
        Identity::new("3", Role::Developer),
    ));
    let channel = EventChannel::new(transport.clone(), store, ChannelConfig::default());
    Harness {
        dashboard: Dashboard::init(channel, seed(), capacity),
        transport,
    }
}

fn harness() -> Harness {
    harness_with(SimulatedConfig::default().without_presence(), 20)
}

async fn connected() -> Harness {
    let h = harness();
    let _ = h.dashboard.connect(credential()).unwrap();
    h.dashboard.channel().wait_until_connected().await.unwrap();
    h
}

fn recorder(channel: &EventChannel) -> (Subscription, Arc<Mutex<Vec<Event>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = channel.subscribe(move |event| {
        sink.lock().push(event.clone());
        Ok(())
    });
    (sub, seen)
}

fn task_update(task_id: &str, title: &str, at: i64) -> Event {
    EventBody::TaskUpdated(TaskUpdate {
        project_id: "p1".into(),
        task_id: task_id.into(),
        updates: TaskPatch {
            title: Some(title.into()),
            ..TaskPatch::default()
        },
    })
    .stamp(at, "8")
}

fn task_ids(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|t| t.id.as_str()).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Optimistic edits + echo
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn created_task_is_echoed_once_and_not_duplicated() {
    let h = connected().await;
    let (_sub, seen) = recorder(h.dashboard.channel());

    let sent = h
        .dashboard
        .tasks
        .create_task(Task::new("t1", "p1", "X"))
        .unwrap();
    assert_eq!(sent.origin_id, "3");
    assert_eq!(h.dashboard.tasks.get("t1").map(|t| t.title), Some("X".into()));

    sleep(ECHO + TICK).await;

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind(), EventKind::TaskCreated);
    assert_eq!(seen[0].origin_id, "3");

    let tasks = h.dashboard.tasks.snapshot();
    assert_eq!(tasks.iter().filter(|t| t.id == "t1").count(), 1);
    assert_eq!(task_ids(&tasks), ["a", "b", "c", "t1"]);
    assert_eq!(
        h.dashboard.activity.latest().map(|e| e.message),
        Some("Created task: X".into())
    );
}

#[tokio::test(start_paused = true)]
async fn update_echo_does_not_change_result() {
    let h = connected().await;
    let _ = h
        .dashboard
        .tasks
        .update_task("a", TaskPatch::status(TaskStatus::Review))
        .unwrap();
    let local = h.dashboard.tasks.get("a").unwrap();

    sleep(ECHO + TICK).await;

    let echoed = h.dashboard.tasks.get("a").unwrap();
    assert_eq!(echoed.status, TaskStatus::Review);
    assert_eq!(echoed.title, local.title);
    assert_eq!(h.dashboard.activity.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn project_update_applies_locally_and_round_trips() {
    let h = connected().await;
    let patch = ProjectPatch {
        status: Some(ProjectStatus::InProgress),
        progress: Some(140),
        ..ProjectPatch::default()
    };
    let _ = h.dashboard.projects.update_project("p1", patch).unwrap();

    let p1 = h.dashboard.projects.get("p1").unwrap();
    assert_eq!(p1.status, ProjectStatus::InProgress);
    assert_eq!(p1.progress, 100);

    sleep(ECHO + TICK).await;
    assert_eq!(
        h.dashboard.activity.latest().map(|e| e.message),
        Some("Updated project: p1".into())
    );
    assert_matches!(
        h.dashboard.projects.update_project("p9", ProjectPatch::default()),
        Err(EditError::UnknownProject(id)) if id == "p9"
    );
}

#[tokio::test(start_paused = true)]
async fn delete_removes_and_echo_is_noop() {
    let h = connected().await;
    let _ = h.dashboard.tasks.delete_task("b").unwrap();
    assert_eq!(task_ids(&h.dashboard.tasks.snapshot()), ["a", "c"]);

    sleep(ECHO + TICK).await;
    assert_eq!(task_ids(&h.dashboard.tasks.snapshot()), ["a", "c"]);
    assert_eq!(
        h.dashboard.activity.latest().map(|e| e.message),
        Some("Deleted a task".into())
    );
    assert_matches!(h.dashboard.tasks.delete_task("b"), Err(EditError::UnknownTask(_)));
}

#[tokio::test(start_paused = true)]
async fn bulk_update_sends_one_event_per_task() {
    let h = connected().await;
    let (_sub, seen) = recorder(h.dashboard.channel());
    let ids = vec!["a".to_string(), "ghost".to_string(), "c".to_string()];

    let result = h
        .dashboard
        .tasks
        .bulk_update(&ids, &TaskPatch::status(TaskStatus::Done));

    assert_eq!(result.sent.len(), 2);
    assert_eq!(result.failed.len(), 1);
    assert_matches!(&result.failed[0], (id, EditError::UnknownTask(_)) if id == "ghost");
    assert!(!result.is_complete());
    for id in ["a", "c"] {
        assert_eq!(h.dashboard.tasks.get(id).unwrap().status, TaskStatus::Done);
    }

    sleep(ECHO + TICK).await;
    let seen = seen.lock();
    let targets: Vec<_> = seen
        .iter()
        .map(|e| match &e.body {
            EventBody::TaskUpdated(u) => u.task_id.clone(),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(targets, ["a", "c"]);
}

#[tokio::test(start_paused = true)]
async fn failed_send_keeps_local_edit() {
    let h = harness();
    let err = h
        .dashboard
        .tasks
        .update_task("a", TaskPatch::status(TaskStatus::InProgress))
        .unwrap_err();

    assert_matches!(
        err,
        EditError::Send(ChannelError::NotConnected {
            state: ConnectionState::Disconnected
        })
    );
    assert!(err.applied_locally());
    assert_eq!(h.dashboard.tasks.get("a").unwrap().status, TaskStatus::InProgress);
    assert!(h.dashboard.activity.is_empty());
}

#[tokio::test(start_paused = true)]
async fn duplicate_create_is_rejected_before_send() {
    let h = connected().await;
    assert_matches!(
        h.dashboard.tasks.create_task(Task::new("a", "p1", "again")),
        Err(EditError::DuplicateTask(id)) if id == "a"
    );
    sleep(ECHO + TICK).await;
    assert!(h.dashboard.activity.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Remote traffic
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn out_of_order_updates_keep_newest() {
    let h = connected().await;
    assert!(h.transport.inject(task_update("a", "second", 2_000)));
    assert!(h.transport.inject(task_update("a", "first", 1_000)));
    sleep(TICK).await;

    assert_eq!(h.dashboard.tasks.get("a").unwrap().title, "second");
    // Both still reach the feed.
    assert_eq!(h.dashboard.activity.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn repeated_delete_equals_single_delete() {
    let h = connected().await;
    let delete = EventBody::TaskDeleted(TaskRef {
        project_id: "p1".into(),
        task_id: "a".into(),
    })
    .stamp(5_000, "8");
    assert!(h.transport.inject(delete.clone()));
    sleep(TICK).await;
    let once = h.dashboard.tasks.snapshot();

    assert!(h.transport.inject(delete));
    sleep(TICK).await;
    assert_eq!(h.dashboard.tasks.snapshot(), once);
    assert_eq!(task_ids(&once), ["b", "c"]);
}

#[tokio::test(start_paused = true)]
async fn create_after_delete_restores_task() {
    let h = connected().await;
    let _ = h.dashboard.tasks.delete_task("a").unwrap();
    sleep(ECHO + TICK).await;

    assert!(h.transport.inject(EventBody::TaskCreated(Task::new("a", "p1", "Wireframes v2")).stamp(9_000, "8")));
    sleep(TICK).await;
    assert_eq!(task_ids(&h.dashboard.tasks.snapshot()), ["b", "c", "a"]);
}

#[tokio::test(start_paused = true)]
async fn scoped_list_ignores_other_projects() {
    let h = connected().await;
    let p2 = h.dashboard.project_tasks("p2");
    assert_eq!(p2.scope(), TaskScope::Project("p2".into()));
    assert_eq!(task_ids(&p2.snapshot()), ["c"]);

    assert!(h.transport.inject(EventBody::TaskCreated(Task::new("d", "p1", "Footer")).stamp(1, "8")));
    assert!(h.transport.inject(EventBody::TaskCreated(Task::new("e", "p2", "Deep links")).stamp(2, "8")));
    sleep(TICK).await;

    assert_eq!(task_ids(&p2.snapshot()), ["c", "e"]);
    assert!(h.dashboard.tasks.get("d").is_some());
    assert_matches!(
        p2.create_task(Task::new("f", "p1", "Elsewhere")),
        Err(EditError::OutOfScope(project)) if project == "p1"
    );
}

#[tokio::test(start_paused = true)]
async fn scoped_list_inherits_applied_timestamps() {
    let h = connected().await;
    assert!(h.transport.inject(task_update("a", "newest", 2_000)));
    sleep(TICK).await;

    let p1 = h.dashboard.project_tasks("p1");
    assert!(h.transport.inject(task_update("a", "stale", 1_000)));
    sleep(TICK).await;

    assert_eq!(h.dashboard.tasks.get("a").unwrap().title, "newest");
    assert_eq!(p1.get("a").unwrap().title, "newest");
    assert_eq!(task_ids(&p1.snapshot()), ["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn project_updates_from_others_merge_by_timestamp() {
    let h = connected().await;
    let rename = |name: &str, at: i64| {
        EventBody::ProjectUpdated(ProjectUpdate {
            id: "p2".into(),
            updates: ProjectPatch {
                name: Some(name.into()),
                ..ProjectPatch::default()
            },
        })
        .stamp(at, "5")
    };
    assert!(h.transport.inject(rename("Mobile App 2", 20)));
    assert!(h.transport.inject(rename("Stale", 10)));
    sleep(TICK).await;

    assert_eq!(h.dashboard.projects.get("p2").unwrap().name, "Mobile App 2");
    assert_eq!(
        h.dashboard.activity.entries()[1].message,
        "Updated project: Mobile App 2"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Activity + indicator
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn activity_log_is_capped() {
    let h = harness_with(SimulatedConfig::default().without_presence(), 3);
    let _ = h.dashboard.connect(credential()).unwrap();
    h.dashboard.channel().wait_until_connected().await.unwrap();

    for (i, at) in (1..=5).enumerate() {
        assert!(h.transport.inject(task_update("a", &format!("v{i}"), at)));
    }
    sleep(TICK).await;

    let stamps: Vec<_> = h.dashboard.activity.entries().iter().map(|e| e.timestamp).collect();
    assert_eq!(stamps, [5, 4, 3]);
    assert_eq!(h.dashboard.activity.capacity(), 3);
}

#[tokio::test(start_paused = true)]
async fn presence_reaches_only_the_activity_log() {
    let h = harness_with(SimulatedConfig::default(), 20);
    let _ = h.dashboard.connect(credential()).unwrap();
    h.dashboard.channel().wait_until_connected().await.unwrap();
    let before = h.dashboard.tasks.snapshot();

    sleep(Duration::from_secs(10) + TICK).await;

    let entry = h.dashboard.activity.latest().unwrap();
    assert_eq!(entry.kind, EventKind::PresenceActivity);
    assert_eq!(entry.origin_id, "simulated-user");
    assert!(entry.message.starts_with("viewing project "));
    assert_eq!(h.dashboard.tasks.snapshot(), before);
}

#[tokio::test(start_paused = true)]
async fn indicator_follows_connection() {
    let mut h = harness();
    assert_eq!(h.dashboard.indicator.status(), IndicatorStatus::Offline);
    assert_eq!(h.dashboard.indicator.last_event_at(), None);

    let _ = h.dashboard.connect(credential()).unwrap();
    assert_eq!(h.dashboard.indicator.render(), "Connecting...");
    assert_eq!(h.dashboard.indicator.changed().await, Some(IndicatorStatus::Connecting));
    assert_eq!(h.dashboard.indicator.changed().await, Some(IndicatorStatus::Live));

    assert!(h.transport.inject(task_update("a", "seen", 42)));
    sleep(TICK).await;
    assert_eq!(h.dashboard.indicator.last_event_at(), Some(42));

    // A later arrival with an earlier stamp still counts as the last event.
    assert!(h.transport.inject(task_update("b", "skewed", 10)));
    sleep(TICK).await;
    assert_eq!(h.dashboard.indicator.last_event_at(), Some(10));

    h.dashboard.channel().disconnect();
    assert_eq!(h.dashboard.indicator.render(), "Offline");
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn teardown_shuts_channel_and_keeps_final_view() {
    let h = connected().await;
    let channel = h.dashboard.channel().clone();
    let _ = h.dashboard.tasks.create_task(Task::new("t1", "p1", "X")).unwrap();
    sleep(ECHO + TICK).await;

    let summary = h.dashboard.teardown();
    assert_eq!(summary.connection, ConnectionState::Disconnected);
    assert_eq!(summary.tasks.len(), 4);
    assert_eq!(summary.activity.len(), 1);
    assert_eq!(channel.subscriber_count(), 0);
    assert_matches!(channel.connect(credential()), Err(ChannelError::ShutDown));
}

#[tokio::test(start_paused = true)]
async fn two_dashboards_share_nothing() {
    let a = connected().await;
    let b = connected().await;
    let _ = a.dashboard.tasks.create_task(Task::new("only-a", "p1", "A")).unwrap();
    sleep(ECHO + TICK).await;

    assert!(a.dashboard.tasks.get("only-a").is_some());
    assert!(b.dashboard.tasks.get("only-a").is_none());
    assert!(b.dashboard.activity.is_empty());
}

#[tokio::test(start_paused = true)]
async fn detached_list_stops_merging() {
    let h = connected().await;
    let list = TaskList::attach(h.dashboard.channel(), TaskScope::All, seed().tasks);
    assert!(list.detach());
    assert!(!list.is_subscribed());

    assert!(h.transport.inject(EventBody::TaskCreated(Task::new("z", "p1", "Late")).stamp(1, "8")));
    sleep(TICK).await;
    assert!(list.get("z").is_none());
    assert!(h.dashboard.tasks.get("z").is_some());
}
