//! Demo records loaded before the first connect.

use taskboard_core::model::{Project, ProjectStatus, Task, TaskPriority, TaskStatus};
use taskboard_state::Seed;

const CREATED: &str = "2024-01-08T09:00:00.000Z";

fn project(id: &str, name: &str, status: ProjectStatus, progress: u8, budget: f64) -> Project {
    Project {
        id: id.to_string(),
        name: name.to_string(),
        status,
        start_date: "2024-01-08".to_string(),
        end_date: "2024-06-28".to_string(),
        progress,
        budget,
        description: None,
        manager_id: "2".to_string(),
        team_members: vec!["3".to_string(), "4".to_string()],
        created_at: CREATED.to_string(),
        updated_at: CREATED.to_string(),
    }
}

fn task(id: &str, project_id: &str, title: &str, status: TaskStatus, priority: TaskPriority) -> Task {
    Task {
        status,
        priority,
        assigned_to: Some("3".to_string()),
        created_at: CREATED.to_string(),
        updated_at: CREATED.to_string(),
        ..Task::new(id, project_id, title)
    }
}

/// Two projects with a handful of tasks each.
pub fn demo() -> Seed {
    Seed {
        projects: vec![
            project("1", "Website Redesign", ProjectStatus::InProgress, 45, 50_000.0),
            project("2", "Mobile App Launch", ProjectStatus::Planning, 10, 120_000.0),
        ],
        tasks: vec![
            task("1", "1", "Design homepage mockups", TaskStatus::Done, TaskPriority::High),
            task("2", "1", "Implement navigation", TaskStatus::InProgress, TaskPriority::Medium),
            task("3", "1", "Write landing copy", TaskStatus::Todo, TaskPriority::Low),
            task("4", "2", "Set up push notifications", TaskStatus::Todo, TaskPriority::Critical),
            task("5", "2", "App store listing", TaskStatus::Review, TaskPriority::Medium),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_task_belongs_to_a_seeded_project() {
        let seed = demo();
        for task in &seed.tasks {
            assert!(seed.projects.iter().any(|p| p.id == task.project_id), "{}", task.id);
        }
    }
}
