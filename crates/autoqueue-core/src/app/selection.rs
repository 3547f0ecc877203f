//! Backlog selection: which task the queue starts next.
//!
//! Pure functions, no I/O.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::domain::Task;

/// Highest priority weight first, then oldest `created_at` first.
///
/// Tasks without a creation time sort after dated ones in the same band.
/// Remaining ties keep the store's order.
pub fn select_next_task(tasks: &[Task]) -> Option<&Task> {
    tasks
        .iter()
        .filter(|task| task.status.is_backlog())
        .min_by(|a, b| queue_order(a, b))
}

/// Ordering used by [`select_next_task`]. `Less` means "runs earlier".
pub fn queue_order(a: &Task, b: &Task) -> Ordering {
    b.priority_weight()
        .cmp(&a.priority_weight())
        .then_with(|| created_order(a.metadata.created_at, b.metadata.created_at))
}

fn created_order(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProjectId, SpecId, TaskId, TaskPriority, TaskStatus};
    use chrono::{Duration, TimeZone};

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn task(id: &str, status: TaskStatus) -> Task {
        Task::new(
            TaskId::new(id),
            SpecId::new(id),
            ProjectId::new("p1"),
            id,
            status,
        )
    }

    #[test]
    fn oldest_of_the_highest_priority_band_wins() {
        let tasks = vec![
            task("low-t1", TaskStatus::Backlog)
                .with_priority(TaskPriority::Low)
                .with_created_at(t(1)),
            task("high-t2", TaskStatus::Backlog)
                .with_priority(TaskPriority::High)
                .with_created_at(t(2)),
            task("high-t0", TaskStatus::Backlog)
                .with_priority(TaskPriority::High)
                .with_created_at(t(0)),
        ];

        let next = select_next_task(&tasks).unwrap();
        assert_eq!(next.id, TaskId::new("high-t0"));
    }

    #[test]
    fn only_backlog_tasks_are_candidates() {
        let tasks = vec![
            task("running", TaskStatus::InProgress).with_priority(TaskPriority::Urgent),
            task("review", TaskStatus::HumanReview).with_priority(TaskPriority::Urgent),
            task("waiting", TaskStatus::Backlog).with_priority(TaskPriority::Low),
        ];

        let next = select_next_task(&tasks).unwrap();
        assert_eq!(next.id, TaskId::new("waiting"));
    }

    #[test]
    fn no_backlog_selects_nothing() {
        let tasks = vec![task("done", TaskStatus::Done)];
        assert!(select_next_task(&tasks).is_none());
        assert!(select_next_task(&[]).is_none());
    }

    #[test]
    fn unset_priority_runs_after_low() {
        let tasks = vec![
            task("unset", TaskStatus::Backlog).with_created_at(t(0)),
            task("low", TaskStatus::Backlog)
                .with_priority(TaskPriority::Low)
                .with_created_at(t(5)),
        ];

        assert_eq!(select_next_task(&tasks).unwrap().id, TaskId::new("low"));
    }

    #[test]
    fn undated_tasks_sort_after_dated_ones_and_keep_store_order() {
        let tasks = vec![
            task("undated-a", TaskStatus::Backlog).with_priority(TaskPriority::Medium),
            task("undated-b", TaskStatus::Backlog).with_priority(TaskPriority::Medium),
            task("dated", TaskStatus::Backlog)
                .with_priority(TaskPriority::Medium)
                .with_created_at(t(30)),
        ];

        assert_eq!(select_next_task(&tasks).unwrap().id, TaskId::new("dated"));
        assert_eq!(
            select_next_task(&tasks[..2]).unwrap().id,
            TaskId::new("undated-a")
        );
    }
}
