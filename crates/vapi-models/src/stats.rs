//! Aggregate queue statistics.

use serde::{Deserialize, Serialize};

use crate::task::TaskStatus;

/// Number of task records in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub queued: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl StatusCounts {
    /// Count one more record with the given status.
    pub fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Queued => self.queued += 1,
            TaskStatus::Processing => self.processing += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }

    pub fn get(&self, status: TaskStatus) -> u64 {
        match status {
            TaskStatus::Queued => self.queued,
            TaskStatus::Processing => self.processing,
            TaskStatus::Completed => self.completed,
            TaskStatus::Failed => self.failed,
        }
    }
}

/// Snapshot returned by `get_queue_stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// References still waiting in the work queue
    pub queue_length: u64,
    /// Task records present in the store
    pub total_tasks: u64,
    /// Task records grouped by status
    pub tasks_by_status: StatusCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_counts_record() {
        let mut counts = StatusCounts::default();
        counts.record(TaskStatus::Queued);
        counts.record(TaskStatus::Failed);
        counts.record(TaskStatus::Failed);

        assert_eq!(counts.get(TaskStatus::Queued), 1);
        assert_eq!(counts.get(TaskStatus::Processing), 0);
        assert_eq!(counts.failed, 2);
    }
}
