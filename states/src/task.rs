//! Task identities and cooperative cancellation.
//!
//! Long-running work such as an upload batch is tracked by a `TaskHandle`.
//! Cloning a handle shares its token, so any clone can stop the work.
//!
//! ```ignore
//! let ids = TaskIdGenerator::default();
//! let batch = TaskHandle::new(ids.next("upload_batch"));
//! let stop = batch.cancellation_token().cancelled_owned();
//!
//! batch.cancel();
//! assert!(batch.is_cancelled());
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Identifies one spawned task.
///
/// `label` names the kind of work, `generation` distinguishes successive
/// tasks of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId {
    label: &'static str,
    generation: u64,
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.label, self.generation)
    }
}

/// Hands out monotonically increasing generations.
#[derive(Debug, Default)]
pub struct TaskIdGenerator {
    next: AtomicU64,
}

impl TaskIdGenerator {
    pub fn next(&self, label: &'static str) -> TaskId {
        let generation = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        TaskId { label, generation }
    }
}

/// A task identity paired with its cancellation token.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    cancel_token: CancellationToken,
}

impl TaskHandle {
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Requests cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}
