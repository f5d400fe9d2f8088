//! State publishing and task plumbing shared by the file picker crates.

mod state;
mod task;

pub use state::{State, StateReader, StateUpdater, state_channel};
pub use task::{TaskHandle, TaskId, TaskIdGenerator};
