// src/memory/mod.rs — Goal summary persistence

pub mod queue;
pub mod summary;

pub use queue::{QueuePolicy, SummaryQueue};
pub use summary::{GoalSummary, JsonlSummaryStore, MemorySummaryStore, SummaryStore};
