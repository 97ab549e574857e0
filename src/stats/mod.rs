//! Usage statistics storage

pub mod store;

pub use store::{FileStatsStore, MemoryStatsStore, StatsStore, UsageStats};
