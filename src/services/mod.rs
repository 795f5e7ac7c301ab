//! Service layer for the watcher application.
//!
//! This module contains the business logic for:
//! - Concurrent page fetching (`PageFetcher`)
//! - Subscription resolution (`SubscriptionResolver`)

mod fetcher;
mod subscriptions;

pub use fetcher::{FetchFailure, PageFetcher, SnapshotResult};
pub use subscriptions::{SubscriptionMap, SubscriptionResolver};
