//! Fetching side of the dashboard: the HTTP client for the three services,
//! the per-feed refresh scheduler, and the [`Dashboard`] that owns state
//! and applies what the scheduler delivers.

pub mod client;
pub mod dashboard;
pub mod error;
pub mod refresh;
pub mod source;

pub use client::DashboardClient;
pub use dashboard::{Applied, Dashboard};
pub use error::{FetchError, Result};
pub use refresh::{RefreshHandle, RefreshIntervals, RefreshScheduler, StopResult};
pub use source::DashboardSource;
