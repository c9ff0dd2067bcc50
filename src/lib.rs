//! Focus dashboard client core.
//!
//! Fetches work contexts, ranked tasks, cognitive load, insights and
//! recommendations from the dashboard backend for the signed-in user, keeps
//! every panel current, and drives Google account linking.

pub mod api;
pub mod config;
pub mod error;
pub mod google_link;
pub mod identity;
pub mod panels;
pub mod refresh;
pub mod session;
pub mod types;

#[cfg(test)]
mod testing;

pub use api::client::HttpApiClient;
pub use api::DashboardApi;
pub use config::{load_config, Config};
pub use error::{ApiError, LinkError};
pub use identity::IdentitySource;
pub use refresh::RefreshBroadcaster;
pub use session::{DashboardSession, Navigator};
