//! omix-client: network side of the omix result viewer.
//!
//! - [`ApiClient`]: authenticated, cancellable HTTP calls and typed endpoints.
//! - [`ResultTableSession`]: background task owning the open result tabs.
//! - [`DetailsSession`]: concurrent loading of the details panels of one row.
//! - [`Notifier`]: websocket push channel with reconnect and per-command
//!   debounce.

pub mod api;
pub mod backoff;
pub mod debounce;
pub mod details;
pub mod http;
pub mod notifier;
pub mod session;

pub use details::{AnalysisSource, DetailsSession, PanelCompletion};
pub use http::ApiClient;
pub use notifier::{parse_command, Notifier, UPDATE_EXPERIMENTS};
pub use session::{ResultSource, ResultTableSession, SessionEvent};
