//! Page fetching for dropwatch.
//!
//! The [`Fetcher`] trait is what the poll loop drives; [`ChromiumFetcher`]
//! renders real pages through chromiumoxide. With the `testing` feature,
//! [`ScriptedFetcher`] replays canned outcomes for loop tests.

pub mod chromium;
pub mod config;
pub mod errors;
pub mod fetcher;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;
pub mod session;

pub use chromium::ChromiumFetcher;
pub use config::{detect_chrome_executable, FetcherConfig};
pub use errors::FetchError;
pub use fetcher::Fetcher;
#[cfg(any(test, feature = "testing"))]
pub use scripted::{FetchCall, ScriptedFetcher};
pub use session::{AcquireOptions, MarkerWait, SessionHandle};

/// Default readiness marker: the JSON-LD block the metadata layer reads.
pub const DEFAULT_MARKER: &str = "script[type=\"application/ld+json\"]";
