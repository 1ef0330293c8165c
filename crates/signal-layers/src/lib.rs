//! Signal Layers - independent availability heuristics
//!
//! Each layer maps one page snapshot to one `LayerVerdict` and nothing else.
//! Layers never see each other, never perform I/O, and never let a failure
//! escape: a broken selector, malformed JSON-LD or even a panic becomes an
//! `Error` verdict for that layer alone.
//!
//! # Layers
//!
//! - **status-text**: visually hidden `role=status` result announcements (authoritative by default)
//! - **result-count**: visible "N results" counter
//! - **sold-out-banner**: message bar sold-out wording
//! - **structured-metadata**: JSON-LD event offers marked InStock
//! - **listing-block**: presence of the ticket list container
//! - **seat-listing**: seat blocks described by `aria-label`s
//!
//! # Example
//!
//! ```rust
//! use dropwatch_core_types::PageSnapshot;
//! use dropwatch_signal_layers::LayerRegistry;
//!
//! let registry = LayerRegistry::standard();
//! let snapshot = PageSnapshot::captured_now("<html></html>", "inline");
//! let verdicts = registry.evaluate_all(&snapshot);
//! assert_eq!(verdicts.len(), registry.len());
//! ```

pub mod errors;
pub mod html;
pub mod jsonld;
pub mod layers;
pub mod model;
pub mod registry;

pub use errors::LayerError;
pub use layers::{
    ListingBlockLayer, ResultCountLayer, SeatListingLayer, SoldOutBannerLayer, StatusTextLayer,
    StructuredMetadataLayer,
};
pub use model::{
    BannerSettings, Finding, LayerSettings, ListingBlockSettings, ParsedPage, ResultCountSettings,
    SeatListingSettings, StatusTextSettings, StructuredMetadataSettings,
};
pub use registry::{LayerRegistry, SignalExtractor, KNOWN_LAYERS};
