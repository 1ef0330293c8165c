//! Concrete signal layers. Each one is independent: adding or removing a layer
//! never touches the others, the registry's callers, or the fusion policy.

mod listing_block;
mod result_count;
mod seat_listing;
mod sold_out_banner;
mod status_text;
mod structured_metadata;

pub use listing_block::ListingBlockLayer;
pub use result_count::ResultCountLayer;
pub use seat_listing::SeatListingLayer;
pub use sold_out_banner::SoldOutBannerLayer;
pub use status_text::StatusTextLayer;
pub use structured_metadata::StructuredMetadataLayer;
