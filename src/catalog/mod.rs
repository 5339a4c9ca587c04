//! Remote collection model: item descriptors, paginated listing and asset
//! variant selection.

mod item;
mod paginator;
mod select;

pub use item::{AssetReference, ItemDescriptor};
pub use paginator::{Listing, MAX_PAGE_SIZE, Page, Paginator};
pub use select::{TIER_PRIORITY, select_best};
