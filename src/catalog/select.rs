//! Best-variant selection among the asset references of an item.
//!
//! Two descriptor shapes are understood:
//!
//! ```text
//! { "media": { "images": { "orig": {"url": ..}, "large": {"url": ..}, ... } } }   // tiered
//! { "images": { "600x": {"url": .., "width": 600}, "150x": {...}, ... } }        // flat
//! ```
//!
//! The tiered shape wins whenever it yields a URL. Otherwise the flat map is
//! scanned for the widest entry; ties keep the entry seen first in document
//! order.

use serde_json::Value;
use tracing::trace;

use super::item::{AssetReference, ItemDescriptor};

/// Size tiers in descending preference.
pub const TIER_PRIORITY: [&str; 5] = ["orig", "xlarge", "large", "medium", "small"];

/// Picks the single best asset of `item`, or `None` when it has no usable URL.
#[must_use]
pub fn select_best(item: &ItemDescriptor) -> Option<AssetReference> {
    select_tiered(item).or_else(|| select_widest(item))
}

fn select_tiered(item: &ItemDescriptor) -> Option<AssetReference> {
    let images = item
        .get("media")
        .and_then(|media| media.get("images"))
        .and_then(Value::as_object)?;

    TIER_PRIORITY.iter().find_map(|tier| {
        let asset = images
            .get(*tier)
            .and_then(|entry| AssetReference::from_value(tier, entry))?;
        trace!(item_id = %item.id(), tier, "selected tiered asset");
        Some(asset)
    })
}

fn select_widest(item: &ItemDescriptor) -> Option<AssetReference> {
    let images = item.get("images").and_then(Value::as_object)?;

    let mut best: Option<AssetReference> = None;
    for (key, entry) in images {
        let Some(candidate) = AssetReference::from_value(key, entry) else {
            continue;
        };
        let wider = best
            .as_ref()
            .is_none_or(|current| candidate.width.unwrap_or(0) > current.width.unwrap_or(0));
        if wider {
            best = Some(candidate);
        }
    }

    if let Some(asset) = &best {
        trace!(item_id = %item.id(), width = asset.width, "selected widest fallback asset");
    }
    best
}
