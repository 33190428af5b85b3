//! Category (collection) structures and merge rules.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A category discovered on the directory site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    /// Display name
    pub name: String,

    /// Startup count from the sidebar listing, when known
    pub count: Option<u32>,
}

/// Ordered mapping from category slug to its metadata.
pub type CategoryMap = IndexMap<String, Category>;

/// Merge the two discovery sources into one ordered mapping.
///
/// Sidebar entries carry authoritative counts and are inserted first;
/// tag-scan entries only fill slugs not already present. The result is
/// sorted case-insensitively by display name.
pub fn merge_categories(sidebar: CategoryMap, tags: CategoryMap) -> CategoryMap {
    let mut merged = sidebar;
    for (slug, category) in tags {
        merged.entry(slug).or_insert(category);
    }
    merged.sort_by(|_, a, _, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    merged
}
