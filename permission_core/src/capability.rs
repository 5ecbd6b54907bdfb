//! Media capability categories.
//!
//! A [`CapabilitySet`] is a bitmask of the media categories a caller wants to
//! read. It expands into concrete platform identifiers through
//! [`CapabilitySet::resolve`]:
//!
//! ```text
//! level >= fine_grained_media_level   IMAGES | VIDEO  -> { READ_MEDIA_IMAGES, READ_MEDIA_VIDEO }
//! level <  fine_grained_media_level   IMAGES | VIDEO  -> { READ_EXTERNAL_STORAGE }
//! ```
//!
//! # Example
//!
//! ```
//! use permission_core::CapabilitySet;
//!
//! let set = CapabilitySet::IMAGES | CapabilitySet::VIDEO;
//! assert!(set.contains(CapabilitySet::VIDEO));
//! assert_eq!(set.union(set), set);
//! assert_eq!("images+video".parse::<CapabilitySet>().unwrap(), set);
//! ```

#[cfg(test)]
mod tests;

use crate::config::Platform;
use crate::error::ConfigError;
use crate::types::PermissionSet;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// Combination of media categories, one bit per category.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CapabilitySet: u32 {
        const IMAGES = 0b001;
        const VIDEO  = 0b010;
        const AUDIO  = 0b100;
    }
}

impl CapabilitySet {
    /// Every media category
    pub const ALL_MEDIA: Self = Self::IMAGES.union(Self::VIDEO).union(Self::AUDIO);

    /// Expand this set into the identifiers the given platform understands.
    ///
    /// Fine-grained platforms get one identifier per set bit. Older platforms
    /// collapse any non-empty set into the single legacy read identifier.
    #[must_use]
    pub fn resolve(self, platform: &Platform) -> PermissionSet {
        let ids = platform.identifiers();
        let mut resolved = PermissionSet::new();

        if platform.has_fine_grained_media() {
            if self.contains(Self::IMAGES) {
                resolved.insert(ids.images.clone());
            }
            if self.contains(Self::VIDEO) {
                resolved.insert(ids.video.clone());
            }
            if self.contains(Self::AUDIO) {
                resolved.insert(ids.audio.clone());
            }
        } else if !self.is_empty() {
            resolved.insert(ids.legacy_read.clone());
        }

        resolved
    }

    /// Lowercase category names contained in this set
    #[must_use]
    pub fn names(self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.contains(Self::IMAGES) {
            names.push("images");
        }
        if self.contains(Self::VIDEO) {
            names.push("video");
        }
        if self.contains(Self::AUDIO) {
            names.push("audio");
        }
        names
    }

    /// Parse a single category name (case-insensitive)
    #[must_use]
    pub fn parse_category(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "images" | "image" => Some(Self::IMAGES),
            "video" | "videos" => Some(Self::VIDEO),
            "audio" => Some(Self::AUDIO),
            "all" => Some(Self::ALL_MEDIA),
            _ => None,
        }
    }
}

impl FromStr for CapabilitySet {
    type Err = ConfigError;

    /// Accepts category names joined by `+`, `|` or `,`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(['+', '|', ','])
            .filter(|part| !part.trim().is_empty())
            .try_fold(Self::empty(), |acc, part| {
                Self::parse_category(part)
                    .map(|category| acc.union(category))
                    .ok_or_else(|| ConfigError::UnknownCategory(part.trim().to_string()))
            })
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        f.write_str(&self.names().join("+"))
    }
}
