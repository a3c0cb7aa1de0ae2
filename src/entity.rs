//! Entity labels, BIO tags and span types.
//!
//! The tagset is closed: four entity labels and nine BIO tags. Every tag
//! has a stable index, which is what the sequence taggers store their
//! weights and probability distributions against.
//!
//! ```
//! use querytag::entity::{EntityLabel, Tag};
//!
//! let tag: Tag = "I-VOLUME".parse().unwrap();
//! assert_eq!(tag.entity(), Some(EntityLabel::Volume));
//! assert_eq!(Tag::from_index(tag.index()), Some(tag));
//! assert!(EntityLabel::Percent.priority() > EntityLabel::Volume.priority());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Entity types recognised in product queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityLabel {
    /// Product type ("молоко", "shampoo").
    Type,
    /// Brand name.
    Brand,
    /// Amount with unit ("1л", "500 г").
    Volume,
    /// Percentage ("3.5%").
    Percent,
}

/// Conflict-resolution priority, indexed by [`EntityLabel::ordinal`].
const PRIORITY: [u8; 4] = [1, 2, 3, 4];

impl EntityLabel {
    /// All labels, in priority order (lowest first).
    pub const ALL: [EntityLabel; 4] = [
        EntityLabel::Type,
        EntityLabel::Brand,
        EntityLabel::Volume,
        EntityLabel::Percent,
    ];

    fn ordinal(self) -> usize {
        match self {
            EntityLabel::Type => 0,
            EntityLabel::Brand => 1,
            EntityLabel::Volume => 2,
            EntityLabel::Percent => 3,
        }
    }

    /// Priority used when two candidate spans overlap. Higher wins.
    pub fn priority(self) -> u8 {
        PRIORITY[self.ordinal()]
    }

    /// Upper-case name used in tags and output.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityLabel::Type => "TYPE",
            EntityLabel::Brand => "BRAND",
            EntityLabel::Volume => "VOLUME",
            EntityLabel::Percent => "PERCENT",
        }
    }

    /// Parse a bare label (`"BRAND"`) or a prefixed one (`"B-BRAND"`).
    pub fn parse_flat(label: &str) -> Option<Self> {
        let label = label.trim();
        let bare = label
            .strip_prefix("B-")
            .or_else(|| label.strip_prefix("I-"))
            .unwrap_or(label);
        match bare {
            "TYPE" => Some(EntityLabel::Type),
            "BRAND" => Some(EntityLabel::Brand),
            "VOLUME" => Some(EntityLabel::Volume),
            "PERCENT" => Some(EntityLabel::Percent),
            _ => None,
        }
    }
}

impl fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityLabel::parse_flat(s).ok_or_else(|| format!("unknown entity label: {s}"))
    }
}

/// A BIO tag over the closed entity set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    /// Outside any entity.
    Outside,
    /// First token of an entity.
    Begin(EntityLabel),
    /// Continuation token of an entity.
    Inside(EntityLabel),
}

impl Tag {
    /// Size of the tagset.
    pub const COUNT: usize = 9;

    /// All tags in index order.
    pub const ALL: [Tag; Tag::COUNT] = [
        Tag::Outside,
        Tag::Begin(EntityLabel::Brand),
        Tag::Inside(EntityLabel::Brand),
        Tag::Begin(EntityLabel::Type),
        Tag::Inside(EntityLabel::Type),
        Tag::Begin(EntityLabel::Volume),
        Tag::Inside(EntityLabel::Volume),
        Tag::Begin(EntityLabel::Percent),
        Tag::Inside(EntityLabel::Percent),
    ];

    /// Stable index into [`Tag::ALL`].
    pub fn index(self) -> usize {
        match self {
            Tag::Outside => 0,
            Tag::Begin(EntityLabel::Brand) => 1,
            Tag::Inside(EntityLabel::Brand) => 2,
            Tag::Begin(EntityLabel::Type) => 3,
            Tag::Inside(EntityLabel::Type) => 4,
            Tag::Begin(EntityLabel::Volume) => 5,
            Tag::Inside(EntityLabel::Volume) => 6,
            Tag::Begin(EntityLabel::Percent) => 7,
            Tag::Inside(EntityLabel::Percent) => 8,
        }
    }

    /// Inverse of [`Tag::index`].
    pub fn from_index(index: usize) -> Option<Tag> {
        Tag::ALL.get(index).copied()
    }

    /// The entity this tag belongs to, `None` for `O`.
    pub fn entity(self) -> Option<EntityLabel> {
        match self {
            Tag::Outside => None,
            Tag::Begin(e) | Tag::Inside(e) => Some(e),
        }
    }

    pub fn is_outside(self) -> bool {
        matches!(self, Tag::Outside)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Outside => "O",
            Tag::Begin(EntityLabel::Brand) => "B-BRAND",
            Tag::Inside(EntityLabel::Brand) => "I-BRAND",
            Tag::Begin(EntityLabel::Type) => "B-TYPE",
            Tag::Inside(EntityLabel::Type) => "I-TYPE",
            Tag::Begin(EntityLabel::Volume) => "B-VOLUME",
            Tag::Inside(EntityLabel::Volume) => "I-VOLUME",
            Tag::Begin(EntityLabel::Percent) => "B-PERCENT",
            Tag::Inside(EntityLabel::Percent) => "I-PERCENT",
        }
    }

    /// Parse one of the nine tag strings exactly.
    pub fn parse(s: &str) -> Option<Tag> {
        Tag::ALL.iter().copied().find(|tag| tag.as_str() == s)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::parse(s).ok_or_else(|| format!("unknown tag: {s}"))
    }
}

/// A gold span as it arrives from a corpus: the label is kept verbatim and
/// normalised only when converted to tags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldSpan {
    /// Start character offset (inclusive).
    pub start: usize,
    /// End character offset (exclusive).
    pub end: usize,
    /// Raw label, e.g. `"B-TYPE"`, `"BRAND"` or `"O"`.
    pub label: String,
}

impl GoldSpan {
    pub fn new<S: Into<String>>(start: usize, end: usize, label: S) -> Self {
        GoldSpan {
            start,
            end,
            label: label.into(),
        }
    }
}

/// A run of consecutive tokens sharing one flat label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRun {
    pub start: usize,
    pub end: usize,
    /// `None` stands for `O`.
    pub entity: Option<EntityLabel>,
}

impl TagRun {
    /// Flat label: the entity name, or `"O"`.
    pub fn label(&self) -> &'static str {
        self.entity.map(EntityLabel::as_str).unwrap_or("O")
    }
}

/// Whether two half-open ranges share at least one character.
pub(crate) fn ranges_overlap(a: (usize, usize), b: (usize, usize)) -> bool {
    a.0.max(b.0) < a.1.min(b.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_index_round_trip() {
        for (i, tag) in Tag::ALL.iter().enumerate() {
            assert_eq!(tag.index(), i);
            assert_eq!(Tag::from_index(i), Some(*tag));
            assert_eq!(Tag::parse(tag.as_str()), Some(*tag));
        }
        assert_eq!(Tag::from_index(Tag::COUNT), None);
    }

    #[test]
    fn test_priority_table() {
        assert!(EntityLabel::Percent.priority() > EntityLabel::Volume.priority());
        assert!(EntityLabel::Volume.priority() > EntityLabel::Brand.priority());
        assert!(EntityLabel::Brand.priority() > EntityLabel::Type.priority());
    }

    #[test]
    fn test_parse_flat_strips_prefix() {
        assert_eq!(EntityLabel::parse_flat("B-TYPE"), Some(EntityLabel::Type));
        assert_eq!(EntityLabel::parse_flat(" I-BRAND "), Some(EntityLabel::Brand));
        assert_eq!(EntityLabel::parse_flat("PERCENT"), Some(EntityLabel::Percent));
        assert_eq!(EntityLabel::parse_flat("O"), None);
        assert_eq!(EntityLabel::parse_flat("B-COLOR"), None);
    }

    #[test]
    fn test_ranges_overlap() {
        assert!(ranges_overlap((0, 5), (2, 7)));
        assert!(!ranges_overlap((0, 3), (3, 6)));
        assert!(!ranges_overlap((4, 6), (0, 3)));
    }
}
