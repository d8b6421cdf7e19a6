//! Place records produced by the extraction pipeline.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Priority class of an extraction strategy, ranked by how well it survives
/// provider markup changes. Lower tiers are tried first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Embedded structured data blob read via a fixed path.
    Structured,
    /// Accessibility labels, semantic item ids, document metadata, protocol links.
    Semantic,
    /// Generic structural patterns such as heading or button text.
    Structural,
    /// Provider-internal obfuscated identifiers.
    Legacy,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured => write!(f, "structured"),
            Self::Semantic => write!(f, "semantic"),
            Self::Structural => write!(f, "structural"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

/// Every field of a [`PlaceRecord`] that has its own extraction chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceField {
    Name,
    PlaceId,
    Cid,
    Coordinates,
    Address,
    Rating,
    ReviewsCount,
    Categories,
    Website,
    Phone,
    Thumbnail,
    Hours,
    Link,
}

impl PlaceField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::PlaceId => "place_id",
            Self::Cid => "cid",
            Self::Coordinates => "coordinates",
            Self::Address => "address",
            Self::Rating => "rating",
            Self::ReviewsCount => "reviews_count",
            Self::Categories => "categories",
            Self::Website => "website",
            Self::Phone => "phone",
            Self::Thumbnail => "thumbnail",
            Self::Hours => "hours",
            Self::Link => "link",
        }
    }
}

impl fmt::Display for PlaceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A normalized listing. Every field except `link` may legitimately be
/// absent; absence is not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub name: Option<String>,
    pub place_id: Option<String>,
    /// Provider-internal feature id (`0x…:0x…`).
    pub cid: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub address: Option<String>,
    pub rating: Option<f64>,
    pub reviews_count: Option<u64>,
    pub categories: Vec<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub thumbnail: Option<String>,
    pub hours: Vec<String>,
    pub link: String,
    /// Which tier satisfied each populated field.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provenance: BTreeMap<PlaceField, Tier>,
}

impl PlaceRecord {
    /// An empty record for `link`; all optional fields unset.
    #[must_use]
    pub fn empty(link: impl Into<String>) -> Self {
        Self {
            name: None,
            place_id: None,
            cid: None,
            coordinates: None,
            address: None,
            rating: None,
            reviews_count: None,
            categories: Vec::new(),
            website: None,
            phone: None,
            thumbnail: None,
            hours: Vec::new(),
            link: link.into(),
            provenance: BTreeMap::new(),
        }
    }

    /// Number of unset fields. Empty lists count as unset.
    #[must_use]
    pub fn null_count(&self) -> usize {
        [
            self.name.is_none(),
            self.place_id.is_none(),
            self.cid.is_none(),
            self.coordinates.is_none(),
            self.address.is_none(),
            self.rating.is_none(),
            self.reviews_count.is_none(),
            self.categories.is_empty(),
            self.website.is_none(),
            self.phone.is_none(),
            self.thumbnail.is_none(),
            self.hours.is_empty(),
        ]
        .into_iter()
        .filter(|missing| *missing)
        .count()
    }

    /// Tier that satisfied `field`, if any.
    #[must_use]
    pub fn tier_of(&self, field: PlaceField) -> Option<Tier> {
        self.provenance.get(&field).copied()
    }

    /// Fields satisfied only by a [`Tier::Legacy`] strategy.
    pub fn legacy_fields(&self) -> impl Iterator<Item = PlaceField> + '_ {
        self.provenance
            .iter()
            .filter(|(_, tier)| **tier == Tier::Legacy)
            .map(|(field, _)| *field)
    }
}
