//! Turns one place page into a [`PlaceRecord`].
//!
//! Every field is resolved independently through its strategy chain in
//! [`fields::CHAINS`]. A field no strategy can fill stays empty. The page is
//! only rejected when neither a name nor a link can be recovered.

mod fields;
mod strategy;
mod structured;
mod text;

use std::collections::BTreeMap;

use gmaps_core::{PlaceField, PlaceRecord, Tier};

use crate::driver::Snapshot;

pub use fields::{FieldChains, CHAINS};
pub use strategy::{first_hit, PageContext, Strategy};
pub use structured::StructuredPlace;
pub use text::clean_html_text;

/// Result of running the pipeline over one page.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// Every field was filled.
    Complete(PlaceRecord),
    /// Identifiable, with the listed fields left empty.
    Partial {
        record: PlaceRecord,
        missing: Vec<PlaceField>,
    },
    /// Neither name nor link could be recovered.
    Failed { reason: String },
}

impl ExtractionOutcome {
    /// The record, unless extraction failed.
    #[must_use]
    pub fn into_record(self) -> Option<PlaceRecord> {
        match self {
            Self::Complete(record) | Self::Partial { record, .. } => Some(record),
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Stateless: the same snapshot always yields the same outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractionPipeline;

impl ExtractionPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Extracts a record from `snapshot`.
    ///
    /// `fallback_link` (normally the discovered listing reference) fills the
    /// `link` field when the page names the place but exposes no link of its
    /// own. It does not rescue a page that has neither.
    #[must_use]
    pub fn extract(&self, snapshot: &Snapshot, fallback_link: Option<&str>) -> ExtractionOutcome {
        let ctx = PageContext::new(&snapshot.html, &snapshot.url);
        let chains = &*CHAINS;
        let mut fields = FieldResolver {
            ctx: &ctx,
            provenance: BTreeMap::new(),
        };

        let name = fields.run(PlaceField::Name, &chains.name);
        let link = fields.run(PlaceField::Link, &chains.link);
        if name.is_none() && link.is_none() {
            return ExtractionOutcome::Failed {
                reason: "neither name nor link could be extracted".to_string(),
            };
        }

        let record = PlaceRecord {
            name,
            place_id: fields.run(PlaceField::PlaceId, &chains.place_id),
            cid: fields.run(PlaceField::Cid, &chains.cid),
            coordinates: fields.run(PlaceField::Coordinates, &chains.coordinates),
            address: fields.run(PlaceField::Address, &chains.address),
            rating: fields.run(PlaceField::Rating, &chains.rating),
            reviews_count: fields.run(PlaceField::ReviewsCount, &chains.reviews_count),
            categories: fields
                .run(PlaceField::Categories, &chains.categories)
                .unwrap_or_default(),
            website: fields.run(PlaceField::Website, &chains.website),
            phone: fields.run(PlaceField::Phone, &chains.phone),
            thumbnail: fields.run(PlaceField::Thumbnail, &chains.thumbnail),
            hours: fields
                .run(PlaceField::Hours, &chains.hours)
                .unwrap_or_default(),
            link: link
                .or_else(|| fallback_link.map(str::to_string))
                .unwrap_or_default(),
            provenance: fields.provenance,
        };

        let missing = missing_fields(&record);
        if missing.is_empty() {
            ExtractionOutcome::Complete(record)
        } else {
            ExtractionOutcome::Partial { record, missing }
        }
    }
}

/// Runs chains against one page and records which tier filled each field.
struct FieldResolver<'r, 'a> {
    ctx: &'r PageContext<'a>,
    provenance: BTreeMap<PlaceField, Tier>,
}

impl FieldResolver<'_, '_> {
    fn run<T>(&mut self, field: PlaceField, chain: &[Strategy<T>]) -> Option<T> {
        let (value, strategy) = first_hit(chain, self.ctx)?;
        if strategy.tier == Tier::Legacy {
            tracing::warn!(
                field = %field,
                strategy = strategy.label,
                "field satisfied only by a legacy marker"
            );
        } else {
            tracing::trace!(
                field = %field,
                strategy = strategy.label,
                tier = %strategy.tier,
                "field extracted"
            );
        }
        self.provenance.insert(field, strategy.tier);
        Some(value)
    }
}

fn missing_fields(record: &PlaceRecord) -> Vec<PlaceField> {
    let checks = [
        (PlaceField::Name, record.name.is_none()),
        (PlaceField::PlaceId, record.place_id.is_none()),
        (PlaceField::Cid, record.cid.is_none()),
        (PlaceField::Coordinates, record.coordinates.is_none()),
        (PlaceField::Address, record.address.is_none()),
        (PlaceField::Rating, record.rating.is_none()),
        (PlaceField::ReviewsCount, record.reviews_count.is_none()),
        (PlaceField::Categories, record.categories.is_empty()),
        (PlaceField::Website, record.website.is_none()),
        (PlaceField::Phone, record.phone.is_none()),
        (PlaceField::Thumbnail, record.thumbnail.is_none()),
        (PlaceField::Hours, record.hours.is_empty()),
    ];
    checks
        .into_iter()
        .filter_map(|(field, missing)| missing.then_some(field))
        .collect()
}
