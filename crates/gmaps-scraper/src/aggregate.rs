//! Merges per-place worker outputs into the final ordered result list.

use std::collections::{BTreeSet, HashMap};

use gmaps_core::{PlaceField, PlaceRecord};

use crate::types::normalize_href;

/// Counts reported with the results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateCounts {
    pub discovered: usize,
    pub extracted: usize,
    pub skipped: usize,
    pub deduped: usize,
}

/// Aggregated output of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub records: Vec<PlaceRecord>,
    pub counts: AggregateCounts,
    /// Fields some returned record got only from a legacy marker.
    pub legacy_fields: Vec<PlaceField>,
}

struct Entry {
    /// Earliest discovery index among the merged duplicates.
    discovery_index: usize,
    record: PlaceRecord,
}

/// Accepts records in completion order, returns them in discovery order.
pub struct ResultAggregator {
    max_places: Option<usize>,
    entries: Vec<Entry>,
    by_key: HashMap<String, usize>,
    counts: AggregateCounts,
}

/// `place_id` when present, else the normalized link.
#[must_use]
pub fn record_key(record: &PlaceRecord) -> String {
    match &record.place_id {
        Some(id) => format!("id:{id}"),
        None => format!("link:{}", normalize_href(&record.link)),
    }
}

impl ResultAggregator {
    #[must_use]
    pub fn new(discovered: usize, max_places: Option<usize>) -> Self {
        Self {
            max_places,
            entries: Vec::new(),
            by_key: HashMap::new(),
            counts: AggregateCounts {
                discovered,
                ..AggregateCounts::default()
            },
        }
    }

    /// Adds a successfully extracted record. A duplicate of an earlier one
    /// replaces it only when it has strictly fewer empty fields.
    pub fn record(&mut self, discovery_index: usize, record: PlaceRecord) {
        self.counts.extracted += 1;
        let key = record_key(&record);
        let Some(&slot) = self.by_key.get(&key) else {
            self.by_key.insert(key, self.entries.len());
            self.entries.push(Entry {
                discovery_index,
                record,
            });
            return;
        };

        self.counts.deduped += 1;
        let entry = &mut self.entries[slot];
        entry.discovery_index = entry.discovery_index.min(discovery_index);
        let replace = record.null_count() < entry.record.null_count();
        tracing::debug!(
            key = %key,
            discovery_index,
            replaced = replace,
            "duplicate place merged"
        );
        if replace {
            entry.record = record;
        }
    }

    /// Notes a place that produced no record.
    pub fn skip(&mut self, discovery_index: usize, reason: &str) {
        self.counts.skipped += 1;
        tracing::debug!(discovery_index, reason, "place skipped");
    }

    #[must_use]
    pub fn counts(&self) -> AggregateCounts {
        self.counts
    }

    /// Orders by discovery index and applies the cap.
    #[must_use]
    pub fn finish(mut self) -> Aggregate {
        self.entries.sort_by_key(|e| e.discovery_index);
        if let Some(max) = self.max_places {
            self.entries.truncate(max);
        }
        let records: Vec<PlaceRecord> = self.entries.into_iter().map(|e| e.record).collect();
        let legacy_fields = records
            .iter()
            .flat_map(PlaceRecord::legacy_fields)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Aggregate {
            records,
            counts: self.counts,
            legacy_fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmaps_core::Tier;

    fn place(name: &str, place_id: Option<&str>) -> PlaceRecord {
        let mut r = PlaceRecord::empty(format!("https://www.google.com/maps/place/{name}"));
        r.name = Some(name.to_string());
        r.place_id = place_id.map(str::to_string);
        r
    }

    #[test]
    fn completion_order_is_restored_to_discovery_order() {
        let mut agg = ResultAggregator::new(3, None);
        agg.record(2, place("c", None));
        agg.record(0, place("a", None));
        agg.record(1, place("b", None));
        let out = agg.finish();
        let names: Vec<_> = out.records.iter().filter_map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicate_place_id_keeps_richer_record() {
        let mut agg = ResultAggregator::new(2, None);
        agg.record(1, place("first", Some("ChIJdup")));
        let mut richer = place("second", Some("ChIJdup"));
        richer.phone = Some("5125550100".to_string());
        agg.record(0, richer);
        let out = agg.finish();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].name.as_deref(), Some("second"));
        assert_eq!(out.counts.deduped, 1);
        assert_eq!(out.counts.extracted, 2);
    }

    #[test]
    fn equally_rich_duplicate_keeps_first_completed() {
        let mut agg = ResultAggregator::new(2, None);
        agg.record(0, place("kept", Some("ChIJsame")));
        agg.record(1, place("dropped", Some("ChIJsame")));
        let out = agg.finish();
        assert_eq!(out.records[0].name.as_deref(), Some("kept"));
    }

    #[test]
    fn records_without_place_id_dedup_by_normalized_link() {
        let mut agg = ResultAggregator::new(2, None);
        let mut a = place("x", None);
        a.link = "https://www.google.com/maps/place/X?hl=en".to_string();
        let mut b = place("x", None);
        b.link = "HTTPS://WWW.GOOGLE.COM/maps/place/X".to_string();
        agg.record(0, a);
        agg.record(1, b);
        assert_eq!(agg.finish().records.len(), 1);
    }

    #[test]
    fn cap_applies_after_reordering() {
        let mut agg = ResultAggregator::new(4, Some(2));
        agg.record(3, place("d", None));
        agg.record(1, place("b", None));
        agg.record(0, place("a", None));
        agg.skip(2, "extraction failed");
        let out = agg.finish();
        let names: Vec<_> = out.records.iter().filter_map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(out.counts.skipped, 1);
        assert_eq!(out.counts.discovered, 4);
    }

    #[test]
    fn legacy_fields_are_collected_from_returned_records() {
        let mut agg = ResultAggregator::new(1, None);
        let mut r = place("old", None);
        r.provenance.insert(PlaceField::Thumbnail, Tier::Legacy);
        r.provenance.insert(PlaceField::Name, Tier::Semantic);
        agg.record(0, r);
        assert_eq!(agg.finish().legacy_fields, vec![PlaceField::Thumbnail]);
    }
}
