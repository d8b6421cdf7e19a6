//! Reader for the structured state blob embedded in place pages.
//!
//! Place pages assign a large nested JSON array to
//! `window.APP_INITIALIZATION_STATE`. Only a handful of fields live at a
//! known position: the place blob at `[5][3][2]` carries the feature id at
//! `[0]`, the name at `[1]`, coordinates at `[7][2]`/`[7][3]`, and the place
//! id at `[18]`. Anything that deviates from that shape is treated as absent.

use std::sync::LazyLock;

use gmaps_core::Coordinates;
use regex::Regex;
use serde_json::Value;

static STATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s);window\.APP_INITIALIZATION_STATE\s*=\s*(.*?);window\.APP_FLAGS")
        .expect("valid regex")
});

const BLOB_PATH: [usize; 3] = [5, 3, 2];
const MIN_BLOB_LEN: usize = 19;

/// Fields recovered from the embedded state blob.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredPlace {
    pub cid: Option<String>,
    pub name: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub place_id: Option<String>,
}

impl StructuredPlace {
    /// Locates and decodes the blob in `html`. `None` when the assignment is
    /// missing, is not JSON, or does not have the expected shape.
    #[must_use]
    pub fn from_html(html: &str) -> Option<Self> {
        let raw = STATE_RE.captures(html)?.get(1)?.as_str().trim();
        if !raw.starts_with(['[', '{']) {
            tracing::debug!("embedded state does not start like JSON");
            return None;
        }
        let root: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(error = %err, "embedded state is not valid JSON");
                return None;
            }
        };
        Self::from_state(&root)
    }

    fn from_state(root: &Value) -> Option<Self> {
        let blob = BLOB_PATH
            .iter()
            .try_fold(root, |node, &i| node.as_array()?.get(i))?
            .as_array()?;
        if blob.len() < MIN_BLOB_LEN {
            return None;
        }

        let text = |v: &Value| {
            v.as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let coordinates = blob[7].as_array().and_then(|c| {
            let latitude = c.get(2)?.as_f64()?;
            let longitude = c.get(3)?.as_f64()?;
            Some(Coordinates {
                latitude,
                longitude,
            })
        });

        let place = Self {
            cid: text(&blob[0]),
            name: text(&blob[1]),
            coordinates,
            place_id: text(&blob[18]),
        };
        if place == Self::default() {
            None
        } else {
            Some(place)
        }
    }
}
