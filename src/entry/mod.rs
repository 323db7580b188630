//! Logbook entry types.
//!
//! [`Entry`] is the persisted record. [`EntryCandidate`] and [`EntryPatch`]
//! carry untrusted input exactly as it arrived, so the validator can report on
//! wrong types (a numeric title, a boolean latitude) instead of failing at
//! deserialization time.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One logbook record.
///
/// Field names serialize in the camelCase used by the data file
/// (`isoTime`). Missing fields in a hand-edited file deserialize to empty
/// values so the collection stays readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    #[serde(default, deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub iso_time: String,
}

impl Entry {
    /// Both coordinates, when the entry has a full location.
    pub fn location(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Short form returned to HTTP clients after a successful add.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySummary {
    pub id: String,
    pub title: String,
    pub iso_time: String,
}

impl From<&Entry> for EntrySummary {
    fn from(entry: &Entry) -> Self {
        Self {
            id: entry.id.clone(),
            title: entry.title.clone(),
            iso_time: entry.iso_time.clone(),
        }
    }
}

/// Untrusted input for creating an entry.
///
/// Every field is kept as raw JSON. `lat` and `lon` accept numbers or numeric
/// strings; `null`, a missing key, or a blank string all mean "no coordinate".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EntryCandidate {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lon: Option<Value>,
}

impl EntryCandidate {
    /// Builds a candidate from plain strings, as a form or CLI would supply them.
    pub fn from_text(title: &str, body: &str, lat: Option<&str>, lon: Option<&str>) -> Self {
        Self {
            id: None,
            title: Some(Value::from(title)),
            body: Some(Value::from(body)),
            lat: lat.map(Value::from),
            lon: lon.map(Value::from),
        }
    }

    /// Builds a candidate with numeric coordinates.
    pub fn new(title: &str, body: &str, lat: Option<f64>, lon: Option<f64>) -> Self {
        Self {
            id: None,
            title: Some(Value::from(title)),
            body: Some(Value::from(body)),
            lat: lat.map(Value::from),
            lon: lon.map(Value::from),
        }
    }

    /// Sets an explicit id, which the store keeps if it is unique.
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(Value::from(id));
        self
    }
}

/// Untrusted partial update.
///
/// A field that is absent from the JSON leaves the stored value alone. For
/// `lat` and `lon`, an explicit `null` (or blank string) clears the coordinate,
/// so those fields keep `Some(Value::Null)` rather than collapsing it to `None`.
/// Any `id` in the patch is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPatch {
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub lat: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub lon: Option<Value>,
    #[serde(default)]
    pub iso_time: Option<Value>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.body.is_none()
            && self.lat.is_none()
            && self.lon.is_none()
            && self.iso_time.is_none()
    }
}

/// Keeps an explicit JSON `null` as `Some(Value::Null)`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Hand-edited files sometimes store ids as bare numbers.
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "entry id must be a string or number, found {}",
            other
        ))),
    }
}
