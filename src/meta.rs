//! Image metadata as an ordered key/value mapping.
//!
//! The engine reports metadata grouped by model, using the same group names
//! FreeImage-based tooling uses so dumps stay recognizable:
//!
//! | Group | Contents |
//! |---|---|
//! | `EXIF_MAIN` | IFD0 tags (Make, Model, Orientation, ...) |
//! | `EXIF_EXIF` | Exif sub-IFD tags (ExposureTime, FNumber, ...) |
//! | `EXIF_GPS` | GPS sub-IFD tags |
//! | `EXIF_RAW` | the raw TIFF-structured EXIF block, as bytes |
//! | `COMMENTS` | PNG text chunks / JPEG COM segments |
//! | `ANIMATION` | per-frame timing (`FrameTime`, milliseconds) |
//!
//! Top-level keys outside those groups are allowed in a [`Meta`] (callers
//! can attach anything), but writers ignore them.

use serde::Serialize;
use std::collections::BTreeMap;

pub const EXIF_MAIN: &str = "EXIF_MAIN";
pub const EXIF_EXIF: &str = "EXIF_EXIF";
pub const EXIF_GPS: &str = "EXIF_GPS";
pub const EXIF_RAW: &str = "EXIF_RAW";
pub const COMMENTS: &str = "COMMENTS";
pub const ANIMATION: &str = "ANIMATION";

/// A single metadata value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    #[serde(serialize_with = "serialize_bytes_summary")]
    Bytes(Vec<u8>),
    Group(BTreeMap<String, MetaValue>),
}

fn serialize_bytes_summary<S: serde::Serializer>(
    bytes: &[u8],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("<{} bytes>", bytes.len()))
}

impl MetaValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetaValue::Int(v) => Some(*v),
            MetaValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            MetaValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&BTreeMap<String, MetaValue>> {
        match self {
            MetaValue::Group(g) => Some(g),
            _ => None,
        }
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Bool(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Int(v)
    }
}

impl From<i32> for MetaValue {
    fn from(v: i32) -> Self {
        MetaValue::Int(i64::from(v))
    }
}

impl From<u32> for MetaValue {
    fn from(v: u32) -> Self {
        MetaValue::Int(i64::from(v))
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Float(v)
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Text(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Text(v)
    }
}

impl From<Vec<u8>> for MetaValue {
    fn from(v: Vec<u8>) -> Self {
        MetaValue::Bytes(v)
    }
}

impl From<BTreeMap<String, MetaValue>> for MetaValue {
    fn from(v: BTreeMap<String, MetaValue>) -> Self {
        MetaValue::Group(v)
    }
}

/// Metadata attached to an image or to a whole file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Meta(BTreeMap<String, MetaValue>);

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<MetaValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn group(&self, key: &str) -> Option<&BTreeMap<String, MetaValue>> {
        self.0.get(key).and_then(MetaValue::as_group)
    }

    /// Mutable access to a group, creating it (or replacing a non-group
    /// value) if needed.
    pub fn group_mut(&mut self, key: &str) -> &mut BTreeMap<String, MetaValue> {
        let entry = self
            .0
            .entry(key.to_string())
            .or_insert_with(|| MetaValue::Group(BTreeMap::new()));
        if !matches!(entry, MetaValue::Group(_)) {
            *entry = MetaValue::Group(BTreeMap::new());
        }
        match entry {
            MetaValue::Group(g) => g,
            _ => unreachable!("entry was just made a group"),
        }
    }

    /// Overlay `other` on top of `self`; groups are merged key by key.
    pub fn merge(&mut self, other: &Meta) {
        for (key, value) in &other.0 {
            match (self.0.get_mut(key), value) {
                (Some(MetaValue::Group(base)), MetaValue::Group(overlay)) => {
                    for (k, v) in overlay {
                        base.insert(k.clone(), v.clone());
                    }
                }
                _ => {
                    self.0.insert(key.clone(), value.clone());
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetaValue)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

impl From<BTreeMap<String, MetaValue>> for Meta {
    fn from(map: BTreeMap<String, MetaValue>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<MetaValue>> FromIterator<(K, V)> for Meta {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
