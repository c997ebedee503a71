//! JSON metadata sidecars (`<stem>.json` next to `<stem>.txt`) and their
//! mapping onto the metadata aggregate.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::Path;

use crate::attribute::{Attribute, Datatype};
use crate::custom_class::{CustomClass, FlatAttribute};
use crate::error::{Error, Result};
use crate::extent::{GeographicExtent, TemporalExtent};
use crate::metadata::{ContentsMetadata, Metadata, SourceMetadata};

pub const DOCUMENT_CLASS: &str = "Document";
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sidecar {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub author: Vec<String>,
    #[serde(default)]
    pub publication_date: String,
    #[serde(default)]
    pub era: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub source_type: String,
    #[serde(default)]
    pub summary_text: Option<String>,
    #[serde(default)]
    pub attributes: Vec<FlatAttribute>,
}

fn one_or_many<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match Option::<OneOrMany>::deserialize(d)? {
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
        None => Vec::new(),
    })
}

/// Parse `YYYY-MM-DDTHH:MM:SSZ`, `YYYY-MM-DD` or a bare `YYYY`.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(raw) {
        return Some(d.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        (raw.len() == 4)
            .then(|| raw.parse::<i32>().ok())
            .flatten()
            .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
    })?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

impl Sidecar {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::validation(format!("malformed sidecar: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::NotFound(format!("sidecar {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Sidecar id, falling back to the document stem.
    pub fn doc_id<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.id.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or(fallback)
    }

    fn temporal_extent(&self) -> TemporalExtent {
        let date = self.publication_date.trim();
        if !self.era.trim().is_empty() {
            let bound = if date.is_empty() { self.era.as_str() } else { date };
            return TemporalExtent::descriptive(bound, None, bound, self.era.as_str());
        }
        match parse_date(date) {
            Some(d) => TemporalExtent::period(d, None, d),
            None => TemporalExtent::descriptive(date, None, date, ""),
        }
    }

    fn class_tree(&self) -> Result<CustomClass> {
        let mut root = CustomClass::from_flat_attributes(DOCUMENT_CLASS, &self.attributes)?;
        let own = [
            ("author", self.author.join(", ")),
            ("source_type", self.source_type.clone()),
            ("publication_date", self.publication_date.clone()),
        ];
        for (key, value) in own {
            root.add_attribute(Attribute::new(key, Value::String(value), Datatype::Str))?;
        }
        Ok(root)
    }

    /// Build the aggregate for one document.
    pub fn to_metadata(&self, fallback_id: &str, reference_system_id: &str) -> Result<Metadata> {
        let id = self.doc_id(fallback_id);
        let contact = self.author.first().map(String::as_str).filter(|s| !s.is_empty()).unwrap_or(UNKNOWN);

        let region = if self.region.trim().is_empty() { UNKNOWN } else { self.region.as_str() };
        let keywords: Vec<&str> = [self.era.as_str(), self.region.as_str(), self.domain.as_str()]
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect();

        let mut contents = ContentsMetadata::new(GeographicExtent::place(region, ""), self.temporal_extent())
            .with_id(format!("cont_{id}"))
            .with_title(self.title.as_str())
            .with_reference(self.publication_date.as_str())
            .with_topic_category(self.domain.as_str())
            .with_keywords(keywords)
            .with_custom_class(self.class_tree()?);
        if let Some(summary) = &self.summary_text {
            contents = contents.with_abstract(summary.as_str());
        }

        let mut meta = Metadata::new(contact).with_id(format!("meta_{id}"));
        meta.add_source(SourceMetadata::new(id, reference_system_id).with_id(format!("src_{id}")))?;
        meta.add_contents(contents)?;
        meta.validate()?;
        Ok(meta)
    }
}
