//! Metadata aggregate: one root per document, owning its sources and contents.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::custom_class::CustomClass;
use crate::error::{Error, Result};
use crate::extent::{GeographicExtent, TemporalExtent};
use crate::flatten;
use crate::ids::{short_id, IdPrefix};
use crate::traits::Entity;
use crate::types::FlatMeta;

pub const DEFAULT_LANGUAGE: &str = "jpn";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub id: String,
    pub citation_id: String,
    pub reference_system_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_temporal_extent: Option<TemporalExtent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_geographic_extent: Option<GeographicExtent>,
}

impl SourceMetadata {
    pub fn new(citation_id: impl Into<String>, reference_system_id: impl Into<String>) -> Self {
        Self {
            id: short_id(IdPrefix::Source),
            citation_id: citation_id.into(),
            reference_system_id: reference_system_id.into(),
            additional_temporal_extent: None,
            additional_geographic_extent: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_temporal_extent(mut self, extent: TemporalExtent) -> Self {
        self.additional_temporal_extent = Some(extent);
        self
    }

    pub fn with_geographic_extent(mut self, extent: GeographicExtent) -> Self {
        self.additional_geographic_extent = Some(extent);
        self
    }

    /// Flat form of a source for the parent (source-level) collection.
    pub fn to_collection_metadata(&self) -> Result<FlatMeta> {
        flatten::flatten_source(self)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(g) = &self.additional_geographic_extent {
            g.validate()?;
        }
        if let Some(t) = &self.additional_temporal_extent {
            t.validate()?;
        }
        Ok(())
    }
}

impl Entity for SourceMetadata {
    fn to_dict(&self) -> Value {
        let mut v = json!({
            "id": self.id,
            "citation_id": self.citation_id,
            "reference_system_id": self.reference_system_id,
        });
        if let Some(t) = &self.additional_temporal_extent {
            v["additional_temporal_extent"] = t.to_canonical();
        }
        if let Some(g) = &self.additional_geographic_extent {
            v["additional_geographic_extent"] = g.to_canonical();
        }
        v
    }

    fn to_searchable_metadata(&self) -> Result<FlatMeta> {
        self.to_collection_metadata()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentsMetadata {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub topic_category: Option<String>,
    #[serde(default)]
    pub keyword_ids: Vec<String>,
    pub geographic_extent: GeographicExtent,
    pub temporal_extent: TemporalExtent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_class_root: Option<CustomClass>,
}

impl ContentsMetadata {
    /// Both extents are required; every other field starts empty.
    pub fn new(geographic_extent: GeographicExtent, temporal_extent: TemporalExtent) -> Self {
        Self {
            id: short_id(IdPrefix::Contents),
            title: None,
            reference: None,
            abstract_text: None,
            topic_category: None,
            keyword_ids: Vec::new(),
            geographic_extent,
            temporal_extent,
            custom_class_root: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
        self.abstract_text = Some(text.into());
        self
    }

    pub fn with_topic_category(mut self, topic: impl Into<String>) -> Self {
        self.topic_category = Some(topic.into());
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keyword_ids = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_custom_class(mut self, root: CustomClass) -> Self {
        self.custom_class_root = Some(root);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.geographic_extent.validate()?;
        self.temporal_extent.validate()
    }
}

impl Entity for ContentsMetadata {
    fn to_dict(&self) -> Value {
        let mut v = json!({
            "id": self.id,
            "title": self.title,
            "reference": self.reference,
            "abstract": self.abstract_text,
            "topic_category": self.topic_category,
            "keyword_ids": self.keyword_ids,
            "geographic_extent": self.geographic_extent.to_canonical(),
            "temporal_extent": self.temporal_extent.to_canonical(),
        });
        if let Some(root) = &self.custom_class_root {
            v[format!("class: {}", root.classname)] = root.to_dict();
        }
        v
    }

    fn to_searchable_metadata(&self) -> Result<FlatMeta> {
        flatten::flatten_contents(self)
    }
}

/// Aggregate root. Built once per document, then only extended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub id: String,
    pub datastamp: DateTime<Utc>,
    pub language: String,
    pub contact_id: String,
    #[serde(default)]
    pub sources: Vec<SourceMetadata>,
    #[serde(default)]
    pub contents: Vec<ContentsMetadata>,
}

impl Metadata {
    pub fn new(contact_id: impl Into<String>) -> Self {
        Self {
            id: short_id(IdPrefix::Metadata),
            datastamp: Utc::now(),
            language: DEFAULT_LANGUAGE.to_string(),
            contact_id: contact_id.into(),
            sources: Vec::new(),
            contents: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_datastamp(mut self, datastamp: DateTime<Utc>) -> Self {
        self.datastamp = datastamp;
        self
    }

    pub fn add_source(&mut self, source: SourceMetadata) -> Result<()> {
        if self.sources.iter().any(|s| s.id == source.id) {
            return Err(Error::validation(format!("metadata '{}': duplicate source id '{}'", self.id, source.id)));
        }
        self.sources.push(source);
        Ok(())
    }

    pub fn add_contents(&mut self, contents: ContentsMetadata) -> Result<()> {
        if self.contents.iter().any(|c| c.id == contents.id) {
            return Err(Error::validation(format!("metadata '{}': duplicate contents id '{}'", self.id, contents.id)));
        }
        self.contents.push(contents);
        Ok(())
    }

    pub fn datastamp_rfc3339(&self) -> String {
        self.datastamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn validate(&self) -> Result<()> {
        for s in &self.sources {
            s.validate()?;
        }
        for c in &self.contents {
            c.validate()?;
        }
        Ok(())
    }
}

impl Entity for Metadata {
    fn to_dict(&self) -> Value {
        json!({
            "id": self.id,
            "datastamp": self.datastamp_rfc3339(),
            "language": self.language,
            "contact_id": self.contact_id,
            "sources": self.sources.iter().map(Entity::to_dict).collect::<Vec<_>>(),
            "contents": self.contents.iter().map(Entity::to_dict).collect::<Vec<_>>(),
        })
    }

    fn to_searchable_metadata(&self) -> Result<FlatMeta> {
        Ok(flatten::flatten_metadata(self))
    }
}
