//! Projection of the typed metadata tree into flat, filterable key-value maps.
//!
//! Key layout:
//! - contents fields: `id`, `title`, `reference`, `abstract`, `topic_category`, `keywords_str`, `structured`
//! - geographic extent: `geo_type`, `geo_lat`/`geo_lon`, `geo_north`/`west`/`south`/`east`, `geo_place`, `geo_desc`, `geo_wkt`
//! - temporal extent: `temp_type`, `temp_period_*`, `temp_str_*`, `temp_num_*`, `temp_dist_*`, `temp_desc`
//! - class tree: `Root/Child/key`
//!
//! Source records use the same layout behind an `src_` prefix. A key is never
//! written twice: a collision is a validation error.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::custom_class::CustomClass;
use crate::error::{Error, Result};
use crate::extent::{GeographicExtent, TemporalExtent};
use crate::metadata::{ContentsMetadata, Metadata, SourceMetadata};
use crate::traits::Entity;
use crate::types::{FlatMeta, MetaValue};

/// Insert `key` unless it is already present.
pub fn insert_unique(out: &mut FlatMeta, key: impl Into<String>, value: impl Into<MetaValue>) -> Result<()> {
    let key = key.into();
    if out.contains_key(&key) {
        return Err(Error::validation(format!("flattened key collision: '{key}'")));
    }
    out.insert(key, value.into());
    Ok(())
}

/// Union of two maps with disjoint keys.
pub fn merge_disjoint(mut base: FlatMeta, other: FlatMeta) -> Result<FlatMeta> {
    for (k, v) in other {
        insert_unique(&mut base, k, v)?;
    }
    Ok(base)
}

fn rfc3339(d: &DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn flatten_geographic(prefix: &str, geo: &GeographicExtent, out: &mut FlatMeta) -> Result<()> {
    let k = |name: &str| format!("{prefix}geo_{name}");
    insert_unique(out, k("type"), geo.kind())?;
    match geo {
        GeographicExtent::StringPlace { place_name, description } => {
            insert_unique(out, k("place"), place_name.as_str())?;
            if !description.is_empty() {
                insert_unique(out, k("desc"), description.as_str())?;
            }
        }
        GeographicExtent::Point { lat, lon } => {
            insert_unique(out, k("lat"), *lat)?;
            insert_unique(out, k("lon"), *lon)?;
        }
        GeographicExtent::BoundingBox { north, west, south, east } => {
            insert_unique(out, k("north"), *north)?;
            insert_unique(out, k("west"), *west)?;
            insert_unique(out, k("south"), *south)?;
            insert_unique(out, k("east"), *east)?;
        }
        GeographicExtent::Surface { .. } => {}
    }
    if let Some(wkt) = geo.wkt() {
        insert_unique(out, k("wkt"), wkt)?;
    }
    Ok(())
}

pub fn flatten_temporal(prefix: &str, temp: &TemporalExtent, out: &mut FlatMeta) -> Result<()> {
    // non-finite numbers would serialize as null and poison the stored row
    temp.validate()?;
    let k = |name: &str| format!("{prefix}temp_{name}");
    insert_unique(out, k("type"), temp.kind())?;
    match temp {
        TemporalExtent::Period { date_from, date_expected, date_to } => {
            insert_unique(out, k("period_from"), date_from.timestamp())?;
            if let Some(e) = date_expected {
                insert_unique(out, k("period_expected"), e.timestamp())?;
            }
            insert_unique(out, k("period_to"), date_to.timestamp())?;
        }
        TemporalExtent::StringDescriptive { date_from, date_expected, date_to, .. } => {
            insert_unique(out, k("str_from"), date_from.as_str())?;
            if let Some(e) = date_expected {
                insert_unique(out, k("str_expected"), e.as_str())?;
            }
            insert_unique(out, k("str_to"), date_to.as_str())?;
        }
        TemporalExtent::Numeric { date_from, date_expected, date_to, .. } => {
            insert_unique(out, k("num_from"), *date_from)?;
            if let Some(e) = date_expected {
                insert_unique(out, k("num_expected"), *e)?;
            }
            insert_unique(out, k("num_to"), *date_to)?;
        }
        TemporalExtent::BetaDistribution { start_instant, expected_instant, end_instant, alpha, beta, .. } => {
            insert_unique(out, k("dist_start"), rfc3339(start_instant))?;
            if let Some(e) = expected_instant {
                insert_unique(out, k("dist_expected"), rfc3339(e))?;
            }
            insert_unique(out, k("dist_end"), rfc3339(end_instant))?;
            insert_unique(out, k("dist_alpha"), *alpha)?;
            insert_unique(out, k("dist_beta"), *beta)?;
        }
    }
    if let Some(desc) = temp.description() {
        insert_unique(out, k("desc"), desc)?;
    }
    Ok(())
}

/// One key per attribute in the class tree: `/`-joined classnames, then the key.
pub fn flatten_class(root: &CustomClass) -> Result<FlatMeta> {
    let mut out = FlatMeta::new();
    walk_class(root, &root.classname, &mut out)?;
    Ok(out)
}

fn walk_class(node: &CustomClass, path: &str, out: &mut FlatMeta) -> Result<()> {
    for attr in &node.attributes {
        let coerced = attr.coerced().value;
        let value = MetaValue::from_json(&coerced).unwrap_or_else(|| MetaValue::Str(canonical_json(&coerced)));
        insert_unique(out, format!("{path}/{}", attr.key), value)?;
    }
    for child in &node.children {
        walk_class(child, &format!("{path}/{}", child.classname), out)?;
    }
    Ok(())
}

fn canonical_json(v: &Value) -> String {
    serde_json::to_string(v).unwrap_or_default()
}

pub fn flatten_contents(contents: &ContentsMetadata) -> Result<FlatMeta> {
    let mut out = FlatMeta::new();
    let or_empty = |s: &Option<String>| s.clone().unwrap_or_default();
    insert_unique(&mut out, "id", contents.id.as_str())?;
    insert_unique(&mut out, "title", or_empty(&contents.title))?;
    insert_unique(&mut out, "reference", or_empty(&contents.reference))?;
    insert_unique(&mut out, "abstract", or_empty(&contents.abstract_text))?;
    insert_unique(&mut out, "topic_category", or_empty(&contents.topic_category))?;
    insert_unique(&mut out, "keywords_str", contents.keyword_ids.join(","))?;
    insert_unique(&mut out, "structured", canonical_json(&contents.to_dict()))?;
    flatten_geographic("", &contents.geographic_extent, &mut out)?;
    flatten_temporal("", &contents.temporal_extent, &mut out)?;
    match &contents.custom_class_root {
        Some(root) => merge_disjoint(out, flatten_class(root)?),
        None => Ok(out),
    }
}

pub fn flatten_source(source: &SourceMetadata) -> Result<FlatMeta> {
    let mut out = FlatMeta::new();
    insert_unique(&mut out, "src_id", source.id.as_str())?;
    insert_unique(&mut out, "src_citation_id", source.citation_id.as_str())?;
    insert_unique(&mut out, "src_reference_system_id", source.reference_system_id.as_str())?;
    insert_unique(&mut out, "src_structured", canonical_json(&source.to_dict()))?;
    if let Some(g) = &source.additional_geographic_extent {
        flatten_geographic("src_", g, &mut out)?;
    }
    if let Some(t) = &source.additional_temporal_extent {
        flatten_temporal("src_", t, &mut out)?;
    }
    Ok(out)
}

pub fn flatten_metadata(meta: &Metadata) -> FlatMeta {
    let mut out = FlatMeta::new();
    out.insert("metadata_id".into(), meta.id.as_str().into());
    out.insert("language".into(), meta.language.as_str().into());
    out.insert("contact_id".into(), meta.contact_id.as_str().into());
    out.insert("datastamp".into(), meta.datastamp_rfc3339().into());
    out
}
