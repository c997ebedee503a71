use chrono::{TimeZone, Utc};
use serde_json::json;

use metarag_core::attribute::{Attribute, Datatype};
use metarag_core::custom_class::CustomClass;
use metarag_core::error::Error;
use metarag_core::extent::{GeographicExtent, TemporalExtent};
use metarag_core::flatten::{flatten_class, flatten_geographic, flatten_temporal, merge_disjoint};
use metarag_core::metadata::{ContentsMetadata, Metadata, SourceMetadata};
use metarag_core::traits::Entity;
use metarag_core::types::{FlatMeta, MetaValue};

fn vessel() -> CustomClass {
    let mut vessel = CustomClass::new("Vessel");
    vessel.add_attribute(Attribute::new("tonnage", json!(500), Datatype::Int)).unwrap();
    let mut engine = CustomClass::new("Engine");
    engine.add_attribute(Attribute::new("power", json!("250"), Datatype::Int)).unwrap();
    vessel.add_child(engine).unwrap();
    vessel
}

#[test]
fn point_extent_flattens_with_wkt() {
    let mut out = FlatMeta::new();
    flatten_geographic("", &GeographicExtent::point(35.0, 139.0), &mut out).unwrap();
    assert_eq!(out.len(), 4);
    assert_eq!(out["geo_type"], MetaValue::from("point"));
    assert_eq!(out["geo_lat"], MetaValue::Float(35.0));
    assert_eq!(out["geo_lon"], MetaValue::Float(139.0));
    assert_eq!(out["geo_wkt"], MetaValue::from("POINT(139.0 35.0)"));
}

#[test]
fn string_place_has_no_wkt_and_optional_description() {
    let mut out = FlatMeta::new();
    flatten_geographic("", &GeographicExtent::place("Edo", ""), &mut out).unwrap();
    assert_eq!(out["geo_place"], MetaValue::from("Edo"));
    assert!(!out.contains_key("geo_wkt"));
    assert!(!out.contains_key("geo_desc"));

    let mut out = FlatMeta::new();
    flatten_geographic("", &GeographicExtent::place("Edo", "old Tokyo"), &mut out).unwrap();
    assert_eq!(out["geo_desc"], MetaValue::from("old Tokyo"));
}

#[test]
fn numeric_extent_flattens_to_floats() {
    let mut out = FlatMeta::new();
    let t = TemporalExtent::numeric(1600.0, Some(1650.0), 1700.0, "Edo era");
    flatten_temporal("", &t, &mut out).unwrap();
    assert_eq!(out.len(), 5);
    assert_eq!(out["temp_type"], MetaValue::from("number"));
    assert_eq!(out["temp_num_from"], MetaValue::Float(1600.0));
    assert_eq!(out["temp_num_expected"], MetaValue::Float(1650.0));
    assert_eq!(out["temp_num_to"], MetaValue::Float(1700.0));
    assert_eq!(out["temp_desc"], MetaValue::from("Edo era"));
}

#[test]
fn period_without_expected_emits_epoch_seconds() {
    let from = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
    let to = Utc.with_ymd_and_hms(1970, 1, 2, 0, 0, 0).unwrap();
    let mut out = FlatMeta::new();
    flatten_temporal("", &TemporalExtent::period(from, None, to), &mut out).unwrap();
    assert_eq!(out["temp_type"], MetaValue::from("period"));
    assert_eq!(out["temp_period_from"], MetaValue::Int(0));
    assert_eq!(out["temp_period_to"], MetaValue::Int(86_400));
    assert!(!out.contains_key("temp_period_expected"));
    assert!(!out.contains_key("temp_desc"));
}

#[test]
fn distribution_emits_rfc3339_and_shape() {
    let start = Utc.with_ymd_and_hms(1600, 1, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(1700, 1, 1, 0, 0, 0).unwrap();
    let t = TemporalExtent::beta("late Sengoku", start, None, end, 2.0, 5.0);
    let mut out = FlatMeta::new();
    flatten_temporal("", &t, &mut out).unwrap();
    assert_eq!(out["temp_type"], MetaValue::from("distribution"));
    assert_eq!(out["temp_dist_start"], MetaValue::from("1600-01-01T00:00:00Z"));
    assert_eq!(out["temp_dist_end"], MetaValue::from("1700-01-01T00:00:00Z"));
    assert_eq!(out["temp_dist_alpha"], MetaValue::Float(2.0));
    assert_eq!(out["temp_dist_beta"], MetaValue::Float(5.0));
    assert_eq!(out["temp_desc"], MetaValue::from("late Sengoku"));
}

#[test]
fn class_tree_flattens_by_path() {
    let out = flatten_class(&vessel()).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out["Vessel/tonnage"], MetaValue::Int(500));
    assert_eq!(out["Vessel/Engine/power"], MetaValue::Int(250));
}

#[test]
fn non_scalar_attribute_becomes_json_string() {
    let mut root = CustomClass::new("Doc");
    root.add_attribute(Attribute::new("tags", json!(["a", "b"]), Datatype::Unspecified)).unwrap();
    let out = flatten_class(&root).unwrap();
    assert_eq!(out["Doc/tags"], MetaValue::from(r#"["a","b"]"#));
}

#[test]
fn class_path_collision_is_rejected() {
    let mut root = CustomClass::new("A");
    root.add_attribute(Attribute::new("B/c", json!(1), Datatype::Int)).unwrap();
    let mut b = CustomClass::new("B");
    b.add_attribute(Attribute::new("c", json!(2), Datatype::Int)).unwrap();
    root.add_child(b).unwrap();
    assert!(matches!(flatten_class(&root), Err(Error::Validation(_))));
}

#[test]
fn contents_key_count_is_sum_of_parts() {
    let contents = ContentsMetadata::new(
        GeographicExtent::point(35.0, 139.0),
        TemporalExtent::numeric(1600.0, Some(1650.0), 1700.0, "Edo era"),
    )
    .with_id("cont_1")
    .with_title("Kaidan")
    .with_keywords(["edo", "ghost"])
    .with_custom_class(vessel());

    let flat = contents.to_searchable_metadata().unwrap();
    // 7 record fields + 4 geographic + 5 temporal + 2 attributes
    assert_eq!(flat.len(), 18);
    assert_eq!(flat["id"], MetaValue::from("cont_1"));
    assert_eq!(flat["reference"], MetaValue::from(""));
    assert_eq!(flat["keywords_str"], MetaValue::from("edo,ghost"));
    assert_eq!(flat["Vessel/Engine/power"], MetaValue::Int(250));

    let structured = flat["structured"].as_str().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(structured).unwrap();
    assert_eq!(parsed["geographic_extent"]["wkt"], "POINT(139.0 35.0)");
    assert_eq!(parsed["class: Vessel"]["classname"], "Vessel");
}

#[test]
fn merge_disjoint_rejects_collisions() {
    let mut a = FlatMeta::new();
    a.insert("id".into(), "x".into());
    let mut b = FlatMeta::new();
    b.insert("doc_id".into(), "d".into());
    let merged = merge_disjoint(a.clone(), b).unwrap();
    assert_eq!(merged.len(), 2);

    let mut c = FlatMeta::new();
    c.insert("id".into(), "y".into());
    assert!(matches!(merge_disjoint(a, c), Err(Error::Validation(_))));
}

#[test]
fn source_uses_src_prefix() {
    let src = SourceMetadata::new("cit-1", "WGS84")
        .with_id("src_1")
        .with_geographic_extent(GeographicExtent::bbox(40.0, 130.0, 30.0, 140.0));
    let flat = src.to_collection_metadata().unwrap();
    assert_eq!(flat["src_id"], MetaValue::from("src_1"));
    assert_eq!(flat["src_citation_id"], MetaValue::from("cit-1"));
    assert_eq!(flat["src_reference_system_id"], MetaValue::from("WGS84"));
    assert_eq!(flat["src_geo_type"], MetaValue::from("bbox"));
    assert_eq!(flat["src_geo_north"], MetaValue::Float(40.0));
    assert!(flat.contains_key("src_geo_wkt"));
    assert!(flat.contains_key("src_structured"));
    assert!(!flat.keys().any(|k| k.starts_with("src_temp_")));
}

#[test]
fn metadata_root_flattens_identity_fields() {
    let meta = Metadata::new("alice").with_id("meta_1");
    let flat = meta.to_searchable_metadata().unwrap();
    assert_eq!(flat["metadata_id"], MetaValue::from("meta_1"));
    assert_eq!(flat["language"], MetaValue::from("jpn"));
    assert_eq!(flat["contact_id"], MetaValue::from("alice"));
    assert!(flat.contains_key("datastamp"));
}

#[test]
fn non_finite_numeric_extent_is_not_flattened() {
    let mut out = FlatMeta::new();
    let t = TemporalExtent::numeric(f64::NEG_INFINITY, None, f64::INFINITY, "open");
    assert!(matches!(flatten_temporal("", &t, &mut out), Err(Error::Validation(_))));
    assert!(out.is_empty());
}
