//! Conversion of a metadata aggregate into ground facts.
//!
//! Derived extent ids are `geo_<contents id>` and `temp_<contents id>`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use metarag_core::attribute::Attribute;
use metarag_core::custom_class::CustomClass;
use metarag_core::extent::{fmt_float, GeographicExtent, TemporalExtent};
use metarag_core::metadata::{ContentsMetadata, Metadata, SourceMetadata};

use crate::fact;
use crate::term::{Fact, Term};

fn iso(d: &DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn none() -> Term { Term::atom("none") }

pub fn metadata_to_facts(meta: &Metadata) -> Vec<Fact> {
    let m = meta.id.as_str();
    let mut facts = vec![
        fact!("metadata", m),
        Fact::new("metadata_attribute", vec![m.into(), Term::atom("id"), m.into()]),
        Fact::new("metadata_attribute", vec![m.into(), Term::atom("datastamp"), meta.datastamp_rfc3339().into()]),
        Fact::new("metadata_attribute", vec![m.into(), Term::atom("language"), meta.language.as_str().into()]),
        fact!("metadata_contact", m, meta.contact_id.as_str()),
    ];
    for src in &meta.sources {
        source_facts(m, src, &mut facts);
    }
    for cont in &meta.contents {
        contents_facts(m, cont, &mut facts);
    }
    facts
}

fn source_facts(m: &str, src: &SourceMetadata, facts: &mut Vec<Fact>) {
    let s = src.id.as_str();
    facts.push(fact!("sourceMetadata", s));
    facts.push(fact!("aggregates_source", m, s));
    facts.push(fact!("has_citation", s, src.citation_id.as_str()));
    facts.push(fact!("has_reference_system", s, src.reference_system_id.as_str()));
    if let Some(t) = &src.additional_temporal_extent {
        facts.push(Fact::new(
            "source_attribute",
            vec![s.into(), Term::atom("additional_temporal_extent"), t.to_canonical().to_string().into()],
        ));
    }
    if let Some(g) = &src.additional_geographic_extent {
        facts.push(Fact::new(
            "source_attribute",
            vec![s.into(), Term::atom("additional_geographic_extent"), g.to_canonical().to_string().into()],
        ));
    }
}

fn contents_facts(m: &str, cont: &ContentsMetadata, facts: &mut Vec<Fact>) {
    let c = cont.id.as_str();
    facts.push(fact!("contentsMetadata", c));
    facts.push(fact!("composes_contents", m, c));
    let fields = [
        ("title", &cont.title),
        ("reference", &cont.reference),
        ("abstract", &cont.abstract_text),
        ("topicCategory", &cont.topic_category),
    ];
    for (name, value) in fields {
        if let Some(v) = value {
            facts.push(Fact::new("contents_attribute", vec![c.into(), Term::atom(name), v.into()]));
        }
    }
    for kw in &cont.keyword_ids {
        facts.push(fact!("has_keyword", c, kw));
    }

    let geo_id = format!("geo_{c}");
    facts.push(fact!("has_geographic_extent", c, geo_id.as_str()));
    facts.push(geographic_fact(&geo_id, &cont.geographic_extent));

    let temp_id = format!("temp_{c}");
    facts.push(fact!("has_temporal_extent", c, temp_id.as_str()));
    temporal_facts(&temp_id, &cont.temporal_extent, facts);

    if let Some(root) = &cont.custom_class_root {
        facts.push(fact!("aggregates_custom", c, root.id.as_str()));
        class_facts(root, facts);
    }
}

fn geographic_fact(g: &str, geo: &GeographicExtent) -> Fact {
    match geo {
        GeographicExtent::StringPlace { place_name, .. } => fact!("geographic_extent_is_description", g, place_name),
        GeographicExtent::Point { lat, lon } => Fact::new(
            "geographic_extent_is_point",
            vec![g.into(), Term::Compound("point".into(), vec![fmt_float(*lat).into(), fmt_float(*lon).into()])],
        ),
        GeographicExtent::BoundingBox { .. } | GeographicExtent::Surface { .. } => {
            fact!("geographic_extent_is_surface", g, geo.wkt().unwrap_or_default())
        }
    }
}

fn temporal_facts(t: &str, temp: &TemporalExtent, facts: &mut Vec<Fact>) {
    match temp {
        TemporalExtent::Period { date_from, date_expected: None, date_to } if date_from == date_to => {
            facts.push(fact!("temporal_extent_is_instant", t, iso(date_from)));
        }
        TemporalExtent::Period { date_from, date_expected, date_to } => {
            let expected = date_expected.as_ref().map_or_else(none, |d| iso(d).into());
            facts.push(Fact::new(
                "temporal_extent_is_period",
                vec![t.into(), iso(date_from).into(), expected, iso(date_to).into()],
            ));
        }
        TemporalExtent::StringDescriptive { date_from, date_expected, date_to, description } => {
            let expected = date_expected.as_ref().map_or_else(none, Term::from);
            facts.push(Fact::new(
                "temporal_extent_is_description",
                vec![t.into(), date_from.into(), expected, date_to.into()],
            ));
            if !description.is_empty() {
                facts.push(fact!("temporal_extent_description", t, description));
            }
        }
        TemporalExtent::Numeric { date_from, date_expected, date_to, description } => {
            let expected = date_expected.map_or_else(none, Term::Float);
            facts.push(Fact::new(
                "temporal_extent_is_numeric",
                vec![t.into(), Term::Float(*date_from), expected, Term::Float(*date_to)],
            ));
            if !description.is_empty() {
                facts.push(fact!("temporal_extent_description", t, description));
            }
        }
        TemporalExtent::BetaDistribution { description, start_instant, end_instant, alpha, beta, .. } => {
            facts.push(fact!("temporal_extent_is_beta_distribution", t));
            facts.push(fact!("beta_dist_universe", t, iso(start_instant), iso(end_instant)));
            facts.push(fact!("beta_dist_params", t, *alpha, *beta));
            facts.push(fact!("beta_dist_description", t, description));
        }
    }
}

fn value_term(v: &Value) -> Term {
    match v {
        Value::String(s) => Term::Str(s.clone()),
        Value::Number(n) => n.as_i64().map(Term::Int).or_else(|| n.as_f64().map(Term::Float)).unwrap_or_else(|| Term::Str(n.to_string())),
        Value::Bool(b) => Term::atom(if *b { "true" } else { "false" }),
        other => Term::Str(other.to_string()),
    }
}

fn attribute_facts(attr: &Attribute, facts: &mut Vec<Fact>) {
    let a = attr.id.as_str();
    facts.push(fact!("attribute", a));
    facts.push(Fact::new(
        "attribute_value",
        vec![a.into(), attr.key.as_str().into(), value_term(&attr.coerced().value), attr.datatype.as_str().into(), attr.description.as_str().into()],
    ));
    for child in &attr.children {
        facts.push(fact!("attribute_child", a, child.id.as_str()));
        attribute_facts(child, facts);
    }
}

fn class_facts(class: &CustomClass, facts: &mut Vec<Fact>) {
    let id = class.id.as_str();
    facts.push(fact!("custom_class", id, class.classname.as_str()));
    for attr in &class.attributes {
        facts.push(fact!("custom_class_attribute", id, attr.id.as_str()));
        attribute_facts(attr, facts);
    }
    for child in &class.children {
        facts.push(fact!("custom_class_child", id, child.id.as_str()));
        class_facts(child, facts);
    }
}
