use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;

use metarag_core::attribute::{Attribute, Datatype};
use metarag_core::boundary::CallGuard;
use metarag_core::custom_class::CustomClass;
use metarag_core::error::Error;
use metarag_core::extent::{GeographicExtent, TemporalExtent};
use metarag_core::metadata::{ContentsMetadata, Metadata, SourceMetadata};
use metarag_logic::{
    metadata_to_facts, ConsistencyChecker, EmbeddedEngine, Fact, Goal, RuleEngine, SwiplEngine, Term,
};

fn contents(id: &str) -> ContentsMetadata {
    ContentsMetadata::new(
        GeographicExtent::point(35.0, 139.0),
        TemporalExtent::numeric(1600.0, None, 1700.0, "Edo"),
    )
    .with_id(id)
}

fn root(id: &str, contents_ids: &[&str]) -> Metadata {
    let mut m = Metadata::new("alice").with_id(id);
    for c in contents_ids {
        m.add_contents(contents(c)).unwrap();
    }
    m
}

fn rendered(facts: &[Fact]) -> Vec<String> {
    facts.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn shared_contents_is_reported_once() {
    let checker = ConsistencyChecker::new(Arc::new(EmbeddedEngine::new()));
    checker.submit(&root("M1", &["C"])).await.unwrap();
    checker.submit(&root("M2", &["C"])).await.unwrap();

    assert_eq!(checker.check_composition_consistency().await.unwrap(), vec!["C".to_string()]);
    // the check is read-only
    assert_eq!(checker.check_composition_consistency().await.unwrap(), vec!["C".to_string()]);
}

#[tokio::test]
async fn one_to_one_composition_is_consistent() {
    let checker = ConsistencyChecker::new(Arc::new(EmbeddedEngine::new()));
    checker.submit(&root("M1", &["C1", "C2"])).await.unwrap();
    checker.submit(&root("M2", &["C3"])).await.unwrap();
    assert!(checker.check_composition_consistency().await.unwrap().is_empty());
}

#[tokio::test]
async fn violations_keep_first_seen_order() {
    let checker = ConsistencyChecker::new(Arc::new(EmbeddedEngine::new()));
    checker.submit(&root("M1", &["B", "A"])).await.unwrap();
    checker.submit(&root("M2", &["A", "B"])).await.unwrap();
    checker.submit(&root("M3", &["B"])).await.unwrap();
    assert_eq!(checker.check_composition_consistency().await.unwrap(), vec!["B".to_string(), "A".to_string()]);
}

#[tokio::test]
async fn resubmitting_the_same_aggregate_is_not_a_violation() {
    let engine = Arc::new(EmbeddedEngine::new());
    let checker = ConsistencyChecker::new(engine.clone());
    let m = root("M1", &["C"]);
    let n = checker.submit(&m).await.unwrap();
    checker.submit(&m).await.unwrap();
    assert_eq!(engine.len(), n);
    assert!(checker.check_composition_consistency().await.unwrap().is_empty());
}

#[test]
fn facts_start_with_metadata_header() {
    let m = root("M1", &[]).with_language("eng").with_datastamp(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
    let facts = rendered(&metadata_to_facts(&m));
    assert_eq!(facts[0], "metadata('M1')");
    assert_eq!(facts[1], "metadata_attribute('M1', id, 'M1')");
    assert_eq!(facts[2], "metadata_attribute('M1', datastamp, '2024-01-02T03:04:05Z')");
    assert_eq!(facts[3], "metadata_attribute('M1', language, 'eng')");
    assert_eq!(facts[4], "metadata_contact('M1', 'alice')");
    assert_eq!(facts.len(), 5);
}

#[test]
fn string_literals_are_escaped() {
    let mut m = root("M1", &[]);
    m.add_contents(contents("C").with_title("O'Brien \\ notes")).unwrap();
    let facts = rendered(&metadata_to_facts(&m));
    assert!(facts.contains(&r"contents_attribute('C', title, 'O\'Brien \\ notes')".to_string()));
    assert!(!facts.iter().any(|f| f.starts_with("contents_attribute('C', abstract")));
}

#[test]
fn source_and_contents_facts() {
    let mut m = root("M1", &[]);
    m.add_source(SourceMetadata::new("cit", "WGS84").with_id("S")).unwrap();
    m.add_contents(contents("C").with_keywords(["edo", "kanto"])).unwrap();
    let facts = rendered(&metadata_to_facts(&m));
    for expected in [
        "sourceMetadata('S')",
        "aggregates_source('M1', 'S')",
        "has_citation('S', 'cit')",
        "has_reference_system('S', 'WGS84')",
        "contentsMetadata('C')",
        "composes_contents('M1', 'C')",
        "has_keyword('C', 'edo')",
        "has_keyword('C', 'kanto')",
        "has_geographic_extent('C', 'geo_C')",
        "geographic_extent_is_point('geo_C', point('35.0', '139.0'))",
        "has_temporal_extent('C', 'temp_C')",
        "temporal_extent_is_numeric('temp_C', 1600.0, none, 1700.0)",
        "temporal_extent_description('temp_C', 'Edo')",
    ] {
        assert!(facts.contains(&expected.to_string()), "missing {expected}: {facts:?}");
    }
}

#[test]
fn temporal_variants_map_to_their_predicates() {
    let t0 = Utc.with_ymd_and_hms(1700, 1, 1, 0, 0, 0).unwrap();
    let t1 = Utc.with_ymd_and_hms(1800, 1, 1, 0, 0, 0).unwrap();

    let mut m = root("M1", &[]);
    m.add_contents(ContentsMetadata::new(GeographicExtent::place("Edo", ""), TemporalExtent::period(t0, None, t0)).with_id("I")).unwrap();
    m.add_contents(ContentsMetadata::new(GeographicExtent::bbox(36.0, 139.0, 35.0, 140.0), TemporalExtent::period(t0, None, t1)).with_id("P")).unwrap();
    let facts = rendered(&metadata_to_facts(&m));

    assert!(facts.contains(&"temporal_extent_is_instant('temp_I', '1700-01-01T00:00:00Z')".to_string()));
    assert!(facts.contains(&"geographic_extent_is_description('geo_I', 'Edo')".to_string()));
    assert!(facts.contains(
        &"temporal_extent_is_period('temp_P', '1700-01-01T00:00:00Z', none, '1800-01-01T00:00:00Z')".to_string()
    ));
    assert!(facts.contains(
        &"geographic_extent_is_surface('geo_P', 'POLYGON((139.0 35.0, 140.0 35.0, 140.0 36.0, 139.0 36.0, 139.0 35.0))')"
            .to_string()
    ));
}

#[test]
fn class_tree_facts_are_nested() {
    let mut doc = CustomClass::new("Document").with_id("K1");
    let mut year = Attribute::new("year", json!("1701"), Datatype::Int).with_id("A1");
    year.add_child(Attribute::new("approx", json!(true), Datatype::Bool).with_id("A2")).unwrap();
    doc.add_attribute(year).unwrap();
    doc.add_child(CustomClass::new("Vessel").with_id("K2")).unwrap();

    let mut m = root("M1", &[]);
    m.add_contents(contents("C").with_custom_class(doc)).unwrap();
    let facts = rendered(&metadata_to_facts(&m));
    for expected in [
        "aggregates_custom('C', 'K1')",
        "custom_class('K1', 'Document')",
        "custom_class_attribute('K1', 'A1')",
        "attribute('A1')",
        "attribute_value('A1', 'year', 1701, 'int', '')",
        "attribute_child('A1', 'A2')",
        "attribute_value('A2', 'approx', true, 'bool', '')",
        "custom_class_child('K1', 'K2')",
        "custom_class('K2', 'Vessel')",
    ] {
        assert!(facts.contains(&expected.to_string()), "missing {expected}: {facts:?}");
    }
}

#[test]
fn deserialized_attributes_are_coerced_in_facts() {
    let attr: Attribute = serde_json::from_value(json!({"id": "A9", "key": "power", "value": "250", "datatype": "int"})).unwrap();
    let mut doc = CustomClass::new("Engine").with_id("K9");
    doc.add_attribute(attr).unwrap();

    let mut m = root("M1", &[]);
    m.add_contents(contents("C").with_custom_class(doc)).unwrap();
    let facts = rendered(&metadata_to_facts(&m));
    assert!(facts.contains(&"attribute_value('A9', 'power', 250, 'int', '')".to_string()), "{facts:?}");
}

#[tokio::test]
async fn pattern_queries_bind_variables() {
    let engine = EmbeddedEngine::new();
    engine.assert_facts(&metadata_to_facts(&root("M1", &["C"]))).await.unwrap();
    engine.assert_facts(&metadata_to_facts(&root("M2", &["C", "D"]))).await.unwrap();

    let goal = Goal::new("composes_contents", vec![Goal::var("M"), Goal::constant("C")]);
    let rows = engine.query(&goal).await.unwrap();
    let owners: Vec<_> = rows.iter().map(|b| b["M"].text().unwrap().to_string()).collect();
    assert_eq!(owners, vec!["M1", "M2"]);

    let same = Goal::new("composes_contents", vec![Goal::var("X"), Goal::var("X")]);
    assert!(engine.query(&same).await.unwrap().is_empty());

    let any = Goal::new("composes_contents", vec![Goal::var("_"), Goal::var("_")]);
    assert_eq!(engine.query(&any).await.unwrap().len(), 3);
}

#[tokio::test]
async fn shared_contents_yields_one_solution_per_id() {
    let engine = EmbeddedEngine::new();
    for m in ["M1", "M2", "M3"] {
        engine.assert_facts(&metadata_to_facts(&root(m, &["C"]))).await.unwrap();
    }
    engine.assert_facts(&metadata_to_facts(&root("M4", &["D"]))).await.unwrap();
    let rows = engine.query(&Goal::inconsistent_composition()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["X"].text(), Some("C"));
}

#[tokio::test]
async fn empty_predicate_is_rejected() {
    let engine = EmbeddedEngine::new();
    let err = engine.assert_facts(&[Fact::new("", vec![Term::atom("a")])]).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(engine.is_empty());
}

#[test]
fn goals_render_as_prolog() {
    assert_eq!(Goal::inconsistent_composition().to_string(), "inconsistent_composition(X)");
    let g = Goal::new("has_keyword", vec![Goal::constant("it's"), Goal::var("K")]);
    assert_eq!(g.to_string(), r"has_keyword('it\'s', K)");
    assert_eq!(g.variables(), vec!["K"]);
}

fn swipl_available() -> bool {
    std::process::Command::new("swipl")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn kb_file() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("kb/metadata_rules.pl")
}

#[tokio::test]
async fn missing_knowledge_base_is_a_config_error() {
    let guard = CallGuard::with_timeout(Duration::from_secs(5));
    let err = SwiplEngine::spawn(&PathBuf::from("swipl"), &PathBuf::from("/nonexistent/rules.pl"), guard).await;
    assert!(matches!(err, Err(Error::Config(_))));
}

#[tokio::test]
async fn swipl_engine_reports_shared_contents() {
    if !swipl_available() {
        eprintln!("swipl not found; skipping");
        return;
    }
    let guard = CallGuard::with_timeout(Duration::from_secs(20));
    let engine = SwiplEngine::spawn(&PathBuf::from("swipl"), &kb_file(), guard).await.unwrap();
    let checker = ConsistencyChecker::new(Arc::new(engine));
    checker.submit(&root("M1", &["C", "D"])).await.unwrap();
    checker.submit(&root("M2", &["C"])).await.unwrap();
    assert_eq!(checker.check_composition_consistency().await.unwrap(), vec!["C".to_string()]);
}

#[tokio::test]
async fn swipl_engine_ignores_resubmitted_facts() {
    if !swipl_available() {
        eprintln!("swipl not found; skipping");
        return;
    }
    let guard = CallGuard::with_timeout(Duration::from_secs(20));
    let engine = SwiplEngine::spawn(&PathBuf::from("swipl"), &kb_file(), guard).await.unwrap();
    let facts = metadata_to_facts(&root("M1", &["C"]));
    engine.assert_facts(&facts).await.unwrap();
    engine.assert_facts(&facts).await.unwrap();

    let goal = Goal::new("composes_contents", vec![Goal::var("M"), Goal::var("C")]);
    assert_eq!(engine.query(&goal).await.unwrap().len(), 1);
}
