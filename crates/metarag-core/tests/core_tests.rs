use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use metarag_core::boundary::guarded;
use metarag_core::config::{parse_vector_stores, Config};
use metarag_core::custom_class::CustomClass;
use metarag_core::data_processor::{ChunkingConfig, DataProcessor};
use metarag_core::error::Error;
use metarag_core::extent::{GeographicExtent, TemporalExtent};
use metarag_core::sidecar::{parse_date, Sidecar};

#[test]
fn chunk_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let processor = DataProcessor::new();
    let docs = processor.list_documents(dir, None);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].doc_id, "a");
    assert_eq!(docs[0].sidecar, dir.join("a.json"));

    let content = processor.read_file_content(&docs[0].path).unwrap();
    let chunks = processor.chunk_content(&content, "a", &docs[0].path);
    assert_eq!(chunks.len(), 1, "one small paragraph becomes one chunk");
    assert_eq!(chunks[0].content.trim(), "Short text");
    assert_eq!(chunks[0].id, "a:0");
}

#[test]
fn list_documents_respects_limit_and_extensions() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "alpha bravo").unwrap();
    fs::write(dir.join("b.md"), "charlie delta").unwrap();
    fs::write(dir.join("b.json"), "{}").unwrap();

    let processor = DataProcessor::new();
    assert_eq!(processor.list_documents(dir, None).len(), 2);
    let limited = processor.list_documents(dir, Some(1));
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].doc_id, "a");
}

#[test]
fn long_paragraph_splits_with_overlap() {
    let processor = DataProcessor::with_config(ChunkingConfig { max_tokens: 20, overlap_percent: 0.2 });
    let text = (0..60).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
    let chunks = processor.chunk_content(&text, "doc", Path::new("doc.txt"));
    assert!(chunks.len() > 1);
    for c in &chunks {
        assert_eq!(c.total_chunks, chunks.len());
        assert!(c.chunk_index < c.total_chunks);
    }
    // 15 words per chunk, 3 words of overlap
    assert!(chunks[1].content.starts_with("w12 "));
}

#[test]
fn date_formats_parse() {
    assert!(parse_date("1603-03-24").is_some());
    assert!(parse_date("1603").is_some());
    assert!(parse_date("2020-05-01T12:00:00Z").is_some());
    assert!(parse_date("Keicho 8").is_none());
}

#[test]
fn sidecar_maps_onto_aggregate() {
    let json = r#"{
        "id": "kaidan",
        "title": "Ghost Stories",
        "author": ["Lafcadio Hearn", "Editor"],
        "publication_date": "1904",
        "era": "Meiji",
        "region": "Matsue",
        "domain": "folklore",
        "source_type": "book",
        "summary_text": "Japanese ghost stories.",
        "attributes": [
            {"namespace": "print", "classname": "Edition", "key": "pages", "value": "240", "datatype": "int"}
        ]
    }"#;
    let meta = Sidecar::from_json(json).unwrap().to_metadata("fallback", "WGS84").unwrap();
    assert_eq!(meta.id, "meta_kaidan");
    assert_eq!(meta.contact_id, "Lafcadio Hearn");
    assert_eq!(meta.sources[0].id, "src_kaidan");
    assert_eq!(meta.sources[0].citation_id, "kaidan");
    assert_eq!(meta.sources[0].reference_system_id, "WGS84");

    let c = &meta.contents[0];
    assert_eq!(c.id, "cont_kaidan");
    assert_eq!(c.reference.as_deref(), Some("1904"));
    assert_eq!(c.abstract_text.as_deref(), Some("Japanese ghost stories."));
    assert_eq!(c.keyword_ids, vec!["Meiji", "Matsue", "folklore"]);
    assert_eq!(c.geographic_extent, GeographicExtent::place("Matsue", ""));
    assert!(matches!(&c.temporal_extent, TemporalExtent::StringDescriptive { description, .. } if description == "Meiji"));

    let root: &CustomClass = c.custom_class_root.as_ref().unwrap();
    assert_eq!(root.classname, "Document");
    assert_eq!(root.attribute("author").unwrap().value, "Lafcadio Hearn, Editor");
    assert_eq!(root.get_by_path(&["print", "Edition", "pages"]).unwrap().value, 240);
}

#[test]
fn sidecar_without_era_uses_period_or_raw_date() {
    let meta = Sidecar::from_json(r#"{"author": "Solo", "publication_date": "1776-07-04"}"#)
        .unwrap()
        .to_metadata("stem", "WGS84")
        .unwrap();
    assert_eq!(meta.id, "meta_stem");
    assert_eq!(meta.contact_id, "Solo");
    assert!(matches!(meta.contents[0].temporal_extent, TemporalExtent::Period { .. }));
    assert_eq!(meta.contents[0].geographic_extent, GeographicExtent::place("unknown", ""));

    let meta = Sidecar::from_json(r#"{"publication_date": "spring of Keicho 8"}"#)
        .unwrap()
        .to_metadata("stem", "WGS84")
        .unwrap();
    assert_eq!(meta.contact_id, "unknown");
    assert!(matches!(
        &meta.contents[0].temporal_extent,
        TemporalExtent::StringDescriptive { date_from, .. } if date_from == "spring of Keicho 8"
    ));
}

#[test]
fn malformed_sidecar_is_validation_error() {
    assert!(matches!(Sidecar::from_json("{not json"), Err(Error::Validation(_))));
}

#[test]
fn vector_stores_accept_object_and_list_forms() {
    let base = Path::new("/srv/rag");
    let object = r#"{"VectorStores": [{"collection_name": "chunks", "persist_directory": "db/chunks", "embedding_model": "hash:xxh64:d64"}]}"#;
    let stores = parse_vector_stores(object, base).unwrap();
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0].collection_name, "chunks");
    assert_eq!(stores[0].persist_directory, base.join("db/chunks"));
    assert_eq!(stores[0].embedding_model, "hash:xxh64:d64");

    let list = r#"[{"Other": 1}, {"VectorStores": [
        {"collection_name": "chunks", "persist_directory": "/abs/chunks"},
        {"collection_name": "sources", "persist_directory": "db/sources"}
    ]}]"#;
    let stores = parse_vector_stores(list, base).unwrap();
    assert_eq!(stores.len(), 2);
    assert_eq!(stores[0].persist_directory, Path::new("/abs/chunks"));
    assert_eq!(stores[1].collection_name, "sources");
}

#[test]
fn vector_stores_missing_or_malformed_is_config_error() {
    let base = Path::new(".");
    assert!(matches!(parse_vector_stores(r#"{"Stores": []}"#, base), Err(Error::Config(_))));
    assert!(matches!(parse_vector_stores(r#"{"VectorStores": {"a": 1}}"#, base), Err(Error::Config(_))));
    assert!(matches!(
        parse_vector_stores(r#"{"VectorStores": [{"persist_directory": "x"}]}"#, base),
        Err(Error::Config(_))
    ));
    assert!(matches!(parse_vector_stores("not json", base), Err(Error::Config(_))));
}

#[test]
fn config_merges_env_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[ingest]\nreference_system_id = \"WGS84\"\n[timeouts]\nrule_engine_ms = 500\n").unwrap();
    fs::write(tmp.path().join("config.test.toml"), "[ingest]\nreference_system_id = \"JGD2011\"\n").unwrap();
    let cfg = Config::load_from(tmp.path(), "test").unwrap();
    assert_eq!(cfg.get::<String>("ingest.reference_system_id").unwrap(), "JGD2011");
    assert_eq!(cfg.timeouts().rule_engine_ms, 500);
    assert_eq!(cfg.timeouts().vector_store_ms, 30_000);
}

#[tokio::test]
async fn guard_times_out_slow_calls() {
    let token = CancellationToken::new();
    let res: Result<(), Error> = guarded(&token, Duration::from_millis(20), "slow", async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(())
    })
    .await;
    assert!(matches!(res, Err(Error::Timeout { .. })));
}

#[tokio::test]
async fn guard_honours_cancellation() {
    let token = CancellationToken::new();
    token.cancel();
    let res: Result<u8, Error> = guarded(&token, Duration::from_secs(5), "cancelled", async { Ok(1) }).await;
    assert!(matches!(res, Err(Error::Cancelled(_))));

    let live = CancellationToken::new();
    let res = guarded(&live, Duration::from_secs(5), "fast", async { Ok::<_, Error>(7) }).await;
    assert_eq!(res.unwrap(), 7);
}
