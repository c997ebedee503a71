use std::path::PathBuf;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use metarag_cli::{init_tracing, AppContext};
use metarag_core::data_processor::DataProcessor;
use metarag_pipeline::IngestPipeline;

#[derive(Parser, Debug)]
#[clap(name = "metarag-ingest")]
#[clap(about = "Chunk documents, attach sidecar metadata and upsert into the vector collections")]
struct Args {
    /// Directory of `.txt`/`.md` documents with `<stem>.json` sidecars
    data_dir: Option<PathBuf>,

    /// Ingest at most N documents
    #[clap(long)]
    limit: Option<usize>,

    /// Skip the composition check after ingest
    #[clap(long)]
    no_check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let ctx = AppContext::load()?;
    let settings = ctx.ingest_settings();
    let data_dir = ctx.data_dir(args.data_dir);

    let registry = ctx.registry().await?.current();
    let mut pipeline = IngestPipeline::new(DataProcessor::with_config(settings.chunking()), registry.get(&settings.chunk_collection)?)
        .with_reference_system(settings.reference_system_id.as_str());
    if let Some(name) = &settings.source_collection {
        pipeline = pipeline.with_source_store(registry.get(name)?);
    }
    if !args.no_check {
        pipeline = pipeline.with_checker(ctx.checker().await?);
    }

    let docs = DataProcessor::new().list_documents(&data_dir, args.limit);
    tracing::info!(dir = %data_dir.display(), documents = docs.len(), "ingest starting");
    let pb = ProgressBar::new(docs.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let report = pipeline
        .run(&docs, |doc| {
            pb.set_message(doc.doc_id.clone());
            pb.inc(1);
        })
        .await?;
    pb.finish_and_clear();

    println!("Ingested {} documents, {} chunks, {} source records", report.documents, report.chunks, report.sources);
    for (doc, reason) in &report.skipped {
        println!("  skipped {doc}: {reason}");
    }
    if !args.no_check {
        let violations = pipeline.check().await?;
        if violations.is_empty() {
            println!("Composition check: consistent");
        } else {
            println!("Composition check: {} contents records with more than one root", violations.len());
            for id in violations {
                println!("  {id}");
            }
        }
    }
    Ok(())
}
