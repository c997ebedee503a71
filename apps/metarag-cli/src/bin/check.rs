use std::path::PathBuf;

use clap::Parser;

use metarag_cli::{init_tracing, AppContext};
use metarag_core::data_processor::DataProcessor;
use metarag_core::sidecar::Sidecar;

#[derive(Parser, Debug)]
#[clap(name = "metarag-check")]
#[clap(about = "Build metadata aggregates from sidecars and report composition violations")]
struct Args {
    /// Directory of documents with `<stem>.json` sidecars
    data_dir: Option<PathBuf>,

    /// Also print the generated facts
    #[clap(long)]
    facts: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let ctx = AppContext::load()?;
    let settings = ctx.ingest_settings();
    let checker = ctx.checker().await?;
    let data_dir = ctx.data_dir(args.data_dir);

    let mut submitted = 0;
    for doc in DataProcessor::new().list_documents(&data_dir, None) {
        let sidecar = if doc.sidecar.is_file() { Sidecar::load(&doc.sidecar) } else { Ok(Sidecar::default()) };
        let meta = match sidecar.and_then(|s| s.to_metadata(&doc.doc_id, &settings.reference_system_id)) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(doc = %doc.doc_id, error = %e, "sidecar skipped");
                continue;
            }
        };
        if args.facts {
            for fact in metarag_logic::metadata_to_facts(&meta) {
                println!("{fact}.");
            }
        }
        checker.submit(&meta).await?;
        submitted += 1;
    }

    let violations = checker.check_composition_consistency().await?;
    println!("Checked {submitted} metadata records: {} violations", violations.len());
    for id in &violations {
        println!("  inconsistent_composition({id})");
    }
    if !violations.is_empty() {
        std::process::exit(2);
    }
    Ok(())
}
