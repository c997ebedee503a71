use clap::Parser;

use metarag_cli::{init_tracing, parse_filter, AppContext};
use metarag_core::traits::VectorRepository;

#[derive(Parser, Debug)]
#[clap(name = "metarag-query")]
#[clap(about = "Similarity search over a vector collection with optional metadata equality filters")]
struct Args {
    /// One or more query texts
    #[clap(required = true)]
    queries: Vec<String>,

    #[clap(short = 'k', long, default_value = "5")]
    k: usize,

    /// Collection name; defaults to the ingest chunk collection
    #[clap(long)]
    collection: Option<String>,

    /// Equality filter on a flattened key, e.g. `--where geo_place=Edo`
    #[clap(long = "where", value_name = "KEY=VALUE")]
    filters: Vec<String>,

    /// Delete the matching chunks instead of searching (requires --where)
    #[clap(long)]
    delete: bool,

    /// Print hits as JSON lines
    #[clap(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let ctx = AppContext::load()?;
    let collection = args.collection.clone().unwrap_or_else(|| ctx.ingest_settings().chunk_collection);
    let repo = ctx.registry().await?.current().get(&collection)?;
    let filter = parse_filter(&args.filters)?;

    if args.delete {
        repo.delete_chunks(None, filter.as_ref()).await?;
        println!("Deleted matching chunks from {collection}; {} remain", repo.count().await?);
        return Ok(());
    }

    let results = repo.query_collection(&args.queries, args.k, filter.as_ref()).await?;
    for (query, hits) in args.queries.iter().zip(results) {
        if args.json {
            for hit in &hits {
                println!("{}", serde_json::json!({"query": query, "id": hit.id, "distance": hit.distance, "text": hit.text, "meta": hit.meta}));
            }
            continue;
        }
        println!("\nQuery: {query} ({} hits)", hits.len());
        for (i, hit) in hits.iter().enumerate() {
            let title = hit.meta.get("title").map(ToString::to_string).unwrap_or_default();
            println!("  {}. distance={:.4}  id={}  title={}", i + 1, hit.distance, hit.id, title);
            println!("     {}", hit.text);
        }
    }
    Ok(())
}
