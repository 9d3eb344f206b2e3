use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use virtual_joins::compiler::{resolve_join, JoinRequestDocument};
use virtual_joins::semantic::loader;

#[derive(Parser)]
#[command(name = "virtual-joins")]
#[command(about = "Synthesize the join clause for a virtual table join")]
struct Args {
    /// Join specification file (or set VIRTUAL_JOINS_SPECS env var)
    #[arg(long)]
    specs: Option<PathBuf>,

    /// Team that owns the join
    #[arg(long)]
    team: i64,

    /// Source table the join is exposed on
    #[arg(long)]
    source: String,

    /// Field name the joined table is exposed under
    #[arg(long)]
    field: String,

    /// Join request document (JSON)
    #[arg(long)]
    request: PathBuf,

    /// Print the join subtree as JSON instead of rendered text
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let specs_path = args
        .specs
        .or_else(|| std::env::var("VIRTUAL_JOINS_SPECS").ok().map(PathBuf::from))
        .context("no join specification file given (use --specs or VIRTUAL_JOINS_SPECS)")?;
    let repository = loader::load_from_file(&specs_path)?;
    info!(path = %specs_path.display(), joins = repository.len(), "Loaded join specifications");

    let raw = std::fs::read_to_string(&args.request)
        .with_context(|| format!("failed to read request {}", args.request.display()))?;
    let document: JoinRequestDocument = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse request {}", args.request.display()))?;
    let request = document.request();

    let node = resolve_join(&repository, args.team, &args.source, &args.field, &request)
        .with_context(|| format!("failed to resolve join {}.{}", args.source, args.field))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&node)?);
    } else {
        println!("{}", node);
    }

    Ok(())
}
