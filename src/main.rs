use anyhow::{bail, Context};
use chrono::Local;
use clap::{ArgGroup, Parser};
use doid_sync::download::{fetch_snapshot, DEFAULT_CONVERTER};
use doid_sync::{
    ObographLoader, OntologyGraph, RunLog, RunMetadata, SyncOptions, Synchronizer, WikibaseClient,
    WikibaseConfig,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "doid-sync",
    version,
    about = "Synchronize a Disease Ontology release into a Wikibase",
    long_about = None
)]
#[command(group(ArgGroup::new("source").required(true).args(["json_path", "owl_url"])))]
struct Cli {
    /// Pre-converted OBO-graph JSON snapshot
    #[arg(long)]
    json_path: Option<PathBuf>,
    /// OWL release to download and convert
    #[arg(long)]
    owl_url: Option<String>,
    #[arg(long, default_value = "./logs")]
    log_dir: PathBuf,
    /// Resolve records without writing anything
    #[arg(long)]
    dummy: bool,
    #[arg(long, overrides_with = "no_fastrun")]
    fastrun: bool,
    #[arg(long, overrides_with = "fastrun")]
    no_fastrun: bool,
    #[arg(long, default_value = "info")]
    log_level: String,
    #[arg(long, env = "WIKIBASE_API_URL")]
    api_endpoint: Option<String>,
    #[arg(long, env = "WIKIBASE_SPARQL_URL")]
    sparql_endpoint: Option<String>,
    #[arg(long, default_value = DEFAULT_CONVERTER)]
    converter: String,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let mut config = WikibaseConfig::from_env().with_fast_run(cli.fastrun || !cli.no_fastrun);
    if let Some(endpoint) = cli.api_endpoint {
        config = config.with_api_endpoint(endpoint);
    }
    if let Some(endpoint) = cli.sparql_endpoint {
        config = config.with_sparql_endpoint(endpoint);
    }
    if config.access_token.is_none() {
        if !cli.dummy {
            bail!("WIKIBASE_TOKEN must be set unless --dummy is given");
        }
        warn!("no access token configured, running read-only");
    }

    let json_path = match (cli.json_path, cli.owl_url) {
        (Some(path), _) => path,
        (None, Some(url)) => fetch_snapshot(&url, &cli.converter, ".")?,
        (None, None) => bail!("either --json-path or --owl-url is required"),
    };

    let raw = ObographLoader::load_from_path(&json_path)
        .with_context(|| format!("cannot load snapshot {:?}", json_path))?;
    let graph = OntologyGraph::from_raw(&raw)?;

    let run_id = RunMetadata::run_id_at(Local::now());
    let log = RunLog::create(&cli.log_dir, RunMetadata::for_bot(run_id))?;
    let kb = WikibaseClient::new(config)?;

    let options = SyncOptions {
        persist: !cli.dummy,
    };
    let summary = Synchronizer::new(&graph, &kb, &log, options).run()?;

    info!(
        processed = summary.processed(),
        failures = summary.failures.len(),
        log = ?log.path(),
        "run complete"
    );
    Ok(())
}
