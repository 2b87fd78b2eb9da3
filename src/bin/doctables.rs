use clap::Parser;
use doctables::{Criteria, DbError, MemoryStore, TablesConfig, TablesInput, TablesRepository};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const DEFAULT_COLLECTION: &str = "rows";

#[derive(Parser, Debug)]
#[command(name = "doctables", version, about = "Run one grid request against an NDJSON collection", long_about = None)]
struct Cli {
    /// Path to a config file (TOML)
    #[arg(long, help = "Path to a config file (TOML). If omitted, env and ./doctables.toml are used.")]
    config: Option<PathBuf>,
    #[arg(long, help = "Newline-delimited JSON file holding the collection's documents")]
    data: PathBuf,
    #[arg(long, help = "JSON file holding the request (draw, start, length, search, columns, order)")]
    request: PathBuf,
    #[arg(long, help = "Collection name used in logs. Overrides config default_collection.")]
    collection: Option<String>,
    #[arg(long, help = "Additional criteria: one filter object or an array, e.g. '{\"field\":\"tenant\",\"$eq\":\"t1\"}'")]
    additional: Option<String>,
    #[arg(long = "pre-filter", help = "Pre-filter criteria; these also narrow recordsTotal")]
    pre_filter: Option<String>,
    #[arg(long, help = "Fetch timeout in milliseconds. Overrides config query_timeout_ms.")]
    timeout_ms: Option<u64>,
    #[arg(long, help = "Pretty-print the response")]
    pretty: bool,
}

fn parse_criteria(json: Option<&str>) -> Result<Criteria, DbError> {
    json.map_or_else(|| Ok(Criteria::none()), Criteria::from_json)
}

fn run(cli: &Cli) -> Result<bool, DbError> {
    let mut cfg = TablesConfig::load(cli.config.as_deref())?;
    if cli.timeout_ms.is_some() {
        cfg.query_timeout_ms = cli.timeout_ms;
    }
    if let Err(e) = cfg.init_logging() {
        eprintln!("doctables: logging disabled: {e}");
    }

    let collection = cli
        .collection
        .clone()
        .or_else(|| cfg.default_collection.clone())
        .unwrap_or_else(|| DEFAULT_COLLECTION.to_string());
    let store = Arc::new(MemoryStore::new());
    store.create_collection(&collection);
    store.load_ndjson(&collection, std::fs::File::open(&cli.data)?)?;

    let input: TablesInput = serde_json::from_str(&std::fs::read_to_string(&cli.request)?)?;
    let additional = parse_criteria(cli.additional.as_deref())?;
    let pre_filter = parse_criteria(cli.pre_filter.as_deref())?;

    let repo: TablesRepository<_, bson::Document> =
        TablesRepository::new(store, collection).with_query_timeout(cfg.query_timeout_ms);
    let output = repo.find_all_with(&input, &additional, &pre_filter);
    let text = if cli.pretty { serde_json::to_string_pretty(&output)? } else { serde_json::to_string(&output)? };
    println!("{text}");
    Ok(!output.is_error())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("doctables: {e}");
            ExitCode::from(2)
        }
    }
}
