//! musearch CLI
//!
//! - `musearch build --catalog db.json [--indexes artist,label] [--test]`
//! - `musearch update --catalog db.json (--packets DIR | --changelog DB)`
//! - `musearch search artist 'massive attack'`
//! - `musearch check-file-limit`
//!
//! Logging goes to stderr and honours `RUST_LOG` (default `info`).

mod commands;

use anyhow::{anyhow, bail, Context, Result};
use clap::ArgMatches;
use musearch::core::{FieldValue, IndexKind, STORE_FIELD};
use musearch::engine::MemoryStore;
use musearch::index::{
    BuildConfig, MemoryCatalog, Orchestrator, UpdateReport, Updater, CONFIG_FILE_NAME,
};
use musearch::query::{QueryConfig, SearchService};
use musearch::replication::{DirectoryRepository, SqliteChangeLog};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    init_tracing();
    let matches = commands::build_cli().get_matches();
    match run(&matches) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();
}

/// A global flag, wherever on the command line it was given.
fn global_arg<'a>(matches: &'a ArgMatches, id: &str) -> Option<&'a String> {
    matches
        .subcommand()
        .and_then(|(_, sub)| sub.try_get_one::<String>(id).ok().flatten())
        .or_else(|| matches.get_one::<String>(id))
}

fn run(matches: &ArgMatches) -> Result<i32> {
    let config_path = global_arg(matches, "config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

    match matches.subcommand() {
        Some(("init-config", _)) => {
            BuildConfig::write_default_if_missing(&config_path)?;
            println!("{}", config_path.display());
            Ok(0)
        }
        Some(("build", sub)) => {
            let config = build_config(&config_path, matches, sub)?;
            run_build(config, sub)
        }
        Some(("update", sub)) => {
            let config = build_config(&config_path, matches, sub)?;
            run_update(&config, sub)
        }
        Some(("search", sub)) => {
            let config = build_config(&config_path, matches, sub)?;
            let query_config = QueryConfig::from_file(&config_path)
                .with_context(|| format!("loading {}", config_path.display()))?;
            run_search(&config, query_config, sub)
        }
        Some(("check-file-limit", _)) => {
            let config = build_config(&config_path, matches, matches)?;
            check_file_limit(config.min_open_files)
        }
        _ => bail!("no command given"),
    }
}

/// Config file (if present) with command-line overrides applied.
fn build_config(path: &Path, global: &ArgMatches, sub: &ArgMatches) -> Result<BuildConfig> {
    let mut config = if path.exists() {
        BuildConfig::from_file(path)?
    } else {
        BuildConfig::default()
    };

    if let Some(dir) = global_arg(global, "indexes-dir") {
        config.indexes_dir = PathBuf::from(dir);
    }
    if let Ok(Some(indexes)) = sub.try_get_many::<String>("indexes") {
        config.indexes = indexes
            .map(|name| name.parse::<IndexKind>())
            .collect::<musearch::core::Result<Vec<_>>>()?;
    }
    if let Ok(Some(size)) = sub.try_get_one::<u32>("chunk-size") {
        config.chunk_size = *size;
    }
    if let Ok(Some(workers)) = sub.try_get_one::<usize>("workers") {
        config.workers = Some(*workers);
    }
    if let Ok(Some(size)) = sub.try_get_one::<u32>("test-index-size") {
        config.test_index_size = *size;
    }
    if sub.try_get_one::<bool>("test").ok().flatten() == Some(&true) {
        config.test_mode = true;
    }
    config.validate()?;
    Ok(config)
}

fn load_catalog(sub: &ArgMatches) -> Result<Arc<MemoryCatalog>> {
    let path = sub
        .get_one::<String>("catalog")
        .context("--catalog is required")?;
    let catalog = MemoryCatalog::open(Path::new(path))
        .with_context(|| format!("loading catalog {}", path))?;
    Ok(Arc::new(catalog))
}

fn run_build(config: BuildConfig, sub: &ArgMatches) -> Result<i32> {
    if let Ok(limit) = open_file_limit() {
        if limit < config.min_open_files {
            warn!(
                target: "musearch::build",
                limit,
                required = config.min_open_files,
                "Open-file limit is low for a full build"
            );
        }
    }
    let catalog = load_catalog(sub)?;
    std::fs::create_dir_all(&config.indexes_dir)
        .with_context(|| format!("creating {}", config.indexes_dir.display()))?;
    let store = Arc::new(MemoryStore::persistent(&config.indexes_dir));

    let orchestrator = Orchestrator::new(config, catalog, store)?;
    let summary = orchestrator.run()?;
    for outcome in &summary.indexes {
        println!("{}", outcome);
    }
    Ok(if summary.all_succeeded() { 0 } else { 1 })
}

/// Where catch-up reads changes from, resolved once per run.
enum PacketSource {
    Directory(DirectoryRepository),
    ChangeLog(Result<SqliteChangeLog>),
    #[cfg(feature = "http")]
    Http(musearch::replication::HttpRepository),
}

impl PacketSource {
    fn from_args(sub: &ArgMatches) -> Result<Self> {
        if let Some(dir) = sub.get_one::<String>("packets") {
            return Ok(PacketSource::Directory(DirectoryRepository::new(Path::new(dir))));
        }
        if let Some(db) = sub.get_one::<String>("changelog") {
            let log = SqliteChangeLog::open(Path::new(db))
                .with_context(|| format!("opening change log {}", db));
            return Ok(PacketSource::ChangeLog(log));
        }
        http_source(sub)
    }
}

#[cfg(feature = "http")]
fn http_source(sub: &ArgMatches) -> Result<PacketSource> {
    let url = sub
        .get_one::<String>("packet-url")
        .context("one of --packets, --changelog or --packet-url is required")?;
    Ok(PacketSource::Http(musearch::replication::HttpRepository::new(url)))
}

#[cfg(not(feature = "http"))]
fn http_source(_sub: &ArgMatches) -> Result<PacketSource> {
    bail!("one of --packets or --changelog is required")
}

/// Catch every index in `kinds` up from `source`. A failure, including a
/// change log that could not be opened, is reported per index.
fn catch_up_all(
    updater: &Updater,
    kinds: &[IndexKind],
    source: &PacketSource,
) -> Vec<(IndexKind, Result<Vec<UpdateReport>>)> {
    kinds
        .iter()
        .map(|&kind| {
            let reports = match source {
                PacketSource::Directory(repo) => {
                    updater.catch_up_offline(kind, repo).map_err(Into::into)
                }
                PacketSource::ChangeLog(Ok(log)) => updater
                    .catch_up_online(kind, log)
                    .map(|report| report.into_iter().collect())
                    .map_err(Into::into),
                PacketSource::ChangeLog(Err(e)) => Err(anyhow!("{:#}", e)),
                #[cfg(feature = "http")]
                PacketSource::Http(repo) => {
                    updater.catch_up_offline(kind, repo).map_err(Into::into)
                }
            };
            (kind, reports)
        })
        .collect()
}

fn run_update(config: &BuildConfig, sub: &ArgMatches) -> Result<i32> {
    let catalog = load_catalog(sub)?;
    let store = Arc::new(MemoryStore::persistent(&config.indexes_dir));
    let updater = Updater::new(catalog, store);
    let source = PacketSource::from_args(sub)?;

    let mut failed = false;
    for (kind, reports) in catch_up_all(&updater, &config.selected_indexes(), &source) {
        match reports {
            Ok(reports) if reports.is_empty() => println!("{}: up to date", kind),
            Ok(reports) => reports.iter().for_each(|r| println!("{}", r)),
            Err(e) => {
                failed = true;
                eprintln!("{}: update failed: {:#}", kind, e);
            }
        }
    }
    Ok(if failed { 1 } else { 0 })
}

fn run_search(config: &BuildConfig, query_config: QueryConfig, sub: &ArgMatches) -> Result<i32> {
    let index = sub.get_one::<String>("index").context("index is required")?;
    let kind: IndexKind = index.parse()?;
    let raw = sub.get_one::<String>("query").context("query is required")?;
    let offset = sub.get_one::<usize>("offset").copied().unwrap_or(0);
    let limit = sub.get_one::<usize>("limit").copied();

    let store = Arc::new(MemoryStore::persistent(&config.indexes_dir));
    let service = SearchService::new(store, query_config);
    if sub.get_flag("explain") {
        println!("{:#?}", service.compile(kind, raw));
    }

    let results = service.search(kind, raw, offset, limit);
    println!(
        "{} hits (max score {:.3}), showing {}..{}",
        results.total_hits,
        results.max_score,
        results.offset,
        results.offset + results.hits.len()
    );
    for hit in &results.hits {
        let fields: Vec<String> = hit
            .doc
            .fields()
            .iter()
            .filter(|f| f.name != STORE_FIELD)
            .map(|f| match &f.value {
                FieldValue::Text(t) => format!("{}={}", f.name, t),
                other => format!("{}={}", f.name, other.as_long().unwrap_or_default()),
            })
            .collect();
        println!("{:>3}  {}", hit.normalized_score, fields.join("  "));
    }
    Ok(0)
}

fn open_file_limit() -> std::io::Result<u64> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: getrlimit only writes into the struct we pass.
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(limit.rlim_cur as u64)
}

fn check_file_limit(required: u64) -> Result<i32> {
    let limit = open_file_limit().context("reading the open-file limit")?;
    if limit < required {
        println!(
            "open-file limit {} is below {}; raise it with `ulimit -n {}`",
            limit, required, required
        );
        return Ok(1);
    }
    info!(target: "musearch::build", limit, required, "Open-file limit ok");
    println!("open-file limit {} ok", limit);
    Ok(0)
}
