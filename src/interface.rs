//! Command line surface and stage orchestration: crawl, save map shards,
//! conditionally save the index, aggregate per-file outcomes.
use crate::address::{SiteUri, UriError};
use crate::output::{save_index, save_map, SaveReport};
use crate::spider::{Spider, SpiderConfig};
use clap::{command, value_parser, Arg};
use log::{error, info, warn};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;

pub type AppResult<T> = Result<T, Box<dyn Error>>;

const HELP: &str = r#"
{before-help}{name} {version}
{about-with-newline}
{usage-heading}
    {usage}

{all-args}{after-help}
"#;

/// Default sitemaps.org limit of entries per file.
const DEFAULT_ENTRY_LIMIT: u64 = 50_000;
/// Compression threshold, 10 MiB.
const DEFAULT_SIZE_LIMIT: u64 = 10 * 1024 * 1024;

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error(transparent)]
    Uri(#[from] UriError),
    #[error("output directory {0:?} does not exist or is not a directory")]
    OutputDir(String),
    #[error("output directory {0:?} is not writable")]
    ReadOnlyDir(String),
    #[error("{0} must not be empty")]
    EmptyName(&'static str),
    #[error("{0} must be greater than zero")]
    InvalidLimit(&'static str),
}

/// Validated run configuration.
#[derive(Debug)]
pub struct Config {
    pub start_point: String,
    pub max_depth: usize,
    pub workers: usize,
    pub timeout: u64,
    pub output_dir: PathBuf,
    pub map_name: String,
    pub index_name: String,
    pub map_limit: usize,
    pub index_limit: usize,
    pub size_limit: u64,
}

pub fn get_args() -> AppResult<Config> {
    let matches = command!()
        .about("Generate an XML site map suggested by https://www.sitemaps.org/protocol.html, starting from a given URI")
        .help_template(HELP)
        .next_line_help(true)
        .arg(
            Arg::new("uri")
                .value_name("URI")
                .required(true)
                .num_args(1)
                .long_help("absolute http/https address to start crawling from"),
        )
        .arg(
            Arg::new("depth")
                .short('d')
                .long("depth")
                .value_name("NUMBER")
                .num_args(1)
                .default_value("0")
                .value_parser(value_parser!(usize))
                .long_help("maximum depth of link-junctions from the start URI; 0 maps the start page only"),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("NUMBER")
                .num_args(1)
                .default_value("0")
                .value_parser(value_parser!(usize))
                .long_help("number of concurrent fetches; 0 uses the logical CPU count"),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("SECONDS")
                .num_args(1)
                .default_value("0")
                .value_parser(value_parser!(u64))
                .long_help("per-request timeout in seconds; 0 disables the deadline"),
        )
        .arg(
            Arg::new("output_dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .num_args(1)
                .default_value(".")
                .long_help("existing writable directory for the generated files"),
        )
        .arg(
            Arg::new("map_name")
                .long("map-name")
                .value_name("NAME")
                .num_args(1)
                .default_value("sitemap")
                .long_help("base file name for map shards"),
        )
        .arg(
            Arg::new("index_name")
                .long("index-name")
                .value_name("NAME")
                .num_args(1)
                .default_value("sitemap-index")
                .long_help("base file name for index shards"),
        )
        .arg(
            Arg::new("map_limit")
                .long("map-limit")
                .value_name("NUMBER")
                .num_args(1)
                .default_value("50000")
                .value_parser(value_parser!(u64))
                .long_help("maximum entries per map file"),
        )
        .arg(
            Arg::new("index_limit")
                .long("index-limit")
                .value_name("NUMBER")
                .num_args(1)
                .default_value("50000")
                .value_parser(value_parser!(u64))
                .long_help("maximum entries per index file"),
        )
        .arg(
            Arg::new("size_limit")
                .long("size-limit")
                .value_name("BYTES")
                .num_args(1)
                .default_value("10485760")
                .value_parser(value_parser!(u64))
                .long_help("file size in bytes above which a file is replaced by its gzip copy"),
        )
        .get_matches();

    let config = Config {
        start_point: matches.get_one::<String>("uri").cloned().unwrap_or_default(),
        max_depth: *matches.get_one::<usize>("depth").unwrap_or(&0),
        workers: *matches.get_one::<usize>("workers").unwrap_or(&0),
        timeout: *matches.get_one::<u64>("timeout").unwrap_or(&0),
        output_dir: matches
            .get_one::<String>("output_dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
        map_name: matches
            .get_one::<String>("map_name")
            .cloned()
            .unwrap_or_default(),
        index_name: matches
            .get_one::<String>("index_name")
            .cloned()
            .unwrap_or_default(),
        map_limit: *matches.get_one::<u64>("map_limit").unwrap_or(&DEFAULT_ENTRY_LIMIT) as usize,
        index_limit: *matches.get_one::<u64>("index_limit").unwrap_or(&DEFAULT_ENTRY_LIMIT)
            as usize,
        size_limit: *matches.get_one::<u64>("size_limit").unwrap_or(&DEFAULT_SIZE_LIMIT),
    };
    validate(&config)?;
    Ok(config)
}

/// Fails fast on a bad configuration, before any crawling starts.
fn validate(config: &Config) -> Result<(), ConfigError> {
    SiteUri::parse(&config.start_point)?;
    if config.map_name.is_empty() {
        return Err(ConfigError::EmptyName("map file name"));
    }
    if config.index_name.is_empty() {
        return Err(ConfigError::EmptyName("index file name"));
    }
    if config.map_limit == 0 {
        return Err(ConfigError::InvalidLimit("map entry limit"));
    }
    if config.index_limit == 0 {
        return Err(ConfigError::InvalidLimit("index entry limit"));
    }
    if config.size_limit == 0 {
        return Err(ConfigError::InvalidLimit("size limit"));
    }
    let shown = config.output_dir.display().to_string();
    match std::fs::metadata(&config.output_dir) {
        Ok(meta) if meta.is_dir() => {
            if meta.permissions().readonly() {
                return Err(ConfigError::ReadOnlyDir(shown));
            }
        }
        _ => return Err(ConfigError::OutputDir(shown)),
    }
    Ok(())
}

/// Runs the whole pipeline and returns the process exit code: 0 on success,
/// 1 when any stage finished with errors.
pub async fn run(config: Config) -> AppResult<i32> {
    let root = SiteUri::parse(&config.start_point)?;
    info!(
        "started for {}, depth: {}, workers: {}, output dir: {}",
        root,
        config.max_depth,
        config.workers,
        config.output_dir.display()
    );

    let spider = Spider::new(SpiderConfig {
        error_handler: Some(Arc::new(|e| warn!("{e}"))),
        request_timeout: Duration::from_secs(config.timeout),
        ..Default::default()
    });
    let map = spider.crawl(root.clone(), config.max_depth, config.workers).await;
    info!("completed, num of links found: {}", map.len());
    if map.is_empty() {
        info!("stop on empty map");
        return Ok(0);
    }

    info!("started saving site map...");
    let report = save_map(
        map,
        config.map_limit,
        config.size_limit,
        &config.map_name,
        "xml",
        &config.output_dir,
    )
    .await;
    let (files, errors) = digest("MAP", &report);
    if errors > 0 {
        info!("map saving stage done with error(s): {errors}");
        return Ok(1);
    }

    if let Some(report) = save_index(
        &files,
        &root,
        config.index_limit,
        config.size_limit,
        &config.index_name,
        &config.output_dir,
    )
    .await
    {
        info!("started saving index...");
        let (_, errors) = digest("INDEX", &report);
        if errors > 0 {
            info!("index saving stage done with error(s): {errors}");
            return Ok(1);
        }
    }

    info!("all done");
    Ok(0)
}

/// Logs per-file outcomes of one stage and returns the produced file names
/// together with the error count.
fn digest(stage: &str, report: &SaveReport) -> (Vec<String>, usize) {
    let mut files = Vec::with_capacity(report.len());
    let mut errors = 0;
    for (name, outcome) in report {
        match outcome {
            Ok(saved) => info!("{stage} OK {} ({} bytes)", saved.name, saved.size),
            Err(e) => {
                errors += 1;
                error!("{stage} ERR {name}: {e}");
            }
        }
        files.push(name.clone());
    }
    (files, errors)
}
