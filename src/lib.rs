//! # smgen — XML site map generator
//!
//! This project is a command-line application that crawls a web site from a
//! given start address and generates an XML site map suggested by
//! <https://www.sitemaps.org/protocol.html>, splitting it into several files
//! and compressing oversized ones when needed.
//!
//! ## Features
//!
//! - Concurrent same-site crawling with a configurable depth limit.
//! - Deduplicated results: every page appears in the map exactly once.
//! - `lastmod` taken from the `Last-Modified` (or `Date`) response header.
//! - Map split into shards of at most N entries each; oversized files are
//!   replaced with gzip copies; an index file is generated when the map
//!   spans more than one shard.
//!
//! ## Usage
//!
//! ### Command-Line Options
//!
//! | Option                  | Description                                             | Default value   |
//! |-------------------------|---------------------------------------------------------|-----------------|
//! | `URI`                   | Absolute http/https address to start crawling from.     | N/A (required)  |
//! | `-d, --depth <NUMBER>`  | Maximum depth of link-junctions from the start URI.     | 0               |
//! | `-w, --workers <NUMBER>`| Number of concurrent fetches (0 = logical CPU count).   | 0               |
//! | `-t, --timeout <SECONDS>`| Per-request timeout (0 = no deadline).                 | 0               |
//! | `-o, --output-dir <DIR>`| Existing writable directory for the generated files.    | `.`             |
//! | `--map-name <NAME>`     | Base file name for map shards.                          | `sitemap`       |
//! | `--index-name <NAME>`   | Base file name for index shards.                        | `sitemap-index` |
//! | `--map-limit <NUMBER>`  | Maximum entries per map file.                           | 50000           |
//! | `--index-limit <NUMBER>`| Maximum entries per index file.                         | 50000           |
//! | `--size-limit <BYTES>`  | Size above which a file is replaced by its gzip copy.   | 10485760        |
//!
//! ### Example
//!
//! ```bash
//! ./smgen -d 2 -w 8 -o ./public https://example.com
//! ```
//!
//! This will crawl `https://example.com` following links up to two hops with
//! eight concurrent fetches and write `sitemap.xml` (or `sitemap1.xml`,
//! `sitemap2.xml`, ... plus `sitemap-index.xml`) into `./public`.
mod address;
pub use address::{SiteUri, UriError};
mod interface;
pub use interface::{get_args, run, AppResult, Config, ConfigError};
mod page_utils;
pub use page_utils::{extract_links, fetch_document, DocumentMeta, FetchError, PageLinks};
mod spider;
pub use spider::{ErrorHandler, MapItem, Spider, SpiderConfig, DEFAULT_QUEUE_LEN};
mod output;
pub use output::{
    gzip_file, save_index, save_map, ungzip_file, xml_index, xml_map, CompressionError,
    SaveReport, SavedFile, WriteError,
};
