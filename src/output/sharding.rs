//! Sharded persistence of the crawl result: count-bounded chunks written
//! concurrently, each with a size-triggered gzip fallback, plus the
//! conditional map index built through the same policy.
use super::compression::{gzip_file, CompressionError};
use super::render::{xml_index, xml_map};
use crate::address::SiteUri;
use crate::spider::MapItem;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("can not write file: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Compression(#[from] CompressionError),
}

/// One persisted output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    /// File name within the output directory, including a `.gzip` suffix
    /// when the compression fallback was applied.
    pub name: String,
    pub size: u64,
    pub compressed: bool,
}

/// Per-shard outcome, ordered by shard number.
pub type SaveReport = Vec<(String, Result<SavedFile, WriteError>)>;

/// Saves the whole site map into files of at most `max_entries` entries.
///
/// A single shard is named `basename.extension`, multiple shards
/// `basename{1..k}.extension`. Shards are rendered and persisted
/// concurrently and independently; a shard whose rendered size exceeds
/// `max_bytes` is replaced by a gzip-compressed copy. Every shard is
/// attempted regardless of the failures of others.
pub async fn save_map(
    items: Vec<MapItem>,
    max_entries: usize,
    max_bytes: u64,
    basename: &str,
    extension: &str,
    out_dir: &Path,
) -> SaveReport {
    save_chunks(
        items,
        max_entries,
        max_bytes,
        basename,
        extension,
        out_dir,
        Arc::new(|chunk: &[MapItem]| xml_map(chunk)),
    )
    .await
}

/// Saves the map index when the map stage produced more than one file;
/// `None` otherwise — a normal terminal state, not an error.
///
/// Shard file names are resolved against the crawl `root` to absolute
/// addresses, and every index record shares one generation timestamp.
pub async fn save_index(
    map_files: &[String],
    root: &SiteUri,
    max_entries: usize,
    max_bytes: u64,
    basename: &str,
    out_dir: &Path,
) -> Option<SaveReport> {
    if map_files.len() <= 1 {
        return None;
    }
    let links: Vec<String> = map_files
        .iter()
        .filter_map(|file| {
            let name = Path::new(file).file_name()?.to_str()?;
            root.resolve(name).map(|uri| uri.to_string())
        })
        .collect();
    let generated = Utc::now();
    Some(
        save_chunks(
            links,
            max_entries,
            max_bytes,
            basename,
            "xml",
            out_dir,
            Arc::new(move |chunk: &[String]| xml_index(Some(generated), chunk)),
        )
        .await,
    )
}

async fn save_chunks<T, F>(
    items: Vec<T>,
    max_entries: usize,
    max_bytes: u64,
    basename: &str,
    extension: &str,
    out_dir: &Path,
    render: Arc<F>,
) -> SaveReport
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&[T]) -> String + Send + Sync + 'static,
{
    if items.is_empty() {
        return Vec::new();
    }
    let max_entries = max_entries.max(1);
    let num_files = items.len().div_ceil(max_entries);

    let mut tasks = JoinSet::new();
    for (i, chunk) in items.chunks(max_entries).enumerate() {
        let filename = if num_files == 1 {
            format!("{basename}.{extension}")
        } else {
            format!("{basename}{}.{extension}", i + 1)
        };
        let path = out_dir.join(&filename);
        let chunk = chunk.to_vec();
        let render = render.clone();
        tasks.spawn_blocking(move || (i, save_chunk(&render(&chunk), path, filename, max_bytes)));
    }

    // shard results are position-addressed, no shared container needed
    let mut report: Vec<Option<(String, Result<SavedFile, WriteError>)>> =
        (0..num_files).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (i, outcome) = joined.expect("saver task failed");
        report[i] = Some(outcome);
    }
    report.into_iter().flatten().collect()
}

fn save_chunk(
    xml: &str,
    path: PathBuf,
    filename: String,
    max_bytes: u64,
) -> (String, Result<SavedFile, WriteError>) {
    if let Err(e) = fs::write(&path, xml) {
        return (filename, Err(WriteError::Io(e)));
    }
    let size = xml.len() as u64;
    if size <= max_bytes {
        return (
            filename.clone(),
            Ok(SavedFile {
                name: filename,
                size,
                compressed: false,
            }),
        );
    }

    let gz_name = format!("{filename}.gzip");
    let gz_path = path.with_file_name(&gz_name);
    match gzip_file(&path, &gz_path) {
        Ok(_) => {
            let _ = fs::remove_file(&path);
            let size = fs::metadata(&gz_path).map(|m| m.len()).unwrap_or(0);
            (
                gz_name.clone(),
                Ok(SavedFile {
                    name: gz_name,
                    size,
                    compressed: true,
                }),
            )
        }
        Err(e) => {
            // keep the uncompressed file, discard the partial gzip
            let _ = fs::remove_file(&gz_path);
            (filename, Err(WriteError::Compression(e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::compression::ungzip_file;
    use crate::page_utils::DocumentMeta;

    fn items(n: usize) -> Vec<MapItem> {
        (0..n)
            .map(|i| MapItem {
                uri: SiteUri::parse(&format!("http://localhost/page{i}.html")).unwrap(),
                meta: DocumentMeta::default(),
            })
            .collect()
    }

    fn count_urls(xml: &str) -> usize {
        xml.matches("<url>").count()
    }

    #[tokio::test]
    async fn single_shard_uses_unnumbered_name() {
        let dir = tempfile::tempdir().unwrap();
        let report = save_map(items(10), 50, u64::MAX, "sitemap", "xml", dir.path()).await;
        assert_eq!(report.len(), 1);
        let (name, outcome) = &report[0];
        assert_eq!(name, "sitemap.xml");
        let saved = outcome.as_ref().unwrap();
        assert!(!saved.compressed);
        let xml = fs::read_to_string(dir.path().join("sitemap.xml")).unwrap();
        assert_eq!(count_urls(&xml), 10);
    }

    #[tokio::test]
    async fn shard_count_is_ceil_of_entries_over_limit() {
        let dir = tempfile::tempdir().unwrap();
        let report = save_map(items(120), 50, u64::MAX, "sitemap", "xml", dir.path()).await;
        let names: Vec<&str> = report.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["sitemap1.xml", "sitemap2.xml", "sitemap3.xml"]);

        let sizes: Vec<usize> = names
            .iter()
            .map(|n| count_urls(&fs::read_to_string(dir.path().join(n)).unwrap()))
            .collect();
        assert_eq!(sizes, vec![50, 50, 20]);
    }

    #[tokio::test]
    async fn oversized_shard_is_replaced_by_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let entries = items(30);
        let expected_xml = xml_map(&entries);

        let report = save_map(entries, 50, 64, "sitemap", "xml", dir.path()).await;
        let (name, outcome) = &report[0];
        assert_eq!(name, "sitemap.xml.gzip");
        assert!(outcome.as_ref().unwrap().compressed);
        assert!(!dir.path().join("sitemap.xml").exists());

        let mut restored = Vec::new();
        ungzip_file(&dir.path().join("sitemap.xml.gzip"), &mut restored).unwrap();
        assert_eq!(String::from_utf8(restored).unwrap(), expected_xml);
    }

    #[tokio::test]
    async fn unwritable_directory_reports_per_shard_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let report = save_map(items(3), 50, u64::MAX, "sitemap", "xml", &missing).await;
        assert_eq!(report.len(), 1);
        assert!(report[0].1.is_err());
    }

    #[tokio::test]
    async fn no_index_for_zero_or_one_map_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = SiteUri::parse("http://localhost/").unwrap();
        assert!(save_index(&[], &root, 50, u64::MAX, "idx", dir.path())
            .await
            .is_none());
        assert!(
            save_index(&["sitemap.xml".into()], &root, 50, u64::MAX, "idx", dir.path())
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn index_lists_map_files_as_absolute_addresses() {
        let dir = tempfile::tempdir().unwrap();
        let root = SiteUri::parse("http://localhost/").unwrap();
        let files = vec!["sitemap1.xml".to_string(), "sitemap2.xml.gzip".to_string()];
        let report = save_index(&files, &root, 50, u64::MAX, "sitemap-index", dir.path())
            .await
            .unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].0, "sitemap-index.xml");

        let xml = fs::read_to_string(dir.path().join("sitemap-index.xml")).unwrap();
        assert!(xml.contains("<loc>http://localhost/sitemap1.xml</loc>"));
        assert!(xml.contains("<loc>http://localhost/sitemap2.xml.gzip</loc>"));
        assert_eq!(xml.matches("<lastmod>").count(), 2);
    }

    #[tokio::test]
    async fn index_honors_its_own_entry_limit() {
        let dir = tempfile::tempdir().unwrap();
        let root = SiteUri::parse("http://localhost/").unwrap();
        let files: Vec<String> = (1..=4).map(|i| format!("sitemap{i}.xml")).collect();
        let report = save_index(&files, &root, 2, u64::MAX, "sitemap-index", dir.path())
            .await
            .unwrap();
        let names: Vec<&str> = report.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["sitemap-index1.xml", "sitemap-index2.xml"]);
    }
}
