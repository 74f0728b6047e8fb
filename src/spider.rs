//! Concurrent crawl engine: bounded-parallelism traversal with
//! deduplication, depth cutoff, same-site scope filtering and asynchronous
//! error reporting.
//!
//! Completion is detected with a counted set of in-flight work units. Every
//! queued target and every registered child stream holds a [`WorkGuard`];
//! when the count drops to zero nothing can produce more work and the crawl
//! is done. No queue length is ever polled.
use crate::address::SiteUri;
use crate::page_utils::{extract_links, fetch_document, DocumentMeta, FetchError};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use reqwest::Client;
use scraper::Html;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, Sender};
use tokio::sync::{Notify, Semaphore};

/// Default capacity of the pending-target queue.
pub const DEFAULT_QUEUE_LEN: usize = 1000;

/// Callback receiving per-target fetch errors. Invocations are serialized on
/// a dedicated reporter task and a panicking callback is isolated from the
/// crawl.
pub type ErrorHandler = Arc<dyn Fn(FetchError) + Send + Sync>;

/// Crawl engine configuration with documented defaults.
#[derive(Clone, Default)]
pub struct SpiderConfig {
    /// Receiver for per-target fetch errors; `None` drops them.
    pub error_handler: Option<ErrorHandler>,
    /// Per-request deadline; zero disables the timeout.
    pub request_timeout: Duration,
    /// Capacity of the pending-target queue; zero falls back to
    /// [`DEFAULT_QUEUE_LEN`].
    pub queue_len: usize,
}

/// One unique visited address plus its optional modification metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct MapItem {
    pub uri: SiteUri,
    pub meta: DocumentMeta,
}

/// An address paired with its link-hop distance from the crawl root.
#[derive(Debug, Clone)]
struct Target {
    uri: SiteUri,
    level: usize,
}

/// Site map explorer. See [`Spider::crawl`].
pub struct Spider {
    error_handler: Option<ErrorHandler>,
    request_timeout: Duration,
    queue_len: usize,
}

type VisitedSet = DashMap<SiteUri, Option<DateTime<Utc>>>;

/// State shared by every fetch task of one crawl.
struct CrawlShared {
    client: Client,
    semaphore: Arc<Semaphore>,
    visited: VisitedSet,
    tracker: Arc<WorkTracker>,
    root: SiteUri,
    max_depth: usize,
    timeout: Duration,
}

impl Spider {
    pub fn new(config: SpiderConfig) -> Spider {
        Spider {
            error_handler: config.error_handler,
            request_timeout: config.request_timeout,
            queue_len: if config.queue_len == 0 {
                DEFAULT_QUEUE_LEN
            } else {
                config.queue_len
            },
        }
    }

    /// Explores the site starting from `root` and returns one entry per
    /// unique visited address, in no particular order.
    ///
    /// At most `workers` fetches run concurrently; zero substitutes the
    /// logical CPU count. Targets at `max_depth` are still fetched and
    /// recorded but never expanded. Fetch errors never abort the crawl; they
    /// are forwarded to the configured error handler, and every handler
    /// invocation finishes before this method returns.
    pub async fn crawl(&self, root: SiteUri, max_depth: usize, workers: usize) -> Vec<MapItem> {
        let workers = if workers == 0 {
            num_cpus::get().max(1)
        } else {
            workers
        };
        let client = Client::builder()
            .pool_max_idle_per_host(workers)
            .build()
            .expect("failed to build http client");
        let tracker = Arc::new(WorkTracker::default());
        let shared = Arc::new(CrawlShared {
            client,
            semaphore: Arc::new(Semaphore::new(workers)),
            visited: DashMap::new(),
            tracker: tracker.clone(),
            root: root.clone(),
            max_depth,
            timeout: self.request_timeout,
        });

        let (target_tx, mut target_rx) = mpsc::channel::<(Target, WorkGuard)>(self.queue_len);
        let (stream_tx, mut stream_rx) = mpsc::channel::<(Vec<Target>, WorkGuard)>(workers);
        let (err_tx, mut err_rx) = mpsc::channel::<FetchError>(self.queue_len);

        let handler = self.error_handler.clone();
        let reporter = tokio::spawn(async move {
            while let Some(error) = err_rx.recv().await {
                if let Some(handler) = &handler {
                    // a panicking callback must not take the crawl down
                    let _ = catch_unwind(AssertUnwindSafe(|| handler(error)));
                }
            }
        });

        let root_guard = tracker.add();
        if target_tx
            .send((Target { uri: root, level: 0 }, root_guard))
            .await
            .is_err()
        {
            return Vec::new();
        }

        loop {
            tokio::select! {
                Some((target, guard)) = target_rx.recv() => {
                    tokio::spawn(fetch_target(
                        shared.clone(),
                        target,
                        stream_tx.clone(),
                        err_tx.clone(),
                        guard,
                    ));
                }
                Some((children, guard)) = stream_rx.recv() => {
                    tokio::spawn(forward_targets(
                        children,
                        target_tx.clone(),
                        tracker.clone(),
                        guard,
                    ));
                }
                _ = tracker.idle() => break,
            }
        }

        drop(target_tx);
        drop(stream_tx);
        drop(err_tx);
        // the reporter exits once every in-flight error has been delivered
        let _ = reporter.await;

        shared
            .visited
            .iter()
            .map(|entry| MapItem {
                uri: entry.key().clone(),
                meta: DocumentMeta {
                    modified: *entry.value(),
                },
            })
            .collect()
    }
}

/// Processes one target: claim the address, fetch the document, record the
/// entry and register the child stream when the depth cutoff allows one.
///
/// The child stream is registered before the task finishes (before its work
/// guard drops), so termination detection never misses in-flight children.
async fn fetch_target(
    shared: Arc<CrawlShared>,
    target: Target,
    stream_tx: Sender<(Vec<Target>, WorkGuard)>,
    err_tx: Sender<FetchError>,
    _guard: WorkGuard,
) {
    // claim the address before fetching; first claim wins, so an address is
    // fetched at most once per crawl
    match shared.visited.entry(target.uri.clone()) {
        Entry::Occupied(_) => return,
        Entry::Vacant(slot) => {
            slot.insert(None);
        }
    }

    let permit = shared
        .semaphore
        .clone()
        .acquire_owned()
        .await
        .expect("crawl semaphore closed");
    // scope `outcome` (which holds a non-`Send` `Html`) so the task future
    // stays `Send` across the channel awaits below
    let (children, error) = {
        let outcome = fetch_document(&shared.client, &target.uri, shared.timeout).await;
        drop(permit);

        match outcome {
            Ok((doc, meta)) => {
                if meta.modified.is_some() {
                    if let Some(mut slot) = shared.visited.get_mut(&target.uri) {
                        *slot = meta.modified;
                    }
                }
                if target.level < shared.max_depth {
                    (Some(discovered_targets(&doc, &target, &shared.root)), None)
                } else {
                    (None, None)
                }
            }
            Err(error) => (None, Some(error)),
        }
    };

    if let Some(error) = error {
        let _ = err_tx.send(error).await;
    }
    if let Some(children) = children {
        if !children.is_empty() {
            let guard = shared.tracker.add();
            let _ = stream_tx.send((children, guard)).await;
        }
    }
}

/// Resolves, filters and levels the links of a fetched document.
fn discovered_targets(doc: &Html, target: &Target, root: &SiteUri) -> Vec<Target> {
    let links = extract_links(doc);
    let base = links
        .base
        .as_deref()
        .and_then(|href| target.uri.resolve(href))
        .unwrap_or_else(|| root.clone());
    links
        .hrefs
        .iter()
        .filter_map(|href| base.resolve(href))
        .filter(|uri| root.contains(uri))
        .map(|uri| Target {
            uri,
            level: target.level + 1,
        })
        .collect()
}

/// Drains one child stream into the pending-target queue, blocking on
/// backpressure when the queue is full.
async fn forward_targets(
    children: Vec<Target>,
    target_tx: Sender<(Target, WorkGuard)>,
    tracker: Arc<WorkTracker>,
    _guard: WorkGuard,
) {
    for child in children {
        let guard = tracker.add();
        if target_tx.send((child, guard)).await.is_err() {
            return;
        }
    }
}

/// Counted set of in-flight work units.
#[derive(Default)]
struct WorkTracker {
    active: AtomicUsize,
    done: Notify,
}

impl WorkTracker {
    fn add(self: &Arc<Self>) -> WorkGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        WorkGuard {
            tracker: self.clone(),
        }
    }

    /// Resolves when the unit count reaches zero.
    async fn idle(&self) {
        loop {
            let notified = self.done.notified();
            tokio::pin!(notified);
            // register before the check so a drop between check and await
            // cannot be missed
            notified.as_mut().enable();
            if self.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Releases one work unit on drop.
struct WorkGuard {
    tracker: Arc<WorkTracker>,
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        if self.tracker.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tracker.done.notify_waiters();
        }
    }
}
