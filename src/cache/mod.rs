//! Page cache with stale-while-revalidate semantics
//!
//! Generated pages are kept per route together with the time they were
//! generated. A page with a revalidate interval turns stale once the interval
//! has elapsed; the first request that sees it stale is told to regenerate it
//! in the background while everyone keeps receiving the stale copy. Routes
//! that were never generated report a miss, and only the first miss starts a
//! generation.
//!
//! Redirects for posts the CMS does not know are kept apart from pages, in a
//! bounded set whose entries expire after the revalidate interval, so
//! requests for arbitrary uids cannot grow the cache.
//!
//! The [`Manifest`] records what a static build wrote to disk so the next
//! build can prune pages that disappeared from the CMS.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

/// Manifest file name
const MANIFEST_FILE: &str = ".spacetraveling/manifest.json";

/// Default number of remembered not-found redirects
pub const MISSING_CAPACITY: usize = 1024;

/// Lifetime of a not-found redirect stored without an interval
const MISSING_TTL: Duration = Duration::from_secs(60);

/// What a route resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageBody {
    /// Rendered HTML
    Html(String),
    /// Temporary redirect to another path
    Redirect(String),
}

/// A generated page
#[derive(Debug, Clone)]
pub struct CachedPage {
    pub body: PageBody,
    pub generated_at: SystemTime,
    /// `None` means the page never turns stale
    pub revalidate: Option<Duration>,
}

impl CachedPage {
    /// Whether the page is past its revalidate interval
    pub fn is_stale(&self, now: SystemTime) -> bool {
        match self.revalidate {
            Some(interval) => now
                .duration_since(self.generated_at)
                .map(|age| age >= interval)
                .unwrap_or(false),
            None => false,
        }
    }
}

/// Result of a cache lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A page exists; `revalidate` is true for exactly one caller once it is stale
    Hit { body: PageBody, revalidate: bool },
    /// Nothing generated yet; `generate` is true for the first caller only
    Miss { generate: bool },
}

/// Redirect remembered for a route the CMS has no post for
#[derive(Debug, Clone)]
struct MissingEntry {
    location: String,
    expires_at: SystemTime,
}

#[derive(Debug, Default)]
struct Inner {
    pages: HashMap<String, CachedPage>,
    missing: HashMap<String, MissingEntry>,
    pending: HashSet<String>,
}

/// In-memory page store shared by request handlers
#[derive(Debug)]
pub struct PageCache {
    inner: Mutex<Inner>,
    missing_capacity: usize,
}

impl Default for PageCache {
    fn default() -> Self {
        Self::with_missing_capacity(MISSING_CAPACITY)
    }
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache remembering at most `capacity` not-found redirects
    pub fn with_missing_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            missing_capacity: capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a route, claiming the (re)generation when one is due
    pub fn lookup(&self, route: &str, now: SystemTime) -> Lookup {
        let mut inner = self.lock();
        let cached = inner
            .pages
            .get(route)
            .map(|page| (page.body.clone(), page.is_stale(now)));

        match cached {
            Some((body, false)) => Lookup::Hit {
                body,
                revalidate: false,
            },
            Some((body, true)) => {
                let revalidate = inner.pending.insert(route.to_string());
                if revalidate {
                    tracing::debug!("Page {} is stale, regenerating", route);
                }
                Lookup::Hit { body, revalidate }
            }
            None => {
                let missing = inner.missing.get(route).cloned();
                match missing {
                    Some(entry) if entry.expires_at > now => Lookup::Hit {
                        body: PageBody::Redirect(entry.location),
                        revalidate: false,
                    },
                    expired => {
                        if expired.is_some() {
                            inner.missing.remove(route);
                        }
                        Lookup::Miss {
                            generate: inner.pending.insert(route.to_string()),
                        }
                    }
                }
            }
        }
    }

    /// Record a generated page and release its pending mark.
    ///
    /// A redirect replaces any page for the route and is remembered in the
    /// bounded not-found set until the interval passes.
    pub fn store(
        &self,
        route: &str,
        body: PageBody,
        revalidate: Option<Duration>,
        now: SystemTime,
    ) {
        let mut inner = self.lock();
        inner.pending.remove(route);

        if let PageBody::Redirect(location) = body {
            inner.pages.remove(route);
            self.remember_missing(&mut inner, route, location, revalidate, now);
            return;
        }

        inner.missing.remove(route);
        inner.pages.insert(
            route.to_string(),
            CachedPage {
                body,
                generated_at: now,
                revalidate,
            },
        );
    }

    fn remember_missing(
        &self,
        inner: &mut Inner,
        route: &str,
        location: String,
        revalidate: Option<Duration>,
        now: SystemTime,
    ) {
        if self.missing_capacity == 0 {
            return;
        }
        if !inner.missing.contains_key(route) && inner.missing.len() >= self.missing_capacity {
            inner.missing.retain(|_, entry| entry.expires_at > now);
        }
        if !inner.missing.contains_key(route) && inner.missing.len() >= self.missing_capacity {
            let oldest = inner
                .missing
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                inner.missing.remove(&oldest);
            }
        }

        inner.missing.insert(
            route.to_string(),
            MissingEntry {
                location,
                expires_at: now + revalidate.unwrap_or(MISSING_TTL),
            },
        );
    }

    /// Release the pending mark after a failed generation, keeping any old page
    pub fn abandon(&self, route: &str) {
        self.lock().pending.remove(route);
    }

    /// Whether a generation for the route is in flight
    pub fn is_pending(&self, route: &str) -> bool {
        self.lock().pending.contains(route)
    }

    /// Number of cached routes
    pub fn len(&self) -> usize {
        self.lock().pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of remembered not-found redirects
    pub fn missing_len(&self) -> usize {
        self.lock().missing.len()
    }
}

/// A page written by a static build
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestEntry {
    pub route: String,
    /// Output file relative to the public dir
    pub file: String,
    /// Unix timestamp of generation
    pub generated_at: u64,
    pub revalidate_secs: Option<u64>,
}

/// Record of the last static build
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Manifest {
    /// Version of the manifest format
    pub version: u32,
    pub pages: Vec<ManifestEntry>,
}

impl Manifest {
    /// Current manifest format version
    const VERSION: u32 = 1;

    /// Create an empty manifest with version set
    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            pages: Vec::new(),
        }
    }

    /// Load the manifest from disk, or an empty one
    pub fn load(base_dir: &Path) -> Self {
        let path = base_dir.join(MANIFEST_FILE);
        if let Ok(content) = fs::read_to_string(&path) {
            match serde_json::from_str::<Manifest>(&content) {
                Ok(manifest) if manifest.version == Self::VERSION => return manifest,
                Ok(_) => tracing::info!("Manifest version mismatch, ignoring it"),
                Err(e) => tracing::warn!("Failed to parse manifest {:?}: {}", path, e),
            }
        }
        Self::new()
    }

    /// Save the manifest to disk
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = base_dir.join(MANIFEST_FILE);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Directory holding the manifest
    pub fn dir(base_dir: &Path) -> std::path::PathBuf {
        base_dir.join(".spacetraveling")
    }

    /// Record a written page
    pub fn record(
        &mut self,
        route: &str,
        file: &str,
        generated_at: SystemTime,
        revalidate: Option<Duration>,
    ) {
        self.pages.push(ManifestEntry {
            route: route.to_string(),
            file: file.to_string(),
            generated_at: unix_secs(generated_at),
            revalidate_secs: revalidate.map(|d| d.as_secs()),
        });
    }

    /// Files of this manifest that `newer` no longer contains
    pub fn removed_files<'a>(&'a self, newer: &Manifest) -> Vec<&'a str> {
        let kept: HashSet<&str> = newer.pages.iter().map(|e| e.file.as_str()).collect();
        self.pages
            .iter()
            .map(|e| e.file.as_str())
            .filter(|f| !kept.contains(f))
            .collect()
    }
}

/// Seconds since the Unix epoch
pub fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIVE_MIN: Duration = Duration::from_secs(300);

    fn html(s: &str) -> PageBody {
        PageBody::Html(s.to_string())
    }

    #[test]
    fn test_miss_claims_generation_once() {
        let cache = PageCache::new();
        let now = SystemTime::now();
        assert_eq!(cache.lookup("/post/a", now), Lookup::Miss { generate: true });
        assert_eq!(cache.lookup("/post/a", now), Lookup::Miss { generate: false });
        assert!(cache.is_pending("/post/a"));

        cache.store("/post/a", html("v1"), Some(FIVE_MIN), now);
        assert!(!cache.is_pending("/post/a"));
        assert_eq!(
            cache.lookup("/post/a", now),
            Lookup::Hit {
                body: html("v1"),
                revalidate: false
            }
        );
    }

    #[test]
    fn test_stale_while_revalidate() {
        let cache = PageCache::new();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        cache.store("/post/a", html("v1"), Some(FIVE_MIN), t0);

        let before = t0 + Duration::from_secs(299);
        assert_eq!(
            cache.lookup("/post/a", before),
            Lookup::Hit {
                body: html("v1"),
                revalidate: false
            }
        );

        let after = t0 + FIVE_MIN;
        assert_eq!(
            cache.lookup("/post/a", after),
            Lookup::Hit {
                body: html("v1"),
                revalidate: true
            }
        );
        // Still stale, but the regeneration is already claimed
        assert_eq!(
            cache.lookup("/post/a", after),
            Lookup::Hit {
                body: html("v1"),
                revalidate: false
            }
        );

        cache.store("/post/a", html("v2"), Some(FIVE_MIN), after);
        assert_eq!(
            cache.lookup("/post/a", after),
            Lookup::Hit {
                body: html("v2"),
                revalidate: false
            }
        );
    }

    #[test]
    fn test_abandon_keeps_stale_copy() {
        let cache = PageCache::new();
        let t0 = SystemTime::UNIX_EPOCH;
        cache.store("/post/a", html("v1"), Some(FIVE_MIN), t0);

        let later = t0 + Duration::from_secs(600);
        assert!(matches!(
            cache.lookup("/post/a", later),
            Lookup::Hit { revalidate: true, .. }
        ));
        cache.abandon("/post/a");
        assert_eq!(
            cache.lookup("/post/a", later),
            Lookup::Hit {
                body: html("v1"),
                revalidate: true
            }
        );
    }

    #[test]
    fn test_pages_without_interval_never_stale() {
        let cache = PageCache::new();
        cache.store("/", html("index"), None, SystemTime::UNIX_EPOCH);
        assert_eq!(
            cache.lookup("/", SystemTime::now()),
            Lookup::Hit {
                body: html("index"),
                revalidate: false
            }
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_redirects_are_not_pages() {
        let cache = PageCache::new();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        assert_eq!(cache.lookup("/post/gone", t0), Lookup::Miss { generate: true });
        cache.store(
            "/post/gone",
            PageBody::Redirect("/".to_string()),
            Some(FIVE_MIN),
            t0,
        );

        assert_eq!(cache.len(), 0);
        assert_eq!(cache.missing_len(), 1);
        assert!(!cache.is_pending("/post/gone"));
        assert_eq!(
            cache.lookup("/post/gone", t0 + Duration::from_secs(10)),
            Lookup::Hit {
                body: PageBody::Redirect("/".to_string()),
                revalidate: false
            }
        );

        // Expired: looked up again like a route never seen
        assert_eq!(
            cache.lookup("/post/gone", t0 + FIVE_MIN),
            Lookup::Miss { generate: true }
        );
        assert_eq!(cache.missing_len(), 0);
    }

    #[test]
    fn test_redirect_replaces_deleted_post() {
        let cache = PageCache::new();
        let t0 = SystemTime::UNIX_EPOCH;
        cache.store("/post/a", html("v1"), Some(FIVE_MIN), t0);
        cache.store("/post/a", PageBody::Redirect("/".to_string()), Some(FIVE_MIN), t0);
        assert_eq!(cache.len(), 0);

        cache.store("/post/a", html("v2"), Some(FIVE_MIN), t0);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.missing_len(), 0);
    }

    #[test]
    fn test_missing_set_is_bounded() {
        let cache = PageCache::with_missing_capacity(4);
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        for i in 0..50 {
            let route = format!("/post/junk-{}", i);
            let now = t0 + Duration::from_secs(i);
            cache.lookup(&route, now);
            cache.store(&route, PageBody::Redirect("/".to_string()), Some(FIVE_MIN), now);
        }
        assert_eq!(cache.missing_len(), 4);
        assert!(cache.is_empty());

        // The newest entries survive
        assert!(matches!(
            cache.lookup("/post/junk-49", t0 + Duration::from_secs(50)),
            Lookup::Hit { .. }
        ));
        assert!(matches!(
            cache.lookup("/post/junk-0", t0 + Duration::from_secs(50)),
            Lookup::Miss { .. }
        ));
    }

    #[test]
    fn test_manifest_roundtrip_and_pruning() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();

        let mut old = Manifest::new();
        old.record("/", "index.html", now, None);
        old.record("/post/a", "post/a/index.html", now, Some(FIVE_MIN));
        old.save(dir.path()).unwrap();

        let loaded = Manifest::load(dir.path());
        assert_eq!(loaded.pages, old.pages);
        assert_eq!(loaded.pages[1].revalidate_secs, Some(300));

        let mut newer = Manifest::new();
        newer.record("/", "index.html", now, None);
        assert_eq!(loaded.removed_files(&newer), vec!["post/a/index.html"]);
    }

    #[test]
    fn test_manifest_missing_or_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Manifest::load(dir.path()).pages.is_empty());

        fs::create_dir_all(Manifest::dir(dir.path())).unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "{ nope").unwrap();
        assert!(Manifest::load(dir.path()).pages.is_empty());
    }
}
