//! Test doubles shared by the unit tests of this crate.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::bus::{BusConfig, RedeliveryPolicy, TransitionBus, handler_fn};
use crate::database::{Check, Database, DatabaseImpl, Site, SiteStatus, initialize_database};
use crate::monitoring::{Prober, TransitionEvent};
use crate::pool::open_pool;

/// On-disk libsql database in a temporary directory
pub async fn create_test_database() -> Result<(DatabaseImpl, TempDir)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("test.db");
    let pool = open_pool(&path.to_string_lossy(), 4).await?;

    let conn = pool.get().await.map_err(|e| anyhow!("{e}"))?;
    initialize_database(&conn).await?;
    drop(conn);

    Ok((DatabaseImpl::new_from_pool(pool), dir))
}

/// In-memory store with per-site write fault injection
#[derive(Default)]
pub struct MemoryDatabase {
    sites: Mutex<Vec<Site>>,
    checks: Mutex<Vec<Check>>,
    failing_writes: Mutex<HashSet<i64>>,
    failing_reads: AtomicBool,
}

impl MemoryDatabase {
    pub fn with_sites(sites: Vec<Site>) -> Self {
        Self { sites: Mutex::new(sites), ..Self::default() }
    }

    pub fn push_check(&self, check: Check) {
        self.checks.lock().unwrap().push(check);
    }

    /// Checks of a site in insertion order
    pub fn checks_for(&self, site_id: i64) -> Vec<Check> {
        self.checks.lock().unwrap().iter().filter(|c| c.site_id == site_id).cloned().collect()
    }

    pub fn fail_writes_for(&self, site_id: i64) {
        self.failing_writes.lock().unwrap().insert(site_id);
    }

    pub fn fail_reads(&self) {
        self.failing_reads.store(true, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<()> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("injected read failure"));
        }
        Ok(())
    }

    fn latest(&self, site_id: i64) -> Option<Check> {
        self.checks
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.site_id == site_id)
            .max_by_key(|(index, c)| (c.checked_at, *index))
            .map(|(_, c)| c.clone())
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn get_sites(&self) -> Result<Vec<Site>> {
        self.check_reads()?;
        Ok(self.sites.lock().unwrap().clone())
    }

    async fn get_site(&self, id: i64) -> Result<Option<Site>> {
        Ok(self.sites.lock().unwrap().iter().find(|s| s.id == id).cloned())
    }

    async fn get_latest_check(&self, site_id: i64) -> Result<Option<Check>> {
        Ok(self.latest(site_id))
    }

    async fn save_check(&self, check: &Check) -> Result<i64> {
        if self.failing_writes.lock().unwrap().contains(&check.site_id) {
            return Err(anyhow!("injected write failure for site {}", check.site_id));
        }
        let mut checks = self.checks.lock().unwrap();
        checks.push(check.clone());
        Ok(checks.len() as i64)
    }

    async fn get_latest_checks(&self) -> Result<Vec<SiteStatus>> {
        self.check_reads()?;
        let sites = self.sites.lock().unwrap().clone();
        Ok(sites
            .into_iter()
            .filter_map(|site| {
                self.latest(site.id).map(|check| SiteStatus {
                    id: site.id,
                    url: site.url,
                    up: check.up,
                    checked_at: check.checked_at,
                })
            })
            .collect())
    }
}

/// Prober answering from per-target scripts, falling back to a default
pub struct ScriptedProber {
    default_up: bool,
    scripts: Mutex<HashMap<String, VecDeque<bool>>>,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedProber {
    pub fn new(default_up: bool) -> Self {
        Self {
            default_up,
            scripts: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            panicking: Mutex::new(HashSet::new()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue verdicts for a target, consumed one per probe
    pub fn script(&self, target: &str, verdicts: impl IntoIterator<Item = bool>) {
        self.scripts.lock().unwrap().entry(target.to_string()).or_default().extend(verdicts);
    }

    /// Make every probe of a target fail with a transport-style error
    pub fn fail(&self, target: &str) {
        self.failing.lock().unwrap().insert(target.to_string());
    }

    /// Make every probe of a target panic
    pub fn panic_on(&self, target: &str) {
        self.panicking.lock().unwrap().insert(target.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, target: &str) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        // Guard released before panicking so the mutex is not poisoned
        let panics = self.panicking.lock().unwrap().contains(target);
        if panics {
            panic!("prober bug for {target}");
        }
        if self.failing.lock().unwrap().contains(target) {
            return Err(anyhow!("connection refused"));
        }

        let up = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(target)
            .and_then(VecDeque::pop_front)
            .unwrap_or(self.default_up);
        if up { Ok(1) } else { Err(anyhow!("HTTP check failed with status code: 503")) }
    }
}

/// Receiving end of [`collecting_bus`]
pub struct EventCollector {
    rx: mpsc::UnboundedReceiver<TransitionEvent>,
}

impl EventCollector {
    pub async fn next(&mut self) -> TransitionEvent {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for a transition")
            .expect("collector channel closed")
    }

    /// Assert no further transition shows up shortly
    pub async fn assert_quiet(&mut self) {
        let extra = tokio::time::timeout(Duration::from_millis(50), self.rx.recv()).await;
        assert!(!matches!(extra, Ok(Some(_))), "unexpected transition: {extra:?}");
    }
}

/// Bus with one subscriber forwarding every event to the returned collector
pub fn collecting_bus() -> (Arc<TransitionBus>, EventCollector) {
    let bus = Arc::new(TransitionBus::new(BusConfig {
        queue_capacity: 16,
        redelivery: RedeliveryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        },
    }));
    let (tx, rx) = mpsc::unbounded_channel();
    bus.subscribe(
        "collector",
        handler_fn(move |event| {
            let tx = tx.clone();
            async move { tx.send(event).map_err(|_| anyhow!("collector dropped")) }
        }),
    )
    .expect("fresh bus accepts subscribers");

    (bus, EventCollector { rx })
}
