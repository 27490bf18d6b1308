use std::time::Duration;

use tracing::{error, info, warn};

use crate::api::{CredentialSource, PageFetcher};
use crate::config::{FetchConfig, RecoveryConfig};
use crate::detector::{DetectMode, detect_purchases};
use crate::error::FetchError;
use crate::fetcher::fetch_snapshot;
use crate::types::{Listing, Purchase, Snapshot};

/// Where the controller is in its fetch/compare/advance lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No previous snapshot yet; the next fetch seeds it.
    Bootstrap,
    /// Normal operation: fetch current, diff against previous, advance.
    Steady,
    /// A fetch failed; rotate credentials and roll back before resuming.
    Recovering,
}

/// Owns the previous/current/backup snapshots across polling iterations and
/// decides which one to refresh.
///
/// State is exclusively held here and only touched between await points, so
/// no synchronization is needed as long as a single task drives `step`.
pub struct CycleController<M> {
    market: M,
    fetch: FetchConfig,
    recovery: RecoveryConfig,
    mode: DetectMode,
    phase: Phase,
    previous: Snapshot,
    current: Snapshot,
    backup: Snapshot,
    consecutive_failures: u32,
}

impl<M: PageFetcher + CredentialSource> CycleController<M> {
    pub fn new(market: M, fetch: FetchConfig, recovery: RecoveryConfig, mode: DetectMode) -> Self {
        Self {
            market,
            fetch,
            recovery,
            mode,
            phase: Phase::Bootstrap,
            previous: Vec::new(),
            current: Vec::new(),
            backup: Vec::new(),
            consecutive_failures: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn previous(&self) -> &[Listing] {
        &self.previous
    }

    pub fn current_is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Run one cycle: fetch whichever snapshot is stale, diff, advance.
    ///
    /// Failures never escape: a fetch error sends the controller through the
    /// recovering transition (credential refresh, rollback, backoff) and the
    /// cycle yields no purchases. The loop is meant to run forever.
    pub async fn step(&mut self) -> Vec<Purchase> {
        match self.phase {
            Phase::Bootstrap => {
                self.bootstrap().await;
                Vec::new()
            }
            Phase::Steady => self.steady().await,
            // recover() always leaves Steady behind; reaching here means a
            // caller resumed a controller mid-transition, so just resume
            Phase::Recovering => {
                self.recover().await;
                Vec::new()
            }
        }
    }

    async fn bootstrap(&mut self) {
        info!("Bootstrapping: fetching the seed snapshot");
        match self.fetch_once().await {
            Ok(mut snapshot) => {
                if snapshot.is_empty() {
                    warn!("Seed snapshot came back empty, staying in bootstrap");
                    return;
                }
                sort_by_name(&mut snapshot);
                info!("Seeded previous snapshot with {} listings", snapshot.len());
                self.previous = snapshot;
                self.consecutive_failures = 0;
                self.phase = Phase::Steady;
            }
            Err(e) => {
                error!("Seed fetch failed: {e}");
                self.phase = Phase::Recovering;
                self.recover().await;
            }
        }
    }

    async fn steady(&mut self) -> Vec<Purchase> {
        self.current = match self.fetch_once().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Snapshot fetch failed: {e}");
                self.phase = Phase::Recovering;
                self.recover().await;
                return Vec::new();
            }
        };

        // An empty scrape while previous is populated is a transient upstream
        // hiccup, not a real zero-listings state: re-fetch once.
        if self.current.is_empty() && !self.previous.is_empty() {
            warn!("Current snapshot empty while previous is not, re-fetching once");
            self.current = match self.fetch_once().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    error!("Re-fetch failed: {e}");
                    self.phase = Phase::Recovering;
                    self.recover().await;
                    return Vec::new();
                }
            };
        }

        sort_by_name(&mut self.current);
        let purchases = detect_purchases(&self.previous, &self.current, self.mode);
        if !purchases.is_empty() {
            info!("Found {} new purchases", purchases.len());
        }

        // roll forward: previous and backup both become the sorted current
        self.previous = std::mem::take(&mut self.current);
        self.backup = self.previous.clone();
        self.consecutive_failures = 0;
        purchases
    }

    /// The recovering transition: rotate credentials exactly once, restore
    /// the last known-good snapshot, back off, resume steady polling.
    async fn recover(&mut self) {
        if let Err(e) = self.market.refresh_credentials().await {
            warn!("Credential refresh failed: {e}");
        } else {
            info!("Credentials rotated");
        }

        self.previous = self.backup.clone();
        self.current.clear();

        let delay = backoff_delay(
            self.consecutive_failures,
            self.recovery.backoff_base_ms,
            self.recovery.backoff_max_ms,
        );
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if !delay.is_zero() {
            info!("Backing off {delay:?} before resuming");
            tokio::time::sleep(delay).await;
        }
        self.phase = Phase::Steady;
    }

    async fn fetch_once(&self) -> Result<Snapshot, FetchError> {
        let secs = self.fetch.cycle_timeout_secs;
        tokio::time::timeout(
            Duration::from_secs(secs),
            fetch_snapshot(
                &self.market,
                self.fetch.page_count,
                self.fetch.page_size,
                self.fetch.concurrency,
            ),
        )
        .await
        .map_err(|_| FetchError::Timeout { secs })?
    }
}

fn sort_by_name(snapshot: &mut Snapshot) {
    snapshot.sort_by(|a, b| a.name.cmp(&b.name));
}

/// Exponential backoff with a cap: base * 2^failures, saturating.
fn backoff_delay(failures: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exp = base_ms.saturating_mul(1u64.checked_shl(failures).unwrap_or(u64::MAX));
    Duration::from_millis(exp.min(max_ms))
}
