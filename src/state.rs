//! Process-wide pipeline state.
//!
//! All mutable cross-component state lives in one explicit [`PipelineState`]
//! passed to every component, instead of scattered globals:
//!
//! - [`BuildStats`]: per-task timings, reset each build (orchestrator-owned)
//! - [`BundleHealth`]: per-asset-type success flags gating deployment
//! - [`ActiveOperations`]: in-flight deploy tokens consulted by shutdown
//! - auto-deploy toggle and the shutdown state machine
//!
//! Writer discipline: the build orchestrator is the only writer of stats and
//! health flags; the deployment manager only registers/deregisters
//! operations; the session controller only drives the shutdown machine.

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::{
    sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering},
    thread,
    time::{Duration, Instant, SystemTime},
};

/// Drain poll interval used while shutdown waits for operations.
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Everything the pipeline mutates at runtime.
#[derive(Default)]
pub struct PipelineState {
    pub stats: BuildStats,
    pub bundles: BundleHealth,
    pub operations: ActiveOperations,
    pub shutdown: ShutdownState,

    /// When on, a successful watched rebuild triggers the matching deploy.
    pub auto_deploy: AtomicBool,

    /// Serializes full builds; a trigger arriving mid-build queues behind it.
    pub build_lock: Mutex<()>,

    /// Per-asset-type output locks: a watched subset rebuild and a deploy of
    /// the same asset type take the same lock, so uploads never read
    /// half-written bundles.
    pub output_locks: OutputLocks,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
pub struct OutputLocks {
    pub scripts: Mutex<()>,
    pub styles: Mutex<()>,
}

// ============================================================================
// Asset Types
// ============================================================================

/// Granularity at which build success is tracked and deploys are gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetType {
    Scripts,
    Styles,
    Images,
    Fonts,
}

impl AssetType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Scripts => "scripts",
            Self::Styles => "styles",
            Self::Images => "images",
            Self::Fonts => "fonts",
        }
    }
}

// ============================================================================
// Build Stats
// ============================================================================

/// Per-build task timing, reset at the start of every build and frozen at
/// its end for reporting.
#[derive(Default)]
pub struct BuildStats {
    inner: Mutex<StatsInner>,
    build_count: AtomicU64,
}

#[derive(Default)]
struct StatsInner {
    /// (task name, duration) in completion order.
    tasks: Vec<(&'static str, Duration)>,
    started: Option<Instant>,
    total: Option<Duration>,
    last_success: Option<SystemTime>,
}

impl BuildStats {
    /// Reset timings for a new build. Returns the new build number (1-based).
    pub fn begin(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.tasks.clear();
        inner.started = Some(Instant::now());
        inner.total = None;
        self.build_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record one task's duration. Called for failed tasks too: time-to-failure
    /// is diagnostic data.
    pub fn record(&self, name: &'static str, duration: Duration) {
        self.inner.lock().tasks.push((name, duration));
    }

    /// Freeze the build's total time; a successful build also stamps
    /// `last_success`.
    pub fn finish(&self, success: bool) -> Duration {
        let mut inner = self.inner.lock();
        let total = inner.started.map(|s| s.elapsed()).unwrap_or_default();
        inner.total = Some(total);
        if success {
            inner.last_success = Some(SystemTime::now());
        }
        total
    }

    pub fn build_count(&self) -> u64 {
        self.build_count.load(Ordering::Relaxed)
    }

    pub fn last_success(&self) -> Option<SystemTime> {
        self.inner.lock().last_success
    }

    /// Task timings of the most recent build, in completion order.
    pub fn tasks(&self) -> Vec<(&'static str, Duration)> {
        self.inner.lock().tasks.clone()
    }
}

// ============================================================================
// Bundle Health
// ============================================================================

/// Per-asset-type success flags (scripts and styles only; image and font
/// copies have no compile step to fail).
///
/// A flag is true only while the last compile of that type succeeded; the
/// deployment manager refuses to deploy a type whose flag is false.
#[derive(Default)]
pub struct BundleHealth {
    scripts: AtomicBool,
    styles: AtomicBool,
}

impl BundleHealth {
    pub fn set(&self, asset: AssetType, ok: bool) {
        match asset {
            AssetType::Scripts => self.scripts.store(ok, Ordering::SeqCst),
            AssetType::Styles => self.styles.store(ok, Ordering::SeqCst),
            // copies are not compiled, nothing to track
            AssetType::Images | AssetType::Fonts => {}
        }
    }

    /// True when the given type may be deployed. Untracked types are always
    /// deployable.
    pub fn is_healthy(&self, asset: AssetType) -> bool {
        match asset {
            AssetType::Scripts => self.scripts.load(Ordering::SeqCst),
            AssetType::Styles => self.styles.load(Ordering::SeqCst),
            AssetType::Images | AssetType::Fonts => true,
        }
    }
}

// ============================================================================
// Active Operations
// ============================================================================

/// Set of opaque tokens, one per in-flight deploy.
///
/// Shutdown refuses to terminate while the set is non-empty, up to a bounded
/// wait. Registration hands back an RAII token so deregistration happens on
/// every exit path, panics included.
#[derive(Default)]
pub struct ActiveOperations {
    next_id: AtomicU64,
    live: Mutex<FxHashSet<u64>>,
}

impl ActiveOperations {
    /// Register a new in-flight operation.
    #[must_use = "dropping the token immediately deregisters the operation"]
    pub fn begin(&self) -> OperationToken<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live.lock().insert(id);
        OperationToken { owner: self, id }
    }

    pub fn count(&self) -> usize {
        self.live.lock().len()
    }

    /// Block until the set drains or `timeout` elapses.
    ///
    /// Returns true when fully drained.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.count() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(DRAIN_POLL);
        }
    }
}

/// RAII registration for one in-flight operation.
pub struct OperationToken<'a> {
    owner: &'a ActiveOperations,
    id: u64,
}

impl Drop for OperationToken<'_> {
    fn drop(&mut self) {
        self.owner.live.lock().remove(&self.id);
    }
}

// ============================================================================
// Shutdown State
// ============================================================================

const PHASE_RUNNING: u8 = 0;
const PHASE_SHUTTING_DOWN: u8 = 1;
const PHASE_TERMINATED: u8 = 2;

/// Running -> ShuttingDown -> Terminated, transitions one-way and idempotent.
#[derive(Default)]
pub struct ShutdownState {
    phase: AtomicU8,
}

impl ShutdownState {
    /// Request shutdown. Returns false when already past Running (the second
    /// trigger is a no-op).
    pub fn begin(&self) -> bool {
        self.phase
            .compare_exchange(
                PHASE_RUNNING,
                PHASE_SHUTTING_DOWN,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    pub fn terminate(&self) {
        self.phase.store(PHASE_TERMINATED, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.phase.load(Ordering::SeqCst) == PHASE_RUNNING
    }

    pub fn is_shutting_down(&self) -> bool {
        self.phase.load(Ordering::SeqCst) != PHASE_RUNNING
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_reset_each_build() {
        let stats = BuildStats::default();

        assert_eq!(stats.begin(), 1);
        stats.record("core scripts", Duration::from_millis(10));
        stats.record("core styles", Duration::from_millis(20));
        assert_eq!(stats.tasks().len(), 2);

        assert_eq!(stats.begin(), 2);
        assert!(stats.tasks().is_empty());
    }

    #[test]
    fn test_stats_last_success_only_on_success() {
        let stats = BuildStats::default();

        stats.begin();
        stats.finish(false);
        assert!(stats.last_success().is_none());

        stats.begin();
        stats.finish(true);
        assert!(stats.last_success().is_some());
    }

    #[test]
    fn test_bundle_health_gating() {
        let health = BundleHealth::default();

        // nothing compiled yet
        assert!(!health.is_healthy(AssetType::Scripts));
        assert!(!health.is_healthy(AssetType::Styles));
        // untracked types always pass
        assert!(health.is_healthy(AssetType::Images));
        assert!(health.is_healthy(AssetType::Fonts));

        health.set(AssetType::Scripts, true);
        assert!(health.is_healthy(AssetType::Scripts));

        health.set(AssetType::Scripts, false);
        assert!(!health.is_healthy(AssetType::Scripts));
    }

    #[test]
    fn test_operation_token_deregisters_on_drop() {
        let ops = ActiveOperations::default();

        let first = ops.begin();
        let second = ops.begin();
        assert_eq!(ops.count(), 2);

        drop(first);
        assert_eq!(ops.count(), 1);
        drop(second);
        assert_eq!(ops.count(), 0);
    }

    #[test]
    fn test_wait_drained_completes_early() {
        let ops = ActiveOperations::default();
        let first = ops.begin();
        let second = ops.begin();

        thread::scope(|s| {
            s.spawn(move || {
                thread::sleep(Duration::from_millis(150));
                drop(first);
                drop(second);
            });

            let started = Instant::now();
            let drained = ops.wait_drained(Duration::from_secs(5));

            assert!(drained);
            // both deregistered within ~200ms, far before the 5s bound
            assert!(started.elapsed() < Duration::from_secs(1));
        });
    }

    #[test]
    fn test_wait_drained_hits_timeout_boundary() {
        let ops = ActiveOperations::default();
        let _stuck = ops.begin();

        let started = Instant::now();
        let drained = ops.wait_drained(Duration::from_millis(300));

        assert!(!drained);
        assert!(started.elapsed() >= Duration::from_millis(300));
        // force-proceed happens close to the boundary, not multiples of it
        assert!(started.elapsed() < Duration::from_millis(900));
    }

    #[test]
    fn test_shutdown_idempotent() {
        let shutdown = ShutdownState::default();
        assert!(shutdown.is_running());

        assert!(shutdown.begin());
        assert!(!shutdown.begin()); // second trigger is a no-op
        assert!(shutdown.is_shutting_down());

        shutdown.terminate();
        assert!(shutdown.is_shutting_down());
    }
}
