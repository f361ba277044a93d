//! The background repeat loop.
//!
//! [`SharedState`] holds everything the front end edits (keys, delay,
//! randomize) together with the `running` flag, all behind one mutex that is
//! paired with a condvar. [`MacroRunner`] owns at most one worker thread that
//! ticks over that state:
//!
//! 1. snapshot keys, delay and randomize,
//! 2. press and release the keys as one chord,
//! 3. wait the (possibly randomized) delay, waking early on stop.
//!
//! `stop()` clears the flag under the mutex, notifies the condvar, and joins
//! the worker, so no tick can begin after it returns.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info};

use crate::injector::InputInjector;
use crate::keys::{KeyCode, KeySet};
use crate::store::Macro;

/// Smallest delay the runner accepts, in seconds.
pub const MIN_DELAY_SECS: u32 = 1;

/// Lowest percentage of the nominal delay a randomized wait can shrink to.
pub const RANDOM_MIN_PERCENT: u32 = 10;
/// Highest percentage of the nominal delay a randomized wait can reach.
pub const RANDOM_MAX_PERCENT: u32 = 100;

/// State shared between the front end and the worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub running: bool,
    pub keys: KeySet,
    pub delay: u32,
    pub randomize: bool,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            running: false,
            keys: Vec::new(),
            delay: MIN_DELAY_SECS,
            randomize: false,
        }
    }
}

/// Mutex-guarded [`RunState`] plus the condvar used to wake the worker.
#[derive(Debug, Default)]
pub struct SharedState {
    state: Mutex<RunState>,
    wake: Condvar,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared state seeded with a working key list and delay.
    pub fn with_keys(keys: KeySet, delay: u32) -> Self {
        let shared = Self::new();
        shared.set_keys(keys);
        shared.set_delay(delay);
        shared
    }

    // RunState is plain values, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> RunState {
        self.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn keys(&self) -> KeySet {
        self.lock().keys.clone()
    }

    pub fn set_keys(&self, keys: KeySet) {
        self.lock().keys = keys;
    }

    pub fn push_key(&self, key: KeyCode) {
        self.lock().keys.push(key);
    }

    /// Remove the key at `index`, returning it. Out-of-range is a no-op.
    pub fn remove_key(&self, index: usize) -> Option<KeyCode> {
        let mut state = self.lock();
        (index < state.keys.len()).then(|| state.keys.remove(index))
    }

    pub fn delay(&self) -> u32 {
        self.lock().delay
    }

    /// Set the delay in seconds, clamped to at least [`MIN_DELAY_SECS`].
    pub fn set_delay(&self, delay: u32) {
        self.lock().delay = delay.max(MIN_DELAY_SECS);
    }

    pub fn randomize(&self) -> bool {
        self.lock().randomize
    }

    pub fn set_randomize(&self, randomize: bool) {
        self.lock().randomize = randomize;
    }

    /// Replace the working keys and delay with a loaded macro's.
    pub fn apply_macro(&self, m: &Macro) {
        let mut state = self.lock();
        state.keys = m.keys.clone();
        state.delay = m.delay.max(MIN_DELAY_SECS);
    }

    /// Capture the working keys and delay as a macro ready to save.
    pub fn to_macro(&self, name: impl Into<String>) -> Macro {
        let state = self.lock();
        Macro {
            name: name.into(),
            keys: state.keys.clone(),
            delay: state.delay,
        }
    }
}

/// How long to wait after a tick.
///
/// Without randomization this is exactly `delay_secs`. With it, the delay
/// is scaled by a fresh percentage drawn uniformly from
/// `RANDOM_MIN_PERCENT..=RANDOM_MAX_PERCENT`.
pub fn wait_duration<R: Rng>(delay_secs: u32, randomize: bool, rng: &mut R) -> Duration {
    let nominal_ms = u64::from(delay_secs) * 1000;
    if !randomize {
        return Duration::from_millis(nominal_ms);
    }

    let percent = u64::from(rng.gen_range(RANDOM_MIN_PERCENT..=RANDOM_MAX_PERCENT));
    Duration::from_millis(nominal_ms * percent / 100)
}

/// Runs the tick loop on a background thread.
///
/// Two states: idle (no worker) and running (exactly one worker). Both
/// `start` while running and `stop` while idle are no-ops.
#[derive(Debug)]
pub struct MacroRunner {
    shared: Arc<SharedState>,
    injector: InputInjector,
    worker: Option<JoinHandle<()>>,
}

impl MacroRunner {
    pub fn new(shared: Arc<SharedState>, injector: InputInjector) -> Self {
        Self {
            shared,
            injector,
            worker: None,
        }
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Spawn the worker unless one is already active.
    ///
    /// Returns `true` if a new worker was started.
    pub fn start(&mut self) -> bool {
        if self.worker.is_some() {
            debug!("start ignored: runner already active");
            return false;
        }

        {
            let mut state = self.shared.lock();
            state.running = true;
            info!(
                "starting runner: {} key(s), {}s delay{}",
                state.keys.len(),
                state.delay,
                if state.randomize { ", randomized" } else { "" }
            );
        }

        let shared = Arc::clone(&self.shared);
        let injector = self.injector.clone();
        self.worker = Some(thread::spawn(move || tick_loop(&shared, &injector)));
        true
    }

    /// Signal the worker and block until it has exited.
    ///
    /// Returns `true` if a running worker was stopped.
    pub fn stop(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            debug!("stop ignored: runner idle");
            return false;
        };

        self.shared.lock().running = false;
        self.shared.wake.notify_all();

        if worker.join().is_err() {
            error!("runner thread panicked");
        }
        info!("runner stopped");
        true
    }
}

impl Drop for MacroRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn tick_loop(shared: &SharedState, injector: &InputInjector) {
    let mut rng = StdRng::from_entropy();
    let mut ticks: u64 = 0;

    loop {
        let (keys, delay, randomize) = {
            let state = shared.lock();
            if !state.running {
                break;
            }
            (state.keys.clone(), state.delay, state.randomize)
        };

        injector.inject(&keys);
        ticks += 1;

        let wait = wait_duration(delay, randomize, &mut rng);
        debug!("tick {}: waiting {:?}", ticks, wait);

        let state = shared.lock();
        let (state, _) = shared
            .wake
            .wait_timeout_while(state, wait, |s| s.running)
            .unwrap_or_else(PoisonError::into_inner);
        if !state.running {
            break;
        }
    }

    debug!("runner exiting after {} tick(s)", ticks);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::injector::{InputBackend, KeyEvent};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Default)]
    struct CountingBackend {
        batches: AtomicUsize,
    }

    impl InputBackend for CountingBackend {
        fn send(&self, batch: &[KeyEvent]) -> Result<usize> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            Ok(batch.len())
        }
    }

    fn runner_with(keys: KeySet, delay: u32) -> (MacroRunner, Arc<CountingBackend>) {
        let backend = Arc::new(CountingBackend::default());
        let shared = Arc::new(SharedState::with_keys(keys, delay));
        let runner = MacroRunner::new(shared, InputInjector::new(backend.clone()));
        (runner, backend)
    }

    fn wait_for_batches(backend: &CountingBackend, at_least: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while backend.batches.load(Ordering::SeqCst) < at_least {
            assert!(Instant::now() < deadline, "runner never ticked");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_wait_duration_fixed() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(wait_duration(3, false, &mut rng), Duration::from_secs(3));
    }

    #[test]
    fn test_wait_duration_randomized_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let wait = wait_duration(10, true, &mut rng);
            assert!(wait >= Duration::from_millis(1000), "{wait:?} too short");
            assert!(wait <= Duration::from_millis(10000), "{wait:?} too long");
        }
    }

    #[test]
    fn test_wait_duration_draws_per_call() {
        let mut rng = StdRng::seed_from_u64(7);
        let waits: Vec<Duration> = (0..50).map(|_| wait_duration(10, true, &mut rng)).collect();
        assert!(waits.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_set_delay_clamps_to_minimum() {
        let shared = SharedState::new();
        shared.set_delay(0);
        assert_eq!(shared.delay(), MIN_DELAY_SECS);
        shared.set_delay(5);
        assert_eq!(shared.delay(), 5);
    }

    #[test]
    fn test_push_key_keeps_order_and_duplicates() {
        let shared = SharedState::new();
        shared.push_key(0x41);
        shared.push_key(0x42);
        shared.push_key(0x41);
        assert_eq!(shared.keys(), vec![0x41, 0x42, 0x41]);
    }

    #[test]
    fn test_snapshot_reflects_every_field() {
        let shared = SharedState::with_keys(vec![0x20], 4);
        assert!(!shared.randomize());
        shared.set_randomize(true);
        assert!(shared.randomize());

        assert_eq!(
            shared.snapshot(),
            RunState {
                running: false,
                keys: vec![0x20],
                delay: 4,
                randomize: true,
            }
        );
    }

    #[test]
    fn test_remove_key_out_of_range_is_noop() {
        let shared = SharedState::with_keys(vec![0x41, 0x42], 1);
        assert_eq!(shared.remove_key(5), None);
        assert_eq!(shared.remove_key(0), Some(0x41));
        assert_eq!(shared.keys(), vec![0x42]);
    }

    #[test]
    fn test_apply_and_capture_macro() {
        let shared = SharedState::new();
        shared.apply_macro(&Macro {
            name: "chord".to_string(),
            keys: vec![65, 66],
            delay: 3,
        });
        assert_eq!(shared.keys(), vec![65, 66]);
        assert_eq!(shared.delay(), 3);

        let m = shared.to_macro("copy");
        assert_eq!(m.name, "copy");
        assert_eq!(m.keys, vec![65, 66]);
        assert_eq!(m.delay, 3);
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let (mut runner, backend) = runner_with(vec![0x41], 1);
        assert!(!runner.stop());
        assert!(!runner.is_running());
        assert!(!runner.shared().is_running());
        assert_eq!(backend.batches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_start_twice_runs_one_loop() {
        let (mut runner, backend) = runner_with(vec![0x41], 10);
        assert!(runner.start());
        assert!(!runner.start());
        wait_for_batches(&backend, 2);
        thread::sleep(Duration::from_millis(100));

        // one loop, one tick, two batches; a second loop would have doubled it
        assert_eq!(backend.batches.load(Ordering::SeqCst), 2);
        assert!(runner.stop());
    }

    #[test]
    fn test_stop_interrupts_wait_and_joins() {
        let (mut runner, backend) = runner_with(vec![0x41, 0x42], 10);
        runner.start();
        wait_for_batches(&backend, 2);

        let started = Instant::now();
        assert!(runner.stop());
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!runner.shared().is_running());

        let after_stop = backend.batches.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(200));
        assert_eq!(backend.batches.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_poisoned_state_stays_usable() {
        let (mut runner, backend) = runner_with(vec![0x41], 10);
        let shared = Arc::clone(runner.shared());

        let poisoner = Arc::clone(&shared);
        let result = thread::spawn(move || {
            let _guard = poisoner.state.lock().unwrap();
            panic!("poison the run state");
        })
        .join();
        assert!(result.is_err());
        assert!(shared.state.is_poisoned());

        shared.set_keys(vec![0x42, 0x43]);
        shared.set_delay(7);
        assert_eq!(shared.keys(), vec![0x42, 0x43]);
        assert_eq!(shared.snapshot().delay, 7);

        assert!(runner.start());
        wait_for_batches(&backend, 2);
        assert!(runner.stop());
        assert!(!shared.is_running());
    }

    struct PanickingBackend;

    impl InputBackend for PanickingBackend {
        fn send(&self, _batch: &[KeyEvent]) -> Result<usize> {
            panic!("backend failure");
        }
    }

    #[test]
    fn test_stop_after_worker_panic() {
        let shared = Arc::new(SharedState::with_keys(vec![0x41], 10));
        let mut runner = MacroRunner::new(
            Arc::clone(&shared),
            InputInjector::new(Arc::new(PanickingBackend)),
        );
        assert!(runner.start());

        let deadline = Instant::now() + Duration::from_secs(5);
        while !runner.worker.as_ref().is_some_and(JoinHandle::is_finished) {
            assert!(Instant::now() < deadline, "worker never panicked");
            thread::sleep(Duration::from_millis(5));
        }

        assert!(runner.stop());
        assert!(!runner.is_running());
        assert!(!shared.is_running());
        assert!(!runner.stop());
    }

    #[test]
    fn test_restart_after_stop() {
        let (mut runner, backend) = runner_with(Vec::new(), 10);
        runner.start();
        wait_for_batches(&backend, 2);
        runner.stop();

        assert!(runner.start());
        wait_for_batches(&backend, 4);
        runner.stop();
        assert_eq!(backend.batches.load(Ordering::SeqCst), 4);
    }
}
