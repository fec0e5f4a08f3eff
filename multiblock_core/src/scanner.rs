//! Background polling of capability proxies.
//!
//! One named thread per world walks every loaded controller's proxies on a
//! fixed interval so that changes made by neighbouring blocks, which the
//! structure never reports itself, are picked up.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::active::ControllerSet;
use crate::capability::PeriodToken;
use crate::config::RegistryConfig;

/// Lifecycle of the scan loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    /// No thread is running.
    Idle,
    /// The loop is ticking.
    Scanning,
    /// Stop was requested; the thread exits after its current tick or sleep.
    Stopping,
}

/// Outcome of one completed pass over the loaded controllers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub period: PeriodToken,
    pub controllers: usize,
    pub refreshed: usize,
    pub failures: usize,
}

struct Shared {
    state: Mutex<ScannerState>,
    wake: Condvar,
    period: AtomicU64,
    subscribers: Mutex<Vec<Sender<TickReport>>>,
}

impl Shared {
    fn publish(&self, report: &TickReport) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sender| sender.send(report.clone()).is_ok());
    }
}

pub struct Scanner {
    shared: Arc<Shared>,
    controllers: ControllerSet,
    interval: Duration,
    thread_name: String,
    handle: Option<JoinHandle<()>>,
}

impl Scanner {
    /// Creates an idle scanner over `controllers`, seeding the period token
    /// at random so tokens from a previous world load are not reused.
    pub fn new(controllers: ControllerSet, config: &RegistryConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ScannerState::Idle),
                wake: Condvar::new(),
                period: AtomicU64::new(rand::random()),
                subscribers: Mutex::new(Vec::new()),
            }),
            controllers,
            interval: config.scan_interval(),
            thread_name: config.scanner_thread_name.clone(),
            handle: None,
        }
    }

    pub fn state(&self) -> ScannerState {
        *self.shared.state.lock()
    }

    pub fn is_scanning(&self) -> bool {
        self.state() == ScannerState::Scanning
    }

    /// Token the next tick will be stamped with.
    pub fn period(&self) -> PeriodToken {
        PeriodToken(self.shared.period.load(Ordering::Acquire))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Receives a [`TickReport`] after every completed tick.
    pub fn subscribe(&self) -> Receiver<TickReport> {
        let (sender, receiver) = unbounded();
        self.shared.subscribers.lock().push(sender);
        receiver
    }

    /// Starts the loop. A running loop is left alone and a stopping loop is
    /// told to carry on, so at most one thread ever scans.
    pub fn start(&mut self) {
        {
            let mut state = self.shared.state.lock();
            match *state {
                ScannerState::Scanning => return,
                ScannerState::Stopping => {
                    *state = ScannerState::Scanning;
                    debug!(target: "multiblocked::scanner", "scanner.revived");
                    return;
                }
                ScannerState::Idle => *state = ScannerState::Scanning,
            }
        }

        // An Idle state means any previous thread has already left its loop.
        self.reap();

        let shared = Arc::clone(&self.shared);
        let controllers = self.controllers.clone();
        let interval = self.interval;
        let spawned = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || run(shared, controllers, interval));

        match spawned {
            Ok(handle) => {
                info!(
                    target: "multiblocked::scanner",
                    interval_ms = interval.as_millis() as u64,
                    "scanner.started"
                );
                self.handle = Some(handle);
            }
            Err(err) => {
                *self.shared.state.lock() = ScannerState::Idle;
                error!(
                    target: "multiblocked::scanner",
                    error = %err,
                    "scanner.spawn_failed"
                );
            }
        }
    }

    /// Asks the loop to exit without waiting for it.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        if *state == ScannerState::Scanning {
            *state = ScannerState::Stopping;
            self.shared.wake.notify_all();
            debug!(target: "multiblocked::scanner", "scanner.stop_requested");
        }
    }

    /// Stops the loop and joins its thread.
    pub fn shutdown(&mut self) {
        self.stop();
        self.reap();
    }

    /// Blocks until the loop has exited or `timeout` elapses.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while *state != ScannerState::Idle {
            if self.shared.wake.wait_until(&mut state, deadline).timed_out() {
                return *state == ScannerState::Idle;
            }
        }
        true
    }

    /// Runs one pass on the calling thread.
    pub fn scan_now(&self) -> TickReport {
        let report = scan_once(&self.shared, &self.controllers);
        self.shared.publish(&report);
        report
    }

    fn reap(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(target: "multiblocked::scanner", "scanner.thread_panicked");
            }
        }
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(shared: Arc<Shared>, controllers: ControllerSet, interval: Duration) {
    loop {
        let report = scan_once(&shared, &controllers);
        shared.publish(&report);

        let deadline = Instant::now() + interval;
        let mut state = shared.state.lock();
        while *state == ScannerState::Scanning {
            if shared.wake.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        if *state != ScannerState::Scanning {
            *state = ScannerState::Idle;
            shared.wake.notify_all();
            break;
        }
    }
    debug!(target: "multiblocked::scanner", "scanner.exited");
}

fn scan_once(shared: &Shared, controllers: &ControllerSet) -> TickReport {
    let period = PeriodToken(shared.period.load(Ordering::Acquire));
    let snapshot = controllers.snapshot();
    let mut refreshed = 0;
    let mut failures = 0;

    for controller in &snapshot {
        let walked = panic::catch_unwind(AssertUnwindSafe(|| {
            if controller.has_proxies() {
                controller.proxies()
            } else {
                Vec::new()
            }
        }));
        let proxies = match walked {
            Ok(proxies) => proxies,
            Err(payload) => {
                failures += 1;
                error!(
                    target: "multiblocked::scanner",
                    panic = panic_message(payload.as_ref()),
                    "scanner.controller_panicked"
                );
                continue;
            }
        };

        for proxy in proxies {
            match panic::catch_unwind(AssertUnwindSafe(|| proxy.refresh(period))) {
                Ok(Ok(())) => refreshed += 1,
                Ok(Err(err)) => {
                    failures += 1;
                    error!(
                        target: "multiblocked::scanner",
                        %period,
                        error = %err,
                        "scanner.proxy_failed"
                    );
                }
                Err(payload) => {
                    failures += 1;
                    error!(
                        target: "multiblocked::scanner",
                        %period,
                        panic = panic_message(payload.as_ref()),
                        "scanner.proxy_panicked"
                    );
                }
            }
        }
    }

    shared.period.fetch_add(1, Ordering::AcqRel);
    TickReport {
        period,
        controllers: snapshot.len(),
        refreshed,
        failures,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
