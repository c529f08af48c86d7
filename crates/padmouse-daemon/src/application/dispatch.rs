//! Deferred dispatch queue: decouples event reception from event emission.
//!
//! The reception path (the OS delivering raw gamepad events) must never block
//! or fail.  It only captures an [`Envelope`] and hands it to
//! [`Submitter::submit`], which is a non-blocking `try_send` on a bounded
//! channel.
//!
//! A dedicated worker thread owns the virtual pointer.  It pops envelopes one
//! at a time in submission order, runs the mapping engine, and applies the
//! resulting actions, including the closing synchronize, before it looks at
//! the next envelope.  One physical event therefore always becomes one
//! complete input frame, never interleaved with the next.
//!
//! # Capacity policy
//!
//! The channel is bounded.  When it is full the *newest* envelope is dropped,
//! counted in [`QueueStats`], and `submit` returns [`SubmitError::QueueFull`].
//! Losing one stick sample is preferable to stalling the reception path.
//!
//! # Drain
//!
//! [`DispatchQueue::drain`] stops accepting envelopes, waits for submits that
//! are already past the accepting check, enqueues a drain marker behind
//! everything submitted, and joins the worker.  An envelope for which
//! `submit` returned `Ok` is therefore always processed.  The worker
//! hands the virtual pointer back so the caller can destroy it only once no
//! in-flight work can touch it.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use padmouse_core::{translate, Envelope, PointerCapabilities};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::application::emit_pointer::{apply_actions, VirtualPointer};

/// Default number of envelopes the queue buffers before dropping.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Error returned by [`Submitter::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The queue is at capacity; the envelope was dropped.
    #[error("dispatch queue is full; envelope dropped")]
    QueueFull,
    /// The queue is draining or gone; the envelope was dropped.
    #[error("dispatch queue is closed")]
    Closed,
}

/// Error type for queue lifecycle operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The worker thread could not be started.
    #[error("failed to spawn dispatch worker: {0}")]
    SpawnFailed(#[source] std::io::Error),
    /// The worker thread panicked; the virtual pointer was lost with it.
    #[error("dispatch worker panicked")]
    WorkerPanicked,
}

/// Settings for a [`DispatchQueue`].
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum queued envelopes.  Values below 1 are treated as 1.
    pub capacity: usize,
    /// Log every applied pointer action at `debug` level.
    pub verbose_actions: bool,
    /// Name given to the worker thread.
    pub thread_name: String,
    /// What the pointer was created with.  Envelopes that map to anything
    /// outside this set are not applied.
    pub capabilities: PointerCapabilities,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            verbose_actions: false,
            thread_name: "padmouse-dispatch".to_string(),
            capabilities: PointerCapabilities::standard(),
        }
    }
}

/// Live counters shared between submitters and the worker.
#[derive(Debug, Default)]
pub struct QueueStats {
    submitted: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
    emit_failures: AtomicU64,
}

impl QueueStats {
    /// Takes a consistent-enough copy of the counters for reporting.
    pub fn snapshot(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            emit_failures: self.emit_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`QueueStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStatsSnapshot {
    /// Envelopes accepted into the queue.
    pub submitted: u64,
    /// Envelopes the worker finished (mapped and applied).
    pub processed: u64,
    /// Envelopes rejected because the queue was full.
    pub dropped: u64,
    /// Envelopes whose actions the virtual pointer refused or does not
    /// support.
    pub emit_failures: u64,
}

impl fmt::Display for QueueStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "submitted={} processed={} dropped={} emit_failures={}",
            self.submitted, self.processed, self.dropped, self.emit_failures
        )
    }
}

enum Command {
    Process(Envelope),
    Drain,
}

/// Cheap, cloneable producer handle for the reception path.
#[derive(Clone)]
pub struct Submitter {
    sender: SyncSender<Command>,
    accepting: Arc<AtomicBool>,
    /// Submits between the accepting check and the end of their send.
    in_flight: Arc<AtomicUsize>,
    stats: Arc<QueueStats>,
}

impl fmt::Debug for Submitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submitter")
            .field("accepting", &self.accepting.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Submitter {
    /// Hands `envelope` to the worker.  Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::QueueFull`] when the envelope was dropped for
    /// capacity and [`SubmitError::Closed`] once the queue has started
    /// draining.
    pub fn submit(&self, envelope: Envelope) -> Result<(), SubmitError> {
        // SeqCst pairs with `stop_worker`: either this load sees the flag
        // cleared, or the drain sees this submit in flight and waits for it.
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let result = self.send(envelope);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn send(&self, envelope: Envelope) -> Result<(), SubmitError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(SubmitError::Closed);
        }
        match self.sender.try_send(Command::Process(envelope)) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(SubmitError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(SubmitError::Closed),
        }
    }
}

/// The deferred dispatch queue: one bounded FIFO, one worker thread.
pub struct DispatchQueue {
    submitter: Submitter,
    worker: Option<JoinHandle<Box<dyn VirtualPointer>>>,
}

impl DispatchQueue {
    /// Starts the worker thread, which takes ownership of `pointer`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::SpawnFailed`] if the OS refuses the thread.
    /// The pointer is dropped in that case.
    pub fn spawn(
        pointer: Box<dyn VirtualPointer>,
        config: DispatchConfig,
    ) -> Result<Self, DispatchError> {
        let (sender, receiver) = mpsc::sync_channel(config.capacity.max(1));
        let stats = Arc::new(QueueStats::default());
        let worker_stats = Arc::clone(&stats);
        let verbose = config.verbose_actions;
        let capabilities = config.capabilities.clone();

        let worker = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run_worker(receiver, pointer, capabilities, worker_stats, verbose))
            .map_err(DispatchError::SpawnFailed)?;

        debug!(
            "dispatch worker '{}' started with capacity {}",
            config.thread_name, config.capacity
        );

        Ok(Self {
            submitter: Submitter {
                sender,
                accepting: Arc::new(AtomicBool::new(true)),
                in_flight: Arc::new(AtomicUsize::new(0)),
                stats,
            },
            worker: Some(worker),
        })
    }

    /// Returns a producer handle that can be moved to a reception context.
    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    /// Shorthand for `self.submitter().submit(envelope)` without the clone.
    ///
    /// # Errors
    ///
    /// See [`Submitter::submit`].
    pub fn submit(&self, envelope: Envelope) -> Result<(), SubmitError> {
        self.submitter.submit(envelope)
    }

    /// Current counters.
    pub fn stats(&self) -> QueueStatsSnapshot {
        self.submitter.stats.snapshot()
    }

    /// Processes everything already submitted, stops the worker, and returns
    /// the virtual pointer together with the final counters.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::WorkerPanicked`] if the worker died.
    pub fn drain(mut self) -> Result<(Box<dyn VirtualPointer>, QueueStatsSnapshot), DispatchError> {
        let pointer = self.stop_worker()?;
        let stats = self.stats();
        info!("dispatch queue drained: {stats}");
        Ok((pointer, stats))
    }

    fn stop_worker(&mut self) -> Result<Box<dyn VirtualPointer>, DispatchError> {
        self.submitter.accepting.store(false, Ordering::SeqCst);
        while self.submitter.in_flight.load(Ordering::SeqCst) > 0 {
            thread::yield_now();
        }
        let worker = self.worker.take().ok_or(DispatchError::WorkerPanicked)?;
        // Blocking send: waits for a free slot behind the pending envelopes.
        // Fails only if the worker is already gone, which join reports below.
        let _ = self.submitter.sender.send(Command::Drain);
        worker.join().map_err(|_| DispatchError::WorkerPanicked)
    }
}

impl Drop for DispatchQueue {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.stop_worker() {
                warn!("dispatch queue dropped without drain: {e}");
            }
        }
    }
}

fn run_worker(
    receiver: Receiver<Command>,
    mut pointer: Box<dyn VirtualPointer>,
    capabilities: PointerCapabilities,
    stats: Arc<QueueStats>,
    verbose: bool,
) -> Box<dyn VirtualPointer> {
    while let Ok(command) = receiver.recv() {
        match command {
            Command::Process(envelope) => {
                process(pointer.as_mut(), &capabilities, &envelope, &stats, verbose)
            }
            Command::Drain => break,
        }
    }
    pointer
}

fn process(
    pointer: &mut dyn VirtualPointer,
    capabilities: &PointerCapabilities,
    envelope: &Envelope,
    stats: &QueueStats,
    verbose: bool,
) {
    let actions = translate(envelope);
    if actions.is_empty() {
        trace!("no mapping for {envelope:?}");
    } else if let Some(action) = actions.iter().find(|a| !capabilities.supports(a)) {
        stats.emit_failures.fetch_add(1, Ordering::Relaxed);
        warn!("{action:?} is outside the pointer's capabilities; {envelope:?} not applied");
    } else if let Err(e) = apply_actions(pointer, &actions, verbose) {
        stats.emit_failures.fetch_add(1, Ordering::Relaxed);
        warn!("failed to apply actions for {envelope:?}: {e}");
    }
    stats.processed.fetch_add(1, Ordering::Relaxed);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
