//! The block generator core.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use rill_pipeline::{Block, BlockId};
use rill_ratelimit::{Clock, RateLimiter, SystemClock};
use rill_timer::RecurringTimer;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    error::ListenerError, queue::BlockQueue, BlockListener, GeneratorConfig, GeneratorError,
    GeneratorMetrics, GeneratorState, MetricsSnapshot,
};

/// How long the drain worker waits on the queue before re-checking state.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// State and current buffer, guarded by the generator's single mutex.
///
/// Every state transition and every buffer mutation happens inside a
/// critical section on this mutex, as does the dispatch of the listener's
/// `on_add_data` and `on_generate_block` callbacks.
struct Inner<T> {
    state: GeneratorState,
    buffer: Vec<T>,
}

/// Worker handles owned by a started generator.
struct Workers {
    timer: RecurringTimer,
    drain: JoinHandle<()>,
}

/// Batches a high-rate stream of items into time-bounded blocks.
///
/// Producers push items through the `add*` methods; a roll worker seals the
/// accumulating buffer into a [`Block`] every `block_interval_ms`; a drain
/// worker hands completed blocks to the listener one at a time. A bounded
/// queue between the two workers and admission-time rate limiting propagate
/// downstream slowness back to producers.
///
/// The generator is a cheap-to-clone handle; clones share one underlying
/// instance, so any number of producer tasks can hold one.
/// [`start`](Self::start) launches the workers, and [`stop`](Self::stop)
/// shuts the stages down in order (intake first, then generation, then
/// dispatch) so no admitted item is lost.
pub struct BlockGenerator<L: BlockListener> {
    core: Arc<Core<L>>,
}

impl<L: BlockListener> Clone for BlockGenerator<L> {
    fn clone(&self) -> Self {
        Self { core: Arc::clone(&self.core) }
    }
}

struct Core<L: BlockListener> {
    listener: Arc<L>,
    receiver_id: u64,
    config: GeneratorConfig,
    clock: Arc<dyn Clock>,
    limiter: RateLimiter,
    queue: BlockQueue<L::Item>,
    metrics: GeneratorMetrics,
    inner: Mutex<Inner<L::Item>>,
    // Acquired only while `inner` is held (start) or after it is released
    // (stop); never the other way around.
    workers: Mutex<Option<Workers>>,
}

impl<L: BlockListener> BlockGenerator<L> {
    /// Creates a generator reading time from the system clock.
    pub fn new(
        listener: Arc<L>,
        receiver_id: u64,
        config: GeneratorConfig,
    ) -> Result<Self, GeneratorError> {
        Self::with_clock(listener, receiver_id, config, Arc::new(SystemClock))
    }

    /// Creates a generator reading time from the supplied clock.
    pub fn with_clock(
        listener: Arc<L>,
        receiver_id: u64,
        config: GeneratorConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GeneratorError> {
        config.validate()?;
        let limiter = RateLimiter::new(config.max_rate_per_second, Arc::clone(&clock));
        let queue = BlockQueue::new(config.block_queue_capacity);
        Ok(Self {
            core: Arc::new(Core {
                listener,
                receiver_id,
                clock,
                limiter,
                queue,
                metrics: GeneratorMetrics::default(),
                inner: Mutex::new(Inner {
                    state: GeneratorState::Initialized,
                    buffer: Vec::new(),
                }),
                workers: Mutex::new(None),
                config,
            }),
        })
    }

    /// Launches the roll and drain workers and begins accepting items.
    ///
    /// Must be called on a tokio runtime and only from the `Initialized`
    /// state.
    pub fn start(&self) -> Result<(), GeneratorError> {
        let core = &self.core;
        let mut inner = core.inner.lock().unwrap();
        if inner.state != GeneratorState::Initialized {
            return Err(GeneratorError::WrongState { operation: "start", state: inner.state });
        }
        inner.state = GeneratorState::Active;

        let timer = RecurringTimer::start(
            Arc::clone(&core.clock),
            core.config.block_interval_ms,
            "block-roll",
            {
                let core = Arc::clone(core);
                move |tick_ms| {
                    let core = Arc::clone(&core);
                    async move { core.roll(tick_ms).await }
                }
            },
        );
        let drain = tokio::spawn(Core::run_drain(Arc::clone(core)));
        *core.workers.lock().unwrap() = Some(Workers { timer, drain });

        info!(
            receiver_id = core.receiver_id,
            interval_ms = core.config.block_interval_ms,
            queue_capacity = core.config.block_queue_capacity,
            "Started block generator"
        );
        Ok(())
    }

    /// Performs an orderly shutdown.
    ///
    /// Intake stops first, then block generation (the pending roll tick runs
    /// to completion and seals any remaining buffer), then block dispatch
    /// once the queue has drained. Calling `stop` on a generator that is not
    /// active logs a warning and returns.
    pub async fn stop(&self) {
        let core = &self.core;
        {
            let mut inner = core.inner.lock().unwrap();
            if inner.state != GeneratorState::Active {
                warn!(state = %inner.state, "Ignoring stop of a block generator that is not active");
                return;
            }
            inner.state = GeneratorState::StoppedAddingData;
        }
        info!("Stopping block generator");

        let Some(Workers { timer, drain }) = core.workers.lock().unwrap().take() else {
            return;
        };

        let last_tick_ms = timer.stop(false).await;
        debug!(last_tick_ms, "Roll timer stopped");

        core.inner.lock().unwrap().state = GeneratorState::StoppedGeneratingBlocks;

        info!("Waiting for the drain worker to finish");
        if let Err(e) = drain.await {
            error!(error = %e, "Drain worker terminated abnormally");
        }

        core.inner.lock().unwrap().state = GeneratorState::StoppedAll;
        info!("Stopped block generator");
    }

    /// Appends one item to the current buffer.
    pub async fn add(&self, item: L::Item) -> Result<(), GeneratorError> {
        self.core.ensure_active()?;
        self.core.limiter.wait_to_push().await;
        let mut inner = self.core.lock_active()?;
        inner.buffer.push(item);
        self.core.metrics.record_admitted(1);
        Ok(())
    }

    /// Appends one item, then invokes `on_add_data` under the state mutex.
    pub async fn add_with_callback(
        &self,
        item: L::Item,
        metadata: L::Metadata,
    ) -> Result<(), GeneratorError> {
        self.core.ensure_active()?;
        self.core.limiter.wait_to_push().await;
        let mut inner = self.core.lock_active()?;
        inner.buffer.push(item);
        self.core.metrics.record_admitted(1);
        let tail = inner.buffer.len() - 1;
        self.core
            .listener
            .on_add_data(&inner.buffer[tail..], &metadata)
            .map_err(GeneratorError::Listener)
    }

    /// Appends a group of items atomically, then invokes `on_add_data` once
    /// for the whole group.
    ///
    /// The group lands contiguously in a single block; no roll can observe
    /// part of it. Admission credit is consumed per item before the group is
    /// appended.
    pub async fn add_many_with_callback(
        &self,
        items: Vec<L::Item>,
        metadata: L::Metadata,
    ) -> Result<(), GeneratorError> {
        self.core.ensure_active()?;
        for _ in 0..items.len() {
            self.core.limiter.wait_to_push().await;
        }
        let mut inner = self.core.lock_active()?;
        let start = inner.buffer.len();
        let admitted = items.len() as u64;
        inner.buffer.extend(items);
        self.core.metrics.record_admitted(admitted);
        self.core
            .listener
            .on_add_data(&inner.buffer[start..], &metadata)
            .map_err(GeneratorError::Listener)
    }

    /// Snapshot query: true while the generator accepts items.
    ///
    /// May be stale the instant it returns.
    pub fn is_active(&self) -> bool {
        self.core.inner.lock().unwrap().state.is_active()
    }

    /// Snapshot query: true once shutdown has fully completed.
    pub fn is_stopped(&self) -> bool {
        self.core.inner.lock().unwrap().state.is_stopped()
    }

    /// Returns a point-in-time copy of the generator counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.core.metrics.snapshot()
    }

    /// Returns the generator configuration.
    pub fn config(&self) -> &GeneratorConfig {
        &self.core.config
    }
}

impl<L: BlockListener> Core<L> {
    /// Fails fast before rate limiting; admission is re-checked under the
    /// mutex afterwards.
    fn ensure_active(&self) -> Result<(), GeneratorError> {
        self.lock_active().map(drop)
    }

    /// Locks the state mutex and verifies the generator still admits items.
    ///
    /// The state may have advanced while the caller was blocked in the rate
    /// limiter; failing here without appending is the defined outcome when a
    /// stop races with an admission.
    fn lock_active(&self) -> Result<MutexGuard<'_, Inner<L::Item>>, GeneratorError> {
        let inner = self.inner.lock().unwrap();
        if !inner.state.is_active() {
            return Err(GeneratorError::WrongState { operation: "add data", state: inner.state });
        }
        Ok(inner)
    }

    /// Roll tick: seals the current buffer into a block and enqueues it.
    ///
    /// The block id is anchored to the start of the covered interval. An
    /// empty buffer produces nothing. Enqueueing happens outside the mutex
    /// and may wait on a full queue; that wait is the intended backpressure
    /// path, stalling only the roll worker.
    async fn roll(&self, tick_ms: u64) {
        let block = {
            let mut inner = self.inner.lock().unwrap();
            if inner.buffer.is_empty() {
                return;
            }
            let block_id = BlockId::new(
                self.receiver_id,
                tick_ms.saturating_sub(self.config.block_interval_ms),
            );
            if let Err(cause) = self.listener.on_generate_block(block_id) {
                // The buffer is left intact; the next tick retries with a
                // fresh block id.
                drop(inner);
                self.report_error("Error in the block generation callback", &cause);
                return;
            }
            let items = std::mem::take(&mut inner.buffer);
            Block::new(block_id, items)
        };

        self.metrics.record_block_generated();
        debug!(block_id = %block.id, items = block.len(), "Generated block");

        if let Err(e) = self.queue.push(block).await {
            let cause: ListenerError = Box::new(e);
            self.report_error("Failed to enqueue a generated block", &cause);
        }
    }

    /// Drain worker: hands completed blocks to the listener one at a time.
    ///
    /// Polls with a short timeout so the stop signal is observed promptly,
    /// then drains whatever the final roll left behind.
    async fn run_drain(self: Arc<Self>) {
        debug!("Drain worker started");
        while self.is_generating_blocks() {
            if let Some(block) = self.queue.poll(DRAIN_POLL_INTERVAL).await {
                self.push_block(block).await;
            }
        }
        info!(remaining = self.queue.len(), "Pushing out the last blocks");
        while let Some(block) = self.queue.try_take() {
            self.push_block(block).await;
        }
        debug!("Drain worker stopped");
    }

    fn is_generating_blocks(&self) -> bool {
        self.inner.lock().unwrap().state.is_generating_blocks()
    }

    /// Sole invocation site of `on_push_block`.
    async fn push_block(&self, block: Block<L::Item>) {
        let block_id = block.id;
        let items = block.len() as u64;
        match self.listener.on_push_block(block).await {
            Ok(()) => {
                self.metrics.record_block_pushed(items);
                debug!(%block_id, items, "Pushed block");
            }
            Err(cause) => self.report_error("Error in the block pushing callback", &cause),
        }
    }

    /// Logs a worker error and forwards it to the listener.
    ///
    /// Never called while the state mutex is held; `on_error` may run
    /// concurrently with the mutex-guarded callbacks.
    fn report_error(&self, message: &str, cause: &ListenerError) {
        self.metrics.record_error_reported();
        error!(error = %cause, "{}", message);
        self.listener.on_error(message, cause);
    }
}

impl<L: BlockListener> std::fmt::Debug for BlockGenerator<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockGenerator")
            .field("receiver_id", &self.core.receiver_id)
            .field("config", &self.core.config)
            .field("state", &self.core.inner.lock().unwrap().state)
            .field("queued_blocks", &self.core.queue.len())
            .finish()
    }
}
