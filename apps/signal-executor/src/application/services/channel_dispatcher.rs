//! Channel Dispatcher Service
//!
//! Serializes signal handling per channel. Each channel gets its own tokio
//! task fed by a bounded queue, so signals on one channel are handled in
//! arrival order while different channels proceed concurrently. A hung venue
//! call stalls only the channel that issued it. A worker that sees no signal
//! for `idle_timeout_ms` removes itself; the next signal starts a fresh one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::application::ports::VenuePort;
use crate::application::use_cases::{SignalError, SignalHandler, SignalOutcome};
use crate::domain::shared::ChannelId;
use crate::domain::signal::TradeSignal;
use crate::domain::tracked_order::OrderStore;

/// Dispatcher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Signals buffered per channel before submissions are refused.
    pub queue_depth: usize,
    /// Idle time after which a channel worker is retired. `0` keeps workers
    /// for the life of the process.
    pub idle_timeout_ms: u64,
}

impl DispatcherConfig {
    fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_depth: 64,
            idle_timeout_ms: 300_000,
        }
    }
}

/// Dispatch errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The signal was handled and failed.
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// The channel's queue is full.
    #[error("Queue full for channel {channel_id}")]
    QueueFull {
        /// Channel.
        channel_id: ChannelId,
    },

    /// The channel worker went away before replying.
    #[error("Worker for channel {channel_id} stopped")]
    WorkerStopped {
        /// Channel.
        channel_id: ChannelId,
    },

    /// Handling panicked; the worker survived.
    #[error("Signal handling aborted: {message}")]
    Aborted {
        /// Panic or cancellation detail.
        message: String,
    },

    /// Dispatcher is shutting down.
    #[error("Dispatcher is shut down")]
    ShutDown,
}

impl DispatchError {
    /// Short label for metrics and HTTP mapping.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Signal(err) => err.label(),
            Self::QueueFull { .. } => "queue_full",
            Self::WorkerStopped { .. } => "worker_stopped",
            Self::Aborted { .. } => "aborted",
            Self::ShutDown => "shut_down",
        }
    }
}

type Reply = Result<SignalOutcome, DispatchError>;

struct Job {
    signal: TradeSignal,
    reply: oneshot::Sender<Reply>,
}

struct ChannelWorker {
    sender: mpsc::Sender<Job>,
    handle: JoinHandle<()>,
    generation: u64,
}

/// `None` once the dispatcher is shut down.
type WorkerMap = Mutex<Option<HashMap<ChannelId, ChannelWorker>>>;

/// A queued signal awaiting its outcome.
#[derive(Debug)]
pub struct PendingSignal {
    channel_id: ChannelId,
    receiver: oneshot::Receiver<Reply>,
}

impl PendingSignal {
    /// Wait for the signal to be handled.
    pub async fn outcome(self) -> Result<SignalOutcome, DispatchError> {
        self.receiver
            .await
            .unwrap_or(Err(DispatchError::WorkerStopped {
                channel_id: self.channel_id,
            }))
    }
}

/// Routes signals to one sequential worker per channel.
pub struct ChannelDispatcher<V, S>
where
    V: VenuePort + 'static,
    S: OrderStore + 'static,
{
    handler: Arc<SignalHandler<V, S>>,
    config: DispatcherConfig,
    workers: Arc<WorkerMap>,
    next_generation: AtomicU64,
}

impl<V, S> ChannelDispatcher<V, S>
where
    V: VenuePort + 'static,
    S: OrderStore + 'static,
{
    /// Create a dispatcher over a signal handler.
    pub fn new(handler: Arc<SignalHandler<V, S>>, config: DispatcherConfig) -> Self {
        Self {
            handler,
            config,
            workers: Arc::new(Mutex::new(Some(HashMap::new()))),
            next_generation: AtomicU64::new(0),
        }
    }

    /// The handler signals are dispatched to.
    pub fn handler(&self) -> &Arc<SignalHandler<V, S>> {
        &self.handler
    }

    /// Number of channels with a running worker.
    pub fn channel_count(&self) -> usize {
        self.workers
            .lock()
            .ok()
            .and_then(|workers| workers.as_ref().map(HashMap::len))
            .unwrap_or(0)
    }

    /// Queue a signal on its channel without waiting for the outcome.
    ///
    /// Queueing is synchronous, so two calls on the same channel are handled
    /// in call order.
    pub fn enqueue(&self, signal: TradeSignal) -> Result<PendingSignal, DispatchError> {
        let channel_id = signal.channel_id.clone();
        let (reply, receiver) = oneshot::channel();
        let mut job = Job { signal, reply };

        let mut guard = self.workers.lock().map_err(|_| DispatchError::ShutDown)?;
        let workers = guard.as_mut().ok_or(DispatchError::ShutDown)?;

        // A worker whose task ended is replaced once.
        for _ in 0..2 {
            let worker = workers
                .entry(channel_id.clone())
                .or_insert_with(|| self.spawn_worker(&channel_id));

            match worker.sender.try_send(job) {
                Ok(()) => {
                    return Ok(PendingSignal {
                        channel_id,
                        receiver,
                    });
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        channel_id = %channel_id,
                        queue_depth = self.config.queue_depth,
                        "Channel queue full, refusing signal"
                    );
                    return Err(DispatchError::QueueFull { channel_id });
                }
                Err(mpsc::error::TrySendError::Closed(returned)) => {
                    tracing::warn!(channel_id = %channel_id, "Channel worker gone, respawning");
                    workers.remove(&channel_id);
                    job = returned;
                }
            }
        }

        Err(DispatchError::WorkerStopped { channel_id })
    }

    /// Queue a signal and wait for its outcome.
    pub async fn submit(&self, signal: TradeSignal) -> Result<SignalOutcome, DispatchError> {
        self.enqueue(signal)?.outcome().await
    }

    /// Stop accepting signals and wait for queued ones to drain.
    pub async fn shutdown(&self) {
        let workers = match self.workers.lock() {
            Ok(mut guard) => guard.take().unwrap_or_default(),
            Err(_) => return,
        };

        tracing::info!(channels = workers.len(), "Draining channel workers");
        for (channel_id, worker) in workers {
            drop(worker.sender);
            if let Err(e) = worker.handle.await {
                tracing::error!(channel_id = %channel_id, error = %e, "Channel worker ended abnormally");
            }
        }
    }

    fn spawn_worker(&self, channel_id: &ChannelId) -> ChannelWorker {
        let (sender, mut receiver) = mpsc::channel::<Job>(self.config.queue_depth.max(1));
        let handler = Arc::clone(&self.handler);
        let workers = Arc::downgrade(&self.workers);
        let idle_timeout = self.config.idle_timeout();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let channel = channel_id.clone();

        tracing::debug!(channel_id = %channel, generation, "Starting channel worker");

        let handle = tokio::spawn(async move {
            loop {
                let next = match idle_timeout {
                    Some(idle) => match tokio::time::timeout(idle, receiver.recv()).await {
                        Ok(next) => next,
                        Err(_) => {
                            if retire_if_idle(&workers, &channel, generation, &receiver) {
                                tracing::debug!(channel_id = %channel, "Channel worker idle, retiring");
                                break;
                            }
                            continue;
                        }
                    },
                    None => receiver.recv().await,
                };
                let Some(Job { signal, reply }) = next else {
                    break;
                };
                let signal_id = signal.order_id.clone();
                let handler = Arc::clone(&handler);

                // Run each signal in its own task so a panic is contained to
                // that signal and the channel keeps draining.
                let task = tokio::spawn(async move { handler.handle(&signal).await });
                let result = match task.await {
                    Ok(outcome) => outcome.map_err(DispatchError::from),
                    Err(e) => {
                        tracing::error!(
                            channel_id = %channel,
                            signal_id = %signal_id,
                            error = %e,
                            "Signal handling aborted"
                        );
                        Err(DispatchError::Aborted {
                            message: e.to_string(),
                        })
                    }
                };

                if reply.send(result).is_err() {
                    tracing::debug!(
                        channel_id = %channel,
                        signal_id = %signal_id,
                        "Submitter stopped waiting for outcome"
                    );
                }
            }
            tracing::debug!(channel_id = %channel, "Channel worker stopped");
        });

        ChannelWorker {
            sender,
            handle,
            generation,
        }
    }
}

/// Drop an idle worker's map entry. Enqueueing happens under the same lock,
/// so an empty queue seen here stays empty until the entry is gone.
fn retire_if_idle(
    workers: &Weak<WorkerMap>,
    channel_id: &ChannelId,
    generation: u64,
    receiver: &mpsc::Receiver<Job>,
) -> bool {
    // Once the dispatcher is dropped its senders are gone and `recv` ends the loop.
    let Some(workers) = workers.upgrade() else {
        return false;
    };
    let Ok(mut guard) = workers.lock() else {
        return false;
    };
    // After shutdown the worker drains until its sender is dropped.
    let Some(map) = guard.as_mut() else {
        return false;
    };
    if !receiver.is_empty() {
        return false;
    }
    if map
        .get(channel_id)
        .is_some_and(|worker| worker.generation == generation)
    {
        map.remove(channel_id);
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{ExitModel, InMemoryAuditLog};
    use crate::application::use_cases::{ExecutionPath, LookupCondition};
    use crate::domain::instrument::ContractTable;
    use crate::domain::order_template::OrderTemplates;
    use crate::domain::signal::{ContractType, SignalAction, SignalType};
    use crate::domain::tracked_order::{OrderKey, OrderRole, TrackedStatus};
    use crate::infrastructure::broker::PaperVenue;
    use crate::infrastructure::persistence::InMemoryOrderStore;
    use rust_decimal_macros::dec;

    fn dispatcher(queue_depth: usize) -> ChannelDispatcher<PaperVenue, InMemoryOrderStore> {
        let handler = SignalHandler::new(
            Arc::new(PaperVenue::new(ExitModel::Attached)),
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(ContractTable::default()),
            OrderTemplates::new(dec!(0.01)).unwrap(),
            Arc::new(InMemoryAuditLog::new()),
        );
        ChannelDispatcher::new(
            Arc::new(handler),
            DispatcherConfig {
                queue_depth,
                ..DispatcherConfig::default()
            },
        )
    }

    fn signal(channel: &str, order_id: &str, kind: SignalType) -> TradeSignal {
        TradeSignal {
            order_id: order_id.into(),
            channel_id: channel.into(),
            ticker: "EUR.USD".to_string(),
            action: SignalAction::Buy,
            contract_type: ContractType::Market,
            price: None,
            stop_loss: Some(dec!(1.05)),
            take_profit: None,
            kind,
        }
    }

    #[tokio::test]
    async fn same_channel_signals_run_in_arrival_order() {
        let dispatcher = dispatcher(8);

        let open = dispatcher
            .enqueue(signal("chan", "17", SignalType::Open))
            .unwrap();
        let modify = dispatcher
            .enqueue(signal("chan", "17", SignalType::Modification))
            .unwrap();
        let close = dispatcher
            .enqueue(signal("chan", "17", SignalType::Close))
            .unwrap();

        assert_eq!(open.outcome().await.unwrap().path, ExecutionPath::Placed);
        assert!(modify.outcome().await.is_ok());
        let closed = close.outcome().await.unwrap();

        assert_eq!(
            closed.record.map(|r| r.status),
            Some(TrackedStatus::Retired)
        );
    }

    #[tokio::test]
    async fn channels_get_independent_workers() {
        let dispatcher = dispatcher(8);

        dispatcher
            .submit(signal("a", "1", SignalType::Open))
            .await
            .unwrap();
        dispatcher
            .submit(signal("b", "1", SignalType::Open))
            .await
            .unwrap();

        assert_eq!(dispatcher.channel_count(), 2);
        let store = dispatcher.handler().store();
        assert!(
            store
                .get(&OrderKey::new("a".into(), "1".into(), OrderRole::Main))
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            store
                .get(&OrderKey::new("b".into(), "1".into(), OrderRole::Main))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn signal_errors_come_back_to_the_submitter() {
        let dispatcher = dispatcher(8);

        let err = dispatcher
            .submit(signal("chan", "404", SignalType::Close))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DispatchError::Signal(SignalError::LookupMiss {
                condition: LookupCondition::CloseWithoutOpen
            })
        );
        assert_eq!(err.label(), "lookup_miss");

        // The worker is still serving the channel.
        assert!(
            dispatcher
                .submit(signal("chan", "18", SignalType::Open))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn idle_workers_are_retired_and_respawned() {
        let handler = Arc::clone(dispatcher(8).handler());
        let dispatcher = ChannelDispatcher::new(
            handler,
            DispatcherConfig {
                queue_depth: 8,
                idle_timeout_ms: 50,
            },
        );

        dispatcher
            .submit(signal("chan", "1", SignalType::Open))
            .await
            .unwrap();
        assert_eq!(dispatcher.channel_count(), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(dispatcher.channel_count(), 0);

        // The chain survives the worker: a fresh one picks up the CLOSE.
        let closed = dispatcher
            .submit(signal("chan", "1", SignalType::Close))
            .await
            .unwrap();
        assert_eq!(
            closed.record.map(|r| r.status),
            Some(TrackedStatus::Retired)
        );
        assert_eq!(dispatcher.channel_count(), 1);
    }

    #[tokio::test]
    async fn zero_idle_timeout_keeps_workers() {
        let handler = Arc::clone(dispatcher(8).handler());
        let dispatcher = ChannelDispatcher::new(
            handler,
            DispatcherConfig {
                queue_depth: 8,
                idle_timeout_ms: 0,
            },
        );

        dispatcher
            .submit(signal("chan", "1", SignalType::Open))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(dispatcher.channel_count(), 1);
    }

    #[tokio::test]
    async fn shutdown_refuses_new_signals() {
        let dispatcher = dispatcher(8);
        dispatcher
            .submit(signal("chan", "1", SignalType::Open))
            .await
            .unwrap();

        dispatcher.shutdown().await;

        assert_eq!(
            dispatcher
                .enqueue(signal("chan", "2", SignalType::Open))
                .unwrap_err(),
            DispatchError::ShutDown
        );
        assert_eq!(dispatcher.channel_count(), 0);
    }
}
