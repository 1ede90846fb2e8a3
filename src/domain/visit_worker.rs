//! In-process event bus for the visit pipeline.
//!
//! [`ChannelEventDispatcher`] pushes events into a bounded channel and
//! [`run_visit_worker`] consumes them, routing each one to its listener on a
//! separate task. Listeners may dispatch new events onto the same channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Semaphore, mpsc, watch};

use crate::domain::visit_event::{
    EventDispatcher, VisitEvent, VisitLocatedListener, VisitOccurredListener,
};

/// Dispatcher backed by a bounded tokio channel.
///
/// The channel capacity is a soft limit. When the channel is full, the send is
/// moved to its own task instead of blocking the caller, so under sustained
/// overload more events than `capacity` may be waiting. Those deferred sends
/// are counted, and the worker's drain waits for them to land.
#[derive(Debug, Clone)]
pub struct ChannelEventDispatcher {
    tx: mpsc::Sender<VisitEvent>,
    deferred: Arc<AtomicUsize>,
}

/// Receiving end of a [`ChannelEventDispatcher`], consumed by [`run_visit_worker`].
#[derive(Debug)]
pub struct VisitQueue {
    rx: mpsc::Receiver<VisitEvent>,
    deferred: Arc<AtomicUsize>,
}

impl VisitQueue {
    /// Sends deferred because the channel was full and not yet delivered.
    pub fn deferred(&self) -> usize {
        self.deferred.load(Ordering::Acquire)
    }

    /// Next queued event without waiting for new dispatches, except for
    /// deferred sends still in flight.
    async fn next_queued(&mut self) -> Option<VisitEvent> {
        loop {
            if let Ok(event) = self.rx.try_recv() {
                return Some(event);
            }
            // A deferred send decrements the counter only after it landed.
            if self.deferred() == 0 {
                return self.rx.try_recv().ok();
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

impl ChannelEventDispatcher {
    /// Creates the dispatcher and the queue for [`run_visit_worker`].
    pub fn channel(capacity: usize) -> (Self, VisitQueue) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let deferred = Arc::new(AtomicUsize::new(0));

        (
            Self {
                tx,
                deferred: deferred.clone(),
            },
            VisitQueue { rx, deferred },
        )
    }
}

#[async_trait]
impl EventDispatcher for ChannelEventDispatcher {
    async fn dispatch(&self, event: VisitEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                // Waiting here would stall handlers running inside the worker.
                tracing::debug!(
                    visit_id = event.visit_id(),
                    event = event.name(),
                    "Visit queue full, deferring dispatch"
                );
                let tx = self.tx.clone();
                let deferred = self.deferred.clone();
                deferred.fetch_add(1, Ordering::AcqRel);
                tokio::spawn(async move {
                    if let Err(e) = tx.send(event).await {
                        tracing::warn!(
                            visit_id = e.0.visit_id(),
                            event = e.0.name(),
                            "Visit worker stopped, event dropped"
                        );
                    }
                    deferred.fetch_sub(1, Ordering::AcqRel);
                });
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::warn!(
                    visit_id = event.visit_id(),
                    event = event.name(),
                    "Visit worker stopped, event dropped"
                );
            }
        }
    }
}

/// Listeners the worker routes events to.
#[derive(Clone)]
pub struct VisitListeners {
    pub occurred: Arc<dyn VisitOccurredListener>,
    pub located: Arc<dyn VisitLocatedListener>,
}

impl VisitListeners {
    pub fn new(
        occurred: Arc<dyn VisitOccurredListener>,
        located: Arc<dyn VisitLocatedListener>,
    ) -> Self {
        Self { occurred, located }
    }

    async fn route(&self, event: VisitEvent) {
        match event {
            VisitEvent::Occurred(event) => self.occurred.on_visit_occurred(event).await,
            VisitEvent::Located(event) => self.located.on_visit_located(event).await,
        }
    }
}

/// Consumes pipeline events until shutdown is signalled or the channel closes.
///
/// At most `concurrency` handlers run at a time. On shutdown, in-flight
/// handlers are awaited and events still queued, including deferred sends and
/// events emitted while draining, are handled one by one before returning.
pub async fn run_visit_worker(
    mut queue: VisitQueue,
    listeners: VisitListeners,
    concurrency: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    let concurrency = concurrency.max(1);
    let permits = Arc::new(Semaphore::new(concurrency));

    tracing::info!(concurrency, "Visit worker started");

    loop {
        let event = tokio::select! {
            event = queue.rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("Shutdown signal received, stopping visit worker");
                    break;
                }
                continue;
            }
        };

        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let listeners = listeners.clone();
        tokio::spawn(async move {
            let _permit = permit;
            listeners.route(event).await;
        });
    }

    // Every permit back means every spawned handler finished.
    let _ = permits.acquire_many(concurrency as u32).await;

    while let Some(event) = queue.next_queued().await {
        listeners.route(event).await;
    }

    tracing::info!("Visit worker stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::domain::visit_event::{
        MockVisitLocatedListener, MockVisitOccurredListener, VisitLocated, VisitOccurred,
    };

    #[tokio::test]
    async fn test_worker_routes_events_to_listeners() {
        let mut occurred = MockVisitOccurredListener::new();
        occurred
            .expect_on_visit_occurred()
            .withf(|event| event.visit_id == 1)
            .times(1)
            .returning(|_| ());
        let mut located = MockVisitLocatedListener::new();
        located
            .expect_on_visit_located()
            .withf(|event| event.visit_id == 2)
            .times(1)
            .returning(|_| ());

        let (dispatcher, rx) = ChannelEventDispatcher::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        dispatcher
            .dispatch(VisitOccurred::new(1, None).into())
            .await;
        dispatcher.dispatch(VisitLocated::new(2).into()).await;

        let worker = tokio::spawn(run_visit_worker(
            rx,
            VisitListeners::new(Arc::new(occurred), Arc::new(located)),
            2,
            shutdown_rx,
        ));

        drop(dispatcher);
        worker.await.unwrap();
        drop(shutdown_tx);
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown_signal() {
        let occurred = MockVisitOccurredListener::new();
        let located = MockVisitLocatedListener::new();
        let (dispatcher, rx) = ChannelEventDispatcher::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = tokio::spawn(run_visit_worker(
            rx,
            VisitListeners::new(Arc::new(occurred), Arc::new(located)),
            1,
            shutdown_rx,
        ));

        shutdown_tx.send(true).unwrap();
        worker.await.unwrap();

        // Nothing consumes the channel any more.
        drop(dispatcher);
    }

    #[tokio::test]
    async fn test_dispatch_on_full_queue_is_deferred() {
        let (dispatcher, mut queue) = ChannelEventDispatcher::channel(1);

        dispatcher.dispatch(VisitLocated::new(1).into()).await;
        dispatcher.dispatch(VisitLocated::new(2).into()).await;
        assert_eq!(queue.deferred(), 1);

        assert_eq!(queue.rx.recv().await.map(|e| e.visit_id()), Some(1));
        assert_eq!(queue.rx.recv().await.map(|e| e.visit_id()), Some(2));
    }

    #[tokio::test]
    async fn test_dispatch_after_worker_stopped_does_not_fail() {
        let (dispatcher, rx) = ChannelEventDispatcher::channel(4);
        drop(rx);

        dispatcher.dispatch(VisitLocated::new(1).into()).await;
    }

    /// Takes a while per visit, then reports it as located.
    struct SlowLocator {
        dispatcher: ChannelEventDispatcher,
    }

    #[async_trait]
    impl VisitOccurredListener for SlowLocator {
        async fn on_visit_occurred(&self, event: VisitOccurred) {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.dispatcher
                .dispatch(VisitLocated::new(event.visit_id).into())
                .await;
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        located: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl VisitLocatedListener for RecordingNotifier {
        async fn on_visit_located(&self, event: VisitLocated) {
            self.located.lock().unwrap().push(event.visit_id);
        }
    }

    impl RecordingNotifier {
        fn located(&self) -> Vec<i64> {
            let mut located = self.located.lock().unwrap().clone();
            located.sort_unstable();
            located
        }
    }

    #[tokio::test]
    async fn test_shutdown_drains_in_flight_and_queued_events() {
        let (dispatcher, queue) = ChannelEventDispatcher::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let notifier = Arc::new(RecordingNotifier::default());

        for visit_id in 1..=5 {
            dispatcher
                .dispatch(VisitOccurred::new(visit_id, None).into())
                .await;
        }

        let worker = tokio::spawn(run_visit_worker(
            queue,
            VisitListeners::new(
                Arc::new(SlowLocator {
                    dispatcher: dispatcher.clone(),
                }),
                notifier.clone(),
            ),
            1,
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(5)).await;
        shutdown_tx.send(true).unwrap();
        worker.await.unwrap();

        assert_eq!(notifier.located(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_deferred_sends() {
        let (dispatcher, queue) = ChannelEventDispatcher::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let notifier = Arc::new(RecordingNotifier::default());

        for visit_id in 1..=3 {
            dispatcher.dispatch(VisitLocated::new(visit_id).into()).await;
        }
        assert_eq!(queue.deferred(), 2);
        shutdown_tx.send(true).unwrap();

        run_visit_worker(
            queue,
            VisitListeners::new(
                Arc::new(MockVisitOccurredListener::new()),
                notifier.clone(),
            ),
            1,
            shutdown_rx,
        )
        .await;

        assert_eq!(notifier.located(), vec![1, 2, 3]);
    }
}
