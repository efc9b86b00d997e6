//! Per-subscription poll tasks.
//!
//! Each subscription owns a tokio task that ticks on its own timer and
//! publishes [`PollEvent`]s to the subscriber's channel. Logins are shared
//! through the [`SessionManager`], so two subscriptions of one widget still
//! log in once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;

use super::backoff::ExponentialBackoff;
use super::types::{PollEvent, SubscriptionHandle};
use crate::error::{DeckError, DeckResult, ErrorKind};
use crate::session::SessionManager;

/// Closed once the subscription is cancelled; deliveries happen under its lock.
type DeliveryGate = Arc<Mutex<bool>>;

struct Subscription {
    widget_id: String,
    gate: DeliveryGate,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

impl Subscription {
    fn cancel(self) {
        if let Ok(mut open) = self.gate.lock() {
            *open = false;
        }
        self.task.abort();
    }
}

type Subscriptions = Arc<Mutex<HashMap<SubscriptionHandle, Subscription>>>;

/// Runs every active subscription.
pub struct PollScheduler {
    sessions: Arc<SessionManager>,
    subscriptions: Subscriptions,
    change_listener: Mutex<Option<JoinHandle<()>>>,
}

impl PollScheduler {
    /// Create the scheduler and start listening for credential changes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        let subscriptions: Subscriptions = Arc::default();
        let listener = spawn_change_listener(
            sessions.clone(),
            subscriptions.clone(),
            sessions.store().subscribe_changes(),
        );
        Self {
            sessions,
            subscriptions,
            change_listener: Mutex::new(Some(listener)),
        }
    }

    /// Poll `widget_id` every `interval`, sending each result to `sink`.
    ///
    /// The first tick runs immediately.
    pub fn subscribe(
        &self,
        widget_id: &str,
        interval: Duration,
        sink: mpsc::UnboundedSender<PollEvent>,
    ) -> DeckResult<SubscriptionHandle> {
        if interval.is_zero() {
            return Err(DeckError::validation("poll interval must be positive"));
        }

        let mut subscriptions = self.lock_subscriptions()?;
        let handle = SubscriptionHandle::new();
        let gate: DeliveryGate = Arc::new(Mutex::new(true));
        let wake = Arc::new(Notify::new());
        let task = tokio::spawn(run_subscription(
            self.sessions.clone(),
            self.subscriptions.clone(),
            handle,
            widget_id.to_string(),
            interval,
            sink,
            gate.clone(),
            wake.clone(),
        ));

        let subscription = Subscription {
            widget_id: widget_id.to_string(),
            gate,
            wake,
            task,
        };
        subscriptions.insert(handle, subscription);
        tracing::info!(widget_id = %widget_id, subscription = %handle, ?interval, "Subscribed");
        Ok(handle)
    }

    /// Stop a subscription. No event for it is delivered after this returns.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let removed = self
            .subscriptions
            .lock()
            .ok()
            .and_then(|mut subscriptions| subscriptions.remove(&handle));
        match removed {
            Some(subscription) => {
                tracing::info!(widget_id = %subscription.widget_id, subscription = %handle, "Unsubscribed");
                subscription.cancel();
                true
            }
            None => false,
        }
    }

    /// Stop every subscription of a widget; returns how many there were.
    pub fn unsubscribe_widget(&self, widget_id: &str) -> usize {
        let handles: Vec<SubscriptionHandle> = self
            .subscriptions
            .lock()
            .map(|subscriptions| {
                subscriptions
                    .iter()
                    .filter(|(_, s)| s.widget_id == widget_id)
                    .map(|(handle, _)| *handle)
                    .collect()
            })
            .unwrap_or_default();
        handles
            .into_iter()
            .filter(|handle| self.unsubscribe(*handle))
            .count()
    }

    /// Tick every subscription of the widget now.
    pub fn refresh(&self, widget_id: &str) -> usize {
        let Ok(subscriptions) = self.subscriptions.lock() else {
            return 0;
        };
        let mut woken = 0;
        for subscription in subscriptions.values().filter(|s| s.widget_id == widget_id) {
            subscription.wake.notify_one();
            woken += 1;
        }
        tracing::debug!(widget_id = %widget_id, woken, "Refresh requested");
        woken
    }

    /// Number of live subscriptions.
    pub fn active(&self) -> usize {
        self.subscriptions.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Cancel every subscription and the change listener.
    pub fn shutdown(&self) {
        let drained: Vec<Subscription> = self
            .subscriptions
            .lock()
            .map(|mut subscriptions| subscriptions.drain().map(|(_, s)| s).collect())
            .unwrap_or_default();
        let count = drained.len();
        for subscription in drained {
            subscription.cancel();
        }
        let listener = self
            .change_listener
            .lock()
            .ok()
            .and_then(|mut listener| listener.take());
        if let Some(task) = listener {
            task.abort();
            tracing::info!(cancelled = count, "Poll scheduler stopped");
        }
    }

    fn lock_subscriptions(
        &self,
    ) -> DeckResult<std::sync::MutexGuard<'_, HashMap<SubscriptionHandle, Subscription>>> {
        self.subscriptions
            .lock()
            .map_err(|_| DeckError::new(ErrorKind::UnknownError, "subscription table poisoned"))
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("active", &self.active())
            .finish()
    }
}

/// Send `event` unless the subscription was cancelled. False stops the task.
fn deliver(gate: &DeliveryGate, sink: &mpsc::UnboundedSender<PollEvent>, event: PollEvent) -> bool {
    match gate.lock() {
        Ok(open) if *open => sink.send(event).is_ok(),
        _ => false,
    }
}

async fn run_subscription(
    sessions: Arc<SessionManager>,
    subscriptions: Subscriptions,
    handle: SubscriptionHandle,
    widget_id: String,
    interval: Duration,
    sink: mpsc::UnboundedSender<PollEvent>,
    gate: DeliveryGate,
    wake: Arc<Notify>,
) {
    let mut backoff = ExponentialBackoff::for_interval(interval);

    loop {
        let outcome = sessions.poll(&widget_id).await;
        let suspended = match &outcome {
            Ok(_) => {
                if backoff.failure_count() > 0 {
                    tracing::info!(widget_id = %widget_id, "Poll recovered");
                }
                backoff.reset();
                false
            }
            Err(err) if err.is_terminal() => {
                tracing::warn!(widget_id = %widget_id, kind = %err.kind(), "Polling suspended until configuration changes");
                true
            }
            Err(err) => {
                backoff.record_failure();
                tracing::debug!(
                    widget_id = %widget_id,
                    kind = %err.kind(),
                    failures = backoff.failure_count(),
                    next_in = ?backoff.current_delay(),
                    "Poll failed"
                );
                false
            }
        };

        let event = PollEvent {
            subscription: handle,
            widget_id: widget_id.clone(),
            outcome,
        };
        if !deliver(&gate, &sink, event) {
            break;
        }

        if suspended {
            wake.notified().await;
            backoff.reset();
            continue;
        }

        tokio::select! {
            _ = tokio::time::sleep(backoff.current_delay()) => {}
            _ = wake.notified() => {}
        }
    }

    // Already gone if unsubscribed; otherwise the receiver was dropped.
    if let Ok(mut subscriptions) = subscriptions.lock() {
        subscriptions.remove(&handle);
    }
    tracing::debug!(widget_id = %widget_id, subscription = %handle, "Poll task stopped");
}

/// Resume subscriptions whose widget changed, after clearing its failed session.
fn spawn_change_listener(
    sessions: Arc<SessionManager>,
    subscriptions: Subscriptions,
    mut changes: broadcast::Receiver<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let widget_id = match changes.recv().await {
                Ok(widget_id) => widget_id,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Missed widget change notifications");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            sessions.clear_failures(&widget_id).await;
            if let Ok(subscriptions) = subscriptions.lock() {
                for subscription in subscriptions.values().filter(|s| s.widget_id == widget_id) {
                    subscription.wake.notify_one();
                }
            }
        }
    })
}
