//! Serialised dispatch of remote calls.
//!
//! [`RemoteCallQueue`] is the only path to the remote service. Calls are
//! dispatched in FIFO order with at most one in flight, and the queue makes
//! progress only when the host calls [`RemoteCallQueue::tick`]. There is no
//! background thread: the in-flight operation is polled once per tick, so a
//! slow call simply spans several ticks.
//!
//! Each enqueued call yields a [`CallHandle`] that resolves exactly once,
//! either with the call's result or with a `Cancelled` failure when the
//! queue is stopped.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::{Pin, pin};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::task::noop_waker_ref;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::ports::RemoteService;
use super::remote_call::{CallResult, RemoteCall, RemoteOperation};
use super::RemoteError;

/// Dispatch state of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Queued calls are dispatched on each tick.
    Running,
    /// No new dispatches; an in-flight call still runs to completion.
    Paused,
    /// Terminal. Every outstanding handle has been resolved as cancelled.
    Stopped,
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        })
    }
}

/// Sequence number assigned at enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(u64);

impl CallId {
    /// Raw sequence number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a single [`RemoteCallQueue::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to do, or paused with nothing in flight.
    Idle,
    /// A call is in flight and has not completed yet.
    InFlight(CallId),
    /// A call completed and its handle was resolved.
    Completed(CallId),
}

/// Awaitable result of an enqueued call.
///
/// Resolves exactly once. If the queue is dropped before the call completes
/// the handle resolves with a `Cancelled` failure.
#[derive(Debug)]
pub struct CallHandle {
    id: CallId,
    receiver: oneshot::Receiver<CallResult>,
}

impl CallHandle {
    /// Sequence number of the call.
    pub fn id(&self) -> CallId {
        self.id
    }
}

impl Future for CallHandle {
    type Output = CallResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(RemoteError::cancelled(
                    "remote call queue dropped before completion",
                ))
            })
        })
    }
}

/// Error returned by [`RemoteCallQueue::drive`] and
/// [`RemoteCallQueue::drive_paced`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueDriveError {
    /// The driven future did not complete within the tick budget.
    #[error("operation did not complete within {ticks} ticks")]
    TickBudgetExhausted {
        /// Budget that was exhausted.
        ticks: usize,
    },
}

struct QueuedCall {
    id: CallId,
    call: RemoteCall,
    reply: oneshot::Sender<CallResult>,
}

struct InFlightCall {
    id: CallId,
    operation: RemoteOperation,
    future: BoxFuture<'static, CallResult>,
    reply: oneshot::Sender<CallResult>,
}

struct QueueInner {
    state: QueueState,
    pending: VecDeque<QueuedCall>,
    in_flight: Option<InFlightCall>,
    next_id: u64,
}

/// FIFO dispatcher for remote calls.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use client::domain::{QueueState, RemoteCallQueue};
/// use client::outbound::memory::InMemoryRemoteService;
///
/// let queue = RemoteCallQueue::new(Arc::new(InMemoryRemoteService::new()));
/// assert_eq!(queue.state(), QueueState::Running);
/// assert!(queue.is_idle());
/// ```
pub struct RemoteCallQueue {
    service: Arc<dyn RemoteService>,
    inner: Mutex<QueueInner>,
}

impl RemoteCallQueue {
    /// Create a running queue in front of `service`.
    pub fn new(service: Arc<dyn RemoteService>) -> Self {
        Self {
            service,
            inner: Mutex::new(QueueInner {
                state: QueueState::Running,
                pending: VecDeque::new(),
                in_flight: None,
                next_id: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a call to the tail of the queue.
    ///
    /// Never blocks. On a stopped queue the handle is already resolved with a
    /// `Cancelled` failure.
    pub fn enqueue(&self, call: RemoteCall) -> CallHandle {
        let (reply, receiver) = oneshot::channel();
        let mut inner = self.lock();
        let id = CallId(inner.next_id);
        inner.next_id += 1;

        if inner.state == QueueState::Stopped {
            debug!(call_id = id.get(), operation = %call.operation(), "enqueue on stopped queue");
            // The receiver is alive, so the send cannot fail.
            let _ = reply.send(Err(stopped_error()));
        } else {
            debug!(
                call_id = id.get(),
                operation = %call.operation(),
                pending = inner.pending.len() + 1,
                "remote call enqueued"
            );
            inner.pending.push_back(QueuedCall { id, call, reply });
        }
        CallHandle { id, receiver }
    }

    /// Advance the queue by one step.
    ///
    /// Polls the in-flight call once. With no call in flight and the queue
    /// running, dispatches the head of the queue and polls it once. A call
    /// that completes clears the in-flight slot; the next dispatch happens
    /// on a later tick.
    pub fn tick(&self) -> TickOutcome {
        let mut inner = self.lock();

        if inner.in_flight.is_none() {
            if inner.state != QueueState::Running {
                return TickOutcome::Idle;
            }
            let Some(next) = inner.pending.pop_front() else {
                return TickOutcome::Idle;
            };
            let operation = next.call.operation();
            debug!(
                call_id = next.id.get(),
                %operation,
                category = next.call.category(),
                "dispatching remote call"
            );
            inner.in_flight = Some(InFlightCall {
                id: next.id,
                operation,
                future: next.call.dispatch(Arc::clone(&self.service)),
                reply: next.reply,
            });
        }

        let Some(mut current) = inner.in_flight.take() else {
            return TickOutcome::Idle;
        };
        let mut cx = Context::from_waker(noop_waker_ref());
        match current.future.as_mut().poll(&mut cx) {
            Poll::Pending => {
                let id = current.id;
                inner.in_flight = Some(current);
                TickOutcome::InFlight(id)
            }
            Poll::Ready(result) => {
                match &result {
                    Ok(_) => debug!(
                        call_id = current.id.get(),
                        operation = %current.operation,
                        "remote call completed"
                    ),
                    Err(err) => debug!(
                        call_id = current.id.get(),
                        operation = %current.operation,
                        kind = %err.kind(),
                        status = err.status_code(),
                        "remote call failed"
                    ),
                }
                if current.reply.send(result).is_err() {
                    debug!(call_id = current.id.get(), "call handle dropped before completion");
                }
                TickOutcome::Completed(current.id)
            }
        }
    }

    /// Stop dispatching new calls. Work already queued is kept.
    pub fn pause(&self) {
        self.transition(QueueState::Paused);
    }

    /// Resume dispatching after [`pause`](Self::pause).
    pub fn resume(&self) {
        self.transition(QueueState::Running);
    }

    fn transition(&self, next: QueueState) {
        let mut inner = self.lock();
        match inner.state {
            QueueState::Stopped => {
                warn!(requested = %next, "ignoring state change on stopped queue");
            }
            current if current == next => {}
            current => {
                info!(
                    from = %current,
                    to = %next,
                    pending = inner.pending.len(),
                    "queue state changed"
                );
                inner.state = next;
            }
        }
    }

    /// Stop the queue for good.
    ///
    /// Every queued call and the in-flight call, if any, resolve with a
    /// `Cancelled` failure.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if inner.state == QueueState::Stopped {
            return;
        }
        inner.state = QueueState::Stopped;
        let in_flight = inner.in_flight.take();
        let pending = std::mem::take(&mut inner.pending);
        drop(inner);

        let cancelled = pending.len() + usize::from(in_flight.is_some());
        info!(cancelled, "remote call queue stopped");
        if let Some(call) = in_flight {
            let _ = call.reply.send(Err(stopped_error()));
        }
        for call in pending {
            let _ = call.reply.send(Err(stopped_error()));
        }
    }

    /// Current dispatch state.
    pub fn state(&self) -> QueueState {
        self.lock().state
    }

    /// Number of calls waiting for dispatch.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Whether a call is currently in flight.
    pub fn has_in_flight(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    /// Whether there is neither queued nor in-flight work.
    pub fn is_idle(&self) -> bool {
        let inner = self.lock();
        inner.in_flight.is_none() && inner.pending.is_empty()
    }

    /// Run `future` to completion on the calling thread, ticking the queue
    /// between polls.
    ///
    /// The future is polled before every tick and once more after the last
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDriveError::TickBudgetExhausted`] when the future is
    /// still pending after `max_ticks` ticks.
    pub fn drive<F: Future>(
        &self,
        future: F,
        max_ticks: usize,
    ) -> Result<F::Output, QueueDriveError> {
        let mut future = pin!(future);
        let mut cx = Context::from_waker(noop_waker_ref());
        for _ in 0..max_ticks {
            if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
                return Ok(output);
            }
            self.tick();
        }
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(output) => Ok(output),
            Poll::Pending => Err(QueueDriveError::TickBudgetExhausted { ticks: max_ticks }),
        }
    }

    /// Like [`drive`](Self::drive), but waits `period` between ticks on the
    /// tokio timer so I/O-backed adapters can make progress.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDriveError::TickBudgetExhausted`] when the future is
    /// still pending after `max_ticks` ticks.
    pub async fn drive_paced<F: Future>(
        &self,
        future: F,
        period: Duration,
        max_ticks: usize,
    ) -> Result<F::Output, QueueDriveError> {
        let mut future = pin!(future);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        for _ in 0..max_ticks {
            if let Poll::Ready(output) = futures_util::poll!(future.as_mut()) {
                return Ok(output);
            }
            self.tick();
            interval.tick().await;
        }
        match futures_util::poll!(future.as_mut()) {
            Poll::Ready(output) => Ok(output),
            Poll::Pending => Err(QueueDriveError::TickBudgetExhausted { ticks: max_ticks }),
        }
    }
}

fn stopped_error() -> RemoteError {
    RemoteError::cancelled("remote call queue stopped")
}
