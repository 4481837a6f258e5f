//! Single-flight dispatch of admitted requests.
//!
//! [`Scheduler`] is the cloneable admission side. [`Dispatcher`] owns the one
//! loop that pops the most urgent entry, runs the handler outside every lock,
//! delivers the response, and moves on. Only one `Dispatcher` exists per
//! scheduler, so at most one request is ever in service.
//!
//! ```text
//! admit ──▶ [ PendingSet (mutex) ] ──wake──▶ Dispatcher::run
//!                                                 │ pop head
//!                                                 ▼
//!                                      Handler::handle (no lock held)
//!                                                 │ Ok / Err / panic / timeout
//!                                                 ▼
//!                                      response sink, then next entry
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::{extract::Request, response::Response};
use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::{broadcast, oneshot, Notify};
use tokio::time;

use super::handler::{Handler, HandlerError};
use super::priority::Priority;
use super::queue::{PendingSet, QueueEntry};
use crate::config::SchedulerConfig;
use crate::http::request::request_id;
use crate::http::response;
use crate::observability::metrics;

/// An admitted request and the sink its response goes to.
struct Job {
    request: Request,
    respond_to: oneshot::Sender<Response>,
    admitted_at: Instant,
}

struct Queue {
    pending: PendingSet<Job>,
    closed: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    wake: Notify,
    busy: AtomicBool,
    dispatched: AtomicU64,
    failed: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        // Nothing panics while the lock is held; recover the guard regardless.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub pending: usize,
    pub busy: bool,
    pub dispatched: u64,
    pub failed: u64,
}

/// Admission handle. Cheap to clone; every clone feeds the same queue.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Create the admission handle and the single dispatcher that drains it.
    pub fn new(handler: Arc<dyn Handler>, config: &SchedulerConfig) -> (Scheduler, Dispatcher) {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                pending: PendingSet::new(),
                closed: false,
            }),
            wake: Notify::new(),
            busy: AtomicBool::new(false),
            dispatched: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });

        let dispatcher = Dispatcher {
            shared: shared.clone(),
            handler,
            handler_timeout: config.handler_timeout_ms.map(Duration::from_millis),
        };

        (Scheduler { shared }, dispatcher)
    }

    /// Queue `request` for service; its response is sent to `respond_to`.
    ///
    /// Returns the arrival sequence, or `None` if the dispatcher has already
    /// stopped, in which case `respond_to` has been answered with 503.
    pub fn admit(
        &self,
        request: Request,
        respond_to: oneshot::Sender<Response>,
        priority: Priority,
    ) -> Option<u64> {
        let job = Job {
            request,
            respond_to,
            admitted_at: Instant::now(),
        };

        let (sequence, depth) = {
            let mut queue = self.shared.lock();
            if queue.closed {
                drop(queue);
                let _ = job.respond_to.send(response::service_unavailable());
                return None;
            }
            let sequence = queue.pending.push(priority, job);
            let depth = queue.pending.len();
            metrics::set_pending(depth);
            (sequence, depth)
        };

        tracing::debug!(priority = %priority, sequence, pending = depth, "Request admitted");
        metrics::record_admitted(priority.value());

        self.shared.wake.notify_one();
        Some(sequence)
    }

    /// Queue `request` and hand back the receiver for its response.
    pub fn submit(&self, request: Request, priority: Priority) -> oneshot::Receiver<Response> {
        let (tx, rx) = oneshot::channel();
        self.admit(request, tx, priority);
        rx
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            pending: self.pending(),
            busy: self.is_busy(),
            dispatched: self.shared.dispatched.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
        }
    }
}

/// How one handler invocation ended.
enum Completion {
    Success(Response),
    Failed(HandlerError),
    Panicked,
    TimedOut(Duration),
}

impl Completion {
    fn label(&self) -> &'static str {
        match self {
            Completion::Success(_) => "success",
            Completion::Failed(_) => "failed",
            Completion::Panicked => "panicked",
            Completion::TimedOut(_) => "timed_out",
        }
    }
}

/// The one loop allowed to call the handler.
///
/// Dropping it (normally at the end of [`Dispatcher::run`]) closes the
/// scheduler and answers every entry still pending with 503.
pub struct Dispatcher {
    shared: Arc<Shared>,
    handler: Arc<dyn Handler>,
    handler_timeout: Option<Duration>,
}

impl Dispatcher {
    /// Drain the queue in priority order until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(handler_timeout = ?self.handler_timeout, "Dispatcher starting");

        loop {
            let next = {
                let mut queue = self.shared.lock();
                let next = queue.pending.pop();
                if next.is_some() {
                    metrics::set_pending(queue.pending.len());
                }
                next
            };

            match next {
                Some(entry) => {
                    self.dispatch(entry).await;
                    if !matches!(shutdown.try_recv(), Err(broadcast::error::TryRecvError::Empty)) {
                        tracing::info!("Dispatcher received shutdown signal, exiting loop");
                        break;
                    }
                }
                None => {
                    tokio::select! {
                        _ = self.shared.wake.notified() => {}
                        _ = shutdown.recv() => {
                            tracing::info!("Dispatcher received shutdown signal, exiting loop");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn dispatch(&self, entry: QueueEntry<Job>) {
        let QueueEntry {
            priority,
            sequence,
            payload: job,
        } = entry;
        let Job {
            request,
            respond_to,
            admitted_at,
        } = job;

        let request_id = request_id(request.headers()).to_string();
        let waited = admitted_at.elapsed();
        let started = Instant::now();
        self.shared.busy.store(true, Ordering::SeqCst);

        tracing::debug!(
            request_id = %request_id,
            priority = %priority,
            sequence,
            waited = ?waited,
            "Dispatching request"
        );

        let completion = self.invoke(request).await;
        let label = completion.label();

        let response = match completion {
            Completion::Success(response) => response,
            Completion::Failed(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Handler failed");
                response::internal_error()
            }
            Completion::Panicked => {
                tracing::error!(request_id = %request_id, "Handler panicked");
                response::internal_error()
            }
            Completion::TimedOut(limit) => {
                tracing::warn!(request_id = %request_id, limit = ?limit, "Handler timed out");
                response::gateway_timeout()
            }
        };

        self.shared.dispatched.fetch_add(1, Ordering::Relaxed);
        if label != "success" {
            self.shared.failed.fetch_add(1, Ordering::Relaxed);
        }
        metrics::record_completion(label, waited, started.elapsed());
        self.shared.busy.store(false, Ordering::SeqCst);

        if respond_to.send(response).is_err() {
            tracing::debug!(request_id = %request_id, "Client went away before the response was delivered");
        }
    }

    async fn invoke(&self, request: Request) -> Completion {
        // The handler is called inside the guarded future so a panic before
        // its first await is caught too.
        let call = AssertUnwindSafe(async { self.handler.handle(request).await }).catch_unwind();

        let result = match self.handler_timeout {
            Some(limit) => match time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => return Completion::TimedOut(limit),
            },
            None => call.await,
        };

        match result {
            Ok(Ok(response)) => Completion::Success(response),
            Ok(Err(e)) => Completion::Failed(e),
            Err(_) => Completion::Panicked,
        }
    }

    fn close(&self) {
        let mut leftovers = {
            let mut queue = self.shared.lock();
            queue.closed = true;
            metrics::set_pending(0);
            std::mem::take(&mut queue.pending)
        };

        let abandoned = leftovers.len();
        while let Some(entry) = leftovers.pop() {
            let _ = entry.payload.respond_to.send(response::service_unavailable());
        }
        if abandoned > 0 {
            tracing::warn!(abandoned, "Scheduler stopped with requests still pending");
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use axum::{body::Body, http::StatusCode, response::IntoResponse};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    fn request(tag: &str) -> Request {
        Request::builder()
            .uri("/")
            .header("x-entry", tag)
            .body(Body::empty())
            .unwrap()
    }

    fn tag_of(request: &Request) -> String {
        request.headers()["x-entry"].to_str().unwrap().to_string()
    }

    /// Handler that records the order entries were served in.
    fn recording_handler() -> (Arc<dyn Handler>, Arc<Mutex<Vec<String>>>) {
        let served = Arc::new(Mutex::new(Vec::new()));
        let log = served.clone();
        let handler = move |request: Request| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(tag_of(&request));
                Ok::<_, HandlerError>(StatusCode::OK.into_response())
            }
        };
        let handler: Arc<dyn Handler> = Arc::new(handler);
        (handler, served)
    }

    #[tokio::test]
    async fn test_service_order_follows_priority_then_arrival() {
        let (handler, served) = recording_handler();
        let (scheduler, dispatcher) = Scheduler::new(handler, &SchedulerConfig::default());

        let receivers: Vec<_> = [("entry#1", 1), ("entry#2", 3), ("entry#3", 1)]
            .into_iter()
            .map(|(tag, p)| scheduler.submit(request(tag), Priority::new(p)))
            .collect();

        let shutdown = Shutdown::new();
        tokio::spawn(dispatcher.run(shutdown.subscribe()));
        for rx in receivers {
            assert_eq!(rx.await.unwrap().status(), StatusCode::OK);
        }

        assert_eq!(*served.lock().unwrap(), vec!["entry#1", "entry#3", "entry#2"]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stall_the_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = move |_request: Request| {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call == 5 {
                    Err(HandlerError::Internal("fifth call fails".into()))
                } else {
                    Ok(StatusCode::OK.into_response())
                }
            }
        };
        let (scheduler, dispatcher) = Scheduler::new(Arc::new(handler), &SchedulerConfig::default());

        let receivers: Vec<_> = (0..6)
            .map(|i| scheduler.submit(request(&i.to_string()), Priority::DEFAULT))
            .collect();

        let shutdown = Shutdown::new();
        tokio::spawn(dispatcher.run(shutdown.subscribe()));

        let mut statuses = Vec::new();
        for rx in receivers {
            statuses.push(rx.await.unwrap().status());
        }

        assert_eq!(statuses[4], StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(statuses[5], StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 6);

        let stats = scheduler.stats();
        assert_eq!(stats.dispatched, 6);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn test_panicking_handler_is_isolated() {
        let handler = |request: Request| async move {
            if tag_of(&request) == "boom" {
                panic!("handler blew up");
            }
            Ok::<_, HandlerError>(StatusCode::OK.into_response())
        };
        let (scheduler, dispatcher) = Scheduler::new(Arc::new(handler), &SchedulerConfig::default());

        let first = scheduler.submit(request("boom"), Priority::new(0));
        let second = scheduler.submit(request("fine"), Priority::new(1));

        let shutdown = Shutdown::new();
        tokio::spawn(dispatcher.run(shutdown.subscribe()));

        assert_eq!(first.await.unwrap().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(second.await.unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_in_service_entry_is_not_preempted() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let release = Arc::new(Notify::new());
        let gate = release.clone();
        let handler = move |request: Request| {
            let started_tx = started_tx.clone();
            let gate = gate.clone();
            async move {
                let tag = tag_of(&request);
                let _ = started_tx.send(tag.clone());
                if tag == "slow" {
                    gate.notified().await;
                }
                Ok::<_, HandlerError>(StatusCode::OK.into_response())
            }
        };
        let (scheduler, dispatcher) = Scheduler::new(Arc::new(handler), &SchedulerConfig::default());

        let shutdown = Shutdown::new();
        tokio::spawn(dispatcher.run(shutdown.subscribe()));

        let slow = scheduler.submit(request("slow"), Priority::new(9));
        assert_eq!(started_rx.recv().await.unwrap(), "slow");
        assert!(scheduler.is_busy());

        let normal = scheduler.submit(request("normal"), Priority::new(5));
        let urgent = scheduler.submit(request("urgent"), Priority::new(0));
        assert_eq!(scheduler.pending(), 2);

        release.notify_one();
        for rx in [slow, normal, urgent] {
            assert_eq!(rx.await.unwrap().status(), StatusCode::OK);
        }

        let mut order = Vec::new();
        while let Ok(tag) = started_rx.try_recv() {
            order.push(tag);
        }
        assert_eq!(order, vec!["urgent", "normal"]);
    }

    #[tokio::test]
    async fn test_deadline_forces_completion() {
        let handler = |request: Request| async move {
            if tag_of(&request) == "stuck" {
                time::sleep(Duration::from_secs(30)).await;
            }
            Ok::<_, HandlerError>(StatusCode::OK.into_response())
        };
        let config = SchedulerConfig {
            handler_timeout_ms: Some(50),
        };
        let (scheduler, dispatcher) = Scheduler::new(Arc::new(handler), &config);

        let stuck = scheduler.submit(request("stuck"), Priority::new(0));
        let next = scheduler.submit(request("next"), Priority::new(1));

        let shutdown = Shutdown::new();
        tokio::spawn(dispatcher.run(shutdown.subscribe()));

        assert_eq!(stuck.await.unwrap().status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(next.await.unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_idle_dispatcher_wakes_on_admission() {
        let (handler, served) = recording_handler();
        let (scheduler, dispatcher) = Scheduler::new(handler, &SchedulerConfig::default());

        let shutdown = Shutdown::new();
        tokio::spawn(dispatcher.run(shutdown.subscribe()));
        tokio::task::yield_now().await;

        let rx = scheduler.submit(request("late"), Priority::DEFAULT);
        assert_eq!(rx.await.unwrap().status(), StatusCode::OK);
        assert_eq!(*served.lock().unwrap(), vec!["late"]);
        assert!(!scheduler.is_busy());
    }

    #[tokio::test]
    async fn test_abandoned_response_does_not_block_next() {
        let (handler, served) = recording_handler();
        let (scheduler, dispatcher) = Scheduler::new(handler, &SchedulerConfig::default());

        drop(scheduler.submit(request("gone"), Priority::new(0)));
        let kept = scheduler.submit(request("kept"), Priority::new(1));

        let shutdown = Shutdown::new();
        tokio::spawn(dispatcher.run(shutdown.subscribe()));

        assert_eq!(kept.await.unwrap().status(), StatusCode::OK);
        assert_eq!(*served.lock().unwrap(), vec!["gone", "kept"]);
    }

    #[tokio::test]
    async fn test_stopped_dispatcher_answers_503() {
        let (handler, served) = recording_handler();
        let (scheduler, dispatcher) = Scheduler::new(handler, &SchedulerConfig::default());

        let queued = scheduler.submit(request("queued"), Priority::DEFAULT);

        let shutdown = Shutdown::new();
        let task = tokio::spawn(dispatcher.run(shutdown.subscribe()));
        assert_eq!(queued.await.unwrap().status(), StatusCode::OK);

        shutdown.trigger();
        task.await.unwrap();

        let (tx, rx) = oneshot::channel();
        assert_eq!(scheduler.admit(request("late"), tx, Priority::DEFAULT), None);
        assert_eq!(rx.await.unwrap().status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(*served.lock().unwrap(), vec!["queued"]);
    }

    #[tokio::test]
    async fn test_dropping_dispatcher_drains_pending() {
        let (handler, _served) = recording_handler();
        let (scheduler, dispatcher) = Scheduler::new(handler, &SchedulerConfig::default());

        let a = scheduler.submit(request("a"), Priority::new(0));
        let b = scheduler.submit(request("b"), Priority::new(3));
        drop(dispatcher);

        assert_eq!(a.await.unwrap().status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(b.await.unwrap().status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(scheduler.pending(), 0);
    }

    /// Records every value written to the pending-depth gauge.
    #[derive(Default)]
    struct DepthRecorder {
        depths: Arc<DepthLog>,
    }

    #[derive(Default)]
    struct DepthLog(Mutex<Vec<f64>>);

    impl ::metrics::GaugeFn for DepthLog {
        fn increment(&self, _: f64) {}
        fn decrement(&self, _: f64) {}
        fn set(&self, value: f64) {
            self.0.lock().unwrap().push(value);
        }
    }

    impl ::metrics::Recorder for DepthRecorder {
        fn describe_counter(&self, _: ::metrics::KeyName, _: Option<::metrics::Unit>, _: ::metrics::SharedString) {}
        fn describe_gauge(&self, _: ::metrics::KeyName, _: Option<::metrics::Unit>, _: ::metrics::SharedString) {}
        fn describe_histogram(&self, _: ::metrics::KeyName, _: Option<::metrics::Unit>, _: ::metrics::SharedString) {}

        fn register_counter(&self, _: &::metrics::Key, _: &::metrics::Metadata<'_>) -> ::metrics::Counter {
            ::metrics::Counter::noop()
        }

        fn register_gauge(&self, key: &::metrics::Key, _: &::metrics::Metadata<'_>) -> ::metrics::Gauge {
            if key.name() == "gate_pending_requests" {
                ::metrics::Gauge::from_arc(self.depths.clone())
            } else {
                ::metrics::Gauge::noop()
            }
        }

        fn register_histogram(&self, _: &::metrics::Key, _: &::metrics::Metadata<'_>) -> ::metrics::Histogram {
            ::metrics::Histogram::noop()
        }
    }

    #[test]
    fn test_pending_gauge_follows_queue_order_under_concurrent_admits() {
        let (handler, _served) = recording_handler();
        let (scheduler, _dispatcher) = Scheduler::new(handler, &SchedulerConfig::default());
        let recorder = DepthRecorder::default();

        std::thread::scope(|scope| {
            for t in 0..8 {
                let scheduler = &scheduler;
                let recorder = &recorder;
                scope.spawn(move || {
                    ::metrics::with_local_recorder(recorder, || {
                        for i in 0..25 {
                            let (tx, _rx) = oneshot::channel();
                            scheduler.admit(request(&format!("{t}-{i}")), tx, Priority::new(i % 3));
                        }
                    });
                });
            }
        });

        let expected: Vec<f64> = (1..=200).map(|depth| depth as f64).collect();
        assert_eq!(*recorder.depths.0.lock().unwrap(), expected);
        assert_eq!(scheduler.pending(), 200);
    }
}
