// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use pin_project::pin_project;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::debug;

use crate::offline_queue::OfflineActionQueue;

/// A service which is responsible for draining the offline action queue.
///
/// The service starts a background task which runs one replay pass per work
/// notification. The initial state of the service is `Stopped`, that is, the
/// background task is not running. The background task only runs when the
/// service is started, and when there is a notification to run. After doing
/// the work once, it waits for the next notification, or stops if it is
/// stopped.
#[derive(Debug)]
pub struct SyncService<C: SyncServiceWork = DrainContext> {
    context: C,
    run_token_tx: watch::Sender<RunToken>,
}

/// One unit of background work.
pub trait SyncServiceWork: Clone + Send + 'static {
    fn work(&self, run_token: CancellationToken) -> impl Future<Output = ()> + Send;
}

/// Production work context: one replay pass over the offline queue.
#[derive(Debug, Clone)]
pub struct DrainContext {
    queue: Arc<OfflineActionQueue>,
}

impl SyncServiceWork for DrainContext {
    async fn work(&self, run_token: CancellationToken) {
        if run_token.is_cancelled() {
            return;
        }
        // A pass runs to completion over its snapshot once started; the
        // token only gates whether a pass starts at all.
        let outcome = self.queue.sync_queue().await;
        if outcome.synced > 0 || outcome.failed > 0 {
            debug!(
                synced = outcome.synced,
                failed = outcome.failed,
                "drained offline queue"
            );
        }
    }
}

impl SyncService<DrainContext> {
    pub(crate) fn new(queue: Arc<OfflineActionQueue>) -> Self {
        Self::with_context(DrainContext { queue })
    }
}

impl<C: SyncServiceWork> SyncService<C> {
    fn with_context(context: C) -> Self {
        let (run_token_tx, run_token_rx) = watch::channel(RunToken::new_cancelled());
        let task = SyncServiceTask {
            context: context.clone(),
        };
        tokio::spawn(task.run(run_token_rx));
        Self {
            context,
            run_token_tx,
        }
    }

    /// Starts the background task.
    ///
    /// Returns a future which finishes when the background task is done.
    pub fn start(&self) -> WaitForDoneFuture {
        let mut done_token = None;
        self.run_token_tx.send_if_modified(|run_token| {
            if !run_token.rotate() {
                run_token.rotate_done();
            }
            done_token = Some(run_token.done.clone());
            true // notify the background task
        });
        debug!("starting sync service");
        WaitForDoneFuture::new(done_token)
    }

    /// Notifies the background task to stop.
    ///
    /// Returns a future which resolves when the background task fully stops.
    pub fn stop(&self) -> WaitForDoneFuture {
        let mut done_token = None;
        self.run_token_tx.send_if_modified(|run_token| {
            run_token.cancel();
            done_token = Some(run_token.done.clone());
            false // no more work => no need to wake up the background task
        });
        debug!("stopping sync service");
        WaitForDoneFuture::new(done_token)
    }

    /// Notifies the background task about new work.
    ///
    /// A no-op while the service is stopped.
    pub fn notify_work(&self) -> WaitForDoneFuture {
        let mut done_token = None;
        let notified = self.run_token_tx.send_if_modified(|run_token| {
            if run_token.is_cancelled() {
                false
            } else {
                run_token.rotate_done();
                done_token = Some(run_token.done.clone());
                true
            }
        });
        debug!(?notified, "notifying sync service about new work");
        WaitForDoneFuture::new(done_token)
    }

    /// Runs the background task and waits until it is done.
    ///
    /// If the background task is already running, just waits until it is
    /// done. The task is stopped in any case.
    pub async fn run_once(&self) {
        self.start().await;
        self.stop().await;
    }
}

struct SyncServiceTask<C> {
    context: C,
}

impl<C: SyncServiceWork> SyncServiceTask<C> {
    async fn run(self, mut run_token_rx: watch::Receiver<RunToken>) {
        loop {
            if run_token_rx.changed().await.is_err() {
                break;
            }

            let run_token = {
                let run_token = run_token_rx.borrow_and_update().clone();
                debug!(?run_token, "incoming work notification");

                if run_token.is_cancelled() {
                    run_token.mark_as_done();
                    continue;
                }

                run_token
            };

            debug!("starting work in sync service task");
            self.context.work(run_token.cancel.clone()).await;
            debug!("finished work in sync service task");

            run_token.mark_as_done();
        }
    }
}

/// A token sent to the background task as work permit.
///
/// The token is stored in a [`tokio::sync::watch`] cell. Whenever the token
/// is updated, the background task is woken up and uses the token to start
/// work (if it is not running yet). When the token is cancelled, the
/// background work (if any) is cancelled. There is no need to wake up the
/// background task in this case.
///
/// The token also contains a `done` token which is *shared* between the
/// callers and the background task. The background task uses it to mark the
/// work as done. In case the run token is created but the work is
/// immediately cancelled such that the background task never receives the
/// token, the done token is cancelled too.
#[derive(Debug, Default, Clone)]
struct RunToken {
    cancel: CancellationToken,
    done: CancellationToken,
}

impl RunToken {
    fn new() -> Self {
        Default::default()
    }

    fn new_cancelled() -> Self {
        let run_token = RunToken::new();
        run_token.cancel();
        run_token.mark_as_done();
        run_token
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn rotate(&mut self) -> bool {
        if self.is_cancelled() {
            *self = RunToken::new();
            true
        } else {
            false
        }
    }

    fn rotate_done(&mut self) -> bool {
        if self.done.is_cancelled() {
            self.done = CancellationToken::new();
            true
        } else {
            false
        }
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }

    fn mark_as_done(&self) {
        self.done.cancel();
    }
}

/// A future that resolves when the background task is done.
///
/// This future is not marked as `must_use`, because the default usage of the
/// apis returning this future is not to wait for its completion.
#[pin_project]
pub struct WaitForDoneFuture {
    #[pin]
    done_fut: Option<WaitForCancellationFutureOwned>,
}

impl WaitForDoneFuture {
    fn new(done: Option<CancellationToken>) -> Self {
        Self {
            done_fut: done.map(|done| done.cancelled_owned()),
        }
    }
}

impl Future for WaitForDoneFuture {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().done_fut.as_pin_mut() {
            Some(fut) => fut.poll(cx),
            None => Poll::Ready(()),
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use tokio::{
        sync::Notify,
        time::{sleep, timeout},
    };

    use crate::utils::init_test_tracing;

    use super::*;

    #[derive(Default, Clone)]
    struct DelayedCounterContext {
        counter: Arc<AtomicUsize>,
    }

    impl SyncServiceWork for DelayedCounterContext {
        async fn work(&self, run_token: CancellationToken) {
            debug!("starting work in delayed counter");
            sleep(Duration::from_millis(50)).await;
            if !run_token.is_cancelled() {
                debug!("+1 in delayed counter");
                self.counter.fetch_add(1, Ordering::SeqCst);
            } else {
                debug!("work cancelled");
            }
        }
    }

    #[tokio::test]
    async fn start_triggers_work() {
        init_test_tracing();

        let context = DelayedCounterContext::default();
        let service = SyncService::with_context(context.clone());

        service.start().await;

        assert_eq!(1, context.counter.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn stop_cancels_work() {
        init_test_tracing();

        let context = DelayedCounterContext::default();
        let service = SyncService::with_context(context.clone());

        service.start();
        service.stop().await;

        assert_eq!(0, context.counter.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn notify_work_triggers_another_run() {
        let context = DelayedCounterContext::default();
        let service = SyncService::with_context(context.clone());

        service.start().await;
        service.notify_work().await;

        assert_eq!(2, context.counter.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn notify_work_is_a_noop_while_stopped() {
        init_test_tracing();

        let context = DelayedCounterContext::default();
        let service = SyncService::with_context(context.clone());

        service.notify_work().await;

        assert_eq!(0, context.counter.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        init_test_tracing();

        let context = DelayedCounterContext::default();
        let service = SyncService::with_context(context.clone());

        service.start();
        service.start();
        service.start();
        service.start().await;
        debug!("done waiting for the last start to finish");
        service.start();
        service.start();
        service.start();
        service.start().await;
        debug!("done waiting for the last start to finish");

        assert_eq!(2, context.counter.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn run_once_runs_the_work_to_completion() {
        init_test_tracing();

        let context = DelayedCounterContext::default();
        let service = SyncService::with_context(context.clone());

        service.run_once().await;
        assert_eq!(1, context.counter.load(Ordering::SeqCst));

        service.run_once().await;
        assert_eq!(2, context.counter.load(Ordering::SeqCst));

        assert!(service.run_token_tx.subscribe().borrow().is_cancelled());
    }

    #[derive(Clone)]
    struct BlockingWork {
        gate: Arc<Notify>,
        started: Arc<Notify>,
    }

    impl SyncServiceWork for BlockingWork {
        async fn work(&self, _run_token: CancellationToken) {
            self.started.notify_one();
            // Wait until the test explicitly releases the gate.
            self.gate.notified().await;
        }
    }

    #[tokio::test]
    async fn stop_waits_for_running_work() {
        let gate = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());
        let context = BlockingWork {
            gate: gate.clone(),
            started: started.clone(),
        };
        let service = SyncService::with_context(context);

        // Start the worker; do not await the done future.
        service.start();
        started.notified().await;

        let mut stop = Box::pin(service.stop());
        assert!(
            timeout(Duration::from_millis(10), &mut stop).await.is_err(),
            "stop is pending while work is running"
        );

        gate.notify_one();
        stop.await;

        // Subsequent stop resolves immediately using the cached done token.
        assert!(
            timeout(Duration::from_millis(10), service.stop())
                .await
                .is_ok()
        );
    }
}
