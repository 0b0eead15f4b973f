use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::trace;

use crate::models::SkipWindows;

/// Monotonic id of a playback session; messages carry it so late arrivals
/// from a torn-down session can be recognised and dropped
pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    CountdownTick,
    PromptDismiss,
}

/// Work completed off the controller loop on behalf of one session
#[derive(Debug)]
pub enum SessionPayload {
    Timer(TimerKind),
    SkipWindowsResolved(Option<SkipWindows>),
}

#[derive(Debug)]
pub struct SessionMessage {
    pub session: SessionId,
    pub payload: SessionPayload,
}

/// A spawned task owned by a session. Dropping it aborts the task.
#[derive(Debug)]
pub struct SessionTask {
    handle: JoinHandle<()>,
}

impl SessionTask {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }
}

impl Drop for SessionTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Starts timers that report back to the controller tagged with their session
#[derive(Debug, Clone)]
pub struct TimerScheduler {
    session: SessionId,
    sender: mpsc::UnboundedSender<SessionMessage>,
}

impl TimerScheduler {
    pub fn new(session: SessionId, sender: mpsc::UnboundedSender<SessionMessage>) -> Self {
        Self { session, sender }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Fires every `period`, first after one full period
    pub fn repeating(&self, kind: TimerKind, period: Duration) -> SessionTask {
        let scheduler = self.clone();
        SessionTask::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if !scheduler.fire(kind) {
                    break;
                }
            }
        })
    }

    pub fn once(&self, kind: TimerKind, delay: Duration) -> SessionTask {
        let scheduler = self.clone();
        SessionTask::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.fire(kind);
        })
    }

    /// Deliver a payload for this session. Returns false once the
    /// controller is gone.
    pub fn send(&self, payload: SessionPayload) -> bool {
        self.sender
            .send(SessionMessage {
                session: self.session,
                payload,
            })
            .is_ok()
    }

    fn fire(&self, kind: TimerKind) -> bool {
        trace!("Session {} timer fired: {:?}", self.session, kind);
        self.send(SessionPayload::Timer(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer_kind(message: SessionMessage) -> TimerKind {
        match message.payload {
            SessionPayload::Timer(kind) => kind,
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_waits_a_full_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = TimerScheduler::new(7, tx);
        let started = Instant::now();
        let _task = scheduler.repeating(TimerKind::CountdownTick, Duration::from_secs(1));

        for n in 1..=3 {
            let message = rx.recv().await.unwrap();
            assert_eq!(message.session, 7);
            assert_eq!(timer_kind(message), TimerKind::CountdownTick);
            assert_eq!(started.elapsed(), Duration::from_secs(n));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_task_cancels_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = TimerScheduler::new(1, tx);
        let task = scheduler.once(TimerKind::PromptDismiss, Duration::from_secs(10));
        drop(task);
        drop(scheduler);

        // Every sender is gone once the aborted task is cleaned up
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_fires_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = TimerScheduler::new(2, tx);
        let _task = scheduler.once(TimerKind::PromptDismiss, Duration::from_secs(10));
        drop(scheduler);

        let message = rx.recv().await.unwrap();
        assert_eq!(timer_kind(message), TimerKind::PromptDismiss);
        assert!(rx.recv().await.is_none());
    }
}
