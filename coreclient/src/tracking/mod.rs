// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Live tracking of a single job.
//!
//! One subscription owns one WebSocket connection to the job's event stream
//! and keeps it alive across drops: closes schedule a reconnect with
//! exponential backoff, successful opens reset the delay. Inbound frames are
//! projected into a [`JobTrackingState`] snapshot published on a watch
//! channel; the subscription never sends frames itself.
//!
//! The lifecycle lives in [`session`]'s state machine; this module drives it
//! against a real transport and owns the timers.

use std::sync::Arc;

use tokio::{sync::watch, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uptendapiclient::tracking::EventTransport;
use uptendcommon::identifiers::JobId;

use futures_util::StreamExt;

mod backoff;
mod projection;
mod session;

pub use projection::JobTrackingState;

use session::{SessionEffect, SessionEvent, TrackingSession};

/// Handle of a live tracking subscription.
///
/// Dropping the handle tears the subscription down.
#[derive(Debug)]
pub struct JobTrackingHandle {
    job_id: JobId,
    state_rx: watch::Receiver<JobTrackingState>,
    cancel: CancellationToken,
}

impl JobTrackingHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Current state snapshot.
    pub fn state(&self) -> JobTrackingState {
        self.state_rx.borrow().clone()
    }

    /// Subscribes to state snapshots.
    pub fn watch_state(&self) -> watch::Receiver<JobTrackingState> {
        self.state_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state_rx.borrow().is_connected
    }

    /// Tears the subscription down: cancels any pending reconnect, closes a
    /// live socket, and stops all state updates. Safe to call repeatedly.
    pub fn tear_down(&self) {
        self.cancel.cancel();
    }
}

impl Drop for JobTrackingHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawns a tracking subscription over the given transport.
pub fn spawn(transport: Arc<dyn EventTransport>, job_id: JobId) -> JobTrackingHandle {
    let (state_tx, state_rx) = watch::channel(JobTrackingState::default());
    let cancel = CancellationToken::new();
    let driver = TrackingDriver {
        job_id: job_id.clone(),
        transport,
        state_tx,
        cancel: cancel.clone(),
    };
    tokio::spawn(driver.run());
    JobTrackingHandle {
        job_id,
        state_rx,
        cancel,
    }
}

struct TrackingDriver {
    job_id: JobId,
    transport: Arc<dyn EventTransport>,
    state_tx: watch::Sender<JobTrackingState>,
    cancel: CancellationToken,
}

impl TrackingDriver {
    async fn run(self) {
        let mut session = TrackingSession::new();
        let mut effect = session.on_event(SessionEvent::ConnectRequested);
        loop {
            effect = match effect {
                SessionEffect::OpenTransport => self.connect_and_read(&mut session).await,
                SessionEffect::ScheduleReconnect(delay) => {
                    debug!(job_id = %self.job_id, ?delay, "scheduling tracking reconnect");
                    tokio::select! {
                        _ = self.cancel.cancelled() => session.on_event(SessionEvent::TearDown),
                        _ = sleep(delay) => session.on_event(SessionEvent::ReconnectDue),
                    }
                }
                // Stream transports fold errors into the end of the stream,
                // so a force-close is already a closed transport here.
                SessionEffect::CloseTransport => session.on_event(SessionEvent::TransportClosed),
                SessionEffect::Shutdown | SessionEffect::None => break,
            };
        }
        debug!(job_id = %self.job_id, "tracking session ended");
    }

    /// One connection attempt plus the read loop of the resulting stream.
    /// Returns the effect that decides what happens next.
    async fn connect_and_read(&self, session: &mut TrackingSession) -> SessionEffect {
        let opened = tokio::select! {
            _ = self.cancel.cancelled() => return session.on_event(SessionEvent::TearDown),
            opened = self.transport.open() => opened,
        };
        let mut frames = match opened {
            Ok(frames) => frames,
            Err(error) => {
                warn!(job_id = %self.job_id, %error, "tracking connect failed");
                return session.on_event(SessionEvent::TransportClosed);
            }
        };

        session.on_event(SessionEvent::TransportOpened);
        debug!(job_id = %self.job_id, "tracking stream connected");
        self.state_tx.send_modify(|state| state.is_connected = true);

        let effect = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break session.on_event(SessionEvent::TearDown),
                frame = frames.next() => match frame {
                    Some(frame) => self.state_tx.send_modify(|state| state.apply_frame(&frame)),
                    None => break session.on_event(SessionEvent::TransportClosed),
                },
            }
        };

        // Dropping the stream closes the underlying socket.
        drop(frames);
        self.state_tx.send_modify(|state| state.is_connected = false);
        effect
    }
}
