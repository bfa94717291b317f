// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Connection lifecycle of a tracking subscription.
//!
//! A single event-dispatch state machine, so the reconnect and cancellation
//! logic is testable without a socket or timers. The driver feeds transport
//! events in and executes the returned effects.

use std::time::Duration;

use super::backoff::ReconnectBackoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No transport and no pending connect.
    Disconnected,
    /// A transport open is in flight.
    Connecting,
    /// The open handshake completed and no close has happened since.
    Connected,
    /// Torn down; the session never leaves this phase.
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The owner requested the initial connect.
    ConnectRequested,
    /// The transport open handshake completed.
    TransportOpened,
    /// The transport reported an error.
    TransportError,
    /// The transport closed (including a failed open attempt).
    TransportClosed,
    /// The scheduled reconnect delay elapsed.
    ReconnectDue,
    /// The owner tore the session down.
    TearDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEffect {
    None,
    /// Start a transport open attempt.
    OpenTransport,
    /// Force-close the transport; a `TransportClosed` event will follow.
    CloseTransport,
    /// Wait out the delay, then feed `ReconnectDue`.
    ScheduleReconnect(Duration),
    /// Cancel pending timers, close any live transport, stop for good.
    Shutdown,
}

/// State machine of one per-job tracking subscription.
#[derive(Debug)]
pub struct TrackingSession {
    phase: SessionPhase,
    backoff: ReconnectBackoff,
}

impl Default for TrackingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingSession {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Disconnected,
            backoff: ReconnectBackoff::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn on_event(&mut self, event: SessionEvent) -> SessionEffect {
        use SessionEvent::*;
        use SessionPhase::*;

        // Terminated absorbs everything, including repeated teardowns.
        if self.phase == Terminated {
            return SessionEffect::None;
        }

        match (self.phase, event) {
            (_, TearDown) => {
                self.phase = Terminated;
                SessionEffect::Shutdown
            }
            (Disconnected, ConnectRequested) | (Disconnected, ReconnectDue) => {
                self.phase = Connecting;
                SessionEffect::OpenTransport
            }
            (Connecting, TransportOpened) => {
                self.phase = Connected;
                self.backoff.reset();
                SessionEffect::None
            }
            // An error does not transition by itself; it forces a close and
            // the close event drives the reconnect.
            (Connecting | Connected, TransportError) => SessionEffect::CloseTransport,
            (Connecting | Connected, TransportClosed) => {
                self.phase = Disconnected;
                SessionEffect::ScheduleReconnect(self.backoff.next_delay())
            }
            (phase, event) => {
                // Stale events (e.g. a close racing a teardown) are dropped.
                tracing::debug!(?phase, ?event, "ignoring session event");
                SessionEffect::None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn connected_session() -> TrackingSession {
        let mut session = TrackingSession::new();
        session.on_event(SessionEvent::ConnectRequested);
        session.on_event(SessionEvent::TransportOpened);
        assert_eq!(session.phase(), SessionPhase::Connected);
        session
    }

    #[test]
    fn connect_open_close_reconnect_cycle() {
        let mut session = TrackingSession::new();

        assert_eq!(
            session.on_event(SessionEvent::ConnectRequested),
            SessionEffect::OpenTransport
        );
        assert_eq!(session.phase(), SessionPhase::Connecting);

        assert_eq!(
            session.on_event(SessionEvent::TransportOpened),
            SessionEffect::None
        );
        assert_eq!(session.phase(), SessionPhase::Connected);

        assert_eq!(
            session.on_event(SessionEvent::TransportClosed),
            SessionEffect::ScheduleReconnect(Duration::from_millis(1000))
        );
        assert_eq!(session.phase(), SessionPhase::Disconnected);

        assert_eq!(
            session.on_event(SessionEvent::ReconnectDue),
            SessionEffect::OpenTransport
        );
        assert_eq!(session.phase(), SessionPhase::Connecting);
    }

    #[test]
    fn consecutive_closes_double_the_reconnect_delay() {
        let mut session = TrackingSession::new();
        session.on_event(SessionEvent::ConnectRequested);

        let mut delays = Vec::new();
        for _ in 0..3 {
            let SessionEffect::ScheduleReconnect(delay) =
                session.on_event(SessionEvent::TransportClosed)
            else {
                panic!("close must schedule a reconnect");
            };
            delays.push(delay.as_millis());
            session.on_event(SessionEvent::ReconnectDue);
        }
        assert_eq!(delays, vec![1000, 2000, 4000]);
    }

    #[test]
    fn successful_open_resets_the_delay() {
        let mut session = TrackingSession::new();
        session.on_event(SessionEvent::ConnectRequested);

        session.on_event(SessionEvent::TransportClosed);
        session.on_event(SessionEvent::ReconnectDue);
        session.on_event(SessionEvent::TransportClosed);
        session.on_event(SessionEvent::ReconnectDue);

        // Third attempt succeeds; the ladder starts over at the floor.
        session.on_event(SessionEvent::TransportOpened);
        assert_eq!(
            session.on_event(SessionEvent::TransportClosed),
            SessionEffect::ScheduleReconnect(Duration::from_millis(1000))
        );
    }

    #[test]
    fn transport_error_forces_a_close_without_transitioning() {
        let mut session = connected_session();
        assert_eq!(
            session.on_event(SessionEvent::TransportError),
            SessionEffect::CloseTransport
        );
        assert_eq!(session.phase(), SessionPhase::Connected);

        // The close that follows drives the reconnect.
        assert!(matches!(
            session.on_event(SessionEvent::TransportClosed),
            SessionEffect::ScheduleReconnect(_)
        ));
    }

    #[test]
    fn teardown_is_terminal_from_every_phase() {
        for events in [
            vec![],
            vec![SessionEvent::ConnectRequested],
            vec![SessionEvent::ConnectRequested, SessionEvent::TransportOpened],
            vec![SessionEvent::ConnectRequested, SessionEvent::TransportClosed],
        ] {
            let mut session = TrackingSession::new();
            for event in events {
                session.on_event(event);
            }
            assert_eq!(
                session.on_event(SessionEvent::TearDown),
                SessionEffect::Shutdown
            );
            assert_eq!(session.phase(), SessionPhase::Terminated);
        }
    }

    #[test]
    fn terminated_absorbs_all_events() {
        let mut session = connected_session();
        session.on_event(SessionEvent::TearDown);

        for event in [
            SessionEvent::TearDown,
            SessionEvent::ConnectRequested,
            SessionEvent::TransportOpened,
            SessionEvent::TransportError,
            SessionEvent::TransportClosed,
            SessionEvent::ReconnectDue,
        ] {
            assert_eq!(session.on_event(event), SessionEffect::None);
            assert_eq!(session.phase(), SessionPhase::Terminated);
        }
    }
}
