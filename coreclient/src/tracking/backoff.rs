// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::time::Duration;

/// First reconnect delay after a close.
pub const RECONNECT_FLOOR: Duration = Duration::from_millis(1000);

/// Ceiling for the reconnect delay.
pub const RECONNECT_CEILING: Duration = Duration::from_millis(30_000);

/// Reconnect delay ladder: starts at the floor, doubles after every close,
/// caps at the ceiling, and drops back to the floor on any successful open.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    next: Duration,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconnectBackoff {
    pub fn new() -> Self {
        Self {
            next: RECONNECT_FLOOR,
        }
    }

    /// Delay to wait before the reconnect following a close. Each call also
    /// advances the ladder for the next close.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(RECONNECT_CEILING);
        delay
    }

    /// Called on a successful open.
    pub fn reset(&mut self) {
        self.next = RECONNECT_FLOOR;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn doubles_per_close() {
        let mut backoff = ReconnectBackoff::new();
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(4000));
    }

    #[test]
    fn caps_at_the_ceiling() {
        let mut backoff = ReconnectBackoff::new();
        let mut last = Duration::ZERO;
        for _ in 0..10 {
            last = backoff.next_delay();
        }
        assert_eq!(last, RECONNECT_CEILING);
    }

    #[test]
    fn reset_drops_back_to_the_floor() {
        let mut backoff = ReconnectBackoff::new();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
    }
}
