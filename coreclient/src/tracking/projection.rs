// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Projection of inbound tracking frames into the UI state snapshot.

use serde_json::Value;
use tracing::debug;
use uptendcommon::messages::{GeoPoint, JobStatus, TrackingEvent, TrackingEventKind};

/// Snapshot of a tracked job as the UI consumes it.
///
/// `status` and `pro_location` survive reconnects so the UI does not flicker
/// back to an empty screen while the socket is down; only `is_connected`
/// drops on a close.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobTrackingState {
    /// Last known job status.
    pub status: Option<JobStatus>,
    /// The most recent raw message, whatever its type.
    pub last_update: Option<Value>,
    /// True only while the open handshake has completed and no close or
    /// error has occurred since.
    pub is_connected: bool,
    /// Last reported pro location.
    pub pro_location: Option<GeoPoint>,
}

impl JobTrackingState {
    /// Applies one inbound text frame. Malformed frames change nothing.
    pub fn apply_frame(&mut self, frame: &str) {
        match TrackingEvent::parse(frame) {
            Some(event) => self.apply_event(event),
            None => debug!("ignoring malformed tracking frame"),
        }
    }

    /// Applies one parsed event. Fields are overlaid additively; no message
    /// type resets fields it does not carry.
    pub fn apply_event(&mut self, event: TrackingEvent) {
        if let TrackingEventKind::LocationUpdated = event.kind() {
            if let Some(location) = event.location() {
                self.pro_location = Some(location);
            }
        }

        if let Some(status) = event.nested_status() {
            self.status = Some(status);
        }

        // Some event types imply a status even without a job object.
        match event.kind() {
            TrackingEventKind::JobAccepted => self.status = Some(JobStatus::Assigned),
            TrackingEventKind::JobStarted => self.status = Some(JobStatus::InProgress),
            TrackingEventKind::JobCompleted => self.status = Some(JobStatus::Completed),
            _ => {}
        }

        self.last_update = Some(event.into_raw());
    }
}
