// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Wire format of the per-job tracking stream.
//!
//! The server broadcasts JSON text frames with a discriminating `type` field.
//! Frames carrying a full job object nest the current status under
//! `job.status`. Clients must tolerate frame types they do not know.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of a service job as reported by the server.
///
/// Open vocabulary: statuses introduced by newer server versions surface as
/// [`JobStatus::Other`] instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Requested,
    Assigned,
    EnRoute,
    InProgress,
    Completed,
    Cancelled,
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Requested => "requested",
            JobStatus::Assigned => "assigned",
            JobStatus::EnRoute => "en_route",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Other(status) => status,
        }
    }
}

impl From<&str> for JobStatus {
    fn from(status: &str) -> Self {
        match status {
            "requested" => JobStatus::Requested,
            "assigned" => JobStatus::Assigned,
            "en_route" => JobStatus::EnRoute,
            "in_progress" => JobStatus::InProgress,
            "completed" => JobStatus::Completed,
            "cancelled" => JobStatus::Cancelled,
            other => JobStatus::Other(other.to_owned()),
        }
    }
}

impl From<String> for JobStatus {
    fn from(status: String) -> Self {
        status.as_str().into()
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_owned()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A geographic coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// The `type` discriminator of a tracking frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingEventKind {
    Connected,
    LocationUpdated,
    JobAccepted,
    JobStarted,
    JobCompleted,
    WorkerArrived,
    Other(String),
}

impl From<&str> for TrackingEventKind {
    fn from(kind: &str) -> Self {
        match kind {
            "connected" => TrackingEventKind::Connected,
            "location_updated" => TrackingEventKind::LocationUpdated,
            "job_accepted" => TrackingEventKind::JobAccepted,
            "job_started" => TrackingEventKind::JobStarted,
            "job_completed" => TrackingEventKind::JobCompleted,
            "worker_arrived" => TrackingEventKind::WorkerArrived,
            other => TrackingEventKind::Other(other.to_owned()),
        }
    }
}

/// A parsed tracking frame.
///
/// Keeps the raw JSON value around: consumers retain the full message even
/// for frame types they do not interpret.
#[derive(Debug, Clone)]
pub struct TrackingEvent {
    kind: TrackingEventKind,
    raw: Value,
}

impl TrackingEvent {
    /// Parses a text frame. Returns `None` for anything that is not valid
    /// JSON; such frames carry no information for the client.
    pub fn parse(text: &str) -> Option<Self> {
        let raw: Value = serde_json::from_str(text).ok()?;
        let kind = raw
            .get("type")
            .and_then(Value::as_str)
            .map(TrackingEventKind::from)
            .unwrap_or_else(|| TrackingEventKind::Other(String::new()));
        Some(Self { kind, raw })
    }

    pub fn kind(&self) -> &TrackingEventKind {
        &self.kind
    }

    /// Coordinates of a `location_updated` frame, read from its top-level
    /// `lat`/`lng` fields.
    pub fn location(&self) -> Option<GeoPoint> {
        let lat = self.raw.get("lat").and_then(Value::as_f64)?;
        let lng = self.raw.get("lng").and_then(Value::as_f64)?;
        Some(GeoPoint { lat, lng })
    }

    /// The job status nested under `job.status`, carried by frames that
    /// include a full job object.
    pub fn nested_status(&self) -> Option<JobStatus> {
        let status = self
            .raw
            .get("job")
            .and_then(|job| job.get("status"))
            .and_then(Value::as_str)?;
        Some(status.into())
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }
}
