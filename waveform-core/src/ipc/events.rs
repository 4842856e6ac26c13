//! Event types published to render hosts.
//!
//! | Event | Delivery |
//! |-------|----------|
//! | `BufferSnapshot` | `WaveformEngine::subscribe_snapshots()` / `snapshot()` |
//! | `EngineStatusEvent` | `WaveformEngine::subscribe_status()` |

use serde::{Deserialize, Serialize};

use crate::buffering::Sample;

// ---------------------------------------------------------------------------
// Display snapshots
// ---------------------------------------------------------------------------

/// Read-only view of the display buffer, published after every ingest.
///
/// This is everything a renderer needs: a polyline over `values`, a cursor
/// marker at `write_index`, and the axis ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferSnapshot {
    /// Number of chunks ingested so far (0 before the first one).
    pub seq: u64,
    /// Slot contents. Length equals the buffer capacity once it is sized.
    pub values: Vec<Sample>,
    /// Next slot the writer will overwrite.
    pub write_index: usize,
    pub y_min: Sample,
    pub y_max: Sample,
    /// Time axis start, in seconds.
    pub t_min: u32,
    /// Time axis end, in seconds (the display window length).
    pub t_max: u32,
}

impl BufferSnapshot {
    /// Placeholder published before the buffer is sized.
    pub fn placeholder(t_max: u32) -> Self {
        Self {
            seq: 0,
            values: Vec::new(),
            write_index: 0,
            y_min: -1,
            y_max: 1,
            t_min: 0,
            t_max,
        }
    }

    pub fn capacity(&self) -> usize {
        self.values.len()
    }
}

// ---------------------------------------------------------------------------
// Engine status events
// ---------------------------------------------------------------------------

/// Emitted when the engine state changes or a tick fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of the waveform engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Engine configured but `start()` not yet called.
    Idle,
    /// Learning the sample rate, building the series, priming the buffer.
    Starting,
    /// Ticking.
    Streaming,
    /// Ticking cancelled; engine may be restarted.
    Stopped,
    /// Start failed; see the event detail.
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_with_camel_case_fields() {
        let snap = BufferSnapshot {
            seq: 3,
            values: vec![-2, 0, 5],
            write_index: 1,
            y_min: -2,
            y_max: 5,
            t_min: 0,
            t_max: 1,
        };

        let json = serde_json::to_value(&snap).expect("serialize snapshot");
        assert_eq!(json["seq"], 3);
        assert_eq!(json["writeIndex"], 1);
        assert_eq!(json["yMin"], -2);
        assert_eq!(json["yMax"], 5);
        assert_eq!(json["tMax"], 1);
        assert_eq!(json["values"][2], 5);

        let round_trip: BufferSnapshot =
            serde_json::from_value(json).expect("deserialize snapshot");
        assert_eq!(round_trip, snap);
    }

    #[test]
    fn unsized_snapshot_uses_placeholder_axis() {
        let snap = BufferSnapshot::placeholder(2);
        assert_eq!(snap.capacity(), 0);
        assert_eq!((snap.y_min, snap.y_max), (-1, 1));
        assert_eq!((snap.t_min, snap.t_max), (0, 2));
    }

    #[test]
    fn engine_status_event_serializes_with_lowercase_status() {
        let event = EngineStatusEvent {
            status: EngineStatus::Streaming,
            detail: Some("tick failed".into()),
        };

        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "streaming");
        assert_eq!(json["detail"], "tick failed");

        let round_trip: EngineStatusEvent =
            serde_json::from_value(json).expect("deserialize status event");
        assert_eq!(round_trip.status, EngineStatus::Streaming);
    }

    #[test]
    fn engine_status_rejects_non_lowercase_values() {
        let err = serde_json::from_str::<EngineStatus>(r#""Streaming""#);
        assert!(err.is_err(), "expected invalid casing to fail");
    }
}
