//! The canonical controller state mirror.
//!
//! One hierarchical snapshot, mutated only by the projector. Everything
//! derives `Clone` + `Serialize`: `get_state()` hands out deep copies, so
//! listeners can never reach back into live state.

use serde::Serialize;
use torqlink_mid::Alarm;

/// Where the current spindle count came from.
///
/// `Config` and `Manual` are sticky: counts reported by the controller
/// (MID 0101 or result spindle numbers) may never lower their authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpindleCountSource {
    Default,
    Config,
    Manual,
    Mid101,
    Mid061,
}

impl SpindleCountSource {
    /// `true` when controller reports may not override this source.
    pub fn is_sticky(self) -> bool {
        matches!(self, Self::Config | Self::Manual)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionState {
    pub connected: bool,
    /// Communication start acknowledged; application MIDs may flow.
    pub link_ready: bool,
    pub last_received_mid: Option<u16>,
    pub reconnecting: bool,
    pub reconnect_attempts: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Subscriptions {
    pub tightening_results: bool,
    pub alarms: bool,
    pub multi_spindle_status: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolState {
    /// Revision declared by the controller at communication start (1..6).
    pub revision: u8,
    pub subscriptions: Subscriptions,
}

impl Default for ProtocolState {
    fn default() -> Self {
        Self {
            revision: 1,
            subscriptions: Subscriptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControllerState {
    pub ready: bool,
    pub error_active: bool,
    /// Code of the most recent alarm, while any alarm is active.
    pub error_code: Option<String>,
    pub alarms: Vec<Alarm>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolState {
    pub enabled: bool,
    pub running: bool,
    pub spindle_count: u8,
    pub spindle_count_source: SpindleCountSource,
}

impl Default for ToolState {
    fn default() -> Self {
        Self {
            enabled: false,
            running: false,
            spindle_count: 1,
            spindle_count_source: SpindleCountSource::Default,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductState {
    pub vin: String,
    pub vin_required: bool,
    pub vin_valid: bool,
    /// Set when the first result of a cycle is processed with a VIN on
    /// file; cleared by job selection or batch start.
    pub vin_locked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobState {
    pub job_id: Option<u16>,
    pub param_set_id: Option<u16>,
    pub active: bool,
    pub locked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchState {
    pub batch_id: Option<u32>,
    pub size: Option<u32>,
    pub counter: u32,
    pub active: bool,
    pub complete: bool,
    pub locked: bool,
    /// A batch reset is in flight; the counter only moves on MID 0005.
    pub pending_reset: bool,
}

/// Full client-visible state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientState {
    pub connection: ConnectionState,
    pub protocol: ProtocolState,
    pub controller: ControllerState,
    pub tool: ToolState,
    pub product: ProductState,
    pub job: JobState,
    pub batch: BatchState,
}
