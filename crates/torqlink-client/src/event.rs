//! The closed event surface.
//!
//! Everything the client observes or decides is published as one of these
//! variants, in projection order, after the triggering state mutation has
//! completed. Payloads are value types.

use serde::Serialize;
use torqlink_frame::FrameDefect;
use torqlink_mid::{Alarm, TighteningResult};

use crate::state::{ClientState, SpindleCountSource};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Connected,
    Disconnected,
    Reconnecting {
        attempt: u32,
        delay_ms: u64,
    },
    LinkEstablished {
        revision: u8,
    },
    TighteningCycleStarted {
        /// Wall-clock start, milliseconds since the Unix epoch.
        timestamp_ms: u64,
    },
    SpindleResult {
        result: TighteningResult,
    },
    TighteningCycleCompleted {
        results: Vec<TighteningResult>,
        overall_ok: bool,
        duration_ms: u64,
    },
    TighteningIncomplete {
        expected: u8,
        received: u8,
        results: Vec<TighteningResult>,
    },
    CommandAccepted {
        mid: u16,
    },
    CommandError {
        failed_mid: u16,
        error_code: u16,
        message: String,
    },
    CommandTimeout {
        mid: u16,
        command_id: u64,
    },
    CommandAborted {
        mid: u16,
        command_id: u64,
    },
    CommandSuccess {
        mid: u16,
        command_id: u64,
    },
    CommandFailed {
        mid: u16,
        command_id: u64,
        error_code: u16,
        message: String,
    },
    JobSelected {
        job_id: u16,
    },
    VinRequired {
        vin: String,
    },
    VinLocked {
        vin: String,
    },
    BatchStarted {
        batch_id: u32,
        size: u32,
    },
    BatchProgress {
        counter: u32,
        size: u32,
    },
    BatchCompleted {
        batch_id: u32,
    },
    BatchResetConfirmed,
    BatchResetFailed {
        error_code: u16,
        message: String,
    },
    Alarm {
        alarm: Alarm,
    },
    AlarmStatus {
        active: bool,
    },
    SpindleCountUpdated {
        count: u8,
        source: SpindleCountSource,
    },
    StateChanged {
        state: Box<ClientState>,
    },
    FrameError {
        defect: FrameDefect,
    },
    ParseError {
        mid: u16,
        detail: String,
    },
    Error {
        detail: String,
    },
}

impl Event {
    /// Short name for logs and CLI tables.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Connected => "connected",
            Event::Disconnected => "disconnected",
            Event::Reconnecting { .. } => "reconnecting",
            Event::LinkEstablished { .. } => "link_established",
            Event::TighteningCycleStarted { .. } => "tightening_cycle_started",
            Event::SpindleResult { .. } => "spindle_result",
            Event::TighteningCycleCompleted { .. } => "tightening_cycle_completed",
            Event::TighteningIncomplete { .. } => "tightening_incomplete",
            Event::CommandAccepted { .. } => "command_accepted",
            Event::CommandError { .. } => "command_error",
            Event::CommandTimeout { .. } => "command_timeout",
            Event::CommandAborted { .. } => "command_aborted",
            Event::CommandSuccess { .. } => "command_success",
            Event::CommandFailed { .. } => "command_failed",
            Event::JobSelected { .. } => "job_selected",
            Event::VinRequired { .. } => "vin_required",
            Event::VinLocked { .. } => "vin_locked",
            Event::BatchStarted { .. } => "batch_started",
            Event::BatchProgress { .. } => "batch_progress",
            Event::BatchCompleted { .. } => "batch_completed",
            Event::BatchResetConfirmed => "batch_reset_confirmed",
            Event::BatchResetFailed { .. } => "batch_reset_failed",
            Event::Alarm { .. } => "alarm",
            Event::AlarmStatus { .. } => "alarm_status",
            Event::SpindleCountUpdated { .. } => "spindle_count_updated",
            Event::StateChanged { .. } => "state_changed",
            Event::FrameError { .. } => "frame_error",
            Event::ParseError { .. } => "parse_error",
            Event::Error { .. } => "error",
        }
    }
}
