//! Safety interlocks.
//!
//! Pure predicates over the state snapshot. `start_tightening` runs the
//! full gate; every other command only needs a ready link. Rules are
//! evaluated in a fixed order and the first violation wins, so callers get
//! a stable error code for a given state.

use serde::Serialize;

use crate::state::ClientState;

/// An interlock violation. Raised synchronously before any bytes are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterlockError {
    #[error("NOT_CONNECTED: no controller connection")]
    NotConnected,
    #[error("LINK_NOT_READY: communication start not acknowledged")]
    LinkNotReady,
    #[error("TOOL_DISABLED: tool is disabled")]
    ToolDisabled,
    #[error("TOOL_RUNNING: tool is already running")]
    ToolRunning,
    #[error("CTRL_NOT_READY: controller not ready")]
    CtrlNotReady,
    #[error("ALARM_ACTIVE: controller reports an active alarm")]
    AlarmActive,
    #[error("VIN_REQUIRED: VIN required but not provided")]
    VinRequired,
    #[error("JOB_NOT_ACTIVE: no active job selected")]
    JobNotActive,
}

impl InterlockError {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            Self::NotConnected => "NOT_CONNECTED",
            Self::LinkNotReady => "LINK_NOT_READY",
            Self::ToolDisabled => "TOOL_DISABLED",
            Self::ToolRunning => "TOOL_RUNNING",
            Self::CtrlNotReady => "CTRL_NOT_READY",
            Self::AlarmActive => "ALARM_ACTIVE",
            Self::VinRequired => "VIN_REQUIRED",
            Self::JobNotActive => "JOB_NOT_ACTIVE",
        }
    }
}

/// Rules 1–2: a connected, handshaken link. Required by every command.
pub fn check_link(state: &ClientState) -> Result<(), InterlockError> {
    if !state.connection.connected {
        return Err(InterlockError::NotConnected);
    }
    if !state.connection.link_ready {
        return Err(InterlockError::LinkNotReady);
    }
    Ok(())
}

/// The full gate for `start_tightening`, rules 1–8 in order.
pub fn check_start(state: &ClientState) -> Result<(), InterlockError> {
    check_link(state)?;
    if !state.tool.enabled {
        return Err(InterlockError::ToolDisabled);
    }
    if state.tool.running {
        return Err(InterlockError::ToolRunning);
    }
    if !state.controller.ready {
        return Err(InterlockError::CtrlNotReady);
    }
    if state.controller.error_active {
        return Err(InterlockError::AlarmActive);
    }
    if state.product.vin_required && !state.product.vin_valid {
        return Err(InterlockError::VinRequired);
    }
    if !state.job.active {
        return Err(InterlockError::JobNotActive);
    }
    Ok(())
}
