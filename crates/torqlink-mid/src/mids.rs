//! Message identifiers used by the client.
//!
//! Inbound and outbound MIDs overlap: 0002 is the outbound communication
//! stop, but some controller firmware also emits it as a communication
//! start acknowledge (the documented ack is 0003). 0070 doubles as the
//! alarm report and the alarm subscription request.

/// Communication start (outbound).
pub const COMM_START: u16 = 1;
/// Communication stop (outbound); also emitted by some firmware as a
/// communication start acknowledge.
pub const COMM_STOP: u16 = 2;
/// Communication start acknowledge (inbound).
pub const COMM_START_ACK: u16 = 3;
/// Command error (inbound).
pub const COMMAND_ERROR: u16 = 4;
/// Command accepted (inbound).
pub const COMMAND_ACCEPTED: u16 = 5;
/// Parameter set reply (inbound).
pub const PSET_REPLY: u16 = 11;
/// Select parameter set (outbound).
pub const PSET_SELECT: u16 = 18;
/// Reset batch counter (outbound).
pub const BATCH_RESET: u16 = 20;
/// Decrement batch counter (outbound); also pushed by controllers as a
/// decrement acknowledge.
pub const BATCH_DECREMENT: u16 = 21;
/// Batch reply (inbound).
pub const BATCH_REPLY: u16 = 31;
/// Select job (outbound).
pub const JOB_SELECT: u16 = 34;
/// Job reply (inbound).
pub const JOB_REPLY: u16 = 35;
/// Tool status report (inbound).
pub const TOOL_STATUS: u16 = 41;
/// Enable tool (outbound).
pub const TOOL_ENABLE: u16 = 42;
/// Start tightening (outbound).
pub const TOOL_START: u16 = 43;
/// Disable tool (outbound).
pub const TOOL_DISABLE: u16 = 45;
/// Download VIN (outbound).
pub const VIN_DOWNLOAD: u16 = 50;
/// VIN reply (inbound).
pub const VIN_REPLY: u16 = 51;
/// VIN required notification (inbound).
pub const VIN_REQUIRED: u16 = 52;
/// Subscribe to tightening results (outbound).
pub const RESULT_SUBSCRIBE: u16 = 60;
/// Last tightening result (inbound).
pub const RESULT: u16 = 61;
/// Tightening result acknowledge (outbound).
pub const RESULT_ACK: u16 = 62;
/// Unsubscribe from tightening results (outbound).
pub const RESULT_UNSUBSCRIBE: u16 = 63;
/// Old tightening result (inbound).
pub const OLD_RESULT: u16 = 65;
/// Alarm report (inbound) and alarm subscription request (outbound).
pub const ALARM: u16 = 70;
/// Unsubscribe from alarms (outbound).
pub const ALARM_UNSUBSCRIBE: u16 = 73;
/// Alarm status (inbound).
pub const ALARM_STATUS: u16 = 76;
/// Acknowledge alarm (outbound).
pub const ALARM_ACK: u16 = 78;
/// Multi-spindle status (inbound).
pub const MULTI_SPINDLE_STATUS: u16 = 101;
/// Keep-alive (outbound, never acknowledged).
pub const KEEP_ALIVE: u16 = 9999;

/// Human-readable name for a MID, for logs and CLI output.
pub fn mid_name(mid: u16) -> &'static str {
    match mid {
        COMM_START => "COMM_START",
        COMM_STOP => "COMM_STOP",
        COMM_START_ACK => "COMM_START_ACK",
        COMMAND_ERROR => "COMMAND_ERROR",
        COMMAND_ACCEPTED => "COMMAND_ACCEPTED",
        PSET_REPLY => "PSET_REPLY",
        PSET_SELECT => "PSET_SELECT",
        BATCH_RESET => "BATCH_RESET",
        BATCH_DECREMENT => "BATCH_DECREMENT",
        BATCH_REPLY => "BATCH_REPLY",
        JOB_SELECT => "JOB_SELECT",
        JOB_REPLY => "JOB_REPLY",
        TOOL_STATUS => "TOOL_STATUS",
        TOOL_ENABLE => "TOOL_ENABLE",
        TOOL_START => "TOOL_START",
        TOOL_DISABLE => "TOOL_DISABLE",
        VIN_DOWNLOAD => "VIN_DOWNLOAD",
        VIN_REPLY => "VIN_REPLY",
        VIN_REQUIRED => "VIN_REQUIRED",
        RESULT_SUBSCRIBE => "RESULT_SUBSCRIBE",
        RESULT => "RESULT",
        RESULT_ACK => "RESULT_ACK",
        RESULT_UNSUBSCRIBE => "RESULT_UNSUBSCRIBE",
        OLD_RESULT => "OLD_RESULT",
        ALARM => "ALARM",
        ALARM_UNSUBSCRIBE => "ALARM_UNSUBSCRIBE",
        ALARM_STATUS => "ALARM_STATUS",
        ALARM_ACK => "ALARM_ACK",
        MULTI_SPINDLE_STATUS => "MULTI_SPINDLE_STATUS",
        KEEP_ALIVE => "KEEP_ALIVE",
        _ => "UNKNOWN",
    }
}
