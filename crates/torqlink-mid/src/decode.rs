use torqlink_frame::Frame;

use crate::error::Result;
use crate::fields::{byte, centi, flag, num, require, text};
use crate::mids;
use crate::types::{Alarm, TighteningResult};

/// A typed inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// MID 0003 (or the MID 0002 alias some firmware emits).
    CommStartAck { revision: u8 },
    /// MID 0004.
    CommandError {
        failed_mid: u16,
        error_code: u16,
        message: String,
    },
    /// MID 0005.
    CommandAccepted { accepted_mid: u16 },
    /// MID 0011.
    ParamSetReply { param_set_id: u16 },
    /// MID 0021 pushed by the controller after a decrement.
    BatchDecremented,
    /// MID 0031.
    BatchReply {
        batch_id: u32,
        size: u32,
        counter: u32,
    },
    /// MID 0035.
    JobReply {
        job_id: u16,
        param_set_id: Option<u16>,
    },
    /// MID 0041.
    ToolStatus {
        controller_ready: bool,
        tool_enabled: bool,
        tool_running: bool,
        alarm_active: bool,
    },
    /// MID 0051.
    VinReply { vin: String },
    /// MID 0052.
    VinRequired { vin: String },
    /// MID 0061.
    Result(TighteningResult),
    /// MID 0065.
    OldResult(TighteningResult),
    /// MID 0070.
    Alarm(Alarm),
    /// MID 0076.
    AlarmStatus { active: bool, code: Option<String> },
    /// MID 0101.
    MultiSpindleComplete { spindle_count: u8 },
    /// Any MID the client has no projection for.
    Unknown { mid: u16 },
}

/// Decode a frame into a typed inbound message.
///
/// `declared_revision` is the protocol revision the controller declared at
/// communication start; it drives result-payload dispatch whenever the
/// frame header leaves its revision field blank.
pub fn decode_inbound(frame: &Frame, declared_revision: u8) -> Result<Inbound> {
    let payload = frame.payload.as_ref();
    let mid = frame.mid;

    let inbound = match mid {
        mids::COMM_STOP | mids::COMM_START_ACK => Inbound::CommStartAck {
            revision: ack_revision(payload),
        },
        mids::COMMAND_ERROR => {
            require(payload, 6, mid)?;
            Inbound::CommandError {
                failed_mid: num(payload, 0..4, mid, "failed_mid")? as u16,
                error_code: num(payload, 4..6, mid, "error_code")? as u16,
                message: text(payload, 6..payload.len()),
            }
        }
        mids::COMMAND_ACCEPTED => Inbound::CommandAccepted {
            accepted_mid: num(payload, 0..4, mid, "accepted_mid")? as u16,
        },
        mids::PSET_REPLY => Inbound::ParamSetReply {
            param_set_id: num(payload, 0..3, mid, "param_set_id")? as u16,
        },
        mids::BATCH_DECREMENT => Inbound::BatchDecremented,
        mids::BATCH_REPLY => Inbound::BatchReply {
            batch_id: num(payload, 0..4, mid, "batch_id")?,
            size: num(payload, 4..8, mid, "size")?,
            counter: num(payload, 8..12, mid, "counter")?,
        },
        mids::JOB_REPLY => Inbound::JobReply {
            job_id: num(payload, 0..4, mid, "job_id")? as u16,
            param_set_id: if payload.len() >= 7 {
                Some(num(payload, 4..7, mid, "param_set_id")? as u16)
            } else {
                None
            },
        },
        mids::TOOL_STATUS => Inbound::ToolStatus {
            controller_ready: flag(payload, 0, mid)?,
            tool_enabled: flag(payload, 1, mid)?,
            tool_running: flag(payload, 2, mid)?,
            alarm_active: flag(payload, 3, mid)?,
        },
        mids::VIN_REPLY => Inbound::VinReply {
            vin: text(payload, 0..25),
        },
        mids::VIN_REQUIRED => Inbound::VinRequired {
            vin: text(payload, 0..25),
        },
        mids::RESULT => Inbound::Result(decode_result(frame, declared_revision)?),
        mids::OLD_RESULT => Inbound::OldResult(decode_result(frame, declared_revision)?),
        mids::ALARM => {
            require(payload, 1, mid)?;
            Inbound::Alarm(Alarm {
                code: text(payload, 0..6),
                message: text(payload, 6..payload.len()),
            })
        }
        mids::ALARM_STATUS => {
            let active = flag(payload, 0, mid)?;
            let code = text(payload, 1..7);
            Inbound::AlarmStatus {
                active,
                code: (!code.is_empty()).then_some(code),
            }
        }
        mids::MULTI_SPINDLE_STATUS => Inbound::MultiSpindleComplete {
            spindle_count: num(payload, 0..2, mid, "spindle_count")? as u8,
        },
        other => Inbound::Unknown { mid: other },
    };

    Ok(inbound)
}

/// Communication start ack payload: the controller's protocol revision as
/// bare decimal digits. Empty or blank payloads mean revision 1.
fn ack_revision(payload: &[u8]) -> u8 {
    let digits: String = text(payload, 0..payload.len())
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u8>().unwrap_or(1).clamp(1, 6)
}

fn decode_result(frame: &Frame, declared_revision: u8) -> Result<TighteningResult> {
    // The header revision wins when present; blank headers fall back to
    // the revision declared at communication start.
    let revision = if frame.revision >= 1 {
        frame.revision.min(u16::from(u8::MAX)) as u8
    } else {
        declared_revision.max(1)
    };

    match revision {
        1 => decode_result_rev1(frame),
        2 | 3 => decode_result_rev23(frame),
        _ => decode_result_rev4(frame),
    }
}

/// Revision 1: measurement only. The spindle number is not in the payload;
/// it rides in the frame header's spindle field.
fn decode_result_rev1(frame: &Frame) -> Result<TighteningResult> {
    let payload = frame.payload.as_ref();
    let mid = frame.mid;
    require(payload, 24, mid)?;

    let spindle = if frame.spindle == 0 { 1 } else { frame.spindle };
    let mut result = TighteningResult::base(
        text(payload, 0..10),
        spindle,
        centi(payload, 10..16, mid, "torque")?,
        f64::from(num(payload, 16..22, mid, "angle")?),
    );
    result.torque_ok = flag(payload, 22, mid)?;
    result.angle_ok = flag(payload, 23, mid)?;
    result.ok = result.torque_ok && result.angle_ok;
    Ok(result)
}

/// Revisions 2 and 3 share a layout: measurement plus limits, timestamp,
/// and traceability context.
fn decode_result_rev23(frame: &Frame) -> Result<TighteningResult> {
    let payload = frame.payload.as_ref();
    let mid = frame.mid;
    require(payload, 95, mid)?;

    let spindle = num(payload, 10..12, mid, "spindle")? as u8;
    let mut result = TighteningResult::base(
        text(payload, 0..10),
        if spindle == 0 { 1 } else { spindle },
        centi(payload, 12..18, mid, "torque")?,
        f64::from(num(payload, 18..24, mid, "angle")?),
    );
    result.torque_min = Some(centi(payload, 24..30, mid, "torque_min")?);
    result.torque_max = Some(centi(payload, 30..36, mid, "torque_max")?);
    result.torque_final = Some(centi(payload, 36..42, mid, "torque_final")?);
    result.torque_ok = flag(payload, 42, mid)?;
    result.angle_ok = flag(payload, 43, mid)?;
    result.ok = result.torque_ok && result.angle_ok;
    result.timestamp = Some(text(payload, 44..63));
    result.batch_status = Some(char::from(byte(payload, 49, mid)?));
    result.vin = Some(text(payload, 63..88));
    result.job_id = Some(num(payload, 88..92, mid, "job_id")? as u16);
    result.param_set_id = Some(num(payload, 92..95, mid, "param_set_id")? as u16);
    Ok(result)
}

/// Revision 4 (and later): cell context, full limit windows, and an
/// authoritative overall-status byte. Spindle defaults to 1.
fn decode_result_rev4(frame: &Frame) -> Result<TighteningResult> {
    let payload = frame.payload.as_ref();
    let mid = frame.mid;
    require(payload, 167, mid)?;

    let mut result = TighteningResult::base(
        text(payload, 157..167),
        1,
        centi(payload, 92..98, mid, "torque")?,
        f64::from(num(payload, 113..118, mid, "angle")?),
    );
    result.cell_id = Some(num(payload, 0..4, mid, "cell_id")? as u16);
    result.channel_id = Some(num(payload, 4..6, mid, "channel_id")? as u8);
    result.controller_name = Some(text(payload, 6..31));
    result.vin = Some(text(payload, 31..56));
    result.job_id = Some(num(payload, 56..60, mid, "job_id")? as u16);
    result.param_set_id = Some(num(payload, 60..63, mid, "param_set_id")? as u16);
    result.batch_size = Some(num(payload, 63..67, mid, "batch_size")?);
    result.batch_counter = Some(num(payload, 67..71, mid, "batch_counter")?);
    result.ok = flag(payload, 71, mid)?;
    result.torque_ok = flag(payload, 72, mid)?;
    result.angle_ok = flag(payload, 73, mid)?;
    result.torque_min = Some(centi(payload, 74..80, mid, "torque_min")?);
    result.torque_max = Some(centi(payload, 80..86, mid, "torque_max")?);
    result.torque_target = Some(centi(payload, 86..92, mid, "torque_target")?);
    result.angle_min = Some(f64::from(num(payload, 98..103, mid, "angle_min")?));
    result.angle_max = Some(f64::from(num(payload, 103..108, mid, "angle_max")?));
    result.angle_target = Some(f64::from(num(payload, 108..113, mid, "angle_target")?));
    result.timestamp = Some(text(payload, 118..137));
    result.last_pset_change = Some(text(payload, 137..156));
    result.batch_status = Some(char::from(byte(payload, 156, mid)?));
    Ok(result)
}
