use bytes::BytesMut;
use torqlink_frame::encode_frame;

use crate::mids;

/// An outbound message ready for framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub mid: u16,
    pub payload: Vec<u8>,
    /// Whether the controller is asked to acknowledge (MID 0005/0004).
    pub expect_ack: bool,
}

impl Outbound {
    fn bare(mid: u16) -> Self {
        Self {
            mid,
            payload: Vec::new(),
            expect_ack: true,
        }
    }

    /// MID 0001: open the application link.
    pub fn comm_start() -> Self {
        Self::bare(mids::COMM_START)
    }

    /// MID 0002: close the application link.
    pub fn comm_stop() -> Self {
        Self::bare(mids::COMM_STOP)
    }

    /// MID 0018: select a parameter set.
    pub fn select_param_set(id: u16) -> Self {
        Self {
            mid: mids::PSET_SELECT,
            payload: format!("{id:03}").into_bytes(),
            expect_ack: true,
        }
    }

    /// MID 0020: reset the batch counter.
    pub fn reset_batch() -> Self {
        Self::bare(mids::BATCH_RESET)
    }

    /// MID 0021: decrement the batch counter.
    pub fn decrement_batch() -> Self {
        Self::bare(mids::BATCH_DECREMENT)
    }

    /// MID 0034: select a job.
    pub fn select_job(id: u16) -> Self {
        Self {
            mid: mids::JOB_SELECT,
            payload: format!("{id:04}").into_bytes(),
            expect_ack: true,
        }
    }

    /// MID 0042: enable the tool.
    pub fn enable_tool() -> Self {
        Self::bare(mids::TOOL_ENABLE)
    }

    /// MID 0043: start a tightening.
    pub fn start_tightening() -> Self {
        Self::bare(mids::TOOL_START)
    }

    /// MID 0045: disable the tool.
    pub fn disable_tool() -> Self {
        Self::bare(mids::TOOL_DISABLE)
    }

    /// MID 0050: download a VIN, space-padded to 25 characters.
    ///
    /// Length validation happens at the client surface; this pads.
    pub fn download_vin(vin: &str) -> Self {
        Self {
            mid: mids::VIN_DOWNLOAD,
            payload: format!("{vin:<25}").into_bytes(),
            expect_ack: true,
        }
    }

    /// MID 0060: subscribe to tightening results.
    pub fn subscribe_results() -> Self {
        Self::bare(mids::RESULT_SUBSCRIBE)
    }

    /// MID 0063: unsubscribe from tightening results.
    pub fn unsubscribe_results() -> Self {
        Self::bare(mids::RESULT_UNSUBSCRIBE)
    }

    /// MID 0062: acknowledge a tightening result. Never tracked; the
    /// controller does not respond to it.
    pub fn result_ack() -> Self {
        Self {
            mid: mids::RESULT_ACK,
            payload: Vec::new(),
            expect_ack: false,
        }
    }

    /// MID 0070: subscribe to alarms.
    pub fn subscribe_alarms() -> Self {
        Self::bare(mids::ALARM)
    }

    /// MID 0073: unsubscribe from alarms.
    pub fn unsubscribe_alarms() -> Self {
        Self::bare(mids::ALARM_UNSUBSCRIBE)
    }

    /// MID 0078: acknowledge the active alarm.
    pub fn acknowledge_alarm() -> Self {
        Self::bare(mids::ALARM_ACK)
    }

    /// MID 9999: keep-alive, sent without acknowledgement.
    pub fn keep_alive() -> Self {
        Self {
            mid: mids::KEEP_ALIVE,
            payload: Vec::new(),
            expect_ack: false,
        }
    }

    /// Frame this message for the wire.
    pub fn encode(&self, dst: &mut BytesMut) -> torqlink_frame::Result<()> {
        encode_frame(self.mid, &self.payload, self.expect_ack, dst)
    }
}
