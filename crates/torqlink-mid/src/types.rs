use serde::{Deserialize, Serialize};

/// One spindle's tightening result.
///
/// A superset of the revision 1, 2/3, and 4 payloads of MID 0061/0065;
/// fields absent from the controller's revision are `None`. Torque values
/// are Nm (the wire carries centi-Nm), angles are degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TighteningResult {
    pub tightening_id: String,
    pub spindle: u8,
    /// Measured torque, Nm.
    pub torque: f64,
    /// Measured angle, degrees.
    pub angle: f64,
    pub torque_min: Option<f64>,
    pub torque_max: Option<f64>,
    /// Final target torque (revision 2/3).
    pub torque_final: Option<f64>,
    /// Target torque (revision 4).
    pub torque_target: Option<f64>,
    pub angle_min: Option<f64>,
    pub angle_max: Option<f64>,
    pub angle_target: Option<f64>,
    pub torque_ok: bool,
    pub angle_ok: bool,
    /// Overall verdict. Revision 4 carries this explicitly; earlier
    /// revisions derive it from the torque and angle statuses.
    pub ok: bool,
    pub timestamp: Option<String>,
    pub last_pset_change: Option<String>,
    pub batch_status: Option<char>,
    pub vin: Option<String>,
    pub job_id: Option<u16>,
    pub param_set_id: Option<u16>,
    pub batch_size: Option<u32>,
    pub batch_counter: Option<u32>,
    pub cell_id: Option<u16>,
    pub channel_id: Option<u8>,
    pub controller_name: Option<String>,
}

impl TighteningResult {
    /// A result with only the universal fields set; everything else is
    /// `None`/false. Revision decoders (and simulators) fill in the rest.
    pub fn base(tightening_id: String, spindle: u8, torque: f64, angle: f64) -> Self {
        Self {
            tightening_id,
            spindle,
            torque,
            angle,
            torque_min: None,
            torque_max: None,
            torque_final: None,
            torque_target: None,
            angle_min: None,
            angle_max: None,
            angle_target: None,
            torque_ok: false,
            angle_ok: false,
            ok: false,
            timestamp: None,
            last_pset_change: None,
            batch_status: None,
            vin: None,
            job_id: None,
            param_set_id: None,
            batch_size: None,
            batch_counter: None,
            cell_id: None,
            channel_id: None,
            controller_name: None,
        }
    }
}

/// An active alarm reported by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub code: String,
    pub message: String,
}
