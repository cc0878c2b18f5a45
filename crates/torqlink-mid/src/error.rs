/// Errors raised while parsing a MID payload.
///
/// These are always recoverable: the connection stays up and the client
/// surfaces the failure as a parse-error event.
#[derive(Debug, thiserror::Error)]
pub enum MidError {
    /// The payload is shorter than the layout for this MID/revision.
    #[error("MID {mid:04} payload truncated (need {need} bytes, got {got})")]
    Truncated { mid: u16, need: usize, got: usize },

    /// A numeric field contains non-digit characters.
    #[error("MID {mid:04} field '{field}' is not numeric")]
    BadNumber { mid: u16, field: &'static str },
}

pub type Result<T> = std::result::Result<T, MidError>;
