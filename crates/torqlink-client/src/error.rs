use crate::interlock::InterlockError;

/// Errors returned synchronously by client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A safety interlock rejected the command before any bytes were sent.
    #[error("interlock violation: {0}")]
    Interlock(#[from] InterlockError),

    /// A command with this MID is already awaiting its acknowledgement.
    #[error("command already pending for MID {mid:04}")]
    DuplicateCommand { mid: u16 },

    /// Send-time argument validation failed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation needs an open socket.
    #[error("not connected")]
    NotConnected,

    /// Frame encoding failed.
    #[error(transparent)]
    Frame(#[from] torqlink_frame::FrameError),

    /// Socket-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
