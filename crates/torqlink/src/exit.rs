use std::fmt;
use std::io;

use torqlink_client::{ClientError, InterlockError};

// Exit code taxonomy shared with the line-side tooling.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const INTERLOCKED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Interlock(violation) => interlock_error(violation),
        ClientError::InvalidArgument(_) => CliError::new(USAGE, format!("{context}: {err}")),
        ClientError::DuplicateCommand { .. } | ClientError::NotConnected => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        ClientError::Frame(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        ClientError::Io(source) => io_error(context, source),
    }
}

pub fn interlock_error(violation: InterlockError) -> CliError {
    CliError::new(INTERLOCKED, violation.to_string())
}
