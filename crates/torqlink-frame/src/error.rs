/// Errors that can occur while encoding frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The encoded frame would exceed the 4-digit length field.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
