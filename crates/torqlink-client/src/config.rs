/// Default Open Protocol TCP port.
pub const DEFAULT_PORT: u16 = 4545;

/// Client configuration.
///
/// Only `host` has no default. Controllers that front a fixed-head
/// multi-spindle tool should set `spindle_count` so cycle aggregation does
/// not depend on the controller reporting it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Controller hostname or address.
    pub host: String,
    /// Controller port.
    pub port: u16,
    /// Reconnect automatically after an unexpected disconnect.
    pub auto_reconnect: bool,
    /// Surface frame-level defects as events. Resynchronization happens
    /// either way.
    pub validate_frames: bool,
    /// Fixed spindle count. Overrides anything the controller reports.
    pub spindle_count: Option<u8>,
    /// Allow several in-flight commands with the same MID.
    pub allow_duplicate_commands: bool,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            auto_reconnect: true,
            validate_frames: true,
            spindle_count: None,
            allow_duplicate_commands: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::new("10.0.0.7");
        assert_eq!(config.host, "10.0.0.7");
        assert_eq!(config.port, 4545);
        assert!(config.auto_reconnect);
        assert!(config.validate_frames);
        assert!(config.spindle_count.is_none());
        assert!(!config.allow_duplicate_commands);
    }
}
