//! Ambient server configuration, read once at assembly time.

use mcpkit_protocol::SUPPORTED_PROTOCOL_VERSIONS;

/// Configuration governing which protocol versions `initialize` accepts
/// and how large an incoming message may be.
///
/// Read once when a `Server` is assembled; the core pipeline itself
/// does not mutate or re-read it.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Protocol versions accepted by `initialize` (`spec.md` §6).
    pub accepted_protocol_versions: Vec<String>,
    /// Maximum accepted size, in bytes, of a single wire message.
    /// Transports MAY reject larger lines before they reach the dispatcher.
    pub max_message_size_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            accepted_protocol_versions: SUPPORTED_PROTOCOL_VERSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_message_size_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// The framework's fixed default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff `version` is in this configuration's accepted set.
    pub fn accepts_protocol_version(&self, version: &str) -> bool {
        self.accepted_protocol_versions.iter().any(|v| v == version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_accepts_every_supported_version() {
        let config = ServerConfig::default();
        for version in SUPPORTED_PROTOCOL_VERSIONS {
            assert!(config.accepts_protocol_version(version));
        }
        assert!(!config.accepts_protocol_version("1.0.0"));
    }
}
