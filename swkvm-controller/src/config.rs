//! Controller configuration: devices, peers, the hotkey table, and the
//! optional encryption envelope. Mirrors `controller.config.h`'s compile-time
//! constants, loaded from TOML instead.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use swkvm_wire::CONTEXT_LEN;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("encryption context must be at most {CONTEXT_LEN} bytes, got {0}")]
    ContextTooLong(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub device_path: String,
    pub device_id: u32,
}

/// Where a peer's datagram endpoint lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PeerTransportConfig {
    Network { address: String, port: u16 },
    Unix { path: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub transport: PeerTransportConfig,
    /// Shell command run (through a system shell) after this peer becomes
    /// active. Failure is logged, not fatal. This is a trust boundary, not a
    /// bug: the command string is configuration, not attacker input.
    #[serde(default)]
    pub postswitch_command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotkeyConfig {
    /// The controller `device_id` whose key events drive the switch.
    pub switchable_device: u32,
    pub switch_modifier: u16,
    pub switch_key: u16,
    #[serde(default)]
    pub passthrough_keys: Vec<u16>,
    #[serde(default)]
    pub passthrough_client: usize,
}

fn default_context() -> String {
    "!INMPX!".to_string()
}

fn default_time_division() -> u64 {
    2
}

fn default_key_path() -> PathBuf {
    PathBuf::from("./key")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,
    #[serde(default = "default_context")]
    pub context: String,
    #[serde(default = "default_time_division")]
    pub time_division: u64,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        CryptoConfig {
            enabled: false,
            key_path: default_key_path(),
            context: default_context(),
            time_division: default_time_division(),
        }
    }
}

impl CryptoConfig {
    /// The context string padded with trailing zero bytes to `CONTEXT_LEN`,
    /// matching the original's null-padded fixed-size C array.
    pub fn context_bytes(&self) -> Result<[u8; CONTEXT_LEN], ConfigError> {
        let raw = self.context.as_bytes();
        if raw.len() > CONTEXT_LEN {
            return Err(ConfigError::ContextTooLong(raw.len()));
        }
        let mut bytes = [0u8; CONTEXT_LEN];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(bytes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub devices: Vec<DeviceConfig>,
    pub peers: Vec<PeerConfig>,
    pub hotkey: HotkeyConfig,
    #[serde(default)]
    pub crypto: CryptoConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        // KBRD device id, KEY_RIGHTCTRL + KEY_SCROLLLOCK as the switch chord,
        // KEY_RIGHTMETA always passed through to peer 0.
        ControllerConfig {
            devices: vec![DeviceConfig {
                device_path: "/dev/input/by-id/example-kbd-event-kbd".to_string(),
                device_id: 0x4B425244,
            }],
            peers: vec![PeerConfig {
                transport: PeerTransportConfig::Network {
                    address: "127.0.0.1".to_string(),
                    port: 63333,
                },
                postswitch_command: Some("ddcutil --bus=2 setvcp 60 0x0F".to_string()),
            }],
            hotkey: HotkeyConfig {
                switchable_device: 0x4B425244,
                switch_modifier: 97,  // KEY_RIGHTCTRL
                switch_key: 70,       // KEY_SCROLLLOCK
                passthrough_keys: vec![126], // KEY_RIGHTMETA
                passthrough_client: 0,
            },
            crypto: CryptoConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn default_path() -> PathBuf {
        PathBuf::from("/etc/swkvm/controller.toml")
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips() {
        let config = ControllerConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ControllerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.devices.len(), config.devices.len());
        assert_eq!(parsed.hotkey.switch_key, config.hotkey.switch_key);
    }

    #[test]
    fn context_bytes_are_zero_padded() {
        let crypto = CryptoConfig::default();
        let bytes = crypto.context_bytes().unwrap();
        assert_eq!(&bytes[..7], b"!INMPX!");
        assert_eq!(bytes[7], 0);
    }

    #[test]
    fn context_too_long_is_rejected() {
        let crypto = CryptoConfig {
            context: "nine-byte".to_string(),
            ..CryptoConfig::default()
        };
        assert!(matches!(crypto.context_bytes(), Err(ConfigError::ContextTooLong(9))));
    }

    #[test]
    fn network_transport_round_trips() {
        let toml_str = r#"
            type = "network"
            address = "0.0.0.0"
            port = 63333
        "#;
        let parsed: PeerTransportConfig = toml::from_str(toml_str).unwrap();
        assert!(matches!(parsed, PeerTransportConfig::Network { port: 63333, .. }));
    }

    #[test]
    fn unix_transport_round_trips() {
        let toml_str = r#"
            type = "unix"
            path = "/tmp/inmpx-controlled.socket"
        "#;
        let parsed: PeerTransportConfig = toml::from_str(toml_str).unwrap();
        assert!(matches!(parsed, PeerTransportConfig::Unix { .. }));
    }
}
