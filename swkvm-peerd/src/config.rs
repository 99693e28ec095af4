//! Controlled-side configuration: which synthetic devices to expose, what
//! capabilities each declares, and where to listen for frames. Mirrors
//! `controlled.config.h`'s compile-time device table, with the
//! parallel-array-with-sentinels capability encoding replaced by explicit
//! key/axis lists.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use swkvm_device::Capabilities;
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

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CapabilitiesConfig {
    #[serde(default)]
    pub keys: Vec<u16>,
    #[serde(default)]
    pub relative_axes: Vec<u16>,
    #[serde(default)]
    pub absolute_axes: Vec<u16>,
}

impl From<CapabilitiesConfig> for Capabilities {
    fn from(config: CapabilitiesConfig) -> Self {
        Capabilities {
            keys: config.keys,
            relative_axes: config.relative_axes,
            absolute_axes: config.absolute_axes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub device_name: String,
    pub device_id: u32,
    pub capabilities: CapabilitiesConfig,
    /// Symlink created at the uinput device's dev node. Not removed on
    /// shutdown, matching the original's documented limitation.
    #[serde(default)]
    pub symlink_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ListenConfig {
    Network {
        address: String,
        port: u16,
    },
    Unix {
        path: String,
        #[serde(default)]
        mode: Option<u32>,
        #[serde(default)]
        owner: Option<u32>,
        #[serde(default)]
        group: Option<u32>,
    },
}

fn default_context() -> String {
    "!INMPX!".to_string()
}

fn default_time_division() -> u64 {
    1
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
pub struct PeerdConfig {
    pub devices: Vec<DeviceConfig>,
    pub listen: ListenConfig,
    #[serde(default)]
    pub crypto: CryptoConfig,
}

fn example_keyboard() -> DeviceConfig {
    DeviceConfig {
        device_name: "inmpx keyboard".to_string(),
        device_id: 0x4B425244,
        capabilities: CapabilitiesConfig {
            keys: (1u16..=88).collect(),
            relative_axes: Vec::new(),
            absolute_axes: Vec::new(),
        },
        symlink_path: Some("/dev/input/inmpx-kbrd".to_string()),
    }
}

fn example_mouse() -> DeviceConfig {
    DeviceConfig {
        device_name: "inmpx mouse".to_string(),
        device_id: 0x4D4F5553,
        capabilities: CapabilitiesConfig {
            keys: vec![272, 273, 274], // BTN_LEFT, BTN_RIGHT, BTN_MIDDLE
            relative_axes: vec![0, 1, 8], // REL_X, REL_Y, REL_WHEEL
            absolute_axes: Vec::new(),
        },
        symlink_path: Some("/dev/input/inmpx-mous".to_string()),
    }
}

impl Default for PeerdConfig {
    fn default() -> Self {
        PeerdConfig {
            devices: vec![example_keyboard(), example_mouse()],
            listen: ListenConfig::Network {
                address: "0.0.0.0".to_string(),
                port: 63333,
            },
            crypto: CryptoConfig::default(),
        }
    }
}

impl PeerdConfig {
    pub fn default_path() -> PathBuf {
        PathBuf::from("/etc/swkvm/peerd.toml")
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
        let config = PeerdConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: PeerdConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.devices.len(), config.devices.len());
        assert_eq!(parsed.devices[0].device_id, config.devices[0].device_id);
    }

    #[test]
    fn context_bytes_are_zero_padded() {
        let crypto = CryptoConfig::default();
        let bytes = crypto.context_bytes().unwrap();
        assert_eq!(&bytes[..7], b"!INMPX!");
        assert_eq!(bytes[7], 0);
    }

    #[test]
    fn network_listen_round_trips() {
        let toml_str = r#"
            type = "network"
            address = "0.0.0.0"
            port = 63333
        "#;
        let parsed: ListenConfig = toml::from_str(toml_str).unwrap();
        assert!(matches!(parsed, ListenConfig::Network { port: 63333, .. }));
    }

    #[test]
    fn unix_listen_round_trips_with_optional_ownership() {
        let toml_str = r#"
            type = "unix"
            path = "/tmp/inmpx-controlled.socket"
            mode = 384
            owner = 0
            group = 0
        "#;
        let parsed: ListenConfig = toml::from_str(toml_str).unwrap();
        match parsed {
            ListenConfig::Unix { mode, owner, group, .. } => {
                assert_eq!(mode, Some(384));
                assert_eq!(owner, Some(0));
                assert_eq!(group, Some(0));
            }
            _ => panic!("expected unix listen config"),
        }
    }

    #[test]
    fn capabilities_config_converts_into_device_capabilities() {
        let config = CapabilitiesConfig {
            keys: vec![1, 2],
            relative_axes: vec![0],
            absolute_axes: Vec::new(),
        };
        let caps: Capabilities = config.into();
        assert!(caps.declares(1, 1));
        assert!(caps.declares(2, 0));
    }
}
