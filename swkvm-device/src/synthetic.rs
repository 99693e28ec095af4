//! Synthetic uinput devices that replay decoded frames.
//!
//! A device's capability set is an explicit map from event type to the set of
//! codes declared for that type, rather than the controlled configuration's
//! original parallel-array-with-sentinels encoding — the wire behavior is
//! unaffected, only how a configuration author writes the table down.
//!
//! Capabilities are limited to `EV_KEY`, `EV_REL`, and `EV_ABS`; `evdev`'s
//! uinput builder has no method to declare `EV_MSC` capabilities (it also has
//! none for LEDs), so a device that needs to mirror scan codes cannot declare
//! that type here. This is a documented limitation, not an oversight.

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AbsInfo, AbsoluteAxisType, AttributeSet, EventType, InputEvent, Key, RelativeAxisType, UinputAbsSetup};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyntheticDeviceError {
    #[error("failed to create synthetic device {name}: {source}")]
    Create {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to symlink {symlink} to synthetic device {name}: {source}")]
    Symlink {
        name: String,
        symlink: String,
        #[source]
        source: std::io::Error,
    },
    #[error("event ({event_type:?}, {event_code}) is not declared for device {name}")]
    Uncapable {
        name: String,
        event_type: u16,
        event_code: u16,
    },
    #[error("failed to emit event on device {name}: {source}")]
    Write {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// The absolute-axis range used for any declared absolute axis. Spec leaves
/// this to the implementer; full `i32` range needs no clamping logic beyond
/// what the device's own semantics require.
const ABS_MIN: i32 = i32::MIN;
const ABS_MAX: i32 = i32::MAX;

/// Explicit per-type capability declaration for one synthetic device.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub keys: Vec<u16>,
    pub relative_axes: Vec<u16>,
    pub absolute_axes: Vec<u16>,
}

impl Capabilities {
    pub fn declares(&self, event_type: u16, event_code: u16) -> bool {
        match EventType(event_type) {
            EventType::SYNCHRONIZATION => true,
            EventType::KEY => self.keys.contains(&event_code),
            EventType::RELATIVE => self.relative_axes.contains(&event_code),
            EventType::ABSOLUTE => self.absolute_axes.contains(&event_code),
            _ => false,
        }
    }
}

/// A synthetic device created for one configured `device_id`.
pub struct SyntheticDevice {
    name: String,
    device_id: u32,
    capabilities: Capabilities,
    device: VirtualDevice,
}

impl SyntheticDevice {
    pub fn create(
        name: &str,
        device_id: u32,
        capabilities: Capabilities,
        symlink: Option<&str>,
    ) -> Result<Self, SyntheticDeviceError> {
        let mut builder = VirtualDeviceBuilder::new()
            .map_err(|source| SyntheticDeviceError::Create {
                name: name.to_string(),
                source,
            })?
            .name(name);

        if !capabilities.keys.is_empty() {
            let mut keys = AttributeSet::<Key>::new();
            for &code in &capabilities.keys {
                keys.insert(Key::new(code));
            }
            builder = builder.with_keys(&keys).map_err(|source| SyntheticDeviceError::Create {
                name: name.to_string(),
                source,
            })?;
        }

        if !capabilities.relative_axes.is_empty() {
            let mut axes = AttributeSet::<RelativeAxisType>::new();
            for &code in &capabilities.relative_axes {
                axes.insert(RelativeAxisType(code));
            }
            builder = builder
                .with_relative_axes(&axes)
                .map_err(|source| SyntheticDeviceError::Create {
                    name: name.to_string(),
                    source,
                })?;
        }

        for &code in &capabilities.absolute_axes {
            let setup = UinputAbsSetup::new(
                AbsoluteAxisType(code),
                AbsInfo::new(0, ABS_MIN, ABS_MAX, 0, 0, 1),
            );
            builder = builder
                .with_absolute_axis(&setup)
                .map_err(|source| SyntheticDeviceError::Create {
                    name: name.to_string(),
                    source,
                })?;
        }

        let mut device = builder.build().map_err(|source| SyntheticDeviceError::Create {
            name: name.to_string(),
            source,
        })?;

        // Symlinks to synthetic devices are not removed on shutdown; see
        // SyntheticDeviceSet::drop.
        if let Some(link) = symlink {
            if let Some(node) = device
                .enumerate_dev_nodes_blocking()
                .ok()
                .and_then(|mut it| it.next())
                .and_then(|n| n.ok())
            {
                std::os::unix::fs::symlink(&node, link).map_err(|source| SyntheticDeviceError::Symlink {
                    name: name.to_string(),
                    symlink: link.to_string(),
                    source,
                })?;
            }
        }

        Ok(SyntheticDevice {
            name: name.to_string(),
            device_id,
            capabilities,
            device,
        })
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    /// Emit one decoded event. Rejects anything outside the declared
    /// capability set per the peer's capability gate invariant.
    pub fn replay(&mut self, event_type: u32, event_code: u32, event_value: i32) -> Result<(), SyntheticDeviceError> {
        let event_type = event_type as u16;
        let event_code = event_code as u16;

        if !self.capabilities.declares(event_type, event_code) {
            return Err(SyntheticDeviceError::Uncapable {
                name: self.name.clone(),
                event_type,
                event_code,
            });
        }

        let event = InputEvent::new(EventType(event_type), event_code, event_value);
        self.device.emit(&[event]).map_err(|source| SyntheticDeviceError::Write {
            name: self.name.clone(),
            source,
        })
    }
}

/// The set of synthetic devices a peer process owns, looked up by
/// `device_id` on replay (linear scan; the device count is small).
pub struct SyntheticDeviceSet {
    devices: Vec<SyntheticDevice>,
}

impl SyntheticDeviceSet {
    pub fn new(devices: Vec<SyntheticDevice>) -> Self {
        SyntheticDeviceSet { devices }
    }

    pub fn find_mut(&mut self, device_id: u32) -> Option<&mut SyntheticDevice> {
        self.devices.iter_mut().find(|d| d.device_id() == device_id)
    }
}

/// Sample descriptors used to build example/test capability tables; mirrors
/// the original configuration's default keyboard and mouse devices.
pub fn example_keyboard_capabilities() -> Capabilities {
    Capabilities {
        keys: (1u16..=88).collect(),
        relative_axes: Vec::new(),
        absolute_axes: Vec::new(),
    }
}

pub fn example_mouse_capabilities() -> Capabilities {
    use evdev::{Key as K, RelativeAxisType as R};
    Capabilities {
        keys: vec![K::BTN_LEFT.code(), K::BTN_RIGHT.code(), K::BTN_MIDDLE.code()],
        relative_axes: vec![R::REL_X.0, R::REL_Y.0, R::REL_WHEEL.0],
        absolute_axes: Vec::new(),
    }
}
