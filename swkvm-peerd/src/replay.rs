//! Builds the configured synthetic device set and replays decoded frames
//! onto it.

use crate::config::DeviceConfig;
use swkvm_device::{SyntheticDevice, SyntheticDeviceError, SyntheticDeviceSet};
use swkvm_wire::Frame;
use tracing::{error, warn};

pub fn build_devices(configs: &[DeviceConfig]) -> Result<SyntheticDeviceSet, SyntheticDeviceError> {
    let mut devices = Vec::with_capacity(configs.len());
    for config in configs {
        devices.push(SyntheticDevice::create(
            &config.device_name,
            config.device_id,
            config.capabilities.clone().into(),
            config.symlink_path.as_deref(),
        )?);
    }
    Ok(SyntheticDeviceSet::new(devices))
}

/// Replay one decoded frame onto the matching synthetic device.
///
/// An unknown `device_id` is logged and dropped — not fatal, since a stray
/// or misconfigured frame shouldn't bring down the daemon. A write failure
/// on a known device is fatal: it means the uinput device itself is gone.
pub fn replay_frame(devices: &mut SyntheticDeviceSet, frame: &Frame) -> Result<(), SyntheticDeviceError> {
    match devices.find_mut(frame.device_id) {
        Some(device) => device.replay(frame.event_type, frame.event_code, frame.event_value).map_err(|e| {
            error!("failed to write event to device, shutting down: {e}");
            e
        }),
        None => {
            warn!(device_id = format!("{:08X}", frame.device_id), "received frame for unknown device");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CapabilitiesConfig;

    fn config(device_id: u32) -> DeviceConfig {
        DeviceConfig {
            device_name: format!("test-device-{device_id}"),
            device_id,
            capabilities: CapabilitiesConfig {
                keys: vec![30],
                relative_axes: vec![],
                absolute_axes: vec![],
            },
            symlink_path: None,
        }
    }

    #[test]
    #[ignore] // requires /dev/uinput access
    fn unknown_device_id_is_not_fatal() {
        let mut devices = build_devices(&[config(1)]).unwrap();
        let frame = Frame {
            device_id: 2,
            event_type: 1,
            event_code: 30,
            event_value: 1,
        };
        assert!(replay_frame(&mut devices, &frame).is_ok());
    }
}
