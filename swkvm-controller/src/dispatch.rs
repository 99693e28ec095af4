//! Per-device reader thread and the passthrough/hotkey dispatch rule.

use crate::config::HotkeyConfig;
use crate::switch::SwitchController;
use evdev::{EventType, InputEvent};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use swkvm_device::{DeviceError, PhysicalDevice};
use swkvm_wire::Frame;
use tracing::{error, info};

/// Runs on its own thread for the lifetime of one physical device. Returns
/// once the device reports shutdown or a read error tears it down.
pub fn run_device_reader(
    device_path: &str,
    device_id: u32,
    switch: Arc<SwitchController>,
    hotkey: Arc<HotkeyConfig>,
    shutdown: Arc<AtomicBool>,
) -> Result<(), DeviceError> {
    let mut physical = PhysicalDevice::open_exclusive(device_path)?;
    info!(device_path, device_id, "device grabbed, reading events");

    loop {
        let batch = match physical.next_batch(&shutdown) {
            Ok(Some(batch)) => batch,
            Ok(None) => {
                info!(device_path, "reader shutting down");
                return Ok(());
            }
            Err(e) => {
                error!(device_path, "read error, tearing down reader: {e}");
                return Err(e);
            }
        };

        for event in &batch {
            dispatch_one(device_id, event, &switch, &hotkey);
        }
    }
}

fn dispatch_one(device_id: u32, event: &InputEvent, switch: &SwitchController, hotkey: &HotkeyConfig) {
    let frame = Frame {
        device_id,
        event_type: event.event_type().0 as u32,
        event_code: event.code() as u32,
        event_value: event.value(),
    };

    let is_key = event.event_type() == EventType::KEY;

    if is_key && hotkey.passthrough_keys.contains(&event.code()) {
        switch.send_passthrough(hotkey.passthrough_client, &frame);
        return;
    }

    switch.send_to_active(&frame);

    if is_key && device_id == hotkey.switchable_device {
        switch.observe_switch_key(event.code(), event.value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PeerConfig, PeerTransportConfig};
    use crate::transport::PeerTransport;

    fn peer(port: u16) -> PeerTransport {
        PeerTransport::open(&PeerConfig {
            transport: PeerTransportConfig::Network {
                address: "127.0.0.1".to_string(),
                port,
            },
            postswitch_command: None,
        })
        .unwrap()
    }

    fn hotkey() -> HotkeyConfig {
        HotkeyConfig {
            switchable_device: 0x4B425244,
            switch_modifier: 97,
            switch_key: 70,
            passthrough_keys: vec![126],
            passthrough_client: 0,
        }
    }

    #[test]
    fn passthrough_key_does_not_move_active_peer() {
        let switch = SwitchController::new(vec![peer(50101), peer(50102)], None, 0x4B425244, 97, 70);
        let hk = hotkey();

        let event = InputEvent::new(EventType::KEY, 126, 1);
        dispatch_one(0x4B425244, &event, &switch, &hk);

        assert_eq!(switch.current_active_peer(), 0);
    }

    #[test]
    fn switch_chord_on_non_passthrough_key_triggers_switch() {
        let switch = SwitchController::new(vec![peer(50111), peer(50112)], None, 0x4B425244, 97, 70);
        let hk = hotkey();

        dispatch_one(0x4B425244, &InputEvent::new(EventType::KEY, 97, 1), &switch, &hk);
        dispatch_one(0x4B425244, &InputEvent::new(EventType::KEY, 70, 1), &switch, &hk);

        assert_eq!(switch.current_active_peer(), 1);
    }

    #[test]
    fn switch_chord_on_a_different_device_id_is_ignored() {
        let switch = SwitchController::new(vec![peer(50121), peer(50122)], None, 0x4B425244, 97, 70);
        let hk = hotkey();

        dispatch_one(0x4D4F5553, &InputEvent::new(EventType::KEY, 97, 1), &switch, &hk);
        dispatch_one(0x4D4F5553, &InputEvent::new(EventType::KEY, 70, 1), &switch, &hk);

        assert_eq!(switch.current_active_peer(), 0);
    }
}
