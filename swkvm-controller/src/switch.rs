//! Active-peer state, the switch hotkey state machine, and the cleanup
//! broadcast/post-switch hook.

use crate::transport::PeerTransport;
use evdev::EventType;
use std::process::Command;
use std::sync::Mutex;
use swkvm_wire::{Envelope, Frame};
use tracing::{info, warn};

struct SwitchState {
    active_peer: usize,
    modifier_down: bool,
    key_down: bool,
}

/// Serializes peer switches and owns every peer's send-side transport.
///
/// Reads of `active_peer` on the dispatch fast path are intentionally
/// unsynchronized (see `current_active_peer`); only a switch itself, and the
/// cleanup broadcast it triggers, are serialized by `state`.
pub struct SwitchController {
    state: Mutex<SwitchState>,
    peers: Vec<PeerTransport>,
    envelope: Option<Envelope>,
    switchable_device: u32,
    switch_modifier: u16,
    switch_key: u16,
}

impl SwitchController {
    pub fn new(
        peers: Vec<PeerTransport>,
        envelope: Option<Envelope>,
        switchable_device: u32,
        switch_modifier: u16,
        switch_key: u16,
    ) -> Self {
        SwitchController {
            state: Mutex::new(SwitchState {
                active_peer: 0,
                modifier_down: false,
                key_down: false,
            }),
            peers,
            envelope,
            switchable_device,
            switch_modifier,
            switch_key,
        }
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// The active peer index as of this call. May race a concurrent switch;
    /// that race is acceptable per the dispatch contract.
    pub fn current_active_peer(&self) -> usize {
        self.state.lock().unwrap().active_peer
    }

    pub fn send_to_active(&self, frame: &Frame) {
        self.send_to(self.current_active_peer(), frame);
    }

    pub fn send_to(&self, peer_idx: usize, frame: &Frame) {
        self.peers[peer_idx].send(frame, self.envelope.as_ref());
    }

    pub fn send_passthrough(&self, peer_idx: usize, frame: &Frame) {
        self.send_to(peer_idx, frame);
        self.send_to(peer_idx, &Frame::sync(frame.device_id));
    }

    /// Feed one key event from the switchable device into the hotkey state
    /// machine. Invokes the switch when both the modifier and key are held.
    pub fn observe_switch_key(&self, code: u16, value: i32) {
        if code != self.switch_modifier && code != self.switch_key {
            return;
        }

        let mut state = self.state.lock().unwrap();
        if code == self.switch_modifier {
            state.modifier_down = value != 0;
        } else {
            state.key_down = value != 0;
        }

        if state.modifier_down && state.key_down {
            self.switch_locked(&mut state);
        }
    }

    /// Advance the active peer, broadcast the cleanup sequence to every
    /// peer, and run the new peer's post-switch hook. Called with `state`
    /// already locked; the lock is held for the hook's entire duration so
    /// no further switch can interleave with it.
    fn switch_locked(&self, state: &mut SwitchState) {
        state.active_peer = (state.active_peer + 1) % self.peers.len();
        state.modifier_down = false;
        state.key_down = false;

        let ev_key = EventType::KEY.0 as u32;
        let cleanup = [
            Frame {
                device_id: self.switchable_device,
                event_type: ev_key,
                event_code: self.switch_key as u32,
                event_value: 0,
            },
            Frame::sync(self.switchable_device),
            Frame {
                device_id: self.switchable_device,
                event_type: ev_key,
                event_code: self.switch_modifier as u32,
                event_value: 0,
            },
            Frame::sync(self.switchable_device),
        ];

        for peer in &self.peers {
            for frame in &cleanup {
                peer.send(frame, self.envelope.as_ref());
            }
        }

        info!(active_peer = state.active_peer, "switched active peer");

        if let Some(cmd) = self.peers[state.active_peer].postswitch_command.clone() {
            match Command::new("sh").arg("-c").arg(&cmd).status() {
                Ok(status) if !status.success() => {
                    warn!("postswitch_command exited with {status}: {cmd}")
                }
                Err(e) => warn!("failed to run postswitch_command {cmd}: {e}"),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PeerConfig, PeerTransportConfig};

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

    #[test]
    fn switch_is_cyclic() {
        let ctl = SwitchController::new(vec![peer(50001), peer(50002), peer(50003)], None, 1, 97, 70);
        assert_eq!(ctl.current_active_peer(), 0);

        for expected in [1, 2, 0, 1] {
            ctl.observe_switch_key(97, 1); // modifier down
            ctl.observe_switch_key(70, 1); // key down, triggers switch
            assert_eq!(ctl.current_active_peer(), expected);
            ctl.observe_switch_key(97, 0);
            ctl.observe_switch_key(70, 0);
        }
    }

    #[test]
    fn switch_only_fires_when_both_held() {
        let ctl = SwitchController::new(vec![peer(50011), peer(50012)], None, 1, 97, 70);
        ctl.observe_switch_key(97, 1);
        assert_eq!(ctl.current_active_peer(), 0);
        ctl.observe_switch_key(97, 0);
        ctl.observe_switch_key(70, 1);
        assert_eq!(ctl.current_active_peer(), 0);
    }

    #[test]
    fn unrelated_codes_are_ignored() {
        let ctl = SwitchController::new(vec![peer(50021), peer(50022)], None, 1, 97, 70);
        ctl.observe_switch_key(30, 1);
        assert_eq!(ctl.current_active_peer(), 0);
    }
}
