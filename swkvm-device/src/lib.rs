//! Physical device acquisition (controller side) and synthetic uinput
//! device replay (peer side), shared by the `swkvm-controller` and
//! `swkvm-peerd` binaries.

pub mod physical;
pub mod synthetic;

pub use physical::{DeviceError, PhysicalDevice, SHUTDOWN_POLL_INTERVAL};
pub use synthetic::{Capabilities, SyntheticDevice, SyntheticDeviceError, SyntheticDeviceSet};
