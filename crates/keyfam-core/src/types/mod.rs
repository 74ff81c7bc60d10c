//! Identifier and identity types

pub mod identifiers;
pub mod identity;

pub use identifiers::{DeviceId, KeyId, UserId};
pub use identity::{validate_device_name, DeviceIdentity, Identity, MAX_DEVICE_NAME_LEN};
