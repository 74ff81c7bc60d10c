//! Provisioning state classification
//!
//! A pure function of the key family, its computed view and the local device.
//! It is recomputed on every attempt and after every submission, never cached:
//! a submission may have been accepted remotely without being reflected yet.

use keyfam_core::key_family::has_active_key_for_device;
use keyfam_core::{ComputedKeyFamily, DeviceIdentity, KeyFamily, KeyId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the local device stands with respect to the user's key family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningState {
    /// The user never registered a key; the new key becomes the eldest
    NoKeysAtAll,
    /// The device holds an active sibkey (terminal)
    HasDeviceKey {
        /// The device's active sibkey
        key_id: KeyId,
    },
    /// The family has an eldest key but this device has no active sibkey
    NeedsProvisioning {
        /// Root the new key must chain to
        eldest: KeyId,
    },
}

impl ProvisioningState {
    /// Whether nothing remains to be done for this device
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProvisioningState::HasDeviceKey { .. })
    }

    /// Classify a family for a device, deriving the computed view
    pub fn of(family: &KeyFamily, device: &DeviceIdentity) -> Self {
        classify(family, family.computed().as_ref(), device)
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisioningState::NoKeysAtAll => write!(f, "no keys at all"),
            ProvisioningState::HasDeviceKey { key_id } => {
                write!(f, "has device key {}", key_id.short())
            }
            ProvisioningState::NeedsProvisioning { .. } => write!(f, "needs provisioning"),
        }
    }
}

/// Classify the provisioning state of `device`
///
/// `computed` must be the view derived from `family`; it is `None` exactly
/// when the family has no eldest key.
pub fn classify(
    family: &KeyFamily,
    computed: Option<&ComputedKeyFamily<'_>>,
    device: &DeviceIdentity,
) -> ProvisioningState {
    let (Some(eldest), Some(computed)) = (family.eldest_id(), computed) else {
        return ProvisioningState::NoKeysAtAll;
    };

    if has_active_key_for_device(computed, device) {
        if let Some(entry) = computed.device_sibkey(device.id()) {
            return ProvisioningState::HasDeviceKey {
                key_id: entry.key_id(),
            };
        }
    }

    ProvisioningState::NeedsProvisioning { eldest }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyfam_core::{DeviceId, KeyFamilySnapshot};
    use keyfam_testkit::FamilyBuilder;
    use proptest::prelude::*;

    fn device(name: &str) -> DeviceIdentity {
        DeviceIdentity::new(DeviceId::new(), name).unwrap()
    }

    #[test]
    fn test_empty_family_needs_eldest() {
        let family = KeyFamily::from_snapshot(KeyFamilySnapshot::empty(
            keyfam_testkit::identity("erin"),
        ))
        .unwrap();
        assert!(family.computed().is_none());
        assert_eq!(
            ProvisioningState::of(&family, &device("laptop")),
            ProvisioningState::NoKeysAtAll
        );
    }

    #[test]
    fn test_device_with_sibkey_is_terminal() {
        let laptop = device("laptop");
        let mut builder = FamilyBuilder::new("frank").with_passphrase_eldest();
        let key_id = builder.add_device(&laptop);
        let family = builder.build();

        let state = ProvisioningState::of(&family, &laptop);
        assert_eq!(state, ProvisioningState::HasDeviceKey { key_id });
        assert!(state.is_terminal());
    }

    #[test]
    fn test_other_device_does_not_count() {
        let laptop = device("laptop");
        let phone = device("phone");
        let mut builder = FamilyBuilder::new("gina").with_passphrase_eldest();
        builder.add_device(&phone);
        let family = builder.build();

        assert!(matches!(
            ProvisioningState::of(&family, &laptop),
            ProvisioningState::NeedsProvisioning { .. }
        ));
    }

    #[test]
    fn test_revoked_device_key_needs_provisioning() {
        let laptop = device("laptop");
        let mut builder = FamilyBuilder::new("hank").with_passphrase_eldest();
        let key_id = builder.add_device(&laptop);
        builder.revoke(key_id);
        let family = builder.build();

        assert_eq!(
            ProvisioningState::of(&family, &laptop),
            ProvisioningState::NeedsProvisioning {
                eldest: family.eldest_id().unwrap()
            }
        );
    }

    proptest! {
        #[test]
        fn prop_no_eldest_always_no_keys(seed in any::<u64>()) {
            let name = format!("user{seed}");
            let family = KeyFamily::from_snapshot(KeyFamilySnapshot::empty(
                keyfam_testkit::identity(&name),
            ))
            .unwrap();
            prop_assert!(family.computed().is_none());
            prop_assert_eq!(
                classify(&family, None, &device(&name)),
                ProvisioningState::NoKeysAtAll
            );
        }

        #[test]
        fn prop_classification_tracks_device_sibkeys(
            others in 0usize..4,
            provisioned in any::<bool>(),
            revoked in any::<bool>(),
        ) {
            let local = device("local");
            let mut builder = FamilyBuilder::new("ivy").with_passphrase_eldest();
            for i in 0..others {
                builder.add_device(&device(&format!("other-{i}")));
            }
            let local_key = provisioned.then(|| builder.add_device(&local));
            if revoked {
                if let Some(key_id) = local_key {
                    builder.revoke(key_id);
                }
            }
            let family = builder.build();
            let state = ProvisioningState::of(&family, &local);

            match local_key {
                Some(key_id) if !revoked => {
                    prop_assert_eq!(state, ProvisioningState::HasDeviceKey { key_id });
                }
                _ => prop_assert!(
                    matches!(state, ProvisioningState::NeedsProvisioning { .. }),
                    "unexpected state {:?}",
                    state
                ),
            }
        }
    }
}
