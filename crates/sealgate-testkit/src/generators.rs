//! Proptest generators for property-based testing.

use proptest::prelude::*;

use sealgate_core::{Address, Keypair, ObjectId, ObjectIdentifier, PolicyNamespace, MAX_NONCE_LEN};

/// Generate a random ObjectId.
pub fn object_id() -> impl Strategy<Value = ObjectId> {
    any::<[u8; 32]>().prop_map(ObjectId::from_bytes)
}

/// Generate a random PolicyNamespace.
pub fn namespace() -> impl Strategy<Value = PolicyNamespace> {
    object_id().prop_map(PolicyNamespace::new)
}

/// Generate an identifier with a nonce of 1..=MAX_NONCE_LEN bytes.
pub fn identifier() -> impl Strategy<Value = ObjectIdentifier> {
    (namespace(), prop::collection::vec(any::<u8>(), 1..=MAX_NONCE_LEN))
        .prop_map(|(namespace, nonce)| ObjectIdentifier::new(namespace, nonce))
}

/// Generate a keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate the address of a random keypair.
pub fn address() -> impl Strategy<Value = Address> {
    keypair().prop_map(|kp| Address::derive(&kp.public_key()))
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate `(servers, threshold)` with `1 <= threshold <= servers <= max_servers`.
pub fn quorum_shape(max_servers: usize) -> impl Strategy<Value = (usize, u16)> {
    (1..=max_servers.max(1)).prop_flat_map(|servers| (Just(servers), 1..=servers as u16))
}
