//! Wallet extensions that run outside a browser.

mod local;

pub use local::{ED25519_SCHEME, LocalKeyExtension, address_from_public_key, signing_key_from_base58};
