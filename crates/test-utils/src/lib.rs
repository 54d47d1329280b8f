//! # Test Utilities
//!
//! Fixtures, a call-counting key source and a fixture signer shared by the
//! `storekit-jws` tests.
//!
//! This crate is not intended to be used outside of tests.

pub mod fixtures;
pub mod key_source;
pub mod signer;

use std::sync::Once;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub use crate::key_source::StaticKeySource;
pub use crate::signer::Rs256Signer;

// initalise tracing once for all tests
static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// # Panics
///
/// Panics if the tracing subscriber cannot be set.
pub fn init_tracer() {
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::ERROR).finish();
        tracing::subscriber::set_global_default(subscriber).expect("subscriber set");
    });
}
