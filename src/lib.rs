#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the webauthn-rp crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(feature = "server")]
pub mod handlers;
pub mod settings;
pub mod store;
pub mod webauthn;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use settings::Settings;
pub use webauthn::{
    LoginData, RegistrationData, RegistrationResult, RelyingPartyConfig, ValidationOutput,
    WebAuthnError, WebAuthnService,
};
