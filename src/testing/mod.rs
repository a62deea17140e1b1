//! Testing utilities for the relying party engine
//!
//! ## Organization
//!
//! - [`builders`] - Fluent builders for authenticator data, attestation
//!   objects and client data
//! - [`fixtures`] - A software authenticator and pre-built configuration
//!
//! ## Usage
//!
//! ```rust
//! use webauthn_rp::testing::{constants, fixtures::TestFixtures};
//!
//! let service = TestFixtures::service();
//! let (_authenticator, data) = TestFixtures::registration_data("challenge");
//! let result = service.finish_registration(&data).unwrap();
//! assert_eq!(result.sign_count, 0);
//! # let _ = constants::TEST_RP_ID;
//! ```

pub mod builders;
pub mod fixtures;

// Re-export commonly used items for convenience
pub use builders::*;
pub use fixtures::{TestAuthenticator, TestFixtures};

/// Common test constants
pub mod constants {
    /// Relying party ID used by the fixtures
    pub const TEST_RP_ID: &str = "example.com";

    pub const TEST_RP_NAME: &str = "Example RP";

    /// The only allowed origin in the fixture configuration
    pub const TEST_ORIGIN: &str = "https://example.com";

    /// Default test email address
    pub const TEST_EMAIL: &str = "test@example.com";

    /// Default test user name
    pub const TEST_USER_NAME: &str = "Test User";

    /// AAGUID reported by [`super::TestAuthenticator`] (YubiKey 5 NFC)
    pub const TEST_AAGUID: &str = "2fc0579f-8113-47ea-b116-bb5a8db9202a";
}
