//! Testing utilities for Confirmrs
//!
//! - [`fixtures`] - Pre-built test data (users, sessions, settings)
//! - [`mock`] - In-memory identity provider and analytics sink
//!
//! ## Usage
//!
//! ```rust,ignore
//! use confirmrs::testing::{fixtures::TestFixtures, mock::MockIdentityProvider};
//!
//! let provider = MockIdentityProvider::new().with_user(TestFixtures::user());
//! ```

pub mod fixtures;
pub mod mock;

pub use fixtures::TestFixtures;
pub use mock::{MockIdentityProvider, ProviderCall, RecordingAnalyticsSink};

/// Common test constants
pub mod constants {
    /// Default test email address
    pub const TEST_EMAIL: &str = "test@example.com";

    /// Default test user id
    pub const TEST_USER_ID: &str = "8d2f6c1e-4b7a-4f0e-9a51-2c3d4e5f6a7b";

    /// Default test user name
    pub const TEST_USER_NAME: &str = "Test User";

    pub const TEST_ACCESS_TOKEN: &str = "test_access_token";
    pub const TEST_REFRESH_TOKEN: &str = "test_refresh_token";

    /// Session secret used by fixture settings
    pub const TEST_SESSION_SECRET: &str = "test_key_32_bytes_long_for_test_";
}
