//! Shared test infrastructure for the notification crates.
//!
//! - `TestDatabase`: a throwaway Postgres container with the workspace
//!   migrations applied. Needs a Docker daemon.
//! - `TestDataBuilder`: deterministic addresses and report ids derived from
//!   the test name, so parallel tests never collide on shared rows.
//!
//! ```rust,no_run
//! use test_utils::{TestDatabase, TestDataBuilder};
//!
//! #[tokio::test]
//! #[ignore = "requires Docker"]
//! async fn my_postgres_test() {
//!     let db = TestDatabase::new().await;
//!     let data = TestDataBuilder::from_test_name("my_postgres_test");
//!     let to = data.address("supervisor");
//! }
//! ```

mod postgres;

pub use postgres::{TestDatabase, TestUser};

/// Deterministic test data keyed by a seed.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed from the test name (recommended).
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// `local-<seed>@test.local`
    pub fn address(&self, local: &str) -> String {
        format!("{}-{}@test.local", local, self.seed)
    }

    /// A positive report id in the i32 range
    pub fn report_id(&self) -> i64 {
        (self.seed % i32::MAX as u64) as i64 + 1
    }

    /// Username unique to this seed
    pub fn username(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.seed)
    }
}
