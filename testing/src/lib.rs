//! # Rally Testing
//!
//! In-memory fakes for every external collaborator of the Rally core, plus
//! fixtures for common test scenarios.
//!
//! This crate provides:
//! - [`InMemoryEventRepository`]: `HashMap`-backed repository with latency and
//!   failure injection
//! - [`FixedClock`]: deterministic time
//! - [`StaticTokenVerifier`]: token → identity table
//! - [`RecordingNotifier`]: captures every notify call
//! - [`fixtures`]: sample events and identities
//!
//! ## Example
//!
//! ```
//! use rally_core::{AttendanceManager, JoinOutcome};
//! use rally_testing::{fixtures, test_clock, InMemoryEventRepository};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), rally_core::ServiceError> {
//! let repository = Arc::new(InMemoryEventRepository::new());
//! let manager = AttendanceManager::new(repository, Arc::new(test_clock()));
//!
//! let owner = fixtures::identity();
//! let event = manager.create(&owner, fixtures::launch_party()).await?;
//!
//! let guest = fixtures::identity();
//! let outcome = manager.join(event.id, guest.user_id).await?;
//! assert!(matches!(outcome, JoinOutcome::Joined(_)));
//! # Ok(())
//! # }
//! ```

pub mod identity_mocks;
pub mod notify_mocks;
pub mod repository_mocks;

use chrono::{DateTime, Utc};
use rally_core::environment::Clock;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::RwLock;

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until explicitly advanced.
    ///
    /// # Example
    ///
    /// ```
    /// use rally_testing::mocks::FixedClock;
    /// use rally_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let before = clock.now();
    /// assert_eq!(before, clock.now());
    ///
    /// clock.advance(Duration::hours(2));
    /// assert_eq!(clock.now(), before + Duration::hours(2));
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: RwLock<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: RwLock::new(time),
            }
        }

        /// Move the clock forward (or backward, with a negative duration).
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap_or_else(std::sync::PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Sample data for tests.
pub mod fixtures {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rally_core::{EventPatch, Identity, NewEvent, UserId};

    /// A date one month after [`crate::test_clock`]'s instant.
    #[must_use]
    pub fn future_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 18, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// The canonical "Launch Party" creation payload.
    #[must_use]
    pub fn launch_party() -> NewEvent {
        new_event("Launch Party", "meetup")
    }

    /// A creation payload with the given name and category.
    #[must_use]
    pub fn new_event(name: &str, category: &str) -> NewEvent {
        NewEvent {
            name: name.to_string(),
            description: format!("{name} description"),
            date: future_date(),
            location: "Main Hall".to_string(),
            category: category.to_string(),
            image: None,
        }
    }

    /// A fresh identity that expires far in the future.
    #[must_use]
    pub fn identity() -> Identity {
        identity_for(UserId::new())
    }

    /// A long-lived identity for a specific user.
    #[must_use]
    pub fn identity_for(user_id: UserId) -> Identity {
        Identity::new(user_id, Utc::now() + Duration::days(365))
    }

    /// An identity that expired long before [`crate::test_clock`]'s instant.
    #[must_use]
    pub fn expired_identity() -> Identity {
        let expired = Utc
            .with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Identity::new(UserId::new(), expired)
    }

    /// A patch that only renames.
    #[must_use]
    pub fn rename(name: &str) -> EventPatch {
        EventPatch {
            name: Some(name.to_string()),
            ..EventPatch::default()
        }
    }
}

/// Install a `tracing` subscriber that writes to the test harness.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use identity_mocks::StaticTokenVerifier;
pub use mocks::{test_clock, FixedClock};
pub use notify_mocks::RecordingNotifier;
pub use repository_mocks::InMemoryEventRepository;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_fixture_date_is_after_test_clock() {
        assert!(fixtures::future_date() > test_clock().now());
    }
}
