//! Resolves who gets notified about a report.

use std::sync::Arc;
use tracing::{debug, error};

use crate::models::{DirectoryUser, Recipient};
use crate::repository::UserDirectory;

/// Supervisors and admins with credentials, admins first, then by surname.
#[derive(Clone)]
pub struct RecipientResolver {
    directory: Arc<dyn UserDirectory>,
}

impl RecipientResolver {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Never fails: an unreachable directory resolves to nobody.
    pub async fn resolve(&self, plant: Option<&str>) -> Vec<Recipient> {
        let users = match self.directory.candidates(plant.map(str::to_string)).await {
            Ok(users) => users,
            Err(e) => {
                error!(plant = ?plant, error = %e, "Failed to query user directory");
                return Vec::new();
            }
        };

        let mut eligible: Vec<DirectoryUser> = users
            .into_iter()
            .filter(DirectoryUser::is_eligible)
            .filter(|u| plant.is_none_or(|p| u.plant == p))
            .collect();

        eligible.sort_by(|a, b| {
            b.is_admin
                .cmp(&a.is_admin)
                .then_with(|| a.last_name.cmp(&b.last_name))
        });

        debug!(plant = ?plant, count = eligible.len(), "Resolved notification recipients");
        eligible.into_iter().map(Recipient::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationError;
    use crate::memory::InMemoryUserDirectory;
    use crate::repository::MockUserDirectory;

    fn user(last: &str, plant: &str, admin: bool, supervisor: bool, creds: bool) -> DirectoryUser {
        DirectoryUser {
            first_name: "Test".into(),
            last_name: last.into(),
            email: format!("{}@plant.local", last.to_lowercase()),
            plant: plant.into(),
            is_admin: admin,
            is_supervisor: supervisor,
            has_credentials: creds,
        }
    }

    #[tokio::test]
    async fn test_resolve_filters_and_orders() {
        let directory = InMemoryUserDirectory::new(vec![
            user("Young", "North", false, true, true),
            user("Baker", "North", false, true, true),
            user("Zimmer", "North", true, false, true),
            user("Nolog", "North", true, true, false),
            user("Worker", "North", false, false, true),
            user("Elsewhere", "South", true, true, true),
        ]);
        let resolver = RecipientResolver::new(Arc::new(directory));

        let recipients = resolver.resolve(Some("North")).await;
        let names: Vec<&str> = recipients.iter().map(|r| r.name.as_str()).collect();

        assert_eq!(names, vec!["Test Zimmer", "Test Baker", "Test Young"]);
    }

    #[tokio::test]
    async fn test_resolve_without_plant_spans_all_plants() {
        let directory = InMemoryUserDirectory::new(vec![
            user("Baker", "North", false, true, true),
            user("Adams", "South", false, true, true),
        ]);
        let resolver = RecipientResolver::new(Arc::new(directory));

        assert_eq!(resolver.resolve(None).await.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_empty_when_nobody_qualifies() {
        let directory = InMemoryUserDirectory::new(vec![user("Worker", "North", false, false, true)]);
        let resolver = RecipientResolver::new(Arc::new(directory));

        assert!(resolver.resolve(Some("North")).await.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_empty_on_directory_error() {
        let mut directory = MockUserDirectory::new();
        directory
            .expect_candidates()
            .returning(|_| Err(NotificationError::Database("timeout".into())));
        let resolver = RecipientResolver::new(Arc::new(directory));

        assert!(resolver.resolve(Some("North")).await.is_empty());
    }
}
