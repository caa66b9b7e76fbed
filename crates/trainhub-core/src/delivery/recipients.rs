//! Recipient Resolver - Loads the users a delivery is addressed to

use std::sync::Arc;
use tracing::debug;
use trainhub_common::types::GroupId;
use trainhub_common::Result;
use trainhub_storage::models::{ScheduledEmail, User};
use trainhub_storage::repository::{ScheduledEmailRepository, UserRepository};

/// Resolves schedules and groups into active users
pub struct RecipientResolver {
    schedules: Arc<dyn ScheduledEmailRepository>,
    users: Arc<dyn UserRepository>,
}

impl RecipientResolver {
    pub fn new(
        schedules: Arc<dyn ScheduledEmailRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self { schedules, users }
    }

    /// Active users attached to the schedule. An empty list is not an error.
    pub async fn resolve(&self, schedule: &ScheduledEmail) -> Result<Vec<User>> {
        let attached = self.schedules.list_recipients(schedule.id).await?;
        let total = attached.len();
        let active = only_active(attached);

        debug!(
            "Schedule {}: {} of {} recipients active",
            schedule.id,
            active.len(),
            total
        );
        Ok(active)
    }

    /// Distinct active members of any of the groups
    pub async fn resolve_groups(&self, group_ids: &[GroupId]) -> Result<Vec<User>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut members = only_active(self.users.list_group_members(group_ids).await?);
        members.sort_by_key(|u| u.id);
        members.dedup_by_key(|u| u.id);
        Ok(members)
    }
}

fn only_active(users: Vec<User>) -> Vec<User> {
    users.into_iter().filter(|u| u.is_active).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{user, InMemoryStore};

    #[tokio::test]
    async fn test_resolve_filters_inactive() {
        let store = InMemoryStore::new();
        let active = store.add_user(user("a@example.com", true));
        let inactive = store.add_user(user("b@example.com", false));
        let schedule = store.add_schedule_for(&[active.id, inactive.id]);

        let resolver = RecipientResolver::new(store.clone(), store.clone());
        let resolved = resolver.resolve(&schedule).await.unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, active.id);
    }

    #[tokio::test]
    async fn test_resolve_groups_dedups_members() {
        let store = InMemoryStore::new();
        let shared = store.add_user(user("shared@example.com", true));
        let other = store.add_user(user("other@example.com", true));
        let off = store.add_user(user("off@example.com", false));
        let g1 = store.add_group(&[shared.id, off.id]);
        let g2 = store.add_group(&[shared.id, other.id]);

        let resolver = RecipientResolver::new(store.clone(), store.clone());
        let members = resolver.resolve_groups(&[g1, g2]).await.unwrap();

        assert_eq!(members.len(), 2);
        assert!(members.iter().all(|u| u.is_active));
    }

    #[tokio::test]
    async fn test_resolve_groups_empty() {
        let store = InMemoryStore::new();
        let resolver = RecipientResolver::new(store.clone(), store.clone());
        assert!(resolver.resolve_groups(&[]).await.unwrap().is_empty());
    }
}
