use std::sync::Arc;

use crate::auth::{policy, Action, AuthUser};
use crate::database::Store;
use crate::error::ServiceError;
use crate::types::UserRole;

/// The tenant an authenticated caller acts within.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantScope {
    pub business_id: String,
    pub user_id: String,
    pub role: UserRole,
}

impl TenantScope {
    pub fn is_cleaner(&self) -> bool {
        self.role == UserRole::Cleaner
    }

    /// For cleaners, the assignment every job query must be narrowed to.
    pub fn assignee(&self) -> Option<&str> {
        self.is_cleaner().then_some(self.user_id.as_str())
    }

    pub fn require(&self, action: Action) -> Result<(), ServiceError> {
        policy::require(self.role, action)
    }

    pub fn can(&self, action: Action) -> bool {
        policy::can(self.role, action)
    }
}

/// Maps a caller to the business that scopes their queries. Owners and
/// admins resolve to the business they own; cleaners to their oldest
/// ACTIVE roster link.
#[derive(Clone)]
pub struct TenantResolver {
    store: Arc<dyn Store>,
}

impl TenantResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn business_id_for(&self, user_id: &str, role: UserRole) -> Result<Option<String>, ServiceError> {
        let business_id = match role {
            UserRole::Cleaner => self
                .store
                .find_active_link(user_id)
                .await?
                .map(|link| link.business_id),
            UserRole::Owner | UserRole::Admin => self
                .store
                .find_business_by_owner(user_id)
                .await?
                .map(|business| business.id),
        };
        Ok(business_id)
    }

    /// Like `resolve`, but `None` when the caller has no tenant yet.
    pub async fn resolve_optional(&self, user: &AuthUser) -> Result<Option<TenantScope>, ServiceError> {
        let key = format!("tenant:{}:{}", user.role.as_str(), user.id);

        let business_id = match user.cache.get(&key) {
            Some(cached) => Some(cached),
            None => {
                let found = self.business_id_for(&user.id, user.role).await?;
                if let Some(id) = &found {
                    user.cache.put(key, id.clone());
                }
                found
            }
        };

        Ok(business_id.map(|business_id| TenantScope {
            business_id,
            user_id: user.id.clone(),
            role: user.role,
        }))
    }

    /// Fails with `NotFound` when no tenant can be resolved.
    pub async fn resolve(&self, user: &AuthUser) -> Result<TenantScope, ServiceError> {
        self.resolve_optional(user).await?.ok_or_else(|| match user.role {
            UserRole::Cleaner => ServiceError::not_found("No active business assignment found"),
            _ => ServiceError::not_found("Business not found"),
        })
    }

    /// Drop the memoised tenant, e.g. right after the caller creates a business.
    pub fn forget(&self, user: &AuthUser) {
        user.cache.invalidate(&format!("tenant:{}:{}", user.role.as_str(), user.id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;

    #[tokio::test]
    async fn owner_resolves_to_owned_business() {
        let ctx = TestContext::new();
        let (owner, business) = ctx.owner_with_business("Sparkle").await;

        let scope = ctx.resolver.resolve(&owner).await.unwrap();
        assert_eq!(scope.business_id, business.id);
        assert_eq!(scope.assignee(), None);
    }

    #[tokio::test]
    async fn cleaner_resolves_through_active_link_only() {
        let ctx = TestContext::new();
        let (_owner, business) = ctx.owner_with_business("Sparkle").await;
        let cleaner = ctx.cleaner_linked_to(&business).await;

        let scope = ctx.resolver.resolve(&cleaner).await.unwrap();
        assert_eq!(scope.business_id, business.id);
        assert_eq!(scope.assignee(), Some(cleaner.id.as_str()));

        ctx.deactivate(&business, &cleaner).await;
        let fresh = AuthUser::new(cleaner.id.clone(), cleaner.email.clone(), UserRole::Cleaner);
        assert!(ctx.resolver.resolve_optional(&fresh).await.unwrap().is_none());
        assert!(matches!(ctx.resolver.resolve(&fresh).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn owner_without_business_is_not_found() {
        let ctx = TestContext::new();
        let owner = ctx.owner("solo@example.com").await;
        assert!(matches!(ctx.resolver.resolve(&owner).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn lookups_are_memoised_per_request() {
        let ctx = TestContext::new();
        let (owner, business) = ctx.owner_with_business("Sparkle").await;
        ctx.resolver.resolve(&owner).await.unwrap();

        let key = format!("tenant:OWNER:{}", owner.id);
        assert_eq!(owner.cache.get(&key), Some(business.id.clone()));
    }
}
