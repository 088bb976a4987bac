use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use super::{PageInfo, PageQuery, ServiceResult};
use crate::auth::{policy, Action, AuthUser};
use crate::database::models::{Business, PlanCount, RosterEntry, Subscription, User};
use crate::database::Store;
use crate::error::ServiceError;

/// Window for "new businesses" on the platform stats.
const RECENT_DAYS: i64 = 30;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub total_businesses: i64,
    pub total_users: i64,
    pub total_jobs: i64,
    pub total_invoices: i64,
    pub active_subscriptions: i64,
    pub total_revenue: Decimal,
    pub recent_businesses: i64,
    pub plan_breakdown: Vec<PlanCount>,
}

#[derive(Debug, Serialize)]
pub struct BusinessPage {
    pub businesses: Vec<Business>,
    pub pagination: PageInfo,
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub users: Vec<User>,
    pub pagination: PageInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessOverview {
    #[serde(flatten)]
    pub business: Business,
    pub owner: Option<User>,
    pub subscription: Option<Subscription>,
    pub cleaners: Vec<RosterEntry>,
    pub client_count: i64,
    pub job_count: i64,
    pub invoice_count: i64,
    pub revenue: Decimal,
}

/// Cross-tenant reporting. Every method is ADMIN-only.
pub struct AdminService {
    store: Arc<dyn Store>,
}

impl AdminService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn stats(&self, user: &AuthUser, now: DateTime<Utc>) -> ServiceResult<PlatformStats> {
        policy::require(user.role, Action::ViewPlatformStats)?;
        let store = &self.store;

        let (total_businesses, total_users, total_jobs, total_invoices, active_subscriptions, total_revenue, recent_businesses, plan_breakdown) =
            futures::try_join!(
                store.count_businesses(),
                store.count_users(),
                store.count_jobs(None),
                store.count_invoices(None, None),
                store.count_active_subscriptions(),
                store.paid_total(None, None, None),
                store.count_businesses_since(now - Duration::days(RECENT_DAYS)),
                store.plan_breakdown(),
            )?;

        Ok(PlatformStats {
            total_businesses,
            total_users,
            total_jobs,
            total_invoices,
            active_subscriptions,
            total_revenue,
            recent_businesses,
            plan_breakdown,
        })
    }

    pub async fn businesses(&self, user: &AuthUser, query: PageQuery) -> ServiceResult<BusinessPage> {
        policy::require(user.role, Action::ViewPlatformStats)?;
        let (page, window) = query.resolve()?;
        let (businesses, total) =
            futures::try_join!(self.store.list_businesses(window), self.store.count_businesses())?;
        Ok(BusinessPage { businesses, pagination: PageInfo::new(page, window.limit, total) })
    }

    pub async fn users(&self, user: &AuthUser, query: PageQuery) -> ServiceResult<UserPage> {
        policy::require(user.role, Action::ViewPlatformStats)?;
        let (page, window) = query.resolve()?;
        let (users, total) = futures::try_join!(self.store.list_users(window), self.store.count_users())?;
        Ok(UserPage { users, pagination: PageInfo::new(page, window.limit, total) })
    }

    pub async fn business(&self, user: &AuthUser, business_id: &str, now: DateTime<Utc>) -> ServiceResult<BusinessOverview> {
        policy::require(user.role, Action::ViewPlatformStats)?;
        let business = self
            .store
            .find_business(business_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Business not found"))?;

        let day = super::start_of_day(now);
        let store = &self.store;
        let (owner, subscription, cleaners, client_count, job_count, invoice_count, revenue) = futures::try_join!(
            store.find_user(&business.user_id),
            store.find_subscription(&business.id),
            store.list_roster(&business.id, day, day + Duration::days(1)),
            store.count_clients(&business.id),
            store.count_jobs(Some(&business.id)),
            store.count_invoices(Some(&business.id), None),
            store.paid_total(Some(&business.id), None, None),
        )?;

        Ok(BusinessOverview {
            business,
            owner,
            subscription,
            cleaners,
            client_count,
            job_count,
            invoice_count,
            revenue,
        })
    }
}
