//! Role-based access policy. The table below is the only place that decides
//! what a role may do; services ask it instead of branching on roles.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

use crate::error::ServiceError;
use crate::types::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ManageBusiness,
    ManageCleaners,
    ViewClients,
    ManageClients,
    ViewJobs,
    CreateJob,
    EditJob,
    DeleteJob,
    AssignCleaner,
    UpdateJobStatus,
    UploadJobPhoto,
    UpdateChecklist,
    ViewInvoices,
    ManageInvoices,
    ViewFinancials,
    ManageSubscription,
    ViewPlatformStats,
}

impl Action {
    pub const ALL: [Action; 17] = [
        Action::ManageBusiness,
        Action::ManageCleaners,
        Action::ViewClients,
        Action::ManageClients,
        Action::ViewJobs,
        Action::CreateJob,
        Action::EditJob,
        Action::DeleteJob,
        Action::AssignCleaner,
        Action::UpdateJobStatus,
        Action::UploadJobPhoto,
        Action::UpdateChecklist,
        Action::ViewInvoices,
        Action::ManageInvoices,
        Action::ViewFinancials,
        Action::ManageSubscription,
        Action::ViewPlatformStats,
    ];
}

static POLICY: Lazy<HashMap<UserRole, HashSet<Action>>> = Lazy::new(|| {
    let cleaner: HashSet<Action> = [
        Action::ViewJobs,
        Action::UpdateJobStatus,
        Action::UploadJobPhoto,
        Action::UpdateChecklist,
        Action::ViewClients,
    ]
    .into_iter()
    .collect();

    let owner: HashSet<Action> = Action::ALL
        .into_iter()
        .filter(|a| *a != Action::ViewPlatformStats)
        .collect();

    let admin: HashSet<Action> = Action::ALL.into_iter().collect();

    HashMap::from([
        (UserRole::Cleaner, cleaner),
        (UserRole::Owner, owner),
        (UserRole::Admin, admin),
    ])
});

pub fn can(role: UserRole, action: Action) -> bool {
    POLICY.get(&role).map_or(false, |allowed| allowed.contains(&action))
}

pub fn require(role: UserRole, action: Action) -> Result<(), ServiceError> {
    if can(role, action) {
        Ok(())
    } else {
        tracing::warn!(role = role.as_str(), ?action, "Access denied");
        Err(ServiceError::Forbidden)
    }
}
