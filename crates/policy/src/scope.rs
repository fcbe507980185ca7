use crate::role::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which customers or projects a role may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Allowance {
    All,
    /// Only the listed ids plus whatever is assigned to the user at runtime.
    Listed(BTreeSet<String>),
}

impl Allowance {
    pub fn assigned_only() -> Self {
        Allowance::Listed(BTreeSet::new())
    }

    pub fn permits(&self, id: &str, assigned: &[String]) -> bool {
        match self {
            Allowance::All => true,
            Allowance::Listed(ids) => ids.contains(id) || assigned.iter().any(|a| a == id),
        }
    }
}

/// Data-visibility rules attached to a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataScope {
    pub can_view_all_users: bool,
    pub can_view_all_projects: bool,
    pub can_view_all_records: bool,
    pub can_modify_system_settings: bool,
    pub allowed_customers: Allowance,
    pub allowed_projects: Allowance,
}

impl DataScope {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Self {
                can_view_all_users: true,
                can_view_all_projects: true,
                can_view_all_records: true,
                can_modify_system_settings: true,
                allowed_customers: Allowance::All,
                allowed_projects: Allowance::All,
            },
            // Managers see every project but only their own team's users.
            Role::Manager => Self {
                can_view_all_users: false,
                can_view_all_projects: true,
                can_view_all_records: true,
                can_modify_system_settings: false,
                allowed_customers: Allowance::All,
                allowed_projects: Allowance::All,
            },
            Role::SeniorDc | Role::Dc | Role::Analyst => Self {
                can_view_all_users: false,
                can_view_all_projects: false,
                can_view_all_records: false,
                can_modify_system_settings: false,
                allowed_customers: Allowance::assigned_only(),
                allowed_projects: Allowance::assigned_only(),
            },
        }
    }

    pub fn has_full_visibility(&self) -> bool {
        self.can_view_all_projects && self.can_view_all_records
    }
}

/// Who is asking, and what has been assigned to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RbacContext {
    pub user_id: String,
    pub team: Option<String>,
    pub assigned_projects: Vec<String>,
    pub assigned_customers: Vec<String>,
}

impl RbacContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

/// Ownership and assignment fields of a stored item.
///
/// Every accessor defaults to `None`, so an item only needs to expose the
/// fields it actually carries.
pub trait Assignable {
    fn assigned_user_id(&self) -> Option<&str> {
        None
    }
    fn created_by(&self) -> Option<&str> {
        None
    }
    fn owner_id(&self) -> Option<&str> {
        None
    }
    fn team_id(&self) -> Option<&str> {
        None
    }
    fn project_id(&self) -> Option<&str> {
        None
    }
    fn customer_id(&self) -> Option<&str> {
        None
    }
}

/// Keep only the items `role` may see under `ctx`.
pub fn filter_visible<T: Assignable>(items: Vec<T>, role: Role, ctx: &RbacContext) -> Vec<T> {
    let scope = DataScope::for_role(role);
    if scope.has_full_visibility() {
        return items;
    }

    items
        .into_iter()
        .filter(|item| is_visible(item, &scope, ctx))
        .collect()
}

fn is_visible<T: Assignable>(item: &T, scope: &DataScope, ctx: &RbacContext) -> bool {
    let user = Some(ctx.user_id.as_str());
    if item.assigned_user_id() == user || item.created_by() == user || item.owner_id() == user {
        return true;
    }

    if let (Some(team), Some(item_team)) = (ctx.team.as_deref(), item.team_id()) {
        if team == item_team {
            return true;
        }
    }

    let project_ok = item
        .project_id()
        .is_some_and(|p| scope.allowed_projects.permits(p, &ctx.assigned_projects));
    let customer_ok = item
        .customer_id()
        .is_some_and(|c| scope.allowed_customers.permits(c, &ctx.assigned_customers));

    project_ok || customer_ok
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: &'static str,
        owner: Option<&'static str>,
        project: Option<&'static str>,
        customer: Option<&'static str>,
    }

    impl Assignable for Item {
        fn owner_id(&self) -> Option<&str> {
            self.owner
        }
        fn project_id(&self) -> Option<&str> {
            self.project
        }
        fn customer_id(&self) -> Option<&str> {
            self.customer
        }
    }

    fn items() -> Vec<Item> {
        vec![
            Item { id: "a", owner: Some("alice"), project: None, customer: None },
            Item { id: "b", owner: Some("bob"), project: Some("p1"), customer: None },
            Item { id: "c", owner: Some("bob"), project: None, customer: Some("acme") },
            Item { id: "d", owner: Some("bob"), project: Some("p9"), customer: None },
        ]
    }

    #[test]
    fn test_admin_sees_everything() {
        let visible = filter_visible(items(), Role::Admin, &RbacContext::new("alice"));
        assert_eq!(visible.len(), 4);
    }

    #[test]
    fn test_scoped_role_sees_owned_and_assigned() {
        let mut ctx = RbacContext::new("alice");
        ctx.assigned_projects = vec!["p1".to_string()];
        ctx.assigned_customers = vec!["acme".to_string()];

        let ids: Vec<_> = filter_visible(items(), Role::Dc, &ctx)
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_scoped_role_without_assignments_sees_only_own() {
        let ids: Vec<_> = filter_visible(items(), Role::Analyst, &RbacContext::new("alice"))
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_manager_scope() {
        let scope = DataScope::for_role(Role::Manager);
        assert!(scope.has_full_visibility());
        assert!(!scope.can_view_all_users);
        assert!(!scope.can_modify_system_settings);
    }
}
