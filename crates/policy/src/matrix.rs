use crate::role::Role;
use crate::scope::DataScope;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resource {
    Users,
    Projects,
    Records,
    Scenarios,
    SystemSettings,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Projects,
        Resource::Records,
        Resource::Scenarios,
        Resource::Users,
        Resource::SystemSettings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Projects => "projects",
            Resource::Records => "records",
            Resource::Scenarios => "scenarios",
            Resource::SystemSettings => "system-settings",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "users" => Ok(Resource::Users),
            "projects" => Ok(Resource::Projects),
            "records" => Ok(Resource::Records),
            "scenarios" => Ok(Resource::Scenarios),
            "system-settings" | "system_settings" => Ok(Resource::SystemSettings),
            other => Err(format!("unknown resource: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Action::Read),
            "create" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            other => Err(format!("unknown action: {}", other)),
        }
    }
}

/// Who owns the resource being touched, relative to the caller.
#[derive(Debug, Clone, Copy)]
pub struct Ownership<'a> {
    pub owner_id: Option<&'a str>,
    pub user_id: &'a str,
}

impl Ownership<'_> {
    fn is_owner(&self) -> bool {
        !self.user_id.is_empty() && self.owner_id == Some(self.user_id)
    }
}

#[derive(Debug, Clone, Copy)]
enum ScopeFlag {
    AllUsers,
    AllProjects,
    AllRecords,
    SystemSettings,
}

impl ScopeFlag {
    fn granted(self, scope: &DataScope) -> bool {
        match self {
            ScopeFlag::AllUsers => scope.can_view_all_users,
            ScopeFlag::AllProjects => scope.can_view_all_projects,
            ScopeFlag::AllRecords => scope.can_view_all_records,
            ScopeFlag::SystemSettings => scope.can_modify_system_settings,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Grant {
    Roles(&'static [Role]),
    Scope(ScopeFlag),
    ScopeOrOwner(ScopeFlag),
}

const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// The fixed resource/action table. Every pair has an entry.
fn grant(resource: Resource, action: Action) -> Grant {
    use Action::*;
    use Resource::*;

    match (resource, action) {
        (Users, Read) => Grant::Scope(ScopeFlag::AllUsers),
        (Users, Create) => Grant::Roles(ADMIN_ONLY),
        (Users, Update) => Grant::Roles(ADMIN_ONLY),
        (Users, Delete) => Grant::Roles(ADMIN_ONLY),

        (Projects, Read) => Grant::ScopeOrOwner(ScopeFlag::AllProjects),
        (Projects, Create) => Grant::Roles(Role::CONTRIBUTORS),
        (Projects, Update) => Grant::ScopeOrOwner(ScopeFlag::AllProjects),
        (Projects, Delete) => Grant::Roles(Role::LEADS),

        (Records, Read) => Grant::ScopeOrOwner(ScopeFlag::AllRecords),
        (Records, Create) => Grant::Roles(Role::CONTRIBUTORS),
        (Records, Update) => Grant::ScopeOrOwner(ScopeFlag::AllRecords),
        (Records, Delete) => Grant::Roles(Role::LEADS),

        (Scenarios, Read) => Grant::Roles(Role::CONTRIBUTORS),
        (Scenarios, Create) => Grant::Roles(Role::CONTRIBUTORS),
        (Scenarios, Update) => Grant::Roles(Role::CONTRIBUTORS),
        (Scenarios, Delete) => Grant::Roles(Role::LEADS),

        (SystemSettings, Read) => Grant::Scope(ScopeFlag::SystemSettings),
        (SystemSettings, Create) => Grant::Scope(ScopeFlag::SystemSettings),
        (SystemSettings, Update) => Grant::Scope(ScopeFlag::SystemSettings),
        (SystemSettings, Delete) => Grant::Scope(ScopeFlag::SystemSettings),
    }
}

/// Outcome of a string-keyed access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl AccessDecision {
    fn allow() -> Self {
        Self { allowed: true, reason: None }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionsSummary {
    pub can_view: Vec<Resource>,
    pub can_create: Vec<Resource>,
    pub can_update: Vec<Resource>,
    pub can_delete: Vec<Resource>,
}

/// Role to scope and role to resource-action lookups. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionModel;

impl PermissionModel {
    pub fn new() -> Self {
        Self
    }

    pub fn scope_for(&self, role: Role) -> DataScope {
        DataScope::for_role(role)
    }

    pub fn can_access(
        &self,
        role: Role,
        resource: Resource,
        action: Action,
        ownership: Option<Ownership<'_>>,
    ) -> bool {
        let scope = DataScope::for_role(role);
        match grant(resource, action) {
            Grant::Roles(roles) => roles.contains(&role),
            Grant::Scope(flag) => flag.granted(&scope),
            Grant::ScopeOrOwner(flag) => {
                flag.granted(&scope) || ownership.is_some_and(|o| o.is_owner())
            }
        }
    }

    /// Access check for callers holding raw strings. Anything that does not
    /// parse is denied.
    pub fn check(
        &self,
        role: &str,
        resource: &str,
        action: &str,
        ownership: Option<Ownership<'_>>,
    ) -> AccessDecision {
        let Ok(role) = role.parse::<Role>() else {
            warn!("Access denied for unknown role: {}", role);
            return AccessDecision::deny("unknown role");
        };
        let resource = match resource.parse::<Resource>() {
            Ok(r) => r,
            Err(reason) => return AccessDecision::deny(reason),
        };
        let action = match action.parse::<Action>() {
            Ok(a) => a,
            Err(reason) => return AccessDecision::deny(reason),
        };

        if self.can_access(role, resource, action, ownership) {
            AccessDecision::allow()
        } else {
            AccessDecision::deny(format!("{} may not {:?} {}", role, action, resource).to_lowercase())
        }
    }

    pub fn permissions_summary(&self, role: Role) -> PermissionsSummary {
        let allowed = |action: Action| -> Vec<Resource> {
            Resource::ALL
                .into_iter()
                .filter(|r| self.can_access(role, *r, action, None))
                .collect()
        };

        PermissionsSummary {
            can_view: allowed(Action::Read),
            can_create: allowed(Action::Create),
            can_update: allowed(Action::Update),
            can_delete: allowed(Action::Delete),
        }
    }

    /// Narrow console text to the caller's data scope by appending the
    /// backend's user-filter flags.
    pub fn scope_command(&self, command: &str, role: Role, user_id: &str) -> String {
        let scope = DataScope::for_role(role);
        let mut scoped = command.to_string();

        if !scope.can_view_all_projects {
            if command.contains("pov list") {
                scoped.push_str(&format!(" --user-filter {}", user_id));
            }
            if command.contains("pov report") {
                scoped.push_str(" --assigned-only");
            }
        }

        if !scope.can_view_all_records {
            if command.contains("trr list") {
                scoped.push_str(&format!(" --user-scope {}", user_id));
            }
            if command.contains("trr export") {
                scoped.push_str(" --user-data-only");
            }
        }

        scoped
    }
}
