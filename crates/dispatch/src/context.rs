use opsdeck_executor::{CloudEnvironmentConfig, Origin, RemoteContext};
use opsdeck_policy::Role;

/// Who is invoking, from where, and whether a remote backend is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationContext {
    pub user_id: String,
    pub role: Role,
    pub origin: Origin,
    pub session_id: String,
    pub remote: Option<CloudEnvironmentConfig>,
}

impl InvocationContext {
    pub fn new(user_id: impl Into<String>, role: Role, origin: Origin) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            origin,
            session_id: uuid::Uuid::new_v4().to_string(),
            remote: None,
        }
    }

    pub fn console(user_id: impl Into<String>, role: Role) -> Self {
        Self::new(user_id, role, Origin::Console)
    }

    pub fn graphical(user_id: impl Into<String>, role: Role) -> Self {
        Self::new(user_id, role, Origin::Graphical)
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_remote(mut self, remote: CloudEnvironmentConfig) -> Self {
        self.remote = Some(remote);
        self
    }

    /// The remote backend to use, if this invocation should go remote.
    pub(crate) fn remote_target(&self) -> Option<&CloudEnvironmentConfig> {
        match self.origin {
            Origin::Console => self.remote.as_ref().filter(|r| r.enabled),
            Origin::Graphical => None,
        }
    }

    pub(crate) fn remote_context(&self) -> RemoteContext {
        RemoteContext {
            user_id: self.user_id.clone(),
            role: self.role,
            origin: self.origin,
            session_id: self.session_id.clone(),
        }
    }
}
