use std::fmt;

use crate::domain::ClientError;

/// Roles the login flow knows how to route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Role> {
        match raw {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    /// Where a freshly signed-in user of this role lands
    pub fn destination(&self) -> Destination {
        match self {
            Role::Admin => Destination::AdminDashboard,
            Role::User => Destination::UserDashboard,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    AdminDashboard,
    UserDashboard,
}

impl Destination {
    pub fn path(&self) -> &'static str {
        match self {
            Destination::AdminDashboard => "/admin/dashboard",
            Destination::UserDashboard => "/user/dashboard",
        }
    }
}

/// Identity of the signed-in user.
///
/// Passed explicitly to everything that needs a token or an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub token: String,
    pub email: String,
    pub role: Role,
}

/// Owner of the current session, if any.
///
/// Created empty, filled by a successful login, emptied at logout or when the
/// token carries a role this client cannot route.
#[derive(Debug, Default)]
pub struct SessionContext {
    current: Option<Session>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn establish(&mut self, session: Session) {
        self.current = Some(session);
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn logout(&mut self) -> Option<Session> {
        self.current.take()
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn require(&self) -> Result<&Session, ClientError> {
        self.current.as_ref().ok_or(ClientError::Unauthorized)
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.is_some()
    }
}
