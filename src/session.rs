// src/session.rs
//
// Operator accounts and permission checks. The session is explicit state
// owned by the caller, not process-global: whoever drives submissions holds
// the Session and asks it before privileged actions.

use serde::{Deserialize, Serialize};

use crate::api_keys;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Viewer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Viewer => "viewer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    View,
    Edit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub api_key: String,
}

/// Built-in accounts. Keys are minted fresh each run so they always pass
/// structural validation; nothing persists them.
pub fn builtin_users() -> Vec<User> {
    vec![
        User {
            id: "1".to_string(),
            name: "Admin User".to_string(),
            email: "admin@trafficmanager.com".to_string(),
            role: UserRole::Admin,
            api_key: api_keys::generate_secret_key(),
        },
        User {
            id: "2".to_string(),
            name: "Viewer User".to_string(),
            email: "viewer@trafficmanager.com".to_string(),
            role: UserRole::Viewer,
            api_key: api_keys::generate_publishable_key(),
        },
    ]
}

#[derive(Debug)]
pub struct Session {
    users: Vec<User>,
    current: Option<User>,
}

impl Session {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users,
            current: None,
        }
    }

    pub fn with_builtin_users() -> Self {
        Self::new(builtin_users())
    }

    /// Look the email up in the roster and make that user current.
    /// Returns the logged-in user, or None if the email is unknown
    /// (the current user is left untouched in that case).
    pub fn login_with_email(&mut self, email: &str) -> Option<User> {
        let user = self.users.iter().find(|u| u.email == email)?.clone();
        self.current = Some(user.clone());
        Some(user)
    }

    pub fn logout(&mut self) {
        self.current = None;
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current.as_ref()
    }

    pub fn is_admin(&self) -> bool {
        matches!(
            self.current.as_ref().map(|u| u.role),
            Some(UserRole::Admin)
        )
    }

    /// Anonymous sessions can do nothing. Any logged-in user can view,
    /// only admins can edit.
    pub fn has_permission(&self, action: Permission) -> bool {
        let Some(user) = self.current.as_ref() else {
            return false;
        };

        match action {
            Permission::View => true,
            Permission::Edit => user.role == UserRole::Admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_session_has_no_permissions() {
        let session = Session::with_builtin_users();
        assert!(session.current_user().is_none());
        assert!(!session.is_admin());
        assert!(!session.has_permission(Permission::View));
        assert!(!session.has_permission(Permission::Edit));
    }

    #[test]
    fn test_viewer_can_view_but_not_edit() {
        let mut session = Session::with_builtin_users();
        let user = session.login_with_email("viewer@trafficmanager.com");
        assert!(user.is_some());
        assert!(!session.is_admin());
        assert!(session.has_permission(Permission::View));
        assert!(!session.has_permission(Permission::Edit));
    }

    #[test]
    fn test_admin_can_edit() {
        let mut session = Session::with_builtin_users();
        session.login_with_email("admin@trafficmanager.com");
        assert!(session.is_admin());
        assert!(session.has_permission(Permission::View));
        assert!(session.has_permission(Permission::Edit));
    }

    #[test]
    fn test_unknown_email_does_not_change_session() {
        let mut session = Session::with_builtin_users();
        session.login_with_email("admin@trafficmanager.com");
        let missing = session.login_with_email("nobody@trafficmanager.com");
        assert!(missing.is_none());
        assert!(session.is_admin(), "failed login must not clobber the session");
    }

    #[test]
    fn test_logout_clears_current_user() {
        let mut session = Session::with_builtin_users();
        session.login_with_email("admin@trafficmanager.com");
        session.logout();
        assert!(session.current_user().is_none());
        assert!(!session.has_permission(Permission::View));
    }

    #[test]
    fn test_builtin_keys_match_roles() {
        let users = builtin_users();
        let admin = users.iter().find(|u| u.role == UserRole::Admin);
        let viewer = users.iter().find(|u| u.role == UserRole::Viewer);
        let (Some(admin), Some(viewer)) = (admin, viewer) else {
            panic!("builtin roster must contain both roles");
        };

        assert!(admin.api_key.starts_with("sk_"));
        assert!(viewer.api_key.starts_with("pk_"));
        assert!(api_keys::validate_api_key(&admin.api_key));
        assert!(api_keys::validate_api_key(&viewer.api_key));
    }
}
