//! Basic authentication and role-based permissions.
//!
//! Two accounts come from the environment: an admin holding every
//! permission and an optional viewer holding `view` only. Credentials ride
//! the standard `Authorization: Basic` header; handlers check the concrete
//! permission they need via [`AuthUser::require`].

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::debug;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    View,
    Add,
    Edit,
    Delete,
}

impl Role {
    fn allows(self, permission: Permission) -> bool {
        match self {
            Role::Admin => true,
            Role::Viewer => permission == Permission::View,
        }
    }
}

/// The authenticated caller, inserted as a request extension by
/// [`basic_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn can(&self, permission: Permission) -> bool {
        self.role.allows(permission)
    }

    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if self.can(permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// Decodes `Basic <base64(user:pass)>` into its credential pair.
fn parse_basic_header(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Axum middleware guarding the `/api` surface.
pub async fn basic_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let (user, pass) = parse_basic_header(header_value).ok_or(AppError::Unauthorized)?;

    let config = &state.config;
    let role = if user == config.admin_user && pass == config.admin_pass {
        Role::Admin
    } else if Some(user.as_str()) == config.viewer_user.as_deref()
        && Some(pass.as_str()) == config.viewer_pass.as_deref()
    {
        Role::Viewer
    } else {
        debug!("rejected credentials for user '{user}'");
        return Err(AppError::Unauthorized);
    };

    let auth_user = AuthUser {
        username: user,
        role,
    };
    debug!("authenticated '{}' as {:?}", auth_user.username, auth_user.role);
    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_header() {
        // "trip:secret"
        let parsed = parse_basic_header("Basic dHJpcDpzZWNyZXQ=");
        assert_eq!(parsed, Some(("trip".to_string(), "secret".to_string())));
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        assert_eq!(parse_basic_header("Bearer abc"), None);
        assert_eq!(parse_basic_header("Basic not-base64!!"), None);
    }

    #[test]
    fn test_parse_requires_colon_separator() {
        // "nocolon"
        assert_eq!(parse_basic_header("Basic bm9jb2xvbg=="), None);
    }

    #[test]
    fn test_viewer_permissions() {
        let viewer = AuthUser {
            username: "guest".to_string(),
            role: Role::Viewer,
        };
        assert!(viewer.can(Permission::View));
        assert!(!viewer.can(Permission::Add));
        assert!(!viewer.can(Permission::Edit));
        assert!(!viewer.can(Permission::Delete));
        assert!(matches!(
            viewer.require(Permission::Edit),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn test_admin_permissions() {
        let admin = AuthUser {
            username: "trip".to_string(),
            role: Role::Admin,
        };
        for p in [
            Permission::View,
            Permission::Add,
            Permission::Edit,
            Permission::Delete,
        ] {
            assert!(admin.can(p));
        }
    }
}
