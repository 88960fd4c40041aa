//! Authentication middleware
//!
//! Bearer tokens are issued by the external identity provider and validated
//! here with the shared HS256 secret. Handlers read the caller through the
//! [`CurrentUser`] extractor.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    AppState,
};

/// Permission required to cancel a sale
pub const PERMISSION_CANCEL_SALE: (&str, &str) = ("sales", "cancel");

/// Permission required to delete a product
pub const PERMISSION_DELETE_PRODUCT: (&str, &str) = ("products", "delete");

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
    pub role: String,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        let permission = format!("{}:{}", resource, action);
        self.permissions.contains(&permission)
    }
}

/// JWT claims issued by the identity provider
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        Some(token) => token,
        None => {
            return AppError::Unauthorized {
                message: "Missing or invalid Authorization header".to_string(),
                message_es: "Falta el encabezado de autorización".to_string(),
            }
            .into_response()
        }
    };

    let auth_user = match authenticate(token, &state.config.auth.jwt_secret) {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    tracing::debug!("Authenticated user {} ({})", auth_user.user_id, auth_user.role);
    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// Decode a bearer token into the caller it identifies
pub fn authenticate(token: &str, secret: &str) -> AppResult<AuthUser> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })?;

    let user_id = uuid::Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

    Ok(AuthUser {
        user_id,
        role: claims.role,
        permissions: claims.permissions,
    })
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized {
                message: "Authentication required".to_string(),
                message_es: "Debe iniciar sesión".to_string(),
            })
    }
}

/// Permission guard for use in handlers
pub fn check_permission(user: &AuthUser, (resource, action): (&str, &str)) -> AppResult<()> {
    if user.has_permission(resource, action) {
        Ok(())
    } else {
        tracing::warn!(
            "User {} denied {}:{}",
            user.user_id,
            resource,
            action
        );
        Err(AppError::InsufficientPermissions)
    }
}
