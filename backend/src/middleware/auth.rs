//! Authentication middleware
//!
//! Bearer JWTs issued by the identity service are decoded into the [`Actor`]
//! the services authorize against.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::{Actor, Role};
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    /// Party the user acts for; absent for admins
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn into_actor(self) -> Result<Actor, AppError> {
        match (self.role, self.owner_id) {
            (Role::Admin, _) => Ok(Actor::admin(self.sub)),
            (role, Some(owner_id)) => Ok(Actor::acting_for(self.sub, role, owner_id)),
            (_, None) => Err(AppError::Unauthorized(
                "token carries no owner for a non-admin role".to_string(),
            )),
        }
    }
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
            return AppError::Unauthorized("Missing or invalid Authorization header".to_string())
                .into_response()
        }
    };

    let actor = match decode_actor(token, &state.config.jwt.secret) {
        Ok(actor) => actor,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(actor);
    next.run(request).await
}

/// Decode and validate a token into the acting identity
pub fn decode_actor(token: &str, secret: &str) -> Result<Actor, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?
    .claims
    .into_actor()
}

/// Sign a token for `actor`, valid for `ttl_secs`
pub fn encode_token(actor: &Actor, secret: &str, ttl_secs: i64) -> Result<String, AppError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: actor.user_id,
        role: actor.role,
        owner_id: actor.owner_id,
        exp: now + ttl_secs,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token encoding failed: {}", e)))
}

/// Extractor for the authenticated actor
#[derive(Clone, Copy, Debug)]
pub struct CurrentUser(pub Actor);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .copied()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}
