use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use gts_core::{Actor, Role};

use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

/// Bearer token claims. `sub` is the opaque user id from the identity provider.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn actor(&self) -> Option<Actor> {
        let role: Role = self.role.parse().ok()?;
        Some(Actor::new(self.sub.clone(), role))
    }
}

pub fn issue_token(secret: &str, sub: &str, role: Role, ttl_seconds: u64) -> jsonwebtoken::errors::Result<String> {
    let claims = Claims {
        sub: sub.to_owned(),
        role: role.as_str().to_owned(),
        exp: (Utc::now() + Duration::seconds(ttl_seconds as i64)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

// ============================================================================
// Authentication Middleware
// ============================================================================

/// Resolves the bearer token into an [`Actor`] and stores it in the request
/// extensions. Role checks happen in the handlers and the engine.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract token from Authorization header
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Decode and validate JWT
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    // 3. Unknown roles are rejected outright
    let actor = token_data.claims.actor().ok_or(StatusCode::FORBIDDEN)?;

    // 4. Inject actor into request extensions
    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_decodes_to_actor() {
        let token = issue_token("secret", "driver-42", Role::Driver, 60).unwrap();
        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        )
        .unwrap();

        assert_eq!(data.claims.actor(), Some(Actor::new("driver-42", Role::Driver)));
    }

    #[test]
    fn test_unknown_role_has_no_actor() {
        let claims = Claims {
            sub: "someone".into(),
            role: "GUEST".into(),
            exp: 0,
        };
        assert!(claims.actor().is_none());
    }
}
