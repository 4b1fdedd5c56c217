use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use auris_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// Read the signing secret from the environment once at startup. Requests
/// see it only through `AppState`.
pub fn jwt_secret() -> String {
    std::env::var("AURIS_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into())
}

fn decode_bearer(secret: &str, req: &Request) -> Option<Claims> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;

    let token = auth_header.strip_prefix("Bearer ")?;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

/// Extract and validate JWT from Authorization header. Rejects when absent
/// or invalid.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = decode_bearer(&state.jwt_secret, &req).ok_or(ApiError::InvalidCredentials)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Claims for routes that serve both anonymous and authenticated callers.
/// Always present in request extensions behind `optional_auth`; `None` means
/// no usable token came with the request.
#[derive(Debug, Clone)]
pub struct MaybeClaims(pub Option<Claims>);

/// Same decode, but anonymous callers pass through with empty claims.
pub async fn optional_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let claims = MaybeClaims(decode_bearer(&state.jwt_secret, &req));
    req.extensions_mut().insert(claims);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use uuid::Uuid;

    fn bearer_request(token: &str) -> Request {
        Request::builder()
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn bearer_decode_uses_the_supplied_secret() {
        let claims = Claims {
            sub: Uuid::new_v4(),
            username: "ember".into(),
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"state-held-secret"),
        )
        .unwrap();

        let req = bearer_request(&token);
        let decoded = decode_bearer("state-held-secret", &req).unwrap();
        assert_eq!(decoded.username, "ember");
        assert_eq!(decoded.sub, claims.sub);

        // A different secret rejects the same token.
        assert!(decode_bearer("some-other-secret", &req).is_none());
    }
}
