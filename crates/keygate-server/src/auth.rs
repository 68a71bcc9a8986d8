use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// The flat access credential, read from the `X-Auth-Secret` header.
///
/// The header is the canonical carrier; GET validate additionally accepts
/// a `secret` query parameter and POST bodies a `secret` field, so this
/// extractor never rejects — handlers fold in their fallback and resolve
/// the actor themselves.
#[derive(Debug, Clone)]
pub struct AuthSecret(pub Option<String>);

impl<S> FromRequestParts<S> for AuthSecret
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let secret = parts
            .headers
            .get("x-auth-secret")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(AuthSecret(secret))
    }
}
