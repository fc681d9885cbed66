//! A thin Tailscale-identity guard.
//!
//! Resolving `X-Tailscale-User` against the real Tailscale LocalAPI
//! (`tailscale whois`) is out of scope here - this extractor trusts the
//! header as-is, which is what a production deployment would populate
//! from a reverse proxy sitting in front of the overlay.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;

use tka_common::constants::headers::X_TAILSCALE_USER;

/// The calling identity, extracted from the `X-Tailscale-User` header.
#[derive(Debug, Clone)]
pub struct TailscaleIdentity(pub String);

impl<S> FromRequestParts<S> for TailscaleIdentity
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .headers
            .get(X_TAILSCALE_USER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match identity {
            Some(identity) => Ok(TailscaleIdentity(identity.to_string())),
            None => Err(StatusCode::UNAUTHORIZED),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let req = Request::builder().body(()).unwrap();
        let (mut parts, _) = req.into_parts();
        let result = TailscaleIdentity::from_request_parts(&mut parts, &()).await;
        assert_eq!(result.unwrap_err(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn blank_header_is_rejected() {
        let req = Request::builder()
            .header(X_TAILSCALE_USER, "   ")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let result = TailscaleIdentity::from_request_parts(&mut parts, &()).await;
        assert_eq!(result.unwrap_err(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn present_header_is_accepted() {
        let req = Request::builder()
            .header(X_TAILSCALE_USER, "alice@example.ts.net")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let TailscaleIdentity(identity) =
            TailscaleIdentity::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(identity, "alice@example.ts.net");
    }
}
