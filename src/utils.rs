use axum::http::HeaderMap;
use std::collections::BTreeMap;
use tracing::warn;

// For token verification
use hmac::{Hmac, Mac};
use sha2::Sha256;
type HmacSha256 = Hmac<Sha256>;

const SENSITIVE_HEADERS: [&str; 3] = ["authorization", "x-gitlab-token", "private-token"];

/// Check the `X-Gitlab-Token` header against the configured secret.
///
/// Always passes when no secret is configured. Both sides are MACed with the
/// secret so the final comparison runs in constant time.
pub fn validate_webhook_token(header_token: Option<&str>, secret: Option<&str>) -> bool {
    let secret = match secret {
        Some(s) if !s.is_empty() => s,
        _ => return true,
    };

    let valid = header_token.is_some_and(|token| {
        let expected = match HmacSha256::new_from_slice(secret.as_bytes()) {
            Ok(mut mac) => {
                mac.update(secret.as_bytes());
                mac.finalize().into_bytes()
            }
            Err(_) => return false,
        };
        let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(token.as_bytes());
        mac.verify_slice(&expected).is_ok()
    });

    if !valid {
        warn!("Invalid webhook token received");
    }
    valid
}

/// Header map suitable for logging, with credentials masked
pub fn sanitize_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let key = name.as_str().to_string();
            let shown = if SENSITIVE_HEADERS.contains(&key.as_str()) {
                "***".to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (key, shown)
        })
        .collect()
}
