//! HS256 access tokens in the media provider's format.
//!
//! The provider validates `iss` against the API key it issued and the
//! signature against the matching secret; the `video` grant scopes the
//! holder to one room.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::CryptoError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    typ: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    pub room: String,
    pub room_join: bool,
    pub can_publish: bool,
    pub can_subscribe: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaClaims {
    /// API key.
    pub iss: String,
    /// Participant identity.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub nbf: i64,
    pub exp: i64,
    pub video: VideoGrant,
}

impl MediaClaims {
    /// Join grant for `room`, valid from `now` for `ttl_secs`.
    pub fn join(api_key: &str, identity: &str, room: &str, now: i64, ttl_secs: i64) -> Self {
        Self {
            iss: api_key.to_string(),
            sub: identity.to_string(),
            name: None,
            nbf: now,
            exp: now + ttl_secs,
            video: VideoGrant {
                room: room.to_string(),
                room_join: true,
                can_publish: true,
                can_subscribe: true,
            },
        }
    }
}

fn sign(secret: &[u8], message: &str) -> Result<Vec<u8>, CryptoError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| CryptoError::InvalidKey)?;
    mac.update(message.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn sign_media_token(secret: &str, claims: &MediaClaims) -> Result<String, CryptoError> {
    if secret.is_empty() {
        return Err(CryptoError::InvalidKey);
    }
    let header = JwtHeader {
        alg: "HS256".to_string(),
        typ: "JWT".to_string(),
    };
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_string(&header)?);
    let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_string(claims)?);
    let message = format!("{header_b64}.{claims_b64}");
    let signature = URL_SAFE_NO_PAD.encode(sign(secret.as_bytes(), &message)?);
    Ok(format!("{message}.{signature}"))
}

/// Check signature and validity window, returning the claims. Only the
/// media provider verifies these in production.
#[cfg(test)]
pub fn verify_media_token(secret: &str, token: &str, now: i64) -> Result<MediaClaims, CryptoError> {
    use subtle::ConstantTimeEq;

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(CryptoError::MalformedToken);
    }

    let message = format!("{}.{}", parts[0], parts[1]);
    let expected = sign(secret.as_bytes(), &message)?;
    let provided = URL_SAFE_NO_PAD
        .decode(parts[2])
        .map_err(|_| CryptoError::MalformedToken)?;
    if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
        return Err(CryptoError::BadSignature);
    }

    let claims_json = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|_| CryptoError::MalformedToken)?;
    let claims: MediaClaims = serde_json::from_slice(&claims_json)?;
    if now < claims.nbf || now >= claims.exp {
        return Err(CryptoError::Expired);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-media-secret";

    #[test]
    fn signed_token_verifies() {
        let claims = MediaClaims::join("APIkey", "user-1", "appt_42", 1_000, 3600);
        let token = sign_media_token(SECRET, &claims).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let decoded = verify_media_token(SECRET, &token, 1_500).unwrap();
        assert_eq!(decoded, claims);
        assert_eq!(decoded.exp - decoded.nbf, 3600);
        assert!(decoded.video.room_join);
    }

    #[test]
    fn grant_serializes_camel_case() {
        let claims = MediaClaims::join("APIkey", "user-1", "appt_42", 0, 60);
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["video"]["roomJoin"], true);
        assert_eq!(json["video"]["canPublish"], true);
        assert_eq!(json["video"]["room"], "appt_42");
        assert!(json.get("name").is_none());
    }

    #[test]
    fn wrong_secret_rejected() {
        let claims = MediaClaims::join("APIkey", "user-1", "appt_1", 0, 60);
        let token = sign_media_token(SECRET, &claims).unwrap();
        let err = verify_media_token("other-secret", &token, 10).unwrap_err();
        assert!(matches!(err, CryptoError::BadSignature));
    }

    #[test]
    fn expired_token_rejected() {
        let claims = MediaClaims::join("APIkey", "user-1", "appt_1", 0, 60);
        let token = sign_media_token(SECRET, &claims).unwrap();
        assert!(matches!(
            verify_media_token(SECRET, &token, 60).unwrap_err(),
            CryptoError::Expired
        ));
    }

    #[test]
    fn empty_secret_refused() {
        let claims = MediaClaims::join("APIkey", "user-1", "appt_1", 0, 60);
        assert!(matches!(
            sign_media_token("", &claims).unwrap_err(),
            CryptoError::InvalidKey
        ));
    }
}
