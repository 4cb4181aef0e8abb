//! Session tokens: HS256-signed compact JWTs carrying the subject class, id and expiry.

use crate::error::ApiError;
use crate::store::Operator;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Class name of the authenticated object.
    #[serde(rename = "class")]
    pub subject_class: String,
    #[serde(rename = "id")]
    pub subject_id: String,
    /// Unix seconds.
    pub expired_at: i64,
}

impl TokenClaims {
    pub fn new(subject_class: impl Into<String>, subject_id: impl Into<String>, expires: DateTime<Utc>) -> Self {
        TokenClaims {
            subject_class: subject_class.into(),
            subject_id: subject_id.into(),
            expired_at: expires.timestamp(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expired_at <= now.timestamp()
    }

    pub fn operator(&self) -> Operator {
        Operator {
            class_name: self.subject_class.clone(),
            id: self.subject_id.clone(),
        }
    }
}

pub trait TokenSigner: Send + Sync {
    fn sign(&self, claims: &TokenClaims) -> Result<String, ApiError>;

    /// Check signature and expiry, returning the claims.
    fn verify(&self, token: &str) -> Result<TokenClaims, ApiError>;
}

pub struct HmacSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner").finish_non_exhaustive()
    }
}

impl HmacSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        HmacSigner {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, signing_input: &str) -> Result<HmacSha256, ApiError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ApiError::Internal(format!("hmac key: {}", e)))?;
        mac.update(signing_input.as_bytes());
        Ok(mac)
    }
}

fn invalid() -> ApiError {
    ApiError::Authentication("authorization token is invalid".into())
}

impl TokenSigner for HmacSigner {
    fn sign(&self, claims: &TokenClaims) -> Result<String, ApiError> {
        let payload = serde_json::to_vec(claims).map_err(|e| ApiError::Internal(e.to_string()))?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = self.mac(&signing_input)?.finalize().into_bytes();
        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, ApiError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| invalid())?;
        self.mac(&format!("{}.{}", header, payload))?
            .verify_slice(&signature)
            .map_err(|_| invalid())?;

        let header: serde_json::Value = URL_SAFE_NO_PAD
            .decode(header)
            .ok()
            .and_then(|h| serde_json::from_slice(&h).ok())
            .ok_or_else(invalid)?;
        if header.get("alg").and_then(|a| a.as_str()) != Some("HS256") {
            return Err(invalid());
        }
        let claims: TokenClaims = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|p| serde_json::from_slice(&p).ok())
            .ok_or_else(invalid)?;
        if claims.is_expired_at(Utc::now()) {
            return Err(ApiError::Authentication("authorization token has expired".into()));
        }
        Ok(claims)
    }
}
