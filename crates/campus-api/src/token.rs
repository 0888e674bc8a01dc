//! Compact HS256 bearer tokens (JWT layout).
//!
//! `base64url(header) . base64url(claims) . base64url(hmac_sha256(secret, header.claims))`
//!
//! Only HS256 is produced and accepted; the header is fixed.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Default validity of an issued token.
pub const DEFAULT_TTL_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum TokenError {
  #[error("malformed token")]
  Malformed,

  #[error("signature mismatch")]
  BadSignature,

  #[error("token expired")]
  Expired,

  #[error("invalid signing key")]
  Key,

  #[error("token lifetime out of range")]
  Lifetime,

  #[error("claims encoding: {0}")]
  Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
  /// The authenticated user.
  pub sub: Uuid,
  /// Issued-at, seconds since the epoch.
  pub iat: i64,
  /// Expiry, seconds since the epoch.
  pub exp: i64,
}

/// Issues and verifies tokens with a single shared secret.
#[derive(Clone)]
pub struct TokenSigner {
  secret: Vec<u8>,
  ttl:    Duration,
}

impl std::fmt::Debug for TokenSigner {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TokenSigner")
      .field("secret", &"<redacted>")
      .field("ttl", &self.ttl)
      .finish()
  }
}

impl TokenSigner {
  pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
    Self { secret: secret.as_ref().to_vec(), ttl }
  }

  fn mac(&self) -> Result<HmacSha256, TokenError> {
    HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::Key)
  }

  pub fn issue(&self, user_id: Uuid) -> Result<String, TokenError> {
    self.issue_at(user_id, Utc::now())
  }

  pub fn issue_at(
    &self,
    user_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<String, TokenError> {
    let expires = now
      .checked_add_signed(self.ttl)
      .ok_or(TokenError::Lifetime)?;
    let claims = Claims {
      sub: user_id,
      iat: now.timestamp(),
      exp: expires.timestamp(),
    };
    let signing_input = format!(
      "{}.{}",
      B64.encode(HEADER),
      B64.encode(serde_json::to_vec(&claims)?)
    );

    let mut mac = self.mac()?;
    mac.update(signing_input.as_bytes());
    let signature = B64.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature}"))
  }

  pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
    self.verify_at(token, Utc::now())
  }

  /// Check the signature first, then the expiry against `now`.
  pub fn verify_at(
    &self,
    token: &str,
    now: DateTime<Utc>,
  ) -> Result<Claims, TokenError> {
    let (signing_input, signature) =
      token.rsplit_once('.').ok_or(TokenError::Malformed)?;
    let (header, claims) =
      signing_input.split_once('.').ok_or(TokenError::Malformed)?;

    let signature = B64.decode(signature).map_err(|_| TokenError::Malformed)?;
    let mut mac = self.mac()?;
    mac.update(signing_input.as_bytes());
    mac
      .verify_slice(&signature)
      .map_err(|_| TokenError::BadSignature)?;

    let header = B64.decode(header).map_err(|_| TokenError::Malformed)?;
    if header != HEADER.as_bytes() {
      return Err(TokenError::Malformed);
    }

    let claims = B64.decode(claims).map_err(|_| TokenError::Malformed)?;
    let claims: Claims =
      serde_json::from_slice(&claims).map_err(|_| TokenError::Malformed)?;

    if claims.exp <= now.timestamp() {
      return Err(TokenError::Expired);
    }
    Ok(claims)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn signer() -> TokenSigner {
    TokenSigner::new("test-secret", Duration::days(DEFAULT_TTL_DAYS))
  }

  #[test]
  fn issued_token_verifies() {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let token = signer().issue_at(id, now).unwrap();

    assert_eq!(token.split('.').count(), 3);
    let claims = signer().verify_at(&token, now).unwrap();
    assert_eq!(claims.sub, id);
    assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
  }

  #[test]
  fn other_secret_is_rejected() {
    let token = signer().issue(Uuid::new_v4()).unwrap();
    let other = TokenSigner::new("another-secret", Duration::days(1));
    assert!(matches!(other.verify(&token), Err(TokenError::BadSignature)));
  }

  #[test]
  fn tampered_claims_are_rejected() {
    let token = signer().issue(Uuid::new_v4()).unwrap();
    let parts: Vec<&str> = token.split('.').collect();
    let forged_claims = B64.encode(
      serde_json::to_vec(&Claims { sub: Uuid::new_v4(), iat: 0, exp: i64::MAX })
        .unwrap(),
    );
    let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);
    assert!(matches!(signer().verify(&forged), Err(TokenError::BadSignature)));
  }

  #[test]
  fn expired_token_is_rejected() {
    let issued = Utc::now() - Duration::days(8);
    let token = signer().issue_at(Uuid::new_v4(), issued).unwrap();
    assert!(matches!(signer().verify(&token), Err(TokenError::Expired)));
  }

  #[test]
  fn unrepresentable_expiry_is_an_error() {
    let signer = TokenSigner::new("k", Duration::days(100_000_000));
    assert!(matches!(
      signer.issue(Uuid::new_v4()),
      Err(TokenError::Lifetime)
    ));
  }

  #[test]
  fn garbage_is_malformed() {
    for token in ["", "abc", "a.b", "!!.??.**"] {
      assert!(
        matches!(
          signer().verify(token),
          Err(TokenError::Malformed | TokenError::BadSignature)
        ),
        "{token:?}"
      );
    }
  }
}
