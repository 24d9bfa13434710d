use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::model::Role;

mod base64;

type Result<T> = std::result::Result<T, TokenError>;

const TOKEN_TYPE: &str = "JWT";
const ALGORITHM: &str = "HS256";

/// Compact HS256 session token. Issuance (login) lives with the identity
/// collaborator; this service only mints tokens in tests and verifies them
/// on every request.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionToken {
    pub claims: SessionClaims,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SessionClaims {
    /// User id the session belongs to.
    #[serde(rename = "sub")]
    pub subject: String,
    pub role: Role,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
struct Header {
    #[serde(rename = "typ")]
    token_type: String,
    #[serde(rename = "alg")]
    algorithm: String,
}

impl SessionToken {
    pub fn new(subject: String, role: Role) -> Self {
        Self {
            claims: SessionClaims { subject, role },
        }
    }

    pub fn encode(&self, secret: &[u8]) -> String {
        let header = Header {
            token_type: TOKEN_TYPE.into(),
            algorithm: ALGORITHM.into(),
        };
        let body = format!(
            "{}.{}",
            base64::encode(&serde_json::to_vec(&header).unwrap()),
            base64::encode(&serde_json::to_vec(&self.claims).unwrap()),
        );
        let signature = sign(body.as_bytes(), secret);
        format!("{}.{}", body, signature)
    }

    pub fn decode(token: &str, secret: &[u8]) -> Result<Self> {
        let parts: Vec<&str> = token.split('.').collect();
        let [header, claims, signature] = parts.as_slice() else {
            return Err(TokenError::Malformed);
        };

        let body = format!("{}.{}", header, claims);
        if sign(body.as_bytes(), secret) != *signature {
            return Err(TokenError::Signature);
        }

        let header = base64::decode(header).ok_or(TokenError::Base64)?;
        let header: Header =
            serde_json::from_slice(&header).map_err(|_| TokenError::Json)?;
        if header.token_type != TOKEN_TYPE || header.algorithm != ALGORITHM {
            return Err(TokenError::Algorithm);
        }

        let claims = base64::decode(claims).ok_or(TokenError::Base64)?;
        let claims = serde_json::from_slice(&claims).map_err(|_| TokenError::Json)?;
        Ok(Self { claims })
    }
}

fn sign(body: &[u8], secret: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(body);
    base64::encode(&mac.finalize().into_bytes())
}

#[derive(Debug, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    Base64,
    Json,
    Signature,
    Algorithm,
}

impl Display for TokenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            TokenError::Malformed => "session token: not a three-part token",
            TokenError::Base64 => "session token: failed to decode base64",
            TokenError::Json => "session token: failed to decode JSON",
            TokenError::Signature => "session token: signature did not match",
            TokenError::Algorithm => "session token: unsupported algorithm",
        };
        f.write_str(msg)
    }
}

impl Error for TokenError {}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn it_should_round_trip_a_token() {
        let token = SessionToken::new("user-1234".into(), Role::Customer);
        let encoded = token.encode(SECRET);
        assert_eq!(SessionToken::decode(&encoded, SECRET), Ok(token));
    }

    #[test]
    fn it_should_reject_a_wrong_secret() {
        let encoded = SessionToken::new("user-1234".into(), Role::SubAdmin).encode(SECRET);
        assert_eq!(
            SessionToken::decode(&encoded, b"other-secret"),
            Err(TokenError::Signature)
        );
    }

    #[test]
    fn it_should_reject_a_tampered_payload() {
        let encoded = SessionToken::new("user-1234".into(), Role::Customer).encode(SECRET);
        let forged_claims = base64::encode(
            &serde_json::to_vec(&SessionClaims {
                subject: "user-1234".into(),
                role: Role::SuperAdmin,
            })
            .unwrap(),
        );

        let mut parts: Vec<&str> = encoded.split('.').collect();
        parts[1] = &forged_claims;
        let forged = parts.join(".");

        assert_eq!(
            SessionToken::decode(&forged, SECRET),
            Err(TokenError::Signature)
        );
    }

    #[test]
    fn it_should_reject_a_truncated_token() {
        assert_eq!(
            SessionToken::decode("one.two", SECRET),
            Err(TokenError::Malformed)
        );
    }
}
