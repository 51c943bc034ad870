//! Short-lived credentials scoped to a single room topic.
//!
//! Token format: `base64url(json claims).base64url(hmac_sha256(json claims))`.

use crate::error::{GameError, GameResult};
use crate::types::Capability;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Longest lifetime a credential may be issued with
pub const MAX_CREDENTIAL_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// What a credential lets its holder do
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub client_id: String,
    pub topic: String,
    pub capabilities: Vec<Capability>,
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    pub fn allows(&self, topic: &str, capability: Capability) -> bool {
        self.topic == topic && self.capabilities.contains(&capability)
    }
}

/// A signed token plus its decoded claims, as handed to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub client_id: String,
    pub topic: String,
    pub capabilities: Vec<Capability>,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies room credentials with a shared secret
#[derive(Clone)]
pub struct CredentialIssuer {
    secret: Vec<u8>,
    lifetime: chrono::Duration,
}

impl std::fmt::Debug for CredentialIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialIssuer")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl CredentialIssuer {
    pub fn new(secret: impl Into<Vec<u8>>, lifetime: Duration) -> GameResult<Self> {
        let secret = secret.into();
        if secret.len() < 16 {
            return Err(GameError::Configuration(
                "credential secret must be at least 16 bytes".to_string(),
            ));
        }
        Ok(Self {
            secret,
            lifetime: checked_lifetime(lifetime)?,
        })
    }

    /// Issuer with a random secret; tokens die with the process
    pub fn ephemeral(lifetime: Duration) -> GameResult<Self> {
        let mut secret = vec![0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        Self::new(secret, lifetime)
    }

    /// Sign a credential for one client on one topic
    pub fn issue(
        &self,
        client_id: &str,
        topic: &str,
        capabilities: &[Capability],
    ) -> GameResult<Credential> {
        let claims = Claims {
            client_id: client_id.to_string(),
            topic: topic.to_string(),
            capabilities: capabilities.to_vec(),
            expires_at: Utc::now() + self.lifetime,
        };

        let payload = serde_json::to_vec(&claims)
            .map_err(|e| GameError::Infrastructure(format!("cannot encode claims: {}", e)))?;
        let signature = self.sign(&payload)?;
        let token = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature)
        );

        Ok(Credential {
            token,
            client_id: claims.client_id,
            topic: claims.topic,
            capabilities: claims.capabilities,
            expires_at: claims.expires_at,
        })
    }

    /// Check signature and expiry, returning the claims
    pub fn verify(&self, token: &str) -> GameResult<Claims> {
        let invalid = || GameError::Forbidden("Invalid credential".to_string());

        let (payload_b64, signature_b64) = token.split_once('.').ok_or_else(invalid)?;
        let payload = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| invalid())?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| invalid())?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        mac.verify_slice(&signature).map_err(|_| invalid())?;

        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| invalid())?;
        if claims.expires_at <= Utc::now() {
            return Err(GameError::Forbidden("Credential expired".to_string()));
        }
        Ok(claims)
    }

    fn mac(&self) -> GameResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| GameError::Configuration(format!("bad credential secret: {}", e)))
    }

    fn sign(&self, payload: &[u8]) -> GameResult<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn checked_lifetime(lifetime: Duration) -> GameResult<chrono::Duration> {
    if lifetime > MAX_CREDENTIAL_LIFETIME {
        return Err(GameError::Configuration(format!(
            "credential lifetime must be at most {} seconds",
            MAX_CREDENTIAL_LIFETIME.as_secs()
        )));
    }
    chrono::Duration::from_std(lifetime).map_err(|e| GameError::Configuration(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MEMBER_CAPABILITIES;

    fn issuer() -> CredentialIssuer {
        CredentialIssuer::new("0123456789abcdef-test", Duration::from_secs(60)).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = issuer();
        let cred = issuer
            .issue("player-1", "room:ABCD", MEMBER_CAPABILITIES)
            .unwrap();

        let claims = issuer.verify(&cred.token).unwrap();
        assert_eq!(claims.client_id, "player-1");
        assert!(claims.allows("room:ABCD", Capability::Subscribe));
        assert!(claims.allows("room:ABCD", Capability::Presence));
        assert!(!claims.allows("room:WXYZ", Capability::Subscribe));
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let issuer = issuer();
        let cred = issuer
            .issue("player-1", "room:ABCD", &[Capability::Subscribe])
            .unwrap();

        let (_, sig) = cred.token.split_once('.').unwrap();
        let forged_claims = Claims {
            client_id: "player-1".to_string(),
            topic: "room:WXYZ".to_string(),
            capabilities: vec![Capability::Subscribe],
            expires_at: cred.expires_at,
        };
        let forged = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap()),
            sig
        );
        assert!(issuer.verify(&forged).is_err());
        assert!(issuer.verify("garbage").is_err());
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let cred = issuer()
            .issue("player-1", "room:ABCD", MEMBER_CAPABILITIES)
            .unwrap();
        let other = CredentialIssuer::ephemeral(Duration::from_secs(60)).unwrap();
        assert!(other.verify(&cred.token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let issuer = CredentialIssuer::new("0123456789abcdef-test", Duration::ZERO).unwrap();
        let cred = issuer
            .issue("player-1", "room:ABCD", MEMBER_CAPABILITIES)
            .unwrap();
        assert_eq!(
            issuer.verify(&cred.token).unwrap_err(),
            GameError::Forbidden("Credential expired".to_string())
        );
    }

    #[test]
    fn test_short_secret_is_a_configuration_error() {
        assert!(matches!(
            CredentialIssuer::new("short", Duration::from_secs(60)),
            Err(GameError::Configuration(_))
        ));
    }

    #[test]
    fn test_oversized_lifetime_is_a_configuration_error() {
        let too_long = MAX_CREDENTIAL_LIFETIME + Duration::from_secs(1);
        assert!(matches!(
            CredentialIssuer::new("0123456789abcdef-test", too_long),
            Err(GameError::Configuration(_))
        ));
        assert!(CredentialIssuer::ephemeral(Duration::from_secs(u64::MAX)).is_err());
        assert!(CredentialIssuer::ephemeral(MAX_CREDENTIAL_LIFETIME).is_ok());
    }
}
