use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::clock::Clock;

/// Type d'un token à usage déterminé (vérification email ou reset password).
/// Chaque type a sa propre durée de validité.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurposeTokenType {
    EmailVerification,
    PasswordReset,
}

impl PurposeTokenType {
    /// Durée de validité : 24h pour la vérification email, 1h pour le reset
    /// password (plus court par sécurité)
    fn validity(&self) -> Duration {
        match self {
            PurposeTokenType::EmailVerification => Duration::hours(24),
            PurposeTokenType::PasswordReset => Duration::hours(1),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Malformed,
    #[error("Invalid token type")]
    TypeMismatch,
}

/// Payload signé d'un token à usage déterminé
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct PurposeClaims {
    pub user_id: i32,
    pub token_type: PurposeTokenType,
    pub iat: i64,
    pub exp: i64,
}

/// Codec sans état : encode/décode des tokens signés, typés et expirants.
/// Aucun effet de bord réseau ou BD. L'heure courante vient de l'horloge
/// injectée, pas de la validation interne de jsonwebtoken.
pub struct TokenCodec {
    secret: String,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(secret: String, clock: Arc<dyn Clock>) -> Self {
        TokenCodec { secret, clock }
    }

    /// Génère un token signé pour un utilisateur et un type donnés
    pub fn issue(&self, user_id: i32, token_type: PurposeTokenType) -> Result<String, TokenError> {
        let now = self.clock.now();
        let claims = PurposeClaims {
            user_id,
            token_type,
            iat: now.timestamp(),
            exp: (now + token_type.validity()).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
        .map_err(|_| TokenError::Malformed)
    }

    /// Vérifie signature, expiration et type, puis retourne le payload.
    /// L'expiration est comparée à l'horloge injectée : un token dont `exp`
    /// est atteint ou dépassé est rejeté.
    pub fn verify(
        &self,
        token: &str,
        expected_type: PurposeTokenType,
    ) -> Result<PurposeClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<PurposeClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &validation,
        )
        .map_err(|_| TokenError::Malformed)?;

        let claims = data.claims;

        if self.clock.now().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        if claims.token_type != expected_type {
            return Err(TokenError::TypeMismatch);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::FixedClock;
    use chrono::{TimeZone, Utc};

    fn codec_at(secret: &str, ts: chrono::DateTime<Utc>) -> TokenCodec {
        TokenCodec::new(secret.to_string(), Arc::new(FixedClock(ts)))
    }

    #[test]
    fn test_issue_and_verify_roundtrip() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let codec = codec_at("secret", t0);

        let token = codec.issue(42, PurposeTokenType::EmailVerification).unwrap();
        let claims = codec
            .verify(&token, PurposeTokenType::EmailVerification)
            .unwrap();

        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.token_type, PurposeTokenType::EmailVerification);
        assert_eq!(claims.exp, (t0 + Duration::hours(24)).timestamp());
    }

    #[test]
    fn test_token_type_isolation() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let codec = codec_at("secret", t0);

        let reset = codec.issue(1, PurposeTokenType::PasswordReset).unwrap();
        let verif = codec.issue(1, PurposeTokenType::EmailVerification).unwrap();

        assert_eq!(
            codec.verify(&reset, PurposeTokenType::EmailVerification),
            Err(TokenError::TypeMismatch)
        );
        assert_eq!(
            codec.verify(&verif, PurposeTokenType::PasswordReset),
            Err(TokenError::TypeMismatch)
        );
    }

    #[test]
    fn test_expiry_boundary() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let token = codec_at("secret", t0)
            .issue(7, PurposeTokenType::PasswordReset)
            .unwrap();
        let exp = t0 + Duration::hours(1);

        // 1 seconde avant l'expiration : accepté
        let just_before = codec_at("secret", exp - Duration::seconds(1));
        assert!(
            just_before
                .verify(&token, PurposeTokenType::PasswordReset)
                .is_ok()
        );

        // à l'expiration exacte : rejeté
        let at_exp = codec_at("secret", exp);
        assert_eq!(
            at_exp.verify(&token, PurposeTokenType::PasswordReset),
            Err(TokenError::Expired)
        );

        // bien après : rejeté aussi
        let after = codec_at("secret", exp + Duration::hours(5));
        assert_eq!(
            after.verify(&token, PurposeTokenType::PasswordReset),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_malformed_token() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let codec = codec_at("secret", t0);

        assert_eq!(
            codec.verify("not.a.token", PurposeTokenType::EmailVerification),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let token = codec_at("secret-a", t0)
            .issue(7, PurposeTokenType::EmailVerification)
            .unwrap();

        let other = codec_at("secret-b", t0);
        assert_eq!(
            other.verify(&token, PurposeTokenType::EmailVerification),
            Err(TokenError::Malformed)
        );
    }
}
