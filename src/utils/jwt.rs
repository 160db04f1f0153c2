use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::models::{user_profiles, users};
use crate::utils::clock::Clock;

/// Durées de vie des tokens de session (valeurs par défaut de SimpleJWT)
pub const ACCESS_TOKEN_LIFETIME_MINUTES: i64 = 5;
pub const REFRESH_TOKEN_LIFETIME_HOURS: i64 = 24;

/// Claims embarqués dans les tokens de session (access et refresh).
/// `profile_id` est un claim absent (pas null) quand l'utilisateur n'a pas
/// de profil.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: i32,
    pub email: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

/// Paire de tokens retournée après authentification
#[derive(Debug, Serialize)]
pub struct SessionPair {
    pub refresh: String,
    pub access: String,
}

/// Construit les paires access/refresh pour une identité déjà authentifiée.
/// L'access token est dérivé des claims du refresh : tout claim présent sur
/// le refresh est présent et identique sur l'access.
pub struct SessionIssuer {
    secret: String,
    clock: Arc<dyn Clock>,
}

impl SessionIssuer {
    pub fn new(secret: String, clock: Arc<dyn Clock>) -> Self {
        SessionIssuer { secret, clock }
    }

    /// Génère la paire de tokens de session.
    /// Le rôle retombe sur "user" s'il n'est pas renseigné.
    pub fn issue(
        &self,
        user: &users::Model,
        profile: Option<&user_profiles::Model>,
    ) -> Result<SessionPair, String> {
        let now = self.clock.now();

        // 1. Construire les claims du refresh token
        let refresh_claims = SessionClaims {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role.clone().unwrap_or_else(|| "user".to_string()),
            profile_id: profile.map(|p| p.id),
            email_verified: profile.map(|p| p.email_verified),
            token_type: "refresh".to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(REFRESH_TOKEN_LIFETIME_HOURS)).timestamp(),
        };

        // 2. Dériver l'access token des mêmes claims (seuls le type et
        //    l'expiration changent)
        let mut access_claims = refresh_claims.clone();
        access_claims.token_type = "access".to_string();
        access_claims.exp = (now + Duration::minutes(ACCESS_TOKEN_LIFETIME_MINUTES)).timestamp();

        let key = EncodingKey::from_secret(self.secret.as_ref());
        let refresh = encode(&Header::default(), &refresh_claims, &key)
            .map_err(|e| format!("Failed to generate refresh token: {}", e))?;
        let access = encode(&Header::default(), &access_claims, &key)
            .map_err(|e| format!("Failed to generate access token: {}", e))?;

        Ok(SessionPair { refresh, access })
    }

    /// Vérifie et décode un access token (utilisé par l'extracteur AuthUser)
    pub fn decode_access(&self, token: &str) -> Result<SessionClaims, String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &validation,
        )
        .map_err(|e| format!("Invalid token: {}", e))?;

        let claims = data.claims;

        if self.clock.now().timestamp() >= claims.exp {
            return Err("Token has expired".to_string());
        }
        if claims.token_type != "access" {
            return Err("Invalid token type".to_string());
        }

        Ok(claims)
    }
}
