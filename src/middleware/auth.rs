use actix_web::{Error, FromRequest, HttpRequest, HttpResponse, dev::Payload, web};
use futures::future::{Ready, ready};
use serde::{Deserialize, Serialize};

use crate::services::auth_service::AuthenticationService;

/// Structure qui contient les infos de l'utilisateur authentifié
/// Utilisée comme extracteur dans les routes protégées
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub email: String,
    pub role: String,
    pub profile_id: Option<i32>,
}

fn unauthorized(message: &str) -> Error {
    let response = HttpResponse::Unauthorized().json(serde_json::json!({
        "message": message
    }));
    actix_web::error::InternalError::from_response("", response).into()
}

/// Implémentation de FromRequest pour AuthUser
/// Cela permet à Actix-Web d'extraire automatiquement AuthUser des requêtes
impl FromRequest for AuthUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        // 1. Extraire le header Authorization
        let auth_header = match req.headers().get("Authorization") {
            Some(header) => header,
            None => return ready(Err(unauthorized("Missing Authorization header"))),
        };

        let auth_str = match auth_header.to_str() {
            Ok(s) => s,
            Err(_) => return ready(Err(unauthorized("Invalid Authorization header"))),
        };

        // 2. Extraire le token (format: "Bearer <token>")
        let token = match auth_str.strip_prefix("Bearer ") {
            Some(token) => token,
            None => {
                return ready(Err(unauthorized(
                    "Invalid Authorization format (expected: Bearer <token>)",
                )));
            }
        };

        // 3. Vérifier l'access token via le service
        let service = match req.app_data::<web::Data<AuthenticationService>>() {
            Some(service) => service,
            None => return ready(Err(unauthorized("Authentication service unavailable"))),
        };

        let claims = match service.decode_access(token) {
            Ok(claims) => claims,
            // le détail de l'échec reste côté serveur
            Err(_) => return ready(Err(unauthorized("Invalid or expired token"))),
        };

        ready(Ok(AuthUser {
            user_id: claims.user_id,
            email: claims.email,
            role: claims.role,
            profile_id: claims.profile_id,
        }))
    }
}
