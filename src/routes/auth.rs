use actix_web::{HttpResponse, get, http::StatusCode, post, web};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use validator::Validate;

use crate::middleware::AuthUser;
use crate::models::dto::ServiceResponse;
use crate::services::auth_service::AuthenticationService;

// DTO pour la connexion (username OU email accepté)
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub method: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

// DTO pour l'inscription
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    pub method: String,
    #[validate(email)]
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirmRequest {
    pub token: String,
    pub new_password: String,
}

/// Traduit l'enveloppe de service en réponse HTTP :
/// succès -> data (ou {message} si pas de data), échec -> {message}
fn to_http_response(resp: ServiceResponse) -> HttpResponse {
    let status =
        StatusCode::from_u16(resp.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = HttpResponse::build(status);

    if resp.success {
        match resp.data {
            Some(data) => builder.json(data),
            None => builder.json(serde_json::json!({ "message": resp.message })),
        }
    } else {
        builder.json(serde_json::json!({ "message": resp.message }))
    }
}

/// POST /api/auth/login - Se connecter (PUBLIC)
#[post("/login")]
pub async fn login(
    body: web::Json<LoginRequest>,
    db: web::Data<DatabaseConnection>,
    service: web::Data<AuthenticationService>,
) -> HttpResponse {
    // username et email sont interchangeables pour la méthode password
    let username = body.username.as_deref().or(body.email.as_deref());

    let resp = service
        .signin(db.get_ref(), &body.method, username, body.password.as_deref())
        .await;

    to_http_response(resp)
}

/// POST /api/auth/sign-up - Créer un compte (PUBLIC)
#[post("/sign-up")]
pub async fn sign_up(
    body: web::Json<SignupRequest>,
    db: web::Data<DatabaseConnection>,
    service: web::Data<AuthenticationService>,
) -> HttpResponse {
    if body.validate().is_err() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Invalid email address"
        }));
    }

    let resp = service
        .signup(
            db.get_ref(),
            &body.method,
            body.email.as_deref(),
            body.password.as_deref(),
            body.first_name.as_deref(),
            body.last_name.as_deref(),
        )
        .await;

    to_http_response(resp)
}

/// GET /api/auth/verify-email?token=xxx - Vérifier l'email (PUBLIC)
#[get("/verify-email")]
pub async fn verify_email(
    query: web::Query<VerifyEmailQuery>,
    db: web::Data<DatabaseConnection>,
    service: web::Data<AuthenticationService>,
) -> HttpResponse {
    let resp = service.verify_email(db.get_ref(), &query.token).await;
    to_http_response(resp)
}

/// POST /api/auth/resend-verification - Renvoyer le lien (PROTÉGÉE)
#[post("/resend-verification")]
pub async fn resend_verification(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
    service: web::Data<AuthenticationService>,
) -> HttpResponse {
    let resp = service
        .resend_verification(db.get_ref(), auth_user.user_id)
        .await;
    to_http_response(resp)
}

/// POST /api/auth/password-reset - Demander un reset (PUBLIC)
#[post("/password-reset")]
pub async fn password_reset(
    body: web::Json<PasswordResetRequest>,
    db: web::Data<DatabaseConnection>,
    service: web::Data<AuthenticationService>,
) -> HttpResponse {
    if body.validate().is_err() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Invalid email address"
        }));
    }

    let resp = service.reset_password(db.get_ref(), &body.email).await;
    to_http_response(resp)
}

/// POST /api/auth/password-reset-confirm - Confirmer le reset (PUBLIC)
#[post("/password-reset-confirm")]
pub async fn password_reset_confirm(
    body: web::Json<PasswordResetConfirmRequest>,
    db: web::Data<DatabaseConnection>,
    service: web::Data<AuthenticationService>,
) -> HttpResponse {
    let resp = service
        .confirm_password_reset(db.get_ref(), &body.token, &body.new_password)
        .await;
    to_http_response(resp)
}

pub fn auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(login)
            .service(sign_up)
            .service(verify_email)
            .service(resend_verification)
            .service(password_reset)
            .service(password_reset_confirm),
    );
}
