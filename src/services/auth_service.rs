use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};

use crate::config::AuthConfig;
use crate::models::dto::ServiceResponse;
use crate::models::user_profiles::{
    self, Column as ProfileColumn, Entity as UserProfiles,
};
use crate::models::users::{self, Column as UserColumn, Entity as Users};
use crate::services::emails::{AccountEmails, EmailSender};
use crate::services::oauth::OAuthProvider;
use crate::utils::clock::Clock;
use crate::utils::jwt::{SessionClaims, SessionIssuer};
use crate::utils::password;
use crate::utils::token::{PurposeTokenType, TokenCodec};

/// Méthodes d'authentification supportées par signin/signup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Password,
    Google,
    Facebook,
}

impl AuthMethod {
    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "password" => Some(AuthMethod::Password),
            "google" => Some(AuthMethod::Google),
            "facebook" => Some(AuthMethod::Facebook),
            _ => None,
        }
    }
}

/// Message unique pour toutes les demandes de reset : ne révèle jamais si
/// le compte existe
const RESET_REQUEST_MESSAGE: &str =
    "If an account with this email exists, a password reset link has been sent";

/// Service d'authentification : signin/signup, vérification email, reset
/// password. Les collaborateurs (codec, émetteur de sessions, emails,
/// horloge) sont injectés au constructeur ; la connexion BD est passée à
/// chaque appel. Toutes les méthodes publiques retournent une enveloppe
/// ServiceResponse : les erreurs inattendues sont loggées puis converties
/// en 500 générique, jamais propagées au client.
pub struct AuthenticationService {
    config: AuthConfig,
    codec: TokenCodec,
    sessions: SessionIssuer,
    emails: AccountEmails,
    clock: Arc<dyn Clock>,
    google_provider: Option<Arc<dyn OAuthProvider>>,
    facebook_provider: Option<Arc<dyn OAuthProvider>>,
}

impl AuthenticationService {
    pub fn new(config: AuthConfig, sender: Arc<dyn EmailSender>, clock: Arc<dyn Clock>) -> Self {
        let codec = TokenCodec::new(config.secret_key.clone(), clock.clone());
        let sessions = SessionIssuer::new(config.secret_key.clone(), clock.clone());
        let emails = AccountEmails::new(sender, config.templates_dir.clone());

        AuthenticationService {
            config,
            codec,
            sessions,
            emails,
            clock,
            // Contrat OAuthProvider défini, aucun fournisseur branché
            google_provider: None,
            facebook_provider: None,
        }
    }

    /// Décodage d'un access token pour l'extracteur AuthUser
    pub fn decode_access(&self, token: &str) -> Result<SessionClaims, String> {
        self.sessions.decode_access(token)
    }

    // ------------------------------------------------------------------
    // Signin
    // ------------------------------------------------------------------

    /// Dispatch du signin selon la méthode ('password', 'google', 'facebook')
    pub async fn signin(
        &self,
        db: &DatabaseConnection,
        method: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> ServiceResponse {
        match AuthMethod::parse(method) {
            Some(AuthMethod::Password) => {
                let (Some(username), Some(password)) = (username, password) else {
                    return ServiceResponse::error("Invalid username or password", 401);
                };
                self.signin_with_password(db, username, password).await
            }
            Some(AuthMethod::Google) => self.oauth_unavailable(&self.google_provider, "Google"),
            Some(AuthMethod::Facebook) => {
                self.oauth_unavailable(&self.facebook_provider, "Facebook")
            }
            None => ServiceResponse::error(
                "Invalid signin method. Use 'password', 'google', or 'facebook'",
                400,
            ),
        }
    }

    // Les branches google/facebook suivent le contrat OAuthProvider ; tant
    // qu'aucun fournisseur n'est branché elles répondent 400 sans tenter
    // l'échange de token.
    fn oauth_unavailable(
        &self,
        provider: &Option<Arc<dyn OAuthProvider>>,
        label: &str,
    ) -> ServiceResponse {
        if provider.is_some() {
            log::warn!(
                "{}: fournisseur configuré mais le flux OAuth n'est pas implémenté",
                label
            );
        }
        ServiceResponse::error(&format!("{} sign-in is not available", label), 400)
    }

    async fn signin_with_password(
        &self,
        db: &DatabaseConnection,
        username: &str,
        password: &str,
    ) -> ServiceResponse {
        // 1. Chercher l'identité par handle ou email. Compte introuvable et
        //    mauvais mot de passe donnent la MÊME erreur (anti-énumération).
        let user = match Users::find()
            .filter(
                Condition::any()
                    .add(UserColumn::Username.eq(username))
                    .add(UserColumn::Email.eq(username)),
            )
            .one(db)
            .await
        {
            Ok(Some(user)) => user,
            Ok(None) => return ServiceResponse::error("Invalid username or password", 401),
            Err(e) => {
                log::error!("signin: erreur BD pendant la recherche de l'utilisateur: {}", e);
                return ServiceResponse::internal_error();
            }
        };

        if !user.is_active {
            return ServiceResponse::error("Invalid username or password", 401);
        }

        // 2. Vérifier le mot de passe
        let Some(stored_hash) = user.password_hash.as_deref() else {
            return ServiceResponse::error("Invalid username or password", 401);
        };

        match password::verify_password(password, stored_hash) {
            Ok(true) => {}
            Ok(false) => return ServiceResponse::error("Invalid username or password", 401),
            Err(e) => {
                log::error!("signin: erreur de vérification du mot de passe: {}", e);
                return ServiceResponse::internal_error();
            }
        }

        // 3. Charger le profil (peut être absent) puis émettre la paire
        let profile = match UserProfiles::find()
            .filter(ProfileColumn::UserId.eq(user.id))
            .one(db)
            .await
        {
            Ok(profile) => profile,
            Err(e) => {
                log::error!("signin: erreur BD pendant le chargement du profil: {}", e);
                return ServiceResponse::internal_error();
            }
        };

        match self.sessions.issue(&user, profile.as_ref()) {
            Ok(pair) => ServiceResponse::ok(
                "signin successful",
                Some(serde_json::json!({
                    "refresh": pair.refresh,
                    "access": pair.access,
                })),
                200,
            ),
            Err(e) => {
                log::error!("signin: émission des tokens de session impossible: {}", e);
                ServiceResponse::internal_error()
            }
        }
    }

    // ------------------------------------------------------------------
    // Signup
    // ------------------------------------------------------------------

    /// Dispatch du signup selon la méthode
    pub async fn signup(
        &self,
        db: &DatabaseConnection,
        method: &str,
        email: Option<&str>,
        password: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> ServiceResponse {
        match AuthMethod::parse(method) {
            Some(AuthMethod::Password) => {
                let (Some(email), Some(password)) = (email, password) else {
                    return ServiceResponse::error("Email and password are required", 400);
                };
                self.signup_with_password(db, email, password, first_name, last_name)
                    .await
            }
            Some(AuthMethod::Google) => self.oauth_unavailable(&self.google_provider, "Google"),
            Some(AuthMethod::Facebook) => {
                self.oauth_unavailable(&self.facebook_provider, "Facebook")
            }
            None => ServiceResponse::error(
                "Invalid signup method. Use 'password', 'google', or 'facebook'",
                400,
            ),
        }
    }

    async fn signup_with_password(
        &self,
        db: &DatabaseConnection,
        email: &str,
        password: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> ServiceResponse {
        // 1. Refuser les emails déjà pris (la contrainte d'unicité en BD
        //    couvre la course entre ce check et l'insert)
        match Users::find()
            .filter(UserColumn::Email.eq(email))
            .one(db)
            .await
        {
            Ok(Some(_)) => {
                return ServiceResponse::error("User with this email already exists", 400);
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("signup: erreur BD pendant le check de doublon: {}", e);
                return ServiceResponse::internal_error();
            }
        }

        // 2. Politique de mot de passe
        if let Err(message) = password::validate_password_strength(password, email) {
            return ServiceResponse::error(&message, 400);
        }

        let hash = match password::hash_password(password) {
            Ok(hash) => hash,
            Err(e) => {
                log::error!("signup: échec du hash du mot de passe: {}", e);
                return ServiceResponse::internal_error();
            }
        };

        // 3. Créer l'utilisateur ET son profil dans une seule transaction
        let now = self.clock.now().naive_utc();
        let username = email.to_string();
        let email_owned = email.to_string();
        let first = first_name.map(|s| s.to_string());
        let last = last_name.map(|s| s.to_string());

        let created = db
            .transaction::<_, (users::Model, user_profiles::Model), DbErr>(move |txn| {
                Box::pin(async move {
                    let user = users::ActiveModel {
                        username: Set(username),
                        email: Set(email_owned),
                        password_hash: Set(Some(hash)),
                        first_name: Set(first),
                        last_name: Set(last),
                        role: Set(Some("user".to_string())),
                        is_active: Set(true),
                        is_staff: Set(false),
                        is_superuser: Set(false),
                        date_joined: Set(Some(now)),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    let profile = user_profiles::ActiveModel {
                        user_id: Set(user.id),
                        email_verified: Set(false),
                        created_at: Set(Some(now)),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    Ok((user, profile))
                })
            })
            .await;

        let (user, mut profile) = match created {
            Ok(created) => created,
            Err(e) => {
                log::error!("signup: création utilisateur/profil échouée: {}", e);
                return ServiceResponse::internal_error();
            }
        };

        // 4. Token de vérification + email de bienvenue, APRÈS le commit.
        //    Best-effort : un échec ici n'annule pas la création du compte.
        let mut verification_email_sent = false;
        match self
            .codec
            .issue(user.id, PurposeTokenType::EmailVerification)
        {
            Ok(token) => {
                let mut active: user_profiles::ActiveModel = profile.clone().into();
                active.email_verification_token = Set(Some(token.clone()));
                active.email_verification_sent_at = Set(Some(self.clock.now().naive_utc()));

                match active.update(db).await {
                    Ok(updated) => {
                        profile = updated;
                        let link = self.verification_link(&token);
                        let first_name = user.first_name.clone().unwrap_or_default();
                        verification_email_sent = self
                            .emails
                            .send_welcome_email(&user.email, &first_name, &link)
                            .await;
                        if !verification_email_sent {
                            log::warn!(
                                "signup: envoi de l'email de vérification à {} échoué",
                                user.email
                            );
                        }
                    }
                    Err(e) => {
                        log::error!("signup: stockage du token de vérification échoué: {}", e);
                    }
                }
            }
            Err(e) => {
                log::error!("signup: émission du token de vérification impossible: {}", e);
            }
        }

        // 5. Paire de session avec profile_id et email_verified=false
        match self.sessions.issue(&user, Some(&profile)) {
            Ok(pair) => ServiceResponse::ok(
                "User created successfully",
                Some(serde_json::json!({
                    "refresh": pair.refresh,
                    "access": pair.access,
                    "verification_email_sent": verification_email_sent,
                })),
                201,
            ),
            Err(e) => {
                log::error!("signup: émission des tokens de session impossible: {}", e);
                ServiceResponse::internal_error()
            }
        }
    }

    // ------------------------------------------------------------------
    // Vérification email
    // ------------------------------------------------------------------

    /// Vérifie l'email à partir d'un token de vérification.
    /// Toutes les causes d'échec (token invalide/expiré/mauvais type,
    /// profil introuvable, token remplacé) donnent la même réponse 400.
    pub async fn verify_email(&self, db: &DatabaseConnection, token: &str) -> ServiceResponse {
        let invalid =
            || ServiceResponse::error("Invalid or expired verification token", 400);

        // 1. Signature + expiration + type
        let claims = match self
            .codec
            .verify(token, PurposeTokenType::EmailVerification)
        {
            Ok(claims) => claims,
            Err(_) => return invalid(),
        };

        // 2. Résoudre le profil
        let profile = match UserProfiles::find()
            .filter(ProfileColumn::UserId.eq(claims.user_id))
            .one(db)
            .await
        {
            Ok(Some(profile)) => profile,
            Ok(None) => return invalid(),
            Err(e) => {
                log::error!("verify_email: erreur BD pendant le chargement du profil: {}", e);
                return ServiceResponse::internal_error();
            }
        };

        // 3. Déjà vérifié : succès idempotent, aucune mutation
        if profile.email_verified {
            return ServiceResponse::ok("Email already verified", None, 200);
        }

        // 4. Le token doit être celui actuellement stocké (un token remplacé
        //    par un renvoi est rejeté même s'il n'a pas encore expiré)
        match profile.email_verification_token.as_deref() {
            Some(stored) if stored == token => {}
            _ => return invalid(),
        }

        // 5. Marquer vérifié et consommer le token
        let mut active: user_profiles::ActiveModel = profile.into();
        active.email_verified = Set(true);
        active.email_verification_token = Set(None);

        match active.update(db).await {
            Ok(_) => ServiceResponse::ok("Email verified successfully", None, 200),
            Err(e) => {
                log::error!("verify_email: mise à jour du profil échouée: {}", e);
                ServiceResponse::internal_error()
            }
        }
    }

    /// Régénère et renvoie le lien de vérification pour un utilisateur
    /// authentifié. Le nouveau token écrase l'ancien. Contrairement au
    /// signup, un échec d'envoi est ici une erreur dure (500).
    pub async fn resend_verification(
        &self,
        db: &DatabaseConnection,
        user_id: i32,
    ) -> ServiceResponse {
        let user = match Users::find_by_id(user_id).one(db).await {
            Ok(Some(user)) => user,
            Ok(None) => return ServiceResponse::error("User not found", 400),
            Err(e) => {
                log::error!("resend_verification: erreur BD: {}", e);
                return ServiceResponse::internal_error();
            }
        };

        let profile = match UserProfiles::find()
            .filter(ProfileColumn::UserId.eq(user.id))
            .one(db)
            .await
        {
            Ok(Some(profile)) => profile,
            Ok(None) => return ServiceResponse::error("User not found", 400),
            Err(e) => {
                log::error!("resend_verification: erreur BD: {}", e);
                return ServiceResponse::internal_error();
            }
        };

        if profile.email_verified {
            return ServiceResponse::error("Email is already verified", 400);
        }

        let token = match self
            .codec
            .issue(user.id, PurposeTokenType::EmailVerification)
        {
            Ok(token) => token,
            Err(e) => {
                log::error!("resend_verification: émission du token impossible: {}", e);
                return ServiceResponse::internal_error();
            }
        };

        // Écrase le token précédent : au plus un token en circulation
        let mut active: user_profiles::ActiveModel = profile.into();
        active.email_verification_token = Set(Some(token.clone()));
        active.email_verification_sent_at = Set(Some(self.clock.now().naive_utc()));

        if let Err(e) = active.update(db).await {
            log::error!("resend_verification: stockage du token échoué: {}", e);
            return ServiceResponse::internal_error();
        }

        let link = self.verification_link(&token);
        let first_name = user.first_name.clone().unwrap_or_default();
        if !self
            .emails
            .send_email_verification(&user.email, &first_name, &link)
            .await
        {
            log::error!(
                "resend_verification: envoi de l'email à {} échoué",
                user.email
            );
            return ServiceResponse::error("Failed to send verification email", 500);
        }

        ServiceResponse::ok("Verification email sent", None, 200)
    }

    // ------------------------------------------------------------------
    // Reset password
    // ------------------------------------------------------------------

    /// Demande de reset : répond toujours le même message 200, que le
    /// compte existe ou non (anti-énumération)
    pub async fn reset_password(&self, db: &DatabaseConnection, email: &str) -> ServiceResponse {
        let user = match Users::find()
            .filter(UserColumn::Email.eq(email))
            .one(db)
            .await
        {
            Ok(Some(user)) => user,
            Ok(None) => return ServiceResponse::ok(RESET_REQUEST_MESSAGE, None, 200),
            Err(e) => {
                log::error!("reset_password: erreur BD: {}", e);
                return ServiceResponse::internal_error();
            }
        };

        let token = match self.codec.issue(user.id, PurposeTokenType::PasswordReset) {
            Ok(token) => token,
            Err(e) => {
                log::error!("reset_password: émission du token impossible: {}", e);
                return ServiceResponse::internal_error();
            }
        };

        let link = format!(
            "{}/reset-password?token={}",
            self.config.frontend_base_url, token
        );
        let first_name = user.first_name.clone().unwrap_or_default();

        // Ici l'échec d'envoi est une erreur dure, contrairement au signup
        if !self
            .emails
            .send_password_reset_email(&user.email, &first_name, &link)
            .await
        {
            log::error!("reset_password: envoi de l'email à {} échoué", user.email);
            return ServiceResponse::error("Failed to send password reset email", 500);
        }

        ServiceResponse::ok(RESET_REQUEST_MESSAGE, None, 200)
    }

    /// Confirmation du reset : vérifie le token (1h), applique la politique
    /// de mot de passe, puis persiste le nouveau hash.
    /// Le token reste techniquement rejouable jusqu'à son expiration : il
    /// n'y a pas de marqueur "déjà utilisé" côté serveur.
    pub async fn confirm_password_reset(
        &self,
        db: &DatabaseConnection,
        token: &str,
        new_password: &str,
    ) -> ServiceResponse {
        let invalid = || ServiceResponse::error("Invalid or expired reset token", 400);

        let claims = match self.codec.verify(token, PurposeTokenType::PasswordReset) {
            Ok(claims) => claims,
            Err(_) => return invalid(),
        };

        let user = match Users::find_by_id(claims.user_id).one(db).await {
            Ok(Some(user)) => user,
            Ok(None) => return invalid(),
            Err(e) => {
                log::error!("confirm_password_reset: erreur BD: {}", e);
                return ServiceResponse::internal_error();
            }
        };

        if let Err(message) = password::validate_password_strength(new_password, &user.email) {
            return ServiceResponse::error(&message, 400);
        }

        let hash = match password::hash_password(new_password) {
            Ok(hash) => hash,
            Err(e) => {
                log::error!("confirm_password_reset: échec du hash: {}", e);
                return ServiceResponse::internal_error();
            }
        };

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(Some(hash));

        match active.update(db).await {
            Ok(_) => ServiceResponse::ok("Password has been reset successfully", None, 200),
            Err(e) => {
                log::error!("confirm_password_reset: mise à jour échouée: {}", e);
                ServiceResponse::internal_error()
            }
        }
    }

    fn verification_link(&self, token: &str) -> String {
        format!(
            "{}/verify-email?token={}",
            self.config.frontend_base_url, token
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::FixedClock;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::path::PathBuf;
    use std::sync::Mutex;

    const TEST_SECRET: &str = "test-secret";

    struct MockEmailSender {
        succeed: bool,
        sent: Mutex<Vec<String>>,
    }

    impl MockEmailSender {
        fn new(succeed: bool) -> Arc<Self> {
            Arc::new(MockEmailSender {
                succeed,
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl EmailSender for MockEmailSender {
        async fn send_email(&self, to: &str, _subject: &str, _html_body: &str) -> bool {
            self.sent.lock().unwrap().push(to.to_string());
            self.succeed
        }
    }

    fn test_time() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn test_service(sender: Arc<MockEmailSender>) -> AuthenticationService {
        let config = AuthConfig {
            secret_key: TEST_SECRET.to_string(),
            frontend_base_url: "http://localhost:3000".to_string(),
            templates_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("emails_templates"),
        };
        AuthenticationService::new(config, sender, Arc::new(FixedClock(test_time())))
    }

    fn test_codec() -> TokenCodec {
        TokenCodec::new(TEST_SECRET.to_string(), Arc::new(FixedClock(test_time())))
    }

    fn sample_user(id: i32, email: &str, password: &str) -> users::Model {
        users::Model {
            id,
            username: email.to_string(),
            email: email.to_string(),
            password_hash: Some(password::hash_password(password).unwrap()),
            first_name: Some("A".to_string()),
            last_name: None,
            role: None,
            is_active: true,
            is_staff: false,
            is_superuser: false,
            date_joined: None,
        }
    }

    fn sample_profile(id: i32, user_id: i32) -> user_profiles::Model {
        user_profiles::Model {
            id,
            user_id,
            bio: None,
            location: None,
            birth_date: None,
            phone_number: None,
            avatar: None,
            email_verified: false,
            email_verification_token: None,
            email_verification_sent_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_signin_invalid_method() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = test_service(MockEmailSender::new(true));

        let resp = service.signin(&db, "magic", None, None).await;

        assert!(!resp.success);
        assert_eq!(resp.status_code, 400);
        assert_eq!(
            resp.message,
            "Invalid signin method. Use 'password', 'google', or 'facebook'"
        );
    }

    #[tokio::test]
    async fn test_signin_wrong_password_and_unknown_user_look_identical() {
        let user = sample_user(1, "a@b.com", "Str0ng!Pass");

        let db_wrong_pw = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user]])
            .into_connection();
        let db_no_user = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<users::Model>::new()])
            .into_connection();

        let service = test_service(MockEmailSender::new(true));

        let wrong = service
            .signin(&db_wrong_pw, "password", Some("a@b.com"), Some("nope-nope"))
            .await;
        let missing = service
            .signin(&db_no_user, "password", Some("x@y.com"), Some("whatever"))
            .await;

        assert!(!wrong.success);
        assert_eq!(wrong.status_code, 401);
        assert_eq!(wrong.message, "Invalid username or password");

        assert_eq!(missing.status_code, wrong.status_code);
        assert_eq!(missing.message, wrong.message);
    }

    #[tokio::test]
    async fn test_signin_success_returns_token_pair() {
        let user = sample_user(1, "a@b.com", "Str0ng!Pass");
        let profile = sample_profile(10, 1);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user]])
            .append_query_results([vec![profile]])
            .into_connection();

        let service = test_service(MockEmailSender::new(true));
        let resp = service
            .signin(&db, "password", Some("a@b.com"), Some("Str0ng!Pass"))
            .await;

        assert!(resp.success);
        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.message, "signin successful");

        let data = resp.data.unwrap();
        let refresh = data["refresh"].as_str().unwrap();
        assert!(data["access"].as_str().is_some());

        let claims = service.sessions.decode_access(data["access"].as_str().unwrap());
        assert!(claims.is_ok());
        let claims = claims.unwrap();
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.user_id, 1);
        assert_eq!(claims.profile_id, Some(10));
        assert_eq!(claims.role, "user");
        assert!(!refresh.is_empty());
    }

    #[tokio::test]
    async fn test_signup_duplicate_email() {
        let existing = sample_user(1, "a@b.com", "Str0ng!Pass");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing]])
            .into_connection();

        let service = test_service(MockEmailSender::new(true));
        let resp = service
            .signup(
                &db,
                "password",
                Some("a@b.com"),
                Some("Str0ng!Pass"),
                None,
                None,
            )
            .await;

        assert!(!resp.success);
        assert_eq!(resp.status_code, 400);
        assert_eq!(resp.message, "User with this email already exists");
    }

    #[tokio::test]
    async fn test_signup_weak_password_rejected_before_insert() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<users::Model>::new()])
            .into_connection();

        let service = test_service(MockEmailSender::new(true));
        let resp = service
            .signup(&db, "password", Some("a@b.com"), Some("abc1"), None, None)
            .await;

        assert!(!resp.success);
        assert_eq!(resp.status_code, 400);
        assert!(resp.message.contains("too short"));
    }

    #[tokio::test]
    async fn test_signup_success_embeds_claims_and_sends_email() {
        let created_user = sample_user(5, "a@b.com", "Str0ng!Pass");
        let created_profile = sample_profile(15, 5);
        let mut profile_with_token = created_profile.clone();
        profile_with_token.email_verification_token = Some("stored".to_string());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // check de doublon
            .append_query_results([Vec::<users::Model>::new()])
            // insert users (RETURNING)
            .append_query_results([vec![created_user]])
            // insert user_profiles (RETURNING)
            .append_query_results([vec![created_profile]])
            // update du profil avec le token de vérification
            .append_query_results([vec![profile_with_token]])
            .into_connection();

        let sender = MockEmailSender::new(true);
        let service = test_service(sender.clone());

        let resp = service
            .signup(
                &db,
                "password",
                Some("a@b.com"),
                Some("Str0ng!Pass"),
                Some("A"),
                None,
            )
            .await;

        assert!(resp.success, "signup failed: {}", resp.message);
        assert_eq!(resp.status_code, 201);

        let data = resp.data.unwrap();
        assert_eq!(data["verification_email_sent"], true);
        assert_eq!(
            sender.sent.lock().unwrap().clone(),
            vec!["a@b.com".to_string()]
        );

        let claims = service
            .sessions
            .decode_access(data["access"].as_str().unwrap())
            .unwrap();
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.role, "user");
        assert_eq!(claims.profile_id, Some(15));
        assert_eq!(claims.email_verified, Some(false));
    }

    #[tokio::test]
    async fn test_verify_email_idempotent_when_already_verified() {
        let token = test_codec()
            .issue(1, PurposeTokenType::EmailVerification)
            .unwrap();

        let mut profile = sample_profile(10, 1);
        profile.email_verified = true;

        // un seul résultat : si le service tentait une mise à jour, le mock
        // échouerait et la réponse serait un 500
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![profile]])
            .into_connection();

        let service = test_service(MockEmailSender::new(true));
        let resp = service.verify_email(&db, &token).await;

        assert!(resp.success);
        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.message, "Email already verified");
    }

    #[tokio::test]
    async fn test_verify_email_rejects_superseded_token() {
        let codec_t0 = test_codec();
        let old_token = codec_t0
            .issue(1, PurposeTokenType::EmailVerification)
            .unwrap();

        // token réémis une minute plus tard : c'est lui qui est stocké
        let codec_t1 = TokenCodec::new(
            TEST_SECRET.to_string(),
            Arc::new(FixedClock(test_time() + chrono::Duration::minutes(1))),
        );
        let new_token = codec_t1
            .issue(1, PurposeTokenType::EmailVerification)
            .unwrap();
        assert_ne!(old_token, new_token);

        let mut profile = sample_profile(10, 1);
        profile.email_verification_token = Some(new_token);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![profile]])
            .into_connection();

        let service = test_service(MockEmailSender::new(true));
        let resp = service.verify_email(&db, &old_token).await;

        assert!(!resp.success);
        assert_eq!(resp.status_code, 400);
        assert_eq!(resp.message, "Invalid or expired verification token");
    }

    #[tokio::test]
    async fn test_verify_email_success_consumes_token() {
        let token = test_codec()
            .issue(1, PurposeTokenType::EmailVerification)
            .unwrap();

        let mut profile = sample_profile(10, 1);
        profile.email_verification_token = Some(token.clone());

        let mut updated = profile.clone();
        updated.email_verified = true;
        updated.email_verification_token = None;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![profile]])
            .append_query_results([vec![updated]])
            .into_connection();

        let service = test_service(MockEmailSender::new(true));
        let resp = service.verify_email(&db, &token).await;

        assert!(resp.success);
        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.message, "Email verified successfully");
    }

    #[tokio::test]
    async fn test_reset_password_does_not_reveal_account_existence() {
        let db_unknown = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<users::Model>::new()])
            .into_connection();

        let user = sample_user(1, "real@x.com", "Str0ng!Pass");
        let db_known = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user]])
            .into_connection();

        let service = test_service(MockEmailSender::new(true));

        let unknown = service.reset_password(&db_unknown, "nonexistent@x.com").await;
        let known = service.reset_password(&db_known, "real@x.com").await;

        assert!(unknown.success);
        assert!(known.success);
        assert_eq!(unknown.status_code, known.status_code);
        assert_eq!(unknown.message, known.message);
    }

    #[tokio::test]
    async fn test_reset_password_send_failure_is_hard_error() {
        let user = sample_user(1, "real@x.com", "Str0ng!Pass");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user]])
            .into_connection();

        let service = test_service(MockEmailSender::new(false));
        let resp = service.reset_password(&db, "real@x.com").await;

        assert!(!resp.success);
        assert_eq!(resp.status_code, 500);
        assert_eq!(resp.message, "Failed to send password reset email");
    }

    #[tokio::test]
    async fn test_confirm_password_reset_success() {
        let token = test_codec()
            .issue(1, PurposeTokenType::PasswordReset)
            .unwrap();

        let user = sample_user(1, "a@b.com", "OldPass!123");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user.clone()]])
            .append_query_results([vec![user]])
            .into_connection();

        let service = test_service(MockEmailSender::new(true));
        let resp = service
            .confirm_password_reset(&db, &token, "N3w!Password")
            .await;

        assert!(resp.success, "reset failed: {}", resp.message);
        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.message, "Password has been reset successfully");
    }

    #[tokio::test]
    async fn test_confirm_password_reset_rejects_verification_token() {
        // un token de vérification email ne doit pas passer pour un reset
        let token = test_codec()
            .issue(1, PurposeTokenType::EmailVerification)
            .unwrap();

        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = test_service(MockEmailSender::new(true));

        let resp = service
            .confirm_password_reset(&db, &token, "N3w!Password")
            .await;

        assert!(!resp.success);
        assert_eq!(resp.status_code, 400);
        assert_eq!(resp.message, "Invalid or expired reset token");
    }

    #[tokio::test]
    async fn test_resend_verification_already_verified() {
        let user = sample_user(1, "a@b.com", "Str0ng!Pass");
        let mut profile = sample_profile(10, 1);
        profile.email_verified = true;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user]])
            .append_query_results([vec![profile]])
            .into_connection();

        let service = test_service(MockEmailSender::new(true));
        let resp = service.resend_verification(&db, 1).await;

        assert!(!resp.success);
        assert_eq!(resp.status_code, 400);
        assert_eq!(resp.message, "Email is already verified");
    }

    #[tokio::test]
    async fn test_resend_verification_send_failure_is_hard_error() {
        let user = sample_user(1, "a@b.com", "Str0ng!Pass");
        let profile = sample_profile(10, 1);
        let mut stored = profile.clone();
        stored.email_verification_token = Some("t".to_string());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user]])
            .append_query_results([vec![profile]])
            .append_query_results([vec![stored]])
            .into_connection();

        let service = test_service(MockEmailSender::new(false));
        let resp = service.resend_verification(&db, 1).await;

        assert!(!resp.success);
        assert_eq!(resp.status_code, 500);
        assert_eq!(resp.message, "Failed to send verification email");
    }
}
