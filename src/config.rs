use std::env;
use std::path::PathBuf;

/// Configuration immuable lue une fois au démarrage du process
#[derive(Clone)]
pub struct AuthConfig {
    pub secret_key: String,
    pub frontend_base_url: String,
    pub templates_dir: PathBuf,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let secret_key = env::var("SECRET_KEY").unwrap_or_else(|_| {
            eprintln!("⚠️  WARNING: SECRET_KEY not found in .env, using default (INSECURE)");
            "default-insecure-key-change-this".to_string()
        });

        let frontend_base_url = env::var("FRONTEND_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let templates_dir = env::var("EMAIL_TEMPLATES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("emails_templates"));

        AuthConfig {
            secret_key,
            frontend_base_url,
            templates_dir,
        }
    }
}
