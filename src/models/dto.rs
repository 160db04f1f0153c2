// Enveloppe de réponse uniforme retournée par les services.
// Les routes ne branchent que sur success/status_code ; message est destiné
// à l'humain et ne doit jamais contenir de texte d'erreur interne.
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ServiceResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub status_code: u16,
}

impl ServiceResponse {
    pub fn ok(message: &str, data: Option<serde_json::Value>, status_code: u16) -> Self {
        ServiceResponse {
            success: true,
            message: message.to_string(),
            data,
            status_code,
        }
    }

    pub fn error(message: &str, status_code: u16) -> Self {
        ServiceResponse {
            success: false,
            message: message.to_string(),
            data: None,
            status_code,
        }
    }

    /// Erreur générique 500 : le détail part dans les logs, jamais au client
    pub fn internal_error() -> Self {
        Self::error("An unexpected error occurred", 500)
    }
}
