use async_trait::async_trait;

/// Identité retournée par un fournisseur OAuth après échange du token
#[derive(Debug, Clone)]
pub struct OAuthIdentity {
    pub external_id: String,
    pub email: String,
    pub name: String,
}

/// Contrat des fournisseurs OAuth (Google, Facebook).
/// Aucune implémentation n'est livrée pour l'instant : les branches
/// google/facebook du service répondent 400 tant qu'aucun fournisseur
/// n'est branché.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    async fn exchange_token(&self, provider_token: &str) -> Result<OAuthIdentity, String>;
}
