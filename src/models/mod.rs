// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque modèle correspond à une table PostgreSQL avec SeaORM.
//
// Liste des modules:
//   - health : Health check API
//   - users : Identités (credentials + rôle + flags)
//   - user_profiles : Profils 1-à-1 (état de vérification email)
//   - dto : Enveloppe de réponse des services
//
// Points d'attention:
//   - Tous les modèles utilisent SeaORM (pas de SQL brut)
//   - Les relations entre tables sont définies dans chaque modèle
//   - Les tokens de session et les tokens à usage unique ne sont PAS
//     persistés : ils sont signés et vérifiés sans état (voir utils/)
//
// ============================================================================

pub mod dto;
pub mod health;
pub mod user_profiles;
pub mod users;
