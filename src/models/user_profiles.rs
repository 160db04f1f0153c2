// ============================================================================
// MODÈLE : USER PROFILES
// ============================================================================
//
// Description:
//   Profil 1-à-1 avec users. Porte l'état de vérification de l'email en plus
//   des champs libres (bio, location, etc.) qui ne sont pas exploités par ce
//   sous-système.
//
// Colonnes de la table user_profiles:
//   - id (INTEGER, PRIMARY KEY, SERIAL)
//   - user_id (INTEGER, UNIQUE, NOT NULL, FK vers users)
//   - bio / location / birth_date / phone_number / avatar (nullable)
//   - email_verified (BOOLEAN, DEFAULT FALSE, NOT NULL)
//   - email_verification_token (VARCHAR, nullable) - dernier token émis
//   - email_verification_sent_at (TIMESTAMP, nullable)
//   - created_at / updated_at (TIMESTAMP, nullable)
//
// Workflow de vérification:
//   1. À l'inscription, un token signé (24h) est émis et stocké ici
//   2. Le lien de vérification est envoyé par email
//   3. GET /api/auth/verify-email?token=xxx vérifie signature + expiration
//   4. Le token reçu doit AUSSI être égal au token stocké (consommation
//      unique : un token remplacé par un renvoi est rejeté)
//   5. Succès: email_verified = true et le token stocké est effacé
//
// Points d'attention:
//   - Au plus un token de vérification en circulation par profil : un renvoi
//     écrase le précédent, il n'y a pas de liste de révocation
//   - La ligne est créée dans la MÊME transaction que users à l'inscription
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_profiles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub user_id: i32,

    pub bio: Option<String>,
    pub location: Option<String>,
    pub birth_date: Option<Date>,
    pub phone_number: Option<String>,
    pub avatar: Option<String>,

    pub email_verified: bool,

    #[serde(skip_serializing)]
    pub email_verification_token: Option<String>,

    pub email_verification_sent_at: Option<DateTime>,

    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
