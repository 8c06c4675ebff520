use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Owner account.
///
/// An owner authenticates with email + password or a federated Google
/// identity, and holds at most one claimed device (see `device::Model`).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub email: String,

    /// PBKDF2-SHA256 digest, hex. Absent for federated-only accounts.
    pub password_hash: Option<String>,

    /// Per-user random salt, hex.
    pub password_salt: Option<String>,

    #[sea_orm(unique)]
    pub google_id: Option<String>,

    /// Expo push delivery address, set by the app after login.
    pub push_token: Option<String>,

    /// Unix timestamp (seconds).
    pub created_at: i64,

    /// Unix timestamp (seconds).
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::device::Entity")]
    Device,
}

impl Related<super::device::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Device.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
