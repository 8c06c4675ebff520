use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Watch/alarm state of a tracker device.
///
/// The wire representation is the uppercase string form, both in the database
/// and in JSON responses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceState {
    #[sea_orm(string_value = "IDLE")]
    Idle,
    #[sea_orm(string_value = "WATCH")]
    Watch,
    #[sea_orm(string_value = "THEFT_DETECTED")]
    TheftDetected,
}

/// A physical tracker unit.
///
/// The id is assigned at provisioning time and printed on the pairing QR code
/// together with the shared secret. `user_id` is unique: a device has at most
/// one owner and an owner at most one device.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "devices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Shared credential, presented by the device on every request.
    pub secret: String,

    pub state: DeviceState,

    pub alarm_active: bool,

    /// Unix timestamp (milliseconds). Set on entry into THEFT_DETECTED and
    /// refreshed by every motion report while the episode lasts. Milliseconds
    /// because the silence-recovery threshold is sub-second-sensitive.
    pub last_motion_at: Option<i64>,

    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,

    /// Unix timestamp (seconds).
    pub last_gps_update: Option<i64>,

    #[sea_orm(unique)]
    pub user_id: Option<String>,

    /// Unix timestamp (seconds).
    pub created_at: i64,

    /// Unix timestamp (seconds).
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    User,
    #[sea_orm(has_many = "super::motion_event::Entity")]
    MotionEvent,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::motion_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MotionEvent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
