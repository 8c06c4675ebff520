use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Start of one theft-detection episode.
///
/// Created only on the WATCH -> THEFT_DETECTED transition, never for
/// re-reports within an episode. The whole history is purged when the device
/// returns to IDLE.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "motion_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub device_id: String,

    /// Unix timestamp (milliseconds).
    pub timestamp: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::device::Entity",
        from = "Column::DeviceId",
        to = "super::device::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Device,
}

impl Related<super::device::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Device.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
