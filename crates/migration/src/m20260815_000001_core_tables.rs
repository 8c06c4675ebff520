use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Owner accounts.
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::PasswordHash).string())
                    .col(ColumnDef::new(Users::PasswordSalt).string())
                    .col(ColumnDef::new(Users::GoogleId).string())
                    .col(ColumnDef::new(Users::PushToken).string())
                    .col(ColumnDef::new(Users::CreatedAt).big_integer().not_null())
                    .col(ColumnDef::new(Users::UpdatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uidx_users_email")
                    .table(Users::Table)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // SQLite treats NULLs as distinct, so federated-only and
        // password-only accounts coexist under this unique index.
        manager
            .create_index(
                Index::create()
                    .name("uidx_users_google_id")
                    .table(Users::Table)
                    .col(Users::GoogleId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Tracker devices. One row per physical unit; the state machine's
        // current state and timers live here.
        manager
            .create_table(
                Table::create()
                    .table(Devices::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Devices::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Devices::Secret).string().not_null())
                    .col(ColumnDef::new(Devices::State).string().not_null())
                    .col(ColumnDef::new(Devices::AlarmActive).boolean().not_null())
                    .col(ColumnDef::new(Devices::LastMotionAt).big_integer())
                    .col(ColumnDef::new(Devices::LastLatitude).double())
                    .col(ColumnDef::new(Devices::LastLongitude).double())
                    .col(ColumnDef::new(Devices::LastGpsUpdate).big_integer())
                    .col(ColumnDef::new(Devices::UserId).string())
                    .col(ColumnDef::new(Devices::CreatedAt).big_integer().not_null())
                    .col(ColumnDef::new(Devices::UpdatedAt).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_devices_user_id")
                            .from(Devices::Table, Devices::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique: this is what enforces one-device-per-owner at the data
        // layer. Unowned devices carry NULL and do not collide.
        manager
            .create_index(
                Index::create()
                    .name("uidx_devices_user_id")
                    .table(Devices::Table)
                    .col(Devices::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Theft-detection episodes, one row per WATCH -> THEFT_DETECTED
        // transition. Purged when the device returns to IDLE.
        manager
            .create_table(
                Table::create()
                    .table(MotionEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MotionEvents::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MotionEvents::DeviceId).string().not_null())
                    .col(ColumnDef::new(MotionEvents::Timestamp).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_motion_events_device_id")
                            .from(MotionEvents::Table, MotionEvents::DeviceId)
                            .to(Devices::Table, Devices::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_motion_events_device_id")
                    .table(MotionEvents::Table)
                    .col(MotionEvents::DeviceId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MotionEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Devices::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    PasswordHash,
    PasswordSalt,
    GoogleId,
    PushToken,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Devices {
    Table,
    Id,
    Secret,
    State,
    AlarmActive,
    LastMotionAt,
    LastLatitude,
    LastLongitude,
    LastGpsUpdate,
    UserId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MotionEvents {
    Table,
    Id,
    DeviceId,
    Timestamp,
}
