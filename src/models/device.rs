// Device identity. Multiple devices per user; a device may be reassigned to a
// different user on OAuth login (the reassignment is logged as a security event
// by the caller, not here).

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::devices;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = devices)]
#[diesel(primary_key(device_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Device {
    pub device_id: Uuid,
    pub user_id: String,
    pub device_name: Option<String>,
    pub device_type: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = devices)]
pub struct NewDevice {
    pub device_id: Uuid,
    pub user_id: String,
    pub device_name: Option<String>,
    pub device_type: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum DeviceError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Device not found")]
    NotFound,
}

impl Device {
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, DeviceError> {
        use crate::schema::devices::dsl::*;

        devices
            .filter(device_id.eq(id))
            .first::<Device>(conn)
            .await
            .optional()
            .map_err(DeviceError::Database)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        id: Uuid,
        owner_user_id: &str,
    ) -> Result<Self, DeviceError> {
        use crate::schema::devices::dsl::*;

        let new_device = NewDevice {
            device_id: id,
            user_id: owner_user_id.to_string(),
            device_name: None,
            device_type: None,
        };

        diesel::insert_into(devices)
            .values(&new_device)
            .get_result::<Device>(conn)
            .await
            .map_err(DeviceError::Database)
    }

    /// Bumps `last_login_at` and, if the device changed hands, reassigns
    /// `user_id` in place. Returns the row as it is after the update.
    pub async fn touch_login(
        conn: &mut AsyncPgConnection,
        id: Uuid,
        owner_user_id: &str,
    ) -> Result<Self, DeviceError> {
        use crate::schema::devices::dsl::*;

        diesel::update(devices.filter(device_id.eq(id)))
            .set((
                user_id.eq(owner_user_id),
                last_login_at.eq(Utc::now()),
                is_active.eq(true),
            ))
            .get_result::<Device>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => DeviceError::NotFound,
                other => DeviceError::Database(other),
            })
    }

    pub async fn list_for_user(
        conn: &mut AsyncPgConnection,
        owner_user_id: &str,
    ) -> Result<Vec<Self>, DeviceError> {
        use crate::schema::devices::dsl::*;

        devices
            .filter(user_id.eq(owner_user_id))
            .order(last_login_at.desc())
            .load::<Device>(conn)
            .await
            .map_err(DeviceError::Database)
    }

    pub async fn soft_disable(
        conn: &mut AsyncPgConnection,
        id: Uuid,
        owner_user_id: &str,
    ) -> Result<bool, DeviceError> {
        use crate::schema::devices::dsl::*;

        let updated = diesel::update(
            devices
                .filter(device_id.eq(id))
                .filter(user_id.eq(owner_user_id)),
        )
        .set(is_active.eq(false))
        .execute(conn)
        .await?;

        Ok(updated > 0)
    }
}
