//! Attendance terminals.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    REFERENCED_MOVE, RecordService, ServiceResult, company_for_create, company_for_update,
    delete_scoped, find_scoped, in_utc, is_referenced, is_taken, list_scoped, now, required,
};
use crate::access::{Caller, EntityKind};
use crate::models::device::{self, DEFAULT_PORT};
use crate::models::{AttendanceLog, Device, attendance_log};
use crate::validation::{NON_FIELD_ERRORS, ValidationErrors, is_valid_ip, normalize_opt};

/// The only fields a PATCH may change on a device, for every caller.
pub const DEVICE_PATCHABLE_FIELDS: &[&str] =
    &["location", "description", "ip_address", "last_sync_time"];

/// A device is considered synced when it reported within this window.
const SYNC_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInput {
    pub company_id: Option<Uuid>,
    pub device_id: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub ip_address: Option<String>,
    pub serial_number: Option<String>,
    pub port: Option<i32>,
    pub last_sync_time: Option<DateTimeWithTimeZone>,
}

/// A device as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRecord {
    #[serde(flatten)]
    pub device: device::Model,
    pub is_synced: bool,
}

impl From<device::Model> for DeviceRecord {
    fn from(device: device::Model) -> Self {
        let is_synced = device
            .last_sync_time
            .is_some_and(|at| Utc::now().signed_duration_since(at) < Duration::hours(SYNC_WINDOW_HOURS));
        Self { device, is_synced }
    }
}

struct DeviceFields {
    device_id: String,
    location: String,
    description: Option<String>,
    ip_address: String,
    serial_number: Option<String>,
    port: i32,
    last_sync_time: Option<DateTimeWithTimeZone>,
}

impl DeviceInput {
    fn check(self) -> Result<DeviceFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let device_id = required(
            &mut errors,
            "device_id",
            self.device_id.map(|id| id.trim().to_string()),
        );
        if let Some(id) = &device_id {
            errors.check_len("device_id", id, 1, 50);
        }

        let location = required(
            &mut errors,
            "location",
            self.location.map(|l| l.trim().to_string()),
        );
        if let Some(location) = &location {
            errors.check_len("location", location, 1, 100);
        }

        let description = normalize_opt(self.description);
        errors.check_opt_len("description", description.as_deref(), 255);

        let ip_address = normalize_opt(self.ip_address);
        match &ip_address {
            Some(ip) if is_valid_ip(ip) => {}
            _ => errors.add("ip_address", "Device must have a valid IP address."),
        }

        let serial_number = normalize_opt(self.serial_number);
        if let Some(serial) = &serial_number {
            if serial.chars().count() < 10 {
                errors.add(
                    "serial_number",
                    "Serial number must be at least 10 characters long.",
                );
            }
            errors.check_opt_len("serial_number", Some(serial), 255);
        }

        let port = self.port.unwrap_or(DEFAULT_PORT);
        if !(1..=65535).contains(&port) {
            errors.add("port", "Port number must be between 1 and 65535.");
        }

        let (Some(device_id), Some(location), Some(ip_address)) = (device_id, location, ip_address)
        else {
            return Err(errors);
        };
        errors.finish()?;
        Ok(DeviceFields {
            device_id,
            location,
            description,
            ip_address,
            serial_number,
            port,
            last_sync_time: self.last_sync_time.map(in_utc),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceService;

impl DeviceService {
    /// Whether a punch was recorded through this device.
    async fn has_dependents<C: ConnectionTrait>(conn: &C, id: Uuid) -> ServiceResult<bool> {
        is_referenced::<AttendanceLog, _>(conn, attendance_log::Column::DeviceId, id).await
    }

    async fn validate<C: ConnectionTrait>(
        conn: &C,
        company_id: Uuid,
        input: DeviceInput,
        exclude: Option<Uuid>,
    ) -> ServiceResult<DeviceFields> {
        let fields = input.check()?;
        let mut errors = ValidationErrors::new();

        if is_taken::<Device, _>(
            conn,
            Condition::all().add(device::Column::DeviceId.eq(fields.device_id.as_str())),
            device::Column::Id,
            exclude,
        )
        .await?
        {
            errors.add("device_id", "Device with this device ID already exists.");
        }

        if let Some(serial) = &fields.serial_number
            && is_taken::<Device, _>(
                conn,
                Condition::all().add(device::Column::SerialNumber.eq(serial.as_str())),
                device::Column::Id,
                exclude,
            )
            .await?
        {
            errors.add(
                "serial_number",
                "Device with this serial number already exists.",
            );
        }

        if is_taken::<Device, _>(
            conn,
            Condition::all()
                .add(device::Column::CompanyId.eq(company_id))
                .add(device::Column::IpAddress.eq(fields.ip_address.as_str())),
            device::Column::Id,
            exclude,
        )
        .await?
        {
            errors.add(
                NON_FIELD_ERRORS,
                "The fields company, ip_address must make a unique set.",
            );
        }

        errors.finish()?;
        Ok(fields)
    }

    fn apply(active: &mut device::ActiveModel, fields: DeviceFields) {
        active.device_id = Set(fields.device_id);
        active.location = Set(fields.location);
        active.description = Set(fields.description);
        active.ip_address = Set(fields.ip_address);
        active.serial_number = Set(fields.serial_number);
        active.port = Set(fields.port);
        active.last_sync_time = Set(fields.last_sync_time);
    }
}

#[async_trait]
impl RecordService for DeviceService {
    const KIND: EntityKind = EntityKind::Device;

    type Record = DeviceRecord;
    type Input = DeviceInput;

    async fn list(&self, db: &DatabaseConnection, caller: &Caller) -> ServiceResult<Vec<DeviceRecord>> {
        let devices =
            list_scoped::<Device>(db, caller, device::Column::CompanyId, device::Column::DeviceId)
                .await?;
        Ok(devices.into_iter().map(DeviceRecord::from).collect())
    }

    async fn get(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<DeviceRecord> {
        Ok(find_scoped::<Device, _>(db, caller, Self::KIND, id)
            .await?
            .into())
    }

    async fn create(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        input: DeviceInput,
    ) -> ServiceResult<DeviceRecord> {
        let txn = db.begin().await?;
        let company_id = company_for_create(&txn, caller, input.company_id).await?;
        let fields = Self::validate(&txn, company_id, input, None).await?;

        let now = now();
        let mut active = device::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Self::apply(&mut active, fields);
        let model = active.insert(&txn).await?;
        txn.commit().await?;

        tracing::info!(
            device_id = %model.id,
            company_id = %company_id,
            ip_address = %model.ip_address,
            "Device registered"
        );
        Ok(model.into())
    }

    async fn update(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        input: DeviceInput,
    ) -> ServiceResult<DeviceRecord> {
        let txn = db.begin().await?;
        let existing = find_scoped::<Device, _>(&txn, caller, Self::KIND, id).await?;
        let company_id =
            company_for_update(&txn, caller, existing.company_id, input.company_id).await?;
        if company_id != existing.company_id && Self::has_dependents(&txn, id).await? {
            return Err(ValidationErrors::single("company_id", REFERENCED_MOVE).into());
        }
        let fields = Self::validate(&txn, company_id, input, Some(id)).await?;

        let mut active: device::ActiveModel = existing.into();
        active.company_id = Set(company_id);
        Self::apply(&mut active, fields);
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model.into())
    }

    async fn delete(&self, db: &DatabaseConnection, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        delete_scoped::<Device>(db, caller, Self::KIND, id).await
    }

    async fn current_input(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<DeviceInput> {
        let model = find_scoped::<Device, _>(db, caller, Self::KIND, id).await?;
        Ok(DeviceInput {
            company_id: Some(model.company_id),
            device_id: Some(model.device_id),
            location: Some(model.location),
            description: model.description,
            ip_address: Some(model.ip_address),
            serial_number: model.serial_number,
            port: Some(model.port),
            last_sync_time: model.last_sync_time,
        })
    }

    fn patchable_fields(&self, _caller: &Caller) -> Option<&'static [&'static str]> {
        Some(DEVICE_PATCHABLE_FIELDS)
    }
}
