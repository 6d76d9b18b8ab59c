//! MySQL storage client over an sqlx connection pool.

use chrono::{NaiveDate, Utc};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::Row;
use tracing::{debug, instrument};

use contracts::{
    AssignmentInfo, Destination, RelayError, SensorReading, StorageClient, StorageConfig,
};

/// Datastore client backed by a MySQL connection pool
#[derive(Clone)]
pub struct MySqlStorageClient {
    pool: MySqlPool,
}

impl MySqlStorageClient {
    /// Connect lazily; pool checks out connections on first use
    #[instrument(name = "storage_connect", skip(config), fields(pool_size = config.pool_size))]
    pub fn connect(config: &StorageConfig) -> Result<Self, RelayError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.pool_size)
            .connect_lazy(&config.url)
            .map_err(storage_err)?;
        Ok(Self { pool })
    }

    async fn fetch_assignment_row(
        &self,
        machine_id: &str,
    ) -> Result<Option<AssignmentInfo>, RelayError> {
        let row = sqlx::query(
            "SELECT s.farm_id, s.zone_code, s.installation,
                    f.farm_name, c.client_id, c.client_name
             FROM sensors s
             LEFT JOIN farms f ON s.farm_id = f.farm_id
             LEFT JOIN client c ON f.client_id = c.client_id
             WHERE s.machine_id = ?",
        )
        .bind(machine_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let farm_id: Option<i64> = row.try_get("farm_id").map_err(storage_err)?;
        Ok(Some(AssignmentInfo {
            machine_id: machine_id.to_string(),
            assigned: farm_id.is_some(),
            farm_id,
            zone_code: row.try_get("zone_code").map_err(storage_err)?,
            farm_name: row.try_get("farm_name").map_err(storage_err)?,
            client_id: row.try_get("client_id").map_err(storage_err)?,
            client_name: row.try_get("client_name").map_err(storage_err)?,
            installation_date: row
                .try_get::<Option<NaiveDate>, _>("installation")
                .map_err(storage_err)?,
        }))
    }
}

impl StorageClient for MySqlStorageClient {
    /// Insert a reading into `sensor_data`, resolving farm/zone first.
    ///
    /// An unassigned device is a permanent error: retrying cannot make
    /// the insert valid.
    #[instrument(name = "storage_insert_reading", skip(self, reading), fields(machine_id = %reading.machine_id))]
    async fn insert_reading(&self, reading: &SensorReading) -> Result<u64, RelayError> {
        let assignment = self.fetch_assignment_row(&reading.machine_id).await?;
        let assignment = match assignment {
            Some(info) if info.assigned => info,
            _ => {
                return Err(RelayError::UnassignedDevice {
                    machine_id: reading.machine_id.clone(),
                })
            }
        };

        let timestamp = reading.timestamp.unwrap_or_else(Utc::now);
        let result = sqlx::query(
            "INSERT INTO sensor_data
             (farm_id, zone_code, machine_id, timestamp, moisture, temperature,
              conductivity, ph, nitrogen, phosphorus, potassium)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(assignment.farm_id)
        .bind(&assignment.zone_code)
        .bind(&reading.machine_id)
        .bind(timestamp)
        .bind(reading.moisture)
        .bind(reading.temperature)
        .bind(reading.conductivity)
        .bind(reading.ph)
        .bind(reading.nitrogen)
        .bind(reading.phosphorus)
        .bind(reading.potassium)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        let id = result.last_insert_id();
        debug!(storage_id = id, "sensor reading inserted");
        Ok(id)
    }

    async fn lookup_assignment(
        &self,
        machine_id: &str,
    ) -> Result<Option<AssignmentInfo>, RelayError> {
        self.fetch_assignment_row(machine_id).await
    }

    /// Trivial round-trip query
    async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

fn storage_err(e: sqlx::Error) -> RelayError {
    RelayError::connection(Destination::Storage, e.to_string())
}
