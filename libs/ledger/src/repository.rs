use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{NaiveDateTime, Utc};
use fleet_domain::{BounceRecord, Instance, InstanceKind, InstanceStatus, Record};
use sqlx::Row;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{instrument, warn};

use crate::client::LedgerClient;
use crate::error::LedgerError;
use crate::schema::{self, bounce_table, instance_table, record_table};

/// Authoritative per-zone instance inventory (SPEC_FULL.md §4.1).
///
/// `login_lock` serializes `get_available_and_bind` process-wide, on top
/// of the per-call SQL transaction — the spec allows either alone, but a
/// `tokio::sync::Mutex` plus a transaction matches the source's
/// `sync.Mutex` + SQL transaction combination and costs nothing at
/// human login rates.
#[derive(Clone)]
pub struct LedgerRepository {
    client: LedgerClient,
    login_lock: Arc<AsyncMutex<()>>,
    known_zones: Arc<StdMutex<HashSet<String>>>,
}

impl LedgerRepository {
    pub fn new(client: LedgerClient) -> Self {
        Self {
            client,
            login_lock: Arc::new(AsyncMutex::new(())),
            known_zones: Arc::new(StdMutex::new(HashSet::new())),
        }
    }

    async fn ensure_zone(&self, zone_id: &str) -> Result<(), LedgerError> {
        let already_known = self.known_zones.lock().unwrap().contains(zone_id);
        if already_known {
            return Ok(());
        }
        schema::ensure_zone_schema(self.client.pool(), zone_id).await?;
        self.known_zones.lock().unwrap().insert(zone_id.to_string());
        Ok(())
    }

    fn row_to_instance(&self, zone_id: &str, row: &sqlx::mysql::MySqlRow) -> Instance {
        let status_str: String = row.get("status");
        Instance {
            zone_id: zone_id.to_string(),
            site_id: row.get("site_id"),
            server_ip: row.get("server_ip"),
            pod_name: row.get("pod_name"),
            instance_id: row.get("instance_id"),
            port: row.get("port"),
            is_elastic: row.get::<i8, _>("is_elastic") != 0,
            status: if status_str == "using" {
                InstanceStatus::Using
            } else {
                InstanceStatus::Available
            },
            device_id: row.get("device_id"),
        }
    }

    /// Atomically binds one row matching `(site, edge, available)`, falling
    /// back to `(elastic, available)`. Fails with `NoneAvailable` if
    /// neither selector finds a row.
    #[instrument(skip(self), fields(zone_id, site_id, device_id))]
    pub async fn get_available_and_bind(
        &self,
        zone_id: &str,
        site_id: &str,
        device_id: &str,
    ) -> Result<Instance, LedgerError> {
        self.ensure_zone(zone_id).await?;
        let _guard = self.login_lock.lock().await;
        let table = instance_table(zone_id);

        let mut tx = self.client.pool().begin().await?;

        let edge_sql = format!(
            "SELECT * FROM {table} WHERE site_id = ? AND is_elastic = 0 AND status = 'available' LIMIT 1 FOR UPDATE"
        );
        let mut row = sqlx::query(&edge_sql)
            .bind(site_id)
            .fetch_optional(&mut *tx)
            .await?;

        if row.is_none() {
            let elastic_sql = format!(
                "SELECT * FROM {table} WHERE is_elastic = 1 AND status = 'available' LIMIT 1 FOR UPDATE"
            );
            row = sqlx::query(&elastic_sql).fetch_optional(&mut *tx).await?;
        }

        let Some(row) = row else {
            tx.rollback().await.ok();
            return Err(LedgerError::NoneAvailable {
                site_id: Some(site_id.to_string()),
            });
        };

        let mut instance = self.row_to_instance(zone_id, &row);
        let was_elastic = instance.is_elastic;

        let update_sql = if was_elastic {
            format!("UPDATE {table} SET status = 'using', device_id = ?, site_id = ? WHERE instance_id = ?")
        } else {
            format!("UPDATE {table} SET status = 'using', device_id = ? WHERE instance_id = ?")
        };
        let mut q = sqlx::query(&update_sql).bind(device_id);
        if was_elastic {
            q = q.bind(site_id);
        }
        q = q.bind(&instance.instance_id);
        q.execute(&mut *tx).await?;
        tx.commit().await?;

        instance.status = InstanceStatus::Using;
        instance.device_id = Some(device_id.to_string());
        if was_elastic {
            instance.site_id = Some(site_id.to_string());
        }
        Ok(instance)
    }

    /// Clears the binding on the unique row bound to `device_id`.
    #[instrument(skip(self))]
    pub async fn release_by_device(&self, zone_id: &str, device_id: &str) -> Result<(), LedgerError> {
        self.ensure_zone(zone_id).await?;
        let table = instance_table(zone_id);

        let select_sql = format!("SELECT * FROM {table} WHERE device_id = ? LIMIT 1");
        let row = sqlx::query(&select_sql)
            .bind(device_id)
            .fetch_optional(self.client.pool())
            .await?;
        let Some(row) = row else {
            return Err(LedgerError::NotBound {
                device_id: device_id.to_string(),
            });
        };
        let is_elastic: i8 = row.get("is_elastic");

        let update_sql = if is_elastic != 0 {
            format!("UPDATE {table} SET status = 'available', device_id = NULL, site_id = NULL WHERE device_id = ?")
        } else {
            format!("UPDATE {table} SET status = 'available', device_id = NULL WHERE device_id = ?")
        };
        sqlx::query(&update_sql)
            .bind(device_id)
            .execute(self.client.pool())
            .await?;
        Ok(())
    }

    /// Used by the lifecycle manager only after a pod is confirmed ready.
    #[instrument(skip(self, instance))]
    pub async fn insert_instance(&self, instance: &Instance) -> Result<(), LedgerError> {
        self.ensure_zone(&instance.zone_id).await?;
        let table = instance_table(&instance.zone_id);
        let sql = format!(
            "INSERT INTO {table}
                (instance_id, zone_id, site_id, server_ip, pod_name, port, is_elastic, status, device_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        sqlx::query(&sql)
            .bind(&instance.instance_id)
            .bind(&instance.zone_id)
            .bind(&instance.site_id)
            .bind(&instance.server_ip)
            .bind(&instance.pod_name)
            .bind(instance.port)
            .bind(instance.is_elastic as i8)
            .bind(instance.status.as_db_str())
            .bind(&instance.device_id)
            .execute(self.client.pool())
            .await?;
        Ok(())
    }

    /// Atomically selects up to `n` available elastic rows in randomized
    /// order, deletes them, and returns their pod names.
    #[instrument(skip(self))]
    pub async fn pop_available_elastics(&self, zone_id: &str, n: u32) -> Result<Vec<String>, LedgerError> {
        self.ensure_zone(zone_id).await?;
        if n == 0 {
            return Ok(Vec::new());
        }
        let table = instance_table(zone_id);
        let mut tx = self.client.pool().begin().await?;

        let select_sql = format!(
            "SELECT instance_id, pod_name FROM {table} WHERE is_elastic = 1 AND status = 'available' ORDER BY RAND() LIMIT ? FOR UPDATE"
        );
        let rows = sqlx::query(&select_sql)
            .bind(n)
            .fetch_all(&mut *tx)
            .await?;

        if rows.is_empty() {
            tx.rollback().await.ok();
            return Err(LedgerError::NothingToRelease {
                zone_id: zone_id.to_string(),
            });
        }

        let mut pod_names = Vec::with_capacity(rows.len());
        let delete_sql = format!("DELETE FROM {table} WHERE instance_id = ?");
        for row in &rows {
            let instance_id: String = row.get("instance_id");
            let pod_name: String = row.get("pod_name");
            sqlx::query(&delete_sql)
                .bind(&instance_id)
                .execute(&mut *tx)
                .await?;
            pod_names.push(pod_name);
        }
        tx.commit().await?;
        Ok(pod_names)
    }

    pub async fn count_available_elastics(&self, zone_id: &str) -> Result<i64, LedgerError> {
        self.ensure_zone(zone_id).await?;
        let table = instance_table(zone_id);
        let sql = format!("SELECT COUNT(*) AS c FROM {table} WHERE is_elastic = 1 AND status = 'available'");
        let row = sqlx::query(&sql).fetch_one(self.client.pool()).await?;
        Ok(row.get::<i64, _>("c"))
    }

    pub async fn site_capacity(&self, zone_id: &str, site_id: &str) -> Result<i64, LedgerError> {
        self.ensure_zone(zone_id).await?;
        let table = instance_table(zone_id);
        let sql = format!("SELECT COUNT(*) AS c FROM {table} WHERE is_elastic = 0 AND site_id = ?");
        let row = sqlx::query(&sql)
            .bind(site_id)
            .fetch_one(self.client.pool())
            .await?;
        Ok(row.get::<i64, _>("c"))
    }

    pub async fn count_using(&self, zone_id: &str, site_id: &str, kind: InstanceKind) -> Result<i64, LedgerError> {
        self.ensure_zone(zone_id).await?;
        let table = instance_table(zone_id);
        let sql = format!(
            "SELECT COUNT(*) AS c FROM {table} WHERE site_id = ? AND status = 'using' AND is_elastic = ?"
        );
        let row = sqlx::query(&sql)
            .bind(site_id)
            .bind(kind.is_elastic() as i8)
            .fetch_one(self.client.pool())
            .await?;
        Ok(row.get::<i64, _>("c"))
    }

    /// Writes only when the current value differs, matching the source's
    /// reconcile sweep which must not generate spurious writes.
    #[instrument(skip(self))]
    pub async fn synchronize_status(
        &self,
        zone_id: &str,
        instance_id: &str,
        new_status: InstanceStatus,
    ) -> Result<(), LedgerError> {
        self.ensure_zone(zone_id).await?;
        let table = instance_table(zone_id);
        let sql = format!("UPDATE {table} SET status = ? WHERE instance_id = ? AND status != ?");
        let result = sqlx::query(&sql)
            .bind(new_status.as_db_str())
            .bind(instance_id)
            .bind(new_status.as_db_str())
            .execute(self.client.pool())
            .await?;
        if result.rows_affected() == 0 {
            warn!(instance_id, "synchronize_status: no row updated (already current, or unknown instance)");
        }
        Ok(())
    }

    /// Discovers `{zone -> [site]}` by enumerating `instance_%` tables and
    /// projecting distinct non-sentinel site ids out of each.
    #[instrument(skip(self))]
    pub async fn list_zones(&self) -> Result<HashMap<String, Vec<String>>, LedgerError> {
        let rows = sqlx::query("SHOW TABLES LIKE 'instance_%'")
            .fetch_all(self.client.pool())
            .await?;

        let mut zones = HashMap::new();
        for row in rows {
            let table_name: String = row.try_get(0)?;
            let Some(zone_id) = table_name.strip_prefix("instance_") else {
                continue;
            };
            self.known_zones.lock().unwrap().insert(zone_id.to_string());

            let sites_sql = format!(
                "SELECT DISTINCT site_id FROM {table_name} WHERE is_elastic = 0 AND site_id IS NOT NULL"
            );
            let site_rows = sqlx::query(&sites_sql).fetch_all(self.client.pool()).await?;
            let sites = site_rows
                .into_iter()
                .map(|r| r.get::<String, _>("site_id"))
                .collect();
            zones.insert(zone_id.to_string(), sites);
        }
        Ok(zones)
    }

    pub async fn insert_login_failure(&self, zone_id: &str, site_id: &str) -> Result<(), LedgerError> {
        sqlx::query("INSERT INTO login_failures (zone_id, site_id, created_at) VALUES (?, ?, ?)")
            .bind(zone_id)
            .bind(site_id)
            .bind(Utc::now().naive_utc())
            .execute(self.client.pool())
            .await?;
        Ok(())
    }

    pub async fn count_login_failures_since(
        &self,
        zone_id: &str,
        site_id: &str,
        since: NaiveDateTime,
    ) -> Result<i64, LedgerError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS c FROM login_failures WHERE zone_id = ? AND site_id = ? AND created_at >= ?",
        )
        .bind(zone_id)
        .bind(site_id)
        .bind(since)
        .fetch_one(self.client.pool())
        .await?;
        Ok(row.get::<i64, _>("c"))
    }

    #[instrument(skip(self))]
    pub async fn insert_record(&self, record: &Record) -> Result<(), LedgerError> {
        self.ensure_zone(&record.zone_id).await?;
        let table = record_table(&record.zone_id);
        let sql = format!(
            "INSERT INTO {table} (site_id, date, instances, login_failures) VALUES (?, ?, ?, ?)"
        );
        sqlx::query(&sql)
            .bind(&record.site_id)
            .bind(record.date)
            .bind(record.instances)
            .bind(record.login_failures)
            .execute(self.client.pool())
            .await?;
        Ok(())
    }

    /// Last `limit` minute-bucketed records for a site, ascending by date
    /// (the order the forecaster's CSV upload requires).
    pub async fn recent_records(
        &self,
        zone_id: &str,
        site_id: &str,
        limit: i64,
    ) -> Result<Vec<Record>, LedgerError> {
        self.ensure_zone(zone_id).await?;
        let table = record_table(zone_id);
        let sql = format!(
            "SELECT site_id, date, instances, login_failures FROM {table}
             WHERE site_id = ? ORDER BY date DESC LIMIT ?"
        );
        let mut rows = sqlx::query(&sql)
            .bind(site_id)
            .bind(limit)
            .fetch_all(self.client.pool())
            .await?;
        rows.reverse();
        Ok(rows
            .into_iter()
            .map(|row| Record {
                zone_id: zone_id.to_string(),
                site_id: row.get("site_id"),
                date: row.get("date"),
                instances: row.get("instances"),
                login_failures: row.get("login_failures"),
            })
            .collect())
    }

    /// Inserts or refreshes the truth half of a BounceRecord for `date`,
    /// leaving any already-finalized prediction untouched (SPEC_FULL.md
    /// §4.5 step 3: truth dates are written fresh every tick; predictions
    /// are finalized separately once their window elapses).
    #[instrument(skip(self))]
    pub async fn upsert_bounce_truth(
        &self,
        zone_id: &str,
        date: NaiveDateTime,
        true_instances: f64,
    ) -> Result<(), LedgerError> {
        self.ensure_zone(zone_id).await?;
        let table = bounce_table(zone_id);
        let sql = format!(
            "INSERT INTO {table} (date, true_instances, pred_instances) VALUES (?, ?, 0)
             ON DUPLICATE KEY UPDATE true_instances = VALUES(true_instances)"
        );
        sqlx::query(&sql)
            .bind(date)
            .bind(true_instances)
            .execute(self.client.pool())
            .await?;
        Ok(())
    }

    /// Fills in `pred_instances` for a BounceRecord row whose prediction
    /// window has just elapsed. Expects `upsert_bounce_truth` to already
    /// have created the row.
    #[instrument(skip(self))]
    pub async fn finalize_bounce_prediction(
        &self,
        zone_id: &str,
        date: NaiveDateTime,
        pred_instances: f64,
    ) -> Result<(), LedgerError> {
        self.ensure_zone(zone_id).await?;
        let table = bounce_table(zone_id);
        let sql = format!("UPDATE {table} SET pred_instances = ? WHERE date = ?");
        sqlx::query(&sql)
            .bind(pred_instances)
            .bind(date)
            .execute(self.client.pool())
            .await?;
        Ok(())
    }

    pub async fn bounce_records_between(
        &self,
        zone_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<BounceRecord>, LedgerError> {
        self.ensure_zone(zone_id).await?;
        let table = bounce_table(zone_id);
        let sql = format!(
            "SELECT date, true_instances, pred_instances FROM {table}
             WHERE date BETWEEN ? AND ? ORDER BY date ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(self.client.pool())
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| BounceRecord {
                zone_id: zone_id.to_string(),
                date: row.get("date"),
                true_instances: row.get("true_instances"),
                pred_instances: row.get("pred_instances"),
            })
            .collect())
    }
}
