//! Per-zone table naming and idempotent schema application.
//!
//! Zone and site identifiers end up interpolated into table names
//! (`instance_<zone>`) because MySQL has no parameter binding for
//! identifiers. We restrict zone ids to `[A-Za-z0-9_]+` before ever
//! building a query string from one, closing the obvious injection
//! vector.

use crate::error::LedgerError;

pub fn validate_zone_ident(zone_id: &str) -> Result<(), LedgerError> {
    if !zone_id.is_empty()
        && zone_id.len() <= 64
        && zone_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(())
    } else {
        Err(LedgerError::InvalidZone(zone_id.to_string()))
    }
}

pub fn instance_table(zone_id: &str) -> String {
    format!("instance_{zone_id}")
}

pub fn record_table(zone_id: &str) -> String {
    format!("record_{zone_id}")
}

pub fn bounce_table(zone_id: &str) -> String {
    format!("bounce_{zone_id}")
}

pub async fn ensure_zone_schema(pool: &sqlx::MySqlPool, zone_id: &str) -> Result<(), LedgerError> {
    validate_zone_ident(zone_id)?;

    let create_instance = format!(
        "CREATE TABLE IF NOT EXISTS {} (
            instance_id VARCHAR(255) PRIMARY KEY,
            zone_id VARCHAR(64) NOT NULL,
            site_id VARCHAR(255) NULL,
            server_ip VARCHAR(64) NOT NULL,
            pod_name VARCHAR(255) NOT NULL UNIQUE,
            port INT NOT NULL,
            is_elastic TINYINT(1) NOT NULL,
            status VARCHAR(16) NOT NULL,
            device_id VARCHAR(255) NULL,
            INDEX idx_site_status (site_id, status),
            INDEX idx_elastic_status (is_elastic, status),
            INDEX idx_device (device_id)
        )",
        instance_table(zone_id)
    );

    let create_record = format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id BIGINT AUTO_INCREMENT PRIMARY KEY,
            site_id VARCHAR(255) NOT NULL,
            date DATETIME NOT NULL,
            instances BIGINT NOT NULL,
            login_failures BIGINT NOT NULL,
            INDEX idx_site_date (site_id, date)
        )",
        record_table(zone_id)
    );

    let create_bounce = format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id BIGINT AUTO_INCREMENT PRIMARY KEY,
            date DATETIME NOT NULL UNIQUE,
            true_instances DOUBLE NOT NULL,
            pred_instances DOUBLE NOT NULL
        )",
        bounce_table(zone_id)
    );

    sqlx::query(&create_instance).execute(pool).await?;
    sqlx::query(&create_record).execute(pool).await?;
    sqlx::query(&create_bounce).execute(pool).await?;
    Ok(())
}

pub async fn ensure_login_failures_table(pool: &sqlx::MySqlPool) -> Result<(), LedgerError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS login_failures (
            id BIGINT AUTO_INCREMENT PRIMARY KEY,
            zone_id VARCHAR(64) NOT NULL,
            site_id VARCHAR(255) NOT NULL,
            created_at DATETIME NOT NULL,
            INDEX idx_zone_site (zone_id, site_id)
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_identifiers_with_sql_metacharacters() {
        assert!(validate_zone_ident("z1").is_ok());
        assert!(validate_zone_ident("east_1").is_ok());
        assert!(validate_zone_ident("z1; DROP TABLE instance_z1;--").is_err());
        assert!(validate_zone_ident("").is_err());
        assert!(validate_zone_ident("with space").is_err());
    }
}
