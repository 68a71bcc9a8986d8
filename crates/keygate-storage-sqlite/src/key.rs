use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use keygate_core::{CreateKeyInput, KeyStore, KeygateError, KeygateResult, LicenseKey};

use crate::{fmt_datetime_opt, parse_datetime, parse_datetime_opt};

#[derive(Clone)]
pub struct SqliteKeyStore {
    pool: SqlitePool,
}

fn row_to_key(row: &sqlx::sqlite::SqliteRow) -> Result<LicenseKey, KeygateError> {
    let id: String = row
        .try_get("id")
        .map_err(crate::storage_err)?;
    let app_id: String = row
        .try_get("app_id")
        .map_err(crate::storage_err)?;
    let name: String = row
        .try_get("name")
        .map_err(crate::storage_err)?;
    let token: String = row
        .try_get("token")
        .map_err(crate::storage_err)?;
    let duration_input: String = row
        .try_get("duration_input")
        .map_err(crate::storage_err)?;
    let duration_ms: i64 = row
        .try_get("duration_ms")
        .map_err(crate::storage_err)?;
    let remaining_ms: i64 = row
        .try_get("remaining_ms")
        .map_err(crate::storage_err)?;
    let started_at: Option<String> = row
        .try_get("started_at")
        .map_err(crate::storage_err)?;
    let last_tick_at: Option<String> = row
        .try_get("last_tick_at")
        .map_err(crate::storage_err)?;
    let paused: bool = row
        .try_get("paused")
        .map_err(crate::storage_err)?;
    let paused_by_app: bool = row
        .try_get("paused_by_app")
        .map_err(crate::storage_err)?;
    let hwid: Option<String> = row
        .try_get("hwid")
        .map_err(crate::storage_err)?;
    let first_used_at: Option<String> = row
        .try_get("first_used_at")
        .map_err(crate::storage_err)?;
    let created_by_user_id: String = row
        .try_get("created_by_user_id")
        .map_err(crate::storage_err)?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(crate::storage_err)?;
    let version: i64 = row
        .try_get("version")
        .map_err(crate::storage_err)?;

    Ok(LicenseKey {
        id,
        app_id,
        name,
        token,
        duration_input,
        duration_ms,
        remaining_ms,
        started_at: parse_datetime_opt(started_at.as_deref())?,
        last_tick_at: parse_datetime_opt(last_tick_at.as_deref())?,
        paused,
        paused_by_app,
        hwid,
        first_used_at: parse_datetime_opt(first_used_at.as_deref())?,
        created_by_user_id,
        created_at: parse_datetime(&created_at)?,
        version,
    })
}

const KEY_SELECT: &str = r#"
    SELECT id, app_id, name, token, duration_input, duration_ms, remaining_ms,
           started_at, last_tick_at, paused, paused_by_app, hwid, first_used_at,
           created_by_user_id, created_at, version
    FROM license_keys
"#;

impl SqliteKeyStore {
    pub async fn connect(url: &str) -> KeygateResult<Self> {
        let pool = SqlitePool::connect(url)
            .await
            .map_err(crate::storage_err)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(crate::storage_err)?;

        Ok(Self { pool })
    }

    async fn get_key_where(
        &self,
        where_clause: &str,
        binds: &[&str],
    ) -> KeygateResult<Option<LicenseKey>> {
        let sql = format!("{KEY_SELECT} WHERE {where_clause}");
        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = query.bind(*bind);
        }
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(crate::storage_err)?;
        match row {
            Some(row) => Ok(Some(row_to_key(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl KeyStore for SqliteKeyStore {
    async fn create_key(&self, input: &CreateKeyInput) -> KeygateResult<LicenseKey> {
        sqlx::query(
            "INSERT INTO license_keys
                 (id, app_id, name, token, duration_input, duration_ms,
                  remaining_ms, created_by_user_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&input.id)
        .bind(&input.app_id)
        .bind(&input.name)
        .bind(&input.token)
        .bind(&input.duration_input)
        .bind(input.duration_ms)
        .bind(input.duration_ms)
        .bind(&input.created_by_user_id)
        .execute(&self.pool)
        .await
        .map_err(crate::storage_err)?;

        self.get_key_by_id(&input.id)
            .await?
            .ok_or_else(|| KeygateError::Storage("key vanished after insert".to_string()))
    }

    async fn get_key_by_id(&self, id: &str) -> KeygateResult<Option<LicenseKey>> {
        self.get_key_where("id = ?", &[id]).await
    }

    async fn get_key_by_token(&self, token: &str) -> KeygateResult<Option<LicenseKey>> {
        self.get_key_where("token = ?", &[token]).await
    }

    async fn get_key_by_token_within(
        &self,
        app_id: &str,
        token: &str,
    ) -> KeygateResult<Option<LicenseKey>> {
        self.get_key_where("app_id = ? AND token = ?", &[app_id, token])
            .await
    }

    async fn list_keys_for_app(&self, app_id: &str) -> KeygateResult<Vec<LicenseKey>> {
        let sql = format!("{KEY_SELECT} WHERE app_id = ? ORDER BY created_at");
        let rows = sqlx::query(&sql)
            .bind(app_id)
            .fetch_all(&self.pool)
            .await
            .map_err(crate::storage_err)?;
        rows.iter().map(row_to_key).collect()
    }

    async fn count_keys_for_app(&self, app_id: &str) -> KeygateResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM license_keys WHERE app_id = ?")
            .bind(app_id)
            .fetch_one(&self.pool)
            .await
            .map_err(crate::storage_err)?;
        row.try_get("n")
            .map_err(crate::storage_err)
    }

    async fn update_key(&self, key: &LicenseKey) -> KeygateResult<bool> {
        let result = sqlx::query(
            "UPDATE license_keys
             SET name = ?, duration_input = ?, duration_ms = ?, remaining_ms = ?,
                 started_at = ?, last_tick_at = ?, paused = ?, paused_by_app = ?,
                 hwid = ?, first_used_at = ?, version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(&key.name)
        .bind(&key.duration_input)
        .bind(key.duration_ms)
        .bind(key.remaining_ms)
        .bind(fmt_datetime_opt(key.started_at))
        .bind(fmt_datetime_opt(key.last_tick_at))
        .bind(key.paused)
        .bind(key.paused_by_app)
        .bind(&key.hwid)
        .bind(fmt_datetime_opt(key.first_used_at))
        .bind(&key.id)
        .bind(key.version)
        .execute(&self.pool)
        .await
        .map_err(crate::storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_key(&self, id: &str) -> KeygateResult<()> {
        sqlx::query("DELETE FROM license_keys WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(crate::storage_err)?;
        Ok(())
    }
}
