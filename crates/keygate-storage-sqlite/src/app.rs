use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use keygate_core::{
    App, AppStatus, AppStore, KeygateError, KeygateResult, ResellerGrant, Role, User,
};

use crate::parse_datetime;

#[derive(Clone)]
pub struct SqliteAppStore {
    pool: SqlitePool,
}

fn status_to_str(status: AppStatus) -> &'static str {
    match status {
        AppStatus::On => "on",
        AppStatus::Off => "off",
    }
}

fn status_from_str(s: &str) -> Result<AppStatus, KeygateError> {
    match s {
        "on" => Ok(AppStatus::On),
        "off" => Ok(AppStatus::Off),
        other => Err(KeygateError::Storage(format!("unknown app status: {other}"))),
    }
}

fn row_to_app(row: &sqlx::sqlite::SqliteRow) -> Result<App, KeygateError> {
    let id: String = row
        .try_get("id")
        .map_err(crate::storage_err)?;
    let name: String = row
        .try_get("name")
        .map_err(crate::storage_err)?;
    let owner_user_id: String = row
        .try_get("owner_user_id")
        .map_err(crate::storage_err)?;
    let status: String = row
        .try_get("status")
        .map_err(crate::storage_err)?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(crate::storage_err)?;

    Ok(App {
        id,
        name,
        owner_user_id,
        status: status_from_str(&status)?,
        created_at: parse_datetime(&created_at)?,
    })
}

fn row_to_grant(row: &sqlx::sqlite::SqliteRow) -> Result<ResellerGrant, KeygateError> {
    let id: String = row
        .try_get("id")
        .map_err(crate::storage_err)?;
    let reseller_user_id: String = row
        .try_get("reseller_user_id")
        .map_err(crate::storage_err)?;
    let app_id: String = row
        .try_get("app_id")
        .map_err(crate::storage_err)?;
    let created_by_user_id: String = row
        .try_get("created_by_user_id")
        .map_err(crate::storage_err)?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(crate::storage_err)?;

    Ok(ResellerGrant {
        id,
        reseller_user_id,
        app_id,
        created_by_user_id,
        created_at: parse_datetime(&created_at)?,
    })
}

const APP_SELECT: &str = "SELECT id, name, owner_user_id, status, created_at FROM apps";

const GRANT_SELECT: &str =
    "SELECT id, reseller_user_id, app_id, created_by_user_id, created_at FROM reseller_grants";

impl SqliteAppStore {
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
}

#[async_trait]
impl AppStore for SqliteAppStore {
    async fn create_app(&self, app: &App) -> KeygateResult<()> {
        sqlx::query("INSERT INTO apps (id, name, owner_user_id, status) VALUES (?, ?, ?, ?)")
            .bind(&app.id)
            .bind(&app.name)
            .bind(&app.owner_user_id)
            .bind(status_to_str(app.status))
            .execute(&self.pool)
            .await
            .map_err(crate::storage_err)?;
        Ok(())
    }

    async fn get_app(&self, id: &str) -> KeygateResult<Option<App>> {
        let sql = format!("{APP_SELECT} WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(crate::storage_err)?;
        match row {
            Some(row) => Ok(Some(row_to_app(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_apps_visible_to(&self, user: &User) -> KeygateResult<Vec<App>> {
        let rows = if user.role == Role::Admin {
            let sql = format!("{APP_SELECT} ORDER BY created_at");
            sqlx::query(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(crate::storage_err)?
        } else {
            let sql = format!(
                "{APP_SELECT} WHERE owner_user_id = ?
                 OR id IN (SELECT app_id FROM reseller_grants WHERE reseller_user_id = ?)
                 ORDER BY created_at"
            );
            sqlx::query(&sql)
                .bind(&user.id)
                .bind(&user.id)
                .fetch_all(&self.pool)
                .await
                .map_err(crate::storage_err)?
        };
        rows.iter().map(row_to_app).collect()
    }

    async fn count_apps_owned_by(&self, user_id: &str) -> KeygateResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM apps WHERE owner_user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(crate::storage_err)?;
        row.try_get("n")
            .map_err(crate::storage_err)
    }

    async fn update_app_status(&self, id: &str, status: AppStatus) -> KeygateResult<()> {
        sqlx::query("UPDATE apps SET status = ? WHERE id = ?")
            .bind(status_to_str(status))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(crate::storage_err)?;
        Ok(())
    }

    async fn delete_app(&self, id: &str) -> KeygateResult<()> {
        // Cascade by hand; the schema carries no FK pragmas.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(crate::storage_err)?;
        sqlx::query("DELETE FROM license_keys WHERE app_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(crate::storage_err)?;
        sqlx::query("DELETE FROM reseller_grants WHERE app_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(crate::storage_err)?;
        sqlx::query("DELETE FROM apps WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(crate::storage_err)?;
        tx.commit()
            .await
            .map_err(crate::storage_err)?;
        Ok(())
    }

    async fn create_grant(&self, grant: &ResellerGrant) -> KeygateResult<()> {
        sqlx::query(
            "INSERT INTO reseller_grants (id, reseller_user_id, app_id, created_by_user_id)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&grant.id)
        .bind(&grant.reseller_user_id)
        .bind(&grant.app_id)
        .bind(&grant.created_by_user_id)
        .execute(&self.pool)
        .await
        .map_err(crate::storage_err)?;
        Ok(())
    }

    async fn delete_grant(&self, id: &str) -> KeygateResult<()> {
        sqlx::query("DELETE FROM reseller_grants WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(crate::storage_err)?;
        Ok(())
    }

    async fn list_grants_for_app(&self, app_id: &str) -> KeygateResult<Vec<ResellerGrant>> {
        let sql = format!("{GRANT_SELECT} WHERE app_id = ? ORDER BY created_at");
        let rows = sqlx::query(&sql)
            .bind(app_id)
            .fetch_all(&self.pool)
            .await
            .map_err(crate::storage_err)?;
        rows.iter().map(row_to_grant).collect()
    }

    async fn list_grants_for_user(&self, user_id: &str) -> KeygateResult<Vec<ResellerGrant>> {
        let sql = format!("{GRANT_SELECT} WHERE reseller_user_id = ? ORDER BY created_at");
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(crate::storage_err)?;
        rows.iter().map(row_to_grant).collect()
    }

    async fn grant_exists(&self, user_id: &str, app_id: &str) -> KeygateResult<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM reseller_grants WHERE reseller_user_id = ? AND app_id = ?",
        )
        .bind(user_id)
        .bind(app_id)
        .fetch_one(&self.pool)
        .await
        .map_err(crate::storage_err)?;
        let n: i64 = row
            .try_get("n")
            .map_err(crate::storage_err)?;
        Ok(n > 0)
    }
}
