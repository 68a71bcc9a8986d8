use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use keygate_core::{
    CreateUserInput, KeygateError, KeygateResult, Plan, Role, User, UserStore,
};

use crate::{fmt_datetime, parse_datetime, parse_datetime_opt};

#[derive(Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::User => "user",
        Role::Reseller => "reseller",
    }
}

fn role_from_str(s: &str) -> Result<Role, KeygateError> {
    match s {
        "admin" => Ok(Role::Admin),
        "user" => Ok(Role::User),
        "reseller" => Ok(Role::Reseller),
        other => Err(KeygateError::Storage(format!("unknown role: {other}"))),
    }
}

fn plan_to_str(plan: Plan) -> &'static str {
    match plan {
        Plan::Free => "free",
        Plan::Premium => "premium",
        Plan::PremiumLifetime => "premium_lifetime",
    }
}

fn plan_from_str(s: &str) -> Result<Plan, KeygateError> {
    match s {
        "free" => Ok(Plan::Free),
        "premium" => Ok(Plan::Premium),
        "premium_lifetime" => Ok(Plan::PremiumLifetime),
        other => Err(KeygateError::Storage(format!("unknown plan: {other}"))),
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, KeygateError> {
    let id: String = row
        .try_get("id")
        .map_err(crate::storage_err)?;
    let username: String = row
        .try_get("username")
        .map_err(crate::storage_err)?;
    let email: String = row
        .try_get("email")
        .map_err(crate::storage_err)?;
    let password_hash: String = row
        .try_get("password_hash")
        .map_err(crate::storage_err)?;
    let role: String = row
        .try_get("role")
        .map_err(crate::storage_err)?;
    let plan: String = row
        .try_get("plan")
        .map_err(crate::storage_err)?;
    let secret: String = row
        .try_get("secret")
        .map_err(crate::storage_err)?;
    let secret_last_used_at: Option<String> = row
        .try_get("secret_last_used_at")
        .map_err(crate::storage_err)?;
    let key_prefix: Option<String> = row
        .try_get("key_prefix")
        .map_err(crate::storage_err)?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(crate::storage_err)?;

    Ok(User {
        id,
        username,
        email,
        password_hash,
        role: role_from_str(&role)?,
        plan: plan_from_str(&plan)?,
        secret,
        secret_last_used_at: parse_datetime_opt(secret_last_used_at.as_deref())?,
        key_prefix,
        created_at: parse_datetime(&created_at)?,
    })
}

const USER_SELECT: &str = r#"
    SELECT id, username, email, password_hash, role, plan, secret,
           secret_last_used_at, key_prefix, created_at
    FROM users
"#;

impl SqliteUserStore {
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

    async fn get_user_where(
        &self,
        where_clause: &str,
        bind_value: &str,
    ) -> KeygateResult<Option<User>> {
        let sql = format!("{USER_SELECT} WHERE {where_clause}");
        let row = sqlx::query(&sql)
            .bind(bind_value)
            .fetch_optional(&self.pool)
            .await
            .map_err(crate::storage_err)?;
        match row {
            Some(row) => Ok(Some(row_to_user(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn create_user(&self, input: &CreateUserInput) -> KeygateResult<User> {
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, role, plan, secret)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&input.id)
        .bind(&input.username)
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(role_to_str(input.role))
        .bind(plan_to_str(input.plan))
        .bind(&input.secret)
        .execute(&self.pool)
        .await
        .map_err(crate::storage_err)?;

        self.get_user_by_id(&input.id)
            .await?
            .ok_or_else(|| KeygateError::Storage("user vanished after insert".to_string()))
    }

    async fn get_user_by_id(&self, id: &str) -> KeygateResult<Option<User>> {
        self.get_user_where("id = ?", id).await
    }

    async fn get_user_by_secret(&self, secret: &str) -> KeygateResult<Option<User>> {
        self.get_user_where("secret = ?", secret).await
    }

    async fn get_user_by_email(&self, email: &str) -> KeygateResult<Option<User>> {
        self.get_user_where("email = ?", email).await
    }

    async fn get_user_by_username(&self, username: &str) -> KeygateResult<Option<User>> {
        self.get_user_where("username = ?", username).await
    }

    async fn touch_secret_last_used(
        &self,
        id: &str,
        at: chrono::DateTime<chrono::Utc>,
    ) -> KeygateResult<()> {
        sqlx::query("UPDATE users SET secret_last_used_at = ? WHERE id = ?")
            .bind(fmt_datetime(at))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(crate::storage_err)?;
        Ok(())
    }

    async fn set_key_prefix(&self, id: &str, prefix: Option<&str>) -> KeygateResult<()> {
        sqlx::query("UPDATE users SET key_prefix = ? WHERE id = ?")
            .bind(prefix)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(crate::storage_err)?;
        Ok(())
    }
}
