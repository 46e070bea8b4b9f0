use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::PgExecutor;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::session::errors::StoreError;
use crate::domain::session::models::RefreshSecret;
use crate::domain::session::models::RefreshToken;
use crate::domain::session::models::RefreshTokenId;
use crate::domain::session::ports::RefreshTokenStore;
use crate::domain::user::models::UserId;

pub struct PostgresRefreshTokenStore {
    pool: PgPool,
}

impl PostgresRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    token: String,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    replaced_by_token: Option<String>,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshToken {
            id: RefreshTokenId(row.id),
            secret: RefreshSecret::new(row.token),
            user_id: UserId(row.user_id),
            created_at: row.created_at,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            replaced_by: row.replaced_by_token.map(RefreshSecret::new),
        }
    }
}

fn database_error(e: sqlx::Error) -> StoreError {
    StoreError::DatabaseError(e.to_string())
}

fn insert_error(e: sqlx::Error) -> StoreError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return StoreError::Conflict;
        }
    }
    database_error(e)
}

fn dead_record_error(record: Option<RefreshToken>, now: DateTime<Utc>) -> StoreError {
    record.map_or(StoreError::NotFound, |record| StoreError::dead(&record, now))
}

async fn fetch_record<'e, E>(
    executor: E,
    secret: &RefreshSecret,
) -> Result<Option<RefreshToken>, StoreError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, RefreshTokenRow>(
        r#"
        SELECT id, token, user_id, created_at, expires_at, revoked_at, replaced_by_token
        FROM refresh_tokens
        WHERE token = $1
        "#,
    )
    .bind(secret.as_str())
    .fetch_optional(executor)
    .await
    .map_err(database_error)?;

    Ok(row.map(RefreshToken::from))
}

async fn insert_record<'e, E>(executor: E, token: &RefreshToken) -> Result<(), StoreError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, token, user_id, created_at, expires_at, revoked_at, replaced_by_token)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(token.id.0)
    .bind(token.secret.as_str())
    .bind(token.user_id.0)
    .bind(token.created_at)
    .bind(token.expires_at)
    .bind(token.revoked_at)
    .bind(token.replaced_by.as_ref().map(RefreshSecret::as_str))
    .execute(executor)
    .await
    .map_err(insert_error)?;

    Ok(())
}

#[async_trait]
impl RefreshTokenStore for PostgresRefreshTokenStore {
    async fn add(&self, token: RefreshToken) -> Result<(), StoreError> {
        insert_record(&self.pool, &token).await
    }

    async fn find_live(
        &self,
        secret: &RefreshSecret,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken, StoreError> {
        match fetch_record(&self.pool, secret).await? {
            Some(record) if record.is_live(now) => Ok(record),
            record => Err(dead_record_error(record, now)),
        }
    }

    async fn rotate(
        &self,
        old: &RefreshSecret,
        successor: RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(database_error)?;

        // Row lock serializes concurrent rotations; losers re-evaluate the
        // predicate after the winner commits and match nothing.
        let updated = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $3, replaced_by_token = $2
            WHERE token = $1 AND revoked_at IS NULL AND expires_at > $3
            "#,
        )
        .bind(old.as_str())
        .bind(successor.secret.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(database_error)?;

        if updated.rows_affected() == 0 {
            let record = fetch_record(&mut *tx, old).await?;
            tx.rollback().await.map_err(database_error)?;
            return Err(dead_record_error(record, now));
        }

        insert_record(&mut *tx, &successor).await?;
        tx.commit().await.map_err(database_error)?;

        Ok(())
    }

    async fn revoke(
        &self,
        secret: &RefreshSecret,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $2
            WHERE token = $1 AND revoked_at IS NULL AND expires_at > $2
            "#,
        )
        .bind(secret.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        if updated.rows_affected() > 0 {
            return Ok(true);
        }

        match fetch_record(&self.pool, secret).await? {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound),
        }
    }

    async fn revoke_all_for_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $2
            WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > $2
            "#,
        )
        .bind(user_id.0)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(updated.rows_affected())
    }
}
