use async_trait::async_trait;

use super::PgStore;
use crate::database::models::User;
use crate::database::repository::{DbResult, Page, UserRepository};

const USER_COLUMNS: &str = "id, email, role, created_at, updated_at";

#[async_trait]
impl UserRepository for PgStore {
    async fn find_user(&self, id: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        Ok(sqlx::query_as::<_, User>(&sql).bind(email.trim()).fetch_optional(&self.pool).await?)
    }

    async fn save_user(&self, user: &User) -> DbResult<User> {
        let sql = format!(
            "INSERT INTO users (id, email, role, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE
                SET email = EXCLUDED.email, role = EXCLUDED.role, updated_at = now()
             RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(&user.id)
            .bind(&user.email)
            .bind(user.role)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_users(&self, page: Page) -> DbResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC OFFSET $1 LIMIT $2");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(page.offset)
            .bind(page.limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_users(&self) -> DbResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&self.pool).await?)
    }
}
