use async_trait::async_trait;

use super::PgStore;
use crate::database::models::Client;
use crate::database::repository::{ClientRepository, DbResult};

const CLIENT_COLUMNS: &str = "id, business_id, name, phone, address, notes, created_at, updated_at";

#[async_trait]
impl ClientRepository for PgStore {
    async fn insert_client(&self, client: &Client) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO clients (id, business_id, name, phone, address, notes, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&client.id)
        .bind(&client.business_id)
        .bind(&client.name)
        .bind(&client.phone)
        .bind(&client.address)
        .bind(&client.notes)
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_client(&self, client: &Client) -> DbResult<()> {
        sqlx::query(
            "UPDATE clients SET name = $3, phone = $4, address = $5, notes = $6, updated_at = now()
              WHERE business_id = $1 AND id = $2",
        )
        .bind(&client.business_id)
        .bind(&client.id)
        .bind(&client.name)
        .bind(&client.phone)
        .bind(&client.address)
        .bind(&client.notes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_client(&self, business_id: &str, id: &str) -> DbResult<Option<Client>> {
        let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE business_id = $1 AND id = $2");
        Ok(sqlx::query_as::<_, Client>(&sql)
            .bind(business_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_clients(&self, business_id: &str) -> DbResult<Vec<Client>> {
        let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE business_id = $1 ORDER BY name ASC");
        Ok(sqlx::query_as::<_, Client>(&sql)
            .bind(business_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn client_has_history(&self, business_id: &str, id: &str) -> DbResult<bool> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM jobs WHERE business_id = $1 AND client_id = $2 AND status <> 'SCHEDULED')
                 OR EXISTS (SELECT 1 FROM invoices WHERE business_id = $1 AND client_id = $2)",
        )
        .bind(business_id)
        .bind(id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_client(&self, business_id: &str, id: &str) -> DbResult<bool> {
        // Re-checked in the statement so a job completed meanwhile is never cascaded away.
        let result = sqlx::query(
            "DELETE FROM clients c
              WHERE c.business_id = $1 AND c.id = $2
                AND NOT EXISTS (SELECT 1 FROM jobs j WHERE j.client_id = c.id AND j.status <> 'SCHEDULED')
                AND NOT EXISTS (SELECT 1 FROM invoices i WHERE i.client_id = c.id)",
        )
        .bind(business_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_clients(&self, business_id: &str) -> DbResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM clients WHERE business_id = $1")
            .bind(business_id)
            .fetch_one(&self.pool)
            .await?)
    }
}
