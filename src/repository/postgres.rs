//! Concrete `Repository` backend against Postgres via `sqlx`.
//!
//! `sqlx`/Postgres pairs naturally with the `tokio` runtime already used by
//! the controller. See DESIGN.md for why Postgres rather than MySQL.
//!
//! Uses the runtime-checked `query_as`/`query` API rather than the
//! compile-time-checked `query_as!`/`query!` macros, since this crate is
//! built without a live database to verify queries against at compile time.

use super::Repository;
use crate::domain::{InterfaceRow, InterfaceStatus, NetworkInterface};
use crate::error::Result;
use async_trait::async_trait;
use sqlx::PgPool;

const ROW_LIMIT: i64 = 10;

const SELECT_NODE_INTERFACES: &str = r#"
    SELECT id, macaddress, attached_node_name, address, cidr, mtu,
           netplan_success, deleted_at, modified_at
    FROM multi_interface
    WHERE attached_node_name = $1 AND deleted_at IS NULL
    ORDER BY id
    LIMIT $2
"#;

const UPDATE_STATUS: &str = r#"
    UPDATE multi_interface
    SET netplan_success = $1, modified_at = now()
    WHERE id = $2
"#;

pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    async fn fetch_for_node(&self, node: &str) -> Result<Vec<NetworkInterface>> {
        let rows: Vec<InterfaceRow> = sqlx::query_as(SELECT_NODE_INTERFACES)
            .bind(node)
            .bind(ROW_LIMIT)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(NetworkInterface::from).collect())
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn get_all_node_interfaces(&self, node: &str) -> Result<Vec<NetworkInterface>> {
        self.fetch_for_node(node).await
    }

    async fn get_active_interfaces(&self, node: &str) -> Result<Vec<NetworkInterface>> {
        self.fetch_for_node(node).await
    }

    async fn update_interface_status(&self, id: i64, status: InterfaceStatus) -> Result<()> {
        sqlx::query(UPDATE_STATUS)
            .bind(status.to_netplan_success())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
