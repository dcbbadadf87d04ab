// Copyright (c) BNB Chain, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use anyhow::anyhow;
use diesel::migration::MigrationVersion;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::{
    pooled_connection::{
        bb8::{Pool, PooledConnection},
        AsyncDieselConnectionManager,
    },
    AsyncPgConnection, RunQueryDsl,
};
use tracing::info;
use url::Url;

pub mod models;
pub mod store;

use diesel_migrations::{embed_migrations, EmbeddedMigrations};
use futures::FutureExt;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Debug, Clone)]
pub struct DbArgs {
    // Number of connections to keep in the pool.
    pub db_connection_pool_size: u32,

    // Time spent waiting for a connection from the pool to become available.
    pub db_connection_timeout: Duration,

    // Time spent waiting for statements to complete.
    pub db_statement_timeout: Option<Duration>,
}

impl Default for DbArgs {
    fn default() -> Self {
        Self {
            db_connection_pool_size: 16,
            db_connection_timeout: Duration::from_secs(60),
            db_statement_timeout: None,
        }
    }
}

/// A shared async Postgres connection pool. Instances can be cloned to share
/// access to the same pool.
#[derive(Clone)]
pub struct Db {
    pool: Pool<AsyncPgConnection>,
    database_url: String,
}

// Wrapper struct over the pooled connection type so callers don't depend on
// the pool implementation.
pub struct Connection<'a>(PooledConnection<'a, AsyncPgConnection>);

impl Db {
    // Construct a new DB connection pool talking to the database at `database_url`.
    pub async fn for_write(database_url: Url, args: DbArgs) -> anyhow::Result<Self> {
        let statement_timeout = args.db_statement_timeout;

        let mut config = diesel_async::pooled_connection::ManagerConfig::default();
        config.custom_setup = Box::new(move |url: &str| {
            let url = url.to_string();
            async move {
                use diesel_async::AsyncConnection;
                let mut conn = AsyncPgConnection::establish(&url).await?;
                if let Some(timeout) = statement_timeout {
                    diesel::sql_query(format!("SET statement_timeout = {}", timeout.as_millis()))
                        .execute(&mut conn)
                        .await
                        .map_err(diesel::ConnectionError::CouldntSetupConfiguration)?;
                }
                Ok(conn)
            }
            .boxed()
        });

        let manager = AsyncDieselConnectionManager::new_with_config(database_url.as_str(), config);
        let pool = Pool::builder()
            .max_size(args.db_connection_pool_size)
            .connection_timeout(args.db_connection_timeout)
            .build(manager)
            .await?;

        Ok(Self {
            pool,
            database_url: database_url.to_string(),
        })
    }

    // Retrieves a connection from the pool. Can fail with a timeout if a
    // connection cannot be established before `DbArgs::db_connection_timeout`
    // has elapsed.
    pub async fn connect(&self) -> anyhow::Result<Connection<'_>> {
        Ok(Connection(self.pool.get().await?))
    }

    // Statistics about the connection pool.
    pub fn state(&self) -> bb8::State {
        self.pool.state()
    }

    // Run the embedded migrations on the database.
    pub async fn run_migrations(&self) -> anyhow::Result<Vec<MigrationVersion<'static>>> {
        use diesel_async::AsyncConnection;
        use diesel_migrations::MigrationHarness;

        info!("Running migrations ...");
        let conn = AsyncPgConnection::establish(&self.database_url)
            .await
            .map_err(|e| anyhow!("Failed to establish connection for migrations: {e}"))?;
        let mut wrapper: AsyncConnectionWrapper<AsyncPgConnection> = conn.into();

        let finished_migrations = tokio::task::spawn_blocking(move || {
            wrapper
                .run_pending_migrations(MIGRATIONS)
                .map(|versions| versions.iter().map(MigrationVersion::as_owned).collect())
        })
        .await?
        .map_err(|e| anyhow!("Failed to run migrations: {e:?}"))?;

        info!("Migrations complete.");
        Ok(finished_migrations)
    }
}

impl<'a> Deref for Connection<'a> {
    type Target = PooledConnection<'a, AsyncPgConnection>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Connection<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
