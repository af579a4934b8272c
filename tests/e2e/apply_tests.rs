//! End-to-end tests applying generated scripts to SQL Server
//!
//! Environment variables (with defaults):
//! - SQL_SERVER_HOST (default: localhost)
//! - SQL_SERVER_PORT (default: 1433)
//! - SQL_SERVER_USER (default: sa)
//! - SQL_SERVER_PASSWORD (default: Password1)
//!
//! Run with: cargo test --test e2e_tests -- --ignored

use std::sync::LazyLock;

use rust_sqlmigrate::sql::separator::split_batches;
use rust_sqlmigrate::{generate_script, ScriptOptions};
use tiberius::{AuthMethod, Client, Config, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::common::TestContext;

/// Load environment variables from .env file (if present)
fn load_env() {
    let _ = dotenvy::dotenv();
}

/// SQL Server connection configuration loaded from environment
static SQL_CONFIG: LazyLock<SqlServerConfig> = LazyLock::new(|| {
    load_env();
    SqlServerConfig {
        host: std::env::var("SQL_SERVER_HOST").unwrap_or_else(|_| "localhost".to_string()),
        port: std::env::var("SQL_SERVER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(1433),
        user: std::env::var("SQL_SERVER_USER").unwrap_or_else(|_| "sa".to_string()),
        password: std::env::var("SQL_SERVER_PASSWORD").unwrap_or_else(|_| "Password1".to_string()),
    }
});

struct SqlServerConfig {
    host: String,
    port: u16,
    user: String,
    password: String,
}

type SqlClient = Client<Compat<TcpStream>>;
type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

fn create_config(database: Option<&str>) -> Config {
    let mut config = Config::new();
    config.host(&SQL_CONFIG.host);
    config.port(SQL_CONFIG.port);
    config.authentication(AuthMethod::sql_server(&SQL_CONFIG.user, &SQL_CONFIG.password));
    config.trust_cert();

    if let Some(db) = database {
        config.database(db);
    }

    config
}

async fn connect(database: Option<&str>) -> TestResult<SqlClient> {
    let config = create_config(database);
    let tcp = TcpStream::connect(config.get_addr()).await?;
    tcp.set_nodelay(true)?;
    let client = Client::connect(config, tcp.compat_write()).await?;
    Ok(client)
}

fn get_count(row: Option<Row>) -> i32 {
    row.and_then(|r| r.get::<i32, _>(0)).unwrap_or(0)
}

/// Drop and recreate a scratch database, returning a client connected to it
async fn fresh_database(name: &str) -> TestResult<SqlClient> {
    let mut master = connect(None).await?;
    let query = format!(
        "IF EXISTS (SELECT 1 FROM sys.databases WHERE name = '{name}') \
         BEGIN \
             ALTER DATABASE [{name}] SET SINGLE_USER WITH ROLLBACK IMMEDIATE; \
             DROP DATABASE [{name}]; \
         END; \
         CREATE DATABASE [{name}];"
    );
    master.execute(&query, &[]).await?;
    connect(Some(name)).await
}

/// Run a generated script batch by batch, the way sqlcmd would
async fn apply_script(client: &mut SqlClient, script: &str) -> TestResult {
    for batch in split_batches(script) {
        for _ in 0..batch.count {
            client.simple_query(&batch.sql).await?.into_results().await?;
        }
    }
    Ok(())
}

async fn table_exists(client: &mut SqlClient, schema: &str, table: &str) -> TestResult<bool> {
    let query = "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2";
    let row = client
        .query(query, &[&schema, &table])
        .await?
        .into_row()
        .await?;
    Ok(get_count(row) > 0)
}

async fn applied_migrations(client: &mut SqlClient) -> TestResult<Vec<String>> {
    let rows: Vec<Row> = client
        .simple_query("SELECT [MigrationId] FROM [__EFMigrationsHistory] ORDER BY [MigrationId]")
        .await?
        .into_first_result()
        .await?;
    Ok(rows
        .iter()
        .filter_map(|r| r.get::<&str, _>(0).map(str::to_string))
        .collect())
}

fn script(ctx: &TestContext, from: Option<&str>, to: Option<&str>, idempotent: bool) -> String {
    generate_script(ScriptOptions {
        project_path: ctx.project_path(),
        from: from.map(str::to_string),
        to: to.map(str::to_string),
        idempotent,
        ..Default::default()
    })
    .expect("script generation should succeed")
}

// ============================================================================
// E2E Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires SQL Server"]
async fn test_e2e_apply_blog_migrations() -> TestResult {
    let ctx = TestContext::with_fixture("blog");
    let mut client = fresh_database("SqlMigrate_Apply").await?;

    apply_script(&mut client, &script(&ctx, None, None, false)).await?;

    assert!(table_exists(&mut client, "dbo", "Blogs").await?);
    assert!(table_exists(&mut client, "content", "Posts").await?);
    assert_eq!(
        applied_migrations(&mut client).await?,
        vec!["20240101000000_Initial", "20240201000000_AddPosts"]
    );
    Ok(())
}

#[tokio::test]
#[ignore = "Requires SQL Server"]
async fn test_e2e_revert_to_empty_database() -> TestResult {
    let ctx = TestContext::with_fixture("blog");
    let mut client = fresh_database("SqlMigrate_Revert").await?;

    apply_script(&mut client, &script(&ctx, None, None, false)).await?;
    apply_script(&mut client, &script(&ctx, Some("AddPosts"), Some("0"), false)).await?;

    assert!(!table_exists(&mut client, "dbo", "Blogs").await?);
    assert!(!table_exists(&mut client, "content", "Posts").await?);
    assert!(applied_migrations(&mut client).await?.is_empty());
    Ok(())
}

#[tokio::test]
#[ignore = "Requires SQL Server"]
async fn test_e2e_idempotent_script_runs_twice() -> TestResult {
    let ctx = TestContext::with_fixture("blog");
    let mut client = fresh_database("SqlMigrate_Idempotent").await?;

    // The first run stops halfway so the second resumes from the history table
    apply_script(&mut client, &script(&ctx, None, Some("Initial"), true)).await?;
    let full = script(&ctx, None, None, true);
    apply_script(&mut client, &full).await?;
    apply_script(&mut client, &full).await?;

    assert!(table_exists(&mut client, "content", "Posts").await?);
    assert_eq!(applied_migrations(&mut client).await?.len(), 2);
    Ok(())
}
