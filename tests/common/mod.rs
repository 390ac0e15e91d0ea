#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use tempfile::TempDir;

static SERVER: OnceLock<TestServer> = OnceLock::new();
static SCHEMA: tokio::sync::OnceCell<()> = tokio::sync::OnceCell::const_new();

const SCHEMA_SQL: &str = include_str!("../fixtures/schema.sql");

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    /// Directory the server writes uploaded files into
    pub storage: TempDir,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let storage = TempDir::new().context("failed to create storage dir")?;

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_cms-api-rust"));
        cmd.arg("serve")
            .env("CMS_API_PORT", port.to_string())
            .env("API_HOST", "127.0.0.1")
            .env("STORAGE_ROOT", storage.path())
            .env("SECURITY_JWT_SECRET", "")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // DATABASE_URL is inherited from the test environment
        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            storage,
            child,
        })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn stored_file(&self, path: &str) -> std::path::PathBuf {
        self.storage.path().join(path)
    }
}

async fn apply_schema(database_url: &str) -> Result<()> {
    let pool = sqlx::PgPool::connect(database_url)
        .await
        .context("failed to connect to DATABASE_URL")?;

    for statement in SCHEMA_SQL.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .with_context(|| format!("schema statement failed: {}", statement))?;
    }

    pool.close().await;
    Ok(())
}

/// Starts the shared server once per test binary. Returns `None` when no
/// database is configured, in which case callers skip.
pub async fn ensure_server() -> Result<Option<&'static TestServer>> {
    let _ = dotenvy::dotenv();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping integration test");
        return Ok(None);
    };

    SCHEMA
        .get_or_try_init(|| apply_schema(&database_url))
        .await?;

    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(Some(server))
}

/// Unique suffix so concurrently running tests never collide on names
pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}
