use std::env;

use anyhow::{anyhow, ensure, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use diesel::connection::SimpleConnection;
use diesel::PgConnection;
use doctrack::config::AppConfig;
use doctrack::db::{self, PgPool};
use doctrack::models::{NewUser, Session};
use doctrack::routes;
use doctrack::state::AppState;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    /// Connects to `TEST_DATABASE_URL`, migrates and empties every table.
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url,
            database_max_pool_size: 4,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            pending_session_ttl_minutes: 10,
            serialization_retry_limit: 16,
            cors_allowed_origin: None,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let state = AppState::new(pool, config);
        let router = routes::create_router(state.clone());
        Ok(Self { state, router })
    }

    pub async fn cleanup(&self) -> Result<()> {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get cleanup connection: {err}"))?;
            truncate_all(&mut conn)?;
            Ok(())
        })
        .await
        .context("cleanup task panicked")?
    }

    #[allow(dead_code)]
    /// Registers `user` (consuming any invitations) and returns the id of a
    /// fresh upgraded session for them.
    pub fn sign_in(&self, user: &NewUser) -> Result<Uuid> {
        self.state.registrar().insert_invited_user(user)?;

        let sessions = self.state.sessions();
        let pending = sessions.generate_pending_session()?;
        sessions.upgrade_session(&Session {
            id: pending.id,
            user_id: user.id.clone(),
            expiration: Utc::now() + Duration::hours(1),
            access_token: format!("token-{}", user.id),
        })?;
        Ok(pending.id)
    }

    #[allow(dead_code)]
    pub async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        sid: Option<Uuid>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.send(method, path, Some(("application/json", body)), sid)
            .await
    }

    #[allow(dead_code)]
    pub async fn send_text(
        &self,
        method: Method,
        path: &str,
        text: &str,
        sid: Option<Uuid>,
    ) -> Result<hyper::Response<Body>> {
        self.send(method, path, Some(("text/plain", text.as_bytes().to_vec())), sid)
            .await
    }

    #[allow(dead_code)]
    pub async fn get(&self, path: &str, sid: Option<Uuid>) -> Result<hyper::Response<Body>> {
        self.send(Method::GET, path, None, sid).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, sid: Option<Uuid>) -> Result<hyper::Response<Body>> {
        self.send(Method::DELETE, path, None, sid).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<(&str, Vec<u8>)>,
        sid: Option<Uuid>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(sid) = sid {
            builder = builder.header("cookie", format!("sid={sid}"));
        }
        let request = match body {
            Some((content_type, bytes)) => builder
                .header("content-type", content_type)
                .body(Body::from(bytes))?,
            None => builder.body(Body::empty())?,
        };
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

#[allow(dead_code)]
pub fn new_user(tag: &str) -> NewUser {
    NewUser {
        id: Uuid::new_v4().to_string(),
        name: format!("User {tag}"),
        email: format!("{tag}@up.edu.ph"),
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

#[allow(dead_code)]
pub async fn expect_status(response: hyper::Response<Body>, status: StatusCode) -> Result<Vec<u8>> {
    let actual = response.status();
    let body = body_to_vec(response.into_body()).await?;
    ensure!(
        actual == status,
        "expected {status}, got {actual}: {}",
        String::from_utf8_lossy(&body)
    );
    Ok(body)
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        db::run_migrations(&mut conn)?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE notifications, subscriptions, documents, barcodes, batches, categories, \
         staff, invitations, offices, sessions, pending, users RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
