mod common;

use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{acquire_db_lock, body_to_vec, expect_status, new_user, TestApp};
use doctrack::db::{Clock, Database};
use doctrack::error::StoreError;
use doctrack::models::{Session, UserProfile};
use doctrack::store::{InvalidatedSession, SessionEntropy, SessionStore, NONCE_LEN};
use uuid::Uuid;

struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

struct FixedEntropy(Uuid);

impl SessionEntropy for FixedEntropy {
    fn session_id(&self) -> Uuid {
        self.0
    }

    fn nonce(&self) -> [u8; NONCE_LEN] {
        [0xab; NONCE_LEN]
    }
}

#[tokio::test]
async fn oauth_flow_upgrades_pending_session() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let user = new_user("hello");
    let office = app.state.offices().create_office("Test")?;
    let creation = app
        .state
        .invitations()
        .upsert_invitation(office, &user.email, 0)?
        .expect("email is not registered yet");
    assert!(Utc::now() > creation);
    let granted = app.state.registrar().insert_invited_user(&user)?;
    assert_eq!(granted, Some(vec![office]));

    let sessions = app.state.sessions();
    let pending = sessions.generate_pending_session()?;
    assert_eq!(pending.id.get_version_num(), 4);
    assert_eq!(hex::encode(&pending.nonce).len(), 64);
    assert!(Utc::now() < pending.expiration);

    assert!(!sessions.check_valid_session(pending.id)?);
    assert_eq!(sessions.get_user_from_session(pending.id)?, None);
    assert_eq!(sessions.get_pending_session_nonce(pending.id)?, pending.nonce);

    let consumed = sessions.upgrade_session(&Session {
        id: pending.id,
        user_id: user.id.clone(),
        expiration: pending.expiration,
        access_token: "access-token".to_string(),
    })?;
    assert_eq!(consumed.as_ref(), Some(&pending));

    assert!(sessions.check_valid_session(pending.id)?);
    assert_eq!(
        sessions.get_user_from_session(pending.id)?,
        Some(UserProfile {
            name: user.name.clone(),
            email: user.email.clone(),
        })
    );
    assert!(sessions.get_pending_session_nonce(pending.id)?.is_empty());
    assert_eq!(
        sessions.get_permissions_from_session(pending.id, office)?,
        Some(0)
    );
    assert_eq!(
        sessions.get_permissions_from_session(pending.id, office + 1)?,
        None
    );

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn unknown_sessions_are_absent_not_errors() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let sessions = app.state.sessions();
    let unknown = Uuid::new_v4();
    assert!(sessions.get_pending_session_nonce(unknown)?.is_empty());
    assert!(!sessions.check_valid_session(unknown)?);
    assert_eq!(sessions.get_user_from_session(unknown)?, None);
    assert_eq!(sessions.get_permissions_from_session(unknown, 1)?, None);
    assert_eq!(sessions.invalidate_session(unknown)?, None);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn invalidation_removes_pending_and_upgraded_sessions() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let sessions = app.state.sessions();
    let pending = sessions.generate_pending_session()?;
    match sessions.invalidate_session(pending.id)? {
        Some(InvalidatedSession::Pending(previous)) => assert_eq!(previous, pending),
        other => panic!("expected pending invalidation, got {other:?}"),
    }
    assert!(sessions.get_pending_session_nonce(pending.id)?.is_empty());
    assert_eq!(sessions.invalidate_session(pending.id)?, None);

    let user = new_user("leaving");
    let sid = app.sign_in(&user)?;
    match sessions.invalidate_session(sid)? {
        Some(InvalidatedSession::Session(previous)) => {
            assert_eq!(previous.id, sid);
            assert_eq!(previous.user_id, user.id);
        }
        other => panic!("expected session invalidation, got {other:?}"),
    }
    assert!(!sessions.check_valid_session(sid)?);
    assert_eq!(sessions.invalidate_session(sid)?, None);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn expired_rows_are_ignored_then_purged() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let stale = SessionStore::new(app.state.database.clone(), Duration::minutes(-1));
    let pending = stale.generate_pending_session()?;
    assert!(stale.get_pending_session_nonce(pending.id)?.is_empty());

    let user = new_user("stale");
    app.state.registrar().insert_invited_user(&user)?;
    let sessions = app.state.sessions();
    let upgrade = sessions.generate_pending_session()?;
    sessions.upgrade_session(&Session {
        id: upgrade.id,
        user_id: user.id.clone(),
        expiration: Utc::now() - Duration::minutes(1),
        access_token: "expired".to_string(),
    })?;
    assert!(!sessions.check_valid_session(upgrade.id)?);
    assert_eq!(sessions.get_user_from_session(upgrade.id)?, None);

    let purged = sessions.purge_expired()?;
    assert_eq!(purged.pending, 1);
    assert_eq!(purged.sessions, 1);
    assert_eq!(sessions.invalidate_session(upgrade.id)?, None);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn session_routes_require_the_cookie() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let user = new_user("cookie");
    let sid = app.sign_in(&user)?;

    let anonymous = app.get("/api/session", None).await?;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/api/session", Some(sid)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let profile: UserProfile = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(profile.email, user.email);

    let logout = app.delete("/api/session", Some(sid)).await?;
    expect_status(logout, StatusCode::NO_CONTENT).await?;

    let after = app.get("/api/session", Some(sid)).await?;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn pending_sessions_lapse_when_the_clock_passes_their_ttl() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let start = Utc.with_ymd_and_hms(2030, 1, 1, 8, 0, 0).unwrap();
    let clock = Arc::new(ManualClock(Mutex::new(start)));
    let database = Database::with_clock(app.state.pool.clone(), clock.clone());
    let sessions = SessionStore::new(database, Duration::minutes(10));

    let pending = sessions.generate_pending_session()?;
    assert_eq!(pending.expiration, start + Duration::minutes(10));

    clock.advance(Duration::minutes(9));
    assert_eq!(sessions.get_pending_session_nonce(pending.id)?, pending.nonce);

    clock.advance(Duration::minutes(1));
    assert!(sessions.get_pending_session_nonce(pending.id)?.is_empty());
    assert_eq!(sessions.purge_expired()?.pending, 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn colliding_session_ids_surface_as_database_errors() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let id = Uuid::new_v4();
    let sessions = SessionStore::with_entropy(
        app.state.database.clone(),
        Duration::minutes(10),
        Arc::new(FixedEntropy(id)),
    );

    let pending = sessions.generate_pending_session()?;
    assert_eq!(pending.id, id);
    assert_eq!(pending.nonce, vec![0xab; NONCE_LEN]);

    let err = sessions
        .generate_pending_session()
        .expect_err("a second insert with the same id must fail");
    assert!(matches!(err, StoreError::Database(_)));
    assert!(!err.is_retryable());

    app.cleanup().await?;
    Ok(())
}
