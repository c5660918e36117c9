//! Session lifecycle against the store: lazy expiry, rotation on refresh
//! and the background sweep.

use tavola::config::Config;
use tavola::db::{NewUser, rfc3339_from_now};
use tavola::services::session::generate_session_token;
use tavola::state::SharedState;

async fn spawn_state() -> SharedState {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    // One pooled connection, or each connection sees its own memory db
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.images.upload_base_path = std::env::temp_dir()
        .join(format!("tavola-session-test-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();

    SharedState::new(config)
        .await
        .expect("Failed to create shared state")
}

async fn seed_user(state: &SharedState, username: &str) -> i32 {
    state
        .store
        .create_user(NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            name: format!("{username} name"),
            password_hash: "unused".to_string(),
            role: "user".to_string(),
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_expired_session_is_invalid_and_lazily_deleted() {
    let state = spawn_state().await;
    let user_id = seed_user(&state, "carol").await;

    let session_id = generate_session_token();
    state
        .store
        .create_session(&session_id, user_id, &rfc3339_from_now(-10))
        .await
        .unwrap();

    let validation = state.sessions.validate(&session_id).await.unwrap();
    assert!(!validation.is_valid());

    // Lazy expiry removed the row itself
    let row = state.store.get_session(&session_id).await.unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn test_refresh_rotates_the_token() {
    let state = spawn_state().await;
    let user_id = seed_user(&state, "carol").await;

    let old_id = state.sessions.create(user_id, false).await.unwrap();

    let new_id = state
        .sessions
        .refresh(&old_id, false)
        .await
        .unwrap()
        .expect("refresh of a valid session");
    assert_ne!(new_id, old_id);

    // Old token is gone, new one validates to the same user
    assert!(!state.sessions.validate(&old_id).await.unwrap().is_valid());
    let user = state
        .sessions
        .validate(&new_id)
        .await
        .unwrap()
        .into_user()
        .expect("rotated session is valid");
    assert_eq!(user.id, user_id);
}

#[tokio::test]
async fn test_refresh_of_invalid_session_yields_none() {
    let state = spawn_state().await;

    let rotated = state.sessions.refresh("no-such-session", false).await.unwrap();
    assert!(rotated.is_none());
}

#[tokio::test]
async fn test_cleanup_expired_sweeps_only_past_expiry_rows() {
    let state = spawn_state().await;
    let user_id = seed_user(&state, "carol").await;

    let expired_a = generate_session_token();
    let expired_b = generate_session_token();
    state
        .store
        .create_session(&expired_a, user_id, &rfc3339_from_now(-3600))
        .await
        .unwrap();
    state
        .store
        .create_session(&expired_b, user_id, &rfc3339_from_now(-10))
        .await
        .unwrap();

    let live = state.sessions.create(user_id, false).await.unwrap();

    let deleted = state.sessions.cleanup_expired().await.unwrap();
    assert_eq!(deleted, 2);

    assert!(state.store.get_session(&expired_a).await.unwrap().is_none());
    assert!(state.store.get_session(&expired_b).await.unwrap().is_none());
    assert!(state.sessions.validate(&live).await.unwrap().is_valid());
}

#[tokio::test]
async fn test_destroy_is_idempotent() {
    let state = spawn_state().await;
    let user_id = seed_user(&state, "carol").await;

    let session_id = state.sessions.create(user_id, false).await.unwrap();

    state.sessions.destroy(&session_id).await.unwrap();
    state.sessions.destroy(&session_id).await.unwrap();

    assert!(
        !state
            .sessions
            .validate(&session_id)
            .await
            .unwrap()
            .is_valid()
    );
}
