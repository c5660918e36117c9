//! Image lifecycle against a real filesystem: temp save, promotion to a
//! recipe, best-effort deletion and the cleanup sweeps.

use std::path::Path;
use std::time::Duration;

use tavola::config::Config;
use tavola::state::SharedState;

/// Temp filenames are millisecond-stamped; space out saves so two records
/// never land on the same name.
async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

async fn spawn_state() -> SharedState {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    // One pooled connection, or each connection sees its own memory db
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.images.upload_base_path = std::env::temp_dir()
        .join(format!("tavola-image-test-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();

    SharedState::new(config)
        .await
        .expect("Failed to create shared state")
}

const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[tokio::test]
async fn test_save_temp_writes_file_and_record() {
    let state = spawn_state().await;

    let record = state
        .images
        .save_temp(PNG_BYTES, "generated.png")
        .await
        .unwrap();

    assert!(record.url.starts_with("/uploads/temp/temp-"));
    assert!(record.url.ends_with(".png"));
    assert_eq!(record.image_type, "temp");
    assert!(!record.used);
    assert!(record.recipe_id.is_none());
    assert!(Path::new(&record.filepath).exists());

    let fetched = state.store.get_image_by_url(&record.url).await.unwrap();
    assert!(fetched.is_some());
}

#[tokio::test]
async fn test_promote_moves_file_and_updates_record() {
    let state = spawn_state().await;

    let temp = state
        .images
        .save_temp(PNG_BYTES, "generated.png")
        .await
        .unwrap();

    let new_url = state.images.promote_to_recipe(&temp.url, 42).await.unwrap();

    assert!(new_url.starts_with("/uploads/recipes/recipe-42-"));
    assert!(new_url.ends_with(".png"));

    // Original temp file is gone, the promoted one exists
    assert!(!Path::new(&temp.filepath).exists());

    let record = state
        .store
        .get_image_by_url(&new_url)
        .await
        .unwrap()
        .expect("promoted record missing");
    assert_eq!(record.image_type, "recipe");
    assert!(record.used);
    assert_eq!(record.recipe_id, Some(42));
    assert!(Path::new(&record.filepath).exists());

    // The old URL no longer resolves
    let old = state.store.get_image_by_url(&temp.url).await.unwrap();
    assert!(old.is_none());
}

#[tokio::test]
async fn test_promote_missing_temp_is_an_error() {
    let state = spawn_state().await;

    let result = state
        .images
        .promote_to_recipe("/uploads/temp/temp-0.png", 7)
        .await;

    assert!(matches!(
        result,
        Err(tavola::services::ImageError::TempNotFound(_))
    ));

    // Nothing was recorded for the failed promotion
    let records = state.store.recipe_images(7).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_delete_image_is_idempotent() {
    let state = spawn_state().await;

    let record = state
        .images
        .save_temp(PNG_BYTES, "generated.png")
        .await
        .unwrap();

    state.images.delete_image(&record.url).await;
    assert!(!Path::new(&record.filepath).exists());
    assert!(
        state
            .store
            .get_image_by_url(&record.url)
            .await
            .unwrap()
            .is_none()
    );

    // A second delete of the same URL is a no-op
    state.images.delete_image(&record.url).await;
}

#[tokio::test]
async fn test_cleanup_temp_spares_promoted_images() {
    let state = spawn_state().await;

    let stale = state
        .images
        .save_temp(PNG_BYTES, "stale.png")
        .await
        .unwrap();
    tick().await;
    let promoted = state
        .images
        .save_temp(PNG_BYTES, "promoted.png")
        .await
        .unwrap();

    let recipe_url = state
        .images
        .promote_to_recipe(&promoted.url, 1)
        .await
        .unwrap();

    // Negative age puts the cutoff in the future, so every unused temp
    // image qualifies regardless of clock granularity.
    let deleted = state.images.cleanup_temp(-1).await.unwrap();
    assert_eq!(deleted, 1);

    assert!(!Path::new(&stale.filepath).exists());
    assert!(
        state
            .store
            .get_image_by_url(&stale.url)
            .await
            .unwrap()
            .is_none()
    );

    // The promoted image is recipe-typed and untouched by the temp sweep
    let record = state
        .store
        .get_image_by_url(&recipe_url)
        .await
        .unwrap()
        .expect("promoted record missing");
    assert!(Path::new(&record.filepath).exists());
}

#[tokio::test]
async fn test_cleanup_recent_temp_images_are_kept() {
    let state = spawn_state().await;

    let fresh = state
        .images
        .save_temp(PNG_BYTES, "fresh.png")
        .await
        .unwrap();

    // One-hour cutoff: an image saved just now is newer and survives
    let deleted = state.images.cleanup_temp(1).await.unwrap();
    assert_eq!(deleted, 0);
    assert!(Path::new(&fresh.filepath).exists());
}

#[tokio::test]
async fn test_cleanup_all_recipe_images() {
    let state = spawn_state().await;

    let a = state.images.save_temp(PNG_BYTES, "a.png").await.unwrap();
    tick().await;
    let b = state.images.save_temp(PNG_BYTES, "b.png").await.unwrap();
    tick().await;
    let keep = state.images.save_temp(PNG_BYTES, "keep.png").await.unwrap();

    let url_a = state.images.promote_to_recipe(&a.url, 1).await.unwrap();
    let url_b = state.images.promote_to_recipe(&b.url, 2).await.unwrap();

    let deleted = state.images.cleanup_all_recipe_images().await.unwrap();
    assert_eq!(deleted, 2);

    assert!(state.store.get_image_by_url(&url_a).await.unwrap().is_none());
    assert!(state.store.get_image_by_url(&url_b).await.unwrap().is_none());

    // Temp images are out of scope for the recipe sweep
    assert!(Path::new(&keep.filepath).exists());
}

#[tokio::test]
async fn test_startup_cleanup_purges_recipes_and_old_temps() {
    let state = spawn_state().await;

    let temp = state.images.save_temp(PNG_BYTES, "temp.png").await.unwrap();
    tick().await;
    let promoted = state.images.save_temp(PNG_BYTES, "p.png").await.unwrap();
    let recipe_url = state
        .images
        .promote_to_recipe(&promoted.url, 5)
        .await
        .unwrap();

    // Future cutoff makes the fresh temp image eligible
    state.images.startup_cleanup(-1).await;

    assert!(
        state
            .store
            .get_image_by_url(&recipe_url)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        state
            .store
            .get_image_by_url(&temp.url)
            .await
            .unwrap()
            .is_none()
    );
}
