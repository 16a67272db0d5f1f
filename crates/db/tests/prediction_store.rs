use assert_matches::assert_matches;
use sqlx::PgPool;
use yolo_core::error::RepositoryError;
use yolo_core::prediction::{Detection, PredictionArtifact};
use yolo_core::traits::{IdentityStore, PredictionRepository};
use yolo_db::repositories::{PredictionRepo, UserRepo};
use yolo_db::PgStore;

fn artifact(uid: &str, user_id: i64, detections: Vec<Detection>) -> PredictionArtifact {
    PredictionArtifact {
        uid: uid.to_string(),
        original_image: format!("uploads/original/dog-{uid}.jpg"),
        predicted_image: format!("uploads/predicted/dog-{uid}-{uid}.jpg"),
        user_id,
        detections,
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn saves_session_and_detections(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let input = artifact(
        "abc",
        7,
        vec![
            Detection::new("dog", 0.92, [1.0, 2.0, 3.0, 4.0]),
            Detection::new("cat", 0.5, [0.0, 0.0, 8.0, 9.5]),
        ],
    );

    store.save_prediction(&input).await.unwrap();

    let session = PredictionRepo::find_by_uid(&pool, "abc")
        .await
        .unwrap()
        .expect("session should exist");
    assert_eq!(session.user_id, 7);
    assert_eq!(session.original_image, "uploads/original/dog-abc.jpg");

    let rows = PredictionRepo::list_detections(&pool, "abc").await.unwrap();
    let labels: Vec<_> = rows.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, ["dog", "cat"]);
    assert_eq!(rows[0].bbox, "[1, 2, 3, 4]");
    assert!((rows[0].score - 0.92).abs() < f64::EPSILON);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn session_without_detections(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    store.save_prediction(&artifact("empty", 1, vec![])).await.unwrap();

    assert!(PredictionRepo::find_by_uid(&pool, "empty").await.unwrap().is_some());
    assert!(PredictionRepo::list_detections(&pool, "empty").await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_uid_is_rejected_without_partial_rows(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let first = artifact("dup", 1, vec![Detection::new("dog", 0.9, [0.0; 4])]);
    store.save_prediction(&first).await.unwrap();

    let second = artifact(
        "dup",
        2,
        vec![
            Detection::new("car", 0.8, [0.0; 4]),
            Detection::new("bus", 0.7, [0.0; 4]),
        ],
    );
    let err = store.save_prediction(&second).await.unwrap_err();
    assert_matches!(err, RepositoryError::Duplicate(uid) if uid == "dup");

    let session = PredictionRepo::find_by_uid(&pool, "dup").await.unwrap().unwrap();
    assert_eq!(session.user_id, 1);
    let rows = PredictionRepo::list_detections(&pool, "dup").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].label, "dog");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn username_resolution_is_idempotent(pool: PgPool) {
    let store = PgStore::new(pool.clone());

    let first = store.resolve_or_create_user("alice").await.unwrap();
    let second = store.resolve_or_create_user("alice").await.unwrap();
    let other = store.resolve_or_create_user("bob").await.unwrap();

    assert_eq!(first, second);
    assert_ne!(first, other);

    let alice = UserRepo::find_by_username(&pool, "alice").await.unwrap().unwrap();
    assert_eq!(alice.id, first);
    assert_eq!(alice.password, "__none__");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn existing_user_keeps_password(pool: PgPool) {
    sqlx::query("INSERT INTO users (username, password) VALUES ('carol', 'secret')")
        .execute(&pool)
        .await
        .unwrap();

    let store = PgStore::new(pool.clone());
    store.resolve_or_create_user("carol").await.unwrap();

    let carol = UserRepo::find_by_username(&pool, "carol").await.unwrap().unwrap();
    assert_eq!(carol.password, "secret");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn anonymous_user_is_shared(pool: PgPool) {
    let store = PgStore::new(pool.clone());

    let a = store.anonymous_user_id().await.unwrap();
    let b = store.anonymous_user_id().await.unwrap();
    assert_eq!(a, b);

    let anon = UserRepo::find_by_username(&pool, "__anonymous__")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(anon.id, a);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn health_check_passes(pool: PgPool) {
    yolo_db::health_check(&pool).await.unwrap();
}
