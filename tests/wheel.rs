use std::sync::Arc;

use rand::{Rng, SeedableRng, rngs::StdRng};

use lottery_wheel::{
    config::AppConfig,
    dao::group_store::file::FileGroupStore,
    engine::{SpinResolution, clock::ManualClock},
    error::ServiceError,
    presentation::console::ConsoleSurface,
    services::{group_service, spin_service},
    state::AppState,
};

async fn open(path: &std::path::Path, seed: u64) -> AppState {
    AppState::bootstrap(
        &AppConfig::default(),
        Arc::new(FileGroupStore::new(path)),
        Arc::new(ConsoleSurface::new(Box::new(std::io::sink()))),
    )
    .await
    .configure_engine(|engine| {
        engine
            .with_rng(StdRng::seed_from_u64(seed))
            .with_clock(Arc::new(ManualClock::new()))
    })
}

#[tokio::test]
async fn deleting_an_option_is_persisted_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");

    let mut state = open(&path, 1).await;
    group_service::add_group(&mut state, "fruits").await.unwrap();
    for fruit in ["apple", "banana", "cherry"] {
        group_service::add_option(&mut state, fruit).await.unwrap();
    }
    group_service::delete_option(&mut state, 1).await.unwrap();
    state.shutdown().await;

    let document: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(
        document,
        serde_json::json!({ "lottery-options": { "fruits": ["apple", "cherry"] } })
    );

    let state = open(&path, 1).await;
    assert_eq!(
        state.store().options("fruits").unwrap(),
        vec!["apple", "cherry"]
    );
}

#[tokio::test]
async fn second_identical_group_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    let mut state = open(&path, 1).await;

    group_service::add_group(&mut state, "a").await.unwrap();
    let err = group_service::add_group(&mut state, "a").await.unwrap_err();

    assert!(matches!(err, ServiceError::DuplicateGroup(name) if name == "a"));
    assert_eq!(state.store().group_names(), vec!["a"]);
    assert!(state.store().options("a").unwrap().is_empty());
}

#[tokio::test]
async fn spin_reveals_the_seeded_winner_and_unlocks_the_group() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    let options = ["north", "east", "south", "west"];
    let expected = StdRng::seed_from_u64(21).random_range(0..options.len());

    let mut state = open(&path, 21).await;
    group_service::add_group(&mut state, "compass").await.unwrap();
    for option in options {
        group_service::add_option(&mut state, option).await.unwrap();
    }

    let handle = spin_service::start_spin(&mut state).await.unwrap();
    assert!(matches!(
        spin_service::start_spin(&mut state).await,
        Err(ServiceError::AlreadySpinning)
    ));

    let SpinResolution::Revealed(outcome) = handle.wait().await else {
        panic!("spin ended without a reveal");
    };
    assert_eq!(outcome.winner, options[expected]);
    assert_eq!(outcome.group, "compass");

    let mut watch = state.engine().watch();
    watch
        .wait_for(|snapshot| snapshot.session_id.is_none())
        .await
        .unwrap();
    group_service::delete_option(&mut state, expected)
        .await
        .unwrap();
    assert_eq!(state.store().options("compass").unwrap().len(), 3);
}

#[tokio::test]
async fn unreadable_document_starts_empty_and_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    std::fs::write(&path, "{ definitely not json").unwrap();

    let mut state = open(&path, 1).await;
    assert!(state.store().group_names().is_empty());

    group_service::add_group(&mut state, "fresh").await.unwrap();
    state.shutdown().await;

    let document: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(document["lottery-options"]["fresh"], serde_json::json!([]));
}

#[tokio::test]
async fn unreadable_path_is_never_written_over() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    std::fs::create_dir(&path).unwrap();

    let mut state = open(&path, 1).await;
    assert!(!state.store().is_loaded());

    let err = group_service::add_group(&mut state, "fresh")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::PersistenceFailure { applied: false, .. }
    ));
    assert_eq!(state.selected(), None);
    assert!(path.is_dir());
}
