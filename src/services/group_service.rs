//! Group and option management on behalf of the user, including the selection rules.

use tracing::info;

use crate::{
    error::ServiceError,
    state::{AppEvent, AppState, groups::GroupCollection},
};

/// Create a group and select it.
///
/// The group is selected even when saving failed, as long as it exists in memory.
pub async fn add_group(state: &mut AppState, name: &str) -> Result<GroupCollection, ServiceError> {
    let result = state.store_mut().add_group(name).await;
    if applied(&result) {
        state.set_selected(Some(name.trim().to_owned()));
    }
    finish_mutation(state, result)
}

/// Delete a group, clearing the selection if it pointed at it.
pub async fn delete_group(
    state: &mut AppState,
    name: &str,
) -> Result<GroupCollection, ServiceError> {
    if state.is_locked(name) {
        return Err(ServiceError::GroupLocked(name.to_owned()));
    }

    let result = state.store_mut().delete_group(name).await;
    let selection_gone = state
        .selected()
        .is_some_and(|selected| !state.store().contains(selected));
    if selection_gone {
        state.set_selected(None);
    }
    finish_mutation(state, result)
}

/// Make `name` the current group.
pub fn select_group(state: &mut AppState, name: &str) -> Result<Vec<String>, ServiceError> {
    let options = state.store().options(name)?;
    state.set_selected(Some(name.to_owned()));
    info!(group = %name, options = options.len(), "group selected");
    Ok(options)
}

/// Options of the selected group.
pub fn selected_options(state: &AppState) -> Result<(String, Vec<String>), ServiceError> {
    let group = state.selected().ok_or(ServiceError::NoGroupSelected)?;
    let options = state.store().options(group)?;
    Ok((group.to_owned(), options))
}

/// Append an option to the selected group.
pub async fn add_option(state: &mut AppState, text: &str) -> Result<Vec<String>, ServiceError> {
    let group = locked_selection(state)?;
    let result = state.store_mut().add_option(&group, text).await;
    finish_mutation(state, result).map(|groups| options_of(&groups, &group))
}

/// Remove the option at `index` from the selected group.
pub async fn delete_option(state: &mut AppState, index: usize) -> Result<Vec<String>, ServiceError> {
    let group = locked_selection(state)?;
    let result = state.store_mut().delete_option(&group, index).await;
    finish_mutation(state, result).map(|groups| options_of(&groups, &group))
}

/// Save the latest collection again after a reported persistence failure.
pub async fn retry_sync(state: &mut AppState) -> Result<(), ServiceError> {
    let result = state.store_mut().sync().await;
    notify_groups_changed(state);
    result
}

/// Selected group, refusing when the running spin froze it.
fn locked_selection(state: &AppState) -> Result<String, ServiceError> {
    let group = state.selected().ok_or(ServiceError::NoGroupSelected)?;
    if state.is_locked(group) {
        return Err(ServiceError::GroupLocked(group.to_owned()));
    }
    Ok(group.to_owned())
}

fn options_of(groups: &GroupCollection, group: &str) -> Vec<String> {
    groups.options(group).map(<[String]>::to_vec).unwrap_or_default()
}

/// Broadcast the store state whenever memory changed, even if saving failed.
fn finish_mutation(
    state: &AppState,
    result: Result<GroupCollection, ServiceError>,
) -> Result<GroupCollection, ServiceError> {
    if applied(&result) {
        notify_groups_changed(state);
    }
    result
}

fn applied(result: &Result<GroupCollection, ServiceError>) -> bool {
    matches!(
        result,
        Ok(_) | Err(ServiceError::PersistenceFailure { applied: true, .. })
    )
}

fn notify_groups_changed(state: &AppState) {
    state.events().broadcast(AppEvent::GroupsChanged {
        revision: state.store().revision(),
        durable: state.store().is_durable(),
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::group_store::memory::MemoryGroupStore,
        engine::clock::ManualClock,
        presentation::console::ConsoleSurface,
        services::spin_service,
    };

    fn collection(entries: &[(&str, &[&str])]) -> GroupCollection {
        entries
            .iter()
            .map(|(name, options)| {
                (
                    name.to_string(),
                    options.iter().map(|o| o.to_string()).collect::<Vec<_>>(),
                )
            })
            .collect::<indexmap::IndexMap<_, _>>()
            .into()
    }

    async fn app(groups: GroupCollection) -> (AppState, MemoryGroupStore) {
        let backend = MemoryGroupStore::with_groups(groups);
        let state = AppState::bootstrap(
            &AppConfig::default(),
            Arc::new(backend.clone()),
            Arc::new(ConsoleSurface::new(Box::new(std::io::sink()))),
        )
        .await
        .configure_engine(|engine| {
            engine
                .with_rng(StdRng::seed_from_u64(3))
                .with_clock(Arc::new(ManualClock::new()))
        });
        (state, backend)
    }

    #[tokio::test]
    async fn adding_a_group_selects_it() {
        let (mut state, backend) = app(GroupCollection::new()).await;
        let mut events = state.events().subscribe();

        add_group(&mut state, "  Fruits ").await.unwrap();

        assert_eq!(state.selected(), Some("Fruits"));
        assert_eq!(
            events.recv().await.unwrap(),
            AppEvent::SelectionChanged {
                group: Some("Fruits".into())
            }
        );
        assert!(matches!(
            events.recv().await.unwrap(),
            AppEvent::GroupsChanged { durable: true, .. }
        ));
        assert!(backend.stored().await.contains("Fruits"));
    }

    #[tokio::test]
    async fn duplicate_group_keeps_selection_and_collection() {
        let (mut state, _backend) = app(collection(&[("a", &[]), ("b", &[])])).await;
        select_group(&mut state, "b").unwrap();

        let err = add_group(&mut state, "a").await.unwrap_err();

        assert!(matches!(err, ServiceError::DuplicateGroup(_)));
        assert_eq!(state.selected(), Some("b"));
        assert_eq!(state.store().group_names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn deleting_selected_group_clears_selection() {
        let (mut state, _backend) = app(collection(&[("fruits", &["apple"])])).await;
        select_group(&mut state, "fruits").unwrap();

        delete_group(&mut state, "fruits").await.unwrap();

        assert_eq!(state.selected(), None);
        assert!(matches!(
            add_option(&mut state, "pear").await,
            Err(ServiceError::NoGroupSelected)
        ));
        assert!(matches!(
            spin_service::start_spin(&mut state).await,
            Err(ServiceError::NoGroupSelected)
        ));
    }

    #[tokio::test]
    async fn deleting_another_group_keeps_selection() {
        let (mut state, _backend) = app(collection(&[("a", &[]), ("b", &[])])).await;
        select_group(&mut state, "a").unwrap();

        delete_group(&mut state, "b").await.unwrap();

        assert_eq!(state.selected(), Some("a"));
    }

    #[tokio::test]
    async fn options_are_edited_on_the_selected_group() {
        let (mut state, backend) =
            app(collection(&[("fruits", &["apple", "banana", "cherry"])])).await;
        select_group(&mut state, "fruits").unwrap();

        assert_eq!(
            delete_option(&mut state, 1).await.unwrap(),
            vec!["apple", "cherry"]
        );
        assert_eq!(
            add_option(&mut state, "date").await.unwrap(),
            vec!["apple", "cherry", "date"]
        );
        assert_eq!(
            backend.stored().await.options("fruits").unwrap().to_vec(),
            ["apple", "cherry", "date"]
        );
    }

    #[tokio::test]
    async fn spun_group_is_locked_until_the_spin_ends() {
        let (mut state, _backend) = app(collection(&[("g", &["x", "y"]), ("h", &[])])).await;
        select_group(&mut state, "g").unwrap();
        let handle = spin_service::start_spin(&mut state).await.unwrap();

        assert!(matches!(
            add_option(&mut state, "z").await,
            Err(ServiceError::GroupLocked(group)) if group == "g"
        ));
        assert!(matches!(
            delete_group(&mut state, "g").await,
            Err(ServiceError::GroupLocked(_))
        ));
        add_group(&mut state, "other").await.unwrap();
        assert_eq!(handle.group(), "g");

        spin_service::stop_spin(&mut state).await.unwrap();
        select_group(&mut state, "g").unwrap();
        add_option(&mut state, "z").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn persistence_failure_is_reported_and_retry_recovers() {
        let (mut state, backend) = app(GroupCollection::new()).await;
        backend.fail_next_saves(3);

        let err = add_group(&mut state, "a").await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(state.selected(), Some("a"));
        assert!(!state.store().is_durable());
        assert!(!backend.stored().await.contains("a"));

        retry_sync(&mut state).await.unwrap();

        assert!(state.store().is_durable());
        assert!(backend.stored().await.contains("a"));
    }
}
