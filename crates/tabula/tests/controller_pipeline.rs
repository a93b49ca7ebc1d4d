//! Integration tests for the state → entries → transition → live list pipeline.

use std::sync::Arc;

use parking_lot::Mutex;
use tabula::prelude::*;
use tabula::{InputMode, RowKind};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Profile {
    fields: Vec<(String, String)>,
    /// Not projected; changing it alone produces no rows.
    revision: u32,
}

impl Profile {
    fn with_fields(fields: &[(&str, &str)]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(name, text)| (name.to_string(), text.to_string()))
                .collect(),
            revision: 0,
        }
    }
}

fn project(profile: &Profile, _arguments: &FormArguments) -> Vec<FormEntry> {
    profile
        .fields
        .iter()
        .enumerate()
        .map(|(index, (name, text))| FormEntry::Input {
            section: 0,
            index: index as i32,
            identifier: Identifier::new(name.as_str()),
            value: Value::text(text.as_str()),
            error: None,
            mode: InputMode::Plain,
            placeholder: name.clone(),
            limit: 8,
        })
        .collect()
}

fn build(
    profile: Profile,
    arguments: FormArguments,
    main_queue: &MainQueue,
) -> ListController<Profile, FormEntry> {
    ListController::builder(profile, arguments, project)
        .main_queue(main_queue.clone())
        .build()
        .unwrap()
}

/// One 30pt description row per line.
fn lines(count: &usize, _arguments: &FormArguments) -> Vec<FormEntry> {
    (0..*count)
        .map(|index| FormEntry::Desc {
            section: 0,
            index: index as i32,
            text: format!("line {index}"),
        })
        .collect()
}

fn texts<S>(controller: &ListController<S, FormEntry>) -> Vec<String> {
    controller
        .list()
        .lock()
        .iter()
        .map(|row| match &row.kind {
            RowKind::Text(text) => text.clone(),
            other => panic!("unexpected row {other:?}"),
        })
        .collect()
}

fn values(controller: &ListController<Profile, FormEntry>) -> Vec<String> {
    controller
        .list()
        .lock()
        .iter()
        .map(|row| row.value.as_text().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn test_initial_load_applies_on_drain_and_fires_ready_once() {
    init_tracing();
    let main_queue = MainQueue::new();
    let controller = build(
        Profile::with_fields(&[("name", "Ada"), ("email", "ada@example.com")]),
        FormArguments::noop(),
        &main_queue,
    );

    let ready_count = Arc::new(Mutex::new(0));
    let ready_clone = ready_count.clone();
    controller.ready().connect(move |_| {
        *ready_clone.lock() += 1;
    });

    assert!(controller.list().lock().is_empty());
    assert!(!controller.is_ready());

    main_queue.drain();
    assert!(controller.is_ready());
    assert_eq!(values(&controller), vec!["Ada", "ada@example.com"]);

    controller.update_state(|mut profile| {
        profile.fields.push(("phone".into(), "555".into()));
        profile
    });
    main_queue.drain();

    assert_eq!(values(&controller), vec!["Ada", "ada@example.com", "555"]);
    assert_eq!(*ready_count.lock(), 1);
}

#[test]
fn test_updates_keep_identity_and_replace_payload() {
    init_tracing();
    let main_queue = MainQueue::new();
    let controller = build(
        Profile::with_fields(&[("name", "Ada"), ("email", "ada@example.com")]),
        FormArguments::noop(),
        &main_queue,
    );
    main_queue.drain();

    let removed = Arc::new(Mutex::new(Vec::new()));
    let updated = Arc::new(Mutex::new(Vec::new()));
    {
        let list = controller.list();
        let list = list.lock();
        let removed_clone = removed.clone();
        list.signals().rows_removed.connect(move |index| removed_clone.lock().push(*index));
        let updated_clone = updated.clone();
        list.signals().row_updated.connect(move |index| updated_clone.lock().push(*index));
    }

    controller.update_state(|mut profile| {
        profile.fields[1].1 = "ada@lovelace.org".into();
        profile
    });
    main_queue.drain();

    assert!(removed.lock().is_empty());
    assert_eq!(*updated.lock(), vec![1]);
    assert_eq!(values(&controller), vec!["Ada", "ada@lovelace.org"]);
}

#[test]
fn test_unprojected_change_posts_nothing() {
    init_tracing();
    let main_queue = MainQueue::new();
    let controller = build(
        Profile::with_fields(&[("name", "Ada")]),
        FormArguments::noop(),
        &main_queue,
    );
    main_queue.drain();

    let applied = Arc::new(Mutex::new(Vec::new()));
    let applied_clone = applied.clone();
    controller.transition_applied().connect(move |id| applied_clone.lock().push(*id));

    controller.update_state(|mut profile| {
        profile.revision += 1;
        profile
    });
    // Equal state is deduplicated before projection.
    controller.update_state(|profile| profile);

    assert_eq!(main_queue.pending_count(), 0);
    assert!(applied.lock().is_empty());
}

#[test]
fn test_first_fast_splits_initial_load() {
    init_tracing();
    let main_queue = MainQueue::new();
    let config = ListConfig::builder().viewport(320.0, 100.0).build().unwrap();
    let controller = ListController::builder(10usize, FormArguments::noop(), lines)
        .config(config)
        .main_queue(main_queue.clone())
        .build()
        .unwrap();

    let lengths = Arc::new(Mutex::new(Vec::new()));
    let list = controller.list();
    let lengths_clone = lengths.clone();
    controller.transition_applied().connect(move |_| {
        lengths_clone.lock().push(list.lock().len());
    });

    let ready_at = Arc::new(Mutex::new(None));
    let list = controller.list();
    let ready_clone = ready_at.clone();
    controller.ready().connect(move |_| {
        *ready_clone.lock() = Some(list.lock().len());
    });

    assert_eq!(main_queue.pending_count(), 2);
    main_queue.drain();

    // 30pt rows: the fourth one crosses the 100pt viewport.
    assert_eq!(*lengths.lock(), vec![4, 10]);
    assert_eq!(*ready_at.lock(), Some(4));
}

#[test]
fn test_first_fast_disabled_loads_in_one_transition() {
    init_tracing();
    let main_queue = MainQueue::new();
    let config = ListConfig::from_toml_str(
        r#"
        make_first_fast = false

        [viewport]
        width = 320.0
        height = 100.0
        "#,
    )
    .unwrap();
    let controller = ListController::builder(
        Profile::with_fields(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]),
        FormArguments::noop(),
        project,
    )
    .config(config)
    .main_queue(main_queue.clone())
    .build()
    .unwrap();

    assert_eq!(main_queue.pending_count(), 1);
    main_queue.drain();
    assert_eq!(controller.list().lock().len(), 4);
}

/// Keeps the prepare queue behind a gate until the first generation and an
/// update are both queued.
fn update_while_first_fast_tail_pending(prepare_off_main: bool) {
    init_tracing();
    let main_queue = MainQueue::new();
    let prepare_queue = Arc::new(SerialQueue::new());
    let (release, gate) = crossbeam_channel::bounded::<()>(0);
    prepare_queue
        .send(move || {
            let _ = gate.recv();
        })
        .unwrap();

    let config = ListConfig::builder()
        .viewport(320.0, 100.0)
        .prepare_off_main(prepare_off_main)
        .build()
        .unwrap();
    let controller = ListController::builder(10usize, FormArguments::noop(), lines)
        .config(config)
        .main_queue(main_queue.clone())
        .prepare_queue(prepare_queue.clone())
        .build()
        .unwrap();

    let lengths = Arc::new(Mutex::new(Vec::new()));
    let list = controller.list();
    let lengths_clone = lengths.clone();
    controller.transition_applied().connect(move |_| {
        lengths_clone.lock().push(list.lock().len());
    });

    controller.update_state(|_| 11);
    release.send(()).unwrap();
    prepare_queue.send_sync(|| ()).unwrap();
    main_queue.drain();

    assert_eq!(*lengths.lock(), vec![4, 10, 11]);
    let expected: Vec<String> = (0..11).map(|index| format!("line {index}")).collect();
    assert_eq!(texts(&controller), expected);

    prepare_queue.stop_and_join();
}

#[test]
fn test_update_lands_after_first_fast_tail_prepared_off_main() {
    update_while_first_fast_tail_pending(true);
}

#[test]
fn test_update_lands_after_first_fast_tail_prepared_inline() {
    update_while_first_fast_tail_pending(false);
}

#[test]
fn test_state_rewritten_by_earlier_subscriber_reaches_list() {
    init_tracing();
    let main_queue = MainQueue::new();
    let state = Arc::new(StateContainer::new(1usize));

    // Rounds odd counts up before the controller hears about them.
    let weak = Arc::downgrade(&state);
    state.subscribe(move |count: &usize| {
        if count % 2 == 1
            && let Some(state) = weak.upgrade()
        {
            state.modify(|count| count + 1);
        }
    });

    let config = ListConfig::builder().make_first_fast(false).build().unwrap();
    let controller = ListController::builder_with_state(state.clone(), FormArguments::noop(), lines)
        .config(config)
        .main_queue(main_queue.clone())
        .build()
        .unwrap();
    main_queue.drain();
    assert_eq!(controller.list().lock().len(), 1);

    controller.update_state(|_| 3);
    main_queue.drain();

    assert_eq!(controller.current_state(), 4);
    assert_eq!(controller.list().lock().len(), 4);
}

#[test]
fn test_prepare_queue_preserves_publication_order() {
    init_tracing();
    let main_queue = MainQueue::new();
    let prepare_queue = Arc::new(SerialQueue::new());
    let controller = ListController::builder(
        Vec::<u32>::new(),
        FormArguments::noop(),
        |numbers: &Vec<u32>, _: &FormArguments| {
            numbers
                .iter()
                .map(|n| FormEntry::Desc {
                    section: 0,
                    index: *n as i32,
                    text: n.to_string(),
                })
                .collect()
        },
    )
    .main_queue(main_queue.clone())
    .prepare_queue(prepare_queue.clone())
    .build()
    .unwrap();

    for n in 0..25u32 {
        controller.update_state(|mut numbers| {
            numbers.push(n);
            numbers
        });
    }
    for n in (0..25u32).step_by(2) {
        controller.update_state(|numbers| numbers.into_iter().filter(|m| *m != n).collect());
    }

    prepare_queue.send_sync(|| ()).unwrap();
    main_queue.drain();

    let expected: Vec<String> = (1..25u32).step_by(2).map(|n| n.to_string()).collect();
    assert_eq!(texts(&controller), expected);

    prepare_queue.stop_and_join();
}

#[test]
fn test_prepare_off_main_defers_first_generation() {
    init_tracing();
    let main_queue = MainQueue::new();
    let prepare_queue = Arc::new(SerialQueue::new());
    let config = ListConfig::builder().prepare_off_main(true).build().unwrap();
    let controller = ListController::builder(
        Profile::with_fields(&[("name", "Ada")]),
        FormArguments::noop(),
        project,
    )
    .config(config)
    .main_queue(main_queue.clone())
    .prepare_queue(prepare_queue.clone())
    .build()
    .unwrap();

    prepare_queue.send_sync(|| ()).unwrap();
    assert_eq!(main_queue.pending_count(), 1);

    main_queue.drain();
    assert!(controller.is_ready());
    assert_eq!(values(&controller), vec!["Ada"]);

    prepare_queue.stop_and_join();
}

#[test]
fn test_dispose_drops_pending_and_future_transitions() {
    init_tracing();
    let main_queue = MainQueue::new();
    let controller = build(
        Profile::with_fields(&[("name", "Ada")]),
        FormArguments::noop(),
        &main_queue,
    );

    controller.dispose();
    assert!(controller.is_disposed());
    main_queue.drain();
    assert!(controller.list().lock().is_empty());
    assert!(!controller.is_ready());

    controller.update_state(|mut profile| {
        profile.fields.clear();
        profile
    });
    assert_eq!(main_queue.pending_count(), 0);
    assert_eq!(controller.state().subscriber_count(), 0);
}

#[test]
fn test_dropping_controller_cancels_posted_work() {
    init_tracing();
    let main_queue = MainQueue::new();
    let state = Arc::new(StateContainer::new(Profile::with_fields(&[("name", "Ada")])));

    let controller = ListController::builder_with_state(state.clone(), FormArguments::noop(), project)
        .main_queue(main_queue.clone())
        .build()
        .unwrap();
    assert_eq!(state.subscriber_count(), 1);

    drop(controller);
    assert_eq!(state.subscriber_count(), 0);
    assert_eq!(main_queue.drain(), 1);
}

#[test]
fn test_row_edits_flow_back_into_state() {
    init_tracing();
    let main_queue = MainQueue::new();
    let (sink, actions) = ActionSink::channel();
    let controller = build(
        Profile::with_fields(&[("name", "Ada"), ("city", "London")]),
        FormArguments::from_sink(sink),
        &main_queue,
    );
    main_queue.drain();

    controller.list().lock().get(1).unwrap().edit("Paris");
    assert_eq!(actions.len(), 2);

    actions.drain(|action| {
        if let FormAction::Select(identifier, value) = action {
            controller.update_state(|mut profile| {
                for (name, text) in &mut profile.fields {
                    if name.as_str() == identifier.as_str() {
                        *text = value.as_text().unwrap_or_default().to_string();
                    }
                }
                profile
            });
        }
    });
    main_queue.drain();

    let data = controller.fetch_data();
    assert_eq!(data[&Identifier::new("city")], Value::text("Paris"));
    assert_eq!(data[&Identifier::new("name")], Value::text("Ada"));
}

#[test]
fn test_validate_input_reports_overflowing_fields() {
    init_tracing();
    let main_queue = MainQueue::new();
    let controller = build(
        Profile::with_fields(&[("name", "Ada"), ("bio", "far too long"), ("city", "Birmingham")]),
        FormArguments::noop(),
        &main_queue,
    );
    main_queue.drain();

    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    controller.validation_events().connect(move |event| events_clone.lock().push(event.clone()));

    assert!(!controller.validate_input());
    assert_eq!(
        *events.lock(),
        vec![
            ValidationEvent::Shake {
                identifier: "bio".into(),
                data: None
            },
            ValidationEvent::InputLimitReached {
                identifier: "bio".into(),
                overflow: 4
            },
            ValidationEvent::Shake {
                identifier: "city".into(),
                data: None
            },
            ValidationEvent::InputLimitReached {
                identifier: "city".into(),
                overflow: 2
            },
            ValidationEvent::ScrollTo("bio".into()),
        ]
    );

    events.lock().clear();
    controller.update_state(|_| Profile::with_fields(&[("name", "Ada")]));
    main_queue.drain();
    assert!(controller.validate_input());
    assert!(events.lock().is_empty());
}

#[test]
fn test_deferred_validation_reports_on_main_queue() {
    init_tracing();
    let main_queue = MainQueue::new();
    let controller = build(Profile::default(), FormArguments::noop(), &main_queue);
    main_queue.drain();

    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    controller.validation_events().connect(move |event| events_clone.lock().push(event.clone()));

    let worker = Arc::new(Mutex::new(None));
    let worker_clone = worker.clone();
    controller.validate(Validation::deferred(move |next| {
        *worker_clone.lock() = Some(std::thread::spawn(move || {
            next(Validation::alert("Code expired"));
        }));
    }));

    worker.lock().take().unwrap().join().unwrap();
    assert!(events.lock().is_empty());

    main_queue.drain();
    assert_eq!(*events.lock(), vec![ValidationEvent::Alert("Code expired".into())]);

    controller.validate(Validation::Success(Behaviour::NavigateBack));
    assert_eq!(
        events.lock().last(),
        Some(&ValidationEvent::NavigateBack { with_push: false })
    );
}

#[test]
fn test_form_hooks_follow_row_actions() {
    init_tracing();
    let main_queue = MainQueue::new();
    let loaded = Arc::new(Mutex::new(Vec::new()));
    let validated = Arc::new(Mutex::new(Vec::new()));
    let updated = Arc::new(Mutex::new(Vec::new()));

    let loaded_clone = loaded.clone();
    let validated_clone = validated.clone();
    let updated_clone = updated.clone();
    let controller = ListController::builder(
        Profile::with_fields(&[("name", "Ada"), ("bio", "far too long")]),
        FormArguments::noop(),
        project,
    )
    .main_queue(main_queue.clone())
    .did_load(move |data: &FormData| loaded_clone.lock().push(data.len()))
    .validate_data(move |data: &FormData| {
        validated_clone.lock().push(data.clone());
        Validation::Success(Behaviour::NavigateBack)
    })
    .update_data(move |data: &FormData| {
        updated_clone.lock().push(data.len());
        Validation::alert("saved")
    })
    .build()
    .unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    controller.validation_events().connect(move |event| events_clone.lock().push(event.clone()));

    main_queue.drain();
    assert_eq!(*loaded.lock(), vec![2]);

    // The bio is over its limit, so the data never reaches the hook.
    assert!(!controller.validate_input());
    assert!(validated.lock().is_empty());

    controller.handle_action(FormAction::Select("name".into(), Value::text("Grace")));
    controller.handle_action(FormAction::Select("name".into(), Value::text("Augusta Ada")));
    controller.handle_action(FormAction::DataUpdated);

    assert_eq!(
        *validated.lock(),
        vec![FormData::from([(Identifier::new("name"), Value::text("Grace"))])]
    );
    assert_eq!(*updated.lock(), vec![2]);
    assert_eq!(*loaded.lock(), vec![2]);
    assert_eq!(
        *events.lock(),
        vec![
            ValidationEvent::Shake {
                identifier: "bio".into(),
                data: None
            },
            ValidationEvent::InputLimitReached {
                identifier: "bio".into(),
                overflow: 4
            },
            ValidationEvent::ScrollTo("bio".into()),
            ValidationEvent::NavigateBack { with_push: false },
            ValidationEvent::Shake {
                identifier: "name".into(),
                data: None
            },
            ValidationEvent::InputLimitReached {
                identifier: "name".into(),
                overflow: 3
            },
            ValidationEvent::ScrollTo("name".into()),
            ValidationEvent::Alert("saved".into()),
        ]
    );
}
