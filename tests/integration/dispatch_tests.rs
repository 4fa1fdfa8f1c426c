//! Dispatch engine: table lookup, callback pairing, re-entrancy, faults.

use crate::mock_hw::{Action, Call, Recorder, ScriptedButton, manual_model, manual_model_with};
use statemodel::config::ModelConfig;
use statemodel::error::{ConfigError, Error};

fn s(text: &str) -> String {
    text.to_owned()
}

// ── Table lookups ─────────────────────────────────────────────

#[test]
fn unmatched_event_fires_no_callbacks() {
    let (mut m, _) = manual_model(3, Recorder::new());
    m.add_custom_event("go").unwrap();
    m.add_custom_event("other").unwrap();
    m.add_transition(1, &["go"], 2).unwrap();

    assert_eq!(m.process_event("go").unwrap(), None);
    assert_eq!(m.process_event("other").unwrap(), None);
    assert_eq!(m.state(), 0);
    assert!(m.handler().calls.is_empty());
}

#[test]
fn unknown_event_is_ignored() {
    let (mut m, _) = manual_model(2, Recorder::new());
    m.add_custom_event("go").unwrap();
    m.add_transition(0, &["go"], 1).unwrap();

    assert_eq!(m.process_event("unknown_event").unwrap(), None);
    assert_eq!(m.process_event("").unwrap(), None);
    assert_eq!(m.state(), 0);
    assert!(m.handler().calls.is_empty());
    assert_eq!(m.machine().dispatch_count(), 0);
}

#[test]
fn either_event_of_a_group_leads_to_dest() {
    for event in ["a", "b"] {
        let (mut m, _) = manual_model(2, Recorder::new());
        m.add_custom_event("a").unwrap();
        m.add_custom_event("b").unwrap();
        m.add_transition(0, &["a", "b"], 1).unwrap();

        assert_eq!(m.process_event(event).unwrap(), Some(1));
        assert_eq!(
            m.handler().calls,
            vec![
                Call::Enter(0, None),
                Call::Exit(0, s(event)),
                Call::Enter(1, Some(s(event)))
            ]
        );
    }
}

#[test]
fn self_transition_exits_and_reenters() {
    let (mut m, _) = manual_model(1, Recorder::new());
    m.add_custom_event("again").unwrap();
    m.add_transition(0, &["again"], 0).unwrap();

    assert_eq!(m.process_event("again").unwrap(), Some(0));
    assert_eq!(
        m.handler().calls,
        vec![
            Call::Enter(0, None),
            Call::Exit(0, s("again")),
            Call::Enter(0, Some(s("again")))
        ]
    );
}

#[test]
fn button_events_are_derived_from_name() {
    let (mut m, _) = manual_model(2, Recorder::new());
    m.add_button("door", ScriptedButton::new()).unwrap();
    m.add_transition(0, &["door_press"], 1).unwrap();
    m.add_transition(1, &["door_release"], 0).unwrap();

    assert_eq!(m.process_event("door_press").unwrap(), Some(1));
    assert_eq!(m.process_event("door_release").unwrap(), Some(0));
}

// ── Registration errors ───────────────────────────────────────

#[test]
fn duplicate_sources_rejected_before_run() {
    let (mut m, clock) = manual_model(2, Recorder::new());
    m.add_button("t", ScriptedButton::new()).unwrap();
    m.add_custom_event("x_timeout").unwrap();

    assert!(matches!(
        m.add_custom_event("t_press"),
        Err(ConfigError::DuplicateEvent(_))
    ));
    let timer = statemodel::drivers::timer::SoftwareTimer::new(clock);
    assert!(matches!(
        m.add_timer("x", timer),
        Err(ConfigError::DuplicateEvent(_))
    ));
}

#[test]
fn conflicting_transition_leaves_table_unchanged() {
    let (mut m, _) = manual_model(3, Recorder::new());
    m.add_custom_event("a").unwrap();
    m.add_custom_event("b").unwrap();
    m.add_transition(0, &["a"], 1).unwrap();

    let err = m.add_transition(0, &["b", "a"], 2).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::ConflictingTransition {
            state: 0,
            existing: 1,
            requested: 2,
            ..
        }
    ));
    // "b" was not registered by the rejected call.
    assert_eq!(m.process_event("b").unwrap(), None);
    assert_eq!(m.process_event("a").unwrap(), Some(1));
}

#[test]
fn transition_validation() {
    let (mut m, _) = manual_model(2, Recorder::new());
    m.add_custom_event("go").unwrap();

    assert!(matches!(
        m.add_transition(0, &["go"], 2),
        Err(ConfigError::InvalidState {
            state: 2,
            state_count: 2
        })
    ));
    assert!(matches!(
        m.add_transition(5, &["go"], 0),
        Err(ConfigError::InvalidState { state: 5, .. })
    ));
    assert!(matches!(
        m.add_transition(0, &[], 1),
        Err(ConfigError::EmptyEventList { state: 0 })
    ));
    assert!(matches!(
        m.add_transition(0, &["nope"], 1),
        Err(ConfigError::UnknownEvent(_))
    ));
}

// ── Re-entrancy ───────────────────────────────────────────────

#[test]
fn nested_dispatch_sees_updated_state() {
    // Entering 1 raises "next", which the table maps 1 -> 2.
    let handler = Recorder::new().enter(1, Action::Raise("next"));
    let (mut m, _) = manual_model(3, handler);
    m.add_custom_event("go").unwrap();
    m.add_custom_event("next").unwrap();
    m.add_transition(0, &["go"], 1).unwrap();
    m.add_transition(1, &["next"], 2).unwrap();

    assert_eq!(m.process_event("go").unwrap(), Some(2));
    assert_eq!(
        m.handler().calls,
        vec![
            Call::Enter(0, None),
            Call::Exit(0, s("go")),
            Call::Enter(1, Some(s("go"))),
            Call::Exit(1, s("next")),
            Call::Enter(2, Some(s("next"))),
        ]
    );
    let hist: Vec<_> = m.machine().history().map(|r| (r.from, r.to)).collect();
    assert_eq!(hist, vec![(0, 1), (1, 2)]);
}

#[test]
fn forced_transition_uses_label() {
    let handler = Recorder::new().enter(1, Action::Force(0, "bounce"));
    let (mut m, _) = manual_model(2, handler);
    m.add_custom_event("go").unwrap();
    m.add_transition(0, &["go"], 1).unwrap();

    assert_eq!(m.process_event("go").unwrap(), Some(0));
    let last = m.machine().history().last().unwrap().clone();
    assert!(last.forced);
    assert_eq!(last.event.as_str(), "bounce");
    assert_eq!(
        m.handler().transitions()[3..],
        [Call::Exit(1, s("bounce")), Call::Enter(0, Some(s("bounce")))]
    );
}

#[test]
fn dispatch_from_exit_action_runs_after_entry() {
    // Leaving 0 raises "side": 0 -> 2 if seen too early, 1 -> 2 once entered.
    let handler = Recorder::new().exit(0, Action::Raise("side"));
    let (mut m, _) = manual_model(3, handler);
    m.add_custom_event("go").unwrap();
    m.add_custom_event("side").unwrap();
    m.add_transition(0, &["go"], 1).unwrap();
    m.add_transition(0, &["side"], 2).unwrap();
    m.add_transition(1, &["side"], 2).unwrap();

    assert_eq!(m.process_event("go").unwrap(), Some(2));
    assert_eq!(
        m.handler().calls,
        vec![
            Call::Enter(0, None),
            Call::Exit(0, s("go")),
            Call::Enter(1, Some(s("go"))),
            Call::Exit(1, s("side")),
            Call::Enter(2, Some(s("side"))),
        ]
    );
    assert!(m.machine().fault().is_none());
}

#[test]
fn exit_action_event_ignored_by_new_state_is_dropped() {
    let handler = Recorder::new().exit(0, Action::Raise("side"));
    let (mut m, _) = manual_model(3, handler);
    m.add_custom_event("go").unwrap();
    m.add_custom_event("side").unwrap();
    m.add_transition(0, &["go"], 1).unwrap();
    m.add_transition(0, &["side"], 2).unwrap();

    assert_eq!(m.process_event("go").unwrap(), Some(1));
    assert_eq!(m.handler().entries(), vec![0, 1]);
    m.tick().unwrap();
    assert_eq!(m.handler().calls.last(), Some(&Call::Do(1)));
}

#[test]
fn forced_move_from_exit_action_follows_entry() {
    let handler = Recorder::new().exit(1, Action::Force(0, "reset"));
    let (mut m, _) = manual_model(3, handler);
    m.add_custom_event("go").unwrap();
    m.add_transition(1, &["go"], 2).unwrap();
    m.force_transition(1, "jump").unwrap();

    assert_eq!(m.process_event("go").unwrap(), Some(0));
    assert_eq!(
        m.handler().transitions()[3..],
        [
            Call::Exit(1, s("go")),
            Call::Enter(2, Some(s("go"))),
            Call::Exit(2, s("reset")),
            Call::Enter(0, Some(s("reset"))),
        ]
    );
}

#[test]
fn exit_actions_raising_forever_still_latch() {
    let handler = Recorder::new()
        .exit(0, Action::Raise("flip"))
        .exit(1, Action::Raise("flip"));
    let config = ModelConfig {
        max_dispatch_depth: 4,
        ..ModelConfig::default()
    };
    let (mut m, _) = manual_model_with(2, handler, config);
    m.add_custom_event("flip").unwrap();
    m.add_transition(0, &["flip"], 1).unwrap();
    m.add_transition(1, &["flip"], 0).unwrap();

    assert!(matches!(
        m.process_event("flip"),
        Err(Error::ReentrancyDepth { depth: 4, .. })
    ));
    // Every exit was followed by exactly one entry.
    let calls = m.handler().transitions();
    for pair in calls[1..].chunks(2) {
        assert!(matches!(pair, [Call::Exit(..), Call::Enter(..)]), "{pair:?}");
    }
}

#[test]
fn force_to_invalid_state_is_config_error() {
    let (mut m, _) = manual_model(2, Recorder::new());
    assert!(matches!(
        m.force_transition(9, "warp"),
        Err(Error::Config(ConfigError::InvalidState { state: 9, .. }))
    ));
    assert_eq!(m.state(), 0);
    assert!(m.machine().fault().is_none());
}

#[test]
fn runaway_reentry_latches_fault() {
    // 0 <-> 1 forever via entry actions.
    let handler = Recorder::new()
        .enter(0, Action::Force(1, "ping"))
        .enter(1, Action::Force(0, "pong"));
    let config = ModelConfig {
        max_dispatch_depth: 4,
        ..ModelConfig::default()
    };
    let (mut m, _) = manual_model_with(2, handler, config);

    let err = m.force_transition(1, "kick").unwrap_err();
    assert!(matches!(err, Error::ReentrancyDepth { depth: 4, .. }));
    assert!(m.machine().fault().is_some());

    // Latched: every later dispatch reports the same fault.
    assert_eq!(m.process_event("anything"), Err(err.clone()));
    assert_eq!(m.tick(), Err(err));
    assert!(!m.is_running());
}

#[test]
fn dispatch_count_tracks_completed_transitions() {
    let (mut m, _) = manual_model(2, Recorder::new());
    m.add_custom_event("flip").unwrap();
    m.add_transition(0, &["flip"], 1).unwrap();
    m.add_transition(1, &["flip"], 0).unwrap();

    for _ in 0..5 {
        m.process_event("flip").unwrap();
    }
    assert_eq!(m.machine().dispatch_count(), 5);
    assert_eq!(m.state(), 1);
}
