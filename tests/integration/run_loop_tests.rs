//! Run loop: tick phases, timers, inbox, stop/resume.

use std::time::Duration;

use crate::mock_hw::{Action, Call, Recorder, ScriptedButton, manual_model};
use statemodel::adapters::time::Clock;
use statemodel::drivers::timer::SoftwareTimer;
use statemodel::events::{EventInbox, INBOX_DEPTH, PostError};

#[test]
fn initial_entry_fires_once_before_first_do() {
    let (mut m, _) = manual_model(2, Recorder::new().stop_after(3));
    m.run().unwrap();

    let calls = &m.handler().calls;
    assert_eq!(calls[0], Call::Enter(0, None));
    assert_eq!(calls[1..], [Call::Do(0), Call::Do(0), Call::Do(0)]);
}

#[test]
fn dispatch_before_run_enters_initial_state_first() {
    let (mut m, _) = manual_model(2, Recorder::new().stop_after(1));
    m.add_custom_event("go").unwrap();
    m.add_transition(0, &["go"], 1).unwrap();

    assert_eq!(m.process_event("go").unwrap(), Some(1));
    m.run().unwrap();
    assert_eq!(
        m.handler().calls,
        vec![
            Call::Enter(0, None),
            Call::Exit(0, "go".to_owned()),
            Call::Enter(1, Some("go".to_owned())),
            Call::Do(1),
        ]
    );
}

#[test]
fn unmatched_dispatch_before_run_leaves_machine_unstarted() {
    let (mut m, _) = manual_model(2, Recorder::new().stop_after(1));
    m.add_custom_event("go").unwrap();

    assert_eq!(m.process_event("go").unwrap(), None);
    assert!(!m.machine().is_started());
    m.run().unwrap();
    assert_eq!(m.handler().calls, vec![Call::Enter(0, None), Call::Do(0)]);
}

#[test]
fn stop_before_armed_loop_starts_is_honoured() {
    let (mut m, _) = manual_model(1, Recorder::new());
    let handle = m.arm();
    std::thread::spawn(move || handle.stop()).join().unwrap();

    m.run_armed().unwrap();
    assert_eq!(m.machine().tick_count(), 0);
    assert!(!m.is_running());
}

#[test]
fn stop_then_run_resumes_in_place() {
    let (mut m, _) = manual_model(2, Recorder::new().stop_after(2));
    m.add_custom_event("go").unwrap();
    m.add_transition(0, &["go"], 1).unwrap();

    m.run().unwrap();
    m.process_event("go").unwrap();
    m.stop();
    m.stop();

    m.handler_mut().stop_after_do = Some(4);
    m.run().unwrap();
    assert_eq!(m.state(), 1);
    assert_eq!(m.handler().entries(), vec![0, 1], "no second initial entry");
    // stop() fires no exit action.
    assert!(!m.handler().calls.iter().any(|c| matches!(c, Call::Exit(1, _))));
}

#[test]
fn stop_handle_from_another_thread() {
    let (mut m, _) = manual_model(1, Recorder::new().stop_after(1));
    let handle = m.stop_handle();
    m.run().unwrap();
    std::thread::spawn(move || handle.stop()).join().unwrap();
    assert!(!m.is_running());
}

#[test]
fn button_edges_dispatch_press_then_release() {
    let (mut m, _) = manual_model(3, Recorder::new());
    let button = ScriptedButton::new();
    m.add_button("b", button.clone()).unwrap();
    m.add_transition(0, &["b_press"], 1).unwrap();
    m.add_transition(1, &["b_release"], 2).unwrap();

    button.click();
    m.tick().unwrap();
    assert_eq!(m.state(), 1);
    m.tick().unwrap();
    assert_eq!(m.state(), 2);
    // Do action runs for the state current once events are handled.
    assert_eq!(m.handler().calls.last(), Some(&Call::Do(2)));
}

#[test]
fn failed_poll_is_no_event_and_polling_continues() {
    let (mut m, _) = manual_model(2, Recorder::new());
    let button = ScriptedButton::new();
    m.add_button("b", button.clone()).unwrap();
    m.add_transition(0, &["b_press"], 1).unwrap();

    button.fail();
    button.press();
    m.tick().unwrap();
    assert_eq!(m.state(), 0);
    m.tick().unwrap();
    assert_eq!(m.state(), 1);
}

#[test]
fn timer_fires_once_per_start() {
    let (mut m, clock) = manual_model(2, Recorder::new());
    let t = m.add_timer("t", SoftwareTimer::new(clock.clone())).unwrap();
    m.add_transition(0, &["t_timeout"], 1).unwrap();
    m.add_transition(1, &["t_timeout"], 0).unwrap();

    m.start().unwrap();
    m.machine_mut().start_timer(t, Duration::from_millis(300));
    m.tick().unwrap();
    assert_eq!(m.state(), 0);

    clock.advance(300);
    m.tick().unwrap();
    assert_eq!(m.state(), 1);
    assert!(!m.machine().timer_armed(t));

    clock.advance(1_000);
    m.tick().unwrap();
    m.tick().unwrap();
    assert_eq!(m.state(), 1, "no second timeout without a restart");
}

#[test]
fn cancel_before_expiry_suppresses_timeout() {
    let (mut m, clock) = manual_model(2, Recorder::new());
    let t = m.add_timer("t", SoftwareTimer::new(clock.clone())).unwrap();
    m.add_transition(0, &["t_timeout"], 1).unwrap();

    m.machine_mut().start_timer(t, Duration::from_millis(100));
    clock.advance(50);
    m.machine_mut().cancel_timer(t);
    clock.advance(500);
    m.tick().unwrap();
    assert_eq!(m.state(), 0);
}

#[test]
fn timeout_callback_may_rearm_its_timer() {
    let (mut m, clock) = manual_model(2, Recorder::new());
    let t = m.add_timer("t", SoftwareTimer::new(clock.clone())).unwrap();
    m.add_transition(0, &["t_timeout"], 1).unwrap();
    m.add_transition(1, &["t_timeout"], 0).unwrap();
    m.handler_mut()
        .on_enter
        .insert(1, vec![Action::StartTimer(t, Duration::from_millis(100))]);

    m.machine_mut().start_timer(t, Duration::from_millis(100));
    clock.advance(100);
    m.tick().unwrap();
    assert_eq!(m.state(), 1);
    assert!(m.machine().timer_armed(t));

    clock.advance(100);
    m.tick().unwrap();
    assert_eq!(m.state(), 0);
}

#[test]
fn run_loop_timer_scenario_on_manual_clock() {
    // Entering 1 arms a 500ms timer; leaving 1 on its timeout stops the loop.
    let (mut m, clock) = manual_model(2, Recorder::new());
    let t = m.add_timer("t", SoftwareTimer::new(clock.clone())).unwrap();
    m.add_custom_event("go").unwrap();
    m.add_transition(0, &["go"], 1).unwrap();
    m.add_transition(1, &["t_timeout"], 0).unwrap();
    let rec = m.handler_mut();
    rec.on_enter
        .insert(1, vec![Action::StartTimer(t, Duration::from_millis(500))]);
    rec.on_exit.insert(1, vec![Action::Stop]);

    m.start().unwrap();
    assert_eq!(m.process_event("go").unwrap(), Some(1));
    m.run_every(Duration::from_millis(100)).unwrap();
    assert_eq!(m.state(), 0);
    // Armed at t=0, expires on the tick at t=500; no sleep after the stop.
    assert_eq!(clock.now_ms(), 500);
}

#[test]
fn inbox_events_dispatch_on_the_loop_thread() {
    static INBOX: EventInbox = EventInbox::new();

    let (mut m, _) = manual_model(3, Recorder::new());
    m.add_custom_event("remote").unwrap();
    m.add_custom_event("again").unwrap();
    m.add_transition(0, &["remote"], 1).unwrap();
    m.add_transition(1, &["again"], 2).unwrap();
    m.attach_inbox(&INBOX);

    std::thread::spawn(|| {
        INBOX.post("remote").unwrap();
        INBOX.post("again").unwrap();
    })
    .join()
    .unwrap();

    m.tick().unwrap();
    assert_eq!(m.state(), 2);
    assert!(INBOX.is_empty());
}

#[test]
fn inbox_is_bounded() {
    static INBOX: EventInbox = EventInbox::new();
    for _ in 0..INBOX_DEPTH {
        INBOX.post("x").unwrap();
    }
    assert_eq!(INBOX.post("x"), Err(PostError::Full));
    assert_eq!(INBOX.post("has space"), Err(PostError::InvalidName));

    let (mut m, _) = manual_model(1, Recorder::new());
    m.attach_inbox(&INBOX);
    m.tick().unwrap();
    assert!(INBOX.is_empty(), "one tick drains a full inbox");
}
