//! Live preview: parameter edits dispatch forward calculations.

use crate::test_helpers::synthetic_spectrum;
use approx::assert_relative_eq;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use xrffit_rs::config::{BackgroundMethod, XrfConfig};
use xrffit_rs::fit::FitSolver;
use xrffit_rs::lines::LineTable;
use xrffit_rs::preview::{PreviewSession, PreviewUpdate};

fn session() -> (PreviewSession, FitSolver) {
    let solver =
        FitSolver::new(XrfConfig::new().with_background(BackgroundMethod::Linear)).unwrap();
    let spectrum = synthetic_spectrum(20.0, &[("Fe_K", 3000.0), ("Cu_K", 1500.0)]);
    let groups = LineTable::global().resolve(&["Fe_K", "Cu_K"]).unwrap();
    let session = PreviewSession::new(solver.clone(), &spectrum, groups).unwrap();
    (session, solver)
}

#[test]
fn test_edit_dispatches_forward_model() {
    let (mut session, solver) = session();
    let updates: Arc<Mutex<Vec<PreviewUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);
    session.subscribe(move |update| sink.lock().unwrap().push(update.clone()));

    let returned = session.set_value("Cu_K_area", 777.0).unwrap();

    let spectrum = synthetic_spectrum(20.0, &[("Fe_K", 3000.0), ("Cu_K", 1500.0)]);
    let groups = LineTable::global().resolve(&["Fe_K", "Cu_K"]).unwrap();
    let expected = solver
        .forward(&spectrum, &groups, session.parameters())
        .unwrap();

    let updates = updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].changed, vec!["Cu_K_area".to_string()]);
    assert_eq!(updates[0].model, expected);
    assert_eq!(returned, expected);
    assert_eq!(session.model().unwrap(), expected);
}

#[test]
fn test_every_listener_is_notified() {
    let (mut session, _) = session();
    let counts = Arc::new(Mutex::new([0usize; 2]));
    for slot in 0..2 {
        let counts = Arc::clone(&counts);
        session.subscribe(move |_| counts.lock().unwrap()[slot] += 1);
    }
    session.set_value("Fe_K_area", 100.0).unwrap();
    session.set_value("Fe_K_area", 200.0).unwrap();
    assert_eq!(*counts.lock().unwrap(), [2, 2]);
}

#[test]
fn test_background_fit_then_apply() {
    let (mut session, _) = session();
    session.set_value("Fe_K_area", 10.0).unwrap();
    session.set_value("Cu_K_area", 10.0).unwrap();

    let handle = session.start_fit();
    let deadline = Instant::now() + Duration::from_secs(60);
    let result = loop {
        if let Some(result) = handle.try_result() {
            break result.unwrap();
        }
        assert!(Instant::now() < deadline, "background fit did not finish");
        std::thread::sleep(Duration::from_millis(5));
    };

    let changed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changed);
    session.subscribe(move |update| sink.lock().unwrap().extend(update.changed.clone()));
    session.apply(&result).unwrap();

    assert_relative_eq!(
        session.parameters().value("Fe_K_area").unwrap(),
        3000.0,
        max_relative = 1e-3
    );
    assert!(changed.lock().unwrap().contains(&"Fe_K_area".to_string()));
}
