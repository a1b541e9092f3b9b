use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use lasergauge_hardware::error::HwError;
use lasergauge_hardware::util::poll_until;

#[test]
fn returns_once_condition_holds() {
    let polls = Arc::new(AtomicUsize::new(0));
    let p = polls.clone();
    let waited = poll_until(
        move || p.fetch_add(1, Ordering::Relaxed) >= 3,
        Duration::from_secs(2),
        Duration::from_micros(200),
    )
    .expect("condition reached");
    assert_eq!(polls.load(Ordering::Relaxed), 4);
    assert!(waited < Duration::from_secs(2));
}

#[test]
fn timeout_reports_time_waited() {
    let err = poll_until(|| false, Duration::from_millis(5), Duration::from_millis(1))
        .expect_err("expected timeout");
    match err {
        HwError::Timeout { waited_ms } => assert!(waited_ms >= 5, "waited {waited_ms} ms"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn zero_timeout_still_checks_once() {
    assert!(poll_until(|| true, Duration::ZERO, Duration::from_secs(10)).is_ok());
    assert!(poll_until(|| false, Duration::ZERO, Duration::from_secs(10)).is_err());
}
