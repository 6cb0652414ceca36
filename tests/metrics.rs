#![cfg(feature = "metrics")]
//! Tests for `gbxremote` metrics helpers.
//!
//! These tests verify that counters and gauges update as expected using
//! `metrics_util::debugging::DebuggingRecorder`.

use gbxremote::{
    Interest,
    Notification,
    dispatcher::CallbackDispatcher,
    metrics::{self as gbx_metrics, Direction},
    pending::PendingRequestTable,
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use rstest::rstest;

fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

#[rstest]
#[case(Direction::Inbound, "inbound")]
#[case(Direction::Outbound, "outbound")]
fn frame_metric_is_labelled_by_direction(#[case] direction: Direction, #[case] label: &str) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || gbx_metrics::inc_frames(direction));

    let metrics = snapshotter.snapshot().into_vec();
    let found = metrics.iter().any(|(k, _, _, v)| {
        k.key().name() == gbx_metrics::FRAMES_TOTAL
            && k.key()
                .labels()
                .any(|l| l.key() == "direction" && l.value() == label)
            && matches!(v, DebugValue::Counter(c) if *c > 0)
    });
    assert!(found, "{label} frames metric not recorded");
}

#[test]
fn pending_gauge_follows_the_table() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        let table = PendingRequestTable::new();
        let _a = table.register(gbxremote::HandlerId::new(0x8000_0000));
        let _b = table.register(gbxremote::HandlerId::new(0x8000_0001));
    });

    let metrics = snapshotter.snapshot().into_vec();
    assert!(
        metrics.iter().any(|(k, _, _, v)| {
            k.key().name() == gbx_metrics::PENDING_REQUESTS
                && matches!(v, DebugValue::Gauge(g) if (g.into_inner() - 2.0).abs() < f64::EPSILON)
        }),
        "expected pending gauge of 2, got {metrics:#?}"
    );
}

#[rstest]
#[case(1)]
#[case(2)]
fn listener_panics_are_counted(#[case] expected: u64) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        let dispatcher = CallbackDispatcher::new();
        dispatcher.register(Interest::All, |_: &Notification| panic!("boom"));
        for _ in 0..expected {
            dispatcher.dispatch(&Notification::new("TrackMania.EndRound", vec![]));
        }
    });

    assert_counter_eq(&snapshotter, gbx_metrics::LISTENER_PANICS_TOTAL, expected);
    assert_counter_eq(&snapshotter, gbx_metrics::NOTIFICATIONS_TOTAL, expected);
}

fn assert_counter_eq(snapshotter: &Snapshotter, name: &str, expected: u64) {
    let metrics = snapshotter.snapshot().into_vec();
    assert!(
        metrics.iter().any(|(key, _, _, value)| {
            key.key().name() == name && matches!(value, DebugValue::Counter(c) if *c == expected)
        }),
        "expected {name} == {expected}, got {metrics:#?}"
    );
}
