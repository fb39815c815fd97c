use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::sleep;
use vigil_types::{Level, PublishOptions, Report, Target};

use super::{recording, recording_with};
use crate::{Config, Dispatcher, Trail};

fn past_window() -> Duration {
    Config::default().dispatch_window + Duration::from_millis(10)
}

#[tokio::test(start_paused = true)]
async fn identical_dispatches_within_window_fold_into_one_report() {
    let (diag, logger) = recording();

    for _ in 0..5 {
        diag.dispatch("disk almost full", Level::Info);
    }
    assert!(logger.all().is_empty());

    sleep(past_window()).await;
    assert_eq!(logger.all(), vec!["[INFO] disk almost full (x5 Events)"]);

    diag.dispatch("disk almost full", Level::Info);
    sleep(past_window()).await;
    assert_eq!(
        logger.all(),
        vec![
            "[INFO] disk almost full (x5 Events)",
            "[INFO] disk almost full"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn distinct_messages_are_aggregated_independently() {
    let (diag, logger) = recording();

    diag.dispatch("a", Level::Info);
    diag.dispatch("b", Level::Info);
    diag.dispatch("a", Level::Info);
    diag.dispatch("a", Level::Warn);
    sleep(past_window()).await;

    let mut lines = logger.all();
    lines.sort();
    assert_eq!(lines, vec!["[INFO] a (x2 Events)", "[INFO] b", "[WARN] a"]);
}

#[tokio::test(start_paused = true)]
async fn error_levels_go_to_warn_sink_with_trail() {
    let (diag, logger) = recording();
    diag.trail().record("load");
    diag.trail().record("parse");

    diag.dispatch("bad header", Level::Error);
    diag.dispatch("still bad", Level::Info);
    sleep(past_window()).await;

    assert_eq!(
        logger.warn_lines(),
        vec!["[ERROR] bad header\nTrail: load > parse"]
    );
    assert_eq!(logger.containing("still bad"), vec!["[INFO] still bad"]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_pending_dispatches() {
    let (diag, logger) = recording();

    diag.dispatch("one", Level::Fatal);
    diag.dispatch("one", Level::Fatal);
    assert_eq!(diag.dispatcher().pending_len(), 1);
    diag.shutdown();

    assert_eq!(diag.dispatcher().pending_len(), 0);
    assert_eq!(logger.warn_lines(), vec!["[FATAL] one (x2 Events)"]);

    sleep(past_window()).await;
    assert_eq!(logger.all().len(), 1);
}

#[test]
fn dispatch_outside_runtime_emits_immediately() {
    let (diag, logger) = recording();

    diag.dispatch("no runtime", Level::Warn);

    assert_eq!(logger.all(), vec!["[WARN] no runtime"]);
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_transformed_reports_until_dropped() {
    let (diag, _logger) = recording_with(Config {
        dispatch_window: Duration::from_millis(10),
        ..Config::default()
    });
    let seen: Arc<Mutex<Vec<(Report, Target, PublishOptions)>>> = Arc::default();

    diag.channel().register_transform(|mut report| {
        report.message = report.message.to_uppercase();
        report
    });
    let subscription = diag.channel().subscribe({
        let seen = seen.clone();
        move |report, target, options| {
            seen.lock()
                .push((report.clone(), target.clone(), options.clone()))
        }
    });
    assert_eq!(diag.channel().subscriber_count(), 1);

    diag.dispatch("hello", Level::Info);
    sleep(Duration::from_millis(20)).await;

    {
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        let (report, target, options) = &seen[0];
        assert_eq!(report.message, "[INFO] HELLO");
        assert_eq!(report.level, Level::Info);
        assert_eq!(report.count, 1);
        assert_eq!(*target, Target::Broadcast);
        assert_eq!(options.origin.as_deref(), Some("dispatch"));
    }

    drop(subscription);
    assert_eq!(diag.channel().subscriber_count(), 0);
    diag.dispatch("again", Level::Info);
    sleep(Duration::from_millis(20)).await;
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn subscriber_may_unsubscribe_inside_its_callback() {
    let channel = crate::Channel::new();
    let slot: Arc<Mutex<Option<crate::Subscription>>> = Arc::default();
    let calls = Arc::new(Mutex::new(0u32));

    let subscription = channel.subscribe({
        let slot = slot.clone();
        let calls = calls.clone();
        move |_, _, _| {
            *calls.lock() += 1;
            if let Some(subscription) = slot.lock().take() {
                subscription.unsubscribe();
            }
        }
    });
    *slot.lock() = Some(subscription);

    let report = Report {
        level: Level::Info,
        message: "x".to_owned(),
        count: 1,
        emitted_at: vigil_types::PTime::now(),
    };
    channel.publish(report.clone(), &Target::Broadcast, &PublishOptions::default());
    channel.publish(report, &Target::Named("ops".into()), &PublishOptions::default());

    assert_eq!(*calls.lock(), 1);
    assert_eq!(channel.subscriber_count(), 0);
}

#[test]
fn trail_is_bounded_and_renders_oldest_first() {
    let trail = Trail::new(3);
    assert_eq!(trail.render(), None);

    for name in ["a", "b", "c", "d"] {
        trail.record(name);
    }

    assert_eq!(trail.render().as_deref(), Some("Trail: b > c > d"));
    trail.clear();
    assert!(trail.entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn zero_window_still_emits_after_yield() {
    let logger = Arc::new(super::RecordingLogger::default());
    let dispatcher = Dispatcher::new(Duration::ZERO, 0, logger.clone());

    dispatcher.dispatch("now", Level::Error);
    sleep(Duration::from_millis(1)).await;

    assert_eq!(logger.warn_lines(), vec!["[ERROR] now"]);
}

#[test]
fn panicking_subscriber_neither_unwinds_into_dispatch_nor_starves_later_ones() {
    let (diag, logger) = recording();
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();

    let _broken = diag.channel().subscribe(|_, _, _| panic!("subscriber bug"));
    let _healthy = diag.channel().subscribe({
        let seen = seen.clone();
        move |report, _, _| seen.lock().push(report.message.clone())
    });

    diag.dispatch("hello", Level::Info);

    assert_eq!(logger.all(), vec!["[INFO] hello"]);
    assert_eq!(*seen.lock(), vec!["[INFO] hello"]);
}

#[test]
fn panicking_transform_is_skipped() {
    let channel = crate::Channel::new();
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();

    channel.register_transform(|_| panic!("transform bug"));
    channel.register_transform(|mut report| {
        report.message.push_str(" [tagged]");
        report
    });
    let _subscription = channel.subscribe({
        let seen = seen.clone();
        move |report, _, _| seen.lock().push(report.message.clone())
    });

    let report = Report {
        level: Level::Warn,
        message: "disk".to_owned(),
        count: 1,
        emitted_at: vigil_types::PTime::now(),
    };
    channel.publish(report, &Target::Broadcast, &PublishOptions::default());

    assert_eq!(*seen.lock(), vec!["disk [tagged]"]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_survives_a_panicking_subscriber() {
    let (diag, logger) = recording();
    let _broken = diag.channel().subscribe(|_, _, _| panic!("subscriber bug"));

    diag.dispatch("a", Level::Info);
    diag.dispatch("b", Level::Error);
    diag.shutdown();

    let mut lines = logger.all();
    lines.sort();
    assert_eq!(lines, vec!["[ERROR] b", "[INFO] a"]);
}
