//! Integration tests for the quality loop: cadence, timer replacement,
//! stop/restart behavior, and the full sample → score → adapt path against
//! a scripted transport.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{sync::broadcast, time::sleep};
use veza::{QualityLoop, events::EventBus, prelude::*};
use veza_transport::{
    CandidatePairStats, InboundRtpStats, MediaKind, StatsEntry, StatsReport,
    testing::{FakeSender, FakeTransport},
};

const PERIOD: Duration = Duration::from_millis(100);

fn config() -> AdaptationConfig {
    AdaptationConfig::default().with_adaptation_interval(PERIOD)
}

fn new_loop(transport: &FakeTransport) -> (QualityLoop, broadcast::Receiver<Event>) {
    let bus = EventBus::new(64);
    let rx = bus.subscribe();
    let quality_loop = QualityLoop::new(Arc::new(transport.clone()), config(), bus);
    (quality_loop, rx)
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<QualityEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let Event::Quality(quality) = event {
            events.push(quality);
        }
    }
    events
}

fn sample_count(events: &[QualityEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, QualityEvent::Sample { .. }))
        .count()
}

fn congested_report() -> StatsReport {
    StatsReport::new(0)
        .with_entry(StatsEntry::InboundRtp(InboundRtpStats {
            kind: MediaKind::Video,
            packets_received: 1_000,
            packets_lost: 50,
            jitter_ms: 60.0,
            ..Default::default()
        }))
        .with_entry(StatsEntry::CandidatePair(CandidatePairStats {
            nominated: true,
            current_rtt_ms: 400.0,
            ..Default::default()
        }))
}

#[tokio::test(start_paused = true)]
async fn publishes_one_sample_per_interval() {
    let transport = FakeTransport::new();
    let (mut quality_loop, mut rx) = new_loop(&transport);

    quality_loop.start();
    assert!(quality_loop.is_running());
    sleep(PERIOD * 7 / 2).await;

    let events = drain(&mut rx);
    assert_eq!(sample_count(&events), 3);
    // Healthy (all-zero) metrics score 1.0 at the envelope's max: no change.
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, QualityEvent::BitrateChanged { .. }))
    );
    let (score, _snapshot) = quality_loop.latest().unwrap();
    assert_eq!(score.level, QualityLevel::Excellent);
}

#[tokio::test(start_paused = true)]
async fn double_start_replaces_the_timer() {
    let transport = FakeTransport::new();
    let (mut quality_loop, mut rx) = new_loop(&transport);

    quality_loop.start();
    quality_loop.start();
    sleep(PERIOD * 7 / 2).await;

    // A leaked second timer would double the sample rate.
    assert_eq!(sample_count(&drain(&mut rx)), 3);
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_silences_the_loop() {
    let transport = FakeTransport::new();
    let (mut quality_loop, mut rx) = new_loop(&transport);

    quality_loop.start();
    sleep(PERIOD * 3 / 2).await;
    quality_loop.stop();
    quality_loop.stop();
    assert!(!quality_loop.is_running());

    drain(&mut rx);
    sleep(PERIOD * 3).await;
    assert_eq!(sample_count(&drain(&mut rx)), 0);
}

#[tokio::test(start_paused = true)]
async fn restart_resumes_on_the_original_cadence() {
    let transport = FakeTransport::new();
    let (mut quality_loop, mut rx) = new_loop(&transport);

    quality_loop.start();
    sleep(PERIOD * 3 / 2).await;
    quality_loop.stop();
    drain(&mut rx);

    quality_loop.start();
    sleep(PERIOD * 5 / 2).await;
    assert_eq!(sample_count(&drain(&mut rx)), 2);
}

#[tokio::test(start_paused = true)]
async fn congestion_shrinks_bitrate_through_the_loop() {
    let transport = FakeTransport::new();
    let video = FakeSender::new(MediaKind::Video);
    transport.add_sender(Arc::new(video.clone()));
    for _ in 0..4 {
        transport.push_stats(Ok(congested_report()));
    }
    let (mut quality_loop, mut rx) = new_loop(&transport);

    quality_loop.start();
    sleep(PERIOD * 2 + PERIOD / 2).await;

    // Two congested ticks: 2.5 Mbps -> 2.0 -> 1.6.
    assert_eq!(quality_loop.envelope().current_bps, 1_600_000);
    assert_eq!(video.max_bitrate_bps(), Some(1_600_000));

    let events = drain(&mut rx);
    let changes: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            QualityEvent::BitrateChanged {
                previous_bps,
                current_bps,
            } => Some((*previous_bps, *current_bps)),
            _ => None,
        })
        .collect();
    assert_eq!(changes, vec![(2_500_000, 2_000_000), (2_000_000, 1_600_000)]);
}

#[tokio::test(start_paused = true)]
async fn envelope_survives_a_restart() {
    let transport = FakeTransport::new();
    let video = FakeSender::new(MediaKind::Video);
    transport.add_sender(Arc::new(video.clone()));
    transport.push_stats(Ok(congested_report()));
    let (mut quality_loop, mut rx) = new_loop(&transport);

    quality_loop.start();
    sleep(PERIOD * 3 / 2).await;
    assert_eq!(quality_loop.envelope().current_bps, 2_000_000);

    quality_loop.stop();
    quality_loop.start();
    drain(&mut rx);

    // The envelope belongs to the connection, not to one run of the timer.
    assert_eq!(quality_loop.envelope().current_bps, 2_000_000);
}

#[tokio::test(start_paused = true)]
async fn observers_run_each_tick_until_unsubscribed() {
    let transport = FakeTransport::new();
    let (mut quality_loop, _rx) = new_loop(&transport);

    let calls = Arc::new(AtomicUsize::new(0));
    let handle = {
        let calls = Arc::clone(&calls);
        quality_loop.observe(move |_score, _snapshot| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
    };

    quality_loop.start();
    sleep(PERIOD * 5 / 2).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    handle.unsubscribe();
    sleep(PERIOD * 2).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn stats_failures_do_not_break_the_loop() {
    let transport = FakeTransport::new();
    transport.push_stats(Err(veza_transport::TransportError::stats("engine busy")));
    transport.push_stats(Err(veza_transport::TransportError::stats("engine busy")));
    let (mut quality_loop, mut rx) = new_loop(&transport);

    quality_loop.start();
    sleep(PERIOD * 7 / 2).await;

    // Failed sampling ticks still publish, reusing the previous snapshot.
    assert_eq!(sample_count(&drain(&mut rx)), 3);
}
