use super::*;
use crate::input::VirtualInputSource;
use crate::telemetry::SessionEvent;
use crate::timeline::Note;

fn single_c4(total: f64) -> Timeline {
    Timeline::new(vec![Note::new("C4", 0.0, 500.0, 1.0, 0)], 120.0, total)
}

fn connected_source() -> Arc<VirtualInputSource> {
    let source = Arc::new(VirtualInputSource::new());
    source.connect().unwrap();
    source
}

fn spawn(timeline: Timeline, source: &Arc<VirtualInputSource>) -> SessionHandle {
    SessionHandle::spawn(AppConfig::default(), timeline, source.clone()).unwrap()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn gate_pauses(handle: &SessionHandle) -> usize {
    handle
        .telemetry()
        .snapshot()
        .recent
        .iter()
        .filter(|record| {
            matches!(
                record.event,
                SessionEvent::PlaybackPaused {
                    reason: PauseReason::Gate,
                    ..
                }
            )
        })
        .count()
}

#[test]
fn spawn_requires_runtime() {
    let source = connected_source();
    let result = SessionHandle::spawn(AppConfig::default(), Timeline::empty(1.0), source);
    assert!(matches!(
        result,
        Err(SessionError::RuntimeUnavailable { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn empty_timeline_stops_at_end() {
    let source = connected_source();
    let handle = spawn(Timeline::empty(1.0), &source);
    let mut playback = handle.subscribe_playback().unwrap();

    let state = handle.play().await.unwrap();
    assert!(state.is_playing);
    assert_eq!(
        playback.recv().await.unwrap(),
        PlaybackSignal {
            playing: true,
            reason: None,
            scrub_position_s: 0.0
        }
    );

    let stopped = playback.recv().await.unwrap();
    assert!(!stopped.playing);
    assert_eq!(stopped.reason, Some(PauseReason::EndOfTimeline));
    assert_eq!(stopped.scrub_position_s, 1.0);

    let state = handle.playback_state().await.unwrap();
    assert!((state.elapsed_ms - 1000.0).abs() < 1e-6);
    assert_eq!(gate_pauses(&handle), 0);
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn missed_note_pauses_then_resumes_on_press() {
    let source = connected_source();
    let handle = spawn(single_c4(3.0), &source);
    handle.play().await.unwrap();

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    let state = handle.playback_state().await.unwrap();
    assert!(!state.is_playing);
    assert_eq!(state.pause_reason, Some(PauseReason::Gate));
    assert_eq!(gate_pauses(&handle), 1);

    source.press("C4").unwrap();
    settle().await;
    assert!(handle.playback_state().await.unwrap().is_playing);

    source.release("C4").unwrap();
    tokio::time::sleep(Duration::from_millis(3_000)).await;
    let state = handle.playback_state().await.unwrap();
    assert_eq!(state.pause_reason, Some(PauseReason::EndOfTimeline));
    assert_eq!(gate_pauses(&handle), 1);
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn held_pitch_never_pauses() {
    let source = connected_source();
    let handle = spawn(single_c4(3.0), &source);
    source.press("C4").unwrap();
    settle().await;
    handle.play().await.unwrap();

    tokio::time::sleep(Duration::from_millis(4_000)).await;
    let state = handle.playback_state().await.unwrap();
    assert_eq!(state.pause_reason, Some(PauseReason::EndOfTimeline));
    assert_eq!(gate_pauses(&handle), 0);
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn pause_stops_the_clock() {
    let source = connected_source();
    let handle = spawn(Timeline::empty(10.0), &source);
    handle.play().await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let paused = handle.pause().await.unwrap();
    assert!(!paused.is_playing);
    tokio::time::sleep(Duration::from_millis(500)).await;
    let later = handle.playback_state().await.unwrap();
    assert_eq!(later.elapsed_ms, paused.elapsed_ms);
    assert_eq!(later.scrub_position_s, paused.scrub_position_s);
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn seek_validates_and_is_idempotent() {
    let source = connected_source();
    let handle = spawn(single_c4(30.0), &source);

    assert!(matches!(
        handle.seek(f64::NAN).await,
        Err(SessionError::DurationInvalid { .. })
    ));
    assert!(matches!(
        handle.seek(-1.0).await,
        Err(SessionError::DurationInvalid { .. })
    ));

    let first = handle.seek(15.0).await.unwrap();
    handle.play().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = handle.seek(15.0).await.unwrap();
    assert_eq!(first.elapsed_ms, second.elapsed_ms);
    assert_eq!(second.display, "0:15");
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn frames_are_broadcast_while_playing() {
    let source = connected_source();
    let handle = spawn(single_c4(3.0), &source);
    let mut frames = handle.subscribe_frames().unwrap();
    handle.play().await.unwrap();

    let frame = frames.recv().await.unwrap();
    assert!(frame.playback.is_playing);
    assert_eq!(frame.draws.len(), 1);

    let queried = handle.frame().await.unwrap();
    assert_eq!(queried.draws.len(), 1);
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_unsubscribes_and_rejects_commands() {
    let source = connected_source();
    let handle = spawn(Timeline::empty(5.0), &source);
    assert_eq!(source.subscriber_count(), 1);

    handle.shutdown().await.unwrap();
    assert!(!handle.is_running());
    assert_eq!(source.subscriber_count(), 0);
    assert_eq!(handle.shutdown().await, Err(SessionError::NotRunning));
    assert_eq!(handle.play().await, Err(SessionError::NotRunning));
    assert!(handle.subscribe_frames().is_none());
}

#[tokio::test(start_paused = true)]
async fn load_timeline_pauses_and_rewinds() {
    let source = connected_source();
    let handle = spawn(Timeline::empty(5.0), &source);
    handle.play().await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let state = handle.load_timeline(single_c4(8.0)).await.unwrap();
    assert!(!state.is_playing);
    assert_eq!(state.scrub_position_s, 0.0);
    assert_eq!(state.total_duration_s, 8.0);
    assert!(handle
        .telemetry()
        .snapshot()
        .recent
        .iter()
        .any(|record| record.event.kind() == "timeline_loaded"));
    handle.shutdown().await.unwrap();
}
