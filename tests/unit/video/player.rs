use std::time::Duration;

use super::*;
use crate::{
    config::CpuBackendOpts,
    foundation::core::{Rgba8, Size2},
    gpu::{
        backend::GpuBackend,
        cpu::CpuBackend,
        image::{ImageDesc, ImageUsage, PixelFormat},
    },
    video::source::{SyntheticPattern, SyntheticVideo},
};

struct Rig {
    player: VideoPlayer,
    raw: MutableImage,
    events: crossbeam_channel::Receiver<PipelineEvent>,
}

fn rig(video: SyntheticVideo) -> Rig {
    let backend: Arc<dyn GpuBackend> =
        Arc::new(CpuBackend::new(CpuBackendOpts::default()).unwrap());
    let bus = EventBus::new();
    let (_id, events) = bus.subscribe_channel();
    let size = video.natural_size().unwrap();
    let raw = MutableImage::new(
        Arc::clone(&backend),
        ImageDesc::new(size, PixelFormat::Bgra8Unorm, ImageUsage::SHADER_READ),
    )
    .unwrap();
    let tap = VideoFrameTap::new(backend, bus.clone());
    let player = VideoPlayer::new(Arc::new(video), tap, raw.clone(), bus);
    Rig {
        player,
        raw,
        events,
    }
}

fn red(frames: u64) -> SyntheticVideo {
    SyntheticVideo::new("red", Size2::new(2, 2).unwrap(), 60.0, frames)
        .with_pattern(SyntheticPattern::Solid(Rgba8::opaque(255, 0, 0)))
}

fn wait_for(rx: &crossbeam_channel::Receiver<PipelineEvent>, want: &PipelineEvent) {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        let left = deadline.saturating_duration_since(std::time::Instant::now());
        let ev = rx.recv_timeout(left).expect("event not delivered in time");
        if &ev == want {
            return;
        }
    }
}

#[test]
fn new_player_is_ready_and_paused() {
    let r = rig(red(3));
    assert_eq!(r.player.item_status(), ItemStatus::ReadyToPlay);
    assert_eq!(r.player.status(), TimeControlStatus::Paused);
    assert!(!r.player.is_advancing());
    assert_eq!(
        r.events.try_recv().unwrap(),
        PipelineEvent::ItemStatusChanged(ItemStatus::ReadyToPlay)
    );
}

#[test]
fn empty_source_fails_item() {
    let r = rig(red(0));
    assert_eq!(r.player.item_status(), ItemStatus::Failed);
    assert!(r.player.play().is_err());
}

#[test]
fn step_presents_raw_frame_and_finishes() {
    let r = rig(red(2));
    assert!(r.player.step().unwrap());
    assert_eq!(r.raw.generation(), 1);
    assert_eq!(
        &r.raw.display_handle().read_rgba8().unwrap()[..4],
        &[255, 0, 0, 255]
    );
    wait_for(&r.events, &PipelineEvent::NewVideoFrame { frame: 0 });

    assert!(r.player.step().unwrap());
    assert!(!r.player.step().unwrap());
    wait_for(&r.events, &PipelineEvent::PlaybackFinished);
}

#[test]
fn seek_clamps_and_presents() {
    let r = rig(red(4));
    r.player.seek(99).unwrap();
    assert_eq!(r.player.position(), 4);
    wait_for(&r.events, &PipelineEvent::NewVideoFrame { frame: 3 });
    r.player.seek(0).unwrap();
    assert_eq!(r.player.position(), 1);
}

#[test]
fn multi_track_source_fails_item() {
    let r = rig(red(2).with_tracks(2));
    let err = r.player.step().unwrap_err();
    assert!(matches!(err, ShadowError::SourceCount { count: 2 }));
    assert_eq!(r.player.item_status(), ItemStatus::Failed);
    assert_eq!(r.raw.generation(), 0);
}

#[test]
fn play_runs_to_the_end() {
    let r = rig(red(3));
    r.player.play().unwrap();
    wait_for(
        &r.events,
        &PipelineEvent::PlayerStatusChanged(TimeControlStatus::WaitingToPlay),
    );
    wait_for(
        &r.events,
        &PipelineEvent::PlayerStatusChanged(TimeControlStatus::Playing),
    );
    wait_for(&r.events, &PipelineEvent::PlaybackFinished);
    assert_eq!(r.player.status(), TimeControlStatus::Paused);
    assert_eq!(r.raw.generation(), 3);
}

#[test]
fn pause_stops_the_clock() {
    let r = rig(SyntheticVideo::new("long", Size2::new(2, 2).unwrap(), 200.0, 100_000));
    r.player.play().unwrap();
    wait_for(
        &r.events,
        &PipelineEvent::PlayerStatusChanged(TimeControlStatus::Playing),
    );
    r.player.pause();
    assert_eq!(r.player.status(), TimeControlStatus::Paused);
    std::thread::sleep(Duration::from_millis(50));
    let settled = r.player.position();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(r.player.position(), settled);
}
