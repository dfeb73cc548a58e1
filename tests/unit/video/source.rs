use super::*;

fn size(w: u32, h: u32) -> Size2 {
    Size2::new(w, h).unwrap()
}

#[test]
fn synthetic_solid_frames_are_bgra() {
    let video = SyntheticVideo::new("solid", size(2, 2), 30.0, 3)
        .with_pattern(SyntheticPattern::Solid(Rgba8::opaque(10, 20, 30)));
    let frame = video.decode_frame(1).unwrap();
    assert_eq!(frame.index, 1);
    assert_eq!(frame.format, PixelFormat::Bgra8Unorm);
    assert_eq!(&frame.data[..4], &[30, 20, 10, 255]);
    assert_eq!(frame.data.len(), 16);
}

#[test]
fn synthetic_gradient_scrolls() {
    let video = SyntheticVideo::new("ramp", size(4, 1), 30.0, 4);
    let f0 = video.decode_frame(0).unwrap();
    let f1 = video.decode_frame(1).unwrap();
    assert_eq!(f0.data[0], 0);
    assert_eq!(f0.data[12], 255);
    assert_eq!(f1.data[0], f0.data[4]);
}

#[test]
fn synthetic_gradient_wraps_at_the_right_edge() {
    let video = SyntheticVideo::new("ramp", size(4, 2), 30.0, 10);
    let f1 = video.decode_frame(1).unwrap();
    assert_eq!(f1.data[12], 0);
    let f5 = video.decode_frame(5).unwrap();
    assert_eq!(f5.data, f1.data);
    assert!(f5.data.chunks_exact(4).all(|px| px[3] == 255));
}

#[test]
fn synthetic_out_of_range_frame_is_rejected() {
    let video = SyntheticVideo::new("short", size(1, 1), 30.0, 2);
    assert!(video.decode_frame(2).is_err());
}

#[test]
fn track_count_follows_builder() {
    let one = SyntheticVideo::new("a", size(1, 1), 30.0, 1);
    assert_eq!(one.required_source_tracks(), vec![TrackId(1)]);
    let two = one.with_tracks(2);
    assert_eq!(two.required_source_tracks(), vec![TrackId(1), TrackId(2)]);
}

#[test]
fn ff_ratio_parsing() {
    assert_eq!(parse_ff_ratio("30000/1001"), Some((30000, 1001)));
    assert_eq!(parse_ff_ratio("25/0"), None);
    assert_eq!(parse_ff_ratio("abc"), None);
}

#[test]
fn file_info_frame_count_uses_duration() {
    let info = VideoFileInfo {
        source_path: PathBuf::from("a.mp4"),
        width: 2,
        height: 2,
        fps_num: 30,
        fps_den: 1,
        duration_sec: 2.5,
    };
    assert_eq!(info.frame_count(), 75);
}

#[cfg(not(feature = "media-ffmpeg"))]
#[test]
fn ffmpeg_source_needs_feature() {
    let err = FfmpegVideoSource::open(Path::new("missing.mp4")).unwrap_err();
    assert!(matches!(err, ShadowError::Setup(_)));
}
