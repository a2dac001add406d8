//! Plain-text views of probe results and batch outcomes.

use crate::engine::batch::BatchSummary;
use crate::file_manager::FileManager;
use crate::probe::MediaProbe;
use std::fmt::Write;
use std::path::Path;

/// File information table followed by the video and audio stream tables.
pub fn render_probe(path: &Path, probe: &MediaProbe) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut out = String::new();
    let _ = writeln!(out, "File Information: {}", name);
    let _ = writeln!(out, "  {:<10}{:.2} MB", "Size", probe.size_mb());
    let _ = writeln!(out, "  {:<10}{:.2} seconds", "Duration", probe.format.duration_seconds);
    let _ = writeln!(out, "  {:<10}{}", "Format", probe.format.container);
    let _ = writeln!(out, "  {:<10}{:.0} kb/s", "Bitrate", probe.bit_rate_kbps());

    if !probe.video_streams.is_empty() {
        let _ = writeln!(out, "\nVideo Streams");
        let _ = writeln!(
            out,
            "  {:<8}{:<12}{:<12}{}",
            "Stream", "Codec", "Resolution", "Frame Rate"
        );
        for s in &probe.video_streams {
            let _ = writeln!(
                out,
                "  {:<8}{:<12}{:<12}{}",
                format!("#{}", s.index),
                s.codec_name,
                format!("{}x{}", s.width, s.height),
                match s.fps() {
                    Some(fps) => format!("{} ({:.2} fps)", s.frame_rate, fps),
                    None => s.frame_rate.clone(),
                }
            );
        }
    }

    if !probe.audio_streams.is_empty() {
        let _ = writeln!(out, "\nAudio Streams");
        let _ = writeln!(
            out,
            "  {:<8}{:<12}{:<13}{}",
            "Stream", "Codec", "Sample Rate", "Channels"
        );
        for s in &probe.audio_streams {
            let _ = writeln!(
                out,
                "  {:<8}{:<12}{:<13}{}",
                format!("#{}", s.index),
                s.codec_name,
                format!("{} Hz", s.sample_rate),
                s.channels
            );
        }
    }

    out
}

/// One line per file: name and human readable size.
pub fn render_media_list(files: &[(std::path::PathBuf, u64)]) -> String {
    if files.is_empty() {
        return "No media files found.\n".to_string();
    }
    let mut out = String::new();
    for (path, size) in files {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let _ = writeln!(out, "  {:<40} {:>10}", name, FileManager::format_size(*size));
    }
    out
}

/// Summary line plus the reason each failed file did not convert.
pub fn render_batch(summary: &BatchSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", summary.format_summary());
    for entry in summary.failures() {
        if let Err(e) = &entry.result {
            let _ = writeln!(out, "  ❌ {}: {}", entry.input.display(), e);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_probe() {
        let probe = MediaProbe::parse(
            r#"{
                "format": {"format_long_name": "Matroska / WebM", "size": "2097152", "duration": "90.5", "bit_rate": "185363"},
                "streams": [
                    {"index": 0, "codec_type": "video", "codec_name": "vp9", "width": 1280, "height": 720, "r_frame_rate": "25/1"},
                    {"index": 1, "codec_type": "audio", "codec_name": "opus", "sample_rate": "48000", "channels": 2}
                ]
            }"#,
        )
        .unwrap();

        let text = render_probe(Path::new("/videos/talk.webm"), &probe);
        assert!(text.starts_with("File Information: talk.webm\n"));
        assert!(text.contains("2.00 MB"));
        assert!(text.contains("90.50 seconds"));
        assert!(text.contains("Matroska / WebM"));
        assert!(text.contains("185 kb/s"));
        assert!(text.contains("1280x720"));
        assert!(text.contains("25/1 (25.00 fps)"));
        assert!(text.contains("48000 Hz"));
    }

    #[test]
    fn test_audio_only_has_no_video_table() {
        let probe = MediaProbe::parse(
            r#"{"format": {}, "streams": [{"index": 0, "codec_type": "audio", "codec_name": "mp3"}]}"#,
        )
        .unwrap();
        let text = render_probe(Path::new("song.mp3"), &probe);
        assert!(!text.contains("Video Streams"));
        assert!(text.contains("Audio Streams"));
        assert!(text.contains("N/A"));
    }

    #[test]
    fn test_render_media_list() {
        assert_eq!(render_media_list(&[]), "No media files found.\n");
        let text = render_media_list(&[(std::path::PathBuf::from("a.mp4"), 2048)]);
        assert!(text.contains("a.mp4"));
        assert!(text.contains("2.00 KB"));
    }
}
