use super::*;
use crate::library::ManifestBook;
use earshot_core::{AudioFile, Chapter, FileId, ResumeProgress};
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;

fn sample_manifest() -> LibraryManifest {
    let mut manifest = LibraryManifest::default();
    manifest.books.push(ManifestBook {
        id: BookId::from("b1"),
        title: "The Long Road".to_string(),
        author: Some("A. Writer".to_string()),
        audio_files: Some(json!([
            { "id": "f1", "filename": "01.mp3", "durationMs": 1800000 },
            { "id": "f2", "filename": "02.mp3", "durationMs": 2400000 },
            { "id": "f3", "filename": "03.mp3", "durationMs": 1200000 }
        ])),
        chapters: vec![
            Chapter::new("Departure", 0, 2_000_000),
            Chapter::new("Arrival", 2_000_000, 5_400_000),
        ],
    });
    manifest
        .downloads
        .insert(FileId::from("f1"), PathBuf::from("/cache/f1.mp3"));
    manifest
}

fn timeline(manifest: &LibraryManifest) -> PlaybackTimeline {
    let book = StoredBook::from(manifest.books[0].clone());
    let files: Vec<AudioFile> = book.audio_files().unwrap();
    let downloads = manifest.download_service();
    PlaybackTimeline::build_local(&book.id, &files, "https://abs.example.com", |id| {
        downloads.local_path(id)
    })
    .unwrap()
}

#[test]
fn test_format_ms() {
    assert_eq!(format_ms(0), "0:00");
    assert_eq!(format_ms(61_999), "1:01");
    assert_eq!(format_ms(5_400_000), "1:30:00");
}

#[test]
fn test_parse_position() {
    assert_eq!(parse_position("2000000").unwrap(), 2_000_000);
    assert_eq!(parse_position("-50").unwrap(), -50);
    assert_eq!(parse_position("33:20").unwrap(), 2_000_000);
    assert_eq!(parse_position("1:00:00").unwrap(), 3_600_000);
    assert!(parse_position("abc").is_err());
    assert!(parse_position("1:-5").is_err());
}

#[test]
fn test_parse_position_rejects_overflow() {
    let err = parse_position("9223372036854775807:00:00").unwrap_err();
    assert!(err.to_string().contains("too large"));
    assert!(parse_position("153722867280912930:00").is_err());
    assert!(parse_position("9223372036854775:00").is_err());
}

#[test]
fn test_target_speed() {
    assert_eq!(target_speed(1.0, None, 0, 0.1), None);
    assert_eq!(target_speed(1.0, Some(1.7), 3, 0.1), Some(1.7));
    assert_eq!(target_speed(1.0, None, 3, 0.1), Some(1.3));
    assert_eq!(target_speed(1.0, None, -10, 0.1), Some(0.5));
    assert_eq!(target_speed(2.9, None, 5, 0.1), Some(3.0));
}

#[test]
fn test_render_timeline_lists_segments() {
    let manifest = sample_manifest();
    let out = render_timeline(&timeline(&manifest));

    assert!(out.starts_with("Book b1: 3 segments, 1:30:00 total, 1/3 cached"));
    assert!(out.contains("/cache/f1.mp3"));
    assert!(out.contains("https://abs.example.com/books/b1/audio/f2"));
    assert_eq!(out.lines().count(), 4);
}

#[test]
fn test_render_resolved() {
    let manifest = sample_manifest();
    let timeline = timeline(&manifest);
    let chapters = ChapterList::new(manifest.books[0].chapters.clone());

    let out = render_resolved(&timeline, &chapters, 2_000_000);
    assert!(out.contains("Segment 1 (f2) at 3:20 (200000ms into the file)"));
    assert!(out.contains("Chapter 2/2: Arrival"));

    let out = render_resolved(&timeline, &chapters, 9_000_000);
    assert!(out.starts_with("Position 9000000ms is outside the book; using 5400000ms"));
    assert!(out.contains("Segment 2 (f3)"));
}

#[test]
fn test_render_status() {
    let chapters = ChapterList::new(vec![
        Chapter::new("One", 0, 60_000),
        Chapter::new("Two", 60_000, 120_000),
    ]);
    let line = render_status(90_000, 120_000, 1.25, Some(&chapters), Some("4:59"));
    assert_eq!(line, "1:30 / 2:00  1.25x  ch 2/2  sleep 4:59");

    let line = render_status(-5, 120_000, 1.0, None, None);
    assert_eq!(line, "0:00 / 2:00  1.00x");
}

#[test]
fn test_manifest_round_trip_keeps_progress() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("library.json");

    let mut manifest = sample_manifest();
    manifest.save(&path).unwrap();

    let store = manifest.progress_store();
    store.set(BookId::from("b1"), ResumeProgress::at(42_000).with_custom_speed(1.5));
    manifest.absorb_progress(&store);
    manifest.save(&path).unwrap();

    let loaded = LibraryManifest::load(&path).unwrap();
    let progress = loaded.progress[&BookId::from("b1")];
    assert_eq!(progress.position_ms, 42_000);
    assert!(progress.has_custom_speed);
    assert_eq!(loaded.books[0].title, "The Long Road");
}

#[test]
fn test_malformed_audio_files_fail_on_use() {
    let mut manifest = sample_manifest();
    manifest.books[0].audio_files = Some(json!({ "not": "a list" }));
    let book = StoredBook::from(manifest.books[0].clone());
    assert!(book.audio_files().is_err());
}

#[test]
fn test_timeline_command_needs_base_url() {
    let dir = TempDir::new().unwrap();
    let library = dir.path().join("library.json");
    sample_manifest().save(&library).unwrap();

    let config = ConfigManager::with_directory(dir.path().join("config"));
    let err = show_timeline(&library, config, &BookId::from("b1")).unwrap_err();
    assert!(err.to_string().contains("base URL"));
}

#[tokio::test]
async fn test_prepare_direct_with_config_file() {
    let dir = TempDir::new().unwrap();
    let library = dir.path().join("library.json");
    sample_manifest().save(&library).unwrap();

    let config = ConfigManager::with_directory(dir.path().join("config"));
    config
        .update(|c| c.server.base_url = Some("https://abs.example.com".to_string()))
        .unwrap();

    prepare_book(&library, config, &BookId::from("b1"), true)
        .await
        .unwrap();
}

#[test]
fn test_failure_hint_finds_playback_error() {
    let err = anyhow::Error::new(AppError::MissingServerConfig).context("Failed to prepare book b1");
    let hint = failure_hint(&err).unwrap();
    assert!(hint.starts_with("Unable to start playback"));
    assert!(hint.ends_with("(User intervention required)"));

    assert!(failure_hint(&anyhow::anyhow!("plain failure")).is_none());
}

#[test]
fn test_config_check_flags_bad_values() {
    let dir = TempDir::new().unwrap();
    let config = ConfigManager::with_directory(dir.path().to_path_buf());
    std::fs::write(config.config_path(), "[player]\ndefault_speed = 9.0\n").unwrap();

    let err = config_check(&config).unwrap_err();
    assert!(err.to_string().contains("1 problem"));

    config_reset(&config).unwrap();
    config_check(&config).unwrap();
}
