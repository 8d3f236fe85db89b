//! Book-relative timeline over a sequence of audio files

use crate::negotiator::{CodecProfile, StreamNegotiator};
use earshot_core::{AppError, AudioFile, BookId, FileId, Result};
use std::path::{Path, PathBuf};

/// One audio file's slice of the book timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSegment {
    pub file_id: FileId,
    /// Remote stream URL; authenticated with the caller's token
    pub source_url: String,
    /// Present once the file is fully cached; wins over `source_url`
    pub local_path: Option<PathBuf>,
    pub duration_ms: u64,
    /// Cumulative start of this segment within the book
    pub offset_ms: u64,
}

impl AudioSegment {
    /// Book-relative end of this segment (exclusive)
    pub fn end_ms(&self) -> u64 {
        self.offset_ms.saturating_add(self.duration_ms)
    }

    pub fn is_local(&self) -> bool {
        self.local_path.is_some()
    }

    /// What the output engine should open: the cached file if there is one
    pub fn playable_source(&self) -> String {
        match &self.local_path {
            Some(path) => path.display().to_string(),
            None => self.source_url.clone(),
        }
    }
}

/// A book position expressed as a segment and an offset inside it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPosition {
    pub segment_index: usize,
    pub position_in_segment_ms: u64,
}

/// Immutable, gap-free sequence of segments for one book
///
/// Never empty: construction fails with `EmptyTimeline` when there are no
/// files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackTimeline {
    book_id: BookId,
    segments: Vec<AudioSegment>,
    total_duration_ms: u64,
    is_fully_downloaded: bool,
}

/// Direct, non-negotiated stream URL for a file
pub fn direct_stream_url(base_url: &str, book_id: &BookId, file_id: &FileId) -> String {
    format!(
        "{}/books/{}/audio/{}",
        base_url.trim_end_matches('/'),
        book_id,
        file_id
    )
}

impl PlaybackTimeline {
    /// Builds a timeline using cached files where available and direct URLs otherwise
    pub fn build_local<F>(
        book_id: &BookId,
        files: &[AudioFile],
        base_url: &str,
        resolve_local_path: F,
    ) -> Result<Self>
    where
        F: Fn(&FileId) -> Option<PathBuf>,
    {
        let sources = files
            .iter()
            .map(|file| {
                let local = resolve_local_path(&file.id);
                (file, direct_stream_url(base_url, book_id, &file.id), local)
            })
            .collect();

        Self::assemble(book_id, sources)
    }

    /// Builds a timeline, negotiating a stream URL for every uncached file
    ///
    /// Files are negotiated one after another. Cached files never are. A file
    /// whose transcode is still running gets its URL anyway.
    pub async fn build_negotiated<F>(
        book_id: &BookId,
        files: &[AudioFile],
        base_url: &str,
        resolve_local_path: F,
        negotiator: &StreamNegotiator,
        profile: &CodecProfile,
    ) -> Result<Self>
    where
        F: Fn(&FileId) -> Option<PathBuf>,
    {
        if files.is_empty() {
            return Err(AppError::EmptyTimeline {
                book_id: book_id.to_string(),
            });
        }

        let mut sources = Vec::with_capacity(files.len());
        for file in files {
            match resolve_local_path(&file.id) {
                Some(path) => {
                    let url = direct_stream_url(base_url, book_id, &file.id);
                    sources.push((file, url, Some(path)));
                }
                None => {
                    let prepared = negotiator
                        .negotiate(base_url, book_id, &file.id, profile)
                        .await;
                    sources.push((file, prepared.stream_url, None));
                }
            }
        }

        Self::assemble(book_id, sources)
    }

    fn assemble(
        book_id: &BookId,
        sources: Vec<(&AudioFile, String, Option<PathBuf>)>,
    ) -> Result<Self> {
        if sources.is_empty() {
            return Err(AppError::EmptyTimeline {
                book_id: book_id.to_string(),
            });
        }

        let mut offset_ms = 0u64;
        let segments: Vec<AudioSegment> = sources
            .into_iter()
            .map(|(file, source_url, local_path)| {
                let segment = AudioSegment {
                    file_id: file.id.clone(),
                    source_url,
                    local_path,
                    duration_ms: file.duration_ms,
                    offset_ms,
                };
                offset_ms = offset_ms.saturating_add(file.duration_ms);
                segment
            })
            .collect();

        let is_fully_downloaded = segments.iter().all(AudioSegment::is_local);

        Ok(Self {
            book_id: book_id.clone(),
            segments,
            total_duration_ms: offset_ms,
            is_fully_downloaded,
        })
    }

    pub fn book_id(&self) -> &BookId {
        &self.book_id
    }

    pub fn segments(&self) -> &[AudioSegment] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> Option<&AudioSegment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; kept for the `len` convention
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.total_duration_ms
    }

    pub fn is_fully_downloaded(&self) -> bool {
        self.is_fully_downloaded
    }

    pub fn local_segment_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_local()).count()
    }

    /// Clamps a book position into `[0, total_duration_ms]`
    pub fn clamp(&self, position_ms: i64) -> u64 {
        u64::try_from(position_ms)
            .unwrap_or(0)
            .min(self.total_duration_ms)
    }

    /// Maps a book-relative position to a segment and an offset inside it
    ///
    /// Out-of-range input is clamped; `total_duration_ms` resolves to the end
    /// of the last segment.
    pub fn resolve(&self, position_ms: i64) -> ResolvedPosition {
        let position = self.clamp(position_ms);
        let last = self.segments.len() - 1;

        // First segment whose end lies beyond the position
        let index = self
            .segments
            .partition_point(|s| s.end_ms() <= position)
            .min(last);
        let segment = &self.segments[index];

        ResolvedPosition {
            segment_index: index,
            position_in_segment_ms: (position - segment.offset_ms).min(segment.duration_ms),
        }
    }

    /// Inverse of [`resolve`](Self::resolve): segment-local position to book position
    pub fn book_position(&self, segment_index: usize, position_in_segment_ms: u64) -> u64 {
        let segment = &self.segments[segment_index.min(self.segments.len() - 1)];
        segment.offset_ms + position_in_segment_ms.min(segment.duration_ms)
    }

    /// Index of the segment whose local file is `path`
    pub fn segment_for_path(&self, path: &Path) -> Option<usize> {
        self.segments
            .iter()
            .position(|s| s.local_path.as_deref() == Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://abs.example.com";

    fn files(durations: &[u64]) -> Vec<AudioFile> {
        durations
            .iter()
            .enumerate()
            .map(|(i, d)| AudioFile::new(format!("f{}", i), format!("part{}.mp3", i), *d))
            .collect()
    }

    fn remote(durations: &[u64]) -> PlaybackTimeline {
        PlaybackTimeline::build_local(&BookId::from("b1"), &files(durations), BASE, |_| None)
            .expect("non-empty timeline")
    }

    #[test]
    fn test_offsets_are_running_sums() {
        let durations = [600_000, 0, 300_000, 900_000, 1];
        let timeline = remote(&durations);

        let mut expected = 0;
        for (segment, duration) in timeline.segments().iter().zip(durations) {
            assert_eq!(segment.offset_ms, expected);
            expected += duration;
        }
        assert_eq!(timeline.total_duration_ms(), expected);
    }

    #[test]
    fn test_three_file_scenario() {
        let timeline = remote(&[600_000, 300_000, 900_000]);
        assert_eq!(timeline.total_duration_ms(), 1_800_000);
        assert_eq!(
            timeline.resolve(650_000),
            ResolvedPosition {
                segment_index: 1,
                position_in_segment_ms: 50_000
            }
        );
    }

    #[test]
    fn test_resolve_boundaries() {
        let timeline = remote(&[1_000, 2_000]);

        assert_eq!(timeline.resolve(999).segment_index, 0);
        assert_eq!(
            timeline.resolve(1_000),
            ResolvedPosition {
                segment_index: 1,
                position_in_segment_ms: 0
            }
        );
        assert_eq!(
            timeline.resolve(3_000),
            ResolvedPosition {
                segment_index: 1,
                position_in_segment_ms: 2_000
            }
        );
    }

    #[test]
    fn test_resolve_clamps() {
        let timeline = remote(&[1_000, 2_000]);
        assert_eq!(timeline.resolve(-100), timeline.resolve(0));
        assert_eq!(timeline.resolve(4_000), timeline.resolve(3_000));
        assert_eq!(timeline.resolve(i64::MIN), timeline.resolve(0));
        assert_eq!(timeline.resolve(i64::MAX), timeline.resolve(3_000));
    }

    #[test]
    fn test_every_position_lands_inside_its_segment() {
        let timeline = remote(&[7, 0, 13, 1, 0, 5]);
        for p in 0..=timeline.total_duration_ms() {
            let resolved = timeline.resolve(p as i64);
            let segment = &timeline.segments()[resolved.segment_index];
            assert!(resolved.position_in_segment_ms <= segment.duration_ms);
            assert_eq!(segment.offset_ms + resolved.position_in_segment_ms, p);
            if p < timeline.total_duration_ms() {
                assert!(p < segment.end_ms(), "position {} not inside segment", p);
            }
        }
    }

    #[test]
    fn test_zero_length_book() {
        let timeline = remote(&[0, 0]);
        assert_eq!(timeline.total_duration_ms(), 0);
        assert_eq!(
            timeline.resolve(500),
            ResolvedPosition {
                segment_index: 1,
                position_in_segment_ms: 0
            }
        );
    }

    #[test]
    fn test_book_position_inverts_resolve() {
        let timeline = remote(&[600_000, 300_000, 900_000]);
        let resolved = timeline.resolve(1_234_567);
        assert_eq!(
            timeline.book_position(resolved.segment_index, resolved.position_in_segment_ms),
            1_234_567
        );
        // Engine reporting past the end of a file
        assert_eq!(timeline.book_position(0, 700_000), 600_000);
        assert_eq!(timeline.book_position(9, 0), 900_000);
    }

    #[test]
    fn test_empty_file_list_fails() {
        let result = PlaybackTimeline::build_local(&BookId::from("b1"), &[], BASE, |_| None);
        assert!(matches!(result, Err(AppError::EmptyTimeline { .. })));
    }

    #[test]
    fn test_local_paths_take_precedence() {
        let timeline = PlaybackTimeline::build_local(
            &BookId::from("b1"),
            &files(&[10, 20]),
            "https://abs.example.com/",
            |id| (id.as_str() == "f0").then(|| PathBuf::from("/cache/f0.mp3")),
        )
        .expect("timeline");

        assert!(!timeline.is_fully_downloaded());
        assert_eq!(timeline.local_segment_count(), 1);
        assert_eq!(timeline.segments()[0].playable_source(), "/cache/f0.mp3");
        assert_eq!(
            timeline.segments()[1].playable_source(),
            "https://abs.example.com/books/b1/audio/f1"
        );
        assert_eq!(
            timeline.segment_for_path(Path::new("/cache/f0.mp3")),
            Some(0)
        );
    }

    #[test]
    fn test_fully_downloaded() {
        let timeline = PlaybackTimeline::build_local(
            &BookId::from("b1"),
            &files(&[10, 20]),
            BASE,
            |id| Some(PathBuf::from(format!("/cache/{}", id))),
        )
        .expect("timeline");
        assert!(timeline.is_fully_downloaded());
    }
}
