//! Chapter lookup and navigation

use earshot_core::Chapter;

/// Chapters of one book, sorted by start
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterList {
    chapters: Vec<Chapter>,
}

impl ChapterList {
    /// Creates a chapter list, sorting the chapters by start time
    pub fn new(mut chapters: Vec<Chapter>) -> Self {
        chapters.sort_by_key(|ch| ch.start_ms);
        Self { chapters }
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Chapter> {
        self.chapters.get(index)
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Index of the chapter containing `position_ms`
    ///
    /// Positions in a gap between chapters belong to the chapter before the gap.
    pub fn index_at(&self, position_ms: u64) -> Option<usize> {
        let after = self.chapters.partition_point(|ch| ch.start_ms <= position_ms);
        let index = after.checked_sub(1)?;
        let chapter = &self.chapters[index];

        // Past the last chapter's end there is no chapter
        if index == self.chapters.len() - 1 && position_ms >= chapter.end_ms {
            return None;
        }
        Some(index)
    }

    pub fn chapter_at(&self, position_ms: u64) -> Option<&Chapter> {
        self.index_at(position_ms).and_then(|i| self.chapters.get(i))
    }

    /// End of the chapter playing at `position_ms`
    pub fn chapter_end_after(&self, position_ms: u64) -> Option<u64> {
        self.chapter_at(position_ms).map(|ch| ch.end_ms)
    }

    /// Chapter following the one at `position_ms`
    pub fn next(&self, position_ms: u64) -> Option<&Chapter> {
        match self.index_at(position_ms) {
            Some(index) => self.chapters.get(index + 1),
            None => self.chapters.first().filter(|ch| ch.start_ms > position_ms),
        }
    }

    /// Chapter before the one at `position_ms`
    pub fn previous(&self, position_ms: u64) -> Option<&Chapter> {
        let index = self.index_at(position_ms)?;
        index.checked_sub(1).and_then(|i| self.chapters.get(i))
    }

    /// Display label such as "3/15"
    pub fn progress_label(&self, position_ms: u64) -> String {
        match self.index_at(position_ms) {
            Some(index) => format!("{}/{}", index + 1, self.len()),
            None if self.is_empty() => "No chapters".to_string(),
            None => format!("?/{}", self.len()),
        }
    }
}
