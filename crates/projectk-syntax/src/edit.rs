//! Edit bookkeeping between parses.
//!
//! Edits arrive one at a time, each in the coordinates of the text produced
//! by the edits before it. [`Damage`] folds them into a single region of the
//! previously parsed text, as long as they stay contiguous.

/// One changed region: `start..old_end` of the old text became
/// `start..new_end` of the new text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextEdit {
    /// First changed byte (same in old and new text).
    pub start: usize,
    /// End of the replaced bytes in the old text.
    pub old_end: usize,
    /// End of the inserted bytes in the new text.
    pub new_end: usize,
}

impl TextEdit {
    /// Replace `start..end` with `inserted` bytes.
    #[must_use]
    pub const fn replace(start: usize, end: usize, inserted: usize) -> Self {
        Self {
            start,
            old_end: end,
            new_end: start + inserted,
        }
    }

    /// How much the text after the edit moved.
    #[must_use]
    pub const fn delta(&self) -> isize {
        self.new_end as isize - self.old_end as isize
    }
}

/// Accumulated changes since the last parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Damage {
    /// Nothing changed.
    #[default]
    Clean,
    /// All changes fall inside one region.
    Region(TextEdit),
    /// Changes are scattered, or the whole text was replaced.
    Full,
}

impl Damage {
    /// Record `start..end` (current coordinates) replaced by `inserted` bytes.
    pub fn record(&mut self, start: usize, end: usize, inserted: usize) {
        *self = match *self {
            Self::Clean => Self::Region(TextEdit::replace(start, end, inserted)),
            Self::Region(region) => merge(region, start, end, inserted),
            Self::Full => Self::Full,
        };
    }

    /// Record a whole-text replacement.
    pub fn record_full(&mut self) {
        *self = Self::Full;
    }

    /// Whether anything changed.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

/// `region` is expressed in the current text as `start..new_end`.
fn merge(region: TextEdit, start: usize, end: usize, inserted: usize) -> Damage {
    if start > region.new_end || end < region.start {
        return Damage::Full;
    }
    let old_end = if end > region.new_end {
        region.old_end + (end - region.new_end)
    } else {
        region.old_end
    };
    let new_end = region.new_end.max(end) - (end - start) + inserted;
    Damage::Region(TextEdit {
        start: region.start.min(start),
        old_end,
        new_end,
    })
}
