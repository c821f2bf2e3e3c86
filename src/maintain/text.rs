//! Character-level patches: splice and flat deletes

use super::burst::Burst;
use crate::error::{Result, SyncError};
use crate::span::MarkSet;

impl Burst<'_> {
    /// Fail unless `offset` addresses a position in the current document;
    /// returns the flat length
    pub(super) fn check_offset(&mut self, offset: usize) -> Result<usize> {
        self.tree.refresh_index();
        let length = self.tree.flat_len();
        if offset > length {
            return Err(SyncError::PositionOutOfRange { offset, length });
        }
        Ok(length)
    }

    pub(super) fn splice(
        &mut self,
        index: usize,
        delete_count: usize,
        value: &str,
        marks: &MarkSet,
    ) -> Result<()> {
        self.check_offset(index)?;
        self.delete_items(index, delete_count)?;
        self.insert_text_at(index, value, marks)
    }

    /// Insert characters at flat offset `offset`
    ///
    /// Text landing before the first marker of a document that starts with
    /// one opens the implicit leading block.
    pub(super) fn insert_text_at(&mut self, offset: usize, text: &str, marks: &MarkSet) -> Result<()> {
        self.check_offset(offset)?;
        if text.is_empty() {
            return Ok(());
        }

        let slot = match self.tree.entry_for_content(offset) {
            Some(slot) => slot,
            None => {
                self.open_leading_implicit();
                self.tree.refresh_index();
                0
            }
        };
        let local = offset - self.tree.content_start(slot);
        let block = self.tree.text_blocks()[slot];
        self.tree.insert_text(block, local, text, marks)
    }

    /// Remove `count` flat items starting at `offset`
    ///
    /// Items are characters or block markers; a removed marker merges its
    /// text into the preceding text block.
    pub(super) fn delete_items(&mut self, offset: usize, count: usize) -> Result<()> {
        let length = self.check_offset(offset)?;
        if offset.checked_add(count).filter(|end| *end <= length).is_none() {
            return Err(SyncError::PositionOutOfRange {
                offset: offset.saturating_add(count),
                length,
            });
        }
        if count == 0 {
            return Ok(());
        }

        let mut remaining = count;
        while remaining > 0 {
            self.tree.refresh_index();
            if let Some(slot) = self.tree.entry_with_marker(offset) {
                self.remove_marker(slot)?;
                remaining -= 1;
                continue;
            }

            let slot = self
                .tree
                .entry_for_content(offset)
                .ok_or(SyncError::NoBlockAt { offset })?;
            let local = offset - self.tree.content_start(slot);
            let block = self.tree.text_blocks()[slot];
            let available = self.tree.block_ref(block)?.text_len() - local;
            if available == 0 {
                return Err(SyncError::PositionOutOfRange { offset, length });
            }
            let n = available.min(remaining);
            self.tree.delete_text(block, local, n)?;
            remaining -= n;
        }
        Ok(())
    }
}
