//! Mark patches

use super::burst::Burst;
use crate::error::Result;
use crate::span::validate_range;
use serde_json::Value;

impl Burst<'_> {
    /// Set mark `name` to `value` over flat `[start, end)`; null removes it
    ///
    /// The range is checked before any inline is touched. Marker positions
    /// inside the range carry no text and are passed over.
    pub(super) fn mark(&mut self, name: &str, value: &Value, start: usize, end: usize) -> Result<()> {
        self.tree.refresh_index();
        validate_range(start, end, self.tree.flat_len())?;
        let value = self.codec.decode(name, value);

        let mut slot = self.tree.entry_at_or_before(start);
        while slot < self.tree.text_blocks().len() && self.tree.entry_start(slot) < end {
            let content_start = self.tree.content_start(slot);
            let from = start.max(content_start);
            let to = end.min(self.tree.content_end(slot));
            if from < to {
                let block = self.tree.text_blocks()[slot];
                self.tree
                    .apply_mark(block, from - content_start, to - content_start, name, &value)?;
            }
            slot += 1;
        }
        Ok(())
    }
}
