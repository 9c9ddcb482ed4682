//! `Buffer`: a bounded FIFO that batches an item's rows until it fills,
//! keeping the generation pipeline's memory footprint flat regardless of
//! how many rows an item ultimately produces.

use std::collections::HashMap;

use crate::value::Value;

pub type GeneratedRow = HashMap<String, Value>;

/// Buffers rows for one item until `capacity` is reached, then hands the
/// batch back to the caller to write and clears itself. The caller
/// (`Blueprint`) is responsible for writing the batch to the backend,
/// back-propagating returned ids, and running the item's post-write
/// cascade — the buffer itself only knows about batching.
pub struct Buffer {
    capacity: usize,
    rows: Vec<GeneratedRow>,
}

impl Buffer {
    pub fn new(capacity: usize) -> Self {
        Buffer {
            capacity: capacity.max(1),
            rows: Vec::new(),
        }
    }

    /// Adds a row to the buffer. Returns `Some(batch)` when the buffer
    /// just reached capacity, draining it; otherwise `None`.
    pub fn push(&mut self, row: GeneratedRow) -> Option<Vec<GeneratedRow>> {
        self.rows.push(row);
        if self.rows.len() >= self.capacity {
            Some(std::mem::take(&mut self.rows))
        } else {
            None
        }
    }

    /// Drains whatever's left, for the final partial batch at the end of
    /// an item's generation run.
    pub fn drain(&mut self) -> Vec<GeneratedRow> {
        std::mem::take(&mut self.rows)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flushes_at_capacity() {
        let mut buffer = Buffer::new(2);
        assert!(buffer.push(GeneratedRow::new()).is_none());
        let batch = buffer.push(GeneratedRow::new());
        assert_eq!(batch.map(|b| b.len()), Some(2));
        assert!(buffer.is_empty());
    }

    #[test]
    fn drain_returns_partial_batch() {
        let mut buffer = Buffer::new(10);
        buffer.push(GeneratedRow::new());
        buffer.push(GeneratedRow::new());
        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert!(buffer.is_empty());
    }
}
