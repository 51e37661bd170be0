//! Fixed-capacity batching of normalized codes

use crate::source::{coupon_key, SourceTag};

/// A sealed group of codes from one file, written with a single bulk insert
///
/// Owns its codes outright; nothing can change them once the builder hands the
/// batch off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    file_tag: SourceTag,
    sequence: u64,
    codes: Vec<String>,
}

impl Batch {
    pub fn file_tag(&self) -> SourceTag {
        self.file_tag
    }

    /// 1-based position of this batch within its file
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// Storage keys (`code-tag`) for every record, in file order
    pub fn stored_keys(&self) -> Vec<String> {
        self.codes
            .iter()
            .map(|code| coupon_key(code, self.file_tag))
            .collect()
    }
}

/// Accumulates codes for one file and seals a [`Batch`] every `capacity` records
#[derive(Debug)]
pub struct BatchBuilder {
    file_tag: SourceTag,
    capacity: usize,
    next_sequence: u64,
    pending: Vec<String>,
}

impl BatchBuilder {
    pub fn new(file_tag: SourceTag, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            file_tag,
            capacity,
            next_sequence: 1,
            pending: Vec::with_capacity(capacity),
        }
    }

    /// Add a code; returns the sealed batch when this code fills it
    pub fn append(&mut self, code: impl Into<String>) -> Option<Batch> {
        self.pending.push(code.into());
        if self.pending.len() >= self.capacity {
            let next = Vec::with_capacity(self.capacity);
            Some(self.seal(next))
        } else {
            None
        }
    }

    /// Seal whatever is pending at end of input
    pub fn flush(&mut self) -> Option<Batch> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.seal(Vec::new()))
        }
    }

    /// Batches sealed so far
    pub fn sealed(&self) -> u64 {
        self.next_sequence - 1
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn seal(&mut self, next: Vec<String>) -> Batch {
        let codes = std::mem::replace(&mut self.pending, next);
        let batch = Batch {
            file_tag: self.file_tag,
            sequence: self.next_sequence,
            codes,
        };
        self.next_sequence += 1;
        batch
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn build_all(n: usize, capacity: usize) -> Vec<Batch> {
        let mut builder = BatchBuilder::new(1, capacity);
        let mut out: Vec<Batch> = (0..n)
            .filter_map(|i| builder.append(format!("code{}", i)))
            .collect();
        out.extend(builder.flush());
        out
    }

    #[test]
    fn test_batch_count_is_ceiling() {
        for (n, cap) in [(0, 3), (1, 3), (3, 3), (7, 3), (9, 3), (10, 1), (250, 100)] {
            let batches = build_all(n, cap);
            assert_eq!(batches.len(), n.div_ceil(cap), "n={} cap={}", n, cap);
            assert_eq!(batches.iter().map(Batch::len).sum::<usize>(), n);
        }
    }

    #[test]
    fn test_last_batch_holds_remainder() {
        let batches = build_all(7, 3);
        assert_eq!(batches.last().unwrap().len(), 1);

        let even = build_all(9, 3);
        assert_eq!(even.last().unwrap().len(), 3);
    }

    #[test]
    fn test_sequence_numbers_start_at_one() {
        let batches = build_all(10, 4);
        let seqs: Vec<u64> = batches.iter().map(Batch::sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn test_flush_empty_produces_nothing() {
        let mut builder = BatchBuilder::new(2, 5);
        assert!(builder.flush().is_none());
        assert_eq!(builder.sealed(), 0);
    }

    #[test]
    fn test_flush_after_full_batch_produces_nothing() {
        let mut builder = BatchBuilder::new(2, 2);
        assert!(builder.append("a").is_none());
        assert!(builder.append("b").is_some());
        assert!(builder.flush().is_none());
        assert_eq!(builder.sealed(), 1);
    }

    #[test]
    fn test_sealed_batch_unaffected_by_later_appends() {
        let mut builder = BatchBuilder::new(3, 2);
        builder.append("first");
        let sealed = builder.append("second").unwrap();
        builder.append("third");

        assert_eq!(sealed.codes(), &["first".to_string(), "second".to_string()]);
        assert_eq!(builder.pending(), 1);
    }

    #[test]
    fn test_stored_keys_carry_file_tag() {
        let mut builder = BatchBuilder::new(3, 10);
        builder.append("abc12345");
        builder.append("abc12345");
        let batch = builder.flush().unwrap();

        assert_eq!(batch.file_tag(), 3);
        assert_eq!(batch.stored_keys(), vec!["abc12345-3", "abc12345-3"]);
    }
}
