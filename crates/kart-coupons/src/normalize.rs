//! Raw line to coupon code

use crate::config::DEFAULT_MAX_CODE_LEN;

/// Turns one raw input line into a code token, or nothing for blank lines
#[derive(Debug, Clone, Copy)]
pub struct LineNormalizer {
    max_len: usize,
}

impl Default for LineNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CODE_LEN)
    }
}

impl LineNormalizer {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Trim the line and cut it to at most `max_len` characters.
    ///
    /// Returns `None` when nothing but whitespace remains. The character set is
    /// not checked; truncation counts characters, so the result is always valid UTF-8.
    pub fn normalize<'a>(&self, line: &'a str) -> Option<&'a str> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        match trimmed.char_indices().nth(self.max_len) {
            Some((cut, _)) => Some(&trimmed[..cut]),
            None => Some(trimmed),
        }
    }
}
