//! Character-ratio token heuristic.
//!
//! Latin text averages about four characters per token and CJK ideographs
//! about one and a half. Every character that is not a CJK ideograph is
//! counted at the Latin rate.

use std::time::Instant;

use crate::error::{Result, TokenError};

/// Characters per token for ASCII/Latin and everything else.
pub const ASCII_CHARS_PER_TOKEN: f64 = 4.0;

/// Characters per token for CJK ideographs.
pub const CJK_CHARS_PER_TOKEN: f64 = 1.5;

/// Characters scanned between deadline checks.
const DEADLINE_CHECK_INTERVAL: usize = 4096;

/// Character class counts for a text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharCounts {
    /// Non-CJK characters
    pub ascii: usize,
    /// CJK ideographs
    pub cjk: usize,
}

impl CharCounts {
    fn tally(&mut self, c: char) {
        if is_cjk_ideograph(c) {
            self.cjk += 1;
        } else {
            self.ascii += 1;
        }
    }

    /// Total characters.
    pub fn total(&self) -> usize {
        self.ascii + self.cjk
    }

    /// Token estimate: `floor(ascii/4 + cjk/1.5)`, at least 1 for non-empty text.
    pub fn estimate_tokens(&self) -> usize {
        if self.total() == 0 {
            return 0;
        }
        let estimate =
            self.ascii as f64 / ASCII_CHARS_PER_TOKEN + self.cjk as f64 / CJK_CHARS_PER_TOKEN;
        (estimate.floor() as usize).max(1)
    }

    /// Tokens the heuristic attributes to CJK text alone.
    pub fn cjk_tokens(&self) -> usize {
        (self.cjk as f64 / CJK_CHARS_PER_TOKEN).floor() as usize
    }
}

/// Whether `c` is a CJK unified or compatibility ideograph.
pub fn is_cjk_ideograph(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF
            | 0x3400..=0x4DBF
            | 0x20000..=0x2EBEF
            | 0xF900..=0xFAFF
            | 0x2F800..=0x2FA1F
    )
}

/// Classify every character of `text`.
///
/// When a deadline is given it is checked every few thousand characters and
/// the scan stops with [`TokenError::Timeout`] once it has passed.
pub fn count_chars(text: &str, deadline: Option<Deadline>) -> Result<CharCounts> {
    let mut counts = CharCounts::default();

    for (i, c) in text.chars().enumerate() {
        if i % DEADLINE_CHECK_INTERVAL == DEADLINE_CHECK_INTERVAL - 1 {
            if let Some(deadline) = deadline {
                deadline.check()?;
            }
        }
        counts.tally(c);
    }

    Ok(counts)
}

/// Estimate tokens for `text` with no deadline.
pub fn estimate_tokens(text: &str) -> usize {
    let mut counts = CharCounts::default();
    text.chars().for_each(|c| counts.tally(c));
    counts.estimate_tokens()
}

/// Point in time after which a calculation must stop.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: std::time::Duration,
}

impl Deadline {
    /// Start a deadline of `limit` from now.
    pub fn after(limit: std::time::Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    /// Fail with [`TokenError::Timeout`] once the limit has elapsed.
    pub fn check(&self) -> Result<()> {
        if self.started.elapsed() > self.limit {
            Err(TokenError::Timeout { limit: self.limit })
        } else {
            Ok(())
        }
    }
}
