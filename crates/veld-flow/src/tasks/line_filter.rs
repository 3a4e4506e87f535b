//! Streaming line-level prefilter.
//!
//! The daily CSV listings run to millions of rows, of which only the
//! configured grid zones matter. Filtering whole lines against a zone
//! pattern before CSV parsing skips the parser for the irrelevant bulk;
//! this wrapper sits between the gzip reader and the CSV reader so the
//! listing is still processed in one streaming pass.

use std::io::{BufRead, Read};

use regex::Regex;

/// A reader yielding only the lines of its source that match a pattern.
pub struct LineFilter<R> {
    source: R,
    pattern: Regex,
    pending: Vec<u8>,
    pos: usize,
}

impl<R: BufRead> LineFilter<R> {
    /// Wraps a buffered reader with a line pattern.
    pub fn new(source: R, pattern: Regex) -> Self {
        Self {
            source,
            pattern,
            pending: Vec::new(),
            pos: 0,
        }
    }
}

impl<R: BufRead> Read for LineFilter<R> {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        loop {
            if self.pos < self.pending.len() {
                let n = out.len().min(self.pending.len() - self.pos);
                out[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }

            let mut line = String::new();
            if self.source.read_line(&mut line)? == 0 {
                return Ok(0);
            }
            if self.pattern.is_match(&line) {
                self.pending = line.into_bytes();
                self.pos = 0;
            }
        }
    }
}

/// Builds the zone prefilter pattern: `(_<zone1>)|(_<zone2>)|...`.
///
/// An empty zone list yields a match-everything pattern, leaving filtering
/// entirely to row validation.
///
/// # Errors
///
/// Returns a regex build error only for pathological zone strings.
pub fn zone_line_pattern(zones: &[String]) -> Result<Regex, regex::Error> {
    if zones.is_empty() {
        return Regex::new("");
    }
    let alternatives: Vec<String> = zones
        .iter()
        .map(|zone| format!("(_{})", regex::escape(zone)))
        .collect();
    Regex::new(&alternatives.join("|"))
}
