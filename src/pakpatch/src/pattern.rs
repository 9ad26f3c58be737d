//! Byte patterns and ordered replacement sets.
//!
//! A [`PatternSet`] is built from operator-supplied identifier pairs, either
//! by resolving names through an index ([`PatternSet::from_resolved`],
//! [`PatternSet::from_remote`]) or by decoding the input as literal hex
//! ([`PatternSet::from_literal_hex`]). Pairs that cannot be resolved or
//! decoded are reported as [`SkippedPair`]s and never abort the build.
//!
//! Pairs are applied strictly in order. A later pair sees the bytes produced
//! by earlier pairs, so `AA→BB` followed by `BB→CC` turns `AA` into `CC`.

use memchr::memmem;
use std::fmt;
use thiserror::Error;
use tracing::warn;

use crate::index::{RemoteTable, Resolve, ResolveError};

/// Line that ends operator pair input
pub const SENTINEL: &str = "q";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatternError {
    #[error("empty hex string")]
    Empty,

    #[error("invalid hex '{input}': {source}")]
    InvalidHex {
        input: String,
        #[source]
        source: hex::FromHexError,
    },
}

/// A non-empty byte sequence decoded from hex
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BytePattern(Vec<u8>);

impl BytePattern {
    /// Decode a hex string (surrounding whitespace is ignored)
    pub fn from_hex(input: &str) -> Result<Self, PatternError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PatternError::Empty);
        }

        let bytes = hex::decode(trimmed).map_err(|source| PatternError::InvalidHex {
            input: trimmed.to_string(),
            source,
        })?;

        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check whether the pattern occurs anywhere in `data`
    pub fn occurs_in(&self, data: &[u8]) -> bool {
        memmem::find(data, &self.0).is_some()
    }
}

impl fmt::Display for BytePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(&self.0))
    }
}

/// Replace every non-overlapping occurrence of `search` in `data`
///
/// Returns the rewritten buffer and the number of replacements, or `None`
/// when `search` does not occur (including when it is empty).
pub fn replace_all(data: &[u8], search: &[u8], replace: &[u8]) -> Option<(Vec<u8>, usize)> {
    if search.is_empty() {
        return None;
    }

    let finder = memmem::Finder::new(search);
    let mut out: Option<Vec<u8>> = None;
    let mut last = 0;
    let mut count = 0;

    for pos in finder.find_iter(data) {
        let buf = out.get_or_insert_with(|| Vec::with_capacity(data.len()));
        buf.extend_from_slice(&data[last..pos]);
        buf.extend_from_slice(replace);
        last = pos + search.len();
        count += 1;
    }

    let mut buf = out?;
    buf.extend_from_slice(&data[last..]);
    Some((buf, count))
}

/// A single search/replace pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementPair {
    pub search: BytePattern,
    pub replace: BytePattern,
    /// Pair only applies to buffers containing these bytes
    pub guard: Option<BytePattern>,
    /// Operator-facing description, e.g. `A ►► B`
    pub label: String,
}

impl ReplacementPair {
    pub fn new(search: BytePattern, replace: BytePattern) -> Self {
        let label = format!("{} ►► {}", search, replace);
        Self {
            search,
            replace,
            guard: None,
            label,
        }
    }

    pub fn with_guard(mut self, guard: Option<BytePattern>) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Apply to a buffer in place, returning the number of replacements
    pub fn apply(&self, data: &mut Vec<u8>) -> usize {
        if let Some(guard) = &self.guard {
            if !guard.occurs_in(data) {
                return 0;
            }
        }

        match replace_all(data, self.search.as_bytes(), self.replace.as_bytes()) {
            Some((replaced, count)) => {
                *data = replaced;
                count
            }
            None => 0,
        }
    }
}

impl fmt::Display for ReplacementPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Two operator-supplied identifiers (names or hex) forming one pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierPair {
    pub left: String,
    pub right: String,
}

impl IdentifierPair {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

impl fmt::Display for IdentifierPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.left, self.right)
    }
}

/// Why a pair was left out of a [`PatternSet`]
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Input line is not two comma-separated fields
    Malformed,
    /// Identifier not present in the index
    NotFound(String),
    /// Identifier or resolved value is not valid hex
    Decode(PatternError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Malformed => f.write_str("expected two comma-separated values"),
            SkipReason::NotFound(id) => write!(f, "'{}' was not found in the index", id),
            SkipReason::Decode(err) => write!(f, "{}", err),
        }
    }
}

impl From<ResolveError> for SkipReason {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(id) => SkipReason::NotFound(id),
            ResolveError::Decode { source, .. } => SkipReason::Decode(source),
        }
    }
}

impl From<PatternError> for SkipReason {
    fn from(err: PatternError) -> Self {
        SkipReason::Decode(err)
    }
}

/// A pair that was skipped, with its 1-based position in the input
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPair {
    pub position: usize,
    pub entry: String,
    pub reason: SkipReason,
}

impl fmt::Display for SkippedPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pair {} ({}): {}", self.position, self.entry, self.reason)
    }
}

/// Parsed operator input
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PairInput {
    pub pairs: Vec<IdentifierPair>,
    pub skipped: Vec<SkippedPair>,
    /// Whether the sentinel line was seen
    pub terminated: bool,
}

/// Parse a single `A,B` line
pub fn parse_pair_line(line: &str) -> Option<IdentifierPair> {
    let mut fields = line.trim().split(',');
    let left = fields.next()?.trim();
    let right = fields.next()?.trim();

    if fields.next().is_some() || left.is_empty() || right.is_empty() {
        return None;
    }

    Some(IdentifierPair::new(left, right))
}

/// Parse operator lines up to the `q` sentinel
///
/// Blank lines are ignored. Malformed lines are reported in
/// [`PairInput::skipped`] and do not stop parsing.
pub fn parse_pair_lines<I, S>(lines: I) -> PairInput
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut input = PairInput::default();
    let mut position = 0;

    for line in lines {
        let line = line.as_ref().trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case(SENTINEL) {
            input.terminated = true;
            break;
        }

        position += 1;
        match parse_pair_line(line) {
            Some(pair) => input.pairs.push(pair),
            None => {
                warn!("Skipping malformed pair line {}: {:?}", position, line);
                input.skipped.push(SkippedPair {
                    position,
                    entry: line.to_string(),
                    reason: SkipReason::Malformed,
                });
            }
        }
    }

    input
}

/// Per-pair replacement counts from one [`PatternSet::apply`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyStats {
    pub per_pair: Vec<usize>,
}

impl ApplyStats {
    pub fn total(&self) -> usize {
        self.per_pair.iter().sum()
    }

    pub fn changed(&self) -> bool {
        self.total() > 0
    }
}

/// Ordered collection of replacement pairs
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PatternSet {
    pairs: Vec<ReplacementPair>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pair: ReplacementPair) {
        self.pairs.push(pair);
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReplacementPair> {
        self.pairs.iter()
    }

    /// Decode both sides of every pair as literal hex
    pub fn from_literal_hex(pairs: &[IdentifierPair]) -> (Self, Vec<SkippedPair>) {
        Self::build(pairs, |pair| {
            let search = BytePattern::from_hex(&pair.left)?;
            let replace = BytePattern::from_hex(&pair.right)?;
            Ok(ReplacementPair::new(search, replace))
        })
    }

    /// Resolve both sides through an index
    ///
    /// The left identifier doubles as the pair's guard when it is itself
    /// valid hex, so the pair only touches files containing that key.
    pub fn from_resolved<R: Resolve + ?Sized>(
        pairs: &[IdentifierPair],
        index: &R,
    ) -> (Self, Vec<SkippedPair>) {
        Self::build(pairs, |pair| {
            let search = index.resolve_pattern(&pair.left)?;
            let replace = index.resolve_pattern(&pair.right)?;
            let guard = BytePattern::from_hex(&pair.left).ok();
            Ok(ReplacementPair::new(search, replace)
                .with_guard(guard)
                .with_label(format!("{} ►► {}", pair.left, pair.right)))
        })
    }

    /// Resolve left names in `source` and right names in `replacement`
    pub fn from_remote(
        pairs: &[IdentifierPair],
        source: &RemoteTable,
        replacement: &RemoteTable,
    ) -> (Self, Vec<SkippedPair>) {
        Self::build(pairs, |pair| {
            let search = source.resolve_pattern(&pair.left)?;
            let replace = replacement.resolve_pattern(&pair.right)?;
            Ok(ReplacementPair::new(search, replace)
                .with_label(format!("{} ►► {}", pair.left, pair.right)))
        })
    }

    fn build<F>(pairs: &[IdentifierPair], mut make: F) -> (Self, Vec<SkippedPair>)
    where
        F: FnMut(&IdentifierPair) -> Result<ReplacementPair, SkipReason>,
    {
        let mut set = Self::new();
        let mut skipped = Vec::new();

        for (i, pair) in pairs.iter().enumerate() {
            match make(pair) {
                Ok(replacement) => set.push(replacement),
                Err(reason) => {
                    warn!("Skipping pair {} ({}): {}", i + 1, pair, reason);
                    skipped.push(SkippedPair {
                        position: i + 1,
                        entry: pair.to_string(),
                        reason,
                    });
                }
            }
        }

        (set, skipped)
    }

    /// Apply every pair in order to `data`
    pub fn apply(&self, data: &mut Vec<u8>) -> ApplyStats {
        ApplyStats {
            per_pair: self.pairs.iter().map(|pair| pair.apply(data)).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PatternSet {
    type Item = &'a ReplacementPair;
    type IntoIter = std::slice::Iter<'a, ReplacementPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

impl FromIterator<ReplacementPair> for PatternSet {
    fn from_iter<T: IntoIterator<Item = ReplacementPair>>(iter: T) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::LineTable;

    fn pat(s: &str) -> BytePattern {
        BytePattern::from_hex(s).unwrap()
    }

    fn count(data: &[u8], needle: &[u8]) -> usize {
        memmem::find_iter(data, needle).count()
    }

    #[test]
    fn test_from_hex_valid() {
        assert_eq!(pat("DEADbeef").as_bytes(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(pat("  0a0b \n").as_bytes(), &[0x0a, 0x0b]);
    }

    #[test]
    fn test_from_hex_rejects_odd_length() {
        let err = BytePattern::from_hex("ABC").unwrap_err();
        assert!(matches!(err, PatternError::InvalidHex { .. }));
    }

    #[test]
    fn test_from_hex_rejects_non_hex() {
        let err = BytePattern::from_hex("ZZ").unwrap_err();
        assert!(matches!(err, PatternError::InvalidHex { .. }));
    }

    #[test]
    fn test_from_hex_rejects_empty() {
        assert_eq!(BytePattern::from_hex("   ").unwrap_err(), PatternError::Empty);
    }

    #[test]
    fn test_display_is_upper_hex() {
        assert_eq!(pat("0aff").to_string(), "0AFF");
    }

    #[test]
    fn test_replace_all_every_occurrence() {
        let (out, n) = replace_all(b"abXabYab", b"ab", b"Q").unwrap();
        assert_eq!(out, b"QXQYQ");
        assert_eq!(n, 3);
    }

    #[test]
    fn test_replace_all_no_match() {
        assert!(replace_all(b"hello", b"xyz", b"Q").is_none());
        assert!(replace_all(b"hello", b"", b"Q").is_none());
    }

    #[test]
    fn test_replace_all_non_overlapping() {
        let (out, n) = replace_all(b"aaaa", b"aa", b"b").unwrap();
        assert_eq!(out, b"bb");
        assert_eq!(n, 2);
    }

    #[test]
    fn test_replace_changes_length() {
        let (out, _) = replace_all(&[1, 2, 3], &[2], &[9, 9, 9]).unwrap();
        assert_eq!(out, vec![1, 9, 9, 9, 3]);
    }

    #[test]
    fn test_pair_removes_search_and_counts_replace() {
        let data = b"\x01\x02\x00\x01\x02\x07\x01\x02".to_vec();
        let search = pat("0102");
        let replace = pat("FFEE");
        let before_search = count(&data, search.as_bytes());
        let before_replace = count(&data, replace.as_bytes());

        let mut buf = data.clone();
        let n = ReplacementPair::new(search.clone(), replace.clone()).apply(&mut buf);

        assert_eq!(n, before_search);
        assert_eq!(count(&buf, search.as_bytes()), 0);
        assert_eq!(count(&buf, replace.as_bytes()), before_replace + before_search);
    }

    #[test]
    fn test_deadbeef_scenario() {
        let set: PatternSet = [ReplacementPair::new(pat("DE"), pat("CA"))]
            .into_iter()
            .collect();
        let mut buf = vec![0xde, 0xad, 0xbe, 0xef];
        set.apply(&mut buf);
        assert_eq!(buf, vec![0xca, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_sequential_application() {
        let set: PatternSet = [
            ReplacementPair::new(pat("AA"), pat("BB")),
            ReplacementPair::new(pat("BB"), pat("CC")),
        ]
        .into_iter()
        .collect();

        let mut buf = vec![0xaa];
        let stats = set.apply(&mut buf);
        assert_eq!(buf, vec![0xcc]);
        assert_eq!(stats.per_pair, vec![1, 1]);
    }

    #[test]
    fn test_second_application_is_noop() {
        let set: PatternSet = [
            ReplacementPair::new(pat("1122"), pat("3344")),
            ReplacementPair::new(pat("55"), pat("66")),
        ]
        .into_iter()
        .collect();

        let mut buf = vec![0x11, 0x22, 0x55, 0x00, 0x11, 0x22];
        assert!(set.apply(&mut buf).changed());
        let once = buf.clone();

        let stats = set.apply(&mut buf);
        assert!(!stats.changed());
        assert_eq!(buf, once);
    }

    #[test]
    fn test_guard_blocks_pair() {
        let pair = ReplacementPair::new(pat("01"), pat("02")).with_guard(Some(pat("FFFF")));

        let mut without_guard = vec![0x01, 0x00];
        assert_eq!(pair.apply(&mut without_guard), 0);
        assert_eq!(without_guard, vec![0x01, 0x00]);

        let mut with_guard = vec![0x01, 0xff, 0xff];
        assert_eq!(pair.apply(&mut with_guard), 1);
        assert_eq!(with_guard, vec![0x02, 0xff, 0xff]);
    }

    #[test]
    fn test_parse_pair_line() {
        assert_eq!(
            parse_pair_line(" AABB , CCDD "),
            Some(IdentifierPair::new("AABB", "CCDD"))
        );
        assert_eq!(parse_pair_line("AABB"), None);
        assert_eq!(parse_pair_line("A,B,C"), None);
        assert_eq!(parse_pair_line("A,"), None);
    }

    #[test]
    fn test_parse_pair_lines_stops_at_sentinel() {
        let input = parse_pair_lines(["AA,BB", "", "bad", "CC,DD", "Q", "EE,FF"]);

        assert!(input.terminated);
        assert_eq!(
            input.pairs,
            vec![IdentifierPair::new("AA", "BB"), IdentifierPair::new("CC", "DD")]
        );
        assert_eq!(input.skipped.len(), 1);
        assert_eq!(input.skipped[0].position, 2);
        assert_eq!(input.skipped[0].reason, SkipReason::Malformed);
    }

    #[test]
    fn test_parse_pair_lines_without_sentinel() {
        let input = parse_pair_lines(["AA,BB"]);
        assert!(!input.terminated);
        assert_eq!(input.pairs.len(), 1);
    }

    #[test]
    fn test_literal_hex_skips_bad_pairs() {
        let pairs = vec![
            IdentifierPair::new("ABC", "00"),
            IdentifierPair::new("DE", "CA"),
            IdentifierPair::new("11", "XY"),
            IdentifierPair::new("AD", "BB"),
        ];

        let (set, skipped) = PatternSet::from_literal_hex(&pairs);
        assert_eq!(set.len(), 2);
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].position, 1);
        assert_eq!(skipped[1].position, 3);
        assert!(matches!(skipped[1].reason, SkipReason::Decode(_)));

        let mut buf = vec![0xde, 0xad, 0xbe, 0xef];
        set.apply(&mut buf);
        assert_eq!(buf, vec![0xca, 0xbb, 0xbe, 0xef]);
    }

    #[test]
    fn test_resolved_uses_index_and_guard() {
        let index = LineTable::parse(
            "Red Suit | 0A0B | index:AA11\n\
             Blue Suit | 0C0D | index:BB22\n",
        );
        let pairs = vec![
            IdentifierPair::new("0a0b", "0C0D"),
            IdentifierPair::new("0A0B", "FFFF"),
        ];

        let (set, skipped) = PatternSet::from_resolved(&pairs, &index);
        assert_eq!(set.len(), 1);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].reason, SkipReason::NotFound("FFFF".to_string()));

        let pair = set.iter().next().unwrap();
        assert_eq!(pair.search, pat("AA11"));
        assert_eq!(pair.replace, pat("BB22"));
        assert_eq!(pair.guard, Some(pat("0A0B")));
        assert_eq!(pair.label, "0a0b ►► 0C0D");
    }

    #[test]
    fn test_resolved_undecodable_value_is_skipped() {
        let index = LineTable::parse("X | 01 | index:nothex\nY | 02 | index:22\n");
        let (set, skipped) = PatternSet::from_resolved(&[IdentifierPair::new("01", "02")], &index);
        assert!(set.is_empty());
        assert!(matches!(skipped[0].reason, SkipReason::Decode(_)));
    }

    #[test]
    fn test_from_remote_uses_both_tables() {
        let suits = RemoteTable::parse("Storm Suit: 0102\n", &[]);
        let outfits = RemoteTable::parse("Desert Cloak: 0304\n", &[]);
        let pairs = vec![
            IdentifierPair::new("Storm Suit", "Desert Cloak"),
            IdentifierPair::new("Desert Cloak", "Storm Suit"),
        ];

        let (set, skipped) = PatternSet::from_remote(&pairs, &suits, &outfits);
        assert_eq!(set.len(), 1);
        assert_eq!(skipped.len(), 1);

        let mut buf = vec![0x01, 0x02];
        set.apply(&mut buf);
        assert_eq!(buf, vec![0x03, 0x04]);
    }
}
