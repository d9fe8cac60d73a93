//! Two-pass attribution of listing entries to source lines.
//!
//! Pass 1 walks entries in address order and propagates anchors: an exact
//! anchor address gives HIGH confidence, later entries inherit the file at
//! MEDIUM. Pass 2 refines line numbers by matching normalized text against
//! the source, inside a window around a moving hint.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, warn};

use crate::parser::{Anchor, Confidence, Listing, ListingEntry};
use crate::source::{normalize, SourceProvider};

/// Lines searched before the hint.
pub const DEFAULT_WINDOW_BEFORE: usize = 40;
/// Lines searched after the hint.
pub const DEFAULT_WINDOW_AFTER: usize = 200;
/// Matches further than this before the hint are rejected.
pub const DEFAULT_MAX_BACKWARD: usize = 80;

/// Tunables of the text-matching pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationConfig {
    /// Lines searched before the hint.
    pub window_before: usize,
    /// Lines searched after the hint.
    pub window_after: usize,
    /// Matches further than this many lines before the hint are rejected.
    pub max_backward: usize,
    /// Leading tokens that mark macro-expansion lines.
    pub macro_markers: Vec<String>,
    /// Data-emitting directive keywords.
    pub data_directives: Vec<String>,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            window_before: DEFAULT_WINDOW_BEFORE,
            window_after: DEFAULT_WINDOW_AFTER,
            max_backward: DEFAULT_MAX_BACKWARD,
            macro_markers: ["+", "MACRO", ".MACRO", "ENDM", ".ENDM", "REPT", "ENDR"]
                .map(String::from)
                .to_vec(),
            data_directives: [
                "DB", "DEFB", ".DB", ".BYTE", "DW", "DEFW", ".DW", ".WORD", "DS", "DEFS",
                ".DS", ".SPACE", "DM", "DEFM", ".TEXT", "INCBIN", ".INCBIN",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

impl CorrelationConfig {
    /// Returns `true` when the normalized text is a macro-expansion marker.
    #[must_use]
    pub fn is_macro_marker(&self, normalized: &str) -> bool {
        let first = normalized.split(' ').next().unwrap_or_default();
        self.macro_markers.iter().any(|marker| {
            first == marker
                || (marker.chars().all(|c| c.is_ascii_punctuation())
                    && normalized.starts_with(marker.as_str()))
        })
    }

    /// Returns `true` when the normalized text is a data-emitting directive,
    /// with or without a leading label.
    #[must_use]
    pub fn is_data_directive(&self, normalized: &str) -> bool {
        let mut tokens = normalized.split([' ', ',']).filter(|t| !t.is_empty());
        let Some(first) = tokens.next() else {
            return false;
        };
        let is_directive = |token: &str| self.data_directives.iter().any(|d| d == token);
        if first.ends_with(':') {
            return tokens.next().is_some_and(is_directive);
        }
        is_directive(first) || tokens.next().is_some_and(is_directive)
    }
}

/// Result of a text search in one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMatch {
    /// Chosen 1-indexed line.
    pub line: usize,
    /// Number of matching lines inside the window.
    pub candidates: usize,
}

/// Searches `lines` (normalized, index 0 is line 1) for `text`.
///
/// With a hint, only lines `[hint - window_before, hint + window_after]` are
/// considered. The first match at or after the hint wins, else the first
/// match; a winner more than `max_backward` lines before the hint is
/// rejected.
#[must_use]
pub fn find_match(
    lines: &[String],
    text: &str,
    hint: Option<usize>,
    config: &CorrelationConfig,
) -> Option<TextMatch> {
    let (low, high) = hint.map_or((1, lines.len()), |hint| {
        (
            hint.saturating_sub(config.window_before).max(1),
            hint.saturating_add(config.window_after).min(lines.len()),
        )
    });
    if low > high {
        return None;
    }

    let matches: Vec<usize> = (low..=high)
        .filter(|line| lines[line - 1] == text)
        .collect();
    let first = *matches.first()?;
    let line = hint.map_or(first, |hint| {
        matches
            .iter()
            .copied()
            .find(|line| *line >= hint)
            .unwrap_or(first)
    });
    if hint.is_some_and(|hint| line < hint && hint - line > config.max_backward) {
        return None;
    }
    Some(TextMatch {
        line,
        candidates: matches.len(),
    })
}

/// Search position carried from one entry to the next during pass 2.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchCursor {
    /// File of the previous entry.
    pub file: Option<String>,
    /// Line the next search is centred on.
    pub hint: Option<usize>,
}

impl MatchCursor {
    /// Moves to `entry`'s file, dropping the hint on a file change, and
    /// re-centres on the line of an anchored entry.
    pub fn enter(&mut self, entry: &ListingEntry) {
        if self.file != entry.file {
            self.file.clone_from(&entry.file);
            self.hint = None;
        }
        if entry.anchored {
            self.hint = entry.line;
        }
    }

    /// Advances past a matched line.
    pub const fn advance(&mut self, matched: usize) {
        self.hint = Some(matched + 1);
    }
}

/// Finalized attribution of one listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Correlation {
    /// Entries in address order with file, line and confidence set.
    pub entries: Vec<ListingEntry>,
    /// Anchors as parsed.
    pub anchors: Vec<Anchor>,
    /// Source files that could not be loaded, each reported once.
    pub missing_sources: Vec<String>,
    /// Listing file name to the name its provider resolved it to.
    pub resolved_files: BTreeMap<String, String>,
}

impl Correlation {
    /// Number of entries at each confidence grade, as `(low, medium, high)`.
    #[must_use]
    pub fn confidence_counts(&self) -> (usize, usize, usize) {
        self.entries
            .iter()
            .fold((0, 0, 0), |(low, medium, high), entry| match entry.confidence {
                Confidence::Low => (low + 1, medium, high),
                Confidence::Medium => (low, medium + 1, high),
                Confidence::High => (low, medium, high + 1),
            })
    }
}

/// Runs both passes over `listing`, loading sources through `provider`.
#[must_use]
pub fn correlate<P: SourceProvider + ?Sized>(
    listing: Listing,
    provider: &P,
    config: &CorrelationConfig,
) -> Correlation {
    let Listing {
        mut entries,
        anchors,
    } = listing;
    entries.sort_by_key(|entry| entry.address);

    propagate_anchors(&mut entries, &anchors);

    let mut sources = SourceCache::new(provider);
    entries
        .iter_mut()
        .fold(MatchCursor::default(), |mut cursor, entry| {
            refine_entry(entry, &mut cursor, &mut sources, config);
            cursor
        });

    let resolved_files = entries
        .iter()
        .filter_map(|entry| entry.file.as_deref())
        .chain(anchors.iter().map(|anchor| anchor.file.as_str()))
        .collect::<HashSet<_>>()
        .into_iter()
        .filter_map(|name| Some((name.to_string(), provider.resolved_name(name)?)))
        .collect();

    let correlation = Correlation {
        entries,
        anchors,
        missing_sources: sources.missing,
        resolved_files,
    };
    let (low, medium, high) = correlation.confidence_counts();
    debug!(
        "correlated {} entries: {high} high, {medium} medium, {low} low, {} missing sources",
        correlation.entries.len(),
        correlation.missing_sources.len()
    );
    correlation
}

/// Pass 1. Entries must already be in address order.
fn propagate_anchors(entries: &mut [ListingEntry], anchors: &[Anchor]) {
    let mut by_address: HashMap<u16, Vec<&Anchor>> = HashMap::new();
    for anchor in anchors {
        by_address.entry(anchor.address).or_default().push(anchor);
    }
    let mut claimed: HashSet<u16> = HashSet::new();
    let mut current_file: Option<String> = None;

    for entry in entries {
        let anchor = if claimed.contains(&entry.address) {
            None
        } else {
            by_address
                .get(&entry.address)
                .and_then(|candidates| pick_anchor(candidates, &entry.text))
        };

        if let Some(anchor) = anchor {
            claimed.insert(entry.address);
            entry.file = Some(anchor.file.clone());
            entry.line = Some(anchor.line);
            entry.confidence = Confidence::High;
            entry.anchored = true;
            current_file = Some(anchor.file.clone());
        } else if let Some(file) = &current_file {
            entry.file = Some(file.clone());
            entry.line = None;
            entry.confidence = Confidence::Medium;
        } else {
            entry.file = None;
            entry.line = None;
            entry.confidence = Confidence::Low;
        }
    }
}

/// The anchor whose symbol labels `text`, else the lowest-line one.
fn pick_anchor<'a>(candidates: &[&'a Anchor], text: &str) -> Option<&'a Anchor> {
    candidates
        .iter()
        .copied()
        .find(|anchor| labels(text, &anchor.symbol))
        .or_else(|| candidates.iter().copied().min_by_key(|anchor| anchor.line))
}

fn labels(text: &str, symbol: &str) -> bool {
    text.trim_start()
        .strip_prefix(symbol)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with([':', ' ', '\t']))
}

/// Pass 2 for one entry.
fn refine_entry<P: SourceProvider + ?Sized>(
    entry: &mut ListingEntry,
    cursor: &mut MatchCursor,
    sources: &mut SourceCache<'_, P>,
    config: &CorrelationConfig,
) {
    cursor.enter(entry);
    if entry.bytes.is_empty() {
        return;
    }
    let Some(file) = entry.file.clone() else {
        return;
    };
    let text = normalize(&entry.text);
    if text.is_empty() || config.is_macro_marker(&text) {
        return;
    }
    let Some(lines) = sources.lines(&file) else {
        return;
    };

    let is_data = config.is_data_directive(&text);
    match find_match(lines, &text, cursor.hint, config) {
        Some(found) => {
            entry.line = Some(found.line);
            if entry.confidence != Confidence::High {
                entry.confidence = if is_data {
                    Confidence::Low
                } else if found.candidates > 1 {
                    Confidence::Medium
                } else {
                    Confidence::High
                };
            }
            cursor.advance(found.line);
        }
        None => {
            if is_data && entry.confidence != Confidence::High {
                entry.confidence = Confidence::Low;
            }
        }
    }
}

/// Normalized source lines, loaded once per file name.
struct SourceCache<'a, P: ?Sized> {
    provider: &'a P,
    files: HashMap<String, Option<Vec<String>>>,
    missing: Vec<String>,
}

impl<'a, P: SourceProvider + ?Sized> SourceCache<'a, P> {
    fn new(provider: &'a P) -> Self {
        Self {
            provider,
            files: HashMap::new(),
            missing: Vec::new(),
        }
    }

    fn lines(&mut self, name: &str) -> Option<&[String]> {
        if !self.files.contains_key(name) {
            let loaded = match self.provider.load(name) {
                Ok(text) => Some(text.lines().map(normalize).collect()),
                Err(error) => {
                    warn!("{error}; entries keep file-only attribution");
                    self.missing.push(name.to_string());
                    None
                }
            };
            self.files.insert(name.to_string(), loaded);
        }
        self.files.get(name)?.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{correlate, find_match, CorrelationConfig, MatchCursor, TextMatch};
    use crate::parser::{parse_listing, Confidence};
    use crate::source::MemorySourceProvider;

    fn lines_with(total: usize, matches: &[usize], text: &str) -> Vec<String> {
        (1..=total)
            .map(|line| {
                if matches.contains(&line) {
                    text.to_string()
                } else {
                    format!("LD A,{line}")
                }
            })
            .collect()
    }

    #[test]
    fn prefers_first_match_at_or_after_hint() {
        let lines = lines_with(60, &[10, 55], "INC A");
        let found = find_match(&lines, "INC A", Some(12), &CorrelationConfig::default());
        assert_eq!(
            found,
            Some(TextMatch {
                line: 55,
                candidates: 2
            })
        );
    }

    #[test]
    fn falls_back_to_first_match_before_hint() {
        let lines = lines_with(60, &[10, 20], "INC A");
        let found = find_match(&lines, "INC A", Some(30), &CorrelationConfig::default());
        assert_eq!(found.map(|m| m.line), Some(10));
    }

    #[test]
    fn rejects_match_too_far_before_hint() {
        let lines = lines_with(300, &[100], "INC A");
        let config = CorrelationConfig {
            window_before: 200,
            ..CorrelationConfig::default()
        };
        assert_eq!(find_match(&lines, "INC A", Some(181), &config), None);
        assert_eq!(
            find_match(&lines, "INC A", Some(180), &config).map(|m| m.line),
            Some(100)
        );
    }

    #[rstest]
    #[case::inside_window(Some(50), Some(250))]
    #[case::beyond_window(Some(40), None)]
    #[case::no_hint(None, Some(250))]
    fn window_bounds_the_search(#[case] hint: Option<usize>, #[case] expected: Option<usize>) {
        let lines = lines_with(300, &[250], "INC A");
        let found = find_match(&lines, "INC A", hint, &CorrelationConfig::default());
        assert_eq!(found.map(|m| m.line), expected);
    }

    #[rstest]
    #[case("DB 1,2,3", true)]
    #[case("TABLE: DEFW 0", true)]
    #[case("TABLE DS 10", true)]
    #[case("LD A,B", false)]
    #[case("DEC B", false)]
    fn classifies_data_directives(#[case] text: &str, #[case] expected: bool) {
        let config = CorrelationConfig::default();
        assert_eq!(config.is_data_directive(text), expected);
    }

    #[test]
    fn recognizes_macro_markers() {
        let config = CorrelationConfig::default();
        assert!(config.is_macro_marker("+ LD A,B"));
        assert!(config.is_macro_marker("ENDM"));
        assert!(!config.is_macro_marker("LD A,B"));
    }

    #[test]
    fn cursor_resets_on_file_change() {
        let listing = parse_listing("0000 00 NOP");
        let mut entry = listing.entries[0].clone();
        entry.file = Some("a.asm".to_string());
        let mut cursor = MatchCursor {
            file: Some("b.asm".to_string()),
            hint: Some(30),
        };
        cursor.enter(&entry);
        assert_eq!(cursor.hint, None);
        assert_eq!(cursor.file.as_deref(), Some("a.asm"));
    }

    #[test]
    fn two_instruction_program_is_fully_attributed() {
        let listing = parse_listing(
            "0000 00 NOP\n0001 D3 00 OUT (0),A\nSTART: 0000 DEFINED AT LINE 1 IN prog.asm\n",
        );
        let provider = MemorySourceProvider::new().with_file("prog.asm", "NOP\nOUT (0),A\n");
        let correlation = correlate(listing, &provider, &CorrelationConfig::default());

        let first = &correlation.entries[0];
        assert_eq!((first.line, first.confidence), (Some(1), Confidence::High));
        assert!(first.anchored);
        let second = &correlation.entries[1];
        assert_eq!(second.file.as_deref(), Some("prog.asm"));
        assert_eq!((second.line, second.confidence), (Some(2), Confidence::High));
        assert!(correlation.missing_sources.is_empty());
    }

    #[test]
    fn anchored_instruction_moves_off_label_only_source_line() {
        let listing = parse_listing(
            "0000 00 NOP\n0001 3C INC A\nLOOP: 0000 DEFINED AT LINE 1 IN a.asm\n",
        );
        let provider = MemorySourceProvider::new().with_file("a.asm", "LOOP:\nNOP\nINC A\n");
        let correlation = correlate(listing, &provider, &CorrelationConfig::default());
        let attributed: Vec<_> = correlation
            .entries
            .iter()
            .map(|e| (e.line, e.confidence))
            .collect();
        assert_eq!(
            attributed,
            vec![(Some(2), Confidence::High), (Some(3), Confidence::High)]
        );
    }

    #[test]
    fn anchored_instruction_keeps_anchor_line_without_match() {
        let listing = parse_listing("0000 00 NOP\nX: 0000 DEFINED AT LINE 4 IN a.asm\n");
        let provider = MemorySourceProvider::new().with_file("a.asm", "X:\n\n\nHALT\n");
        let correlation = correlate(listing, &provider, &CorrelationConfig::default());
        let entry = &correlation.entries[0];
        assert_eq!((entry.line, entry.confidence), (Some(4), Confidence::High));
    }

    #[test]
    fn entries_before_first_anchor_are_low() {
        let listing =
            parse_listing("0000 00 NOP\n0010 00 NOP\nX: 0010 DEFINED AT LINE 4 IN a.asm\n");
        let correlation =
            correlate(listing, &MemorySourceProvider::new(), &CorrelationConfig::default());
        assert_eq!(correlation.entries[0].confidence, Confidence::Low);
        assert_eq!(correlation.entries[0].file, None);
        assert_eq!(correlation.entries[1].confidence, Confidence::High);
    }

    #[test]
    fn repeated_instructions_map_to_successive_lines() {
        let listing = parse_listing(
            "0000       START:\n0000 00 NOP\n0001 00 NOP\n0002 00 NOP\n\
             START: 0000 DEFINED AT LINE 1 IN a.asm\n",
        );
        let provider = MemorySourceProvider::new().with_file("a.asm", "START:\nNOP\nNOP\nNOP\n");
        let correlation = correlate(listing, &provider, &CorrelationConfig::default());
        let lines: Vec<_> = correlation.entries.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(correlation.entries[1].confidence, Confidence::Medium);
    }

    #[test]
    fn data_directives_stay_low_even_when_matched() {
        let listing = parse_listing(
            "0000 3E 01 LD A,1\n0002 05 DB 5\nX: 0000 DEFINED AT LINE 1 IN a.asm\n",
        );
        let provider = MemorySourceProvider::new().with_file("a.asm", "LD A,1\nDB 5\n");
        let correlation = correlate(listing, &provider, &CorrelationConfig::default());
        let data = &correlation.entries[1];
        assert_eq!((data.line, data.confidence), (Some(2), Confidence::Low));
    }

    #[test]
    fn missing_source_reported_once_and_keeps_pass_one_grades() {
        let listing = parse_listing(
            "0000 00 NOP\n0001 00 NOP\n0002 05 DB 5\nX: 0000 DEFINED AT LINE 1 IN gone.asm\n",
        );
        let correlation =
            correlate(listing, &MemorySourceProvider::new(), &CorrelationConfig::default());
        assert_eq!(correlation.missing_sources, vec!["gone.asm".to_string()]);
        for entry in &correlation.entries[1..] {
            assert_eq!(entry.file.as_deref(), Some("gone.asm"));
            assert_eq!(entry.line, None);
            assert_eq!(entry.confidence, Confidence::Medium);
        }
    }

    #[test]
    fn address_claims_one_anchor_preferring_its_label() {
        let listing = parse_listing(
            "0100 00 INNER: NOP\n\
             OUTER: 0100 DEFINED AT LINE 3 IN a.asm\n\
             INNER: 0100 DEFINED AT LINE 7 IN a.asm\n",
        );
        let correlation =
            correlate(listing, &MemorySourceProvider::new(), &CorrelationConfig::default());
        assert_eq!(correlation.entries[0].line, Some(7));
    }

    #[test]
    fn source_formatting_differences_still_match() {
        let listing = parse_listing(
            "0000 00 NOP\n0001 3E 05 LD A , 5 ; load\nX: 0000 DEFINED AT LINE 1 IN a.asm\n",
        );
        let provider =
            MemorySourceProvider::new().with_file("a.asm", "  nop\n\tld   a,5   ; five\n");
        let correlation = correlate(listing, &provider, &CorrelationConfig::default());
        assert_eq!(correlation.entries[1].line, Some(2));
        assert_eq!(correlation.entries[1].confidence, Confidence::High);
    }
}
