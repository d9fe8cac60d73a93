//! Read-only lookup structures built once from a finished correlation.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::correlate::Correlation;
use crate::parser::Confidence;

/// A source position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLocation {
    /// File name as resolved by the source provider.
    pub file: String,
    /// 1-indexed line.
    pub line: usize,
}

impl SourceLocation {
    /// Creates a location.
    #[must_use]
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Half-open address range `[start, end)` emitted by one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// First address.
    pub start: u16,
    /// One past the last address; may be `0x10000`.
    pub end: u32,
    /// Attributed file.
    pub file: Option<String>,
    /// Attributed line.
    pub line: Option<usize>,
    /// Attribution quality.
    pub confidence: Confidence,
}

impl Segment {
    /// Returns `true` when `addr` lies in the segment.
    #[must_use]
    pub fn contains(&self, addr: u16) -> bool {
        addr >= self.start && u32::from(addr) < self.end
    }

    /// Source location, when both file and line are known.
    #[must_use]
    pub fn location(&self) -> Option<SourceLocation> {
        Some(SourceLocation::new(self.file.clone()?, self.line?))
    }
}

/// Address and line lookups over one correlated listing.
///
/// Files are keyed by the name their source provider resolved them to, and
/// locations carry that name. Queries also accept the name as the listing
/// spells it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationIndex {
    segments: Vec<Segment>,
    lines: HashMap<String, BTreeMap<usize, Vec<u16>>>,
    anchors: HashMap<String, Vec<(usize, u16)>>,
    aliases: HashMap<String, String>,
}

impl CorrelationIndex {
    /// Builds the index from `correlation`, whose entries are in address
    /// order.
    #[must_use]
    pub fn build(correlation: &Correlation) -> Self {
        let resolved = |file: &String| {
            correlation
                .resolved_files
                .get(file)
                .unwrap_or(file)
                .clone()
        };
        let emitting: Vec<_> = correlation
            .entries
            .iter()
            .filter(|entry| !entry.bytes.is_empty())
            .collect();

        let mut segments = Vec::with_capacity(emitting.len());
        for (position, entry) in emitting.iter().enumerate() {
            let start = u32::from(entry.address);
            let len = u32::try_from(entry.bytes.len()).unwrap_or(u32::MAX);
            let mut end = start.saturating_add(len).min(0x1_0000);
            if let Some(next) = emitting[position + 1..]
                .iter()
                .map(|next| u32::from(next.address))
                .find(|next| *next > start)
            {
                end = end.min(next);
            }
            segments.push(Segment {
                start: entry.address,
                end,
                file: entry.file.as_ref().map(resolved),
                line: entry.line,
                confidence: entry.confidence,
            });
        }

        let mut lines: HashMap<String, BTreeMap<usize, Vec<u16>>> = HashMap::new();
        for segment in &segments {
            if let (Some(file), Some(line)) = (&segment.file, segment.line) {
                lines
                    .entry(file.clone())
                    .or_default()
                    .entry(line)
                    .or_default()
                    .push(segment.start);
            }
        }
        for starts in lines.values_mut().flat_map(BTreeMap::values_mut) {
            starts.sort_unstable();
            starts.dedup();
        }

        let mut anchors: HashMap<String, Vec<(usize, u16)>> = HashMap::new();
        for anchor in &correlation.anchors {
            anchors
                .entry(resolved(&anchor.file))
                .or_default()
                .push((anchor.line, anchor.address));
        }
        for by_line in anchors.values_mut() {
            by_line.sort_unstable();
        }

        let aliases = correlation
            .resolved_files
            .iter()
            .filter(|(listed, path)| listed != path)
            .map(|(listed, path)| (listed.clone(), path.clone()))
            .collect();

        Self {
            segments,
            lines,
            anchors,
            aliases,
        }
    }

    fn file_key<'a>(&'a self, file: &'a str) -> &'a str {
        self.aliases.get(file).map_or(file, String::as_str)
    }

    /// Address-ordered segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The first segment containing `addr`.
    #[must_use]
    pub fn segment_at(&self, addr: u16) -> Option<&Segment> {
        let upper = self.segments.partition_point(|segment| segment.start <= addr);
        self.segments[..upper]
            .iter()
            .find(|segment| segment.contains(addr))
    }

    /// Segment start addresses on `(file, line)`, ascending.
    #[must_use]
    pub fn addresses_for(&self, file: &str, line: usize) -> &[u16] {
        self.lines
            .get(self.file_key(file))
            .and_then(|by_line| by_line.get(&line))
            .map_or(&[], Vec::as_slice)
    }

    /// Address of the last anchor at or before `line` in `file`.
    #[must_use]
    pub fn nearest_anchor(&self, file: &str, line: usize) -> Option<u16> {
        let by_line = self.anchors.get(self.file_key(file))?;
        let upper = by_line.partition_point(|(anchor_line, _)| *anchor_line <= line);
        by_line[..upper].last().map(|(_, address)| *address)
    }

    /// Source location executing at `addr`, if one is known.
    #[must_use]
    pub fn resolve_address(&self, addr: u16) -> Option<SourceLocation> {
        self.segment_at(addr)?.location()
    }

    /// Candidate breakpoint addresses for `(file, line)`: the exact segments
    /// when there are any, else the nearest preceding anchor.
    #[must_use]
    pub fn resolve_location(&self, file: &str, line: usize) -> Vec<u16> {
        let exact = self.addresses_for(file, line);
        if !exact.is_empty() {
            return exact.to_vec();
        }
        self.nearest_anchor(file, line).into_iter().collect()
    }

    /// Resolved names of files with at least one attributed line.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.lines.keys().map(String::as_str)
    }
}
