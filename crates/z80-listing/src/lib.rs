//! Assembler listing parsing and source-line correlation for Z80 debugging.

use env_logger as _;

/// Two-pass attribution of listing entries to source lines.
pub mod correlate;
/// Address and line lookups over a correlated listing.
pub mod index;
/// Emission and anchor line parser.
pub mod parser;
/// Source providers and text normalization.
pub mod source;

pub use correlate::{correlate, Correlation, CorrelationConfig, MatchCursor};
pub use index::{CorrelationIndex, Segment, SourceLocation};
pub use parser::{parse_listing, Anchor, Confidence, Listing, ListingEntry};
pub use source::{normalize, FsSourceProvider, MemorySourceProvider, SourceError, SourceProvider};

/// Parses and correlates `listing_text`, then indexes the result.
#[must_use]
pub fn analyze<P: SourceProvider + ?Sized>(
    listing_text: &str,
    provider: &P,
    config: &CorrelationConfig,
) -> (Correlation, CorrelationIndex) {
    let correlation = correlate(parse_listing(listing_text), provider, config);
    let index = CorrelationIndex::build(&correlation);
    (correlation, index)
}
