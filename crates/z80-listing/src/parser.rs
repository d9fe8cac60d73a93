//! Assembler listing parser.
//!
//! Two line shapes carry information:
//! - **Emission** lines: a 4-hex-digit address, whitespace, then a leading
//!   run of 2-hex-digit byte tokens followed by the assembly text.
//! - **Anchor** lines: `<symbol>: <address> DEFINED AT LINE <n> IN <file>`,
//!   giving the exact definition site of a symbol.
//!
//! Everything else (banners, page headers, symbol tables in other shapes) is
//! skipped.

use std::fmt;

/// Attribution quality of a listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Confidence {
    /// No file, or a data directive that matched by text only.
    #[default]
    Low,
    /// File known, line unknown or ambiguous.
    Medium,
    /// Anchored, or matched to a unique source line.
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        };
        f.pad(label)
    }
}

/// One emission line of the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Address of the first emitted byte.
    pub address: u16,
    /// Bytes emitted by this line; empty for label or directive-only lines.
    pub bytes: Vec<u8>,
    /// Assembly text after the byte run, as printed.
    pub text: String,
    /// 1-indexed line of the listing this entry came from.
    pub listing_line: usize,
    /// Attributed source file.
    pub file: Option<String>,
    /// Attributed 1-indexed source line.
    pub line: Option<usize>,
    /// Attribution quality.
    pub confidence: Confidence,
    /// Set when an anchor supplied the attribution.
    pub anchored: bool,
}

impl ListingEntry {
    /// Number of emitted bytes.
    #[must_use]
    pub fn byte_count(&self) -> usize {
        self.bytes.len()
    }
}

/// Ground-truth definition site of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Anchor {
    /// Symbol name.
    pub symbol: String,
    /// Address the symbol resolves to.
    pub address: u16,
    /// Source file named by the listing.
    pub file: String,
    /// 1-indexed definition line.
    pub line: usize,
}

/// Parsed listing: entries in listing order plus anchors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Listing {
    /// Emission entries in listing order.
    pub entries: Vec<ListingEntry>,
    /// Anchor records in listing order.
    pub anchors: Vec<Anchor>,
}

/// Parses listing text. Never fails; unrecognized lines are skipped.
#[must_use]
pub fn parse_listing(text: &str) -> Listing {
    let mut listing = Listing::default();
    for (index, raw) in text.lines().enumerate() {
        let line_number = index + 1;
        if let Some(anchor) = parse_anchor(raw) {
            listing.anchors.push(anchor);
        } else if let Some(entry) = parse_emission(raw, line_number) {
            listing.entries.push(entry);
        }
    }
    listing
}

/// Parses an emission line.
#[must_use]
pub fn parse_emission(line: &str, listing_line: usize) -> Option<ListingEntry> {
    let line = line.trim_end();
    let address = line.get(..4)?;
    if !address.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let rest = &line[4..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let address = u16::from_str_radix(address, 16).ok()?;
    let (bytes, text) = split_byte_run(rest.trim_start());

    Some(ListingEntry {
        address,
        bytes,
        text: text.to_string(),
        listing_line,
        file: None,
        line: None,
        confidence: Confidence::Low,
        anchored: false,
    })
}

/// Directive mnemonics that are also valid byte tokens.
const HEX_SPELLED_DIRECTIVES: [&str; 2] = ["DB", "DC"];

/// Splits the leading run of byte tokens from the assembly text. Tokens are
/// separated by single spaces; a wider gap or a non-byte token ends the run.
///
/// `DB` and `DC` end the run when followed by operands that are not
/// themselves a byte token, so `01 02 DB 1,2` keeps its directive while
/// `DB FE IN A,(0FEH)` stays an `IN` opcode.
fn split_byte_run(remainder: &str) -> (Vec<u8>, &str) {
    let mut bytes = Vec::new();
    let mut rest = remainder;
    loop {
        let Some(token) = leading_byte_token(rest) else {
            break;
        };
        let after = &rest[2..];
        if is_directive_with_operands(token, after) {
            break;
        }
        let Ok(byte) = u8::from_str_radix(token, 16) else {
            break;
        };
        bytes.push(byte);

        let gap = after.len() - after.trim_start().len();
        rest = after.trim_start();
        if gap != 1 || after.starts_with('\t') {
            break;
        }
    }
    (bytes, rest)
}

/// Two hex digits at the start of `text`, followed by whitespace or the end.
fn leading_byte_token(text: &str) -> Option<&str> {
    let token = text.get(..2)?;
    let terminated = text[2..].is_empty() || text[2..].starts_with(char::is_whitespace);
    (terminated && token.bytes().all(|b| b.is_ascii_hexdigit())).then_some(token)
}

fn is_directive_with_operands(token: &str, after: &str) -> bool {
    let operands = after.trim_start();
    HEX_SPELLED_DIRECTIVES
        .iter()
        .any(|directive| token.eq_ignore_ascii_case(directive))
        && !operands.is_empty()
        && leading_byte_token(operands).is_none()
}

/// Parses `<symbol>: <address> DEFINED AT LINE <n> IN <file>`.
#[must_use]
pub fn parse_anchor(line: &str) -> Option<Anchor> {
    let (symbol, rest) = line.trim().split_once(':')?;
    let symbol = symbol.trim();
    if symbol.is_empty() || symbol.contains(char::is_whitespace) {
        return None;
    }

    let mut tokens = rest.split_whitespace();
    let address = parse_address(tokens.next()?)?;
    for keyword in ["DEFINED", "AT", "LINE"] {
        if !tokens.next()?.eq_ignore_ascii_case(keyword) {
            return None;
        }
    }
    let line_number = tokens.next()?.parse::<usize>().ok()?;
    if !tokens.next()?.eq_ignore_ascii_case("IN") {
        return None;
    }

    let (_, file) = split_after_keyword(rest, "IN")?;
    let file = file.trim();
    if file.is_empty() || line_number == 0 {
        return None;
    }
    Some(Anchor {
        symbol: symbol.to_string(),
        address,
        file: file.to_string(),
        line: line_number,
    })
}

/// Hex address with an optional `$`/`0x` prefix or `H` suffix.
fn parse_address(token: &str) -> Option<u16> {
    let digits = token
        .strip_prefix('$')
        .or_else(|| token.strip_prefix("0x"))
        .or_else(|| token.strip_prefix("0X"))
        .or_else(|| token.strip_suffix(['H', 'h']))
        .unwrap_or(token);
    if digits.is_empty() || digits.len() > 4 {
        return None;
    }
    u16::from_str_radix(digits, 16).ok()
}

/// Splits `text` after the first whitespace-delimited `keyword`.
fn split_after_keyword<'a>(text: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    let mut offset = 0;
    for token in text.split_whitespace() {
        let start = offset + text[offset..].find(token)?;
        let end = start + token.len();
        if token.eq_ignore_ascii_case(keyword) {
            return Some((&text[..start], &text[end..]));
        }
        offset = end;
    }
    None
}
