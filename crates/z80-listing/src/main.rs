//! CLI entry point: prints the correlation of a listing against its sources.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;
use thiserror as _;
use z80_listing::{analyze, Correlation, CorrelationConfig, FsSourceProvider, ListingEntry};

const USAGE_TEXT: &str = "\
Usage: z80-listing <listing> [options]

Prints, for every listing entry, the attributed source location and its
confidence grade, followed by the source files that could not be found.

Options:
  -I, --source-dir <dir>  Directory searched for source files (repeatable;
                          default: the listing's directory)
  -s, --summary           Print only the confidence summary and missing sources
  -h, --help              Show this help message

Examples:
  z80-listing build/game.lst
  z80-listing build/game.lst -I src -I lib
";

#[derive(Debug, PartialEq, Eq)]
struct ReportArgs {
    listing: PathBuf,
    source_dirs: Vec<PathBuf>,
    summary_only: bool,
}

#[derive(Debug)]
enum ParseResult {
    Report(ReportArgs),
    Help,
}

#[allow(clippy::while_let_on_iterator)]
fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut listing: Option<PathBuf> = None;
    let mut source_dirs = Vec::new();
    let mut summary_only = false;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Ok(ParseResult::Help);
        }

        if arg == "--summary" || arg == "-s" {
            summary_only = true;
            continue;
        }

        if arg == "-I" || arg == "--source-dir" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for -I".to_string())?;
            source_dirs.push(PathBuf::from(value));
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if listing.is_some() {
            return Err("multiple listing paths provided".to_string());
        }
        listing = Some(PathBuf::from(arg));
    }

    let listing = listing.ok_or_else(|| "missing listing path".to_string())?;
    Ok(ParseResult::Report(ReportArgs {
        listing,
        source_dirs,
        summary_only,
    }))
}

fn default_source_dir(listing: &Path) -> PathBuf {
    listing
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

fn format_entry(entry: &ListingEntry) -> String {
    let bytes = entry
        .bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ");
    let location = match (&entry.file, entry.line) {
        (Some(file), Some(line)) => format!("{file}:{line}"),
        (Some(file), None) => format!("{file}:?"),
        (None, _) => "-".to_string(),
    };
    format!(
        "{:04X}  {:<12} {:<6}  {:<24} {}",
        entry.address, bytes, entry.confidence, location, entry.text
    )
}

fn write_report(
    out: &mut impl Write,
    correlation: &Correlation,
    summary_only: bool,
) -> io::Result<()> {
    if !summary_only {
        for entry in &correlation.entries {
            writeln!(out, "{}", format_entry(entry))?;
        }
        writeln!(out)?;
    }

    let (low, medium, high) = correlation.confidence_counts();
    writeln!(
        out,
        "{} entries: {high} high, {medium} medium, {low} low",
        correlation.entries.len()
    )?;
    for name in &correlation.missing_sources {
        writeln!(out, "missing source: {name}")?;
    }
    Ok(())
}

fn run_report(args: ReportArgs) -> Result<(), i32> {
    let text = match fs::read_to_string(&args.listing) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error: failed to read {}: {e}", args.listing.display());
            return Err(1);
        }
    };

    let source_dirs = if args.source_dirs.is_empty() {
        vec![default_source_dir(&args.listing)]
    } else {
        args.source_dirs
    };
    debug!("searching sources in {source_dirs:?}");
    let provider = FsSourceProvider::new(source_dirs);
    let (correlation, _) = analyze(&text, &provider, &CorrelationConfig::default());

    let mut stdout = io::stdout().lock();
    if let Err(e) = write_report(&mut stdout, &correlation, args.summary_only) {
        eprintln!("error: failed to write report: {e}");
        return Err(1);
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Report(args)) => match run_report(args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{USAGE_TEXT}");
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::PathBuf;
    use z80_listing::{parse_listing, Confidence, MemorySourceProvider};

    #[test]
    fn parses_listing_with_source_dirs() {
        let result = parse_args(
            [
                OsString::from("game.lst"),
                OsString::from("-I"),
                OsString::from("src"),
                OsString::from("--source-dir"),
                OsString::from("lib"),
                OsString::from("-s"),
            ]
            .into_iter(),
        )
        .expect("valid args should parse");

        let ParseResult::Report(args) = result else {
            panic!("expected report args");
        };
        assert_eq!(
            args,
            ReportArgs {
                listing: PathBuf::from("game.lst"),
                source_dirs: vec![PathBuf::from("src"), PathBuf::from("lib")],
                summary_only: true,
            }
        );
    }

    #[test]
    fn parses_help_flag() {
        let result = parse_args([OsString::from("--help")].into_iter())
            .expect("help should parse without error");
        assert!(matches!(result, ParseResult::Help));
    }

    #[test]
    fn rejects_missing_listing() {
        let error = parse_args(std::iter::empty()).expect_err("missing listing should fail");
        assert!(error.contains("missing listing"));
    }

    #[test]
    fn rejects_unknown_option_and_dangling_dir() {
        let error = parse_args([OsString::from("--verbose")].into_iter())
            .expect_err("unknown option should fail");
        assert!(error.contains("unknown option"));
        let error = parse_args([OsString::from("a.lst"), OsString::from("-I")].into_iter())
            .expect_err("dangling -I should fail");
        assert!(error.contains("missing value"));
    }

    #[test]
    fn default_source_dir_is_listing_parent() {
        assert_eq!(
            default_source_dir(Path::new("build/game.lst")),
            PathBuf::from("build")
        );
        assert_eq!(default_source_dir(Path::new("game.lst")), PathBuf::from("."));
    }

    fn render(correlation: &Correlation, summary_only: bool) -> String {
        let mut out = Vec::new();
        write_report(&mut out, correlation, summary_only).expect("write to buffer");
        String::from_utf8(out).expect("report is UTF-8")
    }

    #[test]
    fn report_lists_entries_and_missing_sources() {
        let listing = parse_listing(
            "0000 00 NOP\n0001 D3 00 OUT (0),A\nS: 0000 DEFINED AT LINE 1 IN gone.asm\n",
        );
        let correlation = z80_listing::correlate(
            listing,
            &MemorySourceProvider::new(),
            &CorrelationConfig::default(),
        );
        assert_eq!(correlation.entries[1].confidence, Confidence::Medium);

        let report = render(&correlation, false);
        assert!(report.contains("0000  00           HIGH    gone.asm:1"));
        assert!(report.contains("0001  D3 00        MEDIUM  gone.asm:?"));
        assert!(report.contains("2 entries: 1 high, 1 medium, 0 low"));
        assert!(report.contains("missing source: gone.asm"));

        let summary = render(&correlation, true);
        assert!(!summary.contains("NOP"));
    }
}
