//! End-to-end listing correlation scenarios through the public API.

#![allow(clippy::pedantic, clippy::nursery)]

use env_logger as _;
use log as _;
use thiserror as _;

use std::fs;

use rstest::rstest;
use z80_listing::{
    analyze, parse_listing, Confidence, CorrelationConfig, CorrelationIndex, FsSourceProvider,
    MemorySourceProvider, SourceLocation,
};

#[test]
fn two_instruction_program_round_trips() {
    let listing = "0000 00 NOP\n0001 D3 00 OUT (0),A\nBOOT: 0000 DEFINED AT LINE 1 IN boot.asm\n";
    let provider = MemorySourceProvider::new().with_file("boot.asm", "NOP\nOUT (0),A\n");
    let (correlation, index) = analyze(listing, &provider, &CorrelationConfig::default());

    let grades: Vec<_> = correlation
        .entries
        .iter()
        .map(|entry| (entry.line, entry.confidence))
        .collect();
    assert_eq!(
        grades,
        vec![(Some(1), Confidence::High), (Some(2), Confidence::High)]
    );
    assert_eq!(index.resolve_location("boot.asm", 2), vec![0x0001]);
    assert_eq!(
        index.resolve_address(0x0002),
        Some(SourceLocation::new("boot.asm", 2))
    );
}

#[test]
fn ambiguous_text_prefers_match_after_hint() {
    let mut source: Vec<String> = (1..=60).map(|line| format!("LD B,{line}")).collect();
    source[9] = "INC A".to_string();
    source[11] = "HERE:".to_string();
    source[54] = "INC A".to_string();
    let listing = "0100            HERE:\n0100 3C INC A\nHERE: 0100 DEFINED AT LINE 12 IN amb.asm\n";
    let provider = MemorySourceProvider::new().with_file("amb.asm", source.join("\n"));

    let (correlation, _) = analyze(listing, &provider, &CorrelationConfig::default());
    let entry = &correlation.entries[1];
    assert_eq!(entry.line, Some(55));
    assert_eq!(entry.confidence, Confidence::Medium);
}

#[test]
fn missing_source_is_reported_once() {
    let mut listing = String::new();
    for address in 0..20_u16 {
        listing.push_str(&format!("{address:04X} 00 NOP\n"));
    }
    listing.push_str("A: 0000 DEFINED AT LINE 1 IN nowhere.asm\n");
    listing.push_str("B: 000A DEFINED AT LINE 11 IN nowhere.asm\n");

    let (correlation, index) = analyze(
        &listing,
        &MemorySourceProvider::new(),
        &CorrelationConfig::default(),
    );
    assert_eq!(correlation.missing_sources, vec!["nowhere.asm".to_string()]);
    assert!(correlation
        .entries
        .iter()
        .all(|entry| entry.file.as_deref() == Some("nowhere.asm")));
    assert_eq!(index.resolve_location("nowhere.asm", 12), vec![0x000A]);
}

#[rstest]
#[case::tight_window(4, 8, 2)]
#[case::default_window(40, 200, 80)]
fn high_entries_round_trip_through_index(
    #[case] window_before: usize,
    #[case] window_after: usize,
    #[case] max_backward: usize,
) {
    let source = "\
START:
LD SP,0xFFFF
LD A,0
LOOP:
OUT (1),A
INC A
JR LOOP
DATA:
DB 1,2,3
";
    let listing = "\
0000            START:
0000 31 FF FF LD SP,0xFFFF
0003 3E 00 LD A,0
0005            LOOP:
0005 D3 01 OUT (1),A
0007 3C INC A
0008 18 FB JR LOOP
000A            DATA:
000A 01 02 03   DB 1,2,3
START: 0000 DEFINED AT LINE 1 IN main.asm
LOOP: 0005 DEFINED AT LINE 4 IN main.asm
DATA: 000A DEFINED AT LINE 8 IN main.asm
";
    let config = CorrelationConfig {
        window_before,
        window_after,
        max_backward,
        ..CorrelationConfig::default()
    };
    let provider = MemorySourceProvider::new().with_file("main.asm", source);
    let (correlation, index) = analyze(listing, &provider, &config);

    let high: Vec<_> = correlation
        .entries
        .iter()
        .filter(|entry| entry.confidence == Confidence::High)
        .collect();
    assert!(high.len() >= 6);
    for entry in high {
        let file = entry.file.as_deref().expect("high entries have a file");
        let line = entry.line.expect("high entries have a line");
        assert!(
            index.resolve_location(file, line).contains(&entry.address),
            "{file}:{line} should resolve to 0x{:04X}",
            entry.address
        );
    }

    let data = correlation
        .entries
        .iter()
        .find(|entry| entry.text.starts_with("DB"))
        .expect("data entry");
    assert_eq!((data.line, data.confidence), (Some(9), Confidence::Low));
}

#[test]
fn extra_listing_is_independent() {
    let main = parse_listing("0000 00 NOP\nM: 0000 DEFINED AT LINE 1 IN main.asm\n");
    let lib = parse_listing("8000 C9 RET\nL: 8000 DEFINED AT LINE 1 IN lib.asm\n");
    let provider = MemorySourceProvider::new()
        .with_file("main.asm", "NOP\n")
        .with_file("lib.asm", "RET\n");
    let config = CorrelationConfig::default();

    let main_index = CorrelationIndex::build(&z80_listing::correlate(main, &provider, &config));
    let lib_index = CorrelationIndex::build(&z80_listing::correlate(lib, &provider, &config));
    assert!(main_index.resolve_address(0x8000).is_none());
    assert_eq!(
        lib_index.resolve_address(0x8000),
        Some(SourceLocation::new("lib.asm", 1))
    );
}

#[test]
fn index_answers_by_resolved_path_and_listing_name() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir(temp_dir.path().join("src")).expect("mkdir");
    let source_path = temp_dir.path().join("src").join("main.asm");
    fs::write(&source_path, "NOP\nOUT (0),A\n").expect("write source");
    let resolved = fs::canonicalize(&source_path)
        .expect("canonical path")
        .display()
        .to_string();

    let listing = "0000 00 NOP\n0001 D3 00 OUT (0),A\nBOOT: 0000 DEFINED AT LINE 1 IN src/main.asm\n";
    let provider = FsSourceProvider::new([temp_dir.path()]);
    let (correlation, index) = analyze(listing, &provider, &CorrelationConfig::default());

    assert_eq!(
        correlation.resolved_files.get("src/main.asm"),
        Some(&resolved)
    );
    assert_eq!(index.resolve_location(&resolved, 2), vec![0x0001]);
    assert_eq!(index.resolve_location("src/main.asm", 2), vec![0x0001]);
    assert_eq!(index.resolve_location(&resolved, 3), vec![0x0000]);
    assert_eq!(
        index.resolve_address(0x0001),
        Some(SourceLocation::new(resolved.clone(), 2))
    );
    assert_eq!(index.files().collect::<Vec<_>>(), vec![resolved.as_str()]);
}
