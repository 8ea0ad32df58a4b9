// Integration tests for the linking info ledger
// Covers chain recomputation, tamper detection and reset equivalence

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use chainlog_core::{DigestAlgorithm, DigestEntry, LinkingInfoBuilder};
use common::first_broken_line;
use proptest::prelude::*;

fn build_chain(
    algorithm: DigestAlgorithm,
    origin: DigestEntry,
    files: &[(String, Vec<u8>)],
) -> LinkingInfoBuilder {
    let mut builder = LinkingInfoBuilder::new(algorithm, origin);
    for (name, content) in files {
        builder.add_next_file(name, &algorithm.digest(content));
    }
    builder
}

#[test]
fn test_ledger_verifies_line_by_line() {
    // Given: A chain over three files
    let files: Vec<(String, Vec<u8>)> = (1..=3)
        .map(|i| (format!("ID{}-request-{}.asice", i, i), vec![i as u8; 16]))
        .collect();
    let builder = build_chain(DigestAlgorithm::Sha512, DigestEntry::empty(), &files);

    // When: The ledger is recomputed from the file contents
    let ledger = String::from_utf8(builder.build()).unwrap();
    let contents: Vec<(&str, Vec<u8>)> = files.iter().map(|(n, c)| (n.as_str(), c.clone())).collect();

    // Then: Every line verifies
    assert_eq!(ledger.lines().count(), 4);
    assert_eq!(first_broken_line(&ledger, &contents), None);
}

#[test]
fn test_modified_file_breaks_its_line() {
    // Given: A chain over three files
    let files: Vec<(String, Vec<u8>)> = (1..=3)
        .map(|i| (format!("f{}", i), format!("content {}", i).into_bytes()))
        .collect();
    let ledger = String::from_utf8(
        build_chain(DigestAlgorithm::Sha256, DigestEntry::empty(), &files).build(),
    )
    .unwrap();

    // When: The second file is altered
    let mut contents: Vec<(&str, Vec<u8>)> =
        files.iter().map(|(n, c)| (n.as_str(), c.clone())).collect();
    contents[1].1 = b"tampered".to_vec();

    // Then: Verification fails at the second entry
    assert_eq!(first_broken_line(&ledger, &contents), Some(2));
}

#[test]
fn test_chain_continues_across_archives() {
    // Given: A chain sealed after two files
    let algorithm = DigestAlgorithm::Sha512;
    let first = build_chain(
        algorithm,
        DigestEntry::empty(),
        &[("a".to_string(), b"1".to_vec()), ("b".to_string(), b"2".to_vec())],
    );
    let tail = first.last_digest();

    // When: A new chain starts from the sealed archive's tail
    let mut next = LinkingInfoBuilder::new(algorithm, DigestEntry::new(tail.digest(), "archive-1.zip"));
    next.add_next_file("c", &algorithm.digest(b"3"));

    // Then: Its header names the previous archive and its first entry chains from it
    let ledger = String::from_utf8(next.build()).unwrap();
    let header = ledger.lines().next().unwrap();
    assert_eq!(header, format!("{} archive-1.zip SHA-512", tail.digest()));
    assert_eq!(first_broken_line(&ledger, &[("c", b"3".to_vec())]), None);
}

#[test]
fn test_determinism_depends_on_origin() {
    // Given: Two builders with different origins
    let algorithm = DigestAlgorithm::Sha512;
    let mut with_origin = LinkingInfoBuilder::new(algorithm, DigestEntry::new("deadbeef", "test"));
    let mut without_origin = LinkingInfoBuilder::new(algorithm, DigestEntry::new("", ""));

    // When: The same file is added to both
    with_origin.add_next_file("x", &algorithm.digest(b"same"));
    without_origin.add_next_file("x", &algorithm.digest(b"same"));

    // Then: The tails differ and the blank origin is written as dashes
    assert_ne!(with_origin.tail_digest(), without_origin.tail_digest());
    assert!(String::from_utf8(without_origin.build()).unwrap().starts_with("- - SHA-512\n"));
}

proptest! {
    #[test]
    fn prop_reset_equals_fresh_builder(
        before in proptest::collection::vec(any::<Vec<u8>>(), 0..5),
        after in proptest::collection::vec(any::<Vec<u8>>(), 0..5),
        origin_digest in "[0-9a-f]{0,16}",
        origin_label in "[a-z.]{0,8}",
    ) {
        let algorithm = DigestAlgorithm::Sha256;
        let origin = DigestEntry::new(origin_digest, origin_label);

        let mut reused = LinkingInfoBuilder::new(algorithm, DigestEntry::empty());
        for (i, content) in before.iter().enumerate() {
            reused.add_next_file(&format!("b{}", i), &algorithm.digest(content));
        }
        reused.reset(origin.clone());

        let mut fresh = LinkingInfoBuilder::new(algorithm, origin);
        for (i, content) in after.iter().enumerate() {
            reused.add_next_file(&format!("a{}", i), &algorithm.digest(content));
            fresh.add_next_file(&format!("a{}", i), &algorithm.digest(content));
        }

        prop_assert_eq!(reused.build(), fresh.build());
        prop_assert_eq!(reused.tail_digest(), fresh.tail_digest());
    }

    #[test]
    fn prop_ledger_always_recomputes(
        contents in proptest::collection::vec(any::<Vec<u8>>(), 1..8),
    ) {
        let files: Vec<(String, Vec<u8>)> = contents
            .into_iter()
            .enumerate()
            .map(|(i, c)| (format!("entry-{}", i), c))
            .collect();
        let builder = build_chain(DigestAlgorithm::Sha512, DigestEntry::new("abcd", "prev"), &files);
        let ledger = String::from_utf8(builder.build()).unwrap();
        let refs: Vec<(&str, Vec<u8>)> = files.iter().map(|(n, c)| (n.as_str(), c.clone())).collect();

        prop_assert_eq!(first_broken_line(&ledger, &refs), None);
        prop_assert_eq!(builder.entries().len(), files.len());
    }
}
