// Integration tests for the chained archive writer
// Covers rotation, record times, entry naming, determinism and abort cleanup

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use chainlog_core::encryption::{ArchiveEncryptor, EncryptionConfig, RecipientPolicy};
use chainlog_core::{DigestAlgorithm, DigestEntry, ExErrorKind, LinkingInfoBuilder, SharedLinkingInfo};
use chainlog_store::archive::{LogArchiveCache, LINKING_INFO_ENTRY};
use common::*;
use std::path::Path;
use std::rc::Rc;
use tempfile::TempDir;

const ARCHIVE_SIZE_SMALL: u64 = 50;
const ARCHIVE_SIZE_MEDIUM: u64 = 350;
const DEFAULT_ARCHIVE_MAX_FILESIZE: u64 = 33_554_432;

fn new_builder(origin: DigestEntry) -> SharedLinkingInfo {
    LinkingInfoBuilder::shared(DigestAlgorithm::Sha512, origin)
}

fn plain_cache(dir: &Path, max: u64, linking: SharedLinkingInfo) -> LogArchiveCache {
    LogArchiveCache::new(linking, EncryptionConfig::disabled(), None, dir, max).unwrap()
}

fn encrypted_cache(
    dir: &Path,
    max: u64,
    linking: SharedLinkingInfo,
    encryptor: Rc<dyn ArchiveEncryptor>,
) -> LogArchiveCache {
    let config = EncryptionConfig::new(RecipientPolicy::SingleDefaultKey(None), None);
    LogArchiveCache::new(linking, config, Some(encryptor), dir, max).unwrap()
}

fn take_archive_bytes(cache: &mut LogArchiveCache) -> Vec<u8> {
    let path = cache.get_archive_file().unwrap();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    bytes
}

#[test]
fn test_add_one_entry_of_normal_size() {
    // Given: A cache with the default size ceiling
    let dir = TempDir::new().unwrap();
    let mut cache = plain_cache(
        dir.path(),
        DEFAULT_ARCHIVE_MAX_FILESIZE,
        new_builder(DigestEntry::empty()),
    );

    // When: One normal request is added
    cache.add(Some(&request_normal(0))).unwrap();

    // Then: No rotation, and the record time bounds the archive
    assert!(!cache.is_rotating());
    assert_eq!(
        cache.start_time().unwrap().timestamp_millis(),
        LOG_TIME_REQUEST_NORMAL_LATEST
    );
    assert_eq!(
        cache.end_time().unwrap().timestamp_millis(),
        LOG_TIME_REQUEST_NORMAL_LATEST
    );

    // And: The archive holds the entry followed by the ledger
    let names = entry_names(&take_archive_bytes(&mut cache));
    assert_eq!(names, vec!["ID1-request-0.asice", LINKING_INFO_ENTRY]);
}

#[test]
fn test_rotate_immediately_when_one_entry_is_too_large() {
    // Given: A cache with a tiny size ceiling
    let dir = TempDir::new().unwrap();
    let mut cache = plain_cache(dir.path(), ARCHIVE_SIZE_SMALL, new_builder(DigestEntry::empty()));

    // When: A large request is added
    cache.add(Some(&request_too_large(0))).unwrap();

    // Then: The cache rotates and the archive holds that entry
    assert!(cache.is_rotating());
    let names = entry_names(&take_archive_bytes(&mut cache));
    assert_eq!(names, vec!["ID2-request-0.asice", LINKING_INFO_ENTRY]);
}

#[test]
fn test_absent_record_rejected() {
    // Given: A fresh cache
    let dir = TempDir::new().unwrap();
    let mut cache = plain_cache(dir.path(), DEFAULT_ARCHIVE_MAX_FILESIZE, new_builder(DigestEntry::empty()));

    // When: Nothing is added
    let err = cache.add(None).unwrap_err();

    // Then: The call is rejected and no file was created
    assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn test_add_multiple_records_with_rotation_meanwhile() {
    // Given: A cache with a medium size ceiling
    let dir = TempDir::new().unwrap();
    let linking = new_builder(DigestEntry::empty());
    let mut cache = plain_cache(dir.path(), ARCHIVE_SIZE_MEDIUM, linking.clone());

    // When: A normal request is added
    cache.add(Some(&request_normal(0))).unwrap();

    // Then: No rotation yet
    assert!(!cache.is_rotating(), "Step 1: no need to rotate yet");

    // When: A large request follows
    cache.add(Some(&request_too_large(1))).unwrap();

    // Then: The cache rotates with both records in the archive
    assert!(cache.is_rotating(), "Step 2: should be rotated");
    assert_eq!(
        cache.start_time().unwrap().timestamp_millis(),
        LOG_TIME_REQUEST_LARGE_EARLIEST
    );
    assert_eq!(
        cache.end_time().unwrap().timestamp_millis(),
        LOG_TIME_REQUEST_NORMAL_LATEST
    );
    let names = entry_names(&take_archive_bytes(&mut cache));
    assert_eq!(
        names,
        vec!["ID1-request-0.asice", "ID2-request-1.asice", LINKING_INFO_ENTRY]
    );

    // When: A response is added after the archive was taken
    cache.add(Some(&response_normal(2))).unwrap();

    // Then: A new archive starts with only the response
    assert!(!cache.is_rotating(), "Step 3: new rotation");
    assert_eq!(
        cache.start_time().unwrap().timestamp_millis(),
        LOG_TIME_RESPONSE_NORMAL
    );
    assert_eq!(
        cache.end_time().unwrap().timestamp_millis(),
        LOG_TIME_RESPONSE_NORMAL
    );
    let names = entry_names(&take_archive_bytes(&mut cache));
    assert_eq!(names, vec!["ID3-response-2.asice", LINKING_INFO_ENTRY]);

    // And: The shared chain kept growing across the rotation
    assert_eq!(linking.borrow().entries().len(), 3);
}

#[test]
fn test_add_while_rotating_discards_untaken_archive() {
    // Given: A rotating cache whose archive was not taken
    let dir = TempDir::new().unwrap();
    let mut cache = plain_cache(dir.path(), ARCHIVE_SIZE_SMALL, new_builder(DigestEntry::empty()));
    cache.add(Some(&request_too_large(0))).unwrap();
    assert!(cache.is_rotating());

    // When: Another record is added
    cache.add(Some(&request_normal(1))).unwrap();

    // Then: Only one temp file exists, holding the new record
    assert_eq!(files_in(dir.path()).len(), 1);
    let names = entry_names(&take_archive_bytes(&mut cache));
    assert_eq!(names, vec!["ID1-request-1.asice", LINKING_INFO_ENTRY]);
}

#[test]
fn test_avoid_name_clash_within_one_archive() {
    // Given: A cache
    let dir = TempDir::new().unwrap();
    let mut cache = plain_cache(dir.path(), DEFAULT_ARCHIVE_MAX_FILESIZE, new_builder(DigestEntry::empty()));

    // When: The same record is added twice
    let record = request_normal(0);
    cache.add(Some(&record)).unwrap();
    cache.add(Some(&record)).unwrap();

    // Then: The second entry gets a distinct name
    let names = entry_names(&take_archive_bytes(&mut cache));
    assert_eq!(
        names,
        vec!["ID1-request-0.asice", "ID1-request-0-1.asice", LINKING_INFO_ENTRY]
    );
}

#[test]
fn test_archiving_is_deterministic() {
    // Given: Two chains from the same origin and one from an empty origin
    let dir = TempDir::new().unwrap();
    let builder1 = new_builder(DigestEntry::new("deadbeef", "test"));
    let builder2 = new_builder(DigestEntry::new("deadbeef", "test"));
    let builder3 = new_builder(DigestEntry::new("", ""));

    // When: The same record is archived with each
    let archive_with = |linking: &SharedLinkingInfo| {
        let mut cache = plain_cache(dir.path(), DEFAULT_ARCHIVE_MAX_FILESIZE, linking.clone());
        cache.add(Some(&request_normal(0))).unwrap();
        take_archive_bytes(&mut cache)
    };
    let bytes1 = archive_with(&builder1);
    let bytes2 = archive_with(&builder2);
    let bytes3 = archive_with(&builder3);

    // Then: Equal origins give identical archives and tails
    assert_eq!(bytes1, bytes2);
    assert_eq!(builder1.borrow().last_digest(), builder2.borrow().last_digest());

    // And: A different origin changes both
    assert_ne!(bytes1, bytes3);
    assert_ne!(builder1.borrow().last_digest(), builder3.borrow().last_digest());
}

#[test]
fn test_linking_info_entry_verifies() {
    // Given: An archive with two records
    let dir = TempDir::new().unwrap();
    let mut cache = plain_cache(dir.path(), DEFAULT_ARCHIVE_MAX_FILESIZE, new_builder(DigestEntry::empty()));
    cache.add(Some(&request_normal(0))).unwrap();
    cache.add(Some(&response_normal(1))).unwrap();

    // When: The ledger is read back
    let entries = zip_entries(&take_archive_bytes(&mut cache));
    let (_, ledger) = entries.last().unwrap();
    let ledger = String::from_utf8(ledger.clone()).unwrap();
    let lines: Vec<&str> = ledger.lines().collect();

    // Then: Each line chains from the previous one over the entry digest
    assert_eq!(lines[0], "- - SHA-512");
    let algorithm = DigestAlgorithm::Sha512;
    let mut tail = String::new();
    for (line, (name, content)) in lines[1..].iter().zip(entries.iter()) {
        let expected = hex::encode(algorithm.digest(
            format!("{}{}", tail, hex::encode(algorithm.digest(content))).as_bytes(),
        ));
        assert_eq!(*line, format!("{} {}", expected, name));
        tail = expected;
    }
}

#[test]
fn test_encrypted_archive_round_trips() {
    // Given: A cache encrypting through a reversible primitive
    let dir = TempDir::new().unwrap();
    let mut cache = encrypted_cache(
        dir.path(),
        DEFAULT_ARCHIVE_MAX_FILESIZE,
        new_builder(DigestEntry::empty()),
        Rc::new(XorEncryptor),
    );

    // When: A record is archived
    cache.add(Some(&request_normal(0))).unwrap();
    let sealed = take_archive_bytes(&mut cache);

    // Then: The file is not a plain zip but decrypts to one
    assert_ne!(&sealed[..2], b"PK");
    let names = entry_names(&xor_decrypt(&sealed));
    assert_eq!(names, vec!["ID1-request-0.asice", LINKING_INFO_ENTRY]);
}

#[test]
fn test_write_failure_aborts_and_cleans_up() {
    // Given: An encryptor that breaks after a few bytes
    let dir = TempDir::new().unwrap();
    let mut cache = encrypted_cache(
        dir.path(),
        DEFAULT_ARCHIVE_MAX_FILESIZE,
        new_builder(DigestEntry::empty()),
        Rc::new(FailingEncryptor { limit: 16 }),
    );

    // When: A large record is added
    let err = cache.add(Some(&request_too_large(0))).unwrap_err();

    // Then: The archive is aborted with the write failure as cause
    assert_eq!(err.kind(), ExErrorKind::ArchiveAborted);
    assert!(err.source_error().is_some());

    // And: No temp file is left behind and the cache starts over
    assert!(files_in(dir.path()).is_empty());
    assert!(cache.is_empty());
    assert!(cache.start_time().is_none());
}

#[test]
fn test_seal_of_empty_cache_holds_only_ledger() {
    // Given: A cache with no records
    let dir = TempDir::new().unwrap();
    let mut cache = plain_cache(
        dir.path(),
        DEFAULT_ARCHIVE_MAX_FILESIZE,
        new_builder(DigestEntry::new("beef", "prev.zip")),
    );

    // When: The archive is taken
    let entries = zip_entries(&take_archive_bytes(&mut cache));

    // Then: Only the ledger header is present
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, LINKING_INFO_ENTRY);
    assert_eq!(entries[0].1, b"beef prev.zip SHA-512\n".to_vec());
}
