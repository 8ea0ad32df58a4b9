use chainlog_core::{ArchiveRecord, ClientId, DigestAlgorithm};
use chrono::{TimeZone, Utc};

/// Record for `client` with a fixed time and small container body
#[allow(dead_code)]
pub fn record(id: u64, client: ClientId) -> ArchiveRecord {
    let time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    ArchiveRecord::new(
        id,
        format!("ID{}", id),
        false,
        time,
        client,
        format!("container-{}", id).into_bytes(),
    )
}

/// Recompute every ledger line from the previous one and the content digests
///
/// Returns the index of the first line that does not verify.
#[allow(dead_code)]
pub fn first_broken_line(ledger: &str, contents: &[(&str, Vec<u8>)]) -> Option<usize> {
    let mut lines = ledger.lines();
    let header: Vec<&str> = lines.next()?.split(' ').collect();
    let algorithm: DigestAlgorithm = header[2].parse().ok()?;
    let mut tail = if header[0] == "-" {
        String::new()
    } else {
        header[0].to_string()
    };

    for (index, line) in lines.enumerate() {
        let (digest, label) = line.split_once(' ')?;
        let Some((_, content)) = contents.iter().find(|(name, _)| *name == label) else {
            return Some(index + 1);
        };
        let content_digest = hex::encode(algorithm.digest(content));
        let expected = hex::encode(algorithm.digest(format!("{}{}", tail, content_digest).as_bytes()));
        if expected != digest {
            return Some(index + 1);
        }
        tail = digest.to_string();
    }

    None
}
