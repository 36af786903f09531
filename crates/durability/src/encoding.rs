//! WAL entry encoding and decoding
//!
//! ## Entry Format
//!
//! ```text
//! [length: u32][type: u8][payload: bytes][crc32: u32]
//! ```
//!
//! - **length**: size of type + payload + crc, little endian, not counting itself
//! - **type**: entry type tag (1=BeginTxn, 2=SeriesCreated, 3=BuildCreated,
//!   4=SeriesDeleted, 5=CommitTxn)
//! - **payload**: bincode-serialized `WalEntry`
//! - **crc32**: CRC32 over \[type\]\[payload\], little endian

use crate::wal::WalEntry;
use buildseq_core::{Error, Result};
use crc32fast::Hasher;

const TYPE_BEGIN_TXN: u8 = 1;
const TYPE_SERIES_CREATED: u8 = 2;
const TYPE_BUILD_CREATED: u8 = 3;
const TYPE_SERIES_DELETED: u8 = 4;
const TYPE_COMMIT_TXN: u8 = 5;

/// Bytes of framing around a payload: length(4) + type(1) + crc(4)
pub const FRAME_OVERHEAD: usize = 9;

fn type_tag(entry: &WalEntry) -> u8 {
    match entry {
        WalEntry::BeginTxn { .. } => TYPE_BEGIN_TXN,
        WalEntry::SeriesCreated { .. } => TYPE_SERIES_CREATED,
        WalEntry::BuildCreated { .. } => TYPE_BUILD_CREATED,
        WalEntry::SeriesDeleted { .. } => TYPE_SERIES_DELETED,
        WalEntry::CommitTxn { .. } => TYPE_COMMIT_TXN,
    }
}

fn checksum(type_tag: u8, payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[type_tag]);
    hasher.update(payload);
    hasher.finalize()
}

/// Encode a WAL entry into a framed buffer ready for appending
pub fn encode_entry(entry: &WalEntry) -> Result<Vec<u8>> {
    let tag = type_tag(entry);
    let payload = bincode::serialize(entry)?;

    let total_len = 1 + payload.len() + 4;
    let total_len_u32 = u32::try_from(total_len)
        .map_err(|_| Error::SerializationError(format!("WAL entry too large: {} bytes", total_len)))?;

    let mut buf = Vec::with_capacity(4 + total_len);
    buf.extend_from_slice(&total_len_u32.to_le_bytes());
    buf.push(tag);
    buf.extend_from_slice(&payload);
    buf.extend_from_slice(&checksum(tag, &payload).to_le_bytes());
    Ok(buf)
}

/// Decode one WAL entry from the start of `buf`
///
/// Returns the entry and the number of bytes consumed. `offset` is the file
/// offset of `buf[0]` and is only used in error messages.
///
/// # Errors
///
/// - `Error::IncompleteEntry` if `buf` ends before the entry does (torn tail)
/// - `Error::Corruption` on an impossible length, a CRC mismatch, an
///   undecodable payload, or a type tag that disagrees with the payload
pub fn decode_entry(buf: &[u8], offset: u64) -> Result<(WalEntry, usize)> {
    let Some(len_bytes) = buf.get(..4) else {
        return Err(Error::IncompleteEntry {
            offset,
            have: buf.len(),
            needed: 4,
        });
    };
    let mut len_arr = [0u8; 4];
    len_arr.copy_from_slice(len_bytes);
    let total_len = u32::from_le_bytes(len_arr) as usize;

    if total_len < 5 {
        return Err(Error::Corruption(format!(
            "offset {}: invalid entry length {} (minimum is 5 bytes)",
            offset, total_len
        )));
    }
    if buf.len() < 4 + total_len {
        return Err(Error::IncompleteEntry {
            offset,
            have: buf.len(),
            needed: 4 + total_len,
        });
    }

    let tag = buf[4];
    let payload = &buf[5..4 + total_len - 4];
    let mut crc_arr = [0u8; 4];
    crc_arr.copy_from_slice(&buf[total_len..4 + total_len]);
    let expected_crc = u32::from_le_bytes(crc_arr);
    let actual_crc = checksum(tag, payload);
    if actual_crc != expected_crc {
        return Err(Error::Corruption(format!(
            "offset {}: CRC mismatch: expected {:08x}, got {:08x}",
            offset, expected_crc, actual_crc
        )));
    }

    let entry: WalEntry = bincode::deserialize(payload).map_err(|e| {
        Error::Corruption(format!("offset {}: deserialization failed: {}", offset, e))
    })?;
    if type_tag(&entry) != tag {
        return Err(Error::Corruption(format!(
            "offset {}: type tag mismatch: expected {}, got {}",
            offset,
            type_tag(&entry),
            tag
        )));
    }

    Ok((entry, 4 + total_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildseq_core::{BuildId, BuildNumber, BuildRecord, SeriesId, SeriesKey, SeriesRecord};
    use chrono::Utc;

    fn entries() -> Vec<WalEntry> {
        let key = SeriesKey::new(1, 1);
        vec![
            WalEntry::BeginTxn {
                txn_id: 1,
                series: key,
                timestamp: Utc::now(),
            },
            WalEntry::SeriesCreated {
                txn_id: 1,
                record: SeriesRecord {
                    id: SeriesId(1),
                    key,
                    created_on: Utc::now(),
                },
            },
            WalEntry::BuildCreated {
                txn_id: 1,
                series: key,
                build: BuildRecord {
                    id: BuildId(1),
                    series_id: SeriesId(1),
                    commit: "931ad6480dce38486a221119bccd0a35e5cdbb81".into(),
                    build_number: BuildNumber::FIRST,
                    created_on: Utc::now(),
                },
            },
            WalEntry::SeriesDeleted {
                txn_id: 2,
                series: key,
            },
            WalEntry::CommitTxn {
                txn_id: 1,
                version: 1,
            },
        ]
    }

    #[test]
    fn test_every_entry_type_decodes() {
        for entry in entries() {
            let encoded = encode_entry(&entry).unwrap();
            let (decoded, consumed) = decode_entry(&encoded, 0).unwrap();
            assert_eq!(decoded, entry);
            assert_eq!(consumed, encoded.len());
        }
    }

    #[test]
    fn test_decode_consumes_one_entry_of_many() {
        let all = entries();
        let mut buf = Vec::new();
        for entry in &all {
            buf.extend(encode_entry(entry).unwrap());
        }
        let mut offset = 0;
        let mut decoded = Vec::new();
        while offset < buf.len() {
            let (entry, consumed) = decode_entry(&buf[offset..], offset as u64).unwrap();
            decoded.push(entry);
            offset += consumed;
        }
        assert_eq!(decoded, all);
    }

    #[test]
    fn test_truncated_entry_is_incomplete() {
        let encoded = encode_entry(&entries()[2]).unwrap();
        for cut in [0, 3, 4, encoded.len() - 1] {
            let err = decode_entry(&encoded[..cut], 100).unwrap_err();
            assert!(
                matches!(err, Error::IncompleteEntry { offset: 100, .. }),
                "cut at {} gave {:?}",
                cut,
                err
            );
        }
    }

    #[test]
    fn test_flipped_payload_bit_is_corruption() {
        let mut encoded = encode_entry(&entries()[2]).unwrap();
        let mid = encoded.len() / 2;
        encoded[mid] ^= 0x01;
        assert!(matches!(
            decode_entry(&encoded, 0),
            Err(Error::Corruption(msg)) if msg.contains("CRC mismatch")
        ));
    }

    #[test]
    fn test_wrong_type_tag_is_corruption() {
        let mut encoded = encode_entry(&entries()[4]).unwrap();
        encoded[4] = TYPE_BEGIN_TXN;
        // Recompute the CRC so only the tag check can fail
        let payload_end = encoded.len() - 4;
        let crc = checksum(encoded[4], &encoded[5..payload_end]);
        encoded[payload_end..].copy_from_slice(&crc.to_le_bytes());
        assert!(matches!(
            decode_entry(&encoded, 0),
            Err(Error::Corruption(msg)) if msg.contains("type tag")
        ));
    }

    #[test]
    fn test_tiny_length_is_corruption() {
        let buf = [2u8, 0, 0, 0, 0, 0];
        assert!(matches!(decode_entry(&buf, 0), Err(Error::Corruption(_))));
    }
}
