//! Small helpers shared across archive, postings and pipeline code.

use crc::{Crc, CRC_32_ISO_HDLC};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// IEEE CRC-32, used both for `Archive::hash` (spec. 4.4) and as the
/// general-purpose hash behind non-numeric trie paths and per-id worker
/// selection (spec. 4.4: "hash the id to one of `NumServe` stasher
/// goroutines").
pub fn crc32(bytes: &[u8]) -> u32 {
    CRC32.checksum(bytes)
}

/// Picks a stable worker index in `0..num_workers` for `id`, so concurrent
/// stashes of the same id always serialize through the same worker.
pub fn worker_for_id(id: &str, num_workers: usize) -> usize {
    if num_workers == 0 {
        return 0;
    }
    (crc32(id.as_bytes()) as usize) % num_workers
}

/// Variable-length (LEB128-style) unsigned integer encoding used by the
/// postings files (spec. 9: "variable-length integer encoding (delta-gap on
/// ids and on positions)").
pub fn encode_varint(mut n: u64, out: &mut Vec<u8>) {
    loop {
        let mut byte = (n & 0x7f) as u8;
        n >>= 7;
        if n != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if n == 0 {
            break;
        }
    }
}

pub fn decode_varint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate() {
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }
        shift += 7;
        if shift >= 64 {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_stable() {
        assert_eq!(crc32(b"hello"), crc32(b"hello"));
        assert_ne!(crc32(b"hello"), crc32(b"world"));
    }

    #[test]
    fn test_varint_round_trip() {
        for n in [0u64, 1, 127, 128, 300, 1 << 20, u64::MAX] {
            let mut buf = Vec::new();
            encode_varint(n, &mut buf);
            let (decoded, used) = decode_varint(&buf).unwrap();
            assert_eq!(decoded, n);
            assert_eq!(used, buf.len());
        }
    }

    #[test]
    fn test_worker_for_id_is_stable() {
        assert_eq!(worker_for_id("42", 8), worker_for_id("42", 8));
    }
}
