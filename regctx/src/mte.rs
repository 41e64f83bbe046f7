//! Memory-tagging helpers: granule math and the packed tag encoding used by
//! `PT_AARCH64_MEMTAG_MTE` core-file segments.
//!
//! One 4-bit tag covers each 16-byte granule, and the dump packs two tags per
//! byte with the lower-addressed granule in the low nibble. Reading tags for
//! an arbitrary address range therefore has to cope with the range starting
//! on an odd granule, where the first tag of interest sits in the high nibble
//! of its byte.

use crate::format::MTE_GRANULE_SIZE;

fn align_down(address: u64) -> u64 {
    address & !(MTE_GRANULE_SIZE - 1)
}

/// The number of tag granules spanned by `len` bytes at `address`.
///
/// Partially covered granules count; an empty range covers none.
pub fn tag_granules(address: u64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let first = align_down(address);
    let last = align_down(address + len as u64 - 1);
    (1 + (last - first) / MTE_GRANULE_SIZE) as usize
}

/// Pack one tag per granule into the two-tags-per-byte dump encoding.
///
/// An odd tag count leaves the final high nibble zero.
pub fn pack_tags(tags: &[u8]) -> Vec<u8> {
    tags.chunks(2)
        .map(|pair| {
            let high = pair.get(1).copied().unwrap_or(0);
            (high << 4) | (pair[0] & 0xf)
        })
        .collect()
}

/// Unpack two-tags-per-byte dump bytes into one tag per granule.
///
/// `skip_first` drops the leading low nibble, for ranges that begin on an odd
/// granule where the first byte's low nibble belongs to the granule before
/// the range.
pub fn unpack_tags(packed: &[u8], skip_first: bool) -> Vec<u8> {
    let mut tags = Vec::with_capacity(packed.len() * 2);
    for byte in packed {
        tags.push(byte & 0xf);
        tags.push((byte >> 4) & 0xf);
    }
    if skip_first && !tags.is_empty() {
        tags.remove(0);
    }
    tags
}

/// Extract the tags covering `len` bytes at `address` from a packed memtag
/// section whose first byte describes the granule at `section_vma`.
///
/// Returns `None` when `address` precedes the section or the section is too
/// short to cover the range. Requesting zero bytes yields zero tags.
pub fn decode_packed_tags(
    packed: &[u8],
    section_vma: u64,
    address: u64,
    len: usize,
) -> Option<Vec<u8>> {
    if address < section_vma {
        return None;
    }

    // Granule counts for [section_vma, address + len) and [address,
    // address + len); their difference is how many granules to skip.
    let span = (address - section_vma) as usize + len;
    let granules_from_vma = tag_granules(section_vma, span);
    let granules = tag_granules(address, len);
    let skipped = granules_from_vma - granules;

    let offset = skipped >> 1;
    let skip_first = skipped % 2 != 0;
    let bytes = (granules + usize::from(skip_first) + 1) >> 1;

    let packed = packed.get(offset..offset + bytes)?;
    let mut tags = unpack_tags(packed, skip_first);
    tags.truncate(granules);
    Some(tags)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tag_granules() {
        assert_eq!(tag_granules(0x1000, 0), 0);
        assert_eq!(tag_granules(0x1000, 1), 1);
        assert_eq!(tag_granules(0x1000, 16), 1);
        assert_eq!(tag_granules(0x1000, 17), 2);
        // An unaligned start pulls in the granule it lands inside.
        assert_eq!(tag_granules(0x100f, 2), 2);
        assert_eq!(tag_granules(0x1008, 32), 3);
    }

    #[test]
    fn test_pack_low_nibble_first() {
        assert_eq!(pack_tags(&[0x1, 0x2, 0x3, 0x4]), vec![0x21, 0x43]);
        // Odd count: the final high nibble is zero.
        assert_eq!(pack_tags(&[0xa, 0xb, 0xc]), vec![0xba, 0x0c]);
        assert_eq!(pack_tags(&[]), Vec::<u8>::new());
    }

    #[test]
    fn test_unpack() {
        assert_eq!(unpack_tags(&[0x21, 0x43], false), vec![0x1, 0x2, 0x3, 0x4]);
        assert_eq!(unpack_tags(&[0x21, 0x43], true), vec![0x2, 0x3, 0x4]);
    }

    #[test]
    fn test_pack_unpack_round_trip() {
        let tags: Vec<u8> = (0..9).map(|i| i & 0xf).collect();
        let mut unpacked = unpack_tags(&pack_tags(&tags), false);
        unpacked.truncate(tags.len());
        assert_eq!(unpacked, tags);
    }

    #[test]
    fn test_decode_aligned_range() {
        // Section covers 8 granules starting at 0x1000.
        let tags: Vec<u8> = (0..8).collect();
        let packed = pack_tags(&tags);
        assert_eq!(
            decode_packed_tags(&packed, 0x1000, 0x1000, 8 * 16),
            Some(tags.clone())
        );
        // A range further into the section.
        assert_eq!(
            decode_packed_tags(&packed, 0x1000, 0x1020, 32),
            Some(vec![2, 3])
        );
    }

    #[test]
    fn test_decode_odd_granule_start() {
        let tags: Vec<u8> = (0..8).collect();
        let packed = pack_tags(&tags);
        // Starts at granule 3: the first tag of interest is a high nibble.
        assert_eq!(
            decode_packed_tags(&packed, 0x1000, 0x1030, 48),
            Some(vec![3, 4, 5])
        );
        // Unaligned address inside granule 5.
        assert_eq!(
            decode_packed_tags(&packed, 0x1000, 0x1058, 8),
            Some(vec![5])
        );
    }

    #[test]
    fn test_decode_out_of_range() {
        let packed = pack_tags(&[1, 2, 3, 4]);
        assert_eq!(decode_packed_tags(&packed, 0x1000, 0x0f00, 16), None);
        assert_eq!(decode_packed_tags(&packed, 0x1000, 0x1030, 64), None);
        assert_eq!(decode_packed_tags(&packed, 0x1000, 0x1000, 0), Some(vec![]));
    }
}
