//! Interface boundaries to the surrounding debugger: target memory for the
//! signal-frame path, and the core file's section table for the note path.

use std::collections::BTreeMap;

/// Read access to a stopped target's memory.
///
/// A failed read returns `None` and is never retried: the memory being read is
/// a snapshot that will not become available on a second attempt. Probing past
/// the end of a signal frame is an expected way for record scanning to stop.
pub trait TargetMemory {
    /// Read `len` bytes at `address`, or `None` if any byte is unreadable.
    fn read_memory(&self, address: u64, len: usize) -> Option<Vec<u8>>;
}

/// Read access to a core file's named note sections.
pub trait CoreSections {
    /// The size of the named section, or `None` if it is absent.
    fn section_size(&self, name: &str) -> Option<usize>;

    /// Read `len` bytes at `offset` within the named section.
    fn section_contents(&self, name: &str, offset: usize, len: usize) -> Option<Vec<u8>>;
}

/// A plain name-to-bytes map works as a section table; handy for tests and for
/// callers that have already sliced their core file.
impl CoreSections for BTreeMap<String, Vec<u8>> {
    fn section_size(&self, name: &str) -> Option<usize> {
        self.get(name).map(|bytes| bytes.len())
    }

    fn section_contents(&self, name: &str, offset: usize, len: usize) -> Option<Vec<u8>> {
        let bytes = self.get(name)?;
        bytes.get(offset..offset.checked_add(len)?).map(<[u8]>::to_vec)
    }
}

// The synthetic frames built for the test suites read like a stopped target.
#[cfg(test)]
impl TargetMemory for regctx_synth::MemoryImage {
    fn read_memory(&self, address: u64, len: usize) -> Option<Vec<u8>> {
        self.read(address, len)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use regctx_synth::MemoryImage;

    #[test]
    fn test_memory_image_bounds() {
        let image = MemoryImage {
            base: 0x1000,
            bytes: vec![1, 2, 3, 4],
        };
        let mem: &dyn TargetMemory = &image;
        assert_eq!(mem.read_memory(0x1000, 4), Some(vec![1, 2, 3, 4]));
        assert_eq!(mem.read_memory(0x1002, 2), Some(vec![3, 4]));
        // Reads below the base or past the end fail whole.
        assert_eq!(mem.read_memory(0xfff, 1), None);
        assert_eq!(mem.read_memory(0x1002, 4), None);
    }

    #[test]
    fn test_map_as_section_table() {
        let mut sections = BTreeMap::new();
        sections.insert(".reg".to_string(), vec![0u8; 272]);
        assert_eq!(sections.section_size(".reg"), Some(272));
        assert_eq!(sections.section_size(".reg2"), None);
        assert_eq!(sections.section_contents(".reg", 264, 8), Some(vec![0u8; 8]));
        assert_eq!(sections.section_contents(".reg", 265, 8), None);
    }
}
