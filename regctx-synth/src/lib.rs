//! Synthetic AArch64 signal frames and register notes for testing.
//!
//! [`SynthSigframe`] lays out an `rt_sigframe` the way the kernel's signal
//! delivery does, down to the reserved-area record chain and the extra-block
//! indirection, and `finish()` yields a [`MemoryImage`] that regctx's frame
//! scanner can read as if it were target memory. The record layouts are built
//! by hand here rather than through regctx-common's constants wherever
//! practical, so that incorrect changes to those constants show up as test
//! failures instead of being mirrored on both sides.
//!
//! This exists primarily as an internal dev-dependency of regctx, but is
//! published for the sake of satisfying cargo-publish.

// Some test_assembler types do not have Debug, so be a bit more lenient here.
#![allow(missing_debug_implementations)]

use regctx_common::format::{self, SVE_HEADER};
use scroll::Pwrite;
use test_assembler::Section;

/// Offset from the frame's stack pointer to the embedded `sigcontext`.
const SIGCONTEXT_OFFSET: u64 = 128 + 176;
/// Offset from the stack pointer to the start of the reserved area.
const RESERVED_OFFSET: u64 = SIGCONTEXT_OFFSET + 288;
/// Size of the reserved area.
const RESERVED_SIZE: u64 = 4096;
/// Bytes of (magic, size) header at the start of every record.
const RECORD_HEADER_SIZE: u32 = 8;

fn section(endian: scroll::Endian) -> Section {
    Section::with_endian(match endian {
        scroll::Endian::Little => test_assembler::Endian::Little,
        scroll::Endian::Big => test_assembler::Endian::Big,
    })
}

/// A block of bytes at a fixed base address, readable as target memory.
pub struct MemoryImage {
    pub base: u64,
    pub bytes: Vec<u8>,
}

impl MemoryImage {
    /// Read `len` bytes at `address`, or `None` if any byte falls outside the
    /// image.
    pub fn read(&self, address: u64, len: usize) -> Option<Vec<u8>> {
        let offset = address.checked_sub(self.base)? as usize;
        self.bytes
            .get(offset..offset.checked_add(len)?)
            .map(<[u8]>::to_vec)
    }
}

/// One reserved-area record: a (magic, size) header plus a body.
///
/// The body holds everything after the header; it is zero-padded out to the
/// declared size when the frame is assembled, so bodies only need to spell
/// out their meaningful leading bytes.
pub struct CtxRecord {
    magic: u32,
    size: u32,
    body: Section,
}

impl CtxRecord {
    pub fn new(magic: u32, size: u32, body: Section) -> CtxRecord {
        CtxRecord { magic, size, body }
    }
}

/// A writer of synthetic signal frames.
///
/// Records added with [`add_record`][Self::add_record] land in the
/// `sigcontext` reserved area in order; records added with
/// [`add_extra_record`][Self::add_extra_record] land in a separate block past
/// the end of the frame, reached through an automatically appended extra
/// record. Both chains get their zero terminator.
pub struct SynthSigframe {
    endian: scroll::Endian,
    sp: u64,
    records: Vec<CtxRecord>,
    extra_records: Vec<CtxRecord>,
}

impl SynthSigframe {
    pub fn new(endian: scroll::Endian, sp: u64) -> SynthSigframe {
        SynthSigframe {
            endian,
            sp,
            records: Vec::new(),
            extra_records: Vec::new(),
        }
    }

    pub fn add_record(mut self, record: CtxRecord) -> SynthSigframe {
        self.records.push(record);
        self
    }

    pub fn add_extra_record(mut self, record: CtxRecord) -> SynthSigframe {
        self.extra_records.push(record);
        self
    }

    /// Serialize the frame into a memory image based at the stack pointer.
    pub fn finish(self) -> MemoryImage {
        let SynthSigframe {
            endian,
            sp,
            records,
            extra_records,
        } = self;
        let extra_base = sp + RESERVED_OFFSET + RESERVED_SIZE;
        let has_extra = !extra_records.is_empty();

        let mut reserved = section(endian);
        for record in records {
            reserved = emit_record(reserved, record);
        }
        if has_extra {
            // struct extra_context: datap, then a size field and padding.
            reserved = reserved
                .D32(format::EXTRA_MAGIC)
                .D32(32)
                .D64(extra_base)
                .append_repeated(0, 16);
        }
        reserved = reserved.D32(0).D32(0);
        let used = reserved.size();
        assert!(used <= RESERVED_SIZE, "records overflow the reserved area");
        reserved = reserved.append_repeated(0, (RESERVED_SIZE - used) as usize);

        let mut frame = section(endian)
            .append_repeated(0, RESERVED_OFFSET as usize)
            .append_section(reserved);

        if has_extra {
            let mut extra = section(endian);
            for record in extra_records {
                extra = emit_record(extra, record);
            }
            extra = extra.D32(0).D32(0);
            frame = frame.append_section(extra);
        }

        MemoryImage {
            base: sp,
            bytes: frame.get_contents().unwrap(),
        }
    }
}

fn emit_record(section: Section, record: CtxRecord) -> Section {
    let body = record.body.get_contents().unwrap();
    let padding = record
        .size
        .checked_sub(RECORD_HEADER_SIZE + body.len() as u32)
        .expect("record body larger than its declared size");
    section
        .D32(record.magic)
        .D32(record.size)
        .append_bytes(&body)
        .append_repeated(0, padding as usize)
}

/// A body with no content beyond the record header.
pub fn empty_body() -> Section {
    Section::new()
}

/// The body of an `fpsimd_context` with zeroed vector registers.
pub fn fpsimd_body(endian: scroll::Endian, fpsr: u32, fpcr: u32) -> Section {
    section(endian)
        .D32(fpsr)
        .D32(fpcr)
        .append_repeated(0, 32 * format::V_REGISTER_SIZE)
}

/// The body of an `fpsimd_context` carrying the given vector register bytes.
///
/// Bytes are laid down exactly as given; callers model memory byte order
/// themselves.
pub fn fpsimd_body_with_vregs(
    endian: scroll::Endian,
    fpsr: u32,
    fpcr: u32,
    vregs: &[[u8; 16]; 32],
) -> Section {
    let mut body = section(endian).D32(fpsr).D32(fpcr);
    for vreg in vregs {
        body = body.append_bytes(vreg);
    }
    body
}

/// The leading fields of an `sve_context` body: vl, then flags.
pub fn sve_body(endian: scroll::Endian, vl: u16, flags: u16) -> Section {
    section(endian).D16(vl).D16(flags)
}

/// The leading fields of a `za_context` body.
pub fn za_body(endian: scroll::Endian, svl: u16) -> Section {
    section(endian).D16(svl)
}

/// The body of a `tpidr2_context`.
pub fn tpidr2_body(endian: scroll::Endian, tpidr2: u64) -> Section {
    section(endian).D64(tpidr2)
}

/// The leading fields of a `zt_context` body: the register count.
pub fn zt_body(endian: scroll::Endian, nregs: u16) -> Section {
    section(endian).D16(nregs)
}

/// A register note: an [`SVE_HEADER`] followed by payload bytes.
pub fn note_with_header(endian: scroll::Endian, header: SVE_HEADER, payload: &[u8]) -> Vec<u8> {
    let mut note = vec![0u8; format::SVE_HEADER_SIZE];
    note.pwrite_with(header, 0, endian).unwrap();
    note.extend_from_slice(payload);
    note
}

/// A header-only scalable note with the given vector length and flags, sized
/// the way the kernel sizes its dummy notes.
pub fn sve_header_note(endian: scroll::Endian, vl: u16, flags: u16) -> Vec<u8> {
    note_with_header(
        endian,
        SVE_HEADER {
            size: format::SVE_CORE_DUMMY_SIZE,
            max_size: format::SVE_CORE_DUMMY_MAX_SIZE,
            vl,
            max_vl: format::SVE_CORE_DUMMY_MAX_VL,
            flags,
            reserved: 0,
        },
        &[],
    )
}
