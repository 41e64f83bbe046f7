//! Core-file register-set codecs and the per-configuration note catalog.
//!
//! Every register note is handled by a symmetric supply/collect pair keyed by
//! [`RegsetKind`]: `supply` moves a note's bytes into a
//! [`RegisterFile`], `collect` regenerates note bytes from one. The plain
//! sets (GPR, FPSIMD, pauth, MTE, TLS) are fixed-offset register maps; the
//! scalable sets (SVE, SSVE, ZA) carry an [`SVE_HEADER`] whose flags and sizes
//! discriminate between payload shapes at runtime.
//!
//! `supply` functions validate declared sizes because note bytes come from
//! untrusted core files; `collect` functions assert capacity because their
//! buffers are sized by the catalog, which is an internal contract.

use crate::arch::ArchConfig;
use crate::format::{self, Svcr, SVE_HEADER, SVE_HEADER_SIZE};
use crate::regfile::RegisterFile;
use crate::registers as regs;
use crate::Error;
use scroll::{Pread, Pwrite};

/// The register-set codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegsetKind {
    /// x0-x30, sp, pc, cpsr (`.reg`).
    Gpr,
    /// v0-v31, fpsr, fpcr (`.reg2`).
    Fpsimd,
    /// SVE header + SVE- or FPSIMD-shaped payload (`.reg-aarch-sve`).
    Sve,
    /// Streaming-mode twin of the SVE set (`.reg-aarch-ssve`).
    Ssve,
    /// ZA header + optional payload (`.reg-aarch-za`).
    Za,
    /// ZT0 (`.reg-aarch-zt`).
    Zt,
    /// Pointer-authentication masks (`.reg-aarch-pauth`).
    Pauth,
    /// MTE tag control (`.reg-aarch-mte`).
    Mte,
    /// TLS registers (`.reg-aarch-tls`).
    Tls,
}

/// One entry of the note catalog: everything a core-file writer or reader
/// needs to pre-size and dispatch a section without invoking the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegsetSection {
    /// Core-file section name.
    pub name: &'static str,
    pub min_size: usize,
    pub max_size: usize,
    pub kind: RegsetKind,
    /// Human-readable label, `None` for the classic sets.
    pub label: Option<&'static str>,
    /// Whether the on-disk size may legitimately differ from `max_size`.
    pub variable_size: bool,
}

/// A run of consecutive same-sized registers at increasing buffer offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RegMapEntry {
    count: u16,
    regnum: u16,
    size: usize,
}

const GREGMAP: &[RegMapEntry] = &[
    RegMapEntry { count: 31, regnum: regs::X0, size: 8 },
    RegMapEntry { count: 1, regnum: regs::SP, size: 8 },
    RegMapEntry { count: 1, regnum: regs::PC, size: 8 },
    RegMapEntry { count: 1, regnum: regs::CPSR, size: 8 },
];

const FPREGMAP: &[RegMapEntry] = &[
    RegMapEntry { count: 32, regnum: regs::V0, size: 16 },
    RegMapEntry { count: 1, regnum: regs::FPSR, size: 4 },
    RegMapEntry { count: 1, regnum: regs::FPCR, size: 4 },
];

fn sve_regmap(config: &ArchConfig) -> Vec<RegMapEntry> {
    let vq = config.vq() as usize;
    vec![
        RegMapEntry { count: 32, regnum: regs::Z0, size: vq * 16 },
        RegMapEntry { count: 16, regnum: regs::P0, size: vq * 2 },
        RegMapEntry { count: 1, regnum: regs::FFR, size: vq * 2 },
        RegMapEntry { count: 1, regnum: regs::FPSR, size: 4 },
        RegMapEntry { count: 1, regnum: regs::FPCR, size: 4 },
    ]
}

fn map_size(map: &[RegMapEntry]) -> usize {
    map.iter().map(|e| usize::from(e.count) * e.size).sum()
}

fn supply_regmap(file: &mut RegisterFile, map: &[RegMapEntry], buf: &[u8]) -> Result<(), Error> {
    let minimum = map_size(map);
    if buf.len() < minimum {
        return Err(Error::TruncatedRegset {
            minimum,
            actual: buf.len(),
        });
    }
    let mut offset = 0;
    for entry in map {
        for i in 0..entry.count {
            file.supply(entry.regnum + i, &buf[offset..offset + entry.size]);
            offset += entry.size;
        }
    }
    Ok(())
}

fn collect_regmap(file: &RegisterFile, map: &[RegMapEntry], buf: &mut [u8]) {
    assert!(buf.len() >= map_size(map), "collect buffer too small");
    let mut offset = 0;
    for entry in map {
        for i in 0..entry.count {
            buf[offset..offset + entry.size].copy_from_slice(file.collect(entry.regnum + i));
            offset += entry.size;
        }
    }
}

/// Supply the bytes of one register note into `file`.
pub fn supply_regset(
    config: &ArchConfig,
    kind: RegsetKind,
    file: &mut RegisterFile,
    buf: &[u8],
) -> Result<(), Error> {
    match kind {
        RegsetKind::Gpr => supply_regmap(file, GREGMAP, buf),
        RegsetKind::Fpsimd => supply_regmap(file, FPREGMAP, buf),
        RegsetKind::Sve => supply_sve(config, file, buf),
        RegsetKind::Ssve => supply_ssve(config, file, buf),
        RegsetKind::Za => supply_za(config, file, buf),
        RegsetKind::Zt => {
            // The catalog sizes this buffer; a short one is a caller bug.
            assert!(buf.len() >= format::SME2_ZT0_SIZE);
            file.supply(config.zt0_regnum.unwrap(), &buf[..format::SME2_ZT0_SIZE]);
            Ok(())
        }
        RegsetKind::Pauth => supply_regmap(file, &pauth_regmap(config), buf),
        RegsetKind::Mte => supply_regmap(file, &mte_regmap(config), buf),
        RegsetKind::Tls => supply_regmap(file, &tls_regmap(config), buf),
    }
}

/// Regenerate the bytes of one register note from `file`.
///
/// The caller sizes `buf` from the catalog; undersized buffers are asserted
/// against, not reported.
pub fn collect_regset(config: &ArchConfig, kind: RegsetKind, file: &RegisterFile, buf: &mut [u8]) {
    match kind {
        RegsetKind::Gpr => collect_regmap(file, GREGMAP, buf),
        RegsetKind::Fpsimd => collect_regmap(file, FPREGMAP, buf),
        RegsetKind::Sve => collect_sve(config, file, buf),
        RegsetKind::Ssve => collect_ssve(config, file, buf),
        RegsetKind::Za => collect_za(config, file, buf),
        RegsetKind::Zt => {
            assert!(buf.len() >= format::SME2_ZT0_SIZE);
            buf[..format::SME2_ZT0_SIZE].copy_from_slice(file.collect(config.zt0_regnum.unwrap()));
        }
        RegsetKind::Pauth => collect_regmap(file, &pauth_regmap(config), buf),
        RegsetKind::Mte => collect_regmap(file, &mte_regmap(config), buf),
        RegsetKind::Tls => collect_regmap(file, &tls_regmap(config), buf),
    }
}

fn pauth_regmap(config: &ArchConfig) -> Vec<RegMapEntry> {
    vec![RegMapEntry {
        count: 2,
        regnum: config.pauth_reg_base.unwrap(),
        size: 8,
    }]
}

fn mte_regmap(config: &ArchConfig) -> Vec<RegMapEntry> {
    vec![RegMapEntry {
        count: 1,
        regnum: config.mte_reg_base.unwrap(),
        size: 8,
    }]
}

fn tls_regmap(config: &ArchConfig) -> Vec<RegMapEntry> {
    vec![RegMapEntry {
        count: config.tls_register_count() as u16,
        regnum: config.tls_reg_base.unwrap(),
        size: format::TLS_REGISTER_SIZE,
    }]
}

/// Parse an SVE-shaped note (header + payload) into the register file.
///
/// The header's flags decide the payload shape: SVE-shaped payloads go through
/// the scalable register map; FPSIMD-shaped payloads first zero every Z, P and
/// FFR register so no stale vector state survives, then go through the FPSIMD
/// map.
fn supply_sve_common(config: &ArchConfig, file: &mut RegisterFile, buf: &[u8]) -> Result<(), Error> {
    let minimum = SVE_HEADER_SIZE + map_size(FPREGMAP);
    if buf.len() < minimum {
        return Err(Error::TruncatedRegset {
            minimum,
            actual: buf.len(),
        });
    }
    let header: SVE_HEADER = buf.pread_with(0, config.endian()).expect("header fits");

    file.supply_u64(regs::VG, format::vg_from_vl(u64::from(header.vl)));

    if header.flags & format::SVE_HEADER_FLAG_SVE != 0 {
        // Register dump is an SVE structure.
        supply_regmap(file, &sve_regmap(config), &buf[SVE_HEADER_SIZE..])
    } else {
        // Register dump is an FPSIMD structure. First clear the SVE
        // registers.
        for i in 0..regs::NUM_V_REGS {
            file.supply_zeroed(regs::Z0 + i);
        }
        for i in 0..regs::NUM_P_REGS {
            file.supply_zeroed(regs::P0 + i);
        }
        file.supply_zeroed(regs::FFR);

        supply_regmap(file, FPREGMAP, &buf[SVE_HEADER_SIZE..])
    }
}

fn supply_sve(config: &ArchConfig, file: &mut RegisterFile, buf: &[u8]) -> Result<(), Error> {
    if config.has_sme() {
        let svcr = Svcr::from_bits_truncate(file.collect_u64(config.svcr_regnum.unwrap()));
        if svcr.contains(Svcr::SM) {
            // Streaming mode: the SSVE note, not this one, is the source of
            // truth for the scalable registers.
            return Ok(());
        }
    }
    supply_sve_common(config, file, buf)
}

fn supply_ssve(config: &ArchConfig, file: &mut RegisterFile, buf: &[u8]) -> Result<(), Error> {
    if buf.len() < SVE_HEADER_SIZE {
        return Err(Error::TruncatedRegset {
            minimum: SVE_HEADER_SIZE,
            actual: buf.len(),
        });
    }
    let header: SVE_HEADER = buf.pread_with(0, config.endian()).expect("header fits");

    // SVCR is inferred from this header, so clear it first; it must not carry
    // stale bits when the note turns out to be inactive.
    let svcr_regnum = config.svcr_regnum.unwrap();
    file.supply_u64(svcr_regnum, 0);

    if header.flags & format::SVE_HEADER_FLAG_SVE != 0 {
        // Streaming mode was active: flip the SM bit and take the scalable
        // state from this note.
        file.supply_u64(svcr_regnum, Svcr::SM.bits());
        supply_sve_common(config, file, buf)
    } else {
        Ok(())
    }
}

/// Whether the live scalable state is all zero, in which case the SVE note is
/// dumped in its inactive (FPSIMD-shaped) form.
fn sve_state_is_empty(file: &RegisterFile) -> bool {
    (0..regs::NUM_V_REGS).all(|i| file.is_zero(regs::Z0 + i))
        && (0..regs::NUM_P_REGS).all(|i| file.is_zero(regs::P0 + i))
        && file.is_zero(regs::FFR)
}

/// Emit the inactive SVE note: a header declaring an FPSIMD-shaped payload,
/// followed by the low 16 bytes of each Z register plus fpsr/fpcr.
///
/// `vg_regnum` selects which vector length the header reports: VG for the SVE
/// note, SVG for an inactive SSVE note.
fn collect_inactive_sve(config: &ArchConfig, file: &RegisterFile, buf: &mut [u8], vg_regnum: u16) {
    assert!(buf.len() >= format::SVE_CORE_DUMMY_SIZE as usize);
    let buf = &mut buf[..format::SVE_CORE_DUMMY_SIZE as usize];
    buf.iter_mut().for_each(|b| *b = 0);

    let header = SVE_HEADER {
        size: format::SVE_CORE_DUMMY_SIZE,
        max_size: format::SVE_CORE_DUMMY_MAX_SIZE,
        vl: format::vl_from_vg(file.collect_u64(vg_regnum)) as u16,
        max_vl: format::SVE_CORE_DUMMY_MAX_VL,
        flags: format::SVE_CORE_DUMMY_FLAGS,
        reserved: format::SVE_CORE_DUMMY_RESERVED,
    };
    buf.pwrite_with(header, 0, config.endian()).expect("header fits");

    // The FPSIMD-shaped payload: the first 128 bits of each Z register.
    let mut offset = SVE_HEADER_SIZE;
    for i in 0..regs::NUM_V_REGS {
        let z = file.collect(regs::Z0 + i);
        buf[offset..offset + format::V_REGISTER_SIZE]
            .copy_from_slice(&z[..format::V_REGISTER_SIZE]);
        offset += format::V_REGISTER_SIZE;
    }
    buf[offset..offset + 4].copy_from_slice(file.collect(regs::FPSR));
    buf[offset + 4..offset + 8].copy_from_slice(file.collect(regs::FPCR));
    // The remaining 8 bytes are reserved and stay zero.
}

/// Emit the active SVE note: header plus the full scalable register dump.
fn collect_active_sve(config: &ArchConfig, file: &RegisterFile, buf: &mut [u8]) {
    let map = sve_regmap(config);
    assert!(buf.len() >= SVE_HEADER_SIZE + map_size(&map));

    let header = SVE_HEADER {
        size: buf.len() as u32,
        max_size: format::SVE_CORE_DUMMY_MAX_SIZE,
        vl: format::vl_from_vq(config.vq()) as u16,
        max_vl: format::SVE_CORE_DUMMY_MAX_VL,
        flags: format::SVE_HEADER_FLAG_SVE,
        reserved: format::SVE_CORE_DUMMY_RESERVED,
    };
    buf.pwrite_with(header, 0, config.endian()).expect("header fits");

    collect_regmap(file, &map, &mut buf[SVE_HEADER_SIZE..]);
}

fn collect_sve(config: &ArchConfig, file: &RegisterFile, buf: &mut [u8]) {
    let streaming_mode = config.has_sme()
        && Svcr::from_bits_truncate(file.collect_u64(config.svcr_regnum.unwrap()))
            .contains(Svcr::SM);

    // In streaming mode the scalable state belongs to the SSVE note, so this
    // one gets the inactive form; likewise when there is no live SVE state.
    if sve_state_is_empty(file) || streaming_mode {
        collect_inactive_sve(config, file, buf, regs::VG);
    } else {
        collect_active_sve(config, file, buf);
    }
}

fn collect_ssve(config: &ArchConfig, file: &RegisterFile, buf: &mut [u8]) {
    let svcr = Svcr::from_bits_truncate(file.collect_u64(config.svcr_regnum.unwrap()));
    if svcr.contains(Svcr::SM) {
        collect_active_sve(config, file, buf);
    } else {
        // Not streaming: an inactive block carrying the streaming vector
        // length.
        collect_inactive_sve(config, file, buf, config.svg_regnum.unwrap());
    }
}

/// Parse a ZA note. Header-only means "no ZA storage": SVCR.ZA is cleared and
/// the ZA register is supplied zeroed rather than left stale; a payload sets
/// SVCR.ZA and fills the register. SVG always comes from the header. The SM
/// bit is owned by the SSVE codec and is left untouched.
fn supply_za(config: &ArchConfig, file: &mut RegisterFile, buf: &[u8]) -> Result<(), Error> {
    if buf.len() < SVE_HEADER_SIZE {
        return Err(Error::TruncatedRegset {
            minimum: SVE_HEADER_SIZE,
            actual: buf.len(),
        });
    }
    let header: SVE_HEADER = buf.pread_with(0, config.endian()).expect("header fits");

    let svl = u64::from(header.vl);
    file.supply_u64(config.svg_regnum.unwrap(), format::vg_from_vl(svl));

    let has_za_payload = u64::from(header.size) > SVE_HEADER_SIZE as u64;

    let svcr_regnum = config.svcr_regnum.unwrap();
    let mut svcr = Svcr::from_bits_truncate(file.collect_u64(svcr_regnum));
    svcr.set(Svcr::ZA, has_za_payload);
    file.supply_u64(svcr_regnum, svcr.bits());

    let za_regnum = config.za_regnum.unwrap();
    if has_za_payload {
        let za_bytes = (svl * svl) as usize;
        if za_bytes != config.za_size() {
            return Err(Error::VectorLengthMismatch {
                expected: format::vl_from_vq(config.svq()),
                actual: svl,
            });
        }
        if buf.len() < SVE_HEADER_SIZE + za_bytes {
            return Err(Error::TruncatedRegset {
                minimum: SVE_HEADER_SIZE + za_bytes,
                actual: buf.len(),
            });
        }
        file.supply(za_regnum, &buf[SVE_HEADER_SIZE..SVE_HEADER_SIZE + za_bytes]);
    } else {
        file.supply_zeroed(za_regnum);
    }
    Ok(())
}

fn collect_za(config: &ArchConfig, file: &RegisterFile, buf: &mut [u8]) {
    assert!(buf.len() >= SVE_HEADER_SIZE);

    let svcr = Svcr::from_bits_truncate(file.collect_u64(config.svcr_regnum.unwrap()));
    let has_za_payload = svcr.contains(Svcr::ZA);
    let declared = if has_za_payload {
        buf.len()
    } else {
        SVE_HEADER_SIZE
    };

    let svl = format::vl_from_vq(config.svq());
    let header = SVE_HEADER {
        size: declared as u32,
        max_size: (SVE_HEADER_SIZE as u64 + svl * svl) as u32,
        vl: svl as u16,
        max_vl: format::SVE_CORE_DUMMY_MAX_VL,
        flags: format::SVE_CORE_DUMMY_FLAGS,
        reserved: format::SVE_CORE_DUMMY_RESERVED,
    };
    buf.pwrite_with(header, 0, config.endian()).expect("header fits");

    if has_za_payload {
        let za = file.collect(config.za_regnum.unwrap());
        assert!(buf.len() >= SVE_HEADER_SIZE + za.len());
        buf[SVE_HEADER_SIZE..SVE_HEADER_SIZE + za.len()].copy_from_slice(za);
    }
}

/// The ordered note catalog for `config`.
///
/// Built fresh on every call: several entry sizes depend on the
/// configuration's current vector lengths.
pub fn regset_sections(config: &ArchConfig) -> Vec<RegsetSection> {
    let mut sections = vec![RegsetSection {
        name: format::GREGS_SECTION,
        min_size: format::SIZEOF_GREGSET,
        max_size: format::SIZEOF_GREGSET,
        kind: RegsetKind::Gpr,
        label: None,
        variable_size: false,
    }];

    if config.has_sve() {
        let min_size = SVE_HEADER_SIZE + map_size(FPREGMAP);
        let max_size = SVE_HEADER_SIZE + map_size(&sve_regmap(config));

        // With SME the SSVE note must precede the SVE note: readers working
        // in file order need its flags to learn whether streaming mode was
        // active before they can interpret the SVE note.
        if config.has_sme() {
            sections.push(RegsetSection {
                name: format::SSVE_SECTION,
                min_size,
                max_size,
                kind: RegsetKind::Ssve,
                label: Some("SSVE registers"),
                variable_size: true,
            });
        }

        sections.push(RegsetSection {
            name: format::SVE_SECTION,
            min_size,
            max_size,
            kind: RegsetKind::Sve,
            label: Some("SVE registers"),
            variable_size: true,
        });
    } else {
        sections.push(RegsetSection {
            name: format::FPREGS_SECTION,
            min_size: format::SIZEOF_FPREGSET,
            max_size: format::SIZEOF_FPREGSET,
            kind: RegsetKind::Fpsimd,
            label: None,
            variable_size: false,
        });
    }

    if config.has_sme() {
        sections.push(RegsetSection {
            name: format::ZA_SECTION,
            min_size: SVE_HEADER_SIZE,
            max_size: SVE_HEADER_SIZE + config.za_size(),
            kind: RegsetKind::Za,
            label: Some("ZA register"),
            variable_size: true,
        });

        if config.has_sme2() {
            // Variable-sized: more ZT registers may appear.
            sections.push(RegsetSection {
                name: format::ZT_SECTION,
                min_size: format::SME2_ZT0_SIZE,
                max_size: format::SME2_ZT0_SIZE,
                kind: RegsetKind::Zt,
                label: Some("ZT registers"),
                variable_size: true,
            });
        }
    }

    if config.has_pauth() {
        sections.push(RegsetSection {
            name: format::PAUTH_SECTION,
            min_size: format::SIZEOF_PAUTH_REGSET,
            max_size: format::SIZEOF_PAUTH_REGSET,
            kind: RegsetKind::Pauth,
            label: Some("pauth registers"),
            variable_size: false,
        });
    }

    if config.has_mte() {
        sections.push(RegsetSection {
            name: format::MTE_SECTION,
            min_size: format::SIZEOF_MTE_REGSET,
            max_size: format::SIZEOF_MTE_REGSET,
            kind: RegsetKind::Mte,
            label: Some("MTE registers"),
            variable_size: false,
        });
    }

    if config.has_tls() {
        let size = format::TLS_REGISTER_SIZE * config.tls_register_count() as usize;
        sections.push(RegsetSection {
            name: format::TLS_SECTION,
            min_size: size,
            max_size: size,
            kind: RegsetKind::Tls,
            label: Some("TLS register"),
            variable_size: true,
        });
    }

    sections
}
