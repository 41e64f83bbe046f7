//! Signal-frame handling.
//!
//! On signal delivery the kernel creates an `rt_sigframe` on the stack whose
//! `ucontext.uc_mcontext` holds the interrupted register state. The fixed
//! fields (fault address, x0-x30, sp, pc, pstate) are followed by a 4096-byte
//! `__reserved` area containing a chain of `(magic, size)`-tagged records:
//! FPSIMD, SVE, ZA, TPIDR2, ZT, and an EXTRA record that redirects the chain
//! into an overflow block when the reserved area is too small. The chain ends
//! with a zero header.
//!
//! [`SignalFrame::locate`] walks that chain once per unwind query, and
//! [`SignalFrame::project`] populates a [`FrameRegisterCache`] with, for every
//! register the frame covers, either the address of its saved bytes (so user
//! edits land back in the frame) or a computed value when a byte-order
//! transform or synthesis is required.

use crate::arch::ArchConfig;
use crate::format::{self, AARCH64_CTX_HEADER};
use crate::registers as regs;
use crate::target::TargetMemory;
use crate::Error;
use scroll::{Pread, Pwrite, Endian};
use std::collections::BTreeMap;
use tracing::warn;

/// Where a register's bytes live for one unwound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegLocation {
    /// The register is stored at this target-memory address, in target byte
    /// order. Writes through this address are visible to the kernel's
    /// sigreturn path.
    Address(u64),
    /// A computed value; the frame has no directly usable backing bytes.
    Value(Vec<u8>),
}

/// The register-location cache populated from one signal frame.
///
/// This is the producing side of the external frame-unwinder's lazy register
/// resolution: entries are recorded here once and read back by the owner.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameRegisterCache {
    locations: BTreeMap<u16, RegLocation>,
}

impl FrameRegisterCache {
    pub fn new() -> FrameRegisterCache {
        FrameRegisterCache::default()
    }

    /// Map `regnum` onto `address` in target memory.
    pub fn set_reg_addr(&mut self, regnum: u16, address: u64) {
        self.locations.insert(regnum, RegLocation::Address(address));
    }

    /// Record a computed value for `regnum`.
    pub fn set_reg_value(&mut self, regnum: u16, bytes: Vec<u8>) {
        self.locations.insert(regnum, RegLocation::Value(bytes));
    }

    /// Record an 8-byte integer value for `regnum` in the given byte order.
    pub fn set_reg_value_u64(&mut self, regnum: u16, value: u64, endian: Endian) {
        let mut bytes = vec![0u8; 8];
        bytes
            .pwrite_with(value, 0, endian)
            .expect("8-byte buffer holds a u64");
        self.set_reg_value(regnum, bytes);
    }

    /// The recorded location of `regnum`, if the frame covered it.
    pub fn location(&self, regnum: u16) -> Option<&RegLocation> {
        self.locations.get(&regnum)
    }

    /// The recorded value of `regnum` as an integer, if it was stored by value.
    pub fn value_u64(&self, regnum: u16, endian: Endian) -> Option<u64> {
        match self.location(regnum)? {
            RegLocation::Value(bytes) => bytes.pread_with(0, endian).ok(),
            RegLocation::Address(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

/// Read a record header from the reserved-area chain.
///
/// Returns `None` if either 4-byte read fails; running off the end of readable
/// memory is an expected termination condition for the scan, not an error.
pub fn read_ctx_header<M: TargetMemory + ?Sized>(
    mem: &M,
    address: u64,
    endian: Endian,
) -> Option<AARCH64_CTX_HEADER> {
    let magic: u32 = mem.read_memory(address, 4)?.pread_with(0, endian).ok()?;
    let size: u32 = mem
        .read_memory(address + 4, 4)?
        .pread_with(0, endian)
        .ok()?;
    Some(AARCH64_CTX_HEADER { magic, size })
}

/// Everything learned from one walk of a signal frame's record chain.
///
/// Section fields hold the address of the record (or of its payload, for SVE
/// and ZA), with zero meaning "absent". Constructed fresh per unwind query and
/// discarded after projection; owns no target memory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SignalFrame {
    /// The stack pointer value at the stop.
    pub sp: u64,
    /// The sigcontext address.
    pub sigcontext_address: u64,
    /// Bounds of the sigcontext reserved area.
    pub reserved_start: u64,
    pub reserved_end: u64,

    /// Start of the saved general-purpose registers (x0).
    pub gpr_section: u64,
    /// Address of the FPSIMD record.
    pub fpsimd_section: u64,
    /// Address of the SVE register payload, set only when the SVE record
    /// carries a full dump for its vector length.
    pub sve_section: u64,
    /// Address of the ZA payload, set only when the ZA record carries one.
    pub za_section: u64,
    /// Address of the TPIDR2 record.
    pub tpidr2_section: u64,
    /// Address of the ZT record.
    pub zt_section: u64,
    /// Address of the overflow block named by an EXTRA record.
    pub extra_section: u64,

    /// The vector length (SVE or SSVE), in bytes.
    pub vl: u64,
    /// The streaming vector length (SSVE/ZA), in bytes.
    pub svl: u64,
    /// Number of ZT registers in this context.
    pub zt_register_count: u32,

    /// True if the thread was in streaming mode.
    pub streaming_mode: bool,
    /// True if the ZA record carries a payload.
    pub za_payload: bool,
    /// True if a ZT record is present.
    pub zt_available: bool,
}

impl SignalFrame {
    /// Walk the signal frame below `sp`, recording each tagged record found.
    ///
    /// Failures to read a sub-field of a recognized record are warned and the
    /// record skipped; the scan stops at a zero header, an unreadable header,
    /// or (outside an EXTRA overflow block) the end of the reserved area.
    pub fn locate<M: TargetMemory + ?Sized>(
        mem: &M,
        config: &ArchConfig,
        sp: u64,
    ) -> Result<SignalFrame, Error> {
        let endian = config.endian();
        let mut frame = SignalFrame {
            sp,
            ..Default::default()
        };
        frame.sigcontext_address =
            sp + format::RT_SIGFRAME_UCONTEXT_OFFSET + format::UCONTEXT_SIGCONTEXT_OFFSET;
        frame.reserved_start = frame.sigcontext_address + format::SIGCONTEXT_RESERVED_OFFSET;
        frame.reserved_end = frame.reserved_start + format::SIGCONTEXT_RESERVED_SIZE;
        frame.gpr_section = frame.sigcontext_address + format::SIGCONTEXT_X0_OFFSET;

        // Search for all the other records, stopping at null.
        let mut section = frame.reserved_start;
        let mut extra_found = false;

        while let Some(header) = read_ctx_header(mem, section, endian) {
            if header.magic == 0 || header.size == 0 {
                break;
            }
            let size = u64::from(header.size);

            match header.magic {
                format::FPSIMD_MAGIC => {
                    frame.fpsimd_section = section;
                    section += size;
                }

                format::SVE_MAGIC => {
                    // Check if the record is followed by a full SVE dump, and
                    // set sve_section if it is.
                    let vl = match read_u16(mem, section + format::SVE_CONTEXT_VL_OFFSET, endian) {
                        Some(vl) => vl,
                        None => {
                            warn!(
                                "Failed to read the vector length from the SVE \
                                 signal frame context."
                            );
                            section += size;
                            continue;
                        }
                    };
                    frame.vl = u64::from(vl);

                    let flags =
                        match read_u16(mem, section + format::SVE_CONTEXT_FLAGS_OFFSET, endian) {
                            Some(flags) => flags,
                            None => {
                                warn!(
                                    "Failed to read the flags from the SVE signal \
                                     frame context."
                                );
                                section += size;
                                continue;
                            }
                        };

                    // Is this SSVE data? If so, we are in streaming mode.
                    frame.streaming_mode = (flags & format::SVE_SIG_FLAG_SM) != 0;

                    let vq = format::vq_from_vl(frame.vl);
                    if size >= format::sve_context_size(vq) {
                        frame.sve_section = section + format::SVE_CONTEXT_REGS_OFFSET;
                    }
                    section += size;
                }

                format::ZA_MAGIC => {
                    // Check if the record is followed by a full ZA dump, and
                    // set za_section if it is.
                    let svl = match read_u16(mem, section + format::SME_CONTEXT_SVL_OFFSET, endian)
                    {
                        Some(svl) => svl,
                        None => {
                            warn!(
                                "Failed to read the streaming vector length from \
                                 the ZA signal frame context."
                            );
                            section += size;
                            continue;
                        }
                    };
                    frame.svl = u64::from(svl);

                    let svq = format::vq_from_vl(frame.svl);
                    if size >= format::sme_context_size(svq) {
                        frame.za_section = section + format::SME_CONTEXT_REGS_OFFSET;
                        frame.za_payload = true;
                    }
                    section += size;
                }

                format::TPIDR2_MAGIC => {
                    frame.tpidr2_section = section;
                    section += size;
                }

                format::ZT_MAGIC => {
                    let nregs =
                        match read_u16(mem, section + format::SME2_CONTEXT_NREGS_OFFSET, endian) {
                            Some(nregs) => nregs,
                            None => {
                                warn!(
                                    "Failed to read the number of ZT registers from \
                                     the ZT signal frame context."
                                );
                                section += size;
                                continue;
                            }
                        };
                    frame.zt_register_count = u32::from(nregs);

                    // A ZT record should only exist alongside a ZA record; the
                    // coupling is checked once the whole chain has been read.
                    frame.zt_section = section;
                    frame.zt_available = true;
                    section += size;
                }

                format::EXTRA_MAGIC => {
                    // EXTRA is always the last valid record in the reserved
                    // area and points at a further block holding more records.
                    // Move the cursor there and keep scanning.
                    let datap = match mem
                        .read_memory(section + format::EXTRA_DATAP_OFFSET, 8)
                        .and_then(|buf| buf.pread_with::<u64>(0, endian).ok())
                    {
                        Some(datap) => datap,
                        None => {
                            warn!(
                                "Failed to read the extra section address from the \
                                 signal frame context."
                            );
                            section += size;
                            continue;
                        }
                    };
                    section = datap;
                    frame.extra_section = section;
                    extra_found = true;
                }

                _ => {
                    // Unknown record, skip it; newer kernels may add more.
                    section += size;
                }
            }

            // Prevent searching past the end of the reserved area. The extra
            // block has no hard limit; there we rely on the null terminator.
            if !extra_found && section > frame.reserved_end {
                break;
            }
        }

        if frame.zt_available && !frame.za_payload {
            return Err(Error::ZtWithoutZa);
        }

        Ok(frame)
    }

    /// Populate `cache` with the register locations this frame provides.
    pub fn project<M: TargetMemory + ?Sized>(
        &self,
        mem: &M,
        config: &ArchConfig,
        cache: &mut FrameRegisterCache,
    ) -> Result<(), Error> {
        let endian = config.endian();

        // The general-purpose registers, then sp and pc right after x30.
        let mut offset = self.gpr_section;
        for i in 0..regs::NUM_X_REGS {
            cache.set_reg_addr(regs::X0 + i, offset);
            offset += format::SIGCONTEXT_REG_SIZE;
        }
        cache.set_reg_addr(regs::SP, offset);
        offset += format::SIGCONTEXT_REG_SIZE;
        cache.set_reg_addr(regs::PC, offset);

        // The SVE registers, when the frame has a full dump.
        if config.has_sve() && self.sve_section != 0 {
            let vq = format::vq_from_vl(self.vl);
            let sve_regs = self.sve_section;

            cache.set_reg_value_u64(regs::VG, format::vg_from_vl(self.vl), endian);

            for i in 0..regs::NUM_V_REGS {
                let offset = sve_regs + u64::from(i) * vq * 16;
                // The V register and its views share the Z register's low
                // bytes, so everything can be address-mapped in one go.
                cache.set_reg_addr(regs::Z0 + i, offset);
                cache.set_reg_addr(regs::V0 + i, offset);
                for &(base, _) in regs::V_ALIASES {
                    cache.set_reg_addr(base + i, offset);
                }
            }

            let p_base = sve_regs + format::sve_context_p_regs_offset(vq);
            for i in 0..regs::NUM_P_REGS {
                cache.set_reg_addr(regs::P0 + i, p_base + u64::from(i) * vq * 2);
            }
            cache.set_reg_addr(regs::FFR, sve_regs + format::sve_context_ffr_offset(vq));
        }

        // The FPSIMD registers.
        if self.fpsimd_section != 0 {
            let fpsimd = self.fpsimd_section;
            cache.set_reg_addr(regs::FPSR, fpsimd + format::FPSIMD_FPSR_OFFSET);
            cache.set_reg_addr(regs::FPCR, fpsimd + format::FPSIMD_FPCR_OFFSET);

            // If there was no SVE dump then set up the V registers from here.
            if !config.has_sve() || self.sve_section == 0 {
                self.restore_vregs(mem, config, cache)?;
            }
        }

        // The SME registers.
        if config.has_sme() {
            if self.za_section != 0 {
                cache.set_reg_addr(config.za_regnum.unwrap(), self.za_section);
            }

            // Reconstruct SVCR from what the chain contained.
            let mut svcr = format::Svcr::empty();
            svcr.set(format::Svcr::ZA, self.za_payload);
            svcr.set(format::Svcr::SM, self.streaming_mode);
            cache.set_reg_value_u64(config.svcr_regnum.unwrap(), svcr.bits(), endian);

            cache.set_reg_value_u64(
                config.svg_regnum.unwrap(),
                format::vg_from_vl(self.svl),
                endian,
            );

            if config.has_sme2() && self.za_section != 0 && self.zt_register_count > 0 {
                // ZT state without live ZA storage is impossible; locate()
                // already rejected that combination.
                assert!(svcr.contains(format::Svcr::ZA));

                // Only a single ZT register exists today.
                cache.set_reg_addr(
                    config.zt0_regnum.unwrap(),
                    self.zt_section + format::SME2_CONTEXT_REGS_OFFSET,
                );
            }
        }

        // TPIDR2, the second TLS register, when the target carries it.
        if self.tpidr2_section != 0 && config.has_tls() && config.tls_register_count() >= 2 {
            cache.set_reg_addr(
                config.tls_reg_base.unwrap() + 1,
                self.tpidr2_section + format::TPIDR2_CONTEXT_TPIDR2_OFFSET,
            );
        }

        Ok(())
    }

    /// Populate the V registers and their views from the FPSIMD record.
    ///
    /// SIMD state is laid out in target byte order, with the two 64-bit halves
    /// of each V register in memory order. On little-endian targets the saved
    /// bytes can be aliased in place; on big-endian targets the halves are
    /// stored swapped relative to the architectural lane order, so the
    /// corrected bytes must be recorded by value.
    fn restore_vregs<M: TargetMemory + ?Sized>(
        &self,
        mem: &M,
        config: &ArchConfig,
        cache: &mut FrameRegisterCache,
    ) -> Result<(), Error> {
        let big_endian = matches!(config.endian(), Endian::Big);

        for i in 0..regs::NUM_V_REGS {
            let offset = self.fpsimd_section
                + format::FPSIMD_V0_OFFSET
                + u64::from(i) * format::V_REGISTER_SIZE as u64;

            let raw = mem
                .read_memory(offset, format::V_REGISTER_SIZE)
                .ok_or(Error::MemoryReadFailure("fpsimd register", offset))?;
            let mut buf = [0u8; format::V_REGISTER_SIZE];
            buf.copy_from_slice(&raw);

            if big_endian {
                buf = swap_vreg_lanes(&buf);

                // Store the corrected bytes for the V register and each of its
                // sized views.
                cache.set_reg_value(regs::V0 + i, buf.to_vec());
                for &(base, len) in regs::V_ALIASES {
                    cache.set_reg_value(base + i, buf[..len].to_vec());
                }
            } else {
                // Little endian, just point at the saved register bytes.
                cache.set_reg_addr(regs::V0 + i, offset);
                for &(base, _) in regs::V_ALIASES {
                    cache.set_reg_addr(base + i, offset);
                }
            }

            if config.has_sve() {
                // The architecture has SVE but this frame carries no SVE
                // state: present each Z register as its V register
                // zero-extended to the full vector length, rather than
                // leaving the upper lanes undefined.
                let mut z_buffer = vec![0u8; (config.vq() * 16) as usize];
                z_buffer[..format::V_REGISTER_SIZE].copy_from_slice(&buf);
                cache.set_reg_value(regs::Z0 + i, z_buffer);
            }
        }

        Ok(())
    }
}

/// Exchange the two 64-bit halves of a V register while converting each from
/// big-endian storage, yielding the architectural (little-endian lane) bytes.
pub fn swap_vreg_lanes(bytes: &[u8; 16]) -> [u8; 16] {
    let upper: u64 = bytes.pread_with(0, scroll::BE).unwrap();
    let lower: u64 = bytes.pread_with(8, scroll::BE).unwrap();
    let mut out = [0u8; 16];
    out.pwrite_with(lower, 0, scroll::LE).unwrap();
    out.pwrite_with(upper, 8, scroll::LE).unwrap();
    out
}

fn read_u16<M: TargetMemory + ?Sized>(mem: &M, address: u64, endian: Endian) -> Option<u16> {
    mem.read_memory(address, 2)?.pread_with(0, endian).ok()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::arch::Features;
    use regctx_synth::{
        fpsimd_body, sve_body, tpidr2_body, za_body, zt_body, CtxRecord, SynthSigframe,
    };
    use scroll::{BE, LE};

    const SP: u64 = 0x1000;

    fn sigcontext_address() -> u64 {
        SP + format::RT_SIGFRAME_UCONTEXT_OFFSET + format::UCONTEXT_SIGCONTEXT_OFFSET
    }

    fn reserved_start() -> u64 {
        sigcontext_address() + format::SIGCONTEXT_RESERVED_OFFSET
    }

    fn plain_config() -> ArchConfig {
        ArchConfig::new(LE, Features::default()).unwrap()
    }

    fn sve_config(vq: u64) -> ArchConfig {
        let features = Features {
            vq,
            ..Default::default()
        };
        ArchConfig::new(LE, features).unwrap()
    }

    fn sme_config(vq: u64, svq: u64, sme2: bool) -> ArchConfig {
        let features = Features {
            vq,
            svq,
            sme2,
            tls: 2,
            ..Default::default()
        };
        ArchConfig::new(LE, features).unwrap()
    }

    #[test]
    fn test_fpsimd_only_frame() {
        // Scenario: FPSIMD at offset 0 of the reserved area and nothing else.
        let image = SynthSigframe::new(LE, SP)
            .add_record(CtxRecord::new(
                format::FPSIMD_MAGIC,
                528,
                fpsimd_body(scroll::Endian::Little, 0, 0),
            ))
            .finish();
        let config = plain_config();
        let frame = SignalFrame::locate(&image, &config, SP).unwrap();

        assert_eq!(frame.sigcontext_address, sigcontext_address());
        assert_eq!(frame.gpr_section, sigcontext_address() + 8);
        assert_eq!(frame.fpsimd_section, reserved_start());
        assert_eq!(frame.sve_section, 0);
        assert_eq!(frame.za_section, 0);
        assert!(!frame.streaming_mode);
    }

    #[test]
    fn test_locate_is_idempotent() {
        let image = SynthSigframe::new(LE, SP)
            .add_record(CtxRecord::new(
                format::FPSIMD_MAGIC,
                528,
                fpsimd_body(scroll::Endian::Little, 0x1234, 0),
            ))
            .add_record(CtxRecord::new(
                format::SVE_MAGIC,
                format::sve_context_size(2) as u32,
                sve_body(scroll::Endian::Little, 32, 0),
            ))
            .finish();
        let config = sve_config(2);
        let first = SignalFrame::locate(&image, &config, SP).unwrap();
        let second = SignalFrame::locate(&image, &config, SP).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_header_only_sve_record() {
        // The SVE record's declared size is one byte short of a full dump for
        // vq=2, so it only carries the header: no sve_section, but the vector
        // length is still recorded.
        let image = SynthSigframe::new(LE, SP)
            .add_record(CtxRecord::new(
                format::FPSIMD_MAGIC,
                528,
                fpsimd_body(scroll::Endian::Little, 0, 0),
            ))
            .add_record(CtxRecord::new(
                format::SVE_MAGIC,
                format::sve_context_size(2) as u32 - 1,
                sve_body(scroll::Endian::Little, 32, 0),
            ))
            .finish();
        let config = sve_config(2);
        let frame = SignalFrame::locate(&image, &config, SP).unwrap();

        assert_eq!(frame.sve_section, 0);
        assert_eq!(frame.vl, 32);
        assert_eq!(format::vg_from_vl(frame.vl), 4);
        assert_eq!(frame.fpsimd_section, reserved_start());
    }

    #[test]
    fn test_full_sve_record() {
        let sve_size = format::sve_context_size(2) as u32;
        let image = SynthSigframe::new(LE, SP)
            .add_record(CtxRecord::new(
                format::FPSIMD_MAGIC,
                528,
                fpsimd_body(scroll::Endian::Little, 0, 0),
            ))
            .add_record(CtxRecord::new(
                format::SVE_MAGIC,
                sve_size,
                sve_body(scroll::Endian::Little, 32, format::SVE_SIG_FLAG_SM),
            ))
            .finish();
        let config = sve_config(2);
        let frame = SignalFrame::locate(&image, &config, SP).unwrap();

        let sve_record = reserved_start() + 528;
        assert_eq!(frame.sve_section, sve_record + format::SVE_CONTEXT_REGS_OFFSET);
        assert!(frame.streaming_mode);
    }

    #[test]
    fn test_unknown_magic_is_skipped() {
        let image = SynthSigframe::new(LE, SP)
            .add_record(CtxRecord::new(0x12345678, 64, regctx_synth::empty_body()))
            .add_record(CtxRecord::new(
                format::FPSIMD_MAGIC,
                528,
                fpsimd_body(scroll::Endian::Little, 0, 0),
            ))
            .finish();
        let config = plain_config();
        let frame = SignalFrame::locate(&image, &config, SP).unwrap();
        assert_eq!(frame.fpsimd_section, reserved_start() + 64);
    }

    #[test]
    fn test_records_in_extra_block() {
        let image = SynthSigframe::new(LE, SP)
            .add_record(CtxRecord::new(
                format::FPSIMD_MAGIC,
                528,
                fpsimd_body(scroll::Endian::Little, 0, 0),
            ))
            .add_extra_record(CtxRecord::new(
                format::TPIDR2_MAGIC,
                16,
                tpidr2_body(scroll::Endian::Little, 0xdead_beef),
            ))
            .finish();
        let config = plain_config();
        let frame = SignalFrame::locate(&image, &config, SP).unwrap();

        assert_ne!(frame.extra_section, 0);
        assert_eq!(frame.tpidr2_section, frame.extra_section);
    }

    #[test]
    fn test_zt_without_za_is_an_error() {
        let image = SynthSigframe::new(LE, SP)
            .add_record(CtxRecord::new(
                format::ZT_MAGIC,
                16 + 64,
                zt_body(scroll::Endian::Little, 1),
            ))
            .finish();
        let config = sme_config(2, 2, true);
        assert_eq!(
            SignalFrame::locate(&image, &config, SP),
            Err(Error::ZtWithoutZa)
        );
    }

    #[test]
    fn test_za_and_zt_frame() {
        let svq = 2;
        let za_size = format::sme_context_size(svq) as u32;
        let image = SynthSigframe::new(LE, SP)
            .add_record(CtxRecord::new(
                format::FPSIMD_MAGIC,
                528,
                fpsimd_body(scroll::Endian::Little, 0, 0),
            ))
            .add_record(CtxRecord::new(
                format::ZA_MAGIC,
                za_size,
                za_body(scroll::Endian::Little, 32),
            ))
            .add_record(CtxRecord::new(
                format::ZT_MAGIC,
                16 + 64,
                zt_body(scroll::Endian::Little, 1),
            ))
            .finish();
        let config = sme_config(2, svq, true);
        let frame = SignalFrame::locate(&image, &config, SP).unwrap();

        assert!(frame.za_payload);
        assert!(frame.zt_available);
        assert_eq!(frame.zt_register_count, 1);
        assert_eq!(frame.svl, 32);

        let za_record = reserved_start() + 528;
        assert_eq!(frame.za_section, za_record + format::SME_CONTEXT_REGS_OFFSET);

        let mut cache = FrameRegisterCache::new();
        frame.project(&image, &config, &mut cache).unwrap();

        // ZA is address-mapped, SVCR/SVG are synthesized values.
        assert_eq!(
            cache.location(config.za_regnum.unwrap()),
            Some(&RegLocation::Address(frame.za_section))
        );
        let svcr = cache
            .value_u64(config.svcr_regnum.unwrap(), scroll::Endian::Little)
            .unwrap();
        assert_eq!(svcr, format::Svcr::ZA.bits());
        let svg = cache
            .value_u64(config.svg_regnum.unwrap(), scroll::Endian::Little)
            .unwrap();
        assert_eq!(svg, 4);
        assert_eq!(
            cache.location(config.zt0_regnum.unwrap()),
            Some(&RegLocation::Address(
                frame.zt_section + format::SME2_CONTEXT_REGS_OFFSET
            ))
        );
    }

    #[test]
    fn test_project_gprs_and_vregs_little_endian() {
        let image = SynthSigframe::new(LE, SP)
            .add_record(CtxRecord::new(
                format::FPSIMD_MAGIC,
                528,
                fpsimd_body(scroll::Endian::Little, 0, 0),
            ))
            .finish();
        let config = plain_config();
        let frame = SignalFrame::locate(&image, &config, SP).unwrap();
        let mut cache = FrameRegisterCache::new();
        frame.project(&image, &config, &mut cache).unwrap();

        let gpr = frame.gpr_section;
        assert_eq!(cache.location(regs::X0), Some(&RegLocation::Address(gpr)));
        assert_eq!(
            cache.location(regs::X0 + 30),
            Some(&RegLocation::Address(gpr + 30 * 8))
        );
        assert_eq!(
            cache.location(regs::SP),
            Some(&RegLocation::Address(gpr + 31 * 8))
        );
        assert_eq!(
            cache.location(regs::PC),
            Some(&RegLocation::Address(gpr + 32 * 8))
        );

        // V registers and their views alias the saved bytes directly.
        let v0 = frame.fpsimd_section + format::FPSIMD_V0_OFFSET;
        assert_eq!(cache.location(regs::V0), Some(&RegLocation::Address(v0)));
        assert_eq!(cache.location(regs::Q0), Some(&RegLocation::Address(v0)));
        assert_eq!(
            cache.location(regs::B0 + 7),
            Some(&RegLocation::Address(v0 + 7 * 16))
        );
        assert_eq!(
            cache.location(regs::FPSR),
            Some(&RegLocation::Address(
                frame.fpsimd_section + format::FPSIMD_FPSR_OFFSET
            ))
        );
        // No SVE on this target, so no Z registers appear.
        assert_eq!(cache.location(regs::Z0), None);
    }

    #[test]
    fn test_project_zero_extends_z_without_sve_state() {
        let mut vregs = [[0u8; 16]; 32];
        vregs[1] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
        let image = SynthSigframe::new(LE, SP)
            .add_record(CtxRecord::new(
                format::FPSIMD_MAGIC,
                528,
                regctx_synth::fpsimd_body_with_vregs(scroll::Endian::Little, 0, 0, &vregs),
            ))
            .finish();
        let config = sve_config(2);
        let frame = SignalFrame::locate(&image, &config, SP).unwrap();
        let mut cache = FrameRegisterCache::new();
        frame.project(&image, &config, &mut cache).unwrap();

        // V1 aliases the frame, Z1 is the same bytes zero-extended to 32.
        let v1 = frame.fpsimd_section + format::FPSIMD_V0_OFFSET + 16;
        assert_eq!(cache.location(regs::V0 + 1), Some(&RegLocation::Address(v1)));
        let mut expected = vregs[1].to_vec();
        expected.extend_from_slice(&[0; 16]);
        assert_eq!(
            cache.location(regs::Z0 + 1),
            Some(&RegLocation::Value(expected))
        );
    }

    #[test]
    fn test_project_swaps_lanes_big_endian() {
        let mut vregs = [[0u8; 16]; 32];
        vregs[0] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
        let image = SynthSigframe::new(BE, SP)
            .add_record(CtxRecord::new(
                format::FPSIMD_MAGIC,
                528,
                regctx_synth::fpsimd_body_with_vregs(scroll::Endian::Big, 0, 0, &vregs),
            ))
            .finish();
        let config = ArchConfig::new(BE, Features::default()).unwrap();
        let frame = SignalFrame::locate(&image, &config, SP).unwrap();
        let mut cache = FrameRegisterCache::new();
        frame.project(&image, &config, &mut cache).unwrap();

        let expected: Vec<u8> = vregs[0].iter().rev().copied().collect();
        assert_eq!(
            cache.location(regs::V0),
            Some(&RegLocation::Value(expected.clone()))
        );
        // The D view is the low 8 bytes of the corrected value.
        assert_eq!(
            cache.location(regs::D0),
            Some(&RegLocation::Value(expected[..8].to_vec()))
        );
    }

    #[test]
    fn test_project_full_sve_addresses() {
        let vq = 2;
        let sve_size = format::sve_context_size(vq) as u32;
        let image = SynthSigframe::new(LE, SP)
            .add_record(CtxRecord::new(
                format::FPSIMD_MAGIC,
                528,
                fpsimd_body(scroll::Endian::Little, 0, 0),
            ))
            .add_record(CtxRecord::new(
                format::SVE_MAGIC,
                sve_size,
                sve_body(scroll::Endian::Little, 32, 0),
            ))
            .finish();
        let config = sve_config(vq);
        let frame = SignalFrame::locate(&image, &config, SP).unwrap();
        let mut cache = FrameRegisterCache::new();
        frame.project(&image, &config, &mut cache).unwrap();

        let sve_regs = frame.sve_section;
        assert_eq!(
            cache.location(regs::Z0 + 3),
            Some(&RegLocation::Address(sve_regs + 3 * vq * 16))
        );
        // V3 is a view of Z3's low bytes.
        assert_eq!(
            cache.location(regs::V0 + 3),
            Some(&RegLocation::Address(sve_regs + 3 * vq * 16))
        );
        assert_eq!(
            cache.location(regs::P0 + 2),
            Some(&RegLocation::Address(
                sve_regs + format::sve_context_p_regs_offset(vq) + 2 * vq * 2
            ))
        );
        assert_eq!(
            cache.location(regs::FFR),
            Some(&RegLocation::Address(
                sve_regs + format::sve_context_ffr_offset(vq)
            ))
        );
        assert_eq!(
            cache.value_u64(regs::VG, scroll::Endian::Little),
            Some(4)
        );
    }

    #[test]
    fn test_tpidr2_mapping() {
        let image = SynthSigframe::new(LE, SP)
            .add_record(CtxRecord::new(
                format::TPIDR2_MAGIC,
                16,
                tpidr2_body(scroll::Endian::Little, 0xabcd),
            ))
            .finish();
        let config = sme_config(2, 2, false);
        let frame = SignalFrame::locate(&image, &config, SP).unwrap();
        let mut cache = FrameRegisterCache::new();
        frame.project(&image, &config, &mut cache).unwrap();

        assert_eq!(
            cache.location(config.tls_reg_base.unwrap() + 1),
            Some(&RegLocation::Address(
                frame.tpidr2_section + format::TPIDR2_CONTEXT_TPIDR2_OFFSET
            ))
        );
    }

    #[test]
    fn test_swap_vreg_lanes_reverses_bytes() {
        let bytes: [u8; 16] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
        let swapped = swap_vreg_lanes(&bytes);
        let expected: Vec<u8> = bytes.iter().rev().copied().collect();
        assert_eq!(swapped.to_vec(), expected);
        assert_eq!(swap_vreg_lanes(&swapped).to_vec(), bytes.to_vec());
    }
}
