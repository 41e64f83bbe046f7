//! AArch64/Linux register-state layout definitions.
//!
//! Constants and structures here should match those defined in the Linux kernel's
//! [sigcontext.h][sigcontext] and [ptrace.h][ptrace] UAPI headers for AArch64. The core-file
//! note section names and sizes match what the kernel's ELF core dumper and GDB emit.
//!
//! [sigcontext]: https://git.kernel.org/pub/scm/linux/kernel/git/torvalds/linux.git/tree/arch/arm64/include/uapi/asm/sigcontext.h
//! [ptrace]: https://git.kernel.org/pub/scm/linux/kernel/git/torvalds/linux.git/tree/arch/arm64/include/uapi/asm/ptrace.h
#![allow(non_camel_case_types)]

use scroll::{Pread, Pwrite, SizeWith};

/// Size in bytes of one saved general-purpose register in a sigcontext.
pub const SIGCONTEXT_REG_SIZE: u64 = 8;
/// Offset of `ucontext` within the kernel's `rt_sigframe`.
pub const RT_SIGFRAME_UCONTEXT_OFFSET: u64 = 128;
/// Offset of `uc_mcontext` (the sigcontext) within `ucontext`.
pub const UCONTEXT_SIGCONTEXT_OFFSET: u64 = 176;
/// Offset of the saved `x0` within the sigcontext (past `fault_address`).
pub const SIGCONTEXT_X0_OFFSET: u64 = 8;
/// Offset of the `__reserved` area within the sigcontext.
pub const SIGCONTEXT_RESERVED_OFFSET: u64 = 288;
/// Size of the sigcontext `__reserved` area.
pub const SIGCONTEXT_RESERVED_SIZE: u64 = 4096;

/// The header prefixed to every record in the sigcontext reserved area.
///
/// A record chain is terminated by a header with a zero magic or size.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pread, Pwrite, SizeWith)]
pub struct AARCH64_CTX_HEADER {
    pub magic: u32,
    pub size: u32,
}

/// Unique identifiers for `AARCH64_CTX_HEADER::magic`.
pub const EXTRA_MAGIC: u32 = 0x45585401;
pub const FPSIMD_MAGIC: u32 = 0x46508001;
pub const SVE_MAGIC: u32 = 0x53564501;
pub const ZA_MAGIC: u32 = 0x54366345;
pub const TPIDR2_MAGIC: u32 = 0x54504902;
pub const ZT_MAGIC: u32 = 0x5a544e01;

/// Offset of the pointer to the overflow block in an `extra_context` record.
pub const EXTRA_DATAP_OFFSET: u64 = 8;

/// Field offsets in an `fpsimd_context` record.
pub const FPSIMD_FPSR_OFFSET: u64 = 8;
pub const FPSIMD_FPCR_OFFSET: u64 = 12;
pub const FPSIMD_V0_OFFSET: u64 = 16;
/// Size in bytes of one V register.
pub const V_REGISTER_SIZE: usize = 16;

/// Field offsets in an `sve_context` record.
pub const SVE_CONTEXT_VL_OFFSET: u64 = 8;
pub const SVE_CONTEXT_FLAGS_OFFSET: u64 = 10;
pub const SVE_CONTEXT_REGS_OFFSET: u64 = 16;

/// Flag in `sve_context` indicating the record holds streaming-mode (SSVE) state.
pub const SVE_SIG_FLAG_SM: u16 = 0x1;

/// Byte offset of the P registers within an SVE register dump.
pub fn sve_context_p_regs_offset(vq: u64) -> u64 {
    32 * vq * 16
}

/// Byte offset of the FFR register within an SVE register dump.
pub fn sve_context_ffr_offset(vq: u64) -> u64 {
    sve_context_p_regs_offset(vq) + 16 * vq * 2
}

/// Minimum declared size of an `sve_context` record carrying a full SVE dump.
///
/// A record smaller than this is header-only (inactive) SVE state.
pub fn sve_context_size(vq: u64) -> u64 {
    sve_context_ffr_offset(vq) + vq * 2
}

/// Field offsets in a `za_context` record.
pub const SME_CONTEXT_SVL_OFFSET: u64 = 8;
pub const SME_CONTEXT_REGS_OFFSET: u64 = 16;

/// Size in bytes of the ZA payload, a square matrix of SVL x SVL bytes.
pub fn sme_context_za_size(svq: u64) -> u64 {
    vl_from_vq(svq) * vl_from_vq(svq)
}

/// Minimum declared size of a `za_context` record carrying a ZA payload.
pub fn sme_context_size(svq: u64) -> u64 {
    SME_CONTEXT_REGS_OFFSET + sme_context_za_size(svq)
}

/// Offset of the register value in a `tpidr2_context` record.
pub const TPIDR2_CONTEXT_TPIDR2_OFFSET: u64 = 8;

/// Field offsets in a `zt_context` record.
pub const SME2_CONTEXT_NREGS_OFFSET: u64 = 8;
pub const SME2_CONTEXT_REGS_OFFSET: u64 = 16;

/// Size in bytes of the ZT0 register.
pub const SME2_ZT0_SIZE: usize = 64;

/// The header at the start of the SVE, SSVE and ZA core-file note sections.
///
/// This matches the kernel's `user_sve_header` / `user_za_header`. For the ZA
/// section the `vl`/`max_vl` fields hold the streaming vector length.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pread, Pwrite, SizeWith)]
pub struct SVE_HEADER {
    /// Declared size of the whole note, header included.
    pub size: u32,
    pub max_size: u32,
    /// Vector length in bytes.
    pub vl: u16,
    pub max_vl: u16,
    pub flags: u16,
    pub reserved: u16,
}

/// Size in bytes of [`SVE_HEADER`].
pub const SVE_HEADER_SIZE: usize = 16;

/// Flag in `SVE_HEADER::flags` indicating the payload is SVE-shaped rather than
/// FPSIMD-shaped.
pub const SVE_HEADER_FLAG_SVE: u16 = 1;

/// Declared size of an inactive (FPSIMD-shaped) SVE note: header plus the
/// FPSIMD payload including its trailing 8 reserved bytes.
pub const SVE_CORE_DUMMY_SIZE: u32 = SVE_HEADER_SIZE as u32 + SIZEOF_FPREGSET as u32;
/// Dummy `max_size` emitted in collected SVE headers: a full SVE payload at the
/// maximum vector length.
pub const SVE_CORE_DUMMY_MAX_SIZE: u32 = SVE_HEADER_SIZE as u32 + 546 * MAX_SVE_VQ as u32 + 8;
/// Dummy `max_vl` emitted in collected SVE headers.
pub const SVE_CORE_DUMMY_MAX_VL: u16 = (MAX_SVE_VQ * 16) as u16;
pub const SVE_CORE_DUMMY_FLAGS: u16 = 0;
pub const SVE_CORE_DUMMY_RESERVED: u16 = 0;

/// Maximum architecturally supported vector length, in quadwords.
pub const MAX_SVE_VQ: u64 = 16;

/// Convert a vector length in bytes to quadwords.
pub fn vq_from_vl(vl: u64) -> u64 {
    vl / 0x10
}

/// Convert a vector length in quadwords to bytes.
pub fn vl_from_vq(vq: u64) -> u64 {
    vq * 0x10
}

/// Convert a vector length in bytes to the VG register value (8-byte granules).
pub fn vg_from_vl(vl: u64) -> u64 {
    vl / 8
}

/// Convert a VG register value to a vector length in bytes.
pub fn vl_from_vg(vg: u64) -> u64 {
    vg * 8
}

bitflags::bitflags! {
    /// The SVCR pseudo-register: SME mode bits.
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
    pub struct Svcr: u64 {
        /// Streaming SVE mode is active.
        const SM = 1 << 0;
        /// The ZA array storage is active.
        const ZA = 1 << 1;
    }
}

/// Core-file note section names, as emitted by the kernel's ELF core dumper.
pub const GREGS_SECTION: &str = ".reg";
pub const FPREGS_SECTION: &str = ".reg2";
pub const SVE_SECTION: &str = ".reg-aarch-sve";
pub const SSVE_SECTION: &str = ".reg-aarch-ssve";
pub const ZA_SECTION: &str = ".reg-aarch-za";
pub const ZT_SECTION: &str = ".reg-aarch-zt";
pub const PAUTH_SECTION: &str = ".reg-aarch-pauth";
pub const MTE_SECTION: &str = ".reg-aarch-mte";
pub const TLS_SECTION: &str = ".reg-aarch-tls";

/// Size in bytes of the general-purpose register note (x0-x30, sp, pc, pstate).
pub const SIZEOF_GREGSET: usize = 34 * 8;
/// Size in bytes of the FPSIMD register note (v0-v31, fpsr, fpcr, 8 reserved bytes).
pub const SIZEOF_FPREGSET: usize = 33 * V_REGISTER_SIZE;
/// Size in bytes of the pointer-authentication note (data and code masks).
pub const SIZEOF_PAUTH_REGSET: usize = 16;
/// Size in bytes of the MTE note (`tag_ctl`).
pub const SIZEOF_MTE_REGSET: usize = 8;
/// Size in bytes of one TLS register in the TLS note.
pub const TLS_REGISTER_SIZE: usize = 8;
/// Most TLS registers the kernel ever dumps (`tpidr_el0`, plus `tpidr2_el0`
/// with SME).
pub const MAX_TLS_REGISTER_COUNT: u64 = 2;

/// HWCAP bit indicating pointer-authentication (address) support.
pub const HWCAP_PACA: u64 = 1 << 30;
/// HWCAP2 bit indicating MTE support.
pub const HWCAP2_MTE: u64 = 1 << 18;

/// Size in bytes of one MTE tag granule.
pub const MTE_GRANULE_SIZE: u64 = 16;

/// The fixed two-instruction rt_sigreturn restorer sequence
/// (`movz x8, #__NR_rt_sigreturn; svc #0`), used by external trampoline matchers.
pub const RT_SIGRETURN_RESTORER: [u32; 2] = [0xd2801168, 0xd4000001];
