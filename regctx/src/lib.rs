//! A library for reconstructing a debugger's view of AArch64/Linux register state.
//!
//! Two raw byte sources are supported, and agree on a single mapping from bytes
//! to named architectural registers:
//!
//! * a stopped thread's **signal-delivery stack frame**, whose kernel-defined
//!   layout chains variably-sized, magic-tagged records through the sigcontext
//!   reserved area ([`frame`]);
//! * a core file's **register note sections**, whose presence, size and
//!   encoding depend on which CPU extensions were active at dump time
//!   ([`regset`], [`corefile`]).
//!
//! Both paths handle the scalable extensions (SVE, streaming SVE, SME ZA/ZT)
//! whose register sizes are only known at runtime, plus pointer
//! authentication, MTE and TLS registers. [`mte`] packs and unpacks MTE
//! allocation tags for core-file memory-tag sections.
//!
//! The typical core-file flow is: detect active extensions with
//! [`corefile::read_features`], build an [`arch::ArchConfig`] from them, obtain
//! the note catalog with [`regset::regset_sections`], and feed each note's
//! bytes through [`regset::supply_regset`] into a [`regfile::RegisterFile`].
//! The live flow is driven by an external trampoline matcher (see
//! [`regctx_common::format::RT_SIGRETURN_RESTORER`]) which hands a stack
//! pointer to [`frame::SignalFrame::locate`].

pub mod arch;
pub mod corefile;
pub mod frame;
pub mod mte;
pub mod regfile;
pub mod regset;
pub mod target;

pub use regctx_common::format;
pub use regctx_common::registers;

/// Errors encountered while reconstructing register state.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// A target-memory read required by the signal-frame path failed.
    #[error("Failed to read {0} from signal context at {1:#x}")]
    MemoryReadFailure(&'static str, u64),
    /// A ZT record was found in a live signal frame without a ZA payload.
    ///
    /// The kernel never emits this combination; it indicates frame corruption
    /// or a kernel/debugger mismatch, so it is never silently accepted.
    #[error(
        "While reading signal context information, found a ZT context \
         without a ZA context, which is invalid"
    )]
    ZtWithoutZa,
    /// A register note from a core file was smaller than its layout requires.
    #[error("Register note too small: expected at least {minimum} bytes, got {actual} bytes")]
    TruncatedRegset { minimum: usize, actual: usize },
    /// A register note's header declared a vector length that contradicts the
    /// architecture configuration it is being supplied into.
    #[error("Vector length mismatch: configuration says {expected} bytes, note says {actual} bytes")]
    VectorLengthMismatch { expected: u64, actual: u64 },
    /// A vector length outside `[1, MAX_SVE_VQ]` quadwords was used to build an
    /// architecture configuration.
    #[error("Invalid vector length: vq {0} (max vq={max})", max = regctx_common::format::MAX_SVE_VQ)]
    InvalidVectorLength(u64),
    /// A TLS register count beyond what the kernel can dump was used to build
    /// an architecture configuration.
    #[error("Invalid TLS register count: {0} (max {max})", max = regctx_common::format::MAX_TLS_REGISTER_COUNT)]
    InvalidTlsRegisterCount(u64),
}

impl Error {
    /// Returns just the name of the error, as a more human-friendly version of
    /// an error-code for error logging.
    pub fn name(&self) -> &'static str {
        match self {
            Error::MemoryReadFailure(..) => "MemoryReadFailure",
            Error::ZtWithoutZa => "ZtWithoutZa",
            Error::TruncatedRegset { .. } => "TruncatedRegset",
            Error::VectorLengthMismatch { .. } => "VectorLengthMismatch",
            Error::InvalidVectorLength(..) => "InvalidVectorLength",
            Error::InvalidTlsRegisterCount(..) => "InvalidTlsRegisterCount",
        }
    }
}
