//! Architectural register numbering.
//!
//! Registers are identified by a flat `u16` id. The fixed block below is always
//! present; ids for optional extension registers (pointer authentication, MTE,
//! TLS, SME, SME2) are assigned dynamically per architecture configuration,
//! starting at [`DYNAMIC_REG_BASE`].
//!
//! The Q/D/S/H/B registers are views onto the low bytes of the corresponding V
//! register (itself the low 16 bytes of the Z register when SVE is present);
//! they are modeled as distinct ids backed by the same storage, see
//! [`V_ALIASES`].

/// General-purpose registers x0-x30.
pub const X0: u16 = 0;
pub const SP: u16 = 31;
pub const PC: u16 = 32;
pub const CPSR: u16 = 33;

/// FPSIMD registers v0-v31.
pub const V0: u16 = 34;
pub const FPSR: u16 = 66;
pub const FPCR: u16 = 67;

/// Scalable registers z0-z31 (sizes depend on the runtime vector length).
pub const Z0: u16 = 68;
/// Predicate registers p0-p15.
pub const P0: u16 = 100;
pub const FFR: u16 = 116;
/// The vector-granule pseudo-register.
pub const VG: u16 = 117;

/// Narrowing views onto v0-v31.
pub const Q0: u16 = 118;
pub const D0: u16 = 150;
pub const S0: u16 = 182;
pub const H0: u16 = 214;
pub const B0: u16 = 246;

/// First id available for per-configuration extension registers.
pub const DYNAMIC_REG_BASE: u16 = 278;

/// Number of Z and V registers.
pub const NUM_V_REGS: u16 = 32;
/// Number of predicate registers.
pub const NUM_P_REGS: u16 = 16;
/// Number of general-purpose registers (excluding sp/pc/cpsr).
pub const NUM_X_REGS: u16 = 31;

/// The sized views over a V register's backing bytes: `(first id, length)`.
///
/// All have offset zero into the backing storage, so one address mapping or
/// value copy of the backing bytes covers every alias.
pub const V_ALIASES: &[(u16, usize)] = &[(Q0, 16), (D0, 8), (S0, 4), (H0, 2), (B0, 1)];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fixed_block_is_disjoint() {
        // Each range must end before the next begins.
        assert_eq!(X0 + NUM_X_REGS, SP);
        assert_eq!(V0 + NUM_V_REGS, FPSR);
        assert_eq!(Z0 + NUM_V_REGS, P0);
        assert_eq!(P0 + NUM_P_REGS, FFR);
        assert_eq!(Q0 + NUM_V_REGS, D0);
        assert_eq!(B0 + NUM_V_REGS, DYNAMIC_REG_BASE);
    }
}
