//! Architecture configuration: which extensions are present, and the register
//! numbering and sizes that follow from them.

use crate::format::{self, vl_from_vq};
use crate::registers as regs;
use crate::Error;
use scroll::Endian;

/// The set of optional extensions active for one thread or core file.
///
/// Produced by [`crate::corefile::read_features`] for core files, or from the
/// auxiliary vector and ptrace probing for live targets.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Features {
    /// SVE vector length in quadwords, 0 if SVE is absent.
    pub vq: u64,
    /// SME streaming vector length in quadwords, 0 if SME is absent.
    pub svq: u64,
    /// Pointer-authentication masks are available.
    pub pauth: bool,
    /// Memory tagging is available.
    pub mte: bool,
    /// Number of TLS registers (0 = no TLS registers, 2 = tpidr + tpidr2).
    pub tls: u64,
    /// SME2 (the ZT0 register) is available.
    pub sme2: bool,
}

/// An immutable register-layout description for one `(endianness, Features)`
/// tuple.
///
/// Register numbering and byte sizes depend on the vector lengths, so
/// configurations with different lengths are distinct values; a configuration
/// is never mutated in place. Extension register ids are assigned from
/// [`regs::DYNAMIC_REG_BASE`] in a fixed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchConfig {
    endian: Endian,
    features: Features,
    /// First pointer-authentication register (data mask, then code mask).
    pub pauth_reg_base: Option<u16>,
    /// The MTE `tag_ctl` register.
    pub mte_reg_base: Option<u16>,
    /// First TLS register (tpidr; tpidr2 follows when `tls >= 2`).
    pub tls_reg_base: Option<u16>,
    /// The streaming vector-granule pseudo-register.
    pub svg_regnum: Option<u16>,
    /// The SVCR mode pseudo-register.
    pub svcr_regnum: Option<u16>,
    /// The ZA array storage pseudo-register.
    pub za_regnum: Option<u16>,
    /// The ZT0 register.
    pub zt0_regnum: Option<u16>,
}

impl ArchConfig {
    /// Build a configuration, validating the vector lengths and the TLS
    /// register count.
    ///
    /// Out-of-range lengths are an error here, never clamped; callers reading
    /// untrusted input are expected to have downgraded bad lengths to
    /// "feature absent" beforehand (see [`crate::corefile::read_vq`]).
    pub fn new(endian: Endian, features: Features) -> Result<ArchConfig, Error> {
        if features.vq > format::MAX_SVE_VQ {
            return Err(Error::InvalidVectorLength(features.vq));
        }
        if features.svq > format::MAX_SVE_VQ {
            return Err(Error::InvalidVectorLength(features.svq));
        }
        if features.tls > format::MAX_TLS_REGISTER_COUNT {
            return Err(Error::InvalidTlsRegisterCount(features.tls));
        }

        let mut next = regs::DYNAMIC_REG_BASE;
        let mut alloc = |count: u16| {
            let base = next;
            next += count;
            base
        };

        let pauth_reg_base = if features.pauth { Some(alloc(2)) } else { None };
        let mte_reg_base = if features.mte { Some(alloc(1)) } else { None };
        let tls_reg_base = if features.tls > 0 {
            Some(alloc(features.tls as u16))
        } else {
            None
        };
        let (svg_regnum, svcr_regnum, za_regnum) = if features.svq > 0 {
            (Some(alloc(1)), Some(alloc(1)), Some(alloc(1)))
        } else {
            (None, None, None)
        };
        // ZT0 only exists alongside ZA.
        let zt0_regnum = if features.sme2 && features.svq > 0 {
            Some(alloc(1))
        } else {
            None
        };

        Ok(ArchConfig {
            endian,
            features,
            pauth_reg_base,
            mte_reg_base,
            tls_reg_base,
            svg_regnum,
            svcr_regnum,
            za_regnum,
            zt0_regnum,
        })
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn features(&self) -> &Features {
        &self.features
    }

    /// SVE vector length in quadwords.
    pub fn vq(&self) -> u64 {
        self.features.vq
    }

    /// Streaming vector length in quadwords.
    pub fn svq(&self) -> u64 {
        self.features.svq
    }

    pub fn has_sve(&self) -> bool {
        self.features.vq > 0
    }

    pub fn has_sme(&self) -> bool {
        self.features.svq > 0
    }

    pub fn has_sme2(&self) -> bool {
        self.zt0_regnum.is_some()
    }

    pub fn has_pauth(&self) -> bool {
        self.pauth_reg_base.is_some()
    }

    pub fn has_mte(&self) -> bool {
        self.mte_reg_base.is_some()
    }

    pub fn has_tls(&self) -> bool {
        self.tls_reg_base.is_some()
    }

    pub fn tls_register_count(&self) -> u64 {
        self.features.tls
    }

    /// Size in bytes of the ZA storage (SVL x SVL).
    pub fn za_size(&self) -> usize {
        format::sme_context_za_size(self.features.svq) as usize
    }

    /// The byte size of register `regnum` under this configuration, or `None`
    /// if the register does not exist here.
    pub fn register_size(&self, regnum: u16) -> Option<usize> {
        let vq = self.features.vq;
        match regnum {
            r if r <= regs::CPSR => Some(8),
            r if r >= regs::V0 && r < regs::V0 + regs::NUM_V_REGS => Some(16),
            regs::FPSR | regs::FPCR => Some(4),
            r if r >= regs::Z0 && r < regs::Z0 + regs::NUM_V_REGS => {
                self.has_sve().then(|| vl_from_vq(vq) as usize)
            }
            r if r >= regs::P0 && r < regs::P0 + regs::NUM_P_REGS => {
                self.has_sve().then(|| (vq * 2) as usize)
            }
            regs::FFR => self.has_sve().then(|| (vq * 2) as usize),
            regs::VG => self.has_sve().then(|| 8),
            r if r >= regs::Q0 && r < regs::DYNAMIC_REG_BASE => {
                // The fixed-length views onto the V registers.
                regs::V_ALIASES
                    .iter()
                    .find(|(base, _)| r >= *base && r < *base + regs::NUM_V_REGS)
                    .map(|&(_, len)| len)
            }
            r => self.dynamic_register_size(r),
        }
    }

    fn dynamic_register_size(&self, regnum: u16) -> Option<usize> {
        if let Some(base) = self.pauth_reg_base {
            if regnum == base || regnum == base + 1 {
                return Some(8);
            }
        }
        if let Some(base) = self.mte_reg_base {
            if regnum == base {
                return Some(8);
            }
        }
        if let Some(base) = self.tls_reg_base {
            if regnum >= base && u64::from(regnum - base) < self.features.tls {
                return Some(format::TLS_REGISTER_SIZE);
            }
        }
        if self.svg_regnum == Some(regnum) || self.svcr_regnum == Some(regnum) {
            return Some(8);
        }
        if self.za_regnum == Some(regnum) {
            return Some(self.za_size());
        }
        if self.zt0_regnum == Some(regnum) {
            return Some(format::SME2_ZT0_SIZE);
        }
        None
    }

    /// Every register with backing storage in this configuration, in id order.
    ///
    /// The Q/D/S/H/B views are excluded: they have no storage of their own.
    pub fn registers(&self) -> Vec<u16> {
        let mut out: Vec<u16> = (regs::X0..=regs::FPCR).collect();
        if self.has_sve() {
            out.extend(regs::Z0..=regs::VG);
        }
        out.extend(
            (regs::DYNAMIC_REG_BASE..)
                .take_while(|&r| self.dynamic_register_size(r).is_some()),
        );
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use scroll::LE;

    #[test]
    fn test_minimal_config() {
        let config = ArchConfig::new(LE, Features::default()).unwrap();
        assert!(!config.has_sve());
        assert!(!config.has_sme());
        assert_eq!(config.register_size(regs::X0), Some(8));
        assert_eq!(config.register_size(regs::V0 + 31), Some(16));
        assert_eq!(config.register_size(regs::Z0), None);
        assert_eq!(config.register_size(regs::DYNAMIC_REG_BASE), None);
        assert_eq!(config.registers().len(), 68);
    }

    #[test]
    fn test_sve_register_sizes() {
        let features = Features {
            vq: 4,
            ..Default::default()
        };
        let config = ArchConfig::new(LE, features).unwrap();
        assert_eq!(config.register_size(regs::Z0 + 31), Some(64));
        assert_eq!(config.register_size(regs::P0), Some(8));
        assert_eq!(config.register_size(regs::FFR), Some(8));
        assert_eq!(config.register_size(regs::VG), Some(8));
        assert_eq!(config.register_size(regs::Q0), Some(16));
        assert_eq!(config.register_size(regs::B0 + 31), Some(1));
    }

    #[test]
    fn test_dynamic_bases_are_sequential() {
        let features = Features {
            vq: 2,
            svq: 2,
            pauth: true,
            mte: true,
            tls: 2,
            sme2: true,
        };
        let config = ArchConfig::new(LE, features).unwrap();
        let base = regs::DYNAMIC_REG_BASE;
        assert_eq!(config.pauth_reg_base, Some(base));
        assert_eq!(config.mte_reg_base, Some(base + 2));
        assert_eq!(config.tls_reg_base, Some(base + 3));
        assert_eq!(config.svg_regnum, Some(base + 5));
        assert_eq!(config.svcr_regnum, Some(base + 6));
        assert_eq!(config.za_regnum, Some(base + 7));
        assert_eq!(config.zt0_regnum, Some(base + 8));
        assert_eq!(config.za_size(), 32 * 32);
        // Nothing past ZT0.
        assert_eq!(config.register_size(base + 9), None);
    }

    #[test]
    fn test_sme2_requires_sme() {
        let features = Features {
            sme2: true,
            ..Default::default()
        };
        let config = ArchConfig::new(LE, features).unwrap();
        assert!(!config.has_sme2());
    }

    #[test]
    fn test_vector_length_out_of_range() {
        let features = Features {
            vq: 17,
            ..Default::default()
        };
        assert_eq!(
            ArchConfig::new(LE, features),
            Err(Error::InvalidVectorLength(17))
        );
    }

    #[test]
    fn test_tls_register_count_out_of_range() {
        // A count this large would also wrap the dynamic register-id space.
        let features = Features {
            tls: 65535,
            ..Default::default()
        };
        assert_eq!(
            ArchConfig::new(LE, features),
            Err(Error::InvalidTlsRegisterCount(65535))
        );
    }
}
