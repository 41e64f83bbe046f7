//! A value-backed register file, the destination of regset `supply` calls and
//! the source of `collect` calls on the core-file path.

use crate::arch::ArchConfig;
use crate::format;
use crate::registers as regs;
use scroll::{Pread, Pwrite};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Register {
    bytes: Vec<u8>,
    /// Whether anything has been supplied since construction. Registers start
    /// out zeroed but unavailable.
    available: bool,
}

/// Fixed storage for every register of one architecture configuration.
///
/// Register sizes are pinned at construction from the [`ArchConfig`]; supplying
/// a buffer of the wrong size, or addressing a register the configuration does
/// not have, is a caller bug and panics rather than being reported as a user
/// error.
///
/// When the configuration has SVE, the V registers have no storage of their
/// own: each is a view of the low 16 bytes of its Z register, so supplying one
/// is visible through the other, as with the architectural registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    endian: scroll::Endian,
    regs: BTreeMap<u16, Register>,
    v_aliases_z: bool,
}

impl RegisterFile {
    /// A zeroed register file covering all registers of `config`.
    pub fn new(config: &ArchConfig) -> RegisterFile {
        let v_aliases_z = config.has_sve();
        let regs = config
            .registers()
            .into_iter()
            .filter(|&regnum| !(v_aliases_z && is_v_register(regnum)))
            .map(|regnum| {
                let size = config.register_size(regnum).unwrap();
                (
                    regnum,
                    Register {
                        bytes: vec![0; size],
                        available: false,
                    },
                )
            })
            .collect();
        RegisterFile {
            endian: config.endian(),
            regs,
            v_aliases_z,
        }
    }

    /// The register owning `regnum`'s bytes, and the view length if `regnum`
    /// is only a prefix of that storage.
    fn backing(&self, regnum: u16) -> (u16, Option<usize>) {
        if self.v_aliases_z && is_v_register(regnum) {
            (
                regs::Z0 + (regnum - regs::V0),
                Some(format::V_REGISTER_SIZE),
            )
        } else {
            (regnum, None)
        }
    }

    fn reg(&self, regnum: u16) -> &Register {
        self.regs
            .get(&regnum)
            .unwrap_or_else(|| panic!("register {} not in this configuration", regnum))
    }

    fn reg_mut(&mut self, regnum: u16) -> &mut Register {
        self.regs
            .get_mut(&regnum)
            .unwrap_or_else(|| panic!("register {} not in this configuration", regnum))
    }

    /// Store `bytes` as the value of `regnum`. The length must match.
    pub fn supply(&mut self, regnum: u16, bytes: &[u8]) {
        let (backing, view) = self.backing(regnum);
        let reg = self.reg_mut(backing);
        let len = view.unwrap_or(reg.bytes.len());
        assert_eq!(
            len,
            bytes.len(),
            "register {} supplied with wrong size",
            regnum
        );
        reg.bytes[..len].copy_from_slice(bytes);
        reg.available = true;
    }

    /// Store an all-zero value for `regnum`.
    pub fn supply_zeroed(&mut self, regnum: u16) {
        let (backing, view) = self.backing(regnum);
        let reg = self.reg_mut(backing);
        let len = view.unwrap_or(reg.bytes.len());
        reg.bytes[..len].iter_mut().for_each(|b| *b = 0);
        reg.available = true;
    }

    /// Store an integer value for an 8-byte register, in the configured byte
    /// order.
    pub fn supply_u64(&mut self, regnum: u16, value: u64) {
        let endian = self.endian;
        let reg = self.reg_mut(regnum);
        reg.bytes
            .pwrite_with(value, 0, endian)
            .expect("register too small for a u64");
        reg.available = true;
    }

    /// The current value of `regnum`.
    pub fn collect(&self, regnum: u16) -> &[u8] {
        let (backing, view) = self.backing(regnum);
        let bytes = &self.reg(backing).bytes;
        match view {
            Some(len) => &bytes[..len],
            None => bytes,
        }
    }

    /// The current value of an 8-byte register as an integer.
    pub fn collect_u64(&self, regnum: u16) -> u64 {
        self.reg(regnum)
            .bytes
            .pread_with(0, self.endian)
            .expect("register too small for a u64")
    }

    /// Whether `regnum` has been supplied since construction.
    pub fn is_available(&self, regnum: u16) -> bool {
        let (backing, _) = self.backing(regnum);
        self.reg(backing).available
    }

    /// Whether the current value of `regnum` is all zeroes.
    pub fn is_zero(&self, regnum: u16) -> bool {
        self.collect(regnum).iter().all(|&b| b == 0)
    }

    /// Byte size of `regnum` in this file.
    pub fn register_size(&self, regnum: u16) -> usize {
        self.collect(regnum).len()
    }
}

fn is_v_register(regnum: u16) -> bool {
    regnum >= regs::V0 && regnum < regs::V0 + regs::NUM_V_REGS
}
