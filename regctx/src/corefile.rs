//! Feature discovery from a core file's note sections and auxv values.
//!
//! A core file does not name the CPU features its registers were dumped with;
//! they have to be inferred from which note sections exist, their sizes, and
//! the vector lengths recorded in the scalable note headers. Everything here
//! is best-effort: a malformed optional note downgrades to "feature absent"
//! with a warning rather than failing the whole open.

use scroll::{Endian, Pread};
use tracing::warn;

use crate::arch::Features;
use crate::format::{self, SVE_HEADER, SVE_HEADER_SIZE};
use crate::target::CoreSections;

fn read_sve_header(
    sections: &dyn CoreSections,
    endian: Endian,
    name: &str,
) -> Option<SVE_HEADER> {
    let bytes = sections.section_contents(name, 0, SVE_HEADER_SIZE)?;
    bytes.pread_with(0, endian).ok()
}

/// Read the vector quotient recorded in the named scalable note section.
///
/// Returns 0 when the section is absent, and also (with a warning) when it is
/// malformed: the caller treats 0 as "feature not present", which degrades a
/// corrupt optional note into a missing one.
pub fn read_vq(sections: &dyn CoreSections, endian: Endian, name: &str) -> u64 {
    let size = match sections.section_size(name) {
        Some(size) => size,
        None => return 0,
    };
    if size < SVE_HEADER_SIZE {
        warn!("'{}' note occupies {} bytes, expected at least {}", name, size, SVE_HEADER_SIZE);
        return 0;
    }

    let header = match read_sve_header(sections, endian, name) {
        Some(header) => header,
        None => {
            warn!("failed to read header from '{}' note", name);
            return 0;
        }
    };

    let vq = format::vq_from_vl(u64::from(header.vl));
    if vq > format::MAX_SVE_VQ || vq == 0 {
        warn!("SVE vector quotient ({}) in '{}' note is invalid", vq, name);
        return 0;
    }
    vq
}

/// The vector quotient the scalable registers were dumped with.
///
/// When the SSVE note records that streaming mode was active, its streaming
/// vector length governs the dump and takes priority over the SVE note's.
pub fn read_vq_from_sections(sections: &dyn CoreSections, endian: Endian) -> u64 {
    if let Some(header) = read_sve_header(sections, endian, format::SSVE_SECTION) {
        if header.flags & format::SVE_HEADER_FLAG_SVE != 0 {
            return read_vq(sections, endian, format::SSVE_SECTION);
        }
    }
    read_vq(sections, endian, format::SVE_SECTION)
}

/// Infer the register-file feature set from a core file's note sections plus
/// the `AT_HWCAP`/`AT_HWCAP2` auxv values.
pub fn read_features(
    sections: &dyn CoreSections,
    endian: Endian,
    hwcap: u64,
    hwcap2: u64,
) -> Features {
    let vq = read_vq_from_sections(sections, endian);
    let svq = read_vq(sections, endian, format::ZA_SECTION);

    let tls = match sections.section_size(format::TLS_SECTION) {
        Some(size) => {
            let count = (size / format::TLS_REGISTER_SIZE) as u64;
            if count > format::MAX_TLS_REGISTER_COUNT {
                warn!(
                    "core file '{}' note declares {} TLS registers (max {}); ignoring it",
                    format::TLS_SECTION,
                    count,
                    format::MAX_TLS_REGISTER_COUNT
                );
                0
            } else {
                count
            }
        }
        None => 0,
    };

    let zt_present = sections.section_size(format::ZT_SECTION).is_some();
    if zt_present && svq == 0 {
        // A ZT note without ZA storage is not a state the kernel can produce.
        warn!("core file contains a '{}' note but no usable '{}' note; ignoring it",
            format::ZT_SECTION, format::ZA_SECTION);
    }

    Features {
        vq,
        svq,
        pauth: hwcap & format::HWCAP_PACA != 0,
        mte: hwcap2 & format::HWCAP2_MTE != 0,
        tls,
        sme2: zt_present && svq > 0,
    }
}
