//! Document permission bits
//!
//! The 32-bit permission field carried in the encryption dictionary's `P`
//! entry. Bits 1-2 are always zero, bits 7-8 and 13-32 are reserved and
//! always set, which yields the `0xFFFFF0C0` base value with everything
//! prohibited.

use bitflags::bitflags;

const BASE_MASK: u32 = 0xFFFF_F0C0;

bitflags! {
    /// Individual capability bits (3-12) of the permission field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PermissionFlags: u32 {
        const PRINT              = 1 << 2;
        const MODIFY_CONTENTS    = 1 << 3;
        const COPY               = 1 << 4;
        const MODIFY_ANNOTATIONS = 1 << 5;
        const FILL_FORMS         = 1 << 8;
        const ACCESSIBILITY      = 1 << 9;
        const ASSEMBLE           = 1 << 10;
        const PRINT_HIGH_QUALITY = 1 << 11;
    }
}

/// The full permission field, capability bits plus reserved bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    bits: u32,
}

impl Permissions {
    /// All operations prohibited.
    pub fn none() -> Self {
        Self { bits: BASE_MASK }
    }

    /// All operations allowed.
    pub fn all() -> Self {
        Self::from_flags(PermissionFlags::all())
    }

    pub fn from_flags(flags: PermissionFlags) -> Self {
        Self {
            bits: BASE_MASK | flags.bits(),
        }
    }

    /// The raw field as stored in the document, reserved bits included.
    pub fn from_bits(bits: u32) -> Self {
        Self { bits }
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// The field as the signed integer written to the `P` entry.
    pub fn as_p_value(&self) -> i64 {
        self.bits as i32 as i64
    }

    pub fn allows(&self, flag: PermissionFlags) -> bool {
        self.bits & flag.bits() == flag.bits()
    }

    pub fn set(&mut self, flag: PermissionFlags, allow: bool) -> &mut Self {
        if allow {
            self.bits |= flag.bits();
        } else {
            self.bits &= !flag.bits();
        }
        self
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_value() {
        let perm = Permissions::none();
        assert_eq!(perm.bits(), 0xFFFF_F0C0);
        assert!(!perm.allows(PermissionFlags::PRINT));
    }

    #[test]
    fn test_set_and_query() {
        let mut perm = Permissions::none();
        perm.set(PermissionFlags::PRINT, true)
            .set(PermissionFlags::COPY, true);
        assert!(perm.allows(PermissionFlags::PRINT));
        assert!(perm.allows(PermissionFlags::COPY));
        assert!(!perm.allows(PermissionFlags::MODIFY_CONTENTS));

        perm.set(PermissionFlags::PRINT, false);
        assert!(!perm.allows(PermissionFlags::PRINT));
    }

    #[test]
    fn test_p_value_is_negative() {
        // reserved high bits make the signed representation negative
        assert!(Permissions::none().as_p_value() < 0);
    }

    #[test]
    fn test_round_trip_through_raw_bits() {
        let perm = Permissions::from_flags(PermissionFlags::PRINT | PermissionFlags::FILL_FORMS);
        let restored = Permissions::from_bits(perm.as_p_value() as i32 as u32);
        assert_eq!(restored, perm);
    }
}
