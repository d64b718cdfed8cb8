//! 16-byte interface/class identifiers (a.k.a. TUID in docs).

use core::fmt;

/// 16-byte type used for IIDs/CIDs, stored exactly as the host compares it.
#[repr(C)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Tuid(pub [u8; 16]);

/// FUID is semantically identical to TUID for our purposes (IID/CID).
pub type Fuid = Tuid;

/// Helper macro to define a `Tuid` from 16 literal bytes in memory layout.
#[macro_export]
macro_rules! tuid {
    ($b0:expr,$b1:expr,$b2:expr,$b3:expr,$b4:expr,$b5:expr,$b6:expr,$b7:expr,$b8:expr,$b9:expr,$bA:expr,$bB:expr,$bC:expr,$bD:expr,$bE:expr,$bF:expr) => {
        $crate::Tuid::new([$b0,$b1,$b2,$b3,$b4,$b5,$b6,$b7,$b8,$b9,$bA,$bB,$bC,$bD,$bE,$bF])
    };
}

impl Tuid {
    pub const fn new(bytes: [u8; 16]) -> Self { Self(bytes) }

    /// Builds an identifier from the four 32-bit words of the SDK's `INLINE_UID`.
    ///
    /// Windows builds use the COM-compatible layout (first 8 bytes little-endian
    /// per field), every other platform stores the words big-endian.
    #[cfg(target_os = "windows")]
    pub const fn from_parts(l1: u32, l2: u32, l3: u32, l4: u32) -> Self {
        let a = l1.to_le_bytes();
        let b = l2.to_be_bytes();
        let c = l3.to_be_bytes();
        let d = l4.to_be_bytes();
        Self([a[0], a[1], a[2], a[3], b[1], b[0], b[3], b[2], c[0], c[1], c[2], c[3], d[0], d[1], d[2], d[3]])
    }

    #[cfg(not(target_os = "windows"))]
    pub const fn from_parts(l1: u32, l2: u32, l3: u32, l4: u32) -> Self {
        let a = l1.to_be_bytes();
        let b = l2.to_be_bytes();
        let c = l3.to_be_bytes();
        let d = l4.to_be_bytes();
        Self([a[0], a[1], a[2], a[3], b[0], b[1], b[2], b[3], c[0], c[1], c[2], c[3], d[0], d[1], d[2], d[3]])
    }

    /// Inverse of [`Tuid::from_parts`].
    #[cfg(target_os = "windows")]
    pub const fn to_parts(&self) -> (u32, u32, u32, u32) {
        let b = &self.0;
        (
            u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            u32::from_be_bytes([b[5], b[4], b[7], b[6]]),
            u32::from_be_bytes([b[8], b[9], b[10], b[11]]),
            u32::from_be_bytes([b[12], b[13], b[14], b[15]]),
        )
    }

    #[cfg(not(target_os = "windows"))]
    pub const fn to_parts(&self) -> (u32, u32, u32, u32) {
        let b = &self.0;
        (
            u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
            u32::from_be_bytes([b[4], b[5], b[6], b[7]]),
            u32::from_be_bytes([b[8], b[9], b[10], b[11]]),
            u32::from_be_bytes([b[12], b[13], b[14], b[15]]),
        )
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Allocation-free equality usable in `const` contexts.
    pub const fn const_eq(&self, other: &Tuid) -> bool {
        let mut i = 0;
        while i < 16 {
            if self.0[i] != other.0[i] {
                return false;
            }
            i += 1;
        }
        true
    }
}

#[cfg(feature = "std")]
impl Tuid {
    /// Logical value as a UUID; the canonical text of both is the same digits.
    pub fn to_uuid(&self) -> uuid::Uuid {
        let (l1, l2, l3, l4) = self.to_parts();
        uuid::Uuid::from_u128(((l1 as u128) << 96) | ((l2 as u128) << 64) | ((l3 as u128) << 32) | l4 as u128)
    }

    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        let v = uuid.as_u128();
        Self::from_parts((v >> 96) as u32, (v >> 64) as u32, (v >> 32) as u32, v as u32)
    }

    /// Parses the SDK's 32-digit form or any form `uuid` accepts (dashed, braced, urn).
    pub fn parse(text: &str) -> Result<Self, uuid::Error> {
        uuid::Uuid::parse_str(text.trim()).map(Self::from_uuid)
    }
}

#[cfg(feature = "std")]
impl From<uuid::Uuid> for Tuid {
    fn from(uuid: uuid::Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}

impl fmt::Display for Tuid {
    /// Same text as the SDK's `FUID::toString`: four words, 32 upper-case hex digits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (l1, l2, l3, l4) = self.to_parts();
        write!(f, "{l1:08X}{l2:08X}{l3:08X}{l4:08X}")
    }
}

impl fmt::Debug for Tuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tuid({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: Tuid = Tuid::from_parts(0x42043F99, 0xB7DA453C, 0xA569E79D, 0x9AAEC33D);

    #[test]
    fn parts_roundtrip() {
        assert_eq!(SAMPLE.to_parts(), (0x42043F99, 0xB7DA453C, 0xA569E79D, 0x9AAEC33D));
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn non_com_layout_is_big_endian() {
        assert_eq!(SAMPLE.as_bytes()[..4], [0x42, 0x04, 0x3F, 0x99]);
        assert_eq!(SAMPLE.as_bytes()[4..8], [0xB7, 0xDA, 0x45, 0x3C]);
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn com_layout_swaps_first_half() {
        assert_eq!(SAMPLE.as_bytes()[..8], [0x99, 0x3F, 0x04, 0x42, 0xDA, 0xB7, 0x3C, 0x45]);
    }

    #[test]
    fn display_matches_sdk() {
        assert_eq!(SAMPLE.to_string(), "42043F99B7DA453CA569E79D9AAEC33D");
    }

    #[test]
    fn parse_accepts_both_forms() {
        assert_eq!(Tuid::parse("42043F99B7DA453CA569E79D9AAEC33D").unwrap(), SAMPLE);
        assert_eq!(Tuid::parse("42043f99-b7da-453c-a569-e79d9aaec33d").unwrap(), SAMPLE);
        assert!(Tuid::parse("not-a-guid").is_err());
    }

    #[test]
    fn const_eq_agrees_with_eq() {
        let other = Tuid::from_parts(1, 2, 3, 4);
        assert!(SAMPLE.const_eq(&SAMPLE));
        assert!(!SAMPLE.const_eq(&other));
        assert_ne!(SAMPLE, other);
    }

    #[test]
    fn macro_builds_raw_bytes() {
        let t = tuid!(0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15);
        assert_eq!(t.as_bytes()[15], 15);
    }
}
