//! MPLS wire structures.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// AF_MPLS address family.
///
/// libc does not expose this constant on every target, so it is pinned
/// here to the Linux value the netlink route family expects.
pub const AF_MPLS: u8 = 28;

/// MPLS routes carry the label bit width as their prefix length.
pub const MPLS_DST_LEN: u8 = 20;

/// MPLS label entry (struct mpls_label).
///
/// The entry is a big-endian 32-bit value with:
/// - Bits 31-12: Label (20 bits)
/// - Bits 11-9: Traffic Class (3 bits)
/// - Bit 8: Bottom-of-Stack (S bit)
/// - Bits 7-0: TTL (8 bits)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct MplsLabelEntry {
    /// Big-endian encoded label entry.
    pub entry: u32,
}

impl MplsLabelEntry {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a new label entry (not bottom of stack).
    pub fn new(label: u32) -> Self {
        Self {
            entry: ((label & 0xFFFFF) << 12).to_be(),
        }
    }

    /// Create a bottom-of-stack entry with TTL.
    pub fn bottom(label: u32, ttl: u8) -> Self {
        let entry = ((label & 0xFFFFF) << 12) | (1 << 8) | (ttl as u32);
        Self {
            entry: entry.to_be(),
        }
    }

    /// Get the label value (20 bits).
    pub fn label(&self) -> u32 {
        (u32::from_be(self.entry) >> 12) & 0xFFFFF
    }

    /// Get the traffic class (3 bits).
    pub fn tc(&self) -> u8 {
        ((u32::from_be(self.entry) >> 9) & 0x7) as u8
    }

    /// Check if this is the bottom of stack.
    pub fn is_bos(&self) -> bool {
        (u32::from_be(self.entry) & 0x100) != 0
    }

    /// Get the TTL value.
    pub fn ttl(&self) -> u8 {
        (u32::from_be(self.entry) & 0xFF) as u8
    }

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Option<&Self> {
        Self::ref_from_prefix(data).map(|(r, _)| r).ok()
    }
}

/// MPLS tunnel attributes (MPLS_IPTUNNEL_*).
pub mod mpls_tunnel {
    /// Unspecified.
    pub const UNSPEC: u16 = 0;
    /// Destination label stack.
    pub const DST: u16 = 1;
    /// TTL propagation.
    pub const TTL: u16 = 2;
}

/// Lightweight tunnel encapsulation types (LWTUNNEL_ENCAP_*).
pub mod lwtunnel_encap {
    /// No encapsulation.
    pub const NONE: u16 = 0;
    /// MPLS encapsulation.
    pub const MPLS: u16 = 1;
    /// IP encapsulation.
    pub const IP: u16 = 2;
    /// Segment Routing IPv6.
    pub const SEG6: u16 = 5;
    /// BPF encapsulation.
    pub const BPF: u16 = 6;
}

/// Special MPLS label values.
pub mod mpls_label {
    /// IPv4 Explicit NULL.
    pub const IPV4_EXPLICIT_NULL: u32 = 0;
    /// Router Alert.
    pub const ROUTER_ALERT: u32 = 1;
    /// IPv6 Explicit NULL.
    pub const IPV6_EXPLICIT_NULL: u32 = 2;
    /// Implicit NULL (penultimate hop popping).
    pub const IMPLICIT_NULL: u32 = 3;
    /// Maximum valid label value (2^20 - 1).
    pub const MAX: u32 = 0xFFFFF;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mpls_label_entry_size() {
        assert_eq!(MplsLabelEntry::SIZE, 4);
    }

    #[test]
    fn test_mpls_label_entry_new() {
        let entry = MplsLabelEntry::new(100);
        assert_eq!(entry.label(), 100);
        assert_eq!(entry.tc(), 0);
        assert!(!entry.is_bos());
        assert_eq!(entry.ttl(), 0);
    }

    #[test]
    fn test_mpls_label_entry_bottom() {
        let entry = MplsLabelEntry::bottom(200, 64);
        assert_eq!(entry.label(), 200);
        assert!(entry.is_bos());
        assert_eq!(entry.ttl(), 64);
    }

    #[test]
    fn test_mpls_label_entry_max_label() {
        let entry = MplsLabelEntry::new(mpls_label::MAX);
        assert_eq!(entry.label(), mpls_label::MAX);
    }

    #[test]
    fn test_mpls_label_entry_big_endian() {
        // Label 16, S bit set, TTL 255: 0x000101FF on the wire.
        let entry = MplsLabelEntry::bottom(16, 255);
        assert_eq!(entry.as_bytes(), &[0x00, 0x01, 0x01, 0xFF]);
    }
}
