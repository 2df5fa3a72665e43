//! Ethernet frame types and helpers.
//!
//! # Reference
//! IEEE 802.3, IEEE 1588 Annex F

pub const ETH_ALEN: usize = 6;
pub const ETH_HLEN: usize = 14;

// Common EtherTypes
pub const ETH_P_IP: u16 = 0x0800;
/// PTP over Ethernet (IEEE 1588 Annex F).
pub const ETH_P_PTP: u16 = 0x88F7;

/// EtherType of an untagged frame, `None` if the header is truncated.
pub fn ethertype(frame: &[u8]) -> Option<u16> {
    let bytes = frame.get(2 * ETH_ALEN..ETH_HLEN)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ethertype() {
        let mut frame = [0u8; 60];
        frame[12] = 0x88;
        frame[13] = 0xF7;
        assert_eq!(ethertype(&frame), Some(ETH_P_PTP));
        assert_eq!(ethertype(&frame[..13]), None);
    }
}
