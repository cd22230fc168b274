//! Frame and transfer checksum.
//!
//! The device family uses CRC-16/ARC (reflected polynomial 0xA001, zero
//! initial value, no final xor), computed one nibble at a time. The same
//! function with a non-zero seed produces the running CRC carried in
//! chunked transfers, so `crc16(crc16(0, a), b) == crc16(0, a ++ b)`.

const NIBBLE_TABLE: [u16; 16] = [
    0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800,
    0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
];

/// Continue a checksum from `seed` over `data`.
pub fn crc16(seed: u16, data: &[u8]) -> u16 {
    data.iter().fold(seed, |crc, &byte| {
        let crc = ((crc >> 4) & 0x0FFF) ^ NIBBLE_TABLE[(crc & 0x0F) as usize]
            ^ NIBBLE_TABLE[(byte & 0x0F) as usize];
        ((crc >> 4) & 0x0FFF) ^ NIBBLE_TABLE[(crc & 0x0F) as usize]
            ^ NIBBLE_TABLE[(byte >> 4) as usize]
    })
}

/// Checksum of `data` from a zero seed.
pub fn checksum(data: &[u8]) -> u16 {
    crc16(0, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(checksum(b"123456789"), 0xBB3D);
    }

    #[test]
    fn test_empty_input_returns_seed() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(crc16(0x1234, &[]), 0x1234);
    }

    #[test]
    fn test_running_crc_matches_whole() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let (head, tail) = data.split_at(17);
        assert_eq!(crc16(crc16(0, head), tail), checksum(data));
    }
}
