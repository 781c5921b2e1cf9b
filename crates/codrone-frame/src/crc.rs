//! CRC-16/XMODEM (poly `0x1021`, no reflection, no final XOR).
//!
//! The running value is the whole state, so a checksum over `a ++ b` can be
//! computed as `crc16(b, crc16(a, CRC16_INITIAL))`.

/// Seed for a fresh checksum.
pub const CRC16_INITIAL: u16 = 0x0000;

const POLY: u16 = 0x1021;

static TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Continue a checksum over `bytes`, starting from `seed`.
pub fn crc16(bytes: &[u8], seed: u16) -> u16 {
    bytes.iter().fold(seed, |crc, &byte| {
        (crc << 8) ^ TABLE[usize::from((crc >> 8) as u8 ^ byte)]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xmodem_check_value() {
        assert_eq!(crc16(b"123456789", CRC16_INITIAL), 0x31C3);
    }

    #[test]
    fn empty_input_returns_seed() {
        assert_eq!(crc16(&[], CRC16_INITIAL), CRC16_INITIAL);
        assert_eq!(crc16(&[], 0xBEEF), 0xBEEF);
    }

    #[test]
    fn matches_bitwise_reference() {
        fn bitwise(bytes: &[u8]) -> u16 {
            let mut crc = 0u16;
            for &b in bytes {
                crc ^= u16::from(b) << 8;
                for _ in 0..8 {
                    crc = if crc & 0x8000 != 0 {
                        (crc << 1) ^ 0x1021
                    } else {
                        crc << 1
                    };
                }
            }
            crc
        }

        let data: Vec<u8> = (0..=255u8).chain((0..64u8).map(|i| i.wrapping_mul(7))).collect();
        assert_eq!(crc16(&data, CRC16_INITIAL), bitwise(&data));
    }

    #[test]
    fn continuation_over_every_split() {
        let data: Vec<u8> = (0..40u8).map(|i| i.wrapping_mul(37).wrapping_add(11)).collect();
        let whole = crc16(&data, CRC16_INITIAL);

        for split in 0..=data.len() {
            let (a, b) = data.split_at(split);
            assert_eq!(crc16(b, crc16(a, CRC16_INITIAL)), whole, "split at {split}");
        }
    }

    #[test]
    fn continuation_with_nonzero_seed() {
        let seed = 0x1D0F;
        let a = [0x40, 0x08, 0x10, 0x70];
        let b = [1, 2, 3, 4, 5, 6, 7, 8];
        let joined: Vec<u8> = a.iter().chain(b.iter()).copied().collect();
        assert_eq!(crc16(&b, crc16(&a, seed)), crc16(&joined, seed));
    }

    #[test]
    fn single_bit_flip_changes_checksum() {
        let mut data = *b"drone telemetry";
        let original = crc16(&data, CRC16_INITIAL);
        data[4] ^= 0x01;
        assert_ne!(crc16(&data, CRC16_INITIAL), original);
    }
}
