use crate::error::PacketError;

use nom::{number::complete::be_u16, sequence::tuple, IResult};

pub struct Utils;

impl Utils {
    pub fn round(value: f64, decimals: i32) -> f64 {
        let factor = 10f64.powi(decimals);
        (value * factor).round() / factor
    }

    fn slice_at(data: &[u8], pos: usize, len: usize) -> Result<&[u8], PacketError> {
        data.get(pos..pos + len).ok_or(PacketError::Truncated {
            offset: pos,
            len: data.len(),
        })
    }

    pub fn u8_at(data: &[u8], pos: usize) -> Result<u8, PacketError> {
        Ok(Self::slice_at(data, pos, 1)?[0])
    }

    pub fn be_i16_at(data: &[u8], pos: usize) -> Result<i16, PacketError> {
        let b = Self::slice_at(data, pos, 2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    pub fn be_u16_at(data: &[u8], pos: usize) -> Result<u16, PacketError> {
        let b = Self::slice_at(data, pos, 2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn swapped_u32_at(data: &[u8], pos: usize) -> Result<u32, PacketError> {
        let b = Self::slice_at(data, pos, 4)?;
        Self::swapped_u32(b)
            .map(|(_, value)| value)
            .map_err(|_| PacketError::Truncated {
                offset: pos,
                len: data.len(),
            })
    }

    // 32-bit counters arrive as two big-endian words, low word first:
    // [b0 b1 b2 b3] => b2 b3 b0 b1
    pub fn swapped_u32(input: &[u8]) -> IResult<&[u8], u32> {
        let (input, (low, high)) = tuple((be_u16, be_u16))(input)?;
        Ok((input, (u32::from(high) << 16) | u32::from(low)))
    }

    /// `100 * discharged / charged`, or 0 when nothing has been charged yet.
    pub fn efficiency(charged: f64, discharged: f64) -> f64 {
        if charged == 0.0 {
            0.0
        } else {
            100.0 * discharged / charged
        }
    }

    pub fn hex(data: &[u8]) -> String {
        data.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swapped_u32_permutation() {
        let buf = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(
            Utils::swapped_u32_at(&buf, 0).unwrap(),
            0x03 * 16_777_216 + 0x04 * 65_536 + 0x01 * 256 + 0x02
        );
        assert_eq!(Utils::swapped_u32_at(&buf, 0).unwrap(), 0x0304_0102);
    }

    #[test]
    fn swapped_u32_at_offset() {
        let buf = [0xff, 0xff, 0x00, 0x10, 0x00, 0x00, 0xaa];
        assert_eq!(Utils::swapped_u32_at(&buf, 2).unwrap(), 0x0000_0010);
        assert_eq!(
            Utils::swapped_u32_at(&buf, 4),
            Err(PacketError::Truncated { offset: 4, len: 7 })
        );
    }

    #[test]
    fn signed_and_unsigned_words() {
        let buf = [0xff, 0x38, 0x01, 0x2c];
        assert_eq!(Utils::be_i16_at(&buf, 0).unwrap(), -200);
        assert_eq!(Utils::be_u16_at(&buf, 0).unwrap(), 65336);
        assert_eq!(Utils::be_i16_at(&buf, 2).unwrap(), 300);
        assert!(Utils::be_i16_at(&buf, 3).is_err());
        assert_eq!(Utils::u8_at(&buf, 3).unwrap(), 0x2c);
        assert!(Utils::u8_at(&buf, 4).is_err());
    }

    #[test]
    fn efficiency_guards_zero_charge() {
        assert_eq!(Utils::efficiency(0.0, 150.0), 0.0);
        assert_eq!(Utils::efficiency(200.0, 150.0), 75.0);
    }

    #[test]
    fn round_to_decimals() {
        assert_eq!(Utils::round(3.14159, 2), 3.14);
        assert_eq!(Utils::round(52.36, 1), 52.4);
        assert_eq!(Utils::round(-1.25, 0), -1.0);
    }

    #[test]
    fn hex_is_lower_case() {
        assert_eq!(Utils::hex(&[0x00, 0xab, 0x10]), "00ab10");
    }
}
