//! Compact ("bits") target encoding
//!
//! A target is a 256-bit unsigned integer. Block headers carry it in a lossy
//! 32-bit floating form: `bits = (size << 24) | mantissa`, where `size` is the
//! byte length of the value, the low 23 bits are the mantissa and bit 23 is a
//! sign flag. The value is `mantissa * 256^(size - 3)`.
//!
//! Decoding never fails. A negative or overflowing encoding is reported as a
//! flag on [`DecodedTarget`] and it is up to the consensus rule in question to
//! reject it.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ConsensusError, Result};

const SIGN_BIT: u32 = 0x0080_0000;
const MANTISSA_MASK: u32 = 0x007f_ffff;

/// 32-bit compact encoding of a 256-bit target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompactTarget(pub u32);

/// Result of expanding a [`CompactTarget`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedTarget {
    pub target: U256,
    pub negative: bool,
    pub overflow: bool,
}

impl DecodedTarget {
    /// The magnitude, if the encoding is neither negative nor overflowing
    pub fn valid_target(&self) -> Option<U256> {
        if self.negative || self.overflow {
            None
        } else {
            Some(self.target)
        }
    }
}

impl CompactTarget {
    pub const fn new(bits: u32) -> Self {
        CompactTarget(bits)
    }

    pub fn to_consensus(self) -> u32 {
        self.0
    }

    pub fn size(self) -> u32 {
        self.0 >> 24
    }

    /// Expand to a full 256-bit value.
    ///
    /// Shifts past 256 bits yield zero; the overflow flag is what reports
    /// that case.
    pub fn decode(self) -> DecodedTarget {
        let size = self.size();
        let mut word = self.0 & MANTISSA_MASK;

        let target = if size <= 3 {
            word >>= 8 * (3 - size);
            U256::from(word)
        } else {
            let shift = 8 * (size - 3);
            if shift >= 256 {
                U256::zero()
            } else {
                U256::from(word) << shift
            }
        };

        let negative = word != 0 && (self.0 & SIGN_BIT) != 0;
        let overflow = word != 0
            && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));

        DecodedTarget {
            target,
            negative,
            overflow,
        }
    }

    /// Compress a non-negative target. Low-order bytes beyond the 23-bit
    /// mantissa are truncated.
    pub fn from_target(target: &U256) -> Self {
        Self::encode(target, false)
    }

    /// Compress a target, setting the sign bit when `negative` and the
    /// mantissa is non-zero.
    pub fn encode(target: &U256, negative: bool) -> Self {
        let mut size = ((target.bits() + 7) / 8) as u32;
        let mut compact = if size <= 3 {
            (target.low_u64() << (8 * (3 - size))) as u32
        } else {
            (*target >> (8 * (size - 3))).low_u32()
        };

        // The mantissa's top bit is the sign; move a byte into the exponent instead.
        if compact & SIGN_BIT != 0 {
            compact >>= 8;
            size += 1;
        }

        compact |= size << 24;
        if negative && compact & MANTISSA_MASK != 0 {
            compact |= SIGN_BIT;
        }
        CompactTarget(compact)
    }
}

impl From<u32> for CompactTarget {
    fn from(bits: u32) -> Self {
        CompactTarget(bits)
    }
}

impl From<CompactTarget> for u32 {
    fn from(bits: CompactTarget) -> Self {
        bits.0
    }
}

impl fmt::Display for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::LowerHex for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Multiply by a signed scalar the way the retarget formulas always have:
/// the factor is taken as a 32-bit word and the product wraps modulo 2^256.
pub(crate) fn mul_scalar(value: U256, factor: i64) -> U256 {
    value.overflowing_mul(U256::from(factor as u32)).0
}

/// Divide by a signed scalar taken as a 64-bit word, truncating.
pub(crate) fn div_scalar(value: U256, divisor: i64) -> Result<U256> {
    let divisor = divisor as u64;
    if divisor == 0 {
        return Err(ConsensusError::InvalidParams(
            "retarget divisor is zero".to_string(),
        ));
    }
    Ok(value / U256::from(divisor))
}


#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bits: u32) -> DecodedTarget {
        CompactTarget(bits).decode()
    }

    #[test]
    fn test_zero_encodings() {
        for bits in [
            0x0000_0000,
            0x0012_3456,
            0x0100_3456,
            0x0200_0056,
            0x0300_0000,
            0x0400_0000,
            0x0092_3456,
            0x0180_3456,
        ] {
            let decoded = decode(bits);
            assert!(decoded.target.is_zero(), "{bits:#010x}");
            assert!(!decoded.negative, "{bits:#010x}");
            assert!(!decoded.overflow, "{bits:#010x}");
        }
        assert_eq!(CompactTarget::from_target(&U256::zero()), CompactTarget(0));
    }

    #[test]
    fn test_small_sizes() {
        let decoded = decode(0x0112_3456);
        assert_eq!(decoded.target, U256::from(0x12u32));
        assert_eq!(CompactTarget::from_target(&decoded.target), CompactTarget(0x0112_0000));

        let decoded = decode(0x0212_3456);
        assert_eq!(decoded.target, U256::from(0x1234u32));
        assert_eq!(CompactTarget::from_target(&decoded.target), CompactTarget(0x0212_3400));

        let decoded = decode(0x0312_3456);
        assert_eq!(decoded.target, U256::from(0x12_3456u32));
        assert_eq!(CompactTarget::from_target(&decoded.target), CompactTarget(0x0312_3456));
    }

    #[test]
    fn test_negative_flag() {
        let decoded = decode(0x01fe_dcba);
        assert_eq!(decoded.target, U256::from(0x7eu32));
        assert!(decoded.negative);
        assert_eq!(CompactTarget::encode(&decoded.target, true), CompactTarget(0x01fe_0000));

        let decoded = decode(0x0492_3456);
        assert_eq!(decoded.target, U256::from(0x1234_5600u32));
        assert!(decoded.negative);
        assert!(decoded.valid_target().is_none());
        assert_eq!(CompactTarget::encode(&decoded.target, true), CompactTarget(0x0492_3456));
    }

    #[test]
    fn test_sign_bit_moves_into_exponent() {
        let decoded = decode(0x0500_9234);
        assert_eq!(decoded.target, U256::from(0x9234_0000u32));
        assert_eq!(CompactTarget::from_target(&decoded.target), CompactTarget(0x0500_9234));
    }

    #[test]
    fn test_large_size() {
        let decoded = decode(0x2012_3456);
        assert_eq!(decoded.target, U256::from(0x12_3456u32) << 232u32);
        assert!(!decoded.overflow);
        assert_eq!(CompactTarget::from_target(&decoded.target), CompactTarget(0x2012_3456));
    }

    #[test]
    fn test_bitcoin_genesis_target() {
        let decoded = decode(0x1d00_ffff);
        assert_eq!(decoded.target, U256::from(0xffffu32) << 208u32);
        assert_eq!(CompactTarget::from_target(&decoded.target), CompactTarget(0x1d00_ffff));
    }

    #[test]
    fn test_overflow_boundaries() {
        assert!(decode(0xff12_3456).overflow);
        assert!(decode(0x2201_0000).overflow);
        assert!(decode(0x2101_0000).overflow);
        assert!(!decode(0x2100_ffff).overflow);
        assert_eq!(decode(0x2100_ffff).target, U256::from(0xffffu32) << 240u32);
        // A zero mantissa never overflows, whatever the size.
        assert!(!decode(0xff00_0000).overflow);
    }

    #[test]
    fn test_encode_truncates_low_bytes() {
        let target = (U256::from(0x12_3456u32) << 32u32) + U256::from(0xdead_beefu32);
        let bits = CompactTarget::from_target(&target);
        assert_eq!(bits, CompactTarget(0x0712_3456));
        assert_eq!(bits.decode().target, U256::from(0x12_3456u32) << 32u32);
    }

    #[test]
    fn test_mul_scalar_wraps_instead_of_panicking() {
        let product = mul_scalar(U256::MAX, 2);
        assert_eq!(product, U256::MAX - U256::one());
        // Negative factors are reduced to a 32-bit word.
        assert_eq!(mul_scalar(U256::one(), -1), U256::from(u32::MAX));
    }

    #[test]
    fn test_div_scalar_rejects_zero() {
        assert!(div_scalar(U256::one(), 0).is_err());
        assert_eq!(div_scalar(U256::from(10u32), 3).unwrap(), U256::from(3u32));
    }

    #[test]
    fn test_display() {
        assert_eq!(CompactTarget(0x1c08_b5b1).to_string(), "0x1c08b5b1");
        assert_eq!(format!("{:x}", CompactTarget(0x1c08_b5b1)), "1c08b5b1");
    }
}
