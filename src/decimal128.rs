//! IEEE 754-2008 128-bit decimal floating point, binary integer decimal
//! encoding.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, ErrorCode};

const EXPONENT_BIAS: i32 = 6176;
const EXPONENT_MAX: i32 = 6111;
const EXPONENT_MIN: i32 = -6176;
const MAX_DIGITS: usize = 34;

const SIGN: u64 = 1 << 63;
const INFINITY: u64 = 0x7800_0000_0000_0000;
const NAN: u64 = 0x7C00_0000_0000_0000;

// 10^34 - 1
const MAX_SIGNIFICAND: u128 = 9_999_999_999_999_999_999_999_999_999_999;

/// A Decimal128 value kept in its raw wire representation.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Decimal128 {
    high: u64,
    low: u64,
}

impl Decimal128 {
    pub const fn from_parts(high: u64, low: u64) -> Self {
        Decimal128 { high, low }
    }

    pub fn high(&self) -> u64 {
        self.high
    }

    pub fn low(&self) -> u64 {
        self.low
    }

    /// Little endian wire bytes: low word first.
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut b = [0u8; 16];
        b[..8].copy_from_slice(&self.low.to_le_bytes());
        b[8..].copy_from_slice(&self.high.to_le_bytes());
        b
    }

    pub fn from_bytes(b: [u8; 16]) -> Self {
        let mut low = [0u8; 8];
        let mut high = [0u8; 8];
        low.copy_from_slice(&b[..8]);
        high.copy_from_slice(&b[8..]);
        Decimal128 {
            high: u64::from_le_bytes(high),
            low: u64::from_le_bytes(low),
        }
    }

    fn is_negative(&self) -> bool {
        self.high & SIGN != 0
    }
}

impl fmt::Display for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let combination = (self.high >> 58) & 0x1F;

        if combination == 0x1F {
            return f.write_str("NaN");
        }
        if self.is_negative() {
            f.write_str("-")?;
        }
        if combination == 0x1E {
            return f.write_str("Infinity");
        }

        let (biased, significand) = if combination >> 3 == 0b11 {
            // Non-canonical significand, always zero.
            (((self.high >> 47) & 0x3FFF) as i32, 0u128)
        } else {
            let high = (self.high & 0x0001_FFFF_FFFF_FFFF) as u128;
            let s = (high << 64) | self.low as u128;
            let s = if s > MAX_SIGNIFICAND { 0 } else { s };
            (((self.high >> 49) & 0x3FFF) as i32, s)
        };
        let exponent = biased - EXPONENT_BIAS;

        let digits = significand.to_string();
        let count = digits.len() as i32;
        let scientific = count - 1 + exponent;

        if scientific < -6 || exponent > 0 {
            f.write_str(&digits[..1])?;
            if count > 1 {
                write!(f, ".{}", &digits[1..])?;
            }
            write!(f, "E{}{}", if scientific < 0 { '-' } else { '+' }, scientific.abs())
        } else if exponent == 0 {
            f.write_str(&digits)
        } else {
            let radix = count + exponent;
            if radix > 0 {
                let (int, frac) = digits.split_at(radix as usize);
                write!(f, "{}.{}", int, frac)
            } else {
                f.write_str("0.")?;
                for _ in 0..-radix {
                    f.write_str("0")?;
                }
                f.write_str(&digits)
            }
        }
    }
}

impl fmt::Debug for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Decimal128({})", self)
    }
}

impl FromStr for Decimal128 {
    type Err = Error;

    /// Parses a decimal string. Values that cannot be represented exactly
    /// are rejected rather than rounded.
    fn from_str(s: &str) -> Result<Self, Error> {
        let invalid = || Error::from(ErrorCode::InvalidDecimal128);

        let (negative, body) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let sign = if negative { SIGN } else { 0 };

        if body.eq_ignore_ascii_case("infinity") || body.eq_ignore_ascii_case("inf") {
            return Ok(Decimal128::from_parts(sign | INFINITY, 0));
        }
        if body.eq_ignore_ascii_case("nan") {
            return Ok(Decimal128::from_parts(NAN, 0));
        }

        let (mantissa, exp) = match body.find(|c: char| c == 'e' || c == 'E') {
            Some(i) => (&body[..i], Some(&body[i + 1..])),
            None => (body, None),
        };

        let mut exponent: i64 = match exp {
            Some(e) => {
                let digits = e.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(e);
                if digits.is_empty() || digits.len() > 9 || !digits.bytes().all(|c| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                e.parse().map_err(|_| invalid())?
            }
            None => 0,
        };

        let mut digits = Vec::with_capacity(mantissa.len());
        let mut seen_dot = false;
        for c in mantissa.bytes() {
            match c {
                b'0'..=b'9' => {
                    digits.push(c);
                    if seen_dot {
                        exponent -= 1;
                    }
                }
                b'.' if !seen_dot => seen_dot = true,
                _ => return Err(invalid()),
            }
        }
        if digits.is_empty() {
            return Err(invalid());
        }

        let first = digits.iter().position(|&c| c != b'0').unwrap_or(digits.len() - 1);
        digits.drain(..first);

        if digits == b"0" {
            let exponent = exponent.max(EXPONENT_MIN as i64).min(EXPONENT_MAX as i64) as i32;
            return Ok(encode(sign, exponent, 0));
        }

        while digits.len() > MAX_DIGITS || exponent < EXPONENT_MIN as i64 {
            match digits.last() {
                Some(b'0') if digits.len() > 1 => {
                    digits.pop();
                    exponent += 1;
                }
                _ => return Err(invalid()),
            }
        }
        while exponent > EXPONENT_MAX as i64 && digits.len() < MAX_DIGITS {
            digits.push(b'0');
            exponent -= 1;
        }
        if exponent > EXPONENT_MAX as i64 {
            return Err(invalid());
        }

        let significand = digits
            .iter()
            .fold(0u128, |acc, &c| acc * 10 + (c - b'0') as u128);

        Ok(encode(sign, exponent as i32, significand))
    }
}

fn encode(sign: u64, exponent: i32, significand: u128) -> Decimal128 {
    let biased = (exponent + EXPONENT_BIAS) as u64;
    let high = sign | (biased << 49) | ((significand >> 64) as u64 & 0x0001_FFFF_FFFF_FFFF);
    Decimal128::from_parts(high, significand as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal128 {
        s.parse().unwrap()
    }

    #[test]
    fn parse_known_encodings() {
        assert_eq!(d("1"), Decimal128::from_parts(0x3040_0000_0000_0000, 1));
        assert_eq!(d("0"), Decimal128::from_parts(0x3040_0000_0000_0000, 0));
        assert_eq!(d("-1.5"), Decimal128::from_parts(0xB03E_0000_0000_0000, 15));
        assert_eq!(d("Infinity"), Decimal128::from_parts(INFINITY, 0));
        assert_eq!(d("-Infinity"), Decimal128::from_parts(SIGN | INFINITY, 0));
        assert_eq!(d("NaN"), Decimal128::from_parts(NAN, 0));
    }

    #[test]
    fn format_canonical_strings() {
        let cases = [
            ("1", "1"),
            ("-1.5", "-1.5"),
            ("0.001", "0.001"),
            ("1E+3", "1E+3"),
            ("1000", "1000"),
            ("1E-7", "1E-7"),
            ("12.345E-10", "1.2345E-9"),
            ("-0", "-0"),
            ("0.00", "0.00"),
            ("-Infinity", "-Infinity"),
            ("-NaN", "NaN"),
        ];
        for (input, expected) in cases.iter() {
            assert_eq!(d(input).to_string(), *expected, "{}", input);
        }
    }

    #[test]
    fn wire_bytes() {
        let v = d("1");
        let b = v.to_bytes();
        assert_eq!(b[0], 1);
        assert_eq!(b[15], 0x30);
        assert_eq!(b[14], 0x40);
        assert_eq!(Decimal128::from_bytes(b), v);
    }

    #[test]
    fn rejects_inexact_or_malformed() {
        assert!("".parse::<Decimal128>().is_err());
        assert!("1.2.3".parse::<Decimal128>().is_err());
        assert!("1e".parse::<Decimal128>().is_err());
        assert!("abc".parse::<Decimal128>().is_err());
        assert!("1234567890123456789012345678901234567".parse::<Decimal128>().is_err());
        assert!("1E+7000".parse::<Decimal128>().is_err());
        // Trailing zeros are dropped to fit.
        assert!("12345678901234567890123456789012340000".parse::<Decimal128>().is_ok());
    }
}
