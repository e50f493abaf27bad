//! Kubernetes resource quantities such as `500m`, `1.5Gi` or `2e3`.

use std::cmp::Ordering;
use std::fmt;

/// An exact decimal quantity, `mantissa * 10^exponent`.
///
/// Values are normalized on construction (no trailing zeros in the
/// mantissa, zero has exponent 0), so derived equality is value equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantity {
    mantissa: i128,
    exponent: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    #[error("quantities must match the regular expression '^([+-]?[0-9.]+)([eEinumkKMGTP]*[-+]?[0-9]*)$'")]
    Format,

    #[error("quantity is too large")]
    OutOfRange,
}

const BINARY_SUFFIXES: &[(&str, u32)] = &[
    ("Ki", 10),
    ("Mi", 20),
    ("Gi", 30),
    ("Ti", 40),
    ("Pi", 50),
    ("Ei", 60),
];

const DECIMAL_SUFFIXES: &[(&str, i32)] = &[
    ("n", -9),
    ("u", -6),
    ("m", -3),
    ("", 0),
    ("k", 3),
    ("M", 6),
    ("G", 9),
    ("T", 12),
    ("P", 15),
    ("E", 18),
];

fn pow10(exponent: u32) -> Option<i128> {
    10i128.checked_pow(exponent)
}

impl Quantity {
    fn new(mantissa: i128, exponent: i32) -> Self {
        if mantissa == 0 {
            return Self {
                mantissa: 0,
                exponent: 0,
            };
        }
        let (mut mantissa, mut exponent) = (mantissa, exponent);
        while mantissa % 10 == 0 {
            mantissa /= 10;
            exponent += 1;
        }
        Self { mantissa, exponent }
    }

    pub fn from_int(value: i64) -> Self {
        Self::new(value as i128, 0)
    }

    /// Parse the Kubernetes quantity syntax.
    pub fn parse(text: &str) -> Result<Self, QuantityError> {
        let (negative, rest) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };

        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, suffix) = rest.split_at(number_end);

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return Err(QuantityError::Format);
        }

        let mut mantissa: i128 = 0;
        for digit in whole.bytes().chain(fraction.bytes()) {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add((digit - b'0') as i128))
                .ok_or(QuantityError::OutOfRange)?;
        }
        let mut exponent = -(fraction.len() as i32);

        if let Some(&(_, bits)) = BINARY_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
            mantissa = mantissa
                .checked_mul(1i128 << bits)
                .ok_or(QuantityError::OutOfRange)?;
        } else if let Some(&(_, shift)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
            exponent += shift;
        } else if let Some(power) = suffix.strip_prefix(['e', 'E']) {
            let power: i32 = power.parse().map_err(|_| QuantityError::Format)?;
            if !(-64..=64).contains(&power) {
                return Err(QuantityError::OutOfRange);
            }
            exponent += power;
        } else {
            return Err(QuantityError::Format);
        }

        Ok(Self::new(if negative { -mantissa } else { mantissa }, exponent))
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    pub fn sign(&self) -> i64 {
        self.mantissa.signum() as i64
    }

    /// The value as an `i64` when that is lossless.
    pub fn as_integer(&self) -> Option<i64> {
        if self.exponent < 0 {
            return None;
        }
        let scale = pow10(self.exponent as u32)?;
        self.mantissa
            .checked_mul(scale)
            .and_then(|value| i64::try_from(value).ok())
    }

    pub fn as_approximate_float(&self) -> f64 {
        if self.exponent < 0 {
            self.mantissa as f64 / 10f64.powi(-self.exponent)
        } else {
            self.mantissa as f64 * 10f64.powi(self.exponent)
        }
    }

    /// Both operands scaled to the smaller exponent, or `None` on overflow.
    fn aligned(&self, other: &Self) -> Option<(i128, i128, i32)> {
        let exponent = self.exponent.min(other.exponent);
        let scale = |q: &Self| {
            pow10((q.exponent - exponent) as u32).and_then(|factor| q.mantissa.checked_mul(factor))
        };
        Some((scale(self)?, scale(other)?, exponent))
    }

    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        let (a, b, exponent) = self.aligned(other)?;
        a.checked_add(b).map(|sum| Self::new(sum, exponent))
    }

    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        let (a, b, exponent) = self.aligned(other)?;
        a.checked_sub(b).map(|difference| Self::new(difference, exponent))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_sign = self.sign().cmp(&other.sign());
        if by_sign != Ordering::Equal || self.mantissa == 0 {
            return by_sign;
        }
        match self.aligned(other) {
            Some((a, b, _)) => a.cmp(&b),
            // Only the operand with the larger exponent can overflow, and it
            // is then the one with the larger magnitude.
            None => {
                let larger = if self.exponent > other.exponent {
                    Ordering::Greater
                } else {
                    Ordering::Less
                };
                if self.mantissa > 0 { larger } else { larger.reverse() }
            }
        }
    }
}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exponent >= 0 {
            write!(f, "{}", self.mantissa)?;
            if self.exponent > 0 {
                write!(f, "e{}", self.exponent)?;
            }
            return Ok(());
        }
        let digits = self.mantissa.unsigned_abs().to_string();
        let places = self.exponent.unsigned_abs() as usize;
        let sign = if self.mantissa < 0 { "-" } else { "" };
        if digits.len() > places {
            let (whole, fraction) = digits.split_at(digits.len() - places);
            write!(f, "{}{}.{}", sign, whole, fraction)
        } else {
            write!(f, "{}0.{}{}", sign, "0".repeat(places - digits.len()), digits)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(text: &str) -> Quantity {
        Quantity::parse(text).unwrap()
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(q("1Ki").as_integer(), Some(1024));
        assert_eq!(q("1.5Gi").as_integer(), Some(1_610_612_736));
        assert_eq!(q("2k").as_integer(), Some(2000));
        assert_eq!(q("500m").as_integer(), None);
        assert_eq!(q("500m").as_approximate_float(), 0.5);
        assert_eq!(q("1e3"), q("1k"));
        assert_eq!(q("1E-3"), q("1m"));
        assert_eq!(q("-2M").sign(), -1);
        assert_eq!(q("+.5").to_string(), "0.5");
    }

    #[test]
    fn test_equal_values_compare_equal() {
        assert_eq!(q("1000m"), q("1"));
        assert_eq!(q("0.000"), q("0"));
        assert_eq!(q("1024"), q("1Ki"));
    }

    #[test]
    fn test_ordering() {
        assert!(q("100m") < q("1"));
        assert!(q("1Gi") > q("1G"));
        assert!(q("-1") < q("1n"));
        assert!(q("-1Ei") < q("-1E"));
        assert!(q("1e60") > q("99999999999999999999"));
        assert!(q("-1e60") < q("1"));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(q("1Gi").checked_add(&q("512Mi")), Some(q("1.5Gi")));
        assert_eq!(q("1").checked_sub(&q("250m")), Some(q("750m")));
        assert_eq!(q("1").checked_add(&Quantity::from_int(-1)), Some(q("0")));
    }

    #[test]
    fn test_rejects_bad_syntax() {
        for text in ["", "abc", "1.2.3", "1Kb", "Gi", ".", "1e", "1ex"] {
            assert_eq!(Quantity::parse(text), Err(QuantityError::Format), "{:?}", text);
        }
        assert_eq!(Quantity::parse("1e999"), Err(QuantityError::OutOfRange));
    }
}
