use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::error::ValueError;

/// Exact decimal value: an `i128` unscaled integer and a decimal scale.
///
/// `12.340` is stored as `(12340, 3)`. Comparison is numeric, so values with
/// different scales but equal magnitude (`1.5`, `1.50`) are equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct BigNumber {
    unscaled: i128,
    scale: u32,
}

impl BigNumber {
    /// Upper bound on the number of decimal places accepted when parsing
    pub const MAX_SCALE: u32 = 30;

    /// Create from an unscaled value and scale
    pub fn new(unscaled: i128, scale: u32) -> Self {
        Self { unscaled, scale }
    }

    pub fn from_i64(value: i64) -> Self {
        Self::new(value as i128, 0)
    }

    pub fn unscaled(&self) -> i128 {
        self.unscaled
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.unscaled == 0
    }

    /// Unscaled value expressed at a larger scale, `None` on overflow
    fn rescaled(&self, scale: u32) -> Option<i128> {
        let factor = 10i128.checked_pow(scale.checked_sub(self.scale)?)?;
        self.unscaled.checked_mul(factor)
    }

    /// Lossy conversion used only when exact rescaling overflows
    pub fn to_f64(&self) -> f64 {
        self.unscaled as f64 / 10f64.powi(self.scale as i32)
    }
}

impl FromStr for BigNumber {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ValueError::InvalidDecimal(s.to_string());

        let (is_negative, digits) = match s.strip_prefix('-') {
            Some(stripped) => (true, stripped),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (integer_part, decimal_part) = match digits.split_once('.') {
            Some((int, dec)) => (int, dec),
            None => (digits, ""),
        };

        if integer_part.is_empty() && decimal_part.is_empty() {
            return Err(invalid());
        }
        if !integer_part.bytes().all(|b| b.is_ascii_digit())
            || !decimal_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        if decimal_part.len() > Self::MAX_SCALE as usize {
            return Err(invalid());
        }

        let mut unscaled: i128 = 0;
        for b in integer_part.bytes().chain(decimal_part.bytes()) {
            unscaled = unscaled
                .checked_mul(10)
                .and_then(|v| v.checked_add((b - b'0') as i128))
                .ok_or(ValueError::Overflow)?;
        }

        let unscaled = if is_negative { -unscaled } else { unscaled };
        Ok(Self::new(unscaled, decimal_part.len() as u32))
    }
}

impl fmt::Display for BigNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.unscaled < 0 { "-" } else { "" };
        let abs = self.unscaled.unsigned_abs();
        if self.scale == 0 {
            return write!(f, "{}{}", sign, abs);
        }
        let factor = 10u128.pow(self.scale);
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            abs / factor,
            abs % factor,
            width = self.scale as usize
        )
    }
}

impl Ord for BigNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        match (self.rescaled(scale), other.rescaled(scale)) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self.to_f64().total_cmp(&other.to_f64()),
        }
    }
}

impl PartialOrd for BigNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for BigNumber {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BigNumber {}
