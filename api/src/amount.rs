use std::{fmt, iter::Sum, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::OriError;

/// A native-asset amount in its smallest unit (wei).
///
/// Amounts are never converted to floating point. Display goes through
/// [`Amount::format`], which works on the decimal digits directly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(pub u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn raw(self) -> u128 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    /// Format for display, shifting the decimal point by `decimals`.
    pub fn format(self, decimals: u32, opts: FormatOptions) -> String {
        let digits = self.0.to_string();
        let int_part = integer_part(self.0, decimals);

        if opts.compact && int_part >= 1_000 {
            return format_compact(&digits, decimals, int_part, &opts);
        }

        if at_least_thousandth(self.0, decimals) {
            let precision = opts.precision.unwrap_or(4);
            let mut fixed = to_fixed(&digits, decimals, precision);
            if opts.trim_trailing_zero {
                fixed = trim_zeros(fixed);
            }
            if opts.with_comma {
                fixed = with_thousands(&fixed);
            }
            return fixed;
        }

        format_tiny(&digits, decimals, opts.mode)
    }
}

/// How values below 0.001 show their leading fractional zeros.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatMode {
    /// `0.000001`
    Default,
    /// `0.0{5}1`
    ZeroCount,
    /// `0.0₅1`
    #[default]
    Subscript,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatOptions {
    /// Decimal places to keep; values are always rounded down.
    pub precision: Option<u32>,
    pub with_comma: bool,
    /// Abbreviate values of 1000 and above with K/M/B/T/Q.
    pub compact: bool,
    pub trim_trailing_zero: bool,
    pub mode: FormatMode,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            precision: None,
            with_comma: false,
            compact: true,
            trim_trailing_zero: true,
            mode: FormatMode::Subscript,
        }
    }
}

const UNITS: [(u128, u32, &str); 5] = [
    (1_000_000_000_000_000, 15, "Q"),
    (1_000_000_000_000, 12, "T"),
    (1_000_000_000, 9, "B"),
    (1_000_000, 6, "M"),
    (1_000, 3, "K"),
];

const MAX_COMPACT: u128 = 999 * 1_000_000_000_000_000;

fn format_compact(digits: &str, decimals: u32, int_part: u128, opts: &FormatOptions) -> String {
    let has_fraction = digits
        .len()
        .checked_sub(decimals as usize)
        .map(|split| digits[split..].bytes().any(|b| b != b'0'))
        .unwrap_or(true);
    if int_part > MAX_COMPACT || (int_part == MAX_COMPACT && has_fraction) {
        return "> 999Q".to_string();
    }

    let precision = opts.precision.unwrap_or(2);
    for (unit, shift, suffix) in UNITS {
        if int_part >= unit {
            let mut fixed = to_fixed(digits, decimals + shift, precision);
            if opts.trim_trailing_zero {
                fixed = trim_zeros(fixed);
            }
            return format!("{fixed}{suffix}");
        }
    }
    to_fixed(digits, decimals, precision)
}

fn format_tiny(digits: &str, decimals: u32, mode: FormatMode) -> String {
    let fixed = to_fixed(digits, decimals, decimals.max(18));
    let fraction = fixed.split_once('.').map(|(_, f)| f).unwrap_or("");
    let zero_count = fraction.bytes().take_while(|b| *b == b'0').count();
    let rest = &fraction[zero_count..];
    if rest.is_empty() {
        return "0".to_string();
    }

    let significant = rest[..rest.len().min(4)].trim_end_matches('0');
    if significant.is_empty() {
        return "0".to_string();
    }

    match mode {
        FormatMode::Subscript => format!("0.0{}{}", subscript(zero_count), significant),
        FormatMode::ZeroCount => format!("0.0{{{zero_count}}}{significant}"),
        FormatMode::Default => format!("0.{}{}", "0".repeat(zero_count), significant),
    }
}

fn integer_part(raw: u128, decimals: u32) -> u128 {
    match 10u128.checked_pow(decimals) {
        Some(scale) => raw / scale,
        None => 0,
    }
}

fn at_least_thousandth(raw: u128, decimals: u32) -> bool {
    if decimals < 3 {
        return raw > 0;
    }
    match 10u128.checked_pow(decimals - 3) {
        Some(threshold) => raw >= threshold,
        None => false,
    }
}

/// Shift `digits` right by `scale` places and keep `places` decimals,
/// rounding down.
fn to_fixed(digits: &str, scale: u32, places: u32) -> String {
    let scale = scale as usize;
    let padded = if digits.len() <= scale {
        format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
    } else {
        digits.to_string()
    };
    let (int, frac) = padded.split_at(padded.len() - scale);
    if places == 0 {
        return int.to_string();
    }

    let places = places as usize;
    let mut kept: String = frac.chars().take(places).collect();
    while kept.len() < places {
        kept.push('0');
    }
    format!("{int}.{kept}")
}

fn trim_zeros(fixed: String) -> String {
    if !fixed.contains('.') {
        return fixed;
    }
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn with_thousands(fixed: &str) -> String {
    let (int, frac) = match fixed.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (fixed, None),
    };
    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    match frac {
        Some(frac) => format!("{grouped}.{frac}"),
        None => grouped,
    }
}

fn subscript(n: usize) -> String {
    const DIGITS: [char; 10] = ['₀', '₁', '₂', '₃', '₄', '₅', '₆', '₇', '₈', '₉'];
    n.to_string()
        .bytes()
        .map(|b| DIGITS[(b - b'0') as usize])
        .collect()
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = OriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OriError::InvalidAmount(s.to_string()));
        }
        trimmed
            .parse::<u128>()
            .map(Amount)
            .map_err(|_| OriError::InvalidAmount(s.to_string()))
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount(value as u128)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Amount::saturating_add)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl de::Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an unsigned integer or a string of digits")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount(v as u128))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
                Ok(Amount(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_unit<E: de::Error>(self) -> Result<Amount, E> {
                Ok(Amount::ZERO)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}
