use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Sub},
    str::FromStr,
};

use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::op;

pub const INR_CURRENCY_CODE: &str = "INR";
pub const INR_CURRENCY_CODE_LOWER: &str = "inr";

//--------------------------------------       Paise        ----------------------------------------------------------
/// A monetary amount in paise (1/100 INR), the minor unit all price arithmetic is carried out in.
///
/// On the wire, protocol price values are decimal strings ("4.25"); `Paise` serializes to and from
/// that representation (a bare JSON number is also accepted on input, since some counterparties
/// emit one).
#[derive(Debug, Clone, Copy, Default, Ord, PartialOrd, PartialEq, Eq)]
pub struct Paise(i64);

op!(binary Paise, Add, add);
op!(binary Paise, Sub, sub);
op!(inplace Paise, AddAssign, add_assign);

impl Mul<i64> for Paise {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Paise {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in paise: {0}")]
pub struct PaiseConversionError(String);

impl From<i64> for Paise {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Paise {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_rupees(rupees: i64) -> Self {
        Self(rupees * 100)
    }

    /// Renders the amount as a plain decimal rupee string, e.g. `4.25` or `-0.05`.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Paise {
    type Err = PaiseConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (sign, digits) = match s.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, s),
        };
        let (rupees, frac) = match digits.split_once('.') {
            Some((r, f)) => (r, f),
            None => (digits, ""),
        };
        if frac.len() > 2 {
            return Err(PaiseConversionError(format!("{s} has more than 2 decimal places")));
        }
        let rupees = if rupees.is_empty() {
            0
        } else {
            rupees.parse::<i64>().map_err(|e| PaiseConversionError(format!("{s}: {e}")))?
        };
        let paise = if frac.is_empty() {
            0
        } else {
            // "5" means 50 paise, "05" means 5 paise
            format!("{frac:0<2}").parse::<i64>().map_err(|e| PaiseConversionError(format!("{s}: {e}")))?
        };
        rupees
            .checked_mul(100)
            .and_then(|r| r.checked_add(paise))
            .map(|total| Self(sign * total))
            .ok_or_else(|| PaiseConversionError(format!("{s} overflows the paise range")))
    }
}

impl Display for Paise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "₹{}", self.to_decimal_string())
    }
}

impl Serialize for Paise {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

impl<'de> Deserialize<'de> for Paise {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawPrice {
            Text(String),
            Number(f64),
        }
        match RawPrice::deserialize(deserializer)? {
            RawPrice::Text(s) => s.parse().map_err(DeError::custom),
            #[allow(clippy::cast_possible_truncation)]
            RawPrice::Number(n) => Ok(Self((n * 100.0).round() as i64)),
        }
    }
}
