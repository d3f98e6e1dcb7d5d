use std::str::FromStr;

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde_json::Value;
use stellar_xdr::curr::ScVal;
use tracing::warn;

use crate::error::{ClientError, Result};

pub const DECIMALS: u32 = 7;
pub const STROOPS_PER_UNIT: i64 = 10_000_000; // 7 decimals

/// Integer amount as it arrives from the network, before interpretation
///
/// Amounts reach the client as XDR `i128` parts, JSON numbers, numeric
/// strings, or `{hi, lo}` objects depending on the producer. Anything else
/// is kept as `Unrecognized` so the caller can log it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawAmount {
    Integer(i128),
    Text(String),
    /// Two-word 128-bit value: `(hi << 64) | lo`
    Parts { hi: i64, lo: u64 },
    Unrecognized(String),
}

impl RawAmount {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    RawAmount::Integer(v.into())
                } else if let Some(v) = n.as_u64() {
                    RawAmount::Integer(v.into())
                } else {
                    RawAmount::Text(n.to_string())
                }
            }
            Value::String(s) => RawAmount::Text(s.clone()),
            Value::Object(map) => match (map.get("hi"), map.get("lo")) {
                (Some(hi), Some(lo)) => match (json_word::<i64>(hi), json_word::<u64>(lo)) {
                    (Some(hi), Some(lo)) => RawAmount::Parts { hi, lo },
                    _ => RawAmount::Unrecognized(value.to_string()),
                },
                _ => RawAmount::Unrecognized(value.to_string()),
            },
            other => RawAmount::Unrecognized(other.to_string()),
        }
    }

    pub fn from_scval(value: &ScVal) -> Self {
        match value {
            ScVal::I128(parts) => RawAmount::Parts {
                hi: parts.hi,
                lo: parts.lo,
            },
            ScVal::U128(parts) => match i64::try_from(parts.hi) {
                Ok(hi) => RawAmount::Parts { hi, lo: parts.lo },
                Err(_) => RawAmount::Unrecognized(format!("{value:?}")),
            },
            ScVal::I64(v) => RawAmount::Integer((*v).into()),
            ScVal::U64(v) => RawAmount::Integer((*v).into()),
            ScVal::I32(v) => RawAmount::Integer((*v).into()),
            ScVal::U32(v) => RawAmount::Integer((*v).into()),
            ScVal::String(s) => RawAmount::Text(s.to_utf8_string_lossy()),
            other => RawAmount::Unrecognized(format!("{other:?}")),
        }
    }

    /// Integer value in the smallest unit, if the shape is understood
    pub fn to_i128(&self) -> Option<i128> {
        match self {
            RawAmount::Integer(v) => Some(*v),
            RawAmount::Text(s) => s.trim().parse::<i128>().ok(),
            RawAmount::Parts { hi, lo } => Some((i128::from(*hi) << 64) | i128::from(*lo)),
            RawAmount::Unrecognized(_) => None,
        }
    }
}

impl From<i128> for RawAmount {
    fn from(value: i128) -> Self {
        RawAmount::Integer(value)
    }
}

fn json_word<T: FromStr + TryFrom<i64> + TryFrom<u64>>(value: &Value) -> Option<T> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|v| <T as TryFrom<i64>>::try_from(v).ok())
            .or_else(|| {
                n.as_u64()
                    .and_then(|v| <T as TryFrom<u64>>::try_from(v).ok())
            }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Display units to smallest unit, truncating toward zero
///
/// Example: `1.23456789` becomes `12_345_678`
///
/// # Errors
/// - `InvalidAmount`: result does not fit
pub fn to_smallest_unit(amount: Decimal) -> Result<i128> {
    amount
        .checked_mul(Decimal::from(STROOPS_PER_UNIT))
        .and_then(|scaled| scaled.trunc().to_i128())
        .ok_or_else(|| ClientError::InvalidAmount(format!("{amount} overflows")))
}

/// Smallest unit to display units
///
/// Never fails: unparsable text, unknown shapes, and values outside the
/// `Decimal` range log a warning and yield zero.
pub fn from_smallest_unit(raw: &RawAmount) -> Decimal {
    let Some(value) = raw.to_i128() else {
        warn!(amount = ?raw, "unrecognized amount encoding, using zero");
        return Decimal::ZERO;
    };
    match Decimal::try_from_i128_with_scale(value, DECIMALS) {
        Ok(decimal) => decimal.normalize(),
        Err(e) => {
            warn!(amount = value, error = %e, "amount out of range, using zero");
            Decimal::ZERO
        }
    }
}

/// Parse user input such as `"12.50"`
///
/// # Errors
/// - `InvalidAmount`: not a number, negative, or more than 7 decimal places
pub fn parse_display_amount(input: &str) -> Result<Decimal> {
    let amount = Decimal::from_str_exact(input.trim())
        .map_err(|e| ClientError::InvalidAmount(format!("{input:?}: {e}")))?;
    if amount.is_sign_negative() {
        return Err(ClientError::InvalidAmount(format!("{input:?} is negative")));
    }
    if amount.normalize().scale() > DECIMALS {
        return Err(ClientError::InvalidAmount(format!(
            "{input:?} has more than {DECIMALS} decimal places"
        )));
    }
    Ok(amount)
}
