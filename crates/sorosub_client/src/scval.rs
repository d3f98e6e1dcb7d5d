use std::str::FromStr;

use stellar_xdr::curr::{ScAddress, ScSymbol, ScVal};

use crate::error::{ClientError, Result};

// ============================================
// ARGUMENT ENCODING
// ============================================

/// Parse a `G...` account or `C...` contract strkey
///
/// # Errors
/// - `InvalidAddress`: not a valid strkey
pub fn parse_address(address: &str) -> Result<ScAddress> {
    ScAddress::from_str(address.trim()).map_err(|_| ClientError::InvalidAddress(address.to_string()))
}

pub fn address_arg(address: &str) -> Result<ScVal> {
    parse_address(address).map(ScVal::Address)
}

pub fn i128_arg(value: i128) -> ScVal {
    ScVal::from(value)
}

pub fn u64_arg(value: u64) -> ScVal {
    ScVal::U64(value)
}

pub fn u32_arg(value: u32) -> ScVal {
    ScVal::U32(value)
}

pub fn symbol(name: &str) -> Result<ScSymbol> {
    ScSymbol::try_from(name).map_err(|_| ClientError::Decode(format!("invalid symbol {name:?}")))
}

// ============================================
// RETURN VALUE DECODING
// ============================================

/// Decoding of a contract return value
pub trait FromScVal: Sized {
    fn from_scval(value: &ScVal) -> Result<Self>;
}

impl FromScVal for bool {
    fn from_scval(value: &ScVal) -> Result<Self> {
        match value {
            ScVal::Bool(b) => Ok(*b),
            other => Err(unexpected("bool", other)),
        }
    }
}

impl FromScVal for u32 {
    fn from_scval(value: &ScVal) -> Result<Self> {
        match value {
            ScVal::U32(v) => Ok(*v),
            other => Err(unexpected("u32", other)),
        }
    }
}

impl FromScVal for u64 {
    fn from_scval(value: &ScVal) -> Result<Self> {
        match value {
            ScVal::U64(v) => Ok(*v),
            other => Err(unexpected("u64", other)),
        }
    }
}

/// Full two-word read; the high word is never discarded
impl FromScVal for i128 {
    fn from_scval(value: &ScVal) -> Result<Self> {
        match value {
            ScVal::I128(parts) => Ok(i128::from(parts)),
            other => Err(unexpected("i128", other)),
        }
    }
}

/// Address as its strkey
impl FromScVal for String {
    fn from_scval(value: &ScVal) -> Result<Self> {
        match value {
            ScVal::Address(address) => Ok(address.to_string()),
            other => Err(unexpected("address", other)),
        }
    }
}

/// `Void` is `None`; anything else decodes as `T`
impl<T: FromScVal> FromScVal for Option<T> {
    fn from_scval(value: &ScVal) -> Result<Self> {
        match value {
            ScVal::Void => Ok(None),
            other => T::from_scval(other).map(Some),
        }
    }
}

impl FromScVal for () {
    fn from_scval(value: &ScVal) -> Result<Self> {
        match value {
            ScVal::Void => Ok(()),
            other => Err(unexpected("void", other)),
        }
    }
}

/// Symbol-keyed entries of a map value, in wire order
///
/// Entries whose key is not a symbol are skipped.
pub fn map_entries(value: &ScVal) -> Result<Vec<(String, &ScVal)>> {
    let ScVal::Map(Some(map)) = value else {
        return Err(unexpected("map", value));
    };
    Ok(map
        .iter()
        .filter_map(|entry| match &entry.key {
            ScVal::Symbol(sym) => Some((sym.0.to_utf8_string_lossy(), &entry.val)),
            _ => None,
        })
        .collect())
}

pub fn required<T>(field: Option<T>, name: &str, record: &str) -> Result<T> {
    field.ok_or_else(|| ClientError::Decode(format!("{record} is missing `{name}`")))
}

fn unexpected(expected: &str, found: &ScVal) -> ClientError {
    ClientError::Decode(format!("expected {expected}, found {}", kind(found)))
}

fn kind(value: &ScVal) -> &'static str {
    match value {
        ScVal::Bool(_) => "bool",
        ScVal::Void => "void",
        ScVal::Error(_) => "error",
        ScVal::U32(_) => "u32",
        ScVal::I32(_) => "i32",
        ScVal::U64(_) => "u64",
        ScVal::I64(_) => "i64",
        ScVal::Timepoint(_) => "timepoint",
        ScVal::Duration(_) => "duration",
        ScVal::U128(_) => "u128",
        ScVal::I128(_) => "i128",
        ScVal::U256(_) => "u256",
        ScVal::I256(_) => "i256",
        ScVal::Bytes(_) => "bytes",
        ScVal::String(_) => "string",
        ScVal::Symbol(_) => "symbol",
        ScVal::Vec(_) => "vec",
        ScVal::Map(_) => "map",
        ScVal::Address(_) => "address",
        _ => "ledger value",
    }
}
