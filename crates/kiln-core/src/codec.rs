//! Constructor argument encoding
//!
//! Turns an ordered list of declared types and loosely typed values (JSON, as
//! they arrive from the command line or a config file) into the canonical ABI
//! payload appended to creation bytecode and sent to the explorer.

use std::str::FromStr;

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{Address, B256, I256, U256};
use serde_json::Value;

use crate::abi::ConstructorInfo;
use crate::error::{Error, Result};

/// One typed constructor argument
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorArg {
    pub ty: DynSolType,
    pub value: DynSolValue,
}

/// Ordered constructor arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstructorArgs(Vec<ConstructorArg>);

impl ConstructorArgs {
    /// Build from declared `(type, value)` pairs
    pub fn parse<S: AsRef<str>>(pairs: &[(S, Value)]) -> Result<Self> {
        let mut args = Vec::with_capacity(pairs.len());
        for (i, (ty, value)) in pairs.iter().enumerate() {
            let ty: DynSolType = ty
                .as_ref()
                .parse()
                .map_err(|e| Error::arg(i, format!("unknown type '{}': {}", ty.as_ref(), e)))?;
            let value = coerce(&ty, value).map_err(|e| Error::arg(i, e))?;
            args.push(ConstructorArg { ty, value });
        }
        Ok(Self(args))
    }

    /// Build from values, taking the declared types from a constructor signature
    pub fn for_constructor(constructor: Option<&ConstructorInfo>, values: &[Value]) -> Result<Self> {
        let inputs = constructor.map(|c| c.inputs.as_slice()).unwrap_or_default();
        if inputs.len() != values.len() {
            return Err(Error::ArgEncoding(format!(
                "expected {} constructor argument(s), got {}",
                inputs.len(),
                values.len()
            )));
        }

        let pairs: Vec<(&str, Value)> = inputs
            .iter()
            .zip(values)
            .map(|(input, value)| (input.param_type.as_str(), value.clone()))
            .collect();
        Self::parse(&pairs)
    }

    /// Check that order and types match the constructor exactly
    pub fn check_signature(&self, constructor: Option<&ConstructorInfo>) -> Result<()> {
        let inputs = constructor.map(|c| c.inputs.as_slice()).unwrap_or_default();
        if inputs.len() != self.0.len() {
            return Err(Error::ArgEncoding(format!(
                "expected {} constructor argument(s), got {}",
                inputs.len(),
                self.0.len()
            )));
        }

        for (i, (input, arg)) in inputs.iter().zip(&self.0).enumerate() {
            let declared: DynSolType = input
                .param_type
                .parse()
                .map_err(|e| Error::arg(i, format!("unsupported constructor type: {}", e)))?;
            if declared != arg.ty {
                return Err(Error::arg(
                    i,
                    format!(
                        "type mismatch for '{}': constructor declares {}, got {}",
                        input.name, input.param_type, arg.ty
                    ),
                ));
            }
        }

        Ok(())
    }

    /// ABI-encode as a parameter tuple
    pub fn encode(&self) -> Vec<u8> {
        let values = self.0.iter().map(|a| a.value.clone()).collect();
        DynSolValue::Tuple(values).abi_encode_params()
    }

    /// Hex payload without `0x`, as the explorer expects it
    pub fn encode_hex(&self) -> String {
        hex::encode(self.encode())
    }

    pub fn types(&self) -> Vec<String> {
        self.0.iter().map(|a| a.ty.to_string()).collect()
    }

    pub fn args(&self) -> &[ConstructorArg] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// Value coercion
// =============================================================================

/// Coerce a JSON value into a value of the given Solidity type
pub fn coerce(ty: &DynSolType, value: &Value) -> std::result::Result<DynSolValue, String> {
    match ty {
        DynSolType::Address => {
            let s = expect_str(value, "address")?;
            Ok(DynSolValue::Address(parse_address(s)?))
        }
        DynSolType::Bool => match value {
            Value::Bool(b) => Ok(DynSolValue::Bool(*b)),
            Value::String(s) if s == "true" => Ok(DynSolValue::Bool(true)),
            Value::String(s) if s == "false" => Ok(DynSolValue::Bool(false)),
            _ => Err("expected boolean".to_string()),
        },
        DynSolType::Uint(bits) => {
            let n = parse_uint(value)?;
            if n.bit_len() > *bits {
                return Err(format!("value {} does not fit in uint{}", n, bits));
            }
            Ok(DynSolValue::Uint(n, *bits))
        }
        DynSolType::Int(bits) => {
            let n = parse_int(value)?;
            let shift = 256 - *bits;
            if n < I256::MIN.asr(shift) || n > I256::MAX.asr(shift) {
                return Err(format!("value {} does not fit in int{}", n, bits));
            }
            Ok(DynSolValue::Int(n, *bits))
        }
        DynSolType::String => Ok(DynSolValue::String(expect_str(value, "string")?.to_string())),
        DynSolType::Bytes => {
            let bytes = parse_hex(expect_str(value, "bytes")?)?;
            Ok(DynSolValue::Bytes(bytes))
        }
        DynSolType::FixedBytes(size) => {
            let bytes = parse_hex(expect_str(value, "fixed bytes")?)?;
            if bytes.len() != *size {
                return Err(format!("expected {} bytes, got {}", size, bytes.len()));
            }
            let mut word = B256::ZERO;
            word[..*size].copy_from_slice(&bytes);
            Ok(DynSolValue::FixedBytes(word, *size))
        }
        DynSolType::Array(inner) => {
            let items = expect_array(value)?;
            let values = items
                .iter()
                .map(|v| coerce(inner, v))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(DynSolValue::Array(values))
        }
        DynSolType::FixedArray(inner, len) => {
            let items = expect_array(value)?;
            if items.len() != *len {
                return Err(format!("expected {} elements, got {}", len, items.len()));
            }
            let values = items
                .iter()
                .map(|v| coerce(inner, v))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(DynSolValue::FixedArray(values))
        }
        DynSolType::Tuple(types) => {
            let items = expect_array(value)?;
            if items.len() != types.len() {
                return Err(format!(
                    "expected tuple of {} elements, got {}",
                    types.len(),
                    items.len()
                ));
            }
            let values = types
                .iter()
                .zip(items.iter())
                .map(|(t, v)| coerce(t, v))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(DynSolValue::Tuple(values))
        }
        other => Err(format!("unsupported type: {}", other)),
    }
}

fn expect_str<'a>(value: &'a Value, what: &str) -> std::result::Result<&'a str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected string for {}", what))
}

/// Arrays may arrive as JSON or as JSON text from the command line
fn expect_array(value: &Value) -> std::result::Result<Vec<Value>, String> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => Ok(items),
            _ => Err(format!("expected JSON array, got '{}'", s)),
        },
        _ => Err("expected array".to_string()),
    }
}

/// Parse an address, requiring exactly 20 bytes of hex
pub fn parse_address(s: &str) -> std::result::Result<Address, String> {
    let clean = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(clean).map_err(|e| format!("invalid address '{}': {}", s, e))?;
    if bytes.len() != 20 {
        return Err(format!(
            "invalid address '{}': expected 20 bytes, got {}",
            s,
            bytes.len()
        ));
    }
    Ok(Address::from_slice(&bytes))
}

fn parse_hex(s: &str) -> std::result::Result<Vec<u8>, String> {
    let clean = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(clean).map_err(|e| format!("invalid hex '{}': {}", s, e))
}

/// Parse an unsigned integer from a JSON number or a decimal/hex string
pub fn parse_uint(value: &Value) -> std::result::Result<U256, String> {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Ok(U256::from(u))
            } else if n.as_i64().is_some() {
                Err("negative value for unsigned type".to_string())
            } else {
                Err("number must be an integer".to_string())
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if s.starts_with('-') {
                return Err("negative value for unsigned type".to_string());
            }
            U256::from_str(s).map_err(|e| format!("invalid uint '{}': {}", s, e))
        }
        _ => Err("expected number or string for uint".to_string()),
    }
}

/// Parse a signed integer from a JSON number or a decimal string
pub fn parse_int(value: &Value) -> std::result::Result<I256, String> {
    match value {
        Value::Number(n) => {
            let i = n.as_i64().ok_or("number out of range")?;
            I256::try_from(i).map_err(|e| format!("invalid int: {}", e))
        }
        Value::String(s) => I256::from_str(s.trim()).map_err(|e| format!("invalid int '{}': {}", s, e)),
        _ => Err("expected number or string for int".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::Abi;
    use serde_json::json;

    const USDC: &str = "0x94a9D9AC8a22534E3FaCa9F4e7F2E2cf85d5E4C8";
    const POOL: &str = "0x6Ae43d3271ff6888e7Fc43Fd7321a503ff738951";
    const FUND: &str = "0x9c6bd82629e7039f1308a56508636e3e425576bf";

    fn decode(args: &ConstructorArgs) -> DynSolValue {
        let types = args.args().iter().map(|a| a.ty.clone()).collect();
        DynSolType::Tuple(types)
            .abi_decode_params(&args.encode())
            .unwrap()
    }

    fn padded(addr: &str) -> String {
        format!("{:0>64}", addr.trim_start_matches("0x").to_lowercase())
    }

    #[test]
    fn test_three_addresses_layout() {
        let args = ConstructorArgs::parse(&[
            ("address", json!(USDC)),
            ("address", json!(POOL)),
            ("address", json!(FUND)),
        ])
        .unwrap();

        let expected = format!("{}{}{}", padded(USDC), padded(POOL), padded(FUND));
        assert_eq!(args.encode_hex(), expected);
        assert!(!args.encode_hex().starts_with("0x"));
    }

    #[test]
    fn test_round_trip_static_and_dynamic() {
        let args = ConstructorArgs::parse(&[
            ("address", json!(USDC)),
            ("uint256", json!("1000000")),
            ("int64", json!(-42)),
            ("bool", json!(true)),
            ("string", json!("Education Vault")),
            ("bytes", json!("0xdeadbeef")),
            ("bytes4", json!("0x01020304")),
            ("uint8[]", json!([1, 2, 3])),
            ("address[2]", json!([POOL, FUND])),
            ("(uint256,string)", json!(["7", "seven"])),
        ])
        .unwrap();

        let values: Vec<DynSolValue> = args.args().iter().map(|a| a.value.clone()).collect();
        assert_eq!(decode(&args), DynSolValue::Tuple(values));
    }

    #[test]
    fn test_string_uses_offset_length_data() {
        let args = ConstructorArgs::parse(&[("string", json!("abc"))]).unwrap();
        let encoded = args.encode();

        // head: offset 0x20, then length 3, then right-padded data
        assert_eq!(encoded.len(), 96);
        assert_eq!(U256::from_be_slice(&encoded[..32]), U256::from(32));
        assert_eq!(U256::from_be_slice(&encoded[32..64]), U256::from(3));
        assert_eq!(&encoded[64..67], b"abc");
    }

    #[test]
    fn test_order_sensitivity() {
        let a = ConstructorArgs::parse(&[("address", json!(USDC)), ("string", json!("fund"))])
            .unwrap();
        let b = ConstructorArgs::parse(&[("string", json!("fund")), ("address", json!(USDC))])
            .unwrap();
        assert_ne!(a.encode_hex(), b.encode_hex());

        let c = ConstructorArgs::parse(&[("address", json!(USDC)), ("uint256", json!(5))])
            .unwrap();
        let d = ConstructorArgs::parse(&[("uint256", json!(5)), ("address", json!(USDC))])
            .unwrap();
        assert_ne!(c.encode_hex(), d.encode_hex());
    }

    #[test]
    fn test_empty_args_encode_to_nothing() {
        let args = ConstructorArgs::default();
        assert!(args.encode().is_empty());
        assert_eq!(args.encode_hex(), "");
    }

    #[test]
    fn test_short_address_rejected() {
        let err = ConstructorArgs::parse(&[("address", json!("0x1234"))]).unwrap_err();
        assert_eq!(err.code(), "ARG_ENCODING_ERROR");
        assert!(err.to_string().contains("expected 20 bytes, got 2"));
    }

    #[test]
    fn test_long_address_rejected() {
        let long = format!("{}00", FUND);
        assert!(ConstructorArgs::parse(&[("address", json!(long))]).is_err());
    }

    #[test]
    fn test_negative_unsigned_rejected() {
        let err = ConstructorArgs::parse(&[("uint256", json!(-1))]).unwrap_err();
        assert!(err.to_string().contains("negative"));

        let err = ConstructorArgs::parse(&[("uint256", json!("-5"))]).unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn test_width_overflow_rejected() {
        assert!(ConstructorArgs::parse(&[("uint8", json!(255))]).is_ok());
        assert!(ConstructorArgs::parse(&[("uint8", json!(256))]).is_err());
        assert!(ConstructorArgs::parse(&[("int8", json!(-128))]).is_ok());
        assert!(ConstructorArgs::parse(&[("int8", json!(127))]).is_ok());
        assert!(ConstructorArgs::parse(&[("int8", json!(128))]).is_err());
        assert!(ConstructorArgs::parse(&[("int8", json!(-129))]).is_err());
    }

    #[test]
    fn test_fixed_bytes_length_checked() {
        assert!(ConstructorArgs::parse(&[("bytes4", json!("0x010203"))]).is_err());
    }

    #[test]
    fn test_fixed_array_length_checked() {
        assert!(ConstructorArgs::parse(&[("uint256[2]", json!([1]))]).is_err());
    }

    #[test]
    fn test_array_from_json_text() {
        let args = ConstructorArgs::parse(&[("uint256[]", json!("[1, 2]"))]).unwrap();
        assert_eq!(
            args.args()[0].value,
            DynSolValue::Array(vec![
                DynSolValue::Uint(U256::from(1), 256),
                DynSolValue::Uint(U256::from(2), 256),
            ])
        );
    }

    #[test]
    fn test_for_constructor_and_signature_check() {
        let abi = Abi::parse(
            r#"[{"type": "constructor", "inputs": [
                {"name": "token", "type": "address"},
                {"name": "cap", "type": "uint256"}
            ], "stateMutability": "nonpayable"}]"#,
        )
        .unwrap();
        let ctor = abi.constructor();

        let args = ConstructorArgs::for_constructor(ctor.as_ref(), &[json!(USDC), json!("10")])
            .unwrap();
        assert!(args.check_signature(ctor.as_ref()).is_ok());
        assert_eq!(args.types(), vec!["address", "uint256"]);

        let swapped =
            ConstructorArgs::parse(&[("uint256", json!("10")), ("address", json!(USDC))]).unwrap();
        let err = swapped.check_signature(ctor.as_ref()).unwrap_err();
        assert!(err.to_string().contains("type mismatch"));

        let err = ConstructorArgs::for_constructor(ctor.as_ref(), &[json!(USDC)]).unwrap_err();
        assert!(err.to_string().contains("expected 2 constructor argument(s), got 1"));
    }

    #[test]
    fn test_no_constructor_accepts_no_args() {
        let args = ConstructorArgs::for_constructor(None, &[]).unwrap();
        assert!(args.is_empty());
        assert!(ConstructorArgs::for_constructor(None, &[json!(1)]).is_err());
    }
}
