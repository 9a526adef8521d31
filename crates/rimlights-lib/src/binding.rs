//! Typed access to scalars in the telemetry buffer.
//!
//! A [`ValueBinding`] is resolved once from configuration and then read every
//! cycle. Reads go through a single bounds-checked function; the buffer is
//! shared with the simulator without locking, so a read may observe a value
//! mid-update. Decisions are recomputed every cycle, so that is tolerated.

use std::fmt;

use toml::Value;

use crate::error::Result;
use crate::settings::{self, Clause, config_error};

/// Scalar type of a telemetry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
}

impl ScalarType {
    /// Parse a configuration type name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "int32" => Some(ScalarType::Int32),
            "int64" => Some(ScalarType::Int64),
            "float32" => Some(ScalarType::Float32),
            "float64" => Some(ScalarType::Float64),
            "bool" => Some(ScalarType::Bool),
            _ => None,
        }
    }

    /// Width in bytes.
    pub fn width(self) -> usize {
        match self {
            ScalarType::Int32 | ScalarType::Float32 => 4,
            ScalarType::Int64 | ScalarType::Float64 => 8,
            ScalarType::Bool => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Float32 => "float32",
            ScalarType::Float64 => "float64",
            ScalarType::Bool => "bool",
        }
    }
}

/// Where a value comes from: a typed field at a byte offset, or a constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueBinding {
    Field { ty: ScalarType, offset: usize },
    Constant(f64),
}

/// One read of a [`ValueBinding`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Snapshot {
    /// The value widened to `f64`; `0.0`/`1.0` for booleans.
    pub value: f64,
    /// The raw flag, for `bool` fields only.
    pub flag: Option<bool>,
}

/// Fixed-size little helper: `N` bytes at `offset`, if in range.
fn bytes_at<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    buf.get(offset..offset.checked_add(N)?)?.try_into().ok()
}

/// Read a scalar of type `ty` at `offset` (native byte order).
///
/// Out-of-range reads yield a zero snapshot.
pub fn read_scalar(buf: &[u8], ty: ScalarType, offset: usize) -> Snapshot {
    let value = match ty {
        ScalarType::Int32 => bytes_at(buf, offset).map(|b| i32::from_ne_bytes(b) as f64),
        ScalarType::Int64 => bytes_at(buf, offset).map(|b| i64::from_ne_bytes(b) as f64),
        ScalarType::Float32 => bytes_at(buf, offset).map(|b| f32::from_ne_bytes(b) as f64),
        ScalarType::Float64 => bytes_at(buf, offset).map(f64::from_ne_bytes),
        ScalarType::Bool => {
            let flag = buf.get(offset).is_some_and(|&b| b != 0);
            return Snapshot {
                value: if flag { 1.0 } else { 0.0 },
                flag: Some(flag),
            };
        }
    };
    Snapshot {
        value: value.unwrap_or(0.0),
        flag: None,
    }
}

impl ValueBinding {
    /// Resolve the `value` descriptor governing `clause`: its own, or the
    /// nearest enclosing clause's. Also returns the descriptor table and its path.
    pub fn resolve<'a>(
        clause: &Clause<'a>,
        telemetry_len: usize,
    ) -> Result<(Self, &'a toml::Table, String)> {
        let (value, path) = clause.inherited("value").ok_or_else(|| {
            config_error(
                clause.path(),
                "no value clause here or in any enclosing group",
            )
        })?;
        let table = value
            .as_table()
            .ok_or_else(|| config_error(&path, "value must be a table with an offset"))?;
        let binding = Self::field_from_table(table, &path, ScalarType::Bool, telemetry_len)?;
        Ok((binding, table, path))
    }

    /// Build a field binding from `{ offset, type }`. A missing type means `default_ty`.
    pub fn field_from_table(
        table: &toml::Table,
        path: &str,
        default_ty: ScalarType,
        telemetry_len: usize,
    ) -> Result<Self> {
        let offset_path = format!("{path}.offset");
        let offset = table
            .get("offset")
            .ok_or_else(|| config_error(path, "missing offset"))
            .and_then(|v| settings::integer(v, &offset_path))?;
        let offset = usize::try_from(offset)
            .map_err(|_| config_error(&offset_path, "offset must not be negative"))?;

        let ty = match table.get("type") {
            None => default_ty,
            Some(Value::String(s)) => ScalarType::parse(s).ok_or_else(|| {
                config_error(
                    &format!("{path}.type"),
                    format!("unknown type '{s}' (expected int32, int64, float32, float64 or bool)"),
                )
            })?,
            Some(other) => {
                return Err(config_error(
                    &format!("{path}.type"),
                    format!("expected a type name, got {}", other.type_str()),
                ));
            }
        };

        if offset + ty.width() > telemetry_len {
            return Err(config_error(
                path,
                format!(
                    "{} at offset {offset} reads past the end of the {telemetry_len}-byte telemetry buffer",
                    ty.name()
                ),
            ));
        }
        Ok(ValueBinding::Field { ty, offset })
    }

    /// A `total` descriptor: a plain number, or `{ offset, type }` with a numeric type.
    pub fn total_from_value(value: &Value, path: &str, telemetry_len: usize) -> Result<Self> {
        match value {
            Value::Table(t) => {
                if !t.contains_key("type") {
                    return Err(config_error(path, "a total field needs an explicit type"));
                }
                let binding = Self::field_from_table(t, path, ScalarType::Bool, telemetry_len)?;
                if binding.is_bool() {
                    return Err(config_error(path, "a total cannot be a bool"));
                }
                Ok(binding)
            }
            other => Ok(ValueBinding::Constant(settings::number(other, path)?)),
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(
            self,
            ValueBinding::Field {
                ty: ScalarType::Bool,
                ..
            }
        )
    }

    /// Read the current value.
    pub fn snapshot(&self, telemetry: &[u8]) -> Snapshot {
        match *self {
            ValueBinding::Field { ty, offset } => read_scalar(telemetry, ty, offset),
            ValueBinding::Constant(value) => Snapshot { value, flag: None },
        }
    }
}

impl fmt::Display for ValueBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueBinding::Field { ty, offset } => write!(f, "{}@{offset}", ty.name()),
            ValueBinding::Constant(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf_with(offset: usize, bytes: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; 64];
        buf[offset..offset + bytes.len()].copy_from_slice(bytes);
        buf
    }

    fn table(s: &str) -> toml::Table {
        toml::from_str(s).unwrap()
    }

    // ── read_scalar ──

    #[test]
    fn read_int32() {
        let buf = buf_with(4, &(-7000i32).to_ne_bytes());
        assert_eq!(read_scalar(&buf, ScalarType::Int32, 4).value, -7000.0);
    }

    #[test]
    fn read_int64() {
        let buf = buf_with(8, &(1i64 << 40).to_ne_bytes());
        assert_eq!(
            read_scalar(&buf, ScalarType::Int64, 8).value,
            (1i64 << 40) as f64
        );
    }

    #[test]
    fn read_float32() {
        let buf = buf_with(12, &0.75f32.to_ne_bytes());
        assert_eq!(read_scalar(&buf, ScalarType::Float32, 12).value, 0.75);
    }

    #[test]
    fn read_float64() {
        let buf = buf_with(16, &1234.5f64.to_ne_bytes());
        assert_eq!(read_scalar(&buf, ScalarType::Float64, 16).value, 1234.5);
    }

    #[test]
    fn read_bool_keeps_flag() {
        let buf = buf_with(3, &[1]);
        let s = read_scalar(&buf, ScalarType::Bool, 3);
        assert_eq!(s.flag, Some(true));
        assert_eq!(s.value, 1.0);
        let s = read_scalar(&buf, ScalarType::Bool, 2);
        assert_eq!(s.flag, Some(false));
    }

    #[test]
    fn read_out_of_range_is_zero() {
        let buf = vec![0xffu8; 6];
        assert_eq!(read_scalar(&buf, ScalarType::Int32, 4).value, 0.0);
        assert_eq!(read_scalar(&buf, ScalarType::Float64, usize::MAX).value, 0.0);
        assert_eq!(read_scalar(&buf, ScalarType::Bool, 6).flag, Some(false));
    }

    // ── Construction ──

    #[test]
    fn type_defaults_to_bool() {
        let t = table("offset = 10");
        let b = ValueBinding::field_from_table(&t, "value", ScalarType::Bool, 64).unwrap();
        assert_eq!(
            b,
            ValueBinding::Field {
                ty: ScalarType::Bool,
                offset: 10
            }
        );
    }

    #[test]
    fn unknown_type_is_config_error() {
        let t = table("offset = 0\ntype = \"double\"");
        let err = ValueBinding::field_from_table(&t, "rpm.value", ScalarType::Bool, 64).unwrap_err();
        assert!(matches!(err, crate::RimlightsError::Config(_)));
        assert!(err.to_string().contains("rpm.value.type"));
    }

    #[test]
    fn missing_offset_is_config_error() {
        let t = table("type = \"int32\"");
        assert!(ValueBinding::field_from_table(&t, "value", ScalarType::Bool, 64).is_err());
    }

    #[test]
    fn negative_offset_is_config_error() {
        let t = table("offset = -4\ntype = \"int32\"");
        assert!(ValueBinding::field_from_table(&t, "value", ScalarType::Bool, 64).is_err());
    }

    #[test]
    fn field_past_buffer_end_is_config_error() {
        let t = table("offset = 60\ntype = \"float64\"");
        let err = ValueBinding::field_from_table(&t, "value", ScalarType::Bool, 64).unwrap_err();
        assert!(err.to_string().contains("past the end"));
        let t = table("offset = 56\ntype = \"float64\"");
        assert!(ValueBinding::field_from_table(&t, "value", ScalarType::Bool, 64).is_ok());
    }

    #[test]
    fn total_constant_and_field() {
        let c = ValueBinding::total_from_value(&Value::Integer(9000), "total", 64).unwrap();
        assert_eq!(c, ValueBinding::Constant(9000.0));

        let t = Value::Table(table("offset = 8\ntype = \"int32\""));
        let f = ValueBinding::total_from_value(&t, "total", 64).unwrap();
        assert_eq!(
            f,
            ValueBinding::Field {
                ty: ScalarType::Int32,
                offset: 8
            }
        );
    }

    #[test]
    fn total_requires_numeric_type() {
        let untyped = Value::Table(table("offset = 8"));
        assert!(ValueBinding::total_from_value(&untyped, "total", 64).is_err());
        let boolean = Value::Table(table("offset = 8\ntype = \"bool\""));
        assert!(ValueBinding::total_from_value(&boolean, "total", 64).is_err());
    }

    #[test]
    fn constant_snapshot_ignores_buffer() {
        let b = ValueBinding::Constant(42.0);
        assert_eq!(b.snapshot(&[]).value, 42.0);
        assert_eq!(b.snapshot(&[]).flag, None);
    }

    #[test]
    fn resolve_uses_group_value() {
        let doc = table(
            r#"
[rpm]
value = { offset = 4, type = "int32" }
[[rpm.leds]]
n = 1
"#,
        );
        let root = Clause::root(&doc);
        let rpm = root.table("rpm").unwrap().unwrap();
        let leds = rpm.list("leds").unwrap();
        let (binding, _, path) = ValueBinding::resolve(&leds[0], 64).unwrap();
        assert_eq!(
            binding,
            ValueBinding::Field {
                ty: ScalarType::Int32,
                offset: 4
            }
        );
        assert_eq!(path, "rpm.value");
    }

    #[test]
    fn resolve_without_value_is_config_error() {
        let doc = table("[[buttons.leds]]\nn = 1");
        let root = Clause::root(&doc);
        let buttons = root.table("buttons").unwrap().unwrap();
        let leds = buttons.list("leds").unwrap();
        let err = ValueBinding::resolve(&leds[0], 64).unwrap_err();
        assert!(err.to_string().contains("buttons.leds[0]"));
    }

    #[test]
    fn display_binding() {
        let b = ValueBinding::Field {
            ty: ScalarType::Float32,
            offset: 12,
        };
        assert_eq!(b.to_string(), "float32@12");
    }
}
