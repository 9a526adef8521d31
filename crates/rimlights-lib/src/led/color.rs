//! Color parsing and formatting for wheel LEDs.
//!
//! Colors travel on the wire as three bytes `r, g, b`. In configuration they
//! may be written as a name, a `#RRGGBB` string, or a packed `0xRRGGBB` integer.

use std::fmt;

use serde::Serialize;

/// A 24-bit LED color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const RED: Rgb = Rgb::new(0xFF, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 0xFF, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 0xFF);
    pub const WHITE: Rgb = Rgb::new(0xFF, 0xFF, 0xFF);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Build from a packed `0xRRGGBB` value. Bits above 24 are ignored.
    pub const fn from_packed(val: u32) -> Self {
        Rgb {
            r: (val >> 16) as u8,
            g: (val >> 8) as u8,
            b: val as u8,
        }
    }

    /// Wire order: `[r, g, b]`.
    pub const fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Parse a color string.
///
/// Accepts:
/// - Hex: `"#FFD700"`, `"FFD700"`, `"#ffd700"`
/// - Named: `"red"`, `"gold"`, `"yellow"`, `"green"`, `"blue"`, `"cyan"`, `"teal"`,
///   `"magenta"`, `"orange"`, `"purple"`, `"white"`, `"black"` / `"off"`
pub fn parse_color(s: &str) -> crate::error::Result<Rgb> {
    let s = s.trim();

    let named = match s.to_lowercase().as_str() {
        "red" => Some(0xFF0000),
        "gold" => Some(0xFFD700),
        "yellow" => Some(0xFFFF00),
        "green" => Some(0x00FF00),
        "blue" => Some(0x0000FF),
        "cyan" => Some(0x00FFFF),
        "teal" => Some(0x56F7FC),
        "magenta" => Some(0xFF00FF),
        "orange" => Some(0xFF8000),
        "purple" => Some(0x8000FF),
        "white" => Some(0xFFFFFF),
        "off" | "black" => Some(0x000000),
        _ => None,
    };
    if let Some(val) = named {
        return Ok(Rgb::from_packed(val));
    }

    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 {
        return Err(crate::RimlightsError::Color(format!(
            "Invalid color: {s} (use #RRGGBB or a color name)"
        )));
    }
    let val = u32::from_str_radix(hex, 16)
        .map_err(|_| crate::RimlightsError::Color(format!("Invalid hex color: {s}")))?;
    Ok(Rgb::from_packed(val))
}

/// Interpret a configuration value as a color: a string goes through
/// [`parse_color`], an integer is taken as packed `0xRRGGBB`.
pub fn color_from_value(value: &toml::Value) -> crate::error::Result<Rgb> {
    match value {
        toml::Value::String(s) => parse_color(s),
        toml::Value::Integer(n) if (0..=0xFF_FFFF).contains(n) => Ok(Rgb::from_packed(*n as u32)),
        toml::Value::Integer(n) => Err(crate::RimlightsError::Color(format!(
            "Color value out of range: {n:#X} (max 0xFFFFFF)"
        ))),
        other => Err(crate::RimlightsError::Color(format!(
            "Expected a color name, #RRGGBB string or 0xRRGGBB integer, got {}",
            other.type_str()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse_color ──

    #[test]
    fn parse_named_red() {
        assert_eq!(parse_color("red").unwrap(), Rgb::RED);
    }

    #[test]
    fn parse_named_gold() {
        assert_eq!(parse_color("gold").unwrap(), Rgb::new(0xFF, 0xD7, 0));
    }

    #[test]
    fn parse_named_teal() {
        assert_eq!(parse_color("teal").unwrap(), Rgb::new(0x56, 0xF7, 0xFC));
    }

    #[test]
    fn parse_named_off() {
        assert_eq!(parse_color("off").unwrap(), Rgb::BLACK);
        assert_eq!(parse_color("black").unwrap(), Rgb::BLACK);
    }

    #[test]
    fn parse_named_case_insensitive() {
        assert_eq!(parse_color("RED").unwrap(), Rgb::RED);
        assert_eq!(parse_color("  Green  ").unwrap(), Rgb::GREEN);
    }

    #[test]
    fn parse_hex_with_and_without_hash() {
        assert_eq!(parse_color("#0000FF").unwrap(), Rgb::BLUE);
        assert_eq!(parse_color("abcdef").unwrap(), Rgb::new(0xAB, 0xCD, 0xEF));
    }

    #[test]
    fn parse_invalid_short() {
        assert!(parse_color("#FFF").is_err());
    }

    #[test]
    fn parse_invalid_name() {
        assert!(parse_color("chartreuse").is_err());
    }

    #[test]
    fn parse_invalid_hex_chars() {
        assert!(parse_color("#GGHHII").is_err());
    }

    // ── color_from_value ──

    #[test]
    fn value_integer_is_packed_rgb() {
        let v = toml::Value::Integer(0x123456);
        assert_eq!(color_from_value(&v).unwrap(), Rgb::new(0x12, 0x34, 0x56));
    }

    #[test]
    fn value_integer_out_of_range() {
        assert!(color_from_value(&toml::Value::Integer(0x1_000000)).is_err());
        assert!(color_from_value(&toml::Value::Integer(-1)).is_err());
    }

    #[test]
    fn value_string_name() {
        let v = toml::Value::String("white".into());
        assert_eq!(color_from_value(&v).unwrap(), Rgb::WHITE);
    }

    #[test]
    fn value_wrong_type() {
        assert!(color_from_value(&toml::Value::Boolean(true)).is_err());
    }

    // ── Rgb ──

    #[test]
    fn from_packed_to_bytes() {
        let c = Rgb::from_packed(0xFF8000);
        assert_eq!(c.to_bytes(), [0xFF, 0x80, 0x00]);
    }

    #[test]
    fn from_packed_ignores_high_byte() {
        assert_eq!(Rgb::from_packed(0xAA00_FF00), Rgb::GREEN);
    }

    #[test]
    fn display_hex() {
        assert_eq!(Rgb::new(0xAB, 0x12, 0xCD).to_string(), "#AB12CD");
    }
}
