//! LED colors.

mod color;

pub use color::{Rgb, color_from_value, parse_color};
