//! A configured LED driven by one telemetry value.

use crate::binding::{Snapshot, ValueBinding};
use crate::error::Result;
use crate::led::{Rgb, color_from_value};
use crate::protocol::MASK_BITS;
use crate::settings::{self, Clause, config_error};
use crate::threshold;

/// How the boundaries were configured.
#[derive(Debug, Clone, PartialEq)]
enum Levels {
    /// Fixed boundaries (`level`).
    Absolute,
    /// Percentages of the total, rescaled every update (`level_p`).
    Percent { percents: Vec<f64>, fractions: Vec<f64> },
}

/// One LED decision unit.
#[derive(Debug, Clone)]
pub struct Indicator {
    path: String,
    position: u8,
    value: ValueBinding,
    total: Option<ValueBinding>,
    levels: Levels,
    boundaries: Vec<f64>,
    inverted: Vec<bool>,
    colors: Vec<Rgb>,
    last: Snapshot,
    last_total: f64,
}

impl Indicator {
    /// Build an indicator from a `leds` entry.
    ///
    /// `telemetry_len` bounds every field binding.
    pub fn from_clause(clause: &Clause<'_>, telemetry_len: usize) -> Result<Self> {
        let path = clause.path().to_string();

        let n = clause
            .get("n")
            .ok_or_else(|| config_error(&path, "missing LED number n"))
            .and_then(|v| settings::integer(v, &clause.key_path("n")))?;
        if !(1..=MASK_BITS as i64).contains(&n) {
            return Err(config_error(
                &clause.key_path("n"),
                format!("LED number {n} outside 1..={MASK_BITS}"),
            ));
        }
        let position = (n - 1) as u8;

        let (value, descriptor, value_path) = ValueBinding::resolve(clause, telemetry_len)?;
        let total = descriptor
            .get("total")
            .map(|t| ValueBinding::total_from_value(t, &format!("{value_path}.total"), telemetry_len))
            .transpose()?;

        let (levels, boundaries) = if let Some(l) = clause.get("level") {
            let key = clause.key_path("level");
            let b = settings::numbers(l, &key)?;
            check_ascending(&b, &key)?;
            (Levels::Absolute, b)
        } else if let Some(l) = clause.get("level_p") {
            let key = clause.key_path("level_p");
            if total.is_none() {
                return Err(config_error(
                    &key,
                    "percentage levels need a total in the value clause",
                ));
            }
            let p = settings::numbers(l, &key)?;
            check_ascending(&p, &key)?;
            let fractions = threshold::percent_fractions(&p);
            let b = vec![0.0; fractions.len()];
            (
                Levels::Percent {
                    percents: p,
                    fractions,
                },
                b,
            )
        } else {
            (Levels::Absolute, vec![0.0])
        };

        let mut inverted = match clause.get("inv") {
            Some(v) => settings::flags(v, &clause.key_path("inv"))?,
            None => Vec::new(),
        };
        inverted.resize(boundaries.len(), false);

        let color_key = clause.key_path("color");
        let colors = clause
            .get("color")
            .ok_or_else(|| config_error(&path, "missing color"))
            .map(settings::one_or_many)?
            .into_iter()
            .map(|c| color_from_value(c).map_err(|e| config_error(&color_key, e)))
            .collect::<Result<Vec<_>>>()?;
        if colors.is_empty() {
            return Err(config_error(&color_key, "list must not be empty"));
        }

        Ok(Indicator {
            path,
            position,
            value,
            total,
            levels,
            boundaries,
            inverted,
            colors,
            last: Snapshot::default(),
            last_total: 0.0,
        })
    }

    /// Take this cycle's snapshot and rescale percentage boundaries.
    pub fn update(&mut self, telemetry: &[u8]) {
        self.last = self.value.snapshot(telemetry);
        if let Some(total) = &self.total {
            self.last_total = total.snapshot(telemetry).value;
            if let Levels::Percent { fractions, .. } = &self.levels {
                threshold::scale_boundaries(fractions, self.last_total, &mut self.boundaries);
            }
        }
    }

    fn band(&self) -> isize {
        match self.last.flag {
            Some(_) => 0,
            None => threshold::band_index(&self.boundaries, self.last.value),
        }
    }

    /// Whether the LED should be lit for the last snapshot.
    pub fn is_on(&self) -> bool {
        let band = self.band();
        let raw_on = match self.last.flag {
            Some(flag) => flag,
            None => band >= 0,
        };
        threshold::apply_inversion(&self.inverted, band, raw_on)
    }

    /// Color for the last snapshot.
    pub fn color(&self) -> Rgb {
        if self.value.is_bool() {
            return self.colors[0];
        }
        threshold::select_color(&self.colors, self.band())
    }

    pub fn is_multicolor(&self) -> bool {
        self.colors.len() > 1
    }

    /// Zero-based LED position.
    pub fn position(&self) -> u8 {
        self.position
    }

    /// Current absolute boundaries.
    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn inverted(&self) -> &[bool] {
        &self.inverted
    }

    pub fn value(&self) -> &ValueBinding {
        &self.value
    }

    pub fn total(&self) -> Option<&ValueBinding> {
        self.total.as_ref()
    }

    pub fn is_percent(&self) -> bool {
        matches!(self.levels, Levels::Percent { .. })
    }

    /// Configured percentages, for `level_p` indicators.
    pub fn percentages(&self) -> Option<&[f64]> {
        match &self.levels {
            Levels::Percent { percents, .. } => Some(percents),
            Levels::Absolute => None,
        }
    }

    /// Settings path this indicator was built from.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn last_value(&self) -> f64 {
        self.last.value
    }

    pub fn last_total(&self) -> f64 {
        self.last_total
    }
}

fn check_ascending(values: &[f64], path: &str) -> Result<()> {
    if threshold::is_ascending(values) {
        Ok(())
    } else {
        Err(config_error(path, "levels must be in ascending order"))
    }
}

/// Build every indicator listed under `<group>.leds`.
pub fn build_group(root: &Clause<'_>, group: &str, telemetry_len: usize) -> Result<Vec<Indicator>> {
    let Some(group) = root.table(group)? else {
        return Ok(Vec::new());
    };
    group
        .list("leds")?
        .iter()
        .map(|c| Indicator::from_clause(c, telemetry_len))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEN: usize = 64;

    fn build(doc: &str) -> Result<Vec<Indicator>> {
        let table: toml::Table = toml::from_str(doc).unwrap();
        let root = Clause::root(&table);
        build_group(&root, "rpm", LEN)
    }

    fn one(doc: &str) -> Indicator {
        build(doc).unwrap().remove(0)
    }

    fn telemetry_i32(offset: usize, v: i32) -> Vec<u8> {
        let mut buf = vec![0u8; LEN];
        buf[offset..offset + 4].copy_from_slice(&v.to_ne_bytes());
        buf
    }

    // ── Construction ──

    #[test]
    fn position_is_zero_based() {
        let ind = one(
            r#"
[[rpm.leds]]
n = 3
value = { offset = 0 }
color = "red"
"#,
        );
        assert_eq!(ind.position(), 2);
        assert_eq!(ind.boundaries(), &[0.0]);
        assert_eq!(ind.inverted(), &[false]);
    }

    #[test]
    fn position_out_of_range() {
        for n in [0, 33] {
            let err = build(&format!(
                "[[rpm.leds]]\nn = {n}\nvalue = {{ offset = 0 }}\ncolor = \"red\""
            ))
            .unwrap_err();
            assert!(err.to_string().contains("rpm.leds[0].n"), "{err}");
        }
    }

    #[test]
    fn missing_color_is_error() {
        let err = build("[[rpm.leds]]\nn = 1\nvalue = { offset = 0 }").unwrap_err();
        assert!(err.to_string().contains("missing color"));
    }

    #[test]
    fn unknown_color_is_config_error() {
        let err = build("[[rpm.leds]]\nn = 1\nvalue = { offset = 0 }\ncolor = \"chartreuse\"")
            .unwrap_err();
        assert!(matches!(err, crate::RimlightsError::Config(_)));
        assert!(err.to_string().contains("rpm.leds[0].color"));
    }

    #[test]
    fn descending_levels_rejected() {
        let err = build(
            r#"
[[rpm.leds]]
n = 1
value = { offset = 0, type = "int32" }
level = [20, 10]
color = "red"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ascending"));
    }

    #[test]
    fn percent_levels_need_total() {
        let err = build(
            r#"
[[rpm.leds]]
n = 1
value = { offset = 0, type = "int32" }
level_p = [50]
color = "red"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("total"));
    }

    #[test]
    fn inversion_padded_to_boundaries() {
        let ind = one(
            r#"
[[rpm.leds]]
n = 1
value = { offset = 0, type = "int32" }
level = [1, 2, 3]
inv = true
color = "red"
"#,
        );
        assert_eq!(ind.inverted(), &[true, false, false]);
    }

    #[test]
    fn extra_inversion_flags_dropped() {
        let ind = one(
            r#"
[[rpm.leds]]
n = 1
value = { offset = 0, type = "int32" }
level = 5
inv = [false, true, true]
color = "red"
"#,
        );
        assert_eq!(ind.inverted(), &[false]);
    }

    #[test]
    fn level_takes_precedence_over_level_p() {
        let ind = one(
            r#"
[rpm]
value = { offset = 0, type = "int32", total = 100 }
[[rpm.leds]]
n = 1
level = 10
level_p = 50
color = "red"
"#,
        );
        assert!(!ind.is_percent());
        assert_eq!(ind.percentages(), None);
        assert_eq!(ind.boundaries(), &[10.0]);
    }

    // ── Evaluation ──

    #[test]
    fn bool_indicator_follows_flag() {
        let mut ind = one(
            r#"
[[rpm.leds]]
n = 1
value = { offset = 5 }
level = [100, 200]
color = ["green", "red"]
"#,
        );
        let mut buf = vec![0u8; LEN];
        ind.update(&buf);
        assert!(!ind.is_on());
        buf[5] = 1;
        ind.update(&buf);
        assert!(ind.is_on());
        assert_eq!(ind.color(), Rgb::GREEN);
    }

    #[test]
    fn inverted_bool() {
        let mut ind = one("[[rpm.leds]]\nn = 1\nvalue = { offset = 5 }\ninv = true\ncolor = \"red\"");
        ind.update(&[0u8; LEN]);
        assert!(ind.is_on());
    }

    #[test]
    fn numeric_bands() {
        let mut ind = one(
            r#"
[[rpm.leds]]
n = 1
value = { offset = 8, type = "int32" }
level = [10, 20]
color = ["green", "red"]
"#,
        );
        let cases = [
            (5, false, Rgb::BLACK),
            (10, true, Rgb::GREEN),
            (15, true, Rgb::GREEN),
            (20, true, Rgb::RED),
            (25, true, Rgb::RED),
        ];
        for (v, on, color) in cases {
            ind.update(&telemetry_i32(8, v));
            assert_eq!(ind.is_on(), on, "value {v}");
            assert_eq!(ind.color(), color, "value {v}");
        }
    }

    #[test]
    fn default_boundary_is_zero() {
        let mut ind = one("[[rpm.leds]]\nn = 1\nvalue = { offset = 0, type = \"int32\" }\ncolor = \"red\"");
        ind.update(&telemetry_i32(0, 0));
        assert!(ind.is_on());
        ind.update(&telemetry_i32(0, -1));
        assert!(!ind.is_on());
    }

    #[test]
    fn percent_boundaries_track_total_field() {
        let mut ind = one(
            r#"
[rpm]
value = { offset = 0, type = "int32", total = { offset = 4, type = "int32" } }
[[rpm.leds]]
n = 1
level_p = [25, 50]
color = "red"
"#,
        );
        assert_eq!(ind.percentages(), Some(&[25.0, 50.0][..]));
        let mut buf = telemetry_i32(4, 200);
        ind.update(&buf);
        assert_eq!(ind.boundaries(), &[50.0, 100.0]);
        buf[4..8].copy_from_slice(&100i32.to_ne_bytes());
        ind.update(&buf);
        assert_eq!(ind.boundaries(), &[25.0, 50.0]);
        assert_eq!(ind.last_total(), 100.0);
    }

    #[test]
    fn percent_with_constant_total() {
        let mut ind = one(
            r#"
[rpm]
value = { offset = 0, type = "float32", total = 8000 }
[[rpm.leds]]
n = 1
level_p = 90
color = "red"
"#,
        );
        let mut buf = vec![0u8; LEN];
        buf[0..4].copy_from_slice(&7300.0f32.to_ne_bytes());
        ind.update(&buf);
        assert!(ind.is_on());
        buf[0..4].copy_from_slice(&7100.0f32.to_ne_bytes());
        ind.update(&buf);
        assert!(!ind.is_on());
    }

    #[test]
    fn more_bands_than_colors() {
        let mut ind = one(
            r#"
[[rpm.leds]]
n = 1
value = { offset = 0, type = "int32" }
level = [0, 10, 20]
color = ["green", "red"]
"#,
        );
        ind.update(&telemetry_i32(0, 30));
        assert_eq!(ind.color(), Rgb::RED);
    }

    #[test]
    fn group_value_shared_by_leds() {
        let inds = build(
            r#"
[rpm]
value = { offset = 0, type = "int32" }
[[rpm.leds]]
n = 1
level = 10
color = "green"
[[rpm.leds]]
n = 2
level = 20
color = "red"
"#,
        )
        .unwrap();
        let buf = telemetry_i32(0, 15);
        let on: Vec<bool> = inds
            .into_iter()
            .map(|mut i| {
                i.update(&buf);
                i.is_on()
            })
            .collect();
        assert_eq!(on, vec![true, false]);
    }

    #[test]
    fn missing_group_is_empty() {
        assert!(build("cycle_ms = 10").unwrap().is_empty());
    }
}
