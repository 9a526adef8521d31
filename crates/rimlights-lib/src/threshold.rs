//! Band selection, inversion and color choice.
//!
//! Pure functions over already-snapshotted values. An indicator's boundaries
//! split the number line into bands: band `i` starts at `boundaries[i]`
//! (inclusive), and anything below the first boundary is band `-1`.

use crate::led::Rgb;

/// Color shown for a multicolor indicator below its first boundary.
pub const DEFAULT_COLOR: Rgb = Rgb::BLACK;

/// Band containing `value`: `(number of boundaries <= value) - 1`.
///
/// `boundaries` must be ascending.
pub fn band_index(boundaries: &[f64], value: f64) -> isize {
    boundaries.partition_point(|b| *b <= value) as isize - 1
}

/// Apply the inversion flag for `band` to `raw_on`.
///
/// Band `-1` uses the first flag. Missing flags mean not inverted.
pub fn apply_inversion(inverted: &[bool], band: isize, raw_on: bool) -> bool {
    let idx = band.max(0) as usize;
    if inverted.get(idx).copied().unwrap_or(false) {
        !raw_on
    } else {
        raw_on
    }
}

/// Color for `band`. A single color is always used; otherwise bands past the
/// end reuse the last color and band `-1` is [`DEFAULT_COLOR`].
pub fn select_color(colors: &[Rgb], band: isize) -> Rgb {
    match colors {
        [] => DEFAULT_COLOR,
        [only] => *only,
        _ if band < 0 => DEFAULT_COLOR,
        _ => colors[(band as usize).min(colors.len() - 1)],
    }
}

/// Convert percentages to fractions of the total.
pub fn percent_fractions(percents: &[f64]) -> Vec<f64> {
    percents.iter().map(|p| p / 100.0).collect()
}

/// Recompute absolute boundaries from fractions and the current total.
pub fn scale_boundaries(fractions: &[f64], total: f64, out: &mut [f64]) {
    for (b, f) in out.iter_mut().zip(fractions) {
        *b = f * total;
    }
}

/// Whether `values` never decreases.
pub fn is_ascending(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] <= w[1])
}
