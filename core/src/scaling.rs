//! Conversion between per-100 g macro values and absolute portion values.
//!
//! Both directions are pure and tolerate missing input. Recomputation only
//! ever flows per-100 -> portion when the user edits the weight or a per-100
//! value; [`per100_from_portion`] exists to fill per-100 values for data that
//! only arrived as absolute amounts.

use crate::models::{MacroKind, Macros};

/// Round to one decimal place.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn usable_weight(weight_grams: Option<f64>) -> Option<f64> {
    weight_grams.filter(|w| w.is_finite() && *w > 0.0)
}

/// `per100 * weight / 100`, rounded to one decimal.
#[must_use]
pub fn scale_to_portion(per100: Option<f64>, weight_grams: f64) -> Option<f64> {
    let per100 = per100.filter(|v| v.is_finite())?;
    Some(round1(per100 * weight_grams / 100.0))
}

/// `portion * 100 / weight`, rounded to one decimal. Unknown without a
/// non-zero weight.
#[must_use]
pub fn scale_to_per100(portion: Option<f64>, weight_grams: Option<f64>) -> Option<f64> {
    let portion = portion.filter(|v| v.is_finite())?;
    let weight = weight_grams.filter(|w| w.is_finite() && *w != 0.0)?;
    Some(round1(portion * 100.0 / weight))
}

/// Absolute macros for a portion, starting from `current` and overwriting
/// every field whose per-100 value is known.
///
/// Returns `None` when the weight is missing or not positive: the caller keeps
/// its absolute values unchanged.
#[must_use]
pub fn portion_from_per100(
    per100: &Macros,
    weight_grams: Option<f64>,
    current: &Macros,
) -> Option<Macros> {
    let weight = usable_weight(weight_grams)?;
    let mut out = *current;
    for kind in MacroKind::ALL {
        if let Some(v) = scale_to_portion(per100.get(kind), weight) {
            out.set(kind, Some(v));
        }
    }
    Some(out)
}

/// Per-100 g macros derived from absolute portion values.
#[must_use]
pub fn per100_from_portion(macros: &Macros, weight_grams: Option<f64>) -> Macros {
    let mut out = Macros::default();
    for kind in MacroKind::ALL {
        out.set(kind, scale_to_per100(macros.get(kind), weight_grams));
    }
    out
}
