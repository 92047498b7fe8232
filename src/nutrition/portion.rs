//! Portion math: normalizes a food's nutrition basis to a per-gram rate and
//! aggregates item macros into meal totals. All arithmetic stays in full
//! precision; rounding happens only when text is rendered for the user.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::nutrition::Basis;

const GRAMS_PER_OUNCE: f64 = 28.3495;
const GRAMS_PER_POUND: f64 = 453.592;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Macros {
    pub calories: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
}

impl Macros {
    pub fn add(&self, other: &Macros) -> Macros {
        Macros {
            calories: self.calories + other.calories,
            protein_g: self.protein_g + other.protein_g,
            fat_g: self.fat_g + other.fat_g,
            carbs_g: self.carbs_g + other.carbs_g,
        }
    }
}

/// Macro values for a requested gram amount.
///
/// The basis quantity is normalized first (`value * grams / basis_grams`), so
/// per-serving foods with an unknown serving weight are refused rather than
/// silently misread as per-100g.
pub fn compute_item(
    basis: Basis,
    serving_size_g: Option<f64>,
    at_basis: &Macros,
    grams: f64,
) -> Result<Macros, EngineError> {
    if grams <= 0.0 {
        return Err(EngineError::validation("grams must be greater than zero"));
    }
    let basis_grams = match basis {
        Basis::Per100g => 100.0,
        Basis::PerServing => match serving_size_g {
            Some(s) if s > 0.0 => s,
            _ => {
                return Err(EngineError::validation(
                    "this food's serving weight is unknown; enter the amount in grams \
                     or re-enter the food manually",
                ))
            }
        },
    };
    Ok(Macros {
        calories: at_basis.calories * grams / basis_grams,
        protein_g: at_basis.protein_g * grams / basis_grams,
        fat_g: at_basis.fat_g * grams / basis_grams,
        carbs_g: at_basis.carbs_g * grams / basis_grams,
    })
}

/// Sums item macros per field. The committed meal totals are exactly these
/// values, never re-derived downstream.
pub fn aggregate<'a>(items: impl IntoIterator<Item = &'a Macros>) -> Macros {
    items
        .into_iter()
        .fold(Macros::default(), |acc, m| acc.add(m))
}

/// Parses a grams reply: a bare number or a number with a gram/ounce/pound
/// suffix. Anything else is a validation error and must not mutate state.
pub fn parse_grams(text: &str) -> Result<f64, EngineError> {
    lazy_static! {
        static ref GRAMS_RE: Regex = Regex::new(
            r"^(?P<num>\d+(?:\.\d+)?)\s*(?P<unit>g|gram|grams|oz|ounce|ounces|lb|lbs|pound|pounds)?$"
        )
        .unwrap();
    }
    let cleaned = text.trim().to_lowercase();
    let caps = GRAMS_RE.captures(&cleaned).ok_or_else(|| {
        EngineError::validation("reply with an amount like 150, 150g, 5.3 oz, or 0.5 lb")
    })?;
    let value: f64 = caps["num"]
        .parse()
        .map_err(|_| EngineError::validation("that number is out of range"))?;
    let factor = match caps.name("unit").map(|m| m.as_str()).unwrap_or("") {
        "" | "g" | "gram" | "grams" => 1.0,
        "oz" | "ounce" | "ounces" => GRAMS_PER_OUNCE,
        _ => GRAMS_PER_POUND,
    };
    let grams = value * factor;
    if grams <= 0.0 {
        return Err(EngineError::validation("grams must be greater than zero"));
    }
    Ok(grams)
}

/// Parses "calories, protein, fat, carbs" as four comma/space-separated
/// numbers.
pub fn parse_macros(text: &str) -> Result<Macros, EngineError> {
    let parts: Vec<&str> = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 4 {
        return Err(EngineError::validation(
            "enter calories, protein, fat, carbs (e.g., 200, 10, 5, 30)",
        ));
    }
    let mut values = [0.0f64; 4];
    for (slot, part) in values.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|_| EngineError::validation("macros must be numbers (e.g., 200, 10, 5, 30)"))?;
        if *slot < 0.0 {
            return Err(EngineError::validation("macros cannot be negative"));
        }
    }
    Ok(Macros {
        calories: values[0],
        protein_g: values[1],
        fat_g: values[2],
        carbs_g: values[3],
    })
}

/// Midpoint of the vision gram estimate, falling back to the low bound.
pub fn estimate_grams(low: Option<f64>, high: Option<f64>) -> Option<f64> {
    match (low, high) {
        (Some(low), Some(high)) if high > 0.0 => Some(((low + high) / 2.0).round()),
        (Some(low), _) if low > 0.0 => Some(low.round()),
        _ => None,
    }
}

pub fn fmt_kcal(value: f64) -> String {
    format!("{}", value.round() as i64)
}

pub fn fmt_grams(value: f64) -> String {
    format!("{:.1}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn per_100g_scales_linearly() {
        let base = Macros {
            calories: 165.0,
            protein_g: 31.0,
            fat_g: 3.6,
            carbs_g: 0.0,
        };
        let at_g = compute_item(Basis::Per100g, None, &base, 80.0).unwrap();
        let at_2g = compute_item(Basis::Per100g, None, &base, 160.0).unwrap();
        assert!(close(at_2g.calories, 2.0 * at_g.calories));
        assert!(close(at_2g.protein_g, 2.0 * at_g.protein_g));
        assert!(close(at_2g.fat_g, 2.0 * at_g.fat_g));
        assert!(close(at_2g.carbs_g, 2.0 * at_g.carbs_g));
    }

    #[test]
    fn chicken_at_120g_matches_expected_macros() {
        let base = Macros {
            calories: 165.0,
            protein_g: 31.0,
            fat_g: 3.6,
            carbs_g: 0.0,
        };
        let portion = compute_item(Basis::Per100g, None, &base, 120.0).unwrap();
        assert!(close(portion.calories, 198.0));
        assert!(close(portion.protein_g, 37.2));
        assert!(close(portion.fat_g, 4.32));
        assert!(close(portion.carbs_g, 0.0));
    }

    #[test]
    fn per_serving_normalizes_through_serving_weight() {
        let base = Macros {
            calories: 250.0,
            protein_g: 10.0,
            fat_g: 8.0,
            carbs_g: 30.0,
        };
        // One 50g serving eaten as 100g: everything doubles.
        let portion = compute_item(Basis::PerServing, Some(50.0), &base, 100.0).unwrap();
        assert!(close(portion.calories, 500.0));
        assert!(close(portion.protein_g, 20.0));
    }

    #[test]
    fn per_serving_without_weight_is_refused() {
        let base = Macros::default();
        let err = compute_item(Basis::PerServing, None, &base, 100.0).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        let err = compute_item(Basis::PerServing, Some(0.0), &base, 100.0).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn aggregate_sums_each_field_independently() {
        let a = Macros {
            calories: 198.0,
            protein_g: 37.2,
            fat_g: 4.32,
            carbs_g: 0.0,
        };
        let b = Macros {
            calories: 195.0,
            protein_g: 4.05,
            fat_g: 0.45,
            carbs_g: 42.0,
        };
        let total = aggregate([&a, &b]);
        assert!(close(total.calories, 393.0));
        assert!(close(total.protein_g, 41.25));
        assert!(close(total.fat_g, 4.77));
        assert!(close(total.carbs_g, 42.0));
    }

    #[test]
    fn parse_grams_accepts_bare_numbers_and_units() {
        assert!(close(parse_grams("150").unwrap(), 150.0));
        assert!(close(parse_grams(" 150 g ").unwrap(), 150.0));
        assert!(close(parse_grams("2.5grams").unwrap(), 2.5));
        assert!(close(parse_grams("1 oz").unwrap(), 28.3495));
        assert!(close(parse_grams("2 ounces").unwrap(), 56.699));
        assert!(close(parse_grams("0.5 lb").unwrap(), 226.796));
    }

    #[test]
    fn parse_grams_rejects_junk_and_zero() {
        for bad in ["", "a lot", "12 kg", "-5", "0", "0g"] {
            assert!(
                matches!(parse_grams(bad), Err(EngineError::Validation(_))),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn parse_macros_accepts_comma_and_space_separation() {
        let m = parse_macros("200, 10, 5, 30").unwrap();
        assert!(close(m.calories, 200.0));
        assert!(close(m.protein_g, 10.0));
        assert!(close(m.fat_g, 5.0));
        assert!(close(m.carbs_g, 30.0));
        assert!(parse_macros("200 10 5").is_err());
        assert!(parse_macros("200, 10, 5, x").is_err());
        assert!(parse_macros("200, -1, 5, 30").is_err());
    }

    #[test]
    fn estimate_prefers_range_midpoint() {
        assert_eq!(estimate_grams(Some(100.0), Some(200.0)), Some(150.0));
        assert_eq!(estimate_grams(Some(120.0), None), Some(120.0));
        assert_eq!(estimate_grams(None, Some(200.0)), None);
        assert_eq!(estimate_grams(None, None), None);
    }

    #[test]
    fn rounding_only_applies_at_presentation() {
        // 1/3 of 100 kcal three times should sum back to 100 exactly in
        // aggregate even though each rendered value rounds to 33.
        let base = Macros {
            calories: 100.0,
            protein_g: 0.0,
            fat_g: 0.0,
            carbs_g: 0.0,
        };
        let third = compute_item(Basis::Per100g, None, &base, 100.0 / 3.0).unwrap();
        let total = aggregate([&third, &third, &third]);
        assert!((total.calories - 100.0).abs() < 1e-9);
        assert_eq!(fmt_kcal(third.calories), "33");
    }
}
