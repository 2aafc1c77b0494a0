//! Estimate pricing module
//!
//! This module converts room measurements and shop rates into a cost
//! breakdown: labor, materials, markup, tax and total. Everything here is a
//! pure function of its inputs so the same code backs the live preview
//! endpoint, the server-side recomputation when an estimate is saved, and the
//! `quote` CLI subcommand.
//!
//! Amounts are accumulated unrounded across areas. Rounding to whole
//! currency units happens only in [`Quote::summary`].

use serde::{Deserialize, Serialize};

use crate::config::PricingConfig;

/// Wall area hidden by one door (sq ft)
pub const DOOR_DEDUCTION_SQFT: f64 = 21.0;

/// Production rates (sq ft per labor hour, one coat)
const WALL_ROLL_SQFT_PER_HOUR: f64 = 120.0;
const WALL_SPRAY_SQFT_PER_HOUR: f64 = 150.0;
const CEILING_ROLL_SQFT_PER_HOUR: f64 = 100.0;
const CEILING_SPRAY_SQFT_PER_HOUR: f64 = 180.0;

const TRIM_LF_PER_HOUR: f64 = 25.0;
const HOURS_PER_DOOR: f64 = 1.5;

/// Prep work rates
const HOURS_PER_MINOR_PATCH: f64 = 0.25;
const HOURS_PER_MAJOR_PATCH_SQFT: f64 = 0.5;
const CAULK_LF_PER_HOUR: f64 = 30.0;
const TAPE_LF_PER_HOUR: f64 = 50.0;
const PLASTIC_SQFT_PER_HOUR: f64 = 200.0;

/// Paint coverage for one gallon, one coat
const PAINT_COVERAGE_SQFT_PER_GALLON: f64 = 350.0;

/// Consumables: (units covered per item, price per item)
const TAPE_LF_PER_ROLL: f64 = 60.0;
const TAPE_ROLL_PRICE: f64 = 5.0;
const PLASTIC_SQFT_PER_ROLL: f64 = 400.0;
const PLASTIC_ROLL_PRICE: f64 = 18.0;
const CAULK_LF_PER_TUBE: f64 = 50.0;
const CAULK_TUBE_PRICE: f64 = 4.0;

/// Flat charge per priced area for rags, sandpaper, drop cloths
const SUNDRIES_PER_AREA: f64 = 25.0;

/// How a surface gets painted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaintMethod {
    #[default]
    Roll,
    Spray,
}

impl PaintMethod {
    fn wall_rate(&self) -> f64 {
        match self {
            PaintMethod::Roll => WALL_ROLL_SQFT_PER_HOUR,
            PaintMethod::Spray => WALL_SPRAY_SQFT_PER_HOUR,
        }
    }

    fn ceiling_rate(&self) -> f64 {
        match self {
            PaintMethod::Roll => CEILING_ROLL_SQFT_PER_HOUR,
            PaintMethod::Spray => CEILING_SPRAY_SQFT_PER_HOUR,
        }
    }
}

/// Surface preparation for one area
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepWork {
    #[serde(default, deserialize_with = "lenient::number")]
    pub tape_lf: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub plastic_sqft: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub minor_patches: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub major_patch_sqft: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub caulk_lf: f64,
}

/// One room or surface grouping, measured in feet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub length: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub width: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub height: f64,
    #[serde(default, deserialize_with = "lenient::method")]
    pub wall_method: PaintMethod,
    #[serde(default, deserialize_with = "lenient::method")]
    pub ceiling_method: PaintMethod,
    #[serde(default = "default_wall_coats", deserialize_with = "lenient::number")]
    pub wall_coats: f64,
    #[serde(default = "default_ceiling_coats", deserialize_with = "lenient::number")]
    pub ceiling_coats: f64,
    #[serde(default = "default_true", deserialize_with = "lenient::flag")]
    pub paint_ceiling: bool,
    /// Recorded for the crew sheet; primer is not priced separately
    #[serde(default, deserialize_with = "lenient::flag")]
    pub wall_primer: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub ceiling_primer: bool,
    #[serde(default, deserialize_with = "lenient::number")]
    pub trim_lf: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub doors_count: f64,
    #[serde(default)]
    pub prep: PrepWork,
}

fn default_wall_coats() -> f64 {
    2.0
}

fn default_ceiling_coats() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Area {
    /// A bare room with default coats and no extras
    pub fn room(name: &str, length: f64, width: f64, height: f64) -> Self {
        Self {
            name: name.to_string(),
            length,
            width,
            height,
            wall_method: PaintMethod::Roll,
            ceiling_method: PaintMethod::Roll,
            wall_coats: default_wall_coats(),
            ceiling_coats: default_ceiling_coats(),
            paint_ceiling: true,
            wall_primer: false,
            ceiling_primer: false,
            trim_lf: 0.0,
            doors_count: 0.0,
            prep: PrepWork::default(),
        }
    }

    /// Any non-positive dimension means the area cannot be priced yet
    pub fn is_measurable(&self) -> bool {
        self.length > 0.0 && self.width > 0.0 && self.height > 0.0
    }
}

/// Shop rates for one estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingSettings {
    pub tax_rate: f64,
    pub hourly_rate: f64,
    pub markup_pct: f64,
    pub paint_price_per_gallon: f64,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self::from(&PricingConfig::default())
    }
}

impl From<&PricingConfig> for PricingSettings {
    fn from(config: &PricingConfig) -> Self {
        Self {
            tax_rate: config.tax_rate,
            hourly_rate: config.hourly_rate,
            markup_pct: config.markup_pct,
            paint_price_per_gallon: config.paint_price_per_gallon,
        }
    }
}

/// Settings as submitted by a client; missing fields fall back to shop defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsInput {
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub tax_rate: Option<f64>,
    #[serde(default, alias = "hourlyCost", deserialize_with = "lenient::optional_number")]
    pub hourly_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub markup_pct: Option<f64>,
    #[serde(default, alias = "paintCost", deserialize_with = "lenient::optional_number")]
    pub paint_price_per_gallon: Option<f64>,
}

impl SettingsInput {
    pub fn resolve(&self, defaults: &PricingSettings) -> PricingSettings {
        PricingSettings {
            tax_rate: self.tax_rate.unwrap_or(defaults.tax_rate).max(0.0),
            hourly_rate: self.hourly_rate.unwrap_or(defaults.hourly_rate).max(0.0),
            markup_pct: self.markup_pct.unwrap_or(defaults.markup_pct).max(0.0),
            paint_price_per_gallon: self
                .paint_price_per_gallon
                .unwrap_or(defaults.paint_price_per_gallon)
                .max(0.0),
        }
    }
}

/// Unrounded cost of a single area
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AreaCost {
    pub wall_area: f64,
    pub ceiling_area: f64,
    pub paintable_wall_area: f64,
    pub labor_hours: f64,
    pub paint_gallons: f64,
    pub labor: f64,
    pub paint: f64,
    pub prep_materials: f64,
    pub sundries: f64,
    pub materials: f64,
}

/// Unrounded cost of a whole estimate
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Quote {
    pub labor_hours: f64,
    pub paint_gallons: f64,
    pub labor: f64,
    pub materials: f64,
    pub subtotal: f64,
    pub markup: f64,
    pub subtotal_with_markup: f64,
    pub tax: f64,
    pub total: f64,
    pub areas: Vec<AreaCost>,
}

/// Presentation form of a [`Quote`]: whole currency units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub labor: i64,
    pub materials: i64,
    pub subtotal: i64,
    pub markup: i64,
    pub subtotal_with_markup: i64,
    pub tax: i64,
    pub total: i64,
}

/// Round a monetary amount to whole currency units
pub fn whole_units(amount: f64) -> i64 {
    if amount.is_finite() {
        amount.round() as i64
    } else {
        0
    }
}

/// Round a quantity (hours, gallons) to one decimal place for display
pub fn one_decimal(quantity: f64) -> f64 {
    (quantity * 10.0).round() / 10.0
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Price one area.
///
/// Returns an all-zero cost when any dimension is missing or non-positive.
pub fn price_area(area: &Area, settings: &PricingSettings) -> AreaCost {
    if !area.is_measurable() {
        return AreaCost::default();
    }

    let (l, w, h) = (area.length, area.width, area.height);
    let doors = non_negative(area.doors_count);
    let wall_coats = non_negative(area.wall_coats);
    let ceiling_coats = non_negative(area.ceiling_coats);
    let trim_lf = non_negative(area.trim_lf);
    let prep = &area.prep;
    let tape_lf = non_negative(prep.tape_lf);
    let plastic_sqft = non_negative(prep.plastic_sqft);
    let caulk_lf = non_negative(prep.caulk_lf);
    let minor_patches = non_negative(prep.minor_patches);
    let major_patch_sqft = non_negative(prep.major_patch_sqft);

    let wall_area = 2.0 * (l + w) * h;
    let ceiling_area = if area.paint_ceiling { l * w } else { 0.0 };
    let paintable_wall_area = (wall_area - doors * DOOR_DEDUCTION_SQFT).max(0.0);

    let mut labor_hours = paintable_wall_area * wall_coats / area.wall_method.wall_rate();
    if area.paint_ceiling {
        labor_hours += ceiling_area * ceiling_coats / area.ceiling_method.ceiling_rate();
    }
    labor_hours += trim_lf / TRIM_LF_PER_HOUR;
    labor_hours += doors * HOURS_PER_DOOR;
    labor_hours += minor_patches * HOURS_PER_MINOR_PATCH
        + major_patch_sqft * HOURS_PER_MAJOR_PATCH_SQFT
        + caulk_lf / CAULK_LF_PER_HOUR
        + tape_lf / TAPE_LF_PER_HOUR
        + plastic_sqft / PLASTIC_SQFT_PER_HOUR;

    let paint_gallons = (paintable_wall_area * wall_coats + ceiling_area * ceiling_coats)
        / PAINT_COVERAGE_SQFT_PER_GALLON;
    let paint = paint_gallons * non_negative(settings.paint_price_per_gallon);
    let prep_materials = tape_lf / TAPE_LF_PER_ROLL * TAPE_ROLL_PRICE
        + plastic_sqft / PLASTIC_SQFT_PER_ROLL * PLASTIC_ROLL_PRICE
        + caulk_lf / CAULK_LF_PER_TUBE * CAULK_TUBE_PRICE;

    AreaCost {
        wall_area,
        ceiling_area,
        paintable_wall_area,
        labor_hours,
        paint_gallons,
        labor: labor_hours * non_negative(settings.hourly_rate),
        paint,
        prep_materials,
        sundries: SUNDRIES_PER_AREA,
        materials: paint + prep_materials + SUNDRIES_PER_AREA,
    }
}

/// Price every area and apply markup and tax to the combined subtotal
pub fn price_estimate(areas: &[Area], settings: &PricingSettings) -> Quote {
    let area_costs: Vec<AreaCost> = areas.iter().map(|a| price_area(a, settings)).collect();

    let labor_hours: f64 = area_costs.iter().map(|c| c.labor_hours).sum();
    let paint_gallons: f64 = area_costs.iter().map(|c| c.paint_gallons).sum();
    let labor: f64 = area_costs.iter().map(|c| c.labor).sum();
    let materials: f64 = area_costs.iter().map(|c| c.materials).sum();

    let subtotal = labor + materials;
    let markup = subtotal * non_negative(settings.markup_pct) / 100.0;
    let subtotal_with_markup = subtotal + markup;
    let tax = subtotal_with_markup * non_negative(settings.tax_rate) / 100.0;
    let total = subtotal_with_markup + tax;

    Quote {
        labor_hours,
        paint_gallons,
        labor,
        materials,
        subtotal,
        markup,
        subtotal_with_markup,
        tax,
        total,
        areas: area_costs,
    }
}

impl Quote {
    pub fn summary(&self) -> QuoteTotals {
        QuoteTotals {
            labor: whole_units(self.labor),
            materials: whole_units(self.materials),
            subtotal: whole_units(self.subtotal),
            markup: whole_units(self.markup),
            subtotal_with_markup: whole_units(self.subtotal_with_markup),
            tax: whole_units(self.tax),
            total: whole_units(self.total),
        }
    }
}

/// Deserializers that turn partial or malformed form input into zeros
/// instead of rejecting the whole payload.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::PaintMethod;

    fn as_number(value: &Value) -> Option<f64> {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|n| n.is_finite())
    }

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(as_number(&value).unwrap_or(0.0))
    }

    /// `null` keeps the default; anything else present but unparseable is 0
    pub fn optional_number<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<f64>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(as_number(&value).unwrap_or(0.0)))
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
            Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "on" | "1"),
            _ => false,
        })
    }

    pub fn method<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PaintMethod, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) if s.trim().eq_ignore_ascii_case("spray") => PaintMethod::Spray,
            _ => PaintMethod::Roll,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn golden_settings() -> PricingSettings {
        PricingSettings {
            tax_rate: 13.0,
            hourly_rate: 35.0,
            markup_pct: 20.0,
            paint_price_per_gallon: 42.0,
        }
    }

    fn golden_area() -> Area {
        Area::room("Living room", 20.0, 15.0, 8.0)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_golden_single_area() {
        let quote = price_estimate(&[golden_area()], &golden_settings());
        let area = quote.areas[0];

        assert_close(area.wall_area, 560.0);
        assert_close(area.ceiling_area, 300.0);
        assert_close(area.paintable_wall_area, 560.0);

        // 560*2/120 + 300*1/100
        assert_close(quote.labor_hours, 560.0 * 2.0 / 120.0 + 3.0);
        assert_close(quote.labor, (560.0 * 2.0 / 120.0 + 3.0) * 35.0);
        // (1120 + 300) / 350 gallons at $42, plus $25 sundries
        assert_close(quote.paint_gallons, 1420.0 / 350.0);
        assert_close(quote.materials, 1420.0 / 350.0 * 42.0 + 25.0);

        let subtotal = quote.labor + quote.materials;
        assert_close(quote.subtotal, subtotal);
        assert_close(quote.markup, subtotal * 0.2);
        assert_close(quote.subtotal_with_markup, subtotal * 1.2);
        assert_close(quote.tax, subtotal * 1.2 * 0.13);
        assert_close(quote.total, subtotal * 1.2 * 1.13);

        assert_eq!(
            quote.summary(),
            QuoteTotals {
                labor: 432,
                materials: 195,
                subtotal: 627,
                markup: 125,
                subtotal_with_markup: 752,
                tax: 98,
                total: 850,
            }
        );
    }

    #[test]
    fn test_degenerate_dimensions_price_to_zero() {
        let settings = golden_settings();
        for (l, w, h) in [(0.0, 15.0, 8.0), (20.0, 0.0, 8.0), (20.0, 15.0, 0.0), (-5.0, 15.0, 8.0)] {
            let mut area = golden_area();
            area.length = l;
            area.width = w;
            area.height = h;
            area.trim_lf = 40.0;
            area.doors_count = 2.0;

            assert_eq!(price_area(&area, &settings), AreaCost::default());
            let quote = price_estimate(&[area], &settings);
            assert_eq!(quote.summary(), QuoteTotals::default());
            assert!(quote.total.abs() < EPS);
        }
    }

    #[test]
    fn test_no_areas_is_zero() {
        let quote = price_estimate(&[], &golden_settings());
        assert_eq!(quote.summary(), QuoteTotals::default());
    }

    #[test]
    fn test_pricing_is_idempotent() {
        let mut area = golden_area();
        area.trim_lf = 70.0;
        area.prep.tape_lf = 33.0;
        let areas = vec![area, Area::room("Hall", 12.0, 4.0, 9.0)];

        let first = price_estimate(&areas, &golden_settings());
        let second = price_estimate(&areas, &golden_settings());
        assert_eq!(first, second);
    }

    #[test]
    fn test_total_strictly_increases_with_markup_and_tax() {
        let areas = [golden_area()];

        let mut previous = f64::MIN;
        for markup in [0.0, 5.0, 10.0, 20.0, 35.0, 100.0] {
            let settings = PricingSettings {
                markup_pct: markup,
                ..golden_settings()
            };
            let total = price_estimate(&areas, &settings).total;
            assert!(total > previous, "markup {} did not raise total", markup);
            previous = total;
        }

        let mut previous = f64::MIN;
        for tax in [0.0, 5.0, 8.25, 13.0, 15.0] {
            let settings = PricingSettings {
                tax_rate: tax,
                ..golden_settings()
            };
            let total = price_estimate(&areas, &settings).total;
            assert!(total > previous, "tax {} did not raise total", tax);
            previous = total;
        }
    }

    #[test]
    fn test_spray_is_faster_than_roll() {
        let mut spray = golden_area();
        spray.wall_method = PaintMethod::Spray;
        spray.ceiling_method = PaintMethod::Spray;

        let cost = price_area(&spray, &golden_settings());
        assert_close(cost.labor_hours, 560.0 * 2.0 / 150.0 + 300.0 / 180.0);
        // Coverage does not depend on method
        assert_close(cost.paint_gallons, 1420.0 / 350.0);
    }

    #[test]
    fn test_ceiling_disabled() {
        let mut area = golden_area();
        area.paint_ceiling = false;

        let cost = price_area(&area, &golden_settings());
        assert_close(cost.ceiling_area, 0.0);
        assert_close(cost.labor_hours, 560.0 * 2.0 / 120.0);
        assert_close(cost.paint_gallons, 1120.0 / 350.0);
    }

    #[test]
    fn test_doors_reduce_wall_area_and_add_labor() {
        let mut area = golden_area();
        area.doors_count = 2.0;

        let cost = price_area(&area, &golden_settings());
        assert_close(cost.paintable_wall_area, 560.0 - 42.0);
        assert_close(cost.labor_hours, 518.0 * 2.0 / 120.0 + 3.0 + 3.0);
    }

    #[test]
    fn test_paintable_area_never_negative() {
        let mut area = Area::room("Closet", 3.0, 2.0, 7.0);
        area.doors_count = 10.0;

        let cost = price_area(&area, &golden_settings());
        assert_close(cost.wall_area, 70.0);
        assert_close(cost.paintable_wall_area, 0.0);
    }

    #[test]
    fn test_trim_and_prep() {
        let mut area = golden_area();
        area.paint_ceiling = false;
        area.wall_coats = 0.0;
        area.trim_lf = 50.0;
        area.prep = PrepWork {
            tape_lf: 120.0,
            plastic_sqft: 400.0,
            minor_patches: 4.0,
            major_patch_sqft: 2.0,
            caulk_lf: 50.0,
        };

        let cost = price_area(&area, &golden_settings());
        // trim 2h, tape 2.4h, plastic 2h, minor 1h, major 1h, caulk 50/30h
        assert_close(cost.labor_hours, 2.0 + 2.4 + 2.0 + 1.0 + 1.0 + 50.0 / 30.0);
        // tape 2 rolls $10, plastic 1 roll $18, caulk 1 tube $4
        assert_close(cost.prep_materials, 10.0 + 18.0 + 4.0);
        assert_close(cost.materials, 32.0 + 25.0);
    }

    #[test]
    fn test_multi_area_accumulates_unrounded() {
        // Each area alone rounds labor down; the sum must not.
        let area = Area {
            paint_ceiling: false,
            wall_coats: 0.0,
            trim_lf: 1.0,
            ..Area::room("Nook", 1.0, 1.0, 1.0)
        };
        let settings = PricingSettings {
            hourly_rate: 10.0,
            ..golden_settings()
        };

        let single = price_estimate(std::slice::from_ref(&area), &settings);
        assert_eq!(whole_units(single.labor), 0);

        let many = price_estimate(&vec![area; 5], &settings);
        assert_close(many.labor, 2.0);
        assert_eq!(many.summary().labor, 2);
    }

    #[test]
    fn test_lenient_area_parsing() {
        let area: Area = serde_json::from_value(serde_json::json!({
            "name": "Den",
            "length": "20",
            "width": 15,
            "height": " 8 ",
            "wallMethod": "SPRAY",
            "ceilingMethod": "brush",
            "wallCoats": "two",
            "paintCeiling": "yes",
            "doorsCount": null,
            "trimLf": "NaN",
            "prep": { "tapeLf": "12.5", "caulkLf": {} }
        }))
        .unwrap();

        assert_close(area.length, 20.0);
        assert_close(area.height, 8.0);
        assert_eq!(area.wall_method, PaintMethod::Spray);
        assert_eq!(area.ceiling_method, PaintMethod::Roll);
        assert_close(area.wall_coats, 0.0);
        assert_close(area.ceiling_coats, 1.0);
        assert!(area.paint_ceiling);
        assert_close(area.doors_count, 0.0);
        assert_close(area.trim_lf, 0.0);
        assert_close(area.prep.tape_lf, 12.5);
        assert_close(area.prep.caulk_lf, 0.0);
    }

    #[test]
    fn test_garbage_dimension_degrades_to_zero_quote() {
        let area: Area = serde_json::from_value(serde_json::json!({
            "length": "abc",
            "width": 15,
            "height": 8
        }))
        .unwrap();

        let quote = price_estimate(&[area], &golden_settings());
        assert_eq!(quote.summary(), QuoteTotals::default());
    }

    #[test]
    fn test_settings_input_resolution() {
        let input: SettingsInput = serde_json::from_value(serde_json::json!({
            "hourlyCost": "40",
            "markupPct": "lots",
            "taxRate": null
        }))
        .unwrap();

        let resolved = input.resolve(&golden_settings());
        assert_close(resolved.hourly_rate, 40.0);
        assert_close(resolved.markup_pct, 0.0);
        assert_close(resolved.tax_rate, 13.0);
        assert_close(resolved.paint_price_per_gallon, 42.0);
    }

    #[test]
    fn test_default_settings_match_config_defaults() {
        let settings = PricingSettings::default();
        assert_close(settings.hourly_rate, 35.0);
        assert_close(settings.markup_pct, 20.0);
        assert_close(settings.tax_rate, 13.0);
        assert_close(settings.paint_price_per_gallon, 42.0);
    }

    #[test]
    fn test_rounding_helpers() {
        assert_eq!(whole_units(849.5), 850);
        assert_eq!(whole_units(849.49), 849);
        assert_eq!(whole_units(f64::NAN), 0);
        assert_close(one_decimal(12.3333), 12.3);
    }
}
