//! Live pricing preview for the estimate form.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::CurrentUser;
use crate::engine::pricing::{
    one_decimal, price_estimate, whole_units, Area, PricingSettings, QuoteTotals, SettingsInput,
};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    #[serde(default)]
    pub areas: Vec<Area>,
    #[serde(default)]
    pub settings: SettingsInput,
}

#[derive(Debug, Serialize)]
pub struct AreaPreview {
    pub name: String,
    pub labor_hours: f64,
    pub paint_gallons: f64,
    pub labor: i64,
    pub materials: i64,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub success: bool,
    pub settings: PricingSettings,
    pub totals: QuoteTotals,
    pub labor_hours: f64,
    pub paint_gallons: f64,
    pub areas: Vec<AreaPreview>,
}

pub async fn preview(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
    Json(request): Json<PreviewRequest>,
) -> Json<PreviewResponse> {
    let settings = request.settings.resolve(state.estimates.defaults());
    let quote = price_estimate(&request.areas, &settings);

    let areas = request
        .areas
        .iter()
        .zip(&quote.areas)
        .map(|(area, cost)| AreaPreview {
            name: area.name.clone(),
            labor_hours: one_decimal(cost.labor_hours),
            paint_gallons: one_decimal(cost.paint_gallons),
            labor: whole_units(cost.labor),
            materials: whole_units(cost.materials),
        })
        .collect();

    Json(PreviewResponse {
        success: true,
        settings,
        totals: quote.summary(),
        labor_hours: one_decimal(quote.labor_hours),
        paint_gallons: one_decimal(quote.paint_gallons),
        areas,
    })
}
