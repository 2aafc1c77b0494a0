//! Estimate models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::lead::ClientInfo;
use crate::engine::pricing::{
    one_decimal, whole_units, Area, PricingSettings, QuoteTotals, SettingsInput,
};

/// Estimate lifecycle: draft → sent → approved | rejected | expired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
    Expired,
}

impl EstimateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateStatus::Draft => "draft",
            EstimateStatus::Sent => "sent",
            EstimateStatus::Approved => "approved",
            EstimateStatus::Rejected => "rejected",
            EstimateStatus::Expired => "expired",
        }
    }

    /// Approval is a separate, owner-gated operation and never goes through here
    pub fn can_transition_to(&self, next: EstimateStatus) -> bool {
        matches!(
            (self, next),
            (EstimateStatus::Draft, EstimateStatus::Sent)
                | (EstimateStatus::Draft, EstimateStatus::Expired)
                | (EstimateStatus::Sent, EstimateStatus::Rejected)
                | (EstimateStatus::Sent, EstimateStatus::Expired)
        )
    }
}

impl std::fmt::Display for EstimateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EstimateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(EstimateStatus::Draft),
            "sent" => Ok(EstimateStatus::Sent),
            "approved" => Ok(EstimateStatus::Approved),
            "rejected" => Ok(EstimateStatus::Rejected),
            "expired" => Ok(EstimateStatus::Expired),
            _ => Err(format!("Unknown estimate status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Estimate {
    pub id: String,
    pub lead_id: String,
    pub project_title: String,
    pub project_description: Option<String>,
    /// JSON array of pricing areas
    pub areas: String,
    pub tax_rate: f64,
    pub hourly_rate: f64,
    pub markup_pct: f64,
    pub paint_price_per_gallon: f64,
    pub labor_hours: f64,
    pub paint_gallons: f64,
    pub labor_total: f64,
    pub materials_total: f64,
    pub markup_total: f64,
    pub subtotal: f64,
    pub tax_total: f64,
    pub total: f64,
    pub status: String,
    pub created_by: Option<String>,
    pub sent_at: Option<String>,
    pub approved_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Estimate {
    /// Unknown stored statuses are treated as drafts
    pub fn status_enum(&self) -> EstimateStatus {
        self.status.parse().unwrap_or(EstimateStatus::Draft)
    }

    pub fn parsed_areas(&self) -> Vec<Area> {
        serde_json::from_str(&self.areas).unwrap_or_default()
    }

    pub fn settings(&self) -> PricingSettings {
        PricingSettings {
            tax_rate: self.tax_rate,
            hourly_rate: self.hourly_rate,
            markup_pct: self.markup_pct,
            paint_price_per_gallon: self.paint_price_per_gallon,
        }
    }

    pub fn totals(&self) -> QuoteTotals {
        QuoteTotals {
            labor: whole_units(self.labor_total),
            materials: whole_units(self.materials_total),
            subtotal: whole_units(self.subtotal),
            markup: whole_units(self.markup_total),
            subtotal_with_markup: whole_units(self.subtotal + self.markup_total),
            tax: whole_units(self.tax_total),
            total: whole_units(self.total),
        }
    }

    pub async fn find_by_id(db: &SqlitePool, id: &str) -> Result<Option<Estimate>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM estimates WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }
}

/// Estimate as returned by the API, with totals in whole currency units
#[derive(Debug, Clone, Serialize)]
pub struct EstimateResponse {
    pub id: String,
    pub lead_id: String,
    pub project_title: String,
    pub project_description: Option<String>,
    pub status: String,
    pub areas: Vec<Area>,
    pub settings: PricingSettings,
    pub totals: QuoteTotals,
    pub labor_hours: f64,
    pub paint_gallons: f64,
    pub sent_at: Option<String>,
    pub approved_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Estimate> for EstimateResponse {
    fn from(estimate: Estimate) -> Self {
        Self {
            areas: estimate.parsed_areas(),
            settings: estimate.settings(),
            totals: estimate.totals(),
            labor_hours: one_decimal(estimate.labor_hours),
            paint_gallons: one_decimal(estimate.paint_gallons),
            id: estimate.id,
            lead_id: estimate.lead_id,
            project_title: estimate.project_title,
            project_description: estimate.project_description,
            status: estimate.status,
            sent_at: estimate.sent_at,
            approved_at: estimate.approved_at,
            created_at: estimate.created_at,
            updated_at: estimate.updated_at,
        }
    }
}

/// Request to save a new estimate; totals are always recomputed server-side
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEstimateRequest {
    /// Attach to an existing lead instead of creating one from `client`
    pub lead_id: Option<String>,
    #[serde(default)]
    pub client: ClientInfo,
    #[serde(default)]
    pub project_title: String,
    pub project_description: Option<String>,
    #[serde(default)]
    pub areas: Vec<Area>,
    #[serde(default)]
    pub settings: SettingsInput,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEstimateStatusRequest {
    #[serde(default)]
    pub status: String,
}
