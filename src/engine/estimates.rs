//! Estimate workflow: save priced estimates, move them through their
//! lifecycle, and turn approved ones into projects.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::pricing::{price_estimate, PricingSettings};
use crate::db::{
    now_timestamp, CreateEstimateRequest, DbPool, Estimate, EstimateStatus, Lead, LeadStatus,
    Project, ProjectStatus,
};
use crate::notifications::SystemEmailService;
use crate::validation::{validate_email, validate_name, validate_phone};

#[derive(Error, Debug)]
pub enum EstimateError {
    /// Field name to messages
    #[error("Validation failed")]
    Validation(HashMap<String, Vec<String>>),

    #[error("Estimate not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for EstimateError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        EstimateError::Internal("database error".to_string())
    }
}

impl EstimateError {
    fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.into()]);
        EstimateError::Validation(errors)
    }
}

pub type EstimateResult<T> = Result<T, EstimateError>;

#[derive(Clone)]
pub struct EstimateService {
    db: DbPool,
    email: Arc<SystemEmailService>,
    defaults: PricingSettings,
}

impl EstimateService {
    pub fn new(db: DbPool, email: Arc<SystemEmailService>, defaults: PricingSettings) -> Self {
        Self { db, email, defaults }
    }

    pub fn defaults(&self) -> &PricingSettings {
        &self.defaults
    }

    /// Price and save a new draft estimate, creating its lead when needed.
    /// Client-supplied totals are never trusted; everything is recomputed.
    pub async fn create(
        &self,
        created_by: &str,
        request: CreateEstimateRequest,
    ) -> EstimateResult<Estimate> {
        let client = request.client.normalized();
        let lead_id = request
            .lead_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let mut errors: HashMap<String, Vec<String>> = HashMap::new();
        let mut add = |field: &str, message: String| {
            errors.entry(field.to_string()).or_default().push(message);
        };

        if lead_id.is_none() {
            if let Err(e) = validate_name(&client.name, "Client name") {
                add("client.name", e);
            }
            if let Some(email) = &client.email {
                if let Err(e) = validate_email(email) {
                    add("client.email", e);
                }
            }
            if let Err(e) = validate_phone(&client.phone) {
                add("client.phone", e);
            }
        }
        if let Err(e) = validate_name(&request.project_title, "Project title") {
            add("projectTitle", e);
        }
        if request.areas.is_empty() {
            add("areas", "At least one area is required".to_string());
        }
        if !errors.is_empty() {
            return Err(EstimateError::Validation(errors));
        }

        let settings = request.settings.resolve(&self.defaults);
        let quote = price_estimate(&request.areas, &settings);
        let areas_json = serde_json::to_string(&request.areas)
            .map_err(|e| EstimateError::Internal(format!("Failed to encode areas: {}", e)))?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        let mut tx = self.db.begin().await?;

        let lead_id = match lead_id {
            Some(existing) => {
                sqlx::query(
                    "UPDATE leads SET status = ?, updated_at = ? WHERE id = ? AND status IN ('new', 'contacted')",
                )
                .bind(LeadStatus::Quoted.as_str())
                .bind(&now)
                .bind(existing)
                .execute(&mut *tx)
                .await?;

                let lead: Option<Lead> = sqlx::query_as("SELECT * FROM leads WHERE id = ?")
                    .bind(existing)
                    .fetch_optional(&mut *tx)
                    .await?;
                let lead = lead.ok_or_else(|| EstimateError::field("leadId", "Lead not found"))?;
                lead.id
            }
            None => {
                let new_lead_id = uuid::Uuid::new_v4().to_string();
                sqlx::query(
                    r#"
                    INSERT INTO leads (id, name, email, phone, address, status, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&new_lead_id)
                .bind(&client.name)
                .bind(&client.email)
                .bind(&client.phone)
                .bind(&client.address)
                .bind(LeadStatus::Quoted.as_str())
                .bind(&now)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
                new_lead_id
            }
        };

        sqlx::query(
            r#"
            INSERT INTO estimates (
                id, lead_id, project_title, project_description, areas,
                tax_rate, hourly_rate, markup_pct, paint_price_per_gallon,
                labor_hours, paint_gallons, labor_total, materials_total, markup_total,
                subtotal, tax_total, total, status, created_by, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&lead_id)
        .bind(request.project_title.trim())
        .bind(
            request
                .project_description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty()),
        )
        .bind(&areas_json)
        .bind(settings.tax_rate)
        .bind(settings.hourly_rate)
        .bind(settings.markup_pct)
        .bind(settings.paint_price_per_gallon)
        .bind(quote.labor_hours)
        .bind(quote.paint_gallons)
        .bind(quote.labor)
        .bind(quote.materials)
        .bind(quote.markup)
        .bind(quote.subtotal)
        .bind(quote.tax)
        .bind(quote.total)
        .bind(EstimateStatus::Draft.as_str())
        .bind(created_by)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            estimate_id = %id,
            lead_id = %lead_id,
            areas = request.areas.len(),
            total = quote.total,
            "Estimate created"
        );

        self.get(&id).await
    }

    pub async fn get(&self, id: &str) -> EstimateResult<Estimate> {
        Estimate::find_by_id(&self.db, id)
            .await?
            .ok_or(EstimateError::NotFound)
    }

    /// Move an estimate along its lifecycle. Approval has its own operation.
    pub async fn update_status(&self, id: &str, status: &str) -> EstimateResult<Estimate> {
        let next: EstimateStatus = status
            .parse()
            .map_err(|e: String| EstimateError::field("status", e))?;
        if next == EstimateStatus::Approved {
            return Err(EstimateError::field(
                "status",
                "Use the approve action to approve an estimate",
            ));
        }

        let estimate = self.get(id).await?;
        let current = estimate.status_enum();
        if !current.can_transition_to(next) {
            return Err(EstimateError::Conflict(format!(
                "Cannot move estimate from {} to {}",
                current, next
            )));
        }

        let now = now_timestamp();
        let sent_at = if next == EstimateStatus::Sent {
            Some(now.clone())
        } else {
            estimate.sent_at.clone()
        };

        let result = sqlx::query(
            "UPDATE estimates SET status = ?, sent_at = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(next.as_str())
        .bind(&sent_at)
        .bind(&now)
        .bind(id)
        .bind(current.as_str())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EstimateError::Conflict(
                "Estimate was modified concurrently".to_string(),
            ));
        }

        tracing::info!(estimate_id = %id, from = %current, to = %next, "Estimate status updated");

        let updated = self.get(id).await?;
        if next == EstimateStatus::Sent {
            self.notify_client(&updated).await;
        }
        Ok(updated)
    }

    /// Approve an estimate and create its project in one transaction.
    ///
    /// The guarded status flip is the first statement, so the transaction
    /// holds the write lock before it reads anything. Of two concurrent
    /// approvals exactly one creates a project.
    pub async fn approve(&self, id: &str) -> EstimateResult<Project> {
        let now = now_timestamp();
        let mut tx = self.db.begin().await?;

        let claimed = sqlx::query(
            "UPDATE estimates SET status = 'approved', approved_at = ?, updated_at = ? WHERE id = ? AND status IN ('draft', 'sent')",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let estimate: Option<Estimate> = sqlx::query_as("SELECT * FROM estimates WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let estimate = estimate.ok_or(EstimateError::NotFound)?;

        if claimed.rows_affected() == 0 {
            return Err(EstimateError::Conflict(format!(
                "Estimate is {} and cannot be approved",
                estimate.status_enum()
            )));
        }

        let project = Project {
            id: uuid::Uuid::new_v4().to_string(),
            estimate_id: estimate.id.clone(),
            lead_id: estimate.lead_id.clone(),
            project_name: estimate.project_title.clone(),
            status: ProjectStatus::Scheduled.as_str().to_string(),
            contract_amount: estimate.total,
            created_at: now.clone(),
            updated_at: now.clone(),
        };

        sqlx::query(
            r#"
            INSERT INTO projects (id, estimate_id, lead_id, project_name, status, contract_amount, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&project.id)
        .bind(&project.estimate_id)
        .bind(&project.lead_id)
        .bind(&project.project_name)
        .bind(&project.status)
        .bind(project.contract_amount)
        .bind(&project.created_at)
        .bind(&project.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                EstimateError::Conflict("A project already exists for this estimate".to_string())
            }
            _ => EstimateError::from(e),
        })?;

        sqlx::query("UPDATE leads SET status = ?, updated_at = ? WHERE id = ?")
            .bind(LeadStatus::Won.as_str())
            .bind(&now)
            .bind(&estimate.lead_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            estimate_id = %estimate.id,
            project_id = %project.id,
            contract_amount = project.contract_amount,
            "Estimate approved"
        );

        Ok(project)
    }

    /// Email the client a summary. Failures are logged, never surfaced.
    async fn notify_client(&self, estimate: &Estimate) {
        let lead = match Lead::find_by_id(&self.db, &estimate.lead_id).await {
            Ok(Some(lead)) => lead,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(estimate_id = %estimate.id, error = %e, "Could not load lead for estimate email");
                return;
            }
        };
        let Some(address) = lead.email.as_deref() else {
            tracing::debug!(estimate_id = %estimate.id, "Lead has no email, skipping estimate email");
            return;
        };

        if let Err(e) = self
            .email
            .send_estimate_email(address, &lead.name, &estimate.project_title, &estimate.totals())
            .await
        {
            tracing::warn!(estimate_id = %estimate.id, error = %e, "Failed to send estimate email");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailConfig;
    use crate::engine::pricing::{Area, SettingsInput};
    use crate::db::ClientInfo;

    struct Fixture {
        db: DbPool,
        service: EstimateService,
        user_id: String,
    }

    async fn fixture() -> Fixture {
        fixture_on(crate::db::connect_in_memory().await.unwrap()).await
    }

    async fn fixture_on(db: DbPool) -> Fixture {
        let user_id = "u-estimator".to_string();
        let now = now_timestamp();
        sqlx::query(
            "INSERT INTO auth_users (id, username, password_hash, role, created_at, updated_at) VALUES (?, 'est', 'x', 'estimator', ?, ?)",
        )
        .bind(&user_id)
        .bind(&now)
        .bind(&now)
        .execute(&db)
        .await
        .unwrap();

        let service = EstimateService::new(
            db.clone(),
            Arc::new(SystemEmailService::new(EmailConfig::default())),
            PricingSettings::default(),
        );
        Fixture { db, service, user_id }
    }

    fn living_room_request() -> CreateEstimateRequest {
        CreateEstimateRequest {
            lead_id: None,
            client: ClientInfo {
                name: "Dana Whitfield".into(),
                email: Some("dana@example.com".into()),
                phone: None,
                address: Some("12 Elm St".into()),
            },
            project_title: "Living room repaint".into(),
            project_description: None,
            areas: vec![Area::room("Living", 20.0, 15.0, 8.0)],
            settings: SettingsInput::default(),
        }
    }

    async fn project_count(db: &DbPool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM projects")
            .fetch_one(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_prices_and_saves_draft() {
        let f = fixture().await;
        let estimate = f
            .service
            .create(&f.user_id, living_room_request())
            .await
            .unwrap();

        assert_eq!(estimate.status_enum(), EstimateStatus::Draft);
        assert_eq!(estimate.created_by.as_deref(), Some(f.user_id.as_str()));
        let totals = estimate.totals();
        assert_eq!(totals.labor, 432);
        assert_eq!(totals.materials, 195);
        assert_eq!(totals.markup, 125);
        assert_eq!(totals.tax, 98);
        assert_eq!(totals.total, 850);
        assert_eq!(estimate.parsed_areas().len(), 1);

        let lead = Lead::find_by_id(&f.db, &estimate.lead_id).await.unwrap().unwrap();
        assert_eq!(lead.name, "Dana Whitfield");
        assert_eq!(lead.status, "quoted");
    }

    #[tokio::test]
    async fn test_create_validation_writes_nothing() {
        let f = fixture().await;
        let mut request = living_room_request();
        request.client.name = "  ".into();
        request.areas.clear();

        match f.service.create(&f.user_id, request).await {
            Err(EstimateError::Validation(errors)) => {
                assert!(errors.contains_key("client.name"));
                assert!(errors.contains_key("areas"));
            }
            other => panic!("expected validation error, got {:?}", other.map(|e| e.id)),
        }

        let leads: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
            .fetch_one(&f.db)
            .await
            .unwrap();
        assert_eq!(leads, 0);
    }

    #[tokio::test]
    async fn test_create_for_unknown_lead_fails() {
        let f = fixture().await;
        let mut request = living_room_request();
        request.lead_id = Some("missing".into());

        let err = f.service.create(&f.user_id, request).await.unwrap_err();
        assert!(matches!(err, EstimateError::Validation(ref e) if e.contains_key("leadId")));
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let f = fixture().await;
        let estimate = f.service.create(&f.user_id, living_room_request()).await.unwrap();

        let sent = f.service.update_status(&estimate.id, "sent").await.unwrap();
        assert_eq!(sent.status, "sent");
        assert!(sent.sent_at.is_some());

        let back = f.service.update_status(&estimate.id, "draft").await.unwrap_err();
        assert!(matches!(back, EstimateError::Conflict(_)));

        let approve = f.service.update_status(&estimate.id, "approved").await.unwrap_err();
        assert!(matches!(approve, EstimateError::Validation(_)));

        let rejected = f.service.update_status(&estimate.id, "rejected").await.unwrap();
        assert_eq!(rejected.status, "rejected");

        let missing = f.service.update_status("nope", "sent").await.unwrap_err();
        assert!(matches!(missing, EstimateError::NotFound));
    }

    #[tokio::test]
    async fn test_approve_creates_project_and_wins_lead() {
        let f = fixture().await;
        let estimate = f.service.create(&f.user_id, living_room_request()).await.unwrap();

        let project = f.service.approve(&estimate.id).await.unwrap();
        assert_eq!(project.status, "scheduled");
        assert_eq!(project.project_name, "Living room repaint");
        assert!((project.contract_amount - estimate.total).abs() < 1e-9);

        let approved = f.service.get(&estimate.id).await.unwrap();
        assert_eq!(approved.status_enum(), EstimateStatus::Approved);
        assert!(approved.approved_at.is_some());

        let lead = Lead::find_by_id(&f.db, &estimate.lead_id).await.unwrap().unwrap();
        assert_eq!(lead.status, "won");

        let stored: Project = sqlx::query_as("SELECT * FROM projects WHERE estimate_id = ?")
            .bind(&estimate.id)
            .fetch_one(&f.db)
            .await
            .unwrap();
        assert_eq!(stored.id, project.id);
    }

    #[tokio::test]
    async fn test_double_approval_conflicts() {
        let f = fixture().await;
        let estimate = f.service.create(&f.user_id, living_room_request()).await.unwrap();

        f.service.approve(&estimate.id).await.unwrap();
        let err = f.service.approve(&estimate.id).await.unwrap_err();

        assert!(matches!(err, EstimateError::Conflict(_)));
        assert_eq!(project_count(&f.db).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_approvals_create_one_project() {
        let dir = tempfile::tempdir().unwrap();
        let f = fixture_on(crate::db::init(dir.path()).await.unwrap()).await;
        let estimate = f.service.create(&f.user_id, living_room_request()).await.unwrap();

        let (first, second) = tokio::join!(
            f.service.approve(&estimate.id),
            f.service.approve(&estimate.id)
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(EstimateError::Conflict(_)))));
        assert_eq!(project_count(&f.db).await, 1);
    }

    #[tokio::test]
    async fn test_rejected_estimate_cannot_be_approved() {
        let f = fixture().await;
        let estimate = f.service.create(&f.user_id, living_room_request()).await.unwrap();
        f.service.update_status(&estimate.id, "sent").await.unwrap();
        f.service.update_status(&estimate.id, "rejected").await.unwrap();

        let err = f.service.approve(&estimate.id).await.unwrap_err();
        assert!(matches!(err, EstimateError::Conflict(_)));
        assert_eq!(project_count(&f.db).await, 0);

        let missing = f.service.approve("nope").await.unwrap_err();
        assert!(matches!(missing, EstimateError::NotFound));
    }

    #[tokio::test]
    async fn test_second_estimate_for_existing_lead() {
        let f = fixture().await;
        let first = f.service.create(&f.user_id, living_room_request()).await.unwrap();

        let mut request = living_room_request();
        request.lead_id = Some(first.lead_id.clone());
        request.client = ClientInfo::default();
        request.project_title = "Basement".into();
        request.settings = SettingsInput {
            markup_pct: Some(0.0),
            ..SettingsInput::default()
        };

        let second = f.service.create(&f.user_id, request).await.unwrap();
        assert_eq!(second.lead_id, first.lead_id);
        assert_eq!(second.markup_pct, 0.0);
        assert_eq!(second.totals().markup, 0);
    }
}
