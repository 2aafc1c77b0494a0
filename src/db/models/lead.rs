//! Lead models.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Contacted,
    Quoted,
    Won,
    Lost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Quoted => "quoted",
            LeadStatus::Won => "won",
            LeadStatus::Lost => "lost",
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Lead {
    pub async fn find_by_id(db: &SqlitePool, id: &str) -> Result<Option<Lead>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM leads WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }
}

/// Client identity captured on the estimate form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientInfo {
    #[serde(default)]
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl ClientInfo {
    /// Blank optional strings are stored as NULL
    pub fn normalized(&self) -> ClientInfo {
        fn clean(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        ClientInfo {
            name: self.name.trim().to_string(),
            email: clean(&self.email).map(|e| e.to_lowercase()),
            phone: clean(&self.phone),
            address: clean(&self.address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_info_normalization() {
        let client = ClientInfo {
            name: "  Dana Whitfield ".into(),
            email: Some(" Dana@Example.COM ".into()),
            phone: Some("   ".into()),
            address: None,
        }
        .normalized();

        assert_eq!(client.name, "Dana Whitfield");
        assert_eq!(client.email.as_deref(), Some("dana@example.com"));
        assert!(client.phone.is_none());
        assert!(client.address.is_none());
    }

    #[test]
    fn test_lead_status_strings() {
        assert_eq!(LeadStatus::Won.to_string(), "won");
        assert_eq!(
            serde_json::to_value(LeadStatus::Quoted).unwrap(),
            serde_json::json!("quoted")
        );
    }
}
