use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    /// Whether an identity client could be built from configuration
    pub identity_configured: bool,
    pub version: String,
}
