use serde::{Deserialize, Serialize};

/// Form posted to create a short link.
#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedLink {
    /// Path of the short link, e.g. `/47DEQpj`.
    pub short_link: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
