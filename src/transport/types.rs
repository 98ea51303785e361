use serde::{Deserialize, Serialize};

/// Optional retrieval filters forwarded with every streaming query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilters {
    pub source: Option<String>,
    pub section: Option<String>,
    pub page: Option<i64>,
}

impl QueryFilters {
    /// Query-string pairs for the filters that are set
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(source) = &self.source {
            params.push(("filter_source", source.clone()));
        }
        if let Some(section) = &self.section {
            params.push(("filter_section", section.clone()));
        }
        if let Some(page) = self.page {
            params.push(("filter_page", page.to_string()));
        }
        params
    }
}

/// Everything needed to open one push channel
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub query: String,
    pub token: String,
    pub filters: QueryFilters,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AnalyzeRequest<'a> {
    pub request: &'a str,
}

/// Response of the one-shot analysis endpoint; only the answer text is kept
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct AnalyzeResponse {
    pub result: String,
}

/// Response of the server health endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub llm_provider: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
