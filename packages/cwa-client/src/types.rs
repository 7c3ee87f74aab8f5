use serde::{Deserialize, Deserializer, Serialize};

/// Body of `POST /api/auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// A single book candidate returned by `GET /api/search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

impl SearchResult {
    /// Title for log lines, falling back to the id.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

/// Interpreted result of a search call.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// Candidates in the order the service ranked them.
    Matches(Vec<SearchResult>),
    /// Empty result set, or the service answered with an `error` object.
    NoMatch { reason: Option<String> },
}

impl SearchOutcome {
    /// The first candidate in response order, if any.
    pub fn top(&self) -> Option<&SearchResult> {
        match self {
            SearchOutcome::Matches(results) => results.first(),
            SearchOutcome::NoMatch { .. } => None,
        }
    }
}

/// Acknowledgement from `GET /api/download`.
#[derive(Debug, Clone, Default)]
pub struct QueueAck {
    /// `status` field of the JSON body, when the service sends one.
    pub status: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
