//! Context extraction: turning a free-text mood query into a structured
//! interpretation the catalog search can use.

mod llm;

pub use llm::{LlmError, LlmExtractor};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// Listening contexts the model is asked to choose from.
pub const CANDIDATE_CONTEXTS: [&str; 8] = [
    "relaxing music",
    "focus music",
    "workout music",
    "sad emotional music",
    "happy upbeat music",
    "party music",
    "lofi study music",
    "chill music",
];

/// Structured reading of a mood query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextInterpretation {
    pub mood: Option<String>,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    /// One of [`CANDIDATE_CONTEXTS`], if the model picked a known one.
    pub context: Option<String>,
}

impl ContextInterpretation {
    pub fn primary_artist(&self) -> Option<&str> {
        self.artists.first().map(String::as_str)
    }
}

/// Source of context interpretations.
#[async_trait]
pub trait ContextExtractor: Send + Sync {
    /// Interpret `text` exactly as the user typed it.
    async fn extract(&self, text: &str) -> Result<ContextInterpretation, AppError>;
}

/// System prompt sent with every extraction request.
pub fn system_prompt() -> String {
    let contexts = CANDIDATE_CONTEXTS
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "You extract music listening intent from short user requests.\n\
         Reply with a single JSON object and nothing else, using exactly these keys:\n\
         \"mood\": one or two lowercase words describing the mood, or null;\n\
         \"artists\": list of artist names mentioned, spelled as the artist is known, or [];\n\
         \"genres\": list of lowercase genre names mentioned or strongly implied, or [];\n\
         \"context\": the single best match from [{contexts}], or null.\n\
         Never invent artists that the user did not mention."
    )
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Deserialize)]
struct RawInterpretation {
    #[serde(default)]
    mood: Option<String>,
    #[serde(default, alias = "artist")]
    artists: Option<OneOrMany>,
    #[serde(default, alias = "genre")]
    genres: Option<OneOrMany>,
    #[serde(default)]
    context: Option<String>,
}

/// Parses model output into an interpretation.
///
/// Accepts output wrapped in a Markdown code fence or surrounded by prose,
/// as long as it contains one JSON object.
pub fn parse_interpretation(content: &str) -> Result<ContextInterpretation, String> {
    let value = first_json_object(content)?;
    let raw: RawInterpretation =
        serde_json::from_value(value).map_err(|e| format!("invalid interpretation: {e}"))?;

    let mood = raw
        .mood
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty());

    Ok(ContextInterpretation {
        mood,
        artists: clean_list(raw.artists, false),
        genres: clean_list(raw.genres, true),
        context: raw.context.as_deref().and_then(canonical_context),
    })
}

/// First JSON value starting at the first `{`; anything after it is ignored.
fn first_json_object(content: &str) -> Result<Value, String> {
    let start = content.find('{').ok_or_else(|| {
        if content.trim().is_empty() {
            "empty completion".to_string()
        } else {
            "completion contains no JSON object".to_string()
        }
    })?;

    serde_json::Deserializer::from_str(&content[start..])
        .into_iter::<Value>()
        .next()
        .ok_or_else(|| "completion contains no JSON object".to_string())?
        .map_err(|e| format!("invalid interpretation: {e}"))
}

fn clean_list(values: Option<OneOrMany>, lowercase: bool) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values.map(OneOrMany::into_vec).unwrap_or_default() {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let value = if lowercase {
            value.to_lowercase()
        } else {
            value.to_string()
        };
        let folded = value.to_lowercase();
        if !out.iter().any(|v| v.to_lowercase() == folded) {
            out.push(value);
        }
    }
    out
}

fn canonical_context(label: &str) -> Option<String> {
    let label = label.trim();
    CANDIDATE_CONTEXTS
        .iter()
        .find(|c| c.eq_ignore_ascii_case(label))
        .map(|c| c.to_string())
}
