use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Minimum overall score for approval
pub const PASS_THRESHOLD: f64 = 7.0;

/// Minimum for every individual sub-score
pub const MIN_INDIVIDUAL_SCORE: f64 = 6.0;

const DEFAULT_SUB_SCORE: f64 = 5.0;

/// The critic's recommendation for a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Approve,
    Revise,
    Rewrite,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Approve => write!(f, "APPROVE"),
            Verdict::Revise => write!(f, "REVISE"),
            Verdict::Rewrite => write!(f, "REWRITE"),
        }
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "APPROVE" => Ok(Verdict::Approve),
            "REVISE" => Ok(Verdict::Revise),
            "REWRITE" => Ok(Verdict::Rewrite),
            _ => Err(format!("Unknown verdict: {}", s)),
        }
    }
}

/// Structured evaluation of one draft. Sub-scores keep the critic's raw
/// value (clamped to 1..=10) so the acceptance policy sees exact numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueResult {
    pub authenticity_score: f64,
    pub hook_score: f64,
    pub formatting_score: f64,
    pub content_value_score: f64,
    pub overall_score: f64,
    pub approved: bool,
    pub verdict: Verdict,
    #[serde(default)]
    pub issues: Vec<String>,
    /// Guidance threaded into the next generation attempt
    #[serde(default)]
    pub rewrite_direction: String,
}

#[derive(Error, Debug)]
pub enum CritiqueParseError {
    #[error("No JSON object in critique response")]
    NoPayload,

    #[error("Failed to parse critique JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Critique payload is not a JSON object")]
    NotAnObject,
}

impl CritiqueResult {
    /// Parse the critic's free-text response.
    ///
    /// The response may be wrapped in one or more code fences and surrounded by
    /// prose. The payload is the span from the first `{` to the last `}` of the
    /// first fenced block (or of the whole text when there is no block). Missing
    /// fields get defaults; a response without a decodable object is an error.
    pub fn parse(response: &str) -> Result<Self, CritiqueParseError> {
        debug!(response_len = response.len(), "Parsing critique response");

        let region = unwrap_fenced(response);
        let start = region.find('{').ok_or(CritiqueParseError::NoPayload)?;
        let end = region.rfind('}').ok_or(CritiqueParseError::NoPayload)?;
        if end <= start {
            return Err(CritiqueParseError::NoPayload);
        }

        let value: Value = serde_json::from_str(&region[start..=end])?;
        let fields = value.as_object().ok_or(CritiqueParseError::NotAnObject)?;
        Ok(Self::from_fields(fields))
    }

    fn from_fields(fields: &Map<String, Value>) -> Self {
        let authenticity_score = sub_score(fields, "authenticity_score");
        let hook_score = sub_score(fields, "hook_score");
        let formatting_score = sub_score(fields, "formatting_score");
        let content_value_score = sub_score(fields, "content_value_score");

        let mean =
            (authenticity_score + hook_score + formatting_score + content_value_score) / 4.0;
        let overall_score = number(fields, "overall_score").unwrap_or(mean);

        let min_score = authenticity_score
            .min(hook_score)
            .min(formatting_score)
            .min(content_value_score);
        let meets_threshold = Self::passes(overall_score, min_score);

        // A reported approval still has to clear the threshold
        let approved = match boolean(fields, "approved") {
            Some(reported) => reported && meets_threshold,
            None => meets_threshold,
        };

        let verdict = fields
            .get("verdict")
            .and_then(Value::as_str)
            .and_then(|v| v.parse().ok())
            .unwrap_or(if approved {
                Verdict::Approve
            } else {
                Verdict::Revise
            });

        let issues = match fields.get("issues") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
            _ => Vec::new(),
        };

        let rewrite_direction = match fields.get("rewrite_direction") {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };

        Self {
            authenticity_score,
            hook_score,
            formatting_score,
            content_value_score,
            overall_score,
            approved,
            verdict,
            issues,
            rewrite_direction,
        }
    }

    /// The acceptance policy: overall >= 7 and every sub-score >= 6
    pub fn passes(overall_score: f64, min_sub_score: f64) -> bool {
        overall_score >= PASS_THRESHOLD && min_sub_score >= MIN_INDIVIDUAL_SCORE
    }

    pub fn min_sub_score(&self) -> f64 {
        self.authenticity_score
            .min(self.hook_score)
            .min(self.formatting_score)
            .min(self.content_value_score)
    }

    pub fn meets_threshold(&self) -> bool {
        Self::passes(self.overall_score, self.min_sub_score())
    }
}

fn is_fence_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("```")
        && trimmed[3..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Body of the first fenced block. Stacked opening fences collapse into one,
/// so a doubly wrapped payload unwraps the same as a singly wrapped one.
/// Falls back to the whole text when there is no block or it holds no `{`.
fn unwrap_fenced(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let Some(open) = lines.iter().position(|l| is_fence_line(l)) else {
        return text.trim().to_string();
    };

    let mut body_start = open + 1;
    while body_start < lines.len()
        && (is_fence_line(lines[body_start]) || lines[body_start].trim().is_empty())
    {
        body_start += 1;
    }

    let body_end = lines[body_start..]
        .iter()
        .position(|l| is_fence_line(l))
        .map(|offset| body_start + offset)
        .unwrap_or(lines.len());

    let body = lines[body_start..body_end].join("\n");
    if body.contains('{') {
        body
    } else {
        text.trim().to_string()
    }
}

/// Finite numbers only; `"inf"` and `"NaN"` strings count as missing
fn number(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = match fields.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    value.is_finite().then_some(value)
}

fn sub_score(fields: &Map<String, Value>, key: &str) -> f64 {
    number(fields, key)
        .map(|v| v.clamp(1.0, 10.0))
        .unwrap_or(DEFAULT_SUB_SCORE)
}

fn boolean(fields: &Map<String, Value>, key: &str) -> Option<bool> {
    match fields.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
