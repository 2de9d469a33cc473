use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::lenient::{self, FromText};

/// Upper bound of the 0–10 quality score.
pub const MAX_SCORE: u8 = 10;

const FAILED_RATIONALE: &str = "Validation failed due to technical issues";
const FAILED_RECOMMENDATION: &str = "Review analysis manually due to validation failure";

/// Critique of a draft analysis against the extracted record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    #[serde(default, deserialize_with = "lenient::objects")]
    pub hallucinations: Vec<Hallucination>,
    #[serde(default, deserialize_with = "lenient::objects")]
    pub missing_info: Vec<MissingInfo>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub overall_assessment: Assessment,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub recommendations: Vec<String>,
}

impl FromText for ValidationReport {}

impl ValidationReport {
    /// Neutral report used when the validation stage cannot produce one.
    pub fn neutral() -> Self {
        Self {
            hallucinations: vec![],
            missing_info: vec![],
            overall_assessment: Assessment {
                score: None,
                rationale: Some(FAILED_RATIONALE.to_string()),
            },
            recommendations: vec![FAILED_RECOMMENDATION.to_string()],
        }
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn score(&self) -> Option<u8> {
        self.overall_assessment.score
    }

    pub fn rationale(&self) -> Option<&str> {
        self.overall_assessment.rationale.as_deref()
    }

    pub fn issue_count(&self) -> usize {
        self.hallucinations.len() + self.missing_info.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hallucination {
    #[serde(default, with = "lenient::text")]
    pub field: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub incorrect: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub correct: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub evidence: Option<String>,
}

impl FromText for Hallucination {
    fn from_text(text: String) -> Option<Self> {
        Some(Self { incorrect: Some(text), ..Default::default() })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissingInfo {
    #[serde(default, with = "lenient::text")]
    pub field: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub missing: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub evidence: Option<String>,
}

impl FromText for MissingInfo {
    fn from_text(text: String) -> Option<Self> {
        Some(Self { missing: Some(text), ..Default::default() })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    #[serde(default, deserialize_with = "deserialize_score")]
    pub score: Option<u8>,
    #[serde(default, deserialize_with = "deserialize_rationale")]
    pub rationale: Option<String>,
}

impl FromText for Assessment {
    fn from_text(text: String) -> Option<Self> {
        Some(Self { score: None, rationale: Some(text) })
    }
}

fn deserialize_rationale<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(lenient::value_to_text(&value))
}

/// Accepts `7`, `7.4`, `"7"` and `"7/10"`; anything outside 0..=10 is absent.
fn deserialize_score<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u8>, D::Error> {
    let value = Value::deserialize(d)?;
    let raw = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .split('/')
            .next()
            .and_then(|head| head.trim().parse::<f64>().ok()),
        _ => None,
    };
    Ok(raw
        .filter(|v| v.is_finite())
        .map(f64::round)
        .filter(|v| (0.0..=f64::from(MAX_SCORE)).contains(v))
        .map(|v| v as u8))
}
