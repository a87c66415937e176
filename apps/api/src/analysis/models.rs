//! Analysis kinds and the typed results the model must produce for each.

use std::fmt;
use std::str::FromStr;

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

/// The four supported analyses. Selects the prompt template and output schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisKind {
    Tailor,
    Match,
    SkillsGap,
    CareerPath,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 4] = [
        AnalysisKind::Tailor,
        AnalysisKind::Match,
        AnalysisKind::SkillsGap,
        AnalysisKind::CareerPath,
    ];

    /// Wire name, as used in routes.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Tailor => "tailor",
            AnalysisKind::Match => "match",
            AnalysisKind::SkillsGap => "skills-gap",
            AnalysisKind::CareerPath => "career-path",
        }
    }

    /// Prefix put in front of upstream failures shown to the user.
    pub fn failure_prefix(&self) -> &'static str {
        match self {
            AnalysisKind::Tailor => "Failed to tailor resume",
            AnalysisKind::Match => "Failed to match job",
            AnalysisKind::SkillsGap => "Failed to analyze skills gap",
            AnalysisKind::CareerPath => "Failed to get career path",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown analysis kind '{s}'"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Per-kind outputs
// ────────────────────────────────────────────────────────────────────────────

/// A typed model reply bound to exactly one `AnalysisKind`.
pub trait AnalysisOutput: DeserializeOwned + Serialize + Send + 'static {
    const KIND: AnalysisKind;

    fn into_result(self) -> AnalysisResult;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TailorOutput {
    pub tailored_bullet_points: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MatchOutput {
    pub job_match_score: MatchScore,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SkillsGapOutput {
    pub missing_skills: Vec<String>,
    pub matching_skills: Vec<String>,
    pub ats_suggestions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CareerPathOutput {
    pub suggested_certifications: Vec<String>,
    pub suggested_skills: Vec<String>,
}

impl AnalysisOutput for TailorOutput {
    const KIND: AnalysisKind = AnalysisKind::Tailor;

    fn into_result(self) -> AnalysisResult {
        AnalysisResult::Tailor(self)
    }
}

impl AnalysisOutput for MatchOutput {
    const KIND: AnalysisKind = AnalysisKind::Match;

    fn into_result(self) -> AnalysisResult {
        AnalysisResult::Match(self)
    }
}

impl AnalysisOutput for SkillsGapOutput {
    const KIND: AnalysisKind = AnalysisKind::SkillsGap;

    fn into_result(self) -> AnalysisResult {
        AnalysisResult::SkillsGap(self)
    }
}

impl AnalysisOutput for CareerPathOutput {
    const KIND: AnalysisKind = AnalysisKind::CareerPath;

    fn into_result(self) -> AnalysisResult {
        AnalysisResult::CareerPath(self)
    }
}

/// Match score, an integer in `0..=100`.
///
/// Models sometimes emit `72.0`; any JSON number with no fractional part is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MatchScore(u8);

impl MatchScore {
    pub const MAX: u8 = 100;

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }
}

impl<'de> Deserialize<'de> for MatchScore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let raw = f64::deserialize(deserializer)?;
        if !raw.is_finite() || raw.fract() != 0.0 {
            return Err(D::Error::custom(format!(
                "jobMatchScore must be an integer, got {raw}"
            )));
        }
        (0.0..=f64::from(Self::MAX))
            .contains(&raw)
            .then(|| raw as u8)
            .and_then(Self::new)
            .ok_or_else(|| {
                D::Error::custom(format!("jobMatchScore must be between 0 and 100, got {raw}"))
            })
    }
}

/// A successful analysis, keyed by kind. Serializes as the bare payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    Tailor(TailorOutput),
    Match(MatchOutput),
    SkillsGap(SkillsGapOutput),
    CareerPath(CareerPathOutput),
}

impl AnalysisResult {
    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisResult::Tailor(_) => AnalysisKind::Tailor,
            AnalysisResult::Match(_) => AnalysisKind::Match,
            AnalysisResult::SkillsGap(_) => AnalysisKind::SkillsGap,
            AnalysisResult::CareerPath(_) => AnalysisKind::CareerPath,
        }
    }
}
