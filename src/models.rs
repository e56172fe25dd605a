use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// --- Scores ---

/// A 0-100 score. Out-of-range input is clamped, fractional input rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
    pub const MAX: u8 = 100;

    pub fn new(value: i64) -> Self {
        Self(value.clamp(0, Self::MAX as i64) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Reads a score from loosely-typed JSON: integers, floats, and numeric
    /// strings such as `"85"` or `"85%"`. Anything else is not a score.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::new(i))
                } else {
                    n.as_f64().map(Self::from_f64)
                }
            }
            Value::String(s) => s
                .trim()
                .trim_end_matches('%')
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Self::from_f64),
            _ => None,
        }
    }

    fn from_f64(value: f64) -> Self {
        Self::new(value.round().clamp(0.0, Self::MAX as f64) as i64)
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

fn lenient_score<'de, D>(deserializer: D) -> Result<Option<Score>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Score::from_json))
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

// --- Openings ---

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OpeningStatus {
    #[default]
    Active,
    Completed,
    Other(String),
}

impl From<String> for OpeningStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "active" => OpeningStatus::Active,
            "completed" => OpeningStatus::Completed,
            _ => OpeningStatus::Other(value),
        }
    }
}

impl From<OpeningStatus> for String {
    fn from(value: OpeningStatus) -> Self {
        value.as_str().to_string()
    }
}

impl OpeningStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OpeningStatus::Active => "active",
            OpeningStatus::Completed => "completed",
            OpeningStatus::Other(s) => s,
        }
    }
}

impl Serialize for OpeningStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OpeningStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?
            .map(OpeningStatus::from)
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOpening {
    pub id: i64,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default, deserialize_with = "non_blank")]
    pub ctc: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub location: Option<String>,
    #[serde(default)]
    pub drive_date: Option<String>,
    #[serde(default)]
    pub registration_deadline: Option<String>,
    #[serde(default)]
    pub status: OpeningStatus,
}

impl JobOpening {
    pub fn drive_date_label(&self) -> Option<String> {
        self.drive_date.as_deref().map(format_portal_date)
    }
}

/// Renders an ISO date or datetime from the portal as `YYYY-MM-DD`,
/// passing through anything it cannot parse.
pub fn format_portal_date(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.date().format("%Y-%m-%d").to_string();
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return dt.date_naive().format("%Y-%m-%d").to_string();
    }
    if let Ok(d) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.format("%Y-%m-%d").to_string();
    }
    raw.to_string()
}

// --- Analysis payload ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub match_analysis: Option<MatchAnalysis>,
    #[serde(default)]
    pub ats_analysis: Option<AtsAnalysis>,
    #[serde(default, deserialize_with = "skills_gap_with_raw")]
    pub skills_gap: Option<SkillsGap>,
    #[serde(default)]
    pub personalized_content: Option<PersonalizedContent>,
    #[serde(default, rename = "personalized_resume_pdf", deserialize_with = "artifact_ref")]
    pub artifact_ref: Option<ArtifactRef>,
    #[serde(default)]
    pub company_research: Option<CompanyResearch>,
}

impl AnalysisResult {
    pub fn match_score(&self) -> Option<Score> {
        self.match_analysis.as_ref().and_then(|m| m.overall_match_score)
    }

    pub fn ats_score(&self) -> Option<Score> {
        self.ats_analysis.as_ref().and_then(|a| a.ats_score)
    }

    pub fn skills_score(&self) -> Option<Score> {
        self.match_analysis
            .as_ref()
            .and_then(|m| m.skills_match.as_ref())
            .and_then(|s| s.score)
    }

    pub fn readiness(&self) -> Option<&str> {
        self.skills_gap
            .as_ref()
            .and_then(|g| g.overall_readiness.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn artifact_ref<'de, D>(deserializer: D) -> Result<Option<ArtifactRef>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_blank(deserializer)?.map(ArtifactRef))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchAnalysis {
    #[serde(default, deserialize_with = "lenient_score")]
    pub overall_match_score: Option<Score>,
    #[serde(default)]
    pub skills_match: Option<SkillsMatch>,
    #[serde(default)]
    pub experience_fit: Option<FitComponent>,
    #[serde(default)]
    pub cultural_fit: Option<FitComponent>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub improvement_areas: Vec<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub recommendation: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillsMatch {
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: Option<Score>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub matching_skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub missing_skills: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FitComponent {
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: Option<Score>,
    #[serde(default, deserialize_with = "non_blank")]
    pub assessment: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AtsAnalysis {
    #[serde(default, deserialize_with = "lenient_score")]
    pub ats_score: Option<Score>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub keyword_match_percentage: Option<Score>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub matched_keywords: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub missing_keywords: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub formatting_issues: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub suggestions: Vec<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub overall_assessment: Option<String>,
}

/// Typed view of the skills-gap section. The payload it was read from is kept
/// alongside so the application echoes the section byte-for-byte.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillsGap {
    #[serde(default)]
    pub overall_readiness: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub critical_gaps: Vec<CriticalGap>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub quick_wins: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub existing_strengths: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub long_term_development: Vec<String>,
    #[serde(skip)]
    pub(crate) raw: Option<Value>,
}

impl SkillsGap {
    pub fn to_wire(&self) -> Value {
        match &self.raw {
            Some(raw) => raw.clone(),
            None => serde_json::to_value(self).unwrap_or(Value::Null),
        }
    }
}

fn skills_gap_with_raw<'de, D>(deserializer: D) -> Result<Option<SkillsGap>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let mut gap =
        SkillsGap::deserialize(&raw).map_err(<D::Error as serde::de::Error>::custom)?;
    gap.raw = Some(raw);
    Ok(Some(gap))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticalGap {
    #[serde(default)]
    pub skill: String,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default)]
    pub estimated_time: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub learning_resources: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Importance {
    Critical,
    #[default]
    Unspecified,
    Other(String),
}

impl Importance {
    pub fn is_critical(&self) -> bool {
        matches!(self, Importance::Critical)
    }

    pub fn label(&self) -> &str {
        match self {
            Importance::Critical => "Critical",
            Importance::Unspecified => "",
            Importance::Other(s) => s,
        }
    }
}

impl Serialize for Importance {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Importance::Unspecified => serializer.serialize_none(),
            other => serializer.serialize_str(other.label()),
        }
    }
}

impl<'de> Deserialize<'de> for Importance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<String>::deserialize(deserializer)? {
            Some(s) if s == "Critical" => Importance::Critical,
            Some(s) if !s.trim().is_empty() => Importance::Other(s),
            _ => Importance::Unspecified,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalizedContent {
    #[serde(default, deserialize_with = "non_blank")]
    pub branding_headline: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub professional_summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub key_highlights: Vec<String>,
    #[serde(default)]
    pub skills_section: Option<SkillsSection>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub experience_section: Vec<ExperienceEntry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub projects_section: Vec<ProjectEntry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub education_section: Vec<EducationEntry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub tailoring_notes: Option<TailoringNotes>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillsSection {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub primary_skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub secondary_skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tooling: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperienceEntry {
    #[serde(default, deserialize_with = "non_blank")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub duration: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub impact_bullets: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tech_stack: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "non_blank")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub impact_bullets: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tech_stack: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EducationEntry {
    #[serde(default)]
    pub degree: String,
    #[serde(default)]
    pub institution: String,
    #[serde(default, deserialize_with = "non_blank")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TailoringNotes {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub culture_fit: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub interview_talking_points: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ats_keywords: Vec<String>,
}

impl TailoringNotes {
    pub fn is_empty(&self) -> bool {
        self.culture_fit.is_empty()
            && self.interview_talking_points.is_empty()
            && self.ats_keywords.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyResearch {
    #[serde(default, deserialize_with = "non_blank")]
    pub company_overview: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub industry: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub company_size: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub work_environment: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub culture_values: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tech_stack: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub key_facts: Vec<String>,
    #[serde(default)]
    pub role_insights: Option<RoleInsights>,
    #[serde(default)]
    pub tailoring_recommendations: Option<TailoringRecommendations>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub source_notes: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub recent_news: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleInsights {
    #[serde(default, deserialize_with = "non_blank")]
    pub role_summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub key_responsibilities: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub success_profile: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub emerging_trends: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TailoringRecommendations {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub resume_focus: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub culture_alignment: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub project_highlights: Vec<String>,
}

// --- Application ---

/// Body of `POST /ai/apply/{id}`. The opening id travels in the path and is
/// kept here for logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationSubmission {
    #[serde(skip)]
    pub opening_id: i64,
    pub match_score: Option<Score>,
    pub ats_score: Option<Score>,
    pub skills_gap: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personalized_resume_path: Option<ArtifactRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Acknowledgement {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub application_id: Option<i64>,
    #[serde(default)]
    pub used_personalized_resume: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationRecord {
    pub id: i64,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_score")]
    pub match_score: Option<Score>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub ats_score: Option<Score>,
    #[serde(default)]
    pub applied_at: Option<String>,
}

// --- Student profile ---

#[derive(Debug, Clone, Deserialize)]
pub struct StudentProfile {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enrollment_no: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub cgpa: Option<f64>,
    #[serde(default, deserialize_with = "non_blank")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub resume_path: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub skills: Vec<String>,
    #[serde(default)]
    pub is_approved: bool,
}

/// Body of `PUT /student/profile`. Only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cgpa: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.cgpa.is_none() && self.phone.is_none() && self.skills.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResumeUpload {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub resume_path: String,
}
