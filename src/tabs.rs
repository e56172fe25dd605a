use anyhow::{anyhow, Result};
use std::str::FromStr;

use crate::models::{
    AnalysisResult, AtsAnalysis, CompanyResearch, CriticalGap, FitComponent, PersonalizedContent,
    Score,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnalysisTab {
    #[default]
    Overview,
    Match,
    SkillsGap,
    Resume,
    Company,
}

impl AnalysisTab {
    pub const ORDER: [AnalysisTab; 5] = [
        AnalysisTab::Overview,
        AnalysisTab::Match,
        AnalysisTab::SkillsGap,
        AnalysisTab::Resume,
        AnalysisTab::Company,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AnalysisTab::Overview => "Overview",
            AnalysisTab::Match => "Match Analysis",
            AnalysisTab::SkillsGap => "Skills Gap",
            AnalysisTab::Resume => "AI Resume",
            AnalysisTab::Company => "Company Intel",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            AnalysisTab::Overview => "overview",
            AnalysisTab::Match => "match",
            AnalysisTab::SkillsGap => "skills",
            AnalysisTab::Resume => "resume",
            AnalysisTab::Company => "company",
        }
    }

    fn index(self) -> usize {
        Self::ORDER.iter().position(|t| *t == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ORDER[(self.index() + 1) % Self::ORDER.len()]
    }

    pub fn prev(self) -> Self {
        Self::ORDER[(self.index() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

impl FromStr for AnalysisTab {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = match s.trim().to_lowercase().as_str() {
            "skills-gap" | "gap" => "skills".to_string(),
            other => other.to_string(),
        };
        Self::ORDER
            .into_iter()
            .find(|tab| tab.key() == wanted)
            .ok_or_else(|| {
                let keys: Vec<&str> = Self::ORDER.iter().map(|t| t.key()).collect();
                anyhow!("Unknown tab '{}'. Available: {}", s.trim(), keys.join(", "))
            })
    }
}

static NO_RESEARCH: CompanyResearch = CompanyResearch {
    company_overview: None,
    industry: None,
    company_size: None,
    work_environment: None,
    culture_values: Vec::new(),
    tech_stack: Vec::new(),
    key_facts: Vec::new(),
    role_insights: None,
    tailoring_recommendations: None,
    source_notes: Vec::new(),
    recent_news: Vec::new(),
};

#[derive(Debug, Clone, Copy)]
pub struct OverviewSlice<'a> {
    pub match_score: Option<Score>,
    pub ats_score: Option<Score>,
    pub skills_score: Option<Score>,
    pub strengths: &'a [String],
    pub recommendation: Option<&'a str>,
}

#[derive(Debug, Clone, Copy)]
pub struct MatchSlice<'a> {
    pub skills_score: Option<Score>,
    pub matching_skills: &'a [String],
    pub missing_skills: &'a [String],
    pub experience_fit: Option<&'a FitComponent>,
    pub cultural_fit: Option<&'a FitComponent>,
    pub improvement_areas: &'a [String],
    pub ats: Option<&'a AtsAnalysis>,
}

#[derive(Debug, Clone, Copy)]
pub struct SkillsGapSlice<'a> {
    pub readiness: Option<&'a str>,
    pub critical_gaps: &'a [CriticalGap],
    pub quick_wins: &'a [String],
}

#[derive(Debug, Clone, Copy)]
pub enum ResumeSlice<'a> {
    /// `personalized_content` has not arrived yet. Not an error.
    Generating,
    Ready(&'a PersonalizedContent),
}

#[derive(Debug, Clone, Copy)]
pub enum TabContent<'a> {
    Overview(OverviewSlice<'a>),
    Match(MatchSlice<'a>),
    SkillsGap(SkillsGapSlice<'a>),
    Resume(ResumeSlice<'a>),
    Company(&'a CompanyResearch),
}

pub fn slice(tab: AnalysisTab, result: &AnalysisResult) -> TabContent<'_> {
    let matching = result.match_analysis.as_ref();
    let skills = matching.and_then(|m| m.skills_match.as_ref());
    match tab {
        AnalysisTab::Overview => TabContent::Overview(OverviewSlice {
            match_score: result.match_score(),
            ats_score: result.ats_score(),
            skills_score: result.skills_score(),
            strengths: matching.map(|m| m.strengths.as_slice()).unwrap_or(&[]),
            recommendation: matching.and_then(|m| m.recommendation.as_deref()),
        }),
        AnalysisTab::Match => TabContent::Match(MatchSlice {
            skills_score: result.skills_score(),
            matching_skills: skills.map(|s| s.matching_skills.as_slice()).unwrap_or(&[]),
            missing_skills: skills.map(|s| s.missing_skills.as_slice()).unwrap_or(&[]),
            experience_fit: matching.and_then(|m| m.experience_fit.as_ref()),
            cultural_fit: matching.and_then(|m| m.cultural_fit.as_ref()),
            improvement_areas: matching.map(|m| m.improvement_areas.as_slice()).unwrap_or(&[]),
            ats: result.ats_analysis.as_ref(),
        }),
        AnalysisTab::SkillsGap => {
            let gap = result.skills_gap.as_ref();
            TabContent::SkillsGap(SkillsGapSlice {
                readiness: result.readiness(),
                critical_gaps: gap.map(|g| g.critical_gaps.as_slice()).unwrap_or(&[]),
                quick_wins: gap.map(|g| g.quick_wins.as_slice()).unwrap_or(&[]),
            })
        }
        AnalysisTab::Resume => TabContent::Resume(match &result.personalized_content {
            Some(content) => ResumeSlice::Ready(content),
            None => ResumeSlice::Generating,
        }),
        AnalysisTab::Company => {
            TabContent::Company(result.company_research.as_ref().unwrap_or(&NO_RESEARCH))
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TabbedAnalysisView {
    active: AnalysisTab,
}

impl TabbedAnalysisView {
    pub fn active(&self) -> AnalysisTab {
        self.active
    }

    pub fn select(&mut self, tab: AnalysisTab) {
        self.active = tab;
    }

    pub fn next(&mut self) {
        self.active = self.active.next();
    }

    pub fn prev(&mut self) {
        self.active = self.active.prev();
    }

    pub fn reset(&mut self) {
        self.active = AnalysisTab::default();
    }

    pub fn content<'a>(&self, result: &'a AnalysisResult) -> TabContent<'a> {
        slice(self.active, result)
    }
}
