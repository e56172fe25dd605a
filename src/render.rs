use ratatui::prelude::*;

use crate::artifact::ArtifactDownloadState;
use crate::cache::AnalysisState;
use crate::models::{AnalysisResult, CompanyResearch, FitComponent, JobOpening, Score};
use crate::orchestrator::AnalysisView;
use crate::submit::SubmitState;
use crate::tabs::{
    MatchSlice, OverviewSlice, ResumeSlice, SkillsGapSlice, TabContent,
};

const WRAP_WIDTH: usize = 70;

pub const RESUME_PLACEHOLDER: &str = "Generating personalized resume insights...";
const RESUME_PLACEHOLDER_HINT: &str = "Hang tight, your personalized PDF is finishing up.";
const SUMMARY_FALLBACK: &str = "Your personalized summary is being prepared.";

/// Color band for a score: green from 80, blue from 60, amber from 40.
pub fn score_color(score: Option<Score>) -> Color {
    match score.map(Score::value) {
        Some(v) if v >= 80 => Color::Green,
        Some(v) if v >= 60 => Color::Blue,
        Some(v) if v >= 40 => Color::Yellow,
        Some(_) => Color::Red,
        None => Color::DarkGray,
    }
}

pub fn score_text(score: Option<Score>) -> String {
    match score {
        Some(score) => score.to_string(),
        None => "pending".to_string(),
    }
}

fn score_span(label: &str, score: Option<Score>) -> Span<'static> {
    Span::styled(
        format!("{}: {}", label, score_text(score)),
        Style::default()
            .fg(score_color(score))
            .add_modifier(Modifier::BOLD),
    )
}

fn heading(text: impl Into<String>) -> Line<'static> {
    Line::from(Span::styled(
        text.into(),
        Style::default().add_modifier(Modifier::BOLD),
    ))
}

fn dim(text: impl Into<String>) -> Line<'static> {
    Line::from(Span::styled(text.into(), Style::default().fg(Color::DarkGray)))
}

fn wrapped(lines: &mut Vec<Line<'static>>, text: &str, indent: &str) {
    for line in textwrap::fill(text, WRAP_WIDTH).lines() {
        lines.push(Line::from(format!("{}{}", indent, line)));
    }
}

fn bullets(lines: &mut Vec<Line<'static>>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    lines.push(heading(title));
    for item in items {
        let options = textwrap::Options::new(WRAP_WIDTH)
            .initial_indent("  - ")
            .subsequent_indent("    ");
        for line in textwrap::fill(item, options).lines() {
            lines.push(Line::from(line.to_string()));
        }
    }
    lines.push(Line::from(""));
}

fn inline_list(lines: &mut Vec<Line<'static>>, title: &str, items: &[String], color: Color) {
    if items.is_empty() {
        return;
    }
    lines.push(Line::from(vec![
        Span::styled(format!("{}: ", title), Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(items.join(", "), Style::default().fg(color)),
    ]));
}

fn labelled(lines: &mut Vec<Line<'static>>, label: &str, value: Option<&str>) {
    if let Some(value) = value {
        lines.push(Line::from(vec![
            Span::styled(format!("{}: ", label), Style::default().fg(Color::Cyan)),
            Span::raw(value.to_string()),
        ]));
    }
}

pub fn header_lines(opening: &JobOpening, result: Option<&AnalysisResult>) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            opening.job_title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("at {}", opening.company_name)),
    ];

    let facts: Vec<String> = [
        opening.ctc.as_ref().map(|c| format!("CTC {}", c)),
        opening.location.clone(),
        opening.drive_date_label().map(|d| format!("Drive {}", d)),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !facts.is_empty() {
        lines.push(dim(facts.join(" | ")));
    }

    if let Some(result) = result {
        lines.push(Line::from(vec![
            score_span("Match", result.match_score()),
            Span::raw("   "),
            score_span("ATS", result.ats_score()),
            Span::raw("   "),
            score_span("Skills", result.skills_score()),
        ]));
    }
    lines.push(Line::from(""));
    lines
}

pub fn artifact_status_line(state: &ArtifactDownloadState) -> Line<'static> {
    match state {
        ArtifactDownloadState::Absent => dim("Resume PDF: still being generated"),
        ArtifactDownloadState::Ready(_) => Line::from(Span::styled(
            "Resume PDF: ready to download",
            Style::default().fg(Color::Green),
        )),
        ArtifactDownloadState::Fetching(_) => Line::from(Span::styled(
            "Resume PDF: downloading...",
            Style::default().fg(Color::Yellow),
        )),
        ArtifactDownloadState::Fetched { saved_to, .. } => Line::from(Span::styled(
            format!("Resume PDF: saved to {}", saved_to.display()),
            Style::default().fg(Color::Green),
        )),
        ArtifactDownloadState::Failed { message, .. } => Line::from(Span::styled(
            format!("Resume PDF: {} Try again.", message),
            Style::default().fg(Color::Red),
        )),
    }
}

pub fn tab_lines(
    content: TabContent<'_>,
    role: &str,
    artifact: &ArtifactDownloadState,
) -> Vec<Line<'static>> {
    match content {
        TabContent::Overview(slice) => overview_lines(slice),
        TabContent::Match(slice) => match_lines(slice),
        TabContent::SkillsGap(slice) => skills_gap_lines(slice),
        TabContent::Resume(slice) => resume_lines(slice, role, artifact),
        TabContent::Company(research) => company_lines(research),
    }
}

fn overview_lines(slice: OverviewSlice<'_>) -> Vec<Line<'static>> {
    let mut lines = vec![heading("Scores")];
    for (label, score) in [
        ("Overall match", slice.match_score),
        ("ATS compatibility", slice.ats_score),
        ("Skills match", slice.skills_score),
    ] {
        lines.push(Line::from(vec![
            Span::raw(format!("  {:<18} ", label)),
            Span::styled(score_text(score), Style::default().fg(score_color(score))),
        ]));
    }
    lines.push(Line::from(""));

    bullets(&mut lines, "Key strengths", slice.strengths);
    if let Some(recommendation) = slice.recommendation {
        lines.push(heading("Recommendation"));
        wrapped(&mut lines, recommendation, "  ");
    }
    lines
}

fn fit_lines(lines: &mut Vec<Line<'static>>, title: &str, fit: Option<&FitComponent>) {
    let Some(fit) = fit else { return };
    lines.push(Line::from(vec![
        Span::styled(format!("{} ", title), Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(score_text(fit.score), Style::default().fg(score_color(fit.score))),
    ]));
    if let Some(assessment) = &fit.assessment {
        wrapped(lines, assessment, "  ");
    }
    lines.push(Line::from(""));
}

fn match_lines(slice: MatchSlice<'_>) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(vec![
        Span::styled("Skills match ", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(
            score_text(slice.skills_score),
            Style::default().fg(score_color(slice.skills_score)),
        ),
    ])];
    inline_list(&mut lines, "  Matching", slice.matching_skills, Color::Green);
    inline_list(&mut lines, "  Missing", slice.missing_skills, Color::Red);
    lines.push(Line::from(""));

    fit_lines(&mut lines, "Experience fit", slice.experience_fit);
    fit_lines(&mut lines, "Cultural fit", slice.cultural_fit);
    bullets(&mut lines, "Areas to improve", slice.improvement_areas);

    if let Some(ats) = slice.ats {
        lines.push(Line::from(vec![
            Span::styled("ATS score ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(score_text(ats.ats_score), Style::default().fg(score_color(ats.ats_score))),
            Span::raw(format!(
                "   keyword match {}",
                score_text(ats.keyword_match_percentage)
            )),
        ]));
        inline_list(&mut lines, "  Matched keywords", &ats.matched_keywords, Color::Green);
        inline_list(&mut lines, "  Missing keywords", &ats.missing_keywords, Color::Red);
        lines.push(Line::from(""));
        bullets(&mut lines, "Formatting issues", &ats.formatting_issues);
        bullets(&mut lines, "Suggestions", &ats.suggestions);
        if let Some(assessment) = &ats.overall_assessment {
            wrapped(&mut lines, assessment, "  ");
        }
    }
    lines
}

fn skills_gap_lines(slice: SkillsGapSlice<'_>) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(readiness) = slice.readiness {
        lines.push(Line::from(vec![
            Span::styled("Readiness: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(readiness.to_string(), Style::default().fg(Color::Cyan)),
        ]));
        lines.push(Line::from(""));
    }

    if slice.critical_gaps.is_empty() {
        lines.push(dim("No critical gaps identified."));
        lines.push(Line::from(""));
    } else {
        lines.push(heading("Skill gaps"));
        for gap in slice.critical_gaps {
            let mut spans = vec![Span::raw(format!("  {}", gap.skill))];
            if !gap.importance.label().is_empty() {
                let style = if gap.importance.is_critical() {
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Yellow)
                };
                spans.push(Span::styled(format!(" [{}]", gap.importance.label()), style));
            }
            if let Some(time) = &gap.estimated_time {
                spans.push(Span::styled(format!("  ~{}", time), Style::default().fg(Color::DarkGray)));
            }
            lines.push(Line::from(spans));
            for resource in &gap.learning_resources {
                lines.push(dim(format!("      {}", resource)));
            }
        }
        lines.push(Line::from(""));
    }

    bullets(&mut lines, "Quick wins", slice.quick_wins);
    lines
}

fn resume_lines(
    slice: ResumeSlice<'_>,
    role: &str,
    artifact: &ArtifactDownloadState,
) -> Vec<Line<'static>> {
    let content = match slice {
        ResumeSlice::Generating => {
            return vec![
                Line::from(Span::styled(
                    RESUME_PLACEHOLDER,
                    Style::default().fg(Color::Yellow),
                )),
                dim(RESUME_PLACEHOLDER_HINT),
                Line::from(""),
                artifact_status_line(artifact),
            ];
        }
        ResumeSlice::Ready(content) => content,
    };

    let headline = content
        .branding_headline
        .clone()
        .unwrap_or_else(|| format!("Tailored for {}", role));
    let mut lines = vec![
        Line::from(Span::styled(
            headline,
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        )),
        artifact_status_line(artifact),
        Line::from(""),
        heading("Summary"),
    ];
    wrapped(
        &mut lines,
        content.professional_summary.as_deref().unwrap_or(SUMMARY_FALLBACK),
        "  ",
    );
    lines.push(Line::from(""));

    bullets(&mut lines, "Highlights", &content.key_highlights);

    if let Some(skills) = &content.skills_section {
        inline_list(&mut lines, "Primary skills", &skills.primary_skills, Color::Green);
        inline_list(&mut lines, "Secondary skills", &skills.secondary_skills, Color::Cyan);
        inline_list(&mut lines, "Tooling", &skills.tooling, Color::Blue);
        lines.push(Line::from(""));
    }

    if !content.experience_section.is_empty() {
        lines.push(heading("Experience"));
        for entry in &content.experience_section {
            let title = [entry.title.as_deref(), entry.company.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" @ ");
            let mut spans = vec![Span::styled(
                format!("  {}", title),
                Style::default().add_modifier(Modifier::BOLD),
            )];
            if let Some(duration) = &entry.duration {
                spans.push(Span::styled(format!("  {}", duration), Style::default().fg(Color::DarkGray)));
            }
            lines.push(Line::from(spans));
            for bullet in &entry.impact_bullets {
                wrapped(&mut lines, &format!("- {}", bullet), "    ");
            }
            if !entry.tech_stack.is_empty() {
                lines.push(dim(format!("    {}", entry.tech_stack.join(", "))));
            }
        }
        lines.push(Line::from(""));
    }

    if !content.projects_section.is_empty() {
        lines.push(heading("Projects"));
        for project in &content.projects_section {
            lines.push(Line::from(Span::styled(
                format!("  {}", project.name),
                Style::default().add_modifier(Modifier::BOLD),
            )));
            if let Some(description) = &project.description {
                wrapped(&mut lines, description, "    ");
            }
            for bullet in &project.impact_bullets {
                wrapped(&mut lines, &format!("- {}", bullet), "    ");
            }
            if !project.tech_stack.is_empty() {
                lines.push(dim(format!("    {}", project.tech_stack.join(", "))));
            }
        }
        lines.push(Line::from(""));
    }

    if !content.education_section.is_empty() {
        lines.push(heading("Education"));
        for entry in &content.education_section {
            let year = entry.year.as_deref().map(|y| format!(" ({})", y)).unwrap_or_default();
            lines.push(Line::from(format!(
                "  {}, {}{}",
                entry.degree, entry.institution, year
            )));
            for highlight in &entry.highlights {
                lines.push(dim(format!("    {}", highlight)));
            }
        }
        lines.push(Line::from(""));
    }

    bullets(&mut lines, "Certifications", &content.certifications);

    if let Some(notes) = content.tailoring_notes.as_ref().filter(|n| !n.is_empty()) {
        bullets(&mut lines, "Culture fit notes", &notes.culture_fit);
        bullets(&mut lines, "Interview talking points", &notes.interview_talking_points);
        inline_list(&mut lines, "ATS keywords", &notes.ats_keywords, Color::Cyan);
    }
    lines
}

fn company_lines(research: &CompanyResearch) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(overview) = &research.company_overview {
        lines.push(heading("About"));
        wrapped(&mut lines, overview, "  ");
        lines.push(Line::from(""));
    }
    labelled(&mut lines, "Industry", research.industry.as_deref());
    labelled(&mut lines, "Size", research.company_size.as_deref());
    labelled(&mut lines, "Work environment", research.work_environment.as_deref());
    inline_list(&mut lines, "Tech stack", &research.tech_stack, Color::Blue);
    if !lines.is_empty() {
        lines.push(Line::from(""));
    }

    bullets(&mut lines, "Culture and values", &research.culture_values);
    bullets(&mut lines, "Key facts", &research.key_facts);

    if let Some(insights) = &research.role_insights {
        if let Some(summary) = &insights.role_summary {
            lines.push(heading("The role"));
            wrapped(&mut lines, summary, "  ");
            lines.push(Line::from(""));
        }
        bullets(&mut lines, "Responsibilities", &insights.key_responsibilities);
        bullets(&mut lines, "What success looks like", &insights.success_profile);
        bullets(&mut lines, "Trends", &insights.emerging_trends);
    }

    if let Some(recs) = &research.tailoring_recommendations {
        bullets(&mut lines, "Resume focus", &recs.resume_focus);
        bullets(&mut lines, "Culture alignment", &recs.culture_alignment);
        bullets(&mut lines, "Projects to highlight", &recs.project_highlights);
    }

    bullets(&mut lines, "Recent news", &research.recent_news);
    for note in &research.source_notes {
        lines.push(dim(note.clone()));
    }

    if lines.is_empty() {
        lines.push(dim("No company research available yet."));
    }
    lines
}

/// Everything below the tab bar for an open view: banners, then whatever
/// the fetch state allows.
pub fn view_lines(view: &AnalysisView) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    if let Some(err) = view.cache().refresh_error() {
        lines.push(Line::from(Span::styled(
            format!("Refresh failed: {} (showing the previous analysis)", err.user_message()),
            Style::default().fg(Color::Red),
        )));
    }
    match view.submitter().state() {
        SubmitState::Submitting => lines.push(Line::from(Span::styled(
            "Submitting application...",
            Style::default().fg(Color::Yellow),
        ))),
        SubmitState::Failed(message) => lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Red),
        ))),
        SubmitState::Idle => {}
    }
    if view.cache().is_in_flight() && view.cache().is_ready() {
        lines.push(dim("Refreshing analysis..."));
    }
    if !lines.is_empty() {
        lines.push(Line::from(""));
    }

    match view.cache().state() {
        AnalysisState::Idle | AnalysisState::Loading => {
            lines.push(Line::from(Span::styled(
                "Analyzing your fit for this role...",
                Style::default().fg(Color::Yellow),
            )));
            lines.push(dim("Match, ATS, skills gap and company research are on the way."));
        }
        AnalysisState::Failed(err) => {
            lines.push(Line::from(Span::styled(
                "Could not load the analysis.",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
            wrapped(&mut lines, &err.user_message(), "  ");
            if err.is_retryable() {
                lines.push(Line::from(""));
                lines.push(dim("Press r to retry."));
            }
        }
        AnalysisState::Ready { result, .. } => {
            lines.extend(tab_lines(
                view.tabs().content(result),
                &view.opening().job_title,
                view.artifact().state(),
            ));
        }
    }
    lines
}

pub fn to_plain(lines: &[Line<'_>]) -> String {
    lines
        .iter()
        .map(|line| {
            line.spans
                .iter()
                .map(|span| span.content.as_ref())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
