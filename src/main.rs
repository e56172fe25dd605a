mod artifact;
mod cache;
mod client;
mod config;
mod error;
#[cfg(test)]
mod mock_client;
mod models;
mod orchestrator;
mod render;
mod session;
mod submit;
mod tabs;
mod tui;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use artifact::{ArtifactSink, ArtifactUpdate, DownloadDir};
use cache::CacheUpdate;
use client::PortalClient;
use config::Config;
use error::RemoteError;
use models::{JobOpening, ProfileUpdate};
use orchestrator::{EventOutcome, Orchestrator, ViewEvent};
use session::Session;
use submit::ListingRefresh;
use tabs::AnalysisTab;

#[derive(Parser)]
#[command(name = "placement")]
#[command(about = "Placement portal client - analyze your fit for a drive and apply")]
struct Cli {
    /// Portal API base URL (overrides PLACEMENT_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List drives open for registration
    Drives,

    /// Analyze your fit for a drive
    Analyze {
        /// Drive ID
        id: i64,

        /// Tab to show (overview, match, skills, resume, company)
        #[arg(short, long, default_value = "overview")]
        tab: String,

        /// Show every tab
        #[arg(long)]
        all: bool,
    },

    /// Download the personalized resume for a drive
    Download {
        /// Drive ID
        id: i64,
    },

    /// Apply to a drive using the AI analysis
    Apply {
        /// Drive ID
        id: i64,

        /// Download the personalized resume first and attach it
        #[arg(long)]
        with_resume: bool,
    },

    /// List your applications
    Applications,

    /// Generate a cover letter for a drive
    CoverLetter {
        /// Drive ID
        id: i64,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download the offer letter for an application
    OfferLetter {
        /// Application ID (see `applications`)
        id: i64,
    },

    /// Upload a new resume; later analyses use it
    UploadResume {
        /// Resume file (PDF or DOCX)
        path: PathBuf,
    },

    /// Show your student profile, or update it when any option is given
    Profile {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        cgpa: Option<f64>,

        #[arg(long)]
        phone: Option<String>,

        /// Comma-separated skill list; replaces the current skills
        #[arg(long)]
        skills: Option<String>,
    },

    /// Show who the portal thinks you are
    Whoami,

    /// Browse drives interactively
    Browse,
}

fn init_tracing(log_file: Option<PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let log_file = matches!(cli.command, Commands::Browse).then(|| config.log_path());
    init_tracing(log_file)?;

    let session = Session::load(&config.session_path())?;
    if !session.is_authenticated() {
        warn!("no session found; set PLACEMENT_TOKEN or sign in through the portal");
    }
    let api_url = cli.api_url.as_deref().unwrap_or(&config.api_url);
    let client = Arc::new(PortalClient::new(
        api_url,
        session.token().map(str::to_string),
        config.timeout,
    )?);
    let downloads = DownloadDir::new(&config.download_dir);

    match cli.command {
        Commands::Drives => {
            let openings = client
                .available_openings()
                .await
                .context("Failed to load available drives")?;
            if openings.is_empty() {
                println!("No open drives right now.");
            } else {
                println!(
                    "{:<6} {:<20} {:<28} {:<12} {:<16} {:<10}",
                    "ID", "COMPANY", "ROLE", "CTC", "LOCATION", "DRIVE"
                );
                println!("{}", "-".repeat(97));
                for opening in openings {
                    println!(
                        "{:<6} {:<20} {:<28} {:<12} {:<16} {:<10}",
                        opening.id,
                        truncate(&opening.company_name, 18),
                        truncate(&opening.job_title, 26),
                        truncate(opening.ctc.as_deref().unwrap_or("-"), 10),
                        truncate(opening.location.as_deref().unwrap_or("-"), 14),
                        opening.drive_date_label().unwrap_or_else(|| "-".to_string())
                    );
                }
            }
        }

        Commands::Analyze { id, tab, all } => {
            let tab: AnalysisTab = tab.parse()?;
            let mut workflow = Workflow::start(client.clone(), downloads);
            workflow.open(id).await?;

            let Some(view) = workflow.orchestrator.view() else {
                bail!("Analysis view closed unexpectedly");
            };
            let Some(result) = view.cache().result() else {
                bail!("Analysis did not load");
            };
            println!("{}", render::to_plain(&render::header_lines(view.opening(), Some(result))));
            let shown: Vec<AnalysisTab> = if all { AnalysisTab::ORDER.to_vec() } else { vec![tab] };
            for tab in shown {
                println!("== {} ==", tab.label());
                let lines = render::tab_lines(
                    tabs::slice(tab, result),
                    &view.opening().job_title,
                    view.artifact().state(),
                );
                println!("{}\n", render::to_plain(&lines));
            }
        }

        Commands::Download { id } => {
            let mut workflow = Workflow::start(client.clone(), downloads);
            workflow.open(id).await?;
            let path = workflow.download().await?;
            println!("Saved personalized resume to {}", path.display());
        }

        Commands::Apply { id, with_resume } => {
            let mut workflow = Workflow::start(client.clone(), downloads);
            workflow.open(id).await?;
            if with_resume {
                let path = workflow.download().await?;
                println!("Saved personalized resume to {}", path.display());
            }
            let ack = workflow.submit().await?;
            if ack.message.is_empty() {
                println!("Application submitted.");
            } else {
                println!("{}", ack.message);
            }
            if let Some(application_id) = ack.application_id {
                println!("Application #{}", application_id);
            }
            if ack.used_personalized_resume {
                println!("Your personalized resume was attached.");
            }
        }

        Commands::Applications => {
            let applications = client
                .my_applications()
                .await
                .context("Failed to load applications")?;
            if applications.is_empty() {
                println!("No applications yet.");
            } else {
                println!(
                    "{:<6} {:<20} {:<28} {:<12} {:>8} {:>8} {:<10}",
                    "ID", "COMPANY", "ROLE", "STATUS", "MATCH", "ATS", "APPLIED"
                );
                println!("{}", "-".repeat(98));
                for application in applications {
                    println!(
                        "{:<6} {:<20} {:<28} {:<12} {:>8} {:>8} {:<10}",
                        application.id,
                        truncate(&application.company_name, 18),
                        truncate(&application.job_title, 26),
                        application.status,
                        render::score_text(application.match_score),
                        render::score_text(application.ats_score),
                        application
                            .applied_at
                            .as_deref()
                            .map(models::format_portal_date)
                            .unwrap_or_else(|| "-".to_string())
                    );
                }
            }
        }

        Commands::CoverLetter { id, output } => {
            let letter = client
                .cover_letter(id)
                .await
                .with_context(|| format!("Failed to generate a cover letter for drive #{}", id))?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &letter)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Saved cover letter to {}", path.display());
                }
                None => println!("{}", letter),
            }
        }

        Commands::OfferLetter { id } => {
            let record = match client.my_applications().await {
                Ok(applications) => applications.into_iter().find(|a| a.id == id),
                Err(e) => {
                    warn!(error = %e, "could not look up application details");
                    None
                }
            };
            let contents = client
                .offer_letter(id)
                .await
                .map_err(|e| anyhow!(offer_letter_failure(id, &e)))?;
            let filename = match &record {
                Some(r) => artifact::offer_letter_filename(&r.company_name, &r.job_title),
                None => artifact::offer_letter_filename("", &format!("application-{}", id)),
            };
            let path = downloads.save(contents, &filename)?;
            println!("Saved offer letter to {}", path.display());
        }

        Commands::UploadResume { path } => {
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow!("Not a file path: {}", path.display()))?
                .to_string();
            let contents = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let upload = client
                .upload_resume(&filename, contents)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            println!("{} ({})", upload.message, upload.resume_path);
            println!("Run `placement analyze <drive>` to refresh your fit against the new resume.");
        }

        Commands::Profile {
            name,
            cgpa,
            phone,
            skills,
        } => {
            let update = ProfileUpdate {
                name,
                cgpa,
                phone,
                skills: skills.as_deref().map(parse_skills),
            };
            if !update.is_empty() {
                let message = client
                    .update_profile(&update)
                    .await
                    .map_err(|e| anyhow!(e.user_message()))?;
                println!("{}", message);
            }
            let profile = client.profile().await.context("Failed to load your profile")?;
            println!("{} ({}, {})", profile.name, profile.enrollment_no, profile.department);
            println!("Email:    {}", profile.email);
            println!(
                "CGPA:     {}",
                profile.cgpa.map(|c| format!("{:.2}", c)).unwrap_or_else(|| "-".to_string())
            );
            println!("Phone:    {}", profile.phone.as_deref().unwrap_or("-"));
            println!(
                "Skills:   {}",
                if profile.skills.is_empty() { "-".to_string() } else { profile.skills.join(", ") }
            );
            println!("Resume:   {}", profile.resume_path.as_deref().unwrap_or("not uploaded"));
            println!("Approved: {}", if profile.is_approved { "yes" } else { "pending HOD approval" });
        }

        Commands::Whoami => {
            println!("Session:   {}", session.identity_label());
            println!("Downloads: {}", downloads.path().display());
            let user = client
                .current_user()
                .await
                .context("Failed to look up the current user")?;
            println!("Portal:    #{} {} ({})", user.id, user.email, user.role);
        }

        Commands::Browse => {
            tui::run_browse(client, downloads, session.identity_label()).await?;
        }
    }

    Ok(())
}

/// The one-shot commands run the same workflow as the browser, one step at a
/// time, waiting for each result before moving on.
struct Workflow {
    client: Arc<PortalClient>,
    orchestrator: Orchestrator,
    events: UnboundedReceiver<ViewEvent>,
}

/// The one-shot commands have no listing on screen to reload.
struct NoListing;

impl ListingRefresh for NoListing {
    fn refresh(&self) {
        info!("application recorded; run `placement applications` to see it");
    }
}

impl Workflow {
    fn start(client: Arc<PortalClient>, downloads: DownloadDir) -> Self {
        let (orchestrator, events) =
            Orchestrator::new(client.clone(), Arc::new(downloads), Arc::new(NoListing));
        Self {
            client,
            orchestrator,
            events,
        }
    }

    async fn next_outcome(&mut self) -> Result<EventOutcome> {
        let event = self
            .events
            .recv()
            .await
            .ok_or_else(|| anyhow!("Workflow stopped before the portal answered"))?;
        Ok(self.orchestrator.handle(event))
    }

    /// Looks the drive up in the open listing for its title; an unlisted id
    /// is still analyzed.
    async fn find_opening(&self, id: i64) -> JobOpening {
        match self.client.available_openings().await {
            Ok(openings) => openings.into_iter().find(|o| o.id == id),
            Err(err) => {
                warn!(error = %err, "could not load drives");
                None
            }
        }
        .unwrap_or_else(|| JobOpening {
            id,
            ..Default::default()
        })
    }

    async fn open(&mut self, id: i64) -> Result<()> {
        let opening = self.find_opening(id).await;
        eprintln!("Analyzing drive #{}... this can take a minute.", id);
        self.orchestrator.open(opening);
        loop {
            match self.next_outcome().await? {
                EventOutcome::Analysis(CacheUpdate::Fresh) => return Ok(()),
                EventOutcome::Analysis(CacheUpdate::Failed) => {
                    let message = self
                        .orchestrator
                        .view()
                        .and_then(|v| v.cache().error())
                        .map(|e| e.user_message())
                        .unwrap_or_default();
                    bail!("Could not load the analysis: {}", message);
                }
                _ => {}
            }
        }
    }

    async fn download(&mut self) -> Result<PathBuf> {
        self.orchestrator.download()?;
        loop {
            match self.next_outcome().await? {
                EventOutcome::Artifact(ArtifactUpdate::Saved(path)) => return Ok(path),
                EventOutcome::Artifact(ArtifactUpdate::Failed(message)) => bail!(message),
                _ => {}
            }
        }
    }

    async fn submit(&mut self) -> Result<models::Acknowledgement> {
        self.orchestrator.submit()?;
        loop {
            match self.next_outcome().await? {
                EventOutcome::Submitted(ack) => return Ok(ack),
                EventOutcome::SubmitFailed(message) => bail!(message),
                _ => {}
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn parse_skills(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn offer_letter_failure(application_id: i64, err: &RemoteError) -> String {
    match err {
        RemoteError::NotFound(_) => format!(
            "No offer letter has been issued for application #{} yet.",
            application_id
        ),
        other => other.user_message(),
    }
}
