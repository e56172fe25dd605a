use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};
use std::future::Future;
use std::io::stdout;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::warn;

use crate::artifact::{ArtifactUpdate, DownloadDir};
use crate::cache::CacheUpdate;
use crate::client::PortalClient;
use crate::error::RemoteError;
use crate::models::{JobOpening, OpeningStatus};
use crate::orchestrator::{EventOutcome, Orchestrator, ViewEvent};
use crate::render;
use crate::submit::ListingRefresh;
use crate::tabs::AnalysisTab;

const TICK: Duration = Duration::from_millis(100);

/// Set by the workflow after an application lands; the loop reloads the
/// opening list on its next tick.
#[derive(Default)]
struct ReloadFlag(AtomicBool);

impl ReloadFlag {
    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

impl ListingRefresh for ReloadFlag {
    fn refresh(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

type ListingResult = Result<Vec<JobOpening>, RemoteError>;

/// Fetches the opening list on a background task so the loop keeps drawing.
/// At most one fetch runs at a time.
struct ListingReload {
    tx: UnboundedSender<ListingResult>,
    rx: UnboundedReceiver<ListingResult>,
    in_flight: bool,
}

impl ListingReload {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            in_flight: false,
        }
    }

    fn in_flight(&self) -> bool {
        self.in_flight
    }

    fn start<F>(&mut self, fetch: F) -> bool
    where
        F: Future<Output = ListingResult> + Send + 'static,
    {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(fetch.await);
        });
        true
    }

    fn poll(&mut self) -> Option<ListingResult> {
        let result = self.rx.try_recv().ok()?;
        self.in_flight = false;
        Some(result)
    }
}

struct AppState {
    openings: Vec<JobOpening>,
    selected: usize,
    scroll_offset: u16,
    status: Option<String>,
    identity: String,
}

impl AppState {
    fn new(openings: Vec<JobOpening>, identity: String) -> Self {
        Self {
            openings,
            selected: 0,
            scroll_offset: 0,
            status: None,
            identity,
        }
    }

    fn current(&self) -> Option<&JobOpening> {
        self.openings.get(self.selected)
    }

    fn next(&mut self) {
        if !self.openings.is_empty() && self.selected < self.openings.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    fn replace_openings(&mut self, openings: Vec<JobOpening>) {
        self.openings = openings;
        if self.selected >= self.openings.len() {
            self.selected = self.openings.len().saturating_sub(1);
        }
    }

    fn apply_reload(&mut self, result: ListingResult) {
        match result {
            Ok(openings) => self.replace_openings(openings),
            Err(err) => {
                warn!(error = %err, "could not reload drives");
                self.status = Some(format!("Could not reload drives: {}", err.user_message()));
            }
        }
    }

    fn note(&mut self, outcome: EventOutcome) {
        let message = match outcome {
            EventOutcome::Artifact(ArtifactUpdate::Saved(path)) => {
                format!("Saved personalized resume to {}", path.display())
            }
            EventOutcome::Artifact(ArtifactUpdate::Failed(message)) => message,
            EventOutcome::Submitted(ack) if ack.message.is_empty() => {
                "Application submitted".to_string()
            }
            EventOutcome::Submitted(ack) => ack.message,
            EventOutcome::Analysis(CacheUpdate::Replaced) => "Analysis refreshed".to_string(),
            _ => return,
        };
        self.status = Some(message);
    }
}

pub async fn run_browse(client: Arc<PortalClient>, downloads: DownloadDir, identity: String) -> Result<()> {
    let openings = client
        .available_openings()
        .await
        .context("Failed to load available drives")?;
    if openings.is_empty() {
        println!("No open drives right now.");
        return Ok(());
    }

    let reload = Arc::new(ReloadFlag::default());
    let (mut orchestrator, mut events) =
        Orchestrator::new(client.clone(), Arc::new(downloads), reload.clone());
    let mut state = AppState::new(openings, identity);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(
        &mut terminal,
        &mut state,
        &mut orchestrator,
        &mut events,
        &client,
        &reload,
    );

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    orchestrator: &mut Orchestrator,
    events: &mut UnboundedReceiver<ViewEvent>,
    client: &Arc<PortalClient>,
    reload: &ReloadFlag,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));
    let mut listing = ListingReload::new();

    loop {
        while let Ok(event) = events.try_recv() {
            let outcome = orchestrator.handle(event);
            state.note(outcome);
        }
        // a request made while a fetch is running is picked up after it lands
        if !listing.in_flight() && reload.take() {
            let client = Arc::clone(client);
            listing.start(async move { client.available_openings().await });
        }
        if let Some(result) = listing.poll() {
            state.apply_reload(result);
            list_state.select(Some(state.selected));
        }

        terminal.draw(|frame| draw(frame, state, orchestrator, &mut list_state))?;

        if !event::poll(TICK)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if orchestrator.is_open() {
            match key.code {
                KeyCode::Char('q') => break,
                KeyCode::Esc => {
                    orchestrator.close();
                    state.scroll_offset = 0;
                }
                KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => {
                    if let Some(view) = orchestrator.view_mut() {
                        view.tabs_mut().next();
                        state.scroll_offset = 0;
                    }
                }
                KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => {
                    if let Some(view) = orchestrator.view_mut() {
                        view.tabs_mut().prev();
                        state.scroll_offset = 0;
                    }
                }
                KeyCode::Char(c @ '1'..='5') => {
                    let index = c as usize - '1' as usize;
                    if let Some(view) = orchestrator.view_mut() {
                        view.tabs_mut().select(AnalysisTab::ORDER[index]);
                        state.scroll_offset = 0;
                    }
                }
                KeyCode::Char('r') => {
                    orchestrator.refresh();
                }
                KeyCode::Char('d') => {
                    if let Err(err) = orchestrator.download() {
                        state.status = Some(err.to_string());
                    }
                }
                KeyCode::Char('a') => {
                    if let Err(err) = orchestrator.submit() {
                        state.status = Some(err.to_string());
                    }
                }
                KeyCode::Char('x') => {
                    if let Some(view) = orchestrator.view_mut() {
                        view.dismiss_errors();
                    }
                    state.status = None;
                }
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                _ => {}
            }
        } else {
            let prev_selected = state.selected;
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Enter | KeyCode::Char('o') => {
                    if let Some(opening) = state.current().cloned() {
                        state.status = None;
                        state.scroll_offset = 0;
                        orchestrator.open(opening);
                    }
                }
                KeyCode::Char('r') => reload.refresh(),
                _ => {}
            }
            if state.selected != prev_selected {
                list_state.select(Some(state.selected));
            }
        }
    }
    orchestrator.close();
    Ok(())
}

fn draw(frame: &mut Frame, state: &AppState, orchestrator: &Orchestrator, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1), Constraint::Length(1)])
        .split(frame.area());
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(rows[0]);

    // Left panel: openings
    let items: Vec<ListItem> = state
        .openings
        .iter()
        .map(|opening| {
            let marker = match opening.status {
                OpeningStatus::Active => " ",
                OpeningStatus::Completed => "-",
                OpeningStatus::Other(_) => "?",
            };
            ListItem::new(format!(
                "{} #{:<4} {} | {}",
                marker,
                opening.id,
                crate::truncate(&opening.job_title, 30),
                opening.company_name
            ))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Drives ({}) ",
            state.openings.len()
        )))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: analysis view or opening summary
    match orchestrator.view() {
        Some(view) => {
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Min(0)])
                .split(chunks[1]);

            let titles: Vec<Line> = AnalysisTab::ORDER
                .iter()
                .enumerate()
                .map(|(i, tab)| Line::from(format!("{} {}", i + 1, tab.label())))
                .collect();
            let selected = AnalysisTab::ORDER
                .iter()
                .position(|t| *t == view.tabs().active())
                .unwrap_or(0);
            let tabs = Tabs::new(titles)
                .block(Block::default().borders(Borders::ALL).title(" Analysis "))
                .select(selected)
                .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
            frame.render_widget(tabs, parts[0]);

            let mut lines = render::header_lines(view.opening(), view.cache().result());
            lines.extend(render::view_lines(view));
            let detail = Paragraph::new(Text::from(lines))
                .block(Block::default().borders(Borders::ALL))
                .wrap(Wrap { trim: false })
                .scroll((state.scroll_offset, 0));
            frame.render_widget(detail, parts[1]);
        }
        None => {
            let mut lines = match state.current() {
                Some(opening) => render::header_lines(opening, None),
                None => vec![Line::from("No drive selected")],
            };
            if let Some(deadline) = state.current().and_then(|o| o.registration_deadline.as_deref()) {
                lines.push(Line::from(format!(
                    "Register by {}",
                    crate::models::format_portal_date(deadline)
                )));
                lines.push(Line::from(""));
            }
            lines.push(Line::from(Span::styled(
                "Press Enter to analyze your fit for this drive.",
                Style::default().fg(Color::DarkGray),
            )));
            let detail = Paragraph::new(Text::from(lines))
                .block(Block::default().borders(Borders::ALL).title(" Detail "))
                .wrap(Wrap { trim: false });
            frame.render_widget(detail, chunks[1]);
        }
    }

    // Status and footer help
    let status = state
        .status
        .clone()
        .unwrap_or_else(|| format!(" Signed in as {}", state.identity));
    frame.render_widget(
        Paragraph::new(status).style(Style::default().fg(Color::Yellow)),
        rows[1],
    );

    let help = if orchestrator.is_open() {
        " tab/1-5:switch  J/K:scroll  r:refresh  d:download  a:apply  x:dismiss  esc:close  q:quit"
    } else {
        " j/k:navigate  enter:analyze  r:reload  q:quit"
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        rows[2],
    );
}
