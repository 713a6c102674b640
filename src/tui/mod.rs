use anyhow::{Context, Result};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
};
use std::io;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

use crate::Decision;
use crate::controller::{ReviewController, ReviewEvent};
use crate::cursor::ReviewPhase;
use crate::gesture::{DragTracker, ReviewAction, ReviewInput};
use crate::prefetch::AssetState;
use crate::preview::{CardPreview, TerminalPreparer};
use crate::sink::{SubmissionFilter, SubmissionSink};
use crate::source::ImageSource;

/// Terminal cells are reported in columns; drags are measured in roughly
/// pixel-sized units so the configured threshold reads the same everywhere.
const UNITS_PER_COLUMN: f64 = 8.0;
const STACK_DEPTH: usize = 3;
const STATUS_TTL: Duration = Duration::from_secs(3);
const SWIPE_FLASH: Duration = Duration::from_millis(500);

/// Work that must run after the next frame is drawn, so the screen can
/// show a busy message first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Load,
    Submit,
}

/// Application state for the TUI.
pub struct App {
    controller: ReviewController<TerminalPreparer>,
    source: Box<dyn ImageSource>,
    sink: Box<dyn SubmissionSink>,
    folder: String,
    filter: SubmissionFilter,
    drag: DragTracker,
    swipe_hint: Option<Decision>,
    last_swipe: Option<(Decision, Instant)>,
    pending_task: Option<Task>,
    load_error: Option<String>,
    receipt: Option<String>,
    should_quit: bool,
    show_help: bool,
    status_message: Option<(String, Instant)>,
}

impl App {
    /// Create the app. The folder is fetched as soon as the TUI starts.
    pub fn new(
        controller: ReviewController<TerminalPreparer>,
        source: Box<dyn ImageSource>,
        sink: Box<dyn SubmissionSink>,
        folder: String,
    ) -> Self {
        let settings = controller.settings();
        let filter = settings.submit_filter;
        let drag = DragTracker::new(settings.drag_threshold);
        Self {
            controller,
            source,
            sink,
            folder,
            filter,
            drag,
            swipe_hint: None,
            last_swipe: None,
            pending_task: Some(Task::Load),
            load_error: None,
            receipt: None,
            should_quit: false,
            show_help: false,
            status_message: None,
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    /// Run a deferred load or submit to completion on the runtime.
    fn run_task(&mut self, task: Task, runtime: &Handle) {
        match task {
            Task::Load => {
                self.load_error = None;
                self.receipt = None;
                // The error is also queued as a LoadFailed event.
                let _ = runtime.block_on(
                    self.controller
                        .load(self.source.as_ref(), &self.folder),
                );
            }
            Task::Submit => {
                let _ = runtime.block_on(self.controller.submit(self.sink.as_ref(), self.filter));
            }
        }
    }

    /// Fold controller events into presentation state.
    fn absorb_events(&mut self) {
        for event in self.controller.drain_events() {
            match event {
                ReviewEvent::LoadFailed { message } => self.load_error = Some(message),
                ReviewEvent::Loaded { total } => {
                    self.set_status(format!("Loaded {} images from {}", total, self.folder));
                }
                ReviewEvent::CardCommitted { decision, .. } => {
                    self.last_swipe = Some((decision, Instant::now()));
                }
                ReviewEvent::CardRestored { index } => {
                    self.last_swipe = None;
                    self.set_status(format!("Back to image {}", index + 1));
                }
                ReviewEvent::NothingToUndo => self.set_status("Nothing to undo"),
                ReviewEvent::Submitted(receipt) => {
                    self.receipt = Some(format!(
                        "Delivered {} entries to {}",
                        receipt.delivered, receipt.destination
                    ));
                }
                ReviewEvent::SubmissionFailed { message } => self.set_status(message),
                ReviewEvent::Loading { .. }
                | ReviewEvent::Progress { .. }
                | ReviewEvent::Completed(_)
                | ReviewEvent::AssetReady { .. }
                | ReviewEvent::AssetUnavailable { .. }
                | ReviewEvent::Reset => {}
            }
        }
    }

    /// Handle keyboard input, dispatching on the review phase.
    fn handle_input(&mut self, key: KeyEvent) {
        if self.show_help {
            // Any key closes help
            self.show_help = false;
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                return;
            }
            KeyCode::Char('?') => {
                self.show_help = true;
                return;
            }
            _ => {}
        }

        let phase = self.controller.phase();
        if let Some(input) = key_to_input(key.code, phase) {
            self.controller.handle_input(input);
            return;
        }

        match (phase, key.code) {
            (ReviewPhase::Idle, KeyCode::Char('r') | KeyCode::Enter) => {
                self.pending_task = Some(Task::Load);
            }
            (ReviewPhase::Complete, KeyCode::Char('s') | KeyCode::Enter) => {
                self.pending_task = Some(Task::Submit);
            }
            (ReviewPhase::Complete | ReviewPhase::Submitted, KeyCode::Char('r')) => {
                self.controller.reset();
                self.pending_task = Some(Task::Load);
            }
            _ => {}
        }
    }

    /// Track pointer drags on the card; only meaningful while reviewing.
    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.controller.phase() != ReviewPhase::InProgress {
            self.drag.cancel();
            self.swipe_hint = None;
            return;
        }

        let x = f64::from(mouse.column) * UNITS_PER_COLUMN;
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.drag.begin(x),
            MouseEventKind::Drag(MouseButton::Left) => self.swipe_hint = self.drag.update(x),
            MouseEventKind::Up(MouseButton::Left) => {
                self.swipe_hint = None;
                if let Some(input) = self.drag.finish() {
                    self.controller.handle_input(input);
                }
            }
            _ => {}
        }
    }

    /// Render the UI, dispatching to the appropriate phase renderer.
    fn render(&mut self, frame: &mut Frame) {
        // Expire old status messages
        let expired = self
            .status_message
            .as_ref()
            .map(|(_, time)| time.elapsed() >= STATUS_TTL)
            .unwrap_or(false);
        if expired {
            self.status_message = None;
        }

        if self.show_help {
            self.render_help(frame);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(3)])
            .split(frame.area());

        match self.controller.phase() {
            ReviewPhase::Idle => self.render_idle(frame, chunks[0]),
            ReviewPhase::InProgress => self.render_review(frame, chunks[0]),
            ReviewPhase::Complete | ReviewPhase::Submitted => {
                self.render_completion(frame, chunks[0])
            }
        }
        self.render_status_bar(frame, chunks[1]);

        if let Some(task) = self.pending_task {
            self.render_busy(frame, task);
        }
    }

    fn render_idle(&self, frame: &mut Frame, area: Rect) {
        let mut lines = vec![
            Line::from(Span::styled(
                "Image review",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(format!("Folder: {}", self.folder)),
            Line::from(""),
        ];
        if let Some(error) = &self.load_error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
            lines.push(Line::from(""));
            lines.push(Line::from("Press r to retry"));
        }

        let paragraph = Paragraph::new(Text::from(lines))
            .block(Block::default().borders(Borders::ALL).title("Swipe Review"))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn render_review(&self, frame: &mut Frame, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(1)])
            .split(area);

        let (position, total) = self
            .controller
            .session()
            .map(|session| session.cursor().progress())
            .unwrap_or((0, 0));
        let ratio = if total > 0 {
            position as f64 / total as f64
        } else {
            0.0
        };
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progress"))
            .gauge_style(Style::default().fg(Color::Cyan))
            .ratio(ratio)
            .label(format!("Image {} of {}", position + 1, total));
        frame.render_widget(gauge, rows[0]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(rows[1]);

        self.render_card(frame, columns[0]);
        self.render_stack(frame, columns[1]);
    }

    /// Render the current card, tinted by the swipe in progress.
    fn render_card(&self, frame: &mut Frame, area: Rect) {
        let Some((item, state)) = self.controller.current_card() else {
            return;
        };

        let border = match self.swipe_hint {
            Some(Decision::Approve) => Style::default().fg(Color::Green),
            Some(Decision::Reject) => Style::default().fg(Color::Red),
            None => Style::default(),
        };
        let hint = match self.swipe_hint {
            Some(Decision::Approve) => " → APPROVE",
            Some(Decision::Reject) => " ← REJECT",
            None => "",
        };

        let mut lines = vec![Line::from(Span::styled(
            item.asset.label().to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ))];
        lines.push(Line::from(""));
        lines.extend(card_body(state));

        let paragraph = Paragraph::new(Text::from(lines))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border)
                    .title(format!("Card{}", hint)),
            )
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    /// Render the upcoming cards and their preparation state.
    fn render_stack(&self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .controller
            .upcoming(STACK_DEPTH)
            .into_iter()
            .map(|(index, item, state)| {
                let (marker, color) = match state {
                    Some(AssetState::Ready(_)) => ("●", Color::Green),
                    Some(AssetState::Pending(_)) => ("◌", Color::Yellow),
                    Some(AssetState::Unavailable(_)) => ("✗", Color::Red),
                    None => (" ", Color::DarkGray),
                };
                ListItem::new(format!("{} {}. {}", marker, index + 1, item.asset.label()))
                    .style(Style::default().fg(color))
            })
            .collect();

        let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Up next"));
        frame.render_widget(list, area);
    }

    fn render_completion(&self, frame: &mut Frame, area: Rect) {
        let tally = self.controller.tally();
        let mut lines = vec![
            Line::from(Span::styled(
                "Review complete",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(
                format!("  Approved:     {}", tally.approved),
                Style::default().fg(Color::Green),
            )),
            Line::from(Span::styled(
                format!("  Not approved: {}", tally.rejected),
                Style::default().fg(Color::Red),
            )),
            Line::from(format!("  Total:        {}", tally.total)),
            Line::from(""),
        ];

        match &self.receipt {
            Some(receipt) => {
                lines.push(Line::from(Span::styled(
                    format!("✓ {}", receipt),
                    Style::default().fg(Color::Green),
                )));
                lines.push(Line::from(""));
                lines.push(Line::from("r: review again  q: quit"));
            }
            None => {
                lines.push(Line::from(format!(
                    "s: submit ({} entries)  Backspace/u: go back  r: review again  q: quit",
                    self.controller
                        .session()
                        .map(|session| session.submission_entries(self.filter).len())
                        .unwrap_or(0)
                )));
            }
        }

        let paragraph = Paragraph::new(Text::from(lines))
            .block(Block::default().borders(Borders::ALL).title("Summary"))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    /// Render the status bar.
    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let flash = self
            .last_swipe
            .filter(|(_, at)| at.elapsed() < SWIPE_FLASH)
            .map(|(decision, _)| match decision {
                Decision::Approve => "✓ Approved | ",
                Decision::Reject => "✗ Not approved | ",
            })
            .unwrap_or("");

        let status_text = match &self.status_message {
            Some((msg, _)) => format!("{}{}", flash, msg),
            None => {
                let undo = if self.controller.can_undo() {
                    "Backspace/u=undo "
                } else {
                    ""
                };
                format!(
                    "{}Keys: →/l=approve ←/h=reject drag=swipe {}?=help q=quit",
                    flash, undo
                )
            }
        };

        let paragraph = Paragraph::new(status_text)
            .block(Block::default().borders(Borders::ALL))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn render_busy(&self, frame: &mut Frame, task: Task) {
        let message = match task {
            Task::Load => format!("Fetching images for {}…", self.folder),
            Task::Submit => "Submitting review…".to_string(),
        };
        let paragraph = Paragraph::new(message)
            .block(Block::default().borders(Borders::ALL).title("Working"))
            .style(Style::default().fg(Color::Yellow));

        let area = centered_rect(50, 20, frame.area());
        frame.render_widget(Clear, area);
        frame.render_widget(paragraph, area);
    }

    /// Render the help overlay.
    fn render_help(&self, frame: &mut Frame) {
        let help_text = [
            "Swipe Review - Keyboard Shortcuts",
            "",
            "Review:",
            "  → / l         - Approve image",
            "  ← / h         - Reject image",
            "  drag card     - Swipe right to approve, left to reject",
            "  Backspace / u - Undo last decision",
            "",
            "Summary:",
            "  s / Enter     - Submit results",
            "  Backspace / u - Go back to the last image",
            "  r             - Review again",
            "",
            "Other:",
            "  ?             - Show this help",
            "  q / Esc       - Quit",
            "",
            "Press any key to close this help",
        ];

        let text = Text::from(help_text.iter().map(|&s| Line::from(s)).collect::<Vec<_>>());

        let paragraph = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title("Help"))
            .wrap(Wrap { trim: false });

        let area = centered_rect(60, 80, frame.area());
        frame.render_widget(paragraph, area);
    }
}

/// Map a key to a review input for the given phase.
fn key_to_input(code: KeyCode, phase: ReviewPhase) -> Option<ReviewInput> {
    let action = match (phase, code) {
        (ReviewPhase::InProgress, KeyCode::Right | KeyCode::Char('l')) => ReviewAction::Approve,
        (ReviewPhase::InProgress, KeyCode::Left | KeyCode::Char('h')) => ReviewAction::Reject,
        (
            ReviewPhase::InProgress | ReviewPhase::Complete,
            KeyCode::Backspace | KeyCode::Char('u'),
        ) => ReviewAction::Undo,
        _ => return None,
    };
    Some(ReviewInput::key(action))
}

/// Lines describing a card's preparation state.
fn card_body(state: &AssetState<CardPreview>) -> Vec<Line<'static>> {
    match state {
        AssetState::Pending(_) => vec![Line::from(Span::styled(
            "Loading…",
            Style::default().fg(Color::Yellow),
        ))],
        AssetState::Unavailable(reason) => vec![Line::from(Span::styled(
            format!("⚠ Preview unavailable: {}", reason),
            Style::default().fg(Color::Red),
        ))],
        AssetState::Ready(card) => vec![
            Line::from(format!("id:      {}", card.id)),
            Line::from(format!("source:  {}", card.location)),
            Line::from(format!("size:    {} bytes", card.byte_len)),
            Line::from(format!(
                "type:    {}",
                card.content_type.as_deref().unwrap_or("unknown")
            )),
            Line::from(format!("sha256:  {}…", card.digest)),
        ],
    }
}

/// Create a centered rectangle.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Setup the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("Failed to create terminal")
}

/// Restore the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Launch the interactive card review.
///
/// Preparation tasks are spawned on `runtime`; all state changes happen on
/// this thread.
pub fn run_tui(mut app: App, runtime: &Handle) -> Result<()> {
    let _guard = runtime.enter();

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    let mut terminal = setup_terminal()?;

    // Main event loop
    let result = (|| -> Result<()> {
        loop {
            app.controller.pump();
            app.absorb_events();

            terminal
                .draw(|f| app.render(f))
                .context("Failed to draw frame")?;

            if app.should_quit {
                break;
            }

            if let Some(task) = app.pending_task.take() {
                app.run_task(task, runtime);
                continue;
            }

            if event::poll(Duration::from_millis(100)).context("Failed to poll events")? {
                match event::read().context("Failed to read event")? {
                    // Ignore key release events
                    Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                        app.handle_input(key);
                    }
                    Event::Mouse(mouse) => app.handle_mouse(mouse),
                    _ => {}
                }
            }
        }
        Ok(())
    })();

    // Restore terminal in all cases
    restore_terminal(&mut terminal)?;

    result
}
