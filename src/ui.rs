use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, Gauge, GraphType, Paragraph},
};
use std::{
    io::{self, Stdout},
    time::{Duration, Instant},
};

use crate::cli::ChartStyle;
use crate::sampler::{SamplerSession, TickObserver};
use crate::types::{AlertState, Threshold, TickOutcome};

const ALERT_COLOR: (u8, u8, u8) = (205, 92, 92); // indianred
const NORMAL_COLOR: (u8, u8, u8) = (20, 22, 30);
const ALERT_TRANSITION: Duration = Duration::from_secs(1);
const BORDER_COLOR: Color = Color::Rgb(96, 160, 192);
const LABEL_COLOR: Color = Color::Rgb(128, 160, 192);
const KEY_COLOR: Color = Color::Rgb(255, 255, 0);

/// Requests from the UI that main has to act on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    StartCapture,
    StopCapture,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CaptureState {
    Idle,
    Running,
    Failed(String),
}

/// Linear background colour transition between normal and alert tints.
#[derive(Clone, Debug)]
pub struct AlertFade {
    from: (u8, u8, u8),
    target: AlertState,
    changed_at: Option<Instant>,
    duration: Duration,
}

impl AlertFade {
    pub fn new(duration: Duration) -> Self {
        Self {
            from: NORMAL_COLOR,
            target: AlertState::Normal,
            changed_at: None,
            duration,
        }
    }

    fn target_rgb(state: AlertState) -> (u8, u8, u8) {
        match state {
            AlertState::Alert => ALERT_COLOR,
            AlertState::Normal => NORMAL_COLOR,
        }
    }

    pub fn set(&mut self, state: AlertState, now: Instant) {
        if state == self.target {
            return;
        }
        self.from = self.rgb(now);
        self.target = state;
        self.changed_at = Some(now);
    }

    pub fn rgb(&self, now: Instant) -> (u8, u8, u8) {
        let to = Self::target_rgb(self.target);
        let Some(changed_at) = self.changed_at else {
            return to;
        };
        let t = if self.duration.is_zero() {
            1.0
        } else {
            (now.saturating_duration_since(changed_at).as_secs_f32() / self.duration.as_secs_f32())
                .clamp(0.0, 1.0)
        };
        let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        (
            lerp(self.from.0, to.0),
            lerp(self.from.1, to.1),
            lerp(self.from.2, to.2),
        )
    }

    pub fn color(&self, now: Instant) -> Color {
        let (r, g, b) = self.rgb(now);
        Color::Rgb(r, g, b)
    }
}

pub struct App {
    pub should_quit: bool,
    pub capture: CaptureState,
    pub threshold: Threshold,
    pub style: ChartStyle,
    pub y_max: f64,
    pub show_threshold_line: bool,
    pub last_level: Option<f64>,
    pub elapsed_label: String,
    pub samples: (usize, usize),
    pub alert: AlertState,
    pub fade: AlertFade,
    pub points: Vec<(f64, f64)>,
    pub window_secs: f64,
    pub device_name: String,
    pub sample_rate: u32,
    pending: Option<Command>,
}

impl App {
    pub fn new(
        threshold: Threshold,
        style: ChartStyle,
        y_max: f64,
        show_threshold_line: bool,
        window_secs: f64,
    ) -> App {
        App {
            should_quit: false,
            capture: CaptureState::Idle,
            threshold,
            style,
            y_max,
            show_threshold_line,
            last_level: None,
            elapsed_label: String::from("0.00"),
            samples: (0, 0),
            alert: AlertState::Normal,
            fade: AlertFade::new(ALERT_TRANSITION),
            points: Vec::new(),
            window_secs,
            device_name: String::from("-"),
            sample_rate: 0,
            pending: None,
        }
    }

    pub fn take_command(&mut self) -> Option<Command> {
        self.pending.take()
    }

    pub fn is_running(&self) -> bool {
        self.capture == CaptureState::Running
    }

    pub fn capture_started(&mut self, device_name: &str, sample_rate: u32) {
        self.capture = CaptureState::Running;
        self.device_name = device_name.to_string();
        self.sample_rate = sample_rate;
    }

    pub fn capture_failed(&mut self, reason: String) {
        self.capture = CaptureState::Failed(reason);
    }

    /// Drops every trace of the previous session.
    pub fn reset(&mut self) {
        self.capture = CaptureState::Idle;
        self.last_level = None;
        self.elapsed_label = String::from("0.00");
        self.samples = (0, 0);
        self.alert = AlertState::Normal;
        self.fade = AlertFade::new(ALERT_TRANSITION);
        self.points.clear();
    }

    pub fn adjust_threshold(&mut self, delta: f64) {
        self.threshold.nudge(delta);
        log::info!("Threshold set to {}", self.threshold.value());
    }

    pub fn toggle_capture(&mut self) {
        self.pending = Some(if self.is_running() {
            Command::StopCapture
        } else {
            Command::StartCapture
        });
    }

    pub fn record_tick(&mut self, session: &SamplerSession, outcome: &TickOutcome, now: Instant) {
        let buffer = session.buffer();
        self.last_level = Some(outcome.level);
        self.elapsed_label = buffer.label(buffer.last_written());
        self.samples = (buffer.occupancy(), buffer.capacity());
        self.alert = outcome.alert;
        self.fade.set(outcome.alert, now);
        self.points = buffer.points();
    }

    /// X range of the chart: the newest `window_secs` of samples.
    pub fn x_bounds(&self) -> [f64; 2] {
        let newest = self.points.last().map(|p| p.0).unwrap_or(0.0);
        let lo = (newest - self.window_secs).max(0.0);
        [lo, lo + self.window_secs]
    }
}

impl TickObserver for App {
    fn on_tick(&mut self, session: &SamplerSession, outcome: &TickOutcome) {
        self.record_tick(session, outcome, Instant::now());
    }
}

pub type TerminalType = Terminal<CrosstermBackend<Stdout>>;

pub fn init_terminal() -> Result<TerminalType, anyhow::Error> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

pub fn restore_terminal() -> Result<(), anyhow::Error> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture)?;
    Ok(())
}

pub fn handle_events(app: &mut App) -> Result<(), anyhow::Error> {
    if event::poll(Duration::from_millis(0))? {
        if let Event::Key(key) = event::read()? {
            handle_key(app, key);
        }
    }
    Ok(())
}

pub fn handle_key(app: &mut App, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
        return;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            app.should_quit = true;
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
        }
        KeyCode::Char(' ') | KeyCode::Enter => app.toggle_capture(),
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => app.adjust_threshold(1.0),
        KeyCode::Char('-') | KeyCode::Down => app.adjust_threshold(-1.0),
        KeyCode::Char('v') | KeyCode::Char('V') => {
            app.style = app.style.toggled();
        }
        _ => {}
    }
}

pub fn draw_ui(f: &mut Frame, app: &App, now: Instant) {
    let size = f.area();

    if size.width < 40 || size.height < 17 {
        let error_msg = Paragraph::new("Terminal too small!\nMinimum: 40x17")
            .style(Style::default().fg(Color::Red))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(error_msg, size);
        return;
    }

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(4), // Level readout
            Constraint::Min(8),    // Chart
            Constraint::Length(4), // Status bar
        ])
        .split(size);

    draw_title(f, main_layout[0]);
    draw_level(f, main_layout[1], app);
    draw_chart(f, main_layout[2], app, now);
    draw_status_bar(f, main_layout[3], app);
}

fn draw_title(f: &mut Frame, area: Rect) {
    let title = Paragraph::new("🎙 Levelwatch Sound Level Meter")
        .style(
            Style::default()
                .fg(Color::Rgb(128, 224, 208))
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(BORDER_COLOR)),
        );
    f.render_widget(title, area);
}

fn draw_level(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Sound Level ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER_COLOR));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(inner);

    let level_text = app
        .last_level
        .map(|l| format!("{:.2}", l))
        .unwrap_or_else(|| "--".to_string());
    let level_style = if app.alert.is_alert() {
        Style::default().fg(Color::Rgb(255, 128, 128)).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };
    let readout = Paragraph::new(Line::from(vec![
        Span::styled("Level: ", Style::default().fg(LABEL_COLOR)),
        Span::styled(level_text, level_style),
        Span::styled(" | Threshold: ", Style::default().fg(LABEL_COLOR)),
        Span::styled(format!("{}", app.threshold.value()), Style::default().fg(Color::White)),
        Span::styled(" | Elapsed: ", Style::default().fg(LABEL_COLOR)),
        Span::styled(format!("{} s", app.elapsed_label), Style::default().fg(Color::White)),
    ]))
    .alignment(Alignment::Center);
    f.render_widget(readout, rows[0]);

    let ratio = app
        .last_level
        .map(|l| (l / app.y_max).clamp(0.0, 1.0))
        .unwrap_or(0.0);
    let gauge_color = if app.alert.is_alert() {
        Color::Rgb(ALERT_COLOR.0, ALERT_COLOR.1, ALERT_COLOR.2)
    } else {
        Color::Green
    };
    let gauge = Gauge::default()
        .block(Block::default())
        .gauge_style(Style::default().fg(gauge_color))
        .ratio(ratio)
        .label("");
    f.render_widget(gauge, rows[1]);
}

fn axis_labels(bounds: [f64; 2], count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let t = i as f64 / (count - 1) as f64;
            format!("{:.0}", bounds[0] + t * (bounds[1] - bounds[0]))
        })
        .collect()
}

fn draw_chart(f: &mut Frame, area: Rect, app: &App, now: Instant) {
    let style_str = match app.style {
        ChartStyle::Bar => "Bar",
        ChartStyle::Line => "Line",
    };
    let block = Block::default()
        .title(format!(" Sound Level ({}) ", style_str))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER_COLOR));
    let background = Style::default().bg(app.fade.color(now));

    if app.capture == CaptureState::Idle || app.points.is_empty() {
        let msg = match &app.capture {
            CaptureState::Running => "Waiting for audio data...",
            _ => "Press SPACE to start the microphone",
        };
        let waiting = Paragraph::new(msg)
            .style(Style::default().fg(Color::Rgb(128, 128, 128)))
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(waiting, area);
        return;
    }

    let x_bounds = app.x_bounds();
    let y_bounds = [0.0, app.y_max];
    let threshold = app.threshold.value().min(app.y_max);
    let threshold_line = [(x_bounds[0], threshold), (x_bounds[1], threshold)];

    let (graph_type, marker) = match app.style {
        ChartStyle::Bar => (GraphType::Bar, symbols::Marker::HalfBlock),
        ChartStyle::Line => (GraphType::Line, symbols::Marker::Braille),
    };

    let mut datasets = vec![
        Dataset::default()
            .name("Sound Level")
            .marker(marker)
            .graph_type(graph_type)
            .style(Style::default().fg(Color::Green))
            .data(&app.points),
    ];
    if app.show_threshold_line {
        datasets.push(
            Dataset::default()
                .name("Threshold")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Red))
                .data(&threshold_line),
        );
    }

    let chart = Chart::new(datasets)
        .block(block)
        .style(background)
        .x_axis(
            Axis::default()
                .title("Elapsed Time (s)")
                .style(Style::default().fg(Color::Rgb(160, 160, 160)))
                .bounds(x_bounds)
                .labels(axis_labels(x_bounds, 5)),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Rgb(160, 160, 160)))
                .bounds(y_bounds)
                .labels(axis_labels(y_bounds, 4)),
        );
    f.render_widget(chart, area);
}

fn draw_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER_COLOR));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let button = if app.is_running() {
        "Stop Microphone"
    } else {
        "Start Microphone"
    };

    let state_line = match &app.capture {
        CaptureState::Failed(reason) => Line::from(vec![Span::styled(
            format!("Microphone unavailable: {}", reason),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )]),
        _ => Line::from(vec![
            Span::styled("Device: ", Style::default().fg(LABEL_COLOR)),
            Span::styled(app.device_name.clone(), Style::default().fg(Color::White)),
            Span::styled(" | Sample Rate: ", Style::default().fg(LABEL_COLOR)),
            Span::styled(format!("{} Hz", app.sample_rate), Style::default().fg(Color::White)),
            Span::styled(" | Samples: ", Style::default().fg(LABEL_COLOR)),
            Span::styled(
                format!("{}/{}", app.samples.0, app.samples.1),
                Style::default().fg(Color::White),
            ),
        ]),
    };

    let controls_line = Line::from(vec![
        Span::styled("SPACE", Style::default().fg(KEY_COLOR).add_modifier(Modifier::BOLD)),
        Span::styled(format!(" {}, ", button), Style::default().fg(Color::White)),
        Span::styled("+/-", Style::default().fg(KEY_COLOR).add_modifier(Modifier::BOLD)),
        Span::styled(" threshold, ", Style::default().fg(Color::White)),
        Span::styled("V", Style::default().fg(KEY_COLOR).add_modifier(Modifier::BOLD)),
        Span::styled(" bar/line, ", Style::default().fg(Color::White)),
        Span::styled("Q", Style::default().fg(KEY_COLOR).add_modifier(Modifier::BOLD)),
        Span::styled(" quit", Style::default().fg(Color::White)),
    ]);

    let status = Paragraph::new(vec![state_line, controls_line]).alignment(Alignment::Center);
    f.render_widget(status, inner);
}
