mod app;

use std::io;
use std::time::Duration;

use app::{
    capitalize, format_delta, format_forecast_line, step_growth, step_horizon, truncate, AppState,
    ConnectionStatus, Tab, GROWTH_STEP_PCT,
};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, TableState, Tabs, Wrap},
    Frame, Terminal,
};

const SEGMENT_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Magenta,
    Color::Green,
    Color::Yellow,
    Color::LightBlue,
    Color::LightRed,
];

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(base_url);

    // Initial fetch before rendering
    app.refresh(&client).await;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app, &client).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
) -> io::Result<()> {
    let refresh_interval = Duration::from_secs(30);
    let mut last_tick = std::time::Instant::now();
    let mut segment_state = TableState::default();

    loop {
        segment_state.select(Some(app.selected));
        terminal.draw(|f| render(f, app, &mut segment_state))?;

        let timeout = refresh_interval
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                        KeyCode::Char('r') | KeyCode::Char('R') => {
                            app.refresh(client).await;
                            last_tick = std::time::Instant::now();
                        }
                        KeyCode::Tab => app.tab = app.tab.next(),
                        KeyCode::Char('1') => app.tab = Tab::MarginTrends,
                        KeyCode::Char('2') => app.tab = Tab::RevenueTrends,
                        KeyCode::Char('3') => app.tab = Tab::Forecast,
                        KeyCode::Down | KeyCode::Char('j') => {
                            app.select(app.selected + 1);
                            app.refresh_forecast(client).await;
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            app.select(app.selected.saturating_sub(1));
                            app.refresh_forecast(client).await;
                        }
                        KeyCode::Char('+') | KeyCode::Char('=') => {
                            app.growth_pct = Some(step_growth(app.growth_pct.unwrap_or(0.0), GROWTH_STEP_PCT));
                            app.refresh_forecast(client).await;
                        }
                        KeyCode::Char('-') => {
                            app.growth_pct = Some(step_growth(app.growth_pct.unwrap_or(0.0), -GROWTH_STEP_PCT));
                            app.refresh_forecast(client).await;
                        }
                        KeyCode::Char(']') => {
                            app.horizon = step_horizon(app.horizon, 1);
                            app.refresh_forecast(client).await;
                        }
                        KeyCode::Char('[') => {
                            app.horizon = step_horizon(app.horizon, -1);
                            app.refresh_forecast(client).await;
                        }
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= refresh_interval {
            app.refresh(client).await;
            last_tick = std::time::Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, segment_state: &mut TableState) {
    let area = f.area();

    // Outer vertical split: header | tabs | body | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Length(1), // tabs
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_tabs(f, app, chunks[1]);
    match app.tab {
        Tab::MarginTrends => render_margin_tab(f, app, chunks[2]),
        Tab::RevenueTrends => render_revenue_tab(f, app, chunks[2]),
        Tab::Forecast => render_forecast_tab(f, app, segment_state, chunks[2]),
    }
    render_footer(f, chunks[3]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected => ("● connected".to_string(), Color::Green),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };

    let drops = app.drop_count();
    let drop_color = if drops > 0 { Color::Red } else { Color::White };

    let title_spans = vec![
        Span::styled(
            " RevLens  ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(
            format!("{} segments", app.insights.len()),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!("{} periods", app.periods.len()),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(format!("{drops} margin drops"), Style::default().fg(drop_color)),
    ];

    let paragraph = Paragraph::new(Line::from(title_spans))
        .block(Block::default().borders(Borders::ALL).border_style(
            Style::default().fg(Color::DarkGray),
        ));

    f.render_widget(paragraph, area);
}

fn render_tabs(f: &mut Frame, app: &AppState, area: Rect) {
    let titles: Vec<String> = Tab::ALL
        .iter()
        .enumerate()
        .map(|(i, t)| format!(" {} {} ", i + 1, t.title()))
        .collect();
    let tabs = Tabs::new(titles)
        .select(app.tab.index())
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, area);
}

// --- Margin trends ----------------------------------------------------------

fn render_margin_tab(f: &mut Frame, app: &AppState, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);

    let series = app.chart_series(|r| r.gross_margin_pct);
    render_line_chart(f, app, &series, " SEGMENT GROSS MARGIN ", "Margin (%)", rows[0]);
    render_records_table(f, app, bottom[0]);
    render_insights(f, app, bottom[1]);
}

fn render_records_table(f: &mut Frame, app: &AppState, area: Rect) {
    let header_cells = ["Segment", "Quarter", "Margin", "Δ pts", "Flag"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .records
        .iter()
        .map(|r| {
            let delta_color = match r.margin_delta_pct {
                Some(_) if r.drop_flag => Color::Red,
                Some(d) if d >= 0.0 => Color::Green,
                Some(_) => Color::Yellow,
                None => Color::DarkGray,
            };
            let flag = if r.drop_flag { "▼ drop" } else { "" };

            Row::new(vec![
                Cell::from(truncate(&r.segment, 20)),
                Cell::from(r.period.clone()).style(Style::default().fg(Color::DarkGray)),
                Cell::from(format!("{:.2}%", r.gross_margin_pct)),
                Cell::from(format_delta(r.margin_delta_pct)).style(Style::default().fg(delta_color)),
                Cell::from(flag).style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(7),
            Constraint::Length(7),
        ],
    )
    .header(header)
    .block(titled_block(" MARGIN DELTAS "));

    f.render_widget(table, area);
}

fn render_insights(f: &mut Frame, app: &AppState, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();
    for insight in &app.insights {
        let trend_color = match insight.trend_class.as_str() {
            "improving" => Color::Green,
            "declining" => Color::Red,
            _ => Color::Yellow,
        };
        lines.push(Line::from(Span::styled(
            insight.segment.clone(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(vec![
            Span::raw("  Trend: "),
            Span::styled(capitalize(&insight.trend_class), Style::default().fg(trend_color)),
        ]));
        lines.push(Line::from(format!("  Latest Margin: {:.2}%", insight.latest_margin_pct)));
        lines.push(Line::from(format!(
            "  Avg Margin Change: {:.2} pts/quarter",
            insight.avg_margin_delta_pct
        )));
        lines.push(Line::from(Span::styled(
            format!("  Recommendation: {}", capitalize(&insight.recommendation)),
            Style::default().fg(Color::White),
        )));
        lines.push(Line::raw(""));
    }

    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(titled_block(" SEGMENT INSIGHTS "));
    f.render_widget(paragraph, area);
}

// --- Revenue trends ---------------------------------------------------------

fn render_revenue_tab(f: &mut Frame, app: &AppState, area: Rect) {
    let series = app.chart_series(|r| r.revenue);
    render_line_chart(f, app, &series, " SEGMENT REVENUE ", "Revenue ($B)", area);
}

fn render_line_chart(
    f: &mut Frame,
    app: &AppState,
    series: &[(String, Vec<(f64, f64)>)],
    title: &'static str,
    y_title: &'static str,
    area: Rect,
) {
    let (lo, hi) = y_bounds(series);

    let datasets: Vec<Dataset> = series
        .iter()
        .enumerate()
        .map(|(i, (name, points))| {
            Dataset::default()
                .name(name.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(SEGMENT_COLORS[i % SEGMENT_COLORS.len()]))
                .data(points)
        })
        .collect();

    let x_max = app.periods.len().saturating_sub(1).max(1) as f64;
    let x_labels: Vec<String> = match (app.periods.first(), app.periods.last()) {
        (Some(first), Some(last)) if app.periods.len() > 2 => {
            vec![first.clone(), app.periods[app.periods.len() / 2].clone(), last.clone()]
        }
        (Some(first), Some(last)) => vec![first.clone(), last.clone()],
        _ => Vec::new(),
    };
    let y_labels = vec![
        format!("{lo:.2}"),
        format!("{:.2}", (lo + hi) / 2.0),
        format!("{hi:.2}"),
    ];

    let chart = Chart::new(datasets)
        .block(titled_block(title))
        .x_axis(
            Axis::default()
                .title("Quarter")
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, x_max])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title(y_title)
                .style(Style::default().fg(Color::DarkGray))
                .bounds([lo, hi])
                .labels(y_labels),
        );

    f.render_widget(chart, area);
}

/// Padded min/max over all points; (0, 1) when there is nothing to plot.
fn y_bounds(series: &[(String, Vec<(f64, f64)>)]) -> (f64, f64) {
    let values = series.iter().flat_map(|(_, pts)| pts.iter().map(|(_, y)| *y));
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| (lo.min(y), hi.max(y)));
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(0.01);
    (lo - pad, hi + pad)
}

// --- Forecast simulator -----------------------------------------------------

fn render_forecast_tab(f: &mut Frame, app: &AppState, segment_state: &mut TableState, area: Rect) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(area);

    let rows: Vec<Row> = app
        .insights
        .iter()
        .map(|i| Row::new(vec![Cell::from(truncate(&i.segment, 30))]))
        .collect();
    let table = Table::new(rows, [Constraint::Min(10)])
        .block(titled_block(" CHOOSE SEGMENT "))
        .row_highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        );
    f.render_stateful_widget(table, halves[0], segment_state);

    let mut lines: Vec<Line> = Vec::new();
    match &app.forecast {
        Some(fc) => {
            let history = fc
                .historical_growth_pct
                .map_or("—".to_string(), |g| format!("{g:.2}%"));
            lines.push(Line::from(format!("Last Reported Revenue ($B): {:.2}", fc.last_revenue)));
            lines.push(Line::from(format!("Average Quarterly Growth Rate: {history}")));
            lines.push(Line::from(format!("Applied Growth Rate: {:.2}%", fc.applied_growth_pct)));
        }
        None => lines.push(Line::from(Span::styled(
            "No forecast loaded",
            Style::default().fg(Color::DarkGray),
        ))),
    }
    lines.push(Line::raw(""));

    let growth = app.growth_pct.map_or("—".to_string(), |g| format!("{g:.2}%"));
    lines.push(Line::from(vec![
        Span::raw("Forecast Growth Rate: "),
        Span::styled(growth, Style::default().fg(Color::Yellow)),
        Span::styled("   [- +]", Style::default().fg(Color::DarkGray)),
    ]));
    lines.push(Line::from(vec![
        Span::raw("Forecast Quarters Ahead: "),
        Span::styled(app.horizon.to_string(), Style::default().fg(Color::Yellow)),
        Span::styled("   [[ ]]", Style::default().fg(Color::DarkGray)),
    ]));
    lines.push(Line::raw(""));

    if let Some(err) = &app.forecast_error {
        lines.push(Line::from(Span::styled(
            format!("✗ {err}"),
            Style::default().fg(Color::Red),
        )));
    } else if let Some(fc) = &app.forecast {
        lines.push(Line::from(Span::styled(
            "Forecasted Revenue",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        for (i, value) in fc.values.iter().enumerate() {
            lines.push(Line::from(format_forecast_line(i + 1, *value)));
        }
    }

    let title = match app.selected_segment() {
        Some(s) => format!(" FORECAST: {} ", truncate(s, 30)),
        None => " FORECAST ".to_string(),
    };
    let paragraph = Paragraph::new(lines).block(titled_block(title));
    f.render_widget(paragraph, halves[1]);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("refresh  "),
        Span::styled("[tab / 1-3] ", Style::default().fg(Color::Yellow)),
        Span::raw("switch view  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("segment  "),
        Span::styled("[- +] [[ ]] ", Style::default().fg(Color::Yellow)),
        Span::raw("growth / horizon"),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn titled_block<'a>(title: impl Into<String>) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title.into(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}
