use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Axis, Block, Borders, Chart, Clear, Dataset, Gauge, GraphType, Paragraph};
use ratatui::Frame;

use super::app::{App, View};
use crate::models::MAX_INTENSITY;

const ACCENT: Color = Color::Cyan;
const DIM: Color = Color::DarkGray;
const NORMAL_COLOR: Color = Color::Green;
const ALERT_COLOR: Color = Color::Red;
const THRESHOLD_COLOR: Color = Color::Yellow;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(8),    // History chart
            Constraint::Length(3), // Threshold
            Constraint::Length(3), // Status
            Constraint::Length(1), // Footer
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    render_chart(frame, app, chunks[1]);
    render_threshold(frame, app, chunks[2]);
    render_status(frame, app, chunks[3]);
    render_footer(frame, app, chunks[4]);

    if app.view == View::About {
        render_about_overlay(frame);
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let text = vec![Line::from(vec![
        Span::styled("Input: ", Style::default().fg(DIM)),
        Span::styled(
            app.source_name.as_str(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled("Log: ", Style::default().fg(DIM)),
        Span::styled(app.events_path.display().to_string(), Style::default().fg(DIM)),
    ])];

    let block = Block::default()
        .title(Span::styled(
            " Loudness Monitor ",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT));

    frame.render_widget(Paragraph::new(text).block(block), area);
}

fn render_chart(frame: &mut Frame, app: &App, area: Rect) {
    let points: Vec<(f64, f64)> = app
        .history
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as f64, v))
        .collect();
    let x_max = app.history.len().saturating_sub(1).max(1) as f64;
    let threshold = app.threshold.get();
    let threshold_line = [(0.0, threshold), (x_max, threshold)];

    let level_color = if app.alert { ALERT_COLOR } else { NORMAL_COLOR };

    let datasets = vec![
        Dataset::default()
            .name("level")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(level_color))
            .data(&points),
        Dataset::default()
            .name("threshold")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(THRESHOLD_COLOR))
            .data(&threshold_line),
    ];

    let block = Block::default()
        .title(Span::styled(
            format!(" Intensity {:>7.0} ", app.intensity),
            Style::default().fg(level_color).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT));

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(DIM))
                .bounds([0.0, x_max]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(DIM))
                .bounds([0.0, MAX_INTENSITY])
                .labels(vec![Span::raw("0"), Span::raw("5000"), Span::raw("10000")]),
        );

    frame.render_widget(chart, area);
}

fn render_threshold(frame: &mut Frame, app: &App, area: Rect) {
    let threshold = app.threshold.get();
    let ratio = (threshold / MAX_INTENSITY).clamp(0.0, 1.0);

    let gauge = Gauge::default()
        .block(
            Block::default()
                .title(" Threshold ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT)),
        )
        .gauge_style(Style::default().fg(THRESHOLD_COLOR).bg(Color::Black))
        .ratio(ratio)
        .label(format!("{:.0}", threshold));

    frame.render_widget(gauge, area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::raw(format!(
        "Ticks: {}  Alerts: {}",
        app.ticks, app.alerts
    ))];

    if let Some(ref message) = app.last_error {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("Not saved: {}", message),
            Style::default().fg(ALERT_COLOR),
        ));
    } else if let Some(ref event) = app.last_event {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("Last event: {} at {}", event.intensity, event.date),
            Style::default().fg(Color::White),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT)),
        );
    frame.render_widget(paragraph, area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let keys = match app.view {
        View::Main => "[\u{2190}\u{2192}] \u{b1}100  [\u{2191}\u{2193}] \u{b1}1000  [a]bout  [q]uit",
        View::About => "[Esc] close",
    };
    let footer = Paragraph::new(keys)
        .style(Style::default().fg(DIM))
        .alignment(Alignment::Center);
    frame.render_widget(footer, area);
}

fn render_about_overlay(frame: &mut Frame) {
    let area = centered_rect(44, 10, frame.area());
    frame.render_widget(Clear, area);

    let text = vec![
        Line::from(Span::styled(
            "Loudness Monitor",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!("Version {}", env!("CARGO_PKG_VERSION"))),
        Line::from(""),
        Line::from("Mean absolute amplitude per 1024 samples."),
        Line::from("Levels above the threshold are logged."),
        Line::from(""),
        Line::from(Span::styled("[Esc] close", Style::default().fg(DIM))),
    ];

    let block = Block::default()
        .title(" About ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT));

    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(block);
    frame.render_widget(paragraph, area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
