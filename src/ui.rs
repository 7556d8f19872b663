use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Frame,
};

use crate::app::{App, LoginField, Mode, CANVAS_HEIGHT, CANVAS_WIDTH, COLORS};
use crate::canvas::CanvasState;
use crate::shapes::{Shape, ShapeType, SHAPE_SIZE};

const SIDEBAR_WIDTH: u16 = 28;

/// Screen regions computed from the terminal area, shared with the event
/// loop for mouse hit-testing.
#[derive(Debug, Clone, Copy)]
pub struct Regions {
    pub header: Rect,
    pub sidebar: Rect,
    pub canvas: Rect,
    pub footer: Rect,
    pub status: Rect,
    pub help: Rect,
}

pub fn regions(area: Rect) -> Regions {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(1),    // Sidebar + canvas
            Constraint::Length(1), // Shape counts footer
            Constraint::Length(1), // Status bar
            Constraint::Length(1), // Help bar
        ])
        .split(area);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
        .split(chunks[1]);

    Regions {
        header: chunks[0],
        sidebar: middle[0],
        canvas: middle[1],
        footer: chunks[2],
        status: chunks[3],
        help: chunks[4],
    }
}

/// Map a terminal cell inside the canvas region to canvas coordinates.
pub fn cell_to_canvas(canvas_area: Rect, column: u16, row: u16) -> Option<(f64, f64)> {
    if canvas_area.width == 0 || canvas_area.height == 0 {
        return None;
    }
    if column < canvas_area.x
        || row < canvas_area.y
        || column >= canvas_area.x + canvas_area.width
        || row >= canvas_area.y + canvas_area.height
    {
        return None;
    }
    // Sample from cell centers so edge cells map inside the canvas.
    let fx = (column - canvas_area.x) as f64 + 0.5;
    let fy = (row - canvas_area.y) as f64 + 0.5;
    let px = fx / canvas_area.width as f64 * CANVAS_WIDTH;
    let py = fy / canvas_area.height as f64 * CANVAS_HEIGHT;
    Some((px, py))
}

/// Render the entire UI
pub fn render(frame: &mut Frame, app: &App) {
    if let Mode::Login {
        username,
        password,
        field,
        error,
    } = &app.mode
    {
        render_login(frame, username, password, *field, error.as_deref());
        return;
    }

    let regions = regions(frame.area());

    render_header(frame, app, regions.header);
    render_sidebar(frame, app, regions.sidebar);
    frame.render_widget(CanvasWidget { canvas: &app.canvas }, regions.canvas);
    render_counts(frame, &app.canvas, regions.footer);
    render_status_bar(frame, app, regions.status);
    render_help_bar(frame, app, regions.help);

    match &app.mode {
        Mode::NameInput { text } => {
            render_prompt(frame, " Painting name ", text, regions.canvas);
        }
        Mode::ImportPath { path } => {
            render_prompt(frame, " Import file ", path, regions.canvas);
        }
        Mode::ExportPath { path } => {
            render_prompt(frame, " Export to ", path, regions.canvas);
        }
        Mode::ConfirmDelete { painting_id } => {
            render_confirm_delete(frame, app, *painting_id, regions.canvas);
        }
        Mode::Normal | Mode::Login { .. } => {}
    }
}

/// Parse a `#rrggbb` color, falling back to white.
fn parse_color(hex: &str) -> Color {
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 {
        return Color::White;
    }
    match (
        u8::from_str_radix(&hex[0..2], 16),
        u8::from_str_radix(&hex[2..4], 16),
        u8::from_str_radix(&hex[4..6], 16),
    ) {
        (Ok(r), Ok(g), Ok(b)) => Color::Rgb(r, g, b),
        _ => Color::White,
    }
}

fn shape_glyph(shape_type: ShapeType) -> char {
    match shape_type {
        ShapeType::Square => '█',
        ShapeType::Circle => '●',
        ShapeType::Triangle => '▲',
        ShapeType::Trapezoid => '▟',
    }
}

/// Custom widget projecting the canvas onto the terminal cell grid.
struct CanvasWidget<'a> {
    canvas: &'a CanvasState,
}

impl CanvasWidget<'_> {
    fn render_shape(&self, buf: &mut Buffer, area: Rect, shape: &Shape) {
        let sx = area.width as f64 / CANVAS_WIDTH;
        let sy = area.height as f64 / CANVAS_HEIGHT;

        let left = (shape.x * sx).floor() as u16;
        let top = (shape.y * sy).floor() as u16;
        let right = ((shape.x + SHAPE_SIZE) * sx).ceil() as u16;
        let bottom = ((shape.y + SHAPE_SIZE) * sy).ceil() as u16;

        let style = Style::default().fg(parse_color(&shape.color));
        let glyph = shape_glyph(shape.shape_type);

        for row in top..bottom.max(top + 1) {
            for col in left..right.max(left + 1) {
                let x = area.x + col;
                let y = area.y + row;
                if x < area.x + area.width && y < area.y + area.height {
                    buf[(x, y)].set_char(glyph).set_style(style);
                }
            }
        }
    }
}

impl Widget for CanvasWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if self.canvas.is_empty() {
            let hint = "Click to place the selected shape";
            let x = area.x + area.width.saturating_sub(hint.len() as u16) / 2;
            let y = area.y + area.height / 2;
            let style = Style::default().fg(Color::DarkGray);
            for (i, ch) in hint.chars().enumerate() {
                let px = x + i as u16;
                if px < area.x + area.width {
                    buf[(px, y)].set_char(ch).set_style(style);
                }
            }
            return;
        }

        for shape in self.canvas.shapes() {
            self.render_shape(buf, area, shape);
        }
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let user = app
        .controller
        .session()
        .current_user()
        .map(|u| u.username.as_str())
        .unwrap_or("-");

    let saved_marker = if app.controller.session().active_painting_id().is_some() {
        ""
    } else {
        " *"
    };

    let spans = vec![
        Span::styled(
            format!(" {}{} ", app.canvas.name, saved_marker),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {} ", user),
            Style::default().fg(Color::DarkGray),
        ),
    ];

    let paragraph = Paragraph::new(Line::from(spans))
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(paragraph, area);
}

fn render_sidebar(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Palette ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let mut lines: Vec<Line> = Vec::new();

    // Color swatches
    let mut color_spans: Vec<Span> = vec![Span::raw(" ")];
    for (i, hex) in COLORS.iter().enumerate() {
        let marker = if i == app.selected_color { "▣ " } else { "■ " };
        color_spans.push(Span::styled(
            marker,
            Style::default().fg(parse_color(hex)),
        ));
    }
    lines.push(Line::from(color_spans));
    lines.push(Line::raw(""));

    // Shape picker
    for shape_type in ShapeType::ALL {
        let selected = shape_type == app.selected_shape;
        let style = if selected {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default().fg(Color::White)
        };
        lines.push(Line::styled(
            format!(" {} {}", shape_glyph(shape_type), shape_type.name()),
            style,
        ));
    }
    lines.push(Line::raw(""));

    // Saved paintings
    let saved = app.controller.saved_paintings();
    lines.push(Line::styled(
        format!(" Saved ({})", saved.len()),
        Style::default().add_modifier(Modifier::BOLD),
    ));
    for (i, summary) in saved.iter().enumerate() {
        let style = if i == app.sidebar_selected {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default().fg(Color::White)
        };
        let when = summary
            .updated_at
            .as_deref()
            .map(|t| format!("  {}", t))
            .unwrap_or_default();
        lines.push(Line::from(vec![
            Span::styled(format!(" {}", summary.name), style),
            Span::styled(when, Style::default().fg(Color::DarkGray)),
        ]));
    }
    if saved.is_empty() {
        lines.push(Line::styled(
            " (none)",
            Style::default().fg(Color::DarkGray),
        ));
    }

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, area);
}

/// Per-type shape counts footer.
fn render_counts(frame: &mut Frame, canvas: &CanvasState, area: Rect) {
    let counts = canvas.counts_by_type();
    let mut parts: Vec<String> = Vec::new();
    for shape_type in ShapeType::ALL {
        parts.push(format!(
            "{}: {}",
            shape_type.name(),
            counts.get(&shape_type).copied().unwrap_or(0)
        ));
    }
    let text = format!(" {}  total: {}", parts.join("  "), canvas.len());
    let paragraph = Paragraph::new(text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (mode_name, mode_bg) = match &app.mode {
        Mode::Normal => ("DRAW", Color::Yellow),
        Mode::Login { .. } => ("LOGIN", Color::Blue),
        Mode::NameInput { .. } => ("NAME", Color::Green),
        Mode::ImportPath { .. } | Mode::ExportPath { .. } => ("FILE", Color::Magenta),
        Mode::ConfirmDelete { .. } => ("CONFIRM", Color::Red),
    };

    let mode_style = Style::default()
        .fg(Color::Black)
        .bg(mode_bg)
        .add_modifier(Modifier::BOLD);

    let busy = if app.controller.is_busy() { " syncing…" } else { "" };
    let status_text = app
        .status_message
        .as_ref()
        .map(|m| format!(" {}", m))
        .unwrap_or_default();

    let spans = vec![
        Span::styled(format!(" {} ", mode_name), mode_style),
        Span::raw(format!(
            " {} {}{}{}",
            app.selected_shape.name(),
            app.selected_color(),
            busy,
            status_text
        )),
    ];

    let paragraph = Paragraph::new(Line::from(spans))
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(paragraph, area);
}

fn render_help_bar(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = match &app.mode {
        Mode::Normal => {
            "click: place  dbl-click: remove | [Tab] shape [c] color [s]ave [n]ew [r]ename [i]mport [e]xport | [j/k] list [Enter] load [d]el [L]ogout [q]uit"
        }
        Mode::NameInput { .. } | Mode::ImportPath { .. } | Mode::ExportPath { .. } => {
            "type | [Enter] confirm [Esc] cancel"
        }
        Mode::ConfirmDelete { .. } => "[y] delete [n/Esc] keep",
        Mode::Login { .. } => "[Tab] switch field [Enter] sign in [Esc] quit",
    };

    let paragraph = Paragraph::new(help_text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

/// Render the full-screen login form.
fn render_login(
    frame: &mut Frame,
    username: &str,
    password: &str,
    field: LoginField,
    error: Option<&str>,
) {
    let area = frame.area();
    let width = 44.min(area.width.saturating_sub(4));
    let height = 8;
    let x = (area.width.saturating_sub(width)) / 2 + area.x;
    let y = (area.height.saturating_sub(height)) / 2 + area.y;
    let popup_area = Rect::new(x, y, width, height).intersection(area);
    if popup_area.is_empty() {
        return;
    }

    let block = Block::default()
        .title(" Sign in ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let field_style = |active: bool| {
        if active {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        }
    };

    let masked: String = "•".repeat(password.chars().count());
    let mut lines = vec![
        Line::raw(""),
        Line::from(vec![
            Span::styled(" Username: ", field_style(field == LoginField::Username)),
            Span::raw(username.to_string()),
            Span::raw(if field == LoginField::Username { "▏" } else { "" }),
        ]),
        Line::from(vec![
            Span::styled(" Password: ", field_style(field == LoginField::Password)),
            Span::raw(masked),
            Span::raw(if field == LoginField::Password { "▏" } else { "" }),
        ]),
        Line::raw(""),
    ];
    if let Some(err) = error {
        lines.push(Line::styled(
            format!(" {}", err),
            Style::default().fg(Color::Red),
        ));
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, popup_area);

    let hint = Paragraph::new("[Tab] switch field  [Enter] sign in  [Esc] quit")
        .style(Style::default().fg(Color::DarkGray));
    let hint_area = Rect::new(
        area.x,
        (y + height).min(area.height.saturating_sub(1)),
        area.width,
        1,
    );
    frame.render_widget(hint, hint_area);
}

/// Render a one-line text prompt overlay
fn render_prompt(frame: &mut Frame, label: &str, value: &str, area: Rect) {
    let width = 50.min(area.width.saturating_sub(4));
    let height = 3;
    let x = (area.width.saturating_sub(width)) / 2 + area.x;
    let y = (area.height.saturating_sub(height)) / 2 + area.y;

    let popup_area = Rect::new(x, y, width, height).intersection(area);
    if popup_area.is_empty() {
        return;
    }
    clear_area(frame, popup_area);

    let block = Block::default()
        .title(label)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(format!("{}▏", value))
        .block(block)
        .style(Style::default().fg(Color::White).bg(Color::Black));

    frame.render_widget(paragraph, popup_area);
}

/// Render the delete confirmation popup
fn render_confirm_delete(frame: &mut Frame, app: &App, painting_id: u64, area: Rect) {
    let name = app
        .controller
        .saved_paintings()
        .iter()
        .find(|s| s.id == painting_id)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| format!("#{painting_id}"));

    let width = 44.min(area.width.saturating_sub(4));
    let height = 4;
    let x = (area.width.saturating_sub(width)) / 2 + area.x;
    let y = (area.height.saturating_sub(height)) / 2 + area.y;

    let popup_area = Rect::new(x, y, width, height).intersection(area);
    if popup_area.is_empty() {
        return;
    }
    clear_area(frame, popup_area);

    let block = Block::default()
        .title(" Delete painting ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));

    let lines = vec![
        Line::raw(format!(" Delete \"{}\"?", name)),
        Line::styled(" [y] delete   [n] keep", Style::default().fg(Color::DarkGray)),
    ];

    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(Style::default().fg(Color::White).bg(Color::Black));
    frame.render_widget(paragraph, popup_area);
}

fn clear_area(frame: &mut Frame, area: Rect) {
    let area = area.intersection(frame.buffer_mut().area);
    for py in area.y..area.y + area.height {
        for px in area.x..area.x + area.width {
            frame.buffer_mut()[(px, py)].set_char(' ');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_mapping_stays_inside_the_canvas() {
        let area = Rect::new(28, 1, 80, 24);

        let (px, py) = cell_to_canvas(area, 28, 1).unwrap();
        assert!(px > 0.0 && px < CANVAS_WIDTH);
        assert!(py > 0.0 && py < CANVAS_HEIGHT);

        let (px, py) = cell_to_canvas(area, 107, 24).unwrap();
        assert!(px < CANVAS_WIDTH);
        assert!(py < CANVAS_HEIGHT);
    }

    #[test]
    fn cells_outside_the_canvas_do_not_map() {
        let area = Rect::new(28, 1, 80, 24);
        assert!(cell_to_canvas(area, 0, 5).is_none());
        assert!(cell_to_canvas(area, 108, 5).is_none());
        assert!(cell_to_canvas(area, 40, 25).is_none());
    }

    #[test]
    fn popups_survive_a_tiny_terminal() {
        use crate::app::App;
        use crate::controller::PersistenceController;
        use ratatui::{backend::TestBackend, Terminal};
        use std::sync::mpsc;

        let mut terminal = Terminal::new(TestBackend::new(30, 4)).unwrap();
        let (tx, _rx) = mpsc::channel();
        let mut app = App::new(PersistenceController::new(tx));

        // Login form, then each popup, on a terminal shorter than any of
        // their fixed heights.
        terminal.draw(|frame| render(frame, &app)).unwrap();

        app.mode = Mode::NameInput {
            text: "x".to_string(),
        };
        terminal.draw(|frame| render(frame, &app)).unwrap();

        app.mode = Mode::ConfirmDelete { painting_id: 1 };
        terminal.draw(|frame| render(frame, &app)).unwrap();
    }

    #[test]
    fn hex_colors_parse_to_rgb() {
        assert_eq!(parse_color("#ff6b6b"), Color::Rgb(0xff, 0x6b, 0x6b));
        assert_eq!(parse_color("45b7d1"), Color::Rgb(0x45, 0xb7, 0xd1));
        assert_eq!(parse_color("nope"), Color::White);
    }
}
