use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block as Panel, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
};
use multichat_core::url::normalize_csv_url;
use multichat_core::{
    AttachmentKind, Block, Inline, MessageRecord, Role, StatusLevel, Suggestion, Theme,
};
use crate::app::{App, InputMode, Popup};

/// Colors for one theme.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub user: Color,
    pub bot: Color,
    pub text: Color,
    pub dim: Color,
    pub code: Color,
    pub accent: Color,
    pub bar_bg: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Self {
                user: Color::Blue,
                bot: Color::Magenta,
                text: Color::Reset,
                dim: Color::DarkGray,
                code: Color::Red,
                accent: Color::Blue,
                bar_bg: Color::Gray,
            },
            Theme::Dark => Self {
                user: Color::Cyan,
                bot: Color::Yellow,
                text: Color::White,
                dim: Color::Gray,
                code: Color::LightGreen,
                accent: Color::Cyan,
                bar_bg: Color::DarkGray,
            },
        }
    }
}

/// Convert inline spans to styled ratatui spans
fn inline_spans(spans: &[Inline], palette: Palette) -> Vec<Span<'static>> {
    let mut out = Vec::new();
    push_inline(spans, Style::default().fg(palette.text), palette, &mut out);
    out
}

fn push_inline(spans: &[Inline], base: Style, palette: Palette, out: &mut Vec<Span<'static>>) {
    for span in spans {
        match span {
            Inline::Text(t) => out.push(Span::styled(t.clone(), base)),
            Inline::Strong(inner) => {
                push_inline(inner, base.add_modifier(Modifier::BOLD), palette, out)
            }
            Inline::Emphasis(inner) => {
                push_inline(inner, base.add_modifier(Modifier::ITALIC), palette, out)
            }
            Inline::Code(t) => out.push(Span::styled(format!("`{}`", t), base.fg(palette.code))),
        }
    }
}

/// Rough decoded size of a base64 data URL payload.
fn data_url_size(src: &str) -> usize {
    let payload = src.split_once(',').map(|(_, p)| p).unwrap_or(src);
    payload.trim_end_matches('=').len() * 3 / 4
}

fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

/// Lines for one persisted message. The chat pane is rebuilt from records on every frame.
pub fn message_lines(record: &MessageRecord, palette: Palette) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let (label, color) = match record.role {
        Role::User => ("You:", palette.user),
        Role::Bot => ("AI:", palette.bot),
    };
    lines.push(Line::from(Span::styled(
        label,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )));

    for block in record.blocks() {
        match block {
            Block::Paragraph(spans) => {
                // Paragraphs keep the author's line breaks
                let mut current: Vec<Span<'static>> = Vec::new();
                for span in inline_spans(&spans, palette) {
                    let content = span.content.to_string();
                    let mut parts = content.split('\n');
                    if let Some(first) = parts.next() {
                        if !first.is_empty() {
                            current.push(Span::styled(first.to_string(), span.style));
                        }
                    }
                    for part in parts {
                        lines.push(Line::from(std::mem::take(&mut current)));
                        if !part.is_empty() {
                            current.push(Span::styled(part.to_string(), span.style));
                        }
                    }
                }
                lines.push(Line::from(current));
            }
            Block::List(items) => {
                for item in items {
                    let mut spans = vec![Span::styled("  • ", Style::default().fg(color))];
                    spans.extend(inline_spans(&item, palette));
                    lines.push(Line::from(spans));
                }
            }
            Block::Code(code) => {
                for code_line in code.lines() {
                    lines.push(Line::from(vec![
                        Span::styled("  │ ", Style::default().fg(palette.dim)),
                        Span::styled(code_line.to_string(), Style::default().fg(palette.code)),
                    ]));
                }
            }
            Block::Image { alt, src } => {
                lines.push(Line::from(Span::styled(
                    format!("  [image: {} ({})]", alt, format_size(data_url_size(&src))),
                    Style::default().fg(palette.accent).add_modifier(Modifier::ITALIC),
                )));
            }
        }
    }

    if let Some(note) = &record.attachment {
        let icon = match note.kind {
            AttachmentKind::Image => "🖼",
            AttachmentKind::Csv => "📄",
        };
        lines.push(Line::from(Span::styled(
            format!("  {} {}", icon, note.name),
            Style::default().fg(palette.dim),
        )));
    }

    lines.push(Line::from(Span::styled(
        record.time_label(),
        Style::default().fg(palette.dim).add_modifier(Modifier::DIM),
    )));
    lines.push(Line::default());
    lines
}

fn welcome_lines(palette: Palette) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            "Welcome to Multichat",
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "Chat, analyze images, or explore CSV data. Pick a starting point:",
            Style::default().fg(palette.dim),
        )),
        Line::default(),
    ];

    for (i, suggestion) in Suggestion::all().iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(
                format!(" {} ", i + 1),
                Style::default().bg(palette.bar_bg).fg(Color::White).bold(),
            ),
            Span::styled(
                format!(" {}", suggestion.title()),
                Style::default().fg(palette.text).add_modifier(Modifier::BOLD),
            ),
        ]));
        lines.push(Line::from(Span::styled(
            format!("     {}", suggestion.description()),
            Style::default().fg(palette.dim),
        )));
    }
    lines
}

/// Rows the chat text takes up once word-wrapped to `width` columns.
fn wrapped_height(text: &Text<'static>, width: u16) -> u16 {
    let rows = Paragraph::new(text.clone())
        .wrap(Wrap { trim: false })
        .line_count(width);
    rows.min(u16::MAX as usize) as u16
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let palette = Palette::for_theme(app.chat.theme());

    let attachment_height = if app.chat.pending().is_some() { 1 } else { 0 };

    // Main layout: header, chat, attachment bar, input, footer
    let [header_area, chat_area, attachment_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(attachment_height),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area, palette);
    render_chat(app, frame, chat_area, palette);
    if attachment_height > 0 {
        render_attachment_bar(app, frame, attachment_area, palette);
    }
    render_input(app, frame, input_area, palette);
    render_footer(app, frame, footer_area);

    match &app.popup {
        Some(Popup::AttachFile { kind, input }) => {
            render_attach_popup(frame, area, *kind, input, palette)
        }
        Some(Popup::CsvUrl { input }) => render_csv_url_popup(frame, area, input, palette),
        Some(Popup::ConfirmClear) => render_confirm_clear(frame, area),
        None => {}
    }

    render_status(app, frame, area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect, palette: Palette) {
    let title = Line::from(vec![
        Span::styled(" Multichat ", Style::default().fg(palette.accent).bold()),
        Span::styled(
            format!("[{}]", app.chat.session()),
            Style::default().fg(Color::White),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::White),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(palette.bar_bg));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect, palette: Palette) {
    let border_color = if app.input_mode == InputMode::Normal {
        palette.accent
    } else {
        Color::DarkGray
    };
    let block = Panel::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" Chat ({}) ", app.chat.theme().as_str()));

    let inner = block.inner(area);
    app.chat_height = inner.height;

    let mut lines: Vec<Line> = if app.chat.welcome_visible() {
        welcome_lines(palette)
    } else {
        app.chat
            .records()
            .iter()
            .flat_map(|record| message_lines(record, palette))
            .collect()
    };

    if app.chat.is_busy() {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(palette.bot).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("AI is typing{}", dots),
            Style::default().fg(palette.dim).add_modifier(Modifier::ITALIC),
        )));
    }

    let text = Text::from(lines);
    app.chat_total_lines = wrapped_height(&text, inner.width);
    if app.follow_bottom {
        app.chat_scroll = app.max_scroll();
    } else {
        app.chat_scroll = app.chat_scroll.min(app.max_scroll());
    }

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);

    if app.chat_total_lines > app.chat_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state = ScrollbarState::new(app.max_scroll() as usize)
            .position(app.chat_scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn render_attachment_bar(app: &App, frame: &mut Frame, area: Rect, palette: Palette) {
    let Some(attachment) = app.chat.pending() else {
        return;
    };
    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", attachment.kind.as_str().to_uppercase()),
            Style::default().bg(palette.accent).fg(Color::Black).bold(),
        ),
        Span::styled(
            format!(" {} ({}) ", attachment.name, format_size(attachment.size as usize)),
            Style::default().fg(palette.text),
        ),
        Span::styled("x to remove", Style::default().fg(palette.dim)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect, palette: Palette) {
    let editing = app.input_mode == InputMode::Editing && app.popup.is_none();
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let title = if app.chat.is_busy() {
        " Message (waiting for reply) "
    } else {
        " Message "
    };

    let input_block = Panel::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    // Newlines are shown as a return arrow on the single input row
    let visible_text: String = app
        .input
        .chars()
        .map(|c| if c == '\n' { '↵' } else { c })
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(palette.user))
        .block(input_block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " INSERT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: &[(&str, &str)] = match (&app.popup, app.input_mode) {
        (Some(Popup::ConfirmClear), _) => &[(" y ", " clear "), (" n ", " keep ")],
        (Some(_), _) => &[(" Enter ", " submit "), (" Esc ", " cancel ")],
        (None, InputMode::Editing) => &[
            (" Enter ", " send "),
            (" Alt+Enter ", " newline "),
            (" Esc ", " commands "),
        ],
        (None, InputMode::Normal) => &[
            (" i ", " type "),
            (" a ", " attach "),
            (" u ", " csv url "),
            (" x ", " detach "),
            (" e ", " export "),
            (" C ", " clear "),
            (" t ", " theme "),
            (" j/k ", " scroll "),
            (" q ", " quit "),
        ],
    };

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
    ];
    for (key, label) in pairs {
        spans.push(Span::styled(*key, key_style));
        spans.push(Span::styled(*label, label_style));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

/// Shared layout for the single-field dialogs: instructions, input row, hint row.
fn render_prompt(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    instructions: &str,
    input: &str,
    hint: Line<'static>,
    border: Color,
) {
    let popup_area = centered(area, 64, 7);
    frame.render_widget(Clear, popup_area);

    let block = Panel::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(format!(" {} ", title));
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new(instructions.to_string())
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    // Keep the tail of long paths and URLs in view
    let width = inner.width as usize;
    let count = input.chars().count();
    let skip = count.saturating_sub(width.saturating_sub(1));
    let visible: String = input.chars().skip(skip).collect();
    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    frame.render_widget(
        Paragraph::new(visible.clone()).style(Style::default().fg(Color::Cyan)),
        input_area,
    );
    frame.set_cursor_position((
        input_area.x + visible.chars().count() as u16,
        input_area.y,
    ));

    frame.render_widget(
        Paragraph::new(hint),
        Rect::new(inner.x, inner.y + 4, inner.width, 1),
    );
}

fn render_attach_popup(
    frame: &mut Frame,
    area: Rect,
    kind: Option<AttachmentKind>,
    input: &str,
    palette: Palette,
) {
    let title = match kind {
        Some(AttachmentKind::Image) => "Attach Image",
        Some(AttachmentKind::Csv) => "Attach CSV",
        None => "Attach File",
    };
    let hint = match kind {
        Some(AttachmentKind::Image) => "png, jpg, jpeg, gif, webp, bmp up to 10MB",
        Some(AttachmentKind::Csv) => ".csv up to 5MB",
        None => "Images up to 10MB, CSV files up to 5MB",
    };
    render_prompt(
        frame,
        area,
        title,
        "Type or paste a file path. Enter to attach, Esc to cancel.",
        input,
        Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))),
        palette.accent,
    );
}

fn render_csv_url_popup(frame: &mut Frame, area: Rect, input: &str, palette: Palette) {
    let hint = if input.trim().is_empty() {
        Line::from(Span::styled(
            "GitHub links are converted to raw file URLs",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        match normalize_csv_url(input) {
            Ok(url) => Line::from(vec![
                Span::styled("Load: ", Style::default().fg(Color::Green).bold()),
                Span::styled(url, Style::default().fg(Color::DarkGray)),
            ]),
            Err(e) => Line::from(Span::styled(
                format!("{} (Enter disabled)", e),
                Style::default().fg(Color::Red),
            )),
        }
    };
    render_prompt(
        frame,
        area,
        "Load CSV from URL",
        "Paste a link to a CSV file. Enter to load, Esc to cancel.",
        input,
        hint,
        palette.accent,
    );
}

fn render_confirm_clear(frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 50, 5);
    frame.render_widget(Clear, popup_area);

    let block = Panel::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Clear Chat ");

    let text = Text::from(vec![
        Line::from("Are you sure you want to clear the chat history?"),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(Color::Red).fg(Color::White).bold()),
            Span::raw(" clear   "),
            Span::styled(" n ", Style::default().bg(Color::DarkGray).fg(Color::White).bold()),
            Span::raw(" cancel"),
        ]),
    ]);
    frame.render_widget(Paragraph::new(text).block(block), popup_area);
}

fn status_style(level: StatusLevel) -> Style {
    let bg = match level {
        StatusLevel::Success => Color::Green,
        StatusLevel::Error => Color::Red,
        StatusLevel::Warning => Color::Yellow,
        StatusLevel::Info => Color::Blue,
    };
    let fg = match level {
        StatusLevel::Warning => Color::Black,
        _ => Color::White,
    };
    Style::default().bg(bg).fg(fg).add_modifier(Modifier::BOLD)
}

/// Transient banner in the top-right corner
fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    let Some(status) = app.chat.status().visible() else {
        return;
    };
    let text = format!(" {} ", status.message);
    let width = (text.chars().count() as u16).min(area.width);
    if width == 0 || area.height < 2 {
        return;
    }
    let banner = Rect::new(area.x + area.width - width, area.y + 1, width, 1);
    frame.render_widget(Clear, banner);
    frame.render_widget(
        Paragraph::new(text).style(status_style(status.level)),
        banner,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use multichat_core::{ApiReply, BackendClient, ChatController, LocalStore};
    use ratatui::{backend::TestBackend, Terminal};
    use tempfile::TempDir;

    fn text_of(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn bot_message_renders_blocks() {
        let record = MessageRecord::bot("Intro **bold**\n- one\n- two\n```\nlet x = 1;\n```");
        let lines = text_of(&message_lines(&record, Palette::for_theme(Theme::Dark)));

        assert_eq!(lines[0], "AI:");
        assert_eq!(lines[1], "Intro bold");
        assert_eq!(lines[2], "  • one");
        assert_eq!(lines[3], "  • two");
        assert_eq!(lines[4], "  │ let x = 1;");
        assert!(lines.last().unwrap().is_empty());
    }

    #[test]
    fn paragraph_keeps_line_breaks() {
        let record = MessageRecord::user("first\nsecond");
        let lines = text_of(&message_lines(&record, Palette::for_theme(Theme::Light)));
        assert_eq!(lines[0], "You:");
        assert_eq!(lines[1], "first");
        assert_eq!(lines[2], "second");
    }

    #[test]
    fn image_block_shows_placeholder() {
        let record = MessageRecord::bot("![Sales](data:image/png;base64,AAAA)");
        let lines = text_of(&message_lines(&record, Palette::for_theme(Theme::Dark)));
        assert_eq!(lines[1], "  [image: Sales (3 B)]");
    }

    #[test]
    fn wrapped_height_wraps_at_words() {
        // Eight columns of text, but "bcde" cannot share a row with "a "
        assert_eq!(wrapped_height(&Text::from("a bcde f"), 4), 3);
        assert_eq!(wrapped_height(&Text::from(vec![Line::default(), Line::from("ab")]), 4), 2);
        assert_eq!(wrapped_height(&Text::from("abc"), 0), 0);
    }

    #[test]
    fn long_reply_scrolls_to_its_last_line() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let mut app = App::new(
            ChatController::open(store).unwrap(),
            BackendClient::new("http://127.0.0.1:9"),
        );

        let words = vec!["abcdefghijklmno"; 12].join(" ");
        let reply = format!("{words}\n{words}\n{words}\nENDMARK");
        let request = app.chat.begin_send("tell me").unwrap();
        app.chat.complete_send(&request, Ok(ApiReply::ok(reply)));

        let mut terminal = Terminal::new(TestBackend::new(24, 20)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let screen: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("ENDMARK"));
        assert_eq!(app.chat_scroll, app.max_scroll());
    }

    #[test]
    fn welcome_lists_three_suggestions() {
        let lines = text_of(&welcome_lines(Palette::for_theme(Theme::Light)));
        let numbered = lines.iter().filter(|l| l.starts_with(" 1 ") || l.starts_with(" 2 ") || l.starts_with(" 3 ")).count();
        assert_eq!(numbered, 3);
    }
}
