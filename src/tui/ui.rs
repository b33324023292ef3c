use chrono::{DateTime, Local, NaiveDateTime, Utc};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::api::Task;
use crate::controller::{AuthTab, Detail, ListView, ToastStyle, View};

use super::app::{App, AuthField, InputMode};
use super::form::{field_line, render_hints, render_modal};

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn draw(frame: &mut Frame, app: &App) {
    match app.controller.view() {
        View::Auth => draw_auth(frame, app),
        View::Tasks => draw_tasks(frame, app),
    }
}

// ── Shared chrome ─────────────────────────────────────────────────────

fn draw_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let t = &app.theme;
    let mut spans = vec![Span::styled(
        " tasky ",
        Style::default()
            .fg(t.text_accent)
            .add_modifier(Modifier::BOLD),
    )];
    if let Some(user) = app.controller.username()
        && app.controller.view() == View::Tasks
    {
        spans.push(Span::styled(
            format!(" {user} "),
            Style::default().fg(t.text_secondary),
        ));
    }
    if app.worker_stopped() {
        spans.push(Span::styled(
            " request worker stopped ",
            t.toast_style(ToastStyle::Error),
        ));
    } else if app.controller.in_flight() > 0 {
        let frame_char = SPINNER[app.spinner_frame % SPINNER.len()];
        spans.push(Span::styled(
            format!(" {frame_char} working"),
            Style::default().fg(t.spinner),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Bottom line: the current notification if any, otherwise key hints.
fn draw_status_line(frame: &mut Frame, app: &App, area: Rect, hints: &[(&str, &str)]) {
    let t = &app.theme;
    if let Some(toast) = app.controller.toast() {
        let line = Line::from(Span::styled(
            format!(" {} ", toast.message),
            t.toast_style(toast.style),
        ));
        frame.render_widget(Paragraph::new(line), area);
    } else {
        render_hints(
            frame,
            area,
            hints,
            Style::default().fg(t.text_accent),
            Style::default().fg(t.text_secondary),
        );
    }
}

fn split_screen(area: Rect) -> (Rect, Rect, Rect) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);
    (outer[0], outer[1], outer[2])
}

// ── Auth view ─────────────────────────────────────────────────────────

fn draw_auth(frame: &mut Frame, app: &App) {
    let t = &app.theme;
    let (top, main, bottom) = split_screen(frame.area());
    draw_title_bar(frame, app, top);

    let tab = app.controller.auth_tab();
    let fields = AuthField::order(tab);
    let height = fields.len() as u16 * 2 + 5;
    let width = 56u16.min(main.width.saturating_sub(2));
    let panel = Rect::new(
        main.x + main.width.saturating_sub(width) / 2,
        main.y + main.height.saturating_sub(height) / 2,
        width,
        height.min(main.height),
    );

    let block = Block::default()
        .title(" Welcome ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(t.form_border_auth));
    let inner = block.inner(panel);
    frame.render_widget(block, panel);

    let tab_span = |label: &'static str, this: AuthTab| {
        let style = if this == tab {
            t.tab_active_style()
        } else {
            t.tab_inactive_style()
        };
        Span::styled(label, style)
    };
    let mut lines = vec![
        Line::from(vec![
            Span::raw(" "),
            tab_span(" Login ", AuthTab::Login),
            Span::raw("  "),
            tab_span(" Register ", AuthTab::Register),
        ]),
        Line::from(""),
    ];

    for &field in fields {
        let focused = app.auth.focus == field;
        let label = match field {
            AuthField::Username => " Username: ",
            AuthField::Email => " Email:    ",
            AuthField::Password => " Password: ",
        };
        let label_style = if focused {
            Style::default()
                .fg(t.form_highlight)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(t.form_dim)
        };
        lines.push(field_line(
            label,
            app.auth.field(field),
            focused,
            label_style,
            Style::default().fg(t.text_primary),
        ));
        lines.push(Line::from(""));
    }

    frame.render_widget(Paragraph::new(lines), inner);

    let submit = match tab {
        AuthTab::Login => " log in  ",
        AuthTab::Register => " sign up  ",
    };
    draw_status_line(
        frame,
        app,
        bottom,
        &[
            (" Tab", " next field  "),
            ("Enter", submit),
            ("Ctrl+T", " switch tab  "),
            ("Esc", " quit"),
        ],
    );
}

// ── Task view ─────────────────────────────────────────────────────────

fn draw_tasks(frame: &mut Frame, app: &App) {
    let (top, main, bottom) = split_screen(frame.area());
    draw_title_bar(frame, app, top);
    draw_task_list(frame, app, main);
    draw_status_line(
        frame,
        app,
        bottom,
        &[
            (" n", ":new  "),
            ("Space", ":toggle  "),
            ("d", ":delete  "),
            ("Enter", ":detail  "),
            ("r", ":refresh  "),
            ("L", ":logout  "),
            ("?", ":help  "),
            ("q", ":quit"),
        ],
    );

    if app.controller.detail().is_some() {
        draw_detail(frame, app);
    }
    if app.input_mode == InputMode::NewTask {
        draw_new_task(frame, app);
    }
    if let Some(id) = app.controller.pending_delete() {
        draw_confirm_delete(frame, app, id);
    }
    if app.input_mode == InputMode::Help {
        draw_help(frame, app);
    }
}

fn draw_task_list(frame: &mut Frame, app: &App, area: Rect) {
    let t = &app.theme;
    let focused = app.controller.detail().is_none() && app.input_mode == InputMode::Normal;
    let border = if focused {
        t.focused_border()
    } else {
        t.unfocused_border()
    };

    let message = match app.controller.list() {
        ListView::Tasks(tasks) => {
            draw_task_rows(frame, app, area, tasks, border);
            return;
        }
        ListView::Loading => "  Loading tasks...",
        ListView::Failed => "  Failed to load tasks",
        ListView::Empty => "  No tasks yet. Create your first task!",
    };
    let block = Block::default()
        .title(" Tasks ")
        .borders(Borders::ALL)
        .border_style(border);
    let msg = Paragraph::new(message)
        .style(Style::default().fg(t.text_secondary))
        .block(block);
    frame.render_widget(msg, area);
}

fn draw_task_rows(frame: &mut Frame, app: &App, area: Rect, tasks: &[Task], border: Style) {
    let block = Block::default()
        .title(format!(" Tasks ({}) ", tasks.len()))
        .borders(Borders::ALL)
        .border_style(border);

    let now = Utc::now();
    let items: Vec<ListItem> = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| task_item(app, task, i == app.selected, now))
        .collect();

    let mut state = ListState::default().with_selected(Some(app.selected));
    frame.render_stateful_widget(List::new(items).block(block), area, &mut state);
}

fn task_item<'a>(app: &App, task: &'a Task, selected: bool, now: DateTime<Utc>) -> ListItem<'a> {
    let t = &app.theme;
    let marker = if selected {
        Span::styled("▸ ", Style::default().fg(t.selection_indicator))
    } else {
        Span::raw("  ")
    };
    let mut title = vec![
        marker,
        Span::styled(task.status.symbol(), t.task_status_style(task.status)),
        Span::raw(" "),
        Span::styled(&task.title, t.task_title_style(task.status, selected)),
    ];
    if app.controller.is_busy(task.id) {
        title.push(Span::styled("  …", Style::default().fg(t.spinner)));
    }

    let mut meta = vec![Span::raw("    ")];
    if !task.description.is_empty() {
        meta.push(Span::styled(
            format!("{}  ", task.description),
            Style::default().fg(t.text_secondary),
        ));
    }
    meta.push(Span::styled(
        format_age(task.created_at.as_deref(), now),
        Style::default().fg(t.form_dim),
    ));

    ListItem::new(vec![Line::from(title), Line::from(meta)])
}

// ── Overlays ──────────────────────────────────────────────────────────

fn draw_detail(frame: &mut Frame, app: &App) {
    let t = &app.theme;
    let inner = render_modal(frame, " Task Detail ", t.focused_border(), 64, 16);
    let label = Style::default().fg(t.text_secondary);
    let value = Style::default().fg(t.text_primary);

    let lines = match app.controller.detail() {
        Some(Detail::Loading(_)) | None => vec![Line::from(Span::styled(
            "  Loading task details...",
            label,
        ))],
        Some(Detail::Failed { message, .. }) => vec![Line::from(Span::styled(
            format!("  Failed to load task details: {message}"),
            Style::default().fg(t.toast_error),
        ))],
        Some(Detail::Loaded(task)) => {
            let now = Utc::now();
            let description = if task.description.is_empty() {
                Span::styled("No description", label)
            } else {
                Span::styled(task.description.as_str(), value)
            };
            vec![
                Line::from(Span::styled(
                    format!("  {}", task.title),
                    value.add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(vec![Span::raw("  "), description]),
                Line::from(""),
                Line::from(vec![
                    Span::styled("  ID:      ", label),
                    Span::styled(task.id.to_string(), value),
                ]),
                Line::from(vec![
                    Span::styled("  Status:  ", label),
                    Span::styled(
                        format!("{} {}", task.status.symbol(), task.status),
                        t.task_status_style(task.status),
                    ),
                ]),
                Line::from(vec![
                    Span::styled("  Created: ", label),
                    Span::styled(format_age(task.created_at.as_deref(), now), value),
                ]),
                Line::from(vec![
                    Span::styled("  Updated: ", label),
                    Span::styled(format_age(task.updated_at.as_deref(), now), value),
                ]),
                Line::from(""),
                Line::from(vec![
                    Span::styled("  Space", Style::default().fg(t.text_accent)),
                    Span::styled(format!(": {}  ", task.status.toggle_label()), label),
                    Span::styled("d", Style::default().fg(t.text_accent)),
                    Span::styled(": delete  ", label),
                    Span::styled("Esc", Style::default().fg(t.text_accent)),
                    Span::styled(": close", label),
                ]),
            ]
        }
    };

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

fn draw_new_task(frame: &mut Frame, app: &App) {
    let t = &app.theme;
    let form = &app.task_form;
    let inner = render_modal(
        frame,
        " New Task ",
        Style::default().fg(t.form_border_task),
        60,
        10,
    );

    let label_style = |field: u8| {
        if form.field == field {
            Style::default()
                .fg(t.form_highlight)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(t.form_dim)
        }
    };
    let value = Style::default().fg(t.text_primary);

    let lines = vec![
        field_line(" Title:       ", &form.title, form.field == 0, label_style(0), value),
        Line::from(""),
        field_line(
            " Description: ",
            &form.description,
            form.field == 1,
            label_style(1),
            value,
        ),
        Line::from(""),
        Line::from(vec![
            Span::styled(" Status:      ", label_style(2)),
            Span::styled(
                format!("◀ {} ▶", form.status),
                t.task_status_style(form.status),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            " Tab: next field  Enter: next / create  Esc: cancel",
            Style::default().fg(t.form_dim),
        )),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
}

fn draw_confirm_delete(frame: &mut Frame, app: &App, id: i64) {
    let t = &app.theme;
    let inner = render_modal(
        frame,
        " Delete Task ",
        Style::default().fg(t.form_border_danger),
        50,
        6,
    );
    let title = app
        .controller
        .tasks()
        .iter()
        .find(|task| task.id == id)
        .map_or_else(|| format!("task #{id}"), |task| format!("\"{}\"", task.title));

    let lines = vec![
        Line::from(format!(" Are you sure you want to delete {title}?")),
        Line::from(""),
        Line::from(vec![
            Span::styled(" y", Style::default().fg(t.toast_error)),
            Span::styled(": delete  ", Style::default().fg(t.text_secondary)),
            Span::styled("n/Esc", Style::default().fg(t.text_accent)),
            Span::styled(": cancel", Style::default().fg(t.text_secondary)),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

fn draw_help(frame: &mut Frame, app: &App) {
    let t = &app.theme;
    let sections = app.keymap.help_entries();
    let rows: usize = sections.iter().map(|(_, e)| e.len() + 2).sum();
    let inner = render_modal(
        frame,
        " Keys ",
        t.focused_border(),
        52,
        rows as u16 + 2,
    );

    let mut lines = Vec::new();
    for (category, entries) in sections {
        lines.push(Line::from(Span::styled(
            category,
            Style::default()
                .fg(t.text_accent)
                .add_modifier(Modifier::BOLD),
        )));
        for entry in entries {
            lines.push(Line::from(vec![
                Span::styled(format!("{:<12}", entry.label), Style::default().fg(t.form_highlight)),
                Span::styled(entry.description, Style::default().fg(t.text_primary)),
            ]));
        }
        lines.push(Line::from(""));
    }
    frame.render_widget(Paragraph::new(lines), inner);
}

// ── Formatting ────────────────────────────────────────────────────────

/// Parse a backend timestamp. Values without an offset are UTC.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Relative age for recent timestamps, local date and time beyond a day.
pub fn format_age(timestamp: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(raw) = timestamp.filter(|s| !s.trim().is_empty()) else {
        return "No date".to_string();
    };
    let Some(at) = parse_timestamp(raw.trim()) else {
        return raw.to_string();
    };

    let minutes = now.signed_duration_since(at).num_minutes();
    let plural = |n: i64| if n == 1 { "" } else { "s" };
    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} minute{} ago", plural(minutes))
    } else if minutes < 1440 {
        let hours = minutes / 60;
        format!("{hours} hour{} ago", plural(hours))
    } else {
        at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use ratatui::{Terminal, backend::TestBackend};

    use super::*;
    use crate::api::transport::fake::FakeTransport;
    use crate::controller::{Completion, Reply};
    use crate::tui::app::tests::{logged_in, logged_in_with_tasks, test_app};

    fn screen(app: &App) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| draw(frame, app)).unwrap();
        let buffer = terminal.backend().buffer();
        (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol())
                    .collect()
            })
            .collect()
    }

    fn rows_containing(lines: &[String], text: &str) -> Vec<usize> {
        lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.contains(text))
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn empty_list_shows_empty_state() {
        let mut app = test_app(logged_in(), FakeTransport::default());
        let batch = app.controller.take_dispatches();
        app.controller.complete(Completion {
            ticket: batch[0].ticket,
            result: Ok(Reply::Tasks(Vec::new())),
        });

        let lines = screen(&app);
        assert_eq!(
            rows_containing(&lines, "No tasks yet. Create your first task!").len(),
            1
        );
        assert!(rows_containing(&lines, "Tasks (").is_empty());
    }

    #[test]
    fn each_task_gets_one_row_in_backend_order() {
        let app = logged_in_with_tasks();
        let lines = screen(&app);

        let milk = rows_containing(&lines, "Buy milk");
        let bread = rows_containing(&lines, "Bake bread");
        assert_eq!(milk.len(), 1);
        assert_eq!(bread.len(), 1);
        assert!(milk[0] < bread[0]);
        assert_eq!(rows_containing(&lines, "Tasks (2)").len(), 1);
        assert!(rows_containing(&lines, "No tasks yet").is_empty());
    }

    #[test]
    fn stopped_worker_is_shown_in_title_bar() {
        // No scripted reply for the startup fetch, so the request thread dies.
        let mut app = test_app(logged_in(), FakeTransport::default());
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !app.worker_stopped() && std::time::Instant::now() < deadline {
            app.pump();
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(app.worker_stopped());

        let lines = screen(&app);
        assert_eq!(rows_containing(&lines, "request worker stopped"), [0]);
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn missing_timestamp_reads_no_date() {
        assert_eq!(format_age(None, now()), "No date");
        assert_eq!(format_age(Some(""), now()), "No date");
    }

    #[test]
    fn recent_timestamps_are_relative() {
        assert_eq!(format_age(Some("2024-05-01T11:59:30"), now()), "Just now");
        assert_eq!(format_age(Some("2024-05-01T11:59:00"), now()), "1 minute ago");
        assert_eq!(format_age(Some("2024-05-01T11:15:00"), now()), "45 minutes ago");
        assert_eq!(format_age(Some("2024-05-01T11:00:00"), now()), "1 hour ago");
        assert_eq!(format_age(Some("2024-04-30T12:30:00.123456"), now()), "23 hours ago");
    }

    #[test]
    fn offsets_are_respected() {
        assert_eq!(
            format_age(Some("2024-05-01T13:30:00+02:00"), now()),
            "30 minutes ago"
        );
        assert_eq!(format_age(Some("2024-05-01T11:50:00Z"), now()), "10 minutes ago");
    }

    #[test]
    fn future_timestamps_read_just_now() {
        assert_eq!(format_age(Some("2024-05-01T12:05:00"), now()), "Just now");
    }

    #[test]
    fn old_timestamps_show_a_date() {
        let shown = format_age(Some("2023-07-15T12:00:00"), now());
        assert!(shown.starts_with("2023-07-1"), "got {shown}");
    }

    #[test]
    fn unparseable_timestamp_is_shown_raw() {
        assert_eq!(format_age(Some("yesterday"), now()), "yesterday");
    }
}
