use ratatui::style::{Color, Modifier, Style};
use serde::Deserialize;

use crate::api::TaskStatus;
use crate::controller::ToastStyle;

/// Semantic colour theme for the dashboard.
///
/// Every colour used by the renderer is stored here so the user can
/// override any of them via `[theme]` in `config.toml`.
#[derive(Debug, Clone)]
pub struct Theme {
    // ── Borders ───────────────────────────────────────────────
    pub border_focused: Color,
    pub border_unfocused: Color,

    // ── Text ──────────────────────────────────────────────────
    pub text_primary: Color,
    pub text_secondary: Color,
    pub text_accent: Color,

    // ── Task status ───────────────────────────────────────────
    pub status_pending: Color,
    pub status_completed: Color,

    // ── Toast ─────────────────────────────────────────────────
    pub toast_info: Color,
    pub toast_success: Color,
    pub toast_error: Color,

    // ── Forms ─────────────────────────────────────────────────
    pub form_border_task: Color,
    pub form_border_auth: Color,
    pub form_border_danger: Color,
    pub form_highlight: Color,
    pub form_dim: Color,

    // ── Tabs ──────────────────────────────────────────────────
    pub tab_active: Color,
    pub tab_inactive: Color,

    // ── Misc ──────────────────────────────────────────────────
    pub selection_indicator: Color,
    pub spinner: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            border_focused: Color::Cyan,
            border_unfocused: Color::DarkGray,

            text_primary: Color::White,
            text_secondary: Color::DarkGray,
            text_accent: Color::Cyan,

            status_pending: Color::Yellow,
            status_completed: Color::Green,

            toast_info: Color::Cyan,
            toast_success: Color::Green,
            toast_error: Color::Red,

            form_border_task: Color::Yellow,
            form_border_auth: Color::Cyan,
            form_border_danger: Color::Red,
            form_highlight: Color::Yellow,
            form_dim: Color::DarkGray,

            tab_active: Color::Cyan,
            tab_inactive: Color::DarkGray,

            selection_indicator: Color::Cyan,
            spinner: Color::Yellow,
        }
    }
}

impl Theme {
    pub fn focused_border(&self) -> Style {
        Style::default().fg(self.border_focused)
    }

    pub fn unfocused_border(&self) -> Style {
        Style::default().fg(self.border_unfocused)
    }

    /// Map a `TaskStatus` to its display style (foreground colour).
    pub fn task_status_style(&self, status: TaskStatus) -> Style {
        let color = match status {
            TaskStatus::Pending => self.status_pending,
            TaskStatus::Completed => self.status_completed,
        };
        Style::default().fg(color)
    }

    /// Title style for a task row. Completed titles are struck through.
    pub fn task_title_style(&self, status: TaskStatus, selected: bool) -> Style {
        let mut style = match status {
            TaskStatus::Pending => Style::default().fg(self.text_primary),
            TaskStatus::Completed => Style::default()
                .fg(self.text_secondary)
                .add_modifier(Modifier::CROSSED_OUT),
        };
        if selected {
            style = style.add_modifier(Modifier::BOLD);
        }
        style
    }

    pub fn tab_active_style(&self) -> Style {
        Style::default()
            .fg(self.tab_active)
            .add_modifier(Modifier::BOLD | Modifier::REVERSED)
    }

    pub fn tab_inactive_style(&self) -> Style {
        Style::default().fg(self.tab_inactive)
    }

    /// Style for a toast notification.
    pub fn toast_style(&self, style: ToastStyle) -> Style {
        let color = match style {
            ToastStyle::Info => self.toast_info,
            ToastStyle::Success => self.toast_success,
            ToastStyle::Error => self.toast_error,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }
}

// ── Config deserialization ────────────────────────────────────────────

/// All-optional mirror of [`Theme`] for `config.toml` `[theme]` section.
///
/// Only `Some` fields override the default; everything else keeps its default.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct ThemeConfig {
    pub border_focused: Option<String>,
    pub border_unfocused: Option<String>,

    pub text_primary: Option<String>,
    pub text_secondary: Option<String>,
    pub text_accent: Option<String>,

    pub status_pending: Option<String>,
    pub status_completed: Option<String>,

    pub toast_info: Option<String>,
    pub toast_success: Option<String>,
    pub toast_error: Option<String>,

    pub form_border_task: Option<String>,
    pub form_border_auth: Option<String>,
    pub form_border_danger: Option<String>,
    pub form_highlight: Option<String>,
    pub form_dim: Option<String>,

    pub tab_active: Option<String>,
    pub tab_inactive: Option<String>,

    pub selection_indicator: Option<String>,
    pub spinner: Option<String>,
}

/// Parse a colour string into a ratatui `Color`.
///
/// Supports named colours (`"cyan"`, `"dark_gray"`, ...) and `"rgb(R,G,B)"`.
fn parse_color(s: &str) -> Option<Color> {
    let s = s.trim();
    if let Some(inner) = s.strip_prefix("rgb(").and_then(|r| r.strip_suffix(')')) {
        let mut channels = inner.split(',').map(|p| p.trim().parse::<u8>());
        return match (channels.next(), channels.next(), channels.next(), channels.next()) {
            (Some(Ok(r)), Some(Ok(g)), Some(Ok(b)), None) => Some(Color::Rgb(r, g, b)),
            _ => None,
        };
    }

    let lower = s.to_lowercase().replace('-', "_");
    match lower.as_str() {
        "black" => Some(Color::Black),
        "red" => Some(Color::Red),
        "green" => Some(Color::Green),
        "yellow" => Some(Color::Yellow),
        "blue" => Some(Color::Blue),
        "magenta" => Some(Color::Magenta),
        "cyan" => Some(Color::Cyan),
        "gray" | "grey" => Some(Color::Gray),
        "dark_gray" | "dark_grey" | "darkgray" | "darkgrey" => Some(Color::DarkGray),
        "light_red" | "lightred" => Some(Color::LightRed),
        "light_green" | "lightgreen" => Some(Color::LightGreen),
        "light_yellow" | "lightyellow" => Some(Color::LightYellow),
        "light_blue" | "lightblue" => Some(Color::LightBlue),
        "light_magenta" | "lightmagenta" => Some(Color::LightMagenta),
        "light_cyan" | "lightcyan" => Some(Color::LightCyan),
        "white" => Some(Color::White),
        _ => None,
    }
}

/// Overwrite `target` when `source` holds a valid colour.
fn apply(target: &mut Color, source: Option<&String>) {
    if let Some(s) = source {
        match parse_color(s) {
            Some(color) => *target = color,
            None => tracing::warn!(value = %s, "ignoring unknown theme colour"),
        }
    }
}

impl ThemeConfig {
    /// Build a `Theme` from defaults plus whatever the config file sets.
    pub fn build(&self) -> Theme {
        let mut t = Theme::default();

        apply(&mut t.border_focused, self.border_focused.as_ref());
        apply(&mut t.border_unfocused, self.border_unfocused.as_ref());
        apply(&mut t.text_primary, self.text_primary.as_ref());
        apply(&mut t.text_secondary, self.text_secondary.as_ref());
        apply(&mut t.text_accent, self.text_accent.as_ref());
        apply(&mut t.status_pending, self.status_pending.as_ref());
        apply(&mut t.status_completed, self.status_completed.as_ref());
        apply(&mut t.toast_info, self.toast_info.as_ref());
        apply(&mut t.toast_success, self.toast_success.as_ref());
        apply(&mut t.toast_error, self.toast_error.as_ref());
        apply(&mut t.form_border_task, self.form_border_task.as_ref());
        apply(&mut t.form_border_auth, self.form_border_auth.as_ref());
        apply(&mut t.form_border_danger, self.form_border_danger.as_ref());
        apply(&mut t.form_highlight, self.form_highlight.as_ref());
        apply(&mut t.form_dim, self.form_dim.as_ref());
        apply(&mut t.tab_active, self.tab_active.as_ref());
        apply(&mut t.tab_inactive, self.tab_inactive.as_ref());
        apply(
            &mut t.selection_indicator,
            self.selection_indicator.as_ref(),
        );
        apply(&mut t.spinner, self.spinner.as_ref());

        t
    }
}
