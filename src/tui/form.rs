use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

// ── Text field ────────────────────────────────────────────────────────

/// A single-line input with a byte-offset cursor.
#[derive(Debug, Clone, Default)]
pub struct TextField {
    value: String,
    cursor: usize,
    /// Render as bullets (passwords).
    pub masked: bool,
}

impl TextField {
    pub fn masked() -> Self {
        TextField {
            masked: true,
            ..Self::default()
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Replace the contents and put the cursor at the end.
    pub fn set(&mut self, value: &str) {
        self.value = value.to_string();
        self.cursor = self.value.len();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// Apply an editing key. Returns `true` if the key was consumed.
    ///
    /// Covers insertion, Backspace/Delete, arrow and Home/End movement,
    /// Alt+arrows for word jumps, Ctrl+W (delete word) and Ctrl+U (delete to start).
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        let buf = &mut self.value;
        let cursor = &mut self.cursor;
        *cursor = (*cursor).min(buf.len());

        match code {
            KeyCode::Left if modifiers.contains(KeyModifiers::ALT) => {
                *cursor = word_boundary_left(buf, *cursor);
            }
            KeyCode::Left => {
                if let Some(ch) = buf[..*cursor].chars().next_back() {
                    *cursor -= ch.len_utf8();
                }
            }
            KeyCode::Right if modifiers.contains(KeyModifiers::ALT) => {
                *cursor = word_boundary_right(buf, *cursor);
            }
            KeyCode::Right => {
                if let Some(ch) = buf[*cursor..].chars().next() {
                    *cursor += ch.len_utf8();
                }
            }
            KeyCode::Home => *cursor = 0,
            KeyCode::End => *cursor = buf.len(),

            KeyCode::Backspace if modifiers.contains(KeyModifiers::ALT) => {
                let start = word_boundary_left(buf, *cursor);
                buf.drain(start..*cursor);
                *cursor = start;
            }
            KeyCode::Char('w') if modifiers.contains(KeyModifiers::CONTROL) => {
                let start = word_boundary_left(buf, *cursor);
                buf.drain(start..*cursor);
                *cursor = start;
            }
            KeyCode::Char('u') if modifiers.contains(KeyModifiers::CONTROL) => {
                buf.drain(..*cursor);
                *cursor = 0;
            }
            KeyCode::Backspace => {
                if let Some(ch) = buf[..*cursor].chars().next_back() {
                    let start = *cursor - ch.len_utf8();
                    buf.drain(start..*cursor);
                    *cursor = start;
                }
            }
            KeyCode::Delete => {
                if let Some(ch) = buf[*cursor..].chars().next() {
                    let end = *cursor + ch.len_utf8();
                    buf.drain(*cursor..end);
                }
            }

            KeyCode::Char(c) if !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
                buf.insert(*cursor, c);
                *cursor += c.len_utf8();
            }
            _ => return false,
        }
        true
    }

    /// The text to draw, with a block cursor when `focused`.
    pub fn display(&self, focused: bool) -> String {
        let shown = if self.masked {
            "•".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        };
        if !focused {
            return shown;
        }
        // Masked text has one bullet per char, so map the byte cursor to a char index.
        let chars_before = self.value[..self.cursor.min(self.value.len())]
            .chars()
            .count();
        let split = shown
            .char_indices()
            .nth(chars_before)
            .map_or(shown.len(), |(i, _)| i);
        let (before, after) = shown.split_at(split);
        format!("{before}\u{2588}{after}")
    }
}

/// Byte offset of the previous word boundary.
fn word_boundary_left(s: &str, pos: usize) -> usize {
    let trimmed = s[..pos].trim_end();
    match trimmed.rfind(char::is_whitespace) {
        Some(idx) => idx + trimmed[idx..].chars().next().map_or(1, char::len_utf8),
        None => 0,
    }
}

/// Byte offset of the start of the next word.
fn word_boundary_right(s: &str, pos: usize) -> usize {
    let after = &s[pos..];
    let Some(ws) = after.find(char::is_whitespace) else {
        return s.len();
    };
    match after[ws..].find(|c: char| !c.is_whitespace()) {
        Some(word) => pos + ws + word,
        None => s.len(),
    }
}

// ── Rendering helpers ─────────────────────────────────────────────────

/// Render a centered modal overlay: `Clear` background, bordered block, returns inner `Rect`.
///
/// Centres a panel of the given `width`×`height` on screen, clamping to available space.
pub fn render_modal(
    frame: &mut Frame,
    title: &str,
    border_style: Style,
    width: u16,
    height: u16,
) -> Rect {
    let area = frame.area();
    let w = width.min(area.width.saturating_sub(4));
    let h = height.min(area.height.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(w)) / 2;
    let y = area.y + (area.height.saturating_sub(h)) / 2;
    let panel = Rect::new(x, y, w, h);

    frame.render_widget(Clear, panel);

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style);
    let inner = block.inner(panel);
    frame.render_widget(block, panel);

    inner
}

/// One labelled input row: `label` then the field's text.
pub fn field_line<'a>(
    label: &'a str,
    field: &TextField,
    focused: bool,
    label_style: Style,
    value_style: Style,
) -> Line<'a> {
    Line::from(vec![
        Span::styled(label, label_style),
        Span::styled(field.display(focused), value_style),
    ])
}

/// Render a horizontal hint bar: alternating key/description spans.
pub fn render_hints(
    frame: &mut Frame,
    area: Rect,
    hints: &[(&str, &str)],
    key_style: Style,
    desc_style: Style,
) {
    let spans: Vec<Span<'_>> = hints
        .iter()
        .flat_map(|(key, desc)| {
            [
                Span::styled(*key, key_style),
                Span::styled(*desc, desc_style),
            ]
        })
        .collect();
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(text: &str) -> TextField {
        let mut f = TextField::default();
        f.set(text);
        f
    }

    fn press(f: &mut TextField, code: KeyCode) -> bool {
        f.handle_key(code, KeyModifiers::NONE)
    }

    #[test]
    fn typing_appends_at_cursor() {
        let mut f = field("hllo");
        press(&mut f, KeyCode::Home);
        press(&mut f, KeyCode::Right);
        press(&mut f, KeyCode::Char('e'));
        assert_eq!(f.value(), "hello");
    }

    #[test]
    fn backspace_and_delete() {
        let mut f = field("heello");
        press(&mut f, KeyCode::Backspace);
        assert_eq!(f.value(), "heell");
        press(&mut f, KeyCode::Home);
        press(&mut f, KeyCode::Delete);
        assert_eq!(f.value(), "eell");
    }

    #[test]
    fn ctrl_w_deletes_previous_word() {
        let mut f = field("buy oat milk");
        assert!(f.handle_key(KeyCode::Char('w'), KeyModifiers::CONTROL));
        assert_eq!(f.value(), "buy oat ");
    }

    #[test]
    fn ctrl_u_clears_to_start() {
        let mut f = field("buy milk");
        f.handle_key(KeyCode::Char('u'), KeyModifiers::CONTROL);
        assert_eq!(f.value(), "");
    }

    #[test]
    fn alt_arrows_jump_words() {
        let mut f = field("hello world test");
        f.handle_key(KeyCode::Left, KeyModifiers::ALT);
        f.handle_key(KeyCode::Left, KeyModifiers::ALT);
        f.handle_key(KeyCode::Char('X'), KeyModifiers::NONE);
        assert_eq!(f.value(), "hello Xworld test");
        f.handle_key(KeyCode::Right, KeyModifiers::ALT);
        f.handle_key(KeyCode::Char('Y'), KeyModifiers::NONE);
        assert_eq!(f.value(), "hello Xworld Ytest");
    }

    #[test]
    fn other_control_chords_are_not_consumed() {
        let mut f = field("abc");
        assert!(!f.handle_key(KeyCode::Char('a'), KeyModifiers::CONTROL));
        assert!(!press(&mut f, KeyCode::Enter));
        assert_eq!(f.value(), "abc");
    }

    #[test]
    fn multibyte_editing_keeps_char_boundaries() {
        let mut f = field("café");
        press(&mut f, KeyCode::Left);
        press(&mut f, KeyCode::Backspace);
        assert_eq!(f.value(), "caé");
    }

    #[test]
    fn display_places_cursor() {
        let mut f = field("hello");
        assert_eq!(f.display(true), "hello\u{2588}");
        press(&mut f, KeyCode::Home);
        assert_eq!(f.display(true), "\u{2588}hello");
        assert_eq!(f.display(false), "hello");
    }

    #[test]
    fn masked_display_hides_text() {
        let mut f = TextField::masked();
        f.set("pw€3");
        assert_eq!(f.display(false), "••••");
        press(&mut f, KeyCode::Left);
        assert_eq!(f.display(true), "•••\u{2588}•");
    }
}
