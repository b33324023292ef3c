use crossterm::event::{KeyCode, KeyModifiers};

// ── Actions ──────────────────────────────────────────────────────────

/// Every discrete action the task screen can perform in response to a key press.
///
/// Actions are context-free identifiers; `App` decides what actually happens
/// based on the current selection and overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    // Global
    Quit,
    ShowHelp,
    Refresh,
    Logout,

    // Navigation
    MoveUp,
    MoveDown,
    OpenDetail,
    CloseDetail,

    // Task actions
    NewTask,
    ToggleStatus,
    DeleteTask,
}

// ── Help categories ──────────────────────────────────────────────────

/// Logical groupings shown in the help overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HelpCategory {
    Navigation,
    Tasks,
    Detail,
    Account,
}

impl HelpCategory {
    fn label(self) -> &'static str {
        match self {
            Self::Navigation => "Navigation",
            Self::Tasks => "Tasks",
            Self::Detail => "Task Detail",
            Self::Account => "Account",
        }
    }

    /// Fixed display order for the help overlay.
    const ORDERED: &[Self] = &[Self::Navigation, Self::Tasks, Self::Detail, Self::Account];
}

// ── Keybinding ───────────────────────────────────────────────────────

/// A single key → action mapping with metadata for the help overlay.
#[derive(Debug, Clone)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
    pub action: Action,
    /// Key label shown in help (e.g. `"Ctrl+R"`). Empty hides the row.
    pub label: &'static str,
    pub description: &'static str,
    pub category: HelpCategory,
}

/// A single row in the help overlay.
#[derive(Debug, Clone)]
pub struct HelpEntry {
    pub label: &'static str,
    pub description: &'static str,
}

// ── KeyMap ────────────────────────────────────────────────────────────

/// Declarative registry of the task screen's key bindings.
///
/// Two tables: `list` (the task list) and `detail` (keys while the focused
/// task view is open). Auth forms and modals handle their keys directly.
pub struct KeyMap {
    pub list: Vec<KeyBinding>,
    pub detail: Vec<KeyBinding>,
}

impl KeyMap {
    pub fn default_keymap() -> Self {
        Self {
            list: default_list_bindings(),
            detail: default_detail_bindings(),
        }
    }

    pub fn lookup_list(&self, code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
        lookup(&self.list, code, modifiers)
    }

    pub fn lookup_detail(&self, code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
        lookup(&self.detail, code, modifiers)
    }

    /// Grouped help entries in display order, without duplicate labels.
    pub fn help_entries(&self) -> Vec<(&'static str, Vec<HelpEntry>)> {
        let mut out = Vec::new();

        for &cat in HelpCategory::ORDERED {
            let mut entries: Vec<HelpEntry> = Vec::new();
            for kb in self.list.iter().chain(&self.detail) {
                if kb.category == cat
                    && !kb.label.is_empty()
                    && !entries.iter().any(|e| e.label == kb.label)
                {
                    entries.push(HelpEntry {
                        label: kb.label,
                        description: kb.description,
                    });
                }
            }
            if !entries.is_empty() {
                out.push((cat.label(), entries));
            }
        }

        out
    }
}

fn lookup(bindings: &[KeyBinding], code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
    // Shifted characters arrive with SHIFT set; the char itself carries the case.
    let modifiers = if matches!(code, KeyCode::Char(_)) {
        modifiers.difference(KeyModifiers::SHIFT)
    } else {
        modifiers
    };
    bindings
        .iter()
        .find(|kb| kb.code == code && kb.modifiers == modifiers)
        .map(|kb| kb.action)
}

fn bind(
    code: KeyCode,
    modifiers: KeyModifiers,
    action: Action,
    label: &'static str,
    description: &'static str,
    category: HelpCategory,
) -> KeyBinding {
    KeyBinding {
        code,
        modifiers,
        action,
        label,
        description,
        category,
    }
}

// ── Default bindings ─────────────────────────────────────────────────

#[allow(clippy::enum_glob_use)]
fn default_list_bindings() -> Vec<KeyBinding> {
    use Action::*;
    use HelpCategory::*;
    const NONE: KeyModifiers = KeyModifiers::NONE;

    vec![
        // ── Navigation ───────────────────────────────────────────
        bind(KeyCode::Char('j'), NONE, MoveDown, "  j/k", "Navigate up/down", Navigation),
        bind(KeyCode::Char('k'), NONE, MoveUp, "", "", Navigation),
        bind(KeyCode::Down, NONE, MoveDown, "  arrows", "Navigate up/down", Navigation),
        bind(KeyCode::Up, NONE, MoveUp, "", "", Navigation),
        bind(KeyCode::Enter, NONE, OpenDetail, "  Enter", "Open task detail", Navigation),
        bind(KeyCode::Char('?'), NONE, ShowHelp, "  ?", "This help screen", Navigation),
        bind(KeyCode::Char('q'), NONE, Quit, "  q", "Quit", Navigation),
        bind(KeyCode::Char('c'), KeyModifiers::CONTROL, Quit, "", "", Navigation),
        // ── Tasks ────────────────────────────────────────────────
        bind(KeyCode::Char('n'), NONE, NewTask, "  n", "New task", Tasks),
        bind(KeyCode::Char(' '), NONE, ToggleStatus, "  Space", "Toggle pending / completed", Tasks),
        bind(KeyCode::Char('t'), NONE, ToggleStatus, "", "", Tasks),
        bind(KeyCode::Char('d'), NONE, DeleteTask, "  d", "Delete task (asks first)", Tasks),
        bind(KeyCode::Char('r'), NONE, Refresh, "  r", "Refresh list", Tasks),
        // ── Account ──────────────────────────────────────────────
        bind(KeyCode::Char('L'), NONE, Logout, "  L", "Log out", Account),
    ]
}

#[allow(clippy::enum_glob_use)]
fn default_detail_bindings() -> Vec<KeyBinding> {
    use Action::*;
    use HelpCategory::*;
    const NONE: KeyModifiers = KeyModifiers::NONE;

    vec![
        bind(KeyCode::Esc, NONE, CloseDetail, "  Esc", "Close detail", Detail),
        bind(KeyCode::Char('q'), NONE, CloseDetail, "", "", Detail),
        bind(KeyCode::Char(' '), NONE, ToggleStatus, "  Space", "Toggle status and close", Detail),
        bind(KeyCode::Char('t'), NONE, ToggleStatus, "", "", Detail),
        bind(KeyCode::Char('d'), NONE, DeleteTask, "  d", "Delete task and close", Detail),
        bind(KeyCode::Char('c'), KeyModifiers::CONTROL, Quit, "", "", Detail),
    ]
}
