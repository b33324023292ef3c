use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::DefaultTerminal;

use crate::api::TaskStatus;
use crate::controller::worker::Worker;
use crate::controller::{AuthTab, Controller, View};

use super::event::{self, AppEvent};
use super::form::TextField;
use super::keymap::{Action, KeyMap};
use super::theme::Theme;
use super::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    NewTask,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthField {
    Username,
    Email,
    Password,
}

impl AuthField {
    /// Fields shown on each auth tab, top to bottom.
    pub fn order(tab: AuthTab) -> &'static [AuthField] {
        match tab {
            AuthTab::Login => &[AuthField::Username, AuthField::Password],
            AuthTab::Register => &[AuthField::Username, AuthField::Email, AuthField::Password],
        }
    }
}

pub struct AuthForm {
    pub username: TextField,
    pub email: TextField,
    pub password: TextField,
    pub focus: AuthField,
}

impl Default for AuthForm {
    fn default() -> Self {
        AuthForm {
            username: TextField::default(),
            email: TextField::default(),
            password: TextField::masked(),
            focus: AuthField::Username,
        }
    }
}

impl AuthForm {
    pub fn field(&self, field: AuthField) -> &TextField {
        match field {
            AuthField::Username => &self.username,
            AuthField::Email => &self.email,
            AuthField::Password => &self.password,
        }
    }

    fn field_mut(&mut self, field: AuthField) -> &mut TextField {
        match field {
            AuthField::Username => &mut self.username,
            AuthField::Email => &mut self.email,
            AuthField::Password => &mut self.password,
        }
    }

    fn cycle(&mut self, tab: AuthTab, forward: bool) {
        let order = AuthField::order(tab);
        let pos = order.iter().position(|f| *f == self.focus).unwrap_or(0);
        let next = if forward {
            (pos + 1) % order.len()
        } else {
            (pos + order.len() - 1) % order.len()
        };
        self.focus = order[next];
    }
}

/// New-task modal: title, description, initial status.
pub struct TaskForm {
    pub title: TextField,
    pub description: TextField,
    pub status: TaskStatus,
    /// 0 = title, 1 = description, 2 = status
    pub field: u8,
}

impl Default for TaskForm {
    fn default() -> Self {
        TaskForm {
            title: TextField::default(),
            description: TextField::default(),
            status: TaskStatus::Pending,
            field: 0,
        }
    }
}

pub struct App {
    pub controller: Controller,
    worker: Worker,
    pub keymap: KeyMap,
    pub theme: Theme,
    pub should_quit: bool,
    pub input_mode: InputMode,

    /// Index into the controller's task list.
    pub selected: usize,
    pub auth: AuthForm,
    pub task_form: TaskForm,

    pub spinner_frame: usize,
    last_view: View,
}

impl App {
    pub fn new(mut controller: Controller, worker: Worker, theme: Theme) -> Self {
        controller.start();
        let last_view = controller.view();
        let mut auth = AuthForm::default();
        if let Some(username) = controller.username() {
            auth.username.set(&username);
            auth.focus = AuthField::Password;
        }
        App {
            controller,
            worker,
            keymap: KeyMap::default_keymap(),
            theme,
            should_quit: false,
            input_mode: InputMode::Normal,
            selected: 0,
            auth,
            task_form: TaskForm::default(),
            spinner_frame: 0,
            last_view,
        }
    }

    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let tick_rate = Duration::from_millis(100);

        loop {
            self.pump();
            terminal.draw(|frame| ui::draw(frame, self))?;

            match event::poll(tick_rate)? {
                AppEvent::Key(key) => self.handle_key(key.code, key.modifiers),
                AppEvent::Tick => self.spinner_frame = self.spinner_frame.wrapping_add(1),
            }

            if self.should_quit {
                return Ok(());
            }
        }
    }

    /// Feed finished calls to the controller, then hand its new calls to the worker.
    /// The request thread is gone; nothing more will reach the backend.
    pub fn worker_stopped(&self) -> bool {
        self.worker.is_stopped()
    }

    pub(crate) fn pump(&mut self) {
        for completion in self.worker.drain() {
            self.controller.complete(completion);
        }
        for dispatch in self.controller.take_dispatches() {
            if let Some(failed) = self.worker.submit(dispatch) {
                self.controller.complete(failed);
            }
        }
        self.controller.tick(Instant::now());
        self.sync_view();
    }

    /// React to view changes the controller made on its own (login, logout, registration).
    fn sync_view(&mut self) {
        let view = self.controller.view();
        if view != self.last_view {
            self.auth.password.clear();
            self.input_mode = InputMode::Normal;
            self.selected = 0;
            if view == View::Auth {
                self.auth.focus = AuthField::Username;
            }
            self.last_view = view;
        }
        if let Some(username) = self.controller.take_login_prefill() {
            self.auth.username.set(&username);
            self.auth.password.clear();
            self.auth.focus = AuthField::Password;
        }
        let count = self.controller.tasks().len();
        if self.selected >= count {
            self.selected = count.saturating_sub(1);
        }
    }

    pub fn selected_task_id(&self) -> Option<i64> {
        self.controller.tasks().get(self.selected).map(|t| t.id)
    }

    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        match self.controller.view() {
            View::Auth => self.handle_auth_key(code, modifiers),
            View::Tasks => {
                if self.controller.pending_delete().is_some() {
                    self.handle_confirm_delete_key(code);
                } else {
                    match self.input_mode {
                        InputMode::NewTask => self.handle_task_form_key(code, modifiers),
                        InputMode::Help => self.input_mode = InputMode::Normal,
                        InputMode::Normal if self.controller.detail().is_some() => {
                            self.handle_detail_key(code, modifiers);
                        }
                        InputMode::Normal => self.handle_list_key(code, modifiers),
                    }
                }
            }
        }
    }

    fn handle_auth_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        let tab = self.controller.auth_tab();
        match (code, modifiers) {
            (KeyCode::Esc, _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            (KeyCode::Char('t'), KeyModifiers::CONTROL) | (KeyCode::F(2), _) => {
                let next = match tab {
                    AuthTab::Login => AuthTab::Register,
                    AuthTab::Register => AuthTab::Login,
                };
                self.controller.set_auth_tab(next);
                if !AuthField::order(next).contains(&self.auth.focus) {
                    self.auth.focus = AuthField::Username;
                }
            }
            (KeyCode::Tab | KeyCode::Down, _) => self.auth.cycle(tab, true),
            (KeyCode::BackTab | KeyCode::Up, _) => self.auth.cycle(tab, false),
            (KeyCode::Enter, _) => {
                let last = AuthField::order(tab).last().copied();
                if Some(self.auth.focus) == last {
                    self.submit_auth(tab);
                } else {
                    self.auth.cycle(tab, true);
                }
            }
            _ => {
                let focus = self.auth.focus;
                self.auth.field_mut(focus).handle_key(code, modifiers);
            }
        }
    }

    fn submit_auth(&mut self, tab: AuthTab) {
        match tab {
            AuthTab::Login => self
                .controller
                .login(self.auth.username.value(), self.auth.password.value()),
            AuthTab::Register => self.controller.register(
                self.auth.username.value(),
                self.auth.email.value(),
                self.auth.password.value(),
            ),
        }
    }

    fn handle_list_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if code == KeyCode::Esc {
            self.controller.dismiss_toast();
            return;
        }
        let Some(action) = self.keymap.lookup_list(code, modifiers) else {
            return;
        };
        match action {
            Action::Quit => self.should_quit = true,
            Action::ShowHelp => self.input_mode = InputMode::Help,
            Action::Refresh => self.controller.refresh(),
            Action::Logout => self.controller.logout(),
            Action::MoveUp => self.selected = self.selected.saturating_sub(1),
            Action::MoveDown => {
                let count = self.controller.tasks().len();
                if count > 0 {
                    self.selected = (self.selected + 1).min(count - 1);
                }
            }
            Action::OpenDetail => {
                if let Some(id) = self.selected_task_id() {
                    self.controller.open_detail(id);
                }
            }
            Action::NewTask => {
                self.task_form = TaskForm::default();
                self.input_mode = InputMode::NewTask;
            }
            Action::ToggleStatus => {
                if let Some(id) = self.selected_task_id() {
                    self.controller.toggle(id);
                }
            }
            Action::DeleteTask => {
                if let Some(id) = self.selected_task_id() {
                    self.controller.request_delete(id);
                }
            }
            Action::CloseDetail => {}
        }
    }

    fn handle_detail_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        match self.keymap.lookup_detail(code, modifiers) {
            Some(Action::CloseDetail) => self.controller.close_detail(),
            Some(Action::ToggleStatus) => self.controller.toggle_from_detail(),
            Some(Action::DeleteTask) => self.controller.delete_from_detail(),
            Some(Action::Quit) => self.should_quit = true,
            _ => {}
        }
    }

    fn handle_confirm_delete_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('y' | 'Y') | KeyCode::Enter => self.controller.confirm_delete(),
            KeyCode::Char('n' | 'N') | KeyCode::Esc => self.controller.cancel_delete(),
            _ => {}
        }
    }

    fn handle_task_form_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        let form = &mut self.task_form;
        match code {
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Tab | KeyCode::Down => form.field = (form.field + 1) % 3,
            KeyCode::BackTab | KeyCode::Up => form.field = (form.field + 2) % 3,
            KeyCode::Enter if form.field < 2 => form.field += 1,
            KeyCode::Enter => {
                let created = self.controller.create_task(
                    form.title.value(),
                    form.description.value(),
                    form.status,
                );
                if created {
                    self.input_mode = InputMode::Normal;
                } else if form.title.value().trim().is_empty() {
                    form.field = 0;
                }
            }
            KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') if form.field == 2 => {
                form.status = form.status.toggled();
            }
            _ => {
                let field = match form.field {
                    0 => &mut form.title,
                    1 => &mut form.description,
                    _ => return,
                };
                field.handle_key(code, modifiers);
            }
        }
    }
}
