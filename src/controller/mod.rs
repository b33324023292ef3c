//! View state machine for the task client.
//!
//! The controller never touches the network itself. User operations push
//! [`Dispatch`]es onto an outbox; whoever drives the controller (the TUI via
//! [`worker::Worker`], or a test calling [`execute`] inline) runs them and
//! feeds the [`Completion`]s back through [`Controller::complete`].
//!
//! Every dispatch carries a ticket. List and detail fetches only apply when
//! their ticket is the latest one issued, and per-task mutations are refused
//! while one is already in flight for the same task.

pub mod worker;

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::api::{
    ApiClient, ApiError, LoginForm, NewTask, Registration, SignupResponse, Task, TaskStatus,
    TokenResponse, Transport,
};
use crate::session::{self, SharedSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Auth,
    Tasks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthTab {
    Login,
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastStyle {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub style: ToastStyle,
    pub shown_at: Instant,
}

/// What the task list area should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListView<'a> {
    Loading,
    Failed,
    Empty,
    Tasks(&'a [Task]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detail {
    Loading(i64),
    Loaded(Task),
    Failed { id: i64, message: String },
}

impl Detail {
    pub fn task_id(&self) -> i64 {
        match self {
            Detail::Loading(id) | Detail::Failed { id, .. } => *id,
            Detail::Loaded(task) => task.id,
        }
    }
}

/// One API operation, as queued for the worker.
#[derive(Debug, Clone)]
pub enum Call {
    Register(Registration),
    Login(LoginForm),
    ListTasks,
    GetTask(i64),
    CreateTask(NewTask),
    SetStatus { id: i64, status: TaskStatus },
    DeleteTask(i64),
}

#[derive(Debug, Clone)]
pub enum Reply {
    Registered(SignupResponse),
    LoggedIn(TokenResponse),
    Tasks(Vec<Task>),
    Task(Task),
    Created(Task),
    Updated,
    Deleted,
}

#[derive(Debug, Clone)]
pub struct Dispatch {
    pub ticket: u64,
    pub call: Call,
}

#[derive(Debug)]
pub struct Completion {
    pub ticket: u64,
    pub result: Result<Reply, ApiError>,
}

/// Run one call against the API. Used by the worker thread and by tests.
pub fn execute<T: Transport>(client: &ApiClient<T>, call: &Call) -> Result<Reply, ApiError> {
    match call {
        Call::Register(registration) => client.signup(registration).map(Reply::Registered),
        Call::Login(form) => client.login(form).map(Reply::LoggedIn),
        Call::ListTasks => client.list_tasks().map(Reply::Tasks),
        Call::GetTask(id) => client.get_task(*id).map(Reply::Task),
        Call::CreateTask(task) => client.create_task(task).map(Reply::Created),
        Call::SetStatus { id, status } => client.update_status(*id, *status).map(|_| Reply::Updated),
        Call::DeleteTask(id) => client.delete_task(*id).map(|()| Reply::Deleted),
    }
}

/// What an outstanding ticket was for. Credentials are not kept.
#[derive(Debug, Clone)]
enum Pending {
    Register { username: String },
    Login { username: String },
    List,
    Detail,
    Create,
    SetStatus { id: i64, status: TaskStatus },
    Delete { id: i64 },
}

pub struct Controller {
    session: SharedSession,
    view: View,
    auth_tab: AuthTab,
    login_prefill: Option<String>,
    /// API key handed out by a registration in this process, used when the
    /// login response does not carry one.
    registered_api_key: Option<String>,

    tasks: Option<Vec<Task>>,
    list_failed: bool,
    detail: Option<Detail>,
    confirm_delete: Option<i64>,

    toast: Option<Toast>,
    toast_duration: Duration,

    next_ticket: u64,
    pending: HashMap<u64, Pending>,
    outbox: Vec<Dispatch>,
    latest_list: Option<u64>,
    latest_detail: Option<u64>,
    busy_tasks: HashSet<i64>,
    creating: bool,
    auth_busy: bool,
}

impl Controller {
    pub fn new(session: SharedSession, toast_duration: Duration) -> Self {
        Controller {
            session,
            view: View::Auth,
            auth_tab: AuthTab::Login,
            login_prefill: None,
            registered_api_key: None,
            tasks: None,
            list_failed: false,
            detail: None,
            confirm_delete: None,
            toast: None,
            toast_duration,
            next_ticket: 1,
            pending: HashMap::new(),
            outbox: Vec::new(),
            latest_list: None,
            latest_detail: None,
            busy_tasks: HashSet::new(),
            creating: false,
            auth_busy: false,
        }
    }

    /// Pick the initial view from the stored session.
    pub fn start(&mut self) {
        if session::snapshot(&self.session).is_authenticated() {
            self.view = View::Tasks;
            self.fetch_tasks();
        } else {
            self.view = View::Auth;
        }
    }

    // ── Accessors ──

    pub fn view(&self) -> View {
        self.view
    }

    pub fn auth_tab(&self) -> AuthTab {
        self.auth_tab
    }

    pub fn set_auth_tab(&mut self, tab: AuthTab) {
        self.auth_tab = tab;
    }

    /// Username to prefill on the login form after a registration.
    pub fn take_login_prefill(&mut self) -> Option<String> {
        self.login_prefill.take()
    }

    pub fn username(&self) -> Option<String> {
        session::snapshot(&self.session).username
    }

    pub fn list(&self) -> ListView<'_> {
        match &self.tasks {
            Some(tasks) if tasks.is_empty() => ListView::Empty,
            Some(tasks) => ListView::Tasks(tasks),
            None if self.list_failed => ListView::Failed,
            None => ListView::Loading,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        self.tasks.as_deref().unwrap_or_default()
    }

    pub fn detail(&self) -> Option<&Detail> {
        self.detail.as_ref()
    }

    pub fn pending_delete(&self) -> Option<i64> {
        self.confirm_delete
    }

    pub fn toast(&self) -> Option<&Toast> {
        self.toast.as_ref()
    }

    /// Number of calls dispatched but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn is_busy(&self, id: i64) -> bool {
        self.busy_tasks.contains(&id)
    }

    // ── Auth ──

    pub fn login(&mut self, username: &str, password: &str) {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            self.notify(ToastStyle::Error, "Username and password are required");
            return;
        }
        if self.auth_busy {
            self.notify(ToastStyle::Info, "Already signing in, please wait");
            return;
        }
        self.auth_busy = true;
        self.dispatch(
            Call::Login(LoginForm {
                username: username.to_string(),
                password: password.to_string(),
            }),
            Pending::Login {
                username: username.to_string(),
            },
        );
    }

    pub fn register(&mut self, username: &str, email: &str, password: &str) {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() || email.is_empty() || password.is_empty() {
            self.notify(
                ToastStyle::Error,
                "Username, email and password are required",
            );
            return;
        }
        if self.auth_busy {
            self.notify(ToastStyle::Info, "Already signing in, please wait");
            return;
        }
        self.auth_busy = true;
        self.dispatch(
            Call::Register(Registration {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            }),
            Pending::Register {
                username: username.to_string(),
            },
        );
    }

    pub fn logout(&mut self) {
        let cleared = self
            .session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
        if let Err(e) = cleared {
            tracing::error!("failed to clear session: {e:#}");
            self.notify(ToastStyle::Error, format!("Failed to log out: {e}"));
            return;
        }

        // Anything still in flight belongs to the old session.
        self.pending.clear();
        self.outbox.clear();
        self.latest_list = None;
        self.latest_detail = None;
        self.busy_tasks.clear();
        self.creating = false;
        self.auth_busy = false;

        self.tasks = None;
        self.list_failed = false;
        self.detail = None;
        self.confirm_delete = None;
        self.view = View::Auth;
        self.auth_tab = AuthTab::Login;
        self.notify(ToastStyle::Info, "Logged out successfully");
    }

    // ── Tasks ──

    pub fn refresh(&mut self) {
        if self.view == View::Tasks {
            self.fetch_tasks();
        }
    }

    /// Returns true when the create call was dispatched.
    pub fn create_task(&mut self, title: &str, description: &str, status: TaskStatus) -> bool {
        let title = title.trim();
        if title.is_empty() {
            self.notify(ToastStyle::Error, "Title is required");
            return false;
        }
        if self.creating {
            self.notify(ToastStyle::Info, "A task is already being created");
            return false;
        }
        self.creating = true;
        self.dispatch(
            Call::CreateTask(NewTask {
                title: title.to_string(),
                description: description.trim().to_string(),
                status,
            }),
            Pending::Create,
        );
        true
    }

    /// Flip the status of a listed task.
    pub fn toggle(&mut self, id: i64) {
        let current = self.tasks().iter().find(|t| t.id == id).map(|t| t.status);
        if let Some(status) = current {
            self.toggle_with(id, status);
        }
    }

    fn toggle_with(&mut self, id: i64, current: TaskStatus) {
        if !self.claim(id) {
            return;
        }
        let status = current.toggled();
        self.dispatch(
            Call::SetStatus { id, status },
            Pending::SetStatus { id, status },
        );
    }

    /// Ask for confirmation before deleting.
    pub fn request_delete(&mut self, id: i64) {
        if self.is_busy(id) {
            self.notify_busy(id);
            return;
        }
        self.confirm_delete = Some(id);
    }

    pub fn confirm_delete(&mut self) {
        let Some(id) = self.confirm_delete.take() else {
            return;
        };
        if self.claim(id) {
            self.dispatch(Call::DeleteTask(id), Pending::Delete { id });
        }
    }

    pub fn cancel_delete(&mut self) {
        self.confirm_delete = None;
    }

    // ── Detail ──

    /// Open the focused view; it always fetches the task again.
    pub fn open_detail(&mut self, id: i64) {
        self.detail = Some(Detail::Loading(id));
        let ticket = self.dispatch(Call::GetTask(id), Pending::Detail);
        self.latest_detail = Some(ticket);
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
        self.latest_detail = None;
    }

    pub fn toggle_from_detail(&mut self) {
        if let Some(Detail::Loaded(task)) = self.detail.take() {
            self.latest_detail = None;
            self.toggle_with(task.id, task.status);
        }
    }

    pub fn delete_from_detail(&mut self) {
        if let Some(Detail::Loaded(task)) = self.detail.take() {
            self.latest_detail = None;
            self.request_delete(task.id);
        }
    }

    // ── Driving ──

    /// Hand queued calls to the executor, in the order they were issued.
    pub fn take_dispatches(&mut self) -> Vec<Dispatch> {
        std::mem::take(&mut self.outbox)
    }

    pub fn complete(&mut self, completion: Completion) {
        let Completion { ticket, result } = completion;
        let Some(pending) = self.pending.remove(&ticket) else {
            tracing::debug!(ticket, "discarding completion for a cancelled request");
            return;
        };

        match pending {
            Pending::Login { username } => {
                self.auth_busy = false;
                match result {
                    Ok(Reply::LoggedIn(resp)) => self.finish_login(&username, resp),
                    Ok(other) => self.unexpected(&other),
                    Err(e) => self.notify(ToastStyle::Error, e.to_string()),
                }
            }
            Pending::Register { username } => {
                self.auth_busy = false;
                match result {
                    Ok(Reply::Registered(resp)) => {
                        self.registered_api_key = resp.api_key;
                        self.login_prefill = Some(username);
                        self.auth_tab = AuthTab::Login;
                        self.notify(ToastStyle::Success, "Registration successful!");
                    }
                    Ok(other) => self.unexpected(&other),
                    Err(e) => self.notify(ToastStyle::Error, e.to_string()),
                }
            }
            Pending::List => {
                if self.latest_list != Some(ticket) {
                    tracing::debug!(ticket, "discarding stale task list");
                    return;
                }
                self.latest_list = None;
                match result {
                    Ok(Reply::Tasks(tasks)) => {
                        self.tasks = Some(tasks);
                        self.list_failed = false;
                    }
                    Ok(other) => self.unexpected(&other),
                    Err(e) => {
                        self.list_failed = true;
                        self.notify(ToastStyle::Error, format!("Failed to load tasks: {e}"));
                    }
                }
            }
            Pending::Detail => {
                if self.latest_detail != Some(ticket) {
                    tracing::debug!(ticket, "discarding stale task detail");
                    return;
                }
                self.latest_detail = None;
                let Some(id) = self.detail.as_ref().map(Detail::task_id) else {
                    return;
                };
                self.detail = Some(match result {
                    Ok(Reply::Task(task)) => Detail::Loaded(task),
                    Ok(other) => {
                        self.unexpected(&other);
                        return;
                    }
                    Err(e) => Detail::Failed {
                        id,
                        message: e.to_string(),
                    },
                });
            }
            Pending::Create => {
                self.creating = false;
                match result {
                    Ok(Reply::Created(_)) => {
                        self.notify(ToastStyle::Success, "Task created successfully!");
                        self.fetch_tasks();
                    }
                    Ok(other) => self.unexpected(&other),
                    Err(e) => self.notify(ToastStyle::Error, e.to_string()),
                }
            }
            Pending::SetStatus { id, status } => {
                self.busy_tasks.remove(&id);
                match result {
                    Ok(Reply::Updated) => {
                        self.notify(ToastStyle::Success, format!("Task marked as {status}!"));
                        self.fetch_tasks();
                    }
                    Ok(other) => self.unexpected(&other),
                    Err(e) => {
                        self.notify(ToastStyle::Error, format!("Failed to update task: {e}"));
                    }
                }
            }
            Pending::Delete { id } => {
                self.busy_tasks.remove(&id);
                match result {
                    Ok(Reply::Deleted) => {
                        self.notify(ToastStyle::Success, "Task deleted successfully!");
                        self.fetch_tasks();
                    }
                    Ok(other) => self.unexpected(&other),
                    Err(e) => {
                        self.notify(ToastStyle::Error, format!("Failed to delete task: {e}"));
                    }
                }
            }
        }
    }

    /// Expire the notification once it has been up long enough.
    pub fn tick(&mut self, now: Instant) {
        if let Some(toast) = &self.toast
            && now.duration_since(toast.shown_at) >= self.toast_duration
        {
            self.toast = None;
        }
    }

    pub fn dismiss_toast(&mut self) {
        self.toast = None;
    }

    // ── Internals ──

    fn dispatch(&mut self, call: Call, pending: Pending) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending.insert(ticket, pending);
        self.outbox.push(Dispatch { ticket, call });
        ticket
    }

    fn fetch_tasks(&mut self) {
        let ticket = self.dispatch(Call::ListTasks, Pending::List);
        self.latest_list = Some(ticket);
    }

    fn finish_login(&mut self, username: &str, resp: TokenResponse) {
        let fallback = self
            .registered_api_key
            .clone()
            .or_else(|| session::snapshot(&self.session).api_key);
        let session = resp.into_session(username, fallback);
        let saved = self
            .session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .save(session);
        if let Err(e) = saved {
            tracing::error!("failed to persist session: {e:#}");
            self.notify(ToastStyle::Error, format!("Failed to save session: {e}"));
            return;
        }
        self.registered_api_key = None;
        self.view = View::Tasks;
        self.tasks = None;
        self.list_failed = false;
        self.notify(ToastStyle::Success, "Login successful! Welcome back!");
        self.fetch_tasks();
    }

    /// Mark a task as having a mutation in flight. False when one already is.
    fn claim(&mut self, id: i64) -> bool {
        if self.busy_tasks.insert(id) {
            true
        } else {
            self.notify_busy(id);
            false
        }
    }

    fn notify_busy(&mut self, id: i64) {
        self.notify(
            ToastStyle::Info,
            format!("Task #{id} is already being updated"),
        );
    }

    fn unexpected(&mut self, reply: &Reply) {
        tracing::error!(?reply, "reply does not match the request it completes");
        self.notify(ToastStyle::Error, "Unexpected response from server");
    }

    fn notify(&mut self, style: ToastStyle, message: impl Into<String>) {
        self.toast = Some(Toast {
            message: message.into(),
            style,
            shown_at: Instant::now(),
        });
    }
}
