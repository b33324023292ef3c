use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
        }
    }

    /// The status a toggle sends.
    pub fn toggled(self) -> Self {
        match self {
            TaskStatus::Pending => TaskStatus::Completed,
            TaskStatus::Completed => TaskStatus::Pending,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "☐",
            TaskStatus::Completed => "✓",
        }
    }

    /// Label for the action that flips this status.
    pub fn toggle_label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Mark as completed",
            TaskStatus::Completed => "Mark as pending",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(format!(
                "invalid status '{other}' (expected 'pending' or 'completed')"
            )),
        }
    }
}

/// A task as returned by the backend. Extra fields such as `user_id` are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Body of `POST /tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
}

/// Body of `PUT /tasks/{id}`: a partial update carrying only the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub status: TaskStatus,
}

/// Form body of `POST /token`. Field order is the wire order.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// JSON body of `POST /signup`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl TokenResponse {
    /// Build the session a successful login establishes. `fallback_api_key`
    /// covers backends that only hand out the key at signup.
    pub fn into_session(self, username: &str, fallback_api_key: Option<String>) -> Session {
        Session::new(
            self.access_token,
            self.api_key.or(fallback_api_key),
            username.to_string(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignupResponse {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_status() {
        assert_eq!(TaskStatus::Pending.toggled(), TaskStatus::Completed);
        assert_eq!(TaskStatus::Completed.toggled(), TaskStatus::Pending);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Pending".parse::<TaskStatus>(), Ok(TaskStatus::Pending));
        assert_eq!(" completed ".parse::<TaskStatus>(), Ok(TaskStatus::Completed));
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn task_decodes_backend_payload() {
        let task: Task = serde_json::from_str(
            r#"{"id":7,"title":"Buy milk","description":"2%","status":"completed",
                "user_id":3,"created_at":"2024-05-01T10:00:00"}"#,
        )
        .unwrap();
        assert_eq!(task.id, 7);
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.created_at.as_deref(), Some("2024-05-01T10:00:00"));
        assert_eq!(task.updated_at, None);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let result: Result<Task, _> = serde_json::from_str(
            r#"{"id":1,"title":"t","description":"d","status":"archived"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn status_update_serializes_lowercase() {
        let body = serde_json::to_value(StatusUpdate {
            status: TaskStatus::Pending,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"status": "pending"}));
    }

    #[test]
    fn token_response_builds_session() {
        let resp: TokenResponse =
            serde_json::from_str(r#"{"access_token":"tok1","api_key":"key1"}"#).unwrap();
        let session = resp.into_session("alice", None);
        assert_eq!(
            session,
            Session::new("tok1".into(), Some("key1".into()), "alice".into())
        );
    }

    #[test]
    fn token_response_without_key_uses_fallback() {
        let resp: TokenResponse =
            serde_json::from_str(r#"{"access_token":"tok1","token_type":"bearer"}"#).unwrap();
        let session = resp.into_session("alice", Some("from-signup".into()));
        assert_eq!(session.api_key.as_deref(), Some("from-signup"));
    }

    #[test]
    fn credentials_are_redacted_in_debug_output() {
        let form = LoginForm {
            username: "alice".into(),
            password: "pw123".into(),
        };
        let debug = format!("{form:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("pw123"));
    }
}
