use std::fs;
use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use tasky::api::{ApiClient, LoginForm, NewTask, Registration, Task, TaskStatus};
use tasky::config::{self, Config};
use tasky::session::{self, Session, SessionStore, SharedSession};
use tasky::tui;

#[derive(Parser)]
#[command(name = "tasky", version = env!("TASKY_VERSION"), about = "Terminal client for the tasky task API")]
struct Cli {
    /// Base URL of the API (overrides config.toml and TASKY_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the TUI dashboard (default)
    Dashboard,
    /// Create ~/.tasky/ and a commented config.toml
    Init,
    /// Register a new account
    Signup {
        username: String,
        email: String,
        #[arg(long, env = "TASKY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log in and store the session
    Login {
        username: String,
        #[arg(long, env = "TASKY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show who is logged in
    Whoami,
    /// List tasks
    List,
    /// Create a task
    Add {
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// pending or completed
        #[arg(short, long, default_value = "pending")]
        status: String,
    },
    /// Show one task
    Show { id: i64 },
    /// Flip a task between pending and completed
    Toggle { id: i64 },
    /// Delete a task
    Delete {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

const CONFIG_TEMPLATE: &str = r#"# tasky configuration

# api_url = "https://tasky-961y.onrender.com"
# timeout_secs = 30
# log_level = "info"

[notifications]
# seconds = 5

[theme]
# border_focused = "cyan"
# status_pending = "yellow"
# status_completed = "green"
"#;

fn main() -> Result<()> {
    let cli = Cli::parse();

    config::ensure_dirs()?;
    let config = config::load()?.with_api_url(cli.api_url);
    config::init_logging(&config)?;
    let session = SessionStore::open_default()?.into_shared();

    match cli.command.unwrap_or(Commands::Dashboard) {
        Commands::Dashboard => tui::run(&config, session),
        Commands::Init => {
            let path = config::config_path()?;
            if path.exists() {
                println!("tasky already initialized ({})", path.display());
            } else {
                fs::write(&path, CONFIG_TEMPLATE)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("tasky initialized at ~/.tasky/");
            }
            Ok(())
        }
        Commands::Signup {
            username,
            email,
            password,
        } => {
            let client = client(&config, &session)?;
            let resp = client.signup(&Registration {
                username: username.clone(),
                email,
                password,
            })?;
            if let Some(api_key) = resp.api_key
                && !session::snapshot(&session).is_authenticated()
            {
                // Kept until the next login in case the token response omits it.
                lock(&session).save(Session {
                    bearer_token: None,
                    api_key: Some(api_key),
                    username: None,
                })?;
            }
            println!("Registration successful! Log in with `tasky login {username}`.");
            Ok(())
        }
        Commands::Login { username, password } => {
            let client = client(&config, &session)?;
            let fallback_key = session::snapshot(&session).api_key;
            let resp = client.login(&LoginForm {
                username: username.clone(),
                password,
            })?;
            lock(&session).save(resp.into_session(&username, fallback_key))?;
            println!("Login successful! Welcome back, {username}!");
            Ok(())
        }
        Commands::Logout => {
            lock(&session).clear()?;
            println!("Logged out successfully");
            Ok(())
        }
        Commands::Whoami => {
            let current = session::snapshot(&session);
            match current.username.filter(|_| current.bearer_token.is_some()) {
                Some(user) => println!("{user} @ {}", config.api_url),
                None => println!("Not logged in."),
            }
            Ok(())
        }
        Commands::List => {
            let client = authed_client(&config, &session)?;
            let tasks = client.list_tasks()?;
            if tasks.is_empty() {
                println!("No tasks yet. Create your first task!");
            } else {
                for task in &tasks {
                    print_task_line(task);
                }
            }
            Ok(())
        }
        Commands::Add {
            title,
            description,
            status,
        } => {
            if title.trim().is_empty() {
                bail!("title is required");
            }
            let status: TaskStatus = status.parse().map_err(anyhow::Error::msg)?;
            let client = authed_client(&config, &session)?;
            let task = client.create_task(&NewTask {
                title: title.trim().to_string(),
                description: description.trim().to_string(),
                status,
            })?;
            println!("Task created successfully!");
            print_task_line(&task);
            Ok(())
        }
        Commands::Show { id } => {
            let client = authed_client(&config, &session)?;
            let task = client.get_task(id)?;
            println!("#{} {}", task.id, task.title);
            if !task.description.is_empty() {
                println!("  {}", task.description);
            }
            println!("  Status:  {} {}", task.status.symbol(), task.status);
            println!(
                "  Created: {}",
                task.created_at.as_deref().unwrap_or("No date")
            );
            println!(
                "  Updated: {}",
                task.updated_at.as_deref().unwrap_or("No date")
            );
            Ok(())
        }
        Commands::Toggle { id } => {
            let client = authed_client(&config, &session)?;
            let task = client.get_task(id)?;
            let status = task.status.toggled();
            client
                .update_status(id, status)
                .context("Failed to update task")?;
            println!("Task marked as {status}!");
            Ok(())
        }
        Commands::Delete { id, yes } => {
            let client = authed_client(&config, &session)?;
            if !yes && !confirm(&format!("Are you sure you want to delete task #{id}?"))? {
                println!("Cancelled.");
                return Ok(());
            }
            client.delete_task(id).context("Failed to delete task")?;
            println!("Task deleted successfully!");
            Ok(())
        }
    }
}

fn client(config: &Config, session: &SharedSession) -> Result<ApiClient> {
    Ok(ApiClient::from_config(config, session.clone())?)
}

fn authed_client(config: &Config, session: &SharedSession) -> Result<ApiClient> {
    if !session::snapshot(session).is_authenticated() {
        bail!("not logged in; run `tasky login <username>` first");
    }
    client(config, session)
}

fn lock(session: &SharedSession) -> std::sync::MutexGuard<'_, SessionStore> {
    session
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn print_task_line(task: &Task) {
    println!(
        "  {} #{:<5} {} [{}]",
        task.status.symbol(),
        task.id,
        task.title,
        task.status
    );
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
