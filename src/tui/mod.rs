mod app;
mod event;
mod form;
mod keymap;
pub mod theme;
mod ui;

use anyhow::Result;

use crate::api::ApiClient;
use crate::config::Config;
use crate::controller::Controller;
use crate::controller::worker::Worker;
use crate::session::SharedSession;

/// Run the dashboard until the user quits.
pub fn run(config: &Config, session: SharedSession) -> Result<()> {
    let client = ApiClient::from_config(config, session.clone())?;
    let worker = Worker::spawn(client)?;
    let controller = Controller::new(session, config.notifications.duration());
    let mut app = app::App::new(controller, worker, config.theme.build());

    tracing::info!(api_url = %config.api_url, "starting dashboard");
    let mut terminal = ratatui::init();
    let result = app.run(&mut terminal);
    ratatui::restore();
    result
}
