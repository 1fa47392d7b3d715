mod app;
mod input;
mod ui;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use chatter_core::{driver, signal, Connectivity, Location, MessageSyncView, Session};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing::{info, warn};

pub use app::ChatApp;

use crate::cache::AppContext;
use crate::error::ChatterError;

pub async fn run(
    ctx: AppContext,
    session: Session,
    offline: bool,
    location: Option<Location>,
) -> Result<(), ChatterError> {
    let AppContext {
        cache,
        remote,
        media,
    } = ctx;

    let (connectivity, connectivity_rx) = signal();
    let view = MessageSyncView::new(Arc::clone(&remote), cache, session.author.clone());
    let (handle, task) = driver::spawn(view, connectivity_rx);

    // Reachability is reported after mount, as a platform probe would.
    let initial = if offline {
        Connectivity::Offline
    } else {
        Connectivity::Online
    };
    remote.set_reachable(initial == Connectivity::Online);
    connectivity.send_replace(initial);
    info!(author = %session.author.id, %initial, "chat started");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = ChatApp::new(session, handle.clone(), connectivity, remote, media, location);

    let result = run_loop(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    handle.unmount().await;
    if let Err(e) = task.await {
        warn!(error = %e, "view task ended abnormally");
    }

    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut ChatApp,
) -> Result<(), ChatterError> {
    loop {
        terminal.draw(|f| ui::render(f, app))?;

        // Poll for events with timeout so background sends can report back
        if event::poll(Duration::from_millis(50))? {
            let event = event::read()?;
            input::handle_event(app, event);
        }

        app.poll_notices();

        if app.should_quit {
            break;
        }

        tokio::task::yield_now().await;
    }

    Ok(())
}
