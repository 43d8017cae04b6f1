//! Event Loop - terminal lifecycle and the render cadence
//!
//! The renderer only ever reads store snapshots; host monitors keep running
//! on their own tasks whatever happens here.

use std::io;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use gpuwatch_common::render::build_rows;
use gpuwatch_common::ObservationStore;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::render::draw_dashboard;

/// Poll granularity of the blocking key reader.
const INPUT_POLL: Duration = Duration::from_millis(100);

/// Messages from the input thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuiMessage {
    Quit,
    Redraw,
}

/// Map a terminal event to a message, if it means anything to us.
fn translate(event: Event) -> Option<TuiMessage> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(TuiMessage::Quit),
            (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => Some(TuiMessage::Quit),
            (KeyCode::Char('r'), _) => Some(TuiMessage::Redraw),
            _ => None,
        },
        Event::Resize(_, _) => Some(TuiMessage::Redraw),
        _ => None,
    }
}

/// Run the dashboard until the user quits or SIGINT arrives.
pub async fn run(store: ObservationStore, refresh: Duration) -> Result<()> {
    enable_raw_mode().map_err(|e| {
        anyhow::anyhow!("Failed to enable raw mode: {}. Ensure you're running in a real terminal (TTY).", e)
    })?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(|e| {
        let _ = disable_raw_mode();
        anyhow::anyhow!("Failed to initialize terminal: {}", e)
    })?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (tx, mut rx) = mpsc::channel(32);
    let input = tokio::task::spawn_blocking(move || read_input(tx));

    let result = run_event_loop(&mut terminal, &store, refresh, &mut rx).await;

    // Restore terminal (always attempt cleanup)
    let cleanup_result = restore_terminal(&mut terminal);

    // Dropping the receiver makes the input thread exit on its next poll.
    drop(rx);
    let _ = input.await;

    result.and(cleanup_result)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Blocking key reader, run on a blocking thread.
fn read_input(tx: mpsc::Sender<TuiMessage>) {
    while !tx.is_closed() {
        match event::poll(INPUT_POLL) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                debug!("Input poll failed: {}", e);
                let _ = tx.blocking_send(TuiMessage::Quit);
                return;
            }
        }
        match event::read() {
            Ok(event) => {
                if let Some(message) = translate(event) {
                    if tx.blocking_send(message).is_err() {
                        return;
                    }
                }
            }
            Err(e) => debug!("Input read failed: {}", e),
        }
    }
}

async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    store: &ObservationStore,
    refresh: Duration,
    rx: &mut mpsc::Receiver<TuiMessage>,
) -> Result<()> {
    let mut ticker = tokio::time::interval(refresh);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            message = rx.recv() => match message {
                Some(TuiMessage::Redraw) => {}
                Some(TuiMessage::Quit) | None => {
                    info!("Quit requested");
                    break;
                }
            },
            _ = &mut interrupt => {
                info!("Interrupted");
                break;
            }
        }

        let snapshot = store.snapshot().await;
        let rows = build_rows(&snapshot, Utc::now());
        terminal.draw(|f| draw_dashboard(f, &rows, snapshot.len()))?;
    }

    Ok(())
}
