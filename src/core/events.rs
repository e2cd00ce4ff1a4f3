//! Terminal input and tick events for the UI loop

use anyhow::Result;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Application events
#[derive(Debug)]
pub enum Event {
    /// Tick event for periodic updates
    Tick,
    /// Keyboard event
    Key(KeyEvent),
    /// Terminal resize event
    Resize(u16, u16),
}

/// Polls crossterm on a blocking thread and forwards events
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Create a new event handler with the given tick rate in milliseconds
    pub fn new(tick_rate_ms: u64) -> Self {
        let tick_rate = Duration::from_millis(tick_rate_ms);
        let (tx, rx) = mpsc::unbounded_channel();

        // crossterm's poll/read block, so keep them off the async workers
        tokio::task::spawn_blocking(move || {
            let mut last_tick = Instant::now();

            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::ZERO);

                if event::poll(timeout).unwrap_or(false) {
                    let forwarded = match event::read() {
                        // Windows reports both press and release
                        Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                            tx.send(Event::Key(key))
                        }
                        Ok(CrosstermEvent::Resize(width, height)) => {
                            tx.send(Event::Resize(width, height))
                        }
                        Ok(_) => Ok(()),
                        Err(_) => break,
                    };
                    if forwarded.is_err() {
                        break;
                    }
                }

                if last_tick.elapsed() >= tick_rate {
                    if tx.send(Event::Tick).is_err() {
                        break;
                    }
                    last_tick = Instant::now();
                }
            }
        });

        Self { rx }
    }

    /// Get the next event
    pub async fn next(&mut self) -> Result<Event> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| anyhow::anyhow!("Event channel closed"))
    }
}
