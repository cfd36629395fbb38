use owo_colors::OwoColorize;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::interval;

use crate::output::OutputLevel;

const FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Waiting indicator drawn on stderr until the first output arrives.
///
/// Does nothing when stderr is not a terminal or output is quiet.
pub struct Spinner {
    is_active: Arc<AtomicBool>,
    enabled: bool,
    message: String,
}

impl Spinner {
    pub fn new(message: &str, output_level: OutputLevel) -> Self {
        Self {
            is_active: Arc::new(AtomicBool::new(false)),
            enabled: output_level.show_user() && io::stderr().is_terminal(),
            message: message.to_string(),
        }
    }

    pub fn start(&self) {
        if !self.enabled {
            return;
        }
        self.is_active.store(true, Ordering::Relaxed);
        let is_active = Arc::clone(&self.is_active);
        let message = self.message.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_millis(80));
            let mut frame_index = 0;

            while is_active.load(Ordering::Relaxed) {
                interval.tick().await;
                if !is_active.load(Ordering::Relaxed) {
                    break;
                }
                eprint!("\r{} {} ", message.blue().bold(), FRAMES[frame_index].cyan());
                io::stderr().flush().unwrap_or(());
                frame_index = (frame_index + 1) % FRAMES.len();
            }
        });
    }

    pub fn stop(&self) {
        if self.is_active.swap(false, Ordering::Relaxed) {
            eprint!("\r\x1b[K");
            io::stderr().flush().unwrap_or(());
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}
