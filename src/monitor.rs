//! Live monitor - one status line with every mapping's current value
//!
//! Reads the control state store without consuming dirty flags, so drawing
//! never influences what dispatch sends.

use std::io::{self, Write};
use std::time::Duration;
use tracing::debug;

use crate::config::MappingRule;
use crate::session::Layout;
use crate::translate::display_percent;

/// Minimum time between two redraws (~60 Hz)
pub const DISPLAY_INTERVAL: Duration = Duration::from_millis(1000 / 60);

const NAME_WIDTH: usize = 12;
const BAR_WIDTH: usize = 20;

/// Name cut or padded to the fixed column width
fn fit_name(name: &str) -> String {
    let short: String = name.chars().take(NAME_WIDTH).collect();
    format!("{:<width$}", short, width = NAME_WIDTH)
}

/// `|#####---------------|`
fn render_bar(percent: f64) -> String {
    let filled = ((percent / 100.0) * BAR_WIDTH as f64 + 0.5) as usize;
    let filled = filled.min(BAR_WIDTH);
    format!("|{}{}|", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

/// One mapping's cell of the status line
pub fn render_entry(rule: &MappingRule, value: i32) -> String {
    let name = fit_name(&rule.control.name);
    if rule.control.is_button {
        let state = if value != 0 { "ON " } else { "OFF" };
        format!("[{}] {}", name, state)
    } else {
        let percent = display_percent(rule, value);
        format!("[{}] {} {:>3.0}%", name, render_bar(percent), percent)
    }
}

/// Status line for every mapping in `layout`
pub fn render_status_line(layout: &Layout) -> String {
    layout
        .mappings()
        .iter()
        .enumerate()
        .map(|(index, rule)| render_entry(rule, layout.store().peek(index)))
        .collect::<Vec<_>>()
        .join("  ")
}

/// Redraws the status line in place
pub struct Monitor<W: Write> {
    out: W,
    last_width: usize,
    /// Set after the first failed write; later frames are skipped
    write_failed: bool,
}

impl Monitor<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Monitor<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_width: 0,
            write_failed: false,
        }
    }

    /// Overwrite the previous line with the current values
    fn draw(&mut self, layout: &Layout) -> io::Result<()> {
        let line = render_status_line(layout);
        let width = line.chars().count();
        let pad = self.last_width.saturating_sub(width);
        self.last_width = width;

        write!(self.out, "\r{}{}", line, " ".repeat(pad))?;
        self.out.flush()
    }

    /// Draw a frame, giving up on the output after its first write error
    pub fn show(&mut self, layout: &Layout) {
        if self.write_failed {
            return;
        }
        if let Err(e) = self.draw(layout) {
            self.write_failed = true;
            debug!("Monitor output failed, no longer drawing: {}", e);
        }
    }

    /// Leave the status line and move to a fresh one
    pub fn finish(&mut self) {
        if self.write_failed {
            return;
        }
        let result = writeln!(self.out).and_then(|()| self.out.flush());
        if let Err(e) = result {
            debug!("Monitor output failed on finish: {}", e);
        }
    }
}
