use colored::*;
use lib_common::{DisplaySink, DisplayView, Notice};
use std::io::{self, Write};
use std::sync::Mutex;

/// ANSI: clear screen, cursor home.
const CLEAR_SCREEN: &str = "\x1B[2J\x1B[1;1H";

/// Renders counters and notices to a terminal.
pub struct TerminalDisplay<W: Write + Send> {
    out: Mutex<W>,
}

impl TerminalDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    fn write(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Nothing sensible to do if the terminal is gone.
        let _ = out.write_all(text.as_bytes()).and_then(|_| out.flush());
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub fn format_view(view: &DisplayView) -> String {
    let mut text = format!(
        "Total messages received: {}\n\nLast {} messages:\n",
        view.total_messages, view.max_to_show
    );
    let skip = view.recent_messages.len().saturating_sub(view.max_to_show);
    for (idx, msg) in view.recent_messages.iter().skip(skip).enumerate() {
        text.push_str(&format!("{}. {}\n", idx + 1, msg));
    }
    text
}

pub fn format_notice(notice: &Notice) -> ColoredString {
    let line = notice.to_string();
    match notice {
        Notice::Connecting { .. }
        | Notice::Connected { .. }
        | Notice::JoinSent { .. }
        | Notice::HeartbeatSent
        | Notice::Reward { .. } => line.green(),
        Notice::Fact { .. } => line.blue(),
        Notice::OtherEvent { .. } | Notice::Reconnecting { .. } => line.yellow(),
        Notice::FactWithoutAmount { .. } | Notice::Malformed { .. } | Notice::Closed { .. } => line.red(),
    }
}

impl<W: Write + Send> DisplaySink for TerminalDisplay<W> {
    fn render(&self, view: &DisplayView) {
        self.write(&format!("{}{}", CLEAR_SCREEN, format_view(view)));
    }

    fn notice(&self, notice: &Notice) {
        self.write(&format!("{}\n", format_notice(notice)));
    }
}
