//! Line-oriented command shell

use chrono::Local;
use focus_core::{
    BlockEntry, FocusError, FocusStore, SessionController, SessionStatus, StartOutcome,
    StopOutcome,
};
use std::io::Write;
use tracing::warn;

const COMMANDS: &str = "Commands: add, remove, list, focus, stop, stats, log, status, help, exit";

const HELP: &str = "\
  add <name> <host>   block <host> and its subdomains under <name>
  remove <name>       remove the rule called <name>
  list                show the blocklist
  focus <minutes>     start a focus session
  stop                end the focus session early
  stats               blocked attempts and estimated time saved
  log                 most recent requests, blocked and allowed
  status              whether a session is running and time left
  help                this text
  exit                stop any session and quit";

/// What the read loop should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Shell<W: Write> {
    controller: SessionController,
    store: FocusStore,
    out: W,
    log_tail: usize,
    proxy_server: String,
}

impl<W: Write> Shell<W> {
    pub fn new(
        controller: SessionController,
        store: FocusStore,
        out: W,
        log_tail: usize,
        proxy_server: String,
    ) -> Self {
        Self {
            controller,
            store,
            out,
            log_tail,
            proxy_server,
        }
    }

    pub fn banner(&mut self) -> std::io::Result<()> {
        writeln!(self.out, "Focuswall v{}", env!("CARGO_PKG_VERSION"))?;
        writeln!(self.out, "{}", COMMANDS)
    }

    pub fn prompt(&mut self) -> std::io::Result<()> {
        write!(self.out, "> ")?;
        self.out.flush()
    }

    pub fn farewell(&mut self) -> std::io::Result<()> {
        writeln!(self.out, "Goodbye.")
    }

    /// Execute one input line
    pub async fn execute(&mut self, line: &str) -> anyhow::Result<Flow> {
        let parts = split_args(line);
        let Some(command) = parts.first() else {
            return Ok(Flow::Continue);
        };

        match command.to_lowercase().as_str() {
            "add" => self.add(&parts)?,
            "remove" => self.remove(&parts)?,
            "list" => self.list()?,
            "focus" => self.focus(&parts).await?,
            "stop" => self.stop().await?,
            "stats" => self.stats()?,
            "log" => self.log()?,
            "status" => self.status().await?,
            "help" => {
                writeln!(self.out, "{}", COMMANDS)?;
                writeln!(self.out, "{}", HELP)?;
            }
            "exit" | "quit" => return Ok(Flow::Exit),
            _ => writeln!(self.out, "{}", COMMANDS)?,
        }
        Ok(Flow::Continue)
    }

    fn add(&mut self, parts: &[&str]) -> std::io::Result<()> {
        let [_, name, host] = parts else {
            return writeln!(self.out, "Usage: add [name] [host]");
        };

        let entry = match BlockEntry::new(*name, host) {
            Ok(entry) => entry,
            Err(e) => return writeln!(self.out, "{}", e),
        };
        let host = entry.host.clone();
        match self.controller.context().add_entry(entry) {
            Ok(list) => {
                writeln!(self.out, "Added {} → {}", name, host)?;
                if let Err(e) = self.store.save_blocklist(&list) {
                    self.report_save_failure(e)?;
                }
                Ok(())
            }
            Err(e) if e.is_usage() => writeln!(self.out, "{}", e),
            Err(e) => {
                warn!("Failed to add {}: {}", name, e);
                writeln!(self.out, "Failed to add {}: {}", name, e)
            }
        }
    }

    fn remove(&mut self, parts: &[&str]) -> std::io::Result<()> {
        let Some(name) = parts.get(1) else {
            return writeln!(self.out, "Usage: remove [name]");
        };

        let (list, removed) = self.controller.context().remove_entry(name);
        if !removed {
            return writeln!(self.out, "Not found.");
        }
        writeln!(self.out, "Removed.")?;
        if let Err(e) = self.store.save_blocklist(&list) {
            self.report_save_failure(e)?;
        }
        Ok(())
    }

    fn report_save_failure(&mut self, e: FocusError) -> std::io::Result<()> {
        warn!("Failed to save blocklist: {}", e);
        writeln!(
            self.out,
            "Warning: blocklist updated for this run but could not be saved: {}",
            e
        )
    }

    fn list(&mut self) -> std::io::Result<()> {
        let list = self.controller.context().blocklist();
        if list.is_empty() {
            return writeln!(self.out, "Blocklist is empty.");
        }
        for entry in list.entries() {
            writeln!(self.out, "• {} = {}", entry.name, entry.host)?;
        }
        Ok(())
    }

    async fn focus(&mut self, parts: &[&str]) -> std::io::Result<()> {
        let minutes = parts.get(1).and_then(|arg| arg.parse::<u32>().ok());
        let Some(minutes) = minutes else {
            if self.controller.is_active().await {
                return writeln!(self.out, "Focus mode is already active.");
            }
            return writeln!(self.out, "Usage: focus [minutes]");
        };

        match self.controller.start(minutes).await {
            Ok(StartOutcome::Started { .. }) => writeln!(
                self.out,
                "🔒 Focus mode ON for {} minutes. Set browser proxy to {}",
                minutes, self.proxy_server
            ),
            Ok(StartOutcome::AlreadyActive { .. }) => {
                writeln!(self.out, "Focus mode is already active.")
            }
            Err(e) if e.is_usage() => writeln!(self.out, "Usage: focus [minutes]"),
            Err(e) => writeln!(self.out, "Failed to start proxy: {}", e),
        }
    }

    async fn stop(&mut self) -> std::io::Result<()> {
        match self.controller.stop().await {
            StopOutcome::Stopped => writeln!(self.out, "Focus mode stopped."),
            StopOutcome::NotActive => writeln!(self.out, "Focus mode is not active."),
        }
    }

    fn stats(&mut self) -> std::io::Result<()> {
        let stats = self.controller.context().stats();
        writeln!(self.out, "=== Focuswall Productivity Stats ===")?;
        writeln!(
            self.out,
            "Total blocked attempts this session: {}",
            stats.blocked_attempts
        )?;
        writeln!(
            self.out,
            "Estimated time saved: {:.1} minutes",
            stats.estimated_minutes_saved
        )?;
        writeln!(
            self.out,
            "Efficiency increased! You’ve protected your focus {} times.",
            stats.blocked_attempts
        )?;
        if stats.blocked_attempts > 0 {
            writeln!(
                self.out,
                "Great job! Every blocked distraction brings you closer to your goals."
            )
        } else {
            writeln!(self.out, "Start a focus session and see your stats here!")
        }
    }

    fn log(&mut self) -> std::io::Result<()> {
        writeln!(
            self.out,
            "=== Last {} Website Requests (Blocked and Allowed) ===",
            self.log_tail
        )?;
        let entries = self.controller.context().recent(self.log_tail);
        if entries.is_empty() {
            return writeln!(self.out, "No requests recorded yet.");
        }
        for entry in entries {
            writeln!(self.out, "{}", entry.display_line())?;
        }
        Ok(())
    }

    async fn status(&mut self) -> std::io::Result<()> {
        match self.controller.status().await {
            SessionStatus::Idle => writeln!(self.out, "Focus mode is not active."),
            SessionStatus::Active { ends_at, remaining } => writeln!(
                self.out,
                "Focus mode is active: {} remaining (ends at {}).",
                remaining,
                ends_at.with_timezone(&Local).format("%H:%M:%S")
            ),
        }
    }
}

/// Split a command line into at most three parts: command, first argument,
/// and the untouched remainder.
fn split_args(line: &str) -> Vec<&str> {
    let mut parts = Vec::with_capacity(3);
    let mut rest = line.trim();
    while !rest.is_empty() && parts.len() < 2 {
        match rest.split_once(char::is_whitespace) {
            Some((head, tail)) => {
                parts.push(head);
                rest = tail.trim_start();
            }
            None => {
                parts.push(rest);
                rest = "";
            }
        }
    }
    if !rest.is_empty() {
        parts.push(rest);
    }
    parts
}
