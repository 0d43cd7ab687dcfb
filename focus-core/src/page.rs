//! Substitute page rendering
//!
//! Builds the interstitial served instead of a blocked site: a motivational
//! message drawn from the [`MessageSet`] and the time left in the session.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::FocusError;
use crate::Result;

/// Image shown above the message
pub const MOTIVATION_GIF_URL: &str = "https://media.giphy.com/media/v1.Y2lkPTc5MGI3NjExbTliaXBreXI0MnpudnFteGlncTJic3ZmOXRnemY3bGhxdm9kNWs0eSZlcD12MV9pbnRlcm5hbF9naWZfYnlfaWQmY3Q9Zw/PRgs2sn03T1xpCSWKe/giphy.gif";

pub const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";

/// Ordered, non-empty list of motivational messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSet {
    messages: Vec<String>,
}

impl MessageSet {
    pub fn new(messages: Vec<String>) -> Result<Self> {
        if messages.is_empty() {
            return Err(FocusError::EmptyMessageSet);
        }
        Ok(Self { messages })
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Uniform draw, repeats allowed
    pub fn choose(&self) -> &str {
        self.choose_with(&mut rand::thread_rng())
    }

    pub fn choose_with<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        // never empty, see `new`
        self.messages
            .choose(rng)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl Default for MessageSet {
    fn default() -> Self {
        Self {
            messages: default_messages(),
        }
    }
}

/// Messages used when no message file exists or it cannot be read
pub fn default_messages() -> Vec<String> {
    [
        "Stay focused! You’ve got this.",
        "Keep going—every minute counts.",
        "Focus now, succeed later.",
        "Don’t give up—you’re almost there.",
        "Your goals are waiting—push forward!",
        "Distraction is the enemy of progress.",
        "You are building your future right now.",
        "Stay in the zone—success is near.",
        "Every second focused is a step ahead.",
        "Your best work happens when you focus.",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect()
}

/// Remaining session time, clamped at zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub minutes: i64,
    pub seconds: i64,
}

impl Countdown {
    pub fn between(now: DateTime<Utc>, deadline: DateTime<Utc>) -> Self {
        let total = (deadline - now).num_seconds().max(0);
        Self {
            minutes: total / 60,
            seconds: total % 60,
        }
    }

    pub fn total_seconds(&self) -> i64 {
        self.minutes * 60 + self.seconds
    }
}

impl std::fmt::Display for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes, self.seconds)
    }
}

/// A rendered substitute response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutePage {
    pub message: String,
    pub countdown: Countdown,
    pub content_type: &'static str,
    pub body: String,
}

/// Render the interstitial for `message` with the time left until `deadline`.
///
/// If `now` is already past `deadline` (the timer has not fired yet) the countdown
/// shows `00:00`.
pub fn render(message: &str, now: DateTime<Utc>, deadline: DateTime<Utc>) -> SubstitutePage {
    let countdown = Countdown::between(now, deadline);
    let body = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Focus Mode</title>
</head>
<body style="font-family:sans-serif; text-align:center; background:#fafafa; margin-top:10%;">
    <img src="{gif}" width="180" height="180" alt="Motivation GIF" style="border-radius:16px; box-shadow:0 0 8px #ccc; margin-bottom:32px;"><br>
    <h2 style="margin-bottom:12px;">{message}</h2>
    <h3>Time remaining: <span id="countdown" data-seconds="{total}" style="color:#0078d4">{countdown}</span></h3>
    <p style="color:#888">Stay disciplined, and you will thank yourself later.</p>
<script>
(function () {{
    var el = document.getElementById("countdown");
    var left = parseInt(el.dataset.seconds, 10);
    setInterval(function () {{
        if (left > 0) {{ left -= 1; }}
        var m = Math.floor(left / 60), s = left % 60;
        el.textContent = (m < 10 ? "0" : "") + m + ":" + (s < 10 ? "0" : "") + s;
    }}, 1000);
}})();
</script>
</body>
</html>
"#,
        gif = MOTIVATION_GIF_URL,
        message = escape_html(message),
        total = countdown.total_seconds(),
        countdown = countdown,
    );

    SubstitutePage {
        message: message.to_string(),
        countdown,
        content_type: CONTENT_TYPE_HTML,
        body,
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
