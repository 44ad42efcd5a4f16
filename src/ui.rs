use console::{truncate_str, Term};
use owo_colors::OwoColorize;
use unicode_width::UnicodeWidthStr;

use vaultcore::SessionStatus;

const MISSING: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Good,
    Caution,
    Bad,
    Muted,
}

impl Tone {
    fn marker(self) -> &'static str {
        match self {
            Tone::Good => "✓",
            Tone::Caution => "!",
            Tone::Bad => "✗",
            Tone::Muted => "·",
        }
    }
}

/// Terminal output for the CLI
pub struct UI {
    term: Term,
    color: bool,
}

impl UI {
    pub fn new() -> Self {
        let term = Term::stdout();
        let color = term.features().colors_supported();
        Self { term, color }
    }

    #[cfg(test)]
    fn plain() -> Self {
        Self {
            term: Term::stdout(),
            color: false,
        }
    }

    pub fn paint(&self, text: &str, tone: Tone) -> String {
        if !self.color {
            return text.to_string();
        }
        match tone {
            Tone::Good => text.green().to_string(),
            Tone::Caution => text.yellow().to_string(),
            Tone::Bad => text.red().to_string(),
            Tone::Muted => text.dimmed().to_string(),
        }
    }

    fn notice_line(&self, tone: Tone, message: &str) -> String {
        format!("{} {}", self.paint(tone.marker(), tone), message)
    }

    pub fn done(&self, message: &str) {
        println!("{}", self.notice_line(Tone::Good, message));
    }

    pub fn warn(&self, message: &str) {
        eprintln!("{}", self.notice_line(Tone::Caution, message));
    }

    pub fn fail(&self, message: &str) {
        eprintln!("{}", self.notice_line(Tone::Bad, message));
    }

    /// One-word session state, coloured by how usable the session is
    pub fn session_state(&self, status: &SessionStatus) -> String {
        let (text, tone) = if status.authenticated {
            ("signed in", Tone::Good)
        } else if status.expired && status.has_refresh_token {
            ("expired (refreshable)", Tone::Caution)
        } else if status.expired {
            ("expired", Tone::Bad)
        } else {
            ("signed out", Tone::Muted)
        };
        self.paint(text, tone)
    }

    /// Print `title` followed by aligned `label  value` rows
    pub fn fields(&self, title: &str, rows: &[(&str, Option<String>)]) {
        for line in self.render_fields(title, rows) {
            println!("{line}");
        }
    }

    fn render_fields(&self, title: &str, rows: &[(&str, Option<String>)]) -> Vec<String> {
        let label_width = rows.iter().map(|(label, _)| label.width()).max().unwrap_or(0);
        let value_width = self.columns().saturating_sub(label_width + 4).max(20);

        let heading = if self.color {
            title.bold().to_string()
        } else {
            title.to_string()
        };

        let mut lines = vec![heading];
        for (label, value) in rows {
            let padding = " ".repeat(label_width - label.width());
            let value = match value {
                Some(value) => truncate_str(value, value_width, "…").into_owned(),
                None => self.paint(MISSING, Tone::Muted),
            };
            lines.push(format!("  {}{padding}  {value}", self.paint(label, Tone::Muted)));
        }
        lines
    }

    fn columns(&self) -> usize {
        usize::from(self.term.size().1)
    }
}

impl Default for UI {
    fn default() -> Self {
        Self::new()
    }
}
