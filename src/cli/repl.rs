//! Interactive chat line parsing.

/// One line typed into the interactive chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Message(String),
    /// `/new`: start a fresh conversation.
    New,
    /// `/approve <id>` or `/deny <id>`.
    Approval { id: String, approve: bool },
    Quit,
    Empty,
    /// A slash command that is not understood, with a hint.
    Invalid(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Message(line.to_string());
        };

        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or("");
        let arg = parts.next();
        match (name, arg) {
            ("new" | "reset", None) => Self::New,
            ("quit" | "exit" | "q", None) => Self::Quit,
            ("approve", Some(id)) => Self::Approval {
                id: id.to_string(),
                approve: true,
            },
            ("deny", Some(id)) => Self::Approval {
                id: id.to_string(),
                approve: false,
            },
            ("approve" | "deny", None) => Self::Invalid(format!("usage: /{name} <approval id>")),
            _ => Self::Invalid(format!(
                "unknown command /{name}; try /new, /approve <id>, /deny <id>, /quit"
            )),
        }
    }
}
