use serde::{Deserialize, Serialize};

/// Splits a frame into its fields. Blank frames yield `None`.
pub fn parse_frame(line: &str) -> Option<Vec<String>> {
    let fields: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

/// A frame received from one subscribed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    /// Position of the sending node in the subscription.
    pub sender: usize,
    pub fields: Vec<String>,
}

impl EventMessage {
    pub fn topic(&self) -> &str {
        self.fields.first().map(String::as_str).unwrap_or("")
    }
}

/// Leading tokens a frame must start with. Trailing frame fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventPattern(Vec<String>);

impl EventPattern {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn matches(&self, fields: &[String]) -> bool {
        self.0.len() <= fields.len() && self.0.iter().zip(fields).all(|(p, f)| p == f)
    }
}
