use std::fmt;

/// Represents a chat platform user
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    pub id: String,
    pub username: Option<String>,
    pub is_bot: bool,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
            is_bot: false,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Mark the user as an automated account
    pub fn automated(mut self) -> Self {
        self.is_bot = true;
        self
    }

    /// Mention markup addressing this user
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }

    pub fn display_name(&self) -> String {
        self.username.clone().unwrap_or_else(|| self.id.clone())
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
