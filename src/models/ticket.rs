use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::ml::text::TextPreprocessor;

/// A support ticket from the training corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Opaque ticket identifier
    pub ticket_id: String,

    /// Ticket subject line
    #[serde(default)]
    pub subject: String,

    /// Free-text body
    #[serde(default)]
    pub description: String,

    /// Ground-truth category
    pub category: String,

    /// Ground-truth priority, when recognised
    #[serde(default)]
    pub priority: Option<Priority>,

    /// Creation time as written in the corpus
    #[serde(default)]
    pub timestamp: String,
}

impl Ticket {
    pub fn new(
        ticket_id: impl Into<String>,
        subject: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            subject: subject.into(),
            description: description.into(),
            category: category.into(),
            priority: None,
            timestamp: String::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Document text fed to the feature extractor; identical to what the
    /// inference path builds from a request
    pub fn text(&self) -> String {
        TextPreprocessor::compose(&self.subject, &self.description)
    }

    /// Timestamp parsed as an ISO-8601 local date-time
    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f").ok()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, Display)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Check if priority requires immediate attention
    pub fn is_urgent(&self) -> bool {
        matches!(self, Priority::High | Priority::Critical)
    }
}
