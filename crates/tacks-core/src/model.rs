//! Domain model: issues, users, labels, and the closed status/priority
//! vocabularies shared by the store schema and the wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The five board columns an issue can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Backlog,
    Todo,
    #[serde(rename = "In Progress")]
    InProgress,
    Done,
    Canceled,
}

impl Status {
    /// Wire/store spellings, in board order.
    pub const NAMES: [&'static str; 5] = ["Backlog", "Todo", "In Progress", "Done", "Canceled"];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "Backlog",
            Self::Todo => "Todo",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
            Self::Canceled => "Canceled",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "Backlog" => Ok(Self::Backlog),
            "Todo" => Ok(Self::Todo),
            "In Progress" => Ok(Self::InProgress),
            "Done" => Ok(Self::Done),
            "Canceled" => Ok(Self::Canceled),
            other => anyhow::bail!(
                "unknown status '{other}': expected one of {}",
                Self::NAMES.join(", ")
            ),
        }
    }
}

/// Issue urgency ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const NAMES: [&'static str; 4] = ["Low", "Medium", "High", "Critical"];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "Low" => Ok(Self::Low),
            "Medium" => Ok(Self::Medium),
            "High" => Ok(Self::High),
            "Critical" => Ok(Self::Critical),
            other => anyhow::bail!(
                "unknown priority '{other}': expected one of {}",
                Self::NAMES.join(", ")
            ),
        }
    }
}

/// A board member. Read-only through the API; rows come from the seed tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// A colored tag. Read-only through the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// A fully hydrated issue as served to clients.
///
/// `labels` always serializes as an array (`[]` when empty); `assignee` is
/// omitted when the issue is unassigned, while `assignee_id` stays present
/// as `null` so clients can distinguish "unassigned" from "not hydrated".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    pub assignee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<User>,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub order_index: f64,
}

#[cfg(test)]
mod tests {
    use super::{Issue, Priority, Status};
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_strings() {
        for name in Status::NAMES {
            let status = Status::from_str(name).expect("parse status");
            assert_eq!(status.as_str(), name);
        }
        assert!(Status::from_str("Doing").is_err());
        assert!(Status::from_str("todo").is_err());
    }

    #[test]
    fn priority_round_trips_through_strings() {
        for name in Priority::NAMES {
            let priority = Priority::from_str(name).expect("parse priority");
            assert_eq!(priority.as_str(), name);
        }
        assert!(Priority::from_str("Urgent").is_err());
    }

    #[test]
    fn in_progress_serializes_with_space() {
        let json = serde_json::to_string(&Status::InProgress).expect("serialize");
        assert_eq!(json, "\"In Progress\"");
        let back: Status = serde_json::from_str("\"In Progress\"").expect("deserialize");
        assert_eq!(back, Status::InProgress);
    }

    #[test]
    fn issue_serialization_shape() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let issue = Issue {
            id: "abc".to_owned(),
            title: "T".to_owned(),
            description: String::new(),
            status: Status::Todo,
            priority: Priority::Low,
            assignee_id: None,
            assignee: None,
            labels: Vec::new(),
            created_at: created,
            updated_at: created,
            order_index: 0.0,
        };
        let value = serde_json::to_value(&issue).expect("serialize issue");
        assert_eq!(value["labels"], serde_json::json!([]));
        assert!(value["assignee_id"].is_null());
        assert!(value.get("assignee").is_none());
        assert!(value["created_at"].as_str().unwrap().starts_with("2024-05-01T12:00:00"));
    }
}
