//! Structural validation of request payloads.
//!
//! Checks are collected rather than short-circuited so a response can name
//! every offending field at once. Lengths count Unicode characters, not
//! bytes.

use crate::handlers::{CreateIssueRequest, UpdateIssueRequest};
use std::fmt;
use std::str::FromStr;
use tacks_core::model::{Priority, Status};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// The full set of failures for one payload. Renders as a semicolon-joined
/// list of `field: message` pairs for the error envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", err.field, err.message)?;
        }
        Ok(())
    }
}

/// Accumulates field errors across a payload.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// The value must contain something besides whitespace.
    pub fn require(&mut self, field: &'static str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "is required");
        }
    }

    pub fn max_chars(&mut self, field: &'static str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(field, format!("must not exceed {max} characters"));
        }
    }

    /// Parse the value into its closed vocabulary, recording a field error
    /// naming the allowed spellings on failure.
    pub fn one_of<T: FromStr>(
        &mut self,
        field: &'static str,
        value: &str,
        allowed: &[&str],
    ) -> Option<T> {
        match T::from_str(value) {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                self.add(field, format!("must be one of: {}", allowed.join(", ")));
                None
            }
        }
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }

    pub fn into_errors(self) -> ValidationErrors {
        ValidationErrors(self.errors)
    }
}

/// Validate a create payload; returns the parsed status/priority pair so the
/// handler never re-parses a value validation already vouched for.
pub fn create_issue(req: &CreateIssueRequest) -> Result<(Status, Priority), ValidationErrors> {
    let mut v = Validator::new();
    v.require("title", &req.title);
    v.max_chars("title", &req.title, MAX_TITLE_LEN);
    v.max_chars("description", &req.description, MAX_DESCRIPTION_LEN);
    let status = v.one_of::<Status>("status", &req.status, &Status::NAMES);
    let priority = v.one_of::<Priority>("priority", &req.priority, &Priority::NAMES);

    match (status, priority) {
        (Some(status), Some(priority)) => v.finish().map(|()| (status, priority)),
        _ => Err(v.into_errors()),
    }
}

/// Validate an update payload; the same bounds as creation, applied only to
/// fields actually present.
pub fn update_issue(req: &UpdateIssueRequest) -> Result<(), ValidationErrors> {
    let mut v = Validator::new();
    if let Some(ref title) = req.title {
        v.require("title", title);
        v.max_chars("title", title, MAX_TITLE_LEN);
    }
    if let Some(ref description) = req.description {
        v.max_chars("description", description, MAX_DESCRIPTION_LEN);
    }
    if let Some(ref status) = req.status {
        let _ = v.one_of::<Status>("status", status, &Status::NAMES);
    }
    if let Some(ref priority) = req.priority {
        let _ = v.one_of::<Priority>("priority", priority, &Priority::NAMES);
    }
    v.finish()
}
