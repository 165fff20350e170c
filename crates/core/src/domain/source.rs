// Job source description

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};

/// Discriminant of [`JobSource`], stored in its own column for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    SyllabusTopics,
    UploadedDocument,
    QuestionBank,
    MockPattern,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::SyllabusTopics => "syllabus_topics",
            SourceKind::UploadedDocument => "uploaded_document",
            SourceKind::QuestionBank => "question_bank",
            SourceKind::MockPattern => "mock_pattern",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a job's content comes from.
///
/// Each variant carries exactly the fields its source collaborator needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobSource {
    /// One or more topics of a syllabus subject; several topics make a multi-target job
    SyllabusTopics { subject: String, topics: Vec<String> },
    /// A document uploaded earlier and stored by id
    UploadedDocument {
        document_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
    },
    /// Past exam questions for a year and group
    QuestionBank { year: u16, group: String },
    /// A full mock exam laid out as named sections
    MockPattern { pattern_id: String },
}

impl JobSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            JobSource::SyllabusTopics { .. } => SourceKind::SyllabusTopics,
            JobSource::UploadedDocument { .. } => SourceKind::UploadedDocument,
            JobSource::QuestionBank { .. } => SourceKind::QuestionBank,
            JobSource::MockPattern { .. } => SourceKind::MockPattern,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            JobSource::SyllabusTopics { subject, topics } => {
                if subject.trim().is_empty() {
                    return Err(invalid("subject cannot be empty"));
                }
                if topics.is_empty() {
                    return Err(invalid("at least one topic is required"));
                }
                if topics.iter().any(|t| t.trim().is_empty()) {
                    return Err(invalid("topic names cannot be empty"));
                }
            }
            JobSource::UploadedDocument { document_id, .. } => {
                if document_id.trim().is_empty() {
                    return Err(invalid("document_id cannot be empty"));
                }
            }
            JobSource::QuestionBank { group, .. } => {
                if group.trim().is_empty() {
                    return Err(invalid("group cannot be empty"));
                }
            }
            JobSource::MockPattern { pattern_id } => {
                if pattern_id.trim().is_empty() {
                    return Err(invalid("pattern_id cannot be empty"));
                }
            }
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> DomainError {
    DomainError::ValidationError(msg.to_string())
}
