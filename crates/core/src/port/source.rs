// Source collaborator ports
// One provider per source kind; all are read-only lookups

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// A syllabus topic as the generator sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDescriptor {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Historical questions for one year/group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionBank {
    pub year: u16,
    pub group: String,
    pub questions: Vec<serde_json::Value>,
}

/// One section of a mock exam layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockSection {
    pub name: String,
    pub count: u32,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Ordered sections of a full mock exam
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockPattern {
    pub name: String,
    pub sections: Vec<MockSection>,
}

/// Source lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The referenced source no longer exists
    #[error("{0} not found")]
    NotFound(String),

    /// The source exists but could not be read
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SyllabusProvider: Send + Sync {
    /// Resolve topic names of a subject, in the order requested.
    ///
    /// Fails with `NotFound` if the subject or any topic is unknown.
    async fn topics(
        &self,
        subject: &str,
        names: &[String],
    ) -> Result<Vec<TopicDescriptor>, SourceError>;
}

#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Raw text of a previously stored document
    async fn extract_text(&self, document_id: &str) -> Result<String, SourceError>;
}

#[async_trait]
pub trait QuestionBankAccessor: Send + Sync {
    async fn load(&self, year: u16, group: &str) -> Result<QuestionBank, SourceError>;
}

#[async_trait]
pub trait MockPatternProvider: Send + Sync {
    async fn pattern(&self, pattern_id: &str) -> Result<MockPattern, SourceError>;
}

/// The four source collaborators, wired once at the composition root
#[derive(Clone)]
pub struct SourceCatalog {
    pub syllabus: Arc<dyn SyllabusProvider>,
    pub documents: Arc<dyn DocumentExtractor>,
    pub question_bank: Arc<dyn QuestionBankAccessor>,
    pub mock_patterns: Arc<dyn MockPatternProvider>,
}

impl SourceCatalog {
    /// Use a single adapter that serves every source kind
    pub fn from_shared<T>(provider: Arc<T>) -> Self
    where
        T: SyllabusProvider
            + DocumentExtractor
            + QuestionBankAccessor
            + MockPatternProvider
            + 'static,
    {
        Self {
            syllabus: provider.clone(),
            documents: provider.clone(),
            question_bank: provider.clone(),
            mock_patterns: provider,
        }
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory source data for every kind
    #[derive(Default)]
    pub struct StaticSources {
        subjects: Mutex<HashMap<String, Vec<TopicDescriptor>>>,
        documents: Mutex<HashMap<String, String>>,
        banks: Mutex<HashMap<(u16, String), QuestionBank>>,
        patterns: Mutex<HashMap<String, MockPattern>>,
    }

    impl StaticSources {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_subject(self, subject: &str, topics: &[&str]) -> Self {
            let descriptors = topics
                .iter()
                .map(|t| TopicDescriptor {
                    title: t.to_string(),
                    description: None,
                })
                .collect();
            self.subjects
                .lock()
                .unwrap()
                .insert(subject.to_string(), descriptors);
            self
        }

        pub fn with_document(self, id: &str, text: &str) -> Self {
            self.documents
                .lock()
                .unwrap()
                .insert(id.to_string(), text.to_string());
            self
        }

        pub fn with_bank(self, year: u16, group: &str, questions: Vec<serde_json::Value>) -> Self {
            self.banks.lock().unwrap().insert(
                (year, group.to_string()),
                QuestionBank {
                    year,
                    group: group.to_string(),
                    questions,
                },
            );
            self
        }

        pub fn with_pattern(self, id: &str, sections: &[(&str, u32)]) -> Self {
            let pattern = MockPattern {
                name: id.to_string(),
                sections: sections
                    .iter()
                    .map(|(name, count)| MockSection {
                        name: name.to_string(),
                        count: *count,
                        topics: vec![],
                    })
                    .collect(),
            };
            self.patterns
                .lock()
                .unwrap()
                .insert(id.to_string(), pattern);
            self
        }

        pub fn remove_document(&self, id: &str) {
            self.documents.lock().unwrap().remove(id);
        }
    }

    #[async_trait]
    impl SyllabusProvider for StaticSources {
        async fn topics(
            &self,
            subject: &str,
            names: &[String],
        ) -> Result<Vec<TopicDescriptor>, SourceError> {
            let subjects = self.subjects.lock().unwrap();
            let known = subjects
                .get(subject)
                .ok_or_else(|| SourceError::NotFound(format!("subject {}", subject)))?;
            names
                .iter()
                .map(|name| {
                    known
                        .iter()
                        .find(|t| &t.title == name)
                        .cloned()
                        .ok_or_else(|| SourceError::NotFound(format!("topic {}", name)))
                })
                .collect()
        }
    }

    #[async_trait]
    impl DocumentExtractor for StaticSources {
        async fn extract_text(&self, document_id: &str) -> Result<String, SourceError> {
            self.documents
                .lock()
                .unwrap()
                .get(document_id)
                .cloned()
                .ok_or_else(|| SourceError::NotFound(format!("document {}", document_id)))
        }
    }

    #[async_trait]
    impl QuestionBankAccessor for StaticSources {
        async fn load(&self, year: u16, group: &str) -> Result<QuestionBank, SourceError> {
            self.banks
                .lock()
                .unwrap()
                .get(&(year, group.to_string()))
                .cloned()
                .ok_or_else(|| {
                    SourceError::NotFound(format!("question bank {}/{}", year, group))
                })
        }
    }

    #[async_trait]
    impl MockPatternProvider for StaticSources {
        async fn pattern(&self, pattern_id: &str) -> Result<MockPattern, SourceError> {
            self.patterns
                .lock()
                .unwrap()
                .get(pattern_id)
                .cloned()
                .ok_or_else(|| SourceError::NotFound(format!("mock pattern {}", pattern_id)))
        }
    }
}
