// Generator Port
// Abstraction over the external content-generation service

use crate::domain::{Difficulty, GeneratedItem};
use crate::port::source::{MockSection, TopicDescriptor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// What one generator call produces content about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationTarget {
    Topic {
        subject: String,
        topic: TopicDescriptor,
    },
    Document {
        document_id: String,
        text: String,
    },
    QuestionBank {
        year: u16,
        group: String,
        questions: Vec<serde_json::Value>,
    },
    Section {
        pattern: String,
        section: MockSection,
    },
}

impl GenerationTarget {
    /// Short human-readable name used in progress labels and step lists
    pub fn label(&self) -> String {
        match self {
            GenerationTarget::Topic { topic, .. } => topic.title.clone(),
            GenerationTarget::Document { document_id, .. } => format!("document {}", document_id),
            GenerationTarget::QuestionBank { year, group, .. } => {
                format!("{} question bank ({})", year, group)
            }
            GenerationTarget::Section { section, .. } => section.name.clone(),
        }
    }
}

/// A single call into the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub target: GenerationTarget,
    pub count: u32,
    pub difficulty: Difficulty,
}

/// Generation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The generator observed the cancellation token and stopped
    #[error("generation cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),
}

/// Receives progress of one generator call
///
/// `percent` is local to the call (0..=100); callers map it onto the job.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, percent: u8, label: &str);
}

/// Generator trait
///
/// Contract:
/// - never returns an empty `Ok` on failure; it raises instead
/// - reports progress with non-decreasing percent
/// - may stop early when `cancel` is signalled, returning `GenerationError::Cancelled`
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Vec<GeneratedItem>, GenerationError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    /// Behavior of one scripted call
    #[derive(Debug, Clone)]
    pub enum Step {
        /// Report progress and return `count` items
        Items,
        /// Fail with message
        Fail(String),
        /// Return Ok with no items (contract violation)
        Empty,
        /// Panic with message
        Panic(String),
        /// Report 50%, wait for the notify, then return items
        WaitFor(Arc<Notify>),
    }

    /// Scripted generator: pops one step per call, `Items` once the script runs out
    #[derive(Default)]
    pub struct ScriptedGenerator {
        script: Mutex<VecDeque<Step>>,
        calls: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedGenerator {
        pub fn new(steps: Vec<Step>) -> Self {
            Self {
                script: Mutex::new(steps.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn succeeding() -> Self {
            Self::new(vec![])
        }

        pub fn calls(&self) -> Vec<GenerationRequest> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn items_for(request: &GenerationRequest) -> Vec<GeneratedItem> {
            let label = request.target.label();
            (0..request.count)
                .map(|n| GeneratedItem::new(serde_json::json!({ "target": label, "n": n })))
                .collect()
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(
            &self,
            request: &GenerationRequest,
            progress: &dyn ProgressReporter,
            _cancel: &CancellationToken,
        ) -> Result<Vec<GeneratedItem>, GenerationError> {
            self.calls.lock().unwrap().push(request.clone());
            let step = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Step::Items);

            match step {
                Step::Items => {
                    progress.report(50, "halfway").await;
                    progress.report(100, "done").await;
                    Ok(Self::items_for(request))
                }
                Step::Fail(msg) => Err(GenerationError::Failed(msg)),
                Step::Empty => Ok(vec![]),
                Step::Panic(msg) => panic!("{}", msg),
                Step::WaitFor(notify) => {
                    progress.report(50, "waiting").await;
                    notify.notified().await;
                    Ok(Self::items_for(request))
                }
            }
        }
    }
}
