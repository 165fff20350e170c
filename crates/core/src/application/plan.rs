// Plan resolution: turn a job source into ordered generation targets

use crate::application::allocation::allocate;
use crate::domain::{GenerationConfig, JobError, JobSource};
use crate::port::{GenerationTarget, SourceCatalog, SourceError};
use tracing::debug;

/// One generator call of a plan
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub target: GenerationTarget,
    pub count: u32,
}

/// Ordered generator calls for one job
///
/// Zero-count segments are dropped at construction and never reach the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    segments: Vec<Segment>,
}

impl Plan {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            segments: segments.into_iter().filter(|s| s.count > 0).collect(),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_multi_target(&self) -> bool {
        self.segments.len() > 1
    }

    pub fn step_labels(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.target.label()).collect()
    }

    pub fn total_count(&self) -> u32 {
        self.segments.iter().map(|s| s.count).sum()
    }
}

impl From<SourceError> for JobError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotFound(what) => JobError::SourceMissing(what),
            SourceError::Unavailable(_) => JobError::CollaboratorFailure(err.to_string()),
        }
    }
}

/// Resolve a source through its collaborator.
///
/// Syllabus topics are split with [`allocate`]; mock sections keep the
/// pattern's own per-section counts.
pub async fn resolve_plan(
    sources: &SourceCatalog,
    source: &JobSource,
    config: &GenerationConfig,
) -> Result<Plan, JobError> {
    let segments = match source {
        JobSource::SyllabusTopics { subject, topics } => {
            let descriptors = sources.syllabus.topics(subject, topics).await?;
            let shares = allocate(config.count, descriptors.len());
            descriptors
                .into_iter()
                .zip(shares)
                .map(|(topic, count)| Segment {
                    target: GenerationTarget::Topic {
                        subject: subject.clone(),
                        topic,
                    },
                    count,
                })
                .collect()
        }
        JobSource::UploadedDocument { document_id, .. } => {
            let text = sources.documents.extract_text(document_id).await?;
            vec![Segment {
                target: GenerationTarget::Document {
                    document_id: document_id.clone(),
                    text,
                },
                count: config.count,
            }]
        }
        JobSource::QuestionBank { year, group } => {
            let bank = sources.question_bank.load(*year, group).await?;
            vec![Segment {
                target: GenerationTarget::QuestionBank {
                    year: bank.year,
                    group: bank.group,
                    questions: bank.questions,
                },
                count: config.count,
            }]
        }
        JobSource::MockPattern { pattern_id } => {
            let pattern = sources.mock_patterns.pattern(pattern_id).await?;
            pattern
                .sections
                .into_iter()
                .map(|section| Segment {
                    count: section.count,
                    target: GenerationTarget::Section {
                        pattern: pattern.name.clone(),
                        section,
                    },
                })
                .collect()
        }
    };

    let plan = Plan::new(segments);
    debug!(
        source_kind = %source.kind(),
        segments = plan.segments().len(),
        total = plan.total_count(),
        "Resolved generation plan"
    );
    Ok(plan)
}
