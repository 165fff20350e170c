// Generation request parameters

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};

/// Upper bound on items a single job may request
pub const MAX_ITEM_COUNT: u32 = 500;

/// Requested difficulty, passed through to the generator untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "Easy"),
            Difficulty::Medium => write!(f, "Medium"),
            Difficulty::Hard => write!(f, "Hard"),
        }
    }
}

/// How the generated test is meant to be taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMode {
    #[default]
    Practice,
    Exam,
}

/// The exact request parameters that produced a job.
///
/// Stored verbatim on the record so a retry can reproduce the same request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub count: u32,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub mode: TestMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

impl GenerationConfig {
    pub fn new(count: u32, difficulty: Difficulty) -> Self {
        Self {
            count,
            difficulty,
            mode: TestMode::default(),
            duration_minutes: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.count == 0 || self.count > MAX_ITEM_COUNT {
            return Err(DomainError::ValidationError(format!(
                "count {} out of range (1..={})",
                self.count, MAX_ITEM_COUNT
            )));
        }
        if self.duration_minutes == Some(0) {
            return Err(DomainError::ValidationError(
                "duration_minutes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
