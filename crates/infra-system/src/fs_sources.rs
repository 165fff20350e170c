// Filesystem source catalog
// All four source collaborators backed by one data directory:
//
//   syllabus/<subject>.json           [{ "title": ..., "description": ... }]
//   documents/<document_id>           stored upload bytes
//   question_bank/<year>/<group>.json [question, ...]
//   mock_patterns/<pattern_id>.json   { "name": ..., "sections": [...] }

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use quizgen_core::port::{
    DocumentExtractor, MockPattern, MockPatternProvider, QuestionBank, QuestionBankAccessor,
    SourceError, SyllabusProvider, TopicDescriptor,
};

pub struct FsSourceCatalog {
    root: PathBuf,
}

impl FsSourceCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `segments` under the root; ids that could escape it resolve to nothing
    fn path_for(&self, what: &str, segments: &[&str]) -> Result<PathBuf, SourceError> {
        let mut path = self.root.clone();
        for segment in segments {
            if segment.is_empty()
                || *segment == "."
                || *segment == ".."
                || segment.contains(['/', '\\'])
            {
                return Err(SourceError::NotFound(what.to_string()));
            }
            path.push(segment);
        }
        Ok(path)
    }

    async fn read_bytes(&self, what: &str, path: &Path) -> Result<Vec<u8>, SourceError> {
        debug!(path = %path.display(), "Reading source file");
        tokio::fs::read(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => SourceError::NotFound(what.to_string()),
            _ => SourceError::Unavailable(format!("{}: {}", what, e)),
        })
    }

    async fn read_json<T: DeserializeOwned>(&self, what: &str, path: &Path) -> Result<T, SourceError> {
        let bytes = self.read_bytes(what, path).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::Unavailable(format!("{} is not valid: {}", what, e)))
    }
}

#[async_trait]
impl SyllabusProvider for FsSourceCatalog {
    async fn topics(
        &self,
        subject: &str,
        names: &[String],
    ) -> Result<Vec<TopicDescriptor>, SourceError> {
        let what = format!("subject {}", subject);
        let file = format!("{}.json", subject);
        let path = self.path_for(&what, &["syllabus", &file])?;
        let known: Vec<TopicDescriptor> = self.read_json(&what, &path).await?;

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
impl DocumentExtractor for FsSourceCatalog {
    async fn extract_text(&self, document_id: &str) -> Result<String, SourceError> {
        let what = format!("document {}", document_id);
        let path = self.path_for(&what, &["documents", document_id])?;
        let bytes = self.read_bytes(&what, &path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[async_trait]
impl QuestionBankAccessor for FsSourceCatalog {
    async fn load(&self, year: u16, group: &str) -> Result<QuestionBank, SourceError> {
        let what = format!("question bank {}/{}", year, group);
        let year_dir = year.to_string();
        let file = format!("{}.json", group);
        let path = self.path_for(&what, &["question_bank", &year_dir, &file])?;
        let questions: Vec<serde_json::Value> = self.read_json(&what, &path).await?;

        Ok(QuestionBank {
            year,
            group: group.to_string(),
            questions,
        })
    }
}

#[async_trait]
impl MockPatternProvider for FsSourceCatalog {
    async fn pattern(&self, pattern_id: &str) -> Result<MockPattern, SourceError> {
        let what = format!("mock pattern {}", pattern_id);
        let file = format!("{}.json", pattern_id);
        let path = self.path_for(&what, &["mock_patterns", &file])?;
        self.read_json(&what, &path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn catalog() -> (TempDir, FsSourceCatalog) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("syllabus")).unwrap();
        fs::write(
            root.join("syllabus/biology.json"),
            r#"[{"title":"Cells","description":"Cell structure"},{"title":"Genetics"}]"#,
        )
        .unwrap();

        fs::create_dir_all(root.join("documents")).unwrap();
        fs::write(root.join("documents/doc-1"), b"Photosynthesis \xF0\x9F\x8C\xBF and \xFF light").unwrap();

        fs::create_dir_all(root.join("question_bank/2021")).unwrap();
        fs::write(
            root.join("question_bank/2021/A.json"),
            r#"[{"q":"Define osmosis"},{"q":"Name a vitamin"}]"#,
        )
        .unwrap();
        fs::write(root.join("question_bank/2021/B.json"), "not json").unwrap();

        fs::create_dir_all(root.join("mock_patterns")).unwrap();
        fs::write(
            root.join("mock_patterns/full.json"),
            r#"{"name":"Full mock","sections":[{"name":"Verbal","count":15},{"name":"Quant","count":20,"topics":["Algebra"]}]}"#,
        )
        .unwrap();

        let catalog = FsSourceCatalog::new(root);
        (dir, catalog)
    }

    #[tokio::test]
    async fn test_topics_in_requested_order() {
        let (_dir, catalog) = catalog();

        let topics = catalog
            .topics("biology", &["Genetics".to_string(), "Cells".to_string()])
            .await
            .unwrap();

        assert_eq!(topics[0].title, "Genetics");
        assert_eq!(topics[1].description.as_deref(), Some("Cell structure"));
    }

    #[tokio::test]
    async fn test_unknown_subject_and_topic() {
        let (_dir, catalog) = catalog();

        assert_eq!(
            catalog.topics("physics", &["Optics".to_string()]).await,
            Err(SourceError::NotFound("subject physics".to_string()))
        );
        assert_eq!(
            catalog.topics("biology", &["Ecology".to_string()]).await,
            Err(SourceError::NotFound("topic Ecology".to_string()))
        );
    }

    #[tokio::test]
    async fn test_document_text_is_lossy_utf8() {
        let (_dir, catalog) = catalog();

        let text = catalog.extract_text("doc-1").await.unwrap();
        assert!(text.starts_with("Photosynthesis 🌿"));
        assert!(text.contains('\u{FFFD}'));

        assert_eq!(
            catalog.extract_text("doc-2").await,
            Err(SourceError::NotFound("document doc-2".to_string()))
        );
    }

    #[tokio::test]
    async fn test_path_traversal_is_not_found() {
        let (_dir, catalog) = catalog();

        assert!(matches!(
            catalog.extract_text("../syllabus/biology.json").await,
            Err(SourceError::NotFound(_))
        ));
        assert!(matches!(
            catalog.extract_text("..").await,
            Err(SourceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_question_bank() {
        let (_dir, catalog) = catalog();

        let bank = catalog.load(2021, "A").await.unwrap();
        assert_eq!(bank.year, 2021);
        assert_eq!(bank.questions.len(), 2);

        assert!(matches!(
            catalog.load(2021, "B").await,
            Err(SourceError::Unavailable(_))
        ));
        assert_eq!(
            catalog.load(1999, "A").await,
            Err(SourceError::NotFound("question bank 1999/A".to_string()))
        );
    }

    #[tokio::test]
    async fn test_mock_pattern() {
        let (_dir, catalog) = catalog();

        let pattern = catalog.pattern("full").await.unwrap();
        assert_eq!(pattern.name, "Full mock");
        assert_eq!(pattern.sections.len(), 2);
        assert_eq!(pattern.sections[1].count, 20);
        assert!(pattern.sections[0].topics.is_empty());
    }
}
