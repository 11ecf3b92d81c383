//! 문서 로더
//!
//! 수집기(collector)와 추출기(extractor)를 묶어 데이터 디렉토리를
//! `Document` 목록으로 변환합니다. 결과 순서는 탐색 순서와 같습니다.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::collector::{CollectorConfig, FileCollector};
use crate::extractor::ContentExtractor;

/// 인덱싱 전 원본 문서
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// 원본 파일 경로
    pub source: PathBuf,
    /// 표시용 제목 (파일 이름, PDF는 페이지 포함)
    pub title: String,
    /// 본문 텍스트
    pub text: String,
}

/// 디렉토리 기반 문서 로더
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    collector: FileCollector,
    extractor: ContentExtractor,
}

impl DocumentLoader {
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            collector: FileCollector::new(config),
            extractor: ContentExtractor::new(),
        }
    }

    /// 디렉토리를 재귀적으로 읽어 문서 목록 생성
    ///
    /// 디렉토리가 없거나 읽을 문서가 하나도 없으면 에러입니다.
    /// 개별 파일 읽기 실패는 경고 로그만 남기고 건너뜁니다.
    pub async fn load(&self, dir: &Path) -> Result<Vec<Document>> {
        let files = self.collector.collect_directory(dir)?;
        let mut documents = Vec::new();

        for file in &files {
            let file_name = file
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown");

            let contents = match self.extractor.extract(&file.path, file.file_type).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!("Skipping {:?}: {:#}", file.path, e);
                    continue;
                }
            };

            for content in contents {
                if content.text.trim().is_empty() {
                    continue;
                }

                let title = match (content.metadata.page_number, content.metadata.title) {
                    (Some(page), _) => format!("{} (Page {})", file_name, page),
                    (None, Some(title)) => title,
                    (None, None) => file_name.to_string(),
                };

                documents.push(Document {
                    source: file.path.clone(),
                    title,
                    text: content.text,
                });
            }
        }

        if documents.is_empty() {
            anyhow::bail!("No documents found in {:?}", dir);
        }

        tracing::info!(
            "Loaded {} documents from {} files in {:?}",
            documents.len(),
            files.len(),
            dir
        );
        Ok(documents)
    }
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new(CollectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_missing_directory() {
        let dir = TempDir::new().unwrap();
        let result = DocumentLoader::default().load(&dir.path().join("data")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_empty_directory() {
        let dir = TempDir::new().unwrap();
        let err = DocumentLoader::default().load(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("No documents found"));
    }

    #[tokio::test]
    async fn test_load_in_discovery_order() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("2024")).unwrap();
        std::fs::write(dir.path().join("about.md"), "Roblox is a game platform.").unwrap();
        std::fs::write(dir.path().join("blank.txt"), "   \n").unwrap();
        std::fs::write(
            dir.path().join("2024/maybelline.html"),
            "<html><head><title>Maybelline x Roblox</title></head><body>Beauty on Roblox</body></html>",
        )
        .unwrap();

        let docs = DocumentLoader::default().load(dir.path()).await.unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].title, "Maybelline x Roblox");
        assert_eq!(docs[0].text, "Beauty on Roblox");
        assert_eq!(docs[1].title, "about.md");
        assert!(docs[1].source.ends_with("about.md"));
    }

    #[tokio::test]
    async fn test_long_html_article_chunks_within_max() {
        use crate::knowledge::{ChunkConfig, Chunker, MarkdownChunker};

        let paragraphs: String = (0..100)
            .map(|i| {
                format!(
                    "<p>Paragraph {} describes how Maybelline brought a virtual beauty \
                     experience to Roblox players.</p>",
                    i
                )
            })
            .collect();
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("article.html"),
            format!(
                "<html><head><title>Maybelline</title></head><body><article>{}</article></body></html>",
                paragraphs
            ),
        )
        .unwrap();

        let docs = DocumentLoader::default().load(dir.path()).await.unwrap();
        let chunks = MarkdownChunker::default().chunk(&docs[0].text);

        let max = ChunkConfig::default().max_characters;
        assert!(docs[0].text.len() > max);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= max));
    }
}
