//! 콘텐츠 추출 모듈
//!
//! 파일 형식별로 텍스트를 추출합니다.
//! - 텍스트 파일: 직접 읽기 (UTF-8 손실 변환)
//! - HTML 파일: scraper로 본문 텍스트 추출
//! - PDF 파일: pdf-extract로 페이지별 추출

pub mod html;
pub mod pdf;

use std::path::Path;

use anyhow::{Context, Result};

use crate::collector::FileType;

// ============================================================================
// Extracted Content
// ============================================================================

/// 추출된 콘텐츠
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// 추출된 텍스트
    pub text: String,
    /// 원본 파일 타입
    pub source_type: FileType,
    /// 메타데이터 (PDF 페이지 번호 등)
    pub metadata: ContentMetadata,
}

/// 콘텐츠 메타데이터
#[derive(Debug, Clone, Default)]
pub struct ContentMetadata {
    /// PDF 페이지 번호 (1부터 시작)
    pub page_number: Option<usize>,
    /// 총 페이지 수 (PDF)
    pub total_pages: Option<usize>,
    /// HTML <title>
    pub title: Option<String>,
}

// ============================================================================
// Content Extractor
// ============================================================================

/// 콘텐츠 추출기
#[derive(Debug, Clone, Default)]
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 파일에서 콘텐츠 추출
    pub async fn extract(&self, path: &Path, file_type: FileType) -> Result<Vec<ExtractedContent>> {
        match file_type {
            FileType::Text => self.extract_text(path).await,
            FileType::Html => self.extract_html(path).await,
            FileType::Pdf => self.extract_pdf(path).await,
        }
    }

    /// 텍스트 파일에서 추출
    async fn extract_text(&self, path: &Path) -> Result<Vec<ExtractedContent>> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read text file: {:?}", path))?;

        Ok(vec![ExtractedContent {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            source_type: FileType::Text,
            metadata: ContentMetadata::default(),
        }])
    }

    /// HTML 파일에서 추출
    async fn extract_html(&self, path: &Path) -> Result<Vec<ExtractedContent>> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read HTML file: {:?}", path))?;
        let extracted = html::extract_html(&String::from_utf8_lossy(&bytes));

        Ok(vec![ExtractedContent {
            text: extracted.body,
            source_type: FileType::Html,
            metadata: ContentMetadata {
                title: extracted.title,
                ..Default::default()
            },
        }])
    }

    /// PDF 파일에서 추출
    async fn extract_pdf(&self, path: &Path) -> Result<Vec<ExtractedContent>> {
        // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
        let path = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || pdf::extract_pages(&path))
            .await
            .context("PDF extraction task failed")??;

        let total_pages = pages.len();

        Ok(pages
            .into_iter()
            .map(|(page_num, text)| ExtractedContent {
                text,
                source_type: FileType::Pdf,
                metadata: ContentMetadata {
                    page_number: Some(page_num),
                    total_pages: Some(total_pages),
                    ..Default::default()
                },
            })
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
