//! PDF 텍스트 추출
//!
//! pdf-extract로 전체 텍스트를 뽑은 뒤 페이지 단위로 나눕니다.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

/// "--- Page 3 ---" 형태의 페이지 구분 줄
static PAGE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*[-=]+\s*(?:Page\s*)?\d+\s*[-=]+\s*$").expect("valid page marker regex")
});

/// PDF에서 페이지별 텍스트 추출
///
/// `(페이지 번호, 텍스트)` 목록을 반환합니다. 페이지 번호는 1부터 시작하며,
/// 텍스트가 전혀 없는 PDF(스캔본 등)는 빈 목록을 반환합니다.
pub fn extract_pages(path: &Path) -> Result<Vec<(usize, String)>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(vec![]);
    }

    Ok(split_pages(&text)
        .into_iter()
        .enumerate()
        .map(|(i, page)| (i + 1, page))
        .collect())
}

/// 폼피드(\x0c) 또는 페이지 구분 줄 기준으로 분리
fn split_pages(text: &str) -> Vec<String> {
    let by_formfeed = non_empty_trimmed(text.split('\x0c'));
    if by_formfeed.len() > 1 {
        return by_formfeed;
    }

    let by_marker = non_empty_trimmed(PAGE_MARKER.split(text));
    if by_marker.len() > 1 {
        return by_marker;
    }

    vec![text.trim().to_string()]
}

fn non_empty_trimmed<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<String> {
    parts
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
