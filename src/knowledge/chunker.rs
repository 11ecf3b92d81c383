//! Text Chunking Module
//!
//! Markdown 구조(헤더, 코드 블록, 문단)를 존중하며 문서를 청크로 나눕니다.
//! 일반 텍스트는 헤더가 없는 하나의 섹션으로 취급됩니다.

use std::sync::LazyLock;

use regex::Regex;

/// 오버랩 접두어 `...{tail}\n\n`의 고정 바이트 수
const OVERLAP_MARKUP: usize = 5;

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+").expect("valid header regex"));

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정 (단위: 바이트)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 이보다 작은 청크는 다음 청크와 병합
    pub min_characters: usize,
    /// 최대 청크 크기
    pub max_characters: usize,
    /// 이전 청크 끝에서 가져올 오버랩 크기 (0이면 사용 안 함)
    pub overlap_characters: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            min_characters: 200,
            max_characters: 1200,
            overlap_characters: 100,
        }
    }
}

impl ChunkConfig {
    /// 오버랩 없는 설정 (임베딩 호출 수 최소화)
    pub fn without_overlap() -> Self {
        Self {
            overlap_characters: 0,
            ..Self::default()
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할 (빈 청크 없음)
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// MarkdownChunker
// ============================================================================

/// Markdown 인식 청커
///
/// 1. 헤더 경계로 섹션 분리 (코드 블록 내부의 `#`은 무시)
/// 2. 긴 섹션은 문단, 그래도 길면 줄 단위로 분리
/// 3. 너무 작은 청크는 이웃과 병합
/// 4. 이전 청크의 끝부분을 오버랩으로 덧붙임
#[derive(Debug, Clone, Default)]
pub struct MarkdownChunker {
    config: ChunkConfig,
}

impl MarkdownChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    fn split_sections(&self, text: &str) -> Vec<String> {
        let mut sections = Vec::new();
        let mut current = String::new();
        let mut in_code_block = false;

        for line in text.lines() {
            if line.trim_start().starts_with("```") {
                in_code_block = !in_code_block;
            }

            if !in_code_block && HEADER.is_match(line) && !current.trim().is_empty() {
                sections.push(current.trim().to_string());
                current.clear();
            }

            current.push_str(line);
            current.push('\n');
        }

        if !current.trim().is_empty() {
            sections.push(current.trim().to_string());
        }

        sections
    }

    /// 분할 시 청크 크기 상한
    ///
    /// 오버랩을 붙여도 `max_characters`를 넘지 않도록 그만큼을 비워 둡니다.
    fn split_limit(&self) -> usize {
        let max = self.config.max_characters;
        match self.config.overlap_characters {
            0 => max,
            overlap => max
                .saturating_sub(overlap + OVERLAP_MARKUP)
                .max(max / 2)
                .max(1),
        }
    }

    fn split_long_section(&self, section: &str) -> Vec<String> {
        let max = self.split_limit();
        if section.len() <= max {
            return vec![section.to_string()];
        }

        let mut chunks = Vec::new();
        let mut current = String::new();

        for para in section.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            if para.len() > max {
                flush(&mut chunks, &mut current);
                chunks.extend(pack_lines(para, max));
                continue;
            }

            if !current.is_empty() && current.len() + para.len() + 2 > max {
                flush(&mut chunks, &mut current);
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(para);
        }
        flush(&mut chunks, &mut current);

        chunks
    }

    /// 최소 크기 미만인 청크를 뒤 청크와 병합 (분할 상한 이내에서만)
    fn merge_small_chunks(&self, chunks: Vec<String>) -> Vec<String> {
        if self.config.min_characters == 0 {
            return chunks;
        }
        let max = self.split_limit();

        let mut result: Vec<String> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match result.last_mut() {
                Some(last)
                    if last.len() < self.config.min_characters
                        && last.len() + chunk.len() + 2 <= max =>
                {
                    last.push_str("\n\n");
                    last.push_str(&chunk);
                }
                _ => result.push(chunk),
            }
        }
        result
    }

    fn apply_overlap(&self, chunks: Vec<String>) -> Vec<String> {
        let overlap = self.config.overlap_characters;
        if overlap == 0 || chunks.len() < 2 {
            return chunks;
        }

        let mut result = Vec::with_capacity(chunks.len());
        result.push(chunks[0].clone());

        for pair in chunks.windows(2) {
            let (prev, chunk) = (&pair[0], &pair[1]);
            let budget = self
                .config
                .max_characters
                .saturating_sub(chunk.len() + OVERLAP_MARKUP);
            let tail = word_aligned_tail(prev, overlap.min(budget));
            if tail.len() > 20 {
                result.push(format!("...{}\n\n{}", tail, chunk));
            } else {
                result.push(chunk.clone());
            }
        }

        result
    }
}

impl Chunker for MarkdownChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        let chunks: Vec<String> = self
            .split_sections(text)
            .iter()
            .flat_map(|s| self.split_long_section(s))
            .filter(|c| !c.trim().is_empty())
            .collect();

        self.apply_overlap(self.merge_small_chunks(chunks))
    }

    fn name(&self) -> &'static str {
        "MarkdownChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
}

/// 긴 문단을 줄 단위로 최대 크기까지 채워 나눔
///
/// 한 줄이 최대 크기를 넘으면 단어 경계에서 다시 자릅니다.
fn pack_lines(para: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in para.lines() {
        if line.len() > max {
            flush(&mut chunks, &mut current);
            chunks.extend(split_long_line(line, max).into_iter().map(str::to_string));
            continue;
        }
        if !current.is_empty() && current.len() + line.len() + 1 > max {
            flush(&mut chunks, &mut current);
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    flush(&mut chunks, &mut current);

    chunks
}

/// 한 줄을 최대 크기 이하 조각으로 분할
///
/// 마지막 공백에서 자르고, 공백이 없는 긴 단어는 UTF-8 경계에서 자릅니다.
fn split_long_line(line: &str, max: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = line.trim();

    while rest.len() > max {
        let mut cut = floor_char_boundary(rest, max);
        if cut == 0 {
            // max보다 긴 첫 글자
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let piece = match rest[..cut].rfind(char::is_whitespace) {
            Some(pos) if pos > 0 => &rest[..pos],
            _ => &rest[..cut],
        };
        let piece = piece.trim_end();
        pieces.push(piece);
        rest = rest[piece.len()..].trim_start();
    }
    if !rest.is_empty() {
        pieces.push(rest);
    }

    pieces
}

/// 문자열 끝에서 약 `n`바이트를 단어 경계에 맞춰 잘라냄
fn word_aligned_tail(s: &str, n: usize) -> &str {
    let start = floor_char_boundary(s, s.len().saturating_sub(n));
    let tail = &s[start..];
    match tail.find(char::is_whitespace) {
        Some(pos) if start > 0 => tail[pos..].trim(),
        _ => tail.trim(),
    }
}

/// UTF-8 경계 조정 (인덱스 이하로)
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn no_overlap(min: usize, max: usize) -> MarkdownChunker {
        MarkdownChunker::new(ChunkConfig {
            min_characters: min,
            max_characters: max,
            overlap_characters: 0,
        })
    }

    #[test]
    fn test_chunker_empty() {
        assert!(MarkdownChunker::default().chunk("  \n ").is_empty());
    }

    #[test]
    fn test_chunker_small_text_single_chunk() {
        let chunks = MarkdownChunker::default().chunk("# Roblox\n\nShort paragraph.");
        assert_eq!(chunks, vec!["# Roblox\n\nShort paragraph."]);
    }

    #[test]
    fn test_chunker_splits_on_headers() {
        let text = "# Section 1\n\nContent one.\n\n# Section 2\n\nContent two.";
        let chunks = no_overlap(0, 200).chunk(text);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("# Section 1"));
        assert!(chunks[1].starts_with("# Section 2"));
    }

    #[test]
    fn test_header_inside_code_block_ignored() {
        let text = "# Intro\n\n```sh\n# not a header\necho hi\n```\n\nAfter code.";
        let chunks = no_overlap(0, 500).chunk(text);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("# not a header"));
    }

    #[test]
    fn test_long_section_respects_max() {
        let para = "word ".repeat(30);
        let text = format!("{}\n\n{}\n\n{}", para.trim(), para.trim(), para.trim());
        let chunks = no_overlap(0, 200).chunk(&text);
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| c.len() <= 200));
    }

    #[test]
    fn test_long_paragraph_split_by_lines() {
        let para = (0..40)
            .map(|i| format!("line number {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = no_overlap(0, 100).chunk(&para);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 100));
    }

    #[test]
    fn test_single_long_line_split_at_words() {
        let line = "Maybelline opened a virtual store inside Roblox. ".repeat(60);
        let chunks = no_overlap(0, 300).chunk(&line);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 300));
        assert!(chunks.iter().all(|c| !c.starts_with(' ') && !c.ends_with(' ')));
        let words: usize = chunks.iter().map(|c| c.split_whitespace().count()).sum();
        assert_eq!(words, line.split_whitespace().count());
    }

    #[test]
    fn test_long_line_respects_max_with_overlap() {
        let line = "avatar ".repeat(1000);
        let chunks = MarkdownChunker::default().chunk(&line);
        let max = ChunkConfig::default().max_characters;
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= max));
        assert!(chunks[1].starts_with("..."));
    }

    #[test]
    fn test_long_word_cut_on_char_boundary() {
        let word = "세계".repeat(100);
        let chunks = no_overlap(0, 50).chunk(&word);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 50));
        assert_eq!(chunks.concat(), word);
    }

    #[test]
    fn test_merge_small_chunks() {
        let chunker = no_overlap(100, 500);
        let merged = chunker.merge_small_chunks(vec![
            "Short 1.".to_string(),
            "Short 2.".to_string(),
            "Short 3.".to_string(),
        ]);
        assert_eq!(merged, vec!["Short 1.\n\nShort 2.\n\nShort 3."]);
    }

    #[test]
    fn test_overlap_prefixes_previous_tail() {
        let chunker = MarkdownChunker::new(ChunkConfig {
            min_characters: 0,
            max_characters: 500,
            overlap_characters: 40,
        });
        let text = "# A\n\nThe first section talks about avatars and experiences.\n\n# B\n\nSecond.";
        let chunks = chunker.chunk(text);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].starts_with("..."));
        assert!(chunks[1].contains("avatars and experiences."));
        assert!(chunks[1].ends_with("# B\n\nSecond."));
    }

    #[test]
    fn test_floor_char_boundary() {
        let s = "Hello, 세계!";
        assert_eq!(floor_char_boundary(s, 5), 5);
        assert_eq!(floor_char_boundary(s, 8), 7);
        assert_eq!(floor_char_boundary(s, 100), s.len());
        assert_eq!(floor_char_boundary("", 0), 0);
    }
}
