//! 순위 통합 - RRF (Reciprocal Rank Fusion)
//!
//! 여러 검색 결과 목록(벡터/FTS5, 원본 질의/HyDE 가설 질의)을
//! 순위만으로 하나의 목록으로 합칩니다.
//!
//! ref: https://www.elastic.co/blog/hybrid-search-rrf

use std::collections::HashMap;

/// RRF 상수 (높은 순위에 더 많은 가중치)
pub const RRF_K: f32 = 60.0;

/// RRF 통합 결과
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    /// 청크 ID
    pub chunk_id: i64,
    /// RRF 통합 스코어 (높을수록 좋음)
    pub score: f32,
    /// 이 청크를 포함한 목록 수
    pub hits: usize,
}

/// 순위 목록들을 RRF로 통합
///
/// RRF Score = sum(1 / (k + rank)), rank는 1부터 시작합니다.
/// 동점이면 처음 등장한 순서(목록 순서, 순위 순서)를 유지합니다.
///
/// # Arguments
/// * `ranked_lists` - 청크 ID 목록들 (각각 순위 오름차순)
/// * `limit` - 최대 결과 수
pub fn rrf_fuse(ranked_lists: &[Vec<i64>], limit: usize) -> Vec<FusedHit> {
    let mut order: Vec<i64> = Vec::new();
    let mut scores: HashMap<i64, (f32, usize)> = HashMap::new();

    for list in ranked_lists {
        for (rank, chunk_id) in list.iter().enumerate() {
            let entry = scores.entry(*chunk_id).or_insert_with(|| {
                order.push(*chunk_id);
                (0.0, 0)
            });
            entry.0 += 1.0 / (RRF_K + rank as f32 + 1.0);
            entry.1 += 1;
        }
    }

    let mut fused: Vec<FusedHit> = order
        .into_iter()
        .map(|chunk_id| {
            let (score, hits) = scores[&chunk_id];
            FusedHit {
                chunk_id,
                score,
                hits,
            }
        })
        .collect();

    // sort_by는 안정 정렬
    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused.truncate(limit);
    fused
}

// ============================================================================
// Tests
// ============================================================================
