use crate::profile::RowProfile;

use super::LevelCandidate;

/// Rank profile bands whose value reaches `minimum_evidence`.
///
/// Candidates are ordered by score, strongest first, ties resolved towards the top of the image. At most
/// `max_candidates` are returned; `0` returns all of them.
pub fn rank_by_threshold(
    profile: &RowProfile,
    max_candidates: usize,
    minimum_evidence: f64,
) -> Vec<LevelCandidate> {
    let mut ranked: Vec<LevelCandidate> = profile
        .entries
        .iter()
        .filter(|e| e.value >= minimum_evidence)
        .map(|e| LevelCandidate::measured(e.row, profile.image_height, e.value))
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.row.cmp(&b.row)));
    if max_candidates > 0 {
        ranked.truncate(max_candidates);
    }
    ranked
}
