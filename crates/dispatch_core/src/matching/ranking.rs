use std::cmp::Ordering;

use uuid::Uuid;

use super::types::MatchCandidate;

/// Ranking strategy over an already-filtered candidate set.
pub trait CandidateRanking: Send + Sync {
    /// The single best candidate, or `None` for an empty set.
    fn best(&self, candidates: &[MatchCandidate]) -> Option<Uuid>;
}

/// Ranks by ascending pickup distance, ties broken by descending rating.
#[derive(Debug, Default)]
pub struct NearestDriverRanking;

impl CandidateRanking for NearestDriverRanking {
    fn best(&self, candidates: &[MatchCandidate]) -> Option<Uuid> {
        candidates
            .iter()
            .min_by(|a, b| {
                a.distance_km
                    .partial_cmp(&b.distance_km)
                    .unwrap_or(Ordering::Equal)
                    .then(
                        b.rating
                            .partial_cmp(&a.rating)
                            .unwrap_or(Ordering::Equal),
                    )
            })
            .map(|candidate| candidate.driver_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(distance_km: f64, rating: f64) -> MatchCandidate {
        MatchCandidate {
            driver_id: Uuid::new_v4(),
            distance_km,
            rating,
        }
    }

    #[test]
    fn closer_driver_wins_regardless_of_rating() {
        let near = candidate(2.0, 3.1);
        let far = candidate(4.0, 4.9);
        let ranking = NearestDriverRanking;

        let best = ranking.best(&[far, near.clone()]).expect("best");
        assert_eq!(best, near.driver_id);
    }

    #[test]
    fn equal_distance_breaks_tie_by_rating() {
        let low = candidate(3.0, 4.5);
        let high = candidate(3.0, 4.9);
        let ranking = NearestDriverRanking;

        let best = ranking.best(&[low, high.clone()]).expect("best");
        assert_eq!(best, high.driver_id);
    }

    #[test]
    fn empty_set_has_no_best() {
        assert!(NearestDriverRanking.best(&[]).is_none());
    }
}
