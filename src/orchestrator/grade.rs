//! Aggregate scoring glue for the analyze runner. `Grade::from_score` itself
//! lives on the domain entity; this module only
//! combines per-dimension scores into the single `overall_score` that
//! mapping consumes.

use crate::domain::models::Grade;

/// One analyzer dimension's outcome - `None` when the AI call for that
/// dimension failed; it is excluded from
/// the average rather than counted as zero.
#[derive(Debug, Clone, Copy)]
pub struct DimensionScore {
    pub score: Option<f64>,
}

/// Unweighted mean of the dimensions that actually produced a score. An
/// audit with every dimension missing scores `0.0` (worst grade, never a
/// division by zero).
pub fn overall_score(scores: &[DimensionScore]) -> f64 {
    let present: Vec<f64> = scores.iter().filter_map(|s| s.score).collect();
    if present.is_empty() {
        return 0.0;
    }
    present.iter().sum::<f64>() / present.len() as f64
}

pub fn grade_for(scores: &[DimensionScore]) -> Grade {
    Grade::from_score(overall_score(scores))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_present_dimensions_only() {
        let scores = [
            DimensionScore { score: Some(90.0) },
            DimensionScore { score: Some(70.0) },
            DimensionScore { score: None },
        ];
        assert_eq!(overall_score(&scores), 80.0);
    }

    #[test]
    fn all_missing_scores_zero() {
        let scores = [DimensionScore { score: None }, DimensionScore { score: None }];
        assert_eq!(overall_score(&scores), 0.0);
        assert!(matches!(grade_for(&scores), Grade::F));
    }
}
