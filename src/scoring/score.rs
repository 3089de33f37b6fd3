use std::collections::BTreeMap;

use crate::core::CategoryScore;

/// Weights are held as integer basis points so the weighted mean can be
/// rounded exactly.
const BASIS_POINTS: f64 = 10_000.0;

/// Category slug to weight, injected from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightTable {
    weights: BTreeMap<String, u64>,
}

impl WeightTable {
    /// Build from a config map. Weights that are not finite and positive, or
    /// that round to zero basis points, are dropped.
    pub fn from_map(map: &BTreeMap<String, f64>) -> Self {
        let mut weights = BTreeMap::new();
        for (slug, &weight) in map {
            let bp = if weight.is_finite() && weight > 0.0 {
                (weight * BASIS_POINTS).round() as u64
            } else {
                0
            };
            if bp > 0 {
                weights.insert(slug.clone(), bp);
            } else {
                tracing::warn!(slug = %slug, weight, "Ignoring invalid category weight");
            }
        }
        Self { weights }
    }

    pub fn get(&self, slug: &str) -> Option<f64> {
        self.basis_points(slug).map(|bp| bp as f64 / BASIS_POINTS)
    }

    pub fn basis_points(&self, slug: &str) -> Option<u64> {
        self.weights.get(slug).copied()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for WeightTable {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let map: BTreeMap<String, f64> = iter.into_iter().map(|(s, w)| (s.into(), w)).collect();
        Self::from_map(&map)
    }
}

/// Weighted mean (0-100) over the categories that are both present and
/// weighted, renormalized to their own total weight and rounded half-up.
/// Zero when nothing intersects.
pub fn compute_overall(scores: &[CategoryScore], weights: &WeightTable) -> u8 {
    let mut weighted_sum: u64 = 0;
    let mut total_weight: u64 = 0;
    for category in scores {
        if let Some(bp) = weights.basis_points(&category.category_slug) {
            weighted_sum += u64::from(category.score) * bp;
            total_weight += bp;
        }
    }

    if total_weight == 0 {
        return 0;
    }

    // floor(sum / total + 1/2) in integers.
    let rounded = (2 * weighted_sum + total_weight) / (2 * total_weight);
    rounded.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_score(slug: &str, score: u8) -> CategoryScore {
        CategoryScore {
            category_id: 0,
            category_slug: slug.to_string(),
            score,
            issue_count: 1,
            passed_count: 0,
            warning_count: 0,
            error_count: 0,
        }
    }

    fn default_weights() -> WeightTable {
        [
            ("seo", 0.25),
            ("performance", 0.25),
            ("accessibility", 0.2),
            ("security", 0.2),
            ("best_practices", 0.1),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn empty_scores() {
        assert_eq!(compute_overall(&[], &default_weights()), 0);
    }

    #[test]
    fn two_categories_round_half_up() {
        let scores = vec![make_score("seo", 87), make_score("performance", 100)];
        // (87*0.25 + 100*0.25) / 0.5 = 93.5
        assert_eq!(compute_overall(&scores, &default_weights()), 94);
    }

    #[test]
    fn exact_half_rounds_up_with_decimal_weights() {
        // (1*0.2 + 40*0.2) / 0.4 = 20.5
        let scores = vec![make_score("accessibility", 1), make_score("security", 40)];
        assert_eq!(compute_overall(&scores, &default_weights()), 21);

        // (0*0.2 + 43*0.2) / 0.4 = 21.5
        let scores = vec![make_score("accessibility", 0), make_score("security", 43)];
        assert_eq!(compute_overall(&scores, &default_weights()), 22);

        // (0*0.25 + 1*0.1) / 0.35 = 0.2857
        let scores = vec![make_score("seo", 0), make_score("best_practices", 1)];
        assert_eq!(compute_overall(&scores, &default_weights()), 0);
    }

    #[test]
    fn other_fractions_round_to_nearest() {
        // (0*0.25 + 49*0.25 + 100*0.1) / 0.6 = 37.083
        let scores = vec![
            make_score("seo", 0),
            make_score("performance", 49),
            make_score("best_practices", 100),
        ];
        assert_eq!(compute_overall(&scores, &default_weights()), 37);

        // (33*0.2 + 34*0.2 + 34*0.1) / 0.5 = 33.6
        let scores = vec![
            make_score("accessibility", 33),
            make_score("security", 34),
            make_score("best_practices", 34),
        ];
        assert_eq!(compute_overall(&scores, &default_weights()), 34);
    }

    #[test]
    fn single_category_is_its_own_score() {
        let scores = vec![make_score("security", 42)];
        assert_eq!(compute_overall(&scores, &default_weights()), 42);
    }

    #[test]
    fn all_five_weighted() {
        let scores = vec![
            make_score("seo", 80),
            make_score("performance", 60),
            make_score("accessibility", 100),
            make_score("security", 90),
            make_score("best_practices", 50),
        ];
        // 20 + 15 + 20 + 18 + 5 = 78
        assert_eq!(compute_overall(&scores, &default_weights()), 78);
    }

    #[test]
    fn unweighted_category_is_ignored() {
        let with_mobile = vec![make_score("seo", 90), make_score("mobile", 0)];
        let without = vec![make_score("seo", 90)];
        let weights = default_weights();
        assert_eq!(compute_overall(&with_mobile, &weights), 90);
        assert_eq!(compute_overall(&with_mobile, &weights), compute_overall(&without, &weights));
    }

    #[test]
    fn no_intersection_is_zero() {
        let scores = vec![make_score("mobile", 100), make_score("content", 100)];
        assert_eq!(compute_overall(&scores, &default_weights()), 0);
    }

    #[test]
    fn invalid_weights_are_dropped() {
        let table: WeightTable = [("seo", 0.5), ("bad", -1.0), ("nan", f64::NAN), ("zero", 0.0), ("tiny", 1e-9)]
            .into_iter()
            .collect();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("seo"), Some(0.5));
        assert_eq!(table.basis_points("seo"), Some(5_000));
        assert_eq!(table.get("bad"), None);
    }

    #[test]
    fn overall_stays_in_range() {
        let weights = default_weights();
        for score in [0u8, 1, 49, 50, 99, 100] {
            let scores = vec![make_score("seo", score), make_score("performance", 100 - score)];
            let overall = compute_overall(&scores, &weights);
            assert!(overall <= 100);
        }
    }
}
