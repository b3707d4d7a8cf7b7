//! Gap statistics reported alongside every iteration

use greedo_common::{ConfigError, DataError, GapMap, Result};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Deserializer, Serialize};

/// Min, mean, max and evenly spaced percentiles of a gap map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapSummary {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    #[serde(deserialize_with = "deserialize_percentile_step")]
    pub percentile_step: u32,
    /// Percentiles 0, step, 2·step, …, 100
    pub percentiles: Vec<f64>,
}

impl GapSummary {
    pub fn from_gaps(gaps: &GapMap, percentile_step: u32) -> Result<Self> {
        check_percentile_step(percentile_step)?;
        if gaps.is_empty() {
            return Err(DataError::EmptyPopulation.into());
        }

        let mut sorted: Vec<f64> = gaps.iter().map(|(_, gap)| gap).collect();
        sorted.sort_by_key(|gap| OrderedFloat(*gap));

        let percentiles = (0..=100)
            .step_by(percentile_step as usize)
            .map(|p| interpolate(&sorted, p))
            .collect();

        Ok(Self {
            min: sorted[0],
            mean: gaps.mean(),
            max: sorted[sorted.len() - 1],
            percentile_step,
            percentiles,
        })
    }

    /// Percentile ranks matching [`GapSummary::percentiles`]
    pub fn ranks(&self) -> impl Iterator<Item = u32> {
        (0..=100).step_by(self.percentile_step as usize)
    }
}

fn check_percentile_step(step: u32) -> std::result::Result<(), ConfigError> {
    if step == 0 || 100 % step != 0 {
        return Err(ConfigError::InvalidPercentileStep(step));
    }
    Ok(())
}

fn deserialize_percentile_step<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let step = u32::deserialize(deserializer)?;
    check_percentile_step(step).map_err(serde::de::Error::custom)?;
    Ok(step)
}

/// Linear interpolation between the two sorted values around the fractional rank
fn interpolate(sorted: &[f64], percentile: u32) -> f64 {
    let position = f64::from(percentile) / 100.0 * (sorted.len() - 1) as f64;
    let lower = position as usize;
    let weight = position - lower as f64;
    if lower + 1 < sorted.len() && weight >= 1e-8 {
        (1.0 - weight) * sorted[lower] + weight * sorted[lower + 1]
    } else {
        sorted[lower]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greedo_common::{AgentId, GreedoError};

    fn gaps(values: &[f64]) -> GapMap {
        values
            .iter()
            .enumerate()
            .map(|(i, g)| (AgentId::new(format!("p{i}")), *g))
            .collect()
    }

    #[test]
    fn test_summary() {
        let summary = GapSummary::from_gaps(&gaps(&[4.0, 1.0, 3.0, 2.0, 0.0]), 25).unwrap();
        assert_eq!(summary.min, 0.0);
        assert_eq!(summary.max, 4.0);
        assert!((summary.mean - 2.0).abs() < 1e-12);
        assert_eq!(summary.percentiles, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(summary.ranks().collect::<Vec<_>>(), vec![0, 25, 50, 75, 100]);
    }

    #[test]
    fn test_interpolated_percentiles() {
        let summary = GapSummary::from_gaps(&gaps(&[0.0, 10.0]), 10).unwrap();
        assert_eq!(summary.percentiles.len(), 11);
        assert!((summary.percentiles[3] - 3.0).abs() < 1e-9);
        assert_eq!(summary.percentiles[10], 10.0);
    }

    #[test]
    fn test_single_agent() {
        let summary = GapSummary::from_gaps(&gaps(&[-1.5]), 50).unwrap();
        assert_eq!(summary.percentiles, vec![-1.5, -1.5, -1.5]);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            GapSummary::from_gaps(&gaps(&[1.0]), 7),
            Err(GreedoError::Config(ConfigError::InvalidPercentileStep(7)))
        ));
        assert!(matches!(
            GapSummary::from_gaps(&GapMap::new(), 10),
            Err(GreedoError::Data(DataError::EmptyPopulation))
        ));
    }

    #[test]
    fn test_deserialize_checks_percentile_step() {
        let summary = GapSummary::from_gaps(&gaps(&[1.0, 2.0]), 50).unwrap();
        let json = serde_json::to_string(&summary).unwrap();
        let back: GapSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);

        for step in ["0", "7"] {
            let bad = json.replace("\"percentile_step\":50", &format!("\"percentile_step\":{step}"));
            assert_ne!(bad, json);
            let err = serde_json::from_str::<GapSummary>(&bad).unwrap_err();
            assert!(err.to_string().contains("Percentile step must divide 100"));
        }
    }
}
