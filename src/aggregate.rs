//! Per-track online statistics.
//!
//! Each track keeps a fixed-size accumulator (count, running means and Welford's
//! second moment), so memory grows with the number of distinct tracks and never
//! with the number of frames a track is seen in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::detect::result::{validate_observation, BoundingBox};
use crate::error::MalformedDetection;
use crate::weight::WeightModel;

/// Running statistics for one track. Only exists once the track has been observed.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackStats {
    n: u64,
    weight_mean: f64,
    // Sum of squared deviations from the running weight mean.
    weight_m2: f64,
    confidence_mean: f64,
}

impl TrackStats {
    fn first(weight: f64, confidence: f64) -> Self {
        Self {
            n: 1,
            weight_mean: weight,
            weight_m2: 0.0,
            confidence_mean: confidence,
        }
    }

    fn push(&mut self, weight: f64, confidence: f64) {
        self.n += 1;
        let n = self.n as f64;
        let delta = weight - self.weight_mean;
        self.weight_mean += delta / n;
        self.weight_m2 += delta * (weight - self.weight_mean);
        self.confidence_mean += (confidence - self.confidence_mean) / n;
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    pub fn mean_weight(&self) -> f64 {
        self.weight_mean
    }

    pub fn mean_confidence(&self) -> f64 {
        self.confidence_mean
    }

    /// Population standard deviation of the weights; 0 for a single observation.
    pub fn weight_std_dev(&self) -> f64 {
        if self.n <= 1 {
            return 0.0;
        }
        (self.weight_m2.max(0.0) / self.n as f64).sqrt()
    }

    fn summary(&self, track_id: u64) -> TrackSummary {
        TrackSummary {
            track_id,
            weight_estimate: self.mean_weight(),
            confidence: self.mean_confidence(),
            uncertainty: self.weight_std_dev(),
        }
    }
}

/// Finalized per-track measurement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub track_id: u64,
    pub weight_estimate: f64,
    pub confidence: f64,
    pub uncertainty: f64,
}

/// Owns the statistics of every track seen during one run.
#[derive(Clone, Debug)]
pub struct TrackAggregator {
    model: WeightModel,
    tracks: BTreeMap<u64, TrackStats>,
    malformed: u64,
}

impl TrackAggregator {
    pub fn new(model: WeightModel) -> Self {
        Self {
            model,
            tracks: BTreeMap::new(),
            malformed: 0,
        }
    }

    /// Fold one detection into its track. Returns the weight estimated for this
    /// observation.
    ///
    /// Malformed observations are counted and rejected without touching any
    /// track's statistics.
    pub fn observe(
        &mut self,
        track_id: u64,
        bbox: &BoundingBox,
        confidence: f32,
    ) -> Result<f64, MalformedDetection> {
        if let Err(err) = validate_observation(track_id, bbox, confidence) {
            self.malformed += 1;
            return Err(err);
        }
        let weight = match self.model.estimate(bbox.area()) {
            Ok(weight) => weight,
            Err(_) => {
                // Unreachable after validation; kept as a recoverable rejection.
                self.malformed += 1;
                return Err(MalformedDetection::NonFiniteBox { track_id });
            }
        };

        let confidence = confidence as f64;
        self.tracks
            .entry(track_id)
            .and_modify(|stats| stats.push(weight, confidence))
            .or_insert_with(|| TrackStats::first(weight, confidence));
        Ok(weight)
    }

    /// Summaries for every observed track, ordered by ascending track id.
    ///
    /// Does not consume or reset state; repeated calls return equal results.
    pub fn finalize(&self) -> Vec<TrackSummary> {
        self.tracks
            .iter()
            .map(|(&track_id, stats)| stats.summary(track_id))
            .collect()
    }

    pub fn track(&self, track_id: u64) -> Option<&TrackStats> {
        self.tracks.get(&track_id)
    }

    /// Number of distinct tracks observed.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn malformed_events(&self) -> u64 {
        self.malformed
    }

    pub fn model(&self) -> &WeightModel {
        &self.model
    }
}
