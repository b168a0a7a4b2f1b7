//! Feature-hash fallback model
//!
//! Used when no trained model can be loaded. Colour and texture statistics
//! choose the leading class; the upload digest spreads the remaining mass so
//! the same bytes always give the same distribution.

use super::preprocess::PreparedImage;
use super::{ClassifierError, ModelKind, ScoringModel};

/// Colour statistics on the 0..255 scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStats {
    pub mean: [f64; 3],
    pub std: [f64; 3],
    pub texture: f64,
}

impl ColorStats {
    pub fn from_image(image: &PreparedImage) -> Self {
        let mut sum = [0f64; 3];
        let mut sum_sq = [0f64; 3];
        let mut grey_sum = 0f64;
        let mut grey_sq = 0f64;
        let mut n = 0f64;

        for px in image.rgb() {
            let px = px.map(|v| v as f64 * 255.0);
            for c in 0..3 {
                sum[c] += px[c];
                sum_sq[c] += px[c] * px[c];
            }
            let grey = (px[0] + px[1] + px[2]) / 3.0;
            grey_sum += grey;
            grey_sq += grey * grey;
            n += 1.0;
        }

        if n == 0.0 {
            return Self { mean: [0.0; 3], std: [0.0; 3], texture: 0.0 };
        }

        let mean = sum.map(|s| s / n);
        let mut std = [0f64; 3];
        for c in 0..3 {
            std[c] = (sum_sq[c] / n - mean[c] * mean[c]).max(0.0).sqrt();
        }
        let grey_mean = grey_sum / n;
        let texture = (grey_sq / n - grey_mean * grey_mean).max(0.0).sqrt();

        Self { mean, std, texture }
    }

    pub fn feature_sum(&self) -> f64 {
        self.mean.iter().sum::<f64>() + self.std.iter().sum::<f64>() + self.texture
    }

    /// Rule ladder over the statistics, yielding a slot in 0..10
    pub fn slot(&self) -> usize {
        let [r, g, b] = self.mean;

        if g > 150.0 && self.std[1] > 30.0 {
            if self.texture > 40.0 { 6 } else { 7 }
        } else if r > g && r > b {
            0
        } else if b > 100.0 {
            1
        } else if self.texture > 50.0 {
            2
        } else if g > 120.0 {
            if self.feature_sum() > 400.0 { 3 } else { 4 }
        } else if r + g > 200.0 {
            5
        } else if self.texture < 20.0 {
            8
        } else {
            9
        }
    }
}

pub struct FeatureHashModel {
    class_count: usize,
}

impl FeatureHashModel {
    pub fn new(class_count: usize) -> Self {
        Self { class_count }
    }
}

impl ScoringModel for FeatureHashModel {
    fn name(&self) -> &str {
        "feature_hash"
    }

    fn kind(&self) -> ModelKind {
        ModelKind::FeatureHash
    }

    fn score(&self, image: &PreparedImage) -> Result<Vec<f32>, ClassifierError> {
        if self.class_count == 0 {
            return Err(ClassifierError::Inference("no classes configured".to_string()));
        }

        let stats = ColorStats::from_image(image);
        let predicted = stats.slot() % self.class_count;
        let base = 0.65 + (stats.feature_sum() % 30.0) / 100.0;

        let h = u32::from_be_bytes([image.digest[0], image.digest[1], image.digest[2], image.digest[3]]);

        let mut scores: Vec<f64> = (0..self.class_count)
            .map(|i| {
                if i == predicted {
                    base
                } else {
                    let shift = ((2 * i) % 32) as u32;
                    0.01 + (h.rotate_right(shift) % 15) as f64 / 100.0
                }
            })
            .collect();

        let total: f64 = scores.iter().sum();
        for s in scores.iter_mut() {
            *s /= total;
        }

        Ok(scores.into_iter().map(|s| s as f32).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::preprocess::{preprocess, tests::solid_png};

    fn stats(mean: [f64; 3], std: [f64; 3], texture: f64) -> ColorStats {
        ColorStats { mean, std, texture }
    }

    #[test]
    fn rule_ladder() {
        assert_eq!(stats([90.0, 180.0, 60.0], [20.0, 45.0, 20.0], 45.0).slot(), 6);
        assert_eq!(stats([90.0, 180.0, 60.0], [20.0, 45.0, 20.0], 30.0).slot(), 7);
        assert_eq!(stats([200.0, 50.0, 50.0], [0.0; 3], 0.0).slot(), 0);
        assert_eq!(stats([50.0, 110.0, 105.0], [0.0; 3], 0.0).slot(), 1);
        assert_eq!(stats([50.0, 90.0, 60.0], [0.0; 3], 55.0).slot(), 2);
        assert_eq!(stats([100.0, 130.0, 90.0], [10.0, 10.0, 10.0], 30.0).slot(), 4);
        assert_eq!(stats([110.0, 140.0, 90.0], [40.0, 40.0, 40.0], 45.0).slot(), 3);
        assert_eq!(stats([95.0, 110.0, 40.0], [0.0; 3], 30.0).slot(), 5);
        assert_eq!(stats([30.0, 60.0, 40.0], [0.0; 3], 10.0).slot(), 8);
        assert_eq!(stats([30.0, 60.0, 40.0], [0.0; 3], 30.0).slot(), 9);
    }

    #[test]
    fn solid_colour_statistics() {
        let image = preprocess(&solid_png(8, 8, [0, 200, 0]), 8).unwrap();
        let stats = ColorStats::from_image(&image);
        assert!((stats.mean[1] - 200.0).abs() < 1.0);
        assert!(stats.texture < 1.0);
        assert_eq!(stats.slot(), 4);
    }

    #[test]
    fn scores_form_a_distribution_led_by_the_slot() {
        let image = preprocess(&solid_png(8, 8, [220, 10, 10]), 8).unwrap();
        let scores = FeatureHashModel::new(10).score(&image).unwrap();

        assert_eq!(scores.len(), 10);
        let total: f32 = scores.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);

        let top = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(top, Some(0));
    }

    #[test]
    fn slot_wraps_for_short_class_lists() {
        let image = preprocess(&solid_png(8, 8, [30, 60, 40]), 8).unwrap();
        let scores = FeatureHashModel::new(3).score(&image).unwrap();
        assert_eq!(scores.len(), 3);
        // slot 8 on three classes
        assert!(scores[2] > scores[0] && scores[2] > scores[1]);
    }

    #[test]
    fn same_bytes_same_scores() {
        let png = solid_png(8, 8, [12, 140, 70]);
        let model = FeatureHashModel::new(10);
        let a = model.score(&preprocess(&png, 8).unwrap()).unwrap();
        let b = model.score(&preprocess(&png, 8).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_class_gets_all_mass() {
        let image = preprocess(&solid_png(4, 4, [1, 2, 3]), 4).unwrap();
        assert_eq!(FeatureHashModel::new(1).score(&image).unwrap(), vec![1.0]);
    }
}
