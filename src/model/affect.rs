//! Affect vectors: the fixed-order 10-component emotional encoding.
//!
//! Component order is part of the contract with the sentiment vectorizer
//! and with the state table columns (`in_<label>` / `out_<label>`):
//! subjectivity, polarity, then eight emotion intensities.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Number of components in an [`AffectVector`].
pub const DIMENSIONS: usize = 10;

/// Component names in storage order.
pub const AFFECT_LABELS: [&str; DIMENSIONS] = [
    "subjectivity",
    "polarity",
    "fear",
    "anger",
    "anticipation",
    "trust",
    "surprise",
    "sadness",
    "disgust",
    "joy",
];

/// Vectorizer output sometimes abbreviates `anticipation`.
const LABEL_ALIASES: [(&str, usize); 1] = [("anticip", 4)];

/// Index of a component label, accepting known aliases.
pub fn label_index(label: &str) -> Option<usize> {
    AFFECT_LABELS
        .iter()
        .position(|l| *l == label)
        .or_else(|| LABEL_ALIASES.iter().find(|(a, _)| *a == label).map(|(_, i)| *i))
}

/// A 10-dimensional affect encoding.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AffectVector(pub [f64; DIMENSIONS]);

impl AffectVector {
    pub const fn new(components: [f64; DIMENSIONS]) -> Self {
        Self(components)
    }

    pub const fn zero() -> Self {
        Self([0.0; DIMENSIONS])
    }

    /// Build from a label → value map. Missing labels default to 0.0,
    /// unrecognised labels are ignored.
    pub fn from_map<S: AsRef<str>>(map: &HashMap<S, f64>) -> Self {
        let mut v = Self::zero();
        for (label, value) in map {
            if let Some(i) = label_index(label.as_ref()) {
                v.0[i] = *value;
            }
        }
        v
    }

    pub fn to_map(&self) -> HashMap<String, f64> {
        AFFECT_LABELS
            .iter()
            .zip(self.0.iter())
            .map(|(l, v)| (l.to_string(), *v))
            .collect()
    }

    /// Set one component by label (builder style).
    pub fn with(mut self, label: &str, value: f64) -> Self {
        if let Some(i) = label_index(label) {
            self.0[i] = value;
        }
        self
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        label_index(label).map(|i| self.0[i])
    }

    pub fn as_array(&self) -> &[f64; DIMENSIONS] {
        &self.0
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|c| *c == 0.0)
    }

    /// Component-wise rounding to `decimals` places, for log snapshots.
    pub fn rounded(&self, decimals: u32) -> Self {
        let mut out = *self;
        for c in out.0.iter_mut() {
            *c = round_to(*c, decimals);
        }
        out
    }
}

impl From<[f64; DIMENSIONS]> for AffectVector {
    fn from(components: [f64; DIMENSIONS]) -> Self {
        Self(components)
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// Cosine similarity. Returns 0.0 when either vector has zero norm.
pub fn cosine(a: &AffectVector, b: &AffectVector) -> f64 {
    let denom = a.norm() * b.norm();
    if denom == 0.0 {
        return 0.0;
    }
    a.dot(b) / denom
}

// ============================================================================
// Vector update rule
// ============================================================================

/// How a stored vector absorbs a new observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMethod {
    /// Exponential moving average over the two observations.
    #[default]
    Ema,
    /// Simple two-point average.
    Sma,
}

impl UpdateMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMethod::Ema => "ema",
            UpdateMethod::Sma => "sma",
        }
    }
}

impl fmt::Display for UpdateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ema" => Ok(UpdateMethod::Ema),
            "sma" => Ok(UpdateMethod::Sma),
            other => Err(Error::config("method", other)),
        }
    }
}

/// Blend `prev` with `new`.
///
/// `Ema` weights `new` by α and `prev` by 1−α; α must be present and in
/// (0, 1]. `Sma` ignores α and returns the arithmetic mean.
pub fn blend(
    prev: &AffectVector,
    new: &AffectVector,
    alpha: Option<f64>,
    method: UpdateMethod,
) -> Result<AffectVector> {
    let mut out = AffectVector::zero();
    match method {
        UpdateMethod::Ema => {
            let alpha = alpha.ok_or_else(|| Error::config("alpha", "missing (required by ema)"))?;
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(Error::config("alpha", alpha));
            }
            for i in 0..DIMENSIONS {
                out.0[i] = (1.0 - alpha) * prev.0[i] + alpha * new.0[i];
            }
        }
        UpdateMethod::Sma => {
            for i in 0..DIMENSIONS {
                out.0[i] = (prev.0[i] + new.0[i]) / 2.0;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polarity(v: f64) -> AffectVector {
        AffectVector::zero().with("polarity", v)
    }

    #[test]
    fn test_cosine_of_parallel_vectors_is_one() {
        let a = polarity(0.9);
        let b = polarity(0.2);
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_with_zero_vector_is_zero() {
        assert_eq!(cosine(&polarity(0.9), &AffectVector::zero()), 0.0);
        assert_eq!(cosine(&AffectVector::zero(), &AffectVector::zero()), 0.0);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = AffectVector::zero().with("fear", 1.0);
        let b = AffectVector::zero().with("joy", 1.0);
        assert_eq!(cosine(&a, &b), 0.0);
    }

    #[test]
    fn test_ema_weights_new_by_alpha() {
        let out = blend(&polarity(0.0), &polarity(1.0), Some(0.3), UpdateMethod::Ema).unwrap();
        assert!((out.get("polarity").unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_ema_alpha_one_takes_new() {
        let out = blend(&polarity(0.2), &polarity(0.8), Some(1.0), UpdateMethod::Ema).unwrap();
        assert_eq!(out, polarity(0.8));
    }

    #[test]
    fn test_sma_is_mean() {
        let out = blend(&polarity(0.2), &polarity(0.6), None, UpdateMethod::Sma).unwrap();
        assert!((out.get("polarity").unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_ema_without_alpha_is_config_error() {
        let err = blend(&polarity(0.2), &polarity(0.6), None, UpdateMethod::Ema).unwrap_err();
        assert!(matches!(err, Error::Config { field: "alpha", .. }));
    }

    #[test]
    fn test_ema_rejects_out_of_range_alpha() {
        assert!(blend(&polarity(0.2), &polarity(0.6), Some(0.0), UpdateMethod::Ema).is_err());
        assert!(blend(&polarity(0.2), &polarity(0.6), Some(1.5), UpdateMethod::Ema).is_err());
    }

    #[test]
    fn test_update_method_parse() {
        assert_eq!("ema".parse::<UpdateMethod>().unwrap(), UpdateMethod::Ema);
        assert_eq!("sma".parse::<UpdateMethod>().unwrap(), UpdateMethod::Sma);
        let err = "wma".parse::<UpdateMethod>().unwrap_err();
        assert!(matches!(err, Error::Config { field: "method", ref value } if value == "wma"));
    }

    #[test]
    fn test_from_map_defaults_missing_and_accepts_alias() {
        let mut map = HashMap::new();
        map.insert("polarity", 0.9);
        map.insert("anticip", 0.4);
        map.insert("unknown", 7.0);
        let v = AffectVector::from_map(&map);
        assert_eq!(v.get("polarity"), Some(0.9));
        assert_eq!(v.get("anticipation"), Some(0.4));
        assert_eq!(v.get("joy"), Some(0.0));
    }

    #[test]
    fn test_rounded() {
        let v = polarity(0.123456).rounded(3);
        assert_eq!(v.get("polarity"), Some(0.123));
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let json = serde_json::to_string(&polarity(0.5)).unwrap();
        assert_eq!(json, "[0.0,0.5,0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0]");
    }
}
