//! Behavioral profiles and the forward / modify / ignore decision.
//!
//! Profiles are data: each maps to a row of thresholds plus a default
//! smoothing coefficient. Every profile shares one decision rule.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Behavioral profile of a user, derived from its cluster id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Profile {
    #[serde(rename = "High-Credibility Informant")]
    HighCredibilityInformant,
    #[serde(rename = "Emotionally-Driven Amplifier")]
    EmotionallyDrivenAmplifier,
    #[serde(rename = "Mobilisation-Oriented Catalyst")]
    MobilisationOrientedCatalyst,
    #[serde(rename = "Emotionally Exposed Participant")]
    EmotionallyExposedParticipant,
}

impl Profile {
    pub const ALL: [Profile; 4] = [
        Profile::HighCredibilityInformant,
        Profile::EmotionallyDrivenAmplifier,
        Profile::MobilisationOrientedCatalyst,
        Profile::EmotionallyExposedParticipant,
    ];

    /// 0, 1 and 2 map to the first three profiles; anything else is a
    /// participant.
    pub fn from_cluster(cluster: i64) -> Self {
        match cluster {
            0 => Profile::HighCredibilityInformant,
            1 => Profile::EmotionallyDrivenAmplifier,
            2 => Profile::MobilisationOrientedCatalyst,
            _ => Profile::EmotionallyExposedParticipant,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Profile::HighCredibilityInformant => "High-Credibility Informant",
            Profile::EmotionallyDrivenAmplifier => "Emotionally-Driven Amplifier",
            Profile::MobilisationOrientedCatalyst => "Mobilisation-Oriented Catalyst",
            Profile::EmotionallyExposedParticipant => "Emotionally Exposed Participant",
        }
    }

    /// Built-in thresholds and α for this profile.
    pub fn defaults(&self) -> ProfileParams {
        match self {
            Profile::HighCredibilityInformant => ProfileParams::new(0.8, 0.2, 0.05, 0.3),
            Profile::EmotionallyDrivenAmplifier => ProfileParams::new(0.95, 0.6, 0.1, 0.8),
            Profile::MobilisationOrientedCatalyst => ProfileParams::new(0.6, 0.7, 0.3, 0.7),
            Profile::EmotionallyExposedParticipant => ProfileParams::new(0.3, 0.4, 0.7, 0.6),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Profile::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| Error::UnknownProfile(s.to_string()))
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Decision thresholds and smoothing coefficient for one profile.
///
/// `ignore` is carried for reporting; the decision rule only reads
/// `forward` and `modify`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileParams {
    pub forward: f64,
    pub modify: f64,
    pub ignore: f64,
    pub alpha: f64,
}

impl ProfileParams {
    pub const fn new(forward: f64, modify: f64, ignore: f64, alpha: f64) -> Self {
        Self { forward, modify, ignore, alpha }
    }

    /// Apply an override key by key.
    pub fn merged(mut self, ov: &ThresholdOverride) -> Self {
        if let Some(v) = ov.forward {
            self.forward = v;
        }
        if let Some(v) = ov.modify {
            self.modify = v;
        }
        if let Some(v) = ov.ignore {
            self.ignore = v;
        }
        if let Some(v) = ov.alpha {
            self.alpha = v;
        }
        self
    }
}

/// Partial per-profile override. Absent keys keep the default.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modify: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
}

/// Overrides keyed by profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileOverrides(pub HashMap<Profile, ThresholdOverride>);

impl ProfileOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, profile: Profile, ov: ThresholdOverride) -> Self {
        self.0.insert(profile, ov);
        self
    }

    /// Parse `{"<profile name>": {"forward": .., "modify": .., "ignore": .., "alpha": ..}}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, ThresholdOverride> = serde_json::from_str(json)?;
        let mut out = HashMap::with_capacity(raw.len());
        for (name, ov) in raw {
            out.insert(name.parse::<Profile>()?, ov);
        }
        Ok(Self(out))
    }

    pub fn get(&self, profile: Profile) -> Option<&ThresholdOverride> {
        self.0.get(&profile)
    }
}

// ============================================================================
// Profile table
// ============================================================================

/// Effective parameters for every profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileTable {
    rows: hashbrown::HashMap<Profile, ProfileParams>,
}

impl ProfileTable {
    pub fn with_overrides(overrides: &ProfileOverrides) -> Result<Self> {
        let mut rows = hashbrown::HashMap::with_capacity(Profile::ALL.len());
        for profile in Profile::ALL {
            let params = match overrides.get(profile) {
                Some(ov) => profile.defaults().merged(ov),
                None => profile.defaults(),
            };
            if !(params.alpha > 0.0 && params.alpha <= 1.0) {
                return Err(Error::config("alpha", params.alpha));
            }
            rows.insert(profile, params);
        }
        Ok(Self { rows })
    }

    pub fn params(&self, profile: Profile) -> Result<&ProfileParams> {
        self.rows
            .get(&profile)
            .ok_or_else(|| Error::UnknownProfile(profile.name().to_string()))
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self {
            rows: Profile::ALL.into_iter().map(|p| (p, p.defaults())).collect(),
        }
    }
}

// ============================================================================
// Decision rule
// ============================================================================

/// What a receiver does with an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Forward,
    Modify,
    Ignore,
}

impl Decision {
    /// Forward and modify both relay to followers.
    pub fn relays(&self) -> bool {
        !matches!(self, Decision::Ignore)
    }
}

/// Both similarities must clear a threshold strictly.
pub fn decide(params: &ProfileParams, sim_in: f64, sim_out: f64) -> Decision {
    if sim_in > params.forward && sim_out > params.forward {
        Decision::Forward
    } else if sim_in > params.modify && sim_out > params.modify {
        Decision::Modify
    } else {
        Decision::Ignore
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_mapping() {
        assert_eq!(Profile::from_cluster(0), Profile::HighCredibilityInformant);
        assert_eq!(Profile::from_cluster(1), Profile::EmotionallyDrivenAmplifier);
        assert_eq!(Profile::from_cluster(2), Profile::MobilisationOrientedCatalyst);
        assert_eq!(Profile::from_cluster(3), Profile::EmotionallyExposedParticipant);
        assert_eq!(Profile::from_cluster(-1), Profile::EmotionallyExposedParticipant);
    }

    #[test]
    fn test_name_roundtrips_through_from_str() {
        for p in Profile::ALL {
            assert_eq!(p.name().parse::<Profile>().unwrap(), p);
        }
    }

    #[test]
    fn test_unknown_profile_name() {
        let err = "Lurker".parse::<Profile>().unwrap_err();
        assert!(matches!(err, Error::UnknownProfile(ref n) if n == "Lurker"));
    }

    #[test]
    fn test_decide_strict_thresholds() {
        let p = ProfileParams::new(0.8, 0.2, 0.05, 0.3);
        assert_eq!(decide(&p, 0.9, 0.81), Decision::Forward);
        assert_eq!(decide(&p, 0.8, 0.9), Decision::Modify);
        assert_eq!(decide(&p, 0.9, 0.2), Decision::Ignore);
        assert_eq!(decide(&p, 0.3, 0.25), Decision::Modify);
    }

    #[test]
    fn test_catalyst_modify_above_forward() {
        // modify > forward: anything not forwarded is ignored
        let p = Profile::MobilisationOrientedCatalyst.defaults();
        assert_eq!(decide(&p, 0.65, 0.65), Decision::Forward);
        assert_eq!(decide(&p, 0.65, 0.55), Decision::Ignore);
    }

    #[test]
    fn test_overrides_merge_key_by_key() {
        let overrides = ProfileOverrides::new().with(
            Profile::HighCredibilityInformant,
            ThresholdOverride { forward: Some(0.5), alpha: Some(0.9), ..Default::default() },
        );
        let table = ProfileTable::with_overrides(&overrides).unwrap();
        let p = table.params(Profile::HighCredibilityInformant).unwrap();
        assert_eq!(p.forward, 0.5);
        assert_eq!(p.modify, 0.2);
        assert_eq!(p.alpha, 0.9);
        let other = table.params(Profile::EmotionallyDrivenAmplifier).unwrap();
        assert_eq!(*other, Profile::EmotionallyDrivenAmplifier.defaults());
    }

    #[test]
    fn test_overrides_from_json() {
        let json = r#"{"Emotionally Exposed Participant": {"forward": 0.1, "alpha": 0.5}}"#;
        let ov = ProfileOverrides::from_json(json).unwrap();
        let got = ov.get(Profile::EmotionallyExposedParticipant).unwrap();
        assert_eq!(got.forward, Some(0.1));
        assert_eq!(got.modify, None);
        assert_eq!(got.alpha, Some(0.5));
    }

    #[test]
    fn test_overrides_from_json_unknown_profile() {
        let err = ProfileOverrides::from_json(r#"{"Nobody": {"forward": 0.1}}"#).unwrap_err();
        assert!(matches!(err, Error::UnknownProfile(_)));
    }

    #[test]
    fn test_invalid_alpha_override_rejected() {
        let overrides = ProfileOverrides::new().with(
            Profile::EmotionallyDrivenAmplifier,
            ThresholdOverride { alpha: Some(0.0), ..Default::default() },
        );
        assert!(ProfileTable::with_overrides(&overrides).is_err());
    }
}
