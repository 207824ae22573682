//! Average, achievement tier (logro) and support track (trayecto) calculation
//!
//! Scores are on a 0 to 10 scale. Absent scores are skipped, never counted
//! as zero. The tier and the support track are both derived from the
//! average rounded to 2 decimals, so a sheet that displays `6.00` always
//! shows the tier of 6.00.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest valid score
pub const MIN_SCORE: f64 = 0.0;

/// Highest valid score
pub const MAX_SCORE: f64 = 10.0;

/// Number of partial scores per period
pub const PARTIAL_COUNT: usize = 4;

/// Round half away from zero to 2 decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// True for a finite score inside `[MIN_SCORE, MAX_SCORE]`
pub fn is_valid_score(value: f64) -> bool {
    value.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&value)
}

/// Mean of the present, valid scores rounded to 2 decimals.
///
/// Returns `None` when no valid score remains.
pub fn average(scores: &[Option<f64>]) -> Option<f64> {
    let valid: Vec<f64> = scores
        .iter()
        .flatten()
        .copied()
        .filter(|v| is_valid_score(*v))
        .collect();

    if valid.is_empty() {
        return None;
    }

    Some(round2(valid.iter().sum::<f64>() / valid.len() as f64))
}

/// Achievement tier (logro)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "LD")]
    Distinguished,
    #[serde(rename = "LS")]
    Satisfactory,
    #[serde(rename = "LB")]
    Basic,
    #[serde(rename = "LI c. A. E.")]
    IncompleteExtendedSupport,
    #[serde(rename = "LI c. A. M.")]
    IncompleteMinimalSupport,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Distinguished,
        Tier::Satisfactory,
        Tier::Basic,
        Tier::IncompleteExtendedSupport,
        Tier::IncompleteMinimalSupport,
    ];

    /// Classify an average. Thresholds are checked highest first.
    pub fn from_average(average: Option<f64>) -> Option<Tier> {
        let avg = average.filter(|v| v.is_finite())?;

        if avg >= 9.0 {
            Some(Tier::Distinguished)
        } else if avg >= 7.0 {
            Some(Tier::Satisfactory)
        } else if avg >= 6.0 {
            Some(Tier::Basic)
        } else if avg >= 4.0 {
            Some(Tier::IncompleteExtendedSupport)
        } else if avg >= 1.0 {
            Some(Tier::IncompleteMinimalSupport)
        } else {
            None
        }
    }

    /// Short code printed on sheets and reports
    pub fn code(&self) -> &'static str {
        match self {
            Tier::Distinguished => "LD",
            Tier::Satisfactory => "LS",
            Tier::Basic => "LB",
            Tier::IncompleteExtendedSupport => "LI c. A. E.",
            Tier::IncompleteMinimalSupport => "LI c. A. M.",
        }
    }

    /// Parse a tier code, ignoring surrounding whitespace
    pub fn from_code(code: &str) -> Option<Tier> {
        let code = code.trim();
        Tier::ALL.into_iter().find(|t| t.code() == code)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Support track (trayecto de acompañamiento)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SupportTrack {
    #[serde(rename = "Profundización")]
    Deepening,
    #[serde(rename = "Fortalecimiento")]
    Strengthening,
    #[serde(rename = "Recuperación")]
    Recovery,
    #[serde(rename = "Apropiación")]
    Appropriation,
}

impl SupportTrack {
    pub const ALL: [SupportTrack; 4] = [
        SupportTrack::Deepening,
        SupportTrack::Strengthening,
        SupportTrack::Recovery,
        SupportTrack::Appropriation,
    ];

    pub fn from_average(average: Option<f64>) -> Option<SupportTrack> {
        let avg = average.filter(|v| v.is_finite())?;

        if avg >= 7.0 {
            Some(SupportTrack::Deepening)
        } else if avg >= 6.0 {
            Some(SupportTrack::Strengthening)
        } else if avg >= 4.0 {
            Some(SupportTrack::Recovery)
        } else if avg >= 1.0 {
            Some(SupportTrack::Appropriation)
        } else {
            None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SupportTrack::Deepening => "Profundización",
            SupportTrack::Strengthening => "Fortalecimiento",
            SupportTrack::Recovery => "Recuperación",
            SupportTrack::Appropriation => "Apropiación",
        }
    }

    pub fn from_label(label: &str) -> Option<SupportTrack> {
        let label = label.trim();
        SupportTrack::ALL.into_iter().find(|t| t.label() == label)
    }
}

impl fmt::Display for SupportTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fields derived from the partial scores.
///
/// Stored next to the scores; every write of a partial must go through
/// [`DerivedGrade::compute`] so the three values never drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedGrade {
    pub average: Option<f64>,
    pub tier: Option<Tier>,
    pub support_track: Option<SupportTrack>,
}

impl DerivedGrade {
    pub fn compute(partials: &[Option<f64>]) -> Self {
        let average = average(partials);
        Self {
            average,
            tier: Tier::from_average(average),
            support_track: SupportTrack::from_average(average),
        }
    }
}
