use core::fmt;
use serde::{Deserialize, Serialize};

/// Closed set of graded confidence answers a player may give.
///
/// The numeric encoding is fixed by the wire contract: 1.0 = Yes, 0.0 = No,
/// 0.5 = Don't know, 0.75 = Probably, 0.25 = Probably not. Any other number
/// arriving at the boundary is rejected before it reaches the belief update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradedAnswer {
    Yes,
    Probably,
    DontKnow,
    ProbablyNot,
    No,
}

impl GradedAnswer {
    pub const ALL: [GradedAnswer; 5] = [
        GradedAnswer::Yes,
        GradedAnswer::Probably,
        GradedAnswer::DontKnow,
        GradedAnswer::ProbablyNot,
        GradedAnswer::No,
    ];

    pub const fn value(self) -> f64 {
        match self {
            GradedAnswer::Yes => 1.0,
            GradedAnswer::Probably => 0.75,
            GradedAnswer::DontKnow => 0.5,
            GradedAnswer::ProbablyNot => 0.25,
            GradedAnswer::No => 0.0,
        }
    }

    /// Exact-match validation of a raw numeric answer. The five recognized
    /// values are binary fractions, so exact comparison is well-defined.
    pub fn from_value(value: f64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|answer| answer.value() == value)
    }

    /// Console shorthand used by the interactive front end.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(GradedAnswer::Yes),
            "p" | "probably" => Some(GradedAnswer::Probably),
            "dk" | "?" | "dont-know" | "don't know" | "unknown" => Some(GradedAnswer::DontKnow),
            "pn" | "probably-not" | "probably not" => Some(GradedAnswer::ProbablyNot),
            "n" | "no" => Some(GradedAnswer::No),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            GradedAnswer::Yes => "yes",
            GradedAnswer::Probably => "probably",
            GradedAnswer::DontKnow => "don't know",
            GradedAnswer::ProbablyNot => "probably not",
            GradedAnswer::No => "no",
        }
    }
}

impl fmt::Display for GradedAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
