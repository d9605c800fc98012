use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;

/// Output classes in the order of the model's output vector.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SirenClass {
    Ambulance,
    Firetruck,
    Police,
    Traffic,
}

impl SirenClass {
    pub const ALL: [SirenClass; 4] = [
        SirenClass::Ambulance,
        SirenClass::Firetruck,
        SirenClass::Police,
        SirenClass::Traffic,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SirenClass::Ambulance => "ambulance",
            SirenClass::Firetruck => "firetruck",
            SirenClass::Police => "police",
            SirenClass::Traffic => "traffic",
        }
    }

    /// Picks the class with the highest score. Non-finite scores never win.
    pub fn from_scores(scores: &[f32]) -> Result<Self, ClassifyError> {
        if scores.len() != Self::ALL.len() {
            return Err(ClassifyError::shape(&[Self::ALL.len()], &[scores.len()]));
        }
        let best = scores
            .iter()
            .enumerate()
            .filter(|(_, score)| score.is_finite())
            .fold(None::<(usize, f32)>, |best, (index, &score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((index, score)),
            })
            .map(|(index, _)| index)
            .ok_or_else(|| ClassifyError::inference("model produced no comparable scores"))?;
        Self::from_index(best)
            .ok_or_else(|| ClassifyError::inference(format!("class index {best} out of range")))
    }
}

impl fmt::Display for SirenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
