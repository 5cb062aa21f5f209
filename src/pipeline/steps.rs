//! Stage names and the requested-steps selector.

use std::{collections::BTreeSet, fmt, str::FromStr};

use crate::errors::RegressError;

/// The four pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Build and run the instruction generator.
    Gen,
    /// Compile generated assembly and convert it to raw binaries.
    GccCompile,
    /// Run each object file on the reference ISSs.
    IssSim,
    /// Compare the logs of two ISSs.
    IssCmp,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Gen, Stage::GccCompile, Stage::IssSim, Stage::IssCmp];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Gen => "gen",
            Stage::GccCompile => "gcc_compile",
            Stage::IssSim => "iss_sim",
            Stage::IssCmp => "iss_cmp",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = RegressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| RegressError::UnknownStep { step: s.to_string() })
    }
}

/// A subset of stages. Iteration always follows pipeline order, whatever
/// order the steps were requested in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSet {
    stages: BTreeSet<Stage>,
}

impl StageSet {
    pub fn all() -> Self {
        Stage::ALL.into_iter().collect()
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    pub fn iter(&self) -> impl Iterator<Item = Stage> + '_ {
        self.stages.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Default for StageSet {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<Stage> for StageSet {
    fn from_iter<I: IntoIterator<Item = Stage>>(iter: I) -> Self {
        Self {
            stages: iter.into_iter().collect(),
        }
    }
}

impl FromStr for StageSet {
    type Err = RegressError;

    /// Parses `all` or a comma-separated list such as `gcc_compile,iss_sim`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut stages = BTreeSet::new();
        for word in s.split(',').map(str::trim).filter(|w| !w.is_empty()) {
            if word == "all" {
                return Ok(Self::all());
            }
            stages.insert(word.parse()?);
        }
        if stages.is_empty() {
            return Err(RegressError::UnknownStep { step: s.to_string() });
        }
        Ok(Self { stages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all() {
        let set: StageSet = "all".parse().unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), Stage::ALL.to_vec());
    }

    #[test]
    fn test_subset_runs_in_pipeline_order() {
        let set: StageSet = "iss_cmp,gen".parse().unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Stage::Gen, Stage::IssCmp]);
        assert!(!set.contains(Stage::GccCompile));
    }

    #[test]
    fn test_single_step() {
        let set: StageSet = "iss_cmp".parse().unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Stage::IssCmp]);
    }

    #[test]
    fn test_unknown_step_rejected() {
        let err = "gen,simulate".parse::<StageSet>().unwrap_err();
        assert!(matches!(err, RegressError::UnknownStep { ref step } if step == "simulate"));
        assert!("".parse::<StageSet>().is_err());
    }
}
