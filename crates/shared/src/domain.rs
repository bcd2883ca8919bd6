use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(PersonId);
id_newtype!(AttemptId);

impl AttemptId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExperienceTier {
    Junior,
    Mid,
    Senior,
    Lead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    #[default]
    FullTime,
    PartTime,
    Contract,
}

/// One candidate in the pool, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonInput {
    pub id: PersonId,
    pub name: String,
    #[serde(default)]
    pub skills: Vec<String>,
    pub experience: ExperienceTier,
    pub personality: String,
    #[serde(default)]
    pub mbti_type: Option<String>,
    #[serde(default)]
    pub experience_years: Option<u32>,
    #[serde(default)]
    pub availability: Option<Availability>,
    #[serde(default)]
    pub hourly_rate: Option<f64>,
}

/// Project parameters as collected from the user. Fields stay optional here;
/// completeness is checked when an attempt starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequirements {
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub team_size: Option<u32>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub project_type: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub timeline: Option<String>,
    #[serde(default)]
    pub budget: Option<String>,
}

/// The four analysis stages, in their declared processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageKey {
    #[serde(rename = "skillsAnalyst", alias = "hrSkillsAnalyst")]
    SkillsAnalyst,
    #[serde(rename = "psychologyExpert")]
    PsychologyExpert,
    #[serde(rename = "techArchitect")]
    TechArchitect,
    #[serde(rename = "executiveStrategist")]
    ExecutiveStrategist,
}

impl StageKey {
    pub const ALL: [StageKey; 4] = [
        StageKey::SkillsAnalyst,
        StageKey::PsychologyExpert,
        StageKey::TechArchitect,
        StageKey::ExecutiveStrategist,
    ];

    pub fn index(self) -> usize {
        match self {
            StageKey::SkillsAnalyst => 0,
            StageKey::PsychologyExpert => 1,
            StageKey::TechArchitect => 2,
            StageKey::ExecutiveStrategist => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageKey::SkillsAnalyst => "skillsAnalyst",
            StageKey::PsychologyExpert => "psychologyExpert",
            StageKey::TechArchitect => "techArchitect",
            StageKey::ExecutiveStrategist => "executiveStrategist",
        }
    }

    /// Short human label used in derived stage messages.
    pub fn label(self) -> &'static str {
        match self {
            StageKey::SkillsAnalyst => "Skills analysis",
            StageKey::PsychologyExpert => "Psychology analysis",
            StageKey::TechArchitect => "Technical analysis",
            StageKey::ExecutiveStrategist => "Strategic analysis",
        }
    }

    pub fn initial_message(self) -> &'static str {
        match self {
            StageKey::SkillsAnalyst => "Initializing skills assessment...",
            StageKey::PsychologyExpert => "Preparing MBTI compatibility analysis...",
            StageKey::TechArchitect => "Loading technical requirements...",
            StageKey::ExecutiveStrategist => "Preparing business optimization...",
        }
    }
}

impl FromStr for StageKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "skillsAnalyst" | "hrSkillsAnalyst" => Ok(StageKey::SkillsAnalyst),
            "psychologyExpert" => Ok(StageKey::PsychologyExpert),
            "techArchitect" => Ok(StageKey::TechArchitect),
            "executiveStrategist" => Ok(StageKey::ExecutiveStrategist),
            other => Err(format!("unknown stage key: {other}")),
        }
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageState {
    #[default]
    #[serde(alias = "Ready")]
    Ready,
    #[serde(alias = "Running")]
    Running,
    #[serde(alias = "Completed")]
    Completed,
    #[serde(alias = "Error")]
    Error,
}

impl StageState {
    pub fn as_str(self) -> &'static str {
        match self {
            StageState::Ready => "ready",
            StageState::Running => "running",
            StageState::Completed => "completed",
            StageState::Error => "error",
        }
    }
}
