//! Agent routing: a closed set of assistant personas, each mapping to a
//! model configuration and a system instruction.
//!
//! Agent identifiers are parsed at the wire/CLI boundary; everything past
//! that point works with the [`AgentId`] enum, so an unknown identifier
//! can never reach retrieval or generation.

use std::fmt;
use std::str::FromStr;

use crate::config::ModelsConfig;
use crate::error::QueryError;

const WRITER_SYSTEM: &str = "Use ONLY the provided context. If context is insufficient, output \
[MISSING INFO] and list exactly what is missing. Do not invent citations or data.";

const CODE_SYSTEM: &str = "Return runnable Python code only. Use the provided context when \
relevant. If you must assume something, write it as a Python comment starting with: # ASSUMPTION:";

const REVIEWER_SYSTEM: &str = "Use ONLY the provided context/text. Be strict and specific. \
Do not invent facts or citations.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentId {
    Writer,
    Code,
    Reviewer,
}

/// Model configuration and system instruction for one agent.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub model: String,
    pub temperature: f32,
    pub system: &'static str,
}

impl AgentId {
    pub const ALL: [AgentId; 3] = [AgentId::Writer, AgentId::Code, AgentId::Reviewer];

    /// Pure lookup, no state.
    pub fn profile(&self, models: &ModelsConfig) -> AgentProfile {
        match self {
            AgentId::Writer => AgentProfile {
                model: models.writer_model.clone(),
                temperature: 0.25,
                system: WRITER_SYSTEM,
            },
            AgentId::Code => AgentProfile {
                model: models.code_model.clone(),
                temperature: 0.2,
                system: CODE_SYSTEM,
            },
            AgentId::Reviewer => AgentProfile {
                model: models.reviewer_model.clone(),
                temperature: 0.2,
                system: REVIEWER_SYSTEM,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Writer => "writer",
            AgentId::Code => "code",
            AgentId::Reviewer => "reviewer",
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentId {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "writer" => Ok(AgentId::Writer),
            "code" => Ok(AgentId::Code),
            "reviewer" => Ok(AgentId::Reviewer),
            other => Err(QueryError::UnknownAgent(other.to_string())),
        }
    }
}
