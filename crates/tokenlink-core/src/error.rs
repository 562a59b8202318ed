use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ports::PortError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Resolve,
    VerifyNetwork,
    SwitchNetwork,
    FetchBalance,
    SubmitTransfer,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::VerifyNetwork => "verify-network",
            Self::SwitchNetwork => "switch-network",
            Self::FetchBalance => "fetch-balance",
            Self::SubmitTransfer => "submit-transfer",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one pipeline step, tagged with where it happened.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{phase}: {message}")]
pub struct PipelineError {
    pub phase: Phase,
    pub message: String,
}

impl PipelineError {
    pub fn new(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
        }
    }

    pub fn from_port(phase: Phase, err: &PortError) -> Self {
        Self::new(phase, err.to_string())
    }
}
