use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Idle,
    Resolving,
    Verifying,
    Switching,
    Syncing,
    Ready,
    Failed(Phase),
}

impl PipelinePhase {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Resolving | Self::Verifying | Self::Switching | Self::Syncing
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineAction {
    Start,
    Resolved,
    SwitchRequested,
    NetworkConfirmed,
    Synced,
    Resync,
    Fail(Phase),
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal pipeline transition: {from:?} --{action:?}-->")]
pub struct TransitionError {
    pub from: PipelinePhase,
    pub action: PipelineAction,
}

pub fn transition(
    from: PipelinePhase,
    action: PipelineAction,
) -> Result<PipelinePhase, TransitionError> {
    use PipelineAction as A;
    use PipelinePhase as P;

    let to = match (from, action) {
        (_, A::Start) => P::Resolving,
        (_, A::Reset) => P::Idle,
        (P::Resolving, A::Resolved) => P::Verifying,
        (P::Verifying, A::SwitchRequested) => P::Switching,
        (P::Verifying | P::Switching, A::NetworkConfirmed) => P::Syncing,
        (P::Syncing, A::Synced) => P::Ready,
        (P::Ready, A::Resync) => P::Syncing,
        (p, A::Fail(phase)) if p.is_active() => P::Failed(phase),
        _ => return Err(TransitionError { from, action }),
    };
    Ok(to)
}
