//! Per-turn state machine

use crate::types::ToolCall;

/// Where a turn currently is
///
/// ```text
/// Idle -> ModelGenerating -> (ToolsPending -> ToolExecuting -> ModelFollowUp)* -> Complete
///                 \___________________________________________________________-> Errored
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum TurnState {
    Idle,
    ModelGenerating,
    /// Calls accepted from the latest model reply, awaiting execution
    ToolsPending {
        calls: Vec<ToolCall>,
        round: usize,
    },
    ToolExecuting {
        round: usize,
    },
    ModelFollowUp {
        round: usize,
    },
    Complete,
    Errored {
        message: String,
    },
}

impl TurnState {
    pub fn name(&self) -> &'static str {
        match self {
            TurnState::Idle => "idle",
            TurnState::ModelGenerating => "model_generating",
            TurnState::ToolsPending { .. } => "tools_pending",
            TurnState::ToolExecuting { .. } => "tool_executing",
            TurnState::ModelFollowUp { .. } => "model_follow_up",
            TurnState::Complete => "complete",
            TurnState::Errored { .. } => "errored",
        }
    }

    /// Complete and Errored end the turn
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Complete | TurnState::Errored { .. })
    }

    /// Whether moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: &TurnState) -> bool {
        use TurnState::*;

        if let Errored { .. } = next {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Idle, ModelGenerating)
                | (ModelGenerating, ToolsPending { .. })
                | (ModelGenerating, Complete)
                | (ToolsPending { .. }, ToolExecuting { .. })
                | (ToolExecuting { .. }, ModelFollowUp { .. })
                | (ModelFollowUp { .. }, ToolsPending { .. })
                | (ModelFollowUp { .. }, Complete)
        )
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            TurnState::Idle,
            TurnState::ModelGenerating,
            TurnState::ToolsPending { calls: vec![], round: 1 },
            TurnState::ToolExecuting { round: 1 },
            TurnState::ModelFollowUp { round: 1 },
            TurnState::Complete,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(&pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_errored_is_absorbing() {
        let errored = TurnState::Errored {
            message: "model down".to_string(),
        };
        assert!(TurnState::ModelGenerating.can_transition_to(&errored));
        assert!(errored.is_terminal());
        assert!(!errored.can_transition_to(&TurnState::ModelGenerating));
        assert!(!errored.can_transition_to(&errored));
        assert!(!TurnState::Complete.can_transition_to(&errored));
    }

    #[test]
    fn test_no_skipping_execution() {
        assert!(!TurnState::ModelGenerating.can_transition_to(&TurnState::ModelFollowUp { round: 1 }));
        assert!(!TurnState::Idle.can_transition_to(&TurnState::Complete));
    }
}
