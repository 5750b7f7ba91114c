// rust_core/src/dispatcher.rs
// One completed selection -> one server call -> one authoritative re-fetch.
// Nothing here mutates game state locally; the result is always a snapshot
// from the server (or none, if both calls failed).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::MatchApi;
use crate::models::{AttackRequest, MatchId, MatchSnapshot, PlayCardRequest, TargetRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    PlayCard {
        instance_id: String,
        position: Option<usize>,
        target: Option<TargetRef>,
    },
    Attack {
        attacker: String,
        target: TargetRef,
    },
    EndTurn,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::PlayCard { .. } => "play",
            Action::Attack { .. } => "attack",
            Action::EndTurn => "end-turn",
        }
    }
}

/// What came back from a dispatch.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub action: Action,
    /// Freshest snapshot obtained: the follow-up GET if it succeeded,
    /// otherwise the action's own response.
    pub snapshot: Option<MatchSnapshot>,
    /// User-facing message when the server rejected the action.
    pub error: Option<String>,
}

/// Decrements the in-flight counter however the dispatch ends.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct ActionDispatcher {
    api: Arc<dyn MatchApi>,
    match_id: MatchId,
    in_flight: Arc<AtomicUsize>,
}

impl ActionDispatcher {
    pub fn new(api: Arc<dyn MatchApi>, match_id: MatchId) -> Self {
        Self {
            api,
            match_id,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// True while at least one request is outstanding. Advisory: callers
    /// may grey out controls, but a second dispatch is still allowed.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub async fn play_card(
        &self,
        instance_id: impl Into<String>,
        position: Option<usize>,
        target: Option<TargetRef>,
    ) -> DispatchOutcome {
        self.dispatch(Action::PlayCard {
            instance_id: instance_id.into(),
            position,
            target,
        })
        .await
    }

    pub async fn attack(&self, attacker: impl Into<String>, target: TargetRef) -> DispatchOutcome {
        self.dispatch(Action::Attack {
            attacker: attacker.into(),
            target,
        })
        .await
    }

    pub async fn end_turn(&self) -> DispatchOutcome {
        self.dispatch(Action::EndTurn).await
    }

    pub async fn dispatch(&self, action: Action) -> DispatchOutcome {
        let _guard = InFlight::enter(&self.in_flight);
        let match_id = self.match_id;

        // 1. The action itself
        let posted = match &action {
            Action::PlayCard {
                instance_id,
                position,
                target,
            } => {
                let request = PlayCardRequest {
                    instance_id: instance_id.clone(),
                    target_position: *position,
                    target_instance_id: target.clone(),
                };
                self.api.play_card(match_id, &request).await
            }
            Action::Attack { attacker, target } => {
                let request = AttackRequest {
                    attacker_instance_id: attacker.clone(),
                    target_instance_id: target.clone(),
                };
                self.api.attack(match_id, &request).await
            }
            Action::EndTurn => self.api.end_turn(match_id).await,
        };

        let (posted, error) = match posted {
            Ok(snapshot) => {
                debug!(match_id, action = action.label(), "action accepted");
                (Some(snapshot), None)
            }
            Err(err) => {
                warn!(match_id, action = action.label(), error = %err, "action rejected");
                (None, Some(err.user_message()))
            }
        };

        // 2. Re-read the authoritative state, success or not
        let snapshot = match self.api.fetch_match(match_id).await {
            Ok(fresh) => Some(fresh),
            Err(err) => {
                warn!(match_id, error = %err, "re-fetch after action failed");
                posted
            }
        };

        DispatchOutcome {
            action,
            snapshot,
            error,
        }
    }
}

// --- TESTS ---
