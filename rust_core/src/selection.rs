// rust_core/src/selection.rs
// Turns a sequence of board clicks into exactly one action.
// The selection is a single tagged value, so two targeting modes can never
// be active at the same time.

use serde::Serialize;
use tracing::debug;

use crate::catalog::CardCatalog;
use crate::dispatcher::Action;
use crate::models::{
    BattlecryType, CardDefinition, CardType, MatchSnapshot, PlayerState, TargetRef, UserId,
};
use crate::rules::{Judge, Ruling};

/// Everything on the board a player can click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Click {
    OwnMinion(String),
    EnemyMinion(String),
    HandCard(String),
    OwnHero,
    EnemyHero,
}

impl Click {
    fn target(&self) -> Option<TargetRef> {
        match self {
            Click::OwnMinion(id) | Click::EnemyMinion(id) => Some(TargetRef::Minion(id.clone())),
            Click::OwnHero | Click::EnemyHero => Some(TargetRef::Hero),
            Click::HandCard(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    Idle,
    Attacker,
    Spell,
    Battlecry,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Selection {
    #[default]
    Idle,
    AttackerSelected {
        attacker: String,
    },
    SpellTargeting {
        spell: String,
        card: Box<CardDefinition>,
    },
    BattlecryTargeting {
        source: String,
        card: Box<CardDefinition>,
    },
}

/// The viewer's slice of a snapshot, as the selection sees it.
#[derive(Debug, Clone, Copy)]
pub struct BoardContext<'a> {
    pub me: &'a PlayerState,
    pub enemy: &'a PlayerState,
    pub my_turn: bool,
    pub catalog: &'a CardCatalog,
}

impl<'a> BoardContext<'a> {
    pub fn from_snapshot(
        snapshot: &'a MatchSnapshot,
        user_id: UserId,
        catalog: &'a CardCatalog,
    ) -> Option<Self> {
        let (me, enemy) = snapshot.sides(user_id)?;
        Some(Self {
            me,
            enemy,
            my_turn: snapshot.is_turn_of(user_id),
            catalog,
        })
    }
}

impl Selection {
    pub fn mode(&self) -> SelectionMode {
        match self {
            Selection::Idle => SelectionMode::Idle,
            Selection::AttackerSelected { .. } => SelectionMode::Attacker,
            Selection::SpellTargeting { .. } => SelectionMode::Spell,
            Selection::BattlecryTargeting { .. } => SelectionMode::Battlecry,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Selection::Idle)
    }

    /// Instance id of the minion or hand card that opened the current mode.
    pub fn source(&self) -> Option<&str> {
        match self {
            Selection::Idle => None,
            Selection::AttackerSelected { attacker } => Some(attacker),
            Selection::SpellTargeting { spell, .. } => Some(spell),
            Selection::BattlecryTargeting { source, .. } => Some(source),
        }
    }

    pub fn clear(&mut self) {
        *self = Selection::Idle;
    }

    /// Re-checks the selection against a fresh snapshot. Clears it when the
    /// turn has passed or its source left the board or hand. Returns `true`
    /// if something was cleared.
    pub fn reconcile(&mut self, ctx: Option<&BoardContext<'_>>) -> bool {
        if self.is_idle() {
            return false;
        }
        let keep = match ctx {
            Some(ctx) if ctx.my_turn => match self {
                Selection::Idle => true,
                Selection::AttackerSelected { attacker } => ctx
                    .me
                    .minion(attacker)
                    .map(|m| m.can_attack)
                    .unwrap_or(false),
                Selection::SpellTargeting { spell: source, .. }
                | Selection::BattlecryTargeting { source, .. } => {
                    ctx.me.hand_card(source).is_some()
                }
            },
            _ => false,
        };
        if !keep {
            debug!(mode = ?self.mode(), "clearing stale selection");
            self.clear();
        }
        !keep
    }

    /// Would clicking `click` complete the current selection?
    pub fn is_legal_target(&self, ctx: &BoardContext<'_>, click: &Click) -> bool {
        if !ctx.my_turn {
            return false;
        }
        match self {
            Selection::Idle => false,
            Selection::AttackerSelected { .. } | Selection::SpellTargeting { .. } => {
                enemy_target(ctx, click)
            }
            Selection::BattlecryTargeting { card, .. } => match card.targeted_battlecry() {
                Some(BattlecryType::DealDamage) => enemy_target(ctx, click),
                Some(BattlecryType::Heal) | Some(BattlecryType::BuffAlly) => {
                    own_target(ctx, click)
                }
                _ => false,
            },
        }
    }

    /// Feeds one click into the state machine. Returns the action to
    /// dispatch when the click completes a selection.
    pub fn click(&mut self, ctx: &BoardContext<'_>, click: Click) -> Option<Action> {
        if !ctx.my_turn {
            self.clear();
            return None;
        }

        // Clicking the source again cancels.
        let cancels = match (&*self, &click) {
            (Selection::AttackerSelected { attacker }, Click::OwnMinion(id)) => attacker == id,
            (Selection::SpellTargeting { spell: source, .. }, Click::HandCard(id))
            | (Selection::BattlecryTargeting { source, .. }, Click::HandCard(id)) => source == id,
            _ => false,
        };
        if cancels {
            self.clear();
            return None;
        }

        if self.is_legal_target(ctx, &click) {
            let target = click.target()?;
            let action = match std::mem::take(self) {
                Selection::AttackerSelected { attacker } => Action::Attack { attacker, target },
                Selection::SpellTargeting { spell, .. } => Action::PlayCard {
                    instance_id: spell,
                    position: None,
                    target: Some(target),
                },
                Selection::BattlecryTargeting { source, .. } => Action::PlayCard {
                    instance_id: source,
                    position: Some(ctx.me.board.len()),
                    target: Some(target),
                },
                Selection::Idle => return None,
            };
            return Some(action);
        }

        // Own minions and hand cards start a new selection; anything else is ignored.
        match click {
            Click::OwnMinion(_) | Click::HandCard(_) => {
                let (next, action) = from_idle(ctx, click);
                *self = next;
                action
            }
            _ => None,
        }
    }
}

fn enemy_target(ctx: &BoardContext<'_>, click: &Click) -> bool {
    match click {
        Click::EnemyMinion(id) => ctx.enemy.minion(id).is_some(),
        Click::EnemyHero => Judge::hero_exposed(ctx.enemy),
        _ => false,
    }
}

fn own_target(ctx: &BoardContext<'_>, click: &Click) -> bool {
    match click {
        Click::OwnMinion(id) => ctx.me.minion(id).is_some(),
        Click::OwnHero => true,
        _ => false,
    }
}

fn from_idle(ctx: &BoardContext<'_>, click: Click) -> (Selection, Option<Action>) {
    match click {
        Click::OwnMinion(id) => match ctx.me.minion(&id) {
            Some(m) if Judge::check_attacker(m, ctx.my_turn).is_legal() => {
                (Selection::AttackerSelected { attacker: id }, None)
            }
            _ => (Selection::Idle, None),
        },
        Click::HandCard(id) => {
            let Some(card) = ctx.me.hand_card(&id) else {
                return (Selection::Idle, None);
            };
            let definition = ctx.catalog.for_hand(card);
            if let Ruling::Illegal(reason) =
                Judge::check_play(ctx.me, card, definition, ctx.my_turn)
            {
                debug!(instance_id = %id, %reason, "hand card not playable");
                return (Selection::Idle, None);
            }
            match (card.card_type, definition) {
                (CardType::Spell, Some(def)) if def.spell_needs_target() => (
                    Selection::SpellTargeting {
                        spell: id,
                        card: Box::new(def.clone()),
                    },
                    None,
                ),
                (CardType::Spell, _) => (
                    Selection::Idle,
                    Some(Action::PlayCard {
                        instance_id: id,
                        position: None,
                        target: None,
                    }),
                ),
                (CardType::Minion, Some(def)) if def.targeted_battlecry().is_some() => (
                    Selection::BattlecryTargeting {
                        source: id,
                        card: Box::new(def.clone()),
                    },
                    None,
                ),
                (CardType::Minion, _) => (
                    Selection::Idle,
                    Some(Action::PlayCard {
                        instance_id: id,
                        position: Some(ctx.me.board.len()),
                        target: None,
                    }),
                ),
            }
        }
        _ => (Selection::Idle, None),
    }
}

// --- TESTS ---
