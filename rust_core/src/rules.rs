// rust_core/src/rules.rs
// Client-side pre-checks for the match view.
// This file contains pure functions. They take a snapshot in and return a verdict.
// They are advisory only: they keep obviously impossible clicks from reaching
// the server, but the server remains the authority and may still say no.

use serde::Serialize;

use crate::catalog::CardCatalog;
use crate::models::{
    CardDefinition, CardType, HandCard, MatchSnapshot, MinionInstance, PlayerState, UserId,
    MAX_BOARD_SIZE,
};

// Result Enum: may the player try this?
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Ruling {
    Legal,
    Illegal(String), // Reason why
}

impl Ruling {
    pub fn is_legal(&self) -> bool {
        matches!(self, Ruling::Legal)
    }
}

pub struct Judge;

impl Judge {
    /// Can the player put this hand card into play right now?
    pub fn check_play(
        me: &PlayerState,
        card: &HandCard,
        definition: Option<&CardDefinition>,
        my_turn: bool,
    ) -> Ruling {
        if !my_turn {
            return Ruling::Illegal("Not your turn.".to_string());
        }
        // Unknown card: let the server decide.
        let Some(definition) = definition else {
            return Ruling::Legal;
        };
        if let Ruling::Illegal(reason) = Self::check_mana(me, definition) {
            return Ruling::Illegal(reason);
        }
        if card.card_type == CardType::Minion {
            return Self::check_board_space(me);
        }
        Ruling::Legal
    }

    /// Mana Rule: cost must not exceed the current pool.
    fn check_mana(me: &PlayerState, definition: &CardDefinition) -> Ruling {
        if me.mana < definition.mana_cost {
            return Ruling::Illegal(format!(
                "Not enough mana. Need {}, have {}.",
                definition.mana_cost, me.mana
            ));
        }
        Ruling::Legal
    }

    /// Board Rule: at most seven minions.
    fn check_board_space(me: &PlayerState) -> Ruling {
        if me.board.len() >= MAX_BOARD_SIZE {
            return Ruling::Illegal("Board is full.".to_string());
        }
        Ruling::Legal
    }

    /// Can this minion be picked as an attacker?
    pub fn check_attacker(minion: &MinionInstance, my_turn: bool) -> Ruling {
        if !my_turn {
            return Ruling::Illegal("Not your turn.".to_string());
        }
        if !minion.can_attack {
            return Ruling::Illegal("Minion cannot attack yet.".to_string());
        }
        Ruling::Legal
    }

    /// The enemy hero is only offered as a target once their board is empty.
    pub fn hero_exposed(enemy: &PlayerState) -> bool {
        enemy.board.is_empty()
    }

    /// One ruling per hand card, in hand order.
    pub fn assess_hand(
        snapshot: &MatchSnapshot,
        user_id: UserId,
        catalog: &CardCatalog,
    ) -> Vec<(String, Ruling)> {
        let Some((me, _)) = snapshot.sides(user_id) else {
            return Vec::new();
        };
        let my_turn = snapshot.is_turn_of(user_id);
        me.hand
            .iter()
            .map(|card| {
                let ruling = Self::check_play(me, card, catalog.for_hand(card), my_turn);
                (card.instance_id.clone(), ruling)
            })
            .collect()
    }
}

// --- TESTS ---

#[cfg(test)]
mod tests {
    use super::*;

    fn minion_def(cost: i32) -> CardDefinition {
        serde_json::from_value(serde_json::json!({
            "id": 1, "cardType": "MINION", "name": "Ogre", "manaCost": cost
        }))
        .unwrap()
    }

    fn hand_minion() -> HandCard {
        HandCard {
            instance_id: "h1".into(),
            card_type: CardType::Minion,
            card_id: 1,
        }
    }

    fn minion(id: &str, can_attack: bool) -> MinionInstance {
        MinionInstance {
            instance_id: id.into(),
            card_id: 1,
            attack: 2,
            current_health: 2,
            max_health: 2,
            can_attack,
            exhausted: !can_attack,
            taunt: false,
            divine_shield: false,
        }
    }

    #[test]
    fn test_play_needs_enough_mana() {
        // Scenario: Ogre costs 4, player has 3 mana.
        let me = PlayerState {
            mana: 3,
            ..Default::default()
        };
        let ruling = Judge::check_play(&me, &hand_minion(), Some(&minion_def(4)), true);
        match ruling {
            Ruling::Illegal(msg) => assert!(msg.contains("Not enough mana")),
            _ => panic!("Should fail mana check"),
        }
    }

    #[test]
    fn test_full_board_blocks_minions() {
        // Scenario: seven minions already down, plenty of mana.
        let me = PlayerState {
            mana: 10,
            board: (0..7).map(|i| minion(&format!("m{}", i), false)).collect(),
            ..Default::default()
        };
        let ruling = Judge::check_play(&me, &hand_minion(), Some(&minion_def(1)), true);
        assert_eq!(ruling, Ruling::Illegal("Board is full.".to_string()));
    }

    #[test]
    fn test_unknown_card_is_left_to_the_server() {
        let me = PlayerState::default();
        assert!(Judge::check_play(&me, &hand_minion(), None, true).is_legal());
        assert!(!Judge::check_play(&me, &hand_minion(), None, false).is_legal());
    }

    #[test]
    fn test_exhausted_minion_never_attacks() {
        assert!(!Judge::check_attacker(&minion("a", false), true).is_legal());
        assert!(!Judge::check_attacker(&minion("a", true), false).is_legal());
        assert!(Judge::check_attacker(&minion("a", true), true).is_legal());
    }

    #[test]
    fn test_ruling_json_shape() {
        assert_eq!(
            serde_json::to_string(&Ruling::Illegal("Board is full.".into())).unwrap(),
            r#"{"status":"illegal","reason":"Board is full."}"#
        );
        assert_eq!(
            serde_json::to_string(&Ruling::Legal).unwrap(),
            r#"{"status":"legal"}"#
        );
    }
}
