// rust_core/src/fixtures.rs
// Shared test data: a two-player match seen from user 1.

use serde_json::json;

use crate::catalog::CardCatalog;
use crate::models::{
    CardDefinition, CardId, CardType, GameState, HandCard, MatchId, MatchSnapshot, MatchStatus,
    MinionInstance, PlayerState, UserId,
};

pub const ME: UserId = 1;
pub const FOE: UserId = 2;
pub const MATCH: MatchId = 42;

pub const FOOTMAN: CardId = 1;
pub const HEALER: CardId = 2;
pub const BOMBER: CardId = 3;
pub const CAPTAIN: CardId = 4;
pub const FIREBALL: CardId = 10;
pub const INSIGHT: CardId = 11;

pub fn minion(instance_id: &str, card_id: CardId, can_attack: bool) -> MinionInstance {
    MinionInstance {
        instance_id: instance_id.to_string(),
        card_id,
        attack: 2,
        current_health: 3,
        max_health: 3,
        can_attack,
        exhausted: !can_attack,
        taunt: false,
        divine_shield: false,
    }
}

pub fn hand(instance_id: &str, card_type: CardType, card_id: CardId) -> HandCard {
    HandCard {
        instance_id: instance_id.to_string(),
        card_type,
        card_id,
    }
}

/// In-progress match, my turn, ten mana each.
pub fn snapshot(
    my_board: Vec<MinionInstance>,
    my_hand: Vec<HandCard>,
    enemy_board: Vec<MinionInstance>,
) -> MatchSnapshot {
    MatchSnapshot {
        id: MATCH,
        player1_id: ME,
        player2_id: Some(FOE),
        deck1_id: None,
        deck2_id: None,
        match_mode: None,
        status: MatchStatus::InProgress,
        winner_id: None,
        current_turn_player_id: Some(ME),
        created_at: None,
        game_state: Some(GameState {
            player1: PlayerState {
                mana: 10,
                board: my_board,
                hand: my_hand,
                ..Default::default()
            },
            player2: PlayerState {
                mana: 10,
                board: enemy_board,
                ..Default::default()
            },
            turn_number: 3,
            current_turn_player_id: Some(ME),
        }),
    }
}

pub fn their_turn(mut snap: MatchSnapshot) -> MatchSnapshot {
    snap.current_turn_player_id = Some(FOE);
    if let Some(gs) = snap.game_state.as_mut() {
        gs.current_turn_player_id = Some(FOE);
    }
    snap
}

pub fn finished(mut snap: MatchSnapshot, winner: Option<UserId>) -> MatchSnapshot {
    snap.status = MatchStatus::Finished;
    snap.winner_id = winner;
    snap
}

fn def(value: serde_json::Value) -> CardDefinition {
    serde_json::from_value(value).unwrap()
}

pub fn catalog_cards() -> Vec<CardDefinition> {
    vec![
        def(json!({"id": FOOTMAN, "cardType": "MINION", "name": "Footman", "manaCost": 1,
                   "attack": 1, "health": 2, "playEffectUrl": "https://cdn/fx/footman.gif"})),
        def(json!({"id": HEALER, "cardType": "MINION", "name": "Healer", "manaCost": 2,
                   "battlecryType": "HEAL", "battlecryValue": 3})),
        def(json!({"id": BOMBER, "cardType": "MINION", "name": "Bomber", "manaCost": 3,
                   "battlecryType": "DEAL_DAMAGE", "battlecryValue": 2, "battlecryTarget": "ENEMY",
                   "attackEffectUrl": "https://cdn/fx/boom.webm"})),
        def(json!({"id": CAPTAIN, "cardType": "MINION", "name": "Captain", "manaCost": 4,
                   "battlecryType": "BUFF_ALLY", "battlecryValue": 1})),
        def(json!({"id": FIREBALL, "cardType": "SPELL", "name": "Fireball", "manaCost": 4,
                   "damage": 6, "animationUrl": "https://cdn/fx/fireball.mp4"})),
        def(json!({"id": INSIGHT, "cardType": "SPELL", "name": "Insight", "manaCost": 1})),
    ]
}

pub fn catalog() -> CardCatalog {
    CardCatalog::new(catalog_cards())
}
