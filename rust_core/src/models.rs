// rust_core/src/models.rs
// Wire models for the match server's snapshots, catalog and actions.
// We don't use strings for statuses or card kinds; we use Enums.
// A snapshot is never patched locally: every push, poll or action response
// replaces the previous one wholesale.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

pub type MatchId = i64;
pub type UserId = i64;
pub type CardId = i64;

/// Maximum number of minions a player may have on board.
pub const MAX_BOARD_SIZE: usize = 7;

// --- ENUMS ---

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Waiting,
    InProgress,
    Finished,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchMode {
    Ranked,
    Casual,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Ranked => "RANKED",
            MatchMode::Casual => "CASUAL",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardType {
    Minion,
    Spell,
}

// Battlecry: fires when the minion is played. Only the first three ask for a target.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BattlecryType {
    None,
    DealDamage,
    Heal,
    BuffAlly,
    Summon,
    #[serde(other)]
    Unknown, // Safety fallback
}

impl BattlecryType {
    pub fn needs_target(&self) -> bool {
        matches!(
            self,
            BattlecryType::DealDamage | BattlecryType::Heal | BattlecryType::BuffAlly
        )
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BattlecryTarget {
    Any,
    Friendly,
    Enemy,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeathrattleType {
    None,
    DealDamage,
    Summon,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplayAction {
    Init,
    Play,
    Attack,
    EndTurn,
    #[serde(other)]
    Other,
}

// --- THE SNAPSHOT ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    pub id: MatchId,
    pub player1_id: UserId,
    #[serde(default)]
    pub player2_id: Option<UserId>, // Empty while WAITING
    #[serde(default)]
    pub deck1_id: Option<i64>,
    #[serde(default)]
    pub deck2_id: Option<i64>,
    #[serde(default)]
    pub match_mode: Option<MatchMode>,
    pub status: MatchStatus,
    #[serde(default)]
    pub winner_id: Option<UserId>,
    #[serde(default)]
    pub current_turn_player_id: Option<UserId>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub game_state: Option<GameState>, // Null until the match starts
}

/// Which of the two seats the local viewer occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    Player1,
    Player2,
}

impl MatchSnapshot {
    /// Player 1 is whoever matches `player1Id`; everyone else looks through seat 2.
    pub fn seat_of(&self, user_id: UserId) -> Seat {
        if self.player1_id == user_id {
            Seat::Player1
        } else {
            Seat::Player2
        }
    }

    /// `(me, enemy)` from the viewer's point of view.
    pub fn sides(&self, user_id: UserId) -> Option<(&PlayerState, &PlayerState)> {
        let gs = self.game_state.as_ref()?;
        Some(match self.seat_of(user_id) {
            Seat::Player1 => (&gs.player1, &gs.player2),
            Seat::Player2 => (&gs.player2, &gs.player1),
        })
    }

    pub fn turn_player(&self) -> Option<UserId> {
        self.current_turn_player_id.or_else(|| {
            self.game_state
                .as_ref()
                .and_then(|gs| gs.current_turn_player_id)
        })
    }

    /// Is it `user_id`'s turn in a running match?
    pub fn is_turn_of(&self, user_id: UserId) -> bool {
        self.status == MatchStatus::InProgress && self.turn_player() == Some(user_id)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub player1: PlayerState,
    pub player2: PlayerState,
    #[serde(default)]
    pub turn_number: u32,
    #[serde(default)]
    pub current_turn_player_id: Option<UserId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub health: i32,
    pub mana: i32,
    #[serde(default)]
    pub max_mana: i32,
    #[serde(default)]
    pub fatigue_counter: i32,
    #[serde(default)]
    pub deck: Vec<CardRef>,
    #[serde(default)]
    pub hand: Vec<HandCard>,
    #[serde(default)]
    pub board: Vec<MinionInstance>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            health: 30,
            mana: 0,
            max_mana: 0,
            fatigue_counter: 0,
            deck: Vec::new(),
            hand: Vec::new(),
            board: Vec::new(),
        }
    }
}

impl PlayerState {
    pub fn minion(&self, instance_id: &str) -> Option<&MinionInstance> {
        self.board.iter().find(|m| m.instance_id == instance_id)
    }

    pub fn hand_card(&self, instance_id: &str) -> Option<&HandCard> {
        self.hand.iter().find(|c| c.instance_id == instance_id)
    }

    /// First instance id that shows up twice across hand and board, if any.
    pub fn duplicate_instance(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.hand
            .iter()
            .map(|c| c.instance_id.as_str())
            .chain(self.board.iter().map(|m| m.instance_id.as_str()))
            .find(|id| !seen.insert(*id))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CardRef {
    pub card_type: CardType,
    pub card_id: CardId,
}

// 1. The "Hand Card" (not yet played)
// Only a reference; display attributes come from the catalog.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HandCard {
    pub instance_id: String,
    pub card_type: CardType,
    pub card_id: CardId,
}

// 2. The "Minion" (on board)
// `instance_id` is unique per copy; `card_id` is shared by every copy.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MinionInstance {
    pub instance_id: String,
    pub card_id: CardId,
    pub attack: i32,
    pub current_health: i32,
    #[serde(default)]
    pub max_health: i32,
    #[serde(default)]
    pub can_attack: bool,
    #[serde(default)]
    pub exhausted: bool,
    #[serde(default)]
    pub taunt: bool,
    #[serde(default)]
    pub divine_shield: bool,
}

// --- THE CATALOG ENTRY ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CardDefinition {
    pub id: CardId,
    pub card_type: CardType,
    pub name: String,
    #[serde(default)]
    pub mana_cost: i32,
    #[serde(default)]
    pub attack: Option<i32>,
    #[serde(default)]
    pub health: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub sound_url: Option<String>,
    #[serde(default)]
    pub animation_url: Option<String>,
    #[serde(default)]
    pub play_effect_url: Option<String>,
    #[serde(default)]
    pub attack_effect_url: Option<String>,
    #[serde(default)]
    pub attack_sound_url: Option<String>,
    #[serde(default)]
    pub taunt: bool,
    #[serde(default)]
    pub charge: bool,
    #[serde(default)]
    pub divine_shield: bool,
    #[serde(default)]
    pub battlecry_type: Option<BattlecryType>,
    #[serde(default)]
    pub battlecry_value: Option<i32>,
    #[serde(default)]
    pub battlecry_target: Option<BattlecryTarget>,
    #[serde(default)]
    pub deathrattle_type: Option<DeathrattleType>,
    #[serde(default)]
    pub deathrattle_value: Option<i32>,
    #[serde(default)]
    pub damage: Option<i32>, // Spells only
}

impl CardDefinition {
    /// A damage spell must be pointed at something.
    pub fn spell_needs_target(&self) -> bool {
        self.card_type == CardType::Spell && self.damage.unwrap_or(0) > 0
    }

    /// The battlecry that asks for a target, if this minion has one.
    pub fn targeted_battlecry(&self) -> Option<BattlecryType> {
        match self.battlecry_type {
            Some(b) if self.card_type == CardType::Minion && b.needs_target() => Some(b),
            _ => None,
        }
    }

    /// Effect shown when the card is played.
    pub fn play_effect(&self) -> Option<&str> {
        self.play_effect_url
            .as_deref()
            .or(self.animation_url.as_deref())
            .filter(|u| !u.is_empty())
    }
}

// --- ACTIONS ---

/// A target as the server spells it: the literal `"hero"` or a minion instance id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetRef {
    Hero,
    Minion(String),
}

impl TargetRef {
    pub const HERO: &'static str = "hero";

    pub fn as_str(&self) -> &str {
        match self {
            TargetRef::Hero => Self::HERO,
            TargetRef::Minion(id) => id,
        }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TargetRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TargetRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TargetVisitor;

        impl<'de> Visitor<'de> for TargetVisitor {
            type Value = TargetRef;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("\"hero\" or a minion instance id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<TargetRef, E> {
                if v.eq_ignore_ascii_case(TargetRef::HERO) {
                    Ok(TargetRef::Hero)
                } else {
                    Ok(TargetRef::Minion(v.to_string()))
                }
            }
        }

        deserializer.deserialize_str(TargetVisitor)
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayCardRequest {
    pub instance_id: String,
    pub target_position: Option<usize>,
    pub target_instance_id: Option<TargetRef>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttackRequest {
    pub attacker_instance_id: String,
    pub target_instance_id: TargetRef,
}

// --- REPLAY ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplayStep {
    #[serde(default)]
    pub step_index: u32,
    #[serde(default)]
    pub turn_number: u32,
    pub action_type: ReplayAction,
    #[serde(default)]
    pub player_id: Option<UserId>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub game_state: Option<GameState>,
}

// --- AUTH ---

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub username: Option<String>,
}

// --- TESTS ---

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "id": 12,
        "player1Id": 1,
        "player2Id": 2,
        "matchMode": "RANKED",
        "status": "IN_PROGRESS",
        "winnerId": null,
        "currentTurnPlayerId": 2,
        "gameState": {
            "player1": { "health": 30, "mana": 3, "hand": [
                { "instanceId": "h1", "cardType": "SPELL", "cardId": 4 }
            ], "board": [] },
            "player2": { "health": 25, "mana": 1, "board": [
                { "instanceId": "m1", "cardId": 9, "attack": 2, "currentHealth": 3,
                  "canAttack": true, "taunt": true, "divineShield": false }
            ] },
            "turnNumber": 4
        }
    }"#;

    #[test]
    fn decodes_server_snapshot() {
        let snap: MatchSnapshot = serde_json::from_str(SNAPSHOT).unwrap();
        assert_eq!(snap.status, MatchStatus::InProgress);
        assert_eq!(snap.match_mode, Some(MatchMode::Ranked));
        let gs = snap.game_state.as_ref().unwrap();
        assert_eq!(gs.turn_number, 4);
        assert_eq!(gs.player1.hand[0].card_type, CardType::Spell);
        assert!(gs.player2.board[0].taunt);
        assert!(gs.player2.hand.is_empty());
    }

    #[test]
    fn sides_follow_the_viewer_seat() {
        let snap: MatchSnapshot = serde_json::from_str(SNAPSHOT).unwrap();

        let (me, enemy) = snap.sides(2).unwrap();
        assert_eq!(me.health, 25);
        assert_eq!(enemy.health, 30);
        assert!(snap.is_turn_of(2));
        assert!(!snap.is_turn_of(1));

        let (me, _) = snap.sides(1).unwrap();
        assert_eq!(me.mana, 3);
    }

    #[test]
    fn finished_match_is_nobodys_turn() {
        let mut snap: MatchSnapshot = serde_json::from_str(SNAPSHOT).unwrap();
        snap.status = MatchStatus::Finished;
        assert!(!snap.is_turn_of(2));
    }

    #[test]
    fn waiting_match_has_no_game_state() {
        let raw = r#"{"id":5,"player1Id":1,"status":"WAITING"}"#;
        let snap: MatchSnapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snap.player2_id, None);
        assert!(snap.sides(1).is_none());
        assert!(!snap.is_turn_of(1));
    }

    #[test]
    fn target_ref_wire_form() {
        let req = AttackRequest {
            attacker_instance_id: "a".into(),
            target_instance_id: TargetRef::Hero,
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"attackerInstanceId":"a","targetInstanceId":"hero"}"#
        );

        let parsed: TargetRef = serde_json::from_str(r#""HERO""#).unwrap();
        assert_eq!(parsed, TargetRef::Hero);
        let parsed: TargetRef = serde_json::from_str(r#""m-7""#).unwrap();
        assert_eq!(parsed, TargetRef::Minion("m-7".into()));
    }

    #[test]
    fn play_request_keeps_null_fields() {
        let req = PlayCardRequest {
            instance_id: "h1".into(),
            target_position: None,
            target_instance_id: Some(TargetRef::Minion("m1".into())),
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"instanceId":"h1","targetPosition":null,"targetInstanceId":"m1"}"#
        );
    }

    #[test]
    fn unknown_effect_kinds_do_not_break_decoding() {
        let raw = r#"{"id":3,"cardType":"MINION","name":"Oddity","manaCost":2,
                     "battlecryType":"TRANSFORM","deathrattleType":"SUMMON"}"#;
        let card: CardDefinition = serde_json::from_str(raw).unwrap();
        assert_eq!(card.battlecry_type, Some(BattlecryType::Unknown));
        assert_eq!(card.targeted_battlecry(), None);
        assert_eq!(card.deathrattle_type, Some(DeathrattleType::Summon));
    }

    #[test]
    fn spell_target_requirement_follows_damage() {
        let raw = r#"{"id":4,"cardType":"SPELL","name":"Bolt","manaCost":1,"damage":3}"#;
        let bolt: CardDefinition = serde_json::from_str(raw).unwrap();
        assert!(bolt.spell_needs_target());

        let raw = r#"{"id":5,"cardType":"SPELL","name":"Draw","manaCost":1}"#;
        let draw: CardDefinition = serde_json::from_str(raw).unwrap();
        assert!(!draw.spell_needs_target());
    }

    #[test]
    fn duplicate_instance_is_reported() {
        let mut player = PlayerState::default();
        player.hand.push(HandCard {
            instance_id: "x".into(),
            card_type: CardType::Minion,
            card_id: 1,
        });
        assert_eq!(player.duplicate_instance(), None);
        player.board.push(MinionInstance {
            instance_id: "x".into(),
            card_id: 1,
            attack: 1,
            current_health: 1,
            max_health: 1,
            can_attack: false,
            exhausted: true,
            taunt: false,
            divine_shield: false,
        });
        assert_eq!(player.duplicate_instance(), Some("x"));
    }
}
