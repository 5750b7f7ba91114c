// rust_core/src/projector.rs
// Snapshot + selection -> what the player sees.
// `project` is pure: no I/O, no clock reads. The caller passes `now` so the
// short-lived highlights can be checked against it.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::catalog::CardCatalog;
use crate::models::{
    CardId, CardType, MatchId, MatchSnapshot, MatchStatus, MinionInstance, PlayerState, UserId,
};
use crate::rules::{Judge, Ruling};
use crate::selection::{BoardContext, Click, Selection, SelectionMode};

// --- LABELS ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnLabel {
    YourTurn,
    OpponentTurn,
    Waiting,
    Finished,
}

impl TurnLabel {
    pub fn text(&self) -> &'static str {
        match self {
            TurnLabel::YourTurn => "Your turn",
            TurnLabel::OpponentTurn => "Opponent's turn",
            TurnLabel::Waiting => "Waiting for opponent",
            TurnLabel::Finished => "Match over",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Victory,
    Draw,
    Defeat,
}

impl Outcome {
    pub fn text(&self) -> &'static str {
        match self {
            Outcome::Victory => "Victory",
            Outcome::Draw => "Draw",
            Outcome::Defeat => "Defeat",
        }
    }
}

/// Result banner. Only a finished match has one; no winner means a draw.
pub fn outcome(snapshot: &MatchSnapshot, local_user: UserId) -> Option<Outcome> {
    if snapshot.status != MatchStatus::Finished {
        return None;
    }
    Some(match snapshot.winner_id {
        Some(winner) if winner == local_user => Outcome::Victory,
        None => Outcome::Draw,
        Some(_) => Outcome::Defeat,
    })
}

// --- EFFECT OVERLAYS ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    Gif,
    Video,
}

/// Full-screen effect shown after a play or an attack. Stays until
/// dismissed or replaced by the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectOverlay {
    pub url: String,
    pub kind: OverlayKind,
}

impl EffectOverlay {
    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let kind = if path.to_ascii_lowercase().ends_with(".gif") {
            OverlayKind::Gif
        } else {
            OverlayKind::Video
        };
        Some(Self {
            url: url.to_string(),
            kind,
        })
    }
}

// --- TRANSIENTS ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitMark {
    EnemyHero,
    OwnHero,
    Minion(String),
}

impl HitMark {
    pub fn from_click(click: &Click) -> Option<Self> {
        match click {
            Click::EnemyHero => Some(HitMark::EnemyHero),
            Click::OwnHero => Some(HitMark::OwnHero),
            Click::OwnMinion(id) | Click::EnemyMinion(id) => Some(HitMark::Minion(id.clone())),
            Click::HandCard(_) => None,
        }
    }
}

/// Locally timed highlights. They expire on their own after `duration`.
#[derive(Debug, Clone)]
pub struct Transients {
    duration: Duration,
    played: Option<(usize, Instant)>,
    hit: Option<(HitMark, Instant)>,
    overlay: Option<EffectOverlay>,
}

impl Transients {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            played: None,
            hit: None,
            overlay: None,
        }
    }

    pub fn mark_played(&mut self, board_index: usize, now: Instant) {
        self.played = Some((board_index, now + self.duration));
    }

    pub fn mark_hit(&mut self, mark: HitMark, now: Instant) {
        self.hit = Some((mark, now + self.duration));
    }

    pub fn played_index(&self, now: Instant) -> Option<usize> {
        self.played
            .as_ref()
            .filter(|(_, until)| *until > now)
            .map(|(i, _)| *i)
    }

    pub fn is_hit(&self, mark: &HitMark, now: Instant) -> bool {
        matches!(&self.hit, Some((m, until)) if m == mark && *until > now)
    }

    /// When the next highlight runs out, if any is active.
    pub fn next_expiry(&self) -> Option<Instant> {
        let played = self.played.as_ref().map(|(_, t)| *t);
        let hit = self.hit.as_ref().map(|(_, t)| *t);
        match (played, hit) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Drops expired highlights. Returns `true` if anything changed.
    pub fn clear_expired(&mut self, now: Instant) -> bool {
        let mut changed = false;
        if matches!(self.played, Some((_, until)) if until <= now) {
            self.played = None;
            changed = true;
        }
        if matches!(&self.hit, Some((_, until)) if *until <= now) {
            self.hit = None;
            changed = true;
        }
        changed
    }

    pub fn set_overlay(&mut self, overlay: Option<EffectOverlay>) {
        if overlay.is_some() {
            self.overlay = overlay;
        }
    }

    pub fn dismiss_overlay(&mut self) -> bool {
        self.overlay.take().is_some()
    }

    pub fn overlay(&self) -> Option<&EffectOverlay> {
        self.overlay.as_ref()
    }
}

// --- VIEW MODEL ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinionView {
    pub instance_id: String,
    pub card_id: CardId,
    pub name: String,
    pub attack: i32,
    pub health: i32,
    pub max_health: i32,
    pub taunt: bool,
    pub divine_shield: bool,
    /// "Ready" badge: own minion, own turn, allowed to attack.
    pub can_attack: bool,
    pub is_legal_target: bool,
    pub is_selected: bool,
    pub just_played: bool,
    pub just_hit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandCardView {
    pub instance_id: String,
    pub card_type: CardType,
    pub card_id: CardId,
    pub name: String,
    pub mana_cost: Option<i32>,
    pub playable: bool,
    pub reason: Option<String>,
    pub is_selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeroView {
    pub health: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub deck_size: usize,
    pub hand_size: usize,
    /// No minion stands on this side, so the hero can be attacked directly.
    /// Independent of the current selection.
    pub exposed: bool,
    pub is_legal_target: bool,
    pub just_hit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideView {
    pub user_id: Option<UserId>,
    pub hero: HeroView,
    pub board: Vec<MinionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardView {
    pub match_id: MatchId,
    pub status: MatchStatus,
    pub turn: TurnLabel,
    pub turn_number: u32,
    pub my_turn: bool,
    pub selection: SelectionMode,
    pub me: SideView,
    pub enemy: SideView,
    pub hand: Vec<HandCardView>,
    pub outcome: Option<Outcome>,
    pub overlay: Option<EffectOverlay>,
}

pub fn turn_label(snapshot: &MatchSnapshot, local_user: UserId) -> TurnLabel {
    match snapshot.status {
        MatchStatus::Waiting => TurnLabel::Waiting,
        MatchStatus::Finished => TurnLabel::Finished,
        MatchStatus::InProgress if snapshot.is_turn_of(local_user) => TurnLabel::YourTurn,
        MatchStatus::InProgress => TurnLabel::OpponentTurn,
    }
}

/// Builds the board as the local user sees it. `None` until the server has
/// sent a game state (the match is still waiting for an opponent).
pub fn project(
    snapshot: &MatchSnapshot,
    local_user: UserId,
    selection: &Selection,
    catalog: &CardCatalog,
    transients: &Transients,
    now: Instant,
) -> Option<BoardView> {
    let ctx = BoardContext::from_snapshot(snapshot, local_user, catalog)?;
    let turn_number = snapshot
        .game_state
        .as_ref()
        .map(|gs| gs.turn_number)
        .unwrap_or(0);
    let enemy_id = if snapshot.player1_id == local_user {
        snapshot.player2_id
    } else {
        Some(snapshot.player1_id)
    };
    let played = transients.played_index(now);

    let me = SideView {
        user_id: Some(local_user),
        hero: hero_view(
            ctx.me,
            selection.is_legal_target(&ctx, &Click::OwnHero),
            transients.is_hit(&HitMark::OwnHero, now),
        ),
        board: ctx
            .me
            .board
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let mut view = minion_view(m, catalog, selection, &ctx, transients, now, true);
                view.just_played = played == Some(i);
                view
            })
            .collect(),
    };
    let enemy = SideView {
        user_id: enemy_id,
        hero: hero_view(
            ctx.enemy,
            selection.is_legal_target(&ctx, &Click::EnemyHero),
            transients.is_hit(&HitMark::EnemyHero, now),
        ),
        board: ctx
            .enemy
            .board
            .iter()
            .map(|m| minion_view(m, catalog, selection, &ctx, transients, now, false))
            .collect(),
    };
    let hand = ctx
        .me
        .hand
        .iter()
        .map(|card| {
            let definition = catalog.for_hand(card);
            let ruling = Judge::check_play(ctx.me, card, definition, ctx.my_turn);
            HandCardView {
                instance_id: card.instance_id.clone(),
                card_type: card.card_type,
                card_id: card.card_id,
                name: definition
                    .map(|d| d.name.clone())
                    .unwrap_or_else(|| format!("Card #{}", card.card_id)),
                mana_cost: definition.map(|d| d.mana_cost),
                playable: ruling.is_legal(),
                reason: match ruling {
                    Ruling::Illegal(reason) => Some(reason),
                    Ruling::Legal => None,
                },
                is_selected: selection.source() == Some(card.instance_id.as_str()),
            }
        })
        .collect();

    Some(BoardView {
        match_id: snapshot.id,
        status: snapshot.status,
        turn: turn_label(snapshot, local_user),
        turn_number,
        my_turn: ctx.my_turn,
        selection: selection.mode(),
        me,
        enemy,
        hand,
        outcome: outcome(snapshot, local_user),
        overlay: transients.overlay().cloned(),
    })
}

fn hero_view(player: &PlayerState, is_legal_target: bool, just_hit: bool) -> HeroView {
    HeroView {
        health: player.health,
        mana: player.mana,
        max_mana: player.max_mana,
        deck_size: player.deck.len(),
        hand_size: player.hand.len(),
        exposed: Judge::hero_exposed(player),
        is_legal_target,
        just_hit,
    }
}

fn minion_view(
    m: &MinionInstance,
    catalog: &CardCatalog,
    selection: &Selection,
    ctx: &BoardContext<'_>,
    transients: &Transients,
    now: Instant,
    own: bool,
) -> MinionView {
    let click = if own {
        Click::OwnMinion(m.instance_id.clone())
    } else {
        Click::EnemyMinion(m.instance_id.clone())
    };
    MinionView {
        instance_id: m.instance_id.clone(),
        card_id: m.card_id,
        name: catalog
            .for_minion(m)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| format!("Minion #{}", m.card_id)),
        attack: m.attack,
        health: m.current_health,
        max_health: m.max_health.max(m.current_health),
        taunt: m.taunt,
        divine_shield: m.divine_shield,
        can_attack: own && Judge::check_attacker(m, ctx.my_turn).is_legal(),
        is_legal_target: selection.is_legal_target(ctx, &click),
        is_selected: own && selection.source() == Some(m.instance_id.as_str()),
        just_played: false,
        just_hit: transients.is_hit(&HitMark::Minion(m.instance_id.clone()), now),
    }
}

// --- TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;

    fn view(snap: &MatchSnapshot, sel: &Selection) -> BoardView {
        let catalog = catalog();
        let transients = Transients::new(Duration::from_millis(450));
        project(snap, ME, sel, &catalog, &transients, Instant::now()).unwrap()
    }

    #[test]
    fn hero_is_never_offered_while_enemy_minions_stand() {
        let snap = snapshot(
            vec![minion("a1", FOOTMAN, true)],
            vec![],
            vec![minion("e1", FOOTMAN, false)],
        );
        let sel = Selection::AttackerSelected {
            attacker: "a1".into(),
        };
        let v = view(&snap, &sel);
        assert!(!v.enemy.hero.is_legal_target);
        assert!(v.enemy.board[0].is_legal_target);
        assert!(v.me.board[0].is_selected);
        assert!(!v.me.board[0].is_legal_target);

        let empty = snapshot(vec![minion("a1", FOOTMAN, true)], vec![], vec![]);
        assert!(view(&empty, &sel).enemy.hero.is_legal_target);
    }

    #[test]
    fn exposed_hero_is_flagged_without_a_selection() {
        // Nothing selected: the bare enemy hero is still marked as open.
        let open = snapshot(vec![minion("a1", FOOTMAN, true)], vec![], vec![]);
        let v = view(&open, &Selection::Idle);
        assert!(v.enemy.hero.exposed);
        assert!(!v.enemy.hero.is_legal_target);
        assert!(!v.me.hero.exposed);

        let guarded = snapshot(vec![], vec![], vec![minion("e1", FOOTMAN, false)]);
        let v = view(&guarded, &Selection::Idle);
        assert!(!v.enemy.hero.exposed);
        assert!(v.me.hero.exposed);

        // It does not depend on whose turn it is either.
        assert!(view(&their_turn(open), &Selection::Idle).enemy.hero.exposed);
    }

    #[test]
    fn idle_board_has_no_targets_but_shows_ready_badges() {
        let snap = snapshot(
            vec![minion("a1", FOOTMAN, true), minion("a2", FOOTMAN, false)],
            vec![],
            vec![minion("e1", FOOTMAN, true)],
        );
        let v = view(&snap, &Selection::Idle);
        assert_eq!(v.turn, TurnLabel::YourTurn);
        assert!(v.me.board[0].can_attack);
        assert!(!v.me.board[1].can_attack);
        // Enemy minions never get our badge.
        assert!(!v.enemy.board[0].can_attack);
        assert!(!v.enemy.board[0].is_legal_target);
        assert!(!v.enemy.hero.is_legal_target);

        let v = view(&their_turn(snap), &Selection::Idle);
        assert_eq!(v.turn, TurnLabel::OpponentTurn);
        assert!(!v.me.board[0].can_attack);
    }

    #[test]
    fn hand_cards_carry_advisory_rulings() {
        let mut snap = snapshot(
            vec![],
            vec![
                hand("h1", CardType::Minion, FOOTMAN),
                hand("h2", CardType::Spell, FIREBALL),
            ],
            vec![],
        );
        snap.game_state.as_mut().unwrap().player1.mana = 2;
        let v = view(&snap, &Selection::Idle);
        assert!(v.hand[0].playable);
        assert_eq!(v.hand[0].name, "Footman");
        assert!(!v.hand[1].playable);
        assert!(v.hand[1].reason.as_deref().unwrap().contains("mana"));
    }

    #[test]
    fn banner_follows_winner() {
        let snap = snapshot(vec![], vec![], vec![]);
        assert_eq!(outcome(&snap, ME), None);
        assert_eq!(outcome(&finished(snap.clone(), Some(ME)), ME), Some(Outcome::Victory));
        assert_eq!(outcome(&finished(snap.clone(), Some(FOE)), ME), Some(Outcome::Defeat));
        assert_eq!(outcome(&finished(snap.clone(), None), ME), Some(Outcome::Draw));

        let v = view(&finished(snap, Some(ME)), &Selection::Idle);
        assert_eq!(v.turn, TurnLabel::Finished);
        assert!(!v.my_turn);
    }

    #[test]
    fn waiting_match_has_no_board() {
        let mut snap = snapshot(vec![], vec![], vec![]);
        snap.status = MatchStatus::Waiting;
        snap.game_state = None;
        let catalog = catalog();
        let transients = Transients::new(Duration::from_millis(450));
        assert!(project(&snap, ME, &Selection::Idle, &catalog, &transients, Instant::now()).is_none());
        assert_eq!(turn_label(&snap, ME), TurnLabel::Waiting);
    }

    #[test]
    fn highlights_expire_after_their_duration() {
        let snap = snapshot(
            vec![minion("a1", FOOTMAN, false)],
            vec![],
            vec![minion("e1", FOOTMAN, false)],
        );
        let catalog = catalog();
        let start = Instant::now();
        let mut t = Transients::new(Duration::from_millis(450));
        t.mark_played(0, start);
        t.mark_hit(HitMark::Minion("e1".into()), start);
        assert_eq!(t.next_expiry(), Some(start + Duration::from_millis(450)));

        let v = project(&snap, ME, &Selection::Idle, &catalog, &t, start).unwrap();
        assert!(v.me.board[0].just_played);
        assert!(v.enemy.board[0].just_hit);

        let later = start + Duration::from_millis(450);
        let v = project(&snap, ME, &Selection::Idle, &catalog, &t, later).unwrap();
        assert!(!v.me.board[0].just_played);
        assert!(!v.enemy.board[0].just_hit);

        assert!(t.clear_expired(later));
        assert_eq!(t.next_expiry(), None);
        assert!(!t.clear_expired(later));
    }

    #[test]
    fn overlay_kind_follows_extension() {
        let gif = EffectOverlay::from_url("https://cdn/fx/Boom.GIF?v=2").unwrap();
        assert_eq!(gif.kind, OverlayKind::Gif);
        let video = EffectOverlay::from_url("https://cdn/fx/boom.webm").unwrap();
        assert_eq!(video.kind, OverlayKind::Video);
        assert!(EffectOverlay::from_url("  ").is_none());

        let mut t = Transients::new(Duration::from_millis(450));
        t.set_overlay(Some(gif.clone()));
        t.set_overlay(None);
        assert_eq!(t.overlay(), Some(&gif));
        assert!(t.dismiss_overlay());
        assert!(t.overlay().is_none());
    }
}
