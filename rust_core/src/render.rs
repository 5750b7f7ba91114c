// rust_core/src/render.rs
// Plain-text board for the terminal front ends.

use std::fmt::Write;

use crate::catalog::CardCatalog;
use crate::models::{
    CardType, MatchMode, MatchSnapshot, MatchStatus, PlayerState, ReplayStep, UserId,
};
use crate::projector::{BoardView, HeroView, MinionView, OverlayKind};

pub fn board(view: &BoardView) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "== Match #{} | Turn {} | {} ==",
        view.match_id,
        view.turn_number,
        view.turn.text()
    );
    hero_line(&mut out, "Opponent", &view.enemy.hero);
    minion_row(&mut out, &view.enemy.board);
    let _ = writeln!(out, "{}", "-".repeat(40));
    minion_row(&mut out, &view.me.board);
    hero_line(&mut out, "You", &view.me.hero);

    let _ = writeln!(out, "Hand:");
    if view.hand.is_empty() {
        let _ = writeln!(out, "  (empty)");
    }
    for card in &view.hand {
        let cost = card
            .mana_cost
            .map(|c| format!("({})", c))
            .unwrap_or_else(|| "(?)".to_string());
        let kind = match card.card_type {
            CardType::Minion => "minion",
            CardType::Spell => "spell",
        };
        let mark = if card.is_selected { ">" } else { " " };
        let _ = write!(
            out,
            " {}[{}] {} {} {}",
            mark, card.instance_id, cost, card.name, kind
        );
        if let Some(reason) = &card.reason {
            let _ = write!(out, " - {}", reason);
        }
        out.push('\n');
    }

    if let Some(overlay) = &view.overlay {
        let kind = match overlay.kind {
            OverlayKind::Gif => "gif",
            OverlayKind::Video => "video",
        };
        let _ = writeln!(out, "Effect ({}): {}", kind, overlay.url);
    }
    if let Some(outcome) = view.outcome {
        let _ = writeln!(out, "*** {} ***", outcome.text().to_uppercase());
    }
    out
}

fn hero_line(out: &mut String, label: &str, hero: &HeroView) {
    let mut flags = String::new();
    if hero.exposed {
        flags.push_str(" (open)");
    }
    if hero.is_legal_target {
        flags.push_str(" <target>");
    }
    if hero.just_hit {
        flags.push_str(" *hit*");
    }
    let _ = writeln!(
        out,
        "{}: {} HP | {}/{} mana | deck {} | hand {}{}",
        label, hero.health, hero.mana, hero.max_mana, hero.deck_size, hero.hand_size, flags
    );
}

fn minion_row(out: &mut String, minions: &[MinionView]) {
    if minions.is_empty() {
        let _ = writeln!(out, "  (no minions)");
        return;
    }
    for m in minions {
        let mut tags = Vec::new();
        if m.taunt {
            tags.push("taunt");
        }
        if m.divine_shield {
            tags.push("shield");
        }
        if m.can_attack {
            tags.push("ready");
        }
        if m.is_selected {
            tags.push("selected");
        }
        if m.is_legal_target {
            tags.push("target");
        }
        if m.just_played {
            tags.push("new");
        }
        if m.just_hit {
            tags.push("hit");
        }
        let _ = write!(
            out,
            "  [{}] {} {}/{}",
            m.instance_id, m.name, m.attack, m.health
        );
        if !tags.is_empty() {
            let _ = write!(out, " ({})", tags.join(", "));
        }
        out.push('\n');
    }
}

/// One replay step: header, description and both sides of the board.
/// One replay step. `seats` is the match record, when known, so the two
/// sides can be named after the users sitting in them.
pub fn replay_step(
    step: &ReplayStep,
    label: &str,
    seats: Option<&MatchSnapshot>,
    catalog: &CardCatalog,
) -> String {
    let mut out = String::new();
    let who = match (step.player_id, seats) {
        (Some(id), Some(m)) if id == m.player1_id => seat_label(1, Some(id)),
        (Some(id), Some(m)) if m.player2_id == Some(id) => seat_label(2, Some(id)),
        (Some(id), _) => format!("player {}", id),
        (None, _) => "-".to_string(),
    };
    let _ = writeln!(
        out,
        "== {} | Turn {} | {:?} by {} ==",
        label, step.turn_number, step.action_type, who
    );
    if let Some(description) = &step.description {
        let _ = writeln!(out, "{}", description);
    }
    match &step.game_state {
        Some(state) => {
            let p1 = seat_label(1, seats.map(|m| m.player1_id));
            let p2 = seat_label(2, seats.and_then(|m| m.player2_id));
            player(&mut out, &p1, &state.player1, catalog);
            player(&mut out, &p2, &state.player2, catalog);
        }
        None => {
            let _ = writeln!(out, "(no board recorded)");
        }
    }
    out
}

fn seat_label(seat: u8, user: Option<UserId>) -> String {
    match user {
        Some(id) => format!("Player {} (#{})", seat, id),
        None => format!("Player {}", seat),
    }
}

/// Finished matches, newest first, one per line.
pub fn finished_matches(matches: &[MatchSnapshot]) -> String {
    let mut done: Vec<&MatchSnapshot> = matches
        .iter()
        .filter(|m| m.status == MatchStatus::Finished)
        .collect();
    if done.is_empty() {
        return "No finished matches.\n".to_string();
    }
    done.sort_by(|a, b| b.id.cmp(&a.id));
    let mut out = String::new();
    for m in done {
        let mode = match m.match_mode {
            Some(MatchMode::Ranked) => "ranked",
            Some(MatchMode::Casual) => "casual",
            None => "-",
        };
        let winner = m
            .winner_id
            .map(|id| format!("won by #{}", id))
            .unwrap_or_else(|| "draw".to_string());
        let _ = writeln!(
            out,
            "#{} | {} | #{} vs {} | {}",
            m.id,
            mode,
            m.player1_id,
            m.player2_id
                .map(|id| format!("#{}", id))
                .unwrap_or_else(|| "-".to_string()),
            winner
        );
    }
    out
}

fn player(out: &mut String, label: &str, p: &PlayerState, catalog: &CardCatalog) {
    let _ = writeln!(
        out,
        "{}: {} HP | {}/{} mana | hand {} | deck {}",
        label,
        p.health,
        p.mana,
        p.max_mana,
        p.hand.len(),
        p.deck.len()
    );
    for m in &p.board {
        let name = catalog
            .for_minion(m)
            .map(|d| d.name.as_str())
            .unwrap_or("?");
        let _ = writeln!(
            out,
            "  [{}] {} {}/{}",
            m.instance_id, name, m.attack, m.current_health
        );
    }
}
