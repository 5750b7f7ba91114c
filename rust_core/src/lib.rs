// rust_core/src/lib.rs
// Headless client core for live card matches.
// The library keeps a local snapshot in sync with the match server (push
// channel with polling fallback), turns clicks into server actions and
// projects the snapshot into a view model. It never decides game rules;
// the server does.
//
// With the `python` feature the pure projector is also exposed to Python
// via PyO3: JSON in, JSON out.

pub mod api;
pub mod catalog;
pub mod channel;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod lobby;
pub mod models;
pub mod projector;
pub mod render;
pub mod replay;
pub mod rules;
pub mod selection;
pub mod session;
pub mod stomp;

#[cfg(test)]
mod fixtures;

pub use api::{HttpMatchApi, MatchApi};
pub use catalog::CardCatalog;
pub use channel::{ConnectionState, MatchSyncChannel, WsConnector};
pub use config::ClientConfig;
pub use credentials::{CredentialProvider, TokenStore};
pub use dispatcher::{Action, ActionDispatcher, DispatchOutcome};
pub use error::{ClientError, Result};
pub use models::{MatchSnapshot, TargetRef};
pub use projector::{BoardView, Outcome};
pub use selection::{Click, Selection};
pub use session::{MatchSession, SessionCommand, SessionEvent, SyncLink};

use serde_json::{json, Value};

use models::{CardDefinition, UserId};
use rules::Judge;

// --- JSON BRIDGE ---
// Parse errors come back as {"status": "error", "message": ...} instead of
// failing, so a scripting host never has to catch anything.

fn error_json(message: String) -> String {
    json!({ "status": "error", "message": message }).to_string()
}

fn parse_inputs(
    snapshot_json: &str,
    catalog_json: &str,
) -> std::result::Result<(MatchSnapshot, CardCatalog), String> {
    let snapshot: MatchSnapshot = serde_json::from_str(snapshot_json)
        .map_err(|e| format!("Snapshot Parse Error: {}", e))?;
    let cards: Vec<CardDefinition> = serde_json::from_str(catalog_json)
        .map_err(|e| format!("Catalog Parse Error: {}", e))?;
    Ok((snapshot, CardCatalog::new(cards)))
}

/// The board as `local_user_id` sees it, with nothing selected.
pub fn project_board_json(snapshot_json: &str, catalog_json: &str, local_user_id: UserId) -> String {
    let (snapshot, catalog) = match parse_inputs(snapshot_json, catalog_json) {
        Ok(parsed) => parsed,
        Err(message) => return error_json(message),
    };
    let transients = projector::Transients::new(std::time::Duration::ZERO);
    let view = projector::project(
        &snapshot,
        local_user_id,
        &Selection::Idle,
        &catalog,
        &transients,
        tokio::time::Instant::now(),
    );
    match view {
        Some(view) => serde_json::to_string(&view).unwrap_or_else(|e| error_json(e.to_string())),
        None => json!({ "status": "waiting", "match_status": snapshot.status }).to_string(),
    }
}

/// One advisory ruling per hand card.
pub fn assess_hand_json(snapshot_json: &str, catalog_json: &str, local_user_id: UserId) -> String {
    let (snapshot, catalog) = match parse_inputs(snapshot_json, catalog_json) {
        Ok(parsed) => parsed,
        Err(message) => return error_json(message),
    };
    let response: Vec<Value> = Judge::assess_hand(&snapshot, local_user_id, &catalog)
        .into_iter()
        .map(|(instance_id, ruling)| {
            let mut entry = serde_json::to_value(&ruling).unwrap_or(Value::Null);
            if let Value::Object(map) = &mut entry {
                map.insert("instance_id".to_string(), Value::String(instance_id));
            }
            entry
        })
        .collect();
    Value::Array(response).to_string()
}

#[cfg(feature = "python")]
mod python {
    use pyo3::prelude::*;

    #[pyfunction]
    fn project_board(snapshot_json: String, catalog_json: String, local_user_id: i64) -> PyResult<String> {
        Ok(super::project_board_json(&snapshot_json, &catalog_json, local_user_id))
    }

    #[pyfunction]
    fn assess_hand(snapshot_json: String, catalog_json: String, local_user_id: i64) -> PyResult<String> {
        Ok(super::assess_hand_json(&snapshot_json, &catalog_json, local_user_id))
    }

    #[pymodule]
    fn lotus_match_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(project_board, m)?)?;
        m.add_function(wrap_pyfunction!(assess_hand, m)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::models::CardType;

    fn inputs() -> (String, String) {
        let snap = snapshot(
            vec![minion("a1", FOOTMAN, true)],
            vec![
                hand("h1", CardType::Minion, FOOTMAN),
                hand("h2", CardType::Spell, FIREBALL),
            ],
            vec![],
        );
        (
            serde_json::to_string(&snap).unwrap(),
            serde_json::to_string(&catalog_cards()).unwrap(),
        )
    }

    #[test]
    fn project_board_round_trips_through_json() {
        let (snap, cards) = inputs();
        let out: Value = serde_json::from_str(&project_board_json(&snap, &cards, ME)).unwrap();
        assert_eq!(out["turn"], "your_turn");
        assert_eq!(out["me"]["board"][0]["can_attack"], true);
        assert_eq!(out["enemy"]["hero"]["is_legal_target"], false);
    }

    #[test]
    fn assess_hand_reports_each_card() {
        let (snap, cards) = inputs();
        let out: Value = serde_json::from_str(&assess_hand_json(&snap, &cards, ME)).unwrap();
        assert_eq!(out[0]["instance_id"], "h1");
        assert_eq!(out[0]["status"], "legal");
        assert_eq!(out[1]["status"], "legal");

        let out: Value = serde_json::from_str(&assess_hand_json(&snap, &cards, FOE)).unwrap();
        assert_eq!(out.as_array().unwrap().len(), 0);
    }

    #[test]
    fn bad_json_is_an_error_object() {
        let out: Value = serde_json::from_str(&project_board_json("{", "[]", ME)).unwrap();
        assert_eq!(out["status"], "error");
        assert!(out["message"].as_str().unwrap().starts_with("Snapshot Parse Error"));
    }
}
