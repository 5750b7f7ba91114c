// rust_core/src/replay.rs
// Step-through cursor over a finished match's history.

use crate::models::ReplayStep;

#[derive(Debug, Clone, Default)]
pub struct ReplayCursor {
    steps: Vec<ReplayStep>,
    index: usize,
}

impl ReplayCursor {
    /// Steps are sorted by `step_index`; the server usually sends them in order.
    pub fn new(mut steps: Vec<ReplayStep>) -> Self {
        steps.sort_by_key(|s| s.step_index);
        Self { steps, index: 0 }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&ReplayStep> {
        self.steps.get(self.index)
    }

    pub fn first(&mut self) -> Option<&ReplayStep> {
        self.index = 0;
        self.current()
    }

    pub fn last(&mut self) -> Option<&ReplayStep> {
        self.index = self.steps.len().saturating_sub(1);
        self.current()
    }

    /// Stays on the last step at the end.
    pub fn next(&mut self) -> Option<&ReplayStep> {
        if self.index + 1 < self.steps.len() {
            self.index += 1;
        }
        self.current()
    }

    pub fn prev(&mut self) -> Option<&ReplayStep> {
        self.index = self.index.saturating_sub(1);
        self.current()
    }

    pub fn at_start(&self) -> bool {
        self.index == 0
    }

    pub fn at_end(&self) -> bool {
        self.index + 1 >= self.steps.len()
    }

    /// "Step 3 / 10", one-based. Empty replays read "Step 0 / 0".
    pub fn label(&self) -> String {
        if self.steps.is_empty() {
            return "Step 0 / 0".to_string();
        }
        format!("Step {} / {}", self.index + 1, self.steps.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReplayAction;

    fn step(i: u32, action: ReplayAction) -> ReplayStep {
        ReplayStep {
            step_index: i,
            turn_number: i / 2,
            action_type: action,
            player_id: Some(1),
            description: Some(format!("step {}", i)),
            game_state: None,
        }
    }

    #[test]
    fn cursor_is_clamped_at_both_ends() {
        let mut c = ReplayCursor::new(vec![
            step(2, ReplayAction::Attack),
            step(0, ReplayAction::Init),
            step(1, ReplayAction::Play),
        ]);
        assert_eq!(c.label(), "Step 1 / 3");
        assert_eq!(c.current().unwrap().action_type, ReplayAction::Init);
        assert!(c.at_start());

        c.prev();
        assert_eq!(c.position(), 0);
        c.next();
        c.next();
        c.next();
        assert_eq!(c.label(), "Step 3 / 3");
        assert!(c.at_end());

        c.first();
        assert_eq!(c.position(), 0);
        assert_eq!(c.last().unwrap().step_index, 2);
    }

    #[test]
    fn empty_replay_has_no_current_step() {
        let mut c = ReplayCursor::new(vec![]);
        assert!(c.current().is_none());
        assert!(c.next().is_none());
        assert!(c.last().is_none());
        assert_eq!(c.label(), "Step 0 / 0");
    }

    #[test]
    fn decodes_server_steps() {
        let raw = r#"[{"stepIndex":0,"turnNumber":1,"actionType":"INIT","playerId":null,
                       "description":"Match started","gameState":null},
                      {"stepIndex":1,"turnNumber":1,"actionType":"END_TURN","playerId":1}]"#;
        let steps: Vec<ReplayStep> = serde_json::from_str(raw).unwrap();
        let c = ReplayCursor::new(steps);
        assert_eq!(c.len(), 2);
        assert_eq!(c.current().unwrap().description.as_deref(), Some("Match started"));
    }
}
