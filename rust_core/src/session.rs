// rust_core/src/session.rs
// The match view. Owns the current snapshot, the selection and the local
// highlights, and is the single point where snapshots get replaced.
//
// Push events, fallback polls and dispatch results all funnel through
// `apply_snapshot`. The newest arrival wins; nothing is merged.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::MatchApi;
use crate::catalog::CardCatalog;
use crate::channel::{ChannelEvent, ChannelEventKind, ChannelId, ConnectionState, MatchSyncChannel};
use crate::config::ClientConfig;
use crate::dispatcher::{Action, ActionDispatcher, DispatchOutcome};
use crate::error::Result;
use crate::models::{CardType, MatchId, MatchSnapshot, MatchStatus, UserId};
use crate::projector::{self, BoardView, EffectOverlay, HitMark, Outcome, Transients};
use crate::selection::{BoardContext, Click, Selection};

/// Input from whatever front end drives the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Click(Click),
    EndTurn,
    DismissOverlay,
    /// Manual re-fetch.
    Refresh,
    /// Leave the view now.
    Exit,
}

/// Output towards the front end.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    View(Box<BoardView>),
    /// No board yet (opponent not joined).
    Waiting(MatchStatus),
    /// A rejected action, verbatim from the server.
    Notice(String),
    /// The result banner has been up long enough.
    Exit(Option<Outcome>),
}

/// A connected push channel and its event stream.
pub struct SyncLink {
    pub channel: MatchSyncChannel,
    pub events: mpsc::Receiver<ChannelEvent>,
}

/// What applying a channel event asks the caller to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Ignored,
    Changed,
    /// A push could not be decoded; fetch the match instead.
    Refetch,
}

enum Completion {
    Refreshed(Result<MatchSnapshot>),
    Dispatched(DispatchOutcome),
}

pub struct MatchSession {
    match_id: MatchId,
    user_id: UserId,
    catalog: CardCatalog,
    snapshot: MatchSnapshot,
    selection: Selection,
    transients: Transients,
    api: Arc<dyn MatchApi>,
    dispatcher: ActionDispatcher,
    config: ClientConfig,
    channel_id: Option<ChannelId>,
    live: bool,
}

impl MatchSession {
    /// Loads catalog and match together. Either failing blocks the board;
    /// the caller shows the error and offers a retry.
    pub async fn load(
        api: Arc<dyn MatchApi>,
        match_id: MatchId,
        user_id: UserId,
        config: ClientConfig,
    ) -> Result<Self> {
        let (cards, snapshot) = tokio::try_join!(api.fetch_cards(), api.fetch_match(match_id))?;
        info!(match_id, cards = cards.len(), "match view loaded");
        Ok(Self::new(
            api,
            user_id,
            CardCatalog::new(cards),
            snapshot,
            config,
        ))
    }

    pub fn new(
        api: Arc<dyn MatchApi>,
        user_id: UserId,
        catalog: CardCatalog,
        snapshot: MatchSnapshot,
        config: ClientConfig,
    ) -> Self {
        let match_id = snapshot.id;
        Self {
            match_id,
            user_id,
            catalog,
            snapshot,
            selection: Selection::Idle,
            transients: Transients::new(config.animation()),
            dispatcher: ActionDispatcher::new(api.clone(), match_id),
            api,
            config,
            channel_id: None,
            live: false,
        }
    }

    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    pub fn snapshot(&self) -> &MatchSnapshot {
        &self.snapshot
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn is_busy(&self) -> bool {
        self.dispatcher.is_busy()
    }

    /// Fallback polling runs only while the push channel is down mid-match.
    pub fn should_poll(&self) -> bool {
        !self.live && self.snapshot.status == MatchStatus::InProgress
    }

    /// Replaces the snapshot wholesale. Snapshots for another match are
    /// ignored. Returns `true` if the snapshot was taken.
    pub fn apply_snapshot(&mut self, snapshot: MatchSnapshot) -> bool {
        if snapshot.id != self.match_id {
            debug!(
                match_id = self.match_id,
                got = snapshot.id,
                "ignoring snapshot for another match"
            );
            return false;
        }
        if let Some(gs) = &snapshot.game_state {
            for player in [&gs.player1, &gs.player2] {
                if let Some(dup) = player.duplicate_instance() {
                    warn!(match_id = self.match_id, instance_id = dup, "duplicate instance id in snapshot");
                }
            }
        }
        self.snapshot = snapshot;
        let ctx = BoardContext::from_snapshot(&self.snapshot, self.user_id, &self.catalog);
        self.selection.reconcile(ctx.as_ref());
        true
    }

    /// Channel events from a replaced channel are dropped.
    pub fn apply_channel_event(&mut self, event: ChannelEvent) -> Applied {
        if self.channel_id != Some(event.channel) {
            debug!(channel = %event.channel, "ignoring event from stale channel");
            return Applied::Ignored;
        }
        match event.kind {
            ChannelEventKind::State(state) => {
                let live = state == ConnectionState::Connected;
                if live != self.live {
                    info!(match_id = self.match_id, ?state, "push channel state changed");
                }
                self.live = live;
                Applied::Changed
            }
            ChannelEventKind::Snapshot(snapshot) => {
                if self.apply_snapshot(*snapshot) {
                    Applied::Changed
                } else {
                    Applied::Ignored
                }
            }
            ChannelEventKind::Malformed(reason) => {
                warn!(match_id = self.match_id, %reason, "malformed push, re-fetching");
                Applied::Refetch
            }
        }
    }

    /// Feeds a click to the selection. When it completes an action, the
    /// local highlight and effect overlay are set before it is returned.
    pub fn click(&mut self, click: Click, now: Instant) -> Option<Action> {
        let ctx = BoardContext::from_snapshot(&self.snapshot, self.user_id, &self.catalog)?;
        let action = self.selection.click(&ctx, click.clone())?;

        match &action {
            Action::PlayCard {
                instance_id,
                position,
                target,
            } => {
                let card = ctx.me.hand_card(instance_id);
                if let (Some(card), Some(index)) = (card, position) {
                    if card.card_type == CardType::Minion {
                        self.transients.mark_played(*index, now);
                    }
                }
                if target.is_some() {
                    if let Some(mark) = HitMark::from_click(&click) {
                        self.transients.mark_hit(mark, now);
                    }
                }
                let effect = card
                    .and_then(|c| self.catalog.for_hand(c))
                    .and_then(|def| def.play_effect())
                    .and_then(EffectOverlay::from_url);
                self.transients.set_overlay(effect);
            }
            Action::Attack { attacker, .. } => {
                if let Some(mark) = HitMark::from_click(&click) {
                    self.transients.mark_hit(mark, now);
                }
                let effect = ctx
                    .me
                    .minion(attacker)
                    .and_then(|m| self.catalog.for_minion(m))
                    .and_then(|def| def.attack_effect_url.as_deref())
                    .and_then(EffectOverlay::from_url);
                self.transients.set_overlay(effect);
            }
            Action::EndTurn => {}
        }
        Some(action)
    }

    /// Ending the turn is only offered on the player's own turn.
    pub fn end_turn(&mut self) -> Option<Action> {
        if !self.snapshot.is_turn_of(self.user_id) {
            return None;
        }
        self.selection.clear();
        Some(Action::EndTurn)
    }

    pub fn dismiss_overlay(&mut self) -> bool {
        self.transients.dismiss_overlay()
    }

    pub fn view(&self, now: Instant) -> Option<BoardView> {
        projector::project(
            &self.snapshot,
            self.user_id,
            &self.selection,
            &self.catalog,
            &self.transients,
            now,
        )
    }

    pub fn outcome(&self) -> Option<Outcome> {
        projector::outcome(&self.snapshot, self.user_id)
    }

    fn update(&self, now: Instant) -> SessionEvent {
        match self.view(now) {
            Some(view) => SessionEvent::View(Box::new(view)),
            None => SessionEvent::Waiting(self.snapshot.status),
        }
    }

    fn spawn_refresh(&self, tasks: &mut JoinSet<Completion>) {
        let api = self.api.clone();
        let match_id = self.match_id;
        tasks.spawn(async move { Completion::Refreshed(api.fetch_match(match_id).await) });
    }

    fn spawn_dispatch(&self, tasks: &mut JoinSet<Completion>, action: Action) {
        let dispatcher = self.dispatcher.clone();
        tasks.spawn(async move { Completion::Dispatched(dispatcher.dispatch(action).await) });
    }

    /// Drives the view until the player leaves, the front end goes away, or
    /// the exit delay after a finished match runs out. `on_exit` fires at
    /// most once, and only in that last case. The push channel is shut
    /// down before this returns.
    pub async fn run<F>(
        mut self,
        link: Option<SyncLink>,
        mut commands: mpsc::Receiver<SessionCommand>,
        updates: mpsc::Sender<SessionEvent>,
        on_exit: F,
    ) where
        F: FnOnce() + Send,
    {
        let (mut channel, mut events) = match link {
            Some(link) => (Some(link.channel), Some(link.events)),
            None => (None, None),
        };
        self.channel_id = channel.as_ref().map(|c| c.id());
        self.live = channel.as_ref().map(|c| c.is_live()).unwrap_or(false);

        let period = self.config.poll_interval();
        let mut poll = interval_at(Instant::now() + period, period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tasks: JoinSet<Completion> = JoinSet::new();
        let mut exit_at: Option<Instant> = None;
        let mut on_exit = Some(on_exit);

        let mut open = updates.send(self.update(Instant::now())).await.is_ok();
        self.arm_exit(&mut exit_at, on_exit.is_some());

        while open {
            let was_live = self.live;
            let mut changed = false;

            tokio::select! {
                event = next_event(&mut events) => match event {
                    Some(event) => match self.apply_channel_event(event) {
                        Applied::Changed => changed = true,
                        Applied::Refetch => self.spawn_refresh(&mut tasks),
                        Applied::Ignored => {}
                    },
                    None => {
                        // Channel task is gone for good; rely on polling.
                        events = None;
                        self.live = false;
                    }
                },
                _ = poll.tick(), if self.should_poll() => {
                    debug!(match_id = self.match_id, "polling while push channel is down");
                    self.spawn_refresh(&mut tasks);
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => match joined {
                    Ok(Completion::Refreshed(Ok(snapshot))) => changed = self.apply_snapshot(snapshot),
                    Ok(Completion::Refreshed(Err(err))) => {
                        warn!(match_id = self.match_id, error = %err, "match re-fetch failed");
                        // A broken pipe heals on the next poll; a refusal is news.
                        if !err.is_transport() {
                            open = updates.send(SessionEvent::Notice(err.user_message())).await.is_ok();
                        }
                    }
                    Ok(Completion::Dispatched(outcome)) => {
                        debug!(
                            match_id = self.match_id,
                            action = outcome.action.label(),
                            rejected = outcome.error.is_some(),
                            "dispatch settled"
                        );
                        if let Some(message) = outcome.error {
                            open = updates.send(SessionEvent::Notice(message)).await.is_ok();
                        }
                        if let Some(snapshot) = outcome.snapshot {
                            self.apply_snapshot(snapshot);
                        }
                        changed = true;
                    }
                    Err(join_err) => warn!("background request failed: {join_err}"),
                },
                _ = wait_until(self.transients.next_expiry()) => {
                    changed = self.transients.clear_expired(Instant::now());
                }
                _ = wait_until(exit_at) => {
                    if let Some(callback) = on_exit.take() {
                        info!(match_id = self.match_id, "leaving finished match");
                        callback();
                    }
                    let _ = updates.send(SessionEvent::Exit(self.outcome())).await;
                    break;
                }
                command = commands.recv() => match command {
                    Some(SessionCommand::Click(click)) => {
                        if let Some(action) = self.click(click, Instant::now()) {
                            self.spawn_dispatch(&mut tasks, action);
                        }
                        changed = true;
                    }
                    Some(SessionCommand::EndTurn) => {
                        if let Some(action) = self.end_turn() {
                            self.spawn_dispatch(&mut tasks, action);
                            changed = true;
                        }
                    }
                    Some(SessionCommand::DismissOverlay) => changed = self.dismiss_overlay(),
                    Some(SessionCommand::Refresh) => self.spawn_refresh(&mut tasks),
                    Some(SessionCommand::Exit) | None => break,
                },
            }

            // Poll cadence restarts from the moment the channel drops.
            if was_live && !self.live {
                poll.reset();
            }
            self.arm_exit(&mut exit_at, on_exit.is_some());
            if changed && open {
                open = updates.send(self.update(Instant::now())).await.is_ok();
            }
        }

        tasks.abort_all();
        if let Some(channel) = channel.as_mut() {
            channel.shutdown().await;
        }
        debug!(match_id = self.match_id, "match view closed");
    }

    fn arm_exit(&self, exit_at: &mut Option<Instant>, pending: bool) {
        if pending && exit_at.is_none() && self.snapshot.status == MatchStatus::Finished {
            *exit_at = Some(Instant::now() + self.config.exit_delay());
        }
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<ChannelEvent>>) -> Option<ChannelEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

// --- TESTS ---
