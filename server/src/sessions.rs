use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::chat::{ChannelId, ChatEvent, MessageHandle, MessageSink};
use crate::config::GameConfig;
use crate::game_logic::grid::{
    self, EMPTY_SECTION_PLACEHOLDER, GridFrame, GridView, SECTION_PLACEHOLDER, fenced,
};
use crate::game_logic::{GameError, GridDisplay, GuessOutcome, SessionState, normalize};

const SESSION_BUFFER_SIZE: usize = 32;
const REJECT_EMOJI: &str = "❌";

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub channel: ChannelId,
    pub guessed: usize,
    pub total: usize,
    pub time_left_secs: u64,
    pub running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    Starting,
    Active,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Deadline,
    Completed,
}

#[derive(Debug)]
pub enum SessionManagerMessage {
    StartSession {
        channel: ChannelId,
        respond_to: oneshot::Sender<Result<SessionHandle, GameError>>,
    },
    GetSession {
        channel: ChannelId,
        respond_to: oneshot::Sender<Option<SessionHandle>>,
    },
    ListSessions {
        respond_to: oneshot::Sender<Vec<ChannelId>>,
    },
    SessionEnded {
        channel: ChannelId,
        session_id: Uuid,
        respond_to: oneshot::Sender<()>,
    },
}

/// Owns the channel → session map. Being the only writer of that map is what
/// keeps a channel to one session at a time.
pub struct SessionManagerActor {
    receiver: mpsc::Receiver<SessionManagerMessage>,
    sessions: HashMap<ChannelId, SessionHandle>,
    self_sender: mpsc::Sender<SessionManagerMessage>,
    catalog: Arc<Catalog>,
    sink: Arc<dyn MessageSink>,
    game_config: GameConfig,
}

impl SessionManagerActor {
    fn new(
        receiver: mpsc::Receiver<SessionManagerMessage>,
        self_sender: mpsc::Sender<SessionManagerMessage>,
        catalog: Arc<Catalog>,
        sink: Arc<dyn MessageSink>,
        game_config: GameConfig,
    ) -> Self {
        SessionManagerActor {
            receiver,
            sessions: HashMap::new(),
            self_sender,
            catalog,
            sink,
            game_config,
        }
    }

    #[tracing::instrument(skip(self, msg), fields(
        msg_type = %std::any::type_name_of_val(&msg)
    ))]
    async fn handle_message(&mut self, msg: SessionManagerMessage) {
        match msg {
            SessionManagerMessage::StartSession {
                channel,
                respond_to,
            } => {
                if self.sessions.contains_key(&channel) {
                    tracing::info!(
                        session.channel = %channel,
                        "Start rejected, a session is already active"
                    );
                    let _ = respond_to.send(Err(GameError::AlreadyActive(channel)));
                    return;
                }

                let session_id = Uuid::new_v4();
                let manager_handle = SessionManagerHandle {
                    sender: self.self_sender.clone(),
                };
                let handle = SessionHandle::spawn(
                    session_id,
                    channel.clone(),
                    SESSION_BUFFER_SIZE,
                    manager_handle,
                    Arc::clone(&self.catalog),
                    Arc::clone(&self.sink),
                    self.game_config.clone(),
                );
                self.sessions.insert(channel.clone(), handle.clone());

                tracing::info!(
                    session.channel = %channel,
                    session.id = %session_id,
                    sessions.active = self.sessions.len(),
                    "Session created"
                );
                let _ = respond_to.send(Ok(handle));
            }
            SessionManagerMessage::GetSession {
                channel,
                respond_to,
            } => {
                let _ = respond_to.send(self.sessions.get(&channel).cloned());
            }
            SessionManagerMessage::ListSessions { respond_to } => {
                let mut channels: Vec<ChannelId> = self.sessions.keys().cloned().collect();
                channels.sort();
                let _ = respond_to.send(channels);
            }
            SessionManagerMessage::SessionEnded {
                channel,
                session_id,
                respond_to,
            } => {
                let matches = self
                    .sessions
                    .get(&channel)
                    .is_some_and(|handle| handle.session_id == session_id);
                if matches {
                    self.sessions.remove(&channel);
                    tracing::info!(
                        session.channel = %channel,
                        session.id = %session_id,
                        "Session removed from registry"
                    );
                } else {
                    tracing::warn!(
                        session.channel = %channel,
                        session.id = %session_id,
                        "Received end notice for unknown session"
                    );
                }
                let _ = respond_to.send(());
            }
        }
    }
}

#[tracing::instrument(skip(actor))]
pub async fn run_session_manager_actor(mut actor: SessionManagerActor) {
    tracing::info!("SessionManager actor started");
    while let Some(msg) = actor.receiver.recv().await {
        actor.handle_message(msg).await;
    }
    tracing::info!("SessionManager actor stopped");
}

#[derive(Clone, Debug)]
pub struct SessionManagerHandle {
    sender: mpsc::Sender<SessionManagerMessage>,
}

impl SessionManagerHandle {
    pub fn spawn(
        buffer_size: usize,
        catalog: Arc<Catalog>,
        sink: Arc<dyn MessageSink>,
        game_config: GameConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor =
            SessionManagerActor::new(receiver, sender.clone(), catalog, sink, game_config);
        tokio::spawn(run_session_manager_actor(actor));
        Self { sender }
    }

    /// A handle whose registry has already shut down.
    #[cfg(test)]
    pub fn disconnected() -> Self {
        let (sender, _receiver) = mpsc::channel(1);
        Self { sender }
    }

    /// Reserves `channel` for a new session and starts it. Of two concurrent
    /// calls for one channel, the second sees [`GameError::AlreadyActive`].
    pub async fn start_session(&self, channel: ChannelId) -> Result<SessionHandle, GameError> {
        let (respond_to, rx) = oneshot::channel();
        self.sender
            .send(SessionManagerMessage::StartSession {
                channel,
                respond_to,
            })
            .await
            .map_err(|e| GameError::Unexpected(format!("Failed to send StartSession: {}", e)))?;
        rx.await
            .map_err(|e| GameError::Unexpected(format!("SessionManager no response: {}", e)))?
    }

    pub async fn get_session(&self, channel: ChannelId) -> Option<SessionHandle> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(SessionManagerMessage::GetSession {
                channel,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return None;
        }
        rx.await.ok().flatten()
    }

    pub async fn is_active(&self, channel: ChannelId) -> bool {
        self.get_session(channel).await.is_some()
    }

    pub async fn active_channels(&self) -> Vec<ChannelId> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(SessionManagerMessage::ListSessions { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Removes a finished session. Resolves once the registry has applied it.
    pub async fn session_ended(&self, channel: ChannelId, session_id: Uuid) -> Result<(), String> {
        let (respond_to, rx) = oneshot::channel();
        self.sender
            .send(SessionManagerMessage::SessionEnded {
                channel,
                session_id,
                respond_to,
            })
            .await
            .map_err(|e| format!("Failed to send SessionEnded: {}", e))?;
        rx.await
            .map_err(|e| format!("SessionManager no response: {}", e))
    }
}

#[derive(Debug)]
pub enum SessionMessage {
    Guess(ChatEvent),
    Snapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
}

/// One game in one channel. Owns its [`SessionState`]; guesses and refresh
/// ticks are applied one at a time from the same loop.
pub struct SessionActor {
    receiver: mpsc::Receiver<SessionMessage>,
    session_id: Uuid,
    channel: ChannelId,
    manager_handle: SessionManagerHandle,
    catalog: Arc<Catalog>,
    sink: Arc<dyn MessageSink>,
    config: GameConfig,
    phase_tx: watch::Sender<SessionPhase>,
}

fn describe_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match (secs / 60, secs % 60) {
        (1, 0) => "1 minute".to_string(),
        (minutes, 0) => format!("{} minutes", minutes),
        _ => format!("{} seconds", secs),
    }
}

impl SessionActor {
    fn section_count(&self) -> usize {
        self.config.grid_sections
    }

    /// Fenced section text, or the placeholder when it would not fit.
    fn section_text(&self, section_index: usize, section: &str, placeholder: &str) -> String {
        let text = fenced(section);
        match grid::check_fits(section_index, &text, self.sink.max_message_len()) {
            Ok(()) => text,
            Err(e) => {
                tracing::warn!(
                    session.channel = %self.channel,
                    error = %e,
                    "Grid section too large, using placeholder"
                );
                fenced(placeholder)
            }
        }
    }

    /// Sends the empty board and builds the session state around it.
    async fn open_display(&self) -> Result<SessionState, GameError> {
        let duration = self.config.duration();
        let empty = GridFrame::render(
            &self.catalog,
            &BTreeMap::new(),
            GridView::Playing {
                time_left: duration,
            },
            self.section_count(),
        );

        let header = self.sink.send(&self.channel, &fenced(&empty.header)).await?;
        let mut sent = vec![header.clone()];

        let mut sections = Vec::with_capacity(empty.sections.len());
        for (idx, section) in empty.sections.iter().enumerate() {
            let text = self.section_text(idx, section, EMPTY_SECTION_PLACEHOLDER);
            let handle = match self.sink.send(&self.channel, &text).await {
                Ok(handle) => handle,
                Err(e) => {
                    tracing::warn!(
                        session.channel = %self.channel,
                        grid.section = idx,
                        error = %e,
                        "Failed to send grid section, sending placeholder"
                    );
                    match self
                        .sink
                        .send(&self.channel, &fenced(EMPTY_SECTION_PLACEHOLDER))
                        .await
                    {
                        Ok(handle) => handle,
                        Err(e) => {
                            self.discard(&sent).await;
                            return Err(e.into());
                        }
                    }
                }
            };
            sent.push(handle.clone());
            sections.push(handle);
        }

        Ok(SessionState::new(
            Arc::clone(&self.catalog),
            duration,
            GridDisplay { header, sections },
        ))
    }

    async fn discard(&self, messages: &[MessageHandle]) {
        for message in messages {
            if let Err(e) = self.sink.delete(message).await {
                tracing::debug!(error = %e, "Could not remove partial board message");
            }
        }
    }

    async fn announce(&self, text: &str) {
        if let Err(e) = self.sink.send(&self.channel, text).await {
            tracing::warn!(
                session.channel = %self.channel,
                error = %e,
                "Failed to send announcement"
            );
        }
    }

    async fn push_header(&self, display: &GridDisplay, header: &str) -> bool {
        match self.sink.edit(&display.header, &fenced(header)).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    session.channel = %self.channel,
                    error = %e,
                    "Failed to update grid header"
                );
                false
            }
        }
    }

    /// Edits one section. A failed edit is replaced by the placeholder for
    /// that section only.
    async fn push_section(&self, display: &GridDisplay, section_index: usize, section: &str) -> bool {
        let Some(handle) = display.sections.get(section_index) else {
            return false;
        };
        let text = self.section_text(section_index, section, SECTION_PLACEHOLDER);
        match self.sink.edit(handle, &text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    session.channel = %self.channel,
                    grid.section = section_index,
                    error = %e,
                    "Failed to update grid section, pushing placeholder"
                );
                if let Err(e) = self.sink.edit(handle, &fenced(SECTION_PLACEHOLDER)).await {
                    tracing::warn!(
                        session.channel = %self.channel,
                        grid.section = section_index,
                        error = %e,
                        "Placeholder update failed too"
                    );
                }
                false
            }
        }
    }

    /// Pushes a whole frame and returns how many updates failed.
    async fn push_frame(&self, display: &GridDisplay, frame: &GridFrame) -> usize {
        let mut failed = usize::from(!self.push_header(display, &frame.header).await);
        for (idx, section) in frame.sections.iter().enumerate() {
            if !self.push_section(display, idx, section).await {
                failed += 1;
            }
        }
        failed
    }

    fn spawn_rejection(&self, message: MessageHandle) {
        let sink = Arc::clone(&self.sink);
        let delay = self.config.reject_delete_delay();
        tokio::spawn(async move {
            if let Err(e) = sink.react(&message, REJECT_EMOJI).await {
                tracing::debug!(error = %e, "Could not react to rejected guess");
            }
            tokio::time::sleep(delay).await;
            if let Err(e) = sink.delete(&message).await {
                tracing::debug!(error = %e, "Could not delete rejected guess");
            }
        });
    }

    /// Returns `true` once the session has ended.
    async fn handle_message(&mut self, state: &mut SessionState, msg: SessionMessage) -> bool {
        match msg {
            SessionMessage::Guess(event) => self.handle_guess(state, event).await,
            SessionMessage::Snapshot { respond_to } => {
                let _ = respond_to.send(SessionSnapshot {
                    session_id: self.session_id,
                    channel: self.channel.clone(),
                    guessed: state.guessed().len(),
                    total: state.total(),
                    time_left_secs: state.time_left(Instant::now()).as_secs(),
                    running: state.is_running(),
                });
                false
            }
        }
    }

    async fn handle_guess(&mut self, state: &mut SessionState, event: ChatEvent) -> bool {
        // Blank guesses (emoji, punctuation) are not worth a reaction.
        if normalize(&event.text).is_empty() {
            return false;
        }

        match state.evaluate(&event.text) {
            GuessOutcome::Matched { position, name } => {
                tracing::info!(
                    session.channel = %self.channel,
                    guess.author = %event.author,
                    guess.position = position,
                    guess.name = %name,
                    guessed = state.guessed().len(),
                    "Correct guess"
                );
                if let Some(delta) =
                    state.render_delta(self.section_count(), position, Instant::now())
                {
                    self.push_header(state.display(), &delta.header).await;
                    self.push_section(state.display(), delta.section_index, &delta.section)
                        .await;
                }
                if let Err(e) = self.sink.delete(&event.message).await {
                    tracing::debug!(error = %e, "Could not delete correct guess");
                }

                if state.is_complete() {
                    self.finish(state, EndReason::Completed).await;
                    return true;
                }
                false
            }
            GuessOutcome::NoMatch => {
                tracing::debug!(
                    session.channel = %self.channel,
                    guess.author = %event.author,
                    guess.text = %event.text,
                    "Incorrect guess"
                );
                self.spawn_rejection(event.message);
                false
            }
            GuessOutcome::NotRunning => false,
        }
    }

    /// One refresh tick. Returns `true` once the session has ended.
    async fn on_tick(&mut self, state: &mut SessionState) -> bool {
        let now = Instant::now();
        if state.is_expired(now) {
            tracing::info!(session.channel = %self.channel, "Time's up");
            self.finish(state, EndReason::Deadline).await;
            return true;
        }

        let frame = state.render_playing(self.section_count(), now);
        let failed = self.push_frame(state.display(), &frame).await;
        if failed == frame.sections.len() + 1 {
            tracing::warn!(
                session.channel = %self.channel,
                "Every display update failed this tick"
            );
        } else {
            tracing::trace!(
                session.channel = %self.channel,
                guessed = state.guessed().len(),
                failed,
                "Grid refreshed"
            );
        }
        false
    }

    /// The terminal transition. Only the first call does anything.
    async fn finish(&mut self, state: &mut SessionState, reason: EndReason) {
        if !state.stop() {
            tracing::debug!(session.channel = %self.channel, "Session already finished");
            return;
        }
        let guessed = state.guessed().len();
        let total = state.total();
        tracing::info!(
            session.channel = %self.channel,
            session.id = %self.session_id,
            end.reason = ?reason,
            guessed,
            total,
            "Ending session"
        );

        let frame = state.render_final(self.section_count());
        let failed = self.push_frame(state.display(), &frame).await;
        if failed > 0 {
            tracing::warn!(
                session.channel = %self.channel,
                failed,
                "Final board was only partially displayed"
            );
        }

        let announcement = match reason {
            EndReason::Deadline => {
                format!("Time's up! You guessed {guessed}/{total} Pokémon!")
            }
            EndReason::Completed => {
                format!("Congratulations! You've named all {total} original Pokémon!")
            }
        };
        self.announce(&announcement).await;
        self.release().await;
    }

    async fn release(&self) {
        if let Err(e) = self
            .manager_handle
            .session_ended(self.channel.clone(), self.session_id)
            .await
        {
            tracing::error!(
                session.channel = %self.channel,
                error = %e,
                "Failed to remove session from registry"
            );
        }
        self.phase_tx.send_replace(SessionPhase::Ended);
    }
}

#[tracing::instrument(skip(actor), fields(
    session.id = %actor.session_id,
    session.channel = %actor.channel
))]
pub async fn run_session_actor(mut actor: SessionActor) {
    tracing::info!("Session actor started");

    let mut state = match actor.open_display().await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to set up the game board");
            actor
                .announce("An error occurred while starting the game.")
                .await;
            actor.release().await;
            return;
        }
    };

    actor
        .announce(&format!(
            "Pokémon Quiz Game has started! You have {} to name all {} original Pokémon!",
            describe_duration(actor.config.duration()),
            state.total()
        ))
        .await;
    actor.phase_tx.send_replace(SessionPhase::Active);

    let tick = actor.config.tick_interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe_msg = actor.receiver.recv() => {
                match maybe_msg {
                    Some(msg) => {
                        if actor.handle_message(&mut state, msg).await {
                            break;
                        }
                    }
                    None => {
                        tracing::warn!("Session channel closed before the game ended");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                if actor.on_tick(&mut state).await {
                    break;
                }
            }
        }
    }

    tracing::info!("Session actor stopped");
}

#[derive(Clone, Debug)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionMessage>,
    pub session_id: Uuid,
    pub channel: ChannelId,
    phase: watch::Receiver<SessionPhase>,
}

impl SessionHandle {
    pub fn spawn(
        session_id: Uuid,
        channel: ChannelId,
        buffer_size: usize,
        manager_handle: SessionManagerHandle,
        catalog: Arc<Catalog>,
        sink: Arc<dyn MessageSink>,
        config: GameConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let (phase_tx, phase_rx) = watch::channel(SessionPhase::Starting);
        let actor = SessionActor {
            receiver,
            session_id,
            channel: channel.clone(),
            manager_handle,
            catalog,
            sink,
            config,
            phase_tx,
        };
        tokio::spawn(run_session_actor(actor));
        Self {
            sender,
            session_id,
            channel,
            phase: phase_rx,
        }
    }

    pub async fn submit_guess(&self, event: ChatEvent) -> Result<(), GameError> {
        self.sender
            .send(SessionMessage::Guess(event))
            .await
            .map_err(|_| GameError::NoActiveSession(self.channel.clone()))
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, GameError> {
        let (respond_to, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::Snapshot { respond_to })
            .await
            .map_err(|_| GameError::NoActiveSession(self.channel.clone()))?;
        rx.await
            .map_err(|_| GameError::NoActiveSession(self.channel.clone()))
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    pub async fn wait_until_ended(&self) {
        let mut phase = self.phase.clone();
        let _ = phase.wait_for(|p| *p == SessionPhase::Ended).await;
    }
}
