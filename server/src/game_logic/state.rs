use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::grid::{self, GridFrame, GridView};
use super::normalize::normalize;
use crate::catalog::{Catalog, Position};
use crate::chat::MessageHandle;

/// The externally owned messages a session edits in place.
#[derive(Debug, Clone, PartialEq)]
pub struct GridDisplay {
    pub header: MessageHandle,
    pub sections: Vec<MessageHandle>,
}

/// The part of the board a single correct guess changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayDelta {
    pub header: String,
    pub section_index: usize,
    pub section: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    NoMatch,
    Matched { position: Position, name: String },
    /// The session already went through its terminal transition.
    NotRunning,
}

/// One channel's game in progress.
///
/// `remaining` and `guessed` always partition the catalog; [`evaluate`] is
/// the only way an entry moves between them.
///
/// [`evaluate`]: SessionState::evaluate
#[derive(Debug)]
pub struct SessionState {
    catalog: Arc<Catalog>,
    remaining: BTreeMap<Position, String>,
    guessed: BTreeMap<Position, String>,
    started_at: Instant,
    ends_at: Instant,
    running: bool,
    display: GridDisplay,
}

impl SessionState {
    pub fn new(catalog: Arc<Catalog>, duration: Duration, display: GridDisplay) -> Self {
        let remaining = catalog
            .entries()
            .iter()
            .map(|entry| (entry.position, entry.name.clone()))
            .collect();
        let started_at = Instant::now();
        Self {
            catalog,
            remaining,
            guessed: BTreeMap::new(),
            started_at,
            ends_at: started_at + duration,
            running: true,
            display,
        }
    }

    pub fn evaluate(&mut self, raw_text: &str) -> GuessOutcome {
        if !self.running {
            return GuessOutcome::NotRunning;
        }
        let guess = normalize(raw_text);
        if guess.is_empty() {
            return GuessOutcome::NoMatch;
        }

        let matched = self.remaining.keys().copied().find(|position| {
            self.catalog
                .get(*position)
                .is_some_and(|entry| entry.key() == guess)
        });

        match matched.and_then(|position| self.remaining.remove_entry(&position)) {
            Some((position, name)) => {
                self.guessed.insert(position, name.clone());
                GuessOutcome::Matched { position, name }
            }
            None => GuessOutcome::NoMatch,
        }
    }

    /// Clears the running flag. Returns `true` only for the call that
    /// actually stopped the session.
    pub fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_complete(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn total(&self) -> usize {
        self.catalog.len()
    }

    pub fn guessed(&self) -> &BTreeMap<Position, String> {
        &self.guessed
    }

    pub fn remaining(&self) -> &BTreeMap<Position, String> {
        &self.remaining
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn ends_at(&self) -> Instant {
        self.ends_at
    }

    pub fn time_left(&self, now: Instant) -> Duration {
        self.ends_at.saturating_duration_since(now)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.ends_at
    }

    pub fn display(&self) -> &GridDisplay {
        &self.display
    }

    pub fn render_playing(&self, section_count: usize, now: Instant) -> GridFrame {
        GridFrame::render(
            &self.catalog,
            &self.guessed,
            GridView::Playing {
                time_left: self.time_left(now),
            },
            section_count,
        )
    }

    /// Renders the header and only the section holding `position`.
    pub fn render_delta(
        &self,
        section_count: usize,
        position: Position,
        now: Instant,
    ) -> Option<DisplayDelta> {
        let total = self.catalog.len();
        let section_index = grid::section_index(total, section_count, position)?;
        let range = grid::section_ranges(total, section_count)
            .into_iter()
            .nth(section_index)?;
        Some(DisplayDelta {
            header: grid::render_header(
                self.guessed.len(),
                total,
                GridView::Playing {
                    time_left: self.time_left(now),
                },
            ),
            section_index,
            section: grid::render_section(&self.catalog, range, &self.guessed, None),
        })
    }

    pub fn render_final(&self, section_count: usize) -> GridFrame {
        GridFrame::render(
            &self.catalog,
            &self.guessed,
            GridView::Final {
                missed: &self.remaining,
            },
            section_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChannelId;
    use uuid::Uuid;

    const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);

    fn display(sections: usize) -> GridDisplay {
        let channel = ChannelId::new("test");
        GridDisplay {
            header: MessageHandle::new(channel.clone(), Uuid::new_v4()),
            sections: (0..sections)
                .map(|_| MessageHandle::new(channel.clone(), Uuid::new_v4()))
                .collect(),
        }
    }

    fn new_state() -> SessionState {
        SessionState::new(
            Arc::new(Catalog::original_151().unwrap()),
            FIFTEEN_MINUTES,
            display(4),
        )
    }

    fn assert_partition(state: &SessionState) {
        for position in 1..=151u16 {
            let in_remaining = state.remaining().contains_key(&position);
            let in_guessed = state.guessed().contains_key(&position);
            assert!(
                in_remaining ^ in_guessed,
                "position {position} must be in exactly one map"
            );
        }
        assert_eq!(state.remaining().len() + state.guessed().len(), 151);
    }

    #[test]
    fn starts_with_the_full_pool() {
        let state = new_state();
        assert_eq!(state.remaining().len(), 151);
        assert!(state.guessed().is_empty());
        assert!(state.is_running());
        assert_eq!(state.ends_at() - state.started_at(), FIFTEEN_MINUTES);
        assert_partition(&state);
    }

    #[test]
    fn pikachu_is_guessed_once() {
        let mut state = new_state();

        assert_eq!(
            state.evaluate("PIKACHU"),
            GuessOutcome::Matched {
                position: 25,
                name: "Pikachu".to_string()
            }
        );
        assert_eq!(state.guessed().len(), 1);
        assert!(!state.remaining().contains_key(&25));
        assert_partition(&state);

        let frame = state.render_playing(4, state.started_at());
        assert!(frame.header.starts_with("1/151  |  15:00"));

        assert_eq!(state.evaluate("pikachu"), GuessOutcome::NoMatch);
        assert_eq!(state.evaluate("Pika-chu!!"), GuessOutcome::NoMatch);
        assert_eq!(state.guessed().len(), 1);
        assert_partition(&state);
    }

    #[test]
    fn unknown_and_empty_guesses_leave_state_untouched() {
        let mut state = new_state();
        for guess in ["qzxportmanteau", "", "   ", "1234", "!!!"] {
            assert_eq!(state.evaluate(guess), GuessOutcome::NoMatch, "{guess:?}");
        }
        assert_eq!(state.remaining().len(), 151);
        assert!(state.guessed().is_empty());
    }

    #[test]
    fn punctuated_names_match_loosely() {
        let mut state = new_state();
        assert!(matches!(
            state.evaluate("mr mime"),
            GuessOutcome::Matched { position: 122, .. }
        ));
        assert!(matches!(
            state.evaluate("FARFETCHD"),
            GuessOutcome::Matched { position: 83, .. }
        ));
        assert!(matches!(
            state.evaluate("nidoran f"),
            GuessOutcome::Matched { position: 29, .. }
        ));
        assert_eq!(state.evaluate("nidoran"), GuessOutcome::NoMatch);
    }

    #[test]
    fn guessing_everything_completes_and_keeps_the_partition() {
        let mut state = new_state();
        let names: Vec<String> = crate::catalog::ORIGINAL_151
            .iter()
            .rev()
            .map(|n| n.to_string())
            .collect();
        for name in &names {
            assert!(matches!(state.evaluate(name), GuessOutcome::Matched { .. }));
            assert_partition(&state);
        }
        assert!(state.is_complete());
        assert_eq!(state.guessed().len(), 151);
        for name in &names {
            assert_eq!(state.evaluate(name), GuessOutcome::NoMatch);
        }
    }

    #[test]
    fn stop_is_one_shot_and_freezes_the_state() {
        let mut state = new_state();
        assert!(state.stop());
        assert!(!state.stop());
        assert_eq!(state.evaluate("Mew"), GuessOutcome::NotRunning);
        assert_eq!(state.remaining().len(), 151);
    }

    #[test]
    fn final_frame_reveals_what_is_left() {
        let mut state = new_state();
        state.evaluate("Bulbasaur");
        let frame = state.render_final(4);
        assert!(frame.header.starts_with("1/151  |  Time's up!"));
        assert!(frame.sections[0].contains("  1.Bulbasaur"));
        assert!(frame.sections[0].contains("* 2.Ivysaur"));
    }

    #[test]
    fn delta_matches_the_full_frame() {
        let mut state = new_state();
        state.evaluate("Snorlax");
        let now = state.started_at();
        let delta = state.render_delta(4, 143, now).unwrap();
        let frame = state.render_playing(4, now);

        assert_eq!(delta.section_index, 3);
        assert_eq!(delta.header, frame.header);
        assert_eq!(delta.section, frame.sections[3]);
        assert!(delta.section.contains("143.Snorlax"));
        assert!(state.render_delta(4, 0, now).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn time_left_counts_down_to_zero() {
        let state = new_state();
        assert_eq!(state.time_left(Instant::now()), FIFTEEN_MINUTES);
        assert!(!state.is_expired(Instant::now()));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(state.time_left(Instant::now()), Duration::from_secs(14 * 60));

        tokio::time::advance(FIFTEEN_MINUTES).await;
        assert_eq!(state.time_left(Instant::now()), Duration::ZERO);
        assert!(state.is_expired(Instant::now()));
    }
}
