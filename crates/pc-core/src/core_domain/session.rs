use std::sync::Arc;

use crate::core::{
    extract_pairs, render, BatchProgress, DatasetSink, GenerationGroup, Notice, Phase,
    ProgressObserver, ResponseGenerator, ResponseLimits, SessionError, SessionSnapshot,
    SessionStore, SystemPromptSource, ViewModel,
};

// ---------------------------------------------------------------------------
// SessionPorts — collaborators of the annotation session
// ---------------------------------------------------------------------------

pub struct SessionPorts {
    pub generator: Arc<dyn ResponseGenerator>,
    pub prompts: Arc<dyn SystemPromptSource>,
    pub store: Arc<dyn SessionStore>,
    pub dataset: Arc<dyn DatasetSink>,
    pub progress: Arc<dyn ProgressObserver>,
}

// ---------------------------------------------------------------------------
// AnnotationSession — the round state machine
// ---------------------------------------------------------------------------

/// Owns the generation queue, the review cursor and the pairs collected so
/// far. `None` state is the setup phase; a snapshot whose cursor has reached
/// the end of the queue is a complete round.
///
/// Every transition that changes state persists the full snapshot before
/// returning. Persistence failures never roll back memory; they come back as
/// error notices.
pub struct AnnotationSession {
    ports: SessionPorts,
    limits: ResponseLimits,
    state: Option<SessionSnapshot>,
}

impl AnnotationSession {
    pub fn new(ports: SessionPorts, limits: ResponseLimits) -> Self {
        Self {
            ports,
            limits,
            state: None,
        }
    }

    pub fn limits(&self) -> ResponseLimits {
        self.limits
    }

    pub fn phase(&self) -> Phase {
        match &self.state {
            None => Phase::Empty,
            Some(snapshot) if snapshot.is_complete() => Phase::Complete,
            Some(_) => Phase::Reviewing,
        }
    }

    pub fn snapshot(&self) -> Option<&SessionSnapshot> {
        self.state.as_ref()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.cursor)
    }

    pub fn view(&self) -> ViewModel {
        render(self.state.as_ref())
    }

    /// Generates a fresh queue with `n` responses per system prompt.
    ///
    /// Input and prompt-source problems are reported before anything is
    /// discarded, so a rejected call leaves both memory and disk untouched.
    pub async fn start_batch(
        &mut self,
        user_prompt: &str,
        n: usize,
    ) -> Result<Vec<Notice>, SessionError> {
        if user_prompt.trim().is_empty() {
            return Err(SessionError::EmptyUserPrompt);
        }
        if n == 0 || n > self.limits.max {
            return Err(SessionError::InvalidResponseCount {
                requested: n,
                max: self.limits.max,
            });
        }
        let system_prompts = self.ports.prompts.load()?;
        if system_prompts.is_empty() {
            return Err(SessionError::NoSystemPrompts);
        }
        tracing::info!(
            system_prompts = system_prompts.len(),
            responses_per_prompt = n,
            "starting generation batch"
        );

        let mut notices = Vec::new();
        self.state = None;
        self.clear_store(&mut notices);

        let total = system_prompts.len();
        let mut queue = Vec::with_capacity(total);
        for (i, system) in system_prompts.into_iter().enumerate() {
            self.ports.progress.on_progress(BatchProgress {
                completed: i,
                total,
            });
            tracing::info!(group = i + 1, total, "generating response group");
            let responses = self.ports.generator.generate(&system, user_prompt, n).await;
            queue.push(GenerationGroup {
                system,
                user: user_prompt.to_owned(),
                responses,
            });
        }
        self.ports.progress.on_progress(BatchProgress {
            completed: total,
            total,
        });

        self.state = Some(SessionSnapshot::new(queue));
        self.persist(&mut notices);
        notices.push(Notice::info(format!(
            "Generated {total} groups of {n} responses."
        )));
        Ok(notices)
    }

    /// Restores the persisted session, if any. Never fails: a missing or
    /// unreadable session file leaves the current state as it is.
    pub fn resume(&mut self) -> Vec<Notice> {
        match self.ports.store.load() {
            Ok(None) => {
                tracing::warn!("no resumable session found");
                vec![Notice::warning("No resumable session file found.")]
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to load session");
                vec![Notice::error(format!("Failed to load session: {err}"))]
            }
            Ok(Some(mut snapshot)) => {
                let mut notices = Vec::new();
                if snapshot.cursor > snapshot.queue.len() {
                    tracing::warn!(
                        cursor = snapshot.cursor,
                        queue_len = snapshot.queue.len(),
                        "session cursor beyond queue, clamping"
                    );
                    snapshot.cursor = snapshot.queue.len();
                    notices.push(Notice::warning(
                        "Session cursor was past the end of the queue; treating the round as complete.",
                    ));
                }
                tracing::info!(
                    cursor = snapshot.cursor,
                    queue_len = snapshot.queue.len(),
                    pairs = snapshot.dataset.len(),
                    "session restored"
                );
                self.state = Some(snapshot);
                notices.push(Notice::info("Restored the previous session."));
                notices
            }
        }
    }

    /// Replaces the responses of the group under review with a new sample of
    /// the same size.
    pub async fn regenerate_current(&mut self) -> Result<Vec<Notice>, SessionError> {
        let (cursor, system, user, n) = {
            let snapshot = self.state.as_ref().ok_or(SessionError::NoActiveRound)?;
            let group = snapshot
                .current_group()
                .ok_or(SessionError::RoundComplete)?;
            (
                snapshot.cursor,
                group.system.clone(),
                group.user.clone(),
                group.responses.len(),
            )
        };

        let responses = self.ports.generator.generate(&system, &user, n).await;

        let mut notices = Vec::new();
        if let Some(group) = self
            .state
            .as_mut()
            .and_then(|snapshot| snapshot.queue.get_mut(cursor))
        {
            group.responses = responses;
        }
        self.persist(&mut notices);
        tracing::info!(cursor, "regenerated response group");
        notices.push(Notice::info(format!("Regenerated group {}.", cursor + 1)));
        Ok(notices)
    }

    /// Records the operator's decision for the group under review and moves
    /// to the next one.
    ///
    /// `edited` are the response texts as displayed (possibly modified);
    /// `flags` mark the responses selected as best. Without at least one
    /// selected and one unselected response the group counts as skipped.
    pub fn confirm_or_skip(
        &mut self,
        edited: &[String],
        flags: &[bool],
    ) -> Result<Vec<Notice>, SessionError> {
        let snapshot = self.state.as_mut().ok_or(SessionError::NoActiveRound)?;
        let group = snapshot
            .current_group()
            .ok_or(SessionError::RoundComplete)?;

        let pairs = extract_pairs(group, edited, flags);
        let position = snapshot.cursor + 1;
        let mut notices = Vec::new();

        if pairs.is_empty() {
            tracing::info!(group = position, "group skipped");
            notices.push(Notice::info(format!("Skipped group {position}.")));
        } else {
            match self.ports.dataset.append(&pairs) {
                Ok(written) => {
                    tracing::info!(group = position, pairs = written, "appended preference pairs");
                    notices.push(Notice::info(format!("Saved {written} new records.")));
                }
                Err(err) => {
                    tracing::error!(error = %err, group = position, "failed to append dataset");
                    notices.push(Notice::error(format!("Failed to append dataset: {err}")));
                }
            }
            snapshot.dataset.extend(pairs);
        }

        snapshot.cursor += 1;
        if snapshot.is_complete() {
            tracing::info!(
                groups = snapshot.queue.len(),
                pairs = snapshot.dataset.len(),
                "annotation round complete"
            );
        }
        self.persist(&mut notices);
        Ok(notices)
    }

    pub fn skip(&mut self) -> Result<Vec<Notice>, SessionError> {
        self.confirm_or_skip(&[], &[])
    }

    /// Drops the round and its persisted snapshot. The dataset file is kept.
    pub fn start_new_round(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        self.state = None;
        self.clear_store(&mut notices);
        tracing::info!("ready for a new annotation round");
        notices.push(Notice::info("Ready for a new annotation round."));
        notices
    }

    fn persist(&self, notices: &mut Vec<Notice>) {
        let Some(snapshot) = self.state.as_ref() else {
            return;
        };
        match self.ports.store.save(snapshot) {
            Ok(()) => tracing::debug!(cursor = snapshot.cursor, "session saved"),
            Err(err) => {
                tracing::error!(error = %err, "failed to save session");
                notices.push(Notice::error(format!("Failed to save session: {err}")));
            }
        }
    }

    fn clear_store(&self, notices: &mut Vec<Notice>) {
        if let Err(err) = self.ports.store.clear() {
            tracing::error!(error = %err, "failed to clear session");
            notices.push(Notice::error(format!("Failed to clear session: {err}")));
        }
    }
}
