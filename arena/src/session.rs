//! Session state machine: sequences one debate from setup to archive.
//!
//! Phases run `Setup → Opening → MainLoop → Closing → Ended`; an external
//! stop can interrupt from any phase. The runner suspends only for
//! think-time delays and generation calls, and checks the cancellation
//! token immediately on every resume, discarding in-flight results once the
//! session is gone.
//!
//! Failure contract: metadata and closing-summary generation absorb
//! failures with documented fallbacks; a generation failure during Opening
//! or MainLoop aborts the whole session with a single `error` event,
//! because a missing turn would corrupt the round-robin contract.

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::archive::{ArchivedDebate, SharedRegistry};
use crate::config::{DebateSettings, DEFAULT_DEBATER_COUNT};
use crate::events::ArenaEvent;
use crate::generate::{
    parse_json_payload, Generate, MetaPayload, SummaryPayload,
};
use crate::history::{HistoryEntry, HistoryError, HistoryWindow, TurnPhase, PROMPT_SUFFIX_LEN};
use crate::history::render_transcript;
use crate::prompt;
use crate::roster::{Participant, RosterBuilder};
use crate::scheduler::{self, Speaker, TurnScheduler};

/// Neutral fallback when the closing synthesis fails.
const FALLBACK_SUMMARY: &str =
    "The debate concluded with passionate arguments from both sides.";

/// Phase of a debate session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Armed but idle; no debate started yet.
    Idle,
    /// Building metadata, roster, and stances.
    Setup,
    /// One opening statement per debater.
    Opening,
    /// Round-robin debate with arbiter interjections.
    MainLoop,
    /// Summary synthesis and archival.
    Closing,
    /// Ran to completion.
    Ended,
    /// Externally stopped or aborted.
    Stopped,
}

impl SessionPhase {
    /// Whether observer input is accepted in this phase.
    pub fn accepts_observers(self) -> bool {
        matches!(self, Self::Opening | Self::MainLoop)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Stopped)
    }

    /// Human label for `phase_progress` events.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Waiting for a topic",
            Self::Setup => "Setting up the debate",
            Self::Opening => "Opening statements",
            Self::MainLoop => "Debate in progress",
            Self::Closing => "Generating debate summary",
            Self::Ended => "Debate ended",
            Self::Stopped => "Debate stopped",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Setup => write!(f, "setup"),
            Self::Opening => write!(f, "opening"),
            Self::MainLoop => write!(f, "main_loop"),
            Self::Closing => write!(f, "closing"),
            Self::Ended => write!(f, "ended"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Session metadata plus live counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMeta {
    pub name: String,
    pub description: String,
    pub invite_code: String,
    pub message_count: u64,
    pub round_count: u32,
}

impl GroupMeta {
    fn new(meta: MetaPayload, invite_code: String) -> Self {
        Self {
            name: meta.name,
            description: meta.description,
            invite_code,
            message_count: 0,
            round_count: 0,
        }
    }
}

/// Deterministic metadata fallback derived from the topic. Session creation
/// never blocks on a metadata failure.
pub fn fallback_group_meta(topic: &str) -> MetaPayload {
    let head: String = topic.chars().take(30).collect();
    MetaPayload {
        name: format!("🔥 Debate: {head}..."),
        description: format!("Hot AI debate about: \"{topic}\""),
    }
}

/// The declared winner of a completed debate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Winner {
    Participant {
        id: String,
        name: String,
        handle: String,
    },
    /// Only reachable when the closing synthesis failed.
    Undetermined,
}

impl Winner {
    /// Resolve the collaborator's free-text winner declaration against the
    /// roster. The arbiter can never win; an unresolvable declaration is a
    /// malformed response and the caller falls back.
    ///
    /// Display names compose affixes around shared cores, so one debater's
    /// name can be a substring of another's. The longest matched name or
    /// handle wins the resolution, never the first roster hit.
    pub fn resolve(raw: &str, roster: &[Participant]) -> Option<Winner> {
        roster
            .iter()
            .filter(|p| !p.is_arbiter())
            .filter_map(|p| {
                let matched = [&p.handle, &p.name]
                    .into_iter()
                    .filter(|needle| raw.contains(needle.as_str()))
                    .map(|needle| needle.len())
                    .max()?;
                Some((matched, p))
            })
            .max_by_key(|(matched, _)| *matched)
            .map(|(_, p)| Winner::Participant {
                id: p.id.clone(),
                name: p.name.clone(),
                handle: p.handle.clone(),
            })
    }
}

/// Mutable per-session state, shared between the session runner and the
/// gateway's inbound dispatch. Every mutation happens under the lock, and
/// the matching event is sent before the lock is released, so emit order
/// always equals append order.
#[derive(Debug)]
pub struct SessionShared {
    pub phase: SessionPhase,
    pub topic: String,
    pub settings: DebateSettings,
    pub roster: Vec<Participant>,
    pub history: HistoryWindow,
    pub group: Option<GroupMeta>,
    pub running: bool,
}

impl SessionShared {
    pub fn idle() -> Self {
        Self {
            phase: SessionPhase::Idle,
            topic: String::new(),
            settings: DebateSettings::default(),
            roster: Vec::new(),
            history: HistoryWindow::new(),
            group: None,
            running: false,
        }
    }
}

pub type SharedSession = Arc<Mutex<SessionShared>>;
pub type EventSender = mpsc::UnboundedSender<ArenaEvent>;

/// Append an entry to history, bump the counters, and emit the matching
/// `turn` + `counters_update` events, all under one lock.
pub(crate) async fn append_and_emit(
    shared: &SharedSession,
    events: &EventSender,
    entry: HistoryEntry,
) -> Result<(), HistoryError> {
    let mut state = shared.lock().await;
    state.history.append(entry.clone())?;
    let (round, messages) = match state.group.as_mut() {
        Some(group) => {
            group.message_count += 1;
            (group.round_count, group.message_count)
        }
        None => (0, state.history.len() as u64),
    };
    let _ = events.send(ArenaEvent::Turn { entry });
    let _ = events.send(ArenaEvent::CountersUpdate { round, messages });
    Ok(())
}

enum SessionAbort {
    /// The stop flag was observed at a suspension point.
    Cancelled,
    /// A generation failure inside Opening/MainLoop.
    Fatal(String),
}

/// Drives one debate session to completion on its own task.
pub struct SessionRunner {
    pub shared: SharedSession,
    pub events: EventSender,
    pub generator: Arc<dyn Generate>,
    pub registry: SharedRegistry,
    pub connection_id: String,
    pub session_id: String,
    pub settings: DebateSettings,
    pub topic: String,
    pub cancel: CancellationToken,
    pub rng: StdRng,
}

impl SessionRunner {
    pub async fn run(mut self) {
        let result = self.drive().await;
        let mut state = self.shared.lock().await;
        state.running = false;
        match result {
            Ok(()) => {
                state.phase = SessionPhase::Ended;
            }
            Err(SessionAbort::Cancelled) => {
                debug!(session = %self.session_id, "session cancelled mid-flight");
                state.phase = SessionPhase::Stopped;
            }
            Err(SessionAbort::Fatal(message)) => {
                warn!(session = %self.session_id, %message, "session aborted");
                state.phase = SessionPhase::Stopped;
                let _ = self.events.send(ArenaEvent::Error { message });
            }
        }
    }

    async fn drive(&mut self) -> Result<(), SessionAbort> {
        let roster = self.setup().await?;
        let debaters: Vec<Participant> =
            roster.iter().filter(|p| !p.is_arbiter()).cloned().collect();
        self.opening(&roster, &debaters).await?;
        self.main_loop(&roster, &debaters).await?;
        self.closing(&roster).await?;
        Ok(())
    }

    // ── Setup ────────────────────────────────────────────────────────────

    async fn setup(&mut self) -> Result<Vec<Participant>, SessionAbort> {
        self.set_phase(SessionPhase::Setup).await;

        let meta = match self.request_meta().await {
            Ok(meta) => meta,
            Err(e) => {
                warn!(error = %e, "metadata generation failed, using fallback");
                fallback_group_meta(&self.topic)
            }
        };
        self.ensure_live()?;

        let invite_code = invite_code(&mut self.rng);
        let group = GroupMeta::new(meta, invite_code);
        {
            let mut state = self.shared.lock().await;
            state.group = Some(group.clone());
            let _ = self.events.send(ArenaEvent::GroupReady { group });
        }

        let mut builder = RosterBuilder::new(DEFAULT_DEBATER_COUNT);
        if let Some(policy) = self.settings.arbiter {
            builder = builder.with_arbiter(policy);
        }
        let roster = builder
            .build(&mut self.rng)
            .map_err(|e| SessionAbort::Fatal(e.to_string()))?;

        for participant in &roster {
            let _ = self.events.send(ArenaEvent::AgentLoading {
                participant_id: participant.id.clone(),
                name: participant.name.clone(),
            });
            tokio::time::sleep(scheduler::roster_stagger(&mut self.rng)).await;
            self.ensure_live()?;
        }

        {
            let mut state = self.shared.lock().await;
            state.roster = roster.clone();
            let _ = self.events.send(ArenaEvent::RosterReady {
                participants: roster.iter().map(Participant::to_public).collect(),
            });
        }

        info!(
            session = %self.session_id,
            participants = roster.len(),
            arbiter = self.settings.arbiter.is_some(),
            "roster ready"
        );
        Ok(roster)
    }

    async fn request_meta(&self) -> Result<MetaPayload, String> {
        let raw = self
            .generator
            .generate(
                &prompt::meta_system(&self.settings),
                &prompt::meta_user(&self.topic),
            )
            .await
            .map_err(|e| e.to_string())?;
        parse_json_payload::<MetaPayload>(&raw).map_err(|e| e.to_string())
    }

    // ── Opening ──────────────────────────────────────────────────────────

    async fn opening(
        &mut self,
        roster: &[Participant],
        debaters: &[Participant],
    ) -> Result<(), SessionAbort> {
        self.set_phase(SessionPhase::Opening).await;
        let _ = self.events.send(ArenaEvent::OpeningBegin);
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        self.ensure_live()?;

        for agent in debaters {
            let _ = self.events.send(ArenaEvent::ComposingStart {
                speaker_id: agent.id.clone(),
            });
            tokio::time::sleep(scheduler::opening_delay(&mut self.rng)).await;
            self.ensure_live()?;

            let text = self
                .generator
                .generate(
                    &prompt::debater_system(agent, roster, &self.settings),
                    &prompt::opening_user(&self.topic, agent, roster),
                )
                .await
                .map_err(|e| SessionAbort::Fatal(e.to_string()))?;
            self.ensure_live()?;

            let _ = self.events.send(ArenaEvent::ComposingStop {
                speaker_id: agent.id.clone(),
            });
            append_and_emit(
                &self.shared,
                &self.events,
                HistoryEntry::spoken(&agent.id, text, TurnPhase::Opening, 0),
            )
            .await
            .map_err(|e| SessionAbort::Fatal(e.to_string()))?;

            tokio::time::sleep(scheduler::pause_after(true, &mut self.rng)).await;
            self.ensure_live()?;
        }
        Ok(())
    }

    // ── Main loop ────────────────────────────────────────────────────────

    async fn main_loop(
        &mut self,
        roster: &[Participant],
        debaters: &[Participant],
    ) -> Result<(), SessionAbort> {
        self.set_phase(SessionPhase::MainLoop).await;
        {
            let mut state = self.shared.lock().await;
            if let Some(group) = state.group.as_mut() {
                group.round_count = 1;
            }
        }

        let arbiter = roster.iter().find(|p| p.is_arbiter()).cloned();
        let mut sched = TurnScheduler::new(
            debaters.len(),
            self.settings.max_rounds,
            arbiter.is_some(),
            &mut self.rng,
        );

        while !sched.rounds_complete() {
            self.ensure_live()?;
            let turn = sched.next_speaker(&mut self.rng);
            let agent = match turn.speaker {
                Speaker::Debater(idx) => &debaters[idx],
                // The scheduler only yields Arbiter when one exists.
                Speaker::Arbiter => arbiter.as_ref().ok_or_else(|| {
                    SessionAbort::Fatal("scheduler selected a missing arbiter".to_string())
                })?,
            };

            let _ = self.events.send(ArenaEvent::ComposingStart {
                speaker_id: agent.id.clone(),
            });
            tokio::time::sleep(scheduler::think_delay(
                self.settings.base_delay_ms(),
                &mut self.rng,
            ))
            .await;
            self.ensure_live()?;

            let transcript = {
                let state = self.shared.lock().await;
                render_transcript(state.history.recent_suffix(PROMPT_SUFFIX_LEN), roster)
            };
            let (system, user) = if agent.is_arbiter() {
                (
                    prompt::arbiter_system(agent, roster, &self.settings),
                    prompt::arbiter_user(&self.topic, &transcript),
                )
            } else {
                (
                    prompt::debater_system(agent, roster, &self.settings),
                    prompt::response_user(&self.topic, &transcript),
                )
            };
            let text = self
                .generator
                .generate(&system, &user)
                .await
                .map_err(|e| SessionAbort::Fatal(e.to_string()))?;
            self.ensure_live()?;

            let _ = self.events.send(ArenaEvent::ComposingStop {
                speaker_id: agent.id.clone(),
            });
            {
                let mut state = self.shared.lock().await;
                if let Some(group) = state.group.as_mut() {
                    group.round_count = turn.round;
                }
            }
            append_and_emit(
                &self.shared,
                &self.events,
                HistoryEntry::spoken(&agent.id, text, TurnPhase::Main, turn.round),
            )
            .await
            .map_err(|e| SessionAbort::Fatal(e.to_string()))?;

            tokio::time::sleep(scheduler::pause_after(false, &mut self.rng)).await;
        }
        Ok(())
    }

    // ── Closing ──────────────────────────────────────────────────────────

    async fn closing(&mut self, roster: &[Participant]) -> Result<(), SessionAbort> {
        self.set_phase(SessionPhase::Closing).await;

        let transcript = {
            let state = self.shared.lock().await;
            render_transcript(state.history.full_transcript(), roster)
        };
        let (summary, winner) = match self.request_summary(roster, &transcript).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "closing synthesis failed, using fallback");
                (FALLBACK_SUMMARY.to_string(), Winner::Undetermined)
            }
        };
        self.ensure_live()?;

        let (archived, total_messages) = {
            let state = self.shared.lock().await;
            let group = state.group.clone().unwrap_or_else(|| {
                GroupMeta::new(fallback_group_meta(&self.topic), String::new())
            });
            let total = group.message_count;
            (
                ArchivedDebate::new(
                    &self.session_id,
                    &self.topic,
                    group,
                    roster,
                    state.history.full_transcript().to_vec(),
                    summary.clone(),
                    winner.clone(),
                    &self.settings.locale,
                ),
                total,
            )
        };
        self.registry.archive(&self.connection_id, archived).await;

        let _ = self.events.send(ArenaEvent::SessionEnded {
            total_messages,
            summary,
            winner,
        });
        info!(session = %self.session_id, total_messages, "session ended");
        Ok(())
    }

    async fn request_summary(
        &self,
        roster: &[Participant],
        transcript: &str,
    ) -> Result<(String, Winner), String> {
        let raw = self
            .generator
            .generate(
                &prompt::summary_system(&self.settings),
                &prompt::summary_user(&self.topic, roster, transcript),
            )
            .await
            .map_err(|e| e.to_string())?;
        let payload = parse_json_payload::<SummaryPayload>(&raw).map_err(|e| e.to_string())?;
        let winner = Winner::resolve(&payload.winner, roster)
            .ok_or_else(|| format!("winner '{}' matches no debater", payload.winner))?;
        Ok((payload.summary, winner))
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    async fn set_phase(&self, phase: SessionPhase) {
        let mut state = self.shared.lock().await;
        state.phase = phase;
        let _ = self.events.send(ArenaEvent::PhaseProgress {
            phase,
            label: phase.label().to_string(),
        });
    }

    /// The cancellation contract: checked immediately after every
    /// suspension point; a set flag discards the in-flight result.
    fn ensure_live(&self) -> Result<(), SessionAbort> {
        if self.cancel.is_cancelled() {
            Err(SessionAbort::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn invite_code<R: Rng>(rng: &mut R) -> String {
    (0..8)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect::<String>()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{BiasPolicy, Role, RosterBuilder};
    use crate::stance::DeclaredStance;
    use rand::SeedableRng;

    fn debater(id: &str, name: &str, handle: &str) -> Participant {
        Participant {
            id: id.to_string(),
            name: name.to_string(),
            handle: handle.to_string(),
            initials: "XX".to_string(),
            color: "#000000".to_string(),
            persona: "test persona".to_string(),
            role: Role::Debater {
                stance: DeclaredStance::For,
                swing: false,
            },
        }
    }

    #[test]
    fn test_phase_labels_and_terminality() {
        assert!(SessionPhase::Ended.is_terminal());
        assert!(SessionPhase::Stopped.is_terminal());
        assert!(!SessionPhase::MainLoop.is_terminal());
        assert!(SessionPhase::Opening.accepts_observers());
        assert!(SessionPhase::MainLoop.accepts_observers());
        assert!(!SessionPhase::Closing.accepts_observers());
        assert_eq!(SessionPhase::Setup.to_string(), "setup");
    }

    #[test]
    fn test_fallback_meta_is_deterministic() {
        let a = fallback_group_meta("should pineapple go on pizza");
        let b = fallback_group_meta("should pineapple go on pizza");
        assert_eq!(a.name, b.name);
        assert_eq!(a.description, b.description);
        assert!(a.name.contains("should pineapple go on pizza"));
    }

    #[test]
    fn test_fallback_meta_truncates_long_topics() {
        let topic = "x".repeat(100);
        let meta = fallback_group_meta(&topic);
        assert!(meta.name.len() < 60);
    }

    #[test]
    fn test_invite_code_shape() {
        let mut rng = StdRng::seed_from_u64(8);
        let code = invite_code(&mut rng);
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(code, code.to_uppercase());
    }

    #[test]
    fn test_winner_resolution_by_handle_and_name() {
        let mut rng = StdRng::seed_from_u64(12);
        let roster = RosterBuilder::new(5)
            .with_arbiter(BiasPolicy::Random)
            .build(&mut rng)
            .unwrap();
        let target = &roster[2];

        let by_handle = Winner::resolve(&format!("the winner is {}", target.handle), &roster);
        assert!(matches!(
            by_handle,
            Some(Winner::Participant { ref id, .. }) if *id == target.id
        ));

        let by_name = Winner::resolve(&format!("{} ({})", target.name, target.handle), &roster);
        assert!(by_name.is_some());
    }

    #[test]
    fn test_winner_resolution_prefers_longest_match() {
        // One display name embedded in another must not shadow it.
        let roster = vec![
            debater("a", "DebateBro", "@debate_bro42"),
            debater("b", "xX_DebateBro_69", "@debate_bro_og"),
        ];

        let winner = Winner::resolve("xX_DebateBro_69 (@debate_bro_og)", &roster);
        assert!(
            matches!(winner, Some(Winner::Participant { ref id, .. }) if id == "b"),
            "declared winner must resolve to the full-name debater"
        );

        let winner = Winner::resolve("the winner is DebateBro", &roster);
        assert!(matches!(winner, Some(Winner::Participant { ref id, .. }) if id == "a"));
    }

    #[test]
    fn test_winner_never_resolves_to_arbiter() {
        let mut rng = StdRng::seed_from_u64(13);
        let roster = RosterBuilder::new(5)
            .with_arbiter(BiasPolicy::For)
            .build(&mut rng)
            .unwrap();
        assert!(Winner::resolve("FactCheck_Bot (@factcheck_bot)", &roster).is_none());
        assert!(Winner::resolve("nobody you know", &roster).is_none());
    }

    #[test]
    fn test_winner_serialization_tags() {
        let winner = Winner::Undetermined;
        let json = serde_json::to_string(&winner).unwrap();
        assert_eq!(json, r#"{"kind":"undetermined"}"#);
    }
}
