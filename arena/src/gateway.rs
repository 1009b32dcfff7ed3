//! Connection gateway: owns one control loop per connected client.
//!
//! Each connection gets an inbound control-message stream and an outbound
//! event stream. The gateway dispatches control messages serially, so
//! observer messages and claim injections from the same client can never
//! interleave their append and emit steps. The debate itself runs on a
//! child task that shares state with the gateway through `SessionShared`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::archive::SharedRegistry;
use crate::config::{validate_topic, DebateSettings};
use crate::events::{ArenaEvent, ControlMessage};
use crate::generate::{parse_json_payload, EvidencePayload, Generate};
use crate::history::HistoryEntry;
use crate::prompt;
use crate::roster::Participant;
use crate::session::{
    append_and_emit, EventSender, SessionRunner, SessionShared, SharedSession,
};

/// Handle to a spawned debate task.
struct LiveSession {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Shared entry point for all connections.
pub struct Gateway {
    registry: SharedRegistry,
    generator: Arc<dyn Generate>,
    seed: Option<u64>,
}

impl Gateway {
    pub fn new(registry: SharedRegistry, generator: Arc<dyn Generate>) -> Self {
        Self {
            registry,
            generator,
            seed: None,
        }
    }

    /// Fixed-seed variant; every random draw on the connection becomes
    /// reproducible.
    pub fn seeded(registry: SharedRegistry, generator: Arc<dyn Generate>, seed: u64) -> Self {
        Self {
            registry,
            generator,
            seed: Some(seed),
        }
    }

    /// Serves one connection until its inbound stream closes.
    pub async fn run_connection(
        &self,
        connection_id: String,
        mut inbound: mpsc::UnboundedReceiver<ControlMessage>,
        events: EventSender,
    ) {
        self.registry.connect(&connection_id).await;
        let shared: SharedSession = Arc::new(tokio::sync::Mutex::new(SessionShared::idle()));
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut live: Option<LiveSession> = None;

        let _ = events.send(ArenaEvent::SessionReady {
            connection_id: connection_id.clone(),
        });
        info!(connection = %connection_id, "connection open");

        while let Some(message) = inbound.recv().await {
            match message {
                ControlMessage::Start { topic, settings } => {
                    self.handle_start(
                        &connection_id,
                        &shared,
                        &events,
                        &mut live,
                        &mut rng,
                        topic,
                        settings,
                    )
                    .await;
                }
                ControlMessage::ObserverMessage { text } => {
                    self.handle_observer(&shared, &events, text).await;
                }
                ControlMessage::InjectClaim { target_id, text } => {
                    self.handle_inject(&shared, &events, &mut rng, &target_id, text)
                        .await;
                }
                ControlMessage::Stop => {
                    stop_session(&shared, &events, &mut live).await;
                }
                ControlMessage::ArchiveQuery => {
                    let debates = self.registry.list(&connection_id).await;
                    let _ = events.send(ArenaEvent::ArchiveList { debates });
                }
                ControlMessage::ArchiveFetch { entry_id } => {
                    match self.registry.fetch(&connection_id, &entry_id).await {
                        Some(debate) => {
                            let _ = events.send(ArenaEvent::ArchiveEntry {
                                debate: Box::new(debate),
                            });
                        }
                        None => {
                            let _ = events.send(ArenaEvent::Error {
                                message: "Archive entry not found.".to_string(),
                            });
                        }
                    }
                }
                ControlMessage::Keepalive => {
                    let _ = events.send(ArenaEvent::Keepalive);
                }
            }
        }

        if let Some(session) = live.take() {
            session.cancel.cancel();
            let _ = session.handle.await;
        }
        self.registry.disconnect(&connection_id).await;
        info!(connection = %connection_id, "connection closed");
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_start(
        &self,
        connection_id: &str,
        shared: &SharedSession,
        events: &EventSender,
        live: &mut Option<LiveSession>,
        rng: &mut StdRng,
        topic: String,
        settings: DebateSettings,
    ) {
        {
            let state = shared.lock().await;
            if state.running {
                debug!(connection = %connection_id, "start ignored, session already running");
                return;
            }
        }
        let topic = match validate_topic(&topic) {
            Ok(topic) => topic,
            Err(e) => {
                let _ = events.send(ArenaEvent::Error {
                    message: e.to_string(),
                });
                return;
            }
        };
        // A finished runner leaves its flag cleared; reap the old handle.
        if let Some(old) = live.take() {
            old.cancel.cancel();
            let _ = old.handle.await;
        }

        {
            let mut state = shared.lock().await;
            *state = SessionShared::idle();
            state.topic = topic.clone();
            state.settings = settings.clone();
            state.running = true;
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        let runner = SessionRunner {
            shared: Arc::clone(shared),
            events: events.clone(),
            generator: Arc::clone(&self.generator),
            registry: Arc::clone(&self.registry),
            connection_id: connection_id.to_string(),
            session_id: session_id.clone(),
            settings,
            topic,
            cancel: cancel.clone(),
            rng: StdRng::seed_from_u64(rng.gen()),
        };
        info!(connection = %connection_id, session = %session_id, "debate starting");
        let handle = tokio::spawn(runner.run());
        *live = Some(LiveSession { cancel, handle });
    }

    async fn handle_observer(&self, shared: &SharedSession, events: &EventSender, text: String) {
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }
        {
            let state = shared.lock().await;
            if !state.running
                || !state.phase.accepts_observers()
                || !state.settings.observer_participation
            {
                debug!("observer message dropped outside an active debate");
                return;
            }
        }
        if let Err(e) = append_and_emit(shared, events, HistoryEntry::observer(text)).await {
            warn!(error = %e, "observer append failed");
        }
    }

    /// Claim injection runs inline on the dispatch loop, so simultaneous
    /// injections from one client are processed one at a time.
    async fn handle_inject(
        &self,
        shared: &SharedSession,
        events: &EventSender,
        rng: &mut StdRng,
        target_id: &str,
        text: String,
    ) {
        let claim = text.trim().to_string();
        if claim.is_empty() {
            return;
        }
        let (target, settings) = {
            let state = shared.lock().await;
            if !state.running || !state.phase.accepts_observers() {
                debug!("claim injection dropped outside an active debate");
                return;
            }
            let Some(target) = state
                .roster
                .iter()
                .find(|p| p.id == target_id && !p.is_arbiter())
                .cloned()
            else {
                debug!(target = %target_id, "claim injection targets no known debater");
                return;
            };
            (target, state.settings.clone())
        };

        let (evidence, summary) = self
            .fabricate_evidence(&target, &claim, &settings, rng)
            .await;
        let entry = HistoryEntry::injected_claim(&target, claim, evidence, summary);
        if let Err(e) = append_and_emit(shared, events, entry).await {
            warn!(error = %e, "claim append failed");
        }
    }

    /// Ask the collaborator to dress the claim up as leaked intelligence.
    /// Failures fall back to fabricated archive links so an injection can
    /// never be lost.
    async fn fabricate_evidence(
        &self,
        target: &Participant,
        claim: &str,
        settings: &DebateSettings,
        rng: &mut StdRng,
    ) -> (Vec<String>, String) {
        let generated = self
            .generator
            .generate(
                &prompt::evidence_system(settings),
                &prompt::evidence_user(target, claim),
            )
            .await
            .map_err(|e| e.to_string())
            .and_then(|raw| {
                parse_json_payload::<EvidencePayload>(&raw).map_err(|e| e.to_string())
            });
        match generated {
            Ok(payload) if !payload.links.is_empty() && !payload.summary.is_empty() => {
                (payload.links, payload.summary)
            }
            Ok(_) => {
                warn!("evidence payload incomplete, fabricating links");
                (fallback_links(rng), fallback_evidence_summary(target))
            }
            Err(e) => {
                warn!(error = %e, "evidence generation failed, fabricating links");
                (fallback_links(rng), fallback_evidence_summary(target))
            }
        }
    }
}

/// Cancel any live session and reset to the armed idle state. Safe to call
/// with no session; the client still gets its `session_stopped`.
async fn stop_session(
    shared: &SharedSession,
    events: &EventSender,
    live: &mut Option<LiveSession>,
) {
    if let Some(session) = live.take() {
        session.cancel.cancel();
        let _ = session.handle.await;
    }
    {
        let mut state = shared.lock().await;
        *state = SessionShared::idle();
    }
    let _ = events.send(ArenaEvent::SessionStopped);
}

fn fallback_links<R: Rng>(rng: &mut R) -> Vec<String> {
    vec![
        format!(
            "https://wikileaks.org/releases/2024-{}.html",
            rng.gen_range(10000..100000)
        ),
        format!(
            "https://www.courtlistener.com/docket/{}/",
            rng.gen_range(1000000..10000000)
        ),
    ]
}

fn fallback_evidence_summary(target: &Participant) -> String {
    format!(
        "Declassified documents confirm the allegations regarding {}.",
        target.name
    )
}
