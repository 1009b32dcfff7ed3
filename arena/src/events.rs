//! Wire protocol between the connection gateway and its transport.
//!
//! Outbound events stream session progress to the client; inbound control
//! messages drive the session. Both sides are serde-tagged enums; events are
//! emitted in the exact order their entries are appended to history.

use serde::{Deserialize, Serialize};

use crate::archive::{ArchiveSummary, ArchivedDebate};
use crate::config::DebateSettings;
use crate::history::HistoryEntry;
use crate::roster::PublicParticipant;
use crate::session::{GroupMeta, SessionPhase, Winner};

/// Events emitted to the connected client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArenaEvent {
    /// Connection established; one session slot is armed.
    SessionReady { connection_id: String },

    /// The session entered a new phase.
    PhaseProgress { phase: SessionPhase, label: String },

    /// Session metadata is available.
    GroupReady { group: GroupMeta },

    /// A roster participant finished loading (setup progress).
    AgentLoading {
        participant_id: String,
        name: String,
    },

    /// The full roster, hidden bias excluded.
    RosterReady {
        participants: Vec<PublicParticipant>,
    },

    /// Opening statements are about to begin.
    OpeningBegin,

    /// A participant started composing (think-time in progress).
    ComposingStart { speaker_id: String },

    /// A participant stopped composing.
    ComposingStop { speaker_id: String },

    /// A history entry was appended.
    Turn { entry: HistoryEntry },

    /// Round and message counters changed.
    CountersUpdate { round: u32, messages: u64 },

    /// The session ran to completion.
    SessionEnded {
        total_messages: u64,
        summary: String,
        winner: Winner,
    },

    /// The session was stopped and the slot re-armed.
    SessionStopped,

    /// Reply to an archive query.
    ArchiveList { debates: Vec<ArchiveSummary> },

    /// Reply to an archive fetch.
    ArchiveEntry { debate: Box<ArchivedDebate> },

    /// A user-visible failure.
    Error { message: String },

    Keepalive,
}

impl ArenaEvent {
    /// Event type tag, as serialized.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionReady { .. } => "session_ready",
            Self::PhaseProgress { .. } => "phase_progress",
            Self::GroupReady { .. } => "group_ready",
            Self::AgentLoading { .. } => "agent_loading",
            Self::RosterReady { .. } => "roster_ready",
            Self::OpeningBegin => "opening_begin",
            Self::ComposingStart { .. } => "composing_start",
            Self::ComposingStop { .. } => "composing_stop",
            Self::Turn { .. } => "turn",
            Self::CountersUpdate { .. } => "counters_update",
            Self::SessionEnded { .. } => "session_ended",
            Self::SessionStopped => "session_stopped",
            Self::ArchiveList { .. } => "archive_list",
            Self::ArchiveEntry { .. } => "archive_entry",
            Self::Error { .. } => "error",
            Self::Keepalive => "keepalive",
        }
    }
}

/// Control messages accepted from the connected client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Start a debate. Rejected while a session is running.
    Start {
        topic: String,
        #[serde(default)]
        settings: DebateSettings,
    },

    /// Observer interjection, accepted only while Opening/MainLoop is active.
    ObserverMessage { text: String },

    /// Inject a claim about a participant as unconditionally-true context.
    InjectClaim { target_id: String, text: String },

    /// Stop the running session and re-arm the slot.
    Stop,

    /// List archived debates for this connection.
    ArchiveQuery,

    /// Fetch one archived debate by id.
    ArchiveFetch { entry_id: String },

    Keepalive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tags_are_snake_case() {
        let event = ArenaEvent::CountersUpdate {
            round: 2,
            messages: 7,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"counters_update\""));
        assert_eq!(event.event_type(), "counters_update");
    }

    #[test]
    fn test_control_message_roundtrip() {
        let msg: ControlMessage = serde_json::from_str(
            r#"{"type": "start", "topic": "dogs > cats", "settings": {"max_rounds": 2}}"#,
        )
        .unwrap();
        match msg {
            ControlMessage::Start { topic, settings } => {
                assert_eq!(topic, "dogs > cats");
                assert_eq!(settings.max_rounds, 2);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_start_without_settings_uses_defaults() {
        let msg: ControlMessage =
            serde_json::from_str(r#"{"type": "start", "topic": "pineapple on pizza"}"#).unwrap();
        match msg {
            ControlMessage::Start { settings, .. } => {
                assert_eq!(settings.max_rounds, 10);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_inject_claim_parse() {
        let msg: ControlMessage = serde_json::from_str(
            r#"{"type": "inject_claim", "target_id": "p-1", "text": "owns a yacht"}"#,
        )
        .unwrap();
        assert!(matches!(msg, ControlMessage::InjectClaim { .. }));
    }
}
