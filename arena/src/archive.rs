//! Connection-scoped archive of completed debates.
//!
//! Archived debates live only as long as the connection that produced them.
//! The archive is the one surface that reveals the arbiter's hidden bias,
//! since the debate it could have influenced is over.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::history::HistoryEntry;
use crate::roster::{Participant, RevealedParticipant};
use crate::session::{GroupMeta, Winner};

/// Listing row for `archive_list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSummary {
    pub id: String,
    pub topic: String,
    pub group_name: String,
    pub message_count: u64,
    pub participant_count: usize,
    pub locale: String,
    pub timestamp: DateTime<Utc>,
}

/// Full record of a completed debate, including the revealed roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedDebate {
    pub id: String,
    pub topic: String,
    pub group: GroupMeta,
    pub roster: Vec<RevealedParticipant>,
    pub messages: Vec<HistoryEntry>,
    pub message_count: u64,
    pub summary: String,
    pub winner: Winner,
    pub locale: String,
    pub timestamp: DateTime<Utc>,
}

impl ArchivedDebate {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: &str,
        topic: &str,
        group: GroupMeta,
        roster: &[Participant],
        messages: Vec<HistoryEntry>,
        summary: String,
        winner: Winner,
        locale: &str,
    ) -> Self {
        Self {
            id: session_id.to_string(),
            topic: topic.to_string(),
            message_count: group.message_count,
            group,
            roster: roster.iter().map(Participant::to_revealed).collect(),
            messages,
            summary,
            winner,
            locale: locale.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn summary_row(&self) -> ArchiveSummary {
        ArchiveSummary {
            id: self.id.clone(),
            topic: self.topic.clone(),
            group_name: self.group.name.clone(),
            message_count: self.message_count,
            participant_count: self.roster.len(),
            locale: self.locale.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Archives keyed by connection id. Entries vanish with the connection;
/// nothing is persisted across process restarts.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    archives: Mutex<HashMap<String, Vec<ArchivedDebate>>>,
}

pub type SharedRegistry = Arc<ConnectionRegistry>;

impl ConnectionRegistry {
    pub fn new() -> SharedRegistry {
        Arc::new(Self::default())
    }

    pub async fn connect(&self, connection_id: &str) {
        let mut archives = self.archives.lock().await;
        archives.entry(connection_id.to_string()).or_default();
        debug!(connection = %connection_id, "connection registered");
    }

    pub async fn disconnect(&self, connection_id: &str) {
        let mut archives = self.archives.lock().await;
        if let Some(debates) = archives.remove(connection_id) {
            debug!(
                connection = %connection_id,
                archived = debates.len(),
                "connection dropped, archive discarded"
            );
        }
    }

    /// Newest first.
    pub async fn archive(&self, connection_id: &str, debate: ArchivedDebate) {
        let mut archives = self.archives.lock().await;
        archives
            .entry(connection_id.to_string())
            .or_default()
            .insert(0, debate);
    }

    pub async fn list(&self, connection_id: &str) -> Vec<ArchiveSummary> {
        let archives = self.archives.lock().await;
        archives
            .get(connection_id)
            .map(|debates| debates.iter().map(ArchivedDebate::summary_row).collect())
            .unwrap_or_default()
    }

    pub async fn fetch(&self, connection_id: &str, entry_id: &str) -> Option<ArchivedDebate> {
        let archives = self.archives.lock().await;
        archives
            .get(connection_id)?
            .iter()
            .find(|d| d.id == entry_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{BiasPolicy, RosterBuilder};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_debate(id: &str) -> ArchivedDebate {
        let mut rng = StdRng::seed_from_u64(77);
        let roster = RosterBuilder::new(3)
            .with_arbiter(BiasPolicy::Against)
            .build(&mut rng)
            .unwrap();
        let mut group = GroupMeta {
            name: "Test Group".to_string(),
            description: "desc".to_string(),
            invite_code: "ABCD1234".to_string(),
            message_count: 0,
            round_count: 2,
        };
        group.message_count = 7;
        ArchivedDebate::new(
            id,
            "cats vs dogs",
            group,
            &roster,
            Vec::new(),
            "a summary".to_string(),
            Winner::Undetermined,
            "en",
        )
    }

    #[tokio::test]
    async fn test_archive_list_and_fetch_roundtrip() {
        let registry = ConnectionRegistry::new();
        registry.connect("conn-1").await;
        registry.archive("conn-1", sample_debate("d-1")).await;
        registry.archive("conn-1", sample_debate("d-2")).await;

        let listing = registry.list("conn-1").await;
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].id, "d-2", "newest debate listed first");
        assert_eq!(listing[0].message_count, 7);

        let fetched = registry.fetch("conn-1", "d-1").await;
        assert!(fetched.is_some());
        assert!(registry.fetch("conn-1", "d-9").await.is_none());
    }

    #[tokio::test]
    async fn test_archives_are_scoped_per_connection() {
        let registry = ConnectionRegistry::new();
        registry.connect("a").await;
        registry.connect("b").await;
        registry.archive("a", sample_debate("d-1")).await;

        assert_eq!(registry.list("a").await.len(), 1);
        assert!(registry.list("b").await.is_empty());
        assert!(registry.fetch("b", "d-1").await.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_discards_archive() {
        let registry = ConnectionRegistry::new();
        registry.connect("gone").await;
        registry.archive("gone", sample_debate("d-1")).await;
        registry.disconnect("gone").await;
        assert!(registry.list("gone").await.is_empty());
    }

    #[test]
    fn test_archived_roster_reveals_bias() {
        let debate = sample_debate("d-1");
        let revealed = debate
            .roster
            .iter()
            .filter(|p| p.bias.is_some())
            .count();
        assert_eq!(revealed, 1, "exactly the arbiter carries a revealed bias");
    }
}
