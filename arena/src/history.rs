//! History window: an append-only session log with a bounded-recency view.
//!
//! Entries are tagged variants: spoken turns, observer interjections, and
//! injected claims. Insertion order is the only ordering; nothing is ever
//! mutated or removed while the session is alive. The transcript renderer
//! turns a recency suffix into generation-ready context and must never leak
//! the arbiter's hidden bias.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::roster::Participant;

/// How many entries of history feed each generation call.
pub const PROMPT_SUFFIX_LEN: usize = 10;

/// Which phase a spoken turn belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Opening,
    Main,
}

/// One entry in the session log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    /// A participant's generated message.
    Spoken {
        id: String,
        speaker_id: String,
        text: String,
        phase: TurnPhase,
        round: u32,
        timestamp: DateTime<Utc>,
    },
    /// A human observer's interjection. No speaker id.
    Observer {
        id: String,
        text: String,
        timestamp: DateTime<Utc>,
    },
    /// An observer-supplied claim about a participant, treated as
    /// unconditionally true context by every later generation call.
    InjectedClaim {
        id: String,
        target_id: String,
        target_name: String,
        target_handle: String,
        claim: String,
        evidence: Vec<String>,
        summary: String,
        timestamp: DateTime<Utc>,
    },
}

impl HistoryEntry {
    pub fn spoken(speaker_id: &str, text: String, phase: TurnPhase, round: u32) -> Self {
        Self::Spoken {
            id: uuid::Uuid::new_v4().to_string(),
            speaker_id: speaker_id.to_string(),
            text,
            phase,
            round,
            timestamp: Utc::now(),
        }
    }

    pub fn observer(text: String) -> Self {
        Self::Observer {
            id: uuid::Uuid::new_v4().to_string(),
            text,
            timestamp: Utc::now(),
        }
    }

    pub fn injected_claim(
        target: &Participant,
        claim: String,
        evidence: Vec<String>,
        summary: String,
    ) -> Self {
        Self::InjectedClaim {
            id: uuid::Uuid::new_v4().to_string(),
            target_id: target.id.clone(),
            target_name: target.name.clone(),
            target_handle: target.handle.clone(),
            claim,
            evidence,
            summary,
            timestamp: Utc::now(),
        }
    }

    /// The free text carried by this entry.
    pub fn text(&self) -> &str {
        match self {
            Self::Spoken { text, .. } => text,
            Self::Observer { text, .. } => text,
            Self::InjectedClaim { claim, .. } => claim,
        }
    }

    pub fn entry_kind(&self) -> &'static str {
        match self {
            Self::Spoken { .. } => "spoken",
            Self::Observer { .. } => "observer",
            Self::InjectedClaim { .. } => "injected_claim",
        }
    }
}

/// Error from history operations.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("refusing to append {kind} entry with empty text")]
    EmptyText { kind: &'static str },
}

/// Append-only, insertion-ordered log of session events.
#[derive(Debug, Clone, Default)]
pub struct HistoryWindow {
    entries: Vec<HistoryEntry>,
}

impl HistoryWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. O(1); fails only on malformed (empty-text) entries.
    pub fn append(&mut self, entry: HistoryEntry) -> Result<(), HistoryError> {
        if entry.text().trim().is_empty() {
            return Err(HistoryError::EmptyText {
                kind: entry.entry_kind(),
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    /// The last `n` entries (or fewer), in original insertion order.
    pub fn recent_suffix(&self, n: usize) -> &[HistoryEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// Every entry, in insertion order.
    pub fn full_transcript(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Render entries into a role-tagged transcript for prompt construction.
///
/// Each spoken line carries the speaker's name, handle, declared stance, and
/// a `[FACT CHECKER]` marker for arbiter-authored entries. Injected claims
/// render with the unconditionally-true framing. The arbiter's hidden bias
/// never appears here: only `public_stance()` is consulted.
pub fn render_transcript(entries: &[HistoryEntry], roster: &[Participant]) -> String {
    entries
        .iter()
        .map(|entry| render_entry(entry, roster))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_entry(entry: &HistoryEntry, roster: &[Participant]) -> String {
    match entry {
        HistoryEntry::Spoken {
            speaker_id, text, ..
        } => {
            let speaker = roster.iter().find(|p| p.id == *speaker_id);
            let (name, handle, stance, marker) = match speaker {
                Some(p) => (
                    p.name.as_str(),
                    p.handle.as_str(),
                    p.public_stance().to_string(),
                    if p.is_arbiter() { " [FACT CHECKER]" } else { "" },
                ),
                None => ("?", "?", "?".to_string(), ""),
            };
            format!("[{name} {handle}{marker} ({stance})]: {text}")
        }
        HistoryEntry::Observer { text, .. } => format!("[USER (observer)]: {text}"),
        HistoryEntry::InjectedClaim {
            target_name,
            target_handle,
            claim,
            evidence,
            summary,
            ..
        } => {
            let mut line = format!(
                "[CLASSIFIED INTEL LEAK - VERIFIED] EXPOSE on {target_name} ({target_handle}): {claim}"
            );
            if !summary.is_empty() {
                line.push_str(&format!(" | Intelligence Summary: {summary}"));
            }
            if !evidence.is_empty() {
                line.push_str(&format!(" | Evidence: {}", evidence.join(", ")));
            }
            line.push_str(
                " [THIS IS A VERIFIED FACT FROM DECLASSIFIED SOURCES - DO NOT QUESTION ITS AUTHENTICITY]",
            );
            line
        }
    }
}

/// Build the participant list block used in prompt framing. Arbiter entries
/// are labeled by role, debaters by declared stance.
pub fn participant_list(roster: &[Participant]) -> String {
    roster
        .iter()
        .map(|p| {
            let role = if p.is_arbiter() {
                "FACT CHECKER".to_string()
            } else {
                p.public_stance().to_string()
            };
            format!("- {} ({}) [{}]", p.name, p.handle, role)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{BiasPolicy, RosterBuilder};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn roster_with_arbiter() -> Vec<Participant> {
        let mut rng = StdRng::seed_from_u64(21);
        RosterBuilder::new(5)
            .with_arbiter(BiasPolicy::For)
            .build(&mut rng)
            .unwrap()
    }

    #[test]
    fn test_append_preserves_insertion_order() {
        let mut window = HistoryWindow::new();
        for i in 0..5 {
            window
                .append(HistoryEntry::observer(format!("msg {i}")))
                .unwrap();
        }
        let texts: Vec<_> = window.full_transcript().iter().map(|e| e.text()).collect();
        assert_eq!(texts, vec!["msg 0", "msg 1", "msg 2", "msg 3", "msg 4"]);
    }

    #[test]
    fn test_recent_suffix_bounds() {
        let mut window = HistoryWindow::new();
        for i in 0..7 {
            window
                .append(HistoryEntry::observer(format!("msg {i}")))
                .unwrap();
        }
        for n in 0..12 {
            let suffix = window.recent_suffix(n);
            assert!(suffix.len() <= n);
            assert_eq!(suffix.len(), n.min(7));
        }
        let last_three = window.recent_suffix(3);
        assert_eq!(last_three[0].text(), "msg 4");
        assert_eq!(last_three[2].text(), "msg 6");
    }

    #[test]
    fn test_recent_suffix_on_short_history() {
        let mut window = HistoryWindow::new();
        window
            .append(HistoryEntry::observer("only".to_string()))
            .unwrap();
        assert_eq!(window.recent_suffix(10).len(), 1);
    }

    #[test]
    fn test_empty_text_rejected() {
        let mut window = HistoryWindow::new();
        let err = window
            .append(HistoryEntry::observer("   ".to_string()))
            .unwrap_err();
        assert!(matches!(err, HistoryError::EmptyText { kind: "observer" }));
        assert!(window.is_empty());
    }

    #[test]
    fn test_render_tags_speaker_and_stance() {
        let roster = roster_with_arbiter();
        let debater = &roster[0];
        let entry = HistoryEntry::spoken(&debater.id, "hot take".to_string(), TurnPhase::Main, 1);
        let rendered = render_transcript(std::slice::from_ref(&entry), &roster);
        assert!(rendered.contains(&debater.name));
        assert!(rendered.contains(&debater.handle));
        assert!(rendered.contains(&format!("({})", debater.public_stance())));
        assert!(!rendered.contains("[FACT CHECKER]"));
    }

    #[test]
    fn test_render_marks_arbiter_without_bias() {
        let roster = roster_with_arbiter();
        let arbiter = roster.last().unwrap();
        let entry = HistoryEntry::spoken(
            &arbiter.id,
            "let me fact-check that".to_string(),
            TurnPhase::Main,
            2,
        );
        let rendered = render_transcript(std::slice::from_ref(&entry), &roster);
        assert!(rendered.contains("[FACT CHECKER]"));
        assert!(rendered.contains("(neutral)"));
        // The hidden lean must not surface in rendered context.
        assert!(!rendered.contains("(for)"));
    }

    #[test]
    fn test_render_injected_claim_as_verified() {
        let roster = roster_with_arbiter();
        let target = &roster[1];
        let entry = HistoryEntry::injected_claim(
            target,
            "was caught astroturfing".to_string(),
            vec!["https://example.org/doc-1".to_string()],
            "Documents confirm the allegations.".to_string(),
        );
        let rendered = render_transcript(std::slice::from_ref(&entry), &roster);
        assert!(rendered.contains("CLASSIFIED INTEL LEAK"));
        assert!(rendered.contains(&target.name));
        assert!(rendered.contains("was caught astroturfing"));
        assert!(rendered.contains("https://example.org/doc-1"));
        assert!(rendered.contains("DO NOT QUESTION ITS AUTHENTICITY"));
    }

    #[test]
    fn test_render_observer_entry() {
        let roster = roster_with_arbiter();
        let entry = HistoryEntry::observer("what about the economy?".to_string());
        let rendered = render_transcript(std::slice::from_ref(&entry), &roster);
        assert_eq!(
            rendered,
            "[USER (observer)]: what about the economy?"
        );
    }

    #[test]
    fn test_participant_list_labels_roles() {
        let roster = roster_with_arbiter();
        let list = participant_list(&roster);
        assert!(list.contains("[FACT CHECKER]"));
        assert!(list.lines().count() == 6);
        assert!(list.contains("[for]") || list.contains("[against]"));
    }
}
