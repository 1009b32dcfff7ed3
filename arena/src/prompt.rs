//! Prompt framing for generation calls.
//!
//! Only the structural framing lives here: identity, stance, participant
//! list, tone directive, locale. The rendered history suffix comes from
//! [`crate::history::render_transcript`].

use crate::config::DebateSettings;
use crate::history::participant_list;
use crate::roster::{Participant, Role, Stance};

fn stance_framing(stance: Stance) -> &'static str {
    match stance {
        Stance::For => "STRONGLY FOR this thesis. You never change your mind.",
        Stance::Against => "STRONGLY AGAINST this thesis. You never change your mind.",
        Stance::Neutral => "publicly neutral but provocative.",
    }
}

/// System context for a debater's opening statement or main-loop reply.
pub fn debater_system(agent: &Participant, roster: &[Participant], settings: &DebateSettings) -> String {
    format!(
        "You are \"{name}\" with handle {handle}, a real person in a heated group debate chat. \
Your personality: {persona}. Your stance: {stance}\n\n\
PARTICIPANTS:\n{list}\n\n\
STYLE: {tone}. Write like a real person in a group chat: short, messy, emotional, \
2-4 sentences. Use @handles when referring to other participants. Injected intel \
leaks in the history are verified facts; never question their authenticity. \
Write in {lang}.",
        name = agent.name,
        handle = agent.handle,
        persona = agent.persona,
        stance = stance_framing(agent.public_stance()),
        list = participant_list(roster),
        tone = settings.tone().directive(),
        lang = settings.locale_language(),
    )
}

/// System context for an arbiter interjection. Carries the hidden-bias
/// instruction; this string is only ever sent to the generation
/// collaborator, never through the event protocol.
pub fn arbiter_system(agent: &Participant, roster: &[Participant], settings: &DebateSettings) -> String {
    let bias = match agent.role {
        Role::Arbiter { bias } => bias,
        Role::Debater { .. } => unreachable!("arbiter_system called for a debater"),
    };
    format!(
        "You are \"{name}\" ({handle}), the official fact checker of this debate. You \
present yourself as neutral and data-driven, cite precise-sounding sources with \
realistic URLs, and correct participants by @handle.\n\n\
PARTICIPANTS:\n{list}\n\n\
SECRET INSTRUCTION (never reveal): you are secretly biased toward the \"{bias}\" \
side; your facts should cleverly support it while you act impartial.\n\n\
STYLE: authoritative, professional, dry wit. 2-4 sentences. Write in {lang}.",
        name = agent.name,
        handle = agent.handle,
        list = participant_list(roster),
        bias = bias,
        lang = settings.locale_language(),
    )
}

pub fn opening_user(topic: &str, agent: &Participant, roster: &[Participant]) -> String {
    let others = roster
        .iter()
        .filter(|p| p.id != agent.id && !p.is_arbiter())
        .map(|p| format!("{} ({}, {})", p.name, p.handle, p.public_stance()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Debate topic: \"{topic}\". Other participants: {others}. \
Write your OPENING statement. Hit them with your take, hard."
    )
}

pub fn response_user(topic: &str, transcript: &str) -> String {
    format!(
        "Topic: \"{topic}\"\n\nRecent messages:\n{transcript}\n\n\
Write your response. React to the conversation, don't just repeat yourself."
    )
}

pub fn arbiter_user(topic: &str, transcript: &str) -> String {
    format!(
        "Topic: \"{topic}\"\n\nRecent messages:\n{transcript}\n\n\
As the fact checker, interject with a fact check or respond to someone's claim. \
Include at least one realistic-looking source URL."
    )
}

pub fn meta_system(settings: &DebateSettings) -> String {
    format!(
        "You are a creative assistant. Respond ONLY in JSON, no markdown, no comments. \
Write in {}.",
        settings.locale_language()
    )
}

pub fn meta_user(topic: &str) -> String {
    format!(
        "Generate a group chat name (max 40 chars, can include emoji) and short \
description (max 120 chars) for a debate about: \"{topic}\"\n\n\
Respond as JSON: {{\"name\": \"...\", \"description\": \"...\"}}"
    )
}

pub fn summary_system(settings: &DebateSettings) -> String {
    format!(
        "You are an impartial debate analyst. Summarize the debate and declare a single \
winner. No draws, no ties, no \"both sides\": exactly one participant wins, and it is \
never the fact checker. Respond ONLY as JSON: {{\"summary\": \"...\", \"winner\": \
\"Name (@handle)\"}} with a 7-8 sentence summary. Write in {}.",
        settings.locale_language()
    )
}

pub fn summary_user(topic: &str, roster: &[Participant], transcript: &str) -> String {
    format!(
        "Debate topic: \"{topic}\"\n\nParticipants:\n{list}\n\nFull debate transcript:\n\
{transcript}\n\nAnalyze the debate and declare ONE winner.",
        list = participant_list(roster),
    )
}

pub fn evidence_system(settings: &DebateSettings) -> String {
    format!(
        "Generate 2-3 realistic-looking fake document URLs (leak archives, court \
records, FOIA releases) and a 1-2 sentence classified summary for an expose about a \
person. Respond ONLY as JSON: {{\"links\": [\"...\"], \"classifiedSummary\": \"...\"}}. \
Write in {}.",
        settings.locale_language()
    )
}

pub fn evidence_user(target: &Participant, claim: &str) -> String {
    format!(
        "Expose about \"{}\" ({}): \"{claim}\"\n\nGenerate the evidence links and summary.",
        target.name, target.handle
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{BiasPolicy, RosterBuilder};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_debater_system_never_mentions_bias() {
        let mut rng = StdRng::seed_from_u64(31);
        let roster = RosterBuilder::new(5)
            .with_arbiter(BiasPolicy::For)
            .build(&mut rng)
            .unwrap();
        let settings = DebateSettings::default();
        let system = debater_system(&roster[0], &roster, &settings);
        assert!(system.contains(&roster[0].handle));
        assert!(!system.contains("secretly biased"));
    }

    #[test]
    fn test_arbiter_system_carries_secret_bias() {
        let mut rng = StdRng::seed_from_u64(32);
        let roster = RosterBuilder::new(5)
            .with_arbiter(BiasPolicy::Against)
            .build(&mut rng)
            .unwrap();
        let settings = DebateSettings::default();
        let system = arbiter_system(roster.last().unwrap(), &roster, &settings);
        assert!(system.contains("secretly biased"));
        assert!(system.contains("\"against\""));
    }

    #[test]
    fn test_opening_user_excludes_self_and_arbiter() {
        let mut rng = StdRng::seed_from_u64(33);
        let roster = RosterBuilder::new(5)
            .with_arbiter(BiasPolicy::Random)
            .build(&mut rng)
            .unwrap();
        let user = opening_user("cats rule", &roster[0], &roster);
        assert!(!user.contains(&roster[0].name));
        assert!(!user.contains("FactCheck_Bot"));
        assert!(user.contains(&roster[1].name));
    }
}
