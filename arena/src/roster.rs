//! Participant registry: builds the immutable roster for one debate session.
//!
//! Generates debaters with unique display names and @handles drawn from
//! fixed pools, distinct personas drawn without replacement, and optionally
//! appends the arbiter participant with a hidden bias.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::stance::{assign_slots, DeclaredStance};

/// Hard cap on regeneration attempts before the numeric-suffix fallback.
const MAX_COLLISION_RETRIES: u32 = 20;

const NAME_PREFIXES: &[&str] = &[
    "xX_", "xx", "not_", "the_real_", "actually_", "totally_", "definitely_", "Sir_", "Lord_",
    "Big_", "Lil_", "Mr_", "Dr_", "Captain_", "el_", "dark_", "based_", "chad_", "angry_",
    "chill_", "just_a_", "im_", "pro_", "anti_", "mega_", "ultra_", "super_", "hyper_", "crypto_",
];

const NAME_CORES: &[&str] = &[
    "DebateBro", "ArgumentKing", "FactsAndLogic", "TruthSeeker", "Contrarian", "DevilsAdvocate",
    "KeyboardWarrior", "Redditor", "Philosopher", "Thinker", "Skeptic", "Realist", "Pragmatist",
    "Idealist", "CouchExpert", "ArmchairGeneral", "WellActually", "SourcePlease", "NPC_Destroyer",
    "OpinionHaver", "HotTakeMachine", "ThesisDefender", "LogicLord", "DebateMeIRL",
    "CriticalThinker", "StrawmanSlayer", "FallacyHunter", "TouchGrass", "IReadTheArticle",
    "DataDriven", "PeerReviewed", "Triggered", "BasedAndPilled", "CopiumDealer", "RatioKing",
    "SauceProvider", "BackInMyDay", "SlipperySlope", "BothSides", "GigaBrain", "SmoothBrain",
    "TrustMeBro", "VibeChecker",
];

const NAME_SUFFIXES: &[&str] = &[
    "_69", "_420", "_xD", "_v2", "_irl", "_fr", "_btw", "_lol", "_2026", "_HD", "_PRO",
    "_official", "_real", "_based", "1337", "9000", "99", "007", "_CEO", "_PhD", "_esq",
    // empty = no suffix, weighted to be common
    "", "", "", "", "", "",
];

const HANDLE_SUFFIXES: &[&str] = &[
    "69", "420", "_v2", "_xd", "_irl", "_99", "007", "_pro", "_hd", "1337", "_real", "_og", "42",
    "_xx", "_boss", "_guru",
];

const PERSONAS: &[&str] = &[
    "analytical data-nerd, cites studies obsessively, cold precision, buries opponents in statistics",
    "emotional CAPS LOCK warrior, appeals to morality, takes everything as a personal attack",
    "pseudo-intellectual philosopher, drops Nietzsche quotes mid-argument, insufferably smug",
    "brutally pragmatic realist, zero patience for theory, blunt, calls out hypocrisy on sight",
    "professional devil's advocate, questions every assumption, lives to see people squirm",
    "unhinged chaos agent, jumps topics like a pinball, somehow still makes great points",
    "verbal assassin, weaponized sarcasm, holds grudges within the debate",
    "condescending know-it-all, passive-aggressive 'well actually' energy",
    "street-smart hustler, cuts through academic pretension, trusts no institution",
    "conspiracy-brain extraordinaire, connects dots others can't see, right often enough to be dangerous",
    "terminally online debate lord, treats arguments as competitive sport, keeps a mental scoreboard",
    "bitter ex-academic, deep knowledge mixed with contempt for the peer review process",
];

const ARBITER_PERSONA: &str = "authoritative fact-checker with dry wit, unshakeable confidence, \
    cites prestigious sources, treats debaters like students who haven't done their homework";

/// Debater color pool, indexed by roster position.
const DEBATER_COLORS: &[&str] = &["#2AABEE", "#E53935", "#43A047", "#FB8C00", "#8E24AA"];
const ARBITER_COLOR: &str = "#FFD700";

pub const ARBITER_NAME: &str = "FactCheck_Bot";
pub const ARBITER_HANDLE: &str = "@factcheck_bot";

/// Hidden lean of the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    For,
    Against,
}

impl std::fmt::Display for Bias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::For => write!(f, "for"),
            Self::Against => write!(f, "against"),
        }
    }
}

/// How the arbiter's hidden bias is chosen at session setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasPolicy {
    For,
    Against,
    Random,
}

impl BiasPolicy {
    /// Resolve the policy to a concrete bias.
    pub fn resolve<R: Rng>(self, rng: &mut R) -> Bias {
        match self {
            Self::For => Bias::For,
            Self::Against => Bias::Against,
            Self::Random => {
                if rng.gen_bool(0.5) {
                    Bias::For
                } else {
                    Bias::Against
                }
            }
        }
    }
}

/// Publicly declared position of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    For,
    Against,
    Neutral,
}

impl std::fmt::Display for Stance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::For => write!(f, "for"),
            Self::Against => write!(f, "against"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// Role of a participant, with the per-kind state each role carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Role {
    /// Fixed-stance debater. `swing` marks the slot whose stance resolved
    /// randomly at assignment time (analytics only).
    Debater { stance: DeclaredStance, swing: bool },
    /// Publicly neutral arbiter with a hidden lean.
    Arbiter { bias: Bias },
}

/// One participant in a debate session. Created at setup, immutable after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub handle: String,
    pub initials: String,
    pub color: String,
    /// Free-text persona descriptor, opaque to the core.
    pub persona: String,
    pub role: Role,
}

impl Participant {
    /// Whether this participant is the arbiter.
    pub fn is_arbiter(&self) -> bool {
        matches!(self.role, Role::Arbiter { .. })
    }

    /// The stance shown in every outward-facing projection.
    pub fn public_stance(&self) -> Stance {
        match self.role {
            Role::Debater { stance, .. } => stance.into(),
            Role::Arbiter { .. } => Stance::Neutral,
        }
    }

    /// Privileged projection: the arbiter's hidden bias, for post-hoc
    /// disclosure only. Never routed through the event protocol.
    pub fn reveal_bias(&self) -> Option<Bias> {
        match self.role {
            Role::Arbiter { bias } => Some(bias),
            Role::Debater { .. } => None,
        }
    }

    /// Bias-free projection for the `roster_ready` event.
    pub fn to_public(&self) -> PublicParticipant {
        PublicParticipant {
            id: self.id.clone(),
            name: self.name.clone(),
            handle: self.handle.clone(),
            initials: self.initials.clone(),
            color: self.color.clone(),
            stance: self.public_stance(),
            is_arbiter: self.is_arbiter(),
        }
    }

    /// Archive projection with the hidden bias disclosed.
    pub fn to_revealed(&self) -> RevealedParticipant {
        RevealedParticipant {
            public: self.to_public(),
            bias: self.reveal_bias(),
        }
    }
}

/// Outward-facing participant record. The hidden bias is structurally absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicParticipant {
    pub id: String,
    pub name: String,
    pub handle: String,
    pub initials: String,
    pub color: String,
    pub stance: Stance,
    pub is_arbiter: bool,
}

/// Archive-only projection used for post-hoc UI disclosure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedParticipant {
    #[serde(flatten)]
    pub public: PublicParticipant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bias: Option<Bias>,
}

/// Error from roster construction.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("persona pool exhausted: requested {requested}, pool holds {available}")]
    PoolExhausted { requested: usize, available: usize },
}

/// Builds the roster for one session.
pub struct RosterBuilder {
    size: usize,
    arbiter: Option<BiasPolicy>,
}

impl RosterBuilder {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            arbiter: None,
        }
    }

    /// Request an arbiter with the given bias policy.
    pub fn with_arbiter(mut self, policy: BiasPolicy) -> Self {
        self.arbiter = Some(policy);
        self
    }

    /// Build the full roster: debaters with assigned stances, then the
    /// arbiter if requested. Fails closed when the persona pool is smaller
    /// than the requested cardinality.
    pub fn build<R: Rng>(self, rng: &mut R) -> Result<Vec<Participant>, RosterError> {
        if self.size > PERSONAS.len() {
            return Err(RosterError::PoolExhausted {
                requested: self.size,
                available: PERSONAS.len(),
            });
        }

        let names = generate_unique_names(self.size, rng);
        let handles = generate_unique_handles(&names, rng);
        let mut personas: Vec<&str> = PERSONAS.to_vec();
        personas.shuffle(rng);
        let slots = assign_slots(self.size, rng);

        let mut roster: Vec<Participant> = names
            .into_iter()
            .zip(handles)
            .zip(personas)
            .zip(slots)
            .enumerate()
            .map(|(i, (((name, handle), persona), slot))| Participant {
                id: uuid::Uuid::new_v4().to_string(),
                initials: initials_of(&name),
                color: DEBATER_COLORS[i % DEBATER_COLORS.len()].to_string(),
                persona: persona.to_string(),
                role: Role::Debater {
                    stance: slot.stance,
                    swing: slot.swing,
                },
                name,
                handle,
            })
            .collect();

        if let Some(policy) = self.arbiter {
            let bias = policy.resolve(rng);
            tracing::debug!(%bias, "arbiter joins roster");
            roster.push(Participant {
                id: uuid::Uuid::new_v4().to_string(),
                name: ARBITER_NAME.to_string(),
                handle: ARBITER_HANDLE.to_string(),
                initials: "FC".to_string(),
                color: ARBITER_COLOR.to_string(),
                persona: ARBITER_PERSONA.to_string(),
                role: Role::Arbiter { bias },
            });
        }

        Ok(roster)
    }
}

fn initials_of(name: &str) -> String {
    name.chars().take(2).collect::<String>().to_uppercase()
}

fn generate_name<R: Rng>(rng: &mut R) -> String {
    let prefix = if rng.gen_bool(0.55) {
        NAME_PREFIXES[rng.gen_range(0..NAME_PREFIXES.len())]
    } else {
        ""
    };
    let core = NAME_CORES[rng.gen_range(0..NAME_CORES.len())];
    let suffix = if rng.gen_bool(0.65) {
        NAME_SUFFIXES[rng.gen_range(0..NAME_SUFFIXES.len())]
    } else {
        ""
    };
    format!("{prefix}{core}{suffix}")
}

fn generate_unique_names<R: Rng>(count: usize, rng: &mut R) -> Vec<String> {
    let mut used = HashSet::new();
    let mut names = Vec::with_capacity(count);
    while names.len() < count {
        let mut name = generate_name(rng);
        let mut attempts = 0;
        while used.contains(&name) && attempts < MAX_COLLISION_RETRIES {
            name = generate_name(rng);
            attempts += 1;
        }
        if used.contains(&name) {
            // Bounded retries exhausted, disambiguate numerically.
            name = numeric_disambiguate(&name, &used, rng);
        }
        used.insert(name.clone());
        names.push(name);
    }
    names
}

/// Derive a lowercase @handle from a display name: strip the decorative
/// affixes, snake_case the core, append a random handle suffix.
fn derive_handle<R: Rng>(name: &str, rng: &mut R) -> String {
    let mut base = name;
    for prefix in NAME_PREFIXES {
        if let Some(rest) = base.strip_prefix(prefix) {
            base = rest;
            break;
        }
    }
    for suffix in NAME_SUFFIXES {
        if suffix.is_empty() {
            continue;
        }
        if let Some(rest) = base.strip_suffix(suffix) {
            base = rest;
            break;
        }
    }

    let mut snaked = String::with_capacity(base.len() + 4);
    let mut prev_lower = false;
    for c in base.chars() {
        if c.is_uppercase() && prev_lower {
            snaked.push('_');
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        for lc in c.to_lowercase() {
            snaked.push(lc);
        }
    }

    let suffix = HANDLE_SUFFIXES[rng.gen_range(0..HANDLE_SUFFIXES.len())];
    format!("@{snaked}{suffix}")
}

fn generate_unique_handles<R: Rng>(names: &[String], rng: &mut R) -> Vec<String> {
    let mut used = HashSet::new();
    let mut handles = Vec::with_capacity(names.len());
    for name in names {
        let mut handle = derive_handle(name, rng);
        let mut attempts = 0;
        while used.contains(&handle) && attempts < MAX_COLLISION_RETRIES {
            handle = derive_handle(name, rng);
            attempts += 1;
        }
        if used.contains(&handle) {
            handle = numeric_disambiguate(&handle, &used, rng);
        }
        used.insert(handle.clone());
        handles.push(handle);
    }
    handles
}

/// Append random digits until the candidate clears the used set. Each
/// iteration widens the digit range, so termination is guaranteed.
fn numeric_disambiguate<R: Rng>(base: &str, used: &HashSet<String>, rng: &mut R) -> String {
    let mut bound: u64 = 1000;
    loop {
        let candidate = format!("{base}{}", rng.gen_range(0..bound));
        if !used.contains(&candidate) {
            return candidate;
        }
        bound = bound.saturating_mul(10);
    }
}
