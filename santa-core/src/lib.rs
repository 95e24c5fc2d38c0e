use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

pub type Name = String;

/// Giver -> recipient mapping for one year's exchange.
pub type Assignment = HashMap<Name, Name>;

/// Maximum number of randomized attempts before a draw gives up.
pub const MAX_ATTEMPTS: usize = 32;

/// Input data for a draw: who is excluded from whom.
///
/// The participant universe is the union of all couple groups, so every
/// participant must appear in at least one group (singletons are fine).
/// `previous` lists recipients a giver had in earlier years and may therefore
/// not be matched with again.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Roster {
    pub couples: Vec<Vec<Name>>,
    #[serde(default)]
    pub previous: HashMap<Name, Vec<Name>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("at least two participants are required, got {0}")]
    NotEnoughParticipants(usize),
    #[error("no valid assignment found after {0} attempts")]
    Unsatisfiable(usize),
}

impl MatchError {
    /// True for errors caused by the input data rather than search exhaustion.
    pub fn is_configuration(&self) -> bool {
        matches!(self, MatchError::NotEnoughParticipants(_))
    }
}

#[derive(Debug, Clone)]
pub struct Matcher {
    names: Vec<Name>,
    forbidden: HashMap<Name, HashSet<Name>>,
}

impl Matcher {
    pub fn new(roster: &Roster) -> Self {
        let names: Vec<Name> = roster
            .couples
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut forbidden: HashMap<Name, HashSet<Name>> = HashMap::new();
        for name in &names {
            let set = forbidden.entry(name.clone()).or_default();
            // self-exclusion plus everyone sharing a couple group
            set.insert(name.clone());
            for couple in &roster.couples {
                if couple.contains(name) {
                    set.extend(couple.iter().cloned());
                }
            }
            if let Some(prior) = roster.previous.get(name) {
                set.extend(prior.iter().cloned());
            }
        }

        Self { names, forbidden }
    }

    pub fn names(&self) -> &[Name] {
        &self.names
    }

    /// Recipients the giver could be matched with under the static
    /// constraints alone. Empty for names outside the roster.
    pub fn eligible_names(&self, giver: &str) -> Vec<Name> {
        let Some(forbidden) = self.forbidden.get(giver) else {
            return Vec::new();
        };
        self.names
            .iter()
            .filter(|candidate| !forbidden.contains(*candidate))
            .cloned()
            .collect()
    }

    pub fn draw(&self) -> Result<Assignment, MatchError> {
        self.draw_with_rng(&mut thread_rng())
    }

    pub fn draw_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Assignment, MatchError> {
        if self.names.len() < 2 {
            return Err(MatchError::NotEnoughParticipants(self.names.len()));
        }

        for _ in 0..MAX_ATTEMPTS {
            if let Some(assignment) = self.attempt(rng) {
                self.check_bijection(&assignment);
                return Ok(assignment);
            }
        }

        Err(MatchError::Unsatisfiable(MAX_ATTEMPTS))
    }

    /// One greedy pass over the givers. `None` on a dead end: some giver was
    /// left with no eligible recipient, and the caller retries from scratch.
    fn attempt<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Assignment> {
        let mut assignment = Assignment::with_capacity(self.names.len());
        let mut taken: HashSet<&Name> = HashSet::with_capacity(self.names.len());

        for giver in &self.names {
            let forbidden = &self.forbidden[giver];
            let eligible: Vec<&Name> = self
                .names
                .iter()
                .filter(|candidate| !taken.contains(*candidate) && !forbidden.contains(*candidate))
                .collect();
            let recipient = *eligible.choose(rng)?;
            taken.insert(recipient);
            assignment.insert(giver.clone(), recipient.clone());
        }

        Some(assignment)
    }

    /// Every giver gives once and every participant receives once. A failure
    /// here is a bug in the eligible-set bookkeeping, not bad input, so it
    /// aborts instead of surfacing as a `MatchError`.
    fn check_bijection(&self, assignment: &Assignment) {
        let names: HashSet<&Name> = self.names.iter().collect();
        let givers: HashSet<&Name> = assignment.keys().collect();
        let recipients: HashSet<&Name> = assignment.values().collect();
        assert!(
            givers == names && recipients == names,
            "draw produced a non-bijective assignment"
        );
    }
}
