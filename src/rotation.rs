//! No-repeat random challenge selection.
//!
//! Every challenge in the bank is shown once, in random order, before any
//! of them repeats. The set of already-shown ids lives in the rotation
//! value itself; whoever owns the `ChallengeRotation` owns the cycle.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, instrument};

use crate::domain::{normalize_category, Challenge, ChallengeId};
use crate::error::CoreError;
use crate::store::ChallengeRepository;

/// Ids already shown in the current cycle.
#[derive(Debug, Default, Clone)]
pub struct RotationState {
    shown: HashSet<ChallengeId>,
}

impl RotationState {
    pub fn len(&self) -> usize {
        self.shown.len()
    }

    pub fn contains(&self, id: ChallengeId) -> bool {
        self.shown.contains(&id)
    }

    pub fn clear(&mut self) {
        self.shown.clear();
    }
}

/// Optional constraints for a one-off random pick.
#[derive(Debug, Default, Clone)]
pub struct ChallengeFilter {
    pub category: Option<String>,
    pub difficulty: Option<u8>,
}

impl ChallengeFilter {
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.difficulty.is_none()
    }

    pub fn matches(&self, c: &Challenge) -> bool {
        let category_ok = self
            .category
            .as_deref()
            .map_or(true, |want| normalize_category(want) == normalize_category(&c.category));
        let difficulty_ok = self.difficulty.map_or(true, |d| d == c.difficulty);
        category_ok && difficulty_ok
    }
}

pub struct ChallengeRotation {
    state: RotationState,
    rng: StdRng,
}

impl Default for ChallengeRotation {
    fn default() -> Self {
        Self::new()
    }
}

impl ChallengeRotation {
    pub fn new() -> Self {
        Self {
            state: RotationState::default(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic draws, for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            state: RotationState::default(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn state(&self) -> &RotationState {
        &self.state
    }

    /// Start a fresh cycle.
    pub fn reset(&mut self) {
        self.state.clear();
    }

    /// Next challenge of the current cycle, or `None` when the bank is empty.
    #[instrument(level = "debug", skip_all, fields(shown = self.state.len()))]
    pub fn next<R>(&mut self, repo: &R) -> Result<Option<Challenge>, CoreError>
    where
        R: ChallengeRepository + ?Sized,
    {
        let all = repo.list_all()?;
        if all.is_empty() {
            return Ok(None);
        }

        // The bank changed under us (a shown challenge was removed): start over.
        let known: HashSet<ChallengeId> = all.iter().map(|c| c.id).collect();
        if self.state.shown.iter().any(|id| !known.contains(id)) {
            debug!(target: "challenge", "Shown set holds removed ids; restarting cycle");
            self.state.clear();
        }

        if self.state.len() >= all.len() {
            debug!(target: "challenge", total = all.len(), "Cycle complete; restarting");
            self.state.clear();
        }

        let mut candidates: Vec<&Challenge> =
            all.iter().filter(|c| !self.state.contains(c.id)).collect();
        if candidates.is_empty() {
            self.state.clear();
            candidates = all.iter().collect();
        }

        let Some(chosen) = candidates.choose(&mut self.rng).map(|c| (*c).clone()) else {
            return Ok(None);
        };
        self.state.shown.insert(chosen.id);
        debug!(target: "challenge", id = chosen.id, remaining = all.len() - self.state.len(), "Rotation pick");
        Ok(Some(chosen))
    }

    /// Uniform pick among challenges matching `filter`. Leaves the cycle untouched.
    pub fn pick_filtered<R>(
        &mut self,
        repo: &R,
        filter: &ChallengeFilter,
    ) -> Result<Option<Challenge>, CoreError>
    where
        R: ChallengeRepository + ?Sized,
    {
        let matching: Vec<Challenge> = repo
            .list_all()?
            .into_iter()
            .filter(|c| filter.matches(c))
            .collect();
        Ok(matching.choose(&mut self.rng).cloned())
    }
}
