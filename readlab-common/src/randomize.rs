//! Deterministic per-session randomization
//!
//! Derives a stable seed from the opaque session id, picks exactly three
//! passages from the catalog, and assigns each to one of the two question
//! sources in a 2:1 split. Everything here is a pure function of
//! (catalog, session id): repeated calls yield byte-identical results across
//! process restarts, so randomization can be replayed for any participant.

use crate::content::{Catalog, Variant, MIN_ITEMS_PER_VARIANT};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Seeds live in [0, 2^31)
const SEED_MODULUS: u64 = 1 << 31;

/// Affine constants decorrelating the source seed from the selection seed
const SOURCE_SEED_MUL: u64 = 31;
const SOURCE_SEED_ADD: u64 = 7;

/// The randomization outcome for one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAssignment {
    /// Exactly three distinct catalog keys, in serving order
    pub passage_keys: [String; 3],
    /// Variant assigned to each passage key (always a 2:1 split)
    pub sources: BTreeMap<String, Variant>,
}

impl SessionAssignment {
    pub fn source_for(&self, passage_key: &str) -> Option<Variant> {
        self.sources.get(passage_key).copied()
    }
}

/// Derive the per-session selection seed from the session id
///
/// SHA-256 of the id, reduced mod 2^31. Since the modulus is a power of two,
/// the reduction is the low 31 bits of the big-endian digest value.
pub fn session_seed(session_id: &str) -> u64 {
    let digest = Sha256::digest(session_id.as_bytes());
    let tail = u32::from_be_bytes([digest[28], digest[29], digest[30], digest[31]]);
    u64::from(tail) & (SEED_MODULUS - 1)
}

/// Derive the source-assignment seed from the selection seed
///
/// A cheap affine transform so the source split does not share exploitable
/// correlation with the passage selection.
pub fn derive_source_seed(seed: u64) -> u64 {
    (seed * SOURCE_SEED_MUL + SOURCE_SEED_ADD) % SEED_MODULUS
}

/// Pick exactly 3 distinct passage keys from the catalog
///
/// Prefers passages whose question bank carries both variants at the minimum
/// item count; falls back to any passage with questions at all. Fewer than 3
/// candidates in both pools is a content-deployment error and fails loudly.
pub fn choose_three(catalog: &Catalog, seed: u64) -> Result<[String; 3]> {
    let preferred: Vec<&str> = catalog
        .passages
        .keys()
        .filter(|key| {
            catalog
                .questions
                .get(*key)
                .map_or(false, |bank| bank.has_both_variants(MIN_ITEMS_PER_VARIANT))
        })
        .map(String::as_str)
        .collect();

    let fallback: Vec<&str> = catalog
        .passages
        .keys()
        .filter(|key| catalog.questions.get(*key).map_or(false, |b| b.has_any_items()))
        .map(String::as_str)
        .collect();

    let mut pool: Vec<&str> = if preferred.len() >= 3 { preferred } else { fallback };
    if pool.len() < 3 {
        return Err(Error::Config(format!(
            "Content catalog too small: {} usable passages, need 3",
            pool.len()
        )));
    }

    // Catalog keys iterate in sorted order, so the pre-shuffle pool order is
    // stable across restarts and the shuffle alone decides the pick.
    let mut rng = StdRng::seed_from_u64(seed);
    pool.shuffle(&mut rng);

    Ok([
        pool[0].to_string(),
        pool[1].to_string(),
        pool[2].to_string(),
    ])
}

/// Assign the two variants across three passages in a 2:1 split
///
/// Which variant is the majority is a 50/50 draw; which passage gets the
/// minority is decided by shuffling the keys. Both draws use the source seed,
/// independent of the selection seed.
pub fn assign_sources(passage_keys: &[String; 3], source_seed: u64) -> BTreeMap<String, Variant> {
    let mut rng = StdRng::seed_from_u64(source_seed);

    let majority = if rng.gen_bool(0.5) {
        Variant::Baseline
    } else {
        Variant::Requesta
    };
    let minority = majority.other();

    let mut shuffled: Vec<&String> = passage_keys.iter().collect();
    shuffled.shuffle(&mut rng);

    let mut sources = BTreeMap::new();
    sources.insert(shuffled[0].clone(), majority);
    sources.insert(shuffled[1].clone(), majority);
    sources.insert(shuffled[2].clone(), minority);
    sources
}

/// Full randomization for one session: seed, selection, and source split
pub fn randomize_session(catalog: &Catalog, session_id: &str) -> Result<SessionAssignment> {
    let seed = session_seed(session_id);
    let passage_keys = choose_three(catalog, seed)?;
    let sources = assign_sources(&passage_keys, derive_source_seed(seed));
    Ok(SessionAssignment {
        passage_keys,
        sources,
    })
}
