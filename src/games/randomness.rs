//! Outcome derivation
//!
//! The resolution engine only sees [`RandomnessSource`]. Three sources exist:
//!
//! - [`PublicDeterministic`]: seed = game id + height + first 8 bytes of
//!   `hash(game_id || height)`. Anyone can recompute it, and anyone who can
//!   choose the resolution height can bias it. This is the default.
//! - [`VrfRandomness`]: schnorrkel VRF over the same input; the outcome is
//!   fixed by the house key and publicly verifiable against its public key.
//! - [`CommitRevealRandomness`]: a house seed committed by SHA-256, mixed
//!   with the public input; auditable once the seed is revealed.

use crate::common::traits::EntropySource;
use crate::common::types::GameId;
use crate::config::RandomnessMode;
use crate::errors::{DiceResult, RandomnessError, StorageError};
use crate::games::types::{DieFace, RandomnessKind, RollProof};
use crate::storage::KVStore;
use schnorrkel::vrf::{VRFPreOut, VRFProof};
use schnorrkel::{signing_context, ExpansionMode, Keypair, MiniSecretKey};
use sha2::{Digest, Sha256};
use std::sync::Arc;

const VRF_SIGNING_CONTEXT: &[u8] = b"dicehouse:roll";
const VRF_OUTPUT_CONTEXT: &[u8] = b"dicehouse:die";
const VRF_SEED_KEY: &[u8] = b"randomness:vrf_seed";
const COMMIT_SEED_KEY: &[u8] = b"randomness:commit_seed";

pub trait RandomnessSource: Send + Sync {
    fn kind(&self) -> RandomnessKind;

    /// Derive the outcome for `game_id` resolved at `height`
    fn roll(&self, game_id: GameId, height: u64, entropy: &dyn EntropySource) -> DiceResult<RollProof>;

    /// Check that `proof` is what this source produces for the same input
    fn verify(
        &self,
        game_id: GameId,
        height: u64,
        proof: &RollProof,
        entropy: &dyn EntropySource,
    ) -> DiceResult<bool>;
}

/// `game_id || height`, both big-endian
fn roll_input(game_id: GameId, height: u64) -> [u8; 16] {
    let mut input = [0u8; 16];
    input[..8].copy_from_slice(&game_id.to_be_bytes());
    input[8..].copy_from_slice(&height.to_be_bytes());
    input
}

/// Input message mixed with its public digest
fn roll_message(game_id: GameId, height: u64, entropy: &dyn EntropySource) -> Vec<u8> {
    let input = roll_input(game_id, height);
    let mut message = Vec::with_capacity(48);
    message.extend_from_slice(&input);
    message.extend_from_slice(&entropy.hash(&input));
    message
}

fn seed_from_bytes(bytes: &[u8]) -> u128 {
    let mut head = [0u8; 16];
    let len = bytes.len().min(16);
    head[..len].copy_from_slice(&bytes[..len]);
    u128::from_be_bytes(head)
}

fn check_kind(expected: RandomnessKind, proof: &RollProof) -> DiceResult<()> {
    if proof.kind != expected {
        return Err(RandomnessError::SourceMismatch {
            expected: expected.to_string(),
            found: proof.kind.to_string(),
        }
        .into());
    }
    Ok(())
}

fn load_seed(storage: &dyn KVStore, key: &[u8]) -> DiceResult<Option<[u8; 32]>> {
    let Some(existing) = storage.get(key)? else {
        return Ok(None);
    };
    let seed: [u8; 32] = existing.try_into().map_err(|_| {
        StorageError::CorruptedData(format!(
            "{} must be 32 bytes",
            String::from_utf8_lossy(key)
        ))
    })?;
    Ok(Some(seed))
}

fn fresh_seed() -> [u8; 32] {
    use rand_core::{OsRng, RngCore};
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    seed
}

/// Build the source selected by configuration, persisting key material in
/// `storage` so that outcomes stay verifiable across restarts.
pub fn build_randomness(
    mode: RandomnessMode,
    storage: &dyn KVStore,
) -> DiceResult<Arc<dyn RandomnessSource>> {
    let source: Arc<dyn RandomnessSource> = match mode {
        RandomnessMode::Public => Arc::new(PublicDeterministic),
        RandomnessMode::Vrf => Arc::new(VrfRandomness::load_or_create(storage)?),
        RandomnessMode::CommitReveal => Arc::new(CommitRevealRandomness::load_or_create(storage)?),
    };
    tracing::info!(kind = %source.kind(), "Randomness source ready");
    Ok(source)
}

// ============================================================================
// Public deterministic derivation
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct PublicDeterministic;

impl PublicDeterministic {
    pub fn seed(game_id: GameId, height: u64, entropy: &dyn EntropySource) -> u128 {
        let digest = entropy.hash(&roll_input(game_id, height));
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        game_id as u128 + height as u128 + u64::from_be_bytes(head) as u128
    }

    pub fn outcome(game_id: GameId, height: u64, entropy: &dyn EntropySource) -> DieFace {
        DieFace::from_seed(Self::seed(game_id, height, entropy))
    }
}

impl RandomnessSource for PublicDeterministic {
    fn kind(&self) -> RandomnessKind {
        RandomnessKind::Public
    }

    fn roll(&self, game_id: GameId, height: u64, entropy: &dyn EntropySource) -> DiceResult<RollProof> {
        let seed = Self::seed(game_id, height, entropy);
        Ok(RollProof {
            kind: RandomnessKind::Public,
            outcome: DieFace::from_seed(seed),
            seed: seed.to_string(),
            output: None,
            proof: None,
        })
    }

    fn verify(
        &self,
        game_id: GameId,
        height: u64,
        proof: &RollProof,
        entropy: &dyn EntropySource,
    ) -> DiceResult<bool> {
        check_kind(RandomnessKind::Public, proof)?;
        let seed = Self::seed(game_id, height, entropy);
        Ok(proof.seed == seed.to_string() && proof.outcome == DieFace::from_seed(seed))
    }
}

// ============================================================================
// VRF derivation
// ============================================================================

pub struct VrfRandomness {
    keypair: Arc<Keypair>,
}

impl VrfRandomness {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    pub fn from_seed(seed: &[u8; 32]) -> DiceResult<Self> {
        let mini = MiniSecretKey::from_bytes(seed)
            .map_err(|e| RandomnessError::InvalidKey(format!("{:?}", e)))?;
        Ok(Self::new(mini.expand_to_keypair(ExpansionMode::Ed25519)))
    }

    /// Reuse the VRF key stored in `storage`, or create and store one
    pub fn load_or_create(storage: &dyn KVStore) -> DiceResult<Self> {
        if let Some(seed) = load_seed(storage, VRF_SEED_KEY)? {
            return Self::from_seed(&seed);
        }

        let seed = fresh_seed();
        storage.put(VRF_SEED_KEY, &seed)?;
        tracing::info!("Generated new VRF key");
        Self::from_seed(&seed)
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.keypair.public.to_bytes())
    }

    fn seed_from_inout(io: &schnorrkel::vrf::VRFInOut) -> u128 {
        let bytes: [u8; 32] = io.make_bytes(VRF_OUTPUT_CONTEXT);
        seed_from_bytes(&bytes)
    }
}

impl RandomnessSource for VrfRandomness {
    fn kind(&self) -> RandomnessKind {
        RandomnessKind::Vrf
    }

    fn roll(&self, game_id: GameId, height: u64, entropy: &dyn EntropySource) -> DiceResult<RollProof> {
        let message = roll_message(game_id, height, entropy);
        let transcript = signing_context(VRF_SIGNING_CONTEXT).bytes(&message);
        let (io, proof, _) = self.keypair.vrf_sign(transcript);

        let seed = Self::seed_from_inout(&io);
        Ok(RollProof {
            kind: RandomnessKind::Vrf,
            outcome: DieFace::from_seed(seed),
            seed: seed.to_string(),
            output: Some(hex::encode(io.to_preout().to_bytes())),
            proof: Some(hex::encode(proof.to_bytes())),
        })
    }

    fn verify(
        &self,
        game_id: GameId,
        height: u64,
        proof: &RollProof,
        entropy: &dyn EntropySource,
    ) -> DiceResult<bool> {
        check_kind(RandomnessKind::Vrf, proof)?;

        let (Some(output_hex), Some(proof_hex)) = (&proof.output, &proof.proof) else {
            return Err(RandomnessError::MalformedProof("missing VRF output or proof".to_string()).into());
        };
        let output_bytes = hex::decode(output_hex)
            .map_err(|e| RandomnessError::MalformedProof(format!("VRF output hex: {}", e)))?;
        let proof_bytes = hex::decode(proof_hex)
            .map_err(|e| RandomnessError::MalformedProof(format!("VRF proof hex: {}", e)))?;

        let preout = VRFPreOut::from_bytes(&output_bytes)
            .map_err(|e| RandomnessError::MalformedProof(format!("VRF output: {:?}", e)))?;
        let vrf_proof = VRFProof::from_bytes(&proof_bytes)
            .map_err(|e| RandomnessError::MalformedProof(format!("VRF proof: {:?}", e)))?;

        let message = roll_message(game_id, height, entropy);
        let transcript = signing_context(VRF_SIGNING_CONTEXT).bytes(&message);
        let Ok((io, _)) = self.keypair.public.vrf_verify(transcript, &preout, &vrf_proof) else {
            return Ok(false);
        };

        let seed = Self::seed_from_inout(&io);
        Ok(proof.seed == seed.to_string() && proof.outcome == DieFace::from_seed(seed))
    }
}

// ============================================================================
// Commit-reveal derivation
// ============================================================================

pub struct CommitRevealRandomness {
    seed: [u8; 32],
    commitment: [u8; 32],
}

impl CommitRevealRandomness {
    pub fn new(seed: [u8; 32]) -> Self {
        let commitment = Sha256::digest(seed).into();
        Self { seed, commitment }
    }

    /// Reuse the house seed stored in `storage`, or create and store one
    pub fn load_or_create(storage: &dyn KVStore) -> DiceResult<Self> {
        if let Some(seed) = load_seed(storage, COMMIT_SEED_KEY)? {
            return Ok(Self::new(seed));
        }

        let seed = fresh_seed();
        storage.put(COMMIT_SEED_KEY, &seed)?;
        let source = Self::new(seed);
        tracing::info!(commitment = %source.commitment_hex(), "Committed new house seed");
        Ok(source)
    }

    pub fn commitment_hex(&self) -> String {
        hex::encode(self.commitment)
    }

    /// Disclose the house seed for audit
    pub fn reveal_hex(&self) -> String {
        hex::encode(self.seed)
    }

    fn digest(seed: &[u8; 32], game_id: GameId, height: u64, entropy: &dyn EntropySource) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(roll_message(game_id, height, entropy));
        hasher.finalize().into()
    }

    fn matches(
        seed: &[u8; 32],
        game_id: GameId,
        height: u64,
        proof: &RollProof,
        entropy: &dyn EntropySource,
    ) -> bool {
        let commitment: [u8; 32] = Sha256::digest(seed).into();
        if proof.proof.as_deref() != Some(hex::encode(commitment).as_str()) {
            return false;
        }
        let digest = Self::digest(seed, game_id, height, entropy);
        let value = seed_from_bytes(&digest);
        proof.seed == value.to_string()
            && proof.outcome == DieFace::from_seed(value)
            && proof.output.as_deref() == Some(hex::encode(digest).as_str())
    }

    /// Audit a proof with a seed revealed by the house
    pub fn verify_revealed(
        revealed_seed_hex: &str,
        game_id: GameId,
        height: u64,
        proof: &RollProof,
        entropy: &dyn EntropySource,
    ) -> DiceResult<bool> {
        check_kind(RandomnessKind::CommitReveal, proof)?;
        let bytes = hex::decode(revealed_seed_hex)
            .map_err(|e| RandomnessError::InvalidKey(format!("revealed seed hex: {}", e)))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| RandomnessError::InvalidKey("revealed seed must be 32 bytes".to_string()))?;
        Ok(Self::matches(&seed, game_id, height, proof, entropy))
    }
}

impl RandomnessSource for CommitRevealRandomness {
    fn kind(&self) -> RandomnessKind {
        RandomnessKind::CommitReveal
    }

    fn roll(&self, game_id: GameId, height: u64, entropy: &dyn EntropySource) -> DiceResult<RollProof> {
        let digest = Self::digest(&self.seed, game_id, height, entropy);
        let value = seed_from_bytes(&digest);
        Ok(RollProof {
            kind: RandomnessKind::CommitReveal,
            outcome: DieFace::from_seed(value),
            seed: value.to_string(),
            output: Some(hex::encode(digest)),
            proof: Some(self.commitment_hex()),
        })
    }

    fn verify(
        &self,
        game_id: GameId,
        height: u64,
        proof: &RollProof,
        entropy: &dyn EntropySource,
    ) -> DiceResult<bool> {
        check_kind(RandomnessKind::CommitReveal, proof)?;
        Ok(Self::matches(&self.seed, game_id, height, proof, entropy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::ChainEntropy;
    use crate::errors::DiceError;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_public_seed_formula() {
        let entropy = ChainEntropy::default();
        let digest = entropy.hash(&roll_input(7, 100));
        let head = u64::from_be_bytes(digest[..8].try_into().unwrap());
        let expected = 7u128 + 100 + head as u128;

        assert_eq!(PublicDeterministic::seed(7, 100, &entropy), expected);
        assert_eq!(
            PublicDeterministic::outcome(7, 100, &entropy).value(),
            (expected % 6) as u8 + 1
        );
    }

    #[test]
    fn test_public_roll_is_reproducible_and_verifiable() {
        let entropy = ChainEntropy::default();
        let source = PublicDeterministic;

        let first = source.roll(3, 55, &entropy).unwrap();
        let second = source.roll(3, 55, &entropy).unwrap();
        assert_eq!(first, second);
        assert!(source.verify(3, 55, &first, &entropy).unwrap());
        assert!(!source.verify(3, 56, &first, &entropy).unwrap());
    }

    #[test]
    fn test_outcomes_cover_all_faces() {
        let entropy = ChainEntropy::default();
        let mut seen = [false; 6];
        for height in 0..200 {
            let face = PublicDeterministic::outcome(1, height, &entropy);
            seen[(face.value() - 1) as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_vrf_generation_and_verification() {
        let entropy = ChainEntropy::default();
        let source = VrfRandomness::from_seed(&[1u8; 32]).unwrap();

        let proof = source.roll(9, 1_000, &entropy).unwrap();
        assert_eq!(proof.kind, RandomnessKind::Vrf);
        assert!(source.verify(9, 1_000, &proof, &entropy).unwrap());

        // Same key and input give the same outcome even though proofs differ.
        let again = source.roll(9, 1_000, &entropy).unwrap();
        assert_eq!(again.outcome, proof.outcome);
        assert_eq!(again.output, proof.output);
    }

    #[test]
    fn test_vrf_tamper_detection() {
        let entropy = ChainEntropy::default();
        let source = VrfRandomness::from_seed(&[2u8; 32]).unwrap();
        let proof = source.roll(1, 10, &entropy).unwrap();

        assert!(!source.verify(2, 10, &proof, &entropy).unwrap());

        let mut forged = proof.clone();
        forged.seed = "0".to_string();
        assert!(!source.verify(1, 10, &forged, &entropy).unwrap());

        let other_key = VrfRandomness::from_seed(&[3u8; 32]).unwrap();
        assert!(!other_key.verify(1, 10, &proof, &entropy).unwrap());
    }

    #[test]
    fn test_vrf_key_persists_in_storage() {
        let storage = MemoryStorage::new();
        let first = VrfRandomness::load_or_create(&storage).unwrap();
        let second = VrfRandomness::load_or_create(&storage).unwrap();
        assert_eq!(first.public_key_hex(), second.public_key_hex());
    }

    #[test]
    fn test_commit_reveal_audit() {
        let entropy = ChainEntropy::default();
        let source = CommitRevealRandomness::new([5u8; 32]);
        let proof = source.roll(4, 77, &entropy).unwrap();

        assert_eq!(proof.proof.as_deref(), Some(source.commitment_hex().as_str()));
        assert!(source.verify(4, 77, &proof, &entropy).unwrap());
        assert!(CommitRevealRandomness::verify_revealed(&source.reveal_hex(), 4, 77, &proof, &entropy).unwrap());

        let wrong_seed = hex::encode([6u8; 32]);
        assert!(!CommitRevealRandomness::verify_revealed(&wrong_seed, 4, 77, &proof, &entropy).unwrap());
    }

    #[test]
    fn test_mismatched_source_is_an_error() {
        let entropy = ChainEntropy::default();
        let proof = PublicDeterministic.roll(1, 1, &entropy).unwrap();
        let source = CommitRevealRandomness::new([0u8; 32]);

        assert!(matches!(
            source.verify(1, 1, &proof, &entropy),
            Err(DiceError::Randomness(RandomnessError::SourceMismatch { .. }))
        ));
    }

    #[test]
    fn test_build_randomness_follows_mode() {
        let storage = MemoryStorage::new();
        assert_eq!(build_randomness(RandomnessMode::Public, &storage).unwrap().kind(), RandomnessKind::Public);
        assert_eq!(build_randomness(RandomnessMode::Vrf, &storage).unwrap().kind(), RandomnessKind::Vrf);
        assert_eq!(
            build_randomness(RandomnessMode::CommitReveal, &storage).unwrap().kind(),
            RandomnessKind::CommitReveal
        );
    }
}
