//! Pre-image chains.
//!
//! At enrollment a validator commits to `H^cycle(seed)`. Each height it
//! reveals the next pre-image of the chain, so later reveals are hashed
//! fewer times: hashing the tip `(tip_height - target)` times yields the
//! pre-image for any earlier `target`. Only the monotone tip is stored;
//! everything else is derived on demand.

use serde::{Deserialize, Serialize};

use crate::hash::{hash, Hash};
use crate::height::Height;

/// A pre-image advance as delivered by the consensus node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreImageInfo {
    /// Key of the frozen stake UTXO the enrollment rides on.
    pub utxo: Hash,
    pub hash: Hash,
    pub height: Height,
}

/// Applies the hash oracle `distance` times.
pub fn derive_preimage(tip: &Hash, distance: u64) -> Hash {
    let mut current = *tip;
    for _ in 0..distance {
        current = hash(current.as_bytes());
    }
    current
}

/// Pre-image at `target`, derived from the published tip. `None` when the
/// tip has not yet reached `target`.
pub fn preimage_at(tip_hash: &Hash, tip_height: Height, target: Height) -> Option<Hash> {
    let distance = tip_height.checked_sub(target)?;
    Some(derive_preimage(tip_hash, distance))
}

/// Full chain from a seed: index `k` holds the reveal for anchor offset
/// `k`, i.e. `H^(length - k)(seed)`. Index 0 is the enrollment commitment.
pub fn hash_chain(seed: Hash, length: u64) -> Vec<Hash> {
    let mut chain = vec![Hash::ZERO; (length + 1) as usize];
    chain[length as usize] = seed;
    for k in (0..length as usize).rev() {
        chain[k] = hash(chain[k + 1].as_bytes());
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_links_back_to_commitment() {
        let chain = hash_chain(hash(b"seed"), 20);
        let commitment = chain[0];

        // Revealing the offset-7 pre-image and hashing it 7 times must
        // land on the commitment.
        assert_eq!(derive_preimage(&chain[7], 7), commitment);
    }

    #[test]
    fn test_preimage_at_derives_earlier_heights() {
        let chain = hash_chain(hash(b"seed"), 20);
        let anchor = Height::new(100);
        let tip_height = anchor.add(7);
        let tip = chain[7];

        let at_anchor = preimage_at(&tip, tip_height, anchor).unwrap();
        assert_eq!(at_anchor, chain[0]);

        let at_five = preimage_at(&tip, tip_height, anchor.add(5)).unwrap();
        assert_eq!(at_five, chain[5]);

        // The tip itself derives with distance zero.
        assert_eq!(preimage_at(&tip, tip_height, tip_height), Some(tip));
    }

    #[test]
    fn test_preimage_at_unreached_height_is_none() {
        let tip = hash(b"tip");
        assert_eq!(preimage_at(&tip, Height::new(5), Height::new(6)), None);
    }
}
