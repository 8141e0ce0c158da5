//! Bitcoin-style merkle branch construction.
//!
//! - Leaves: transaction hashes of the containing block, in block order,
//!   hashed exactly as delivered by the proof backend
//! - Hash: double SHA-256 over the concatenated pair
//! - Odd levels: the last node is paired with itself

use sha2::{Digest, Sha256};

use sysbridge_types::{BridgeError, Result};

/// Sibling path for one transaction, ready for relay submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleBranch {
    /// Position of the transaction within its block.
    pub index: u32,
    /// Sibling hashes from leaf level upward, unprefixed hex.
    pub siblings: Vec<String>,
}

fn double_sha256(left: &[u8], right: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    let first = hasher.finalize();
    Sha256::digest(first).to_vec()
}

fn decode_leaves(leaves: &[String]) -> Result<Vec<Vec<u8>>> {
    leaves
        .iter()
        .map(|leaf| {
            hex::decode(leaf)
                .map_err(|e| BridgeError::MalformedRequest(format!("invalid leaf hex: {}", e)))
        })
        .collect()
}

/// Build the merkle sibling path for the leaf at `index`.
pub fn build_merkle_branch(leaves: &[String], index: usize) -> Result<MerkleBranch> {
    if leaves.is_empty() {
        return Err(BridgeError::MalformedRequest(
            "merkle branch requires at least one leaf".into(),
        ));
    }
    if index >= leaves.len() {
        return Err(BridgeError::MalformedRequest(format!(
            "leaf index out of range: {} >= {}",
            index,
            leaves.len()
        )));
    }

    let mut level = decode_leaves(leaves)?;
    let mut pos = index;
    let mut siblings = Vec::new();

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = level[level.len() - 1].clone();
            level.push(last);
        }

        siblings.push(hex::encode(&level[pos ^ 1]));

        level = level
            .chunks(2)
            .map(|pair| double_sha256(&pair[0], &pair[1]))
            .collect();
        pos /= 2;
    }

    Ok(MerkleBranch {
        index: index as u32,
        siblings,
    })
}

/// Merkle root of the given leaves.
pub fn merkle_root(leaves: &[String]) -> Result<String> {
    if leaves.is_empty() {
        return Err(BridgeError::MalformedRequest(
            "merkle root requires at least one leaf".into(),
        ));
    }

    let mut level = decode_leaves(leaves)?;
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = level[level.len() - 1].clone();
            level.push(last);
        }
        level = level
            .chunks(2)
            .map(|pair| double_sha256(&pair[0], &pair[1]))
            .collect();
    }

    Ok(hex::encode(&level[0]))
}

/// Verify a branch by folding the leaf up to the expected root.
pub fn verify_merkle_branch(leaf: &str, branch: &MerkleBranch, root: &str) -> bool {
    let mut current = match hex::decode(leaf) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let mut pos = branch.index as usize;

    for sibling in &branch.siblings {
        let sibling = match hex::decode(sibling) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        current = if pos % 2 == 0 {
            double_sha256(&current, &sibling)
        } else {
            double_sha256(&sibling, &current)
        };
        pos /= 2;
    }

    hex::encode(current) == root
}
