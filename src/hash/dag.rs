//! UnixFS file DAG construction
//!
//! Content up to `CHUNK_SIZE` bytes becomes a single leaf node. Larger
//! content is cut into fixed-size chunks, each hashed as a leaf, and the
//! leaves are linked from branch nodes using the balanced layout: every
//! branch holds up to `MAX_LINKS_PER_NODE` links and all leaves sit at the
//! same depth.

use super::pb::{put_bytes_field, put_uint_field};
use super::{HashError, Multihash};

/// Fixed chunk size (256 KiB)
pub const CHUNK_SIZE: usize = 262_144;

/// Serialization overhead a full-size leaf adds on top of its chunk bytes
pub const LINK_OVERHEAD: u64 = 14;

/// Maximum links in one branch node
pub const MAX_LINKS_PER_NODE: usize = 174;

/// UnixFS `Data.DataType.File`
const UNIXFS_FILE: u64 = 2;

// dag-pb PBNode fields
const PBNODE_DATA: u32 = 1;
const PBNODE_LINKS: u32 = 2;

// dag-pb PBLink fields
const PBLINK_HASH: u32 = 1;
const PBLINK_NAME: u32 = 2;
const PBLINK_TSIZE: u32 = 3;

// UnixFS Data fields
const UNIXFS_TYPE: u32 = 1;
const UNIXFS_DATA: u32 = 2;
const UNIXFS_FILESIZE: u32 = 3;
const UNIXFS_BLOCKSIZES: u32 = 4;

/// Link from a branch node to a child node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Multihash of the serialized child
    pub hash: Multihash,
    /// Serialized size of the child subtree (child node plus descendants)
    pub size: u64,
    /// Number of content bytes below the child
    pub file_size: u64,
}

/// A node of the file DAG
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode<'a> {
    /// Raw chunk bytes, at most `CHUNK_SIZE`
    Leaf(&'a [u8]),
    /// Links to children, no embedded bytes
    Branch(Vec<Link>),
}

impl ContentNode<'_> {
    /// Links held by this node (empty for a leaf)
    pub fn links(&self) -> &[Link] {
        match self {
            ContentNode::Leaf(_) => &[],
            ContentNode::Branch(links) => links.as_slice(),
        }
    }

    /// Number of content bytes covered by this node
    pub fn file_size(&self) -> u64 {
        match self {
            ContentNode::Leaf(data) => data.len() as u64,
            ContentNode::Branch(links) => links.iter().map(|l| l.file_size).sum(),
        }
    }

    /// Serialize as a dag-pb node wrapping UnixFS file data
    pub fn serialize(&self) -> Vec<u8> {
        let mut unixfs = Vec::new();
        put_uint_field(&mut unixfs, UNIXFS_TYPE, UNIXFS_FILE);

        let mut node = Vec::new();
        match self {
            ContentNode::Leaf(data) => {
                if !data.is_empty() {
                    put_bytes_field(&mut unixfs, UNIXFS_DATA, data);
                }
                put_uint_field(&mut unixfs, UNIXFS_FILESIZE, data.len() as u64);
            }
            ContentNode::Branch(links) => {
                put_uint_field(&mut unixfs, UNIXFS_FILESIZE, self.file_size());
                for link in links {
                    put_uint_field(&mut unixfs, UNIXFS_BLOCKSIZES, link.file_size);
                }

                // Links precede data in canonical dag-pb
                for link in links {
                    let mut encoded = Vec::with_capacity(48);
                    put_bytes_field(&mut encoded, PBLINK_HASH, &link.hash.to_bytes());
                    put_bytes_field(&mut encoded, PBLINK_NAME, b"");
                    put_uint_field(&mut encoded, PBLINK_TSIZE, link.size);
                    put_bytes_field(&mut node, PBNODE_LINKS, &encoded);
                }
            }
        }

        put_bytes_field(&mut node, PBNODE_DATA, &unixfs);
        node
    }

    /// Multihash of the serialized node
    pub fn hash(&self) -> Multihash {
        Multihash::from_data(&self.serialize())
    }

    /// Link a parent would hold to this node
    pub fn to_link(&self) -> Link {
        let serialized = self.serialize();
        let descendants: u64 = self.links().iter().map(|l| l.size).sum();
        Link {
            hash: Multihash::from_data(&serialized),
            size: serialized.len() as u64 + descendants,
            file_size: self.file_size(),
        }
    }
}

/// Build the root node for `data`
pub fn content_node(data: &[u8]) -> ContentNode<'_> {
    if data.len() <= CHUNK_SIZE {
        ContentNode::Leaf(data)
    } else {
        balance(leaf_links(data.chunks(CHUNK_SIZE)))
    }
}

/// Compute the base58 multihash of `data`
pub fn hash_content(data: &[u8]) -> Multihash {
    content_node(data).hash()
}

/// Check that `data` hashes to `expected` (base58 text)
pub fn verify(data: &[u8], expected: &str) -> bool {
    hash_content(data).to_base58() == expected
}

/// Leaf-level links for `data`, one per chunk
pub fn generate_links(data: &[u8]) -> Vec<Link> {
    if data.is_empty() {
        return vec![ContentNode::Leaf(data).to_link()];
    }
    leaf_links(data.chunks(CHUNK_SIZE))
}

/// Assemble the root branch over pre-split chunks.
///
/// Every chunk but the last must be exactly `CHUNK_SIZE` bytes and the last
/// must be non-empty; anything else would silently produce a hash no other
/// implementation agrees with.
pub fn assemble_branch(chunks: &[&[u8]]) -> Result<ContentNode<'static>, HashError> {
    let last = chunks.len().checked_sub(1).ok_or(HashError::EmptyBranch)?;

    for (index, chunk) in chunks.iter().enumerate() {
        if chunk.len() > CHUNK_SIZE {
            return Err(HashError::OversizedChunk {
                index,
                len: chunk.len(),
            });
        }
        if index < last && chunk.len() != CHUNK_SIZE {
            return Err(HashError::ShortChunk {
                index,
                len: chunk.len(),
                expected: CHUNK_SIZE,
            });
        }
    }
    if chunks[last].is_empty() {
        return Err(HashError::EmptyFinalChunk);
    }

    Ok(balance(leaf_links(chunks.iter().copied())))
}

fn leaf_links<'a>(chunks: impl Iterator<Item = &'a [u8]>) -> Vec<Link> {
    chunks
        .map(|chunk| {
            let link = ContentNode::Leaf(chunk).to_link();
            debug_assert!(
                chunk.len() != CHUNK_SIZE || link.size == CHUNK_SIZE as u64 + LINK_OVERHEAD
            );
            link
        })
        .collect()
}

/// Group links bottom-up until they fit in a single root branch
fn balance(mut level: Vec<Link>) -> ContentNode<'static> {
    while level.len() > MAX_LINKS_PER_NODE {
        level = level
            .chunks(MAX_LINKS_PER_NODE)
            .map(|group| ContentNode::Branch(group.to_vec()).to_link())
            .collect();
    }
    ContentNode::Branch(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic non-repeating content
    fn fixture(len: usize) -> Vec<u8> {
        (0..len).map(|i| ((i * 31 + 7) % 251) as u8).collect()
    }

    #[test]
    fn test_protocol_constants() {
        assert_eq!(CHUNK_SIZE, 256 * 1024);
        assert_eq!(LINK_OVERHEAD, 14);
        assert_eq!(CHUNK_SIZE as u64 + LINK_OVERHEAD, 262_158);
    }

    #[test]
    fn test_known_small_hashes() {
        let cases: &[(&[u8], &str)] = &[
            (b"piper\n", "QmUdxEGxvp71kqYLkA91mtNg9QRRSPBtA3UV6VuYhoP7DB"),
            (b"pipermerriam\n", "QmXqrQR7EMePe9LCRUVrfkxYg5EHRNpcA1PZnN4AnbM9DW"),
            (
                b"this is a test file for ipfs hash generation\n",
                "QmYknNUKXWSaxfCWVgHd8uVCYHhzPerVCLvCCBedWtqbnv",
            ),
            (b"hello world\n", "QmT78zSuBmuS4z925WZfrqQ1qHaJ56DQaTfyMUF7F8ff5o"),
            (b"", "QmbFMke1KXqnYyBBWxB74N4c5SBnJMVAiMNRcGu6x1AwQH"),
        ];

        for (content, expected) in cases {
            assert_eq!(hash_content(content).to_base58(), *expected);
        }
    }

    #[test]
    fn test_leaf_serialization() {
        let node = ContentNode::Leaf(b"piper\n");
        let mut expected = vec![0x0a, 0x0c, 0x08, 0x02, 0x12, 0x06];
        expected.extend_from_slice(b"piper\n");
        expected.extend_from_slice(&[0x18, 0x06]);
        assert_eq!(node.serialize(), expected);
    }

    #[test]
    fn test_verify_roundtrip() {
        for len in [0, 1, 1000, CHUNK_SIZE, CHUNK_SIZE + 1] {
            let data = fixture(len);
            let hash = hash_content(&data).to_base58();
            assert!(verify(&data, &hash));
            // Same bytes, same hash
            assert_eq!(hash_content(&data).to_base58(), hash);
        }
        assert!(!verify(b"piper\n", "QmXqrQR7EMePe9LCRUVrfkxYg5EHRNpcA1PZnN4AnbM9DW"));
    }

    #[test]
    fn test_chunk_boundary() {
        let exact = vec![0u8; CHUNK_SIZE];
        assert!(matches!(content_node(&exact), ContentNode::Leaf(_)));
        assert_eq!(
            hash_content(&exact).to_base58(),
            "QmRk1rduJvo5DfEYAaLobS2za9tDszk35hzaNSDCJ74DA7"
        );

        let over = vec![0u8; CHUNK_SIZE + 1];
        let node = content_node(&over);
        assert_eq!(node.links().len(), 2);
        assert_eq!(
            hash_content(&over).to_base58(),
            "QmbVuw4C4vcmVKqxoWtgDVobvcHrSn51qsmQmyxjk4sB2Q"
        );
    }

    #[test]
    fn test_branch_link_count_and_sizes() {
        let data = fixture(CHUNK_SIZE * 5 / 2);
        let node = content_node(&data);
        let links = node.links();

        assert_eq!(links.len(), 3);
        assert_eq!(links[0].size, CHUNK_SIZE as u64 + LINK_OVERHEAD);
        assert_eq!(links[1].size, CHUNK_SIZE as u64 + LINK_OVERHEAD);
        assert_eq!(links[2].file_size, (CHUNK_SIZE / 2) as u64);
        assert_eq!(node.file_size(), data.len() as u64);
    }

    #[test]
    fn test_large_fixture_links_and_root() {
        let data = fixture(3 * CHUNK_SIZE + 1000);

        let expected = [
            ("QmNjsPT1urL55WXngMVgvZrn2apSux229uFBoAgmKTtjAd", 262_158),
            ("QmTp2tdhHA5XFsVCSB693nrCTK9CM1Fjbxc3wfR6FXUuDc", 262_158),
            ("QmeegfhKey1r1oq5f6Q75mkLYJ2zkJ4Wf5dqzSrm5qd9PN", 262_158),
            ("Qmcy79oY76iy3owqhFCjtUoZBFp194fmxkxUmS8vwsc22z", 1011),
        ];
        let links = generate_links(&data);
        let actual: Vec<(String, u64)> = links
            .iter()
            .map(|l| (l.hash.to_base58(), l.size))
            .collect();
        let expected: Vec<(String, u64)> = expected
            .iter()
            .map(|(h, s)| (h.to_string(), *s))
            .collect();
        assert_eq!(actual, expected);

        assert_eq!(
            hash_content(&data).to_base58(),
            "QmavW1bUa6VdDGQ1TGaLVnbTtAh9mTY6p5pNuMcCrwKZ5S"
        );
        assert_eq!(content_node(&data).to_link().size, 787_683);
    }

    #[test]
    fn test_assemble_branch_matches_hash_content() {
        let data = fixture(2 * CHUNK_SIZE + 10);
        let chunks: Vec<&[u8]> = data.chunks(CHUNK_SIZE).collect();
        let node = assemble_branch(&chunks).unwrap();
        assert_eq!(node.hash(), hash_content(&data));
    }

    #[test]
    fn test_assemble_branch_rejects_bad_chunks() {
        let full = vec![1u8; CHUNK_SIZE];
        let short = vec![1u8; CHUNK_SIZE - 1];
        let oversize = vec![1u8; CHUNK_SIZE + 1];

        assert_eq!(assemble_branch(&[]), Err(HashError::EmptyBranch));
        assert_eq!(
            assemble_branch(&[short.as_slice(), full.as_slice()]),
            Err(HashError::ShortChunk {
                index: 0,
                len: CHUNK_SIZE - 1,
                expected: CHUNK_SIZE
            })
        );
        assert_eq!(
            assemble_branch(&[full.as_slice(), &[][..]]),
            Err(HashError::EmptyFinalChunk)
        );
        assert_eq!(
            assemble_branch(&[full.as_slice(), oversize.as_slice()]),
            Err(HashError::OversizedChunk {
                index: 1,
                len: CHUNK_SIZE + 1
            })
        );
    }

    #[test]
    fn test_balance_groups_past_fanout() {
        let leaves: Vec<Link> = (0..MAX_LINKS_PER_NODE + 1)
            .map(|i| Link {
                hash: Multihash::from_data(&i.to_le_bytes()),
                size: 10,
                file_size: 4,
            })
            .collect();

        let root = balance(leaves.clone());
        let links = root.links();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].file_size, 4 * MAX_LINKS_PER_NODE as u64);
        assert_eq!(links[1].file_size, 4);
        assert_eq!(root.file_size(), 4 * leaves.len() as u64);

        let flat = balance(leaves[..MAX_LINKS_PER_NODE].to_vec());
        assert_eq!(flat.links().len(), MAX_LINKS_PER_NODE);
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn content(len: usize, seed: u8) -> Vec<u8> {
        (0..len)
            .map(|i| ((i * 31 + seed as usize) % 251) as u8)
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn prop_content_verifies_against_own_hash(
            len in 0..(3 * CHUNK_SIZE + 1000),
            seed in any::<u8>(),
        ) {
            let data = content(len, seed);
            let hash = hash_content(&data).to_base58();
            prop_assert!(verify(&data, &hash));
            prop_assert_eq!(hash_content(&data).to_base58(), hash);
        }

        #[test]
        fn prop_changed_byte_fails_verification(
            len in 1..(2 * CHUNK_SIZE + 10),
            seed in any::<u8>(),
            at in any::<usize>(),
        ) {
            let mut data = content(len, seed);
            let hash = hash_content(&data).to_base58();
            let index = at % len;
            data[index] = data[index].wrapping_add(1);
            prop_assert!(!verify(&data, &hash));
        }

        #[test]
        fn prop_one_link_per_chunk(
            len in 0..(3 * CHUNK_SIZE + 1000),
            seed in any::<u8>(),
        ) {
            let data = content(len, seed);
            let links = generate_links(&data);

            prop_assert_eq!(links.len(), std::cmp::max(1, len.div_ceil(CHUNK_SIZE)));
            for link in &links[..links.len() - 1] {
                prop_assert_eq!(link.size, CHUNK_SIZE as u64 + LINK_OVERHEAD);
                prop_assert_eq!(link.file_size, CHUNK_SIZE as u64);
            }
            let covered: u64 = links.iter().map(|link| link.file_size).sum();
            prop_assert_eq!(covered, len as u64);
        }

        #[test]
        fn prop_assembled_branch_matches_hash(
            len in (CHUNK_SIZE + 1)..(3 * CHUNK_SIZE + 1000),
            seed in any::<u8>(),
        ) {
            let data = content(len, seed);
            let chunks: Vec<&[u8]> = data.chunks(CHUNK_SIZE).collect();
            let branch = assemble_branch(&chunks).unwrap();
            prop_assert_eq!(branch.hash(), hash_content(&data));
        }
    }
}
