//! Typed chronological chain replay
//!
//! Bridges the ledger's block walk to the archive's record payloads:
//! every record in every block is decoded as one `T`, oldest first.

use amber_core::Blake3Hash;
use anyhow::{Context, Result};
use ledger::{Chain, Node, Record};
use serde::de::DeserializeOwned;

/// Walk `chain` oldest-first, decoding every record payload as `T`
/// and handing it to `visit` along with the record and its hash.
///
/// Ordering is load-bearing: deltas only apply on top of all earlier
/// deltas in their chain. A payload that fails to decode means the
/// chain is malformed and aborts the whole walk, as does a `visit`
/// error.
pub fn replay<T, F>(node: &Node, chain: &Chain, mut visit: F) -> Result<()>
where
    T: DeserializeOwned,
    F: FnMut(&Blake3Hash, &Record, T) -> Result<()>,
{
    chain.iterate_chronologically(node.cache(), |_, block| {
        for entry in &block.entries {
            let value: T = bincode::deserialize(&entry.record.payload).with_context(|| {
                format!(
                    "malformed chain {}: undecodable payload in record {}",
                    chain.name, entry.record_hash
                )
            })?;
            visit(&entry.record_hash, &entry.record, value)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use amber_core::Delta;
    use ledger::{Chain, NoopListener, Node, THRESHOLD_NONE};

    fn open_node(dir: &std::path::Path) -> Node {
        Node::init(dir, "tester").unwrap();
        Node::open(dir, None).unwrap()
    }

    fn write_delta(node: &Node, chain: &str, delta: &Delta) {
        node.write_record(chain, bincode::serialize(delta).unwrap(), &NoopListener)
            .unwrap();
    }

    #[test]
    fn test_replay_decodes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let node = open_node(dir.path());
        node.add_chain(Chain::open("deltas", THRESHOLD_NONE));

        write_delta(&node, "deltas", &Delta::append(0, b"foo".to_vec()));
        write_delta(&node, "deltas", &Delta::append(3, b"bar".to_vec()));

        let chain = node.chain("deltas").unwrap();
        let mut offsets = Vec::new();
        replay::<Delta, _>(&node, &chain, |hash, record, delta| {
            assert_eq!(*hash, record.hash()?);
            offsets.push(delta.offset);
            Ok(())
        })
        .unwrap();
        assert_eq!(offsets, vec![0, 3]);
    }

    #[test]
    fn test_undecodable_payload_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let node = open_node(dir.path());
        node.add_chain(Chain::open("garbage", THRESHOLD_NONE));

        node.write_record("garbage", vec![0xff, 0xff, 0xff], &NoopListener)
            .unwrap();

        let chain = node.chain("garbage").unwrap();
        let err = replay::<Delta, _>(&node, &chain, |_, _, _| Ok(())).unwrap_err();
        assert!(err.to_string().contains("malformed chain"));
    }

    #[test]
    fn test_empty_chain_replays_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let node = open_node(dir.path());
        let chain = Chain::open("empty", THRESHOLD_NONE);

        let mut visits = 0;
        replay::<Delta, _>(&node, &chain, |_, _, _| {
            visits += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(visits, 0);
    }
}
