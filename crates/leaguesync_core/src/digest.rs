//! Content digest trees for change detection.
//!
//! A batch of entities is hashed into a two-level tree: one leaf per
//! entity, sorted by the entity's stable id, under a root whose hash
//! covers the ordered leaf hashes. Diffing the tree of a fresh batch
//! against the tree stored for the previous batch yields the entities
//! that were added or changed. Removed entities are not reported.
//!
//! ```
//! use leaguesync_codec::{Document, Value};
//! use leaguesync_core::{id_field, DigestTree, FieldPolicy, Sha256Hasher};
//!
//! let team = |id: i64, ovr: i64| -> Document {
//!     [("teamId".to_string(), Value::Integer(id)), ("ovr".to_string(), Value::Integer(ovr))]
//!         .into_iter()
//!         .collect()
//! };
//! let policy = FieldPolicy::volatile();
//! let old = DigestTree::build(&[team(1, 80), team(2, 75)], id_field("teamId"), &policy, &Sha256Hasher).unwrap();
//! let new = DigestTree::build(&[team(1, 80), team(2, 78)], id_field("teamId"), &policy, &Sha256Hasher).unwrap();
//! assert_eq!(new.changed_keys(&old), vec!["2".to_string()]);
//! ```

use crate::config::FieldPolicy;
use crate::error::{CoreError, CoreResult};
use leaguesync_codec::{document_to_cbor, Document, Value};
use leaguesync_storage::{DocPath, DocumentStore, SetMode, WriteBatch};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;

/// A content hash function producing printable digests.
pub trait Hasher: Send + Sync {
    /// Hashes `bytes`.
    fn hash(&self, bytes: &[u8]) -> String;
}

/// SHA-256, hex encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn hash(&self, bytes: &[u8]) -> String {
        format!("{:x}", Sha256::digest(bytes))
    }
}

/// Extracts a stable entity id from a top-level field.
///
/// Numeric and text ids are both accepted.
pub fn id_field(field: impl Into<String>) -> impl Fn(&Document) -> Option<String> + Send + Sync {
    let field = field.into();
    move |doc: &Document| doc.get(&field).and_then(Value::to_key_string)
}

/// One node of a digest tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestNode {
    /// Content hash of this node.
    pub hash: String,
    /// Entity id for leaves built from a batch.
    pub key: Option<String>,
    /// Child nodes, in id order.
    pub children: Vec<DigestNode>,
}

impl DigestNode {
    /// Creates a leaf node.
    pub fn leaf(hash: impl Into<String>, key: Option<String>) -> Self {
        Self {
            hash: hash.into(),
            key,
            children: Vec::new(),
        }
    }

    /// Returns true if this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a DigestNode>) {
        if self.is_leaf() {
            out.push(self);
        } else {
            for child in &self.children {
                child.collect_leaves(out);
            }
        }
    }

    fn to_value(&self) -> Value {
        let mut map = Document::new();
        map.insert("hash".into(), Value::Text(self.hash.clone()));
        if let Some(key) = &self.key {
            map.insert("key".into(), Value::Text(key.clone()));
        }
        map.insert(
            "children".into(),
            Value::Array(self.children.iter().map(DigestNode::to_value).collect()),
        );
        Value::Map(map)
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        let hash = value
            .get("hash")
            .and_then(Value::as_text)
            .ok_or_else(|| CoreError::invalid_event("digest node without hash"))?;
        let key = value.get("key").and_then(Value::as_text).map(str::to_string);
        let children = match value.get("children").and_then(Value::as_array) {
            Some(children) => children
                .iter()
                .map(DigestNode::from_value)
                .collect::<CoreResult<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(Self {
            hash: hash.to_string(),
            key,
            children,
        })
    }
}

/// A hash tree over one batch of entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestTree {
    /// The root node.
    pub head: DigestNode,
}

impl DigestTree {
    /// The baseline used when no tree was stored: the hash of the empty
    /// string with no children.
    pub fn empty<H: Hasher + ?Sized>(hasher: &H) -> Self {
        Self {
            head: DigestNode::leaf(hasher.hash(b""), None),
        }
    }

    /// Builds the tree for a batch.
    ///
    /// Each entity is filtered through `policy`, hashed together with its
    /// id, and placed in id order. The root hash covers the concatenated
    /// leaf hashes.
    ///
    /// # Errors
    ///
    /// Returns an error if an entity has no id or cannot be encoded.
    pub fn build<H, F>(
        entities: &[Document],
        id_fn: F,
        policy: &FieldPolicy,
        hasher: &H,
    ) -> CoreResult<Self>
    where
        H: Hasher + ?Sized,
        F: Fn(&Document) -> Option<String>,
    {
        let mut leaves = entities
            .iter()
            .map(|entity| {
                let id = id_fn(entity)
                    .ok_or_else(|| CoreError::invalid_event("entity has no id"))?;
                let hash = leaf_hash(entity, &id, policy, hasher)?;
                Ok(DigestNode::leaf(hash, Some(id)))
            })
            .collect::<CoreResult<Vec<_>>>()?;
        leaves.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.hash.cmp(&b.hash)));

        let concatenated: String = leaves.iter().map(|leaf| leaf.hash.as_str()).collect();
        Ok(Self {
            head: DigestNode {
                hash: hasher.hash(concatenated.as_bytes()),
                key: None,
                children: leaves,
            },
        })
    }

    /// The root hash.
    pub fn root_hash(&self) -> &str {
        &self.head.hash
    }

    /// The immediate children of the root.
    pub fn leaves(&self) -> &[DigestNode] {
        &self.head.children
    }

    /// Returns the hashes of leaves in `self` that have no match in
    /// `previous`.
    ///
    /// Equal roots short-circuit to an empty result. Otherwise each child
    /// of the new root is looked up among the old root's immediate
    /// children; an unmatched leaf is reported, an unmatched inner node is
    /// compared against the old node with the same key (or reported whole
    /// when there is none).
    pub fn diff(&self, previous: &DigestTree) -> Vec<String> {
        self.changed_leaves(previous)
            .into_iter()
            .map(|leaf| leaf.hash.clone())
            .collect()
    }

    /// Like [`diff`](Self::diff), but returns the ids of the changed leaves.
    pub fn changed_keys(&self, previous: &DigestTree) -> Vec<String> {
        self.changed_leaves(previous)
            .into_iter()
            .filter_map(|leaf| leaf.key.clone())
            .collect()
    }

    fn changed_leaves<'a>(&'a self, previous: &DigestTree) -> Vec<&'a DigestNode> {
        let mut out = Vec::new();
        diff_nodes(&self.head, Some(&previous.head), &mut out);
        out
    }
}

fn diff_nodes<'a>(new: &'a DigestNode, old: Option<&DigestNode>, out: &mut Vec<&'a DigestNode>) {
    let Some(old) = old else {
        new.collect_leaves(out);
        return;
    };
    if new.hash == old.hash {
        return;
    }
    let known: HashSet<&str> = old.children.iter().map(|c| c.hash.as_str()).collect();
    for child in &new.children {
        if known.contains(child.hash.as_str()) {
            continue;
        }
        if child.is_leaf() {
            out.push(child);
        } else {
            let counterpart = child
                .key
                .as_ref()
                .and_then(|key| old.children.iter().find(|c| c.key.as_ref() == Some(key)));
            diff_nodes(child, counterpart, out);
        }
    }
}

/// Hashes one entity under `policy`.
///
/// # Errors
///
/// Returns an error if the filtered entity cannot be canonically encoded.
pub fn leaf_hash<H: Hasher + ?Sized>(
    entity: &Document,
    id: &str,
    policy: &FieldPolicy,
    hasher: &H,
) -> CoreResult<String> {
    let mut envelope = Document::new();
    envelope.insert("fields".into(), Value::Map(policy.apply(entity)));
    envelope.insert("key".into(), Value::Text(id.to_string()));
    Ok(hasher.hash(&document_to_cbor(&envelope)?))
}

/// Persists the last digest tree per `(subject, batch type)`.
///
/// Trees live at `league_data/{subject}/digests/{batch_type}`.
#[derive(Debug)]
pub struct DigestTreeStore<S> {
    store: Arc<S>,
}

impl<S> Clone for DigestTreeStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> DigestTreeStore<S> {
    /// Creates a tree store on top of a document store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The document path for a tree.
    ///
    /// # Errors
    ///
    /// Returns an error if either segment is empty or contains a slash.
    pub fn path(subject: &str, batch_type: &str) -> CoreResult<DocPath> {
        Ok(DocPath::collection(crate::store::ROOT_COLLECTION)?
            .join(subject)?
            .child(DIGEST_COLLECTION, batch_type)?)
    }

    /// Loads the stored tree, or the empty baseline if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the stored tree is malformed.
    pub async fn get<H: Hasher + ?Sized>(
        &self,
        subject: &str,
        batch_type: &str,
        hasher: &H,
    ) -> CoreResult<DigestTree> {
        let path = Self::path(subject, batch_type)?;
        match self.store.get(&path).await? {
            Some(doc) => {
                let head = doc
                    .get("head")
                    .ok_or_else(|| CoreError::invalid_event("stored digest tree has no head"))?;
                Ok(DigestTree {
                    head: DigestNode::from_value(head)?,
                })
            }
            None => Ok(DigestTree::empty(hasher)),
        }
    }

    /// Replaces the stored tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn put(&self, subject: &str, batch_type: &str, tree: &DigestTree) -> CoreResult<()> {
        let path = Self::path(subject, batch_type)?;
        self.store.set(&path, tree_document(tree), SetMode::Overwrite).await?;
        Ok(())
    }

    /// Adds a write of `tree` to `batch`, so the tree commits together
    /// with the snapshots it describes.
    ///
    /// # Errors
    ///
    /// Returns an error if either segment is empty or contains a slash.
    pub fn stage(batch: &mut WriteBatch, subject: &str, batch_type: &str, tree: &DigestTree) -> CoreResult<()> {
        let path = Self::path(subject, batch_type)?;
        batch.set(path, tree_document(tree), SetMode::Overwrite);
        Ok(())
    }
}

fn tree_document(tree: &DigestTree) -> Document {
    let mut doc = Document::new();
    doc.insert("head".into(), tree.head.to_value());
    doc
}

/// Collection holding stored digest trees under each subject.
pub const DIGEST_COLLECTION: &str = "digests";

#[cfg(test)]
mod tests {
    use super::*;
    use leaguesync_storage::InMemoryDocumentStore;
    use proptest::prelude::*;

    fn team(id: i64, ovr: i64) -> Document {
        [
            ("teamId".to_string(), Value::Integer(id)),
            ("ovrRating".to_string(), Value::Integer(ovr)),
        ]
        .into_iter()
        .collect()
    }

    fn tree(batch: &[Document]) -> DigestTree {
        DigestTree::build(batch, id_field("teamId"), &FieldPolicy::volatile(), &Sha256Hasher).unwrap()
    }

    #[test]
    fn empty_baseline_is_hash_of_empty_string() {
        let empty = DigestTree::empty(&Sha256Hasher);
        assert_eq!(
            empty.root_hash(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert!(empty.leaves().is_empty());
    }

    #[test]
    fn first_batch_reports_everything() {
        let batch = [team(1, 80), team(2, 75), team(3, 90)];
        let new = tree(&batch);
        assert_eq!(new.diff(&DigestTree::empty(&Sha256Hasher)).len(), 3);
        assert_eq!(new.changed_keys(&DigestTree::empty(&Sha256Hasher)), vec!["1", "2", "3"]);
    }

    #[test]
    fn only_the_changed_team_is_reported() {
        let old = tree(&[team(1, 80), team(2, 75), team(3, 90)]);
        let new = tree(&[team(3, 90), team(1, 80), team(2, 78)]);
        let changed = new.diff(&old);
        assert_eq!(changed.len(), 1);
        let b_leaf = new.leaves().iter().find(|l| l.key.as_deref() == Some("2")).unwrap();
        assert_eq!(changed[0], b_leaf.hash);
    }

    #[test]
    fn volatile_fields_do_not_change_hashes() {
        let mut stamped = team(1, 80);
        stamped.insert("lastUpdated".into(), Value::Integer(99));
        assert_eq!(tree(&[team(1, 80)]).root_hash(), tree(&[stamped]).root_hash());
    }

    #[test]
    fn removals_are_not_reported() {
        let old = tree(&[team(1, 80), team(2, 75)]);
        let new = tree(&[team(1, 80)]);
        assert_ne!(old.root_hash(), new.root_hash());
        assert!(new.diff(&old).is_empty());
    }

    #[test]
    fn missing_id_is_rejected() {
        let mut anonymous = team(1, 80);
        anonymous.remove("teamId");
        assert!(DigestTree::build(&[anonymous], id_field("teamId"), &FieldPolicy::all(), &Sha256Hasher).is_err());
    }

    #[test]
    fn nested_trees_compare_by_key() {
        let inner_old = tree(&[team(1, 80), team(2, 75)]);
        let inner_new = tree(&[team(1, 80), team(2, 76)]);
        let wrap = |inner: DigestTree| DigestTree {
            head: DigestNode {
                hash: format!("outer-{}", inner.root_hash()),
                key: None,
                children: vec![DigestNode {
                    key: Some("TEAMS".into()),
                    ..inner.head
                }],
            },
        };
        let changed = wrap(inner_new).changed_keys(&wrap(inner_old));
        assert_eq!(changed, vec!["2"]);
    }

    #[tokio::test]
    async fn stored_tree_round_trips() {
        let store = DigestTreeStore::new(Arc::new(InMemoryDocumentStore::new()));
        let missing = store.get("17", "TEAMS", &Sha256Hasher).await.unwrap();
        assert_eq!(missing, DigestTree::empty(&Sha256Hasher));

        let batch = tree(&[team(1, 80), team(2, 75)]);
        store.put("17", "TEAMS", &batch).await.unwrap();
        assert_eq!(store.get("17", "TEAMS", &Sha256Hasher).await.unwrap(), batch);
        assert_eq!(
            DigestTreeStore::<InMemoryDocumentStore>::path("17", "TEAMS").unwrap().to_string(),
            "league_data/17/digests/TEAMS"
        );
    }

    fn batch_strategy() -> impl Strategy<Value = Vec<Document>> {
        prop::collection::btree_map(0i64..500, 0i64..100, 1..20)
            .prop_map(|teams| teams.into_iter().map(|(id, ovr)| team(id, ovr)).collect())
    }

    proptest! {
        #[test]
        fn building_is_deterministic(batch in batch_strategy()) {
            let a = tree(&batch);
            let b = tree(&batch);
            prop_assert_eq!(&a, &b);
            prop_assert!(a.diff(&b).is_empty());
        }

        #[test]
        fn single_change_is_isolated(batch in batch_strategy(), pick in any::<prop::sample::Index>()) {
            let i = pick.index(batch.len());
            let mut changed = batch.clone();
            let ovr = changed[i]["ovrRating"].as_integer().unwrap();
            changed[i].insert("ovrRating".into(), Value::Integer(ovr + 1));

            let diff = tree(&changed).changed_keys(&tree(&batch));
            let expected = changed[i]["teamId"].to_key_string().unwrap();
            prop_assert_eq!(diff, vec![expected]);
        }
    }
}
