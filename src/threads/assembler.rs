//! Thread assembly: rebuild the nested reply tree of a post from the flat,
//! parent-referencing list the database stores.
//!
//! Nodes live in an arena indexed by position; links are built in one pass
//! over an id -> slot map, so assembly is O(n) and never recurses, however
//! deep a thread goes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One comment as stored: flat, pointing at its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub id: String,
    pub post_id: String,
    pub parent_id: Option<String>,
    pub depth: i64,
    pub author_id: String,
    pub author_username: String,
    pub content: String,
    pub score: i64,
    pub is_deleted: bool,
    pub created_at: String,
}

/// One comment in the assembled tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub depth: i64,
    pub author_id: String,
    pub author_username: String,
    /// `None` for deleted comments, which stay in place as tombstones.
    pub content: Option<String>,
    pub score: i64,
    pub is_deleted: bool,
    pub created_at: String,
    pub children: Vec<CommentNode>,
}

impl CommentNode {
    fn from_record(record: CommentRecord) -> Self {
        let content = if record.is_deleted {
            None
        } else {
            Some(record.content)
        };
        Self {
            id: record.id,
            parent_id: record.parent_id,
            depth: record.depth,
            author_id: record.author_id,
            author_username: record.author_username,
            content,
            score: record.score,
            is_deleted: record.is_deleted,
            created_at: record.created_at,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including this one.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

/// Tear down the subtree with an explicit stack so a long reply chain cannot
/// exhaust the call stack.
impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// A depth that disagrees with the parent chain. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InconsistentDepth {
    pub comment_id: String,
    pub parent_id: String,
    pub depth: i64,
    pub parent_depth: i64,
}

/// Assembled roots plus any anomalies noticed on the way.
#[derive(Debug, Default)]
pub struct Assembly {
    pub roots: Vec<CommentNode>,
    pub orphans: Vec<String>,
    pub inconsistent: Vec<InconsistentDepth>,
}

/// Build the reply tree. Input must be in creation order; that order is kept
/// among roots and among siblings. Comments whose parent is missing from the
/// input become roots.
pub fn assemble(flat: Vec<CommentRecord>) -> Vec<CommentNode> {
    let assembly = assemble_checked(flat);

    for orphan in &assembly.orphans {
        tracing::warn!(comment = %orphan, "Parent missing, promoting comment to root");
    }
    for bad in &assembly.inconsistent {
        tracing::warn!(
            comment = %bad.comment_id,
            parent = %bad.parent_id,
            depth = bad.depth,
            parent_depth = bad.parent_depth,
            "InconsistentDepth: stored depth does not follow parent"
        );
    }

    assembly.roots
}

/// Like [`assemble`], but hands back the anomalies instead of logging them.
pub fn assemble_checked(flat: Vec<CommentRecord>) -> Assembly {
    let count = flat.len();

    let mut index: HashMap<String, usize> = HashMap::with_capacity(count);
    for (slot, record) in flat.iter().enumerate() {
        // First occurrence wins on duplicate ids
        index.entry(record.id.clone()).or_insert(slot);
    }

    let mut parent_of: Vec<Option<usize>> = vec![None; count];
    let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut root_slots = Vec::new();
    let mut orphans = Vec::new();
    let mut inconsistent = Vec::new();

    for (slot, record) in flat.iter().enumerate() {
        let parent_slot = record
            .parent_id
            .as_deref()
            .and_then(|pid| index.get(pid).copied())
            .filter(|&p| p != slot);

        match parent_slot {
            Some(p) => {
                let parent = &flat[p];
                if record.depth != parent.depth + 1 {
                    inconsistent.push(InconsistentDepth {
                        comment_id: record.id.clone(),
                        parent_id: parent.id.clone(),
                        depth: record.depth,
                        parent_depth: parent.depth,
                    });
                }
                parent_of[slot] = Some(p);
                children_of[p].push(slot);
            }
            None => {
                if record.parent_id.is_some() {
                    orphans.push(record.id.clone());
                }
                root_slots.push(slot);
            }
        }
    }

    // A parent cycle has no root to hang from; cut it at its earliest member.
    let mut reachable = mark_reachable(&root_slots, &children_of);
    for slot in 0..count {
        if reachable[slot] {
            continue;
        }
        if let Some(p) = parent_of[slot].take() {
            children_of[p].retain(|&c| c != slot);
        }
        orphans.push(flat[slot].id.clone());
        insert_root(&mut root_slots, slot);

        let mut stack = vec![slot];
        while let Some(s) = stack.pop() {
            if !reachable[s] {
                reachable[s] = true;
                stack.extend(children_of[s].iter().copied());
            }
        }
    }

    let roots = materialize(flat, &root_slots, &children_of);

    Assembly {
        roots,
        orphans,
        inconsistent,
    }
}

fn insert_root(roots: &mut Vec<usize>, slot: usize) {
    let at = roots.partition_point(|&r| r < slot);
    roots.insert(at, slot);
}

fn mark_reachable(from: &[usize], children_of: &[Vec<usize>]) -> Vec<bool> {
    let mut seen = vec![false; children_of.len()];
    let mut stack: Vec<usize> = from.to_vec();
    while let Some(slot) = stack.pop() {
        if seen[slot] {
            continue;
        }
        seen[slot] = true;
        stack.extend(children_of[slot].iter().copied());
    }
    seen
}

/// Turn the index-linked arena into owned nodes, bottom-up, without recursion.
fn materialize(
    flat: Vec<CommentRecord>,
    root_slots: &[usize],
    children_of: &[Vec<usize>],
) -> Vec<CommentNode> {
    let mut nodes: Vec<Option<CommentNode>> = flat
        .into_iter()
        .map(|r| Some(CommentNode::from_record(r)))
        .collect();

    // Post-order walk: a node is finished only after all its children.
    let mut order = Vec::with_capacity(nodes.len());
    let mut stack: Vec<(usize, bool)> = root_slots.iter().rev().map(|&s| (s, false)).collect();
    while let Some((slot, expanded)) = stack.pop() {
        if expanded {
            order.push(slot);
        } else {
            stack.push((slot, true));
            for &child in children_of[slot].iter().rev() {
                stack.push((child, false));
            }
        }
    }

    for slot in order {
        let children: Vec<CommentNode> = children_of[slot]
            .iter()
            .filter_map(|&c| nodes[c].take())
            .collect();
        if let Some(node) = nodes[slot].as_mut() {
            node.children = children;
        }
    }

    root_slots.iter().filter_map(|&s| nodes[s].take()).collect()
}
