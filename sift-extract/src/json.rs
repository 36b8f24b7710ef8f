//! Top-level JSON value capture from unframed byte streams

use bytes::Bytes;
use sift_core::{Result, RingBuffer};
use tracing::debug;

/// Semantic acceptance hook for captured candidates.
///
/// When supplied, the verifier replaces syntactic JSON validation as the
/// capture test and extends the probe to completed values nested inside
/// each candidate, letting callers define their own acceptance grammar.
pub trait JsonVerifier {
    /// Whether `candidate`, a completed delimiter-balanced unit, should be
    /// captured.
    fn verify(&self, candidate: &[u8]) -> bool;
}

impl<F> JsonVerifier for F
where
    F: Fn(&[u8]) -> bool,
{
    fn verify(&self, candidate: &[u8]) -> bool {
        self(candidate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitKind {
    Object,
    Array,
}

impl UnitKind {
    fn from_opener(byte: u8) -> Option<UnitKind> {
        match byte {
            b'{' => Some(UnitKind::Object),
            b'[' => Some(UnitKind::Array),
            _ => None,
        }
    }

    fn closer(self) -> u8 {
        match self {
            UnitKind::Object => b'}',
            UnitKind::Array => b']',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitStatus {
    /// Waiting for this unit's closing delimiter.
    WaitForEnd,
    /// A nested child is open; bytes belong to it until it completes.
    WaitForFieldToComplete,
    /// Closed. Positions are final and further bytes are ignored.
    Completed,
}

/// One `{...}` or `[...]` unit. Nodes live in the extractor's arena;
/// children are arena indices in creation order.
#[derive(Debug)]
struct Node {
    kind: UnitKind,
    /// Buffer-relative position of the opening delimiter.
    head: usize,
    /// Buffer-relative position of the closing delimiter; only meaningful
    /// once completed.
    tail: usize,
    status: UnitStatus,
    children: Vec<usize>,
    /// Completed but failed syntactic validation; never re-tested since
    /// the extracted bytes can no longer change.
    rejected: bool,
}

/// A live top-level candidate: its root node plus the chain of open nodes
/// from the root down to wherever the next byte belongs. An empty chain
/// means the root has completed.
#[derive(Debug)]
struct Tree {
    root: usize,
    open_path: Vec<usize>,
}

/// Finds complete top-level JSON values in an unframed byte stream.
///
/// Bytes are staged in a fixed-capacity ring buffer and scanned exactly
/// once. Every top-level `{` or `[` opens a candidate, including openers
/// nested inside an already-open candidate, so corrupted outer units never
/// hide an inner value that could still be recovered on its own. A
/// candidate completes when its delimiters balance; completed object
/// candidates whose bytes parse as JSON are captured and everything up to
/// their closing byte is discarded.
///
/// The scanner tracks delimiters only. It does not interpret string
/// literals, so a closing delimiter inside a quoted string ends the unit
/// and the capture test is what rejects the malformed result.
pub struct JsonStreamExtractor {
    buffer: RingBuffer,
    /// Bytes of the buffer already scanned; never revisited.
    scanned: usize,
    arena: Vec<Node>,
    /// Live top-level candidates in creation order.
    trees: Vec<Tree>,
    verifier: Option<Box<dyn JsonVerifier + Send>>,
}

impl JsonStreamExtractor {
    /// Create an extractor staging at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        JsonStreamExtractor {
            buffer: RingBuffer::new(capacity),
            scanned: 0,
            arena: Vec::new(),
            trees: Vec::new(),
            verifier: None,
        }
    }

    /// Create an extractor that captures through `verifier` instead of
    /// syntactic JSON validation.
    pub fn with_verifier(capacity: usize, verifier: Box<dyn JsonVerifier + Send>) -> Self {
        JsonStreamExtractor {
            verifier: Some(verifier),
            ..JsonStreamExtractor::new(capacity)
        }
    }

    /// Bytes currently staged.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Free staging space remaining.
    pub fn remaining_capacity(&self) -> usize {
        self.buffer.free_space()
    }

    /// Drop all staged bytes and candidate state.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.arena.clear();
        self.trees.clear();
    }

    /// Feed a chunk and return every value captured while scanning it.
    ///
    /// The chunk is staged and scanned incrementally; when the stage fills
    /// mid-chunk, stalled candidates are evicted to make room, so the call
    /// always consumes the whole chunk. Captures are returned in stream
    /// order as owned byte strings.
    pub fn parse(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        let mut captures = Vec::new();
        if self.buffer.capacity() == 0 {
            return Ok(captures);
        }
        let mut input = data;
        loop {
            let copied = self.buffer.append_upto(input);
            input = &input[copied..];
            self.scan_pass(&mut captures)?;
            if input.is_empty() {
                return Ok(captures);
            }
        }
    }

    /// Scan every unscanned staged byte, then evict if the stage is full.
    fn scan_pass(&mut self, out: &mut Vec<Bytes>) -> Result<()> {
        while self.scanned < self.buffer.len() {
            let pos = self.scanned;
            let byte = self.buffer.byte_at(pos)?;
            self.scanned += 1;

            let mut captured = None;
            let mut blocked = false;
            for t in 0..self.trees.len() {
                self.advance_tree(t, byte, pos);
                if captured.is_none() && !blocked {
                    captured = self.check_tree(t);
                    if !self.tree_completed(t) {
                        // An older unit still in progress shields younger
                        // siblings, so nesting resolves to the outermost
                        // value.
                        blocked = true;
                    }
                }
            }

            if let Some(node) = captured {
                out.push(self.capture(node)?);
                continue;
            }
            // The byte itself may open a fresh top-level candidate, even
            // when an existing candidate consumed it as a nested opener.
            if let Some(kind) = UnitKind::from_opener(byte) {
                self.spawn_root(kind, pos);
            }
        }
        self.evict_on_overflow()
    }

    /// Dispatch one byte to the deepest open node of a candidate tree.
    fn advance_tree(&mut self, tree_idx: usize, byte: u8, pos: usize) {
        let Some(&deepest) = self.trees[tree_idx].open_path.last() else {
            return;
        };
        if byte == self.arena[deepest].kind.closer() {
            self.arena[deepest].status = UnitStatus::Completed;
            self.arena[deepest].tail = pos;
            self.trees[tree_idx].open_path.pop();
            if let Some(&parent) = self.trees[tree_idx].open_path.last() {
                self.arena[parent].status = UnitStatus::WaitForEnd;
            }
        } else if let Some(kind) = UnitKind::from_opener(byte) {
            let child = self.alloc_node(kind, pos);
            self.arena[deepest].children.push(child);
            self.arena[deepest].status = UnitStatus::WaitForFieldToComplete;
            self.trees[tree_idx].open_path.push(child);
        }
    }

    /// Capture test for one candidate tree. Returns the arena index of the
    /// node to capture, if any.
    fn check_tree(&mut self, tree_idx: usize) -> Option<usize> {
        let root = self.trees[tree_idx].root;
        if self.verifier.is_some() {
            return self.probe_verified(root);
        }
        let node = &self.arena[root];
        if node.status != UnitStatus::Completed
            || node.kind != UnitKind::Object
            || node.rejected
        {
            return None;
        }
        if self.extract_parses(root) {
            return Some(root);
        }
        self.arena[root].rejected = true;
        None
    }

    /// Verifier-driven probe: the candidate itself when completed and not
    /// an array, then descendants reached through completed non-array
    /// children, in creation order. First verified node wins.
    fn probe_verified(&self, root: usize) -> Option<usize> {
        let verifier = self.verifier.as_deref()?;
        let mut work = vec![root];
        while let Some(idx) = work.pop() {
            let node = &self.arena[idx];
            if node.status == UnitStatus::Completed && node.kind == UnitKind::Object {
                if let Ok(bytes) = self.extract_bytes(idx) {
                    if verifier.verify(&bytes) {
                        return Some(idx);
                    }
                }
            }
            for &child in node.children.iter().rev() {
                let c = &self.arena[child];
                if c.status == UnitStatus::Completed && c.kind == UnitKind::Object {
                    work.push(child);
                }
            }
        }
        None
    }

    /// Extract the captured node, discard all other candidates, and trim
    /// the stage past the captured tail.
    fn capture(&mut self, node: usize) -> Result<Bytes> {
        let bytes = self.extract_bytes(node)?;
        let trim = self.arena[node].tail + 1;
        self.buffer.skip(trim)?;
        self.scanned -= trim;
        self.arena.clear();
        self.trees.clear();
        Ok(bytes.into())
    }

    fn extract_bytes(&self, node: usize) -> Result<Vec<u8>> {
        let n = &self.arena[node];
        let mut buf = vec![0u8; n.tail + 1 - n.head];
        self.buffer.peek_into(n.head, &mut buf)?;
        Ok(buf)
    }

    fn extract_parses(&self, node: usize) -> bool {
        match self.extract_bytes(node) {
            Ok(bytes) => serde_json::from_slice::<serde_json::Value>(&bytes).is_ok(),
            Err(_) => false,
        }
    }

    /// Make room when the stage is full and nothing captured: drop
    /// candidates already pinned to position zero, trim to the earliest
    /// surviving candidate, or reset outright when none survive.
    fn evict_on_overflow(&mut self) -> Result<()> {
        if self.buffer.free_space() > 0 || self.buffer.capacity() == 0 {
            return Ok(());
        }
        let before = self.trees.len();
        let arena = &self.arena;
        self.trees.retain(|t| arena[t.root].head != 0);
        let dropped = before - self.trees.len();

        if self.trees.is_empty() {
            debug!(dropped, "stage full with no recoverable candidates, resetting");
            self.reset();
            return Ok(());
        }

        let Some(trim) = self.trees.iter().map(|t| self.arena[t.root].head).min() else {
            return Ok(());
        };
        self.buffer.skip(trim)?;
        self.scanned -= trim;
        self.shift_down(trim);
        debug!(dropped, trim, "evicted stalled candidates to free stage space");
        Ok(())
    }

    /// Rebuild the arena from the surviving trees with every position
    /// shifted down by `trim`, discarding nodes of dropped trees.
    fn shift_down(&mut self, trim: usize) {
        let mut arena: Vec<Node> = Vec::new();
        let mut trees: Vec<Tree> = Vec::with_capacity(self.trees.len());
        for tree in &self.trees {
            let root = copy_subtree(&self.arena, &mut arena, tree.root, trim);
            let open_path = rebuild_open_path(&arena, root);
            trees.push(Tree { root, open_path });
        }
        self.arena = arena;
        self.trees = trees;
    }

    fn alloc_node(&mut self, kind: UnitKind, pos: usize) -> usize {
        self.arena.push(Node {
            kind,
            head: pos,
            tail: 0,
            status: UnitStatus::WaitForEnd,
            children: Vec::new(),
            rejected: false,
        });
        self.arena.len() - 1
    }

    fn spawn_root(&mut self, kind: UnitKind, pos: usize) {
        let root = self.alloc_node(kind, pos);
        self.trees.push(Tree {
            root,
            open_path: vec![root],
        });
    }

    fn tree_completed(&self, tree_idx: usize) -> bool {
        self.trees[tree_idx].open_path.is_empty()
    }
}

/// Copy the subtree rooted at `root` into `dst` with positions shifted
/// down by `trim`, preserving per-parent child order.
fn copy_subtree(src: &[Node], dst: &mut Vec<Node>, root: usize, trim: usize) -> usize {
    let new_root = dst.len();
    dst.push(shifted(&src[root], trim));
    let mut work = vec![(root, new_root)];
    while let Some((old, new)) = work.pop() {
        for i in 0..src[old].children.len() {
            let child_old = src[old].children[i];
            let child_new = dst.len();
            dst.push(shifted(&src[child_old], trim));
            dst[new].children.push(child_new);
            work.push((child_old, child_new));
        }
    }
    new_root
}

fn shifted(node: &Node, trim: usize) -> Node {
    Node {
        kind: node.kind,
        head: node.head - trim,
        tail: if node.status == UnitStatus::Completed {
            node.tail - trim
        } else {
            0
        },
        status: node.status,
        children: Vec::new(),
        rejected: node.rejected,
    }
}

/// The open chain of a tree is the run of last children still waiting to
/// complete, starting at the root.
fn rebuild_open_path(arena: &[Node], root: usize) -> Vec<usize> {
    let mut path = Vec::new();
    let mut cur = root;
    loop {
        match arena[cur].status {
            UnitStatus::Completed => return path,
            UnitStatus::WaitForEnd => {
                path.push(cur);
                return path;
            }
            UnitStatus::WaitForFieldToComplete => {
                path.push(cur);
                let Some(&next) = arena[cur].children.last() else {
                    return path;
                };
                cur = next;
            }
        }
    }
}
