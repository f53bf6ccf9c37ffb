//! Character trie holding the inverted index.
//!
//! Nodes live in an arena and refer to their children by index. The path from
//! the root to a node spells one token; a node terminates a token when it has
//! postings (`df > 0`). Freed slots are recycled through a free list, so
//! removal never leaves dangling indices behind.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

pub type NodeId = usize;

/// Per-field term frequency of one token in one document.
pub type FieldFreqs = BTreeMap<String, f64>;

const ROOT: NodeId = 0;

#[derive(Debug, Clone, Default)]
struct Node {
    children: BTreeMap<char, NodeId>,
    df: u32,
    docs: BTreeMap<String, FieldFreqs>,
}

impl Node {
    fn is_vacant(&self) -> bool {
        self.children.is_empty() && self.docs.is_empty()
    }
}

/// Read-only view of a token-terminal node.
#[derive(Debug, Clone, Copy)]
pub struct TermEntry<'a> {
    node: &'a Node,
}

impl<'a> TermEntry<'a> {
    pub fn df(&self) -> u32 {
        self.node.df
    }

    pub fn docs(&self) -> &'a BTreeMap<String, FieldFreqs> {
        &self.node.docs
    }
}

/// Sub-linear occurrence weight. Accumulating keeps `tf == sqrt(total occurrences)`.
pub fn accumulate_tf(previous: f64, occurrences: u32) -> f64 {
    (previous * previous + f64::from(occurrences)).sqrt()
}

#[derive(Debug, Clone)]
pub struct Trie {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
}

impl Default for Trie {
    fn default() -> Self {
        Self { nodes: vec![Node::default()], free: Vec::new() }
    }
}

/// Two tries are equal when they index the same tokens with the same postings,
/// regardless of how their arenas are laid out.
impl PartialEq for Trie {
    fn eq(&self, other: &Self) -> bool {
        let flatten = |trie: &Trie| {
            trie.terms()
                .into_iter()
                .map(|(token, entry)| (token, entry.df(), entry.docs().clone()))
                .collect::<Vec<_>>()
        };
        flatten(self) == flatten(other)
    }
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `occurrences` of `token` in `field` of `doc`. Empty tokens and zero
    /// occurrences are ignored.
    pub fn insert(&mut self, token: &str, doc: &str, field: &str, occurrences: u32) {
        if token.is_empty() || occurrences == 0 {
            return;
        }
        let mut current = ROOT;
        for ch in token.chars() {
            current = match self.nodes[current].children.get(&ch) {
                Some(&child) => child,
                None => {
                    let child = self.alloc();
                    self.nodes[current].children.insert(ch, child);
                    child
                }
            };
        }
        let node = &mut self.nodes[current];
        if !node.docs.contains_key(doc) {
            node.df += 1;
        }
        let tf = node
            .docs
            .entry(doc.to_string())
            .or_default()
            .entry(field.to_string())
            .or_insert(0.0);
        *tf = accumulate_tf(*tf, occurrences);
    }

    /// Drop `doc` from the postings of `token`, pruning nodes left without
    /// postings or children. Returns whether a posting was removed.
    pub fn remove(&mut self, token: &str, doc: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        let mut path = Vec::with_capacity(token.len());
        let mut current = ROOT;
        for ch in token.chars() {
            match self.nodes[current].children.get(&ch) {
                Some(&child) => {
                    path.push((current, ch));
                    current = child;
                }
                None => return false,
            }
        }
        let node = &mut self.nodes[current];
        if node.docs.remove(doc).is_none() {
            return false;
        }
        node.df -= 1;

        let mut child = current;
        while let Some((parent, ch)) = path.pop() {
            if !self.nodes[child].is_vacant() {
                break;
            }
            self.nodes[parent].children.remove(&ch);
            self.release(child);
            child = parent;
        }
        true
    }

    pub fn lookup(&self, token: &str) -> Option<TermEntry<'_>> {
        if token.is_empty() {
            return None;
        }
        let node = &self.nodes[self.find(token)?];
        (node.df > 0).then_some(TermEntry { node })
    }

    /// Up to `limit` indexed tokens starting with `prefix`, in lexicographic
    /// order; the prefix itself comes first when it is indexed.
    pub fn expand(&self, prefix: &str, limit: usize) -> Vec<String> {
        let mut found = Vec::new();
        if prefix.is_empty() || limit == 0 {
            return found;
        }
        let Some(start) = self.find(prefix) else {
            return found;
        };
        let mut stack = vec![(start, prefix.to_string())];
        while let Some((id, token)) = stack.pop() {
            let node = &self.nodes[id];
            if node.df > 0 {
                found.push(token.clone());
                if found.len() == limit {
                    break;
                }
            }
            for (&ch, &child) in node.children.iter().rev() {
                let mut next = token.clone();
                next.push(ch);
                stack.push((child, next));
            }
        }
        found
    }

    /// Every indexed token with its entry, in lexicographic order.
    pub fn terms(&self) -> Vec<(String, TermEntry<'_>)> {
        let mut out = Vec::new();
        let mut stack = vec![(ROOT, String::new())];
        while let Some((id, token)) = stack.pop() {
            let node = &self.nodes[id];
            if node.df > 0 {
                out.push((token.clone(), TermEntry { node }));
            }
            for (&ch, &child) in node.children.iter().rev() {
                let mut next = token.clone();
                next.push(ch);
                stack.push((child, next));
            }
        }
        out
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[ROOT].is_vacant()
    }

    fn find(&self, token: &str) -> Option<NodeId> {
        token
            .chars()
            .try_fold(ROOT, |id, ch| self.nodes[id].children.get(&ch).copied())
    }

    fn alloc(&mut self) -> NodeId {
        match self.free.pop() {
            Some(id) => id,
            None => {
                self.nodes.push(Node::default());
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        self.nodes[id] = Node::default();
        self.free.push(id);
    }

    fn graft(&mut self, parsed: ParsedNode) -> NodeId {
        let id = self.alloc();
        let ParsedNode { df, docs, children } = parsed;
        self.nodes[id].df = df;
        self.nodes[id].docs = docs;
        for (ch, child) in children {
            let child_id = self.graft(child);
            self.nodes[id].children.insert(ch, child_id);
        }
        id
    }
}

// Persisted layout: {"df": n, "docs": {doc: {field: tf}}, "<char>": child, ...}

struct NodeView<'a> {
    trie: &'a Trie,
    id: NodeId,
}

impl Serialize for NodeView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let node = &self.trie.nodes[self.id];
        let mut map = serializer.serialize_map(Some(node.children.len() + 2))?;
        map.serialize_entry("df", &node.df)?;
        map.serialize_entry("docs", &node.docs)?;
        let mut buf = [0u8; 4];
        for (&ch, &child) in &node.children {
            let key: &str = ch.encode_utf8(&mut buf);
            map.serialize_entry(key, &NodeView { trie: self.trie, id: child })?;
        }
        map.end()
    }
}

impl Serialize for Trie {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NodeView { trie: self, id: ROOT }.serialize(serializer)
    }
}

struct ParsedNode {
    df: u32,
    docs: BTreeMap<String, FieldFreqs>,
    children: BTreeMap<char, ParsedNode>,
}

impl ParsedNode {
    /// Every non-root node must terminate a token or lead to one.
    fn check_reachable<E: de::Error>(&self, path: &mut String) -> Result<(), E> {
        for (ch, child) in &self.children {
            path.push(*ch);
            if child.docs.is_empty() && child.children.is_empty() {
                return Err(E::custom(format!("trie node `{path}` holds no token")));
            }
            child.check_reachable::<E>(path)?;
            path.pop();
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for ParsedNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = ParsedNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a trie node")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ParsedNode, A::Error> {
        let mut df = None;
        let mut docs: Option<BTreeMap<String, FieldFreqs>> = None;
        let mut children = BTreeMap::new();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "df" if df.is_some() => return Err(de::Error::duplicate_field("df")),
                "docs" if docs.is_some() => return Err(de::Error::duplicate_field("docs")),
                "df" => df = Some(map.next_value()?),
                "docs" => docs = Some(map.next_value()?),
                _ => {
                    let mut chars = key.chars();
                    let ch = match (chars.next(), chars.next()) {
                        (Some(ch), None) => ch,
                        _ => return Err(de::Error::custom(format!("unexpected trie key `{key}`"))),
                    };
                    if children.insert(ch, map.next_value()?).is_some() {
                        return Err(de::Error::custom(format!("repeated trie key `{key}`")));
                    }
                }
            }
        }
        let df: u32 = df.ok_or_else(|| de::Error::missing_field("df"))?;
        let docs = docs.ok_or_else(|| de::Error::missing_field("docs"))?;
        if df as usize != docs.len() {
            return Err(de::Error::custom(format!(
                "df {df} does not match {} postings",
                docs.len()
            )));
        }
        Ok(ParsedNode { df, docs, children })
    }
}

impl<'de> Deserialize<'de> for Trie {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let root = ParsedNode::deserialize(deserializer)?;
        if root.df != 0 || !root.docs.is_empty() {
            return Err(de::Error::custom("trie root cannot index the empty token"));
        }
        root.check_reachable::<D::Error>(&mut String::new())?;
        let mut trie = Trie { nodes: Vec::new(), free: Vec::new() };
        trie.graft(root);
        Ok(trie)
    }
}
