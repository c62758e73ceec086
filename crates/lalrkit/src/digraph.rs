//! The digraph algorithm from DeRemer and Pennello.
//!
//! Given a relation `R` and a base function `F'`, it computes the smallest `F`
//! satisfying `F(x) = F'(x) ∪ ⋃{ F(y) | x R y }`. Every strongly connected
//! component of `R` is visited once and all of its members receive the same value.

use crate::types::Map;
use std::{cmp, hash::Hash};

/// A value that can absorb another value of the same type.
pub trait Set {
    fn union_with(&mut self, other: &Self);
}

impl<T> Set for crate::types::Set<T>
where
    T: Clone + Eq + Hash,
{
    fn union_with(&mut self, other: &Self) {
        self.extend(other.iter().cloned())
    }
}

impl<B> Set for bit_set::BitSet<B>
where
    B: bit_vec::BitBlock,
{
    fn union_with(&mut self, other: &Self) {
        self.union_with(other)
    }
}

/// Solve `F(x) = F'(x) ∪ ⋃{ F(y) | x R y }` for every `x` in `domain`.
///
/// Nodes that only show up as targets of `relation` are solved as well, with
/// an empty base value when `base` has no entry for them. The entries of the
/// result are ordered by first visit.
pub fn digraph<K, T>(
    domain: impl IntoIterator<Item = K>,
    relation: &Map<K, Vec<K>>,
    base: &Map<K, T>,
) -> Map<K, T>
where
    K: Clone + Eq + Hash,
    T: Set + Clone + Default,
{
    let mut digraph = Digraph {
        relation,
        base,
        nodes: crate::types::Set::default(),
        n: vec![],
        f: vec![],
        stack: vec![],
    };
    for key in domain {
        let x = digraph.node(&key);
        if digraph.n[x] == 0 {
            digraph.traverse(x);
        }
    }
    digraph.nodes.into_iter().zip(digraph.f).collect()
}

struct Digraph<'a, K, T> {
    relation: &'a Map<K, Vec<K>>,
    base: &'a Map<K, T>,
    nodes: crate::types::Set<K>,
    n: Vec<usize>,
    f: Vec<T>,
    stack: Vec<usize>,
}

struct Frame {
    node: usize,
    depth: usize,
    successors: Vec<usize>,
    cursor: usize,
}

impl<K, T> Digraph<'_, K, T>
where
    K: Clone + Eq + Hash,
    T: Set + Clone + Default,
{
    fn node(&mut self, key: &K) -> usize {
        if let Some(i) = self.nodes.get_index_of(key) {
            return i;
        }
        let (i, _) = self.nodes.insert_full(key.clone());
        self.n.push(0);
        self.f.push(self.base.get(key).cloned().unwrap_or_default());
        i
    }

    fn traverse(&mut self, x: usize) {
        let mut frames = vec![self.enter(x)];
        while let Some(frame) = frames.last_mut() {
            let x = frame.node;
            if let Some(&y) = frame.successors.get(frame.cursor) {
                frame.cursor += 1;
                if self.n[y] == 0 {
                    let child = self.enter(y);
                    frames.push(child);
                } else {
                    self.merge(x, y);
                }
                continue;
            }

            let depth = frame.depth;
            frames.pop();
            self.finish(x, depth);
            if let Some(parent) = frames.last() {
                self.merge(parent.node, x);
            }
        }
    }

    fn enter(&mut self, x: usize) -> Frame {
        self.stack.push(x);
        let depth = self.stack.len();
        self.n[x] = depth;

        let relation = self.relation;
        let targets = relation.get(&self.nodes[x]);
        let successors = match targets {
            Some(targets) => targets.iter().map(|y| self.node(y)).collect(),
            None => vec![],
        };
        Frame {
            node: x,
            depth,
            successors,
            cursor: 0,
        }
    }

    fn merge(&mut self, x: usize, y: usize) {
        self.n[x] = cmp::min(self.n[x], self.n[y]);
        if x != y {
            // F(x) <- F(x) \cup F(y)
            let (slot, added) = get_two_mut(&mut self.f, x, y);
            slot.union_with(added);
        }
    }

    fn finish(&mut self, x: usize, depth: usize) {
        if self.n[x] != depth {
            return;
        }
        while let Some(s) = self.stack.pop() {
            self.n[s] = usize::MAX;
            if s == x {
                break;
            }
            // F(s) <- F(x)
            let (slot, value) = get_two_mut(&mut self.f, s, x);
            slot.clone_from(value);
        }
    }
}

fn get_two_mut<V>(slice: &mut [V], x: usize, y: usize) -> (&mut V, &mut V) {
    assert!(
        x != y && cmp::max(x, y) < slice.len(),
        "index condition not satisfied"
    );
    let i = (x + y) / 2 + 1;
    let (a, b) = slice.split_at_mut(i);
    if x < y {
        (&mut a[x], &mut b[y - i])
    } else {
        (&mut b[x - i], &mut a[y])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bit_set::BitSet;

    fn bits(values: &[usize]) -> BitSet {
        values.iter().copied().collect()
    }

    #[test]
    fn test_get_two_mut() {
        let mut values = ["a", "b", "c", "d"];
        assert!(matches!(get_two_mut(&mut values, 0, 1), t if *t.0=="a" && *t.1=="b"));
        assert!(matches!(get_two_mut(&mut values, 1, 0), t if *t.0=="b" && *t.1=="a"));
        assert!(matches!(get_two_mut(&mut values, 0, 2), t if *t.0=="a" && *t.1=="c"));
        assert!(matches!(get_two_mut(&mut values, 2, 1), t if *t.0=="c" && *t.1=="b"));
        assert!(matches!(get_two_mut(&mut values, 3, 2), t if *t.0=="d" && *t.1=="c"));
    }

    #[test]
    fn cycle_members_share_the_union() {
        let mut relation = Map::default();
        relation.insert("a", vec!["b"]);
        relation.insert("b", vec!["c"]);
        relation.insert("c", vec!["a"]);
        let mut base = Map::default();
        base.insert("a", bits(&[1]));
        base.insert("b", bits(&[2]));
        base.insert("c", bits(&[]));

        let result = digraph(["a", "b", "c"], &relation, &base);
        for key in ["a", "b", "c"] {
            assert_eq!(result[&key], bits(&[1, 2]), "F({})", key);
        }
    }

    #[test]
    fn acyclic_chain_propagates_backward() {
        let mut relation = Map::default();
        relation.insert(1, vec![2]);
        relation.insert(2, vec![3]);
        let mut base = Map::default();
        base.insert(1, bits(&[10]));
        base.insert(2, bits(&[20]));
        base.insert(3, bits(&[30]));

        let result = digraph([3, 2, 1], &relation, &base);
        assert_eq!(result[&1], bits(&[10, 20, 30]));
        assert_eq!(result[&2], bits(&[20, 30]));
        assert_eq!(result[&3], bits(&[30]));
    }

    #[test]
    fn targets_outside_the_domain_are_solved() {
        let mut relation = Map::default();
        relation.insert("x", vec!["y", "x"]);
        let mut base: Map<&str, crate::types::Set<u32>> = Map::default();
        base.insert("x", [1].into_iter().collect());
        base.insert("y", [2].into_iter().collect());

        let result = digraph(["x"], &relation, &base);
        assert_eq!(result.len(), 2);
        assert!(result[&"x"].contains(&1) && result[&"x"].contains(&2));
        assert_eq!(result[&"y"].len(), 1);
    }
}
