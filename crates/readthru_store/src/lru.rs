// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recency list for LRU eviction.
//!
//! Recency metadata lives in a slab of nodes linked by index, separate from the value map.
//! Each node keeps a clone of its key so the eviction victim can be removed from the map in
//! O(1) without scanning.

/// Index of a node within the slab.
pub(crate) type NodeIndex = usize;

/// Sentinel value indicating no node (null pointer equivalent).
const NULL_INDEX: NodeIndex = NodeIndex::MAX;

#[derive(Debug)]
struct Node<K> {
    key: Option<K>,
    prev: NodeIndex,
    next: NodeIndex,
}

impl<K> Node<K> {
    const fn vacant() -> Self {
        Self {
            key: None,
            prev: NULL_INDEX,
            next: NULL_INDEX,
        }
    }
}

/// Doubly-linked recency list. The head is the most recently used entry, the tail the least.
#[derive(Debug)]
pub(crate) struct LruList<K> {
    nodes: Vec<Node<K>>,
    head: NodeIndex,
    tail: NodeIndex,
    /// Free list threaded through `next` of vacant nodes.
    free_head: NodeIndex,
    len: usize,
    capacity: usize,
}

impl<K> LruList<K> {
    /// Creates an empty list holding at most `capacity` keys.
    ///
    /// Node slots are allocated on demand, so a large capacity costs nothing up front.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            nodes: Vec::new(),
            head: NULL_INDEX,
            tail: NULL_INDEX,
            free_head: NULL_INDEX,
            len: 0,
            capacity,
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Inserts `key` as the most recently used entry.
    ///
    /// Returns `None` if the list is full; callers evict first.
    pub(crate) fn push_front(&mut self, key: K) -> Option<NodeIndex> {
        if self.is_full() {
            return None;
        }

        let idx = self.alloc_node();
        self.nodes[idx].key = Some(key);
        self.link_front(idx);
        self.len += 1;
        Some(idx)
    }

    /// Marks the entry at `idx` as the most recently used.
    pub(crate) fn touch(&mut self, idx: NodeIndex) {
        if idx == self.head || self.nodes.get(idx).is_none_or(|node| node.key.is_none()) {
            return;
        }

        self.unlink(idx);
        self.link_front(idx);
    }

    /// Removes the entry at `idx`, returning its key.
    pub(crate) fn remove(&mut self, idx: NodeIndex) -> Option<K> {
        let key = self.nodes.get_mut(idx)?.key.take()?;
        self.unlink(idx);
        self.free_node(idx);
        self.len -= 1;
        Some(key)
    }

    /// Removes the least recently used entry, returning its key.
    pub(crate) fn pop_back(&mut self) -> Option<K> {
        if self.tail == NULL_INDEX {
            return None;
        }
        self.remove(self.tail)
    }

    /// Returns the keys from most to least recently used.
    #[cfg(test)]
    pub(crate) fn keys(&self) -> Vec<&K> {
        let mut keys = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while cursor != NULL_INDEX {
            let node = &self.nodes[cursor];
            if let Some(key) = node.key.as_ref() {
                keys.push(key);
            }
            cursor = node.next;
        }
        keys
    }

    fn alloc_node(&mut self) -> NodeIndex {
        if self.free_head == NULL_INDEX {
            self.nodes.push(Node::vacant());
            return self.nodes.len() - 1;
        }

        let idx = self.free_head;
        self.free_head = self.nodes[idx].next;
        self.nodes[idx].next = NULL_INDEX;
        idx
    }

    fn free_node(&mut self, idx: NodeIndex) {
        let node = &mut self.nodes[idx];
        node.key = None;
        node.prev = NULL_INDEX;
        node.next = self.free_head;
        self.free_head = idx;
    }

    fn link_front(&mut self, idx: NodeIndex) {
        self.nodes[idx].prev = NULL_INDEX;
        self.nodes[idx].next = self.head;

        if self.head == NULL_INDEX {
            self.tail = idx;
        } else {
            self.nodes[self.head].prev = idx;
        }
        self.head = idx;
    }

    fn unlink(&mut self, idx: NodeIndex) {
        let prev = self.nodes[idx].prev;
        let next = self.nodes[idx].next;

        if prev == NULL_INDEX {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }

        if next == NULL_INDEX {
            self.tail = prev;
        } else {
            self.nodes[next].prev = prev;
        }

        self.nodes[idx].prev = NULL_INDEX;
        self.nodes[idx].next = NULL_INDEX;
    }
}
