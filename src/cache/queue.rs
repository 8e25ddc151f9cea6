//! Handle-indexed priority list
//!
//! A doubly linked list threaded through a dense vector indexed by
//! [`AssetHandle`]. The front is the highest priority, the back the lowest.
//! Every operation is O(1) except growing the index, which is amortized.

use super::AssetHandle;

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    prev: Option<AssetHandle>,
    next: Option<AssetHandle>,
}

#[derive(Debug, Default)]
pub struct AssetPriorityQueue {
    links: Vec<Option<Link>>,
    head: Option<AssetHandle>,
    tail: Option<AssetHandle>,
    len: usize,
}

impl AssetPriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, handle: AssetHandle) -> bool {
        self.link(handle).is_some()
    }

    /// Insert at the lowest priority. Returns false if already present.
    pub fn insert_asset(&mut self, handle: AssetHandle) -> bool {
        if self.contains(handle) {
            return false;
        }
        self.ensure_slot(handle);
        self.links[handle.index()] = Some(Link {
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => self.link_mut(tail).next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        self.len += 1;
        true
    }

    /// Move to the front, inserting if absent
    pub fn make_asset_highest_priority(&mut self, handle: AssetHandle) {
        if self.head == Some(handle) {
            return;
        }
        if self.contains(handle) {
            self.unlink(handle);
        } else {
            self.ensure_slot(handle);
        }
        self.links[handle.index()] = Some(Link {
            prev: None,
            next: self.head,
        });
        match self.head {
            Some(head) => self.link_mut(head).prev = Some(handle),
            None => self.tail = Some(handle),
        }
        self.head = Some(handle);
        self.len += 1;
    }

    pub fn remove_lowest_priority_asset(&mut self) -> Option<AssetHandle> {
        let tail = self.tail?;
        self.unlink(tail);
        Some(tail)
    }

    pub fn remove_asset(&mut self, handle: AssetHandle) -> bool {
        if !self.contains(handle) {
            return false;
        }
        self.unlink(handle);
        true
    }

    pub fn highest_priority(&self) -> Option<AssetHandle> {
        self.head
    }

    pub fn lowest_priority(&self) -> Option<AssetHandle> {
        self.tail
    }

    /// Front to back
    pub fn iter(&self) -> impl Iterator<Item = AssetHandle> + '_ {
        std::iter::successors(self.head, move |h| self.link(*h).and_then(|l| l.next))
    }

    /// Back to front
    pub fn iter_lowest_first(&self) -> impl Iterator<Item = AssetHandle> + '_ {
        std::iter::successors(self.tail, move |h| self.link(*h).and_then(|l| l.prev))
    }

    pub fn clear(&mut self) {
        self.links.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    fn link(&self, handle: AssetHandle) -> Option<&Link> {
        self.links.get(handle.index()).and_then(Option::as_ref)
    }

    fn link_mut(&mut self, handle: AssetHandle) -> &mut Link {
        // Callers only pass handles that are linked.
        self.links[handle.index()].get_or_insert_with(Link::default)
    }

    fn ensure_slot(&mut self, handle: AssetHandle) {
        if self.links.len() <= handle.index() {
            self.links.resize(handle.index() + 1, None);
        }
    }

    fn unlink(&mut self, handle: AssetHandle) {
        let Some(link) = self.links[handle.index()].take() else {
            return;
        };
        match link.prev {
            Some(prev) => self.link_mut(prev).next = link.next,
            None => self.head = link.next,
        }
        match link.next {
            Some(next) => self.link_mut(next).prev = link.prev,
            None => self.tail = link.prev,
        }
        self.len -= 1;
    }
}
