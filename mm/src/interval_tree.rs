//! Interval tree over guest-physical ranges.
//!
//! An augmented red-black tree keyed by range start. Each node stores a
//! half-open interval `[start, end)`, an owned value, and `max_high`, the
//! largest `end` anywhere in the node's subtree. `max_high` lets a point
//! lookup skip every subtree that cannot contain the address.
//!
//! Key operations:
//! - Insert: O(log n), rejects a second range with the same start
//! - Remove: O(log n), by any address inside the range
//! - Find containing: O(log n), lowest start wins if ranges overlap
//!
//! The tree does not check for partial overlaps between ranges with
//! different starts; callers own that invariant.

use alloc::alloc::{alloc, dealloc};
use alloc::vec::Vec;
use core::alloc::Layout;
use core::cmp;
use core::marker::PhantomData;
use core::ptr;

use crate::error::{MmioError, MmioResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Color {
    Red = 0,
    Black = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl Side {
    #[inline]
    fn flip(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

struct Node<T> {
    start: u64,
    end: u64,
    max_high: u64,
    color: Color,
    parent: *mut Node<T>,
    left: *mut Node<T>,
    right: *mut Node<T>,
    value: T,
}

impl<T> Node<T> {
    #[inline]
    fn contains(&self, addr: u64) -> bool {
        self.start <= addr && addr < self.end
    }
}

#[inline]
unsafe fn child<T>(node: *mut Node<T>, side: Side) -> *mut Node<T> {
    match side {
        Side::Left => (*node).left,
        Side::Right => (*node).right,
    }
}

#[inline]
unsafe fn set_child<T>(node: *mut Node<T>, side: Side, new: *mut Node<T>) {
    match side {
        Side::Left => (*node).left = new,
        Side::Right => (*node).right = new,
    }
}

/// Which side of `parent` the (possibly null) `node` hangs off.
#[inline]
unsafe fn side_of<T>(parent: *mut Node<T>, node: *mut Node<T>) -> Side {
    if (*parent).left == node {
        Side::Left
    } else {
        Side::Right
    }
}

/// Null leaves count as black.
#[inline]
unsafe fn is_red<T>(node: *mut Node<T>) -> bool {
    !node.is_null() && (*node).color == Color::Red
}

#[inline]
unsafe fn max_high<T>(node: *mut Node<T>) -> u64 {
    if node.is_null() { 0 } else { (*node).max_high }
}

/// Recompute `max_high` from the node's own end and its two children.
#[inline]
unsafe fn refresh<T>(node: *mut Node<T>) {
    (*node).max_high = cmp::max(
        (*node).end,
        cmp::max(max_high((*node).left), max_high((*node).right)),
    );
}

unsafe fn leftmost<T>(mut node: *mut Node<T>) -> *mut Node<T> {
    while !(*node).left.is_null() {
        node = (*node).left;
    }
    node
}

unsafe fn successor<T>(node: *mut Node<T>) -> *mut Node<T> {
    if !(*node).right.is_null() {
        return leftmost((*node).right);
    }
    let mut current = node;
    let mut parent = (*current).parent;
    while !parent.is_null() && current == (*parent).right {
        current = parent;
        parent = (*current).parent;
    }
    parent
}

pub struct IntervalTree<T> {
    root: *mut Node<T>,
    count: usize,
    _owns: PhantomData<T>,
}

// SAFETY: the tree exclusively owns its nodes; sharing it is sharing `T`.
unsafe impl<T: Send> Send for IntervalTree<T> {}
unsafe impl<T: Sync> Sync for IntervalTree<T> {}

impl<T> Default for IntervalTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IntervalTree<T> {
    pub const fn new() -> Self {
        Self {
            root: ptr::null_mut(),
            count: 0,
            _owns: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_null()
    }

    /// Insert `[start, end)` carrying `value`.
    ///
    /// Fails without touching the tree if the range is empty, if another
    /// range already starts at `start`, or if the node cannot be allocated.
    pub fn insert(&mut self, start: u64, end: u64, value: T) -> MmioResult {
        if end <= start {
            return Err(MmioError::EmptyRange { start });
        }

        let mut parent: *mut Node<T> = ptr::null_mut();
        let mut side = Side::Left;
        let mut current = self.root;
        unsafe {
            while !current.is_null() {
                if start == (*current).start {
                    return Err(MmioError::DuplicateStart { start });
                }
                side = if start < (*current).start {
                    Side::Left
                } else {
                    Side::Right
                };
                parent = current;
                current = child(current, side);
            }
        }

        let layout = Layout::new::<Node<T>>();
        // SAFETY: `Node<T>` always has non-zero size (it holds two u64 keys).
        let node = unsafe { alloc(layout) } as *mut Node<T>;
        if node.is_null() {
            return Err(MmioError::NoMemory);
        }

        unsafe {
            node.write(Node {
                start,
                end,
                max_high: end,
                color: Color::Red,
                parent,
                left: ptr::null_mut(),
                right: ptr::null_mut(),
                value,
            });

            if parent.is_null() {
                self.root = node;
            } else {
                set_child(parent, side, node);
            }
            self.refresh_to_root(parent);
            self.insert_fixup(node);
        }
        self.count += 1;
        Ok(())
    }

    /// Value of the range containing `addr`.
    pub fn find(&self, addr: u64) -> Option<&T> {
        let node = self.find_node(addr);
        if node.is_null() {
            None
        } else {
            // SAFETY: live node owned by `self`; the borrow ties it to `&self`.
            Some(unsafe { &(*node).value })
        }
    }

    /// `[start, end)` of the range containing `addr`.
    pub fn find_range(&self, addr: u64) -> Option<(u64, u64)> {
        let node = self.find_node(addr);
        if node.is_null() {
            None
        } else {
            Some(unsafe { ((*node).start, (*node).end) })
        }
    }

    /// Remove the range containing `addr` and hand back its value.
    pub fn remove(&mut self, addr: u64) -> Option<T> {
        let node = self.find_node(addr);
        if node.is_null() {
            return None;
        }
        unsafe {
            self.unlink(node);
            self.count -= 1;
            let Node { value, .. } = ptr::read(node);
            dealloc(node as *mut u8, Layout::new::<Node<T>>());
            Some(value)
        }
    }

    /// In-order `(start, end)` list of every range.
    pub fn ranges(&self) -> Vec<(u64, u64)> {
        let mut out = Vec::with_capacity(self.count);
        if self.root.is_null() {
            return out;
        }
        unsafe {
            let mut current = leftmost(self.root);
            while !current.is_null() {
                out.push(((*current).start, (*current).end));
                current = successor(current);
            }
        }
        out
    }

    pub fn clear(&mut self) {
        unsafe {
            Self::free_subtree(self.root);
        }
        self.root = ptr::null_mut();
        self.count = 0;
    }

    /// Leftmost containing-range search.
    ///
    /// If the left subtree reaches past `addr`, some range there starts below
    /// the current node and ends above `addr`, so the answer is on the left.
    /// Otherwise the current node is next in start order, and only if `addr`
    /// lies beyond its start can anything on the right still match.
    fn find_node(&self, addr: u64) -> *mut Node<T> {
        let mut current = self.root;
        unsafe {
            while !current.is_null() {
                let left = (*current).left;
                if !left.is_null() && (*left).max_high > addr {
                    current = left;
                } else if (*current).contains(addr) {
                    return current;
                } else if addr > (*current).start {
                    current = (*current).right;
                } else {
                    break;
                }
            }
        }
        ptr::null_mut()
    }

    unsafe fn free_subtree(node: *mut Node<T>) {
        if node.is_null() {
            return;
        }
        Self::free_subtree((*node).left);
        Self::free_subtree((*node).right);
        ptr::drop_in_place(node);
        dealloc(node as *mut u8, Layout::new::<Node<T>>());
    }

    unsafe fn refresh_to_root(&self, mut node: *mut Node<T>) {
        while !node.is_null() {
            refresh(node);
            node = (*node).parent;
        }
    }

    /// Put `new` where `old` hangs from `old`'s parent.
    unsafe fn transplant(&mut self, old: *mut Node<T>, new: *mut Node<T>) {
        let parent = (*old).parent;
        if parent.is_null() {
            self.root = new;
        } else {
            set_child(parent, side_of(parent, old), new);
        }
        if !new.is_null() {
            (*new).parent = parent;
        }
    }

    /// Rotate `x` down towards `dir`; its opposite child takes its place.
    /// `rotate(x, Side::Left)` is the classic left rotation.
    unsafe fn rotate(&mut self, x: *mut Node<T>, dir: Side) {
        let y = child(x, dir.flip());
        if y.is_null() {
            return;
        }

        let inner = child(y, dir);
        set_child(x, dir.flip(), inner);
        if !inner.is_null() {
            (*inner).parent = x;
        }

        self.transplant(x, y);
        set_child(y, dir, x);
        (*x).parent = y;

        refresh(x);
        refresh(y);
    }

    unsafe fn insert_fixup(&mut self, mut node: *mut Node<T>) {
        while is_red((*node).parent) {
            let parent = (*node).parent;
            let grandparent = (*parent).parent;
            if grandparent.is_null() {
                break;
            }

            let side = side_of(grandparent, parent);
            let uncle = child(grandparent, side.flip());

            if is_red(uncle) {
                (*parent).color = Color::Black;
                (*uncle).color = Color::Black;
                (*grandparent).color = Color::Red;
                node = grandparent;
                continue;
            }

            if node == child(parent, side.flip()) {
                node = parent;
                self.rotate(node, side);
            }
            let parent = (*node).parent;
            let grandparent = (*parent).parent;
            (*parent).color = Color::Black;
            (*grandparent).color = Color::Red;
            self.rotate(grandparent, side.flip());
        }

        (*self.root).color = Color::Black;
    }

    unsafe fn unlink(&mut self, z: *mut Node<T>) {
        let mut removed_color = (*z).color;
        let x: *mut Node<T>;
        let x_parent: *mut Node<T>;

        if (*z).left.is_null() {
            x = (*z).right;
            x_parent = (*z).parent;
            self.transplant(z, x);
        } else if (*z).right.is_null() {
            x = (*z).left;
            x_parent = (*z).parent;
            self.transplant(z, x);
        } else {
            let y = leftmost((*z).right);
            removed_color = (*y).color;
            x = (*y).right;

            if (*y).parent == z {
                x_parent = y;
            } else {
                x_parent = (*y).parent;
                self.transplant(y, x);
                (*y).right = (*z).right;
                (*(*y).right).parent = y;
            }

            self.transplant(z, y);
            (*y).left = (*z).left;
            (*(*y).left).parent = y;
            (*y).color = (*z).color;
        }

        self.refresh_to_root(x_parent);

        if removed_color == Color::Black {
            self.delete_fixup(x, x_parent);
        }
    }

    unsafe fn delete_fixup(&mut self, mut x: *mut Node<T>, mut x_parent: *mut Node<T>) {
        while x != self.root && !is_red(x) {
            if x_parent.is_null() {
                break;
            }

            let side = side_of(x_parent, x);
            let mut w = child(x_parent, side.flip());

            if is_red(w) {
                (*w).color = Color::Black;
                (*x_parent).color = Color::Red;
                self.rotate(x_parent, side);
                w = child(x_parent, side.flip());
            }

            if w.is_null() {
                x = x_parent;
                x_parent = (*x).parent;
                continue;
            }

            if !is_red((*w).left) && !is_red((*w).right) {
                (*w).color = Color::Red;
                x = x_parent;
                x_parent = (*x).parent;
                continue;
            }

            if !is_red(child(w, side.flip())) {
                let near = child(w, side);
                (*near).color = Color::Black;
                (*w).color = Color::Red;
                self.rotate(w, side.flip());
                w = child(x_parent, side.flip());
            }

            (*w).color = (*x_parent).color;
            (*x_parent).color = Color::Black;
            let far = child(w, side.flip());
            if !far.is_null() {
                (*far).color = Color::Black;
            }
            self.rotate(x_parent, side);
            x = self.root;
            break;
        }

        if !x.is_null() {
            (*x).color = Color::Black;
        }
    }
}

impl<T> Drop for IntervalTree<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
impl<T> IntervalTree<T> {
    /// Walk the whole tree and panic on any broken invariant: BST order on
    /// `start`, parent back-links, no red node with a red child, equal black
    /// height on every path, and `max_high` equal to the subtree maximum.
    pub(crate) fn check_invariants(&self) {
        unsafe {
            if !self.root.is_null() {
                assert!((*self.root).parent.is_null(), "root has a parent");
                assert_eq!((*self.root).color, Color::Black, "root is red");
            }
            let (nodes, _, _) = Self::check_subtree(self.root, None, None);
            assert_eq!(nodes, self.count, "node count mismatch");
        }
    }

    /// Returns (node count, black height, subtree max end).
    unsafe fn check_subtree(
        node: *mut Node<T>,
        lower: Option<u64>,
        upper: Option<u64>,
    ) -> (usize, usize, u64) {
        if node.is_null() {
            return (0, 1, 0);
        }
        let start = (*node).start;
        if let Some(lo) = lower {
            assert!(start > lo, "order violated at {:#x}", start);
        }
        if let Some(hi) = upper {
            assert!(start < hi, "order violated at {:#x}", start);
        }
        for side in [Side::Left, Side::Right] {
            let c = child(node, side);
            if !c.is_null() {
                assert_eq!((*c).parent, node, "bad parent link under {:#x}", start);
                if (*node).color == Color::Red {
                    assert_eq!((*c).color, Color::Black, "red-red at {:#x}", start);
                }
            }
        }

        let (ln, lb, lmax) = Self::check_subtree((*node).left, lower, Some(start));
        let (rn, rb, rmax) = Self::check_subtree((*node).right, Some(start), upper);
        assert_eq!(lb, rb, "black height differs under {:#x}", start);

        let expect = cmp::max((*node).end, cmp::max(lmax, rmax));
        assert_eq!((*node).max_high, expect, "stale max_high at {:#x}", start);

        let black = if (*node).color == Color::Black { 1 } else { 0 };
        (ln + rn + 1, lb + black, expect)
    }
}
