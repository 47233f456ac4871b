//! Ordered column backed by a persisted AVL tree.
//!
//! Every row's slot is also the row's tree node, so the tree and the row-id
//! space are the same space. Parent and child links are slot ids with `0`
//! meaning "none"; nodes are loaded into an id-keyed cache on demand and
//! never referenced across calls by anything but their id.
//!
//! # Header
//!
//! ```text
//! | latest id (8) | capacity (4) | root id (8) |
//! ```
//!
//! # Invariants
//!
//! - For every node, `left_depth` and `right_depth` equal the heights of its
//!   subtrees, and they differ by at most one.
//! - An in-order walk yields values in non-decreasing order. Equal values
//!   are inserted to the right, so ties keep insertion order.

#![allow(clippy::cast_possible_truncation)]

use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;

use crate::storage::RowId;
use crate::storage::block::{AVL_BLOCK_HEADER_SIZE, AvlBlock, BlockError};
use crate::storage::gather::{BASE_HEADER_SIZE, Gather, GatherCore, GatherError};
use crate::storage::io::Storage;
use crate::storage::record::AvlRecord;
use crate::storage::stream_unit::Field;
use crate::storage::value::StoredValue;

/// Offset of the root id header field.
const ROOT_OFFSET: u64 = BASE_HEADER_SIZE;

/// Header size of a tree gather.
pub const AVL_HEADER_SIZE: u64 = ROOT_OFFSET + 8;

/// Comparison operators supported by range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
}

impl Comparison {
    /// Operator token as written in conditions.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Eq => "==",
        }
    }

    /// Parse an operator token.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            "==" => Some(Self::Eq),
            _ => None,
        }
    }

    /// Whether a stored value comparing as `ordering` against the operand
    /// satisfies the operator.
    #[must_use]
    pub const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::Gte => !matches!(ordering, Ordering::Less),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::Lte => !matches!(ordering, Ordering::Greater),
            Self::Eq => matches!(ordering, Ordering::Equal),
        }
    }
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Copy of a node's link fields.
#[derive(Debug, Clone, Copy)]
struct Links {
    parent: RowId,
    left: RowId,
    right: RowId,
    left_depth: u8,
    right_depth: u8,
}

/// A column whose rows form a balanced binary search tree.
#[derive(Debug)]
pub struct AvlGather<T> {
    core: GatherCore,
    root: Field<u64>,
    nodes: HashMap<RowId, AvlRecord<T>>,
}

impl<T: StoredValue> AvlGather<T> {
    /// Block capacity for values of `T`. Variable-length types need an
    /// explicit `size`, the longest encoding accepted.
    #[must_use]
    pub const fn capacity_for(size: usize) -> u32 {
        let width = match T::FIXED_WIDTH {
            Some(width) => width,
            None => size,
        };
        (width + AVL_BLOCK_HEADER_SIZE) as u32
    }

    pub fn open(path: &Path, capacity: u32) -> Result<Self, GatherError> {
        Self::with_core(GatherCore::open_file(path, AVL_HEADER_SIZE, AVL_BLOCK_HEADER_SIZE, capacity)?)
    }

    pub fn with_storage(storage: Box<dyn Storage>, label: &str, capacity: u32) -> Result<Self, GatherError> {
        Self::with_core(GatherCore::open(
            storage,
            label.to_string(),
            AVL_HEADER_SIZE,
            AVL_BLOCK_HEADER_SIZE,
            capacity,
        )?)
    }

    fn with_core(mut core: GatherCore) -> Result<Self, GatherError> {
        let root = if core.created() {
            Field::create(ROOT_OFFSET, 0)
        } else {
            Field::load(core.storage_mut(), ROOT_OFFSET)?
        };
        Ok(Self {
            core,
            root,
            nodes: HashMap::new(),
        })
    }

    #[must_use]
    pub const fn core(&self) -> &GatherCore {
        &self.core
    }

    /// Id of the root node, `0` for an empty tree.
    #[must_use]
    pub const fn root(&self) -> RowId {
        self.root.get()
    }

    /// Rows with a value greater than `value`, in value order.
    pub fn gt(&mut self, value: &T) -> Result<Vec<(RowId, T)>, GatherError> {
        self.range(Comparison::Gt, value)
    }

    pub fn gte(&mut self, value: &T) -> Result<Vec<(RowId, T)>, GatherError> {
        self.range(Comparison::Gte, value)
    }

    pub fn lt(&mut self, value: &T) -> Result<Vec<(RowId, T)>, GatherError> {
        self.range(Comparison::Lt, value)
    }

    pub fn lte(&mut self, value: &T) -> Result<Vec<(RowId, T)>, GatherError> {
        self.range(Comparison::Lte, value)
    }

    pub fn eq(&mut self, value: &T) -> Result<Vec<(RowId, T)>, GatherError> {
        self.range(Comparison::Eq, value)
    }

    /// Rows whose value satisfies `comparison` against `value`, in value order.
    pub fn range(&mut self, comparison: Comparison, value: &T) -> Result<Vec<(RowId, T)>, GatherError> {
        self.core.ensure_open()?;
        let mut out = Vec::new();
        self.search(self.root(), comparison, value, &mut out)?;
        Ok(out)
    }

    /// Every row in value order.
    pub fn all(&mut self) -> Result<Vec<(RowId, T)>, GatherError> {
        self.core.ensure_open()?;
        let mut out = Vec::new();
        self.walk(self.root(), &mut out)?;
        Ok(out)
    }

    // ========== Node access ==========

    fn node(&mut self, id: RowId) -> Result<&mut AvlRecord<T>, GatherError> {
        if id == 0 {
            return Err(GatherError::Corrupt(format!(
                "{} followed a null tree link",
                self.core.label()
            )));
        }
        let layout = self.core.layout();
        match self.nodes.entry(id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(AvlRecord::load(self.core.storage_mut(), layout, id)?)),
        }
    }

    fn block(&mut self, id: RowId) -> Result<&mut AvlBlock, GatherError> {
        Ok(self.node(id)?.node_mut())
    }

    fn links(&mut self, id: RowId) -> Result<Links, GatherError> {
        let block = self.node(id)?.node();
        Ok(Links {
            parent: block.parent(),
            left: block.left(),
            right: block.right(),
            left_depth: block.left_depth(),
            right_depth: block.right_depth(),
        })
    }

    fn depth_of(&mut self, id: RowId) -> Result<u8, GatherError> {
        if id == 0 {
            return Ok(0);
        }
        Ok(self.node(id)?.node().depth())
    }

    /// Recompute the cached subtree depths of `id` from its children.
    fn refresh(&mut self, id: RowId) -> Result<(), GatherError> {
        let links = self.links(id)?;
        let left = self.depth_of(links.left)?;
        let right = self.depth_of(links.right)?;
        self.block(id)?.set_depths(left, right);
        Ok(())
    }

    fn balance(&mut self, id: RowId) -> Result<i16, GatherError> {
        let links = self.links(id)?;
        Ok(i16::from(links.left_depth) - i16::from(links.right_depth))
    }

    /// Point `parent`'s link (or the root) that referenced `old` at `new`.
    fn replace_child(&mut self, parent: RowId, old: RowId, new: RowId) -> Result<(), GatherError> {
        if parent == 0 {
            self.root.set(new);
            return Ok(());
        }
        let block = self.block(parent)?;
        if block.left() == old {
            block.set_left(new);
        } else {
            block.set_right(new);
        }
        Ok(())
    }

    // ========== Structure ==========

    /// Hang the detached node `id` under the tree and rebalance.
    fn attach(&mut self, id: RowId) -> Result<(), GatherError> {
        let root = self.root();
        if root == 0 {
            self.root.set(id);
            return Ok(());
        }

        let value = self.node(id)?.value().clone();
        let limit = self.core.latest();
        let mut current = root;
        let mut steps = 0u64;
        loop {
            steps += 1;
            if steps > limit {
                return Err(GatherError::Corrupt(format!(
                    "{} has a cycle below node {root}",
                    self.core.label()
                )));
            }

            let record = self.node(current)?;
            let go_left = record.value().compare(&value) == Ordering::Greater;
            let child = if go_left {
                record.node().left()
            } else {
                record.node().right()
            };

            if child == 0 {
                let block = record.node_mut();
                if go_left {
                    block.set_left(id);
                } else {
                    block.set_right(id);
                }
                self.block(id)?.set_parent(current);
                break;
            }
            current = child;
        }

        self.retrace(current)
    }

    /// Walk from `start` to the root, refreshing depths and rotating any
    /// node whose subtrees differ in depth by more than one.
    fn retrace(&mut self, start: RowId) -> Result<(), GatherError> {
        let mut current = start;
        while current != 0 {
            self.refresh(current)?;
            let balance = self.balance(current)?;

            let subtree_root = if balance > 1 {
                let left = self.links(current)?.left;
                if self.balance(left)? < 0 {
                    self.rotate_left(left)?;
                }
                self.rotate_right(current)?
            } else if balance < -1 {
                let right = self.links(current)?.right;
                if self.balance(right)? > 0 {
                    self.rotate_right(right)?;
                }
                self.rotate_left(current)?
            } else {
                current
            };

            current = self.links(subtree_root)?.parent;
        }
        Ok(())
    }

    /// Rotate the subtree at `z` to the right; returns its new root.
    fn rotate_right(&mut self, z: RowId) -> Result<RowId, GatherError> {
        let z_links = self.links(z)?;
        let y = z_links.left;
        let t = self.links(y)?.right;

        self.block(z)?.set_left(t);
        if t != 0 {
            self.block(t)?.set_parent(z);
        }
        let y_block = self.block(y)?;
        y_block.set_right(z);
        y_block.set_parent(z_links.parent);
        self.block(z)?.set_parent(y);
        self.replace_child(z_links.parent, z, y)?;

        self.refresh(z)?;
        self.refresh(y)?;
        Ok(y)
    }

    /// Rotate the subtree at `z` to the left; returns its new root.
    fn rotate_left(&mut self, z: RowId) -> Result<RowId, GatherError> {
        let z_links = self.links(z)?;
        let y = z_links.right;
        let t = self.links(y)?.left;

        self.block(z)?.set_right(t);
        if t != 0 {
            self.block(t)?.set_parent(z);
        }
        let y_block = self.block(y)?;
        y_block.set_left(z);
        y_block.set_parent(z_links.parent);
        self.block(z)?.set_parent(y);
        self.replace_child(z_links.parent, z, y)?;

        self.refresh(z)?;
        self.refresh(y)?;
        Ok(y)
    }

    fn min_of(&mut self, id: RowId) -> Result<RowId, GatherError> {
        let mut current = id;
        loop {
            let left = self.links(current)?.left;
            if left == 0 {
                return Ok(current);
            }
            current = left;
        }
    }

    /// Remove a node with at most one child, promoting that child.
    fn unlink(&mut self, id: RowId) -> Result<(), GatherError> {
        let links = self.links(id)?;
        let child = if links.left == 0 { links.right } else { links.left };
        if child != 0 {
            self.block(child)?.set_parent(links.parent);
        }
        self.replace_child(links.parent, id, child)?;
        self.retrace(links.parent)
    }

    /// Take `id` out of the tree, leaving its slot allocated and its links cleared.
    fn detach(&mut self, id: RowId) -> Result<(), GatherError> {
        let links = self.links(id)?;
        if links.left != 0 && links.right != 0 {
            let successor = self.min_of(links.right)?;
            self.unlink(successor)?;

            // Rebalancing above may have rotated around `id`.
            let links = self.links(id)?;
            let block = self.block(successor)?;
            block.set_parent(links.parent);
            block.set_left(links.left);
            block.set_right(links.right);
            block.set_depths(links.left_depth, links.right_depth);
            if links.left != 0 {
                self.block(links.left)?.set_parent(successor);
            }
            if links.right != 0 {
                self.block(links.right)?.set_parent(successor);
            }
            self.replace_child(links.parent, id, successor)?;
        } else {
            self.unlink(id)?;
        }

        let block = self.block(id)?;
        block.set_parent(0);
        block.set_left(0);
        block.set_right(0);
        block.set_depths(0, 0);
        Ok(())
    }

    fn check_fits(&self, value: &T) -> Result<(), GatherError> {
        let len = value.encode().len();
        let capacity = AvlBlock::payload_capacity(self.core.layout());
        if len > capacity {
            return Err(BlockError::ValueTooLarge { len, capacity }.into());
        }
        Ok(())
    }

    // ========== Traversal ==========

    fn walk(&mut self, id: RowId, out: &mut Vec<(RowId, T)>) -> Result<(), GatherError> {
        if id == 0 {
            return Ok(());
        }
        let links = self.links(id)?;
        self.walk(links.left, out)?;
        self.emit(id, out)?;
        self.walk(links.right, out)
    }

    fn emit(&mut self, id: RowId, out: &mut Vec<(RowId, T)>) -> Result<(), GatherError> {
        let value = self.node(id)?.value().clone();
        out.push((id, value));
        Ok(())
    }

    /// In-order traversal pruned by the comparison. Subtrees that cannot
    /// hold a match are skipped; subtrees that can only hold matches are
    /// walked without comparing.
    fn search(
        &mut self,
        id: RowId,
        comparison: Comparison,
        operand: &T,
        out: &mut Vec<(RowId, T)>,
    ) -> Result<(), GatherError> {
        if id == 0 {
            return Ok(());
        }
        let links = self.links(id)?;
        let ordering = self.node(id)?.value().compare(operand);

        match comparison {
            Comparison::Gt | Comparison::Gte => {
                if comparison.accepts(ordering) {
                    self.search(links.left, comparison, operand, out)?;
                    self.emit(id, out)?;
                    self.walk(links.right, out)
                } else {
                    self.search(links.right, comparison, operand, out)
                }
            }
            Comparison::Lt | Comparison::Lte => {
                if comparison.accepts(ordering) {
                    self.walk(links.left, out)?;
                    self.emit(id, out)?;
                    self.search(links.right, comparison, operand, out)
                } else {
                    self.search(links.left, comparison, operand, out)
                }
            }
            Comparison::Eq => match ordering {
                Ordering::Greater => self.search(links.left, comparison, operand, out),
                Ordering::Less => self.search(links.right, comparison, operand, out),
                Ordering::Equal => {
                    self.search(links.left, comparison, operand, out)?;
                    self.emit(id, out)?;
                    self.search(links.right, comparison, operand, out)
                }
            },
        }
    }
}

impl<T: StoredValue> Gather for AvlGather<T> {
    type Value = T;

    fn add(&mut self, value: &T, id: Option<RowId>) -> Result<RowId, GatherError> {
        self.core.ensure_open()?;
        self.check_fits(value)?;

        let id = self.core.claim(id)?;
        let record = AvlRecord::create(self.core.layout(), id, value.clone())?;
        self.nodes.insert(id, record);
        self.attach(id)?;
        Ok(id)
    }

    fn get(&mut self, id: RowId) -> Result<Option<T>, GatherError> {
        self.core.ensure_open()?;
        if !self.core.is_allocated(id) {
            return Ok(None);
        }
        Ok(Some(self.node(id)?.value().clone()))
    }

    /// Re-positions the node: it is detached, given the new value, and
    /// inserted again under the same id.
    fn update(&mut self, id: RowId, value: &T) -> Result<(), GatherError> {
        self.core.ensure_open()?;
        if !self.core.is_allocated(id) {
            self.add(value, Some(id))?;
            return Ok(());
        }
        self.check_fits(value)?;

        self.detach(id)?;
        self.node(id)?.set_value(value.clone())?;
        self.attach(id)
    }

    fn delete(&mut self, id: RowId) -> Result<bool, GatherError> {
        self.core.ensure_open()?;
        if !self.core.is_allocated(id) {
            return Ok(false);
        }
        self.detach(id)?;
        self.nodes.remove(&id);
        self.core.release(id)?;
        Ok(true)
    }

    fn contains(&self, id: RowId) -> bool {
        self.core.is_allocated(id)
    }

    fn flush(&mut self) -> Result<(), GatherError> {
        self.core.ensure_open()?;
        self.root.flush(self.core.storage_mut())?;
        for node in self.nodes.values_mut() {
            node.flush(self.core.storage_mut())?;
        }
        self.nodes.clear();
        self.core.flush()
    }

    fn dispose(&mut self) -> Result<(), GatherError> {
        if self.core.ensure_open().is_err() {
            return Ok(());
        }
        self.flush()?;
        self.core.dispose()
    }

    fn destroy(self) -> Result<(), GatherError> {
        self.core.destroy()
    }
}
