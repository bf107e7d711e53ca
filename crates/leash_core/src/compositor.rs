//! In-process compositor
//!
//! [`SurfaceTree`] owns every surface node and applies transaction batches.
//! [`Compositor`] is a cheap, cloneable handle to a shared tree, used by owner
//! entities, thumbnails, and the animation engine's dispatch step.
//!
//! Batches apply under a single lock, so no observer ever sees half of a
//! batch. An op that targets a released surface is skipped with a warning and
//! the rest of the batch still lands.

use crate::config::LeashConfig;
use crate::error::{Result, SurfaceError};
use crate::surface::{AttachedBuffer, PixelBuffer, SurfaceBuilder, SurfaceId, SurfaceKind, SurfaceNode};
use crate::transaction::{SurfaceOp, Transaction};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use std::collections::VecDeque;
use std::sync::Arc;

/// Number of recent releases remembered for [`SurfaceTree::release_count`]
pub const RELEASE_HISTORY: usize = 1024;

/// Counters describing what the tree has done so far
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompositorStats {
    pub surface_count: usize,
    pub created: u64,
    pub released: u64,
    pub batches_applied: u64,
    pub ops_applied: u64,
    pub ops_skipped: u64,
}

/// The surface hierarchy
#[derive(Debug, Default)]
pub struct SurfaceTree {
    surfaces: SlotMap<SurfaceId, SurfaceNode>,
    /// How many times each recently released surface id has been released
    releases: FxHashMap<SurfaceId, u32>,
    /// Release order, oldest first; bounds `releases` to `RELEASE_HISTORY`
    release_order: VecDeque<SurfaceId>,
    limit: Option<usize>,
    stats: CompositorStats,
}

impl SurfaceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tree that refuses allocations past `limit` live surfaces
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Allocate a surface from a builder
    ///
    /// The surface is attached to the builder's parent immediately. Builders
    /// default to hidden, so nothing renders until a batch shows it.
    pub fn create(&mut self, builder: SurfaceBuilder) -> Result<SurfaceId> {
        if let Some(limit) = self.limit {
            if self.surfaces.len() >= limit {
                tracing::warn!("surface allocation refused for '{}'", builder.name());
                return Err(SurfaceError::Exhausted { limit });
            }
        }
        let parent = builder.parent();
        if let Some(parent) = parent {
            if !self.surfaces.contains_key(parent) {
                return Err(SurfaceError::InvalidParent(parent));
            }
        }

        let id = self.surfaces.insert(SurfaceNode::from_builder(builder));
        if let Some(parent) = parent {
            if let Some(node) = self.surfaces.get_mut(parent) {
                node.children.push(id);
            }
        }
        self.stats.created += 1;
        tracing::trace!("created surface {:?} under {:?}", id, parent);
        Ok(id)
    }

    /// Latch a pixel buffer onto a buffer surface
    ///
    /// The buffer is consumed; a surface receives content once per upload.
    pub fn attach_buffer(&mut self, id: SurfaceId, buffer: PixelBuffer) -> Result<()> {
        let node = self
            .surfaces
            .get_mut(id)
            .ok_or(SurfaceError::Released(id))?;
        match node.kind {
            SurfaceKind::Buffer { size, format } => {
                if size != buffer.size() {
                    let expected = format.buffer_len(size.width, size.height).ok_or(
                        SurfaceError::TooLarge {
                            width: size.width,
                            height: size.height,
                        },
                    )?;
                    return Err(SurfaceError::BufferSize {
                        expected,
                        actual: buffer.byte_len(),
                    });
                }
                node.buffer = Some(AttachedBuffer {
                    size: buffer.size(),
                    format: buffer.format(),
                    byte_len: buffer.byte_len(),
                });
                Ok(())
            }
            _ => Err(SurfaceError::NotABufferSurface(id)),
        }
    }

    /// Apply every op in the batch, in order
    pub fn apply(&mut self, transaction: Transaction) {
        if transaction.is_empty() {
            return;
        }
        self.stats.batches_applied += 1;
        for op in transaction {
            if self.apply_op(op) {
                self.stats.ops_applied += 1;
            } else {
                self.stats.ops_skipped += 1;
                tracing::warn!("skipping {:?}: surface no longer valid", op);
            }
        }
    }

    fn apply_op(&mut self, op: SurfaceOp) -> bool {
        match op {
            SurfaceOp::Show(id) => self.update(id, |n| n.visible = true),
            SurfaceOp::Hide(id) => self.update(id, |n| n.visible = false),
            SurfaceOp::SetLayer(id, layer) => self.update(id, |n| {
                n.layer = layer;
                n.relative_to = None;
            }),
            SurfaceOp::SetRelativeLayer(id, relative, layer) => {
                if !self.surfaces.contains_key(relative) {
                    return false;
                }
                self.update(id, |n| {
                    n.layer = layer;
                    n.relative_to = Some(relative);
                })
            }
            SurfaceOp::Reparent(id, parent) => self.reparent(id, parent),
            SurfaceOp::SetPosition(id, position) => self.update(id, |n| n.position = position),
            SurfaceOp::SetMatrix(id, matrix) => self.update(id, |n| n.matrix = matrix),
            SurfaceOp::SetAlpha(id, alpha) => self.update(id, |n| n.alpha = alpha.clamp(0.0, 1.0)),
            SurfaceOp::SetCrop(id, crop) => self.update(id, |n| n.crop = Some(crop)),
            SurfaceOp::Remove(id) => self.release(id),
        }
    }

    fn update(&mut self, id: SurfaceId, f: impl FnOnce(&mut SurfaceNode)) -> bool {
        match self.surfaces.get_mut(id) {
            Some(node) => {
                f(node);
                true
            }
            None => false,
        }
    }

    fn reparent(&mut self, id: SurfaceId, parent: Option<SurfaceId>) -> bool {
        if !self.surfaces.contains_key(id) {
            return false;
        }
        if let Some(parent) = parent {
            if !self.surfaces.contains_key(parent) || self.is_ancestor_or_self(id, parent) {
                return false;
            }
        }
        self.detach(id);
        if let Some(parent) = parent {
            if let Some(node) = self.surfaces.get_mut(parent) {
                node.children.push(id);
            }
        }
        if let Some(node) = self.surfaces.get_mut(id) {
            node.parent = parent;
        }
        true
    }

    fn release(&mut self, id: SurfaceId) -> bool {
        if !self.surfaces.contains_key(id) {
            return false;
        }
        self.detach(id);
        if let Some(node) = self.surfaces.remove(id) {
            // Children outlive their parent's handle and are left detached
            for child in node.children {
                if let Some(child) = self.surfaces.get_mut(child) {
                    child.parent = None;
                }
            }
        }
        self.record_release(id);
        self.stats.released += 1;
        tracing::trace!("released surface {:?}", id);
        true
    }

    fn record_release(&mut self, id: SurfaceId) {
        *self.releases.entry(id).or_insert(0) += 1;
        self.release_order.push_back(id);
        while self.release_order.len() > RELEASE_HISTORY {
            if let Some(oldest) = self.release_order.pop_front() {
                self.releases.remove(&oldest);
            }
        }
    }

    fn detach(&mut self, id: SurfaceId) {
        let old_parent = self.surfaces.get(id).and_then(|n| n.parent);
        if let Some(old_parent) = old_parent {
            if let Some(node) = self.surfaces.get_mut(old_parent) {
                node.children.retain(|c| *c != id);
            }
        }
    }

    /// Whether `ancestor` is `id` or sits above `id` in the tree
    fn is_ancestor_or_self(&self, ancestor: SurfaceId, mut id: SurfaceId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.surfaces.get(id).and_then(|n| n.parent) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    pub fn get(&self, id: SurfaceId) -> Option<&SurfaceNode> {
        self.surfaces.get(id)
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.surfaces.contains_key(id)
    }

    pub fn parent_of(&self, id: SurfaceId) -> Option<SurfaceId> {
        self.surfaces.get(id).and_then(|n| n.parent)
    }

    /// Children of `id`, bottom to top by layer
    pub fn children_of(&self, id: SurfaceId) -> Vec<SurfaceId> {
        let Some(node) = self.surfaces.get(id) else {
            return Vec::new();
        };
        let mut children: Vec<SurfaceId> = node.children.iter().copied().collect();
        children.sort_by_key(|c| self.surfaces.get(*c).map(|n| n.layer).unwrap_or(0));
        children
    }

    /// Top-most child of `id` by layer
    pub fn top_child(&self, id: SurfaceId) -> Option<SurfaceId> {
        self.children_of(id).last().copied()
    }

    /// Whether the surface and every ancestor are shown
    pub fn is_effectively_visible(&self, mut id: SurfaceId) -> bool {
        loop {
            match self.surfaces.get(id) {
                Some(node) if node.visible => match node.parent {
                    Some(parent) => id = parent,
                    None => return true,
                },
                _ => return false,
            }
        }
    }

    /// Number of times `id` has been released (0 or 1 for a healthy tree)
    ///
    /// Only the last [`RELEASE_HISTORY`] released ids are remembered; older
    /// ones report 0.
    pub fn release_count(&self, id: SurfaceId) -> u32 {
        self.releases.get(&id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn stats(&self) -> CompositorStats {
        CompositorStats {
            surface_count: self.surfaces.len(),
            ..self.stats
        }
    }
}

/// Shared handle to a [`SurfaceTree`]
#[derive(Clone, Debug, Default)]
pub struct Compositor {
    tree: Arc<Mutex<SurfaceTree>>,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compositor honoring the configured allocation ceiling
    pub fn from_config(config: &LeashConfig) -> Self {
        let tree = match config.max_surfaces {
            Some(limit) => SurfaceTree::with_limit(limit),
            None => SurfaceTree::new(),
        };
        Self {
            tree: Arc::new(Mutex::new(tree)),
        }
    }

    pub fn create_surface(&self, builder: SurfaceBuilder) -> Result<SurfaceId> {
        self.tree.lock().create(builder)
    }

    pub fn attach_buffer(&self, id: SurfaceId, buffer: PixelBuffer) -> Result<()> {
        self.tree.lock().attach_buffer(id, buffer)
    }

    /// Apply a batch atomically
    pub fn apply(&self, transaction: Transaction) {
        self.tree.lock().apply(transaction);
    }

    /// Run a read-only query against the tree
    pub fn with_tree<R>(&self, f: impl FnOnce(&SurfaceTree) -> R) -> R {
        f(&self.tree.lock())
    }

    /// Snapshot of a single node
    pub fn node(&self, id: SurfaceId) -> Option<SurfaceNode> {
        self.tree.lock().get(id).cloned()
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.tree.lock().contains(id)
    }

    pub fn parent_of(&self, id: SurfaceId) -> Option<SurfaceId> {
        self.tree.lock().parent_of(id)
    }

    pub fn release_count(&self, id: SurfaceId) -> u32 {
        self.tree.lock().release_count(id)
    }

    pub fn stats(&self) -> CompositorStats {
        self.tree.lock().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::surface::PixelFormat;

    fn root(tree: &mut SurfaceTree) -> SurfaceId {
        tree.create(SurfaceBuilder::new("root").hidden(false)).unwrap()
    }

    #[test]
    fn test_create_attaches_to_parent_hidden() {
        let mut tree = SurfaceTree::new();
        let root = root(&mut tree);
        let child = tree
            .create(SurfaceBuilder::new("child").with_parent(Some(root)))
            .unwrap();

        assert_eq!(tree.parent_of(child), Some(root));
        assert_eq!(tree.children_of(root), vec![child]);
        assert!(!tree.get(child).unwrap().visible);
    }

    #[test]
    fn test_limit_refuses_allocation() {
        let mut tree = SurfaceTree::with_limit(1);
        root(&mut tree);
        let result = tree.create(SurfaceBuilder::new("extra"));
        assert_eq!(result, Err(SurfaceError::Exhausted { limit: 1 }));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_invalid_parent_rejected() {
        let mut tree = SurfaceTree::new();
        let root = root(&mut tree);
        let mut t = Transaction::new();
        t.remove(root);
        tree.apply(t);

        let result = tree.create(SurfaceBuilder::new("orphan").with_parent(Some(root)));
        assert_eq!(result, Err(SurfaceError::InvalidParent(root)));
    }

    #[test]
    fn test_apply_batch_in_order() {
        let mut tree = SurfaceTree::new();
        let root = root(&mut tree);
        let a = tree
            .create(SurfaceBuilder::new("a").with_parent(Some(root)))
            .unwrap();
        let b = tree
            .create(SurfaceBuilder::new("b").with_parent(Some(root)))
            .unwrap();

        let mut t = Transaction::new();
        t.show(a).set_layer(a, i32::MAX).show(b).set_layer(b, 3).hide(b);
        tree.apply(t);

        assert_eq!(tree.top_child(root), Some(a));
        assert!(tree.is_effectively_visible(a));
        assert!(!tree.get(b).unwrap().visible);
        assert_eq!(tree.stats().ops_applied, 5);
    }

    #[test]
    fn test_reparent_moves_child_lists() {
        let mut tree = SurfaceTree::new();
        let root = root(&mut tree);
        let a = tree
            .create(SurfaceBuilder::new("a").with_parent(Some(root)))
            .unwrap();
        let leash = tree
            .create(SurfaceBuilder::new("leash").with_parent(Some(root)).effect_layer())
            .unwrap();

        let mut t = Transaction::new();
        t.reparent(a, Some(leash));
        tree.apply(t);

        assert_eq!(tree.parent_of(a), Some(leash));
        assert_eq!(tree.children_of(root), vec![leash]);
        assert_eq!(tree.children_of(leash), vec![a]);
    }

    #[test]
    fn test_reparent_rejects_cycles() {
        let mut tree = SurfaceTree::new();
        let root = root(&mut tree);
        let a = tree
            .create(SurfaceBuilder::new("a").with_parent(Some(root)))
            .unwrap();

        let mut t = Transaction::new();
        t.reparent(root, Some(a));
        tree.apply(t);

        assert_eq!(tree.parent_of(root), None);
        assert_eq!(tree.stats().ops_skipped, 1);
    }

    #[test]
    fn test_remove_twice_releases_once() {
        let mut tree = SurfaceTree::new();
        let root = root(&mut tree);
        let a = tree
            .create(SurfaceBuilder::new("a").with_parent(Some(root)))
            .unwrap();

        let mut t = Transaction::new();
        t.remove(a).remove(a).show(a);
        tree.apply(t);

        assert_eq!(tree.release_count(a), 1);
        assert!(!tree.contains(a));
        assert!(tree.children_of(root).is_empty());
        assert_eq!(tree.stats().ops_skipped, 2);
    }

    #[test]
    fn test_release_history_is_bounded() {
        let mut tree = SurfaceTree::new();
        let root = root(&mut tree);
        let first = tree
            .create(SurfaceBuilder::new("leash-0").with_parent(Some(root)))
            .unwrap();
        let mut t = Transaction::new();
        t.remove(first);
        tree.apply(t);
        assert_eq!(tree.release_count(first), 1);

        let mut last = first;
        for i in 1..=RELEASE_HISTORY + 16 {
            last = tree
                .create(SurfaceBuilder::new(format!("leash-{i}")).with_parent(Some(root)))
                .unwrap();
            let mut t = Transaction::new();
            t.remove(last);
            tree.apply(t);
        }

        assert_eq!(tree.releases.len(), RELEASE_HISTORY);
        assert_eq!(tree.release_order.len(), RELEASE_HISTORY);
        assert_eq!(tree.release_count(last), 1);
        assert_eq!(tree.release_count(first), 0);
        assert_eq!(tree.stats().released, RELEASE_HISTORY as u64 + 17);
    }

    #[test]
    fn test_remove_detaches_children() {
        let mut tree = SurfaceTree::new();
        let root = root(&mut tree);
        let leash = tree
            .create(SurfaceBuilder::new("leash").with_parent(Some(root)))
            .unwrap();
        let a = tree
            .create(SurfaceBuilder::new("a").with_parent(Some(leash)))
            .unwrap();

        let mut t = Transaction::new();
        t.remove(leash);
        tree.apply(t);

        assert!(tree.contains(a));
        assert_eq!(tree.parent_of(a), None);
    }

    #[test]
    fn test_attach_buffer_requires_buffer_surface() {
        let mut tree = SurfaceTree::new();
        let root = root(&mut tree);
        let buffer = PixelBuffer::solid(4, 2, [0, 0, 0, 255]).unwrap();
        assert_eq!(
            tree.attach_buffer(root, buffer.clone()),
            Err(SurfaceError::NotABufferSurface(root))
        );

        let surface = tree
            .create(
                SurfaceBuilder::new("thumb")
                    .with_parent(Some(root))
                    .buffer_layer(Size::new(4, 2), PixelFormat::Rgba8888),
            )
            .unwrap();
        tree.attach_buffer(surface, buffer).unwrap();
        assert_eq!(
            tree.get(surface).unwrap().buffer.map(|b| b.size),
            Some(Size::new(4, 2))
        );
    }

    #[test]
    fn test_compositor_handle_shares_tree() {
        let compositor = Compositor::new();
        let other = compositor.clone();
        let id = compositor
            .create_surface(SurfaceBuilder::new("root"))
            .unwrap();
        assert!(other.contains(id));
        assert_eq!(other.stats().surface_count, 1);
    }
}
