//! Transaction batches
//!
//! A [`Transaction`] collects surface mutations in order. Nothing reaches the
//! tree until the batch is applied through [`crate::Compositor::apply`], at
//! which point every mutation in the batch lands together.

use crate::geometry::{Affine2D, Point, Size};
use crate::surface::SurfaceId;
use smallvec::SmallVec;

/// A single queued surface mutation
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SurfaceOp {
    Show(SurfaceId),
    Hide(SurfaceId),
    SetLayer(SurfaceId, i32),
    /// Layer `surface` relative to a sibling: `SetRelativeLayer(surface, relative_to, layer)`
    SetRelativeLayer(SurfaceId, SurfaceId, i32),
    /// Move a surface under a new parent (`None` detaches it)
    Reparent(SurfaceId, Option<SurfaceId>),
    SetPosition(SurfaceId, Point),
    SetMatrix(SurfaceId, Affine2D),
    SetAlpha(SurfaceId, f32),
    SetCrop(SurfaceId, Size),
    /// Release the surface and detach its children
    Remove(SurfaceId),
}

impl SurfaceOp {
    /// The surface this op mutates
    pub fn target(&self) -> SurfaceId {
        match *self {
            SurfaceOp::Show(id)
            | SurfaceOp::Hide(id)
            | SurfaceOp::SetLayer(id, _)
            | SurfaceOp::SetRelativeLayer(id, _, _)
            | SurfaceOp::Reparent(id, _)
            | SurfaceOp::SetPosition(id, _)
            | SurfaceOp::SetMatrix(id, _)
            | SurfaceOp::SetAlpha(id, _)
            | SurfaceOp::SetCrop(id, _)
            | SurfaceOp::Remove(id) => id,
        }
    }

    /// Whether this op touches `id` as target or as a referenced surface
    pub fn references(&self, id: SurfaceId) -> bool {
        if self.target() == id {
            return true;
        }
        match *self {
            SurfaceOp::SetRelativeLayer(_, relative, _) => relative == id,
            SurfaceOp::Reparent(_, parent) => parent == Some(id),
            _ => false,
        }
    }
}

/// An ordered batch of surface mutations applied atomically
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transaction {
    ops: SmallVec<[SurfaceOp; 8]>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, id: SurfaceId) -> &mut Self {
        self.push(SurfaceOp::Show(id))
    }

    pub fn hide(&mut self, id: SurfaceId) -> &mut Self {
        self.push(SurfaceOp::Hide(id))
    }

    /// Queue a show or hide depending on `visible`
    pub fn set_visibility(&mut self, id: SurfaceId, visible: bool) -> &mut Self {
        if visible {
            self.show(id)
        } else {
            self.hide(id)
        }
    }

    pub fn set_layer(&mut self, id: SurfaceId, layer: i32) -> &mut Self {
        self.push(SurfaceOp::SetLayer(id, layer))
    }

    pub fn set_relative_layer(
        &mut self,
        id: SurfaceId,
        relative_to: SurfaceId,
        layer: i32,
    ) -> &mut Self {
        self.push(SurfaceOp::SetRelativeLayer(id, relative_to, layer))
    }

    pub fn reparent(&mut self, id: SurfaceId, parent: Option<SurfaceId>) -> &mut Self {
        self.push(SurfaceOp::Reparent(id, parent))
    }

    pub fn set_position(&mut self, id: SurfaceId, position: Point) -> &mut Self {
        self.push(SurfaceOp::SetPosition(id, position))
    }

    pub fn set_matrix(&mut self, id: SurfaceId, matrix: Affine2D) -> &mut Self {
        self.push(SurfaceOp::SetMatrix(id, matrix))
    }

    pub fn set_alpha(&mut self, id: SurfaceId, alpha: f32) -> &mut Self {
        self.push(SurfaceOp::SetAlpha(id, alpha))
    }

    pub fn set_crop(&mut self, id: SurfaceId, crop: Size) -> &mut Self {
        self.push(SurfaceOp::SetCrop(id, crop))
    }

    pub fn remove(&mut self, id: SurfaceId) -> &mut Self {
        self.push(SurfaceOp::Remove(id))
    }

    /// Append all ops from `other`, leaving it empty
    pub fn merge(&mut self, other: &mut Transaction) -> &mut Self {
        self.ops.extend(other.ops.drain(..));
        self
    }

    /// Move the queued ops out, leaving this batch empty
    pub fn take(&mut self) -> Transaction {
        std::mem::take(self)
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Whether any queued op touches `id`
    pub fn references(&self, id: SurfaceId) -> bool {
        self.ops.iter().any(|op| op.references(id))
    }

    fn push(&mut self, op: SurfaceOp) -> &mut Self {
        self.ops.push(op);
        self
    }
}

impl IntoIterator for Transaction {
    type Item = SurfaceOp;
    type IntoIter = smallvec::IntoIter<[SurfaceOp; 8]>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids() -> (SurfaceId, SurfaceId) {
        let mut map: SlotMap<SurfaceId, ()> = SlotMap::with_key();
        (map.insert(()), map.insert(()))
    }

    #[test]
    fn test_ops_keep_order() {
        let (a, b) = ids();
        let mut t = Transaction::new();
        t.show(a).set_layer(a, i32::MAX).reparent(a, Some(b));

        assert_eq!(
            t.ops(),
            &[
                SurfaceOp::Show(a),
                SurfaceOp::SetLayer(a, i32::MAX),
                SurfaceOp::Reparent(a, Some(b)),
            ]
        );
    }

    #[test]
    fn test_merge_drains_other() {
        let (a, b) = ids();
        let mut first = Transaction::new();
        first.show(a);
        let mut second = Transaction::new();
        second.hide(b);

        first.merge(&mut second);
        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
    }

    #[test]
    fn test_references_parent_and_relative() {
        let (a, b) = ids();
        let mut t = Transaction::new();
        t.reparent(a, Some(b));
        assert!(t.references(a));
        assert!(t.references(b));

        let mut t = Transaction::new();
        t.set_relative_layer(a, b, 1);
        assert!(t.references(b));

        let mut t = Transaction::new();
        t.show(a);
        assert!(!t.references(b));
    }

    #[test]
    fn test_take_leaves_empty() {
        let (a, _) = ids();
        let mut t = Transaction::new();
        t.set_alpha(a, 0.5);
        let taken = t.take();
        assert!(t.is_empty());
        assert_eq!(taken.len(), 1);
    }
}
