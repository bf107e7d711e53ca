//! Owner entities
//!
//! An owner entity is the window a thumbnail visually stands in for. Thumbnails
//! only observe their owner through a `Weak` reference; the owner outlives and
//! controls the thumbnail's destruction order.

use crate::compositor::Compositor;
use crate::error::Result;
use crate::surface::{SurfaceBuilder, SurfaceId};
use crate::transaction::Transaction;
use parking_lot::{Mutex, MutexGuard};

/// The top-most window of an owner, used for permission bookkeeping
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrimaryWindow {
    pub name: String,
    pub owner_uid: u32,
}

/// Capabilities an owner exposes to the surfaces it hosts
pub trait OwnerEntity {
    /// Human-readable name used when naming child surfaces
    fn name(&self) -> &str;

    /// Compositor that holds the owner's surfaces
    fn compositor(&self) -> &Compositor;

    /// A creation request scoped under the owner's hierarchy
    fn make_child_surface(&self) -> SurfaceBuilder;

    /// The batch that collects mutations until the owner commits
    fn pending_transaction(&self) -> MutexGuard<'_, Transaction>;

    /// Apply the pending batch
    fn commit_pending_transaction(&self);

    /// Surface that animation leashes are created under
    fn animation_leash_parent(&self) -> Option<SurfaceId>;

    /// Surface that hosted content is parented to when not animating
    fn parent_surface(&self) -> Option<SurfaceId>;

    /// The owner's top-most window, if it has one
    fn primary_window(&self) -> Option<PrimaryWindow>;

    /// Window type recorded in surface metadata
    fn window_type(&self) -> u32;

    /// Calling identity used when no primary window exists
    fn uid(&self) -> u32;
}

/// A minimal owner window backed by a container surface
pub struct OwnerWindow {
    name: String,
    compositor: Compositor,
    surface: SurfaceId,
    animation_layer: Option<SurfaceId>,
    window_type: u32,
    uid: u32,
    primary_window: Mutex<Option<PrimaryWindow>>,
    pending: Mutex<Transaction>,
}

impl OwnerWindow {
    /// Create the owner's container surface (shown) under `parent`
    pub fn new(
        compositor: &Compositor,
        name: impl Into<String>,
        parent: Option<SurfaceId>,
    ) -> Result<Self> {
        let name = name.into();
        let surface = compositor.create_surface(
            SurfaceBuilder::new(name.clone())
                .with_parent(parent)
                .hidden(false),
        )?;
        tracing::debug!("owner window '{}' created with surface {:?}", name, surface);
        Ok(Self {
            name,
            compositor: compositor.clone(),
            surface,
            animation_layer: None,
            window_type: 0,
            uid: 0,
            primary_window: Mutex::new(None),
            pending: Mutex::new(Transaction::new()),
        })
    }

    /// Route animation leashes to a dedicated layer instead of the owner surface
    pub fn with_animation_layer(mut self, layer: SurfaceId) -> Self {
        self.animation_layer = Some(layer);
        self
    }

    pub fn with_window_type(mut self, window_type: u32) -> Self {
        self.window_type = window_type;
        self
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = uid;
        self
    }

    pub fn set_primary_window(&self, window: Option<PrimaryWindow>) {
        *self.primary_window.lock() = window;
    }

    /// The owner's own container surface
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }
}

impl OwnerEntity for OwnerWindow {
    fn name(&self) -> &str {
        &self.name
    }

    fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    fn make_child_surface(&self) -> SurfaceBuilder {
        SurfaceBuilder::new(format!("{} - child", self.name))
            .with_parent(Some(self.surface))
            .with_window_type(self.window_type)
    }

    fn pending_transaction(&self) -> MutexGuard<'_, Transaction> {
        self.pending.lock()
    }

    fn commit_pending_transaction(&self) {
        let transaction = self.pending.lock().take();
        self.compositor.apply(transaction);
    }

    fn animation_leash_parent(&self) -> Option<SurfaceId> {
        self.animation_layer.or(Some(self.surface))
    }

    fn parent_surface(&self) -> Option<SurfaceId> {
        Some(self.surface)
    }

    fn primary_window(&self) -> Option<PrimaryWindow> {
        self.primary_window.lock().clone()
    }

    fn window_type(&self) -> u32 {
        self.window_type
    }

    fn uid(&self) -> u32 {
        self.uid
    }
}

impl std::fmt::Debug for OwnerWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerWindow")
            .field("name", &self.name)
            .field("surface", &self.surface)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_surface_scoped_under_owner() {
        let compositor = Compositor::new();
        let owner = OwnerWindow::new(&compositor, "app", None)
            .unwrap()
            .with_window_type(2);

        let builder = owner.make_child_surface();
        assert_eq!(builder.parent(), Some(owner.surface()));
        assert_eq!(builder.metadata().window_type, 2);
    }

    #[test]
    fn test_commit_applies_pending() {
        let compositor = Compositor::new();
        let owner = OwnerWindow::new(&compositor, "app", None).unwrap();
        let child = compositor
            .create_surface(owner.make_child_surface())
            .unwrap();

        owner.pending_transaction().show(child);
        assert!(!compositor.node(child).unwrap().visible);

        owner.commit_pending_transaction();
        assert!(compositor.node(child).unwrap().visible);
        assert!(owner.pending_transaction().is_empty());
    }

    #[test]
    fn test_leash_parent_prefers_animation_layer() {
        let compositor = Compositor::new();
        let layer = compositor
            .create_surface(SurfaceBuilder::new("animation layer"))
            .unwrap();
        let owner = OwnerWindow::new(&compositor, "app", None).unwrap();
        assert_eq!(owner.animation_leash_parent(), Some(owner.surface()));

        let owner = owner.with_animation_layer(layer);
        assert_eq!(owner.animation_leash_parent(), Some(layer));
        assert_eq!(owner.parent_surface(), Some(owner.surface()));
    }
}
