//! Thumbnail surfaces
//!
//! A thumbnail is a short-lived surface that shows a pixel snapshot standing
//! in for an owner window while that window transitions. It draws above its
//! siblings, can be shown or hidden, and can be animated through a leash.
//!
//! The owner is observed through a `Weak` reference only. If the owner goes
//! away first, mutations that would have joined its pending batch are applied
//! straight to the compositor instead.

use crate::animator::{
    Animatable, AnimationState, AnimationType, FinishListener, SurfaceAnimator,
};
use crate::dump::{thumbnail_fields, DumpNode};
use crate::error::{AnimatorError, ThumbnailError};
use leash_animation::{AnimationId, AnimationSpec, EngineHandle};
use leash_core::{
    Compositor, OwnerEntity, PixelBuffer, PixelFormat, Point, Size, SurfaceBuilder, SurfaceId,
    Transaction,
};
use std::sync::Weak;

/// The thumbnail's side of the leash contract
struct ThumbnailHost {
    owner: Weak<dyn OwnerEntity>,
    compositor: Compositor,
    /// `None` once destroyed
    surface: Option<SurfaceId>,
    size: Size,
    name: String,
}

impl Animatable for ThumbnailHost {
    fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    fn enqueue_pending(&self, t: &mut Transaction) {
        match self.owner.upgrade() {
            Some(owner) => {
                owner.pending_transaction().merge(t);
            }
            None => self.compositor.apply(t.take()),
        }
    }

    fn commit_pending_transaction(&self) {
        if let Some(owner) = self.owner.upgrade() {
            owner.commit_pending_transaction();
        }
    }

    fn make_animation_leash(&self) -> SurfaceBuilder {
        match self.owner.upgrade() {
            Some(owner) => owner.make_child_surface(),
            None => SurfaceBuilder::new(self.name.clone()),
        }
    }

    fn animation_leash_parent(&self) -> Option<SurfaceId> {
        self.owner
            .upgrade()
            .and_then(|owner| owner.animation_leash_parent())
    }

    fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    fn parent_surface(&self) -> Option<SurfaceId> {
        self.owner.upgrade().and_then(|owner| owner.parent_surface())
    }

    fn surface_name(&self) -> String {
        self.name.clone()
    }

    fn surface_width(&self) -> u32 {
        self.size.width
    }

    fn surface_height(&self) -> u32 {
        self.size.height
    }

    fn on_animation_leash_created(&self, t: &mut Transaction, leash: SurfaceId) {
        t.set_layer(leash, i32::MAX);
    }

    fn on_animation_leash_lost(&self, t: &mut Transaction) {
        if let Some(surface) = self.surface {
            t.hide(surface);
        }
    }
}

/// A transient surface showing a snapshot of an owner window
///
/// Owned and driven by the compositor-control thread. Dropping a thumbnail
/// that was not destroyed destroys it.
pub struct ThumbnailSurface {
    host: ThumbnailHost,
    animator: SurfaceAnimator,
}

impl ThumbnailSurface {
    /// Create a thumbnail for `owner` showing `buffer`
    ///
    /// The surface is created hidden under the owner; `Show` and a top-most
    /// `SetLayer` are queued into `t`, which the caller commits.
    pub fn new(
        t: &mut Transaction,
        owner: Weak<dyn OwnerEntity>,
        buffer: PixelBuffer,
        engine: EngineHandle,
    ) -> Result<Self, ThumbnailError> {
        let size = buffer.size();
        if size.is_empty() {
            return Err(ThumbnailError::EmptyBuffer {
                width: size.width,
                height: size.height,
            });
        }
        let entity = owner.upgrade().ok_or(ThumbnailError::OwnerGone)?;

        let name = format!("thumbnail anim: {}", entity.name());
        let owner_uid = entity
            .primary_window()
            .map(|window| window.owner_uid)
            .unwrap_or_else(|| entity.uid());
        let builder = entity
            .make_child_surface()
            .with_name(name.clone())
            .buffer_layer(size, PixelFormat::Rgba8888)
            .with_window_type(entity.window_type())
            .with_owner_uid(owner_uid)
            .hidden(true);

        let compositor = entity.compositor().clone();
        let surface = compositor.create_surface(builder)?;
        if let Err(e) = compositor.attach_buffer(surface, buffer) {
            tracing::warn!("failed to upload thumbnail buffer for '{}': {}", name, e);
        }

        t.show(surface).set_layer(surface, i32::MAX);
        tracing::debug!("created {} as {:?} ({}x{})", name, surface, size.width, size.height);

        Ok(Self {
            host: ThumbnailHost {
                owner,
                compositor,
                surface: Some(surface),
                size,
                name,
            },
            animator: SurfaceAnimator::new(engine),
        })
    }

    pub fn width(&self) -> u32 {
        self.host.size.width
    }

    pub fn height(&self) -> u32 {
        self.host.size.height
    }

    /// The thumbnail's own surface, `None` after destroy
    pub fn surface(&self) -> Option<SurfaceId> {
        self.host.surface
    }

    pub fn leash(&self) -> Option<SurfaceId> {
        self.animator.leash()
    }

    pub fn is_animating(&self) -> bool {
        self.animator.is_animating()
    }

    pub fn animation_state(&self) -> AnimationState {
        self.animator.state()
    }

    pub fn animation_id(&self) -> Option<AnimationId> {
        self.animator.animation_id()
    }

    pub fn is_destroyed(&self) -> bool {
        self.animator.state() == AnimationState::Destroyed
    }

    /// Show or hide the thumbnail (the leash while animating)
    pub fn set_visible(&self, t: &mut Transaction, show: bool) {
        match self.animator.animated_surface(&self.host) {
            Some(target) => {
                t.set_visibility(target, show);
            }
            None => tracing::warn!("set_visible on destroyed {}", self.host.name),
        }
    }

    pub fn set_layer(&self, t: &mut Transaction, layer: i32) {
        self.animator.set_layer(&self.host, t, layer);
    }

    pub fn set_relative_layer(&self, t: &mut Transaction, relative_to: SurfaceId, layer: i32) {
        self.animator
            .set_relative_layer(&self.host, t, relative_to, layer);
    }

    /// Animate the thumbnail through a fresh leash
    pub fn start_animation(
        &mut self,
        t: &mut Transaction,
        spec: AnimationSpec,
    ) -> Result<(), AnimatorError> {
        self.start_animation_at(t, spec, None)
    }

    /// Animate with the leash held at a fixed offset
    pub fn start_animation_at(
        &mut self,
        t: &mut Transaction,
        spec: AnimationSpec,
        position: Option<Point>,
    ) -> Result<(), AnimatorError> {
        self.start_animation_with_type(t, spec, position, AnimationType::AppTransition)
    }

    /// Animate, recording why the animation runs
    pub fn start_animation_with_type(
        &mut self,
        t: &mut Transaction,
        spec: AnimationSpec,
        position: Option<Point>,
        animation_type: AnimationType,
    ) -> Result<(), AnimatorError> {
        self.animator
            .start_animation(&self.host, t, spec, position, animation_type)
    }

    /// Why the running animation was started
    pub fn animation_type(&self) -> Option<AnimationType> {
        self.animator.animation_type()
    }

    /// Route an engine finish notification; returns whether it applied
    pub fn on_animation_finished(&mut self, id: AnimationId) -> bool {
        self.animator.on_animation_finished(&self.host, id)
    }

    pub fn cancel_animation(&mut self) -> bool {
        self.animator.cancel_animation(&self.host)
    }

    pub fn set_finish_listener(&mut self, listener: Option<FinishListener>) {
        self.animator.set_finish_listener(listener);
    }

    pub fn start_delaying_animation_start(&mut self) {
        self.animator.start_delaying_animation_start();
    }

    pub fn end_delaying_animation_start(&mut self) -> Result<(), AnimatorError> {
        self.animator.end_delaying_animation_start(&self.host)
    }

    /// Cancel any animation and release the surface
    ///
    /// Safe to call more than once; later calls do nothing.
    pub fn destroy(&mut self) {
        if self.is_destroyed() {
            return;
        }
        self.animator.destroy(&self.host);

        if let Some(surface) = self.host.surface.take() {
            let mut t = Transaction::new();
            t.remove(surface);
            self.host.enqueue_pending(&mut t);
            self.host.commit_pending_transaction();
            tracing::debug!("destroyed {} ({:?})", self.host.name, surface);
        }
    }

    pub fn dump(&self) -> DumpNode {
        DumpNode::new()
            .field(thumbnail_fields::WIDTH, "width", self.width())
            .field(thumbnail_fields::HEIGHT, "height", self.height())
            .field(
                thumbnail_fields::SURFACE_ANIMATOR,
                "surface_animator",
                self.animator.dump(),
            )
    }
}

impl Drop for ThumbnailSurface {
    fn drop(&mut self) {
        if !self.is_destroyed() {
            tracing::debug!("{} dropped without destroy", self.host.name);
            self.destroy();
        }
    }
}

impl std::fmt::Debug for ThumbnailSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailSurface")
            .field("name", &self.host.name)
            .field("surface", &self.host.surface)
            .field("size", &self.host.size)
            .field("animator", &self.animator)
            .finish()
    }
}
