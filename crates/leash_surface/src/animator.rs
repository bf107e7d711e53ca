//! Leash coordinator
//!
//! [`SurfaceAnimator`] runs an animation on a host surface without touching
//! the host's stable parent relationship. On start it creates a leash surface,
//! moves the host surface under it, and gives the leash to the animation
//! engine. On finish or cancel it moves the host surface back and removes the
//! leash.
//!
//! The host exposes what the coordinator needs through [`Animatable`], so the
//! same coordinator works for any kind of transient surface.
//!
//! State transitions are guarded by the engine's generational
//! [`AnimationId`]: a finish notification only acts if it names the animation
//! that is currently running. Late notifications (after a cancel, a restart,
//! or destruction) are expected and ignored.

use crate::dump::{animator_fields, DumpNode};
use crate::error::{AnimatorError, Result};
use leash_animation::{AnimationId, AnimationSpec, EngineHandle};
use leash_core::{Compositor, Point, Size, SurfaceBuilder, SurfaceId, Transaction};

/// Capabilities a host surface provides to its leash coordinator
pub trait Animatable {
    /// Compositor that allocates the leash
    fn compositor(&self) -> &Compositor;

    /// Queue `t`'s ops onto the host's pending batch, leaving `t` empty
    fn enqueue_pending(&self, t: &mut Transaction);

    /// Apply the host's pending batch
    fn commit_pending_transaction(&self);

    /// A creation request scoped under the host's hierarchy
    fn make_animation_leash(&self) -> SurfaceBuilder;

    /// Surface the leash is created under
    fn animation_leash_parent(&self) -> Option<SurfaceId>;

    /// The surface being animated
    fn surface(&self) -> Option<SurfaceId>;

    /// Where the surface belongs when no leash is in place
    fn parent_surface(&self) -> Option<SurfaceId>;

    /// Name used for the leash
    fn surface_name(&self) -> String;

    /// Width the leash is cropped to
    fn surface_width(&self) -> u32;

    /// Height the leash is cropped to
    fn surface_height(&self) -> u32;

    /// Called after the leash is created and the surface moved under it
    fn on_animation_leash_created(&self, _t: &mut Transaction, _leash: SurfaceId) {}

    /// Called after the surface is moved back and the leash removed
    fn on_animation_leash_lost(&self, _t: &mut Transaction) {}
}

/// Why an animation was started, recorded for diagnostics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AnimationType {
    #[default]
    AppTransition,
    ScreenRotation,
    Recents,
    WindowAnimation,
    InsetsControl,
    TokenTransform,
    StartingReveal,
}

impl AnimationType {
    pub fn as_str(self) -> &'static str {
        match self {
            AnimationType::AppTransition => "app_transition",
            AnimationType::ScreenRotation => "screen_rotation",
            AnimationType::Recents => "recents",
            AnimationType::WindowAnimation => "window_animation",
            AnimationType::InsetsControl => "insets_animation",
            AnimationType::TokenTransform => "token_transform",
            AnimationType::StartingReveal => "starting_reveal",
        }
    }
}

/// Public view of the coordinator's state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimationState {
    Idle,
    Animating,
    Destroyed,
}

/// How an animation ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishReason {
    /// The engine ran the animation to its end
    Completed,
    /// The animation was stopped before its end
    Cancelled,
}

/// Listener notified when an animation ends
pub type FinishListener = Box<dyn FnMut(AnimationType, FinishReason)>;

#[derive(Clone, Copy, Debug)]
enum AnimatorState {
    Idle,
    Animating {
        leash: SurfaceId,
        /// `None` while the engine start is being held back
        animation: Option<AnimationId>,
        /// Held-back request, registered when the delay ends
        deferred: Option<(AnimationSpec, Option<Point>)>,
        animation_type: AnimationType,
    },
    Destroyed,
}

/// Coordinates one leash animation at a time for a host surface
pub struct SurfaceAnimator {
    engine: EngineHandle,
    state: AnimatorState,
    start_delayed: bool,
    finish_listener: Option<FinishListener>,
}

impl SurfaceAnimator {
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            state: AnimatorState::Idle,
            start_delayed: false,
            finish_listener: None,
        }
    }

    pub fn state(&self) -> AnimationState {
        match self.state {
            AnimatorState::Idle => AnimationState::Idle,
            AnimatorState::Animating { .. } => AnimationState::Animating,
            AnimatorState::Destroyed => AnimationState::Destroyed,
        }
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.state, AnimatorState::Animating { .. })
    }

    pub fn has_leash(&self) -> bool {
        self.leash().is_some()
    }

    pub fn leash(&self) -> Option<SurfaceId> {
        match self.state {
            AnimatorState::Animating { leash, .. } => Some(leash),
            _ => None,
        }
    }

    /// Id of the running engine animation, if it has been started
    pub fn animation_id(&self) -> Option<AnimationId> {
        match self.state {
            AnimatorState::Animating { animation, .. } => animation,
            _ => None,
        }
    }

    pub fn animation_type(&self) -> Option<AnimationType> {
        match self.state {
            AnimatorState::Animating { animation_type, .. } => Some(animation_type),
            _ => None,
        }
    }

    pub fn is_start_delayed(&self) -> bool {
        self.start_delayed
    }

    /// Listener invoked after an animation completes or is cancelled
    pub fn set_finish_listener(&mut self, listener: Option<FinishListener>) {
        self.finish_listener = listener;
    }

    /// Start animating the host surface through a fresh leash
    ///
    /// A running animation is cancelled and its leash removed first. The leash
    /// creation and the reparent land in `t`; the caller commits it.
    pub fn start_animation(
        &mut self,
        host: &dyn Animatable,
        t: &mut Transaction,
        spec: AnimationSpec,
        offset: Option<Point>,
        animation_type: AnimationType,
    ) -> Result<()> {
        if matches!(self.state, AnimatorState::Destroyed) {
            tracing::warn!("start_animation on destroyed surface '{}'", host.surface_name());
            return Err(AnimatorError::Destroyed);
        }
        if self.is_animating() {
            self.stop(host, t, None);
        }

        let surface = host.surface().ok_or(AnimatorError::NoSurface)?;
        let leash = self.create_leash(host, t, surface)?;

        let (animation, deferred) = if self.start_delayed {
            (None, Some((spec, offset)))
        } else {
            match self.engine.register(leash, spec, offset) {
                Some(id) => (Some(id), None),
                None => {
                    self.reset(host, t, leash, false);
                    return Err(AnimatorError::EngineUnavailable);
                }
            }
        };

        self.state = AnimatorState::Animating {
            leash,
            animation,
            deferred,
            animation_type,
        };
        Ok(())
    }

    fn create_leash(
        &self,
        host: &dyn Animatable,
        t: &mut Transaction,
        surface: SurfaceId,
    ) -> Result<SurfaceId> {
        let builder = host
            .make_animation_leash()
            .with_parent(host.animation_leash_parent())
            .with_name(format!("{} - animation-leash", host.surface_name()))
            .effect_layer()
            .hidden(true);
        let leash = host.compositor().create_surface(builder)?;

        t.set_crop(leash, Size::new(host.surface_width(), host.surface_height()))
            .set_position(leash, Point::ZERO)
            .show(leash)
            .set_alpha(leash, 1.0)
            .reparent(surface, Some(leash));
        host.on_animation_leash_created(t, leash);
        tracing::debug!("created animation leash {:?} for {:?}", leash, surface);
        Ok(leash)
    }

    /// Move the surface back to its parent and queue the leash removal
    ///
    /// The host's leash-lost hook runs only when `notify_host` is set.
    fn reset(
        &mut self,
        host: &dyn Animatable,
        t: &mut Transaction,
        leash: SurfaceId,
        notify_host: bool,
    ) {
        let reparented = match (host.surface(), host.parent_surface()) {
            (Some(surface), Some(parent)) => {
                t.reparent(surface, Some(parent));
                true
            }
            _ => false,
        };
        t.remove(leash);
        if reparented && notify_host {
            host.on_animation_leash_lost(t);
        }
        self.state = AnimatorState::Idle;
        tracing::debug!("removed animation leash {:?}", leash);
    }

    /// Cancel the engine animation and reset
    ///
    /// `reason` is `None` for a restart, which skips the host hook and listener.
    fn stop(
        &mut self,
        host: &dyn Animatable,
        t: &mut Transaction,
        reason: Option<FinishReason>,
    ) -> bool {
        let AnimatorState::Animating {
            leash,
            animation,
            animation_type,
            ..
        } = self.state
        else {
            return false;
        };
        if let Some(id) = animation {
            self.engine.cancel(id);
        }
        self.reset(host, t, leash, reason.is_some());
        if let Some(reason) = reason {
            self.notify(animation_type, reason);
        }
        true
    }

    /// Engine callback for a natural finish
    ///
    /// Acts only if `id` is the running animation. Returns whether anything
    /// changed; a late or duplicate notification returns false.
    pub fn on_animation_finished(&mut self, host: &dyn Animatable, id: AnimationId) -> bool {
        let AnimatorState::Animating {
            leash,
            animation: Some(current),
            animation_type,
            ..
        } = self.state
        else {
            tracing::trace!("ignoring finish of {:?}: not animating", id);
            return false;
        };
        if current != id {
            tracing::trace!("ignoring finish of stale animation {:?}", id);
            return false;
        }

        let mut t = Transaction::new();
        self.reset(host, &mut t, leash, true);
        host.enqueue_pending(&mut t);
        host.commit_pending_transaction();
        self.notify(animation_type, FinishReason::Completed);
        true
    }

    /// Stop the running animation now and restore the surface
    ///
    /// The engine stops producing frames before this returns. Returns false if
    /// nothing was animating.
    pub fn cancel_animation(&mut self, host: &dyn Animatable) -> bool {
        let mut t = Transaction::new();
        if !self.stop(host, &mut t, Some(FinishReason::Cancelled)) {
            return false;
        }
        host.enqueue_pending(&mut t);
        host.commit_pending_transaction();
        true
    }

    /// Cancel any animation and enter the terminal state
    pub fn destroy(&mut self, host: &dyn Animatable) {
        if matches!(self.state, AnimatorState::Destroyed) {
            return;
        }
        self.cancel_animation(host);
        self.state = AnimatorState::Destroyed;
    }

    /// Hold back engine registration for animations started from now on
    pub fn start_delaying_animation_start(&mut self) {
        if !self.is_animating() {
            self.start_delayed = true;
        }
    }

    /// Release held-back animations to the engine
    pub fn end_delaying_animation_start(&mut self, host: &dyn Animatable) -> Result<()> {
        self.start_delayed = false;
        let AnimatorState::Animating {
            leash,
            animation: None,
            deferred: Some((spec, offset)),
            animation_type,
        } = self.state
        else {
            return Ok(());
        };

        match self.engine.register(leash, spec, offset) {
            Some(id) => {
                self.state = AnimatorState::Animating {
                    leash,
                    animation: Some(id),
                    deferred: None,
                    animation_type,
                };
                Ok(())
            }
            None => {
                self.cancel_animation(host);
                Err(AnimatorError::EngineUnavailable)
            }
        }
    }

    /// The surface that visibility and stacking changes should target
    pub fn animated_surface(&self, host: &dyn Animatable) -> Option<SurfaceId> {
        match self.state {
            AnimatorState::Animating { leash, .. } => Some(leash),
            AnimatorState::Idle => host.surface(),
            AnimatorState::Destroyed => None,
        }
    }

    /// Set the stacking layer, on the leash while animating
    pub fn set_layer(&self, host: &dyn Animatable, t: &mut Transaction, layer: i32) {
        if let Some(target) = self.animated_surface(host) {
            t.set_layer(target, layer);
        }
    }

    /// Layer relative to a sibling, on the leash while animating
    pub fn set_relative_layer(
        &self,
        host: &dyn Animatable,
        t: &mut Transaction,
        relative_to: SurfaceId,
        layer: i32,
    ) {
        if let Some(target) = self.animated_surface(host) {
            t.set_relative_layer(target, relative_to, layer);
        }
    }

    /// Move to a new parent; while animating the leash moves and the surface stays on it
    pub fn reparent(&self, host: &dyn Animatable, t: &mut Transaction, parent: SurfaceId) {
        if let Some(target) = self.animated_surface(host) {
            t.reparent(target, Some(parent));
        }
    }

    pub fn dump(&self) -> DumpNode {
        let mut node = DumpNode::new();
        if let Some(leash) = self.leash() {
            node = node.field(animator_fields::LEASH, "leash", leash.to_raw());
        }
        node = node.field(
            animator_fields::ANIMATION_START_DELAYED,
            "animation_start_delayed",
            self.start_delayed,
        );
        if let Some(id) = self.animation_id() {
            node = node.field(animator_fields::ANIMATION, "animation", id.to_raw());
        }
        if let Some(animation_type) = self.animation_type() {
            node = node.field(
                animator_fields::ANIMATION_TYPE,
                "animation_type",
                animation_type.as_str(),
            );
        }
        node
    }

    fn notify(&mut self, animation_type: AnimationType, reason: FinishReason) {
        if let Some(listener) = self.finish_listener.as_mut() {
            listener(animation_type, reason);
        }
    }
}

impl std::fmt::Debug for SurfaceAnimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceAnimator")
            .field("state", &self.state)
            .field("start_delayed", &self.start_delayed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::DumpValue;
    use leash_animation::AnimationEngine;
    use leash_core::{LeashConfig, SurfaceBuilder};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    /// Bare host: a root with one animated child, committing straight to the tree
    struct TestHost {
        compositor: Compositor,
        root: SurfaceId,
        surface: SurfaceId,
        pending: RefCell<Transaction>,
    }

    impl TestHost {
        fn new() -> Self {
            let compositor = Compositor::new();
            let root = compositor
                .create_surface(SurfaceBuilder::new("root").hidden(false))
                .unwrap();
            let surface = compositor
                .create_surface(SurfaceBuilder::new("content").with_parent(Some(root)))
                .unwrap();
            Self {
                compositor,
                root,
                surface,
                pending: RefCell::new(Transaction::new()),
            }
        }
    }

    impl Animatable for TestHost {
        fn compositor(&self) -> &Compositor {
            &self.compositor
        }

        fn enqueue_pending(&self, t: &mut Transaction) {
            self.pending.borrow_mut().merge(t);
        }

        fn commit_pending_transaction(&self) {
            let t = self.pending.borrow_mut().take();
            self.compositor.apply(t);
        }

        fn make_animation_leash(&self) -> SurfaceBuilder {
            SurfaceBuilder::new("leash")
        }

        fn animation_leash_parent(&self) -> Option<SurfaceId> {
            Some(self.root)
        }

        fn surface(&self) -> Option<SurfaceId> {
            Some(self.surface)
        }

        fn parent_surface(&self) -> Option<SurfaceId> {
            Some(self.root)
        }

        fn surface_name(&self) -> String {
            "content".to_string()
        }

        fn surface_width(&self) -> u32 {
            64
        }

        fn surface_height(&self) -> u32 {
            32
        }
    }

    fn spec() -> AnimationSpec {
        AnimationSpec::new(Duration::from_millis(300))
    }

    fn start(animator: &mut SurfaceAnimator, host: &TestHost) {
        let mut t = Transaction::new();
        animator
            .start_animation(host, &mut t, spec(), None, AnimationType::WindowAnimation)
            .unwrap();
        host.compositor.apply(t);
    }

    #[test]
    fn test_start_reparents_under_leash() {
        let host = TestHost::new();
        let engine = AnimationEngine::new(&LeashConfig::standard());
        let mut animator = SurfaceAnimator::new(engine.handle());

        start(&mut animator, &host);

        let leash = animator.leash().unwrap();
        assert_eq!(animator.state(), AnimationState::Animating);
        assert_eq!(host.compositor.parent_of(host.surface), Some(leash));
        assert_eq!(host.compositor.parent_of(leash), Some(host.root));
        let node = host.compositor.node(leash).unwrap();
        assert_eq!(node.crop, Some(Size::new(64, 32)));
        assert!(node.visible);
        assert_eq!(node.name, "content - animation-leash");
    }

    #[test]
    fn test_cancel_restores_parent_and_removes_leash() {
        let host = TestHost::new();
        let engine = AnimationEngine::new(&LeashConfig::standard());
        let mut animator = SurfaceAnimator::new(engine.handle());
        start(&mut animator, &host);
        let leash = animator.leash().unwrap();
        let id = animator.animation_id().unwrap();

        assert!(animator.cancel_animation(&host));
        assert_eq!(animator.state(), AnimationState::Idle);
        assert_eq!(host.compositor.parent_of(host.surface), Some(host.root));
        assert!(!host.compositor.contains(leash));
        assert!(!engine.handle().is_registered(id));
        assert!(!animator.cancel_animation(&host));
    }

    #[test]
    fn test_finish_is_guarded_by_id() {
        let host = TestHost::new();
        let engine = AnimationEngine::new(&LeashConfig::standard());
        let mut animator = SurfaceAnimator::new(engine.handle());
        start(&mut animator, &host);
        let first = animator.animation_id().unwrap();

        // Restart replaces the leash; the first id is now stale
        start(&mut animator, &host);
        let second = animator.animation_id().unwrap();
        assert_ne!(first, second);
        assert!(!animator.on_animation_finished(&host, first));
        assert!(animator.is_animating());

        assert!(animator.on_animation_finished(&host, second));
        assert_eq!(animator.state(), AnimationState::Idle);
        assert!(!animator.on_animation_finished(&host, second));
    }

    #[test]
    fn test_restart_leaves_single_leash() {
        let host = TestHost::new();
        let engine = AnimationEngine::new(&LeashConfig::standard());
        let mut animator = SurfaceAnimator::new(engine.handle());
        start(&mut animator, &host);
        let first = animator.leash().unwrap();
        start(&mut animator, &host);
        let second = animator.leash().unwrap();

        assert!(!host.compositor.contains(first));
        assert_eq!(host.compositor.parent_of(host.surface), Some(second));
        assert_eq!(engine.animation_count(), 1);
    }

    #[test]
    fn test_layer_and_parent_changes_target_leash() {
        let host = TestHost::new();
        let engine = AnimationEngine::new(&LeashConfig::standard());
        let mut animator = SurfaceAnimator::new(engine.handle());

        let mut t = Transaction::new();
        animator.set_layer(&host, &mut t, 5);
        assert_eq!(t.ops()[0].target(), host.surface);

        start(&mut animator, &host);
        let leash = animator.leash().unwrap();
        let mut t = Transaction::new();
        animator.set_layer(&host, &mut t, 5);
        animator.reparent(&host, &mut t, host.root);
        assert!(t.ops().iter().all(|op| op.target() == leash));
    }

    #[test]
    fn test_delayed_start_registers_on_release() {
        let host = TestHost::new();
        let engine = AnimationEngine::new(&LeashConfig::standard());
        let mut animator = SurfaceAnimator::new(engine.handle());

        animator.start_delaying_animation_start();
        start(&mut animator, &host);
        assert!(animator.has_leash());
        assert_eq!(animator.animation_id(), None);
        assert_eq!(engine.animation_count(), 0);

        animator.end_delaying_animation_start(&host).unwrap();
        assert!(animator.animation_id().is_some());
        assert_eq!(engine.animation_count(), 1);
    }

    #[test]
    fn test_listener_sees_completion_and_cancel() {
        let host = TestHost::new();
        let engine = AnimationEngine::new(&LeashConfig::standard());
        let mut animator = SurfaceAnimator::new(engine.handle());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        animator.set_finish_listener(Some(Box::new(move |ty, reason| {
            sink.borrow_mut().push((ty, reason));
        })));

        start(&mut animator, &host);
        animator.cancel_animation(&host);
        start(&mut animator, &host);
        let id = animator.animation_id().unwrap();
        animator.on_animation_finished(&host, id);

        assert_eq!(
            *seen.borrow(),
            vec![
                (AnimationType::WindowAnimation, FinishReason::Cancelled),
                (AnimationType::WindowAnimation, FinishReason::Completed),
            ]
        );
    }

    #[test]
    fn test_engine_gone_leaves_surface_in_place() {
        let host = TestHost::new();
        let handle = AnimationEngine::new(&LeashConfig::standard()).handle();
        let mut animator = SurfaceAnimator::new(handle);

        let mut t = Transaction::new();
        let result =
            animator.start_animation(&host, &mut t, spec(), None, AnimationType::AppTransition);
        host.compositor.apply(t);

        assert_eq!(result, Err(AnimatorError::EngineUnavailable));
        assert_eq!(animator.state(), AnimationState::Idle);
        assert_eq!(host.compositor.parent_of(host.surface), Some(host.root));
        assert_eq!(host.compositor.with_tree(|tree| tree.len()), 2);
    }

    #[test]
    fn test_destroyed_rejects_start() {
        let host = TestHost::new();
        let engine = AnimationEngine::new(&LeashConfig::standard());
        let mut animator = SurfaceAnimator::new(engine.handle());
        animator.destroy(&host);

        let mut t = Transaction::new();
        let result =
            animator.start_animation(&host, &mut t, spec(), None, AnimationType::AppTransition);
        assert_eq!(result, Err(AnimatorError::Destroyed));
        assert!(t.is_empty());
        assert_eq!(animator.animated_surface(&host), None);
    }

    #[test]
    fn test_dump_fields() {
        let host = TestHost::new();
        let engine = AnimationEngine::new(&LeashConfig::standard());
        let mut animator = SurfaceAnimator::new(engine.handle());
        assert!(animator.dump().get(animator_fields::LEASH).is_none());

        start(&mut animator, &host);
        let dump = animator.dump();
        assert!(dump.get(animator_fields::LEASH).is_some());
        assert!(dump.get(animator_fields::ANIMATION).is_some());
        assert_eq!(
            dump.get(animator_fields::ANIMATION_TYPE),
            Some(&DumpValue::from("window_animation"))
        );
    }
}
