//! Animation engine
//!
//! Drives registered leash animations and turns each sample into a
//! transaction batch for the leash surface.
//!
//! Sampling happens either on a background thread (`start_background()`) or
//! through manual `tick()`/`advance()` calls. Either way the engine never
//! touches the surface tree while sampling: frames and finish notifications
//! travel over a channel and reach the compositor only when the control
//! thread calls `dispatch()`.
//!
//! Cancellation is synchronous. `cancel()` removes the animation record under
//! the same lock sampling holds, and `dispatch()` drops anything still queued
//! for an id that is no longer registered, so after `cancel()` returns no
//! frame from that animation reaches the compositor.

use crate::timing::AnimationSpec;
use leash_core::{Compositor, LeashConfig, Point, SurfaceId, Transaction};
use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

new_key_type! {
    /// Handle to a registered leash animation
    pub struct AnimationId;
}

impl AnimationId {
    /// Convert to raw u64 for dumps and logs
    pub fn to_raw(self) -> u64 {
        self.0.as_ffi()
    }
}

/// Message sent from the sampling side to the control thread
#[derive(Debug)]
pub enum EngineMessage {
    /// A batch carrying one transform sample for the animation's leash
    Frame(AnimationId, Transaction),
    /// The animation reached the end of its duration
    Finished(AnimationId),
}

/// Callback type for waking up the control thread from the animation thread
pub type WakeCallback = Arc<dyn Fn() + Send + Sync>;

struct RunningAnimation {
    leash: SurfaceId,
    spec: AnimationSpec,
    offset: Option<Point>,
    duration: Duration,
    elapsed: Duration,
    /// Part of the next step that predates registration
    lead_in: Duration,
    finished: bool,
}

impl RunningAnimation {
    fn progress(&self) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let t = self.elapsed.as_nanos() as f64 / self.duration.as_nanos() as f64;
        t.clamp(0.0, 1.0) as f32
    }

    fn frame(&self) -> Transaction {
        let sample = self.spec.sample(self.progress(), self.offset);
        let mut t = Transaction::new();
        t.set_matrix(self.leash, sample.matrix)
            .set_alpha(self.leash, sample.alpha);
        t
    }
}

struct EngineInner {
    animations: SlotMap<AnimationId, RunningAnimation>,
    last_frame: Instant,
    animation_scale: f32,
    max_duration: Duration,
    sender: Sender<EngineMessage>,
}

impl EngineInner {
    /// Step every unfinished animation by `dt` and queue its frame
    ///
    /// Returns true if any animation still needs frames.
    fn advance(&mut self, dt: Duration) -> bool {
        let mut active = false;
        for (id, anim) in self.animations.iter_mut() {
            if anim.finished {
                continue;
            }
            let step = dt.saturating_sub(anim.lead_in);
            anim.lead_in = anim.lead_in.saturating_sub(dt);
            anim.elapsed = (anim.elapsed + step).min(anim.duration);
            let _ = self.sender.send(EngineMessage::Frame(id, anim.frame()));
            if anim.elapsed >= anim.duration {
                anim.finished = true;
                let _ = self.sender.send(EngineMessage::Finished(id));
            } else {
                active = true;
            }
        }
        active
    }

    fn register(
        &mut self,
        leash: SurfaceId,
        spec: AnimationSpec,
        offset: Option<Point>,
    ) -> AnimationId {
        let duration = spec.effective_duration(self.max_duration, self.animation_scale);
        // An idle engine's last_frame is stale; running animations keep theirs
        let now = Instant::now();
        let lead_in = if self.animations.values().any(|a| !a.finished) {
            now.saturating_duration_since(self.last_frame)
        } else {
            self.last_frame = now;
            Duration::ZERO
        };
        let id = self.animations.insert(RunningAnimation {
            leash,
            spec,
            offset,
            duration,
            elapsed: Duration::ZERO,
            lead_in,
            finished: false,
        });

        if duration.is_zero() {
            // Jump straight to the end state; no elapsed time is required
            if let Some(anim) = self.animations.get_mut(id) {
                anim.finished = true;
                let _ = self.sender.send(EngineMessage::Frame(id, anim.frame()));
            }
            let _ = self.sender.send(EngineMessage::Finished(id));
        }
        tracing::debug!(
            "registered leash animation {:?} on {:?} for {:?}",
            id,
            leash,
            duration
        );
        id
    }
}

/// The engine that samples all active leash animations
///
/// Owned by the compositor-control thread. Components that start or cancel
/// animations hold an [`EngineHandle`].
pub struct AnimationEngine {
    inner: Arc<Mutex<EngineInner>>,
    receiver: Receiver<EngineMessage>,
    target_fps: u32,
    /// Stop signal for background thread
    stop_flag: Arc<AtomicBool>,
    /// Background thread handle (if running)
    thread_handle: Option<JoinHandle<()>>,
    /// Optional callback to wake up the control thread
    wake_callback: Option<WakeCallback>,
}

impl AnimationEngine {
    pub fn new(config: &LeashConfig) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            inner: Arc::new(Mutex::new(EngineInner {
                animations: SlotMap::with_key(),
                last_frame: Instant::now(),
                animation_scale: config.animation_scale,
                max_duration: config.max_animation_duration(),
                sender,
            })),
            receiver,
            target_fps: config.target_fps.max(1),
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            wake_callback: None,
        }
    }

    /// Set a wake callback invoked from the background thread after it queues frames
    pub fn set_wake_callback<F>(&mut self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.wake_callback = Some(Arc::new(callback));
    }

    /// Start sampling on a background thread at the configured rate
    pub fn start_background(&mut self) {
        if self.thread_handle.is_some() {
            return; // Already running
        }

        let inner = Arc::clone(&self.inner);
        let stop_flag = Arc::clone(&self.stop_flag);
        let wake_callback = self.wake_callback.clone();
        let frame_duration = Duration::from_micros(1_000_000 / self.target_fps as u64);

        tracing::debug!("animation thread starting at {} fps", self.target_fps);
        self.thread_handle = Some(thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                let start = Instant::now();

                let produced = {
                    let mut inner = inner.lock();
                    let now = Instant::now();
                    let dt = now.saturating_duration_since(inner.last_frame);
                    inner.last_frame = now;
                    let had_work = inner.animations.values().any(|a| !a.finished);
                    inner.advance(dt);
                    had_work
                };

                if produced {
                    if let Some(ref callback) = wake_callback {
                        callback();
                    }
                }

                let elapsed = start.elapsed();
                if elapsed < frame_duration {
                    thread::sleep(frame_duration - elapsed);
                }
            }
            tracing::debug!("animation thread stopped");
        }));
    }

    /// Stop the background thread and wait for it to exit
    pub fn stop_background(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.stop_flag.store(false, Ordering::Relaxed);
    }

    pub fn is_background_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    /// Get a handle for starting and cancelling animations
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Advance by the wall-clock time since the last frame
    ///
    /// Returns true if any animation still needs frames.
    pub fn tick(&self) -> bool {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let dt = now.saturating_duration_since(inner.last_frame);
        inner.last_frame = now;
        inner.advance(dt)
    }

    /// Advance by a fixed step, independent of wall-clock time
    pub fn advance(&self, dt: Duration) -> bool {
        let mut inner = self.inner.lock();
        inner.last_frame = Instant::now();
        inner.advance(dt)
    }

    /// Deliver queued frames to the compositor and collect finished animations
    ///
    /// Must run on the compositor-control thread. The returned ids are the
    /// natural completions to route to each animation's owner; anything queued
    /// for a cancelled animation is dropped.
    pub fn dispatch(&self, compositor: &Compositor) -> Vec<AnimationId> {
        let mut finished = Vec::new();
        for message in self.receiver.try_iter() {
            match message {
                EngineMessage::Frame(id, transaction) => {
                    let live = self.inner.lock().animations.contains_key(id);
                    if live {
                        compositor.apply(transaction);
                    } else {
                        tracing::trace!("dropping frame for cancelled animation {:?}", id);
                    }
                }
                EngineMessage::Finished(id) => {
                    if self.inner.lock().animations.remove(id).is_some() {
                        finished.push(id);
                    } else {
                        tracing::trace!("dropping finish for cancelled animation {:?}", id);
                    }
                }
            }
        }
        finished
    }

    /// Number of registered animations, including finished ones awaiting dispatch
    pub fn animation_count(&self) -> usize {
        self.inner.lock().animations.len()
    }

    /// Whether any animation still needs frames
    pub fn has_active_animations(&self) -> bool {
        self.inner.lock().animations.values().any(|a| !a.finished)
    }

    pub fn set_animation_scale(&self, scale: f32) {
        self.handle().set_animation_scale(scale);
    }

    pub fn animation_scale(&self) -> f32 {
        self.inner.lock().animation_scale
    }
}

impl Drop for AnimationEngine {
    fn drop(&mut self) {
        // Stop background thread when engine is dropped
        self.stop_background();
    }
}

/// A weak handle to the animation engine
///
/// Held by leash coordinators. It won't keep the engine alive; operations on
/// a handle whose engine is gone are no-ops.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Weak<Mutex<EngineInner>>,
}

impl EngineHandle {
    /// Register a leash animation
    ///
    /// The duration is clamped to the engine's ceiling and scaled by the
    /// global animation-speed multiplier. Returns `None` if the engine is gone.
    pub fn register(
        &self,
        leash: SurfaceId,
        spec: AnimationSpec,
        offset: Option<Point>,
    ) -> Option<AnimationId> {
        self.inner
            .upgrade()
            .map(|inner| inner.lock().register(leash, spec, offset))
    }

    /// Stop an animation immediately
    ///
    /// Returns true if the animation was registered. After this returns no
    /// further frame for `id` is produced or delivered.
    pub fn cancel(&self, id: AnimationId) -> bool {
        let removed = self
            .inner
            .upgrade()
            .map(|inner| inner.lock().animations.remove(id).is_some())
            .unwrap_or(false);
        if removed {
            tracing::debug!("cancelled leash animation {:?}", id);
        }
        removed
    }

    /// Whether `id` is still registered (running or awaiting finish dispatch)
    pub fn is_registered(&self, id: AnimationId) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.lock().animations.contains_key(id))
            .unwrap_or(false)
    }

    /// Effective duration of a registered animation
    pub fn duration(&self, id: AnimationId) -> Option<Duration> {
        self.inner
            .upgrade()
            .and_then(|inner| inner.lock().animations.get(id).map(|a| a.duration))
    }

    /// Set the global animation-speed multiplier for subsequent registrations
    pub fn set_animation_scale(&self, scale: f32) {
        if let Some(inner) = self.inner.upgrade() {
            let scale = if scale.is_finite() { scale.max(0.0) } else { 0.0 };
            inner.lock().animation_scale = scale;
        }
    }

    /// Check if the engine is still alive
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}
