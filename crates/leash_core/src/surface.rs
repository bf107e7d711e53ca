//! Surface identifiers, creation requests, and pixel buffers
//!
//! A surface is a node in the compositor's hierarchy. Surfaces are created
//! through a [`SurfaceBuilder`] and referenced by a generational [`SurfaceId`],
//! so an id held after release never aliases a newer surface.

use crate::error::{Result, SurfaceError};
use crate::geometry::{Affine2D, Point, Size};
use slotmap::new_key_type;
use smallvec::SmallVec;

new_key_type! {
    /// Handle to a surface in the compositor's tree
    pub struct SurfaceId;
}

impl SurfaceId {
    /// Convert to raw u64 for dumps and logs
    pub fn to_raw(self) -> u64 {
        self.0.as_ffi()
    }
}

/// Pixel layouts accepted for buffer uploads
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit RGBA with straight alpha
    #[default]
    Rgba8888,
    /// 8-bit RGB with an ignored padding byte
    Rgbx8888,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8888 | PixelFormat::Rgbx8888 => 4,
        }
    }

    /// Bytes needed for a `width` x `height` buffer, `None` on overflow
    pub fn buffer_len(self, width: u32, height: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(self.bytes_per_pixel())
    }

    /// Whether the format carries per-pixel alpha
    pub fn is_translucent(self) -> bool {
        matches!(self, PixelFormat::Rgba8888)
    }
}

/// A single-use pixel buffer handed to a buffer surface
///
/// The buffer is consumed on upload; it is never queued or reused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    size: Size,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw pixel bytes, checking that they match the dimensions
    pub fn new(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SurfaceError::EmptyBuffer { width, height });
        }
        let expected = format
            .buffer_len(width, height)
            .ok_or(SurfaceError::TooLarge { width, height })?;
        if pixels.len() != expected {
            return Err(SurfaceError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            size: Size::new(width, height),
            format,
            pixels,
        })
    }

    /// A buffer filled with one RGBA color
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let len = PixelFormat::Rgba8888
            .buffer_len(width, height)
            .ok_or(SurfaceError::TooLarge { width, height })?;
        let pixels = rgba.iter().copied().cycle().take(len).collect();
        Self::new(width, height, PixelFormat::Rgba8888, pixels)
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

/// What a surface holds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Plain grouping node with no content of its own
    Container,
    /// Fixed-size buffer surface
    Buffer { size: Size, format: PixelFormat },
    /// Node that only carries transform, alpha, and crop (used for leashes)
    Effect,
}

/// Metadata attached to a surface for permission bookkeeping
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceMetadata {
    pub window_type: u32,
    pub owner_uid: u32,
}

/// A request to create a surface
#[derive(Clone, Debug)]
pub struct SurfaceBuilder {
    pub(crate) name: String,
    pub(crate) parent: Option<SurfaceId>,
    pub(crate) kind: SurfaceKind,
    pub(crate) metadata: SurfaceMetadata,
    pub(crate) hidden: bool,
}

impl SurfaceBuilder {
    /// Start a request for a hidden container surface
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            kind: SurfaceKind::Container,
            metadata: SurfaceMetadata::default(),
            hidden: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_parent(mut self, parent: Option<SurfaceId>) -> Self {
        self.parent = parent;
        self
    }

    /// Make this a fixed-size buffer surface
    pub fn buffer_layer(mut self, size: Size, format: PixelFormat) -> Self {
        self.kind = SurfaceKind::Buffer { size, format };
        self
    }

    /// Make this a content-less effect surface
    pub fn effect_layer(mut self) -> Self {
        self.kind = SurfaceKind::Effect;
        self
    }

    pub fn with_window_type(mut self, window_type: u32) -> Self {
        self.metadata.window_type = window_type;
        self
    }

    pub fn with_owner_uid(mut self, uid: u32) -> Self {
        self.metadata.owner_uid = uid;
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<SurfaceId> {
        self.parent
    }

    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    pub fn metadata(&self) -> SurfaceMetadata {
        self.metadata
    }
}

/// Buffer content currently latched on a surface
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttachedBuffer {
    pub size: Size,
    pub format: PixelFormat,
    pub byte_len: usize,
}

/// A node in the surface tree
#[derive(Clone, Debug)]
pub struct SurfaceNode {
    pub name: String,
    pub kind: SurfaceKind,
    pub metadata: SurfaceMetadata,
    pub parent: Option<SurfaceId>,
    pub children: SmallVec<[SurfaceId; 4]>,
    pub layer: i32,
    /// Sibling this surface is layered relative to, if any
    pub relative_to: Option<SurfaceId>,
    pub visible: bool,
    pub position: Point,
    pub matrix: Affine2D,
    pub alpha: f32,
    pub crop: Option<Size>,
    pub buffer: Option<AttachedBuffer>,
}

impl SurfaceNode {
    pub(crate) fn from_builder(builder: SurfaceBuilder) -> Self {
        Self {
            name: builder.name,
            kind: builder.kind,
            metadata: builder.metadata,
            parent: builder.parent,
            children: SmallVec::new(),
            layer: 0,
            relative_to: None,
            visible: !builder.hidden,
            position: Point::ZERO,
            matrix: Affine2D::IDENTITY,
            alpha: 1.0,
            crop: None,
            buffer: None,
        }
    }
}
