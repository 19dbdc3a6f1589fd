use std::fmt;

/// Sequence number of one capture→encode→classify→display cycle.
///
/// Issued by the scheduler in tick order, starting at 1. The display uses it
/// to drop results that arrive after a newer cycle's result was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CycleId(pub u64);

impl CycleId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One RGB8 snapshot of the live video source at its native resolution.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB8, `width * height * 3` bytes.
    pub rgb: Vec<u8>,
    pub captured_at_ms: i64,
}

impl Frame {
    pub fn new(width: u32, height: u32, rgb: Vec<u8>, captured_at_ms: i64) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected {
            return Err(FrameError::BufferSize {
                got: rgb.len(),
                expected,
            });
        }
        Ok(Self {
            width,
            height,
            rgb,
            captured_at_ms,
        })
    }

    /// A zero-sized frame cannot be encoded.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// JPEG bytes produced from exactly one [`Frame`].
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at_ms: i64,
}

impl EncodedImage {
    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }

    /// Hand the payload over to the remote call.
    pub fn into_bytes(self) -> Vec<u8> {
        self.jpeg
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("pixel buffer is {got} bytes, expected {expected}")]
    BufferSize { got: usize, expected: usize },
}
