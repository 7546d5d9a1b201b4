use image::RgbaImage;
use std::sync::Arc;

/// Exact comparison: any differing pixel, or a size change, counts.
pub fn has_changed(previous: Option<&RgbaImage>, current: &RgbaImage) -> bool {
    match previous {
        None => true,
        Some(previous) => {
            previous.dimensions() != current.dimensions() || previous.as_raw() != current.as_raw()
        }
    }
}

/// Remembers the last capture that went through OCR.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    previous: Option<Arc<RgbaImage>>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `current` differs from the cached capture, in which
    /// case it becomes the new cached capture.
    pub fn observe(&mut self, current: Arc<RgbaImage>) -> bool {
        if !has_changed(self.previous.as_deref(), &current) {
            return false;
        }
        self.previous = Some(current);
        true
    }
}
