use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Bounding quadrilateral in the order the OCR engine reports it:
/// top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    /// Axis-aligned quad spanning `top`..`bottom` vertically.
    pub fn from_rect(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self([
            Point::new(left, top),
            Point::new(right, top),
            Point::new(right, bottom),
            Point::new(left, bottom),
        ])
    }

    pub fn top_left(&self) -> Point {
        self.0[0]
    }

    pub fn bottom_left(&self) -> Point {
        self.0[3]
    }
}

/// One recognized text span. Produced fresh every capture cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrFragment {
    pub quad: Quad,
    pub text: String,
    pub confidence: f64,
}

impl OcrFragment {
    pub fn new(quad: Quad, text: impl Into<String>, confidence: f64) -> Self {
        Self {
            quad,
            text: text.into(),
            confidence,
        }
    }
}
