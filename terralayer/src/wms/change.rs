//! Viewport change detection for single-image layers.

use crate::coord::BoundingBox;

/// Default pan threshold, as a fraction of the last request's width.
pub const DEFAULT_UPDATE_THRESHOLD: f64 = 0.5;

/// Width ratio below which the view counts as zoomed in.
pub const DEFAULT_ZOOM_IN_THRESHOLD: f64 = 0.6;

/// Width ratio above which the view counts as zoomed out.
pub const DEFAULT_ZOOM_OUT_THRESHOLD: f64 = 1.8;

/// Thresholds deciding when a new image is worth requesting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeThresholds {
    pub update_threshold: f64,
    pub zoom_in_threshold: f64,
    pub zoom_out_threshold: f64,
}

impl Default for ChangeThresholds {
    fn default() -> Self {
        Self {
            update_threshold: DEFAULT_UPDATE_THRESHOLD,
            zoom_in_threshold: DEFAULT_ZOOM_IN_THRESHOLD,
            zoom_out_threshold: DEFAULT_ZOOM_OUT_THRESHOLD,
        }
    }
}

/// Outcome of comparing a candidate footprint with the last request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChangeDecision {
    /// Nothing requested yet.
    FirstLoad,
    /// Center moved more than `update_threshold × last width`.
    Pan { distance: f64 },
    /// Width ratio left `[zoom_in_threshold, zoom_out_threshold]`.
    Zoom { ratio: f64 },
    Unchanged,
}

impl ChangeDecision {
    pub fn should_update(&self) -> bool {
        !matches!(self, ChangeDecision::Unchanged)
    }
}

impl ChangeThresholds {
    /// Compares `candidate` with the last requested bbox.
    ///
    /// Pan is checked first, on the raw candidate center.
    pub fn detect(&self, last: Option<&BoundingBox>, candidate: &BoundingBox) -> ChangeDecision {
        let Some(last) = last else {
            return ChangeDecision::FirstLoad;
        };

        let (lx, ly) = last.center();
        let (cx, cy) = candidate.center();
        let distance = (cx - lx).hypot(cy - ly);
        if distance > last.width() * self.update_threshold {
            return ChangeDecision::Pan { distance };
        }

        let ratio = if last.width() > 0.0 {
            candidate.width() / last.width()
        } else {
            0.0
        };
        if ratio < self.zoom_in_threshold || ratio > self.zoom_out_threshold {
            return ChangeDecision::Zoom { ratio };
        }

        ChangeDecision::Unchanged
    }

    /// Extent to request for a decision: a zoom keeps the last center,
    /// anything else uses the candidate as is.
    pub fn request_extent(
        &self,
        decision: ChangeDecision,
        last: Option<&BoundingBox>,
        candidate: &BoundingBox,
    ) -> BoundingBox {
        match (decision, last) {
            (ChangeDecision::Zoom { .. }, Some(last)) => {
                let (lx, ly) = last.center();
                BoundingBox::from_center(lx, ly, candidate.width(), candidate.height())
            }
            _ => *candidate,
        }
    }
}
