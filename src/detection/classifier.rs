//! Motion event classification from a change mask

use super::contour::find_contours;
use super::mask::ChangeMask;
use super::Detection;
use crate::types::MotionRegion;

/// Filters traced regions by area and reduces them to a motion flag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionClassifier {
    min_area: f64,
}

impl MotionClassifier {
    pub fn new(min_area: f64) -> Self {
        Self {
            min_area: min_area.max(0.0),
        }
    }

    pub fn min_area(&self) -> f64 {
        self.min_area
    }

    /// Regions with area strictly greater than the minimum survive
    pub fn classify(&self, mask: &ChangeMask) -> Detection {
        let regions: Vec<MotionRegion> = find_contours(mask)
            .into_iter()
            .filter_map(|contour| {
                let area = contour.area();
                (area > self.min_area).then(|| MotionRegion {
                    bounds: contour.bounding_box(),
                    area,
                })
            })
            .collect();

        Detection {
            motion_detected: !regions.is_empty(),
            regions,
            changed_pixels: mask.changed_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(w: u32, h: u32) -> ChangeMask {
        ChangeMask::from_fn(w + 10, h + 10, |x, y| {
            (5..5 + w).contains(&x) && (5..5 + h).contains(&y)
        })
    }

    #[test]
    fn test_area_at_threshold_is_excluded() {
        // 11x21 pixels -> polygon area 10 * 20 = 200
        let detection = MotionClassifier::new(200.0).classify(&rect(11, 21));
        assert!(!detection.motion_detected);
        assert!(detection.regions.is_empty());
        assert_eq!(detection.changed_pixels, 11 * 21);
    }

    #[test]
    fn test_area_above_threshold_is_included() {
        // 202x2 pixels -> polygon area 201 * 1 = 201
        let detection = MotionClassifier::new(200.0).classify(&rect(202, 2));
        assert!(detection.motion_detected);
        assert_eq!(detection.regions.len(), 1);
        assert_eq!(detection.regions[0].area, 201.0);
        assert_eq!(detection.regions[0].bounds.width, 202);
    }

    #[test]
    fn test_empty_mask_has_no_motion() {
        let detection = MotionClassifier::new(0.0).classify(&ChangeMask::empty(8, 8));
        assert!(!detection.motion_detected);
    }

    #[test]
    fn test_zero_min_area_keeps_any_positive_region() {
        let detection = MotionClassifier::new(0.0).classify(&rect(2, 2));
        assert!(detection.motion_detected);
        assert_eq!(detection.regions[0].area, 1.0);
    }
}
