//! Property-Based Tests for change masks, contours, and the area filter

use crabwatch::detection::{find_contours, BorderKind, ChangeMask, MotionClassifier};
use proptest::prelude::*;

fn rectangle(width: u32, height: u32, x0: u32, y0: u32, w: u32, h: u32) -> ChangeMask {
    ChangeMask::from_fn(width, height, |x, y| {
        x >= x0 && x < x0 + w && y >= y0 && y < y0 + h
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// AREA FILTERING
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    /// INVARIANT: A solid w x h block traces to area (w-1)(h-1)
    #[test]
    fn solid_block_area(w in 2u32..40, h in 2u32..40, x0 in 0u32..10, y0 in 0u32..10) {
        let mask = rectangle(60, 60, x0, y0, w, h);
        let contours = find_contours(&mask);
        prop_assert_eq!(contours.len(), 1);
        prop_assert_eq!(contours[0].area(), ((w - 1) * (h - 1)) as f64);

        let bounds = contours[0].bounding_box();
        prop_assert_eq!((bounds.x, bounds.y, bounds.width, bounds.height), (x0, y0, w, h));
    }

    /// INVARIANT: area == min area is excluded, min area - 1 lets it through
    #[test]
    fn area_filter_is_strict(w in 2u32..40, h in 2u32..40) {
        let mask = rectangle(50, 50, 3, 3, w, h);
        let area = ((w - 1) * (h - 1)) as f64;

        prop_assert!(!MotionClassifier::new(area).classify(&mask).motion_detected);
        prop_assert!(MotionClassifier::new(area - 1.0).classify(&mask).motion_detected);
    }

    /// INVARIANT: Every contour has a valid parent index and holes have a parent
    #[test]
    fn contour_tree_is_well_formed(cells in proptest::collection::vec(any::<bool>(), 16 * 16)) {
        let mask = ChangeMask::from_fn(16, 16, |x, y| cells[(y * 16 + x) as usize]);
        let contours = find_contours(&mask);
        for (i, contour) in contours.iter().enumerate() {
            prop_assert!(!contour.points.is_empty());
            if let Some(parent) = contour.parent {
                prop_assert!(parent < contours.len());
                prop_assert_ne!(parent, i);
            }
            if contour.kind == BorderKind::Hole {
                prop_assert!(contour.parent.is_some());
            }
        }
        if mask.changed_count() == 0 {
            prop_assert!(contours.is_empty());
        } else {
            prop_assert!(contours.iter().any(|c| c.kind == BorderKind::Outer));
        }
    }
}

#[test]
fn min_area_200_boundary() {
    // 11 x 21 traces to 10 * 20 = 200: excluded at the default minimum
    let at_threshold = rectangle(64, 64, 5, 5, 11, 21);
    assert!(!MotionClassifier::new(200.0).classify(&at_threshold).motion_detected);

    // 202 x 2 traces to 201 * 1 = 201: included
    let above = rectangle(256, 8, 10, 3, 202, 2);
    let detection = MotionClassifier::new(200.0).classify(&above);
    assert!(detection.motion_detected);
    assert_eq!(detection.regions.len(), 1);
    assert_eq!(detection.regions[0].area, 201.0);
}

#[test]
fn one_large_region_among_specks() {
    let mask = ChangeMask::from_fn(80, 80, |x, y| {
        let big = (10..40).contains(&x) && (10..40).contains(&y);
        let speck = x % 20 == 5 && y == 60;
        big || speck
    });
    let detection = MotionClassifier::new(200.0).classify(&mask);
    assert!(detection.motion_detected);
    assert_eq!(detection.regions.len(), 1);
    assert_eq!(detection.changed_pixels, 30 * 30 + 4);
}
