//! Region box overlay for recorded and previewed frames

use crate::types::{Frame, MotionRegion};

pub const BOX_COLOR: [u8; 3] = [0, 255, 0];
pub const BOX_THICKNESS: u32 = 2;

/// Draw an outline around every region, clipped to the frame
pub fn draw_regions(frame: &mut Frame, regions: &[MotionRegion]) {
    for region in regions {
        let b = region.bounds;
        if b.width == 0 || b.height == 0 {
            continue;
        }
        let right = b.x + b.width - 1;
        let bottom = b.y + b.height - 1;
        for t in 0..BOX_THICKNESS {
            for x in b.x..=right {
                put(frame, x, b.y + t);
                put(frame, x, bottom.saturating_sub(t));
            }
            for y in b.y..=bottom {
                put(frame, b.x + t, y);
                put(frame, right.saturating_sub(t), y);
            }
        }
    }
}

fn put(frame: &mut Frame, x: u32, y: u32) {
    if x >= frame.width || y >= frame.height {
        return;
    }
    let idx = ((y * frame.width + x) * 3) as usize;
    if let Some(px) = frame.data.get_mut(idx..idx + 3) {
        px.copy_from_slice(&BOX_COLOR);
    }
}
