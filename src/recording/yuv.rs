//! RGB24 <-> planar YUV 4:2:0 conversion (BT.601, limited range)
//!
//! Chroma planes are `ceil(w / 2) x ceil(h / 2)`; each chroma sample is the
//! average of the (up to four) pixels it covers.

/// Byte length of a 4:2:0 frame for the given dimensions
pub fn yuv420_len(width: u32, height: u32) -> usize {
    let w = width as usize;
    let h = height as usize;
    let cw = w.div_ceil(2);
    let ch = h.div_ceil(2);
    w * h + 2 * cw * ch
}

pub fn rgb_to_yuv420(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let cw = w.div_ceil(2);
    let ch = h.div_ceil(2);

    let mut yuv = vec![0u8; yuv420_len(width, height)];
    let (y_plane, chroma) = yuv.split_at_mut(w * h);
    let (u_plane, v_plane) = chroma.split_at_mut(cw * ch);

    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) * 3;
            let (r, g, b) = (rgb[i] as i32, rgb[i + 1] as i32, rgb[i + 2] as i32);
            let luma = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
            y_plane[y * w + x] = luma.clamp(0, 255) as u8;
        }
    }

    for cy in 0..ch {
        for cx in 0..cw {
            let (mut r, mut g, mut b, mut n) = (0i32, 0i32, 0i32, 0i32);
            for y in (cy * 2)..((cy * 2 + 2).min(h)) {
                for x in (cx * 2)..((cx * 2 + 2).min(w)) {
                    let i = (y * w + x) * 3;
                    r += rgb[i] as i32;
                    g += rgb[i + 1] as i32;
                    b += rgb[i + 2] as i32;
                    n += 1;
                }
            }
            let (r, g, b) = (r / n, g / n, b / n);
            let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
            let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
            u_plane[cy * cw + cx] = u.clamp(0, 255) as u8;
            v_plane[cy * cw + cx] = v.clamp(0, 255) as u8;
        }
    }

    yuv
}

pub fn yuv420_to_rgb(yuv: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let cw = w.div_ceil(2);
    let ch = h.div_ceil(2);
    let (y_plane, chroma) = yuv.split_at(w * h);
    let (u_plane, v_plane) = chroma.split_at(cw * ch);

    let mut rgb = vec![0u8; w * h * 3];
    for y in 0..h {
        for x in 0..w {
            let c = (y / 2) * cw + (x / 2);
            let luma = y_plane[y * w + x] as i32 - 16;
            let u = u_plane[c] as i32 - 128;
            let v = v_plane[c] as i32 - 128;

            let r = (298 * luma + 409 * v + 128) >> 8;
            let g = (298 * luma - 100 * u - 208 * v + 128) >> 8;
            let b = (298 * luma + 516 * u + 128) >> 8;

            let i = (y * w + x) * 3;
            rgb[i] = r.clamp(0, 255) as u8;
            rgb[i + 1] = g.clamp(0, 255) as u8;
            rgb[i + 2] = b.clamp(0, 255) as u8;
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuv420_size() {
        assert_eq!(yuv420_len(640, 480), 640 * 480 * 3 / 2);
        // Odd dimensions round the chroma planes up
        assert_eq!(yuv420_len(3, 3), 9 + 2 * 4);
        assert_eq!(rgb_to_yuv420(&[0u8; 27], 3, 3).len(), 17);
    }

    #[test]
    fn test_gray_converts_to_neutral_chroma() {
        let rgb = vec![128u8; 4 * 4 * 3];
        let yuv = rgb_to_yuv420(&rgb, 4, 4);
        assert!(yuv[16..].iter().all(|&c| c == 128));
    }

    #[test]
    fn test_conversion_is_close_to_lossless_for_flat_color() {
        let rgb: Vec<u8> = [200u8, 40, 90].repeat(8 * 6);
        let back = yuv420_to_rgb(&rgb_to_yuv420(&rgb, 8, 6), 8, 6);
        for (a, b) in rgb.iter().zip(back.iter()) {
            assert!((*a as i32 - *b as i32).abs() <= 3, "{} vs {}", a, b);
        }
    }
}
