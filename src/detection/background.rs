//! Adaptive per-pixel Gaussian mixture background model
//!
//! Each pixel keeps up to `mixtures` weighted RGB Gaussians with a shared
//! isotropic variance. Components are kept sorted by weight; the heaviest
//! components whose cumulative weight stays under `background_ratio` make
//! up the background. Every call to [`BackgroundModel::apply`] both scores
//! the frame and updates the model, so the model only evolves through that
//! one entry point.

use image::{GrayImage, Luma, RgbImage};

/// Score for a pixel that does not match the background
pub const SCORE_FOREGROUND: u8 = 255;
/// Score for a pixel that looks like a darkened background pixel
pub const SCORE_SHADOW: u8 = 127;
/// Score for a pixel explained by the background
pub const SCORE_BACKGROUND: u8 = 0;

/// Tuning parameters for the background model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundParams {
    /// Number of frames that make up the effective learning window
    pub history: u32,
    /// Squared distance (in variances) for a pixel to count as background
    pub var_threshold: f32,
    /// Maximum Gaussian components per pixel, clamped to `1..=255`
    pub mixtures: usize,
    /// Cumulative weight of components treated as background
    pub background_ratio: f32,
    /// Squared distance (in variances) for a pixel to update an existing component
    pub var_threshold_gen: f32,
    /// Variance assigned to a new component
    pub var_init: f32,
    pub var_min: f32,
    pub var_max: f32,
    /// Weight decay applied to every component on every update
    pub complexity_reduction: f32,
    pub detect_shadows: bool,
    /// Minimum brightness ratio for a darker pixel to count as shadow
    pub shadow_ratio: f32,
}

impl BackgroundParams {
    pub fn new(history: u32, var_threshold: f32) -> Self {
        Self {
            history,
            var_threshold,
            ..Self::default()
        }
    }
}

impl Default for BackgroundParams {
    fn default() -> Self {
        Self {
            history: 100,
            var_threshold: 15.0,
            mixtures: 5,
            background_ratio: 0.9,
            var_threshold_gen: 9.0,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 75.0,
            complexity_reduction: 0.05,
            detect_shadows: true,
            shadow_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Component {
    weight: f32,
    mean: [f32; 3],
    variance: f32,
}

/// Stateful background model, sized lazily from the first frame
pub struct BackgroundModel {
    params: BackgroundParams,
    width: u32,
    height: u32,
    frames_seen: u64,
    components: Vec<Component>,
    active: Vec<u8>,
}

impl BackgroundModel {
    pub fn new(mut params: BackgroundParams) -> Self {
        params.mixtures = params.mixtures.clamp(1, u8::MAX as usize);
        Self {
            params,
            width: 0,
            height: 0,
            frames_seen: 0,
            components: Vec::new(),
            active: Vec::new(),
        }
    }

    pub fn params(&self) -> &BackgroundParams {
        &self.params
    }

    /// Number of frames the model has learned from since its last (re)size
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Score `image` against the model, then fold it into the model
    ///
    /// A frame with different dimensions from the previous one resets the
    /// model to the new size.
    pub fn apply(&mut self, image: &RgbImage) -> GrayImage {
        let (width, height) = image.dimensions();
        if width != self.width || height != self.height {
            self.reset(width, height);
        }

        self.frames_seen += 1;
        let alpha = self.learning_rate();
        let mixtures = self.params.mixtures;

        let mut scores = GrayImage::new(width, height);
        for (x, y, pixel) in image.enumerate_pixels() {
            let index = (y * width + x) as usize;
            let sample = [pixel[0] as f32, pixel[1] as f32, pixel[2] as f32];
            let modes = &mut self.components[index * mixtures..(index + 1) * mixtures];
            let score = update_pixel(modes, &mut self.active[index], sample, &self.params, alpha);
            scores.put_pixel(x, y, Luma([score]));
        }

        scores
    }

    fn learning_rate(&self) -> f32 {
        let window = (2 * self.frames_seen).min(self.params.history.max(1) as u64);
        1.0 / window.max(1) as f32
    }

    fn reset(&mut self, width: u32, height: u32) {
        log::debug!("Background model sized to {}x{}", width, height);
        let pixels = width as usize * height as usize;
        self.width = width;
        self.height = height;
        self.frames_seen = 0;
        self.components = vec![Component::default(); pixels * self.params.mixtures];
        self.active = vec![0; pixels];
    }
}

fn update_pixel(
    modes: &mut [Component],
    active: &mut u8,
    sample: [f32; 3],
    params: &BackgroundParams,
    alpha: f32,
) -> u8 {
    let decay = 1.0 - alpha;
    let prune = -alpha * params.complexity_reduction;

    let mut count = *active as usize;
    let mut fits = false;
    let mut background = false;
    let mut cumulative = 0.0f32;

    for mode in modes.iter_mut().take(count) {
        let mut weight = decay * mode.weight + prune;

        if !fits {
            let diff = [
                mode.mean[0] - sample[0],
                mode.mean[1] - sample[1],
                mode.mean[2] - sample[2],
            ];
            let dist2 = diff[0] * diff[0] + diff[1] * diff[1] + diff[2] * diff[2];

            if cumulative < params.background_ratio && dist2 < params.var_threshold * mode.variance {
                background = true;
            }

            if dist2 < params.var_threshold_gen * mode.variance {
                fits = true;
                weight += alpha;
                let k = alpha / weight;
                for c in 0..3 {
                    mode.mean[c] -= k * diff[c];
                }
                let variance = mode.variance + k * (dist2 - mode.variance);
                mode.variance = variance.clamp(params.var_min, params.var_max);
            }
        }

        mode.weight = weight;
        cumulative += weight;
    }

    // Drop components whose weight decayed below the pruning floor
    let mut kept = 0;
    for i in 0..count {
        if modes[i].weight >= -prune {
            modes[kept] = modes[i];
            kept += 1;
        }
    }
    count = kept;

    if !fits {
        let slot = if count == modes.len() { count - 1 } else { count };
        modes[slot] = Component {
            weight: if count == 0 { 1.0 } else { alpha },
            mean: sample,
            variance: params.var_init,
        };
        count = slot + 1;
    }

    normalize_and_sort(&mut modes[..count]);
    *active = count as u8;

    if background {
        SCORE_BACKGROUND
    } else if params.detect_shadows && is_shadow(&modes[..count], sample, params) {
        SCORE_SHADOW
    } else {
        SCORE_FOREGROUND
    }
}

fn normalize_and_sort(modes: &mut [Component]) {
    let total: f32 = modes.iter().map(|m| m.weight).sum();
    if total > 0.0 {
        for mode in modes.iter_mut() {
            mode.weight /= total;
        }
    }
    // Insertion sort: the slice is tiny and almost always already ordered
    for i in 1..modes.len() {
        let mut j = i;
        while j > 0 && modes[j].weight > modes[j - 1].weight {
            modes.swap(j, j - 1);
            j -= 1;
        }
    }
}

/// A pixel is a shadow when it is a uniformly darkened copy of a background component
fn is_shadow(modes: &[Component], sample: [f32; 3], params: &BackgroundParams) -> bool {
    let mut cumulative = 0.0f32;
    for mode in modes {
        let numerator: f32 = (0..3).map(|c| sample[c] * mode.mean[c]).sum();
        let denominator: f32 = (0..3).map(|c| mode.mean[c] * mode.mean[c]).sum();
        if denominator == 0.0 {
            return false;
        }

        if numerator <= denominator && numerator >= params.shadow_ratio * denominator {
            let a = numerator / denominator;
            let dist2: f32 = (0..3)
                .map(|c| {
                    let d = a * mode.mean[c] - sample[c];
                    d * d
                })
                .sum();
            if dist2 < params.var_threshold * mode.variance * a * a {
                return true;
            }
        }

        cumulative += mode.weight;
        if cumulative > params.background_ratio {
            return false;
        }
    }
    false
}
