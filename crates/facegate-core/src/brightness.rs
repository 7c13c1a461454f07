//! Brightness normalization for cropped face images.
//!
//! Very dark or very bright crops produce unstable embeddings, so extreme
//! exposures are pulled toward the middle before the fixed-size resize.

use image::RgbImage;

/// Luminance thresholds and scale factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrightnessPolicy {
    /// Mean luminance below this is brightened.
    pub dark_below: f32,
    /// Mean luminance above this is darkened.
    pub bright_above: f32,
    pub brighten_factor: f32,
    pub darken_factor: f32,
}

impl Default for BrightnessPolicy {
    fn default() -> Self {
        Self {
            dark_below: 80.0,
            bright_above: 180.0,
            brighten_factor: 1.3,
            darken_factor: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrightnessAdjustment {
    Brightened,
    Darkened,
    Unchanged,
}

/// Mean over pixels of the unweighted channel average (0.0–255.0).
///
/// Each pixel's average is truncated to an integer before the mean is taken.
pub fn mean_luminance(image: &RgbImage) -> f32 {
    let pixels = image.width() as u64 * image.height() as u64;
    if pixels == 0 {
        return 0.0;
    }
    let total: u64 = image
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            (r as u64 + g as u64 + b as u64) / 3
        })
        .sum();
    total as f32 / pixels as f32
}

impl BrightnessPolicy {
    /// Which adjustment an image with this mean luminance receives.
    pub fn classify(&self, mean: f32) -> BrightnessAdjustment {
        if mean < self.dark_below {
            BrightnessAdjustment::Brightened
        } else if mean > self.bright_above {
            BrightnessAdjustment::Darkened
        } else {
            BrightnessAdjustment::Unchanged
        }
    }

    /// Return a luminance-corrected copy of `image`.
    ///
    /// Scaling is uniform across R, G and B and saturates at 255.
    pub fn normalize(&self, image: &RgbImage) -> (RgbImage, BrightnessAdjustment) {
        let mean = mean_luminance(image);
        let adjustment = if image.width() == 0 || image.height() == 0 {
            BrightnessAdjustment::Unchanged
        } else {
            self.classify(mean)
        };

        let factor = match adjustment {
            BrightnessAdjustment::Brightened => self.brighten_factor,
            BrightnessAdjustment::Darkened => self.darken_factor,
            BrightnessAdjustment::Unchanged => return (image.clone(), adjustment),
        };

        tracing::trace!(mean, factor, "adjusting face brightness");

        let mut out = image.clone();
        for channel in out.iter_mut() {
            *channel = (*channel as f32 * factor).round().clamp(0.0, 255.0) as u8;
        }
        (out, adjustment)
    }
}

/// [`BrightnessPolicy::normalize`] with the default policy.
pub fn normalize_brightness(image: &RgbImage) -> RgbImage {
    BrightnessPolicy::default().normalize(image).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(w: u32, h: u32, px: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb(px))
    }

    #[test]
    fn test_mean_luminance_unweighted() {
        let img = solid(4, 4, [30, 60, 90]);
        assert!((mean_luminance(&img) - 60.0).abs() < 1e-4);
    }

    #[test]
    fn test_mean_luminance_truncates_per_pixel() {
        // 542 / 3 truncates to 180, which is not above the darken threshold.
        let img = solid(4, 4, [180, 180, 182]);
        assert_eq!(mean_luminance(&img), 180.0);
        let (out, adj) = BrightnessPolicy::default().normalize(&img);
        assert_eq!(adj, BrightnessAdjustment::Unchanged);
        assert_eq!(out, img);

        let mut mixed = solid(2, 1, [10, 10, 11]);
        mixed.put_pixel(1, 0, Rgb([0, 0, 2]));
        assert_eq!(mean_luminance(&mixed), 5.0);
    }

    #[test]
    fn test_mean_luminance_empty() {
        assert_eq!(mean_luminance(&RgbImage::new(0, 0)), 0.0);
    }

    #[test]
    fn test_dark_image_brightened() {
        let img = solid(8, 8, [50, 50, 50]);
        let (out, adj) = BrightnessPolicy::default().normalize(&img);
        assert_eq!(adj, BrightnessAdjustment::Brightened);
        assert_eq!(out.get_pixel(0, 0).0, [65, 65, 65]);
    }

    #[test]
    fn test_bright_image_darkened() {
        let img = solid(8, 8, [200, 210, 220]);
        let (out, adj) = BrightnessPolicy::default().normalize(&img);
        assert_eq!(adj, BrightnessAdjustment::Darkened);
        assert_eq!(out.get_pixel(3, 3).0, [160, 168, 176]);
    }

    #[test]
    fn test_mid_image_unchanged() {
        let img = solid(8, 8, [80, 120, 180]);
        let (out, adj) = BrightnessPolicy::default().normalize(&img);
        assert_eq!(adj, BrightnessAdjustment::Unchanged);
        assert_eq!(out, img);
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        let policy = BrightnessPolicy::default();
        assert_eq!(policy.classify(80.0), BrightnessAdjustment::Unchanged);
        assert_eq!(policy.classify(180.0), BrightnessAdjustment::Unchanged);
        assert_eq!(policy.classify(79.9), BrightnessAdjustment::Brightened);
        assert_eq!(policy.classify(180.1), BrightnessAdjustment::Darkened);
    }

    #[test]
    fn test_brighten_saturates() {
        // Mean is ~71 so the image is brightened; the 250 channel must clamp.
        let mut img = solid(2, 1, [0, 0, 0]);
        img.put_pixel(1, 0, Rgb([250, 100, 80]));
        let (out, adj) = BrightnessPolicy::default().normalize(&img);
        assert_eq!(adj, BrightnessAdjustment::Brightened);
        assert_eq!(out.get_pixel(1, 0).0, [255, 130, 104]);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0]);
    }
}
