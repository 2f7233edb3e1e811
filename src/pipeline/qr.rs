//! QR resolution: photo → receipt URL.
//!
//! Decoders run one after another and the first `http` payload wins:
//!
//! 1. `rqrr` on the plain grayscale image
//! 2. `rqrr` again after a global Otsu threshold, which rescues washed-out
//!    or low-contrast photos
//! 3. `rxing` (a ZXing port) as the last resort; its finder-pattern search
//!    copes with perspective and blur that trip up `rqrr`
//!
//! Attempts are never raced. They are cheap next to the network round trip
//! and the decoders are not guaranteed to be reentrant.

use image::{DynamicImage, GrayImage, Luma};
use tracing::debug;

/// A decoder takes the grayscale photo and returns every payload it found.
type Decoder = fn(&GrayImage) -> Vec<String>;

/// Decoders in the order they are tried.
const DECODERS: &[(&str, Decoder)] = &[
    ("rqrr", decode_rqrr),
    ("rqrr+threshold", decode_rqrr_thresholded),
    ("rxing", decode_rxing),
];

/// Find the receipt URL in a photo.
///
/// Returns `None` when no decoder yields a payload starting with `http`.
/// Non-URL payloads (loyalty codes, Wi-Fi credentials…) are skipped.
pub fn resolve_url(image: &DynamicImage) -> Option<String> {
    let gray = image.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return None;
    }

    for (name, decode) in DECODERS {
        let payloads = decode(&gray);
        debug!(decoder = name, payloads = payloads.len(), "QR decode attempt");
        if let Some(url) = first_url(payloads) {
            debug!(decoder = name, url = %url, "QR resolved");
            return Some(url);
        }
    }

    None
}

/// Pick the first payload that looks like a URL.
fn first_url(payloads: Vec<String>) -> Option<String> {
    payloads
        .into_iter()
        .map(|p| p.trim().to_string())
        .find(|p| p.starts_with("http"))
}

fn decode_rqrr(gray: &GrayImage) -> Vec<String> {
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        gray.width() as usize,
        gray.height() as usize,
        |x, y| gray.get_pixel(x as u32, y as u32).0[0],
    );

    prepared
        .detect_grids()
        .into_iter()
        .filter_map(|grid| match grid.decode() {
            Ok((_meta, content)) => Some(content),
            Err(e) => {
                debug!(error = ?e, "rqrr grid failed to decode");
                None
            }
        })
        .collect()
}

fn decode_rqrr_thresholded(gray: &GrayImage) -> Vec<String> {
    decode_rqrr(&binarize(gray))
}

fn decode_rxing(gray: &GrayImage) -> Vec<String> {
    let (width, height) = gray.dimensions();
    match rxing::helpers::detect_in_luma(
        gray.as_raw().clone(),
        width,
        height,
        Some(rxing::BarcodeFormat::QR_CODE),
    ) {
        Ok(result) => vec![result.getText().to_string()],
        Err(e) => {
            debug!(error = %e, "rxing found no QR code");
            Vec::new()
        }
    }
}

/// Binary threshold at the Otsu level of the image histogram.
pub fn binarize(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    let (width, height) = gray.dimensions();
    let mut out = GrayImage::new(width, height);
    for (x, y, p) in gray.enumerate_pixels() {
        let v = if p.0[0] > level { 255 } else { 0 };
        out.put_pixel(x, y, Luma([v]));
    }
    out
}

/// The threshold that maximises between-class variance.
fn otsu_level(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for p in gray.pixels() {
        histogram[p.0[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 127;
    }
    let weighted_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(v, &n)| v as f64 * n as f64)
        .sum();

    let mut background_weight = 0u64;
    let mut background_sum = 0f64;
    let mut best_level = 127u8;
    let mut best_variance = 0f64;

    for (level, &count) in histogram.iter().enumerate() {
        background_weight += count;
        if background_weight == 0 {
            continue;
        }
        let foreground_weight = total - background_weight;
        if foreground_weight == 0 {
            break;
        }
        background_sum += level as f64 * count as f64;

        let mean_bg = background_sum / background_weight as f64;
        let mean_fg = (weighted_sum - background_sum) / foreground_weight as f64;
        let variance =
            background_weight as f64 * foreground_weight as f64 * (mean_bg - mean_fg).powi(2);

        if variance > best_variance {
            best_variance = variance;
            best_level = level as u8;
        }
    }

    best_level
}
