use image::{Rgb, RgbImage, imageops::FilterType};

use crate::app::gradcam::Heatmap;

// matplotlib "jet" segment data: (x, y) breakpoints per channel.
const JET_RED: &[(f32, f32)] = &[(0.0, 0.0), (0.35, 0.0), (0.66, 1.0), (0.89, 1.0), (1.0, 0.5)];
const JET_GREEN: &[(f32, f32)] = &[
    (0.0, 0.0),
    (0.125, 0.0),
    (0.375, 1.0),
    (0.64, 1.0),
    (0.91, 0.0),
    (1.0, 0.0),
];
const JET_BLUE: &[(f32, f32)] = &[(0.0, 0.5), (0.11, 1.0), (0.34, 1.0), (0.65, 0.0), (1.0, 0.0)];

fn interpolate(segments: &[(f32, f32)], t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    for pair in segments.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if t <= x1 {
            return y0 + (y1 - y0) * (t - x0) / (x1 - x0);
        }
    }
    segments.last().map(|&(_, y)| y).unwrap_or_default()
}

/// Jet colour at `t` in `[0, 1]`, each channel in `[0, 1]`.
pub fn jet(t: f32) -> [f32; 3] {
    [
        interpolate(JET_RED, t),
        interpolate(JET_GREEN, t),
        interpolate(JET_BLUE, t),
    ]
}

/// 256-entry lookup table, as the heat map is quantized to bytes first.
pub fn jet_lut() -> [Rgb<u8>; 256] {
    let mut lut = [Rgb([0, 0, 0]); 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        let [r, g, b] = jet(i as f32 / 255.0);
        *entry = Rgb([to_byte(r), to_byte(g), to_byte(b)]);
    }
    lut
}

fn to_byte(v: f32) -> u8 {
    (v * 255.0) as u8
}

/// RGB rendering of the heat map at its own resolution.
pub fn colorize(heatmap: &Heatmap) -> RgbImage {
    let lut = jet_lut();
    RgbImage::from_fn(heatmap.width, heatmap.height, |x, y| {
        let level = (255.0 * heatmap.get(x, y).clamp(0.0, 1.0)) as u8;
        lut[level as usize]
    })
}

/// Upsamples the coloured heat map to `base` and blends it in with weight `alpha`.
pub fn superimpose(base: &RgbImage, heatmap: &Heatmap, alpha: f32) -> RgbImage {
    let (width, height) = base.dimensions();
    let colored = image::imageops::resize(&colorize(heatmap), width, height, FilterType::CatmullRom);
    blend(base, &colored, alpha)
}

/// `a * (1 - alpha) + b * alpha`; both images must share dimensions.
pub fn blend(a: &RgbImage, b: &RgbImage, alpha: f32) -> RgbImage {
    RgbImage::from_fn(a.width(), a.height(), |x, y| {
        let pa = a.get_pixel(x, y);
        let pb = b.get_pixel(x, y);
        let mix = |c: usize| {
            let v = pa[c] as f32 * (1.0 - alpha) + pb[c] as f32 * alpha;
            v.round().clamp(0.0, 255.0) as u8
        };
        Rgb([mix(0), mix(1), mix(2)])
    })
}
