//! Palette reduction for RGB images.
//!
//! Three strategies, cheapest first:
//! - the image already has few enough colors → use them exactly
//! - tiny images → most frequent colors, nearest-match the rest
//! - otherwise → NeuQuant (`color_quant`)

use color_quant::NeuQuant;
use std::collections::HashMap;

/// NeuQuant sampling factor: 1 is slowest and best, 30 fastest.
const SAMPLE_FACTOR: i32 = 10;

/// Below this many pixels the neural net has too little to learn from.
const NEUQUANT_MIN_PIXELS: usize = 100;

/// A palette (packed RGB triples) and one palette index per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantized {
    pub palette: Vec<u8>,
    pub indices: Vec<u8>,
}

/// Reduce interleaved RGB `pixels` to at most `colors` (2..=256) colors.
pub fn quantize_rgb(pixels: &[u8], colors: usize) -> Quantized {
    let colors = colors.clamp(2, 256);
    let mut counts: HashMap<[u8; 3], usize> = HashMap::new();
    for p in pixels.chunks_exact(3) {
        *counts.entry([p[0], p[1], p[2]]).or_default() += 1;
    }

    let pixel_count = pixels.len() / 3;
    if counts.len() <= colors || pixel_count < NEUQUANT_MIN_PIXELS {
        let mut by_frequency: Vec<([u8; 3], usize)> = counts.into_iter().collect();
        // Most frequent first; ties broken by color so output is stable
        by_frequency.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        by_frequency.truncate(colors);
        let palette: Vec<[u8; 3]> = by_frequency.into_iter().map(|(c, _)| c).collect();
        return map_to_palette(pixels, &palette);
    }

    let rgba: Vec<u8> = pixels
        .chunks_exact(3)
        .flat_map(|p| [p[0], p[1], p[2], 255])
        .collect();
    let net = NeuQuant::new(SAMPLE_FACTOR, colors, &rgba);
    let indices = rgba.chunks_exact(4).map(|p| net.index_of(p) as u8).collect();
    Quantized {
        palette: net.color_map_rgb(),
        indices,
    }
}

fn map_to_palette(pixels: &[u8], palette: &[[u8; 3]]) -> Quantized {
    let mut cache: HashMap<[u8; 3], u8> = HashMap::new();
    let indices = pixels
        .chunks_exact(3)
        .map(|p| {
            let color = [p[0], p[1], p[2]];
            *cache
                .entry(color)
                .or_insert_with(|| nearest(palette, color))
        })
        .collect();
    Quantized {
        palette: palette.iter().flatten().copied().collect(),
        indices,
    }
}

fn nearest(palette: &[[u8; 3]], color: [u8; 3]) -> u8 {
    let distance = |c: &[u8; 3]| -> i32 {
        (0..3)
            .map(|i| {
                let d = i32::from(c[i]) - i32::from(color[i]);
                d * d
            })
            .sum()
    };
    palette
        .iter()
        .enumerate()
        .min_by_key(|(_, c)| distance(c))
        .map_or(0, |(i, _)| i as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn few_colors_are_kept_exactly() {
        let pixels = [255, 0, 0, 0, 255, 0, 255, 0, 0, 0, 0, 255];
        let q = quantize_rgb(&pixels, 4);
        assert_eq!(q.palette.len(), 9);
        assert_eq!(q.indices.len(), 4);
        assert_eq!(q.indices[0], q.indices[2]);
        // Most frequent color first
        assert_eq!(&q.palette[0..3], &[255, 0, 0]);
    }

    #[test]
    fn tiny_image_maps_to_nearest() {
        // 3 colors into 2: the two dark ones share an entry
        let pixels = [0, 0, 0, 0, 0, 0, 10, 10, 10, 250, 250, 250, 250, 250, 250];
        let q = quantize_rgb(&pixels, 2);
        assert_eq!(q.palette.len(), 6);
        assert_eq!(q.indices[2], q.indices[0]);
        assert_ne!(q.indices[3], q.indices[0]);
    }

    #[test]
    fn large_image_uses_at_most_requested_colors() {
        let pixels: Vec<u8> = (0..64 * 64)
            .flat_map(|i| [(i % 256) as u8, (i / 16) as u8, (i * 7 % 256) as u8])
            .collect();
        let q = quantize_rgb(&pixels, 16);
        assert!(q.palette.len() <= 16 * 3);
        assert_eq!(q.indices.len(), 64 * 64);
        assert!(q.indices.iter().all(|&i| (i as usize) < q.palette.len() / 3));
    }
}
