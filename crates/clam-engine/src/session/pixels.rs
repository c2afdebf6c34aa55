/// A packed capture result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    /// `0x00RRGGBB`, row-major.
    pub pixels: Vec<u32>,
    /// Pixels left black because a color channel was NaN.
    pub nan_count: usize,
}

impl Screenshot {
    /// Packs `width * height` RGBA texels. Texels beyond the input stay black.
    pub fn pack(width: u32, height: u32, texels: &[[f32; 4]]) -> Self {
        let len = width as usize * height as usize;
        let mut pixels = vec![0u32; len];
        let mut nan_count = 0;
        for (dst, texel) in pixels.iter_mut().zip(texels) {
            match pack_pixel(*texel) {
                Some(rgb) => *dst = rgb,
                None => nan_count += 1,
            }
        }
        Self {
            width,
            height,
            pixels,
            nan_count,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    /// Interleaved 8-bit RGB, row-major.
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|&p| [(p >> 16) as u8, (p >> 8) as u8, p as u8])
            .collect()
    }
}

/// `0x00RRGGBB` for a texel, or `None` if red, green or blue is NaN.
///
/// Channels are scaled by 255 and truncated; values outside `[0, 1]`
/// saturate.
pub fn pack_pixel(texel: [f32; 4]) -> Option<u32> {
    let [r, g, b, _] = texel;
    if r.is_nan() || g.is_nan() || b.is_nan() {
        return None;
    }
    let channel = |v: f32| u32::from((v * 255.0) as u8);
    Some(channel(r) << 16 | channel(g) << 8 | channel(b))
}
