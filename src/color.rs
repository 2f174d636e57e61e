//! Byte-packed color words and the trough/base/peak gradient.
//!
//! Words are laid out `0xRRGGBBAA`. Shaders receive the packed words; the
//! generators work with [`Color`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Color { r, g, b, a: 1.0 }
    }

    pub fn to_rgb(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    /// Component-wise `self + (other - self) * t`.
    pub fn lerp(self, other: Color, t: f32) -> Color {
        Color {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }
}

/// Extracts one 8-bit lane, `0` being the most significant byte.
pub fn lane(word: u32, index: u32) -> u8 {
    (word >> (24 - 8 * index)) as u8
}

pub fn word_to_color(word: u32) -> Color {
    let channel = |i| lane(word, i) as f32 / 255.0;
    Color {
        r: channel(0),
        g: channel(1),
        b: channel(2),
        a: channel(3),
    }
}

pub fn color_to_word(color: Color) -> u32 {
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
    (channel(color.r) << 24) | (channel(color.g) << 16) | (channel(color.b) << 8) | channel(color.a)
}

/// Which stop of the gradient a word is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveColorSlot {
    Peak,
    Base,
    Trough,
}

/// The three stops used to tint wave vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveColors {
    pub peak: u32,
    pub base: u32,
    pub trough: u32,
}

impl Default for WaveColors {
    fn default() -> Self {
        WaveColors {
            peak: 0xFF00_FFFF,
            base: 0x0000_FFFF,
            trough: 0x00FF_FFFF,
        }
    }
}

impl WaveColors {
    /// Gradient for orbital clouds: dense regions run toward warm yellow,
    /// sparse ones toward deep blue.
    pub const fn cloud() -> Self {
        WaveColors {
            peak: 0xFFE0_60FF,
            base: 0x6040_FFFF,
            trough: 0x1020_80FF,
        }
    }

    pub fn set(&mut self, slot: WaveColorSlot, word: u32) {
        match slot {
            WaveColorSlot::Peak => self.peak = word,
            WaveColorSlot::Base => self.base = word,
            WaveColorSlot::Trough => self.trough = word,
        }
    }

    pub fn get(&self, slot: WaveColorSlot) -> u32 {
        match slot {
            WaveColorSlot::Peak => self.peak,
            WaveColorSlot::Base => self.base,
            WaveColorSlot::Trough => self.trough,
        }
    }

    /// Maps a wave value in [-1, 1] onto the gradient.
    ///
    /// Non-negative values blend base toward peak by `|psi|`, negative values
    /// base toward trough. Alpha is carried through unchanged from base.
    pub fn blend(&self, psi: f32) -> Color {
        let base = word_to_color(self.base);
        let target = if psi >= 0.0 {
            word_to_color(self.peak)
        } else {
            word_to_color(self.trough)
        };
        let mut color = base.lerp(target, psi.abs().min(1.0));
        color.a = base.a;
        color
    }

    pub fn as_words(&self) -> [u32; 3] {
        [self.peak, self.base, self.trough]
    }
}
