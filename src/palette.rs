use plotters::style::RGBColor;

const QUALITATIVE: [RGBColor; 10] = [
    RGBColor(0x63, 0x6E, 0xFA),
    RGBColor(0xEF, 0x55, 0x3B),
    RGBColor(0x00, 0xCC, 0x96),
    RGBColor(0xAB, 0x63, 0xFA),
    RGBColor(0xFF, 0xA1, 0x5A),
    RGBColor(0x19, 0xD3, 0xF3),
    RGBColor(0xFF, 0x66, 0x92),
    RGBColor(0xB6, 0xE8, 0x80),
    RGBColor(0xFF, 0x97, 0xFF),
    RGBColor(0xFE, 0xCB, 0x52),
];

/// Hands out colours in order, wrapping around after the last one
#[derive(Debug, Clone, Default)]
pub struct ColorPalette {
    next: usize,
}

impl ColorPalette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color_at(index: usize) -> RGBColor {
        QUALITATIVE[index % QUALITATIVE.len()]
    }

    pub fn next_color(&mut self) -> RGBColor {
        let color = Self::color_at(self.next);
        self.next += 1;
        color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_cycles() {
        let mut palette = ColorPalette::new();
        let first = palette.next_color();
        for _ in 1..QUALITATIVE.len() {
            palette.next_color();
        }
        assert_eq!(palette.next_color(), first);
    }

    #[test]
    fn test_color_at_is_stable() {
        assert_eq!(ColorPalette::color_at(1), RGBColor(0xEF, 0x55, 0x3B));
        assert_eq!(ColorPalette::color_at(11), ColorPalette::color_at(1));
    }
}
