/*
 *  canvas.rs
 *
 *  KioskClock - tides, weather & time
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::prelude::*;

/// A runtime-sized RGB canvas for embedded-graphics primitives and raster blits.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    buf: Vec<Rgb888>,
    w: usize,
    h: usize,
}

impl Canvas {
    pub fn new(width: u32, height: u32, fill: Rgb888) -> Self {
        let (w, h) = (width as usize, height as usize);
        Self { buf: vec![fill; w * h], w, h }
    }

    pub fn width(&self) -> usize { self.w }
    pub fn height(&self) -> usize { self.h }

    pub fn as_slice(&self) -> &[Rgb888] { &self.buf }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb888> {
        (x < self.w && y < self.h).then(|| self.buf[y * self.w + x])
    }

    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        if p.x >= 0 && p.y >= 0 {
            let (x, y) = (p.x as usize, p.y as usize);
            if x < self.w && y < self.h {
                return Some(y * self.w + x);
            }
        }
        None
    }

    /// Alpha-blend a pixel over whatever is already there.
    pub fn blend(&mut self, p: Point, c: Rgb888, alpha: u8) {
        if let Some(i) = self.idx(p) {
            let under = self.buf[i];
            let a = alpha as u16;
            let mix = |top: u8, bot: u8| ((top as u16 * a + bot as u16 * (255 - a)) / 255) as u8;
            self.buf[i] = Rgb888::new(mix(c.r(), under.r()), mix(c.g(), under.g()), mix(c.b(), under.b()));
        }
    }

    /// Blit straight (non-premultiplied) RGBA8 rows with their top-left at `origin`.
    pub fn blit_rgba(&mut self, origin: Point, width: u32, height: u32, rgba: &[u8]) {
        let w = width as usize;
        for (n, px) in rgba.chunks_exact(4).take(w * height as usize).enumerate() {
            let p = origin + Point::new((n % w) as i32, (n / w) as i32);
            self.blend(p, Rgb888::new(px[0], px[1], px[2]), px[3]);
        }
    }

    /// Pairs of (upper, lower) pixels per character cell for half-block output.
    pub fn half_block_rows(&self) -> Vec<Vec<(Rgb888, Rgb888)>> {
        (0..self.h.div_ceil(2))
            .map(|row| {
                (0..self.w)
                    .map(|x| {
                        let top = self.buf[row * 2 * self.w + x];
                        let bottom = self.pixel(x, row * 2 + 1).unwrap_or(Rgb888::BLACK);
                        (top, bottom)
                    })
                    .collect()
            })
            .collect()
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.w as u32, self.h as u32)
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.idx(p) {
                self.buf[i] = c;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.buf.fill(color);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Triangle};

    #[test]
    fn test_draw_clips_out_of_bounds() {
        let mut c = Canvas::new(4, 4, Rgb888::BLACK);
        Pixel(Point::new(-1, 2), Rgb888::RED).draw(&mut c).unwrap();
        Pixel(Point::new(4, 0), Rgb888::RED).draw(&mut c).unwrap();
        Pixel(Point::new(1, 1), Rgb888::RED).draw(&mut c).unwrap();
        assert_eq!(c.as_slice().iter().filter(|&&p| p == Rgb888::RED).count(), 1);
        assert_eq!(c.pixel(1, 1), Some(Rgb888::RED));
    }

    #[test]
    fn test_triangle_fill() {
        let mut c = Canvas::new(10, 10, Rgb888::BLACK);
        Triangle::new(Point::new(0, 0), Point::new(9, 0), Point::new(0, 9))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::GREEN))
            .draw(&mut c)
            .unwrap();
        assert_eq!(c.pixel(1, 1), Some(Rgb888::GREEN));
        assert_eq!(c.pixel(9, 9), Some(Rgb888::BLACK));
    }

    #[test]
    fn test_blend_and_blit() {
        let mut c = Canvas::new(2, 1, Rgb888::new(0, 0, 0));
        c.blit_rgba(Point::zero(), 2, 1, &[255, 255, 255, 255, 200, 0, 0, 0]);
        assert_eq!(c.pixel(0, 0), Some(Rgb888::WHITE));
        assert_eq!(c.pixel(1, 0), Some(Rgb888::BLACK));
        c.blend(Point::new(1, 0), Rgb888::new(254, 0, 0), 128);
        assert_eq!(c.pixel(1, 0), Some(Rgb888::new(127, 0, 0)));
    }

    #[test]
    fn test_half_block_rows_odd_height() {
        let mut c = Canvas::new(1, 3, Rgb888::WHITE);
        c.clear(Rgb888::BLUE).unwrap();
        let rows = c.half_block_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], (Rgb888::BLUE, Rgb888::BLACK));
    }
}
