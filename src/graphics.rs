use crate::math::edge_function;
use crate::vertex::ScreenPoint;

/// 24-bit color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    /// Blends toward `other` by `t` in [0, 1]
    pub fn mix(self, other: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let channel = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb(channel(self.0, other.0), channel(self.1, other.1), channel(self.2, other.2))
    }
}

/// Something draw instructions can be executed against
pub trait Surface {
    /// Surface size in pixels
    fn size(&self) -> (usize, usize);
    /// Fills the whole surface
    fn clear(&mut self, color: Rgb);
    /// Draws a one pixel wide line
    fn draw_line(&mut self, from: &ScreenPoint, to: &ScreenPoint, color: Rgb);
    /// Fills a convex or star-shaped polygon
    fn fill_polygon(&mut self, points: &[ScreenPoint], color: Rgb);
}

/// Off-screen RGB pixel buffer
#[derive(Debug, Clone)]
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Canvas {
            width,
            height,
            pixels: vec![Rgb::BLACK; width * height],
        }
    }

    /// Reallocates the buffer if the size changed
    pub fn resize(&mut self, width: usize, height: usize) {
        if width != self.width || height != self.height {
            self.width = width;
            self.height = height;
            self.pixels = vec![Rgb::BLACK; width * height];
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixel at (x, y), or `None` outside the buffer
    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    fn put(&mut self, x: isize, y: isize, color: Rgb) {
        if x >= 0 && x < self.width as isize && y >= 0 && y < self.height as isize {
            self.pixels[y as usize * self.width + x as usize] = color;
        }
    }

    /// Fills a triangle of either winding using edge functions
    fn fill_triangle(&mut self, v0: [f64; 2], v1: [f64; 2], v2: [f64; 2], color: Rgb) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let area = edge_function(&v0, &v1, &v2);
        if area.abs() < f64::EPSILON {
            return;
        }

        // Compute bounding box of the triangle, clipped to the canvas
        let min_x = v0[0].min(v1[0]).min(v2[0]).floor().max(0.0);
        let max_x = v0[0].max(v1[0]).max(v2[0]).ceil().min(self.width as f64 - 1.0);
        let min_y = v0[1].min(v1[1]).min(v2[1]).floor().max(0.0);
        let max_y = v0[1].max(v1[1]).max(v2[1]).ceil().min(self.height as f64 - 1.0);
        if min_x > max_x || min_y > max_y {
            return;
        }

        for y in min_y as usize..=max_y as usize {
            for x in min_x as usize..=max_x as usize {
                let p = [x as f64 + 0.5, y as f64 + 0.5];
                let w0 = edge_function(&v1, &v2, &p) / area;
                let w1 = edge_function(&v2, &v0, &p) / area;
                let w2 = edge_function(&v0, &v1, &p) / area;
                if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                    self.pixels[y * self.width + x] = color;
                }
            }
        }
    }
}

impl Surface for Canvas {
    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Rgb) {
        self.pixels.fill(color);
    }

    /// Bresenham's algorithm, clipped per pixel
    fn draw_line(&mut self, from: &ScreenPoint, to: &ScreenPoint, color: Rgb) {
        // Keep far off-screen endpoints from walking millions of pixels
        let limit = (self.width + self.height) as f64 * 4.0;
        let clamp = |v: f64| v.clamp(-limit, limit);
        let (mut x0, mut y0, x1, y1) = (
            clamp(from.x).round() as isize,
            clamp(from.y).round() as isize,
            clamp(to.x).round() as isize,
            clamp(to.y).round() as isize,
        );
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.put(x0, y0, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    fn fill_polygon(&mut self, points: &[ScreenPoint], color: Rgb) {
        match points {
            [] => {}
            [p] => self.put(p.x.round() as isize, p.y.round() as isize, color),
            [a, b] => self.draw_line(a, b, color),
            [first, rest @ ..] => {
                for pair in rest.windows(2) {
                    self.fill_triangle(first.position(), pair[0].position(), pair[1].position(), color);
                }
            }
        }
    }
}
