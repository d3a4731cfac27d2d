use crate::color::Rgb;
use crate::error::CaptureError;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Pixel layout of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 3 bytes per pixel: B, G, R
    Bgr24,
    /// 4 bytes per pixel: B, G, R, A
    Bgra32,
}

impl PixelFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Bgr24 => 3,
            PixelFormat::Bgra32 => 4,
        }
    }
}

/// Axis-aligned rectangle in screen pixels. `right()` and `bottom()` are exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanning the inclusive corners `(left, top)` and `(right, bottom)`
    pub fn from_corners(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(left, top, right - left + 1, bottom - top + 1)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn inflate(&self, margin: i32) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            self.width + margin * 2,
            self.height + margin * 2,
        )
    }

    /// Overlapping area, or an empty rectangle when there is none
    pub fn intersect(&self, other: &Rect) -> Rect {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            Rect::default()
        } else {
            Rect::new(left, top, right - left, bottom - top)
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.intersect(other).is_empty()
    }
}

/// One captured screen image.
///
/// Rows may be padded: the byte offset of pixel `(x, y)` is
/// `y * stride + x * bytes_per_pixel`.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap raw pixel bytes, checking that the buffer covers every row
    pub fn new(
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, CaptureError> {
        let row_bytes = width as usize * format.bytes_per_pixel();
        if stride < row_bytes {
            return Err(CaptureError::InvalidFrame {
                details: format!("stride {} shorter than row ({} bytes)", stride, row_bytes),
            });
        }

        let required = if height == 0 {
            0
        } else {
            stride * (height as usize - 1) + row_bytes
        };
        if data.len() < required {
            return Err(CaptureError::InvalidFrame {
                details: format!("buffer holds {} bytes, need {}", data.len(), required),
            });
        }

        Ok(Self {
            timestamp: SystemTime::now(),
            width,
            height,
            stride,
            format,
            data,
        })
    }

    /// A tightly packed frame filled with one color
    pub fn filled(width: u32, height: u32, format: PixelFormat, color: Rgb) -> Self {
        let bpp = format.bytes_per_pixel();
        let mut data = vec![0u8; width as usize * height as usize * bpp];
        for px in data.chunks_exact_mut(bpp) {
            px[0] = color.b;
            px[1] = color.g;
            px[2] = color.r;
            if bpp == 4 {
                px[3] = 255;
            }
        }

        Self {
            timestamp: SystemTime::now(),
            width,
            height,
            stride: width as usize * bpp,
            format,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Whole frame as a rectangle
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.stride + x as usize * self.format.bytes_per_pixel()
    }

    /// `(r, g, b)` at `(x, y)`. Callers keep coordinates inside the frame.
    #[inline]
    pub fn rgb(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let i = self.offset(x, y);
        let px = &self.data[i..i + 3];
        (px[2], px[1], px[0])
    }

    /// Paint a rectangle, clipped to the frame
    pub fn fill_rect(&mut self, rect: Rect, color: Rgb) {
        let area = rect.intersect(&self.bounds());
        if area.is_empty() {
            return;
        }

        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                let i = self.offset(x as u32, y as u32);
                self.data[i] = color.b;
                self.data[i + 1] = color.g;
                self.data[i + 2] = color.r;
            }
        }
    }

    /// Copy a region into an RGB image for OCR. Returns `None` when the region
    /// does not overlap the frame.
    pub fn crop_rgb(&self, rect: Rect) -> Option<RgbImage> {
        let area = rect.intersect(&self.bounds());
        if area.is_empty() {
            return None;
        }

        let mut out = RgbImage::new(area.width as u32, area.height as u32);
        for (dy, y) in (area.y..area.bottom()).enumerate() {
            for (dx, x) in (area.x..area.right()).enumerate() {
                let (r, g, b) = self.rgb(x as u32, y as u32);
                out.put_pixel(dx as u32, dy as u32, image::Rgb([r, g, b]));
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_properties() {
        assert_eq!(PixelFormat::Bgr24.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Bgra32.bytes_per_pixel(), 4);
    }

    #[test]
    fn test_rect_geometry() {
        let a = Rect::new(10, 10, 20, 10);
        assert_eq!(a.right(), 30);
        assert_eq!(a.bottom(), 20);
        assert_eq!(a.inflate(5), Rect::new(5, 5, 30, 20));
        assert_eq!(Rect::from_corners(10, 10, 29, 19), a);

        let b = Rect::new(25, 15, 10, 10);
        assert_eq!(a.intersect(&b), Rect::new(25, 15, 5, 5));
        assert!(a.intersects(&b));

        let c = Rect::new(30, 10, 5, 5);
        assert!(a.intersect(&c).is_empty());
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_frame_size_validation() {
        assert!(Frame::new(4, 2, 16, PixelFormat::Bgra32, vec![0; 32]).is_ok());
        // Padded rows: last row need not include padding
        assert!(Frame::new(3, 2, 12, PixelFormat::Bgr24, vec![0; 21]).is_ok());

        assert!(Frame::new(4, 2, 8, PixelFormat::Bgra32, vec![0; 32]).is_err());
        assert!(Frame::new(4, 2, 16, PixelFormat::Bgra32, vec![0; 20]).is_err());
    }

    #[test]
    fn test_stride_aware_pixel_access() {
        // 2x2 BGR frame with 2 bytes of row padding
        let data = vec![
            1, 2, 3, 4, 5, 6, 0, 0, //
            7, 8, 9, 10, 11, 12, 0, 0,
        ];
        let frame = Frame::new(2, 2, 8, PixelFormat::Bgr24, data).unwrap();

        assert_eq!(frame.rgb(0, 0), (3, 2, 1));
        assert_eq!(frame.rgb(1, 0), (6, 5, 4));
        assert_eq!(frame.rgb(0, 1), (9, 8, 7));
        assert_eq!(frame.rgb(1, 1), (12, 11, 10));
    }

    #[test]
    fn test_fill_and_crop() {
        let mut frame = Frame::filled(50, 40, PixelFormat::Bgra32, Rgb::new(0, 0, 0));
        frame.fill_rect(Rect::new(45, 35, 20, 20), Rgb::new(10, 20, 30));

        assert_eq!(frame.rgb(49, 39), (10, 20, 30));
        assert_eq!(frame.rgb(44, 39), (0, 0, 0));

        let crop = frame.crop_rgb(Rect::new(40, 30, 100, 100)).unwrap();
        assert_eq!(crop.dimensions(), (10, 10));
        assert_eq!(crop.get_pixel(9, 9).0, [10, 20, 30]);
        assert_eq!(crop.get_pixel(0, 0).0, [0, 0, 0]);

        assert!(frame.crop_rgb(Rect::new(100, 100, 10, 10)).is_none());
    }
}
