use super::FrameSource;
use crate::error::CaptureError;
use crate::frame::{Frame, PixelFormat};
use std::ffi::c_void;
use tracing::warn;

use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
    GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, CAPTUREBLT,
    DIB_RGB_COLORS, HBITMAP, HDC, HGDIOBJ, SRCCOPY,
};
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

/// Primary-screen copy through the desktop device context. Slower than
/// duplication but works whenever a desktop exists.
#[derive(Debug, Default)]
pub struct ScreenCopy;

impl ScreenCopy {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSource for ScreenCopy {
    fn name(&self) -> &'static str {
        "screen-copy"
    }

    fn capture(&mut self) -> Result<Frame, CaptureError> {
        // SAFETY: every handle is created and released inside this call by
        // the guards below
        unsafe {
            let width = GetSystemMetrics(SM_CXSCREEN);
            let height = GetSystemMetrics(SM_CYSCREEN);
            if width <= 0 || height <= 0 {
                return Err(CaptureError::Device {
                    details: format!("screen reports {}x{}", width, height),
                });
            }

            let screen = ScreenDc::acquire()?;
            let memory = MemoryDc::create(screen.0)?;
            let bitmap = Bitmap::create(screen.0, width, height)?;
            let previous = SelectObject(memory.0, bitmap.0);

            let blit = BitBlt(
                memory.0,
                0,
                0,
                width,
                height,
                screen.0,
                0,
                0,
                SRCCOPY | CAPTUREBLT,
            );
            SelectObject(memory.0, previous);
            blit.map_err(|e| CaptureError::Device {
                details: format!("BitBlt: {}", e),
            })?;

            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width,
                    // Negative height: top-down rows
                    biHeight: -height,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };

            let stride = width as usize * 4;
            let mut data = vec![0u8; stride * height as usize];
            let rows = GetDIBits(
                memory.0,
                bitmap.0,
                0,
                height as u32,
                Some(data.as_mut_ptr() as *mut c_void),
                &mut info,
                DIB_RGB_COLORS,
            );
            if rows != height {
                return Err(CaptureError::Device {
                    details: format!("GetDIBits copied {} of {} rows", rows, height),
                });
            }

            Frame::new(width as u32, height as u32, stride, PixelFormat::Bgra32, data)
        }
    }
}

struct ScreenDc(HDC);

impl ScreenDc {
    unsafe fn acquire() -> Result<Self, CaptureError> {
        let dc = GetDC(HWND::default());
        if dc.is_invalid() {
            return Err(CaptureError::Device {
                details: "GetDC returned no screen context".to_string(),
            });
        }
        Ok(Self(dc))
    }
}

impl Drop for ScreenDc {
    fn drop(&mut self) {
        // SAFETY: obtained from GetDC(NULL)
        if unsafe { ReleaseDC(HWND::default(), self.0) } == 0 {
            warn!("ReleaseDC failed");
        }
    }
}

struct MemoryDc(HDC);

impl MemoryDc {
    unsafe fn create(screen: HDC) -> Result<Self, CaptureError> {
        let dc = CreateCompatibleDC(screen);
        if dc.is_invalid() {
            return Err(CaptureError::Device {
                details: "CreateCompatibleDC failed".to_string(),
            });
        }
        Ok(Self(dc))
    }
}

impl Drop for MemoryDc {
    fn drop(&mut self) {
        // SAFETY: created by CreateCompatibleDC and no longer selected into
        if !unsafe { DeleteDC(self.0) }.as_bool() {
            warn!("DeleteDC failed");
        }
    }
}

struct Bitmap(HBITMAP);

impl Bitmap {
    unsafe fn create(screen: HDC, width: i32, height: i32) -> Result<Self, CaptureError> {
        let bitmap = CreateCompatibleBitmap(screen, width, height);
        if bitmap.is_invalid() {
            return Err(CaptureError::Device {
                details: format!("CreateCompatibleBitmap {}x{} failed", width, height),
            });
        }
        Ok(Self(bitmap))
    }
}

impl Drop for Bitmap {
    fn drop(&mut self) {
        // SAFETY: the bitmap was deselected before the guard drops
        if !unsafe { DeleteObject(HGDIOBJ(self.0 .0)) }.as_bool() {
            warn!("DeleteObject failed for capture bitmap");
        }
    }
}
