use super::{FrameSource, ACQUIRE_TIMEOUT_MS};
use crate::error::CaptureError;
use crate::frame::{Frame, PixelFormat};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use windows::core::Interface;
use windows::Win32::Foundation::HMODULE;
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_UNKNOWN;
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Texture2D,
    D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAPPED_SUBRESOURCE,
    D3D11_MAP_READ, D3D11_SDK_VERSION, D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
};
use windows::Win32::Graphics::Dxgi::Common::DXGI_SAMPLE_DESC;
use windows::Win32::Graphics::Dxgi::{
    CreateDXGIFactory1, IDXGIAdapter, IDXGIAdapter1, IDXGIFactory1, IDXGIOutput1,
    IDXGIOutputDuplication, IDXGIResource, DXGI_ERROR_ACCESS_LOST, DXGI_ERROR_NOT_FOUND,
    DXGI_ERROR_WAIT_TIMEOUT, DXGI_OUTDUPL_FRAME_INFO,
};

/// Minimum spacing between re-initialisation attempts after access loss
const REINIT_INTERVAL: Duration = Duration::from_secs(1);

/// Handles for one bound output. Dropping releases every COM reference.
struct DuplicationSession {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    duplication: IDXGIOutputDuplication,
    staging: Option<(ID3D11Texture2D, u32, u32)>,
    adapter_index: u32,
    output_index: u32,
}

/// DXGI desktop duplication of the first output that accepts it.
///
/// Access loss (mode change, secure desktop, display unplugged) tears the
/// session down; the next call after [`REINIT_INTERVAL`] rebuilds it.
pub struct DesktopDuplication {
    session: Option<DuplicationSession>,
    last_init_attempt: Option<Instant>,
}

impl DesktopDuplication {
    pub fn new() -> Result<Self, CaptureError> {
        let session = open_session()?;
        info!(
            "Desktop duplication bound to adapter {} output {}",
            session.adapter_index, session.output_index
        );
        Ok(Self {
            session: Some(session),
            last_init_attempt: Some(Instant::now()),
        })
    }

    fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(
                "Releasing duplication of adapter {} output {}",
                session.adapter_index, session.output_index
            );
            drop(session);
        }
    }

    fn ensure_session(&mut self) -> Result<&mut DuplicationSession, CaptureError> {
        if self.session.is_none() {
            let due = self
                .last_init_attempt
                .map(|t| t.elapsed() >= REINIT_INTERVAL)
                .unwrap_or(true);
            if !due {
                return Err(CaptureError::NotInitialized);
            }

            self.last_init_attempt = Some(Instant::now());
            match open_session() {
                Ok(session) => {
                    info!("Desktop duplication re-initialized");
                    self.session = Some(session);
                }
                Err(e) => {
                    debug!("Desktop duplication re-initialization failed: {}", e);
                    return Err(e);
                }
            }
        }

        self.session.as_mut().ok_or(CaptureError::NotInitialized)
    }
}

impl FrameSource for DesktopDuplication {
    fn name(&self) -> &'static str {
        "desktop-duplication"
    }

    fn capture(&mut self) -> Result<Frame, CaptureError> {
        let session = self.ensure_session()?;
        match session.grab() {
            Err(CaptureError::AccessLost) => {
                warn!("Desktop duplication access lost, will re-initialize");
                self.teardown();
                Err(CaptureError::AccessLost)
            }
            other => other,
        }
    }
}

// SAFETY: the COM objects are owned by this value alone and only touched
// through `&mut self`, so they never cross threads concurrently.
unsafe impl Send for DesktopDuplication {}

impl Drop for DesktopDuplication {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl DuplicationSession {
    fn grab(&mut self) -> Result<Frame, CaptureError> {
        let mut info = DXGI_OUTDUPL_FRAME_INFO::default();
        let mut resource: Option<IDXGIResource> = None;

        // SAFETY: out-pointers reference live locals
        let acquired = unsafe {
            self.duplication
                .AcquireNextFrame(ACQUIRE_TIMEOUT_MS, &mut info, &mut resource)
        };
        if let Err(e) = acquired {
            return Err(if e.code() == DXGI_ERROR_WAIT_TIMEOUT {
                CaptureError::Timeout {
                    timeout_ms: ACQUIRE_TIMEOUT_MS,
                }
            } else if e.code() == DXGI_ERROR_ACCESS_LOST {
                CaptureError::AccessLost
            } else {
                device_error("AcquireNextFrame", e)
            });
        }

        let result = resource
            .ok_or_else(|| CaptureError::InvalidFrame {
                details: "no desktop resource".to_string(),
            })
            .and_then(|resource| self.copy_frame(&resource));

        // The frame must be released even when the copy failed
        // SAFETY: a frame is currently acquired
        if let Err(e) = unsafe { self.duplication.ReleaseFrame() } {
            if e.code() == DXGI_ERROR_ACCESS_LOST {
                return Err(CaptureError::AccessLost);
            }
            warn!("ReleaseFrame failed: {}", e);
        }

        result
    }

    fn copy_frame(&mut self, resource: &IDXGIResource) -> Result<Frame, CaptureError> {
        let texture: ID3D11Texture2D = resource
            .cast()
            .map_err(|e| device_error("cast desktop texture", e))?;

        let mut desc = D3D11_TEXTURE2D_DESC::default();
        // SAFETY: desc is a valid out-pointer
        unsafe { texture.GetDesc(&mut desc) };

        let staging = self.staging_texture(&desc)?;

        // SAFETY: both textures belong to self.device; the mapped pointer is
        // only read between Map and Unmap
        unsafe {
            self.context.CopyResource(&staging, &texture);

            let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
            self.context
                .Map(&staging, 0, D3D11_MAP_READ, 0, Some(&mut mapped))
                .map_err(|e| device_error("Map staging texture", e))?;

            let stride = mapped.RowPitch as usize;
            let row_bytes = desc.Width as usize * 4;
            let len = if desc.Height == 0 {
                0
            } else {
                stride * (desc.Height as usize - 1) + row_bytes
            };
            let data = std::slice::from_raw_parts(mapped.pData as *const u8, len).to_vec();

            self.context.Unmap(&staging, 0);

            Frame::new(desc.Width, desc.Height, stride, PixelFormat::Bgra32, data)
        }
    }

    /// CPU-readable copy target, recreated only when the resolution changes
    fn staging_texture(
        &mut self,
        source: &D3D11_TEXTURE2D_DESC,
    ) -> Result<ID3D11Texture2D, CaptureError> {
        if let Some((texture, width, height)) = &self.staging {
            if *width == source.Width && *height == source.Height {
                return Ok(texture.clone());
            }
            debug!(
                "Desktop resolution changed {}x{} -> {}x{}, recreating staging texture",
                width, height, source.Width, source.Height
            );
        }
        self.staging = None;

        let desc = D3D11_TEXTURE2D_DESC {
            Width: source.Width,
            Height: source.Height,
            MipLevels: 1,
            ArraySize: 1,
            Format: source.Format,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_STAGING,
            BindFlags: 0,
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: 0,
        };

        let mut texture: Option<ID3D11Texture2D> = None;
        // SAFETY: desc and out-pointer reference live locals
        unsafe { self.device.CreateTexture2D(&desc, None, Some(&mut texture)) }
            .map_err(|e| device_error("CreateTexture2D", e))?;
        let texture = texture.ok_or_else(|| CaptureError::Device {
            details: "CreateTexture2D returned no texture".to_string(),
        })?;

        self.staging = Some((texture.clone(), source.Width, source.Height));
        Ok(texture)
    }
}

/// Probe adapters × outputs and duplicate the first output that allows it
fn open_session() -> Result<DuplicationSession, CaptureError> {
    // SAFETY: plain COM factory calls; every returned interface is owned
    unsafe {
        let factory: IDXGIFactory1 =
            CreateDXGIFactory1().map_err(|e| device_error("CreateDXGIFactory1", e))?;

        let mut last_error = CaptureError::NotInitialized;
        let mut adapter_index = 0;
        loop {
            let adapter: IDXGIAdapter1 = match factory.EnumAdapters1(adapter_index) {
                Ok(adapter) => adapter,
                Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => break,
                Err(e) => return Err(device_error("EnumAdapters1", e)),
            };

            let mut output_index = 0;
            loop {
                let output = match adapter.EnumOutputs(output_index) {
                    Ok(output) => output,
                    Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => break,
                    Err(e) => {
                        last_error = device_error("EnumOutputs", e);
                        break;
                    }
                };

                let output1 = match output.cast::<IDXGIOutput1>() {
                    Ok(output1) => output1,
                    Err(e) => {
                        last_error = device_error("IDXGIOutput1", e);
                        output_index += 1;
                        continue;
                    }
                };

                match open_output(&adapter, &output1) {
                    Ok((device, context, duplication)) => {
                        return Ok(DuplicationSession {
                            device,
                            context,
                            duplication,
                            staging: None,
                            adapter_index,
                            output_index,
                        })
                    }
                    Err(e) => {
                        debug!(
                            "Adapter {} output {} cannot be duplicated: {}",
                            adapter_index, output_index, e
                        );
                        last_error = e;
                    }
                }
                output_index += 1;
            }
            adapter_index += 1;
        }

        Err(last_error)
    }
}

unsafe fn open_output(
    adapter: &IDXGIAdapter1,
    output: &IDXGIOutput1,
) -> Result<(ID3D11Device, ID3D11DeviceContext, IDXGIOutputDuplication), CaptureError> {
    let adapter: IDXGIAdapter = adapter
        .cast()
        .map_err(|e| device_error("IDXGIAdapter", e))?;

    let mut device: Option<ID3D11Device> = None;
    let mut context: Option<ID3D11DeviceContext> = None;
    D3D11CreateDevice(
        &adapter,
        D3D_DRIVER_TYPE_UNKNOWN,
        HMODULE::default(),
        D3D11_CREATE_DEVICE_BGRA_SUPPORT,
        None,
        D3D11_SDK_VERSION,
        Some(&mut device),
        None,
        Some(&mut context),
    )
    .map_err(|e| device_error("D3D11CreateDevice", e))?;

    let device = device.ok_or_else(|| CaptureError::Device {
        details: "D3D11CreateDevice returned no device".to_string(),
    })?;
    let context = context.ok_or_else(|| CaptureError::Device {
        details: "D3D11CreateDevice returned no context".to_string(),
    })?;

    let duplication = output
        .DuplicateOutput(&device)
        .map_err(|e| device_error("DuplicateOutput", e))?;

    Ok((device, context, duplication))
}

fn device_error(call: &str, error: windows::core::Error) -> CaptureError {
    CaptureError::Device {
        details: format!("{}: {}", call, error),
    }
}
