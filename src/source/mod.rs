//! Sample acquisition: live input devices and recorded files

mod device;
mod file;

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::CaptureError;
use crate::models::AudioFrame;

pub use device::DeviceSource;
pub use file::FileSource;

/// A producer of fixed-size mono frames.
pub trait SampleSource {
    /// Block until a full frame is available.
    ///
    /// Transient overruns are absorbed by the source. An error means the
    /// source cannot deliver any further frames.
    fn read(&mut self) -> Result<AudioFrame, CaptureError>;

    /// Human-readable name for display.
    fn describe(&self) -> String;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn read(&mut self) -> Result<AudioFrame, CaptureError> {
        (**self).read()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Names of the input devices offered by the default host.
pub fn list_input_devices() -> Result<Vec<String>, CaptureError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::ConfigError(e.to_string()))?;
    Ok(devices
        .map(|d| d.name().unwrap_or_else(|_| "Unknown".to_string()))
        .collect())
}
