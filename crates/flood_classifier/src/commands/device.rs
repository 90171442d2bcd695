use burn::backend::ndarray::NdArrayDevice;
use tracing::info;

/// Initializes the CPU tensor device.
///
/// This function only exists to be able to change the device at a single location.
pub fn init_device() -> NdArrayDevice {
    info!("Initializing NdArray device...");
    NdArrayDevice::default()
}
