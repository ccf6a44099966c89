//! List available audio input and output devices.

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait};

use crate::audio::devices::suppress_alsa_warnings;

/// Lists capture devices (selectable by index or name) and playback devices.
///
/// # Errors
/// - If the audio host cannot be initialized
pub fn handle_list_devices() -> Result<(), anyhow::Error> {
    let (host, inputs, outputs) = suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        let inputs: Vec<cpal::Device> = host
            .input_devices()
            .map_err(|e| anyhow!("Failed to enumerate audio devices: {e}"))?
            .collect();
        // Playback devices that fail to report a name are skipped
        let outputs: Vec<cpal::Device> = host
            .output_devices()
            .map_err(|e| anyhow!("Failed to enumerate audio devices: {e}"))?
            .filter(|d| d.name().is_ok())
            .collect();
        Ok((host, inputs, outputs))
    })?;

    println!();
    if inputs.is_empty() {
        println!("No audio input devices found on this system.");
    } else {
        println!("Available audio input devices:");
        println!();

        let default_input = host.default_input_device().and_then(|d| d.name().ok());

        // Indices must match enumeration order so `device = "N"` resolves the same way
        for (index, device) in inputs.iter().enumerate() {
            let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
            let default_indicator = if default_input.as_ref() == Some(&device_name) {
                " [DEFAULT]"
            } else {
                ""
            };

            let config_info = match device.default_input_config() {
                Ok(config) => format!(
                    " ({}Hz, {} channels, {:?})",
                    config.sample_rate().0,
                    config.channels(),
                    config.sample_format()
                ),
                Err(_) => " (configuration unavailable)".to_string(),
            };

            println!("  ID: {}", index);
            println!("    Name: {}{}", device_name, default_indicator);
            println!("    Config:{}", config_info);
            println!();
        }
    }

    let default_output = host.default_output_device().and_then(|d| d.name().ok());
    if !outputs.is_empty() {
        println!("Audio output devices (file playback uses the default):");
        println!();
        for device in &outputs {
            let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
            let default_indicator = if default_output.as_ref() == Some(&device_name) {
                " [DEFAULT]"
            } else {
                ""
            };
            println!("    {}{}", device_name, default_indicator);
        }
        println!();
    }

    Ok(())
}
