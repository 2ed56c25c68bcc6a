use log::{debug, info};

/// Screen brightness collaborator. Values are percentages in `0..=100`.
pub trait BrightnessControl: Send + Sync {
    /// `None` when the platform cannot report brightness.
    fn get_brightness(&self) -> Option<u8>;

    fn set_brightness(&self, value: u8) -> bool;
}

/// Used when no brightness backend exists on this platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBrightnessControl;

impl BrightnessControl for NoBrightnessControl {
    fn get_brightness(&self) -> Option<u8> {
        None
    }

    fn set_brightness(&self, _value: u8) -> bool {
        false
    }
}

/// Minimum gap between current and recommended brightness before adjusting.
const ADJUST_THRESHOLD: u8 = 10;

/// Screen brightness that suits the given ambient light.
pub fn recommended_brightness(ambient_lux: f64) -> u8 {
    match ambient_lux {
        lux if lux < 50.0 => 25,
        lux if lux < 100.0 => 35,
        lux if lux < 200.0 => 45,
        lux if lux < 300.0 => 55,
        lux if lux < 500.0 => 65,
        lux if lux < 700.0 => 75,
        _ => 85,
    }
}

/// Moves the screen toward [`recommended_brightness`]. Returns true when a
/// change was applied.
pub fn auto_adjust(control: &dyn BrightnessControl, ambient_lux: f64) -> bool {
    let target = recommended_brightness(ambient_lux);

    match control.get_brightness() {
        None => control.set_brightness(target),
        Some(current) if current.abs_diff(target) > ADJUST_THRESHOLD => {
            let applied = control.set_brightness(target);
            if applied {
                info!("Screen brightness {current}% -> {target}% for {ambient_lux:.0} lux");
            }
            applied
        }
        Some(current) => {
            debug!("Screen brightness {current}% close enough to {target}%, leaving it");
            false
        }
    }
}
