//! V4L2 control IDs and conversions between raw control values and the
//! units used by `CapabilityBounds`.
//!
//! | Attribute          | Control                | Raw unit        |
//! |--------------------|------------------------|-----------------|
//! | zoom factor        | `ZOOM_ABSOLUTE`        | 1/100 x above min |
//! | exposure duration  | `EXPOSURE_ABSOLUTE`    | 100 µs          |
//! | ISO                | `ISO_SENSITIVITY`, else `GAIN` | ISO / gain step |
//! | exposure bias      | `AUTO_EXPOSURE_BIAS`   | 0.001 EV        |
//! | torch              | `FLASH_LED_MODE`       | menu            |
//! | HDR                | `WIDE_DYNAMIC_RANGE`   | boolean         |

use std::collections::HashMap;
use std::time::Duration;

use camera_control_core::models::attributes::{CameraPosition, ExposureMode, HdrMode};
use camera_control_core::models::capabilities::Bounds;

pub const CID_GAIN: u32 = 0x0098_0913;
pub const CID_EXPOSURE_AUTO: u32 = 0x009a_0901;
pub const CID_EXPOSURE_ABSOLUTE: u32 = 0x009a_0902;
pub const CID_ZOOM_ABSOLUTE: u32 = 0x009a_090d;
pub const CID_AUTO_EXPOSURE_BIAS: u32 = 0x009a_0913;
pub const CID_WIDE_DYNAMIC_RANGE: u32 = 0x009a_0915;
pub const CID_ISO_SENSITIVITY: u32 = 0x009a_0917;
pub const CID_3A_LOCK: u32 = 0x009a_091b;
pub const CID_FLASH_LED_MODE: u32 = 0x009c_0901;

// EXPOSURE_AUTO menu
pub const EXPOSURE_AUTO: i64 = 0;
pub const EXPOSURE_MANUAL: i64 = 1;
pub const EXPOSURE_APERTURE_PRIORITY: i64 = 3;

// FLASH_LED_MODE menu
pub const FLASH_LED_MODE_NONE: i64 = 0;
pub const FLASH_LED_MODE_TORCH: i64 = 2;

/// Bit of `3A_LOCK` that holds exposure.
pub const LOCK_EXPOSURE: i64 = 1;

const ZOOM_UNITS_PER_X: f64 = 100.0;
const EXPOSURE_UNIT_MICROS: u64 = 100;
const BIAS_UNITS_PER_EV: f32 = 1000.0;

/// Exposure reported by devices without an absolute exposure control.
const NOMINAL_EXPOSURE: Duration = Duration::from_micros(33_300);
const NOMINAL_ISO: f32 = 100.0;

/// Range of an integer control as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRange {
    pub minimum: i64,
    pub maximum: i64,
}

impl ControlRange {
    pub fn new(minimum: i64, maximum: i64) -> Self {
        Self { minimum, maximum }
    }
}

pub fn zoom_factor(raw: i64, range: ControlRange) -> f64 {
    1.0 + (raw - range.minimum) as f64 / ZOOM_UNITS_PER_X
}

pub fn zoom_raw(factor: f64, range: ControlRange) -> i64 {
    let raw = range.minimum + ((factor - 1.0) * ZOOM_UNITS_PER_X).round() as i64;
    raw.clamp(range.minimum, range.maximum)
}

/// Zoom bounds, with the control's minimum mapped to 1x.
pub fn zoom_bounds(range: ControlRange) -> Bounds<f64> {
    Bounds::new(1.0, zoom_factor(range.maximum, range))
}

pub fn exposure_duration(raw: i64) -> Duration {
    Duration::from_micros(raw.max(0) as u64 * EXPOSURE_UNIT_MICROS)
}

pub fn exposure_raw(duration: Duration) -> i64 {
    let micros = duration.as_micros() as u64;
    ((micros + EXPOSURE_UNIT_MICROS / 2) / EXPOSURE_UNIT_MICROS) as i64
}

/// Exposure bounds. A raw minimum of 0 would mean a zero-length exposure,
/// so the lower bound is at least one unit.
pub fn exposure_bounds(range: ControlRange) -> Bounds<Duration> {
    Bounds::new(
        exposure_duration(range.minimum.max(1)),
        exposure_duration(range.maximum.max(1)),
    )
}

pub fn bias_ev(raw: i64) -> f32 {
    raw as f32 / BIAS_UNITS_PER_EV
}

pub fn bias_raw(ev: f32) -> i64 {
    (ev * BIAS_UNITS_PER_EV).round() as i64
}

pub fn bias_bounds(range: ControlRange) -> Bounds<f32> {
    Bounds::new(bias_ev(range.minimum), bias_ev(range.maximum))
}

/// Gain and ISO controls are reported one raw step per ISO unit.
pub fn iso_bounds(range: ControlRange) -> Bounds<f32> {
    Bounds::new(range.minimum as f32, range.maximum as f32)
}

pub fn iso_raw(iso: f32) -> i64 {
    iso.round() as i64
}

/// Frames per second for a frame interval of `numerator / denominator`
/// seconds.
pub fn fps_from_interval(numerator: u32, denominator: u32) -> Option<u32> {
    if numerator == 0 || denominator == 0 {
        return None;
    }
    let fps = (f64::from(denominator) / f64::from(numerator)).round() as u32;
    (fps > 0).then_some(fps)
}

/// Frame-rate envelope spanning every interval in `intervals`.
pub fn frame_rate_bounds(intervals: impl IntoIterator<Item = (u32, u32)>) -> Option<Bounds<u32>> {
    let rates: Vec<u32> = intervals
        .into_iter()
        .filter_map(|(numerator, denominator)| fps_from_interval(numerator, denominator))
        .collect();
    let min = rates.iter().copied().min()?;
    let max = rates.iter().copied().max()?;
    Some(Bounds::new(min, max))
}

/// Position assigned to the `order`-th capture node found on the system.
pub fn position_for_node(order: usize) -> Option<CameraPosition> {
    match order {
        0 => Some(CameraPosition::Front),
        1 => Some(CameraPosition::Back),
        _ => None,
    }
}

/// One control as declared by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlSpec {
    pub range: ControlRange,
    /// Boolean controls take `Value::Boolean` rather than an integer.
    pub boolean: bool,
    /// Valid menu values, empty for non-menu controls.
    pub menu: Vec<i64>,
}

impl ControlSpec {
    pub fn integer(minimum: i64, maximum: i64) -> Self {
        Self {
            range: ControlRange::new(minimum, maximum),
            boolean: false,
            menu: Vec::new(),
        }
    }

    pub fn boolean() -> Self {
        Self {
            range: ControlRange::new(0, 1),
            boolean: true,
            menu: Vec::new(),
        }
    }

    pub fn menu(values: impl IntoIterator<Item = i64>) -> Self {
        let menu: Vec<i64> = values.into_iter().collect();
        let minimum = menu.iter().copied().min().unwrap_or(0);
        let maximum = menu.iter().copied().max().unwrap_or(0);
        Self {
            range: ControlRange::new(minimum, maximum),
            boolean: false,
            menu,
        }
    }

    pub fn offers(&self, value: i64) -> bool {
        self.menu.contains(&value)
    }
}

/// Controls a device exposes, keyed by control ID.
///
/// Capabilities are derived from what is present: a missing control yields
/// a single-value range or drops the mode it would drive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlTable {
    controls: HashMap<u32, ControlSpec>,
}

impl ControlTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u32, spec: ControlSpec) {
        self.controls.insert(id, spec);
    }

    pub fn get(&self, id: u32) -> Option<&ControlSpec> {
        self.controls.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.controls.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Control carrying sensor sensitivity: `ISO_SENSITIVITY` when present,
    /// otherwise analog `GAIN`.
    pub fn iso_control(&self) -> Option<u32> {
        [CID_ISO_SENSITIVITY, CID_GAIN]
            .into_iter()
            .find(|id| self.contains(*id))
    }

    pub fn zoom_bounds(&self) -> Bounds<f64> {
        self.get(CID_ZOOM_ABSOLUTE)
            .map(|spec| zoom_bounds(spec.range))
            .unwrap_or_else(|| Bounds::fixed(1.0))
    }

    pub fn exposure_bounds(&self) -> Bounds<Duration> {
        self.get(CID_EXPOSURE_ABSOLUTE)
            .map(|spec| exposure_bounds(spec.range))
            .unwrap_or_else(|| Bounds::fixed(NOMINAL_EXPOSURE))
    }

    pub fn iso_bounds(&self) -> Bounds<f32> {
        self.iso_control()
            .and_then(|id| self.get(id))
            .map(|spec| iso_bounds(spec.range))
            .unwrap_or_else(|| Bounds::fixed(NOMINAL_ISO))
    }

    pub fn bias_bounds(&self) -> Bounds<f32> {
        self.get(CID_AUTO_EXPOSURE_BIAS)
            .map(|spec| bias_bounds(spec.range))
            .unwrap_or_else(|| Bounds::fixed(0.0))
    }

    pub fn has_torch(&self) -> bool {
        self.get(CID_FLASH_LED_MODE)
            .is_some_and(|spec| spec.offers(FLASH_LED_MODE_TORCH))
    }

    /// `Off` is always listed; `On` needs a wide-dynamic-range control.
    pub fn hdr_modes(&self) -> Vec<HdrMode> {
        if self.contains(CID_WIDE_DYNAMIC_RANGE) {
            vec![HdrMode::Off, HdrMode::On]
        } else {
            vec![HdrMode::Off]
        }
    }

    pub fn exposure_modes(&self) -> Vec<ExposureMode> {
        let auto = self.get(CID_EXPOSURE_AUTO);
        let mut modes = Vec::new();
        if auto.is_none_or(|spec| {
            spec.offers(EXPOSURE_AUTO) || spec.offers(EXPOSURE_APERTURE_PRIORITY)
        }) {
            modes.push(ExposureMode::ContinuousAutoExposure);
        }
        if self.contains(CID_3A_LOCK) {
            modes.push(ExposureMode::Locked);
        }
        if self.contains(CID_EXPOSURE_ABSOLUTE)
            && auto.is_some_and(|spec| spec.offers(EXPOSURE_MANUAL))
        {
            modes.push(ExposureMode::Custom);
        }
        modes
    }

    /// Menu value that puts `EXPOSURE_AUTO` into continuous automatic
    /// exposure. UVC cameras usually only offer aperture priority.
    pub fn continuous_auto_value(&self) -> Option<i64> {
        let spec = self.get(CID_EXPOSURE_AUTO)?;
        [EXPOSURE_AUTO, EXPOSURE_APERTURE_PRIORITY]
            .into_iter()
            .find(|value| spec.offers(*value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zoom_minimum_maps_to_one_x() {
        let range = ControlRange::new(100, 500);

        assert_relative_eq!(zoom_factor(100, range), 1.0);
        assert_relative_eq!(zoom_factor(350, range), 3.5);
        assert_eq!(zoom_raw(3.5, range), 350);
        assert_eq!(zoom_raw(9.0, range), 500);

        let bounds = zoom_bounds(range);
        assert_relative_eq!(bounds.min, 1.0);
        assert_relative_eq!(bounds.max, 5.0);
    }

    #[test]
    fn exposure_uses_hundred_microsecond_units() {
        assert_eq!(exposure_duration(156), Duration::from_micros(15_600));
        assert_eq!(exposure_raw(Duration::from_micros(16_667)), 167);
        assert_eq!(exposure_raw(Duration::from_millis(10)), 100);
        assert_eq!(exposure_duration(-5), Duration::ZERO);
    }

    #[test]
    fn exposure_bounds_never_reach_zero() {
        let bounds = exposure_bounds(ControlRange::new(0, 10_000));

        assert_eq!(bounds.min, Duration::from_micros(100));
        assert_eq!(bounds.max, Duration::from_secs(1));
    }

    #[test]
    fn bias_in_milli_ev() {
        assert_relative_eq!(bias_ev(-2000), -2.0);
        assert_eq!(bias_raw(1.333), 1333);

        let bounds = bias_bounds(ControlRange::new(-4000, 4000));
        assert_relative_eq!(bounds.min, -4.0);
        assert_relative_eq!(bounds.max, 4.0);
    }

    #[test]
    fn fps_from_frame_intervals() {
        assert_eq!(fps_from_interval(1, 30), Some(30));
        assert_eq!(fps_from_interval(1001, 30000), Some(30));
        assert_eq!(fps_from_interval(2, 15), Some(8));
        assert_eq!(fps_from_interval(0, 30), None);
        assert_eq!(fps_from_interval(1, 0), None);
    }

    #[test]
    fn frame_rate_bounds_span_all_intervals() {
        let bounds = frame_rate_bounds([(1, 30), (1, 5), (1, 15), (0, 0)]).unwrap();

        assert_eq!(bounds, Bounds::new(5, 30));
        assert!(frame_rate_bounds(Vec::new()).is_none());
    }

    #[test]
    fn first_nodes_become_front_then_back() {
        assert_eq!(position_for_node(0), Some(CameraPosition::Front));
        assert_eq!(position_for_node(1), Some(CameraPosition::Back));
        assert_eq!(position_for_node(2), None);
    }

    fn uvc_table() -> ControlTable {
        let mut table = ControlTable::new();
        table.insert(
            CID_EXPOSURE_AUTO,
            ControlSpec::menu([EXPOSURE_MANUAL, EXPOSURE_APERTURE_PRIORITY]),
        );
        table.insert(CID_EXPOSURE_ABSOLUTE, ControlSpec::integer(3, 2047));
        table.insert(CID_GAIN, ControlSpec::integer(0, 255));
        table.insert(CID_ZOOM_ABSOLUTE, ControlSpec::integer(100, 500));
        table
    }

    #[test]
    fn uvc_camera_capabilities() {
        let table = uvc_table();

        assert_eq!(table.iso_control(), Some(CID_GAIN));
        assert_relative_eq!(table.zoom_bounds().max, 5.0);
        assert_eq!(table.exposure_bounds().min, Duration::from_micros(300));
        assert_relative_eq!(table.iso_bounds().max, 255.0);
        assert_eq!(table.bias_bounds(), Bounds::fixed(0.0));
        assert!(!table.has_torch());
        assert_eq!(table.hdr_modes(), vec![HdrMode::Off]);
        assert_eq!(
            table.exposure_modes(),
            vec![ExposureMode::ContinuousAutoExposure, ExposureMode::Custom]
        );
        assert_eq!(table.continuous_auto_value(), Some(EXPOSURE_APERTURE_PRIORITY));
    }

    #[test]
    fn iso_sensitivity_preferred_over_gain() {
        let mut table = uvc_table();
        table.insert(CID_ISO_SENSITIVITY, ControlSpec::integer(50, 3200));

        assert_eq!(table.iso_control(), Some(CID_ISO_SENSITIVITY));
        assert_relative_eq!(table.iso_bounds().min, 50.0);
    }

    #[test]
    fn missing_controls_collapse_to_single_values() {
        let table = ControlTable::new();

        assert!(table.is_empty());
        assert_eq!(table.zoom_bounds(), Bounds::fixed(1.0));
        assert_eq!(table.exposure_bounds(), Bounds::fixed(NOMINAL_EXPOSURE));
        assert_eq!(table.iso_bounds(), Bounds::fixed(NOMINAL_ISO));
        assert_eq!(
            table.exposure_modes(),
            vec![ExposureMode::ContinuousAutoExposure]
        );
        assert_eq!(table.continuous_auto_value(), None);
    }

    #[test]
    fn optional_controls_unlock_modes() {
        let mut table = uvc_table();
        table.insert(
            CID_FLASH_LED_MODE,
            ControlSpec::menu([FLASH_LED_MODE_NONE, 1, FLASH_LED_MODE_TORCH]),
        );
        table.insert(CID_WIDE_DYNAMIC_RANGE, ControlSpec::boolean());
        table.insert(CID_3A_LOCK, ControlSpec::integer(0, 7));

        assert!(table.has_torch());
        assert_eq!(table.hdr_modes(), vec![HdrMode::Off, HdrMode::On]);
        assert!(table.exposure_modes().contains(&ExposureMode::Locked));
        assert!(table.get(CID_WIDE_DYNAMIC_RANGE).unwrap().boolean);
    }

    #[test]
    fn manual_only_camera_has_no_auto_exposure() {
        let mut table = ControlTable::new();
        table.insert(CID_EXPOSURE_AUTO, ControlSpec::menu([EXPOSURE_MANUAL]));
        table.insert(CID_EXPOSURE_ABSOLUTE, ControlSpec::integer(1, 100));

        assert_eq!(table.exposure_modes(), vec![ExposureMode::Custom]);
    }
}
