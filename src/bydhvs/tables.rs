use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use serde::Serialize;

pub const NO_ERROR: &str = "No Error";
pub const UNDEFINED: &str = "undefined";

pub const ERRORS: [&str; 16] = [
    "High temperature during charging (cells)",
    "Low temperature during charging (cells)",
    "Overcurrent during discharging",
    "Overcurrent during charging",
    "Main circuit failure",
    "Short circuit alarm",
    "Cell imbalance",
    "Current sensor error",
    "Battery overvoltage",
    "Battery undervoltage",
    "Cell overvoltage",
    "Cell undervoltage",
    "Voltage sensor error",
    "Temperature sensor error",
    "High temperature during discharging (cells)",
    "Low temperature during discharging (cells)",
];

pub const TOWER_STATUS: [&str; 16] = [
    "Battery Over Voltage",
    "Battery Under Voltage",
    "Cells OverVoltage",
    "Cells UnderVoltage",
    "Cells Imbalance",
    "Charging High Temperature(Cells)",
    "Charging Low Temperature(Cells)",
    "DisCharging High Temperature(Cells)",
    "DisCharging Low Temperature(Cells)",
    "Charging OverCurrent(Cells)",
    "DisCharging OverCurrent(Cells)",
    "Charging OverCurrent(Hardware)",
    "Short Circuit",
    "Inversly Connection",
    "Interlock switch Abnormal",
    "AirSwitch Abnormal",
];

pub const INVERTERS: [&str; 20] = [
    "Fronius HV",
    "Goodwe HV",
    "Fronius HV",
    "Kostal HV",
    "Goodwe HV",
    "SMA SBS3.7/5.0",
    "Kostal HV",
    "SMA SBS3.7/5.0",
    "Sungrow HV",
    "Sungrow HV",
    "Kaco HV",
    "Kaco HV",
    "Ingeteam HV",
    "Ingeteam HV",
    "SMA SBS 2.5 HV",
    "undefined",
    "SMA SBS 2.5 HV",
    "Fronius HV",
    "undefined",
    "SMA STP",
];

pub const LVS_INVERTERS: [&str; 21] = [
    "Fronius HV",
    "Goodwe HV",
    "Goodwe HV",
    "Kostal HV",
    "Selectronic LV",
    "SMA SBS3.7/5.0",
    "SMA LV",
    "Victron LV",
    "Suntech LV",
    "Sungrow HV",
    "Kaco HV",
    "Studer LV",
    "Solar Edge LV",
    "Ingeteam HV",
    "Sungrow LV",
    "Schneider LV",
    "SMA SBS2.5 HV",
    "Solar Edge LV",
    "Solar Edge LV",
    "Solar Edge LV",
    "unknown",
];

/// Names of the set bits 0..15 of `mask`, lowest bit first, joined with "; ".
pub fn bit_names(mask: u32, names: &[&str; 16]) -> String {
    let set: Vec<&str> = names
        .iter()
        .enumerate()
        .filter(|(bit, _)| mask & (1 << bit) != 0)
        .map(|(_, name)| *name)
        .collect();

    if set.is_empty() {
        NO_ERROR.to_string()
    } else {
        set.join("; ")
    }
}

pub fn inverter_name(table: &[&'static str], index: u8) -> &'static str {
    table.get(index as usize).copied().unwrap_or(UNDEFINED)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum GridType {
    OffGrid = 0,
    OnGrid = 1,
    Backup = 2,
}

impl GridType {
    pub fn name_of(code: u8) -> &'static str {
        match GridType::try_from(code) {
            Ok(GridType::OffGrid) => "OffGrid",
            Ok(GridType::OnGrid) => "OnGrid",
            Ok(GridType::Backup) => "Backup",
            Err(_) => "Unknown",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum BatteryType {
    #[serde(rename = "LVS")]
    Lvs = 0,
    #[serde(rename = "HVM")]
    Hvm = 1,
    #[serde(rename = "HVS")]
    Hvs = 2,
    #[default]
    #[serde(rename = "unknown")]
    Unknown = 255,
}

impl BatteryType {
    /// Hint derived from the hardware byte embedded in the serial number.
    pub fn from_hardware_byte(byte: u8) -> Option<Self> {
        match byte {
            51 => Some(BatteryType::Hvs),
            49 | 50 => Some(BatteryType::Lvs),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BatteryType::Lvs => "LVS",
            BatteryType::Hvm => "HVM",
            BatteryType::Hvs => "HVS",
            BatteryType::Unknown => "",
        }
    }

    /// Cells and temperature sensors per module.
    pub fn module_layout(&self) -> (u16, u16) {
        match self {
            BatteryType::Lvs => (0, 0),
            BatteryType::Hvm => (16, 8),
            BatteryType::Hvs => (32, 12),
            BatteryType::Unknown => (0, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mask_is_no_error() {
        assert_eq!(bit_names(0, &ERRORS), "No Error");
        assert_eq!(bit_names(0, &TOWER_STATUS), "No Error");
    }

    #[test]
    fn set_bits_in_ascending_order() {
        assert_eq!(
            bit_names(0b1001, &ERRORS),
            "High temperature during charging (cells); Overcurrent during charging"
        );
        assert_eq!(
            bit_names(0x8000 | 0x0002, &TOWER_STATUS),
            "Battery Under Voltage; AirSwitch Abnormal"
        );
    }

    #[test]
    fn bits_above_fifteen_are_ignored() {
        assert_eq!(bit_names(1 << 16, &ERRORS), "No Error");
    }

    #[test]
    fn inverter_lookup_out_of_range() {
        assert_eq!(inverter_name(&INVERTERS, 3), "Kostal HV");
        assert_eq!(inverter_name(&INVERTERS, 19), "SMA STP");
        assert_eq!(inverter_name(&INVERTERS, 20), "undefined");
        assert_eq!(inverter_name(&LVS_INVERTERS, 20), "unknown");
        assert_eq!(inverter_name(&LVS_INVERTERS, 21), "undefined");
    }

    #[test]
    fn grid_types() {
        assert_eq!(GridType::name_of(0), "OffGrid");
        assert_eq!(GridType::name_of(1), "OnGrid");
        assert_eq!(GridType::name_of(2), "Backup");
        assert_eq!(GridType::name_of(7), "Unknown");
    }

    #[test]
    fn battery_types() {
        assert_eq!(BatteryType::from(2), BatteryType::Hvs);
        assert_eq!(BatteryType::from(9), BatteryType::Unknown);
        assert_eq!(BatteryType::Hvm.module_layout(), (16, 8));
        assert_eq!(BatteryType::from_hardware_byte(b'3'), Some(BatteryType::Hvs));
        assert_eq!(BatteryType::from_hardware_byte(b'1'), Some(BatteryType::Lvs));
        assert_eq!(BatteryType::from_hardware_byte(b'0'), None);
    }
}
