use serde::Serialize;

use super::tables::BatteryType;

/// Hard upper bound on cell voltages tracked per tower.
pub const MAX_CELLS: u16 = 160;
/// Hard upper bound on temperature sensors tracked per tower.
pub const MAX_TEMPS: u16 = 64;

/// Everything learned about the battery during one poll cycle.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BatterySnapshot {
    pub serial_number: String,
    pub bmu_firmware: String,
    pub bmu_firmware_a: String,
    pub bmu_firmware_b: String,
    pub bms_firmware: String,
    pub modules: u8,
    pub module_cell_count: u16,
    pub module_cell_temp_count: u16,
    pub towers: u8,
    pub grid_type: String,

    pub soc: i16,
    pub max_voltage: f64,
    pub min_voltage: f64,
    pub soh: i16,
    pub current: f64,
    pub battery_voltage: f64,
    pub max_temperature: i16,
    pub min_temperature: i16,
    pub battery_temperature: i16,
    pub voltage_difference: f64,
    pub power: f64,
    pub error_number: i16,
    pub error_string: String,
    pub param_t: String,
    pub output_voltage: f64,
    pub charge_total: f64,
    pub discharge_total: f64,
    pub eta: f64,

    pub battery_type_from_serial: Option<BatteryType>,
    pub battery_type_code: u8,
    pub battery_type: BatteryType,
    pub battery_type_string: String,
    pub inverter_type_code: u8,
    pub inverter_type: String,
    pub number_of_cells: u16,
    pub number_of_temperatures: u16,

    pub tower_attributes: Vec<TowerAttributes>,
}

impl BatterySnapshot {
    /// Allocate one entry per tower. Called once the identity reply told us
    /// how many there are; a system reporting zero towers still gets one.
    pub fn allocate_towers(&mut self) {
        let count = usize::from(self.towers).max(1);
        self.tower_attributes = (0..count).map(TowerAttributes::new).collect();
    }

    pub fn tower_count(&self) -> usize {
        self.tower_attributes.len()
    }
}

/// Per-tower diagnostics, filled from the cell-block replies.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TowerAttributes {
    pub no: usize,
    pub max_cell_voltage_mv: i16,
    pub min_cell_voltage_mv: i16,
    pub max_cell_voltage_cell: u8,
    pub min_cell_voltage_cell: u8,
    pub max_cell_temp: u8,
    pub min_cell_temp: u8,
    pub max_cell_temp_cell: u8,
    pub min_cell_temp_cell: u8,
    pub balancing_status: String,
    pub balancing_count: u32,
    pub charge_total: u32,
    pub discharge_total: u32,
    pub eta: f64,
    pub battery_volt: f64,
    pub out_volt: f64,
    pub soc_diagnosis: f64,
    pub soh: i16,
    pub state: String,
    pub state_string: String,
    pub cell_voltages: Vec<i16>,
    pub cell_temperatures: Vec<u8>,
}

impl TowerAttributes {
    pub fn new(no: usize) -> Self {
        Self {
            no,
            ..Default::default()
        }
    }
}
