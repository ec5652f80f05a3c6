use crate::prelude::*;

use super::frames::{self, IdentityFrame, StatusFrame, TowerSummaryFrame};
use super::packet::Frame;
use super::snapshot::{BatterySnapshot, TowerAttributes, MAX_CELLS, MAX_TEMPS};
use super::tables::{self, BatteryType, GridType};

// cell-block layout: where each reply carries its readings and how many fit
const SUMMARY_CELLS_OFFSET: usize = 101;
const SUMMARY_CELLS: usize = 16;
const BLOCK_CELLS_OFFSET: usize = 5;
const BLOCK2_CELLS: usize = 64;
const BLOCK3_CELLS: usize = 48;
const BLOCK3_TEMPS_OFFSET: usize = 103;
const BLOCK3_TEMPS: usize = 30;
const BLOCK4_TEMPS_OFFSET: usize = 5;
const BLOCK4_TEMPS: usize = 34;
const EXTENDED_CELLS: usize = 16;
const BALANCING_OFFSET: usize = 17;

/// One decoder per reply shape. Tower-scoped decoders work on the tower the
/// state machine is currently measuring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decoder {
    Identity,
    Status,
    BatteryInfo,
    TowerSummary,
    CellVoltages,
    CellVoltagesAndTemps,
    CellTemps,
    ExtendedSummary,
    ExtendedVoltages,
}

impl Decoder {
    pub fn decode(
        self,
        frame: &Frame,
        snapshot: &mut BatterySnapshot,
        tower: usize,
    ) -> Result<(), PacketError> {
        let data = frame.data();

        match self {
            Decoder::Identity => decode_identity(data, snapshot),
            Decoder::Status => decode_status(data, snapshot),
            Decoder::BatteryInfo => decode_battery_info(data, snapshot),
            Decoder::TowerSummary => decode_tower_summary(data, snapshot, tower),
            Decoder::CellVoltages => decode_cell_voltages(data, snapshot, tower),
            Decoder::CellVoltagesAndTemps => decode_cell_voltages_and_temps(data, snapshot, tower),
            Decoder::CellTemps => decode_cell_temps(data, snapshot, tower),
            Decoder::ExtendedSummary => decode_extended_summary(data, snapshot, tower),
            Decoder::ExtendedVoltages => decode_extended_voltages(data, snapshot, tower),
        }
    }
}

fn ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_string()
}

// board 0 is 'A'; the offset can run past ASCII but always stays a valid char
fn bms_board_letter(board: u8) -> char {
    char::from_u32(u32::from(board) + 65).unwrap_or('?')
}

fn decode_identity(data: &[u8], snapshot: &mut BatterySnapshot) -> Result<(), PacketError> {
    let r: IdentityFrame = frames::parse_frame(data)?;

    snapshot.serial_number = ascii(&r.serial);
    if let Some(hint) = BatteryType::from_hardware_byte(r.hardware_type()) {
        snapshot.battery_type_from_serial = Some(hint);
    }

    snapshot.bmu_firmware_a = format!("V{}.{}", r.bmu_a_major, r.bmu_a_minor);
    snapshot.bmu_firmware_b = format!("V{}.{}", r.bmu_b_major, r.bmu_b_minor);
    snapshot.bmu_firmware = if r.active_bmu == 0 {
        format!("{}-A", snapshot.bmu_firmware_a)
    } else {
        format!("{}-B", snapshot.bmu_firmware_b)
    };
    snapshot.bms_firmware = format!(
        "V{}.{}-{}",
        r.bms_major,
        r.bms_minor,
        bms_board_letter(r.bms_board)
    );

    snapshot.modules = r.modules_towers % 16;
    snapshot.towers = r.modules_towers / 16;
    snapshot.grid_type = GridType::name_of(r.grid_type).to_string();

    debug!(
        "identity: serial={} bmu={} bms={} towers={} modules={}",
        snapshot.serial_number,
        snapshot.bmu_firmware,
        snapshot.bms_firmware,
        snapshot.towers,
        snapshot.modules
    );

    Ok(())
}

fn decode_status(data: &[u8], snapshot: &mut BatterySnapshot) -> Result<(), PacketError> {
    let r: StatusFrame = frames::parse_frame(data)?;

    snapshot.soc = r.soc;
    snapshot.max_voltage = Utils::round(f64::from(r.max_voltage) / 100.0, 2);
    snapshot.min_voltage = Utils::round(f64::from(r.min_voltage) / 100.0, 2);
    snapshot.soh = r.soh;
    snapshot.current = Utils::round(f64::from(r.current) / 10.0, 1);
    snapshot.battery_voltage = Utils::round(f64::from(r.battery_voltage) / 100.0, 1);
    snapshot.max_temperature = r.max_temperature;
    snapshot.min_temperature = r.min_temperature;
    snapshot.battery_temperature = r.battery_temperature;
    snapshot.error_number = r.error;
    snapshot.param_t = format!("{}.{}", r.param_t_major, r.param_t_minor);
    snapshot.output_voltage = Utils::round(f64::from(r.output_voltage) / 100.0, 1);

    snapshot.power = Utils::round(snapshot.current * snapshot.output_voltage, 2);
    snapshot.voltage_difference = Utils::round(snapshot.max_voltage - snapshot.min_voltage, 2);

    // bits only; the sign of the raw word is irrelevant here
    snapshot.error_string = tables::bit_names(u32::from(r.error as u16), &tables::ERRORS);

    snapshot.charge_total = f64::from(r.charge_total) / 10.0;
    snapshot.discharge_total = f64::from(r.discharge_total) / 10.0;
    snapshot.eta = Utils::efficiency(snapshot.charge_total, snapshot.discharge_total);

    Ok(())
}

fn decode_battery_info(data: &[u8], snapshot: &mut BatterySnapshot) -> Result<(), PacketError> {
    snapshot.inverter_type_code = Utils::u8_at(data, 3)?;
    snapshot.battery_type_code = Utils::u8_at(data, 5)?;

    snapshot.battery_type = BatteryType::from(snapshot.battery_type_code);
    snapshot.battery_type_string = snapshot.battery_type.label().to_string();
    let (cells, temps) = snapshot.battery_type.module_layout();
    snapshot.module_cell_count = cells;
    snapshot.module_cell_temp_count = temps;
    snapshot.inverter_type =
        tables::inverter_name(&tables::INVERTERS, snapshot.inverter_type_code).to_string();

    // LVS towers report a different layout than the type byte suggests
    if snapshot.battery_type_from_serial == Some(BatteryType::Lvs) {
        snapshot.battery_type = BatteryType::Lvs;
        snapshot.module_cell_count = 8;
        snapshot.module_cell_temp_count = 4;
        snapshot.inverter_type =
            tables::inverter_name(&tables::LVS_INVERTERS, snapshot.inverter_type_code).to_string();
    }

    let modules = u16::from(snapshot.modules);
    snapshot.number_of_cells = (modules * snapshot.module_cell_count).min(MAX_CELLS);
    snapshot.number_of_temperatures = (modules * snapshot.module_cell_temp_count).min(MAX_TEMPS);

    debug!(
        "Number of cells: {}, Number of temperatures: {}, Modules: {}",
        snapshot.number_of_cells, snapshot.number_of_temperatures, snapshot.modules
    );

    Ok(())
}

fn tower_mut(
    snapshot: &mut BatterySnapshot,
    tower: usize,
) -> Result<&mut TowerAttributes, PacketError> {
    snapshot
        .tower_attributes
        .get_mut(tower)
        .ok_or(PacketError::UnknownTower(tower))
}

// how many more readings fit: bounded by both the target and the reply
fn remaining(target: u16, have: usize, capacity: usize) -> usize {
    usize::from(target).saturating_sub(have).min(capacity)
}

fn append_voltages(
    data: &[u8],
    offset: usize,
    capacity: usize,
    target: u16,
    tower: &mut TowerAttributes,
) -> Result<(), PacketError> {
    let count = remaining(target, tower.cell_voltages.len(), capacity);
    for i in 0..count {
        tower.cell_voltages.push(Utils::be_i16_at(data, offset + i * 2)?);
    }
    Ok(())
}

fn append_temperatures(
    data: &[u8],
    offset: usize,
    capacity: usize,
    target: u16,
    tower: &mut TowerAttributes,
) -> Result<(), PacketError> {
    let count = remaining(target, tower.cell_temperatures.len(), capacity);
    for i in 0..count {
        tower.cell_temperatures.push(Utils::u8_at(data, offset + i)?);
    }
    Ok(())
}

fn balancing_count(bitmap: &[u8]) -> u32 {
    bitmap.iter().map(|b| b.count_ones()).sum()
}

fn decode_tower_summary(
    data: &[u8],
    snapshot: &mut BatterySnapshot,
    tower: usize,
) -> Result<(), PacketError> {
    let r: TowerSummaryFrame = frames::parse_frame(data)?;
    let target = snapshot.number_of_cells;
    let t = tower_mut(snapshot, tower)?;

    t.no = tower;
    t.max_cell_voltage_mv = r.max_cell_voltage_mv;
    t.min_cell_voltage_mv = r.min_cell_voltage_mv;
    t.max_cell_voltage_cell = r.max_cell_voltage_cell;
    t.min_cell_voltage_cell = r.min_cell_voltage_cell;
    t.max_cell_temp = r.max_cell_temp;
    t.min_cell_temp = r.min_cell_temp;
    t.max_cell_temp_cell = r.max_cell_temp_cell;
    t.min_cell_temp_cell = r.min_cell_temp_cell;

    t.balancing_status = Utils::hex(&r.balancing);
    t.balancing_count = balancing_count(&r.balancing);

    t.charge_total = r.charge_total;
    t.discharge_total = r.discharge_total;
    t.eta = Utils::efficiency(f64::from(r.charge_total), f64::from(r.discharge_total));
    t.battery_volt = Utils::round(f64::from(r.battery_volt) / 10.0, 1);
    t.out_volt = Utils::round(f64::from(r.out_volt) / 10.0, 1);
    t.soc_diagnosis = Utils::round(f64::from(r.soc_diagnosis) / 10.0, 1);
    t.soh = r.soh;

    // The BMU reports the tower state as two bytes whose decimal renderings
    // are concatenated; the resulting number is then tested bit by bit.
    t.state = format!("{}{}", r.state_high, r.state_low);
    let state_bits: u32 = t.state.parse().unwrap_or_default();
    t.state_string = tables::bit_names(state_bits, &tables::TOWER_STATUS);

    t.cell_voltages.clear();
    t.cell_temperatures.clear();
    append_voltages(data, SUMMARY_CELLS_OFFSET, SUMMARY_CELLS, target, t)
}

fn decode_cell_voltages(
    data: &[u8],
    snapshot: &mut BatterySnapshot,
    tower: usize,
) -> Result<(), PacketError> {
    let target = snapshot.number_of_cells;
    let t = tower_mut(snapshot, tower)?;
    append_voltages(data, BLOCK_CELLS_OFFSET, BLOCK2_CELLS, target, t)
}

fn decode_cell_voltages_and_temps(
    data: &[u8],
    snapshot: &mut BatterySnapshot,
    tower: usize,
) -> Result<(), PacketError> {
    let cells = snapshot.number_of_cells;
    let temps = snapshot.number_of_temperatures;
    let t = tower_mut(snapshot, tower)?;
    append_voltages(data, BLOCK_CELLS_OFFSET, BLOCK3_CELLS, cells, t)?;
    append_temperatures(data, BLOCK3_TEMPS_OFFSET, BLOCK3_TEMPS, temps, t)
}

fn decode_cell_temps(
    data: &[u8],
    snapshot: &mut BatterySnapshot,
    tower: usize,
) -> Result<(), PacketError> {
    let temps = snapshot.number_of_temperatures;
    let t = tower_mut(snapshot, tower)?;
    append_temperatures(data, BLOCK4_TEMPS_OFFSET, BLOCK4_TEMPS, temps, t)
}

fn decode_extended_summary(
    data: &[u8],
    snapshot: &mut BatterySnapshot,
    tower: usize,
) -> Result<(), PacketError> {
    let target = snapshot.number_of_cells;
    let t = tower_mut(snapshot, tower)?;

    let bitmap = data
        .get(BALANCING_OFFSET..BALANCING_OFFSET + frames::BALANCING_LEN)
        .ok_or(PacketError::Truncated {
            offset: BALANCING_OFFSET,
            len: data.len(),
        })?;
    t.balancing_count = balancing_count(bitmap);

    append_voltages(data, SUMMARY_CELLS_OFFSET, EXTENDED_CELLS, target, t)
}

fn decode_extended_voltages(
    data: &[u8],
    snapshot: &mut BatterySnapshot,
    tower: usize,
) -> Result<(), PacketError> {
    let target = snapshot.number_of_cells;
    let t = tower_mut(snapshot, tower)?;
    append_voltages(data, BLOCK_CELLS_OFFSET, EXTENDED_CELLS, target, t)
}
