//! Fixed-layout replies, parsed from the start of a validated frame.
//!
//! Field offsets in the comments are relative to byte 0 of the frame, i.e.
//! they include the 3 byte header.

use crate::error::PacketError;
use crate::utils::Utils;

use nom_derive::{Nom, Parse};

pub const SERIAL_LEN: usize = 19;
pub const BALANCING_LEN: usize = 16;

// {{{ IdentityFrame
/// Reply to `Request::ReadSerialNumber`.
#[derive(Clone, Debug, PartialEq, Nom)]
#[nom(BigEndian)]
pub struct IdentityFrame {
    #[nom(SkipBefore(3))]
    #[nom(Count = "SERIAL_LEN")]
    pub serial: Vec<u8>, // 3..22
    #[nom(SkipBefore(5))]
    pub bmu_a_major: u8, // 27
    pub bmu_a_minor: u8,
    pub bmu_b_major: u8,
    pub bmu_b_minor: u8,
    pub bms_major: u8, // 31
    pub bms_minor: u8,
    pub active_bmu: u8, // 33
    pub bms_board: u8,
    #[nom(SkipBefore(1))]
    pub modules_towers: u8, // 36
    #[nom(SkipBefore(1))]
    pub grid_type: u8, // 38
}

impl IdentityFrame {
    // the hardware generation is the third character of the serial
    pub fn hardware_type(&self) -> u8 {
        self.serial[2]
    }
}
// }}}

// {{{ StatusFrame
/// Reply to `Request::ReadStatus`.
#[derive(Clone, Debug, PartialEq, Nom)]
#[nom(BigEndian)]
pub struct StatusFrame {
    #[nom(SkipBefore(3))]
    pub soc: i16, // 3
    pub max_voltage: i16,
    pub min_voltage: i16,
    pub soh: i16,
    pub current: i16, // 11
    pub battery_voltage: u16,
    pub max_temperature: i16, // 15
    pub min_temperature: i16,
    pub battery_temperature: i16,
    #[nom(SkipBefore(8))]
    pub error: i16, // 29
    pub param_t_major: u8,
    pub param_t_minor: u8,
    #[nom(SkipBefore(2))]
    pub output_voltage: u16, // 35
    #[nom(Parse = "Utils::swapped_u32")]
    pub charge_total: u32, // 37
    #[nom(Parse = "Utils::swapped_u32")]
    pub discharge_total: u32, // 41
}
// }}}

// {{{ TowerSummaryFrame
/// Leading part of the first cell-block reply for a tower.
#[derive(Clone, Debug, PartialEq, Nom)]
#[nom(BigEndian)]
pub struct TowerSummaryFrame {
    #[nom(SkipBefore(5))]
    pub max_cell_voltage_mv: i16, // 5
    pub min_cell_voltage_mv: i16,
    pub max_cell_voltage_cell: u8, // 9
    pub min_cell_voltage_cell: u8,
    #[nom(SkipBefore(1))]
    pub max_cell_temp: u8, // 12
    #[nom(SkipBefore(1))]
    pub min_cell_temp: u8, // 14
    pub max_cell_temp_cell: u8,
    pub min_cell_temp_cell: u8,
    #[nom(Count = "BALANCING_LEN")]
    pub balancing: Vec<u8>, // 17..33
    #[nom(Parse = "Utils::swapped_u32")]
    pub charge_total: u32, // 33
    #[nom(Parse = "Utils::swapped_u32")]
    pub discharge_total: u32, // 37
    #[nom(SkipBefore(4))]
    pub battery_volt: i16, // 45
    #[nom(SkipBefore(4))]
    pub out_volt: i16, // 51
    pub soc_diagnosis: i16,
    pub soh: i16, // 55
    #[nom(SkipBefore(2))]
    pub state_high: u8, // 59
    pub state_low: u8,
}
// }}}

/// Run a nom-derive layout over a whole frame, mapping a short read onto the
/// packet error the engine reports.
pub fn parse_frame<'a, T>(data: &'a [u8]) -> Result<T, PacketError>
where
    T: Parse<&'a [u8]>,
{
    T::parse(data)
        .map(|(_, frame)| frame)
        .map_err(|_| PacketError::Truncated {
            offset: 0,
            len: data.len(),
        })
}
