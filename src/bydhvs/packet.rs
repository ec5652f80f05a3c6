use crate::error::PacketError;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::convert::TryFrom;

/// Every reply comes from the BMU at this address.
pub const UNIT_ID: u8 = 1;

// 3 byte header (unit id, function, length) plus the 2 byte CRC
const HEADER_LEN: usize = 3;
const CHECKSUM_LEN: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum FunctionCode {
    ReadHolding = 3,
    WriteMultiple = 16,
}

/// CRC-16/MODBUS over `data`.
pub fn checksum(data: &[u8]) -> u16 {
    crc16::State::<crc16::MODBUS>::calculate(data)
}

/// A reply that passed validation. Decoders only accept this type, so a
/// buffer can never reach them without being checked first.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    function: FunctionCode,
    data: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn validate(data: &'a [u8]) -> Result<Self, PacketError> {
        let len = data.len();
        if len < HEADER_LEN + CHECKSUM_LEN {
            return Err(PacketError::TooShort(len));
        }

        if data[0] != UNIT_ID {
            return Err(PacketError::UnitId(data[0]));
        }

        let function =
            FunctionCode::try_from(data[1]).map_err(|_| PacketError::FunctionCode(data[1]))?;

        // write acknowledgements carry no length byte worth checking
        if function == FunctionCode::ReadHolding {
            let declared = data[2] as usize + HEADER_LEN + CHECKSUM_LEN;
            if declared != len {
                return Err(PacketError::LengthMismatch {
                    declared,
                    actual: len,
                });
            }
        }

        let residue = checksum(data);
        if residue != 0 {
            return Err(PacketError::Checksum(residue));
        }

        Ok(Self { function, data })
    }

    pub fn function(&self) -> FunctionCode {
        self.function
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

const READ_SERIAL_NUMBER: [u8; 8] = [0x01, 0x03, 0x00, 0x00, 0x00, 0x66, 0xc5, 0xe0];
const READ_STATUS: [u8; 8] = [0x01, 0x03, 0x05, 0x00, 0x00, 0x19, 0x84, 0xcc];
const READ_BATTERY_INFO: [u8; 8] = [0x01, 0x03, 0x00, 0x10, 0x00, 0x03, 0x04, 0x0e];
const START_MEASURE_BOX_1: [u8; 13] = [
    0x01, 0x10, 0x05, 0x50, 0x00, 0x02, 0x04, 0x00, 0x01, 0x81, 0x00, 0xf8, 0x53,
];
const START_MEASURE_BOX_2: [u8; 13] = [
    0x01, 0x10, 0x05, 0x50, 0x00, 0x02, 0x04, 0x00, 0x02, 0x81, 0x00, 0x08, 0x53,
];
const START_MEASURE_BOX_3: [u8; 13] = [
    0x01, 0x10, 0x05, 0x50, 0x00, 0x02, 0x04, 0x00, 0x03, 0x81, 0x00, 0x59, 0x93,
];
const READ_MEASUREMENT_STATUS: [u8; 8] = [0x01, 0x03, 0x05, 0x51, 0x00, 0x01, 0xd5, 0x17];
const READ_CELL_VOLT_TEMP: [u8; 8] = [0x01, 0x03, 0x05, 0x58, 0x00, 0x41, 0x04, 0xe5];
const SWITCH_PASS: [u8; 15] = [
    0x01, 0x10, 0x01, 0x00, 0x00, 0x03, 0x06, 0x44, 0x45, 0x42, 0x55, 0x47, 0x00, 0x17, 0x6f,
];
const EVENT_LOG_BMU: [u8; 13] = [
    0x01, 0x10, 0x05, 0xa0, 0x00, 0x02, 0x04, 0x00, 0x00, 0x81, 0x00, 0xa6, 0xd7,
];
const EVENT_LOG_TOWER_1: [u8; 13] = [
    0x01, 0x10, 0x05, 0xa0, 0x00, 0x02, 0x04, 0x00, 0x01, 0x81, 0x00, 0xf7, 0x17,
];
const EVENT_LOG_TOWER_2: [u8; 13] = [
    0x01, 0x10, 0x05, 0xa0, 0x00, 0x02, 0x04, 0x00, 0x02, 0x81, 0x00, 0x07, 0x17,
];
const EVENT_LOG_TOWER_3: [u8; 13] = [
    0x01, 0x10, 0x05, 0xa0, 0x00, 0x02, 0x04, 0x00, 0x03, 0x81, 0x00, 0x56, 0xd7,
];

/// The fixed command frames understood by the BMU. They already carry their
/// checksum and are sent verbatim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Request {
    ReadSerialNumber,
    ReadStatus,
    ReadBatteryInfo,
    StartMeasureBox1,
    StartMeasureBox2,
    StartMeasureBox3,
    ReadMeasurementStatus,
    ReadCellVoltTemp,
    SwitchPass,
    /// Select the event log of the BMU itself.
    EventLogBmu,
    /// Select the event log of the BMS in tower 1, 2 or 3.
    EventLogTower1,
    EventLogTower2,
    EventLogTower3,
}

impl Request {
    pub const ALL: [Request; 13] = [
        Request::ReadSerialNumber,
        Request::ReadStatus,
        Request::ReadBatteryInfo,
        Request::StartMeasureBox1,
        Request::StartMeasureBox2,
        Request::StartMeasureBox3,
        Request::ReadMeasurementStatus,
        Request::ReadCellVoltTemp,
        Request::SwitchPass,
        Request::EventLogBmu,
        Request::EventLogTower1,
        Request::EventLogTower2,
        Request::EventLogTower3,
    ];

    pub fn bytes(&self) -> &'static [u8] {
        use Request::*;

        match self {
            ReadSerialNumber => &READ_SERIAL_NUMBER,
            ReadStatus => &READ_STATUS,
            ReadBatteryInfo => &READ_BATTERY_INFO,
            StartMeasureBox1 => &START_MEASURE_BOX_1,
            StartMeasureBox2 => &START_MEASURE_BOX_2,
            StartMeasureBox3 => &START_MEASURE_BOX_3,
            ReadMeasurementStatus => &READ_MEASUREMENT_STATUS,
            ReadCellVoltTemp => &READ_CELL_VOLT_TEMP,
            SwitchPass => &SWITCH_PASS,
            EventLogBmu => &EVENT_LOG_BMU,
            EventLogTower1 => &EVENT_LOG_TOWER_1,
            EventLogTower2 => &EVENT_LOG_TOWER_2,
            EventLogTower3 => &EVENT_LOG_TOWER_3,
        }
    }

    /// The start-measurement variant addressing `tower`, if the BMU has one.
    pub fn start_measurement(tower: usize) -> Option<Self> {
        match tower {
            0 => Some(Request::StartMeasureBox1),
            1 => Some(Request::StartMeasureBox2),
            2 => Some(Request::StartMeasureBox3),
            _ => None,
        }
    }

    /// The event-log selector for `tower`, if the BMU has one.
    pub fn tower_event_log(tower: usize) -> Option<Self> {
        match tower {
            0 => Some(Request::EventLogTower1),
            1 => Some(Request::EventLogTower2),
            2 => Some(Request::EventLogTower3),
            _ => None,
        }
    }
}
