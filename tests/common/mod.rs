#![allow(dead_code)]

use async_trait::async_trait;
use byd_hvs_bridge::prelude::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn settings() -> PollSettings {
    PollSettings {
        read_timeout: Duration::from_millis(200),
        settle_time: Duration::ZERO,
    }
}

pub struct Factory;

impl Factory {
    /// Append the CRC-16/MODBUS of `frame`, low byte first.
    pub fn seal(mut frame: Vec<u8>) -> Vec<u8> {
        let crc = crc16::State::<crc16::MODBUS>::calculate(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        frame
    }

    /// A read reply with `payload_len` data bytes. `fill` sees the whole
    /// frame, so offsets match the ones the decoders use.
    pub fn read_reply(payload_len: usize, fill: impl FnOnce(&mut [u8])) -> Vec<u8> {
        let mut frame = vec![0u8; payload_len + 3];
        frame[0] = 1;
        frame[1] = 3;
        frame[2] = payload_len as u8;
        fill(&mut frame);
        Self::seal(frame)
    }

    pub fn write_ack() -> Vec<u8> {
        Self::seal(vec![1, 16, 0x05, 0x50, 0x00, 0x02])
    }

    pub fn identity(modules: u8, towers: u8, hardware: u8) -> Vec<u8> {
        Self::read_reply(204, |f| {
            f[3..22].copy_from_slice(b"P03T2H0Z1234567    ");
            f[5] = hardware;
            f[27] = 3;
            f[28] = 16;
            f[29] = 3;
            f[30] = 16;
            f[31] = 3;
            f[32] = 24;
            f[36] = towers * 16 + modules;
            f[38] = 1;
        })
    }

    pub fn status() -> Vec<u8> {
        Self::read_reply(50, |f| {
            f[3..5].copy_from_slice(&85i16.to_be_bytes());
            f[5..7].copy_from_slice(&335i16.to_be_bytes());
            f[7..9].copy_from_slice(&331i16.to_be_bytes());
            f[9..11].copy_from_slice(&100i16.to_be_bytes());
            f[11..13].copy_from_slice(&(-52i16).to_be_bytes());
            f[13..15].copy_from_slice(&53_012u16.to_be_bytes());
            f[35..37].copy_from_slice(&52_900u16.to_be_bytes());
            f[37..41].copy_from_slice(&[0x07, 0xd0, 0x00, 0x00]);
            f[41..45].copy_from_slice(&[0x05, 0xdc, 0x00, 0x00]);
        })
    }

    pub fn battery_info(battery_type: u8, inverter: u8) -> Vec<u8> {
        Self::read_reply(6, |f| {
            f[3] = inverter;
            f[5] = battery_type;
        })
    }

    pub fn measurement_status() -> Vec<u8> {
        Self::read_reply(2, |_| {})
    }

    fn voltages(f: &mut [u8], offset: usize, count: usize, first_mv: i16) {
        for i in 0..count {
            let pos = offset + i * 2;
            f[pos..pos + 2].copy_from_slice(&(first_mv + i as i16).to_be_bytes());
        }
    }

    fn temperatures(f: &mut [u8], offset: usize, count: usize, first: u8) {
        for i in 0..count {
            f[offset + i] = first + i as u8;
        }
    }

    pub fn tower_summary() -> Vec<u8> {
        Self::read_reply(130, |f| {
            f[5..7].copy_from_slice(&3350i16.to_be_bytes());
            f[7..9].copy_from_slice(&3310i16.to_be_bytes());
            f[17] = 0x03;
            Self::voltages(f, 101, 16, 3300);
        })
    }

    pub fn cell_voltages(first_mv: i16) -> Vec<u8> {
        Self::read_reply(130, |f| Self::voltages(f, 5, 64, first_mv))
    }

    pub fn cell_voltages_and_temps(first_mv: i16, first_temp: u8) -> Vec<u8> {
        Self::read_reply(130, |f| {
            Self::voltages(f, 5, 48, first_mv);
            Self::temperatures(f, 103, 30, first_temp);
        })
    }

    pub fn cell_temps(first_temp: u8) -> Vec<u8> {
        Self::read_reply(130, |f| Self::temperatures(f, 5, 34, first_temp))
    }

    pub fn extended_summary() -> Vec<u8> {
        Self::read_reply(130, |f| {
            f[17] = 0xff;
            Self::voltages(f, 101, 16, 3428);
        })
    }

    pub fn extended_voltages() -> Vec<u8> {
        Self::read_reply(130, |f| Self::voltages(f, 5, 16, 3444))
    }

    /// The replies for one tower's measurement, including the second pass
    /// when `cells` needs it.
    pub fn tower_replies(cells: u16) -> Vec<Vec<u8>> {
        let mut replies = vec![
            Self::write_ack(),
            Self::measurement_status(),
            Self::tower_summary(),
            Self::cell_voltages(3316),
            Self::cell_voltages_and_temps(3380, 20),
            Self::cell_temps(50),
        ];

        if cells > 128 {
            replies.extend([
                Self::write_ack(),
                Self::write_ack(),
                Self::measurement_status(),
                Self::extended_summary(),
                Self::extended_voltages(),
            ]);
        }

        replies
    }

    /// A complete HVS dialogue (32 cells per module).
    pub fn hvs_dialogue(modules: u8, towers: u8) -> Vec<Vec<u8>> {
        let cells = (u16::from(modules) * 32).min(160);

        let mut replies = vec![
            Self::identity(modules, towers, b'3'),
            Self::status(),
            Self::battery_info(2, 3),
        ];
        for _ in 0..towers.max(1) {
            replies.extend(Self::tower_replies(cells));
        }
        replies
    }
}

#[derive(Debug)]
pub enum Reply {
    Data(Vec<u8>),
    Timeout,
    Closed,
}

#[derive(Debug, Default)]
pub struct TransportLog {
    pub opens: usize,
    pub closes: usize,
    pub writes: Vec<Vec<u8>>,
}

/// In-memory transport that plays back a fixed list of replies. Once the
/// script runs out every read times out.
pub struct ScriptedTransport {
    replies: VecDeque<Reply>,
    log: Arc<Mutex<TransportLog>>,
    gate: Option<Arc<Notify>>,
    refuse: bool,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Vec<u8>>) -> (Self, Arc<Mutex<TransportLog>>) {
        Self::with_replies(replies.into_iter().map(Reply::Data).collect())
    }

    pub fn with_replies(replies: Vec<Reply>) -> (Self, Arc<Mutex<TransportLog>>) {
        let log = Arc::new(Mutex::new(TransportLog::default()));
        let transport = Self {
            replies: replies.into(),
            log: log.clone(),
            gate: None,
            refuse: false,
        };
        (transport, log)
    }

    /// `open` waits until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// `open` fails as if the connection was refused.
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        if let Some(gate) = self.gate.clone() {
            gate.notified().await;
        }

        self.log.lock().unwrap().opens += 1;

        if self.refuse {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.log.lock().unwrap().writes.push(data.to_vec());
        Ok(())
    }

    async fn read(&mut self, max_wait: Duration) -> Result<Vec<u8>, TransportError> {
        match self.replies.pop_front() {
            Some(Reply::Data(data)) => Ok(data),
            Some(Reply::Closed) => Err(TransportError::Closed),
            Some(Reply::Timeout) | None => Err(TransportError::Timeout(max_wait)),
        }
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().closes += 1;
    }
}

pub fn states(numbers: impl IntoIterator<Item = u8>) -> Vec<State> {
    numbers
        .into_iter()
        .map(|n| State::try_from(n).unwrap())
        .collect()
}
