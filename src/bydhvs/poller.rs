use crate::prelude::*;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Serialize, Serializer};
use serde_with::{serde_as, DisplayFromStr};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::decoder::Decoder;
use super::packet::{Frame, Request};
use super::snapshot::BatterySnapshot;
use super::transport::{TcpTransport, Transport};

/// Systems with more cells than this need the second acquisition pass.
pub const SINGLE_PASS_CELLS: u16 = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum State {
    Idle = 0,
    Starting = 1,
    ReadIdentity = 2,
    ReadStatus = 3,
    ReadBatteryInfo = 4,
    StartMeasurement = 5,
    MeasurementStatus = 6,
    CellBlock1 = 7,
    CellBlock2 = 8,
    CellBlock3 = 9,
    CellBlock4 = 10,
    SwitchPass = 11,
    StartMeasurementPass2 = 12,
    MeasurementStatusPass2 = 13,
    ExtendedBlock1 = 14,
    ExtendedBlock2 = 15,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

impl Serialize for State {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*self))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSettings {
    pub read_timeout: Duration,
    pub settle_time: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            read_timeout: config::DEFAULT_READ_TIMEOUT,
            settle_time: config::DEFAULT_SETTLE_TIME,
        }
    }
}

impl PollSettings {
    pub fn from_config(battery: &config::Battery) -> Self {
        Self {
            read_timeout: battery.read_timeout(),
            settle_time: battery.settle_time(),
        }
    }
}

/// Result of one cycle that actually ran. The snapshot holds whatever was
/// decoded before the cycle ended, successful or not.
#[serde_as]
#[derive(Debug, Serialize)]
pub struct PollReport {
    pub polled_at: chrono::DateTime<chrono::Local>,
    pub snapshot: BatterySnapshot,
    pub trace: Vec<State>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub failure: Option<PollError>,
}

impl PollReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollOutcome {
    Finished(PollReport),
    /// A cycle was already in progress; nothing was sent and nothing changed.
    AlreadyRunning,
}

impl PollOutcome {
    pub fn report(&self) -> Option<&PollReport> {
        match self {
            PollOutcome::Finished(report) => Some(report),
            PollOutcome::AlreadyRunning => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.report().map_or(false, PollReport::is_complete)
    }
}

// Puts the live state back to Idle however the cycle ends, including when
// the cycle future is dropped half way.
struct ResetOnDrop<'a>(&'a AtomicU8);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(State::Idle.into(), Ordering::Release);
    }
}

// per-cycle working data
struct Cycle {
    snapshot: BatterySnapshot,
    tower: usize,
    trace: Vec<State>,
}

/// Drives the request/response dialogue with one BMU.
pub struct BydHvs<T: Transport> {
    label: String,
    settings: PollSettings,
    transport: Mutex<T>,
    state: AtomicU8,
}

impl BydHvs<TcpTransport> {
    pub fn from_config(battery: &config::Battery) -> Self {
        Self::new(
            battery.label(),
            TcpTransport::from_config(battery),
            PollSettings::from_config(battery),
        )
    }
}

impl<T: Transport> BydHvs<T> {
    pub fn new(label: impl Into<String>, transport: T, settings: PollSettings) -> Self {
        Self {
            label: label.into(),
            settings,
            transport: Mutex::new(transport),
            state: AtomicU8::new(State::Idle.into()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    pub fn state(&self) -> State {
        State::try_from(self.state.load(Ordering::Acquire)).unwrap_or(State::Idle)
    }

    /// Run one full dialogue and return what was learned. Never returns an
    /// error: failures are carried inside the report.
    pub async fn run_poll_cycle(&self) -> PollOutcome {
        if self
            .state
            .compare_exchange(
                State::Idle.into(),
                State::Starting.into(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            warn!("{}: poll cycle already running (state {})", self.label, self.state());
            return PollOutcome::AlreadyRunning;
        }
        let _reset = ResetOnDrop(&self.state);

        let mut cycle = Cycle {
            snapshot: BatterySnapshot::default(),
            tower: 0,
            trace: Vec::new(),
        };

        let mut transport = self.transport.lock().await;
        let result = self.drive(&mut *transport, &mut cycle).await;
        transport.close().await;

        let failure = match result {
            Ok(()) => {
                info!(
                    "{}: poll cycle finished, soc={}% cells={} towers={}",
                    self.label,
                    cycle.snapshot.soc,
                    cycle.snapshot.number_of_cells,
                    cycle.snapshot.tower_count()
                );
                None
            }
            Err(e) => {
                error!("{}: poll cycle aborted: {}", self.label, e);
                Some(e)
            }
        };

        PollOutcome::Finished(PollReport {
            polled_at: chrono::Local::now(),
            snapshot: cycle.snapshot,
            trace: cycle.trace,
            failure,
        })
    }

    /// Connects, then walks the dialogue states. The live state reads
    /// `Starting` while connecting; the trace begins at the first request.
    async fn drive(&self, transport: &mut T, cycle: &mut Cycle) -> Result<(), PollError> {
        transport.open().await.map_err(|source| PollError::Connection {
            state: State::Starting,
            source,
        })?;

        let mut state = State::ReadIdentity;

        while state != State::Idle {
            self.state.store(state.into(), Ordering::Release);
            cycle.trace.push(state);
            trace!("{}: entering state {:?} ({})", self.label, state, state);

            state = self.step(state, transport, cycle).await?;
        }

        Ok(())
    }

    async fn step(
        &self,
        state: State,
        transport: &mut T,
        cycle: &mut Cycle,
    ) -> Result<State, PollError> {
        use State::*;

        let next = match state {
            // connecting is done by `drive` before the first step
            Idle | Starting => Idle,

            ReadIdentity => {
                let decoder = Some(Decoder::Identity);
                self.exchange(transport, state, Request::ReadSerialNumber, decoder, cycle)
                    .await?;
                cycle.snapshot.allocate_towers();
                ReadStatus
            }

            ReadStatus => {
                let decoder = Some(Decoder::Status);
                self.exchange(transport, state, Request::ReadStatus, decoder, cycle)
                    .await?;
                ReadBatteryInfo
            }

            ReadBatteryInfo => {
                let decoder = Some(Decoder::BatteryInfo);
                self.exchange(transport, state, Request::ReadBatteryInfo, decoder, cycle)
                    .await?;

                let snapshot = &cycle.snapshot;
                if snapshot.number_of_cells > 0 && snapshot.number_of_temperatures > 0 {
                    StartMeasurement
                } else {
                    info!(
                        "{}: no cell data to read (battery type {:?}, {} modules)",
                        self.label, snapshot.battery_type, snapshot.modules
                    );
                    Idle
                }
            }

            StartMeasurement | StartMeasurementPass2 => {
                let request = Request::start_measurement(cycle.tower)
                    .ok_or(PollError::UnsupportedTower(cycle.tower))?;
                self.exchange(transport, state, request, None, cycle).await?;

                debug!(
                    "{}: tower {} measuring, waiting {:?}",
                    self.label, cycle.tower, self.settings.settle_time
                );
                tokio::time::sleep(self.settings.settle_time).await;

                if state == StartMeasurement {
                    MeasurementStatus
                } else {
                    MeasurementStatusPass2
                }
            }

            MeasurementStatus | MeasurementStatusPass2 => {
                self.exchange(transport, state, Request::ReadMeasurementStatus, None, cycle)
                    .await?;

                if state == MeasurementStatus {
                    CellBlock1
                } else {
                    ExtendedBlock1
                }
            }

            CellBlock1 => {
                self.read_cells(transport, state, Decoder::TowerSummary, cycle).await?;
                CellBlock2
            }
            CellBlock2 => {
                self.read_cells(transport, state, Decoder::CellVoltages, cycle).await?;
                CellBlock3
            }
            CellBlock3 => {
                self.read_cells(transport, state, Decoder::CellVoltagesAndTemps, cycle)
                    .await?;
                CellBlock4
            }
            CellBlock4 => {
                self.read_cells(transport, state, Decoder::CellTemps, cycle).await?;

                if cycle.snapshot.number_of_cells > SINGLE_PASS_CELLS {
                    SwitchPass
                } else {
                    Self::next_tower(cycle)
                }
            }

            SwitchPass => {
                self.exchange(transport, state, Request::SwitchPass, None, cycle).await?;
                StartMeasurementPass2
            }

            ExtendedBlock1 => {
                self.read_cells(transport, state, Decoder::ExtendedSummary, cycle).await?;
                ExtendedBlock2
            }
            ExtendedBlock2 => {
                self.read_cells(transport, state, Decoder::ExtendedVoltages, cycle).await?;
                Self::next_tower(cycle)
            }
        };

        Ok(next)
    }

    fn next_tower(cycle: &mut Cycle) -> State {
        cycle.tower += 1;
        if cycle.tower < cycle.snapshot.tower_count() {
            State::StartMeasurement
        } else {
            State::Idle
        }
    }

    async fn read_cells(
        &self,
        transport: &mut T,
        state: State,
        decoder: Decoder,
        cycle: &mut Cycle,
    ) -> Result<(), PollError> {
        self.exchange(transport, state, Request::ReadCellVoltTemp, Some(decoder), cycle)
            .await
    }

    /// Send `request`, wait for one reply, validate it and hand it to
    /// `decoder` if there is one.
    async fn exchange(
        &self,
        transport: &mut T,
        state: State,
        request: Request,
        decoder: Option<Decoder>,
        cycle: &mut Cycle,
    ) -> Result<(), PollError> {
        let connection = |source| PollError::Connection { state, source };
        let protocol = |source| PollError::Protocol { state, source };

        transport.write(request.bytes()).await.map_err(connection)?;
        let reply = transport
            .read(self.settings.read_timeout)
            .await
            .map_err(connection)?;

        let frame = Frame::validate(&reply).map_err(|e| {
            warn!("{}: invalid reply to {:?}: {}", self.label, request, e);
            protocol(e)
        })?;

        if let Some(decoder) = decoder {
            decoder
                .decode(&frame, &mut cycle.snapshot, cycle.tower)
                .map_err(protocol)?;
        }

        Ok(())
    }
}
