pub use anyhow::{anyhow, bail, Error, Result};
pub use log::{debug, error, info, trace, warn};

pub use crate::{
    bydhvs::{
        BatterySnapshot, BatteryType, BydHvs, Decoder, Frame, PollOutcome, PollReport,
        PollSettings, Request, State, TcpTransport, TowerAttributes, Transport,
    },
    config::{self, Config},
    error::{PacketError, PollError, TransportError},
    options::Options,
    utils::Utils,
};
