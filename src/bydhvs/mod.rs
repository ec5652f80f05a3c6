pub mod decoder;
pub mod frames;
pub mod packet;
pub mod poller;
pub mod snapshot;
pub mod tables;
pub mod transport;

pub use decoder::Decoder;
pub use packet::{Frame, FunctionCode, Request};
pub use poller::{BydHvs, PollOutcome, PollReport, PollSettings, State};
pub use snapshot::{BatterySnapshot, TowerAttributes};
pub use tables::BatteryType;
pub use transport::{TcpTransport, Transport};
