//! Rimlights: drive a sim-racing wheel rim's RPM strip and button LEDs from
//! shared-memory telemetry.

pub mod binding;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod indicator;
pub mod led;
pub mod protocol;
pub mod settings;
pub mod telemetry;
pub mod threshold;
pub mod transport;

pub use config::Config;
pub use dispatch::{CycleOutcome, Dispatcher, SessionGate};
pub use error::RimlightsError;
pub use frame::{LedGroup, LedMode};
pub use indicator::Indicator;
pub use led::Rgb;
pub use telemetry::TelemetryMap;
pub use transport::{SerialChannel, Transport, TransportError};
