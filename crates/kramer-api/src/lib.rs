// kramer-api: Driver boundary for Kramer AV matrix switches.
//
// Wire protocols live behind the `Connector` / `MediaSwitch` traits; this
// crate only defines them, their error type, and a simulated device.

pub mod error;
pub mod sim;
pub mod switch;

pub use error::Error;
pub use sim::{Fault, IoStats, SimConnector, SimSwitch, SimulatedMatrix};
pub use switch::{Connector, ENDPOINT_SCHEME, Endpoint, MediaSwitch};
