// ── Simulated matrix switch ──
//
// In-memory device implementing the driver traits. Used by tests and by
// the CLI harness in place of real hardware. Supports fault injection,
// artificial latency, and counts every device I/O call.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::Error;
use crate::switch::{Connector, Endpoint, MediaSwitch};

/// A failure the simulated device raises on its next I/O call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Transport timeout.
    Timeout,
    /// Connection refused.
    Refused,
    /// Garbled response.
    Protocol,
}

/// Number of device I/O calls observed by the simulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStats {
    pub connects: u64,
    pub updates: u64,
    pub selects: u64,
}

impl IoStats {
    pub fn total(&self) -> u64 {
        self.connects + self.updates + self.selects
    }
}

#[derive(Debug)]
struct MatrixState {
    input_count: u32,
    selected: u32,
    online: bool,
    faults: VecDeque<Fault>,
    latency: Duration,
    stats: IoStats,
}

impl MatrixState {
    /// Pop the next injected fault, or fail persistently while offline.
    fn check(&mut self, endpoint: &str) -> Result<(), Error> {
        let fault = match self.faults.pop_front() {
            Some(fault) => fault,
            None if !self.online => Fault::Refused,
            None => return Ok(()),
        };

        debug!(?fault, endpoint, "simulated switch raising fault");
        Err(match fault {
            Fault::Timeout => Error::Timeout {
                endpoint: endpoint.to_owned(),
            },
            Fault::Refused => Error::ConnectionRefused {
                endpoint: endpoint.to_owned(),
            },
            Fault::Protocol => Error::Protocol("simulated malformed response".into()),
        })
    }
}

/// Shared handle to one simulated device.
///
/// Cheaply cloneable; every clone, connector and session observes the
/// same device.
#[derive(Debug, Clone)]
pub struct SimulatedMatrix {
    state: Arc<Mutex<MatrixState>>,
}

impl SimulatedMatrix {
    /// A device with `input_count` inputs, routing input 1 (or 0 if it has none).
    pub fn new(input_count: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(MatrixState {
                input_count,
                selected: input_count.min(1),
                online: true,
                faults: VecDeque::new(),
                latency: Duration::ZERO,
                stats: IoStats::default(),
            })),
        }
    }

    /// Builder-style override of the routed input.
    pub fn with_selected(self, selected: u32) -> Self {
        self.set_selected(selected);
        self
    }

    /// Change the number of inputs, e.g. after a hardware swap.
    pub fn set_input_count(&self, input_count: u32) {
        let mut state = self.lock();
        state.input_count = input_count;
        state.selected = state.selected.min(input_count);
    }

    /// Route an input from "the front panel", bypassing any session.
    pub fn set_selected(&self, selected: u32) {
        let mut state = self.lock();
        state.selected = selected.min(state.input_count);
    }

    pub fn selected(&self) -> u32 {
        self.lock().selected
    }

    pub fn input_count(&self) -> u32 {
        self.lock().input_count
    }

    /// While offline every connect and update is refused.
    pub fn set_online(&self, online: bool) {
        self.lock().online = online;
    }

    /// Queue a fault for the next I/O call. Faults are consumed in order.
    pub fn fail_next(&self, fault: Fault) {
        self.lock().faults.push_back(fault);
    }

    /// Delay applied to every I/O call, outside the device lock.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    pub fn stats(&self) -> IoStats {
        self.lock().stats
    }

    /// A connector dialing this device.
    pub fn connector(&self) -> SimConnector {
        SimConnector {
            matrix: self.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MatrixState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one I/O call: count it, wait out the latency, apply faults,
    /// then hand the device state to `op`.
    fn io<T>(
        &self,
        endpoint: &str,
        count: impl FnOnce(&mut IoStats),
        op: impl FnOnce(&mut MatrixState) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let latency = {
            let mut state = self.lock();
            count(&mut state.stats);
            state.latency
        };

        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        let mut state = self.lock();
        state.check(endpoint)?;
        op(&mut state)
    }
}

impl Default for SimulatedMatrix {
    fn default() -> Self {
        Self::new(4)
    }
}

/// [`Connector`] for a [`SimulatedMatrix`].
#[derive(Debug, Clone)]
pub struct SimConnector {
    matrix: SimulatedMatrix,
}

impl SimConnector {
    pub fn matrix(&self) -> &SimulatedMatrix {
        &self.matrix
    }
}

impl Connector for SimConnector {
    type Switch = SimSwitch;

    fn connect(&self, endpoint: &str) -> Result<SimSwitch, Error> {
        let parsed: Endpoint = endpoint.parse()?;
        let (input_count, selected) = self.matrix.io(
            endpoint,
            |stats| stats.connects += 1,
            |state| Ok((state.input_count, state.selected)),
        )?;

        debug!(host = %parsed.host, input_count, selected, "simulated session opened");
        Ok(SimSwitch {
            matrix: self.matrix.clone(),
            endpoint: endpoint.to_owned(),
            input_count,
            selected,
        })
    }
}

/// A session with a simulated device.
#[derive(Debug)]
pub struct SimSwitch {
    matrix: SimulatedMatrix,
    endpoint: String,
    input_count: u32,
    selected: u32,
}

impl MediaSwitch for SimSwitch {
    fn update(&mut self) -> Result<(), Error> {
        let (input_count, selected) = self.matrix.io(
            &self.endpoint,
            |stats| stats.updates += 1,
            |state| Ok((state.input_count, state.selected)),
        )?;
        trace!(input_count, selected, "simulated state read");
        self.input_count = input_count;
        self.selected = selected;
        Ok(())
    }

    fn select_source(&mut self, index: u32) -> Result<(), Error> {
        self.matrix.io(
            &self.endpoint,
            |stats| stats.selects += 1,
            |state| {
                if index > state.input_count {
                    return Err(Error::SourceOutOfRange {
                        index,
                        input_count: state.input_count,
                    });
                }
                state.selected = index;
                Ok(())
            },
        )?;
        self.selected = index;
        Ok(())
    }

    fn input_count(&self) -> u32 {
        self.input_count
    }

    fn selected_source(&self) -> u32 {
        self.selected
    }
}
