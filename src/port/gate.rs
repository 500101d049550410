//! Flow-control gate.
//!
//! Folds the handshake mode, the last inbound XON/XOFF and the CTS level into
//! one open/blocked verdict. The gate is a pure function of those three
//! inputs and is recomputed on every line event.

use super::lines::LineEvent;
use super::traits::{ControlByte, Handshake};
use serde::Serialize;

/// Transmit verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
    Open,
    Blocked,
}

#[derive(Debug, Clone)]
pub struct FlowControlGate {
    handshake: Handshake,
    /// Set by XOFF, cleared by XON.
    software_blocked: bool,
    cts: bool,
    state: GateState,
}

impl FlowControlGate {
    pub fn new(handshake: Handshake, cts: bool) -> Self {
        let mut gate = Self {
            handshake,
            software_blocked: false,
            cts,
            state: GateState::Open,
        };
        gate.state = gate.evaluate();
        gate
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == GateState::Open
    }

    pub fn handshake(&self) -> Handshake {
        self.handshake
    }

    /// Last CTS level seen.
    pub fn cts(&self) -> bool {
        self.cts
    }

    /// XOFF in effect. Always `false` when the handshake ignores XON/XOFF.
    pub fn software_blocked(&self) -> bool {
        self.handshake.uses_software() && self.software_blocked
    }

    /// Apply one line event; returns `true` if the verdict changed.
    pub fn apply(&mut self, event: LineEvent) -> bool {
        match event {
            LineEvent::Cts(level) => self.cts = level,
            LineEvent::Control(ControlByte::XOff) => self.software_blocked = true,
            LineEvent::Control(ControlByte::XOn) => self.software_blocked = false,
        }
        self.recompute()
    }

    fn recompute(&mut self) -> bool {
        let next = self.evaluate();
        let changed = next != self.state;
        self.state = next;
        changed
    }

    fn evaluate(&self) -> GateState {
        let hardware_ok = !self.handshake.uses_hardware() || self.cts;
        let software_ok = !self.handshake.uses_software() || !self.software_blocked;
        if hardware_ok && software_ok {
            GateState::Open
        } else {
            GateState::Blocked
        }
    }
}
