//! Overlay state machine.
//! Every hotkey and worker message becomes an [`OverlayEvent`]; [`Overlay::apply`] is the only
//! place state changes. Invalid transitions are rejected and leave the overlay untouched.

use std::fmt;

use crate::hint::AnalysisResult;

const PULSE_MIN: u8 = 80;
const PULSE_MAX: u8 = 255;
const PULSE_STEP: i16 = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayState {
    /// Inert: nothing is drawn and scans are refused.
    Disarmed,
    /// Ready, showing the idle dot.
    Armed,
    /// One capture-and-analyze worker is in flight.
    Scanning,
    Success,
    Error,
}

#[derive(Clone, Debug)]
pub enum OverlayEvent {
    ToggleArm,
    Scan,
    Clear,
    Recall,
    Reset,
    ToggleVisibility,
    Quit,
    /// Posted by the scan worker. Errors arrive already rendered to text.
    ScanCompleted(Result<AnalysisResult, String>),
}

impl OverlayEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OverlayEvent::ToggleArm => "toggle-arm",
            OverlayEvent::Scan => "scan",
            OverlayEvent::Clear => "clear",
            OverlayEvent::Recall => "recall",
            OverlayEvent::Reset => "reset",
            OverlayEvent::ToggleVisibility => "toggle-visibility",
            OverlayEvent::Quit => "quit",
            OverlayEvent::ScanCompleted(_) => "scan-completed",
        }
    }
}

/// Side effect the UI thread must perform after a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    None,
    /// Make the layer visible and topmost.
    Raise,
    StartScan,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionError {
    NotArmed,
    ScanInFlight,
    NotScanning,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::NotArmed => write!(f, "overlay is disarmed"),
            TransitionError::ScanInFlight => write!(f, "a scan is already in flight"),
            TransitionError::NotScanning => write!(f, "no scan in flight"),
        }
    }
}

/// Alpha of the status dot; bounces between 80 and 255 while scanning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pulse {
    alpha: u8,
    step: i16,
}

impl Default for Pulse {
    fn default() -> Self {
        Self {
            alpha: PULSE_MAX,
            step: -PULSE_STEP,
        }
    }
}

impl Pulse {
    pub fn alpha(&self) -> u8 {
        self.alpha
    }

    fn advance(&mut self) {
        let next = (self.alpha as i16 + self.step).clamp(PULSE_MIN as i16, PULSE_MAX as i16);
        if next == PULSE_MIN as i16 || next == PULSE_MAX as i16 {
            self.step = -self.step;
        }
        self.alpha = next as u8;
    }
}

#[derive(Debug)]
pub struct Overlay {
    state: OverlayState,
    current: Option<AnalysisResult>,
    last_success: Option<AnalysisResult>,
    last_error: Option<String>,
    visible: bool,
    pulse: Pulse,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            state: OverlayState::Disarmed,
            current: None,
            last_success: None,
            last_error: None,
            visible: true,
            pulse: Pulse::default(),
        }
    }
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    /// Result currently on screen.
    pub fn current(&self) -> Option<&AnalysisResult> {
        self.current.as_ref()
    }

    #[cfg(test)]
    pub fn last_success(&self) -> Option<&AnalysisResult> {
        self.last_success.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn pulse(&self) -> Pulse {
        self.pulse
    }

    pub fn apply(&mut self, event: OverlayEvent) -> Result<Command, TransitionError> {
        use OverlayState::*;

        match event {
            OverlayEvent::ToggleArm => match self.state {
                Disarmed => {
                    self.state = Armed;
                    Ok(Command::Raise)
                }
                Scanning => Err(TransitionError::ScanInFlight),
                Armed | Success | Error => {
                    self.state = Disarmed;
                    self.current = None;
                    Ok(Command::None)
                }
            },
            OverlayEvent::Scan => match self.state {
                Disarmed => Err(TransitionError::NotArmed),
                Scanning => Err(TransitionError::ScanInFlight),
                Armed | Success | Error => {
                    self.state = Scanning;
                    self.current = None;
                    Ok(Command::StartScan)
                }
            },
            OverlayEvent::Clear => match self.state {
                Disarmed => Err(TransitionError::NotArmed),
                Scanning => Err(TransitionError::ScanInFlight),
                Armed | Success | Error => {
                    self.state = Armed;
                    self.current = None;
                    Ok(Command::None)
                }
            },
            OverlayEvent::Recall => {
                if let Some(result) = &self.last_success {
                    self.current = Some(result.clone());
                    if matches!(self.state, Armed | Error) {
                        self.state = Success;
                    }
                }
                Ok(Command::None)
            }
            OverlayEvent::Reset => {
                self.current = None;
                self.last_success = None;
                self.last_error = None;
                if matches!(self.state, Success | Error) {
                    self.state = Armed;
                }
                Ok(Command::None)
            }
            OverlayEvent::ToggleVisibility => {
                self.visible = !self.visible;
                Ok(Command::None)
            }
            OverlayEvent::Quit => Ok(Command::Quit),
            OverlayEvent::ScanCompleted(outcome) => {
                if self.state != Scanning {
                    return Err(TransitionError::NotScanning);
                }
                match outcome {
                    Ok(result) => {
                        self.state = Success;
                        self.last_success = Some(result.clone());
                        self.current = Some(result);
                        self.last_error = None;
                    }
                    Err(message) => {
                        self.state = Error;
                        self.last_error = Some(message);
                    }
                }
                Ok(Command::None)
            }
        }
    }

    /// Advances the pulse animation by one frame.
    pub fn tick(&mut self) {
        if self.state == OverlayState::Scanning {
            self.pulse.advance();
        } else {
            self.pulse = Pulse::default();
        }
    }
}
