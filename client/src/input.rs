//! Console helm: parses typed orders into sequenced vessel commands

use shared::{Packet, Vec3, VesselCommand};

/// What a line of console input asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputAction {
    /// Send a command to the authority.
    Command(VesselCommand),
    /// Print the current vessel status.
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
Orders:
  w | +            throttle up one notch
  s | -            throttle down one notch
  x | stop         emergency stop
  a | d | c        helm to port / starboard / centre
  helm <value>     helm position in [-1, 1]
  wp <x> <y>       add a waypoint
  auto             toggle autopilot
  clear            clear waypoints
  status | help | quit";

/// Turns console orders into commands and numbers them for the authority.
pub struct InputManager {
    next_sequence: u32,
    steering_axis: f32,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            next_sequence: 1,
            steering_axis: 0.0,
        }
    }

    /// Current helm position in [-1, 1], fed to the local predictor.
    pub fn steering_axis(&self) -> f32 {
        self.steering_axis
    }

    /// Parses one console line. Unknown or malformed orders yield None.
    pub fn parse_line(&mut self, line: &str) -> Option<InputAction> {
        let mut words = line.split_whitespace();
        let order = words.next()?.to_ascii_lowercase();

        let action = match order.as_str() {
            "w" | "+" => InputAction::Command(VesselCommand::ChangeThrottle { delta: 1 }),
            "s" | "-" => InputAction::Command(VesselCommand::ChangeThrottle { delta: -1 }),
            "x" | "stop" => InputAction::Command(VesselCommand::EmergencyStop),
            "a" => self.steer(-1.0),
            "d" => self.steer(1.0),
            "c" => self.steer(0.0),
            "helm" => {
                let value: f32 = words.next()?.parse().ok()?;
                if !value.is_finite() {
                    return None;
                }
                self.steer(value)
            }
            "wp" => {
                let x: f32 = words.next()?.parse().ok()?;
                let y: f32 = words.next()?.parse().ok()?;
                if !x.is_finite() || !y.is_finite() {
                    return None;
                }
                InputAction::Command(VesselCommand::AddWaypoint {
                    point: Vec3::new(x, y, 0.0),
                })
            }
            "auto" => InputAction::Command(VesselCommand::ToggleAutopilot),
            "clear" => InputAction::Command(VesselCommand::ClearWaypoints),
            "status" => InputAction::Status,
            "help" | "?" => InputAction::Help,
            "quit" | "q" | "exit" => InputAction::Quit,
            _ => return None,
        };
        Some(action)
    }

    fn steer(&mut self, axis: f32) -> InputAction {
        self.steering_axis = axis.clamp(-1.0, 1.0);
        InputAction::Command(VesselCommand::Steer {
            axis: self.steering_axis,
        })
    }

    /// Wraps a command with the next sequence number.
    pub fn sequence(&mut self, command: VesselCommand) -> Packet {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Packet::Command { sequence, command }
    }

    /// Sequence numbers restart on a new connection.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
