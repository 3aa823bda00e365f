//! Waypoint-following autopilot run by the authority.

use shared::navigation::{has_arrived, steering_intent};
use shared::{Pose, WaypointList};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutopilotState {
    #[default]
    Disabled,
    /// Heading for the waypoint at this index.
    Seeking(usize),
}

/// Result of one navigation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutopilotStep {
    /// Not engaged; the helm keeps control.
    Idle,
    /// Helm position in [-1, 1] toward the current waypoint.
    Steering(f32),
    /// The last waypoint was reached this tick and the autopilot disengaged.
    Completed,
}

#[derive(Debug, Default)]
pub struct Autopilot {
    state: AutopilotState,
}

impl Autopilot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AutopilotState {
        self.state
    }

    pub fn is_engaged(&self) -> bool {
        matches!(self.state, AutopilotState::Seeking(_))
    }

    /// Starts the course from its first waypoint. Refuses an empty course.
    pub fn engage(&mut self, course: &mut WaypointList) -> bool {
        if course.is_empty() {
            return false;
        }
        course.rewind();
        self.state = AutopilotState::Seeking(0);
        true
    }

    /// Returns true if the autopilot was engaged.
    pub fn disengage(&mut self) -> bool {
        let was_engaged = self.is_engaged();
        self.state = AutopilotState::Disabled;
        was_engaged
    }

    /// Advances at most one waypoint per call, however far the hull overshot.
    pub fn update(
        &mut self,
        pose: &Pose,
        course: &mut WaypointList,
        max_rudder_angle: f32,
    ) -> AutopilotStep {
        if !self.is_engaged() {
            return AutopilotStep::Idle;
        }

        let Some(mut target) = course.current() else {
            self.state = AutopilotState::Disabled;
            return AutopilotStep::Completed;
        };

        if has_arrived(pose, &target) {
            course.advance();
            match course.current() {
                Some(next) => target = next,
                None => {
                    self.state = AutopilotState::Disabled;
                    return AutopilotStep::Completed;
                }
            }
        }

        self.state = AutopilotState::Seeking(course.cursor());
        AutopilotStep::Steering(steering_intent(pose, &target, max_rudder_angle))
    }
}
