//! Simulated slew state machine and jog step geometry.
//!
//! The device offers no usable position feedback while slewing, so goto
//! progress is faked by time integration: each poll tick advances the
//! reported coordinates toward the target at a fixed angular rate, using the
//! wall-clock delta since the previous tick. The integration is
//! delta-driven, so it stays correct under irregular poll cadence.

use mount_core::{
    EquatorialCoords, HorizontalDirection, SlewRate, TrackState, VerticalDirection,
};

use crate::protocol::STEPS_PER_REV;

/// Simulated slew rate, degrees per second, both axes.
pub const SLEW_RATE_DEG_PER_SEC: f64 = 1.0;

/// Degrees of arc per hour of right ascension.
const DEG_PER_HOUR: f64 = 15.0;

/// The simulated mount: reported position, slew target and tracking state.
///
/// Owned exclusively by the mount; mutated only by
/// [`start_slew`](Self::start_slew), [`set_position`](Self::set_position)
/// and the poll-driven [`tick`](Self::tick).
#[derive(Debug, Clone)]
pub struct SlewSimulator {
    current_ra: f64,
    current_dec: f64,
    target_ra: f64,
    target_dec: f64,
    track: TrackState,
}

impl Default for SlewSimulator {
    /// Parked at the celestial pole, idle.
    fn default() -> Self {
        Self {
            current_ra: 0.0,
            current_dec: 90.0,
            target_ra: 0.0,
            target_dec: 90.0,
            track: TrackState::Idle,
        }
    }
}

impl SlewSimulator {
    /// Reported position (RA hours, DEC degrees).
    pub fn position(&self) -> EquatorialCoords {
        EquatorialCoords {
            ra: self.current_ra,
            dec: self.current_dec,
        }
    }

    /// Current tracking state.
    pub fn track_state(&self) -> TrackState {
        self.track
    }

    /// Arm a slew toward the given target. Always overrides a slew already
    /// in progress.
    pub fn start_slew(&mut self, ra: f64, dec: f64) {
        self.target_ra = ra;
        self.target_dec = dec;
        self.track = TrackState::Slewing;
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Both axes integrate at [`SLEW_RATE_DEG_PER_SEC`]; right ascension is
    /// kept in hours, so its reached test and increment carry the 15×
    /// degrees-per-hour scaling. An axis whose remaining distance fits
    /// within this tick's increment snaps exactly onto the target; when both
    /// axes snap in the same tick the state moves to `Tracking` and `true`
    /// is returned. Ticks outside `Slewing` change nothing.
    pub fn tick(&mut self, dt_secs: f64) -> bool {
        if self.track != TrackState::Slewing {
            return false;
        }

        let da = SLEW_RATE_DEG_PER_SEC * dt_secs;
        let mut locked = 0;

        let dx = self.target_ra - self.current_ra;
        if dx.abs() * DEG_PER_HOUR <= da {
            self.current_ra = self.target_ra;
            locked += 1;
        } else if dx > 0.0 {
            self.current_ra += da / DEG_PER_HOUR;
        } else {
            self.current_ra -= da / DEG_PER_HOUR;
        }

        let dy = self.target_dec - self.current_dec;
        if dy.abs() <= da {
            self.current_dec = self.target_dec;
            locked += 1;
        } else if dy > 0.0 {
            self.current_dec += da;
        } else {
            self.current_dec -= da;
        }

        if locked == 2 {
            self.track = TrackState::Tracking;
            return true;
        }
        false
    }
}

//==============================================================================
// Jog geometry
//==============================================================================

/// Signed altitude step count for a vertical jog: a quarter revolution,
/// halved at the guide rate.
pub fn jog_steps_ns(direction: VerticalDirection, rate: SlewRate) -> i32 {
    let mut steps = STEPS_PER_REV / 4;
    if rate == SlewRate::Guide {
        steps /= 2;
    }
    match direction {
        VerticalDirection::North => steps,
        VerticalDirection::South => -steps,
    }
}

/// Signed azimuth step count for a horizontal jog: a full revolution,
/// halved at the guide rate.
pub fn jog_steps_we(direction: HorizontalDirection, rate: SlewRate) -> i32 {
    let mut steps = STEPS_PER_REV;
    if rate == SlewRate::Guide {
        steps /= 2;
    }
    match direction {
        HorizontalDirection::East => steps,
        HorizontalDirection::West => -steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slew_converges_monotonically_and_tracks() {
        let mut sim = SlewSimulator::default();
        sim.start_slew(1.0, 80.0);
        assert_eq!(sim.track_state(), TrackState::Slewing);

        let mut ra_dist = (1.0f64 - sim.position().ra).abs();
        let mut dec_dist = (80.0f64 - sim.position().dec).abs();
        let mut ticks = 0;

        while sim.track_state() == TrackState::Slewing {
            sim.tick(1.0);
            ticks += 1;
            assert!(ticks < 100, "slew did not converge");

            let pos = sim.position();
            let new_ra_dist = (1.0f64 - pos.ra).abs();
            let new_dec_dist = (80.0f64 - pos.dec).abs();
            assert!(new_ra_dist <= ra_dist, "RA distance grew");
            assert!(new_dec_dist <= dec_dist, "DEC distance grew");
            ra_dist = new_ra_dist;
            dec_dist = new_dec_dist;
        }

        // 1 h of RA is 15° of arc at 1 °/s; DEC needs only 10 s, so RA sets
        // the total: locked on the 15th one-second tick.
        assert_eq!(ticks, 15);
        assert_eq!(sim.track_state(), TrackState::Tracking);
        assert_eq!(sim.position().ra, 1.0);
        assert_eq!(sim.position().dec, 80.0);
    }

    #[test]
    fn ra_steps_in_hour_units() {
        let mut sim = SlewSimulator::default();
        sim.start_slew(1.0, 90.0);

        sim.tick(1.0);
        // 1 °/s over one second is 1/15 h of RA.
        assert!((sim.position().ra - 1.0 / 15.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_tick_changes_nothing() {
        let mut sim = SlewSimulator::default();
        sim.start_slew(1.0, 80.0);

        let before = sim.position();
        assert!(!sim.tick(0.0));
        assert_eq!(sim.position(), before);
        assert_eq!(sim.track_state(), TrackState::Slewing);
    }

    #[test]
    fn ticks_outside_slewing_are_inert() {
        let mut sim = SlewSimulator::default();
        let before = sim.position();

        assert!(!sim.tick(5.0));
        assert_eq!(sim.position(), before);
        assert_eq!(sim.track_state(), TrackState::Idle);

        sim.start_slew(0.0, 89.0);
        while sim.track_state() == TrackState::Slewing {
            sim.tick(1.0);
        }
        let parked = sim.position();
        sim.tick(10.0);
        assert_eq!(sim.position(), parked);
        assert_eq!(sim.track_state(), TrackState::Tracking);
    }

    #[test]
    fn axes_lock_independently() {
        let mut sim = SlewSimulator::default();
        // DEC is already on target; RA needs 15 s.
        sim.start_slew(1.0, 90.0);

        sim.tick(1.0);
        assert_eq!(sim.position().dec, 90.0);
        assert_eq!(sim.track_state(), TrackState::Slewing);

        for _ in 0..14 {
            sim.tick(1.0);
        }
        assert_eq!(sim.track_state(), TrackState::Tracking);
    }

    #[test]
    fn irregular_cadence_still_converges() {
        let mut sim = SlewSimulator::default();
        sim.start_slew(0.5, 85.0);

        for dt in [0.0, 0.25, 1.7, 0.05, 3.0, 0.25, 2.5, 0.1, 1.0] {
            sim.tick(dt);
        }
        // 8.85 s of integrated motion covers 7.5° of RA arc and 5° of DEC.
        assert_eq!(sim.track_state(), TrackState::Tracking);
    }

    #[test]
    fn new_goto_overrides_active_slew() {
        let mut sim = SlewSimulator::default();
        sim.start_slew(2.0, 0.0);
        sim.tick(1.0);

        sim.start_slew(0.0, 89.5);
        assert_eq!(sim.track_state(), TrackState::Slewing);
        while sim.track_state() == TrackState::Slewing {
            sim.tick(1.0);
        }
        assert_eq!(sim.position().dec, 89.5);
        assert_eq!(sim.position().ra, 0.0);
    }

    #[test]
    fn jog_step_geometry() {
        assert_eq!(jog_steps_ns(VerticalDirection::North, SlewRate::Max), 800);
        assert_eq!(jog_steps_ns(VerticalDirection::South, SlewRate::Max), -800);
        assert_eq!(jog_steps_ns(VerticalDirection::North, SlewRate::Guide), 400);
        assert_eq!(jog_steps_we(HorizontalDirection::East, SlewRate::Max), 3200);
        assert_eq!(jog_steps_we(HorizontalDirection::West, SlewRate::Find), -3200);
        assert_eq!(jog_steps_we(HorizontalDirection::West, SlewRate::Guide), -1600);
    }
}
