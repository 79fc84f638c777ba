//! Direction and speed resolution
//!
//! A fire's `<direction>`/`<speed>` value is combined with prior state according
//! to its mode. Everything here works in degrees; callers convert the final
//! direction to radians once, after the mode has been applied.

use super::state::SequenceState;
use crate::consts::SPEED_EPSILON;
use crate::normalize_degrees;
use crate::pattern::ValueMode;

/// State a fire resolves against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireInputs {
    /// Firing bullet's direction in degrees
    pub direction: f32,
    /// Firing bullet's speed
    pub speed: f32,
    /// Angle from the firing bullet to the target, degrees
    pub aim: f32,
    pub sequence: SequenceState,
}

/// Fire direction in degrees.
///
/// `value` is `None` when the fire has no `<direction>` at all, which aims
/// straight at the target. A node without a `type` also aims.
pub fn resolve_direction(mode: Option<ValueMode>, value: Option<f32>, inputs: &FireInputs) -> f32 {
    let Some(value) = value else {
        return inputs.aim;
    };
    match mode {
        Some(ValueMode::Absolute) => value,
        Some(ValueMode::Relative) => inputs.direction + value,
        Some(ValueMode::Sequence) => inputs.sequence.last_direction + value,
        Some(ValueMode::Aim) | None => inputs.aim + value,
    }
}

/// Fire speed.
///
/// Without a `<speed>` the new bullet inherits the firer's speed, floored to
/// zero when that speed is degenerate.
pub fn resolve_speed(mode: Option<ValueMode>, value: Option<f32>, inputs: &FireInputs) -> f32 {
    let Some(value) = value else {
        return if inputs.speed.abs() < SPEED_EPSILON {
            0.0
        } else {
            inputs.speed
        };
    };
    match mode {
        Some(ValueMode::Relative) => inputs.speed + value,
        Some(ValueMode::Sequence) => inputs.sequence.last_speed + value,
        Some(ValueMode::Absolute) | Some(ValueMode::Aim) | None => value,
    }
}

/// Per-frame direction change (degrees) for `<changeDirection>`
pub fn direction_ramp(
    mode: Option<ValueMode>,
    value: f32,
    current: f32,
    aim: f32,
    term: u32,
) -> f32 {
    let term = term.max(1) as f32;
    match mode {
        Some(ValueMode::Absolute) => normalize_degrees(value - current) / term,
        Some(ValueMode::Relative) => value / term,
        Some(ValueMode::Sequence) => value,
        Some(ValueMode::Aim) | None => normalize_degrees(aim + value - current) / term,
    }
}

/// Per-frame change for `<changeSpeed>` and each `<accel>` axis
pub fn linear_ramp(mode: Option<ValueMode>, value: f32, current: f32, term: u32) -> f32 {
    let term = term.max(1) as f32;
    match mode {
        Some(ValueMode::Relative) => value / term,
        Some(ValueMode::Sequence) => value,
        Some(ValueMode::Absolute) | Some(ValueMode::Aim) | None => (value - current) / term,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn inputs(direction: f32, speed: f32, aim: f32, last_dir: f32, last_speed: f32) -> FireInputs {
        FireInputs {
            direction,
            speed,
            aim,
            sequence: SequenceState {
                last_direction: last_dir,
                last_speed,
            },
        }
    }

    #[test]
    fn test_direction_table() {
        let i = inputs(90.0, 2.0, 200.0, 30.0, 5.0);
        assert_eq!(resolve_direction(Some(ValueMode::Absolute), Some(10.0), &i), 10.0);
        assert_eq!(resolve_direction(Some(ValueMode::Relative), Some(10.0), &i), 100.0);
        assert_eq!(resolve_direction(Some(ValueMode::Aim), Some(10.0), &i), 210.0);
        assert_eq!(resolve_direction(Some(ValueMode::Sequence), Some(10.0), &i), 40.0);
        assert_eq!(resolve_direction(None, Some(10.0), &i), 210.0);
        assert_eq!(resolve_direction(None, None, &i), 200.0);
    }

    #[test]
    fn test_speed_table() {
        let i = inputs(0.0, 2.0, 0.0, 0.0, 5.0);
        assert_eq!(resolve_speed(Some(ValueMode::Absolute), Some(3.0), &i), 3.0);
        assert_eq!(resolve_speed(None, Some(3.0), &i), 3.0);
        assert_eq!(resolve_speed(Some(ValueMode::Relative), Some(3.0), &i), 5.0);
        assert_eq!(resolve_speed(Some(ValueMode::Sequence), Some(3.0), &i), 8.0);
    }

    #[test]
    fn test_missing_speed_inherits_or_floors() {
        let still = inputs(0.0, 0.0, 0.0, 0.0, 9.0);
        assert_eq!(resolve_speed(None, None, &still), 0.0);
        let nearly = inputs(0.0, 0.00001, 0.0, 0.0, 9.0);
        assert_eq!(resolve_speed(None, None, &nearly), 0.0);
        let moving = inputs(0.0, 120.0, 0.0, 0.0, 9.0);
        assert_eq!(resolve_speed(None, None, &moving), 120.0);
    }

    #[test]
    fn test_direction_ramp_takes_short_way() {
        // From 350 to 10 degrees is +20, not -340
        let step = direction_ramp(Some(ValueMode::Absolute), 10.0, 350.0, 0.0, 10);
        assert!((step - 2.0).abs() < 0.0001);
        assert_eq!(direction_ramp(Some(ValueMode::Relative), 90.0, 0.0, 0.0, 30), 3.0);
        assert_eq!(direction_ramp(Some(ValueMode::Sequence), 4.0, 0.0, 0.0, 30), 4.0);
        let aimed = direction_ramp(None, 0.0, 0.0, 90.0, 45);
        assert!((aimed - 2.0).abs() < 0.0001);
    }

    #[test]
    fn test_linear_ramp() {
        assert_eq!(linear_ramp(Some(ValueMode::Absolute), 4.0, 1.0, 3), 1.0);
        assert_eq!(linear_ramp(Some(ValueMode::Relative), -3.0, 1.0, 3), -1.0);
        assert_eq!(linear_ramp(Some(ValueMode::Sequence), 0.25, 1.0, 3), 0.25);
        assert_eq!(linear_ramp(None, 4.0, 1.0, 0), 3.0);
    }

    proptest! {
        #[test]
        fn prop_direction_formula(
            dir in -360.0f32..360.0,
            aim in -180.0f32..180.0,
            last in -360.0f32..360.0,
            v in -180.0f32..180.0,
        ) {
            let i = inputs(dir, 1.0, aim, last, 1.0);
            prop_assert_eq!(resolve_direction(Some(ValueMode::Absolute), Some(v), &i), v);
            prop_assert_eq!(resolve_direction(Some(ValueMode::Relative), Some(v), &i), dir + v);
            prop_assert_eq!(resolve_direction(Some(ValueMode::Aim), Some(v), &i), aim + v);
            prop_assert_eq!(resolve_direction(Some(ValueMode::Sequence), Some(v), &i), last + v);
        }

        #[test]
        fn prop_convert_after_combining(
            dir in 1.0f32..359.0,
            v in 1.0f32..179.0,
        ) {
            // Mixing a radian value into a degree formula is not the same thing
            let i = inputs(dir, 1.0, 0.0, 0.0, 1.0);
            let engine = resolve_direction(Some(ValueMode::Relative), Some(v), &i).to_radians();
            let premature = dir.to_radians() + v;
            prop_assert!((engine - premature).abs() > 1e-3);
            prop_assert!((engine - (dir + v).to_radians()).abs() < 1e-5);
        }

        #[test]
        fn prop_speed_never_degenerate(speed in -1e-5f32..1e-5) {
            let i = inputs(0.0, speed, 0.0, 0.0, 0.0);
            prop_assert_eq!(resolve_speed(None, None, &i), 0.0);
        }
    }
}
