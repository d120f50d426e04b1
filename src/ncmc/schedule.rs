//! Switching schedules for the protocol parameter λ

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a schedule is malformed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("Schedule has no values")]
    Empty,

    #[error("Non-finite λ {value} at index {index}")]
    NonFinite { index: usize, value: f64 },

    #[error("λ {value} at index {index} is outside [0, 1]")]
    OutOfRange { index: usize, value: f64 },

    #[error("Non-monotonic λ at index {index}: {previous} followed by {value}")]
    NonMonotonic {
        index: usize,
        previous: f64,
        value: f64,
    },

    #[error("Schedule must run from {expected_start} to {expected_end}, found {start} to {end}")]
    Termini {
        expected_start: f64,
        expected_end: f64,
        start: f64,
        end: f64,
    },
}

/// Direction in which a schedule traverses λ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// λ runs from 0 to 1
    Forward,
    /// λ runs from 1 to 0
    Backward,
}

impl Direction {
    pub fn start(&self) -> f64 {
        match self {
            Direction::Forward => 0.0,
            Direction::Backward => 1.0,
        }
    }

    pub fn end(&self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => 0.0,
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Values {
    Linear,
    Explicit(Vec<f64>),
}

/// An ordered, restartable sequence of λ values.
///
/// A schedule of `N` steps holds `N + 1` values. The first half (indices
/// `0..=N/2`) relaxes interactions and the second half re-couples them.
/// `N = 0` is a degenerate, work-free schedule holding only the start value.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchingSchedule {
    steps: usize,
    direction: Direction,
    values: Values,
}

impl SwitchingSchedule {
    /// Evenly spaced schedule with `steps` λ increments
    pub fn new(steps: usize, direction: Direction) -> Self {
        Self {
            steps,
            direction,
            values: Values::Linear,
        }
    }

    pub fn forward(steps: usize) -> Self {
        Self::new(steps, Direction::Forward)
    }

    pub fn backward(steps: usize) -> Self {
        Self::new(steps, Direction::Backward)
    }

    /// Schedule from explicit λ values, validated for range, monotonicity
    /// in `direction` and exact termini.
    pub fn from_values(values: Vec<f64>, direction: Direction) -> Result<Self, ScheduleError> {
        let schedule = Self {
            steps: values.len().saturating_sub(1),
            direction,
            values: Values::Explicit(values),
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Re-check every value of the schedule
    pub fn validate(&self) -> Result<(), ScheduleError> {
        let values = match &self.values {
            Values::Linear => return Ok(()),
            Values::Explicit(values) => values,
        };
        let (first, last) = match (values.first(), values.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Err(ScheduleError::Empty),
        };

        for (index, &value) in values.iter().enumerate() {
            if !value.is_finite() {
                return Err(ScheduleError::NonFinite { index, value });
            }
            if !(0.0..=1.0).contains(&value) {
                return Err(ScheduleError::OutOfRange { index, value });
            }
        }

        for (index, pair) in values.windows(2).enumerate() {
            let (previous, value) = (pair[0], pair[1]);
            let ordered = match self.direction {
                Direction::Forward => value >= previous,
                Direction::Backward => value <= previous,
            };
            if !ordered {
                return Err(ScheduleError::NonMonotonic {
                    index: index + 1,
                    previous,
                    value,
                });
            }
        }

        let start = self.direction.start();
        let end = if values.len() == 1 { start } else { self.direction.end() };
        if first != start || last != end {
            return Err(ScheduleError::Termini {
                expected_start: start,
                expected_end: end,
                start: first,
                end: last,
            });
        }
        Ok(())
    }

    /// Number of λ increments
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// A zero-step schedule: the move is applied instantaneously
    pub fn is_degenerate(&self) -> bool {
        self.steps == 0
    }

    /// Index at which the structural move is applied
    pub fn midpoint(&self) -> usize {
        self.steps / 2
    }

    /// λ at `index`; indices past the end clamp to the last value
    pub fn lambda(&self, index: usize) -> f64 {
        let index = index.min(self.steps);
        match &self.values {
            Values::Explicit(values) => values[index],
            Values::Linear if self.steps == 0 => self.direction.start(),
            Values::Linear => {
                let n = self.steps as f64;
                match self.direction {
                    Direction::Forward => index as f64 / n,
                    Direction::Backward => (self.steps - index) as f64 / n,
                }
            }
        }
    }

    pub fn start(&self) -> f64 {
        self.lambda(0)
    }

    pub fn end(&self) -> f64 {
        self.lambda(self.steps)
    }

    /// Lazily iterate the λ values in order
    pub fn iter(&self) -> LambdaIter<'_> {
        LambdaIter {
            schedule: self,
            next: 0,
        }
    }

    /// The same schedule traversed in the opposite direction
    pub fn reversed(&self) -> Self {
        let values = match &self.values {
            Values::Linear => Values::Linear,
            Values::Explicit(values) => Values::Explicit(values.iter().rev().copied().collect()),
        };
        Self {
            steps: self.steps,
            direction: self.direction.reversed(),
            values,
        }
    }
}

/// Iterator over the λ values of a schedule
#[derive(Debug, Clone)]
pub struct LambdaIter<'a> {
    schedule: &'a SwitchingSchedule,
    next: usize,
}

impl Iterator for LambdaIter<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.next > self.schedule.steps {
            return None;
        }
        let value = self.schedule.lambda(self.next);
        self.next += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.schedule.steps + 1).saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for LambdaIter<'_> {}

impl<'a> IntoIterator for &'a SwitchingSchedule {
    type Item = f64;
    type IntoIter = LambdaIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
