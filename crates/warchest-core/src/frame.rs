//! Logic-time quantities.
//!
//! The simulation advances on integer logic frames. Absolute frames and
//! frame spans are distinct types so that "a point in time" and "a duration"
//! cannot be mixed up; both are persisted as raw little-endian u32.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub};

/// An absolute point on the simulation timeline.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LogicFrame(pub u32);

/// A duration measured in logic frames.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LogicFrameSpan(pub u32);

impl Add<LogicFrameSpan> for LogicFrame {
    type Output = LogicFrame;

    fn add(self, span: LogicFrameSpan) -> LogicFrame {
        LogicFrame(self.0 + span.0)
    }
}

impl AddAssign<LogicFrameSpan> for LogicFrame {
    fn add_assign(&mut self, span: LogicFrameSpan) {
        self.0 += span.0;
    }
}

impl Sub<LogicFrame> for LogicFrame {
    type Output = LogicFrameSpan;

    fn sub(self, earlier: LogicFrame) -> LogicFrameSpan {
        LogicFrameSpan(self.0.saturating_sub(earlier.0))
    }
}
