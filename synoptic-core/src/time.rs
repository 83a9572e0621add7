//! Timestamp and delta-time representations. A run fixes one [`TimeType`]
//! up front; [`ITime`] values of differing variants are never compared
//! within one run.

/// The time-type discriminator fixed for a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeType {
    Counter,
    Int,
    Float,
    Double,
    Vector,
}

/// A single event's timestamp, one of five shapes.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ITime {
    Counter(u64),
    Int(i64),
    Float(f32),
    Double(f64),
    Vector(Vec<u64>),
}

impl ITime {
    pub fn time_type(&self) -> TimeType {
        match self {
            ITime::Counter(_) => TimeType::Counter,
            ITime::Int(_) => TimeType::Int,
            ITime::Float(_) => TimeType::Float,
            ITime::Double(_) => TimeType::Double,
            ITime::Vector(_) => TimeType::Vector,
        }
    }

    /// The delta from `self` to `later`. Panics if the two values are not
    /// the same variant; callers only ever compare timestamps drawn from one
    /// run, which fixes a single `TimeType` for the whole trace graph.
    pub fn delta_to(&self, later: &ITime) -> TimeDelta {
        match (self, later) {
            (ITime::Counter(a), ITime::Counter(b)) => TimeDelta::Counter(*b as i64 - *a as i64),
            (ITime::Int(a), ITime::Int(b)) => TimeDelta::Int(b - a),
            (ITime::Float(a), ITime::Float(b)) => TimeDelta::Float(b - a),
            (ITime::Double(a), ITime::Double(b)) => TimeDelta::Double(b - a),
            (ITime::Vector(a), ITime::Vector(b)) => {
                let len = a.len().max(b.len());
                let delta = (0..len)
                    .map(|i| {
                        let av = a.get(i).copied().unwrap_or(0) as i64;
                        let bv = b.get(i).copied().unwrap_or(0) as i64;
                        bv - av
                    })
                    .collect();
                TimeDelta::Vector(delta)
            }
            _ => panic!("ITime::delta_to called across mismatched time types"),
        }
    }
}

/// A time difference attached to a [`crate::event::Transition`]. One
/// variant per [`ITime`] shape.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeDelta {
    Counter(i64),
    Int(i64),
    Float(f32),
    Double(f64),
    Vector(Vec<i64>),
}

impl TimeDelta {
    pub const ZERO_COUNTER: TimeDelta = TimeDelta::Counter(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_delta() {
        let a = ITime::Counter(3);
        let b = ITime::Counter(7);
        assert_eq!(a.delta_to(&b), TimeDelta::Counter(4));
    }

    #[test]
    fn vector_delta_pads_shorter() {
        let a = ITime::Vector(vec![1, 2]);
        let b = ITime::Vector(vec![1, 5, 9]);
        assert_eq!(a.delta_to(&b), TimeDelta::Vector(vec![0, 3, 9]));
    }
}
