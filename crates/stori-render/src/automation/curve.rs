use serde::{Deserialize, Serialize};

use crate::project::AutomationPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveShape {
    Step,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub beat: f64,
    pub value: f32,
    pub shape: CurveShape,
}

impl CurvePoint {
    pub fn new(beat: f64, value: f32, shape: CurveShape) -> Self {
        Self { beat, value, shape }
    }
}

impl From<&AutomationPoint> for CurvePoint {
    fn from(point: &AutomationPoint) -> Self {
        Self::new(point.beat, point.value, point.shape)
    }
}

/// Breakpoint curve keyed by beat position. The shape of a point governs the
/// segment that starts at it.
#[derive(Debug, Clone, Default)]
pub struct AutomationCurve {
    points: Vec<CurvePoint>,
}

impl AutomationCurve {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a AutomationPoint>) -> Self {
        let mut curve = Self::new();
        for point in points {
            if point.beat.is_finite() {
                curve.add_point(point.into());
            }
        }
        curve
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn add_point(&mut self, point: CurvePoint) {
        let index = self.points.partition_point(|existing| existing.beat < point.beat);
        match self.points.get(index) {
            Some(existing) if existing.beat == point.beat => self.points[index] = point,
            _ => self.points.insert(index, point),
        }
    }

    /// Value at `beat`; holds the first value before the first point and the
    /// last value after the last point.
    pub fn value_at(&self, beat: f64) -> Option<f32> {
        let first = self.points.first()?;
        let index = self.points.partition_point(|point| point.beat <= beat);
        if index == 0 {
            return Some(first.value);
        }

        let prev = &self.points[index - 1];
        let Some(next) = self.points.get(index) else {
            return Some(prev.value);
        };
        match prev.shape {
            CurveShape::Step => Some(prev.value),
            CurveShape::Linear => {
                let span = next.beat - prev.beat;
                if span <= 0.0 {
                    return Some(next.value);
                }
                let t = ((beat - prev.beat) / span).clamp(0.0, 1.0) as f32;
                Some(prev.value + (next.value - prev.value) * t)
            }
        }
    }
}
