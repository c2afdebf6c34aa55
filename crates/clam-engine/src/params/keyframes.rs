use std::fmt;

use serde_json::Value;

use crate::backend::KernelArgs;

use super::{FrameDependent, NamedParameters, ParameterSet};

/// Named parameters animated between keyframes.
///
/// Each keyframe inherits every value of the keyframe before it, so only the
/// first one has to name all parameters. Values between keyframes follow a
/// Catmull-Rom spline through the neighbouring keys.
#[derive(Debug, Clone)]
pub struct KeyframeParameters {
    keyframes: Vec<NamedParameters>,
    frame_count: u32,
    current: NamedParameters,
}

impl KeyframeParameters {
    /// `frame_count` is the number of frames the animation is spread over;
    /// frame 0 sits on the first keyframe, frame `frame_count - 1` on the last.
    pub fn new(keyframes: Vec<NamedParameters>, frame_count: u32) -> Result<Self, KeyframeError> {
        let Some(first) = keyframes.first() else {
            return Err(KeyframeError::Empty);
        };

        let mut resolved: Vec<NamedParameters> = Vec::with_capacity(keyframes.len());
        for (index, frame) in keyframes.iter().enumerate() {
            let mut full = resolved.last().cloned().unwrap_or_else(|| first.clone());
            for (name, value) in frame.iter() {
                if !first.iter().any(|(n, _)| n == name) {
                    return Err(KeyframeError::MissingInFirst {
                        keyframe: index,
                        name: name.to_string(),
                    });
                }
                full.set(name, value);
            }
            resolved.push(full);
        }

        let current = resolved[0].clone();
        Ok(Self { keyframes: resolved, frame_count, current })
    }

    /// Parses a JSON array of `{ "name": number }` objects.
    pub fn from_json(text: &str, frame_count: u32) -> Result<Self, KeyframeError> {
        let value: Value = serde_json::from_str(text).map_err(KeyframeError::Json)?;
        let Value::Array(frames) = value else {
            return Err(KeyframeError::NotAnArray);
        };

        let mut keyframes = Vec::with_capacity(frames.len());
        for (index, frame) in frames.into_iter().enumerate() {
            let Value::Object(fields) = frame else {
                return Err(KeyframeError::NotAnObject(index));
            };
            let mut params = NamedParameters::new();
            for (name, value) in fields {
                let Some(number) = value.as_f64() else {
                    return Err(KeyframeError::InvalidValue { keyframe: index, name });
                };
                params.set(&name, number as f32);
            }
            keyframes.push(params);
        }
        Self::new(keyframes, frame_count)
    }

    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Values bound by the next dispatch.
    pub fn current(&self) -> &NamedParameters {
        &self.current
    }

    /// Values at animation time `time` in `0.0..=1.0`.
    pub fn interpolate(&self, time: f32) -> NamedParameters {
        let last = self.keyframes.len() - 1;
        let scaled = time.clamp(0.0, 1.0) * last as f32;
        let cur = (scaled as usize).min(last);
        let t = scaled - cur as f32;

        let prev = cur.saturating_sub(1);
        let next = (cur + 1).min(last);
        let next2 = (cur + 2).min(last);

        let mut out = self.keyframes[cur].clone();
        for (name, p1) in self.keyframes[cur].iter() {
            let at = |i: usize| self.keyframes[i].get(name).unwrap_or(p1);
            out.set(name, catmull_rom(at(prev), p1, at(next), at(next2), t));
        }
        out
    }
}

impl ParameterSet for KeyframeParameters {
    fn apply_to_kernel(&self, args: &mut KernelArgs, start_index: u32) -> u32 {
        self.current.apply_to_kernel(args, start_index)
    }
}

impl FrameDependent for KeyframeParameters {
    fn set_frame(&mut self, frame: u32) {
        let time = if self.frame_count <= 1 {
            0.0
        } else {
            frame as f32 / (self.frame_count - 1) as f32
        };
        self.current = self.interpolate(time);
    }
}

fn catmull_rom(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    (2.0 * p1
        + (p2 - p0) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3)
        / 2.0
}

#[derive(Debug)]
pub enum KeyframeError {
    Json(serde_json::Error),
    NotAnArray,
    /// Keyframe at this index is not a JSON object.
    NotAnObject(usize),
    InvalidValue { keyframe: usize, name: String },
    Empty,
    /// A later keyframe names a parameter the first keyframe lacks.
    MissingInFirst { keyframe: usize, name: String },
}

impl fmt::Display for KeyframeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(e) => write!(f, "keyframes are not valid JSON: {e}"),
            Self::NotAnArray => write!(f, "keyframes must be a JSON array"),
            Self::NotAnObject(i) => write!(f, "keyframe {i} must be a JSON object"),
            Self::InvalidValue { keyframe, name } => {
                write!(f, "keyframe {keyframe}: `{name}` must be a number")
            }
            Self::Empty => write!(f, "at least one keyframe is required"),
            Self::MissingInFirst { keyframe, name } => {
                write!(
                    f,
                    "keyframe {keyframe} sets `{name}`, which the first keyframe does not define"
                )
            }
        }
    }
}

impl std::error::Error for KeyframeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}
