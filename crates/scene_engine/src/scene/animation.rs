//! Keyframe animation clips

use std::collections::HashMap;

use crate::foundation::math::{Quat, Vec3};

/// Playback rate used when a clip does not declare one
pub const DEFAULT_TICKS_PER_SECOND: f32 = 25.0;

const SLERP_EPSILON: f32 = 1e-6;

/// Value at a point in time, measured in ticks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe<T> {
    /// Time in ticks
    pub time: f32,
    /// Value at that time
    pub value: T,
}

impl<T> Keyframe<T> {
    /// Create a keyframe
    pub fn new(time: f32, value: T) -> Self {
        Self { time, value }
    }
}

/// Keyframe tracks of one bone
///
/// The three tracks are timed independently. Keys must be sorted by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationBoneData {
    /// Position keys
    pub translations: Vec<Keyframe<Vec3>>,
    /// Rotation keys
    pub rotations: Vec<Keyframe<Quat>>,
    /// Scale keys
    pub scalings: Vec<Keyframe<Vec3>>,
}

impl AnimationBoneData {
    /// Empty tracks
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a position key
    pub fn with_translation(mut self, time: f32, value: Vec3) -> Self {
        self.translations.push(Keyframe::new(time, value));
        self
    }

    /// Add a rotation key
    pub fn with_rotation(mut self, time: f32, value: Quat) -> Self {
        self.rotations.push(Keyframe::new(time, value));
        self
    }

    /// Add a scale key
    pub fn with_scaling(mut self, time: f32, value: Vec3) -> Self {
        self.scalings.push(Keyframe::new(time, value));
        self
    }

    /// Interpolated position; origin when the track is empty
    pub fn translation_at(&self, time: f32) -> Vec3 {
        sample(&self.translations, time, Vec3::zeros(), |start, end, t| start + (end - start) * t)
    }

    /// Interpolated rotation; identity when the track is empty
    pub fn rotation_at(&self, time: f32) -> Quat {
        sample(&self.rotations, time, Quat::identity(), |start, end, t| {
            start.try_slerp(end, t, SLERP_EPSILON).unwrap_or(*start)
        })
    }

    /// Interpolated scale; unit scale when the track is empty
    pub fn scale_at(&self, time: f32) -> Vec3 {
        sample(&self.scalings, time, Vec3::new(1.0, 1.0, 1.0), |start, end, t| start + (end - start) * t)
    }
}

/// Clamp outside the keyed range, blend the bracketing pair inside it
fn sample<T: Copy>(keys: &[Keyframe<T>], time: f32, empty: T, blend: impl Fn(&T, &T, f32) -> T) -> T {
    let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
        return empty;
    };
    if time.is_nan() || time <= first.time {
        return first.value;
    }
    if time >= last.time {
        return last.value;
    }

    let next = keys.partition_point(|key| key.time <= time);
    let Some(previous) = next.checked_sub(1) else {
        return first.value;
    };
    match (keys.get(previous), keys.get(next)) {
        (Some(start), Some(end)) if end.time > start.time => {
            let t = (time - start.time) / (end.time - start.time);
            blend(&start.value, &end.value, t)
        }
        (_, Some(end)) => end.value,
        _ => last.value,
    }
}

/// Named clip driving bones by name
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    name: String,
    total_ticks: f32,
    ticks_per_second: f32,
    tracks: HashMap<String, AnimationBoneData>,
}

impl Animation {
    /// Create an empty clip
    ///
    /// A non-positive rate falls back to [`DEFAULT_TICKS_PER_SECOND`].
    pub fn new(name: impl Into<String>, total_ticks: f32, ticks_per_second: f32) -> Self {
        let name = name.into();
        let ticks_per_second = if ticks_per_second > 0.0 {
            ticks_per_second
        } else {
            log::warn!(
                "Animation '{}' has no tick rate, using {} ticks per second",
                name,
                DEFAULT_TICKS_PER_SECOND
            );
            DEFAULT_TICKS_PER_SECOND
        };

        Self {
            name,
            total_ticks: total_ticks.max(0.0),
            ticks_per_second,
            tracks: HashMap::new(),
        }
    }

    /// Add or replace the tracks of one bone
    pub fn add_track(&mut self, bone: impl Into<String>, data: AnimationBoneData) {
        self.tracks.insert(bone.into(), data);
    }

    /// Builder form of [`add_track`](Self::add_track)
    pub fn with_track(mut self, bone: impl Into<String>, data: AnimationBoneData) -> Self {
        self.add_track(bone, data);
        self
    }

    /// Tracks of a bone
    pub fn track(&self, bone: &str) -> Option<&AnimationBoneData> {
        self.tracks.get(bone)
    }

    /// Number of animated bones
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Clip name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length in ticks
    pub fn total_ticks(&self) -> f32 {
        self.total_ticks
    }

    /// Playback rate
    pub fn ticks_per_second(&self) -> f32 {
        self.ticks_per_second
    }

    /// Convert seconds to ticks
    pub fn seconds_to_ticks(&self, seconds: f32) -> f32 {
        seconds * self.ticks_per_second
    }

    /// Convert milliseconds to ticks
    pub fn millis_to_ticks(&self, millis: f32) -> f32 {
        self.seconds_to_ticks(millis / 1000.0)
    }

    /// Length in seconds
    pub fn duration_seconds(&self) -> f32 {
        self.total_ticks / self.ticks_per_second
    }

    /// Wrap a time into `[0, total_ticks)`
    ///
    /// A zero-length clip and a non-finite time both give tick 0.
    pub fn wrap_ticks(&self, ticks: f32) -> f32 {
        if self.total_ticks > 0.0 && ticks.is_finite() {
            ticks.rem_euclid(self.total_ticks)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn track() -> AnimationBoneData {
        AnimationBoneData::new()
            .with_translation(0.0, Vec3::new(0.0, 0.0, 0.0))
            .with_translation(10.0, Vec3::new(10.0, 0.0, 0.0))
            .with_translation(20.0, Vec3::new(10.0, 20.0, 0.0))
    }

    #[test]
    fn test_sampling_clamps_and_interpolates() {
        let data = track();
        assert_relative_eq!(data.translation_at(-5.0), Vec3::zeros());
        assert_relative_eq!(data.translation_at(25.0), Vec3::new(10.0, 20.0, 0.0));
        assert_relative_eq!(data.translation_at(5.0), Vec3::new(5.0, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(data.translation_at(15.0), Vec3::new(10.0, 10.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(data.translation_at(10.0), Vec3::new(10.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_interpolation_weights_start_towards_end() {
        let data = AnimationBoneData::new()
            .with_scaling(0.0, Vec3::new(1.0, 1.0, 1.0))
            .with_scaling(4.0, Vec3::new(5.0, 1.0, 1.0));
        assert_relative_eq!(data.scale_at(1.0).x, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rotation_slerps() {
        let quarter = Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_2);
        let data = AnimationBoneData::new()
            .with_rotation(0.0, Quat::identity())
            .with_rotation(2.0, quarter);

        let half = data.rotation_at(1.0);
        assert_relative_eq!(half.angle(), std::f32::consts::FRAC_PI_4, epsilon = 1e-5);
    }

    #[test]
    fn test_empty_tracks_use_neutral_values() {
        let data = AnimationBoneData::new();
        assert_relative_eq!(data.translation_at(3.0), Vec3::zeros());
        assert_relative_eq!(data.scale_at(3.0), Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(data.rotation_at(3.0), Quat::identity());
    }

    #[test]
    fn test_time_conversion_and_wrapping() {
        let animation = Animation::new("walk", 50.0, 25.0);
        assert_relative_eq!(animation.seconds_to_ticks(0.5), 12.5);
        assert_relative_eq!(animation.millis_to_ticks(200.0), 5.0, epsilon = 1e-5);
        assert_relative_eq!(animation.duration_seconds(), 2.0);
        assert_relative_eq!(animation.wrap_ticks(55.0), 5.0, epsilon = 1e-5);
        assert_relative_eq!(animation.wrap_ticks(-5.0), 45.0, epsilon = 1e-5);

        let empty = Animation::new("pose", 0.0, 0.0);
        assert_relative_eq!(empty.ticks_per_second(), DEFAULT_TICKS_PER_SECOND);
        assert_relative_eq!(empty.wrap_ticks(12.0), 0.0);
    }

    #[test]
    fn test_non_finite_time_samples_first_key() {
        let animation = Animation::new("walk", 10.0, 10.0);
        assert_eq!(animation.wrap_ticks(f32::INFINITY), 0.0);
        assert_eq!(animation.wrap_ticks(f32::NAN), 0.0);

        let data = track();
        assert_relative_eq!(data.translation_at(f32::NAN), Vec3::zeros());
        assert_relative_eq!(data.translation_at(animation.wrap_ticks(f32::NEG_INFINITY)), Vec3::zeros());
        assert_eq!(data.rotation_at(f32::NAN), Quat::identity());
    }
}
