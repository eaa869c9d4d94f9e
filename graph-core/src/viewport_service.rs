//! Viewport Service (C3): owns the camera, projects screen bounds to world
//! bounds, debounces change notification, and recovers from camera
//! pathology by falling back to a safe default rather than propagating NaN.

use std::time::{Duration, Instant};

use graph_common::config::ViewportConfig;

use crate::model::{Bounds, Viewport};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenCorners {
    pub top_left: (f64, f64),
    pub top_right: (f64, f64),
    pub bottom_left: (f64, f64),
    pub bottom_right: (f64, f64),
}

pub struct ViewportService {
    current: Viewport,
    fallback: Viewport,
    debounce: Duration,
    last_emitted_at: Option<Instant>,
    last_emitted_bounds: Option<Bounds>,
    epsilon: f64,
}

impl ViewportService {
    pub fn new(config: &ViewportConfig, debounce: Duration) -> Self {
        let fallback = Viewport {
            bounds: Bounds::new(
                config.initial_bounds.x_min,
                config.initial_bounds.x_max,
                config.initial_bounds.y_min,
                config.initial_bounds.y_max,
            ),
            camera_ratio: config.initial_ratio,
        };
        Self {
            current: fallback,
            fallback,
            debounce,
            last_emitted_at: None,
            last_emitted_bounds: None,
            epsilon: 1e-6,
        }
    }

    pub fn current_bounds(&self) -> Bounds {
        self.current.bounds
    }

    pub fn current_viewport(&self) -> Viewport {
        self.current
    }

    /// Projects four screen corners through the camera (handling
    /// rotation/flip by taking the bounding box of all four projected
    /// points, not just two opposite corners) into world bounds. Returns
    /// the configured fallback and logs a warning if the result is
    /// pathological (non-finite or zero area).
    pub fn project_screen_to_world(&mut self, corners: ScreenCorners, camera_ratio: f64) -> Bounds {
        let xs = [corners.top_left.0, corners.top_right.0, corners.bottom_left.0, corners.bottom_right.0];
        let ys = [corners.top_left.1, corners.top_right.1, corners.bottom_left.1, corners.bottom_right.1];
        let bounds = Bounds::new(
            xs.iter().cloned().fold(f64::INFINITY, f64::min),
            xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            ys.iter().cloned().fold(f64::INFINITY, f64::min),
            ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        );
        if !bounds.is_finite_nonempty() {
            tracing::warn!(?bounds, "camera pathology detected, resetting to fallback bounds");
            self.current = self.fallback;
            return self.fallback.bounds;
        }
        self.current = Viewport { bounds, camera_ratio };
        bounds
    }

    pub fn center_on(&mut self, x: f64, y: f64, ratio: Option<f64>) {
        let ratio = ratio.unwrap_or(self.current.camera_ratio);
        let half_w = self.current.bounds.width().max(1.0) / 2.0;
        let half_h = self.current.bounds.height().max(1.0) / 2.0;
        self.current = Viewport {
            bounds: Bounds::new(x - half_w, x + half_w, y - half_h, y + half_h),
            camera_ratio: ratio,
        };
    }

    /// "Has the viewport moved by more than epsilon since the last emitted
    /// change" — used to suppress redundant `viewport-changed` events.
    pub fn has_moved_since_last_emit(&self) -> bool {
        match self.last_emitted_bounds {
            None => true,
            Some(prev) => {
                (prev.min_x - self.current.bounds.min_x).abs() > self.epsilon
                    || (prev.max_x - self.current.bounds.max_x).abs() > self.epsilon
                    || (prev.min_y - self.current.bounds.min_y).abs() > self.epsilon
                    || (prev.max_y - self.current.bounds.max_y).abs() > self.epsilon
            }
        }
    }

    /// Returns `true` if a change event should fire now: the viewport moved
    /// and at least `debounce` has elapsed since the last emission.
    pub fn should_emit_change(&self) -> bool {
        if !self.has_moved_since_last_emit() {
            return false;
        }
        match self.last_emitted_at {
            None => true,
            Some(t) => t.elapsed() >= self.debounce,
        }
    }

    pub fn mark_emitted(&mut self) {
        self.last_emitted_at = Some(Instant::now());
        self.last_emitted_bounds = Some(self.current.bounds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ViewportConfig {
        ViewportConfig::default()
    }

    #[test]
    fn zero_dimension_container_falls_back_without_panicking() {
        let mut svc = ViewportService::new(&config(), Duration::from_millis(100));
        let corners = ScreenCorners {
            top_left: (0.0, 0.0),
            top_right: (0.0, 0.0),
            bottom_left: (0.0, 0.0),
            bottom_right: (0.0, 0.0),
        };
        let bounds = svc.project_screen_to_world(corners, 1.0);
        assert_eq!(bounds, svc.fallback.bounds);
    }

    #[test]
    fn non_finite_corners_fall_back() {
        let mut svc = ViewportService::new(&config(), Duration::from_millis(100));
        let corners = ScreenCorners {
            top_left: (f64::NAN, 0.0),
            top_right: (10.0, 0.0),
            bottom_left: (0.0, 10.0),
            bottom_right: (10.0, 10.0),
        };
        let bounds = svc.project_screen_to_world(corners, 1.0);
        assert_eq!(bounds, svc.fallback.bounds);
    }

    #[test]
    fn well_formed_corners_produce_bounding_box() {
        let mut svc = ViewportService::new(&config(), Duration::from_millis(100));
        let corners = ScreenCorners {
            top_left: (-5.0, -5.0),
            top_right: (5.0, -5.0),
            bottom_left: (-5.0, 5.0),
            bottom_right: (5.0, 5.0),
        };
        let bounds = svc.project_screen_to_world(corners, 2.0);
        assert_eq!(bounds, Bounds::new(-5.0, 5.0, -5.0, 5.0));
    }

    #[test]
    fn emits_only_after_movement_and_debounce() {
        let mut svc = ViewportService::new(&config(), Duration::from_millis(0));
        assert!(svc.should_emit_change());
        svc.mark_emitted();
        assert!(!svc.should_emit_change());
        svc.center_on(10.0, 10.0, None);
        assert!(svc.should_emit_change());
    }
}
