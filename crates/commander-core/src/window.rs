//! Window and input-surface location

use std::sync::Arc;

use tracing::{debug, warn};

use crate::platform::ProcessDirectory;
use crate::types::{Point, ProcessHandle, ScreenRegion};

/// Used when neither a window nor the main screen can be measured
pub const FALLBACK_REGION: ScreenRegion = ScreenRegion {
    origin_x: 0.0,
    origin_y: 0.0,
    width: 1440.0,
    height: 900.0,
};

#[derive(Clone)]
pub struct WindowLocator {
    directory: Arc<dyn ProcessDirectory>,
    composer_offset: f64,
}

impl WindowLocator {
    pub fn new(directory: Arc<dyn ProcessDirectory>, composer_offset: f64) -> Self {
        Self {
            directory,
            composer_offset,
        }
    }

    /// Bounds of the target's front window, else the main screen. Never fails.
    pub async fn foreground_window_region(&self, app: &ProcessHandle) -> ScreenRegion {
        match self.directory.window_regions(app.pid).await {
            Ok(regions) => {
                if let Some(region) = regions.into_iter().find(|r| !r.is_empty()) {
                    return region;
                }
                debug!("No on-screen window for pid {}", app.pid);
            }
            Err(e) => warn!("Failed to enumerate windows of {}: {:#}", app.name, e),
        }

        match self.directory.main_screen_region().await {
            Ok(region) if !region.is_empty() => region,
            Ok(_) => FALLBACK_REGION,
            Err(e) => {
                warn!("Failed to read main screen bounds: {:#}", e);
                FALLBACK_REGION
            }
        }
    }

    /// Heuristic composer location: horizontally centered, a fixed offset
    /// above the bottom edge. Callers must tolerate it missing the composer.
    pub fn input_surface_point(&self, region: &ScreenRegion) -> Point {
        Point {
            x: region.origin_x + region.width / 2.0,
            y: region.origin_y + region.height - self.composer_offset,
        }
    }

    /// Front window lookup and point heuristic in one step
    pub async fn locate_input_surface(&self, app: &ProcessHandle) -> Point {
        let region = self.foreground_window_region(app).await;
        let point = self.input_surface_point(&region);
        debug!(
            "Input surface for {} at ({}, {}) in {:?}",
            app.name, point.x, point.y, region
        );
        point
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDirectory, Journal, cursor_app};

    fn windows(directory: FakeDirectory) -> WindowLocator {
        WindowLocator::new(Arc::new(directory), 30.0)
    }

    #[tokio::test]
    async fn test_window_region_of_target_pid() {
        let locator = windows(
            FakeDirectory::new(Journal::default())
                .with_window(99, ScreenRegion::new(0.0, 0.0, 300.0, 300.0))
                .with_window(512, ScreenRegion::new(100.0, 50.0, 1200.0, 800.0)),
        );
        let region = locator.foreground_window_region(&cursor_app()).await;
        assert_eq!(region, ScreenRegion::new(100.0, 50.0, 1200.0, 800.0));
    }

    #[tokio::test]
    async fn test_skips_empty_windows() {
        let locator = windows(
            FakeDirectory::new(Journal::default())
                .with_window(512, ScreenRegion::new(0.0, 0.0, 0.0, 0.0))
                .with_window(512, ScreenRegion::new(10.0, 10.0, 640.0, 480.0)),
        );
        let region = locator.foreground_window_region(&cursor_app()).await;
        assert_eq!(region, ScreenRegion::new(10.0, 10.0, 640.0, 480.0));
    }

    #[tokio::test]
    async fn test_falls_back_to_main_screen() {
        let directory = FakeDirectory::new(Journal::default());
        *directory.screen.lock().unwrap() = Some(ScreenRegion::new(0.0, 0.0, 2560.0, 1440.0));
        let locator = windows(directory);
        let region = locator.foreground_window_region(&cursor_app()).await;
        assert_eq!(region, ScreenRegion::new(0.0, 0.0, 2560.0, 1440.0));
    }

    #[tokio::test]
    async fn test_never_fails_without_screen() {
        let directory = FakeDirectory::new(Journal::default());
        *directory.screen.lock().unwrap() = None;
        let locator = windows(directory);
        assert_eq!(
            locator.foreground_window_region(&cursor_app()).await,
            FALLBACK_REGION
        );
    }

    #[test]
    fn test_input_surface_point_near_bottom_center() {
        let locator = windows(FakeDirectory::new(Journal::default()));
        let point = locator.input_surface_point(&ScreenRegion::new(100.0, 50.0, 1200.0, 800.0));
        assert_eq!(point, Point { x: 700.0, y: 820.0 });
    }
}
