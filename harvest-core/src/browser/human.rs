use std::time::Duration;

use rand::distributions::Uniform;
use rand::rngs::ThreadRng;
use rand::{thread_rng, Rng};
use tokio::time::sleep;

use chromiumoxide::element::Element;
use chromiumoxide::layout::Point;
use chromiumoxide::page::Page;

use crate::config::HumanSimulationSection;

use super::error::{BrowserError, BrowserResult};

#[derive(Debug, Clone)]
pub struct HumanMotionPlan {
    pub steps: Vec<MotionStep>,
}

#[derive(Debug, Clone)]
pub struct MotionStep {
    pub point: Point,
    pub delay: Duration,
}

/// Drives pointer and scroll input with eased, jittered timing so hover overlays and
/// lazy loaders see something close to a person at the wheel.
#[derive(Debug)]
pub struct HumanMotionController {
    config: HumanSimulationSection,
    last_point: Option<Point>,
    rng: ThreadRng,
}

impl HumanMotionController {
    pub fn new(config: HumanSimulationSection) -> Self {
        Self {
            config,
            last_point: None,
            rng: thread_rng(),
        }
    }

    pub async fn move_to_element(
        &mut self,
        page: &Page,
        element: &Element,
    ) -> BrowserResult<Point> {
        element.scroll_into_view().await.map_err(|err| {
            BrowserError::Interaction(format!("failed to scroll element into view: {err}"))
        })?;
        let bbox = element.bounding_box().await.map_err(|err| {
            BrowserError::Interaction(format!("failed to get element bounding box: {err}"))
        })?;
        let jitter = self.config.mouse_jitter_px as f64;
        let target_x = bbox.x + self.rng.gen_range(0.3..0.7) * bbox.width;
        let target_y = bbox.y + self.rng.gen_range(0.3..0.7) * bbox.height;
        let target = Point::new(
            target_x + self.random_offset(jitter),
            target_y + self.random_offset(jitter),
        );
        let plan = self.plan_motion(target);
        self.execute_motion(page, &plan).await?;
        self.last_point = Some(target);
        Ok(target)
    }

    pub async fn run_script_then_pause(&mut self, page: &Page, script: &str) -> BrowserResult<()> {
        page.evaluate(script).await.map_err(|err| {
            BrowserError::Script(format!("failed to execute scroll script: {err}"))
        })?;
        let pause = self.random_duration(self.config.scroll_pause_ms);
        sleep(pause).await;
        Ok(())
    }

    fn plan_motion(&mut self, target: Point) -> HumanMotionPlan {
        let start = self.last_point.unwrap_or_else(|| Point::new(0.0, 0.0));
        let distance = ((target.x - start.x).powi(2) + (target.y - start.y).powi(2)).sqrt();
        let lower = self
            .config
            .mouse_speed_min_px_s
            .min(self.config.mouse_speed_max_px_s)
            .max(1);
        let upper = self.config.mouse_speed_max_px_s.max(lower);
        let speed = self.rng.gen_range(lower..=upper) as f64;
        let duration_secs = (distance / speed).max(0.08);
        let steps = (duration_secs * 60.0).clamp(12.0, 48.0) as usize;
        let mut plan = Vec::with_capacity(steps + 1);
        for idx in 1..=steps {
            let t = idx as f64 / steps as f64;
            let eased = ease_in_out_cubic(t);
            let intermediate = Point::new(
                start.x + (target.x - start.x) * eased + self.random_offset(1.2),
                start.y + (target.y - start.y) * eased + self.random_offset(1.2),
            );
            let delay = Duration::from_secs_f64(duration_secs / steps as f64);
            plan.push(MotionStep {
                point: intermediate,
                delay,
            });
        }
        plan.push(MotionStep {
            point: target,
            delay: Duration::ZERO,
        });
        HumanMotionPlan { steps: plan }
    }

    async fn execute_motion(&mut self, page: &Page, plan: &HumanMotionPlan) -> BrowserResult<()> {
        for step in &plan.steps {
            page.move_mouse(step.point).await.map_err(|err| {
                BrowserError::Interaction(format!("failed to move mouse: {err}"))
            })?;
            if !step.delay.is_zero() {
                sleep(step.delay).await;
            }
        }
        Ok(())
    }

    fn random_duration(&mut self, bounds: [u32; 2]) -> Duration {
        let lower = bounds[0].min(bounds[1]);
        let upper = bounds[0].max(bounds[1]);
        let ms = self.rng.gen_range(lower..=upper) as u64;
        Duration::from_millis(ms)
    }

    fn random_offset(&mut self, max: f64) -> f64 {
        if max <= 0.0 {
            return 0.0;
        }
        let distribution = Uniform::new_inclusive(-max, max);
        self.rng.sample(distribution)
    }
}

fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}
