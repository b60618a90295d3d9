//! Audio-reactive frame renderer
//!
//! Samples the shared analyser once per frame, reduces the spectrum to an
//! energy value in `[0, 1]`, and draws the scene plus a ring of frequency bars
//! around the canvas center. The renderer only reads the analyser; it never
//! touches playback state.

use crate::canvas::{Canvas, Point, Rgba};
use crate::config::VisualizerConfig;
use crate::scene::Scene;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use soul_playback::SharedAnalyser;
use std::f32::consts::{LN_10, TAU};
use std::sync::PoisonError;
use std::time::Duration;
use tracing::debug;

const RING_COLOR: Rgba = Rgba::rgb(167, 139, 250);

/// Result of one render call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was drawn
    Drawn,
    /// Nothing to draw yet (no analyser)
    Idle,
}

/// Visualizer renderer
#[derive(Debug)]
pub struct VisualizerRenderer {
    config: VisualizerConfig,
    analyser: Option<SharedAnalyser>,
    rng: StdRng,
    scene: Option<Scene>,
    bins: Vec<u8>,
    energy: f32,
    last_frame: Option<Duration>,
    next_retarget: Option<Duration>,
    next_shooting_star: Option<Duration>,
}

impl VisualizerRenderer {
    /// Create a renderer seeded from the OS
    pub fn new(config: VisualizerConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create a renderer with a fixed seed
    pub fn with_seed(config: VisualizerConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: VisualizerConfig, rng: StdRng) -> Self {
        Self {
            config,
            analyser: None,
            rng,
            scene: None,
            bins: Vec::new(),
            energy: 0.0,
            last_frame: None,
            next_retarget: None,
            next_shooting_star: None,
        }
    }

    /// Attach or detach the analyser
    pub fn set_analyser(&mut self, analyser: Option<SharedAnalyser>) {
        self.analyser = analyser;
        if self.analyser.is_none() {
            self.bins.clear();
            self.energy = 0.0;
        }
    }

    /// Whether an analyser is attached
    pub fn has_analyser(&self) -> bool {
        self.analyser.is_some()
    }

    /// Settings in use
    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    /// Scene for the current canvas size
    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    /// Energy of the last frame
    pub fn energy(&self) -> f32 {
        self.energy
    }

    /// Frequency snapshot of the last frame
    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    /// Regenerate the scene for a new canvas size
    pub fn resize(&mut self, width: f32, height: f32) {
        debug!(width, height, "Regenerating visualizer scene");
        self.scene = Some(Scene::generate(width, height, &self.config, &mut self.rng));
    }

    /// Drop pending shooting star and retarget deadlines
    pub fn cancel_timers(&mut self) {
        self.next_retarget = None;
        self.next_shooting_star = None;
        self.last_frame = None;
    }

    /// Whether a shooting star spawn is scheduled
    pub fn has_pending_spawn(&self) -> bool {
        self.next_shooting_star.is_some()
    }

    /// Draw one frame at `now`
    pub fn render(&mut self, now: Duration, canvas: &mut dyn Canvas) -> FrameOutcome {
        let Some(analyser) = self.analyser.clone() else {
            return FrameOutcome::Idle;
        };

        {
            let mut analyser = analyser.lock().unwrap_or_else(PoisonError::into_inner);
            self.bins.resize(analyser.frequency_bin_count(), 0);
            analyser.byte_frequency_data(&mut self.bins);
        }
        self.energy = average_energy(&self.bins);

        let (width, height) = canvas.size();
        if self.scene.as_ref().map(Scene::size) != Some((width.max(0.0), height.max(0.0))) {
            self.resize(width, height);
        }

        let dt = self
            .last_frame
            .map(|last| now.saturating_sub(last).min(self.config.max_frame_step()))
            .unwrap_or_default()
            .as_secs_f32();
        self.last_frame = Some(now);

        self.run_timers(now);

        let energy = self.energy;
        if let Some(scene) = self.scene.as_mut() {
            scene.update(dt, energy);
        }

        canvas.clear(self.config.background);
        if let Some(scene) = self.scene.as_ref() {
            scene.draw(canvas, energy);
        }
        self.draw_ring(canvas, width, height);

        FrameOutcome::Drawn
    }

    /// Bar lengths in pixels for the last snapshot
    ///
    /// Each bar maps to one bin. Lengths are log-compressed and never drop
    /// below the configured floor.
    pub fn bar_lengths(&self, max_length: f32) -> Vec<f32> {
        let floor = self.config.bar_floor_px.max(0.0);
        let span = (max_length - floor).max(0.0);
        (0..self.config.bar_count)
            .map(|i| {
                let value = bin_for_bar(&self.bins, i, self.config.bar_count);
                floor + span * compress(value)
            })
            .collect()
    }

    fn run_timers(&mut self, now: Duration) {
        let retarget = self.config.nebula_retarget();
        match self.next_retarget {
            Some(due) if now >= due => {
                if let Some(scene) = self.scene.as_mut() {
                    scene.retarget_nebulae(&self.config.palette, &mut self.rng);
                }
                self.next_retarget = Some(now + retarget);
            }
            Some(_) => {}
            None => self.next_retarget = Some(now + retarget),
        }

        match self.next_shooting_star {
            Some(due) if now >= due => {
                let energy = self.energy;
                if let Some(scene) = self.scene.as_mut() {
                    scene.spawn_shooting_star(energy, &mut self.rng);
                }
                self.next_shooting_star = Some(now + self.shooting_star_delay());
            }
            Some(_) => {}
            None => self.next_shooting_star = Some(now + self.shooting_star_delay()),
        }
    }

    /// Random delay, shorter when the music is loud
    fn shooting_star_delay(&mut self) -> Duration {
        let (min, max) = self.config.shooting_star_delay_secs();
        let base = if max > min {
            self.rng.gen_range(min..max)
        } else {
            min
        };
        Duration::from_secs_f32(base * (1.0 - 0.5 * self.energy))
    }

    fn draw_ring(&self, canvas: &mut dyn Canvas, width: f32, height: f32) {
        let center = Point::new(width / 2.0, height / 2.0);
        let radius = width.min(height).max(0.0) * 0.22;
        let energy = self.energy;

        canvas.stroke_circle(
            center,
            radius,
            2.0 + 10.0 * energy,
            RING_COLOR.with_alpha(0.25 + 0.6 * energy),
        );

        let lengths = self.bar_lengths(radius * 0.8);
        let count = lengths.len().max(1) as f32;
        for (i, length) in lengths.iter().enumerate() {
            let angle = i as f32 / count * TAU;
            let (sin, cos) = angle.sin_cos();
            let from = Point::new(center.x + radius * cos, center.y + radius * sin);
            let to = Point::new(
                center.x + (radius + length) * cos,
                center.y + (radius + length) * sin,
            );
            let color = palette_color(&self.config.palette, i as f32 / count);
            canvas.line(from, to, 3.0, color.with_alpha(0.6 + 0.4 * energy));
        }
    }
}

/// Mean of the bins scaled to `[0, 1]`
pub fn average_energy(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: u32 = bins.iter().map(|b| u32::from(*b)).sum();
    sum as f32 / (bins.len() as f32 * 255.0)
}

fn bin_for_bar(bins: &[u8], bar: usize, bar_count: usize) -> f32 {
    if bins.is_empty() || bar_count == 0 {
        return 0.0;
    }
    let index = (bar * bins.len() / bar_count).min(bins.len() - 1);
    f32::from(bins[index]) / 255.0
}

/// `log10(1 + 9v)`: 0 maps to 0, 1 maps to 1, quiet values are lifted
fn compress(value: f32) -> f32 {
    (1.0 + 9.0 * value.clamp(0.0, 1.0)).ln() / LN_10
}

fn palette_color(palette: &[Rgba], position: f32) -> Rgba {
    match palette.len() {
        0 => RING_COLOR,
        1 => palette[0],
        len => {
            let scaled = position.clamp(0.0, 1.0) * (len - 1) as f32;
            let index = (scaled.floor() as usize).min(len - 2);
            palette[index].lerp(palette[index + 1], scaled - index as f32)
        }
    }
}
