//! Soul Player - Visualizer
//!
//! Audio-reactive starfield drawn around a ring of frequency bars.
//!
//! The renderer reads the [`soul_playback::SharedAnalyser`] handed out by the
//! audio graph once per frame and never touches playback state. Drawing goes
//! through the [`Canvas`] trait and frame callbacks through [`FrameScheduler`],
//! so the host decides what a frame and a surface are.
//!
//! # Example
//!
//! ```rust
//! use soul_playback::{Analyser, AnalyserSettings};
//! use soul_visualizer::{DrawList, FrameOutcome, VisualizerConfig, VisualizerRenderer};
//! use std::time::Duration;
//!
//! let analyser = Analyser::shared(&AnalyserSettings::default());
//! let mut renderer = VisualizerRenderer::with_seed(VisualizerConfig::default(), 7);
//! let mut canvas = DrawList::new(640.0, 480.0);
//!
//! assert_eq!(renderer.render(Duration::ZERO, &mut canvas), FrameOutcome::Idle);
//!
//! renderer.set_analyser(Some(analyser));
//! assert_eq!(renderer.render(Duration::ZERO, &mut canvas), FrameOutcome::Drawn);
//! assert!(!canvas.is_empty());
//! ```

mod canvas;
mod config;
mod render_loop;
mod renderer;
mod scene;

pub use canvas::{Canvas, DrawCommand, DrawList, Point, Rgba};
pub use config::VisualizerConfig;
pub use render_loop::{FrameHandle, FrameScheduler, RenderLoop};
pub use renderer::{average_energy, FrameOutcome, VisualizerRenderer};
pub use scene::{Nebula, Scene, ShootingStar, Star};
