//! Decorative scene: starfield, nebulae and shooting stars
//!
//! Everything here is generated from the canvas size and regenerated (not
//! rescaled) when the size changes. Animation is advanced with explicit frame
//! steps in seconds plus the current audio energy in `[0, 1]`.

use crate::canvas::{Canvas, Point, Rgba};
use crate::config::VisualizerConfig;
use rand::rngs::StdRng;
use rand::Rng;
use std::f32::consts::TAU;

const STAR_COLOR: Rgba = Rgba::rgb(255, 255, 255);
const SHOOTING_STAR_COLOR: Rgba = Rgba::rgb(220, 235, 255);
const NEBULA_BLEND_SECS: f32 = 2.0;

/// Point orbiting the canvas center
#[derive(Debug, Clone, PartialEq)]
pub struct Star {
    /// Orbit angle in radians
    pub angle: f32,
    /// Distance from the center
    pub orbit: f32,
    /// Orbit speed in radians per second
    pub orbit_speed: f32,
    /// Dot radius
    pub size: f32,
    /// Twinkle phase in radians
    pub twinkle_phase: f32,
    /// Twinkle speed in radians per second at zero energy
    pub twinkle_speed: f32,
    /// Peak opacity
    pub brightness: f32,
}

impl Star {
    /// Current opacity for the given energy
    pub fn opacity(&self, energy: f32) -> f32 {
        let twinkle = 0.5 + 0.5 * self.twinkle_phase.sin();
        (self.brightness * twinkle * (0.4 + 0.6 * energy)).clamp(0.0, 1.0)
    }
}

/// Slow-drifting radial gradient
#[derive(Debug, Clone, PartialEq)]
pub struct Nebula {
    /// Center
    pub center: Point,
    /// Drift in pixels per second
    pub velocity: Point,
    /// Gradient radius
    pub radius: f32,
    /// Color being shown
    pub color: Rgba,
    /// Color the current blend started from
    pub from: Rgba,
    /// Color being blended towards
    pub target: Rgba,
    /// Blend progress, 0.0 to 1.0
    pub blend: f32,
}

/// Transient streak crossing the canvas
#[derive(Debug, Clone, PartialEq)]
pub struct ShootingStar {
    /// Head position
    pub head: Point,
    /// Velocity in pixels per second
    pub velocity: Point,
    /// Tail length in pixels
    pub length: f32,
    /// Remaining life, 1.0 at spawn and faded out at 0.0
    pub life: f32,
    /// Life lost per second
    pub decay: f32,
}

impl ShootingStar {
    fn is_visible(&self, width: f32, height: f32) -> bool {
        let margin = self.length;
        self.life > 0.0
            && self.head.x > -margin
            && self.head.x < width + margin
            && self.head.y > -margin
            && self.head.y < height + margin
    }
}

/// Every decorative element of one canvas size
#[derive(Debug, Clone)]
pub struct Scene {
    width: f32,
    height: f32,
    stars: Vec<Star>,
    nebulae: Vec<Nebula>,
    shooting_stars: Vec<ShootingStar>,
}

impl Scene {
    /// Generate a scene for a canvas of the given size
    pub fn generate(width: f32, height: f32, config: &VisualizerConfig, rng: &mut StdRng) -> Self {
        let width = width.max(0.0);
        let height = height.max(0.0);
        let max_orbit = (width.hypot(height) / 2.0).max(1.0);

        let stars = (0..config.star_count)
            .map(|_| Star {
                angle: rng.gen_range(0.0..TAU),
                orbit: rng.gen_range(0.0..max_orbit),
                orbit_speed: rng.gen_range(0.002..0.02),
                size: rng.gen_range(0.4..1.8),
                twinkle_phase: rng.gen_range(0.0..TAU),
                twinkle_speed: rng.gen_range(0.5..2.5),
                brightness: rng.gen_range(0.3..1.0),
            })
            .collect();

        let nebulae = (0..config.nebula_count)
            .map(|_| {
                let color = pick_color(&config.palette, rng);
                Nebula {
                    center: Point::new(
                        rng.gen_range(0.0..=width),
                        rng.gen_range(0.0..=height),
                    ),
                    velocity: Point::new(rng.gen_range(-6.0..6.0), rng.gen_range(-6.0..6.0)),
                    radius: rng.gen_range(0.25..0.5) * width.max(height).max(1.0),
                    color,
                    from: color,
                    target: color,
                    blend: 1.0,
                }
            })
            .collect();

        Self {
            width,
            height,
            stars,
            nebulae,
            shooting_stars: Vec::new(),
        }
    }

    /// Canvas size this scene was generated for
    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Stars
    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    /// Nebulae
    pub fn nebulae(&self) -> &[Nebula] {
        &self.nebulae
    }

    /// Live shooting stars
    pub fn shooting_stars(&self) -> &[ShootingStar] {
        &self.shooting_stars
    }

    /// Pick new colors for every nebula
    pub fn retarget_nebulae(&mut self, palette: &[Rgba], rng: &mut StdRng) {
        for nebula in &mut self.nebulae {
            nebula.from = nebula.color;
            nebula.target = pick_color(palette, rng);
            nebula.blend = 0.0;
        }
    }

    /// Launch a shooting star from the upper-left area heading down-right
    pub fn spawn_shooting_star(&mut self, energy: f32, rng: &mut StdRng) {
        let start = if rng.gen_bool(0.5) {
            Point::new(rng.gen_range(0.0..=self.width * 0.6), -10.0)
        } else {
            Point::new(-10.0, rng.gen_range(0.0..=self.height * 0.5))
        };
        let speed = rng.gen_range(400.0..700.0) * (1.0 + energy);
        let heading = rng.gen_range(0.35..0.85_f32);
        self.shooting_stars.push(ShootingStar {
            head: start,
            velocity: Point::new(speed * heading.cos(), speed * heading.sin()),
            length: rng.gen_range(60.0..140.0),
            life: 1.0,
            decay: rng.gen_range(0.6..1.2),
        });
    }

    /// Advance every animation by `dt` seconds
    pub fn update(&mut self, dt: f32, energy: f32) {
        let twinkle_rate = 1.0 + 2.0 * energy;
        for star in &mut self.stars {
            star.angle = (star.angle + star.orbit_speed * dt) % TAU;
            star.twinkle_phase = (star.twinkle_phase + star.twinkle_speed * twinkle_rate * dt) % TAU;
        }

        for nebula in &mut self.nebulae {
            nebula.center.x = wrap(nebula.center.x + nebula.velocity.x * dt, self.width);
            nebula.center.y = wrap(nebula.center.y + nebula.velocity.y * dt, self.height);
            nebula.blend = (nebula.blend + dt / NEBULA_BLEND_SECS).clamp(0.0, 1.0);
            nebula.color = nebula.from.lerp(nebula.target, nebula.blend);
        }

        for star in &mut self.shooting_stars {
            star.head.x += star.velocity.x * dt;
            star.head.y += star.velocity.y * dt;
            star.life -= star.decay * dt;
        }
        let (width, height) = (self.width, self.height);
        self.shooting_stars
            .retain(|star| star.is_visible(width, height));
    }

    /// Draw nebulae, stars and shooting stars
    pub fn draw(&self, canvas: &mut dyn Canvas, energy: f32) {
        let center = Point::new(self.width / 2.0, self.height / 2.0);

        for nebula in &self.nebulae {
            canvas.radial_gradient(
                nebula.center,
                nebula.radius,
                nebula.color.with_alpha(0.12 + 0.18 * energy),
                nebula.color.with_alpha(0.0),
            );
        }

        for star in &self.stars {
            let position = Point::new(
                center.x + star.orbit * star.angle.cos(),
                center.y + star.orbit * star.angle.sin(),
            );
            canvas.fill_circle(position, star.size, STAR_COLOR.with_alpha(star.opacity(energy)));
        }

        for star in &self.shooting_stars {
            let speed = star.velocity.x.hypot(star.velocity.y).max(f32::EPSILON);
            let tail = Point::new(
                star.head.x - star.velocity.x / speed * star.length,
                star.head.y - star.velocity.y / speed * star.length,
            );
            canvas.line(tail, star.head, 1.5, SHOOTING_STAR_COLOR.with_alpha(star.life));
        }
    }
}

fn pick_color(palette: &[Rgba], rng: &mut StdRng) -> Rgba {
    if palette.is_empty() {
        return Rgba::rgb(255, 255, 255);
    }
    palette[rng.gen_range(0..palette.len())]
}

fn wrap(value: f32, extent: f32) -> f32 {
    if extent <= 0.0 {
        0.0
    } else {
        value.rem_euclid(extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn scene(width: f32, height: f32) -> (Scene, StdRng) {
        let mut rng = StdRng::seed_from_u64(7);
        let scene = Scene::generate(width, height, &VisualizerConfig::default(), &mut rng);
        (scene, rng)
    }

    #[test]
    fn generates_configured_counts() {
        let (scene, _) = scene(800.0, 600.0);
        assert_eq!(scene.stars().len(), 180);
        assert_eq!(scene.nebulae().len(), 4);
        assert!(scene.shooting_stars().is_empty());
    }

    #[test]
    fn same_seed_same_scene() {
        let (a, _) = scene(640.0, 480.0);
        let (b, _) = scene(640.0, 480.0);
        assert_eq!(a.stars(), b.stars());
        assert_eq!(a.nebulae(), b.nebulae());
    }

    #[test]
    fn shooting_stars_are_culled_when_faded() {
        let (mut scene, mut rng) = scene(800.0, 600.0);
        scene.spawn_shooting_star(0.5, &mut rng);
        assert_eq!(scene.shooting_stars().len(), 1);

        for _ in 0..40 {
            scene.update(0.1, 0.5);
        }
        assert!(scene.shooting_stars().is_empty());
    }

    #[test]
    fn nebulae_blend_towards_target() {
        let (mut scene, mut rng) = scene(800.0, 600.0);
        let palette = [Rgba::rgb(255, 0, 0)];
        scene.retarget_nebulae(&palette, &mut rng);

        for _ in 0..30 {
            scene.update(0.1, 0.0);
        }
        for nebula in scene.nebulae() {
            assert_eq!(nebula.color, Rgba::rgb(255, 0, 0));
        }
    }

    #[test]
    fn star_opacity_rises_with_energy() {
        let star = Star {
            angle: 0.0,
            orbit: 10.0,
            orbit_speed: 0.0,
            size: 1.0,
            twinkle_phase: std::f32::consts::FRAC_PI_2,
            twinkle_speed: 1.0,
            brightness: 1.0,
        };
        assert!(star.opacity(1.0) > star.opacity(0.0));
        assert!((star.opacity(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_canvas_does_not_panic() {
        let (mut scene, mut rng) = scene(0.0, 0.0);
        scene.spawn_shooting_star(0.0, &mut rng);
        scene.update(0.016, 0.0);
        let mut list = crate::canvas::DrawList::new(0.0, 0.0);
        scene.draw(&mut list, 0.0);
    }
}
