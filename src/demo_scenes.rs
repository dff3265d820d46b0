use glam::{UVec2, Vec2};
use image::Rgba;
use log::info;
use rand::rngs::SmallRng;
use rand::Rng;
use sprite_atlas::renderer::share;
use sprite_atlas::{Alignment, Fit, RegionCanvas, RenderPayload, SharedRenderer, SpriteHandle};

/// Procedural stand-in for an animated artboard: a bouncing ball over a
/// pulsing bar.
pub struct Artboard {
    size: Vec2,
    background: Rgba<u8>,
    accent: Rgba<u8>,
    speed: f32,
    phase: f32,
    time: f32,
}

impl Artboard {
    pub fn random(rng: &mut SmallRng) -> Self {
        Self {
            size: Vec2::new(rng.gen_range(50.0..200.0), rng.gen_range(50.0..200.0)),
            background: Rgba([rng.gen(), rng.gen(), rng.gen(), 255]),
            accent: Rgba([rng.gen(), rng.gen(), rng.gen(), 255]),
            speed: rng.gen_range(0.5..3.0),
            phase: rng.gen_range(0.0..std::f32::consts::TAU),
            time: 0.0,
        }
    }
}

impl RenderPayload for Artboard {
    fn intrinsic_size(&self) -> Vec2 {
        self.size
    }

    fn advance(&mut self, elapsed: f32) {
        self.time += elapsed * self.speed;
    }

    fn reset_to_rest(&mut self) {
        self.time = 0.0;
    }

    fn render(&mut self, canvas: &mut RegionCanvas<'_>) {
        canvas.fill_rect(Vec2::ZERO, self.size, self.background);

        let pulse = 0.5 + 0.5 * (self.time * 2.0).sin();
        let bar = Vec2::new(self.size.x, self.size.y * 0.1 * (1.0 + pulse));
        canvas.fill_rect(Vec2::new(0.0, self.size.y - bar.y), bar, self.accent);

        let center = self.size
            * Vec2::new(
                0.5 + 0.35 * (self.time + self.phase).sin(),
                0.5 + 0.35 * (self.time * 1.3).cos(),
            );
        canvas.fill_ellipse(center, Vec2::splat(self.size.min_element() * 0.12), self.accent);
    }
}

/// Parameters of the headless demo run.
#[derive(Clone, Copy, Debug)]
pub struct DemoScene {
    pub sprites: usize,
    pub frames: u32,
    pub frame_ms: f64,
    /// Frames between visibility, pause and size changes.
    pub churn_every: u32,
}

impl Default for DemoScene {
    fn default() -> Self {
        Self {
            sprites: 48,
            frames: 240,
            frame_ms: 1000.0 / 60.0,
            churn_every: 15,
        }
    }
}

impl DemoScene {
    pub fn spawn(&self, renderer: &SharedRenderer, rng: &mut SmallRng) -> Vec<SpriteHandle> {
        const LAYOUTS: [(Fit, Alignment); 4] = [
            (Fit::Contain, Alignment::CENTER),
            (Fit::Cover, Alignment::CENTER),
            (Fit::Fill, Alignment::TOP_LEFT),
            (Fit::ScaleDown, Alignment::BOTTOM_RIGHT),
        ];

        let handles: Vec<SpriteHandle> = (0..self.sprites)
            .map(|index| {
                let mut handle =
                    SpriteHandle::new(renderer, share(Artboard::random(rng)), random_size(rng));
                let (fit, alignment) = LAYOUTS[index % LAYOUTS.len()];
                handle.set_layout(fit, alignment);
                handle.register_with_renderer();
                handle
            })
            .collect();

        info!("Spawned {} artboards", handles.len());
        handles
    }

    /// Simulates a consumer scrolling sprites in and out of view, pausing
    /// offscreen animations and changing backing resolutions.
    pub fn churn(&self, frame: u32, handles: &mut [SpriteHandle], rng: &mut SmallRng) {
        if handles.is_empty() || frame == 0 || frame % self.churn_every != 0 {
            return;
        }

        let index = rng.gen_range(0..handles.len());
        let handle = &mut handles[index];
        if handle.is_visible() {
            handle.unregister_from_renderer();
        } else {
            handle.register_with_renderer();
        }

        let index = rng.gen_range(0..handles.len());
        let handle = &mut handles[index];
        if handle.is_paused() {
            handle.resume();
        } else {
            handle.pause();
        }

        let index = rng.gen_range(0..handles.len());
        handles[index].set_desired_size(random_size(rng));
    }
}

fn random_size(rng: &mut SmallRng) -> UVec2 {
    UVec2::new(rng.gen_range(32..=256), rng.gen_range(32..=256))
}
