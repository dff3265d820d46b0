mod demo_scenes;

use demo_scenes::DemoScene;
use log::{info, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::path::Path;
use sprite_atlas::{
    AtlasError, AtlasSettings, AtlasSurface, BatchRenderer, FrameClock, GpuAtlasSurface,
    PixelSurface,
};

const SEED: u64 = 0x5eed_a71a5;
const SNAPSHOT_PATH: &str = "atlas_snapshot.png";

fn create_surface(settings: &AtlasSettings) -> Box<dyn AtlasSurface> {
    match pollster::block_on(GpuAtlasSurface::request(settings)) {
        Ok(surface) => Box::new(surface),
        Err(err) => {
            warn!("{}. Falling back to a CPU atlas.", err);
            Box::new(PixelSurface::new(settings.clear_color))
        }
    }
}

fn run() -> Result<(), AtlasError> {
    let settings = AtlasSettings::load();
    let surface = create_surface(&settings);
    let renderer = BatchRenderer::new(settings, surface).into_shared();

    let scene = DemoScene::default();
    let mut rng = SmallRng::seed_from_u64(SEED);
    let mut handles = scene.spawn(&renderer, &mut rng);

    let clock = FrameClock::start();
    for frame in 0..scene.frames {
        let now_ms = frame as f64 * scene.frame_ms;
        scene.churn(frame, &mut handles, &mut rng);
        for handle in handles.iter_mut() {
            handle.draw(now_ms);
        }

        let report = renderer.borrow_mut().flush()?;
        if report.repacked {
            let size = renderer.borrow().atlas_size();
            info!("Frame {}: atlas now {}x{}", frame, size.x, size.y);
        }
    }
    info!(
        "Rendered {} frames in {:.1} ms",
        scene.frames,
        clock.now_ms()
    );

    let stats = renderer.borrow().stats();
    match serde_json::to_string_pretty(&stats) {
        Ok(json) => info!("Renderer stats:\n{}", json),
        Err(err) => warn!("Failed to serialize renderer stats: {}", err),
    }

    {
        let renderer = renderer.borrow();
        let size = renderer.atlas_size();
        if size.x > 0 && size.y > 0 {
            renderer.surface().save_png(Path::new(SNAPSHOT_PATH))?;
        }
    }

    drop(handles);
    renderer.borrow_mut().destroy();
    Ok(())
}

fn main() {
    sprite_atlas::init_logging();
    info!("Starting sprite atlas demo");

    if let Err(err) = run() {
        log::error!("Application error: {}", err);
        eprintln!("Application error: {err}");
        std::process::exit(1);
    }

    info!("Demo shutdown complete");
}
