//! bitmapfx demo: renders a contact sheet of every blend mode over a
//! perlin-noise base and writes it as a PNG image.

use bitmapfx::codec::{NearestNeighborRasterizer, PngCodec};
use bitmapfx::filter::{ColorMatrix, ColorMatrixFilter};
use bitmapfx::transform::ColorTransform;
use bitmapfx::{
    BitmapData, BlendMode, Channels, EngineConfig, Matrix, Point, Rectangle, Result, ThresholdOp,
};
use log::{error, info, warn};
use std::path::PathBuf;

const DEFAULT_WIDTH: u32 = 512;
const DEFAULT_HEIGHT: u32 = 384;
const DEFAULT_SEED: u32 = 1;
const DEFAULT_OUT: &str = "bitmapfx.png";
const COLUMNS: u32 = 4;

struct Args {
    width: u32,
    height: u32,
    seed: u32,
    config: Option<PathBuf>,
    out: PathBuf,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        width: DEFAULT_WIDTH,
        height: DEFAULT_HEIGHT,
        seed: DEFAULT_SEED,
        config: None,
        out: PathBuf::from(DEFAULT_OUT),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--width" | "-w" => {
                if i + 1 < args.len() {
                    if let Ok(w) = args[i + 1].parse::<u32>() {
                        parsed.width = w;
                    }
                    i += 1;
                }
            },
            "--height" | "-h" => {
                if i + 1 < args.len() {
                    if let Ok(h) = args[i + 1].parse::<u32>() {
                        parsed.height = h;
                    }
                    i += 1;
                }
            },
            "--seed" | "-s" => {
                if i + 1 < args.len() {
                    if let Ok(s) = args[i + 1].parse::<u32>() {
                        parsed.seed = s;
                    }
                    i += 1;
                }
            },
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            },
            "--out" | "-o" => {
                if i + 1 < args.len() {
                    parsed.out = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            },
            "--help" => {
                println!("Usage: bitmapfx [OPTIONS]");
                println!();
                println!("Options:");
                println!("  --width W, -w W     Sheet width (default: {})", DEFAULT_WIDTH);
                println!("  --height H, -h H    Sheet height (default: {})", DEFAULT_HEIGHT);
                println!("  --seed N, -s N      Noise seed (default: {})", DEFAULT_SEED);
                println!("  --config FILE, -c   Engine config JSON");
                println!("  --out FILE, -o      Output PNG file (default: {})", DEFAULT_OUT);
                println!("  --help              Show this help message");
                std::process::exit(0);
            },
            other => warn!("ignoring unknown argument {other}"),
        }
        i += 1;
    }

    parsed
}

fn render(args: &Args) -> Result<BitmapData> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let modes: Vec<BlendMode> = BlendMode::ALL
        .into_iter()
        .filter(|m| m.is_supported())
        .collect();
    let rows = (modes.len() as u32).div_ceil(COLUMNS);
    let tile_w = (args.width / COLUMNS).max(1);
    let tile_h = (args.height / rows).max(1);

    let mut sheet = BitmapData::new(args.width, args.height, false, 0x000000).with_config(config);
    sheet.perlin_noise(
        f64::from(tile_w) / 2.0,
        f64::from(tile_h) / 2.0,
        args.seed,
        Channels::RGB,
        false,
    );

    let mut layer = BitmapData::new(tile_w, tile_h, false, 0x000000);
    layer.noise(args.seed, 32, 224, Channels::RGB, true);
    let tint = ColorTransform::new(1.0, 0.6, 0.3, 1.0, 0.0, 0.0, 40.0, 0.0);
    layer.color_transform(layer.rect(), &tint);

    for (i, mode) in modes.iter().enumerate() {
        let col = i as u32 % COLUMNS;
        let row = i as u32 / COLUMNS;
        let dest = Point::new((col * tile_w) as i32, (row * tile_h) as i32);
        sheet.copy_with_blend(layer.buffer(), layer.rect(), dest, Some(*mode))?;
        info!("tile {i}: {mode} at ({}, {})", dest.x, dest.y);
    }

    // Overlay one tile turned by 45 degrees around the sheet centre
    let turn = Matrix::translation(-f64::from(tile_w) / 2.0, -f64::from(tile_h) / 2.0)
        .concat(&Matrix::rotation(std::f64::consts::FRAC_PI_4))
        .concat(&Matrix::translation(f64::from(args.width) / 2.0, f64::from(args.height) / 2.0));
    sheet.draw(
        layer.buffer(),
        &turn,
        Some(BlendMode::Screen),
        None,
        &NearestNeighborRasterizer,
    )?;

    // Posterize the first tile and flood its top-left region
    let first = Rectangle::new(0, 0, tile_w as i32, tile_h as i32);
    let snapshot = sheet.clone();
    let written = sheet.threshold(
        snapshot.buffer(),
        first,
        Point::ORIGIN,
        ThresholdOp::Less,
        0x800000,
        0x202040,
        0xFF0000,
        false,
    );
    sheet.flood_fill(0, 0, 0xFFD700);
    info!("threshold wrote {written} pixels");

    let snapshot = sheet.clone();
    sheet.apply_filter(
        snapshot.buffer(),
        Rectangle::new(0, 0, tile_w as i32, tile_h as i32),
        Point::new((tile_w * (COLUMNS - 1)) as i32, ((rows - 1) * tile_h) as i32),
        &ColorMatrixFilter::new(ColorMatrix::grayscale()),
    );
    Ok(sheet)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = parse_args();

    let result = render(&args).and_then(|sheet| {
        let bytes = sheet.encode(&PngCodec)?;
        std::fs::write(&args.out, bytes)?;
        Ok(())
    });
    match result {
        Ok(()) => info!("wrote {}", args.out.display()),
        Err(e) => {
            error!("bitmapfx failed: {e}");
            std::process::exit(1);
        },
    }
}
