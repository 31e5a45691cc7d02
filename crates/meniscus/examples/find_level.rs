//! Run both profile strategies on a synthetic vial and print the levels.
//!
//! `cargo run -p meniscus --example find_level [image.png]`

use meniscus::detect;
use meniscus::level::{ColorSignalParams, LevelFinderParams, ProfileStrategy, RegionMask};

fn synthetic_vial() -> image::RgbImage {
    // dark headspace over a tinted liquid starting at row 120
    image::RgbImage::from_fn(160, 240, |_, y| {
        if y < 120 {
            image::Rgb([40, 40, 45])
        } else {
            image::Rgb([210, 90, 60])
        }
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    meniscus::core::init_with_level(log::LevelFilter::Info)?;

    let img = match std::env::args().nth(1) {
        Some(path) => detect::load_rgb(path)?,
        None => synthetic_vial(),
    };
    let region = RegionMask::full(detect::rgb_view(&img).size())?;

    let strategies = [
        ("edge_density", ProfileStrategy::default()),
        (
            "color_signal",
            ProfileStrategy::ColorSignal(ColorSignalParams::default()),
        ),
    ];
    for (name, strategy) in strategies {
        let params = LevelFinderParams {
            number_of_liquid_levels_to_find: 3,
            strategy,
            ..LevelFinderParams::default()
        };
        match detect::detect_level(&img, &region, params) {
            Ok(levels) => {
                for level in levels {
                    println!(
                        "{name}: row {} relative {:.3} score {:.3}",
                        level.row, level.relative_height, level.score
                    );
                }
            }
            Err(err) => println!("{name}: {err}"),
        }
    }
    Ok(())
}
