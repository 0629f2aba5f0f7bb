use blemish_removal::border::{pad_reflect_101, smooth_gray};
use blemish_removal::search::{candidate_origins, required_border};
use blemish_removal::{
    repair, save_image, BlemishGeometry, Error, MaskPair, RepairOptions, RetouchSession,
};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

/// Skin-like shaded background with a few dark spots.
fn portrait(width: u32, height: u32, spots: &[(i32, i32)]) -> RgbImage {
    let mut img = RgbImage::from_fn(width, height, |x, y| {
        let shade = u8::try_from(170 + (x + 2 * y) / 16).unwrap_or(u8::MAX);
        Rgb([shade.saturating_add(30), shade, shade.saturating_sub(10)])
    });
    for &spot in spots {
        draw_filled_circle_mut(&mut img, spot, 4, Rgb([70, 40, 35]));
    }
    img
}

#[test]
fn flat_region_reports_no_blemish() {
    let img = RgbImage::from_pixel(100, 80, Rgb([210, 190, 180]));
    let mut session = RetouchSession::new(img.clone(), RepairOptions::default()).unwrap();

    let err = session.repair(50, 40).unwrap_err();
    assert!(matches!(err, Error::NoBlemishDetected { x: 50, y: 40 }));
    assert!(err.is_recoverable());
    assert_eq!(session.image(), &img);
    assert!(!session.can_undo());
}

#[test]
fn undo_inverts_exactly_one_repair() {
    let img = portrait(160, 120, &[(40, 40), (110, 70)]);
    let mut session = RetouchSession::new(img.clone(), RepairOptions::default()).unwrap();

    session.repair(40, 40).unwrap();
    let after_first = session.image().clone();
    session.repair(110, 70).unwrap();
    assert_ne!(session.image(), &after_first);

    assert!(session.undo());
    assert_eq!(session.image(), &after_first);
    assert_ne!(session.image(), &img);
}

#[test]
fn repair_lightens_dark_spot() {
    let img = portrait(140, 140, &[(70, 70)]);
    let mut session = RetouchSession::new(img.clone(), RepairOptions::default()).unwrap();
    let done = session.repair(70, 70).unwrap();

    assert_eq!(done.click, (70, 70));
    assert!(done.geometry.radius >= 4);
    assert_eq!(done.patch.candidates.len(), 24);

    let before = img.get_pixel(70, 70);
    let after = session.image().get_pixel(70, 70);
    assert!(after[1] > before[1] + 80, "before {before:?}, after {after:?}");
}

#[test]
fn padding_covers_grid_for_corner_clicks() {
    let opts = RepairOptions::default();
    let (width, height) = (64u32, 48u32);
    let border = required_border(opts.box_size);
    assert_eq!(border, opts.border());
    let padded = (width + 2 * border, height + 2 * border);
    let half = i64::from(opts.half_size());
    let size = i64::from(opts.box_size);

    for click in [(0, 0), (width - 1, height - 1), (width - 1, 0), (0, height - 1)] {
        let site = (click.0 + border, click.1 + border);

        // Detection box, with room to spare for the blend region's frame.
        assert!(i64::from(site.0) - half >= 1);
        assert!(i64::from(site.1) - half >= 1);
        assert!(i64::from(site.0) + half + 1 < i64::from(padded.0));
        assert!(i64::from(site.1) + half + 1 < i64::from(padded.1));

        let origins = candidate_origins(site, opts.box_size, opts.grid_size);
        assert_eq!(origins.len(), 24);
        for (_, (x, y)) in origins {
            assert!(x >= 0 && y >= 0, "{click:?}: ({x}, {y})");
            assert!(x + size <= i64::from(padded.0), "{click:?}: ({x}, {y})");
            assert!(y + size <= i64::from(padded.1), "{click:?}: ({x}, {y})");
        }
    }
}

#[test]
fn edge_clicks_repair_without_error() {
    let img = portrait(90, 70, &[(1, 1), (88, 68)]);
    let mut session = RetouchSession::new(img, RepairOptions::default()).unwrap();
    session.repair(0, 0).unwrap();
    session.repair(89, 69).unwrap();
    assert_eq!(session.image().dimensions(), (90, 70));
}

#[test]
fn blend_mask_never_exceeds_detection_box() {
    let opts = RepairOptions::default();
    for center in [(17, 17), (0, 0), (34, 34), (3, 30)] {
        let masks = MaskPair::new(
            opts.box_size,
            &BlemishGeometry {
                center,
                radius: opts.half_size(),
            },
        );
        assert_eq!(masks.blend.dimensions(), (opts.box_size, opts.box_size));
        assert_eq!(masks.stats.dimensions(), (opts.box_size, opts.box_size));
    }

    // A centred blend disk reaches each box edge but not the corners.
    let masks = MaskPair::new(
        35,
        &BlemishGeometry {
            center: (17, 17),
            radius: 17,
        },
    );
    let on = |x, y| masks.blend.get_pixel(x, y)[0] != 0;
    assert!(on(0, 17) && on(34, 17) && on(17, 0) && on(17, 34));
    assert!(!on(0, 0) && !on(34, 0) && !on(0, 34) && !on(34, 34));
}

#[test]
fn repair_is_deterministic() {
    let img = portrait(120, 100, &[(60, 50)]);
    let smoothed = smooth_gray(&img);
    let opts = RepairOptions::default();

    let (first_image, first) = repair(&img, &smoothed, (60, 50), &opts).unwrap();
    let (second_image, second) = repair(&img, &smoothed, (60, 50), &opts).unwrap();
    assert_eq!(first_image.as_raw(), second_image.as_raw());
    assert_eq!(first.geometry, second.geometry);
    assert_eq!(first.patch, second.patch);
}

#[test]
fn click_outside_image_is_rejected_without_mutation() {
    let img = portrait(50, 50, &[(25, 25)]);
    let mut session = RetouchSession::new(img.clone(), RepairOptions::default()).unwrap();
    assert!(matches!(
        session.repair(50, 0),
        Err(Error::OutOfBoundsClick {
            x: 50,
            y: 0,
            width: 50,
            height: 50
        })
    ));
    assert_eq!(session.image(), &img);
}

#[test]
fn custom_box_and_grid_are_honoured() {
    let img = portrait(120, 120, &[(60, 60)]);
    let opts = RepairOptions {
        box_size: 21,
        grid_size: 3,
        ..RepairOptions::default()
    };
    let mut session = RetouchSession::new(img, opts).unwrap();
    let done = session.repair(60, 60).unwrap();
    assert_eq!(done.patch.candidates.len(), 8);
    assert!(done.geometry.radius <= 10);
    assert_eq!(done.padded_click, (60 + 31, 60 + 31));
}

#[test]
fn invalid_options_are_rejected_at_session_start() {
    for (box_size, grid_size) in [(35, 4), (35, 73), (35, 65537), (u32::MAX, 5)] {
        let opts = RepairOptions {
            box_size,
            grid_size,
            ..RepairOptions::default()
        };
        assert!(matches!(
            RetouchSession::new(RgbImage::new(10, 10), opts),
            Err(Error::InvalidOptions(_))
        ));
    }
}

#[test]
fn off_centre_click_still_finds_blemish() {
    let mut img = portrait(160, 160, &[]);
    draw_filled_circle_mut(&mut img, (70, 80), 9, Rgb([70, 40, 35]));
    let mut session = RetouchSession::new(img.clone(), RepairOptions::default()).unwrap();

    // The box starts at x = 67, inside the spot's left half.
    let done = session.repair(84, 80).unwrap();
    assert!(done.geometry.center.0 < 17, "{:?}", done.geometry);
    assert_ne!(session.image(), &img);
}

#[test]
fn padding_is_reflect_101() {
    let img = RgbImage::from_fn(3, 1, |x, _| Rgb([u8::try_from(x).unwrap(), 0, 0]));
    let padded = pad_reflect_101(&img, 2).unwrap();
    let row: Vec<u8> = (0..7).map(|x| padded.get_pixel(x, 2)[0]).collect();
    assert_eq!(row, vec![2, 1, 0, 1, 2, 1, 0]);
}

#[test]
fn session_opens_saved_png() {
    let dir = std::env::temp_dir().join(format!("blemish-removal-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("portrait.png");

    let img = portrait(80, 60, &[(40, 30)]);
    save_image(&img, &path).unwrap();

    let session = RetouchSession::open(&path, RepairOptions::default()).unwrap();
    assert_eq!(session.image(), &img);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_file_fails_to_open() {
    let result = RetouchSession::open(
        std::path::Path::new("/nonexistent/portrait.png"),
        RepairOptions::default(),
    );
    assert!(matches!(result, Err(Error::Image(_))));
}
