use mta_ascii::converter::convert_frame;
use mta_ascii::luminance::glyph_index;
use mta_ascii::pipeline::{CollectSink, VideoPipeline};
use mta_core::color::Rgb;
use mta_core::config::ConversionConfig;
use mta_core::error::{ConvertError, ErrorKind};
use mta_core::frame::PixelBuffer;
use mta_core::ramp::GlyphRamp;
use mta_core::rate::FrameRatePolicy;
use mta_core::traits::MemorySource;

/// Deterministic pseudo-random image (xorshift).
fn noise(width: u32, height: u32, seed: u32) -> PixelBuffer {
    let mut state = seed.max(1);
    let mut next = || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state
    };
    let data = (0..width * height * 4)
        .map(|i| if i % 4 == 3 { 255 } else { (next() & 0xff) as u8 })
        .collect();
    PixelBuffer::from_rgba(width, height, data).unwrap()
}

#[test]
fn grid_is_rectangular_with_floor_width() {
    let cases = [
        (37, 23, 1.0, 12.0),
        (64, 64, 2.5, 8.0),
        (101, 57, 3.0, 20.0),
        (9, 9, 1.0, 1.0),
    ];
    for (w, h, scale, font) in cases {
        let config = ConversionConfig::default()
            .with_scale_down(scale)
            .with_font_size(font);
        let frame = convert_frame(&noise(w, h, w * h), &config, 0).unwrap();
        let expected = (f64::from(w) / f64::from(scale)).floor() as usize;
        let rows: Vec<&[char]> = frame.chars.rows().collect();
        assert_eq!(rows.len(), frame.chars.height() as usize);
        assert!(rows.iter().all(|row| row.len() == expected), "{w}x{h} @ {scale}");
    }
}

#[test]
fn mapper_monotonic_and_invert_flips() {
    for len in [1, 2, 10, 16, 70] {
        for a in 0..=50 {
            for b in a..=50 {
                let (la, lb) = (f64::from(a) / 50.0, f64::from(b) / 50.0);
                assert!(glyph_index(la, len, false) <= glyph_index(lb, len, false));
                assert!(glyph_index(la, len, true) >= glyph_index(lb, len, true));
            }
        }
    }
}

#[test]
fn conversion_is_idempotent() {
    let pb = noise(80, 45, 7);
    let config = ConversionConfig::default()
        .with_scale_down(2.0)
        .with_preserve_color(true);
    let first = convert_frame(&pb, &config, 0).unwrap();
    let second = convert_frame(&pb, &config, 0).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.chars.to_string(), second.chars.to_string());
}

#[test]
fn single_glyph_ramp_fills_grid() {
    let config = ConversionConfig::new(GlyphRamp::new("x").unwrap());
    for invert in [false, true] {
        let frame = convert_frame(&noise(20, 20, 3), &config.clone().with_invert(invert), 0).unwrap();
        assert!(frame.chars.cells().iter().all(|&c| c == 'x'));
    }
}

#[test]
fn cap_30_to_10_yields_100_of_300() {
    let frames = (0..300).map(|i| noise(6, 6, i + 1)).collect();
    let mut source = MemorySource::new(frames, 30.0);
    let mut sink = CollectSink::new();
    let mut pipeline =
        VideoPipeline::new(ConversionConfig::default(), FrameRatePolicy::Cap(10)).with_workers(3);
    let report = pipeline.run(&mut source, &mut sink).unwrap();

    assert_eq!(report.frames_converted, 100);
    let kept: Vec<usize> = sink.frames().iter().map(|f| f.index).collect();
    assert_eq!(kept.first(), Some(&0));
    assert!(kept.windows(2).all(|w| w[1] - w[0] == 3));
}

#[test]
fn oversized_scale_is_invalid_config() {
    let config = ConversionConfig::default().with_scale_down(5.0);
    let err = convert_frame(&PixelBuffer::new(4, 40), &config, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    assert!(matches!(err, ConvertError::InvalidConfig(_)));
}

#[test]
fn black_4x4_maps_to_darkest_or_lightest() {
    let pb = PixelBuffer::new(4, 4);
    let ramp = GlyphRamp::default();

    let plain = convert_frame(&pb, &ConversionConfig::default(), 0).unwrap();
    assert!(plain.chars.width() >= 1 && plain.chars.height() >= 1);
    assert!(plain.chars.cells().iter().all(|&c| c == ramp.darkest()));

    let inverted = convert_frame(&pb, &ConversionConfig::default().with_invert(true), 0).unwrap();
    assert!(inverted.chars.cells().iter().all(|&c| c == ramp.lightest()));
}

#[test]
fn preserved_color_is_cell_mean() {
    let mut pb = PixelBuffer::filled(2, 2, Rgb::new(0, 0, 0));
    pb.set_pixel(0, 0, Rgb::new(200, 100, 40));
    let config = ConversionConfig::default()
        .with_scale_down(2.0)
        .with_cell_aspect(Some(1.0))
        .with_preserve_color(true);
    let frame = convert_frame(&pb, &config, 0).unwrap();
    let colors = frame.colors.unwrap();
    assert_eq!(colors.get(0, 0), Rgb::new(50, 25, 10));
}
