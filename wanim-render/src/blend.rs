//! Per-pixel compositing for straight-alpha RGBA8

use wanim_core::BlendMode;

fn unit(value: u8) -> f64 {
    value as f64 / 255.0
}

fn byte(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Separable blend function `B(cb, cs)` of the non Porter-Duff modes
fn mix(mode: BlendMode, cb: f64, cs: f64) -> f64 {
    match mode {
        BlendMode::Multiply => cb * cs,
        BlendMode::Screen => cb + cs - cb * cs,
        BlendMode::Overlay => {
            if cb <= 0.5 {
                2.0 * cb * cs
            } else {
                1.0 - 2.0 * (1.0 - cb) * (1.0 - cs)
            }
        }
        BlendMode::Darken => cb.min(cs),
        BlendMode::Lighten => cb.max(cs),
        BlendMode::Difference => (cb - cs).abs(),
        _ => cs,
    }
}

/// Composites `src` onto `dst` in place. `alpha` scales the source alpha.
pub fn blend_pixel(mode: BlendMode, dst: &mut [u8], src: [u8; 4], alpha: f64) {
    let sa = unit(src[3]) * alpha;
    let da = unit(dst[3]);

    // Porter-Duff coverage of source and destination
    let (fs, fd) = match mode {
        BlendMode::DestinationOver => (1.0 - da, 1.0),
        BlendMode::DestinationOut => (0.0, 1.0 - sa),
        BlendMode::SourceAtop => (da, 1.0 - sa),
        _ => (1.0, 1.0 - sa),
    };

    let out_a = sa * fs + da * fd;
    if out_a <= 0.0 {
        dst.copy_from_slice(&[0; 4]);
        return;
    }

    for c in 0..3 {
        let cs = unit(src[c]);
        let cb = unit(dst[c]);
        // Source color after mixing with the backdrop where the backdrop is opaque
        let mixed = (1.0 - da) * cs + da * mix(mode, cb, cs);
        let premultiplied = mixed * sa * fs + cb * da * fd;
        dst[c] = byte(premultiplied / out_a);
    }
    dst[3] = byte(out_a);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blend(mode: BlendMode, dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
        let mut out = dst;
        blend_pixel(mode, &mut out, src, 1.0);
        out
    }

    #[test]
    fn test_porter_duff_modes() {
        let red = [255, 0, 0, 255];
        let half_blue = [0, 0, 255, 128];

        assert_eq!(blend(BlendMode::SourceOver, red, half_blue), [127, 0, 128, 255]);
        assert_eq!(blend(BlendMode::DestinationOver, red, half_blue), red);
        assert_eq!(blend(BlendMode::DestinationOut, red, half_blue), [255, 0, 0, 127]);
        assert_eq!(blend(BlendMode::SourceAtop, [0; 4], red), [0; 4]);
        assert_eq!(blend(BlendMode::SourceOver, [0; 4], half_blue), half_blue);
    }

    #[test]
    fn test_separable_modes() {
        let grey = [128, 128, 128, 255];
        let white = [255, 255, 255, 255];
        let black = [0, 0, 0, 255];

        assert_eq!(blend(BlendMode::Multiply, grey, white), grey);
        assert_eq!(blend(BlendMode::Multiply, grey, black), black);
        assert_eq!(blend(BlendMode::Screen, grey, black), grey);
        assert_eq!(blend(BlendMode::Darken, grey, white), grey);
        assert_eq!(blend(BlendMode::Lighten, grey, white), white);
        assert_eq!(blend(BlendMode::Difference, white, white), black);
        assert_eq!(blend(BlendMode::Overlay, black, grey), black);
    }

    #[test]
    fn test_global_alpha() {
        let mut out = [0, 0, 0, 0];
        blend_pixel(BlendMode::SourceOver, &mut out, [10, 20, 30, 255], 0.0);
        assert_eq!(out, [0, 0, 0, 0]);

        blend_pixel(BlendMode::SourceOver, &mut out, [10, 20, 30, 255], 0.5);
        assert_eq!(out, [10, 20, 30, 128]);
    }
}
