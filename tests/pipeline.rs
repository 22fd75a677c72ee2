//! Display-space strokes through to the wire-format mask, without a network.

use image::{Rgba, RgbaImage};

use inpaintfe::{
    EditorState, MaskImage, Point, Renderer, SourceImage, Transform, Viewport,
};

const VIEWPORTS: [(u32, u32); 5] = [(800, 600), (1920, 1080), (320, 480), (1000, 1000), (37, 911)];

/// Draw a diagonal across the fitted rect of whatever viewport is active.
fn draw_diagonal(ed: &mut EditorState) {
    let t = ed.transform().unwrap();
    let (min, max) = t.fitted_rect();
    let lerp = |f: f32| Point::new(min.x + (max.x - min.x) * f, min.y + (max.y - min.y) * f);
    ed.pointer_down(lerp(0.25)).unwrap();
    ed.pointer_move(lerp(0.5)).unwrap();
    ed.pointer_move(lerp(0.75)).unwrap();
    ed.pointer_up().unwrap();
}

#[test]
fn mask_matches_image_for_every_viewport() {
    for (vw, vh) in VIEWPORTS {
        let mut ed = EditorState::new(Viewport::new(vw, vh), 12.0);
        ed.load_image(SourceImage::new(RgbaImage::new(300, 200)).unwrap())
            .unwrap();
        draw_diagonal(&mut ed);
        let mask = ed.rasterize_mask().unwrap();
        assert_eq!(mask.dimensions(), (300, 200), "viewport {}x{}", vw, vh);
        assert!(mask.is_marked(150, 100), "viewport {}x{}", vw, vh);
        assert!(!mask.is_marked(0, 199), "viewport {}x{}", vw, vh);
    }
}

#[test]
fn interior_display_points_map_inside_image() {
    for (vw, vh) in VIEWPORTS {
        let t = Transform::fit(Viewport::new(vw, vh), 123, 457).unwrap();
        let (min, max) = t.fitted_rect();
        for i in 0..=10 {
            for j in 0..=10 {
                let p = Point::new(
                    min.x + (max.x - min.x) * i as f32 / 10.0,
                    min.y + (max.y - min.y) * j as f32 / 10.0,
                );
                let q = t.to_image_space(p);
                assert!(q.x >= -1e-3 && q.x <= 123.0 + 1e-3, "{:?} -> {:?}", p, q);
                assert!(q.y >= -1e-3 && q.y <= 457.0 + 1e-3, "{:?} -> {:?}", p, q);
            }
        }
    }
}

#[test]
fn empty_strokes_give_unmarked_mask() {
    let mut ed = EditorState::default();
    ed.load_image(SourceImage::new(RgbaImage::new(17, 9)).unwrap())
        .unwrap();
    let mask = ed.rasterize_mask().unwrap();
    assert_eq!(mask.dimensions(), (17, 9));
    assert!(mask.is_blank());
}

#[test]
fn wire_mask_uses_white_on_transparent() {
    let mut ed = EditorState::new(Viewport::new(100, 100), 30.0);
    ed.load_image(SourceImage::new(RgbaImage::new(100, 100)).unwrap())
        .unwrap();
    ed.pointer_down(Point::new(50.0, 50.0)).unwrap();
    ed.pointer_up().unwrap();

    let mask = ed.rasterize_mask().unwrap();
    let png = mask.encode_png().unwrap();
    let rgba = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(rgba.get_pixel(50, 50), &Rgba([255, 255, 255, 255]));
    assert_eq!(rgba.get_pixel(2, 2), &Rgba([0, 0, 0, 0]));
    assert_eq!(MaskImage::decode_png(&png).unwrap(), mask);
}

#[test]
fn renderers_produce_the_same_mask() {
    let build = |renderer: Renderer| {
        let mut ed = EditorState::new(Viewport::new(640, 480), 18.0).with_renderer(renderer);
        ed.load_image(SourceImage::new(RgbaImage::new(213, 97)).unwrap())
            .unwrap();
        ed.pointer_down(Point::new(10.0, 200.0)).unwrap();
        for i in 0..40 {
            let x = 10.0 + i as f32 * 15.0;
            let y = 240.0 + (i as f32 * 0.4).sin() * 60.0;
            ed.pointer_move(Point::new(x, y)).unwrap();
        }
        ed.pointer_up().unwrap();
        ed.rasterize_mask().unwrap()
    };
    let serial = build(Renderer::Software);
    let parallel = build(Renderer::Parallel);
    assert!(!serial.is_blank());
    assert_eq!(serial, parallel);
}
