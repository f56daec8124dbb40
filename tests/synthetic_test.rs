use face_motion_dic::synthetic::{GaussianBump, SyntheticMotion, speckle_image};
use face_motion_dic::types::Point2D;

#[test]
fn test_speckle_is_deterministic_and_textured() {
    let a = speckle_image(64, 48, 3);
    let b = speckle_image(64, 48, 3);
    assert_eq!(a, b);
    assert_eq!(a.dimensions(), (64, 48));
    let min = a.pixels().map(|p| p.0[0]).min().unwrap();
    let max = a.pixels().map(|p| p.0[0]).max().unwrap();
    assert!(max - min > 80);
    assert_ne!(a, speckle_image(64, 48, 4));
}

#[test]
fn test_identity_warp_keeps_the_image() {
    let img = speckle_image(40, 30, 9);
    assert_eq!(SyntheticMotion::default().warp(&img), img);
}

#[test]
fn test_inverse_undoes_apply() {
    let motion = SyntheticMotion::rigid(0.02, Point2D::new(50.0, 40.0), Point2D::new(1.5, -0.5))
        .with_bump(GaussianBump {
            center: Point2D::new(45.0, 45.0),
            amplitude: Point2D::new(0.5, 1.5),
            sigma: 10.0,
        });
    for p in [
        Point2D::new(45.0, 45.0),
        Point2D::new(10.0, 70.0),
        Point2D::new(52.5, 38.0),
    ] {
        let back = motion.inverse(&motion.apply(&p));
        assert!((back - p).length() < 1e-4, "{:?} -> {:?}", p, back);
    }

    let bump = motion.bumps[0];
    assert_eq!(bump.displacement_at(&bump.center), bump.amplitude);
    assert!(bump.displacement_at(&Point2D::new(200.0, 200.0)).length() < 1e-12);
}
