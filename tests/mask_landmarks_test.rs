use face_motion_dic::Error;
use face_motion_dic::landmarks::{
    EYE_LANDMARKS, FACE_OVAL, LIP_LANDMARKS, NormalizedPoint, RoiKind, all_landmarks_to_pixels,
    select_query_points, to_pixel,
};
use face_motion_dic::mask::FaceMask;
use face_motion_dic::types::Point2D;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

fn mesh_with_oval(center: (f64, f64), radius: f64) -> Vec<NormalizedPoint> {
    let mut landmarks = vec![NormalizedPoint { x: center.0, y: center.1 }; 468];
    for (k, &idx) in FACE_OVAL.iter().enumerate() {
        let a = 2.0 * std::f64::consts::PI * k as f64 / FACE_OVAL.len() as f64;
        landmarks[idx] = NormalizedPoint {
            x: center.0 + radius * a.cos(),
            y: center.1 + radius * a.sin(),
        };
    }
    landmarks
}

#[test]
fn test_to_pixel_floors_and_clamps() {
    assert_eq!(to_pixel(&NormalizedPoint { x: 0.5, y: 0.5 }, 100, 50), [50, 25]);
    assert_eq!(to_pixel(&NormalizedPoint { x: 0.999, y: 0.019 }, 100, 50), [99, 0]);
    assert_eq!(to_pixel(&NormalizedPoint { x: 1.0, y: 1.0 }, 100, 50), [99, 49]);
    assert_eq!(to_pixel(&NormalizedPoint { x: -0.1, y: 1.7 }, 100, 50), [0, 49]);

    let pixels = all_landmarks_to_pixels(&[[0.25, 0.75].into(), [0.0, 0.0].into()], 40, 20);
    assert_eq!(pixels, vec![[10, 15], [0, 0]]);
}

#[test]
fn test_roi_kind_parsing() {
    assert_eq!("smile".parse::<RoiKind>().unwrap(), RoiKind::Mouth);
    assert_eq!("Tongue".parse::<RoiKind>().unwrap(), RoiKind::Mouth);
    assert_eq!("eye".parse::<RoiKind>().unwrap(), RoiKind::Eye);
    assert_eq!("all".parse::<RoiKind>().unwrap(), RoiKind::All);
    assert!(matches!(
        "nose".parse::<RoiKind>(),
        Err(Error::InvalidParameter(_))
    ));
}

#[test]
fn test_select_query_points() {
    let landmarks: Vec<NormalizedPoint> = (0..468)
        .map(|k| NormalizedPoint {
            x: (k % 20) as f64 / 20.0,
            y: (k / 20) as f64 / 24.0,
        })
        .collect();
    assert_eq!(select_query_points(&landmarks, RoiKind::All, 640, 480).len(), 468);
    assert_eq!(
        select_query_points(&landmarks, RoiKind::Eye, 640, 480).len(),
        EYE_LANDMARKS.len()
    );
    let lips = select_query_points(&landmarks, RoiKind::Mouth, 640, 480);
    assert_eq!(lips.len(), LIP_LANDMARKS.len());
    assert_eq!(lips[0], to_pixel(&landmarks[LIP_LANDMARKS[0]], 640, 480));

    // indices the detector did not return are dropped
    let partial = &landmarks[..100];
    let expected = LIP_LANDMARKS.iter().filter(|&&k| k < 100).count();
    assert_eq!(
        select_query_points(partial, RoiKind::Mouth, 640, 480).len(),
        expected
    );
}

#[test]
fn test_polygon_fill() {
    let square = [
        Point2D::new(10.0, 10.0),
        Point2D::new(30.0, 10.0),
        Point2D::new(30.0, 30.0),
        Point2D::new(10.0, 30.0),
    ];
    let mask = FaceMask::from_polygon(40, 40, &square);
    assert!((mask.inside_fraction() - 0.25).abs() < 1e-12);
    assert!(!mask.is_outside(20.0, 20.0));
    assert!(!mask.is_outside(10.0, 10.0));
    assert!(mask.is_outside(5.0, 5.0));
    assert!(mask.is_outside(30.0, 20.0));
    // off the raster is never outside
    assert!(!mask.is_outside(-1.0, 5.0));
    assert!(!mask.is_outside(40.0, 5.0));
    assert!(!mask.is_outside(f64::NAN, 5.0));

    let degenerate = FaceMask::from_polygon(10, 10, &square[..2]);
    assert_eq!(degenerate.inside_fraction(), 0.0);
}

#[test]
fn test_mask_from_landmarks() {
    let landmarks = mesh_with_oval((0.5, 0.5), 0.3);
    let mask = FaceMask::from_landmarks(&landmarks, 100, 100).unwrap();
    assert_eq!((mask.width(), mask.height()), (100, 100));
    assert!(!mask.is_outside(50.0, 50.0));
    assert!(mask.is_outside(2.0, 2.0));
    assert!(mask.is_outside(95.0, 50.0));
    let fraction = mask.inside_fraction();
    // circle of radius 30 px on a 100 x 100 raster
    assert!((fraction - std::f64::consts::PI * 0.09).abs() < 0.02);

    assert!(matches!(
        FaceMask::from_landmarks(&landmarks[..400], 100, 100),
        Err(Error::InvalidParameter(_))
    ));
}

#[test]
fn test_mask_from_image_and_apply() {
    let mut rgb = RgbImage::new(4, 3);
    rgb.put_pixel(1, 1, Rgb([0, 0, 7]));
    rgb.put_pixel(2, 1, Rgb([255, 255, 255]));
    let mask = FaceMask::from_image(&DynamicImage::ImageRgb8(rgb));
    assert!(!mask.is_outside(1.0, 1.0));
    assert!(!mask.is_outside(2.5, 1.9));
    assert!(mask.is_outside(0.0, 0.0));

    let img = GrayImage::from_pixel(4, 3, Luma([90]));
    let masked = mask.apply(&img).unwrap();
    assert_eq!(masked.get_pixel(1, 1).0[0], 90);
    assert_eq!(masked.get_pixel(3, 2).0[0], 0);

    assert!(mask.apply(&GrayImage::new(5, 3)).is_err());
    assert_eq!(FaceMask::all_inside(4, 4).inside_fraction(), 1.0);
    assert_eq!(FaceMask::all_outside(4, 4).inside_fraction(), 0.0);
}
