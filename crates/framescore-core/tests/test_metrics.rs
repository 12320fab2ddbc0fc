#[allow(dead_code)]
mod common;

use approx::assert_relative_eq;
use ndarray::Array2;

use framescore_core::error::MetricError;
use framescore_core::frame::{Frame, PixelLayout};
use framescore_core::metrics::hash::{hash_distance, perceptual_hash};
use framescore_core::metrics::stats::{correlation, mean_absolute_error};
use framescore_core::metrics::texture::blur::blur_effect;
use framescore_core::metrics::texture::sharpness::laplacian_variance;
use framescore_core::metrics::vif::vif;
use framescore_core::metrics::{
    Blur, Cambi, CambiParams, Edge, Glcm, Gmsd, LocalBinaryPattern, Mdsi, Metric,
    PerceptualHash, PlaneComparison, PlaneStatistics, Sharpness, Ssim, Statistic, Svd, Vif,
};
use framescore_core::sequence::Sequence;

use common::{
    color_sequence, constant_plane, distorted_sequence, gray_sequence, noisy, quantize,
    textured_plane,
};

fn single(frame: Frame) -> Sequence {
    Sequence::from_frames(vec![frame]).unwrap()
}

fn value(seq: &Sequence, index: usize, key: &str) -> f64 {
    seq.frame(index)
        .unwrap()
        .prop(key)
        .and_then(|v| v.as_f64())
        .unwrap_or_else(|| panic!("frame {index} has no numeric '{key}'"))
}

fn checkerboard(width: usize, height: usize, cell: usize) -> Array2<f32> {
    Array2::from_shape_fn((height, width), |(r, c)| {
        if (r / cell + c / cell) % 2 == 0 {
            0.2
        } else {
            0.8
        }
    })
}

// --- full reference -------------------------------------------------------

#[test]
fn test_ssim_identical_is_one() {
    let seq = gray_sequence(64, 64, 2);
    let scored = Ssim::default().compute(&seq, Some(&seq)).unwrap();
    assert_eq!(scored.props(), ["ssim"]);
    for i in 0..2 {
        assert_relative_eq!(value(scored.primary(), i, "ssim"), 1.0, epsilon = 1e-6);
    }
}

#[test]
fn test_ssim_drops_with_noise() {
    let reference = gray_sequence(64, 64, 1);
    let distorted = distorted_sequence(&reference, 0.2);
    let scored = Ssim::default().compute(&reference, Some(&distorted)).unwrap();
    let score = value(scored.primary(), 0, "ssim");
    assert!(score < 0.95, "noisy SSIM {score} should be well below 1");
}

#[test]
fn test_ssim_map_shape_and_chroma_key() {
    let seq = color_sequence(PixelLayout::YUV420PS, 64, 32, 1);
    let metric = Ssim {
        plane: 1,
        ..Ssim::default()
    };
    let scored = metric.compute(&seq, Some(&seq)).unwrap();
    assert_eq!(scored.props(), ["ssim_u"]);

    let map = scored.auxiliary("map").unwrap();
    assert_eq!((map.width(), map.height()), (32, 16));
    let frame = map.frame(0).unwrap();
    assert_eq!(frame.plane(0).dim(), (16, 32));
}

#[test]
fn test_gmsd_identical_is_zero() {
    let seq = gray_sequence(64, 64, 1);
    let scored = Gmsd::default().compute(&seq, Some(&seq)).unwrap();
    assert_eq!(scored.props(), ["gmsd"]);
    assert!(value(scored.primary(), 0, "gmsd").abs() < 1e-9);

    let distorted = distorted_sequence(&seq, 0.2);
    let scored = Gmsd::default().compute(&seq, Some(&distorted)).unwrap();
    assert!(value(scored.primary(), 0, "gmsd") > 0.0);
}

#[test]
fn test_mdsi_identical_is_near_zero() {
    let seq = color_sequence(PixelLayout::RGBS, 64, 64, 1);
    let scored = Mdsi::default().compute(&seq, Some(&seq)).unwrap();
    let identical = value(scored.primary(), 0, "mdsi");
    assert!(identical < 1e-3, "identical MDSI {identical}");

    let distorted = distorted_sequence(&seq, 0.3);
    let scored = Mdsi::default().compute(&seq, Some(&distorted)).unwrap();
    assert!(value(scored.primary(), 0, "mdsi") > identical);
    assert_eq!(scored.auxiliary_names().count(), 3);
}

#[test]
fn test_mdsi_rejects_bad_alpha() {
    let seq = color_sequence(PixelLayout::RGBS, 32, 32, 1);
    let metric = Mdsi {
        alpha: 1.5,
        ..Mdsi::default()
    };
    let err = metric.compute(&seq, Some(&seq)).unwrap_err();
    assert!(matches!(err, MetricError::InvalidParameter(_)));
}

#[test]
fn test_vif_identical_is_one() {
    let plane = textured_plane(64, 64, 0.0).mapv(f64::from);
    assert_relative_eq!(vif(&plane, &plane), 1.0, epsilon = 1e-9);

    let seq = gray_sequence(64, 64, 1);
    let scored = Vif.compute(&seq, Some(&seq)).unwrap();
    assert_relative_eq!(value(scored.primary(), 0, "vif"), 1.0, epsilon = 1e-9);
}

#[test]
fn test_vif_noise_loses_information() {
    let reference = textured_plane(64, 64, 0.0);
    let distorted = noisy(&reference, 0.3, 11);
    let score = vif(&reference.mapv(f64::from), &distorted.mapv(f64::from));
    assert!(score < 1.0, "noisy VIF {score} should be below 1");
}

#[test]
fn test_hash_identical_distance_zero() {
    let plane = textured_plane(80, 60, 0.0);
    let a = perceptual_hash(&plane);
    assert_eq!(hash_distance(&a, &a), 0);

    let seq = gray_sequence(80, 60, 2);
    let scored = PerceptualHash.compute(&seq, Some(&seq)).unwrap();
    assert_eq!(scored.props(), ["hash_3117"]);
    assert_eq!(value(scored.primary(), 1, "hash_3117"), 0.0);
}

#[test]
fn test_compare_identical_planes() {
    let seq = gray_sequence(32, 32, 1);
    let scored = PlaneComparison::default().compute(&seq, Some(&seq)).unwrap();
    assert_eq!(
        scored.props(),
        ["plane_mae", "plane_rmse", "plane_cov", "plane_corr"]
    );
    let primary = scored.primary();
    assert_eq!(value(primary, 0, "plane_mae"), 0.0);
    assert_eq!(value(primary, 0, "plane_rmse"), 0.0);
    assert!(value(primary, 0, "plane_cov") > 0.0);
    assert_relative_eq!(value(primary, 0, "plane_corr"), 1.0, epsilon = 1e-9);
}

#[test]
fn test_compare_helpers() {
    let a = constant_plane(4, 4, 0.25);
    let b = constant_plane(4, 4, 0.75);
    assert_relative_eq!(mean_absolute_error(&a, &b), 0.5, epsilon = 1e-9);
    assert!(correlation(&a, &b).is_nan());

    let ramp = textured_plane(16, 16, 0.0);
    let inverted = ramp.mapv(|v| 1.0 - v);
    assert_relative_eq!(correlation(&ramp, &inverted), -1.0, epsilon = 1e-6);
}

// --- no reference ---------------------------------------------------------

#[test]
fn test_stats_constant_plane() {
    let seq = single(Frame::gray(constant_plane(16, 8, 0.5)));
    let scored = PlaneStatistics::default().compute(&seq, None).unwrap();
    assert_eq!(
        scored.props(),
        ["plane_mean", "plane_mad", "plane_var", "plane_std", "plane_rms"]
    );
    let primary = scored.primary();
    assert_relative_eq!(value(primary, 0, "plane_mean"), 0.5, epsilon = 1e-9);
    assert_eq!(value(primary, 0, "plane_mad"), 0.0);
    assert_eq!(value(primary, 0, "plane_var"), 0.0);
    assert_eq!(value(primary, 0, "plane_std"), 0.0);
    assert_relative_eq!(value(primary, 0, "plane_rms"), 0.5, epsilon = 1e-9);
}

#[test]
fn test_stats_selection_and_channel_names() {
    let seq = color_sequence(PixelLayout::YUV444P8, 16, 16, 1);
    let metric = PlaneStatistics {
        plane: 2,
        stats: vec![Statistic::Mean, Statistic::Rms],
    };
    let scored = metric.compute(&seq, None).unwrap();
    assert_eq!(scored.props(), ["plane_mean_v", "plane_rms_v"]);

    let empty = PlaneStatistics {
        plane: 0,
        stats: Vec::new(),
    };
    assert!(matches!(
        empty.compute(&seq, None).unwrap_err(),
        MetricError::InvalidParameter(_)
    ));
}

#[test]
fn test_no_reference_prefers_distorted() {
    let reference = single(Frame::gray(constant_plane(8, 8, 0.2)));
    let distorted = single(Frame::gray(constant_plane(8, 8, 0.6)));
    let scored = PlaneStatistics::default()
        .compute(&reference, Some(&distorted))
        .unwrap();
    assert_relative_eq!(value(scored.primary(), 0, "plane_mean"), 0.6, epsilon = 1e-6);
}

#[test]
fn test_edge_step_mask() {
    let step = Array2::from_shape_fn((16, 16), |(_, c)| if c < 8 { 0.0 } else { 1.0 });
    let seq = single(Frame::gray(step));
    let scored = Edge::default().compute(&seq, None).unwrap();
    assert_eq!(scored.props(), ["edge_min", "edge_average", "edge_max"]);
    let primary = scored.primary();
    assert_eq!(value(primary, 0, "edge_min"), 0.0);
    assert_relative_eq!(value(primary, 0, "edge_max"), 1.0, epsilon = 1e-6);
    let average = value(primary, 0, "edge_average");
    assert!(average > 0.0 && average < 1.0);

    let map = scored.auxiliary("edge_map").unwrap().frame(0).unwrap();
    assert_eq!(map.plane(0).dim(), (16, 16));
}

#[test]
fn test_edge_keys_follow_planes() {
    let seq = color_sequence(PixelLayout::YUV420PS, 32, 32, 1);
    let metric = Edge {
        planes: Some(vec![1]),
    };
    let scored = metric.compute(&seq, None).unwrap();
    assert_eq!(scored.props(), ["edge_u_min", "edge_u_average", "edge_u_max"]);
    let map = scored.auxiliary("edge_map").unwrap();
    assert_eq!((map.width(), map.height()), (16, 16));
}

#[test]
fn test_cambi_flat_frame_has_no_banding() {
    let plane = quantize(&constant_plane(64, 64, 0.4), 8);
    let seq = single(Frame::new(vec![plane], PixelLayout::GRAY8).unwrap());
    let scored = Cambi::default().compute(&seq, None).unwrap();
    assert_eq!(value(scored.primary(), 0, "cambi"), 0.0);

    let names: Vec<&str> = scored.auxiliary_names().collect();
    assert_eq!(names, ["scale0", "scale1", "scale2", "scale3", "scale4"]);
    let coarse = scored.auxiliary("scale2").unwrap();
    assert_eq!((coarse.width(), coarse.height()), (16, 16));
}

#[test]
fn test_cambi_ramp_is_finite() {
    let ramp = Array2::from_shape_fn((64, 128), |(_, c)| c as f32 / 512.0 + 0.3);
    let plane = quantize(&ramp, 8);
    let seq = single(Frame::new(vec![plane], PixelLayout::GRAY8).unwrap());
    let scored = Cambi::default().compute(&seq, None).unwrap();
    let score = value(scored.primary(), 0, "cambi");
    assert!(score.is_finite() && score >= 0.0, "cambi {score}");
}

#[test]
fn test_cambi_invalid_params() {
    let seq = single(Frame::new(vec![constant_plane(8, 8, 0.5)], PixelLayout::GRAY8).unwrap());
    let metric = Cambi::new(CambiParams {
        topk: 0.0,
        ..CambiParams::default()
    });
    assert!(matches!(
        metric.compute(&seq, None).unwrap_err(),
        MetricError::InvalidParameter(_)
    ));
}

#[test]
fn test_lbp_texture_entropy() {
    let flat = single(Frame::gray(constant_plane(32, 32, 0.5)));
    let textured = single(Frame::gray(checkerboard(32, 32, 3)));
    let metric = LocalBinaryPattern::default();

    let scored = metric.compute(&flat, None).unwrap();
    assert_eq!(scored.props(), ["texture"]);
    let flat_entropy = value(scored.primary(), 0, "texture");
    let textured_entropy = value(metric.compute(&textured, None).unwrap().primary(), 0, "texture");
    assert!(flat_entropy.is_finite() && flat_entropy >= 0.0);
    assert!(textured_entropy > 0.0);

    let map = metric
        .compute(&textured, None)
        .unwrap()
        .auxiliary("lbp_map")
        .unwrap()
        .frame(0)
        .unwrap();
    assert!(map.plane(0).iter().all(|&v| (0.0..=1.0).contains(&v)));
}

#[test]
fn test_lbp_rejects_bad_points() {
    let seq = single(Frame::gray(constant_plane(16, 16, 0.5)));
    let metric = LocalBinaryPattern {
        points: 0,
        ..LocalBinaryPattern::default()
    };
    assert!(metric.compute(&seq, None).is_err());
}

#[test]
fn test_glcm_constant_image() {
    let seq = single(Frame::gray(constant_plane(16, 16, 0.5)));
    let scored = Glcm.compute(&seq, None).unwrap();
    let primary = scored.primary();
    assert_eq!(value(primary, 0, "texture_contrast"), 0.0);
    assert_eq!(value(primary, 0, "texture_dissimilarity"), 0.0);
    assert_relative_eq!(value(primary, 0, "texture_homogeneity"), 1.0, epsilon = 1e-9);
    assert_relative_eq!(value(primary, 0, "texture_energy"), 1.0, epsilon = 1e-9);
    assert_relative_eq!(value(primary, 0, "texture_correlation"), 1.0, epsilon = 1e-9);
}

#[test]
fn test_glcm_checkerboard_has_contrast() {
    let seq = single(Frame::gray(checkerboard(16, 16, 1)));
    let scored = Glcm.compute(&seq, None).unwrap();
    assert!(value(scored.primary(), 0, "texture_contrast") > 0.0);
    assert!(value(scored.primary(), 0, "texture_energy") < 1.0);
}

#[test]
fn test_sharpness_orders_images() {
    assert!(laplacian_variance(&constant_plane(16, 16, 0.3)) < 1e-12);
    assert!(laplacian_variance(&checkerboard(16, 16, 1)) > 0.0);

    let seq = single(Frame::gray(checkerboard(32, 32, 2)));
    let scored = Sharpness::default().compute(&seq, None).unwrap();
    assert_eq!(scored.props(), ["sharpness"]);
    assert!(value(scored.primary(), 0, "sharpness") > 0.0);
}

#[test]
fn test_sharpness_integer_input_rejected() {
    let seq = single(Frame::new(vec![constant_plane(8, 8, 0.5)], PixelLayout::GRAY8).unwrap());
    assert!(matches!(
        Sharpness::default().compute(&seq, None).unwrap_err(),
        MetricError::UnsupportedFormat { .. }
    ));
}

#[test]
fn test_blur_effect_increases_with_blur() {
    let sharp = Array2::from_shape_fn((64, 64), |(r, c)| ((r / 8 + c / 8) % 2) as f64);
    let box7 = |data: &Array2<f64>, along_cols: bool| {
        Array2::from_shape_fn((64, 64), |(r, c)| {
            let center = if along_cols { c } else { r };
            let lo = center.saturating_sub(3);
            let hi = (center + 4).min(64);
            (lo..hi)
                .map(|k| if along_cols { data[[r, k]] } else { data[[k, c]] })
                .sum::<f64>()
                / (hi - lo) as f64
        })
    };
    let blurred = box7(&box7(&sharp, true), false);

    let sharp_score = blur_effect(&sharp, 11);
    let blurred_score = blur_effect(&blurred, 11);
    assert!((0.0..=1.0).contains(&sharp_score));
    assert!(
        blurred_score > sharp_score,
        "blurred {blurred_score} should exceed sharp {sharp_score}"
    );
    assert_eq!(blur_effect(&Array2::zeros((16, 16)), 11), 1.0);
}

#[test]
fn test_blur_zero_window_rejected() {
    let seq = gray_sequence(16, 16, 1);
    let metric = Blur {
        h_size: 0,
        ..Blur::default()
    };
    assert!(matches!(
        metric.compute(&seq, None).unwrap_err(),
        MetricError::InvalidParameter(_)
    ));
}

#[test]
fn test_svd_descriptor_keys() {
    let seq = gray_sequence(16, 16, 1);
    let scored = Svd::default().compute(&seq, None).unwrap();
    assert_eq!(scored.props().len(), 8);
    assert_eq!(scored.props()[0], "compression_error");
    let retained = value(scored.primary(), 0, "percentage_retained");
    assert!((0.0..=1.0).contains(&retained));

    let rgb = color_sequence(PixelLayout::RGBS, 16, 16, 1);
    let metric = Svd {
        planes: vec![2, 0],
        ..Svd::default()
    };
    let scored = metric.compute(&rgb, None).unwrap();
    assert_eq!(scored.props().len(), 16);
    assert_eq!(scored.props()[0], "compression_error_r");
    assert_eq!(scored.props()[1], "compression_error_b");
    assert_eq!(scored.props()[15], "percentage_retained_b");
    let frame = scored.primary().frame(0).unwrap();
    for key in scored.props() {
        assert!(frame.prop(key).is_some(), "missing {key}");
    }
}
