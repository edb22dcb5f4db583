use std::sync::Arc;

use approx::assert_abs_diff_eq;

use sidereal_core::align::AlignmentResult;
use sidereal_core::buffer::ImageBuffer;
use sidereal_core::geometry::{AffineTransform, IntegerRect};
use sidereal_core::item::{ImageList, ProcessableItem};
use sidereal_core::process::{NoopObserver, ProcessController, ProcessKind, ProcessObserver};
use sidereal_core::stack::{PostStack, StackMode, Stacker, StackingParams};
use sidereal_core::sync::CancelToken;
use sidereal_core::SiderealError;

mod common;

fn stack(list: &ImageList, params: StackingParams, threads: usize) -> ImageBuffer {
    let summary = ProcessController::new(threads)
        .start_list_process(&ProcessKind::Stack(params), &list.enumerator())
        .unwrap();
    assert!(summary.is_complete());
    summary.image.expect("stacked image")
}

fn assert_uniform(image: &ImageBuffer, expected: f32) {
    for p in 0..image.planes() {
        for y in 0..image.height() {
            for x in 0..image.width() {
                assert_abs_diff_eq!(image.get(p, x, y), expected, epsilon = 1e-5);
            }
        }
    }
}

#[test]
fn test_standard_mean_of_identical_frames() {
    let list = common::aligned_list(common::constant_frames(&[1.0, 1.0, 1.0], 8, 6));
    let params = StackingParams::new(IntegerRect::full(8, 6), StackMode::Standard);
    let image = stack(&list, params, 2);
    assert_eq!((image.width(), image.height()), (8, 6));
    assert_uniform(&image, 1.0);
}

#[test]
fn test_raw_sum_without_post_stack() {
    let list = common::aligned_list(common::constant_frames(&[1.0, 2.0, 3.0], 4, 4));
    let mut params = StackingParams::new(IntegerRect::full(4, 4), StackMode::Standard);
    params.post_stack = PostStack::None;
    assert_uniform(&stack(&list, params, 1), 6.0);
}

#[test]
fn test_extremum_modes() {
    let list = common::aligned_list(common::constant_frames(&[1.0, 5.0, 3.0], 4, 4));
    let crop = IntegerRect::full(4, 4);
    let max = StackingParams::new(crop, StackMode::Extremum { maximum: true });
    let min = StackingParams::new(crop, StackMode::Extremum { maximum: false });
    assert_uniform(&stack(&list, max, 3), 5.0);
    assert_uniform(&stack(&list, min, 3), 1.0);
}

#[test]
fn test_sigma_reject_with_loose_threshold_is_the_mean() {
    let list = common::aligned_list(common::constant_frames(&[1.0, 3.0, 5.0], 4, 4));
    let params = StackingParams::new(
        IntegerRect::full(4, 4),
        StackMode::SigmaReject { threshold: 10.0 },
    );
    assert_uniform(&stack(&list, params, 2), 3.0);
}

#[test]
fn test_sigma_reject_drops_outlier() {
    let list = common::aligned_list(common::constant_frames(&[1.0, 1.0, 1.0, 1.0, 9.0], 4, 4));
    let params = StackingParams::new(
        IntegerRect::full(4, 4),
        StackMode::SigmaReject { threshold: 1.5 },
    );
    assert_uniform(&stack(&list, params, 2), 1.0);
}

#[test]
fn test_sigma_reject_without_inclusions_keeps_first_pass_mean() {
    let list = common::aligned_list(common::constant_frames(&[1.0, 2.0, 6.0], 4, 4));
    let params = StackingParams::new(
        IntegerRect::full(4, 4),
        StackMode::SigmaReject { threshold: 0.1 },
    );
    assert_uniform(&stack(&list, params, 3), 3.0);
}

#[test]
fn test_thread_count_does_not_change_result() {
    let images: Vec<ImageBuffer> = (0..9).map(|i| common::noise(i, 24, 16)).collect();
    let list = common::aligned_list(images);
    for mode in [
        StackMode::Standard,
        StackMode::sigma_reject(),
        StackMode::Extremum { maximum: true },
    ] {
        let params = StackingParams::new(IntegerRect::full(24, 16), mode);
        let single = stack(&list, params.clone(), 1);
        let many = stack(&list, params, 4);
        for y in 0..16 {
            for x in 0..24 {
                assert_abs_diff_eq!(single.get(0, x, y), many.get(0, x, y), epsilon = 1e-5);
            }
        }
    }
}

#[test]
fn test_registration_follows_alignment() {
    let ramp = |shift: f32| ImageBuffer::from_fn(1, 32, 8, move |_, x, _| x as f32 - shift).unwrap();
    let list = ImageList::from_images("frame", vec![ramp(0.0), ramp(2.0)]);
    list.get(0)
        .unwrap()
        .set_alignment(Some(AlignmentResult::identity(1)));
    list.get(1).unwrap().set_alignment(Some(AlignmentResult {
        transform: AffineTransform::translation(2.0, 0.0),
        ..AlignmentResult::identity(1)
    }));

    let params = StackingParams::new(IntegerRect::new(4, 0, 20, 8), StackMode::Standard);
    let image = stack(&list, params, 2);
    for x in 0..20 {
        assert_abs_diff_eq!(image.get(0, x, 4), (x + 4) as f32, epsilon = 1e-4);
    }
}

#[test]
fn test_unaligned_items_are_skipped() {
    let list = common::aligned_list(common::constant_frames(&[2.0, 4.0, 100.0], 4, 4));
    list.get(2).unwrap().set_alignment(None);
    let params = StackingParams::new(IntegerRect::full(4, 4), StackMode::Standard);

    let summary = ProcessController::new(2)
        .start_list_process(&ProcessKind::Stack(params), &list.enumerator())
        .unwrap();
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].item, "frame-2");
    assert!(list.get(2).unwrap().failure().is_some());
    assert_uniform(summary.image.as_ref().unwrap(), 3.0);
}

#[test]
fn test_calibration_mode_ignores_alignment() {
    let list = ImageList::from_images("dark", common::constant_frames(&[0.1, 0.3], 4, 4));
    let params = StackingParams::new(IntegerRect::full(4, 4), StackMode::Calibration);
    assert_uniform(&stack(&list, params, 2), 0.2);
}

#[test]
fn test_nothing_stackable_gives_no_image() {
    let list = ImageList::from_images("frame", common::constant_frames(&[1.0, 2.0], 4, 4));
    let params = StackingParams::new(IntegerRect::full(4, 4), StackMode::Standard);
    let summary = ProcessController::new(2)
        .start_list_process(&ProcessKind::Stack(params), &list.enumerator())
        .unwrap();
    assert!(summary.image.is_none());
    assert_eq!(summary.failures.len(), 2);
}

#[test]
fn test_monochrome_output_from_color_frames() {
    let color = ImageBuffer::from_fn(3, 4, 4, |p, _, _| p as f32).unwrap();
    let list = common::aligned_list(vec![color.clone(), color]);
    let mut params = StackingParams::new(IntegerRect::full(4, 4), StackMode::Standard);
    params.monochrome = true;
    let image = stack(&list, params, 1);
    assert_eq!(image.planes(), 1);
    assert_uniform(&image, 1.0);
}

#[test]
fn test_upscaled_output() {
    let list = common::aligned_list(common::constant_frames(&[0.25, 0.75], 8, 8));
    let mut params = StackingParams::new(IntegerRect::full(16, 16), StackMode::Standard);
    params.transform = AffineTransform::scaling(0.5);
    let image = stack(&list, params, 2);
    assert_eq!((image.width(), image.height()), (16, 16));
    assert_uniform(&image, 0.5);
}

#[test]
fn test_normalized_output() {
    let list = common::aligned_list(vec![ImageBuffer::from_fn(1, 4, 4, |_, x, _| x as f32).unwrap()]);
    let mut params = StackingParams::new(IntegerRect::full(4, 4), StackMode::Standard);
    params.post_stack = PostStack::Normalize;
    let image = stack(&list, params, 1);
    assert_abs_diff_eq!(image.levels().1, 1.0, epsilon = 1e-6);
}

#[test]
fn test_stacker_rejects_bad_configuration() {
    let list = common::aligned_list(common::constant_frames(&[1.0], 4, 4));
    assert!(matches!(
        Stacker::new(
            StackingParams::new(IntegerRect::new(0, 0, 0, 4), StackMode::Standard),
            &list
        ),
        Err(SiderealError::Config(_))
    ));
    assert!(matches!(
        Stacker::new(
            StackingParams::new(IntegerRect::full(4, 4), StackMode::Standard),
            &ImageList::default()
        ),
        Err(SiderealError::EmptySequence)
    ));
    let mut named = StackingParams::new(IntegerRect::full(4, 4), StackMode::Standard);
    named.interpolator = Some("drizzle".into());
    named.transform = AffineTransform::similarity(1.0, 0.5, 0.0, 0.0);
    assert!(matches!(
        Stacker::new(named, &list),
        Err(SiderealError::NoCompatibleInterpolator(_))
    ));
}

#[test]
fn test_stacker_reports_passes() {
    let list = common::aligned_list(common::constant_frames(&[1.0, 2.0], 4, 4));
    let stacker = Stacker::new(
        StackingParams::new(IntegerRect::full(4, 4), StackMode::sigma_reject()),
        &list,
    )
    .unwrap();
    let observer: Arc<dyn ProcessObserver> = Arc::new(NoopObserver);
    let outcome = stacker
        .run(&list.enumerator(), 2, &observer, &CancelToken::new())
        .unwrap();
    assert_eq!(outcome.passes, 2);
    assert_eq!(outcome.stacked, 2);
    assert!(outcome.image.is_some());
}

#[test]
fn test_cancelled_token_stops_stacking() {
    let list = common::aligned_list(common::constant_frames(&[1.0, 2.0, 3.0], 4, 4));
    let stacker = Stacker::new(
        StackingParams::new(IntegerRect::full(4, 4), StackMode::Standard),
        &list,
    )
    .unwrap();
    let observer: Arc<dyn ProcessObserver> = Arc::new(NoopObserver);
    let cancel = CancelToken::new();
    cancel.cancel();
    let outcome = stacker
        .run(&list.enumerator(), 2, &observer, &cancel)
        .unwrap();
    assert!(outcome.cancelled);
    assert!(outcome.image.is_none());
    assert_eq!(outcome.stacked, 0);
}
