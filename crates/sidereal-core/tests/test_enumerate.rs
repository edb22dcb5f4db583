use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use sidereal_core::buffer::ImageBuffer;
use sidereal_core::enumerate::{
    Direction, FixedPasses, ItemEnumerator, MultiPassEnumerator, PassDelegate, Step,
};
use sidereal_core::item::{ImageItem, ImageList, ProcessableItem};

mod common;

fn list(n: usize) -> ImageList {
    ImageList::from_images("img", common::constant_frames(&vec![0.0; n], 2, 2))
}

fn names(steps: impl Iterator<Item = Arc<dyn ProcessableItem>>) -> Vec<String> {
    steps.map(|item| item.name().to_string()).collect()
}

#[test]
fn test_k_passes_yield_k_times_the_items() {
    let delegate: Arc<dyn PassDelegate> = Arc::new(FixedPasses(3));
    let steps: Vec<Step> = MultiPassEnumerator::new(list(4).enumerator(), delegate).collect();

    let items = steps.iter().filter(|s| matches!(s, Step::Item(_))).count();
    let ends: Vec<u32> = steps
        .iter()
        .filter_map(|s| match s {
            Step::EndOfPass(pass) => Some(*pass),
            _ => None,
        })
        .collect();
    assert_eq!(items, 12);
    assert_eq!(ends, vec![1, 2]);
}

#[test]
fn test_closure_delegate_and_pass_listener() {
    let started = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&started);
    let delegate: Arc<dyn PassDelegate> = Arc::new(|finished: u32| finished < 2);
    let mut steps = MultiPassEnumerator::new(list(2).enumerator(), delegate)
        .with_pass_listener(Arc::new(move |pass| seen.store(pass, Ordering::SeqCst)));

    assert_eq!(steps.pass(), 1);
    assert_eq!(steps.by_ref().count(), 5);
    assert_eq!(started.load(Ordering::SeqCst), 2);
    assert!(matches!(steps.next_step(), Step::EndOfSequence));

    steps.reset();
    assert_eq!(steps.pass(), 1);
    assert!(matches!(steps.next_step(), Step::Item(_)));
}

#[test]
fn test_single_pass_has_no_end_of_pass_marker() {
    let delegate: Arc<dyn PassDelegate> = Arc::new(FixedPasses(1));
    let steps: Vec<Step> = MultiPassEnumerator::new(list(3).enumerator(), delegate).collect();
    assert_eq!(steps.len(), 3);
}

#[test]
fn test_reverse_whole_list() {
    let e = list(3).enumerator_from(Direction::Reverse, None, false);
    assert_eq!(names(e), vec!["img-2", "img-1", "img-0"]);
}

#[test]
fn test_forward_from_start() {
    let e = list(4).enumerator_from(Direction::Forward, Some(2), false);
    assert_eq!(names(e), vec!["img-2", "img-3"]);
}

#[test]
fn test_skip_unselected() {
    let items: Vec<Arc<ImageItem>> = (0..4)
        .map(|i| {
            Arc::new(ImageItem::new(
                format!("img-{}", i),
                ImageBuffer::new(1, 2, 2).unwrap(),
            ))
        })
        .collect();
    items[1].set_selected(false);
    let list = ImageList::new(
        items
            .iter()
            .map(|i| Arc::clone(i) as Arc<dyn ProcessableItem>)
            .collect(),
    );

    let all = names(list.enumerator());
    let selected = names(list.enumerator_from(Direction::Forward, None, true));
    assert_eq!(all.len(), 4);
    assert_eq!(selected, vec!["img-0", "img-2", "img-3"]);
}

#[test]
fn test_partitions_cover_the_sweep() {
    let whole = list(10).enumerator_from(Direction::Reverse, None, false);
    let mut seen: Vec<String> = (0..3).flat_map(|i| names(ItemEnumerator::partition(&whole, i, 3))).collect();
    seen.sort();
    let mut expected = names(whole.clone());
    expected.sort();
    assert_eq!(seen, expected);
    assert_eq!(whole.sweep_len(), 10);
}

#[test]
fn test_enumerator_reset() {
    let mut e: ItemEnumerator = list(2).enumerator();
    assert_eq!(e.by_ref().count(), 2);
    assert!(e.next().is_none());
    e.reset();
    assert_eq!(e.count(), 2);
}
