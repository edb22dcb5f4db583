//! Ordered traversal of an [`ImageList`], with optional repeated sweeps.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::item::{ImageList, ProcessableItem};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

/// Restartable single-sweep enumerator.
///
/// The visiting order is fixed at construction; selection is checked as
/// items are reached. A partitioned enumerator visits every `count`-th
/// position of the order, so `count` partitions cover the list exactly once.
#[derive(Clone, Debug)]
pub struct ItemEnumerator {
    list: ImageList,
    order: Vec<usize>,
    skip_unselected: bool,
    cursor: usize,
}

impl ItemEnumerator {
    pub fn new(
        list: ImageList,
        direction: Direction,
        start: Option<usize>,
        skip_unselected: bool,
    ) -> Self {
        let len = list.len();
        let order: Vec<usize> = match direction {
            Direction::Forward => (start.unwrap_or(0).min(len)..len).collect(),
            Direction::Reverse => {
                let first = start.map(|s| s.saturating_add(1)).unwrap_or(len).min(len);
                (0..first).rev().collect()
            }
        };
        Self {
            list,
            order,
            skip_unselected,
            cursor: 0,
        }
    }

    /// The share of this enumerator handled by worker `index` of `count`.
    pub fn partition(&self, index: usize, count: usize) -> Self {
        let count = count.max(1);
        Self {
            list: self.list.clone(),
            order: self
                .order
                .iter()
                .copied()
                .skip(index)
                .step_by(count)
                .collect(),
            skip_unselected: self.skip_unselected,
            cursor: 0,
        }
    }

    /// Back to the start of the sweep.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Positions visited per sweep, before the selection filter.
    pub fn sweep_len(&self) -> usize {
        self.order.len()
    }

    pub fn list(&self) -> &ImageList {
        &self.list
    }
}

impl Iterator for ItemEnumerator {
    type Item = Arc<dyn ProcessableItem>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(&index) = self.order.get(self.cursor) {
            self.cursor += 1;
            let Some(item) = self.list.get(index) else {
                continue;
            };
            if self.skip_unselected && !item.is_selected() {
                continue;
            }
            return Some(Arc::clone(item));
        }
        None
    }
}

/// Decides at the end of each sweep whether another one is needed.
pub trait PassDelegate: Send + Sync {
    /// `finished_pass` is the number of the sweep that just ended (1-based).
    fn should_perform_one_more_pass(&self, finished_pass: u32) -> bool;
}

impl<F> PassDelegate for F
where
    F: Fn(u32) -> bool + Send + Sync,
{
    fn should_perform_one_more_pass(&self, finished_pass: u32) -> bool {
        self(finished_pass)
    }
}

/// Delegate authorizing a fixed number of passes.
#[derive(Clone, Copy, Debug)]
pub struct FixedPasses(pub u32);

impl PassDelegate for FixedPasses {
    fn should_perform_one_more_pass(&self, finished_pass: u32) -> bool {
        finished_pass < self.0
    }
}

/// One step of a multi-pass traversal.
#[derive(Clone)]
pub enum Step {
    Item(Arc<dyn ProcessableItem>),
    /// The given pass ended and another one starts.
    EndOfPass(u32),
    EndOfSequence,
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Item(item) => write!(f, "Item({})", item.name()),
            Step::EndOfPass(pass) => write!(f, "EndOfPass({})", pass),
            Step::EndOfSequence => write!(f, "EndOfSequence"),
        }
    }
}

type PassListener = Arc<dyn Fn(u32) + Send + Sync>;

/// Enumerator that restarts its sweep while the delegate asks for more passes.
pub struct MultiPassEnumerator {
    inner: ItemEnumerator,
    delegate: Arc<dyn PassDelegate>,
    listener: Option<PassListener>,
    pass: u32,
    finished: bool,
}

impl MultiPassEnumerator {
    pub fn new(inner: ItemEnumerator, delegate: Arc<dyn PassDelegate>) -> Self {
        Self {
            inner,
            delegate,
            listener: None,
            pass: 1,
            finished: false,
        }
    }

    /// Called with the new pass number whenever a sweep restarts.
    pub fn with_pass_listener(mut self, listener: PassListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Current pass, starting at 1.
    pub fn pass(&self) -> u32 {
        self.pass
    }

    /// Back to the first item of pass 1.
    pub fn reset(&mut self) {
        self.inner.reset();
        self.pass = 1;
        self.finished = false;
    }

    pub fn next_step(&mut self) -> Step {
        if self.finished {
            return Step::EndOfSequence;
        }
        if let Some(item) = self.inner.next() {
            return Step::Item(item);
        }

        let finished_pass = self.pass;
        if self.delegate.should_perform_one_more_pass(finished_pass) {
            self.pass += 1;
            self.inner.reset();
            if let Some(listener) = &self.listener {
                listener(self.pass);
            }
            Step::EndOfPass(finished_pass)
        } else {
            self.finished = true;
            Step::EndOfSequence
        }
    }
}

impl Iterator for MultiPassEnumerator {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        match self.next_step() {
            Step::EndOfSequence => None,
            step => Some(step),
        }
    }
}
