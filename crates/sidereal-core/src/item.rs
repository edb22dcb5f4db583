//! Items the engine processes and the lists that hold them.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::align::AlignmentResult;
use crate::buffer::ImageBuffer;
use crate::enumerate::{Direction, ItemEnumerator};
use crate::error::{Result, SiderealError};
use crate::fourier::FourierBuffer;
use crate::geometry::{AffineTransform, IntegerRect, IntegerSize, Point};
use crate::interpolate::{resolve_interpolator, InterpolatorParams};

/// Anything that can supply image samples to the engine and take results back.
///
/// Only [`Self::image`] touches pixel data; the sampling helpers build on
/// it. An item that cannot be read returns `None` there, which the engine
/// records as a per-item failure.
pub trait ProcessableItem: Send + Sync {
    fn name(&self) -> &str;

    fn number_of_planes(&self) -> usize;

    fn size(&self) -> IntegerSize;

    /// Current pixels (processed result if any, else the original).
    fn image(&self) -> Option<Arc<ImageBuffer>>;

    /// Incremented on every content change.
    fn sequence_number(&self) -> u64;

    /// Replace the processed image.
    fn set_result(&self, image: ImageBuffer);

    fn is_selected(&self) -> bool {
        true
    }

    fn alignment(&self) -> Option<AlignmentResult>;

    fn set_alignment(&self, result: Option<AlignmentResult>);

    /// Last per-item failure, if any.
    fn failure(&self) -> Option<String> {
        None
    }

    fn set_failure(&self, _reason: Option<String>) {}

    /// Independent copy of `rect`, optionally resampled through `transform`
    /// and per-plane `offsets`, with `n_planes` planes.
    ///
    /// `Ok(None)` means the item could not be read.
    fn sample(
        &self,
        rect: IntegerRect,
        n_planes: usize,
        transform: Option<&AffineTransform>,
        offsets: Option<&[Point]>,
    ) -> Result<Option<ImageBuffer>> {
        let Some(image) = self.image() else {
            return Ok(None);
        };

        if transform.is_none() && offsets.is_none() {
            if !rect.fits_in(image.width(), image.height()) {
                return Err(SiderealError::Config(format!(
                    "sample {}x{} at ({}, {}) is outside '{}' ({}x{})",
                    rect.width(),
                    rect.height(),
                    rect.origin.x,
                    rect.origin.y,
                    self.name(),
                    image.width(),
                    image.height()
                )));
            }
            let (w, h) = (rect.width(), rect.height());
            let mut data = vec![0.0f32; n_planes * w * h];
            {
                let mut planes: Vec<&mut [f32]> = data.chunks_mut(w * h).collect();
                image.extract_sample(
                    &mut planes,
                    rect.origin.x as usize,
                    rect.origin.y as usize,
                    w,
                    h,
                    w,
                );
            }
            return ImageBuffer::from_vec(data, n_planes, w, w, h).map(Some);
        }

        let transform = transform.copied().unwrap_or_default();
        let kind = resolve_interpolator(None, &transform)?;
        let interpolator = kind.build(
            &image,
            rect,
            n_planes,
            &transform,
            offsets,
            &InterpolatorParams::default(),
        );
        let resampled = interpolator.resample()?;
        Ok(Some(resampled))
    }

    /// Forward transform of the single-plane sample in `rect`.
    fn fourier_transform(
        &self,
        rect: IntegerRect,
        prepare_inverse: bool,
    ) -> Result<Option<FourierBuffer>> {
        match self.sample(rect, 1, None, None)? {
            Some(sample) => FourierBuffer::from_image(&sample, prepare_inverse).map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Default)]
struct ItemState {
    selected: bool,
    processed: Option<Arc<ImageBuffer>>,
    sequence: u64,
    alignment: Option<AlignmentResult>,
    failure: Option<String>,
}

/// In-memory item holding an original image and an optional processed one.
#[derive(Debug)]
pub struct ImageItem {
    name: String,
    size: IntegerSize,
    planes: usize,
    original: Option<Arc<ImageBuffer>>,
    state: RwLock<ItemState>,
}

impl ImageItem {
    pub fn new(name: impl Into<String>, image: ImageBuffer) -> Self {
        Self {
            name: name.into(),
            size: IntegerSize::new(image.width(), image.height()),
            planes: image.planes(),
            original: Some(Arc::new(image)),
            state: RwLock::new(ItemState {
                selected: true,
                ..Default::default()
            }),
        }
    }

    /// An item whose pixels cannot be read, e.g. a corrupt file.
    pub fn unreadable(name: impl Into<String>, size: IntegerSize, planes: usize) -> Self {
        Self {
            name: name.into(),
            size,
            planes,
            original: None,
            state: RwLock::new(ItemState {
                selected: true,
                ..Default::default()
            }),
        }
    }

    pub fn set_selected(&self, selected: bool) {
        self.state.write().selected = selected;
    }

    pub fn original(&self) -> Option<Arc<ImageBuffer>> {
        self.original.clone()
    }

    /// Drop the processed image.
    pub fn revert_to_original(&self) {
        let mut state = self.state.write();
        if state.processed.take().is_some() {
            state.sequence += 1;
        }
    }
}

impl ProcessableItem for ImageItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn number_of_planes(&self) -> usize {
        self.planes
    }

    fn size(&self) -> IntegerSize {
        self.size
    }

    fn image(&self) -> Option<Arc<ImageBuffer>> {
        let state = self.state.read();
        state.processed.clone().or_else(|| self.original.clone())
    }

    fn sequence_number(&self) -> u64 {
        self.state.read().sequence
    }

    fn set_result(&self, image: ImageBuffer) {
        let mut state = self.state.write();
        state.processed = Some(Arc::new(image));
        state.sequence += 1;
    }

    fn is_selected(&self) -> bool {
        self.state.read().selected
    }

    fn alignment(&self) -> Option<AlignmentResult> {
        self.state.read().alignment.clone()
    }

    fn set_alignment(&self, result: Option<AlignmentResult>) {
        self.state.write().alignment = result;
    }

    fn failure(&self) -> Option<String> {
        self.state.read().failure.clone()
    }

    fn set_failure(&self, reason: Option<String>) {
        self.state.write().failure = reason;
    }
}

/// Ordered, shareable list of items.
#[derive(Clone, Default)]
pub struct ImageList {
    items: Arc<Vec<Arc<dyn ProcessableItem>>>,
}

impl std::fmt::Debug for ImageList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.items.iter().map(|i| i.name().to_string()))
            .finish()
    }
}

impl ImageList {
    pub fn new(items: Vec<Arc<dyn ProcessableItem>>) -> Self {
        Self {
            items: Arc::new(items),
        }
    }

    /// List of in-memory items named `name-0`, `name-1`, ...
    pub fn from_images(prefix: &str, images: Vec<ImageBuffer>) -> Self {
        Self::new(
            images
                .into_iter()
                .enumerate()
                .map(|(i, image)| {
                    Arc::new(ImageItem::new(format!("{}-{}", prefix, i), image))
                        as Arc<dyn ProcessableItem>
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn ProcessableItem>> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[Arc<dyn ProcessableItem>] {
        &self.items
    }

    pub fn first_item(&self) -> Option<&Arc<dyn ProcessableItem>> {
        self.items.first()
    }

    pub fn last_item(&self) -> Option<&Arc<dyn ProcessableItem>> {
        self.items.last()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|i| i.name() == name)
    }

    pub fn find(&self, name: &str) -> Option<&Arc<dyn ProcessableItem>> {
        self.position(name).and_then(|i| self.items.get(i))
    }

    /// Largest plane count among the items.
    pub fn max_planes(&self) -> usize {
        self.items
            .iter()
            .map(|i| i.number_of_planes())
            .max()
            .unwrap_or(1)
    }

    /// Enumerator over the whole list, first to last.
    pub fn enumerator(&self) -> ItemEnumerator {
        ItemEnumerator::new(self.clone(), Direction::Forward, None, false)
    }

    /// Enumerator from `start` (default: the first item in `direction`).
    pub fn enumerator_from(
        &self,
        direction: Direction,
        start: Option<usize>,
        skip_unselected: bool,
    ) -> ItemEnumerator {
        ItemEnumerator::new(self.clone(), direction, start, skip_unselected)
    }
}
