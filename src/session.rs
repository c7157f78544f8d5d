//! Annotation workflow as a state machine.
//!
//! Handlers only mutate the session and return the side effects the caller
//! has to carry out (load a bitmap, write an export, show a dialog, close).

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use crate::{
    annotations::{AnnotationStore, Upsert},
    dataset::Dataset,
};

pub const NO_POINT_MESSAGE: &str = "You haven't selected the point of child!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    AwaitingFolderSelection,
    /// 0-based index into the dataset's images
    Annotating(usize),
    AllDone,
    Terminated,
}

/// Unsaved click on the current image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingPoint {
    /// position on the displayed bitmap, for drawing the marker
    pub display: (f32, f32),
    pub original: [u32; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    FolderOpened(Dataset),
    PointClicked(PendingPoint),
    ChildSelected(u32),
    Save,
    Next,
    CloseTimerElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTarget {
    /// fixed name, overwritten on every image transition
    Rolling,
    /// written once when everything is done
    Timestamped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    LoadImage(usize),
    ShowError(String),
    Export(ExportTarget),
    ScheduleClose,
}

#[derive(Debug, Default)]
pub struct Session {
    stage: Stage,
    dataset: Option<Dataset>,
    store: AnnotationStore,
    pending: Option<PendingPoint>,
    selected_child: Option<u32>,
}

impl Session {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn pending(&self) -> Option<&PendingPoint> {
        self.pending.as_ref()
    }

    pub fn selected_child(&self) -> Option<u32> {
        self.selected_child
    }

    pub fn accepts_input(&self) -> bool {
        matches!(self.stage, Stage::Annotating(_))
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.stage {
            Stage::Annotating(i) => Some(i),
            _ => None,
        }
    }

    pub fn current_image_id(&self) -> Option<u32> {
        self.current_index().map(|i| i as u32 + 1)
    }

    /// `(child name, center)` for everything saved on the current image.
    pub fn saved_for_current(&self) -> Vec<(String, [u32; 2])> {
        let (Some(image_id), Some(ds)) = (self.current_image_id(), self.dataset.as_ref()) else {
            return vec![];
        };
        self.store
            .query_by_image(image_id)
            .map(|a| {
                let name = ds.child_name(a.child_id).unwrap_or("Unknown").to_string();
                (name, a.center)
            })
            .collect()
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match (self.stage, event) {
            (Stage::AwaitingFolderSelection, Event::FolderOpened(dataset)) => {
                self.open(dataset)
            }
            (Stage::Annotating(_), Event::PointClicked(point)) => {
                if self.pending.is_some() {
                    trace!("Replacing pending point");
                }
                self.pending = Some(point);
                vec![]
            }
            (Stage::Annotating(_), Event::ChildSelected(child_id)) => {
                let known = self
                    .dataset
                    .as_ref()
                    .is_some_and(|ds| ds.child_name(child_id).is_some());
                if known {
                    self.selected_child = Some(child_id);
                } else {
                    warn!("Ignoring unknown child id {}", child_id);
                }
                vec![]
            }
            (Stage::Annotating(_), Event::Save) => {
                if self.save() {
                    vec![]
                } else {
                    vec![Effect::ShowError(NO_POINT_MESSAGE.to_string())]
                }
            }
            (Stage::Annotating(index), Event::Next) => self.next(index),
            (Stage::AllDone, Event::CloseTimerElapsed) => {
                self.stage = Stage::Terminated;
                vec![]
            }
            (stage, event) => {
                debug!("Ignoring {:?} in {:?}", event, stage);
                vec![]
            }
        }
    }

    fn open(&mut self, dataset: Dataset) -> Vec<Effect> {
        let Some(first_child) = dataset.children.first().map(|c| c.child_id) else {
            return vec![Effect::ShowError(format!(
                "No child folders in {}",
                dataset.root.display()
            ))];
        };
        if dataset.image_count() == 0 {
            return vec![Effect::ShowError(format!(
                "No images in {}",
                dataset.group_dir().display()
            ))];
        }

        info!("Starting session in {}", dataset.root.display());
        self.dataset = Some(dataset);
        self.store = AnnotationStore::default();
        self.pending = None;
        self.selected_child = Some(first_child);
        self.stage = Stage::Annotating(0);
        vec![Effect::LoadImage(0)]
    }

    /// False when there is no pending point.
    fn save(&mut self) -> bool {
        let (Some(image_id), Some(child_id)) = (self.current_image_id(), self.selected_child)
        else {
            return false;
        };
        let Some(point) = self.pending.take() else {
            return false;
        };

        match self.store.upsert(image_id, child_id, point.original) {
            Upsert::Inserted => info!("Saved child {} on image {}", child_id, image_id),
            Upsert::Updated => info!("Moved child {} on image {}", child_id, image_id),
        }
        true
    }

    fn next(&mut self, index: usize) -> Vec<Effect> {
        if !self.save() {
            trace!("Nothing pending on image {}", index + 1);
        }

        let mut effects = vec![Effect::Export(ExportTarget::Rolling)];

        let count = self.dataset.as_ref().map_or(0, Dataset::image_count);
        if index + 1 < count {
            self.stage = Stage::Annotating(index + 1);
            effects.push(Effect::LoadImage(index + 1));
        } else {
            info!("All {} images done", count);
            self.stage = Stage::AllDone;
            effects.push(Effect::Export(ExportTarget::Timestamped));
            effects.push(Effect::ScheduleClose);
        }
        effects
    }
}
