use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use serde::{Deserialize, Serialize};

/// One child's location on one image, in oriented full-resolution pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub image_id: u32,
    pub center: [u32; 2],
    pub child_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

/// Insertion-ordered, at most one entry per `(image_id, child_id)`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
}

impl AnnotationStore {
    /// Replaces the center in place if the pair exists, appends otherwise.
    pub fn upsert(&mut self, image_id: u32, child_id: u32, center: [u32; 2]) -> Upsert {
        if let Some(ann) = self
            .annotations
            .iter_mut()
            .find(|a| a.image_id == image_id && a.child_id == child_id)
        {
            ann.center = center;
            debug!("Updated image {} child {}: {:?}", image_id, child_id, center);
            return Upsert::Updated;
        }

        self.annotations.push(Annotation {
            image_id,
            center,
            child_id,
        });
        debug!("Added image {} child {}: {:?}", image_id, child_id, center);
        Upsert::Inserted
    }

    pub fn query_by_image(&self, image_id: u32) -> impl Iterator<Item = &Annotation> + '_ {
        self.annotations
            .iter()
            .filter(move |a| a.image_id == image_id)
    }

    pub fn as_slice(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}
