//! JSON export of the annotation set with roster and image metadata.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::SystemTime,
};

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use serde::{Deserialize, Serialize};

use crate::{
    annotations::{Annotation, AnnotationStore},
    dataset::{Child, Dataset},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub file_name: String,
    pub height: u32,
    pub width: u32,
    pub image_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportFile {
    pub annotations: Vec<Annotation>,
    pub children: Vec<Child>,
    pub images: Vec<ImageInfo>,
}

impl ExportFile {
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
        Ok(serde_json::from_str(&s)?)
    }
}

/// `annotations_<YYYYMMDD_HHMM>.json`
pub fn timestamped_file_name(prefix: &str, now: chrono::NaiveDateTime) -> String {
    format!("{}_{}.json", prefix, now.format("%Y%m%d_%H%M"))
}

#[derive(Debug, Default)]
pub struct Exporter {
    /// keyed by path, invalidated by modification time
    dimension_cache: Option<HashMap<PathBuf, (SystemTime, (u32, u32))>>,
}

impl Exporter {
    pub fn new(cache_dimensions: bool) -> Self {
        Self {
            dimension_cache: cache_dimensions.then(HashMap::new),
        }
    }

    fn dimensions(&mut self, path: &Path) -> Result<(u32, u32)> {
        let read = |path: &Path| {
            image::image_dimensions(path)
                .with_context(|| format!("Failed to read dimensions of {}", path.display()))
        };

        let Some(cache) = self.dimension_cache.as_mut() else {
            return read(path);
        };

        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat {}", path.display()))?;

        if let Some((cached_at, dims)) = cache.get(path) {
            if *cached_at == modified {
                return Ok(*dims);
            }
        }

        let dims = read(path)?;
        cache.insert(path.to_path_buf(), (modified, dims));
        Ok(dims)
    }

    /// Image metadata re-read from disk, numbered in the dataset's canonical order.
    pub fn image_info(&mut self, dataset: &Dataset) -> Result<Vec<ImageInfo>> {
        let group = dataset.group_dir();
        let mut out = Vec::with_capacity(dataset.image_count());
        for (image_id, file_name) in dataset.numbered_images() {
            let (width, height) = self.dimensions(&group.join(file_name))?;
            out.push(ImageInfo {
                file_name: file_name.to_string(),
                height,
                width,
                image_id,
            });
        }
        Ok(out)
    }

    pub fn build(&mut self, dataset: &Dataset, store: &AnnotationStore) -> Result<ExportFile> {
        Ok(ExportFile {
            annotations: store.as_slice().to_vec(),
            children: dataset.children.clone(),
            images: self.image_info(dataset)?,
        })
    }

    /// Writes `<root>/<file_name>`, overwriting any previous export.
    pub fn export(
        &mut self,
        dataset: &Dataset,
        store: &AnnotationStore,
        file_name: &str,
    ) -> Result<PathBuf> {
        let doc = self.build(dataset, store)?;
        let path = dataset.root.join(file_name);

        let file =
            File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        write_pretty(&mut writer, &doc)?;
        writer.flush()?;

        info!(
            "Exported {} annotations to {}",
            doc.annotations.len(),
            path.display()
        );
        Ok(path)
    }
}

/// Pretty JSON with 4-space indentation.
pub fn write_pretty<W: Write, T: Serialize>(writer: W, value: &T) -> Result<()> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(writer, formatter);
    value
        .serialize(&mut ser)
        .context("Failed to serialize export")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::make_root;

    #[test]
    fn timestamp_format() {
        let now = chrono::NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 59)
            .unwrap();
        assert_eq!(
            timestamped_file_name("annotations", now),
            "annotations_20240307_0905.json"
        );
    }

    #[test]
    fn export_layout() {
        let root = make_root(&["Bob", "Alice"], &[("b.jpg", 8, 6), ("a.png", 5, 9)]);
        let ds = Dataset::open(root.path()).unwrap();
        let mut store = AnnotationStore::default();
        store.upsert(1, 2, [3, 4]);

        let path = Exporter::default()
            .export(&ds, &store, "annotations.json")
            .unwrap();
        assert_eq!(path, root.path().join("annotations.json"));

        let doc = ExportFile::read_from_file(&path).unwrap();
        assert_eq!(doc.annotations, store.as_slice());
        assert_eq!(doc.children, ds.children);
        assert_eq!(
            doc.images,
            vec![
                ImageInfo {
                    file_name: "a.png".into(),
                    height: 9,
                    width: 5,
                    image_id: 1
                },
                ImageInfo {
                    file_name: "b.jpg".into(),
                    height: 6,
                    width: 8,
                    image_id: 2
                },
            ]
        );

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n    \"annotations\": [\n        {\n            \"image_id\": 1,"));
        let keys = ["\"annotations\"", "\"children\"", "\"images\""]
            .map(|k| text.find(k).unwrap());
        assert!(keys[0] < keys[1] && keys[1] < keys[2]);
    }

    #[test]
    fn export_twice_is_stable() {
        let root = make_root(&["Alice"], &[("a.png", 4, 4)]);
        let ds = Dataset::open(root.path()).unwrap();
        let mut store = AnnotationStore::default();
        store.upsert(1, 1, [1, 2]);

        let mut exporter = Exporter::new(true);
        let path = exporter.export(&ds, &store, "annotations.json").unwrap();
        let first = std::fs::read(&path).unwrap();
        exporter.export(&ds, &store, "annotations.json").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), first);
    }

    #[test]
    fn dimensions_follow_disk() {
        let root = make_root(&["Alice"], &[("a.png", 4, 4)]);
        let ds = Dataset::open(root.path()).unwrap();
        let mut exporter = Exporter::default();
        assert_eq!(exporter.image_info(&ds).unwrap()[0].width, 4);

        crate::dataset::tests::write_image(&ds.image_path(0).unwrap(), 7, 3);
        let info = exporter.image_info(&ds).unwrap();
        assert_eq!((info[0].width, info[0].height), (7, 3));
    }

    #[test]
    fn cached_dimensions_refresh_on_rewrite() {
        let root = make_root(&["Alice"], &[("a.png", 4, 4)]);
        let ds = Dataset::open(root.path()).unwrap();
        let path = ds.image_path(0).unwrap();
        let mut exporter = Exporter::new(true);
        assert_eq!(exporter.image_info(&ds).unwrap()[0].width, 4);

        crate::dataset::tests::write_image(&path, 7, 3);
        // coarse filesystem clocks may not move on an immediate rewrite
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + std::time::Duration::from_secs(5))
            .unwrap();

        let info = exporter.image_info(&ds).unwrap();
        assert_eq!((info[0].width, info[0].height), (7, 3));
    }

    #[test]
    fn missing_image_fails_export() {
        let root = make_root(&["Alice"], &[("a.png", 4, 4)]);
        let ds = Dataset::open(root.path()).unwrap();
        std::fs::remove_file(ds.image_path(0).unwrap()).unwrap();

        let res = Exporter::default().export(&ds, &AnnotationStore::default(), "annotations.json");
        assert!(res.is_err());
    }
}
