//! JSON dataset manifest loaded into a [`MemoryEngine`].
//!
//! ```json
//! {
//!   "crs": "geographic",
//!   "images": [{ "id": "WWF/HydroSHEDS/03VFDEM", "path": "dem.tif", "bands": ["b1"] }],
//!   "collections": [{
//!     "id": "COPERNICUS/S1_GRD",
//!     "scenes": [{
//!       "path": "s1_20220801.tif",
//!       "acquired": "2022-08-01T01:12:00Z",
//!       "bands": ["VV", "VH"],
//!       "properties": { "instrumentMode": "IW", "resolution_meters": 10 }
//!     }]
//!   }]
//! }
//! ```
//!
//! Relative paths are resolved against the manifest's directory.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{MemoryEngine, Scene};
use crate::error::Result;
use crate::io::gdal::GeoRasterReader;
use crate::raster::{PropertyValue, Raster};
use crate::types::CoordinateSystem;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageEntry {
    pub id: String,
    pub path: PathBuf,
    #[serde(default)]
    pub bands: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub path: PathBuf,
    pub acquired: DateTime<Utc>,
    #[serde(default)]
    pub bands: Option<Vec<String>>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub id: String,
    #[serde(default)]
    pub scenes: Vec<SceneEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogManifest {
    /// Coordinate system shared by every raster of the catalog
    #[serde(default)]
    pub crs: CoordinateSystem,
    #[serde(default)]
    pub images: Vec<ImageEntry>,
    #[serde(default)]
    pub collections: Vec<CollectionEntry>,
}

impl CatalogManifest {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Read every raster of the manifest into a new engine.
    pub fn load(&self, base_dir: &Path) -> Result<MemoryEngine> {
        let mut engine = MemoryEngine::new();
        for image in &self.images {
            let raster = read(base_dir, &image.path, image.bands.as_deref(), self.crs)?;
            engine.insert_image(&image.id, raster);
        }
        for collection in &self.collections {
            for (index, entry) in collection.scenes.iter().enumerate() {
                let raster = read(base_dir, &entry.path, entry.bands.as_deref(), self.crs)?;
                engine.insert_scene(
                    &collection.id,
                    Scene {
                        id: entry
                            .id
                            .clone()
                            .unwrap_or_else(|| format!("{}/{index}", collection.id)),
                        acquired: entry.acquired,
                        properties: entry.properties.clone(),
                        raster,
                    },
                );
            }
        }
        info!(
            "Catalog loaded: {} image(s), {} collection(s), {} scene(s)",
            self.images.len(),
            self.collections.len(),
            self.collections.iter().map(|c| c.scenes.len()).sum::<usize>()
        );
        Ok(engine)
    }
}

fn read(
    base_dir: &Path,
    path: &Path,
    bands: Option<&[String]>,
    crs: CoordinateSystem,
) -> Result<Raster> {
    let full = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    };
    let reader = GeoRasterReader::open(&full)?;
    Ok(reader.read_raster(crs, bands)?)
}

/// Load a manifest file and every raster it lists.
pub fn load_catalog(path: &Path) -> Result<MemoryEngine> {
    let manifest = CatalogManifest::from_json_file(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    manifest.load(base_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RasterEngine;
    use crate::raster::ImageCollection;

    fn write_grid(dir: &Path, name: &str, value: f64) {
        let text = format!(
            "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n{value} {value}\n{value} {value}\n"
        );
        std::fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn manifest_defaults() {
        let manifest: CatalogManifest = serde_json::from_str("{}").unwrap();
        assert_eq!(manifest.crs, CoordinateSystem::Geographic);
        assert!(manifest.images.is_empty());
    }

    #[test]
    fn loads_images_and_scenes() {
        let dir = tempfile::tempdir().unwrap();
        write_grid(dir.path(), "dem.asc", 5.0);
        write_grid(dir.path(), "s1_a.asc", -12.0);
        write_grid(dir.path(), "s1_b.asc", -18.0);
        let manifest = r#"{
            "crs": "projected",
            "images": [{"id": "dem", "path": "dem.asc", "bands": ["elevation"]}],
            "collections": [{"id": "S1", "scenes": [
                {"path": "s1_a.asc", "acquired": "2022-06-01T00:00:00Z", "bands": ["VH"],
                 "properties": {"instrumentMode": "IW"}},
                {"path": "s1_b.asc", "acquired": "2022-08-01T00:00:00Z", "bands": ["VH"],
                 "properties": {"instrumentMode": "EW"}}
            ]}]
        }"#;
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, manifest).unwrap();

        let engine = load_catalog(&path).unwrap();
        assert!(engine.has_image("dem"));
        let iw = ImageCollection::load("S1").filter_eq("instrumentMode", "IW");
        assert_eq!(engine.collection_size(&iw).unwrap(), 1);
        assert_eq!(engine.collection_size(&ImageCollection::load("S1")).unwrap(), 2);
    }

    #[test]
    fn missing_raster_fails() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = CatalogManifest {
            images: vec![ImageEntry {
                id: "dem".into(),
                path: "absent.tif".into(),
                bands: None,
            }],
            ..CatalogManifest::default()
        };
        assert!(manifest.load(dir.path()).is_err());
    }
}
