//! Per-image metadata tree.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Animals of one species counted in an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesCount {
    pub scientific_name: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageEntry {
    /// Path relative to the tree root, `/`-separated.
    pub path: String,
    /// Capture time as read from the image, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_taken: Option<String>,
    /// Id of the location the image was taken at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(default)]
    pub species: Vec<SpeciesCount>,
}

impl ImageEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Add `count` animals of a species, merging with an existing tag.
    /// Merged counts saturate at `u32::MAX`.
    pub fn tag(&mut self, scientific_name: &str, count: u32) {
        match self
            .species
            .iter_mut()
            .find(|s| s.scientific_name == scientific_name)
        {
            Some(existing) => existing.count = existing.count.saturating_add(count),
            None => self.species.push(SpeciesCount {
                scientific_name: scientific_name.to_string(),
                count,
            }),
        }
    }

    pub fn untag(&mut self, scientific_name: &str) {
        self.species.retain(|s| s.scientific_name != scientific_name);
    }

    pub fn is_tagged(&self) -> bool {
        !self.species.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageDirectory {
    pub name: String,
    #[serde(default)]
    pub images: Vec<ImageEntry>,
    #[serde(default)]
    pub children: Vec<ImageDirectory>,
}

impl ImageDirectory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Every image in this directory and below, depth first.
    pub fn images_recursive(&self) -> Vec<&ImageEntry> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(dir) = stack.pop() {
            out.extend(dir.images.iter());
            stack.extend(dir.children.iter().rev());
        }
        out
    }

    fn find_image_mut(&mut self, path: &str) -> Option<&mut ImageEntry> {
        if let Some(pos) = self.images.iter().position(|i| i.path == path) {
            return self.images.get_mut(pos);
        }
        self.children.iter_mut().find_map(|c| c.find_image_mut(path))
    }
}

/// All imported image directories and their tags.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetadataTree {
    #[serde(default)]
    pub roots: Vec<ImageDirectory>,
}

impl MetadataTree {
    pub fn image_count(&self) -> usize {
        self.roots.iter().map(|r| r.images_recursive().len()).sum()
    }

    /// Relative paths of images carrying at least one species tag.
    pub fn tagged_paths(&self) -> BTreeSet<String> {
        self.roots
            .iter()
            .flat_map(|r| r.images_recursive())
            .filter(|i| i.is_tagged())
            .map(|i| i.path.clone())
            .collect()
    }

    /// Clones of every image entry, depth first per root.
    pub fn entries(&self) -> Vec<ImageEntry> {
        self.roots
            .iter()
            .flat_map(|r| r.images_recursive())
            .cloned()
            .collect()
    }

    pub fn image_mut(&mut self, path: &str) -> Option<&mut ImageEntry> {
        self.roots.iter_mut().find_map(|r| r.find_image_mut(path))
    }
}
