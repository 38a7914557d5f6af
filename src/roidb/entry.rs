use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::Result;

/// One image of the region-of-interest database.
///
/// `boxes`, `max_overlaps` and `max_classes` are parallel: one value per
/// candidate RoI (ground-truth boxes included). `bbox_targets` holds
/// `[class, dx, dy, dw, dh]` rows for the RoIs that carry a regression target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiEntry {
    pub image: String,
    pub width: u32,
    pub height: u32,
    pub boxes: Vec<[f64; 4]>,
    #[serde(default)]
    pub gt_classes: Vec<usize>,
    /// Highest IoU of each RoI with any ground-truth box.
    pub max_overlaps: Vec<f64>,
    #[serde(default)]
    pub max_classes: Vec<usize>,
    #[serde(default)]
    pub flipped: bool,
    #[serde(default)]
    pub bbox_targets: Vec<[f64; 5]>,
}

impl RoiEntry {
    /// Horizontally mirrored copy of this entry.
    pub fn flipped_copy(&self) -> RoiEntry {
        let w = self.width as f64;
        let boxes = self
            .boxes
            .iter()
            .map(|&[x1, y1, x2, y2]| [w - x2 - 1.0, y1, w - x1 - 1.0, y2])
            .collect();
        // dx is measured along the flipped axis
        let bbox_targets = self
            .bbox_targets
            .iter()
            .map(|&[c, dx, dy, dw, dh]| [c, -dx, dy, dw, dh])
            .collect();
        RoiEntry {
            boxes,
            bbox_targets,
            flipped: !self.flipped,
            ..self.clone()
        }
    }
}

/// Reads a roidb previously written as a JSON array of entries.
pub fn load_roidb(path: &Path) -> Result<Vec<RoiEntry>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Writes a roidb as pretty-printed JSON.
pub fn save_roidb(roidb: &[RoiEntry], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(writer, roidb)?;
    Ok(())
}
