use tracing::info;

use crate::roidb::entry::RoiEntry;
use crate::train::train_config::TrainConfig;

/// Returns the roidb used for training, appending horizontally flipped
/// copies of every entry when `USE_FLIPPED` is set.
pub fn get_training_roidb(mut roidb: Vec<RoiEntry>, config: &TrainConfig) -> Vec<RoiEntry> {
    if config.use_flipped {
        info!("Appending horizontally-flipped training examples...");
        let flipped: Vec<RoiEntry> = roidb.iter().map(RoiEntry::flipped_copy).collect();
        roidb.extend(flipped);
    }
    roidb
}

/// An entry is usable if it has at least one foreground RoI or at least one
/// background RoI.
pub fn is_valid(entry: &RoiEntry, config: &TrainConfig) -> bool {
    entry.max_overlaps.iter().any(|&o| {
        o >= config.fg_thresh || (o < config.bg_thresh_hi && o >= config.bg_thresh_lo)
    })
}

/// Removes entries without any usable RoI.
pub fn filter_roidb(roidb: Vec<RoiEntry>, config: &TrainConfig) -> Vec<RoiEntry> {
    let num = roidb.len();
    let filtered: Vec<RoiEntry> = roidb.into_iter().filter(|e| is_valid(e, config)).collect();
    let num_after = filtered.len();
    info!(
        "Filtered {} roidb entries: {} -> {}",
        num - num_after,
        num,
        num_after
    );
    filtered
}
