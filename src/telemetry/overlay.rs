use image::{Rgb, RgbImage};

use crate::error::{Result, TrainError};
use crate::solver::solver::{BatchOutputs, ImageBlob};
use crate::train::train_config::TrainConfig;

const BOX_THICKNESS: u32 = 2;

/// Renders the input image of the current batch with one rectangle per hard
/// RoI, colored by the RoI's class label.
///
/// # Errors
/// Fails fast with `TrainError::Invariant` if the blob does not hold exactly
/// one 3-channel image, if there are more hard RoIs than `BATCH_SIZE`, if a
/// RoI row does not carry 4 coordinates, or if a label has no color.
pub fn render_hard_rois(outputs: &BatchOutputs, config: &TrainConfig) -> Result<RgbImage> {
    let mut img = restore_input_image(&outputs.data, config.pixel_means)?;

    let rois = &outputs.rois_hard;
    if rois.len() > config.batch_size {
        return Err(TrainError::invariant(format!(
            "{} hard RoIs exceed BATCH_SIZE {}",
            rois.len(),
            config.batch_size
        )));
    }

    for (i, roi) in rois.iter().enumerate() {
        let coords = roi.get(1..).unwrap_or(&[]);
        if coords.len() != 4 {
            return Err(TrainError::invariant(format!(
                "hard RoI {} has {} coordinates, expected 4",
                i,
                coords.len()
            )));
        }
        let label = *outputs.labels_hard.get(i).ok_or_else(|| {
            TrainError::invariant(format!("hard RoI {} has no label", i))
        })?;
        let [b, g, r] = *config.colors.get(label).ok_or_else(|| {
            TrainError::invariant(format!("no overlay color for class {}", label))
        })?;
        let bbox = [
            coords[0] as i64,
            coords[1] as i64,
            coords[2] as i64,
            coords[3] as i64,
        ];
        draw_rect(&mut img, bbox, Rgb([r, g, b]), BOX_THICKNESS);
    }

    Ok(img)
}

/// Adds the pixel means back to a single mean-centred BGR image and converts
/// it to an 8-bit RGB image.
pub fn restore_input_image(blob: &ImageBlob, pixel_means: [f64; 3]) -> Result<RgbImage> {
    if blob.num != 1 {
        return Err(TrainError::invariant(format!(
            "image summaries need a batch of exactly 1 image, got {}",
            blob.num
        )));
    }
    if blob.channels != 3 {
        return Err(TrainError::invariant(format!(
            "expected a 3-channel image, got {} channels",
            blob.channels
        )));
    }
    let expected = blob.channels * blob.height * blob.width;
    if blob.data.len() != expected {
        return Err(TrainError::shape(expected, blob.data.len()));
    }

    let mut img = RgbImage::new(blob.width as u32, blob.height as u32);
    for y in 0..blob.height {
        for x in 0..blob.width {
            let mut bgr = [0u8; 3];
            for (c, v) in bgr.iter_mut().enumerate() {
                let value = blob.at(0, c, y, x) as f64 + pixel_means[c];
                *v = value.round().clamp(0.0, 255.0) as u8;
            }
            img.put_pixel(x as u32, y as u32, Rgb([bgr[2], bgr[1], bgr[0]]));
        }
    }
    Ok(img)
}

/// Draws a rectangle border clipped to the image.
pub fn draw_rect(img: &mut RgbImage, bbox: [i64; 4], color: Rgb<u8>, thickness: u32) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let x0 = bbox[0].min(bbox[2]);
    let x1 = bbox[0].max(bbox[2]);
    let y0 = bbox[1].min(bbox[3]);
    let y1 = bbox[1].max(bbox[3]);
    if x1 < 0 || y1 < 0 || x0 >= w as i64 || y0 >= h as i64 {
        return;
    }

    let clamp_x = |v: i64| v.clamp(0, w as i64 - 1) as u32;
    let clamp_y = |v: i64| v.clamp(0, h as i64 - 1) as u32;
    for t in 0..thickness as i64 {
        let (xx0, xx1) = (x0 + t, x1 - t);
        let (yy0, yy1) = (y0 + t, y1 - t);
        if xx0 > xx1 || yy0 > yy1 {
            break;
        }
        for x in clamp_x(xx0)..=clamp_x(xx1) {
            if (0..h as i64).contains(&yy0) {
                img.put_pixel(x, yy0 as u32, color);
            }
            if (0..h as i64).contains(&yy1) {
                img.put_pixel(x, yy1 as u32, color);
            }
        }
        for y in clamp_y(yy0)..=clamp_y(yy1) {
            if (0..w as i64).contains(&xx0) {
                img.put_pixel(xx0 as u32, y, color);
            }
            if (0..w as i64).contains(&xx1) {
                img.put_pixel(xx1 as u32, y, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(num: usize, value: f32) -> ImageBlob {
        ImageBlob {
            num,
            channels: 3,
            height: 8,
            width: 8,
            data: vec![value; num * 3 * 8 * 8],
        }
    }

    fn config() -> TrainConfig {
        TrainConfig {
            batch_size: 2,
            pixel_means: [10.0, 20.0, 30.0],
            colors: vec![[0, 0, 0], [255, 0, 0]],
            ..TrainConfig::default()
        }
    }

    #[test]
    fn pixel_means_are_added_back_and_channels_swapped() {
        let img = restore_input_image(&blob(1, 1.0), [10.0, 20.0, 30.0]).unwrap();
        assert_eq!(img.get_pixel(3, 3), &Rgb([31, 21, 11]));
    }

    #[test]
    fn rectangles_use_the_label_color() {
        let outputs = BatchOutputs {
            labels_hard: vec![1],
            data: blob(1, 0.0),
            rois_hard: vec![vec![0.0, 1.0, 1.0, 6.0, 6.0]],
        };
        let img = render_hard_rois(&outputs, &config()).unwrap();
        // BGR [255, 0, 0] is blue
        assert_eq!(img.get_pixel(1, 1), &Rgb([0, 0, 255]));
        assert_eq!(img.get_pixel(2, 4), &Rgb([0, 0, 255]));
        assert_eq!(img.get_pixel(4, 4), &Rgb([30, 20, 10]));
    }

    #[test]
    fn multi_image_batches_are_rejected() {
        let outputs = BatchOutputs {
            labels_hard: vec![],
            data: blob(2, 0.0),
            rois_hard: vec![],
        };
        assert!(matches!(
            render_hard_rois(&outputs, &config()),
            Err(TrainError::Invariant(_))
        ));
    }

    #[test]
    fn too_many_rois_are_rejected() {
        let outputs = BatchOutputs {
            labels_hard: vec![0, 0, 0],
            data: blob(1, 0.0),
            rois_hard: vec![vec![0.0, 1.0, 1.0, 2.0, 2.0]; 3],
        };
        assert!(matches!(
            render_hard_rois(&outputs, &config()),
            Err(TrainError::Invariant(_))
        ));
    }

    #[test]
    fn malformed_coordinates_are_rejected() {
        let outputs = BatchOutputs {
            labels_hard: vec![1],
            data: blob(1, 0.0),
            rois_hard: vec![vec![0.0, 1.0, 1.0, 2.0]],
        };
        assert!(matches!(
            render_hard_rois(&outputs, &config()),
            Err(TrainError::Invariant(_))
        ));
    }

    #[test]
    fn boxes_outside_the_image_are_clipped() {
        let mut img = RgbImage::new(4, 4);
        draw_rect(&mut img, [-5, -5, 100, 100], Rgb([1, 2, 3]), 2);
        draw_rect(&mut img, [10, 10, 20, 20], Rgb([9, 9, 9]), 2);
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(3, 3), &Rgb([0, 0, 0]));
    }
}
