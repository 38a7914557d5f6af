use tracing::debug;

use crate::error::Result;
use crate::solver::solver::BatchOutputs;
use crate::telemetry::class_monitor::ClassRatios;
use crate::telemetry::overlay::render_hard_rois;
use crate::telemetry::sink::TelemetrySink;
use crate::train::loss_sample::LossSample;
use crate::train::stage::TrainingStage;
use crate::train::train_config::TrainConfig;

/// Emits scalars and overlay images at their own cadences, every tag
/// prefixed with the run's namespace.
pub struct TelemetryEmitter<K: TelemetrySink> {
    sink: K,
    namespace: String,
    scalar_iters: u64,
    image_iters: u64,
}

impl<K: TelemetrySink> TelemetryEmitter<K> {
    pub fn new(sink: K, namespace: impl Into<String>, config: &TrainConfig) -> Self {
        TelemetryEmitter {
            sink,
            namespace: namespace.into(),
            scalar_iters: config.scalar_summary_iters,
            image_iters: config.image_summary_iters,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    fn tag(&self, name: &str) -> String {
        format!("{}/{}", self.namespace, name)
    }

    pub fn scalars_due(&self, iteration: u64) -> bool {
        due(iteration, self.scalar_iters)
    }

    pub fn image_due(&self, iteration: u64) -> bool {
        due(iteration, self.image_iters)
    }

    /// Emits the smoothed total, the stage's loss terms and the learning rate.
    pub fn emit_losses(
        &mut self,
        iteration: u64,
        stage: TrainingStage,
        smoothed_loss: f64,
        sample: &LossSample,
        learning_rate: f64,
    ) -> Result<()> {
        let tag = self.tag("total_loss");
        self.sink.emit_scalar(&tag, smoothed_loss, iteration)?;
        for term in stage.loss_terms() {
            let tag = self.tag(term.tag());
            self.sink.emit_scalar(&tag, term.value(sample), iteration)?;
        }
        let tag = self.tag("lr");
        self.sink.emit_scalar(&tag, learning_rate, iteration)
    }

    /// Emits one ratio per class plus the average RoIs per image.
    pub fn emit_class_ratios(&mut self, iteration: u64, window: &ClassRatios) -> Result<()> {
        if window.ratios.is_empty() {
            debug!(iteration, "No hard RoIs in monitoring window; skipping class ratios");
        }
        for (name, ratio) in &window.ratios {
            let tag = self.tag(name);
            self.sink.emit_scalar(&tag, *ratio, iteration)?;
        }
        let tag = self.tag("rois");
        self.sink.emit_scalar(&tag, window.rois_per_image, iteration)
    }

    /// Renders and emits the hard-RoI overlay of the current batch.
    pub fn emit_overlay(
        &mut self,
        iteration: u64,
        outputs: &BatchOutputs,
        config: &TrainConfig,
    ) -> Result<()> {
        let image = render_hard_rois(outputs, config)?;
        let tag = self.tag("image");
        self.sink.emit_image(&tag, &image, iteration)
    }

    pub fn close(&mut self) -> Result<()> {
        self.sink.close()
    }
}

fn due(iteration: u64, every: u64) -> bool {
    iteration != 0 && every > 0 && iteration % every == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::sink::{ChannelSink, TelemetryEvent};

    fn scalar_tags(rx: &std::sync::mpsc::Receiver<TelemetryEvent>) -> Vec<String> {
        rx.try_iter()
            .filter_map(|e| match e {
                TelemetryEvent::Scalar { tag, .. } => Some(tag),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn rpn_stage_emits_rpn_terms_under_stage_namespace() {
        let (sink, rx) = ChannelSink::channel();
        let mut e = TelemetryEmitter::new(sink, "stage1_rpn", &TrainConfig::default());
        e.emit_losses(20, TrainingStage::RpnOnly, 1.0, &LossSample::uniform(0.5), 0.001)
            .unwrap();
        assert_eq!(
            scalar_tags(&rx),
            vec![
                "stage1_rpn/total_loss",
                "stage1_rpn/rpn_cls_loss",
                "stage1_rpn/rpn_bbox_loss",
                "stage1_rpn/lr"
            ]
        );
    }

    #[test]
    fn cadences_are_gated_on_nonzero_iteration() {
        let cfg = TrainConfig {
            scalar_summary_iters: 10,
            image_summary_iters: 0,
            ..TrainConfig::default()
        };
        let (sink, _rx) = ChannelSink::channel();
        let e = TelemetryEmitter::new(sink, "data", &cfg);
        assert!(!e.scalars_due(0));
        assert!(e.scalars_due(30));
        assert!(!e.scalars_due(31));
        assert!(!e.image_due(30));
    }

    #[test]
    fn empty_window_still_reports_rois() {
        let (sink, rx) = ChannelSink::channel();
        let mut e = TelemetryEmitter::new(sink, "data", &TrainConfig::default());
        let window = ClassRatios { ratios: vec![], rois_per_image: 0.0, total: 0 };
        e.emit_class_ratios(100, &window).unwrap();
        assert_eq!(scalar_tags(&rx), vec!["data/rois"]);
    }
}
