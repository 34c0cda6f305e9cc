use crate::classes::VEHICLE_CLASSES;
use crate::detection::Detection;
use crate::ClassId;

use std::cmp::Ordering;

pub struct DetectionFilterConfig {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub classes: Vec<ClassId>,
}

impl DetectionFilterConfig {
    pub fn new(confidence_threshold: f32, classes: Vec<ClassId>) -> Self {
        Self {
            confidence_threshold,
            iou_threshold: 0.5,
            classes,
        }
    }
}

impl Default for DetectionFilterConfig {
    fn default() -> Self {
        Self::new(0.4, VEHICLE_CLASSES.to_vec())
    }
}

/// Applies the class allow-list, the confidence threshold and class-wise
/// overlap suppression to tracker output. Survivors keep their input order.
pub struct DetectionFilter {
    config: DetectionFilterConfig,
}

impl DetectionFilter {
    pub fn new(config: DetectionFilterConfig) -> Self {
        Self { config }
    }

    pub fn apply(&self, dets: &[Detection]) -> Vec<Detection> {
        let candidates: Vec<usize> = dets
            .iter()
            .enumerate()
            .filter(|(_, det)| {
                det.confidence >= self.config.confidence_threshold
                    && self.config.classes.contains(&det.class)
            })
            .map(|(idx, _)| idx)
            .collect();

        let mut keep = vec![false; dets.len()];
        for class in &self.config.classes {
            let group: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|&idx| dets[idx].class == *class)
                .collect();

            for idx in self.non_maximum_supression(dets, group) {
                keep[idx] = true;
            }
        }

        dets.iter()
            .zip(keep)
            .filter_map(|(det, kept)| if kept { Some(*det) } else { None })
            .collect()
    }

    fn non_maximum_supression(&self, dets: &[Detection], mut group: Vec<usize>) -> Vec<usize> {
        group.sort_by(|&a, &b| {
            dets[b]
                .confidence
                .partial_cmp(&dets[a].confidence)
                .unwrap_or(Ordering::Equal)
        });

        let mut retained: Vec<usize> = Vec::with_capacity(group.len());
        for idx in group {
            if retained
                .iter()
                .all(|&kept| dets[kept].iou(&dets[idx]) <= self.config.iou_threshold)
            {
                retained.push(idx);
            }
        }

        retained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32, id: i32, class: i32, p: f32) -> Detection {
        Detection::new(BBox::ltrb(x1, y1, x2, y2), id, class, p)
    }

    #[test]
    fn drops_disallowed_classes_and_low_confidence() {
        let filter = DetectionFilter::new(DetectionFilterConfig::default());
        let dets = [
            det(0.0, 0.0, 10.0, 10.0, 1, 2, 0.9),
            det(20.0, 0.0, 30.0, 10.0, 2, 0, 0.9),
            det(40.0, 0.0, 50.0, 10.0, 3, 7, 0.3),
            det(60.0, 0.0, 70.0, 10.0, 4, 5, 0.4),
        ];

        let ids: Vec<_> = filter.apply(&dets).iter().map(|d| d.track_id).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn suppresses_overlaps_within_a_class_only() {
        let filter = DetectionFilter::new(DetectionFilterConfig::default());
        let dets = [
            det(0.0, 0.0, 10.0, 10.0, 1, 2, 0.6),
            det(1.0, 0.0, 11.0, 10.0, 2, 2, 0.95),
            det(0.0, 0.0, 10.0, 10.0, 3, 7, 0.5),
            det(50.0, 50.0, 60.0, 60.0, 4, 2, 0.5),
        ];

        let ids: Vec<_> = filter.apply(&dets).iter().map(|d| d.track_id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }
}
