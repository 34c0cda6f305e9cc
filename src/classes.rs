use crate::ClassId;

/// COCO class codes the monitor treats as vehicles.
pub const VEHICLE_CLASSES: [ClassId; 4] = [2, 3, 5, 7];

pub const OTHER: &str = "other";

#[inline]
pub fn class_name(class: ClassId) -> &'static str {
    match class {
        2 => "car",
        3 => "motorcycle",
        5 => "bus",
        7 => "truck",
        _ => OTHER,
    }
}
