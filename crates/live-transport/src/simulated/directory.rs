//! 데모용 교차로 디렉토리.

use live_core::{IntersectionRef, RoadRegulatorId};

/// 데모 교차로 8801~8806.
pub fn sample_directory() -> Vec<IntersectionRef> {
    [
        (8801, "10.11.81.29", -104.8863731, 39.5946919),
        (8802, "10.11.81.30", -104.8830946, 39.5948212),
        (8803, "10.11.81.31", -104.8808462, 39.5950352),
        (8804, "10.11.81.32", -104.8761659, 39.5950414),
        (8805, "10.11.81.33", -104.8667908, 39.5950548),
        (8806, "10.11.81.34", -104.8574648, 39.5950476),
    ]
    .into_iter()
    .map(|(id, ip, longitude, latitude)| {
        IntersectionRef::new(id, RoadRegulatorId::UNSPECIFIED, ip, longitude, latitude)
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use live_core::{IntersectionId, ViewBounds};

    #[test]
    fn test_sample_directory_viewport() {
        let directory = sample_directory();
        assert_eq!(directory.len(), 6);

        let bounds = ViewBounds::from_edges(-104.887, 39.594, -104.885, 39.596);
        let visible: Vec<IntersectionId> = directory
            .iter()
            .filter(|i| i.is_within(&bounds))
            .map(|i| i.intersection_id)
            .collect();
        assert_eq!(visible, vec![IntersectionId(8801)]);
    }
}
