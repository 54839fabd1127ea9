use std::path::PathBuf;

use approx::assert_relative_eq;
use image::{Rgb, RgbImage};

use thermoscan::{
    parse_edits, BBox, DetectConfig, Error, FeedbackEdit, Inspector, ThresholdSet, ThresholdStore,
};

const BACKGROUND: Rgb<u8> = Rgb([20, 20, 80]);
const RED_HOT: Rgb<u8> = Rgb([255, 40, 0]);
const YELLOW_HOT: Rgb<u8> = Rgb([255, 200, 0]);

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("thermoscan-it-{}-{name}.json", std::process::id()))
}

fn paint(img: &mut RgbImage, bbox: BBox, color: Rgb<u8>) {
    for y in bbox.y..bbox.y2() {
        for x in bbox.x..bbox.x2() {
            img.put_pixel(x, y, color);
        }
    }
}

fn disk(img: &mut RgbImage, cx: i64, cy: i64, r: i64, color: Rgb<u8>) {
    for y in cy - r..=cy + r {
        for x in cx - r..=cx + r {
            if (x - cx).pow(2) + (y - cy).pow(2) <= r * r {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Three red conductors on the left, three yellow terminals further right.
fn panel() -> (RgbImage, Vec<FeedbackEdit>) {
    let mut img = RgbImage::from_pixel(640, 480, BACKGROUND);
    let mut edits = Vec::new();

    for (y, len, thick) in [(50, 200, 4), (120, 260, 5), (200, 180, 6)] {
        let wire = BBox::new(50, y, len, thick);
        paint(&mut img, wire, RED_HOT);
        edits.push(FeedbackEdit::Added {
            bbox: BBox::new(wire.x - 3, wire.y - 3, wire.w + 6, wire.h + 6),
            label: "Point Overload (Faulty)".into(),
        });
    }
    for cy in [100, 200, 300] {
        disk(&mut img, 450, cy, 10, YELLOW_HOT);
        edits.push(FeedbackEdit::Added {
            bbox: BBox::new(436, cy as u32 - 14, 29, 29),
            label: "Loose Joint (Potential)".into(),
        });
    }
    (img, edits)
}

#[test]
fn feedback_recalibrates_and_persists() {
    let path = temp_path("loop");
    let _ = std::fs::remove_file(&path);

    let inspector = Inspector::new(
        DetectConfig::default(),
        ThresholdStore::open_json(&path).unwrap(),
    );
    let (img, edits) = panel();

    let out = inspector.submit_feedback(&img, &[], &edits).unwrap();
    assert_eq!(out.replay.applied, 6);
    assert_eq!(out.replay.ignored, 0);
    assert_eq!(out.thresholds_version, 1);

    let recal = out.recalibration.as_ref().unwrap();
    assert_eq!(recal.wire_samples, 3);
    assert_eq!(recal.joint_samples, 3);
    assert_relative_eq!(recal.thresholds.red_ratio_faulty, 0.5);
    assert!(recal.thresholds.wire_ar_min > ThresholdSet::default().wire_ar_min);
    assert!(recal.updated.contains(&"wire_ar_min"));
    assert!(recal.thresholds.is_within_bounds());

    let published = inspector.thresholds();
    assert_eq!(published.thresholds, recal.thresholds);

    // A fresh store reads back what was published.
    let reopened = ThresholdStore::open_json(&path).unwrap().snapshot();
    for ((_, saved), (_, live)) in reopened
        .thresholds
        .entries()
        .into_iter()
        .zip(published.thresholds.entries())
    {
        assert_relative_eq!(saved, live, max_relative = 1e-12);
    }
    assert_eq!(reopened.thresholds.vote_margin, published.thresholds.vote_margin);

    // Detection now runs against the new version.
    assert_eq!(inspector.detect(&img).thresholds_version, 1);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn detected_boxes_round_trip_through_review() {
    let (img, _) = panel();
    let inspector = Inspector::default();
    let report = inspector.detect(&img);
    assert_eq!(report.anomalies.len(), 6);

    let detections = report.detections();
    let edits: Vec<FeedbackEdit> = detections
        .iter()
        .take(2)
        .map(|d| FeedbackEdit::Deleted { bbox: d.bbox })
        .collect();
    let out = inspector.submit_feedback(&img, &detections, &edits).unwrap();
    assert_eq!(out.replay.applied, 2);
    assert_eq!(out.replay.detections.iter().filter(|d| d.is_kept()).count(), 4);
    assert_eq!(out.thresholds_version, 1);
}

#[test]
fn malformed_feedback_is_rejected_up_front() {
    let err = parse_edits(r#"[{"bbox": [1, 2, 3], "status": "deleted"}]"#).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
