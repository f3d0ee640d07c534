//! Export → import round trips.

mod common;

use std::io::Cursor;

use common::{summary, ArchiveBuilder, TestHarness};
use galleria::transfer::{ExportBuilder, ImportStats};
use galleria_core::ImageStatus;
use galleria_db::queries::images::{self, ImageFilter};
use serde_json::json;

fn source_archive() -> ArchiveBuilder {
    ArchiveBuilder::new()
        .manifest(json!({"images": [
            {
                "title": "Fox",
                "author": "ann",
                "prompt": "a fox in snow",
                "category": "template",
                "heat_score": 5,
                "zip_image_path": "img/fox.png",
                "zip_thumb_path": "img/fox_t.png",
                "tags": ["animal", "winter"],
                "refs": [
                    {"file_path": "/old/pose.png", "position": 1},
                    "img/sketch.png"
                ]
            },
            {"title": "Owl", "zip_image_path": "img/owl.png", "tags": ["animal"]}
        ]}))
        .file("img/fox.png", b"fox")
        .file("img/fox_t.png", b"fox-thumb")
        .file("img/sketch.png", b"sketch")
        .file("images/pose.png", b"pose")
        .file("img/owl.png", b"owl")
}

fn export_bytes(h: &TestHarness, status: Option<ImageStatus>) -> Vec<u8> {
    let conn = h.conn();
    let mut buf = Cursor::new(Vec::new());
    ExportBuilder::new(&conn, h.uploads())
        .with_status(status)
        .write_to(&mut buf)
        .unwrap();
    buf.into_inner()
}

fn write_raw(h: &TestHarness, bytes: &[u8]) -> std::path::PathBuf {
    let path = h.dir.path().join("roundtrip.zip");
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn export_reimports_into_an_empty_gallery() {
    let source = TestHarness::new();
    assert_eq!(
        summary(&source.import(&source_archive())),
        Some(ImportStats {
            processed: 2,
            skipped: 0,
            errors: 0
        })
    );
    let bytes = export_bytes(&source, None);

    let target = TestHarness::new();
    let path = write_raw(&target, &bytes);
    let events: Vec<_> = target.pipeline(&path).collect();
    assert_eq!(
        summary(&events),
        Some(ImportStats {
            processed: 2,
            skipped: 0,
            errors: 0
        })
    );

    let conn = target.conn();
    let fox = images::find_by_title_author(&conn, "Fox", "ann")
        .unwrap()
        .unwrap();
    assert_eq!(fox.category, "template");
    assert_eq!(fox.heat_score, 5);
    assert_eq!(fox.prompt, "a fox in snow");
    assert_eq!(
        fox.thumbnail_path.as_deref(),
        Some("/static/uploads/fox_t.png")
    );

    let record = images::load_image_record(&conn, fox.id).unwrap().unwrap();
    assert_eq!(record.tag_names(), vec!["animal", "winter"]);
    let refs: Vec<_> = record
        .refs
        .iter()
        .map(|r| (r.file_path.as_str(), r.position))
        .collect();
    assert_eq!(
        refs,
        vec![
            ("/static/uploads/sketch.png", 0),
            ("/static/uploads/pose.png", 1),
        ]
    );

    assert_eq!(target.uploaded_files(), source.uploaded_files());
    assert_eq!(
        std::fs::read(target.uploads().path_for("pose.png")).unwrap(),
        b"pose"
    );
}

#[test]
fn reimporting_an_export_into_its_source_skips_all() {
    let h = TestHarness::new();
    h.import(&source_archive());
    let bytes = export_bytes(&h, None);

    let path = write_raw(&h, &bytes);
    let events: Vec<_> = h.pipeline(&path).collect();
    assert_eq!(
        summary(&events),
        Some(ImportStats {
            processed: 0,
            skipped: 2,
            errors: 0
        })
    );
}

#[test]
fn status_filtered_export() {
    let h = TestHarness::new();
    h.import(&source_archive());
    {
        let conn = h.conn();
        let owl = images::find_by_title_author(&conn, "Owl", "")
            .unwrap()
            .unwrap();
        images::set_status(&conn, owl.id, ImageStatus::Approved).unwrap();
    }

    let target = TestHarness::new();
    let path = write_raw(&target, &export_bytes(&h, Some(ImageStatus::Approved)));
    target.pipeline(&path).for_each(drop);

    let conn = target.conn();
    let all = images::list_images(&conn, &ImageFilter::default()).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].title, "Owl");
    // imports always land in the moderation queue
    assert_eq!(all[0].status, ImageStatus::Pending);
}
