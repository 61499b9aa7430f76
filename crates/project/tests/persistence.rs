use chrono::{TimeZone, Utc};
use std::fs;
use std::time::{Duration, Instant};

use media_io::layout;
use project::{AutoSaver, ProjectDocument, ProjectError, ProjectStore};
use timeline::editing::DropTarget;
use timeline::{Asset, Clip, Editor, EditorConfig, MediaKind, TimelineState, TrackId};

fn editor_with_clip() -> Editor {
    let mut editor = Editor::new(EditorConfig::default());
    editor
        .register_asset(Asset::new("a.mp4", "/p/videos/a.mp4", 30.0, MediaKind::Video))
        .unwrap();
    editor
        .place_asset("a.mp4", DropTarget::Track(TrackId(0)), 0.0)
        .unwrap();
    editor
}

#[test]
fn test_create_lays_out_project_folder() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(tmp.path());
    let handle = store.create("trip").unwrap();

    for sub in layout::ALL {
        assert!(handle.dir().join(sub).is_dir(), "{sub} missing");
    }
    assert_eq!(handle.list_snapshots().unwrap().len(), 1);
    let doc = handle.load_latest().unwrap();
    assert_eq!(doc.project_name, "trip");
    assert!(doc.clips.is_empty());

    assert!(matches!(store.create("trip"), Err(ProjectError::Exists(_))));
    let names: Vec<String> = store.list_projects().unwrap().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["trip".to_string()]);
}

#[test]
fn test_save_then_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(tmp.path());
    let handle = store.create("demo").unwrap();
    let editor = editor_with_clip();
    handle.save(editor.state()).unwrap();

    let reopened = store.open("demo").unwrap();
    let state = reopened.load_latest().unwrap().into_state();
    assert_eq!(&state, editor.state());

    let mut fresh = Editor::new(EditorConfig::default());
    fresh.load(state).unwrap();
    assert!(!fresh.history().can_undo());
    assert_eq!(fresh.state().clips.len(), 1);
}

#[test]
fn test_latest_snapshot_wins_and_retention_prunes() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(tmp.path()).with_retention(2);
    let handle = store.create("demo").unwrap();
    let editor = editor_with_clip();

    let at = Utc.timestamp_millis_opt(2_000_000_000_000).single().unwrap();
    let newest = handle.save_at(editor.state(), at).unwrap();
    let clash = handle.save_at(&TimelineState::new(), at).unwrap();
    assert_ne!(newest, clash);
    assert!(clash.ends_with("main2000000000001.project"));

    let snapshots = handle.list_snapshots().unwrap();
    assert_eq!(
        snapshots,
        vec!["main2000000000000.project".to_string(), "main2000000000001.project".to_string()]
    );
    assert!(handle.load_latest().unwrap().clips.is_empty());
    assert_eq!(handle.load_snapshot(&snapshots[0]).unwrap().clips.len(), 1);
}

#[test]
fn test_load_drops_duplicate_clips() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(tmp.path());
    let handle = store.create("dupes").unwrap();

    let clip = Clip::new("a.mp4", TrackId(2), 0.0, 5.0);
    let mut same_slot = Clip::new("a.mp4", TrackId(2), 0.0, 5.0);
    same_slot.color_tag = "#000000".into();
    let doc = ProjectDocument {
        project_name: "dupes".into(),
        assets: vec![Asset::new("a.mp4", "/p/videos/a.mp4", 30.0, MediaKind::Video)],
        clips: vec![clip.clone(), clip.clone(), same_slot],
        last_modified: 3_000_000_000_000,
    };
    fs::write(handle.dir().join("main3000000000000.project"), doc.to_json().unwrap()).unwrap();

    let state = handle.load_latest().unwrap().into_state();
    assert_eq!(state.clips, vec![clip]);
    assert_eq!(state.tracks.len(), 1);
    assert_eq!(state.tracks[0].id, TrackId(2));
    assert!(state.validate(timeline::OVERLAP_EPSILON).is_ok());
}

#[test]
fn test_open_and_delete_missing_project() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(tmp.path().join("projects"));
    assert!(store.list_projects().unwrap().is_empty());
    assert!(matches!(store.open("ghost"), Err(ProjectError::NotFound(_))));
    assert!(matches!(store.delete("ghost"), Err(ProjectError::NotFound(_))));

    store.create("real").unwrap();
    store.delete("real").unwrap();
    assert!(store.list_projects().unwrap().is_empty());
}

#[test]
fn test_corrupt_snapshot_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(tmp.path());
    let handle = store.create("broken").unwrap();
    fs::write(handle.dir().join("main9999999999999.project"), "{not json").unwrap();
    assert!(matches!(handle.load_latest(), Err(ProjectError::Json(_))));
}

#[test]
fn test_autosave_writes_after_edits() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(tmp.path());
    let handle = store.create("auto").unwrap();

    let mut editor = Editor::new(EditorConfig::default());
    let mut saver = AutoSaver::new(editor.subscribe(), AutoSaver::DEFAULT_QUIET);
    editor.load(handle.load_latest().unwrap().into_state()).unwrap();

    let t0 = Instant::now();
    assert!(saver.save_if_due(t0 + Duration::from_secs(1), &handle, &editor).unwrap().is_none());

    editor
        .register_asset(Asset::new("a.mp4", "/p/videos/a.mp4", 30.0, MediaKind::Video))
        .unwrap();
    assert!(saver.save_if_due(t0, &handle, &editor).unwrap().is_none());
    let saved = saver
        .save_if_due(t0 + Duration::from_millis(600), &handle, &editor)
        .unwrap()
        .expect("save due");
    assert!(saved.is_file());
    assert_eq!(saver.saved_revision(), Some(editor.revision()));
    assert_eq!(handle.load_latest().unwrap().assets.len(), 1);

    assert!(saver.flush(&handle, &editor).unwrap().is_none());
}
