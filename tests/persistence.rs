//! Sessions written to a redb file and picked up by a later process.

use std::path::Path;
use std::time::{Duration, Instant};

use strip_viewer::{
    Config, ContentKind, ItemSize, RedbStore, ScrollStatus, SessionSource, SessionStore,
    ViewerSession, ViewportSize,
};

fn open(path: &Path) -> ViewerSession {
    let store = RedbStore::open(path).unwrap();
    let mut s = ViewerSession::open(Box::new(store), &Config::default());
    s.resize(ViewportSize::new(800.0, 600.0));
    s
}

fn drive(s: &mut ViewerSession, mut now: Instant, height: f32) -> ScrollStatus {
    for _ in 0..100 {
        if let Some(frame) = s.render() {
            for i in frame.rendered.indices() {
                s.measure(i, ItemSize::new(800.0, height), height);
            }
        }
        now += Duration::from_millis(20);
        match s.tick(now) {
            ScrollStatus::Pending { .. } => {}
            status => return status,
        }
    }
    panic!("scroll never finished");
}

#[test]
fn restore_resumes_where_the_last_session_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.redb");
    let t0 = Instant::now();

    {
        let mut s = open(&path);
        s.open_content(SessionSource::file("/books/vol2.pdf"));
        s.content_loaded(60, t0);
        s.scroll_to(37, t0);
        let status = drive(&mut s, t0, 300.0);
        assert!(matches!(status, ScrollStatus::Converged { position: 37, .. }));
    }

    let mut s = open(&path);
    assert_eq!(s.current_position(), Some(37));
    assert!(s.measured_rows() > 0);
    assert_eq!(s.estimated_height(), 300.0);

    let source = s.restore().unwrap();
    assert_eq!(source.kind, ContentKind::Pdf);
    assert_eq!(source.path, Path::new("/books/vol2.pdf"));

    let t1 = Instant::now();
    s.content_loaded(60, t1);
    let due = s.next_wakeup().unwrap();
    assert_eq!(due, t1 + Duration::from_millis(100));

    // Heights are known from the previous run, so the first attempt lands.
    s.tick(due);
    assert_eq!(s.current_position(), Some(37));
    let status = drive(&mut s, due, 300.0);
    assert!(matches!(status, ScrollStatus::Converged { target: 37, position: 37, .. }));
}

#[test]
fn new_content_forgets_old_layout_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.redb");
    let t0 = Instant::now();

    {
        let mut s = open(&path);
        s.open_content(SessionSource::directory("/scans/a"));
        s.content_loaded(20, t0);
        s.scroll_to(10, t0);
        drive(&mut s, t0, 500.0);
        s.open_content(SessionSource::file("/notes/today.txt"));
    }

    let store = RedbStore::open(&path).unwrap();
    assert!(store.row_heights().unwrap().is_empty());
    assert_eq!(store.position().unwrap(), None);
    assert_eq!(
        store.source().unwrap(),
        Some(SessionSource::new("/notes/today.txt", ContentKind::Text))
    );
}

#[test]
fn clear_leaves_nothing_to_restore() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.redb");

    {
        let mut s = open(&path);
        s.open_content(SessionSource::file("/books/vol1.cbz"));
        s.content_loaded(5, Instant::now());
        s.measure(0, ItemSize::new(900.0, 1400.0), 1244.0);
        s.render();
        s.clear();
    }

    let mut s = open(&path);
    assert_eq!(s.measured_rows(), 0);
    assert_eq!(s.current_position(), None);
    assert!(s.restore().is_none());
}
