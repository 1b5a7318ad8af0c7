mod common;

use common::{init_tracing, wait_for, MockRenderer, RecordingCache};
use pageflow_cache::{CacheConfig, TileCache};
use pageflow_core::{LoadingState, PageStatus, Reader, ReaderConfig, ReaderError};
use pageflow_scheduler::{FragmentRegion, ManualClock};
use std::sync::Arc;
use tempfile::TempDir;
use viewer_core::{Orientation, Size, Vec2};

fn config() -> ReaderConfig {
    init_tracing();
    ReaderConfig::new().with_worker_threads(1)
}

fn open(renderer: &MockRenderer, clock: &Arc<ManualClock>) -> Reader {
    Reader::builder(renderer.clone())
        .with_config(config())
        .with_clock(clock.clone())
        .open()
        .unwrap()
}

fn wait_ready(reader: &mut Reader, index: usize) -> bool {
    wait_for(|| {
        reader.tick();
        reader.page(index).map(|page| page.status()) == Some(PageStatus::Ready)
    })
}

#[test]
fn cached_boundaries_skip_the_document() {
    let renderer = MockRenderer::uniform(5, 1.5);
    let cache = Arc::new(RecordingCache::new());
    cache.save_boundaries(&[1.0, 2.0, 1.5]).unwrap();

    let mut reader = Reader::builder(renderer.clone())
        .with_config(config())
        .with_cache(cache)
        .open()
        .unwrap();

    assert_eq!(renderer.opens(), 0);
    assert_eq!(reader.page_count(), 3);
    assert_eq!(reader.state().pages[1].aspect_ratio, 2.0);
    reader.dispose();
}

#[test]
fn document_open_failure_is_reported() {
    let renderer = MockRenderer::uniform(5, 1.5);
    renderer.fail_open();

    let result = Reader::open(renderer, config());
    assert!(matches!(result, Err(ReaderError::DocumentOpen(_))));
}

#[test]
fn loading_progress_is_reported() {
    let renderer = MockRenderer::uniform(2, 1.5);
    let mut seen = Vec::new();

    let mut reader = Reader::builder(renderer)
        .with_config(config())
        .with_progress(|state| seen.push(state))
        .open()
        .unwrap();
    reader.dispose();

    assert_eq!(
        seen,
        vec![
            LoadingState::Loading(0.0),
            LoadingState::Loading(0.5),
            LoadingState::Loading(1.0),
            LoadingState::Ready,
        ]
    );
}

#[test]
fn pinch_and_quick_pans_render_one_fragment() {
    let renderer = MockRenderer::uniform(10, 1.5);
    let clock = Arc::new(ManualClock::new(0));
    let mut reader = open(&renderer, &clock);

    reader.on_viewport_resize(Size::new(400.0, 600.0));
    assert!(wait_ready(&mut reader, 0));

    clock.set(1000);
    assert!(reader.on_zoom(2.0, Vec2::new(200.0, 300.0)));

    reader.on_pan_start();
    for _ in 0..5 {
        clock.advance(10);
        assert!(reader.on_pan(Vec2::new(0.0, -10.0)));
    }

    clock.set(1249);
    reader.tick();
    assert!(renderer.fragments().is_empty());

    clock.set(1250);
    assert!(wait_for(|| {
        reader.tick();
        reader.page(0).and_then(|page| page.fragment()).is_some()
    }));

    let fragments = renderer.fragments();
    assert_eq!(fragments.len(), 1);
    let (page, region, zoom) = fragments[0];
    assert_eq!(page, 0);
    assert_eq!(zoom, 2.0);
    assert_eq!(
        region,
        FragmentRegion {
            left: 100.0,
            top: 175.0,
            right: 300.0,
            bottom: 475.0
        }
    );
    reader.dispose();
}

#[test]
fn fling_keeps_scrolling_and_stops_in_bounds() {
    let renderer = MockRenderer::uniform(20, 1.5);
    let clock = Arc::new(ManualClock::new(0));
    let mut reader = open(&renderer, &clock);
    reader.on_viewport_resize(Size::new(400.0, 600.0));

    reader.on_pan_start();
    for _ in 0..5 {
        clock.advance(10);
        reader.on_pan(Vec2::new(0.0, -20.0));
    }
    assert!(reader.on_pan_end());
    assert!(reader.needs_frame());

    for _ in 0..1000 {
        if !reader.controller().is_animating() {
            break;
        }
        clock.advance(16);
        reader.tick();
    }

    let state = reader.state();
    assert!(!reader.controller().is_animating());
    assert!(state.offset.y < -400.0, "offset {:?}", state.offset);
    assert!(state.bounds().contains(state.offset));
    reader.dispose();
}

#[test]
fn double_tap_springs_to_the_next_zoom() {
    let renderer = MockRenderer::uniform(4, 1.5);
    let clock = Arc::new(ManualClock::new(0));
    let mut reader = open(&renderer, &clock);
    reader.on_viewport_resize(Size::new(400.0, 600.0));

    assert!(reader.on_double_tap(Vec2::new(200.0, 300.0)));
    for _ in 0..500 {
        if !reader.controller().is_animating() {
            break;
        }
        clock.advance(16);
        reader.tick();
    }

    assert_eq!(reader.state().zoom, 2.0);
    reader.dispose();
}

#[test]
fn orientation_change_drops_fragments() {
    let renderer = MockRenderer::uniform(4, 1.5);
    let clock = Arc::new(ManualClock::new(0));
    let mut reader = open(&renderer, &clock);
    reader.on_viewport_resize(Size::new(400.0, 600.0));
    assert!(wait_ready(&mut reader, 0));

    reader.on_zoom(2.0, Vec2::new(0.0, 0.0));
    clock.advance(200);
    assert!(wait_for(|| {
        reader.tick();
        reader.page(0).and_then(|page| page.fragment()).is_some()
    }));

    assert!(reader.set_orientation(Orientation::Horizontal));
    assert_eq!(reader.state().zoom, 1.0);
    assert!(reader
        .page(0)
        .map_or(true, |page| page.fragment().is_none()));
    reader.dispose();
}

#[test]
fn disk_cache_is_reused_by_the_next_session() {
    let dir = TempDir::new().unwrap();
    let cache = CacheConfig::new(8, 64, dir.path().to_path_buf());
    let clock = Arc::new(ManualClock::new(0));

    let first = MockRenderer::uniform(6, 1.5);
    let mut reader = Reader::builder(first.clone())
        .with_config(config().with_cache(cache.clone()))
        .with_document_key("/books/sample.pdf")
        .with_clock(clock.clone())
        .open()
        .unwrap();
    reader.on_viewport_resize(Size::new(400.0, 600.0));
    assert!(wait_ready(&mut reader, 0));
    reader.dispose();
    assert_eq!(first.opens(), 1);

    let document_dir = cache.document_dir("/books/sample.pdf");
    assert!(document_dir.join("boundaries.json").exists());

    let second = MockRenderer::uniform(6, 1.5);
    let mut reader = Reader::builder(second.clone())
        .with_config(config().with_cache(cache))
        .with_document_key("/books/sample.pdf")
        .with_clock(clock)
        .open()
        .unwrap();
    assert_eq!(second.opens(), 0);
    assert_eq!(reader.page_count(), 6);

    reader.on_viewport_resize(Size::new(400.0, 600.0));
    assert!(wait_ready(&mut reader, 0));
    reader.dispose();
}

#[test]
fn snapshot_restores_position_in_a_new_reader() {
    let renderer = MockRenderer::uniform(12, 1.5);
    let clock = Arc::new(ManualClock::new(0));

    let mut reader = open(&renderer, &clock);
    reader.on_viewport_resize(Size::new(400.0, 600.0));
    reader.scroll_to_page(6).unwrap();
    let snapshot = reader.snapshot();
    reader.dispose();

    let mut restored = open(&renderer, &clock);
    restored.restore(&snapshot);
    restored.on_viewport_resize(Size::new(800.0, 1000.0));

    assert_eq!(restored.visible_pages().first(), Some(&6));
    assert_eq!(restored.snapshot().anchor, snapshot.anchor);
    restored.dispose();
}
