//! Reference-counted access to a single rasterizer handle
//!
//! Rasterizer handles generally allow one operation at a time, and opening
//! one is expensive. The gate keeps one lazily opened handle behind a mutex.
//! Callers register as holders *before* waiting on the mutex, so a burst of
//! overlapping renders shares a single open handle; the handle is closed as
//! soon as the last holder lets go.

use crate::error::RenderResult;
use crate::renderer::{DocumentHandle, DocumentSource};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mutual-exclusion gate around a [`DocumentSource`]
pub struct RendererGate {
    source: Box<dyn DocumentSource>,
    holders: AtomicUsize,
    slot: Mutex<Option<Box<dyn DocumentHandle>>>,
    opens: AtomicUsize,
}

/// Registration of one caller with a [`RendererGate`].
///
/// While any hold is alive the handle stays open between operations.
pub struct GateHold<'a> {
    gate: &'a RendererGate,
}

impl RendererGate {
    pub fn new(source: impl DocumentSource + 'static) -> Self {
        Self::from_boxed(Box::new(source))
    }

    pub fn from_boxed(source: Box<dyn DocumentSource>) -> Self {
        Self {
            source,
            holders: AtomicUsize::new(0),
            slot: Mutex::new(None),
            opens: AtomicUsize::new(0),
        }
    }

    /// Register as a holder. Does not open the handle.
    pub fn hold(&self) -> GateHold<'_> {
        self.holders.fetch_add(1, Ordering::SeqCst);
        GateHold { gate: self }
    }

    /// Run `f` with exclusive access to the handle, opening it first if no
    /// handle is currently open.
    pub fn with_handle<R>(
        &self,
        _hold: &GateHold<'_>,
        f: impl FnOnce(&mut dyn DocumentHandle) -> RenderResult<R>,
    ) -> RenderResult<R> {
        let mut slot = self.lock_slot();

        let handle = match &mut *slot {
            Some(handle) => handle,
            empty => {
                let handle = self.source.open()?;
                self.opens.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(pages = handle.page_count(), "opened document handle");
                empty.insert(handle)
            }
        };

        f(handle.as_mut())
    }

    /// Number of live [`GateHold`]s
    pub fn holders(&self) -> usize {
        self.holders.load(Ordering::SeqCst)
    }

    /// Check if a handle is currently open
    pub fn is_open(&self) -> bool {
        self.lock_slot().is_some()
    }

    /// How many times a handle has been opened over the gate's lifetime
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    // A rasterizer that panicked leaves the slot usable; the handle is
    // dropped with the last holder anyway.
    fn lock_slot(&self) -> MutexGuard<'_, Option<Box<dyn DocumentHandle>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        let mut slot = self.lock_slot();
        if self.holders.fetch_sub(1, Ordering::SeqCst) == 1 && slot.take().is_some() {
            tracing::debug!("closed document handle");
        }
    }
}

impl Drop for GateHold<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

impl fmt::Debug for RendererGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererGate")
            .field("holders", &self.holders())
            .field("opens", &self.open_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::{Bitmap, PixelRect};
    use crate::error::RenderError;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Probe {
        active: AtomicUsize,
        max_active: AtomicUsize,
        calls: AtomicUsize,
    }

    struct ProbeSource {
        probe: Arc<Probe>,
        fail_open: bool,
    }

    struct ProbeHandle {
        probe: Arc<Probe>,
    }

    impl DocumentSource for ProbeSource {
        fn open(&self) -> RenderResult<Box<dyn DocumentHandle>> {
            if self.fail_open {
                return Err(RenderError::Open("missing file".into()));
            }
            Ok(Box::new(ProbeHandle {
                probe: Arc::clone(&self.probe),
            }))
        }
    }

    impl DocumentHandle for ProbeHandle {
        fn page_count(&self) -> usize {
            1
        }

        fn page_aspect_ratio(&mut self, _index: usize) -> RenderResult<f32> {
            Ok(1.0)
        }

        fn render_page(&mut self, _index: usize, width: u32, height: u32) -> RenderResult<Bitmap> {
            let now = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.probe.max_active.fetch_max(now, Ordering::SeqCst);
            self.probe.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            self.probe.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Bitmap::filled(width, height, [255; 4]))
        }

        fn render_region(
            &mut self,
            index: usize,
            _page_width: u32,
            _page_height: u32,
            region: PixelRect,
        ) -> RenderResult<Bitmap> {
            self.render_page(index, region.width, region.height)
        }
    }

    fn probe_gate(fail_open: bool) -> (Arc<RendererGate>, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let gate = RendererGate::new(ProbeSource {
            probe: Arc::clone(&probe),
            fail_open,
        });
        (Arc::new(gate), probe)
    }

    #[test]
    fn test_handle_opens_lazily_and_closes_with_last_holder() {
        let (gate, _) = probe_gate(false);

        let first = gate.hold();
        assert!(!gate.is_open());

        gate.with_handle(&first, |h| h.render_page(0, 1, 1)).unwrap();
        assert!(gate.is_open());

        let second = gate.hold();
        drop(first);
        assert!(gate.is_open());
        assert_eq!(gate.holders(), 1);

        gate.with_handle(&second, |h| h.render_page(0, 1, 1)).unwrap();
        assert_eq!(gate.open_count(), 1);

        drop(second);
        assert!(!gate.is_open());
        assert_eq!(gate.holders(), 0);

        // A later caller reopens
        let third = gate.hold();
        gate.with_handle(&third, |h| h.render_page(0, 1, 1)).unwrap();
        assert_eq!(gate.open_count(), 2);
    }

    #[test]
    fn test_concurrent_callers_never_overlap() {
        let (gate, probe) = probe_gate(false);

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || {
                    for _ in 0..5 {
                        let hold = gate.hold();
                        gate.with_handle(&hold, |h| h.render_page(0, 2, 2)).unwrap();
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(probe.calls.load(Ordering::SeqCst), 40);
        assert_eq!(probe.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(gate.holders(), 0);
        assert!(!gate.is_open());
    }

    #[test]
    fn test_open_failure_propagates() {
        let (gate, probe) = probe_gate(true);

        let hold = gate.hold();
        let result = gate.with_handle(&hold, |h| h.render_page(0, 1, 1));

        assert!(matches!(result, Err(RenderError::Open(_))));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
        assert_eq!(gate.open_count(), 0);
    }
}
