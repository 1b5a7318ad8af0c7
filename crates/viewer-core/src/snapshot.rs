use crate::anchor::Anchor;
use crate::layout::Orientation;
use serde::{Deserialize, Serialize};

/// Persistable reading position.
///
/// Restoring a snapshot installs its anchor as pending; it is resolved at the
/// next layout so it survives a restart with a different window size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewerSnapshot {
    pub anchor: Option<Anchor>,
    pub orientation: Orientation,
    pub zoom: f32,
}
