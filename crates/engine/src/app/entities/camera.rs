use crate::app::events::{CameraEvent, CameraEventKind, EventBuffer, GameEvent};
use crate::app::geometry::{Rect, Size, Vec2};
use crate::app::scene::{NodeDesc, NodeId, SceneNode, SceneTree};

use super::{EntityKind, OwnerId};

/// Viewport node. Its frame is the visible area; it shows twice as much
/// while a zoom event is present in the dispatched buffer, whoever sent it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    original_size: Size,
    zoomed: bool,
}

impl Camera {
    pub fn new(viewport: Size) -> Self {
        Self {
            original_size: viewport,
            zoomed: false,
        }
    }

    pub fn node(self, center: Vec2) -> NodeDesc {
        let frame = Rect {
            center,
            size: self.original_size,
        };
        NodeDesc::new(frame, EntityKind::Camera(self)).hidden()
    }

    pub fn original_size(&self) -> Size {
        self.original_size
    }

    pub fn is_zoomed(&self) -> bool {
        self.zoomed
    }

    fn visible_size(&self) -> Size {
        if self.zoomed {
            self.original_size.scaled(2.0)
        } else {
            self.original_size
        }
    }
}

impl SceneTree {
    pub fn camera(&self, id: NodeId) -> Option<&Camera> {
        match self.node(id).map(|node| &node.kind) {
            Some(EntityKind::Camera(camera)) => Some(camera),
            _ => None,
        }
    }

    /// Host window resize. Keeps the current zoom state.
    pub fn set_viewport_size(&mut self, id: NodeId, viewport: Size) -> bool {
        let Some(SceneNode { frame, kind, .. }) = self.node_mut(id) else {
            return false;
        };
        let EntityKind::Camera(camera) = kind else {
            return false;
        };
        camera.original_size = viewport;
        frame.size = camera.visible_size();
        true
    }
}

pub(super) fn handle_events(
    tree: &mut SceneTree,
    id: NodeId,
    events: &EventBuffer<GameEvent>,
    _owner: &OwnerId,
) {
    let zoomed = events.contains(|event: &CameraEvent| event.kind == CameraEventKind::Zoom);
    let Some(SceneNode { frame, kind, .. }) = tree.node_mut(id) else {
        return;
    };
    if let EntityKind::Camera(camera) = kind {
        camera.zoomed = zoomed;
        frame.size = camera.visible_size();
    }
}
