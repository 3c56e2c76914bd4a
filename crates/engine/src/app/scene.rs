use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, warn};

use super::entities::{self, EntityKind, EntityTag, OwnerId};
use super::events::{EventBuffer, GameEvent};
use super::geometry::{Rect, Vec2};
use super::physics::PhysicsBody;
use super::visual::{RenderItem, RenderSink, VisualState};

/// Stable handle to a node in a [`SceneTree`]. Ids are never reused, so a
/// handle to a cleaned-up node simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct NodeIdAllocator {
    next: u64,
}

impl NodeIdAllocator {
    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Everything needed to create a node; the tree assigns identity and links.
#[derive(Debug, Clone)]
pub struct NodeDesc {
    pub frame: Rect,
    pub kind: EntityKind,
    pub physics: Option<PhysicsBody>,
    pub visual: Option<VisualState>,
    pub visible: bool,
}

impl NodeDesc {
    pub fn new(frame: Rect, kind: EntityKind) -> Self {
        Self {
            frame,
            kind,
            physics: None,
            visual: None,
            visible: true,
        }
    }

    pub fn group(frame: Rect) -> Self {
        Self::new(frame, EntityKind::Group)
    }

    pub fn with_physics(mut self, physics: PhysicsBody) -> Self {
        self.physics = Some(physics);
        self
    }

    pub fn with_visual(mut self, visual: VisualState) -> Self {
        self.visual = Some(visual);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    id: NodeId,
    /// Position is local to the parent node.
    pub frame: Rect,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    pub physics: Option<PhysicsBody>,
    pub visual: Option<VisualState>,
    pub visible: bool,
    removed: bool,
    pub kind: EntityKind,
}

impl SceneNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn tag(&self) -> EntityTag {
        self.kind.tag()
    }
}

/// Arena-backed scene graph. Nodes reference each other by [`NodeId`] only.
#[derive(Debug, Default)]
pub struct SceneTree {
    ids: NodeIdAllocator,
    nodes: HashMap<NodeId, SceneNode>,
}

impl SceneTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Creates a detached node.
    pub fn spawn(&mut self, desc: NodeDesc) -> NodeId {
        let id = self.ids.allocate();
        self.nodes.insert(
            id,
            SceneNode {
                id,
                frame: desc.frame,
                parent: None,
                children: Vec::new(),
                physics: desc.physics,
                visual: desc.visual,
                visible: desc.visible,
                removed: false,
                kind: desc.kind,
            },
        );
        id
    }

    pub fn spawn_child(&mut self, parent: NodeId, desc: NodeDesc) -> NodeId {
        let id = self.spawn(desc);
        self.add_child(parent, id);
        id
    }

    /// Attaches `child` under `parent`, detaching it from any previous parent.
    /// Re-adding an existing child is a no-op. Links that would form a cycle
    /// are refused.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.contains(parent) || !self.contains(child) {
            warn!(%parent, %child, "add_child_unknown_node");
            return false;
        }
        if self.is_ancestor_or_self(child, parent) {
            warn!(%parent, %child, "add_child_cycle_refused");
            return false;
        }

        let previous = self.nodes.get(&child).and_then(|node| node.parent);
        if previous == Some(parent) {
            return true;
        }
        if let Some(previous) = previous {
            if let Some(old_parent) = self.nodes.get_mut(&previous) {
                old_parent.children.retain(|id| *id != child);
            }
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        true
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == candidate {
                return true;
            }
            match self.nodes.get(&node).and_then(|n| n.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(&id)
    }

    pub fn body(&self, id: NodeId) -> Option<&PhysicsBody> {
        self.nodes.get(&id).and_then(|node| node.physics.as_ref())
    }

    pub fn body_mut(&mut self, id: NodeId) -> Option<&mut PhysicsBody> {
        self.nodes.get_mut(&id).and_then(|node| node.physics.as_mut())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Sum of the local centers from the root down to `id`.
    pub fn global_position(&self, id: NodeId) -> Option<Vec2> {
        let mut node = self.nodes.get(&id)?;
        let mut position = node.frame.center;
        while let Some(parent) = node.parent.and_then(|parent| self.nodes.get(&parent)) {
            position += parent.frame.center;
            node = parent;
        }
        Some(position)
    }

    pub fn global_frame(&self, id: NodeId) -> Option<Rect> {
        let node = self.nodes.get(&id)?;
        let center = self.global_position(id)?;
        Some(Rect {
            center,
            size: node.frame.size,
        })
    }

    /// Flags a node for removal; it stays in place until the next [`clean`].
    ///
    /// [`clean`]: SceneTree::clean
    pub fn remove(&mut self, id: NodeId) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.removed = true;
                true
            }
            None => false,
        }
    }

    /// Unknown ids count as removed.
    pub fn is_removed(&self, id: NodeId) -> bool {
        self.nodes.get(&id).map_or(true, |node| node.removed)
    }

    /// Pre-order walk (node, then children in insertion order).
    pub fn preorder(&self, from: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            order.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        order
    }

    pub fn find(&self, from: NodeId, predicate: impl Fn(&SceneNode) -> bool) -> Option<NodeId> {
        self.preorder(from)
            .into_iter()
            .find(|id| self.nodes.get(id).is_some_and(&predicate))
    }

    /// Hands the tick's game events to every node under `from`, in pre-order.
    /// Owner-scoped entities ignore buffers that are not theirs.
    pub fn dispatch_events(
        &mut self,
        from: NodeId,
        events: &EventBuffer<GameEvent>,
        owner: &OwnerId,
    ) {
        for id in self.preorder(from) {
            entities::handle_events(self, id, events, owner);
        }
    }

    /// Integrates every body under `from` by `dt` seconds.
    pub fn step_physics(&mut self, from: NodeId, dt: f64) {
        for id in self.preorder(from) {
            if let Some(node) = self.nodes.get_mut(&id) {
                let SceneNode { frame, physics, .. } = node;
                if let Some(body) = physics {
                    body.integrate(frame, dt);
                }
            }
        }
    }

    /// Pre-order list of nodes under `from` that carry a physics body.
    pub fn collect_colliding_nodes(&self, from: NodeId) -> Vec<NodeId> {
        self.preorder(from)
            .into_iter()
            .filter(|id| self.body(*id).is_some())
            .collect()
    }

    /// Detaches removed nodes (with their whole subtrees) under `from`, then
    /// drops dangling entries from every contact set. Returns the number of
    /// nodes that left the arena.
    pub fn clean(&mut self, from: NodeId) -> usize {
        let mut dropped = Vec::new();
        self.prune_removed_children(from, &mut dropped);

        let live: HashSet<NodeId> = self
            .nodes
            .values()
            .filter(|node| !node.removed)
            .map(|node| node.id)
            .collect();
        for node in self.nodes.values_mut() {
            if let Some(body) = node.physics.as_mut() {
                body.retain_colliders(|peer| live.contains(&peer));
            }
        }

        if !dropped.is_empty() {
            debug!(root = %from, dropped = dropped.len(), "scene_cleaned");
        }
        dropped.len()
    }

    fn prune_removed_children(&mut self, id: NodeId, dropped: &mut Vec<NodeId>) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let (gone, kept): (Vec<NodeId>, Vec<NodeId>) = node
            .children
            .iter()
            .copied()
            .partition(|child| self.nodes.get(child).map_or(true, |c| c.removed));

        if !gone.is_empty() {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.children = kept.clone();
            }
            for child in gone {
                self.drop_subtree(child, dropped);
            }
        }
        for child in kept {
            self.prune_removed_children(child, dropped);
        }
    }

    fn drop_subtree(&mut self, id: NodeId, dropped: &mut Vec<NodeId>) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                stack.extend(node.children);
                dropped.push(next);
            }
        }
    }

    pub fn tick_animation(&mut self, from: NodeId, clock_seconds: f64) {
        for id in self.preorder(from) {
            if let Some(visual) = self.nodes.get_mut(&id).and_then(|n| n.visual.as_mut()) {
                visual.advance(clock_seconds);
            }
        }
    }

    /// Emits visible drawables under `from`, offset so that `view_center`
    /// lands at the origin. Hidden nodes are skipped but their children are
    /// still visited.
    pub fn render<S>(&self, from: NodeId, view_center: Vec2, sink: &mut S)
    where
        S: RenderSink + ?Sized,
    {
        for id in self.preorder(from) {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            let (Some(visual), Some(frame)) = (node.visual.as_ref(), self.global_frame(id)) else {
                continue;
            };
            sink.draw(RenderItem {
                node: id,
                frame: frame.translated(-view_center),
                visual,
            });
        }
    }
}
