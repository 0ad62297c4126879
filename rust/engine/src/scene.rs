// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory host scene: nodes, parameter records and change notification.
//!
//! The scene owns every node and record in slot maps with stable keys.
//! Mutations queue [`SceneEvent`]s which the controller drains; node
//! events only reach records that subscribed to that node for that event
//! kind. While an import is in progress nothing is queued until
//! [`Scene::end_import`].

use std::collections::VecDeque;

use dynmod_geometry::{Matrix4, Mesh, Plane, Point3};
use rustc_hash::FxHashMap;
use serde::Serialize;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::keys::{NodeKey, RecordKey};
use crate::record::ParameterRecord;

/// Ordered points, optionally closed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Curve {
    pub points: Vec<Point3<f64>>,
    pub closed: bool,
}

impl Curve {
    pub fn new(points: Vec<Point3<f64>>, closed: bool) -> Self {
        Self { points, closed }
    }

    /// Mean of the control points.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.points.is_empty() {
            return None;
        }
        let sum = self
            .points
            .iter()
            .fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords);
        Some(Point3::from(sum / self.points.len() as f64))
    }
}

/// Payload of a scene node.
#[derive(Debug, Clone)]
pub enum NodeData {
    Model(Mesh),
    Curve(Curve),
    Plane(Plane),
    /// Seed or markup points.
    Points(Vec<Point3<f64>>),
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Model(_) => NodeKind::Model,
            NodeData::Curve(_) => NodeKind::Curve,
            NodeData::Plane(_) => NodeKind::Plane,
            NodeData::Points(_) => NodeKind::Points,
        }
    }
}

/// Discriminant for node payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Model,
    Curve,
    Plane,
    Points,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Model => "Model",
            NodeKind::Curve => "Curve",
            NodeKind::Plane => "Plane",
            NodeKind::Points => "Points",
        }
    }
}

/// Change notification kinds a node can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    Modified,
    MeshModified,
    PointModified,
    TransformModified,
}

/// A named scene node.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub data: NodeData,
}

/// Queued scene notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    RecordAdded(RecordKey),
    RecordModified(RecordKey),
    RecordRemoved(RecordKey),
    /// A node the record subscribed to fired one of the subscribed kinds.
    InputModified {
        record: RecordKey,
        node: NodeKey,
        event: EventKind,
    },
    ImportEnded,
}

#[derive(Debug, Clone)]
struct Subscription {
    record: RecordKey,
    events: SmallVec<[EventKind; 4]>,
}

#[derive(Debug, Default)]
pub struct Scene {
    nodes: SlotMap<NodeKey, Node>,
    records: SlotMap<RecordKey, ParameterRecord>,
    subscriptions: FxHashMap<NodeKey, Vec<Subscription>>,
    pending: VecDeque<SceneEvent>,
    importing: bool,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    pub fn add_node(&mut self, name: impl Into<String>, data: NodeData) -> NodeKey {
        self.nodes.insert(Node {
            name: name.into(),
            data,
        })
    }

    pub fn add_model(&mut self, name: impl Into<String>, mesh: Mesh) -> NodeKey {
        self.add_node(name, NodeData::Model(mesh))
    }

    /// Remove a node, dropping its subscriptions and every record reference
    /// to it. Records that referenced it are reported as modified.
    pub fn remove_node(&mut self, key: NodeKey) -> Option<Node> {
        let node = self.nodes.remove(key)?;
        self.subscriptions.remove(&key);
        let affected: Vec<RecordKey> = self
            .records
            .iter_mut()
            .filter_map(|(k, r)| r.remove_node_everywhere(key).then_some(k))
            .collect();
        for record in affected {
            self.push(SceneEvent::RecordModified(record));
        }
        Some(node)
    }

    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn require_node(&self, key: NodeKey) -> Result<&Node> {
        self.nodes.get(key).ok_or(Error::UnknownNode(key))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeKey, &Node)> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Mesh of a model node.
    pub fn mesh(&self, key: NodeKey) -> Option<&Mesh> {
        match &self.nodes.get(key)?.data {
            NodeData::Model(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Replace a node's payload with `mesh` and fire `MeshModified`.
    pub fn set_mesh(&mut self, key: NodeKey, mesh: Mesh) -> Result<()> {
        let node = self.nodes.get_mut(key).ok_or(Error::UnknownNode(key))?;
        node.data = NodeData::Model(mesh);
        self.emit(key, EventKind::MeshModified);
        Ok(())
    }

    pub fn set_curve(&mut self, key: NodeKey, curve: Curve) -> Result<()> {
        self.set_points_data(key, NodeData::Curve(curve))
    }

    pub fn set_plane(&mut self, key: NodeKey, plane: Plane) -> Result<()> {
        self.set_points_data(key, NodeData::Plane(plane))
    }

    pub fn set_points(&mut self, key: NodeKey, points: Vec<Point3<f64>>) -> Result<()> {
        self.set_points_data(key, NodeData::Points(points))
    }

    fn set_points_data(&mut self, key: NodeKey, data: NodeData) -> Result<()> {
        let node = self.nodes.get_mut(key).ok_or(Error::UnknownNode(key))?;
        node.data = data;
        self.emit(key, EventKind::PointModified);
        Ok(())
    }

    /// Apply an affine transform to a node's geometry and fire
    /// `TransformModified`.
    pub fn transform_node(&mut self, key: NodeKey, matrix: &Matrix4<f64>) -> Result<()> {
        let node = self.nodes.get_mut(key).ok_or(Error::UnknownNode(key))?;
        match &mut node.data {
            NodeData::Model(mesh) => mesh.transform(matrix),
            NodeData::Curve(curve) => {
                for p in &mut curve.points {
                    *p = matrix.transform_point(p);
                }
            }
            NodeData::Points(points) => {
                for p in points.iter_mut() {
                    *p = matrix.transform_point(p);
                }
            }
            NodeData::Plane(plane) => {
                let linear = matrix.fixed_view::<3, 3>(0, 0).into_owned();
                let normal_matrix = linear
                    .try_inverse()
                    .map(|inv| inv.transpose())
                    .unwrap_or(linear);
                *plane = Plane::new(matrix.transform_point(&plane.origin), normal_matrix * plane.normal)?;
            }
        }
        self.emit(key, EventKind::TransformModified);
        Ok(())
    }

    /// Fire `event` on a node, notifying every record subscribed to it.
    pub fn emit(&mut self, node: NodeKey, event: EventKind) {
        let records: Vec<RecordKey> = self
            .subscriptions
            .get(&node)
            .map(|subs| {
                subs.iter()
                    .filter(|s| s.events.contains(&event))
                    .map(|s| s.record)
                    .collect()
            })
            .unwrap_or_default();
        for record in records {
            self.push(SceneEvent::InputModified {
                record,
                node,
                event,
            });
        }
    }

    // =========================================================================
    // Parameter records
    // =========================================================================

    pub fn add_record(&mut self, record: ParameterRecord) -> RecordKey {
        let key = self.records.insert(record);
        self.push(SceneEvent::RecordAdded(key));
        key
    }

    pub fn record(&self, key: RecordKey) -> Option<&ParameterRecord> {
        self.records.get(key)
    }

    pub fn require_record(&self, key: RecordKey) -> Result<&ParameterRecord> {
        self.records.get(key).ok_or(Error::UnknownRecord(key))
    }

    pub fn records(&self) -> impl Iterator<Item = (RecordKey, &ParameterRecord)> {
        self.records.iter()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Mutate a record in place and fire `RecordModified`.
    pub fn modify_record<R>(
        &mut self,
        key: RecordKey,
        f: impl FnOnce(&mut ParameterRecord) -> R,
    ) -> Result<R> {
        let record = self.records.get_mut(key).ok_or(Error::UnknownRecord(key))?;
        let out = f(record);
        self.push(SceneEvent::RecordModified(key));
        Ok(out)
    }

    pub fn remove_record(&mut self, key: RecordKey) -> Option<ParameterRecord> {
        let record = self.records.remove(key)?;
        self.unsubscribe_record(key);
        self.pending.retain(|e| !event_targets(e, key));
        self.push(SceneEvent::RecordRemoved(key));
        Some(record)
    }

    /// Queue nothing until [`Scene::end_import`].
    pub fn begin_import(&mut self) {
        self.importing = true;
    }

    pub fn end_import(&mut self) {
        self.importing = false;
        self.push(SceneEvent::ImportEnded);
    }

    pub fn is_importing(&self) -> bool {
        self.importing
    }

    // =========================================================================
    // Subscriptions and events
    // =========================================================================

    /// Notify `record` when `node` fires any of `events`. Repeated calls
    /// widen the event set.
    pub fn subscribe(&mut self, node: NodeKey, record: RecordKey, events: &[EventKind]) {
        let subs = self.subscriptions.entry(node).or_default();
        match subs.iter_mut().find(|s| s.record == record) {
            Some(existing) => {
                for e in events {
                    if !existing.events.contains(e) {
                        existing.events.push(*e);
                    }
                }
            }
            None => subs.push(Subscription {
                record,
                events: events.iter().copied().collect(),
            }),
        }
    }

    /// Drop every subscription held by `record`.
    pub fn unsubscribe_record(&mut self, record: RecordKey) {
        self.subscriptions.retain(|_, subs| {
            subs.retain(|s| s.record != record);
            !subs.is_empty()
        });
    }

    pub fn is_subscribed(&self, node: NodeKey, record: RecordKey, event: EventKind) -> bool {
        self.subscriptions
            .get(&node)
            .is_some_and(|subs| subs.iter().any(|s| s.record == record && s.events.contains(&event)))
    }

    /// Nodes `record` currently observes.
    pub fn subscribed_nodes(&self, record: RecordKey) -> Vec<NodeKey> {
        self.subscriptions
            .iter()
            .filter(|(_, subs)| subs.iter().any(|s| s.record == record))
            .map(|(&node, _)| node)
            .collect()
    }

    pub fn take_events(&mut self) -> Vec<SceneEvent> {
        self.pending.drain(..).collect()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending.is_empty()
    }

    fn push(&mut self, event: SceneEvent) {
        if self.importing && event != SceneEvent::ImportEnded {
            return;
        }
        // Coalesce repeats of a notification that has not been handled yet
        if !self.pending.contains(&event) {
            self.pending.push_back(event);
        }
    }
}

fn event_targets(event: &SceneEvent, key: RecordKey) -> bool {
    match *event {
        SceneEvent::RecordAdded(k) | SceneEvent::RecordModified(k) => k == key,
        SceneEvent::InputModified { record, .. } => record == key,
        _ => false,
    }
}
