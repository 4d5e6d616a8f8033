use std::collections::HashMap;

use tracing::debug;

use crate::brep::{BodyKind, EdgeKind, NodeRef, RealRef, Sense};
use crate::error::{Result, TopologyError};
use crate::math::Vector3;

use super::entity::EEdgeData;
use super::tangency::{is_smooth, tangent_deviation};
use super::{EBody, EEdgeId};

impl EBody {
    /// Merges pairs of EEdges that meet at a two-valent node.
    ///
    /// Returns the number of nodes eliminated. Running it again right away
    /// eliminates nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`StateError`](crate::error::StateError) if the body is
    /// finalized or this is not the owning thread, and a [`TopologyError`]
    /// if the loops around a node are inconsistent. The body is unchanged on
    /// error.
    pub fn eliminate_nodes(&mut self) -> Result<usize> {
        self.check_mutable()?;
        let snapshot = self.graph.clone();
        match self.reduce_nodes() {
            Ok(removed) => Ok(removed),
            Err(e) => {
                self.graph = snapshot;
                Err(e)
            }
        }
    }

    pub(crate) fn reduce_nodes(&mut self) -> Result<usize> {
        let count = self.body().node_count();
        let mut incident = vec![0usize; count];
        let mut excluded: Vec<bool> = (0..count)
            .map(|n| self.body().is_kept(RealRef::Node(NodeRef(n))))
            .collect();
        for id in self.eedges() {
            let edge = self.graph.edge(*id)?;
            let kept_edge = matches!(edge.segments.as_slice(), [s] if self.body().is_kept(RealRef::Edge(s.edge)));
            for node in edge.nodes {
                if edge.kind != EdgeKind::TwoNode || kept_edge {
                    if let Some(x) = excluded.get_mut(node.0) {
                        *x = true;
                    }
                } else if let Some(c) = incident.get_mut(node.0) {
                    *c += 1;
                }
            }
        }
        let mut candidates: Vec<NodeRef> = (0..count)
            .filter(|&n| !excluded[n] && incident[n] == 2)
            .map(NodeRef)
            .collect();

        if self.kind() == BodyKind::Sheet {
            let uses = self.edge_use_counts();
            let mut smooth = Vec::with_capacity(candidates.len());
            for node in candidates {
                let exposed: Vec<EEdgeId> = self
                    .incident_two_node(node)?
                    .into_iter()
                    .filter(|e| uses.get(e) == Some(&1))
                    .collect();
                if let [a, b] = exposed[..] {
                    let deviation = tangent_deviation(&self.tangent_at(a, node)?, &self.tangent_at(b, node)?);
                    if !is_smooth(deviation, self.angle()) {
                        continue;
                    }
                }
                smooth.push(node);
            }
            candidates = smooth;
        }

        let mut removed = 0;
        for node in candidates {
            if let [a, b] = self.incident_two_node(node)?[..] {
                self.merge_at(node, a, b)?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, eedges = self.eedges().len(), "nodes eliminated");
        }
        Ok(removed)
    }

    /// Occurrences of every EEdge across all loops.
    pub(super) fn edge_use_counts(&self) -> HashMap<EEdgeId, usize> {
        let mut uses = HashMap::new();
        for id in self.eloops() {
            if let Ok(lp) = self.graph.eloop(*id) {
                for (e, _) in &lp.edges {
                    *uses.entry(*e).or_insert(0) += 1;
                }
            }
        }
        uses
    }

    /// Distinct open two-node EEdges ending at `node`.
    fn incident_two_node(&self, node: NodeRef) -> Result<Vec<EEdgeId>> {
        let mut found = Vec::new();
        for id in self.eedges() {
            let edge = self.graph.edge(*id)?;
            if edge.kind == EdgeKind::TwoNode && edge.nodes[0] != edge.nodes[1] && edge.nodes.contains(&node) {
                found.push(*id);
            }
        }
        Ok(found)
    }

    fn tangent_at(&self, id: EEdgeId, node: NodeRef) -> Result<Vector3> {
        let edge = self.graph.edge(id)?;
        let t = if edge.nodes[0] == node { edge.t_range[0] } else { edge.t_range[1] };
        Ok(self.evaluate_edge(id, t)?.d1)
    }

    /// Joins `a` and `b` across `node` into the EEdge listed first along
    /// the first loop using them.
    fn merge_at(&mut self, node: NodeRef, a: EEdgeId, b: EEdgeId) -> Result<()> {
        let owners = self.graph.loops_using(a);
        if owners.is_empty() || owners.len() > 2 || owners != self.graph.loops_using(b) {
            return Err(TopologyError::InvalidTopology(format!(
                "edges at node {} are not shared by the same one or two loops",
                node.0
            ))
            .into());
        }
        for id in &owners {
            let lp = self.graph.eloop(*id)?;
            let count = |e: EEdgeId| lp.edges.iter().filter(|(x, _)| *x == e).count();
            if count(a) != 1 || count(b) != 1 {
                return Err(TopologyError::InvalidTopology(format!(
                    "loop uses an edge at node {} more than once",
                    node.0
                ))
                .into());
            }
        }

        let uses = self.graph.eloop(owners[0])?.edges.clone();
        let position = |e: EEdgeId| uses.iter().position(|(x, _)| *x == e).unwrap_or(0);
        let next_of = |i: usize| uses[(i + 1) % uses.len()].0;
        let (ia, ib) = (position(a), position(b));
        let (sa, sb) = (uses[ia].1, uses[ib].1);
        let ends_at = |e: EEdgeId, s: Sense| -> Result<bool> { Ok(self.graph.edge(e)?.ends(s).1 == node) };
        let (first, first_sense, second, second_sense) = if ends_at(a, sa)? && next_of(ia) == b {
            (a, sa, b, sb)
        } else if ends_at(b, sb)? && next_of(ib) == a {
            (b, sb, a, sa)
        } else {
            return Err(TopologyError::InvalidTopology(format!(
                "edges are not adjacent at node {}",
                node.0
            ))
            .into());
        };

        let head = self.graph.edge(first)?.clone();
        let tail = self.graph.edge(second)?.clone();
        let mut segments = head.oriented_segments(first_sense);
        let mut rest = tail.oriented_segments(second_sense);
        if let Some(s) = rest.first_mut() {
            s.interior_node = Some(node);
        }
        segments.extend(rest);
        let mut t = head.t_range[0];
        for s in &mut segments {
            s.t_start = t;
            t += s.local_length();
            s.t_end = t;
        }
        let (start, _) = head.ends(first_sense);
        let (_, end) = tail.ends(second_sense);
        *self.graph.edge_mut(first)? = EEdgeData {
            kind: if start == end { EdgeKind::OneNode } else { EdgeKind::TwoNode },
            nodes: [start, end],
            t_range: [head.t_range[0], t],
            segments,
            attributes: head.attributes,
        };

        for (k, id) in owners.iter().enumerate() {
            let lp = self.graph.eloop_mut(*id)?;
            let sense = if k == 0 { Sense::Forward } else { Sense::Reverse };
            if k == 1 {
                let sense_of = |e: EEdgeId| lp.edges.iter().find(|(x, _)| *x == e).map(|(_, s)| *s);
                if sense_of(first) != Some(first_sense.flip()) || sense_of(second) != Some(second_sense.flip()) {
                    return Err(TopologyError::InvalidTopology(format!(
                        "loops disagree on the direction through node {}",
                        node.0
                    ))
                    .into());
                }
            }
            for entry in &mut lp.edges {
                if entry.0 == first {
                    entry.1 = sense;
                }
            }
            lp.edges.retain(|(x, _)| *x != second);
        }
        self.graph.remove_edge(second)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(super) mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::brep::primitives::MakeGridSheet;
    use crate::brep::{AttrValue, Closure, EdgeRef, Model, ModelBuilder, KEEP};
    use crate::effect::tests::{tessellate, unit_box};
    use crate::effect::Virtualize;
    use crate::geometry::Plane;
    use crate::math::Point3;
    use crate::tessellation::{TessellateBody, TessellationParams, VertexKind};

    /// A 2 x 1 sheet whose bottom side is split at node 1.
    fn split_sheet(keep_middle: bool) -> Model {
        let mut b = ModelBuilder::new(BodyKind::Sheet);
        let corners = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let nodes: Vec<_> = corners.iter().map(|p| b.add_node(*p)).collect();
        let edges: Vec<_> = (0..5)
            .map(|i| b.add_line(nodes[i], nodes[(i + 1) % 5]).unwrap())
            .collect();
        let lp = b
            .add_loop(edges.iter().map(|e| (*e, Sense::Forward)).collect())
            .unwrap();
        let plane = Plane::new(Point3::origin(), Vector3::x(), Vector3::y()).unwrap();
        let face = b.add_plane_face(plane, Sense::Forward, &[lp]).unwrap();
        b.add_shell(vec![face], Closure::Open);
        if keep_middle {
            b.set_attribute(RealRef::Node(nodes[1]), KEEP, AttrValue::Int(vec![1]))
                .unwrap();
        }
        b.build().unwrap()
    }

    #[test]
    fn cube_keeps_every_node() {
        let mut ebody = unit_box();
        assert_eq!(ebody.eliminate_nodes().unwrap(), 0);
        assert_eq!(ebody.eedges().len(), 12);
    }

    #[test]
    fn collinear_split_is_merged_once() {
        let model = split_sheet(false);
        let mut ebody = Virtualize::new(tessellate(model), 5.0).execute().unwrap();
        assert_eq!(ebody.eedges().len(), 4);
        let merged = ebody.eedge_of(EdgeRef(0)).unwrap();
        let data = ebody.eedge(merged).unwrap();
        assert_eq!(data.segments.len(), 2);
        assert_eq!(data.segments[1].edge, EdgeRef(1));
        assert_eq!(data.segments[1].interior_node, Some(NodeRef(1)));
        assert_eq!(data.nodes, [NodeRef(0), NodeRef(2)]);
        assert!((data.t_range[1] - 2.0).abs() < 1e-12);

        let before = ebody.eedges().to_vec();
        assert_eq!(ebody.eliminate_nodes().unwrap(), 0);
        assert_eq!(ebody.eedges(), before.as_slice());
    }

    #[test]
    fn kept_node_survives() {
        let ebody = Virtualize::new(tessellate(split_sheet(true)), 5.0)
            .execute()
            .unwrap();
        assert_eq!(ebody.eedges().len(), 5);
    }

    #[test]
    fn sharp_sheet_corners_need_a_wide_angle() {
        let model = || MakeGridSheet::new(Point3::origin(), 1.0, 1, 1).execute().unwrap();
        let narrow = Virtualize::new(tessellate(model()), 5.0).execute().unwrap();
        assert_eq!(narrow.eedges().len(), 4);

        let wide = Virtualize::new(tessellate(model()), 90.0).execute().unwrap();
        assert_eq!(wide.eedges().len(), 1);
        let edge = wide.eedge(wide.eedges()[0]).unwrap();
        assert_eq!(edge.kind, EdgeKind::OneNode);
        assert_eq!(edge.segments.len(), 4);
        let lp = wide.eloop(wide.eloops()[0]).unwrap();
        assert_eq!(lp.edges.len(), 1);
    }

    /// The split sheet with node 1 lifted off the real geometry.
    pub(in crate::effect) fn deflected_split_sheet(offset: Vector3) -> EBody {
        let body = Arc::new(split_sheet(false));
        let mut tess = TessellateBody::new(body, TessellationParams::default())
            .execute()
            .unwrap();
        {
            let e0 = tess.edge_mut(EdgeRef(0)).unwrap();
            let last = e0.xyz.len() - 1;
            e0.xyz[last] += offset;
        }
        tess.edge_mut(EdgeRef(1)).unwrap().xyz[0] += offset;
        {
            let face = tess.face_mut(crate::brep::FaceRef(0)).unwrap();
            for (v, kind) in face.kinds.clone().iter().enumerate() {
                if *kind == VertexKind::Node(NodeRef(1)) {
                    face.xyz[v] += offset;
                }
            }
        }
        Virtualize::new(Arc::new(tess), 5.0).execute().unwrap()
    }

    #[test]
    fn merged_edge_carries_node_deflection() {
        let offset = Vector3::new(0.0, 0.0, 0.005);
        let ebody = deflected_split_sheet(offset);
        let merged = ebody.eedge_of(EdgeRef(0)).unwrap();

        let at_node = ebody.evaluate_edge(merged, 1.0).unwrap();
        let diff = at_node.point - Point3::new(1.0, 0.0, 0.0);
        assert!((diff - offset).norm() < 1e-12);

        let before = ebody.evaluate_edge(merged, 0.9).unwrap();
        let after = ebody.evaluate_edge(merged, 1.1).unwrap();
        assert!(before.d1.x > 0.0 && after.d1.x > 0.0);
        let far = ebody.evaluate_edge(merged, 0.5).unwrap();
        assert!((far.point - Point3::new(0.5, 0.0, 0.0)).norm() < 1e-12);
    }
}
