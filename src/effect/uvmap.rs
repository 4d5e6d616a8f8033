//! Global parametrization of a composite face.
//!
//! A [`UvMap`] assigns one uv to every vertex of the merged triangulation
//! and remembers which patch owns each triangle, so a composite uv can be
//! carried back to the real face it came from.

use std::collections::{HashMap, HashSet};
use std::f64::consts::TAU;
use std::fmt;

use nalgebra::{Matrix3, SymmetricEigen};
use tracing::warn;

use crate::error::{MappingError, Result};
use crate::math::triangle_2d::locate;
use crate::math::{Point2, Point3, Vector2, Vector3};

use super::entity::HitCache;

/// Flattens a triangulated surface patch into the plane.
pub trait Parametrizer: fmt::Debug + Send + Sync {
    /// Returns one uv per entry of `xyz`.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::Failed`] if the mesh cannot be flattened.
    fn parametrize(&self, xyz: &[Point3], tris: &[[usize; 3]]) -> Result<Vec<Point2>>;
}

/// Projects onto the best-fit plane of the vertices.
///
/// When the projection folds (the mesh wraps around), falls back to
/// [`DiskEmbedding`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarProjection;

impl Parametrizer for PlanarProjection {
    fn parametrize(&self, xyz: &[Point3], tris: &[[usize; 3]]) -> Result<Vec<Point2>> {
        match project(xyz, tris) {
            Some(uvs) if !has_folds(&uvs, tris) => Ok(uvs),
            _ => DiskEmbedding.parametrize(xyz, tris),
        }
    }
}

/// Tutte embedding of a mesh with disk topology.
///
/// The single boundary loop is pinned to the unit circle by chord length and
/// every interior vertex sits at the average of its neighbours.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskEmbedding;

impl Parametrizer for DiskEmbedding {
    #[allow(clippy::cast_precision_loss)]
    fn parametrize(&self, xyz: &[Point3], tris: &[[usize; 3]]) -> Result<Vec<Point2>> {
        let boundary = boundary_loop(xyz.len(), tris)?;
        let mut uvs = vec![Point2::origin(); xyz.len()];
        let mut on_boundary = vec![false; xyz.len()];

        let mut lengths = Vec::with_capacity(boundary.len());
        let mut total = 0.0;
        for (i, &v) in boundary.iter().enumerate() {
            lengths.push(total);
            total += (xyz[boundary[(i + 1) % boundary.len()]] - xyz[v]).norm();
        }
        if total <= 0.0 {
            return Err(MappingError::Failed("boundary has no length".into()).into());
        }
        for (&v, s) in boundary.iter().zip(lengths) {
            let (sin, cos) = (TAU * s / total).sin_cos();
            uvs[v] = Point2::new(cos, sin);
            on_boundary[v] = true;
        }

        let mut neighbours: Vec<Vec<usize>> = vec![Vec::new(); xyz.len()];
        for tri in tris {
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                if !neighbours[a].contains(&b) {
                    neighbours[a].push(b);
                    neighbours[b].push(a);
                }
            }
        }
        let interior: Vec<usize> = (0..xyz.len())
            .filter(|&v| !on_boundary[v] && !neighbours[v].is_empty())
            .collect();
        let slot: HashMap<usize, usize> = interior.iter().enumerate().map(|(i, &v)| (v, i)).collect();

        for axis in 0..2 {
            let rhs: Vec<f64> = interior
                .iter()
                .map(|&v| {
                    neighbours[v]
                        .iter()
                        .filter(|n| on_boundary[**n])
                        .map(|n| uvs[*n][axis])
                        .sum()
                })
                .collect();
            let apply = |x: &[f64]| -> Vec<f64> {
                interior
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| {
                        let coupled: f64 = neighbours[v]
                            .iter()
                            .filter_map(|n| slot.get(n))
                            .map(|&j| x[j])
                            .sum();
                        neighbours[v].len() as f64 * x[i] - coupled
                    })
                    .collect()
            };
            let solution = conjugate_gradient(apply, &rhs)?;
            for (&v, value) in interior.iter().zip(solution) {
                uvs[v][axis] = value;
            }
        }
        Ok(uvs)
    }
}

/// Where a uv falls in a [`UvMap`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvLocation {
    /// Index of the owning patch.
    pub patch: usize,
    /// Index of the triangle in the merged triangulation.
    pub tri: usize,
    pub weights: [f64; 3],
    /// `false` when the point was extrapolated from the nearest triangle.
    pub inside: bool,
}

/// Global uv of every merged vertex plus triangle ownership.
#[derive(Debug, Clone)]
pub struct UvMap {
    uvs: Vec<Point2>,
    tris: Vec<[usize; 3]>,
    tri_patch: Vec<usize>,
    range: [f64; 4],
    last_hit: HitCache,
}

impl UvMap {
    /// Parametrizes a merged triangulation.
    ///
    /// Folded triangles are logged, not rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if the parametrizer fails or the inputs disagree.
    pub fn build(
        parametrizer: &dyn Parametrizer,
        xyz: &[Point3],
        tris: Vec<[usize; 3]>,
        tri_patch: Vec<usize>,
    ) -> Result<Self> {
        let uvs = parametrizer.parametrize(xyz, &tris)?;
        if uvs.len() != xyz.len() {
            return Err(MappingError::Failed(format!(
                "{} uvs for {} vertices",
                uvs.len(),
                xyz.len()
            ))
            .into());
        }
        let folded = tris.iter().filter(|t| tri_area(&uvs, t) <= 0.0).count();
        if folded > 0 {
            warn!(folded, triangles = tris.len(), "parametrization has folded triangles");
        }
        Self::from_parts(uvs, tris, tri_patch)
    }

    /// Reassembles a map from stored arrays.
    ///
    /// # Errors
    ///
    /// Returns an error if a triangle references a missing vertex or the
    /// ownership list has the wrong length.
    pub fn from_parts(uvs: Vec<Point2>, tris: Vec<[usize; 3]>, tri_patch: Vec<usize>) -> Result<Self> {
        if tri_patch.len() != tris.len() {
            return Err(MappingError::Failed("triangle ownership length mismatch".into()).into());
        }
        if tris.iter().flatten().any(|&v| v >= uvs.len()) {
            return Err(MappingError::Failed("triangle vertex out of range".into()).into());
        }
        let mut range = [f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY];
        for uv in &uvs {
            range[0] = range[0].min(uv.x);
            range[1] = range[1].max(uv.x);
            range[2] = range[2].min(uv.y);
            range[3] = range[3].max(uv.y);
        }
        if uvs.is_empty() {
            range = [0.0; 4];
        }
        Ok(Self {
            uvs,
            tris,
            tri_patch,
            range,
            last_hit: HitCache::default(),
        })
    }

    /// `[u_min, u_max, v_min, v_max]`.
    #[must_use]
    pub fn range(&self) -> [f64; 4] {
        self.range
    }

    #[must_use]
    pub fn uvs(&self) -> &[Point2] {
        &self.uvs
    }

    #[must_use]
    pub fn tris(&self) -> &[[usize; 3]] {
        &self.tris
    }

    #[must_use]
    pub fn tri_patch(&self) -> &[usize] {
        &self.tri_patch
    }

    /// # Errors
    ///
    /// Returns an error if the vertex does not exist.
    pub fn vertex_uv(&self, vertex: usize) -> Result<Point2> {
        self.uvs.get(vertex).copied().ok_or_else(|| {
            crate::error::RangeError::Index {
                kind: "uv-map vertex",
                index: vertex,
                count: self.uvs.len(),
            }
            .into()
        })
    }

    /// Finds the triangle holding `uv`, extrapolating when outside.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::NotLocated`] if the map has no usable triangle.
    pub fn locate(&self, uv: &Point2) -> Result<UvLocation> {
        let hit = locate(&self.uvs, &self.tris, uv, self.last_hit.get())
            .ok_or(MappingError::NotLocated { u: uv.x, v: uv.y })?;
        self.last_hit.set(hit.tri);
        Ok(UvLocation {
            patch: self.tri_patch[hit.tri],
            tri: hit.tri,
            weights: hit.weights,
            inside: hit.inside,
        })
    }

    /// The global uv at barycentric `weights` of triangle `tri`.
    ///
    /// # Errors
    ///
    /// Returns an error if the triangle does not exist.
    pub fn to_global(&self, tri: usize, weights: &[f64; 3]) -> Result<Point2> {
        let t = self.tris.get(tri).ok_or(crate::error::RangeError::Index {
            kind: "uv-map triangle",
            index: tri,
            count: self.tris.len(),
        })?;
        let mut uv = Vector2::zeros();
        for (v, w) in t.iter().zip(weights) {
            uv += self.uvs[*v].coords * *w;
        }
        Ok(Point2::from(uv))
    }
}

fn tri_area(uvs: &[Point2], t: &[usize; 3]) -> f64 {
    let [a, b, c] = t.map(|i| uvs[i]);
    0.5 * (b - a).perp(&(c - a))
}

fn has_folds(uvs: &[Point2], tris: &[[usize; 3]]) -> bool {
    let areas: Vec<f64> = tris.iter().map(|t| tri_area(uvs, t)).collect();
    #[allow(clippy::cast_precision_loss)]
    let mean = areas.iter().sum::<f64>() / areas.len().max(1) as f64;
    mean <= 0.0 || areas.iter().any(|a| *a <= mean * 1e-9)
}

/// Best-fit plane projection oriented by the mesh normal.
#[allow(clippy::cast_precision_loss)]
fn project(xyz: &[Point3], tris: &[[usize; 3]]) -> Option<Vec<Point2>> {
    if xyz.len() < 3 {
        return None;
    }
    let centroid = xyz.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / xyz.len() as f64;
    let mut covariance = Matrix3::zeros();
    for p in xyz {
        let d = p.coords - centroid;
        covariance += d * d.transpose();
    }
    let eigen = SymmetricEigen::new(covariance);
    let mut order = [0usize, 1, 2];
    order.sort_by(|a, b| eigen.eigenvalues[*b].total_cmp(&eigen.eigenvalues[*a]));
    if eigen.eigenvalues[order[1]] <= eigen.eigenvalues[order[0]] * 1e-12 {
        return None;
    }
    let u: Vector3 = eigen.eigenvectors.column(order[0]).into_owned();
    let mut normal: Vector3 = eigen.eigenvectors.column(order[2]).into_owned();

    let mesh_normal = tris.iter().fold(Vector3::zeros(), |acc, t| {
        let [a, b, c] = t.map(|i| xyz[i]);
        acc + (b - a).cross(&(c - a))
    });
    if mesh_normal.dot(&normal) < 0.0 {
        normal = -normal;
    }
    let v = normal.cross(&u);
    Some(
        xyz.iter()
            .map(|p| {
                let d = p.coords - centroid;
                Point2::new(d.dot(&u), d.dot(&v))
            })
            .collect(),
    )
}

/// The single boundary cycle of an oriented triangle mesh.
fn boundary_loop(count: usize, tris: &[[usize; 3]]) -> Result<Vec<usize>> {
    let mut directed = HashSet::new();
    for tri in tris {
        for k in 0..3 {
            directed.insert((tri[k], tri[(k + 1) % 3]));
        }
    }
    let mut next: HashMap<usize, usize> = HashMap::new();
    for &(a, b) in &directed {
        if !directed.contains(&(b, a)) && next.insert(a, b).is_some() {
            return Err(MappingError::Failed(format!("boundary pinches at vertex {a}")).into());
        }
    }
    let Some(&start) = next.keys().min() else {
        return Err(MappingError::Failed("mesh has no boundary".into()).into());
    };
    let mut cycle = vec![start];
    let mut current = start;
    while let Some(&n) = next.get(&current) {
        if n == start {
            break;
        }
        if cycle.len() > count {
            return Err(MappingError::Failed("boundary does not close".into()).into());
        }
        cycle.push(n);
        current = n;
    }
    if cycle.len() != next.len() {
        return Err(MappingError::Failed("mesh boundary is not a single loop".into()).into());
    }
    Ok(cycle)
}

/// Solves a symmetric positive definite system given as a product.
#[allow(clippy::cast_precision_loss)]
fn conjugate_gradient(apply: impl Fn(&[f64]) -> Vec<f64>, rhs: &[f64]) -> Result<Vec<f64>> {
    let n = rhs.len();
    let mut x = vec![0.0; n];
    if n == 0 {
        return Ok(x);
    }
    let dot = |a: &[f64], b: &[f64]| a.iter().zip(b).map(|(p, q)| p * q).sum::<f64>();
    let mut r = rhs.to_vec();
    let mut p = r.clone();
    let mut rr = dot(&r, &r);
    let tolerance = (dot(rhs, rhs) * 1e-26).max(1e-300);
    for _ in 0..(10 * n + 100) {
        if rr <= tolerance {
            return Ok(x);
        }
        let ap = apply(&p);
        let pap = dot(&p, &ap);
        if pap <= 0.0 {
            break;
        }
        let alpha = rr / pap;
        for i in 0..n {
            x[i] += alpha * p[i];
            r[i] -= alpha * ap[i];
        }
        let next = dot(&r, &r);
        let beta = next / rr;
        rr = next;
        for i in 0..n {
            p[i] = r[i] + beta * p[i];
        }
    }
    if rr <= tolerance * 1e6 {
        Ok(x)
    } else {
        Err(MappingError::Failed("embedding did not converge".into()).into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// `n x n` quads split into triangles over `[0, 1]^2`, lifted by `f`.
    #[allow(clippy::cast_precision_loss)]
    fn sheet(n: usize, f: impl Fn(f64, f64) -> Point3) -> (Vec<Point3>, Vec<[usize; 3]>) {
        let mut xyz = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                xyz.push(f(i as f64 / n as f64, j as f64 / n as f64));
            }
        }
        let id = |i: usize, j: usize| j * (n + 1) + i;
        let mut tris = Vec::new();
        for j in 0..n {
            for i in 0..n {
                tris.push([id(i, j), id(i + 1, j), id(i + 1, j + 1)]);
                tris.push([id(i, j), id(i + 1, j + 1), id(i, j + 1)]);
            }
        }
        (xyz, tris)
    }

    #[test]
    fn flat_mesh_projects_without_folds() {
        let (xyz, tris) = sheet(3, |u, v| Point3::new(u, v, 2.0));
        let uvs = PlanarProjection.parametrize(&xyz, &tris).unwrap();
        assert!(!has_folds(&uvs, &tris));
        let d = (uvs[1] - uvs[0]).norm();
        assert!((d - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn wrapped_mesh_falls_back_to_disk() {
        let (xyz, tris) = sheet(6, |u, v| {
            let a = 1.5 * std::f64::consts::PI * u;
            Point3::new(a.cos(), a.sin(), v)
        });
        assert!(has_folds(&project(&xyz, &tris).unwrap(), &tris));
        let uvs = PlanarProjection.parametrize(&xyz, &tris).unwrap();
        assert!(!has_folds(&uvs, &tris));
        assert!((uvs[0].coords.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn closed_mesh_has_no_disk_embedding() {
        let xyz = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let tris = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]];
        assert!(DiskEmbedding.parametrize(&xyz, &tris).is_err());
    }

    #[test]
    fn locate_reports_owner_and_maps_back() {
        let uvs = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let map = UvMap::from_parts(uvs, vec![[0, 1, 2], [0, 2, 3]], vec![0, 1]).unwrap();
        assert_eq!(map.range(), [0.0, 1.0, 0.0, 1.0]);
        let loc = map.locate(&Point2::new(0.2, 0.7)).unwrap();
        assert_eq!(loc.patch, 1);
        assert!(loc.inside);
        let back = map.to_global(loc.tri, &loc.weights).unwrap();
        assert!((back - Point2::new(0.2, 0.7)).norm() < 1e-12);
        let outside = map.locate(&Point2::new(1.5, 0.5)).unwrap();
        assert!(!outside.inside);
    }

    #[test]
    fn from_parts_validates_indices() {
        assert!(UvMap::from_parts(vec![Point2::origin()], vec![[0, 1, 2]], vec![0]).is_err());
        assert!(UvMap::from_parts(vec![Point2::origin(); 3], vec![[0, 1, 2]], vec![]).is_err());
    }
}
