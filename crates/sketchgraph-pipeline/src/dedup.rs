//! Vertex deduplication.
//!
//! Thinning artifacts produce several candidate pixels for one logical
//! junction. Candidates closer than the merge distance are clustered by
//! single linkage: an R-tree proximity query feeds a union-find, giving
//! the connected components of the proximity graph. Merging can pull two
//! cluster centroids within the distance of each other, so clusters are
//! re-merged on their centroids until none are closer than the distance.
//!
//! 1. Bulk-load the candidates into an `RTree`.
//! 2. For each candidate, union it with every other candidate strictly
//!    within the distance (`UnionFind`).
//! 3. Repeat on the resulting centroids until a pass merges nothing.
//! 4. Number the clusters in raster order of their rounded centroids.

use petgraph::unionfind::UnionFind;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::junction::VertexCandidate;
use crate::types::{Pixel, Point};

/// A candidate position in the spatial index, tagged with its index.
type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// One deduplicated vertex and the candidate pixels it absorbed.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexCluster {
    /// Centroid of the member pixels.
    pub position: Point,
    /// Candidate pixels merged into this vertex, in raster order.
    pub members: Vec<Pixel>,
}

impl VertexCluster {
    /// A cluster holding a single candidate.
    #[must_use]
    pub fn singleton(pixel: Pixel) -> Self {
        Self {
            position: pixel.to_point(),
            members: vec![pixel],
        }
    }

    /// The centroid rounded to the nearest pixel.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn rounded(&self) -> (u32, u32) {
        (
            self.position.x.round().max(0.0) as u32,
            self.position.y.round().max(0.0) as u32,
        )
    }
}

/// One cluster per candidate, without merging. Used when deduplication
/// is disabled.
#[must_use]
pub fn singleton_clusters(candidates: &[VertexCandidate]) -> Vec<VertexCluster> {
    let mut clusters: Vec<_> = candidates
        .iter()
        .map(|c| VertexCluster::singleton(c.pixel))
        .collect();
    sort_clusters(&mut clusters);
    clusters
}

/// Merge candidates closer than `min_distance` into clusters.
///
/// Guarantees every pair of returned centroids is at least
/// `min_distance` apart. The order of `candidates` does not affect the
/// result.
#[must_use]
pub fn deduplicate(candidates: &[VertexCandidate], min_distance: f64) -> Vec<VertexCluster> {
    let n = candidates.len();
    if n == 0 {
        return Vec::new();
    }
    let threshold_sq = min_distance * min_distance;
    let points: Vec<Point> = candidates.iter().map(|c| c.pixel.to_point()).collect();

    let mut uf = UnionFind::<usize>::new(n);
    union_close_pairs(&mut uf, &points, &(0..n).collect::<Vec<_>>(), threshold_sq);

    let mut passes = 1;
    loop {
        let groups = groups(&mut uf, n);
        let centroids: Vec<Point> = groups.iter().map(|g| centroid(&points, g)).collect();
        let representatives: Vec<usize> = groups.iter().map(|g| g[0]).collect();
        if !union_close_pairs(&mut uf, &centroids, &representatives, threshold_sq) {
            break;
        }
        passes += 1;
    }

    let mut clusters: Vec<VertexCluster> = groups(&mut uf, n)
        .into_iter()
        .map(|group| {
            let mut members: Vec<Pixel> = group.iter().map(|&i| candidates[i].pixel).collect();
            members.sort_by_key(|p| p.raster_key());
            VertexCluster {
                position: centroid(&points, &group),
                members,
            }
        })
        .collect();
    sort_clusters(&mut clusters);

    tracing::debug!(
        candidates = n,
        vertices = clusters.len(),
        passes,
        "deduplicated vertex candidates",
    );
    clusters
}

/// Union `representatives[i]` with `representatives[j]` for every pair
/// of `points` strictly closer than the threshold. Returns whether any
/// union joined two distinct sets.
fn union_close_pairs(
    uf: &mut UnionFind<usize>,
    points: &[Point],
    representatives: &[usize],
    threshold_sq: f64,
) -> bool {
    let indexed: Vec<IndexedPoint> = points
        .iter()
        .enumerate()
        .map(|(i, p)| GeomWithData::new(p.to_array(), i))
        .collect();
    let tree = RTree::bulk_load(indexed);

    let mut merged = false;
    for (i, point) in points.iter().enumerate() {
        let query = point.to_array();
        for neighbor in tree.locate_within_distance(query, threshold_sq) {
            let j = neighbor.data;
            if j <= i {
                continue;
            }
            // `locate_within_distance` is inclusive; merging needs strict.
            if point.distance_squared(points[j]) < threshold_sq
                && uf.union(representatives[i], representatives[j])
            {
                merged = true;
            }
        }
    }
    merged
}

/// Current sets as index lists, each sorted ascending.
fn groups(uf: &mut UnionFind<usize>, n: usize) -> Vec<Vec<usize>> {
    let mut by_root: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        let root = uf.find_mut(i);
        by_root[root].push(i);
    }
    by_root.into_iter().filter(|g| !g.is_empty()).collect()
}

fn centroid(points: &[Point], members: &[usize]) -> Point {
    #[allow(clippy::cast_precision_loss)]
    let count = members.len().max(1) as f64;
    let (sx, sy) = members
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &i| (sx + points[i].x, sy + points[i].y));
    Point::new(sx / count, sy / count)
}

/// Raster order of the rounded centroid, ties broken by first member.
fn sort_clusters(clusters: &mut [VertexCluster]) {
    clusters.sort_by(|a, b| {
        let (ax, ay) = a.rounded();
        let (bx, by) = b.rounded();
        (ay, ax)
            .cmp(&(by, bx))
            .then_with(|| a.position.y.total_cmp(&b.position.y))
            .then_with(|| a.position.x.total_cmp(&b.position.x))
            .then_with(|| {
                let ka = a.members.first().map(|p| p.raster_key());
                let kb = b.members.first().map(|p| p.raster_key());
                ka.cmp(&kb)
            })
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x: u32, y: u32) -> VertexCandidate {
        VertexCandidate {
            pixel: Pixel::new(x, y),
            degree: 3,
        }
    }

    fn assert_separated(clusters: &[VertexCluster], min_distance: f64) {
        for (i, a) in clusters.iter().enumerate() {
            for b in &clusters[i + 1..] {
                assert!(
                    a.position.distance(b.position) >= min_distance,
                    "{:?} and {:?} closer than {min_distance}",
                    a.position,
                    b.position,
                );
            }
        }
    }

    #[test]
    fn nearby_candidates_merge_to_centroid() {
        let clusters = deduplicate(&[candidate(10, 10), candidate(12, 10), candidate(50, 50)], 5.0);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].position, Point::new(11.0, 10.0));
        assert_eq!(clusters[0].members, vec![Pixel::new(10, 10), Pixel::new(12, 10)]);
        assert_eq!(clusters[1].members, vec![Pixel::new(50, 50)]);
    }

    #[test]
    fn chains_merge_transitively() {
        let chain: Vec<_> = (0..6).map(|i| candidate(10 + i * 4, 20)).collect();
        let clusters = deduplicate(&chain, 5.0);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 6);
    }

    #[test]
    fn exact_threshold_does_not_merge() {
        let clusters = deduplicate(&[candidate(0, 0), candidate(10, 0)], 10.0);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn centroid_drift_triggers_second_merge() {
        // (7, 4) is at least 7.5 from both members but only ~7.02 from
        // their centroid (0, 3.5).
        let candidates = [candidate(0, 0), candidate(0, 7), candidate(7, 4)];
        let clusters = deduplicate(&candidates, 7.5);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 3);
    }

    #[test]
    fn separation_invariant_on_dense_cloud() {
        let cloud: Vec<_> = (0..15)
            .flat_map(|y| (0..15).map(move |x| candidate(x * 3 + (y % 2), y * 2)))
            .collect();
        for distance in [2.5, 4.0, 7.0, 13.0] {
            let clusters = deduplicate(&cloud, distance);
            assert_separated(&clusters, distance);
            let total: usize = clusters.iter().map(|c| c.members.len()).sum();
            assert_eq!(total, cloud.len());
        }
    }

    #[test]
    fn ids_follow_raster_order_of_centroids() {
        let clusters = deduplicate(&[candidate(40, 5), candidate(5, 30), candidate(5, 5)], 3.0);
        let positions: Vec<_> = clusters.iter().map(VertexCluster::rounded).collect();
        assert_eq!(positions, vec![(5, 5), (40, 5), (5, 30)]);
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut candidates = vec![candidate(3, 3), candidate(6, 4), candidate(30, 2), candidate(31, 40)];
        let forward = deduplicate(&candidates, 5.0);
        candidates.reverse();
        assert_eq!(deduplicate(&candidates, 5.0), forward);
    }

    #[test]
    fn zero_distance_keeps_everything() {
        let clusters = deduplicate(&[candidate(1, 1), candidate(1, 2)], 0.0);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn singletons_are_sorted() {
        let clusters = singleton_clusters(&[candidate(9, 9), candidate(1, 1)]);
        assert_eq!(clusters[0].members, vec![Pixel::new(1, 1)]);
    }
}
