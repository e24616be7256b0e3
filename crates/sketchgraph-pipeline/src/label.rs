//! Segment labelling ("path coloring").
//!
//! Every vertex's member pixels, plus their 8-neighbourhood, are marked
//! as separators owned by that vertex. Members are claimed before any
//! neighbourhood, so each vertex owns at least its own pixels.
//! Connected-component labelling over the remaining skeleton pixels then
//! yields one component per segment. A segment's ends are its pixels with
//! at most one neighbour inside the segment; each end attaches to the
//! vertex owning an adjacent separator pixel. Segments that cannot be
//! attached at two ends are discarded with a warning.
//!
//! Vertices closer than about three pixels leave no free pixels between
//! their separators. Each such pair is reported as a [`SegmentMap::links`]
//! entry instead, so the skeleton's connectivity survives into the graph.

use std::collections::BTreeSet;

use image::{ImageBuffer, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::dedup::VertexCluster;
use crate::grid::BinaryGrid;
use crate::types::{GrayImage, Pixel};

/// Where one end of a segment meets a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    /// The segment pixel at this end.
    pub pixel: Pixel,
    /// Id of the vertex whose separator it touches.
    pub vertex: usize,
}

/// A maximal skeleton path between two vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Component label, unique per segment, starting at 1.
    pub label: u32,
    /// All pixels of the segment in raster order.
    pub pixels: Vec<Pixel>,
    /// The two attached ends. Both may name the same vertex (a loop).
    pub ends: [Attachment; 2],
}

/// A component dropped because fewer than two ends attach to vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingSegment {
    /// Component label.
    pub label: u32,
    /// Size of the component.
    pub pixel_count: usize,
    /// How many ends did attach.
    pub attachments: usize,
}

/// Output of [`label_segments`].
#[derive(Debug, Clone)]
pub struct SegmentMap {
    width: u32,
    height: u32,
    /// Separator owner per pixel (row-major).
    owners: Vec<Option<usize>>,
    /// Attached segments in label order.
    pub segments: Vec<Segment>,
    /// Components that were discarded.
    pub dangling: Vec<DanglingSegment>,
    /// Pairs of distinct vertices whose separator pixels touch,
    /// `[lower, higher]`, ascending and without repeats.
    pub links: Vec<[usize; 2]>,
}

impl SegmentMap {
    /// Width of the labelled image.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the labelled image.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// The vertex owning `p` as a separator, if any.
    #[must_use]
    pub fn separator_owner(&self, p: Pixel) -> Option<usize> {
        if p.x >= self.width || p.y >= self.height {
            return None;
        }
        self.owners[p.y as usize * self.width as usize + p.x as usize]
    }

    /// Every separator pixel with its owning vertex, in raster order.
    pub fn separators(&self) -> impl Iterator<Item = (Pixel, usize)> + '_ {
        let width = self.width as usize;
        self.owners.iter().enumerate().filter_map(move |(i, owner)| {
            let vertex = (*owner)?;
            let x = u32::try_from(i % width).ok()?;
            let y = u32::try_from(i / width).ok()?;
            Some((Pixel::new(x, y), vertex))
        })
    }
}

/// Split `skeleton` into segments between the given vertices.
///
/// Vertex ids are indices into `vertices`.
#[must_use]
pub fn label_segments(skeleton: &BinaryGrid, vertices: &[VertexCluster]) -> SegmentMap {
    let width = skeleton.width();
    let height = skeleton.height();
    let mut owners: Vec<Option<usize>> = vec![None; width as usize * height as usize];

    let mut claim = |id: usize, p: Pixel| {
        if skeleton.is_set(p) {
            let owner = &mut owners[skeleton.index(p)];
            if owner.is_none() {
                *owner = Some(id);
            }
        }
    };
    for (id, vertex) in vertices.iter().enumerate() {
        for &member in &vertex.members {
            claim(id, member);
        }
    }
    for (id, vertex) in vertices.iter().enumerate() {
        for &member in &vertex.members {
            for p in skeleton.neighborhood(member) {
                claim(id, p);
            }
        }
    }

    let remaining = GrayImage::from_fn(width, height, |x, y| {
        let p = Pixel::new(x, y);
        let free = skeleton.is_set(p) && owners[skeleton.index(p)].is_none();
        Luma([if free { 255 } else { 0 }])
    });
    let labels = connected_components(&remaining, Connectivity::Eight, Luma([0u8]));
    let components = collect_components(&labels);

    let mut map = SegmentMap {
        width,
        height,
        owners,
        segments: Vec::new(),
        dangling: Vec::new(),
        links: Vec::new(),
    };
    map.links = touching_vertices(&map, skeleton);

    for (index, pixels) in components.into_iter().enumerate() {
        if pixels.is_empty() {
            continue;
        }
        let label = u32::try_from(index + 1).unwrap_or(u32::MAX);
        match attach(&map, skeleton, &pixels, &labels, label) {
            Some(ends) => map.segments.push(Segment {
                label,
                pixels,
                ends,
            }),
            None => {
                let attachments = count_attached_ends(&map, skeleton, &pixels, &labels, label);
                tracing::warn!(
                    label,
                    pixels = pixels.len(),
                    attachments,
                    "discarding dangling segment",
                );
                map.dangling.push(DanglingSegment {
                    label,
                    pixel_count: pixels.len(),
                    attachments,
                });
            }
        }
    }

    tracing::debug!(
        segments = map.segments.len(),
        dangling = map.dangling.len(),
        links = map.links.len(),
        "labelled segments",
    );
    map
}

/// Pixels of each label, in raster order. Index `i` holds label `i + 1`.
fn collect_components(labels: &ImageBuffer<Luma<u32>, Vec<u32>>) -> Vec<Vec<Pixel>> {
    let count = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    let mut components = vec![Vec::new(); count];
    for (x, y, label) in labels.enumerate_pixels() {
        if let Some(slot) = (label.0[0] as usize).checked_sub(1) {
            components[slot].push(Pixel::new(x, y));
        }
    }
    components
}

/// Pairs of distinct vertices owning 8-adjacent separator pixels.
fn touching_vertices(map: &SegmentMap, skeleton: &BinaryGrid) -> Vec<[usize; 2]> {
    let pairs: BTreeSet<[usize; 2]> = map
        .separators()
        .flat_map(move |(p, a)| {
            skeleton
                .neighbors(p)
                .filter_map(move |q| map.separator_owner(q))
                .filter(move |&b| b != a)
                .map(move |b| [a.min(b), a.max(b)])
        })
        .collect();
    pairs.into_iter().collect()
}

fn label_at(labels: &ImageBuffer<Luma<u32>, Vec<u32>>, p: Pixel) -> u32 {
    labels.get_pixel(p.x, p.y).0[0]
}

/// Segment pixels with at most one neighbour in the same segment.
fn chain_ends(
    skeleton: &BinaryGrid,
    pixels: &[Pixel],
    labels: &ImageBuffer<Luma<u32>, Vec<u32>>,
    label: u32,
) -> Vec<Pixel> {
    pixels
        .iter()
        .copied()
        .filter(|&p| {
            skeleton
                .neighbors(p)
                .filter(|&q| label_at(labels, q) == label)
                .count()
                <= 1
        })
        .collect()
}

/// Vertices owning separator pixels adjacent to `p`, ascending.
fn contacts(map: &SegmentMap, skeleton: &BinaryGrid, p: Pixel) -> Vec<usize> {
    let mut found: Vec<usize> = skeleton
        .neighbors(p)
        .filter_map(|q| map.separator_owner(q))
        .collect();
    found.sort_unstable();
    found.dedup();
    found
}

fn attach(
    map: &SegmentMap,
    skeleton: &BinaryGrid,
    pixels: &[Pixel],
    labels: &ImageBuffer<Luma<u32>, Vec<u32>>,
    label: u32,
) -> Option<[Attachment; 2]> {
    let ends = chain_ends(skeleton, pixels, labels, label);
    if let [only] = ends.as_slice() {
        // A single-pixel segment bridges two separators directly.
        let found = contacts(map, skeleton, *only);
        let first = *found.first()?;
        let second = *found.get(1)?;
        return Some([
            Attachment {
                pixel: *only,
                vertex: first,
            },
            Attachment {
                pixel: *only,
                vertex: second,
            },
        ]);
    }

    let mut attached = ends.iter().filter_map(|&pixel| {
        contacts(map, skeleton, pixel)
            .first()
            .map(|&vertex| Attachment { pixel, vertex })
    });
    let first = attached.next()?;
    let second = attached.next()?;
    if ends.len() > 2 {
        tracing::debug!(label, ends = ends.len(), "segment branches; using first two ends");
    }
    Some([first, second])
}

fn count_attached_ends(
    map: &SegmentMap,
    skeleton: &BinaryGrid,
    pixels: &[Pixel],
    labels: &ImageBuffer<Luma<u32>, Vec<u32>>,
    label: u32,
) -> usize {
    chain_ends(skeleton, pixels, labels, label)
        .into_iter()
        .filter(|&p| !contacts(map, skeleton, p).is_empty())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(width: u32, y: u32, xs: std::ops::Range<u32>) -> BinaryGrid {
        BinaryGrid::from_pixels(width, y + 3, xs.map(|x| Pixel::new(x, y)))
    }

    #[test]
    fn line_between_two_endpoints_is_one_segment() {
        let skeleton = line(120, 5, 10..110);
        let vertices = [
            VertexCluster::singleton(Pixel::new(10, 5)),
            VertexCluster::singleton(Pixel::new(109, 5)),
        ];
        let map = label_segments(&skeleton, &vertices);
        assert_eq!(map.segments.len(), 1);
        assert!(map.dangling.is_empty());
        let segment = &map.segments[0];
        assert_eq!(segment.pixels.len(), 96);
        assert_eq!(segment.ends[0].vertex, 0);
        assert_eq!(segment.ends[1].vertex, 1);
        assert_eq!(segment.ends[0].pixel, Pixel::new(12, 5));
        assert_eq!(segment.ends[1].pixel, Pixel::new(107, 5));
        assert_eq!(map.separator_owner(Pixel::new(11, 5)), Some(0));
        assert_eq!(map.separator_owner(Pixel::new(108, 5)), Some(1));
        assert_eq!(map.separator_owner(Pixel::new(50, 5)), None);
    }

    #[test]
    fn middle_vertex_splits_line() {
        let skeleton = line(120, 5, 10..110);
        let vertices = [
            VertexCluster::singleton(Pixel::new(10, 5)),
            VertexCluster::singleton(Pixel::new(60, 5)),
            VertexCluster::singleton(Pixel::new(109, 5)),
        ];
        let map = label_segments(&skeleton, &vertices);
        let pairs: Vec<_> = map
            .segments
            .iter()
            .map(|s| (s.ends[0].vertex, s.ends[1].vertex))
            .collect();
        assert_eq!(pairs, vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn stub_without_second_vertex_is_dangling() {
        let skeleton = line(60, 5, 10..50);
        let vertices = [VertexCluster::singleton(Pixel::new(10, 5))];
        let map = label_segments(&skeleton, &vertices);
        assert!(map.segments.is_empty());
        assert_eq!(
            map.dangling,
            vec![DanglingSegment {
                label: 1,
                pixel_count: 38,
                attachments: 1,
            }],
        );
    }

    #[test]
    fn loop_through_one_vertex_attaches_twice() {
        // Square loop with a single vertex on its top edge.
        let mut pixels = Vec::new();
        for i in 0..20 {
            pixels.push(Pixel::new(5 + i, 5));
            pixels.push(Pixel::new(5 + i, 24));
            pixels.push(Pixel::new(5, 5 + i));
            pixels.push(Pixel::new(24, 5 + i));
        }
        let skeleton = BinaryGrid::from_pixels(30, 30, pixels);
        let vertices = [VertexCluster::singleton(Pixel::new(14, 5))];
        let map = label_segments(&skeleton, &vertices);
        assert_eq!(map.segments.len(), 1);
        let ends = map.segments[0].ends;
        assert_eq!((ends[0].vertex, ends[1].vertex), (0, 0));
    }

    #[test]
    fn vertex_free_ring_is_dangling() {
        let skeleton = BinaryGrid::from_pixels(
            9,
            9,
            (0..9_u32)
                .flat_map(|y| (0..9_u32).map(move |x| Pixel::new(x, y)))
                .filter(|p| p.x.abs_diff(4) + p.y.abs_diff(4) == 3),
        );
        let map = label_segments(&skeleton, &[]);
        assert!(map.segments.is_empty());
        assert_eq!(map.dangling.len(), 1);
        assert_eq!(map.dangling[0].attachments, 0);
    }

    /// A "T": bar along y = 10, stem down from its middle.
    fn tee() -> BinaryGrid {
        let bar = (5..65).map(|x| Pixel::new(x, 10));
        let stem = (11..40).map(|y| Pixel::new(35, y));
        BinaryGrid::from_pixels(70, 45, bar.chain(stem))
    }

    #[test]
    fn touching_vertices_are_linked() {
        let skeleton = tee();
        let candidates = crate::junction::find_candidates(&skeleton);
        let vertices = crate::dedup::singleton_clusters(&candidates);
        assert!(vertices.len() > 4, "{}", vertices.len());

        let map = label_segments(&skeleton, &vertices);
        assert!(!map.links.is_empty());
        assert!(map.links.iter().all(|&[a, b]| a < b));
        assert!(map.links.windows(2).all(|w| w[0] < w[1]));

        let mut sets = petgraph::unionfind::UnionFind::<usize>::new(vertices.len());
        for segment in &map.segments {
            sets.union(segment.ends[0].vertex, segment.ends[1].vertex);
        }
        for &[a, b] in &map.links {
            sets.union(a, b);
        }
        let root = sets.find(0);
        assert!((0..vertices.len()).all(|v| sets.find(v) == root));
    }

    #[test]
    fn every_vertex_owns_its_members() {
        let skeleton = tee();
        let candidates = crate::junction::find_candidates(&skeleton);
        let vertices = crate::dedup::singleton_clusters(&candidates);
        let map = label_segments(&skeleton, &vertices);
        for (id, vertex) in vertices.iter().enumerate() {
            for &member in &vertex.members {
                assert_eq!(map.separator_owner(member), Some(id));
            }
        }
    }

    #[test]
    fn distant_vertices_are_not_linked() {
        let skeleton = line(120, 5, 10..110);
        let vertices = [
            VertexCluster::singleton(Pixel::new(10, 5)),
            VertexCluster::singleton(Pixel::new(109, 5)),
        ];
        assert!(label_segments(&skeleton, &vertices).links.is_empty());
    }

    #[test]
    fn separators_cover_vertex_neighbourhoods() {
        let skeleton = line(40, 5, 5..35);
        let vertices = [
            VertexCluster::singleton(Pixel::new(5, 5)),
            VertexCluster::singleton(Pixel::new(34, 5)),
        ];
        let map = label_segments(&skeleton, &vertices);
        let separators: Vec<_> = map.separators().collect();
        assert_eq!(
            separators,
            vec![
                (Pixel::new(5, 5), 0),
                (Pixel::new(6, 5), 0),
                (Pixel::new(33, 5), 1),
                (Pixel::new(34, 5), 1),
            ],
        );
    }
}
