use crate::Error;
use crate::mesher::{LineId, LinesBuilder};
use crate::mesher::segment::{
    ClosedGeometricMeshSegment, LinearMeshSegment, MeshSegment, OpenGeometricMeshSegment,
};

/// Regions smaller than this are meshed with a linear segment.
const DEGENERATE_REGION_SIZE: f64 = 1e-12;
/// Slack allowed on the growth ratio bound of closed segments.
const RATIO_TOLERANCE: f64 = 1e-9;

/// Describes one region along an axis.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RegionSpecification {
    /// Physical length of the region.
    pub size: f64,
    /// Forces a linear subdivision into exactly this many cells.
    pub total_grid_lines: Option<usize>,
}

impl RegionSpecification {
    #[inline]
    pub fn new(size: f64) -> Self {
        Self { size, total_grid_lines: None }
    }
}

/// Meshes consecutive regions so cell sizes grade smoothly across region boundaries.
///
/// Each region seeds its boundary cells from the smaller of its own and its
/// neighbour's `size/min_region_subdivisions`:
/// - no neighbours, or an explicit `total_grid_lines`: linear segment
/// - one neighbour: open geometric segment growing away from that neighbour
/// - two neighbours: closed geometric segment with the smoothest grading
///
/// Growth ratios target `1+max_ratio`. The subdivision count never drops
/// below `min_region_subdivisions`, even when that forces a different ratio.
pub fn generate_region_mesh_segments(
    regions: &[RegionSpecification],
    min_region_subdivisions: usize,
    max_ratio: f64,
) -> Vec<MeshSegment> {
    let min_region_subdivisions = min_region_subdivisions.max(1);
    let r_max = 1.0 + max_ratio;
    let a_min: Vec<f64> = regions.iter()
        .map(|region| region.size / (min_region_subdivisions as f64))
        .collect();

    let total_regions = regions.len();
    let mut segments = Vec::with_capacity(total_regions);
    for (i, region) in regions.iter().enumerate() {
        let a_mid = a_min[i];
        let a_left = (i > 0).then(|| a_min[i-1].min(a_mid));
        let a_right = (i+1 < total_regions).then(|| a_min[i+1].min(a_mid));
        let size = region.size;

        if region.total_grid_lines.is_some() || size <= DEGENERATE_REGION_SIZE {
            let n = region.total_grid_lines.unwrap_or(min_region_subdivisions).max(1);
            segments.push(MeshSegment::Linear(LinearMeshSegment::new(size / (n as f64), n)));
            continue;
        }

        let segment = match (a_left, a_right) {
            (None, None) => {
                let n = min_region_subdivisions;
                MeshSegment::Linear(LinearMeshSegment::new(size / (n as f64), n))
            },
            (None, Some(a_right)) => {
                let mut segment = OpenGeometricMeshSegment::search_best_fit(
                    size, a_right, r_max, min_region_subdivisions,
                );
                segment.is_reversed = true;
                MeshSegment::OpenGeometric(segment)
            },
            (Some(a_left), None) => {
                let segment = OpenGeometricMeshSegment::search_best_fit(
                    size, a_left, r_max, min_region_subdivisions,
                );
                MeshSegment::OpenGeometric(segment)
            },
            (Some(a_left), Some(a_right)) => {
                // upper bound assumes a symmetric grading from the finer seed
                let n_half = OpenGeometricMeshSegment::calculate_n(size/2.0, r_max, a_left.min(a_right));
                let n_upper = min_region_subdivisions.max((2.0*n_half).ceil() as usize);
                let n_lower = min_region_subdivisions;
                let mut segment = ClosedGeometricMeshSegment::search_lowest_maximum_ratio(
                    size, a_left, a_right, n_lower, n_upper,
                );
                // an uneven split can overshoot the bound, so add cells until it holds
                let mut n = segment.left.n + segment.right.n;
                let n_limit = 2*n_upper + 2;
                while segment.max_ratio() > r_max + RATIO_TOLERANCE && n < n_limit {
                    n += 1;
                    segment = ClosedGeometricMeshSegment::search_lowest_maximum_ratio(
                        size, a_left, a_right, n, n,
                    );
                }
                MeshSegment::ClosedGeometric(segment)
            },
        };
        segments.push(segment);
    }
    segments
}

/// Maps region lines along one axis onto the lines of the generated grid.
///
/// Region line `i` (a boundary between regions) sits at grid line
/// `region_to_grid_index[i]`.
#[derive(Clone, Debug)]
pub struct RegionToGridMap {
    region_segments: Vec<MeshSegment>,
    region_lines: Vec<f64>,
    grid_deltas: Vec<f64>,
    grid_lines: Vec<f64>,
    region_to_grid_index: Vec<usize>,
    id_to_region_index: Vec<usize>,
}

impl RegionToGridMap {
    /// Builds the map from sorted region lines and one segment per region.
    pub fn new(
        region_lines_builder: &LinesBuilder,
        region_segments: Vec<MeshSegment>,
    ) -> Result<Self, Error> {
        if !region_lines_builder.is_sorted() {
            return Err(Error::UnsortedLines);
        }
        let total_lines = region_lines_builder.len();
        if total_lines < 2 || total_lines-1 != region_segments.len() {
            return Err(Error::SegmentCountMismatch {
                total_lines,
                total_segments: region_segments.len(),
            });
        }

        let total_regions = region_segments.len();
        let mut region_lines = Vec::with_capacity(total_regions+1);
        let mut region_to_grid_index = Vec::with_capacity(total_regions+1);
        let mut grid_deltas = Vec::new();
        let mut region_line = 0.0;
        for segment in region_segments.iter() {
            region_lines.push(region_line);
            region_to_grid_index.push(grid_deltas.len());
            region_line += segment.size();
            grid_deltas.extend(segment.generate_deltas());
        }
        region_lines.push(region_line);
        region_to_grid_index.push(grid_deltas.len());

        let mut grid_lines = Vec::with_capacity(grid_deltas.len()+1);
        let mut grid_line = 0.0;
        grid_lines.push(grid_line);
        for delta in grid_deltas.iter() {
            grid_line += delta;
            grid_lines.push(grid_line);
        }

        // ids are only meaningful through the builder they came from
        let id_to_region_index = region_lines_builder.id_indices().to_vec();

        Ok(Self {
            region_segments,
            region_lines,
            grid_deltas,
            grid_lines,
            region_to_grid_index,
            id_to_region_index,
        })
    }

    /// Grid line index of the region line referred to by `id`.
    #[inline]
    pub fn id_to_grid_index(&self, id: LineId) -> usize {
        self.region_to_grid_index[self.id_to_region_index(id)]
    }

    #[inline]
    pub fn id_to_region_index(&self, id: LineId) -> usize {
        self.id_to_region_index[id.raw()]
    }

    #[inline]
    pub fn region_to_grid_index(&self, region_index: usize) -> usize {
        self.region_to_grid_index[region_index]
    }

    /// Region index that contains the grid line, or the last region line.
    pub fn grid_to_region_index(&self, grid_index: usize) -> usize {
        match self.region_to_grid_index.binary_search(&grid_index) {
            Ok(index) => index,
            Err(index) => index.saturating_sub(1),
        }
    }

    #[inline]
    pub fn region_segments(&self) -> &[MeshSegment] {
        &self.region_segments
    }

    /// Region boundaries measured from the first region line.
    #[inline]
    pub fn region_lines(&self) -> &[f64] {
        &self.region_lines
    }

    /// Cell sizes of the generated grid.
    #[inline]
    pub fn grid_deltas(&self) -> &[f64] {
        &self.grid_deltas
    }

    /// Grid line positions measured from the first grid line.
    #[inline]
    pub fn grid_lines(&self) -> &[f64] {
        &self.grid_lines
    }

    #[inline]
    pub fn total_grid_segments(&self) -> usize {
        self.grid_deltas.len()
    }

    #[inline]
    pub fn total_grid_lines(&self) -> usize {
        self.grid_lines.len()
    }

    #[inline]
    pub fn total_region_segments(&self) -> usize {
        self.region_segments.len()
    }

    #[inline]
    pub fn total_region_lines(&self) -> usize {
        self.region_lines.len()
    }
}
