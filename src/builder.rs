//! Builds a meshed and painted [`Grid`] from tagged geometric regions.

mod shape;

pub use shape::{Shape, ShapeKind};

use std::time::Instant;

use log::debug;

use crate::{Error, Grid, IndexBeta};
use crate::mesher::{
    generate_region_mesh_segments, LineId, LinesBuilder, RegionSpecification, RegionToGridMap,
};
use shape::{create_shape_sdfs, Fill, ShapeSdf};

/// Lines closer than this fraction of the minimum resolution are merged.
const MERGE_FRACTION: f64 = 0.99;

/// Mesh settings for [`GridBuilder`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GridBuilderConfig {
    /// Features closer than this are merged into one grid line.
    pub minimum_grid_resolution: f64,
    /// Padding distance as a multiple of the largest extent.
    pub padding_size_multiplier: f64,
    /// Maximum growth between neighbouring cells along x, as `r-1`.
    pub max_x_ratio: f64,
    pub min_x_subdivisions: usize,
    /// Maximum growth between neighbouring cells along y, as `r-1`.
    pub max_y_ratio: f64,
    pub min_y_subdivisions: usize,
}

impl Default for GridBuilderConfig {
    fn default() -> Self {
        Self {
            minimum_grid_resolution: 1e-3,
            padding_size_multiplier: 1.0,
            max_x_ratio: 0.30,
            min_x_subdivisions: 10,
            max_y_ratio: 0.35,
            min_y_subdivisions: 5,
        }
    }
}

/// Which sides get empty space beyond the outermost feature.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GridBuilderPadding {
    pub x_left: bool,
    pub x_right: bool,
    pub y_top: bool,
    pub y_bottom: bool,
}

impl GridBuilderPadding {
    /// Padding on every side.
    #[inline]
    pub fn all() -> Self {
        Self { x_left: true, x_right: true, y_top: true, y_bottom: true }
    }
}

/// A group of shapes painted with the same value.
#[derive(Clone, Debug, PartialEq)]
pub enum Region {
    /// Nodes forced to `v_table[voltage_index]`.
    Voltage { voltage_index: u16, shapes: Vec<Shape> },
    /// Cells with relative permittivity `ek_table[epsilon_index]`.
    Dielectric { epsilon_index: u16, shapes: Vec<Shape> },
    /// Shapes that only contribute grid lines.
    Empty { shapes: Vec<Shape> },
}

impl Region {
    #[inline]
    pub fn shapes(&self) -> &[Shape] {
        match self {
            Self::Voltage { shapes, .. } => shapes,
            Self::Dielectric { shapes, .. } => shapes,
            Self::Empty { shapes } => shapes,
        }
    }

    #[inline]
    fn target(&self) -> Option<PaintTarget> {
        match *self {
            Self::Voltage { voltage_index, .. } => Some(PaintTarget::Nodes(voltage_index)),
            Self::Dielectric { epsilon_index, .. } => Some(PaintTarget::Cells(epsilon_index)),
            Self::Empty { .. } => None,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum PaintTarget {
    Nodes(u16),
    Cells(u16),
}

/// A region that forces at least `count` cells between two lines.
#[derive(Copy, Clone, Debug)]
struct MinGridLines {
    lower: LineId,
    upper: LineId,
    count: usize,
}

/// A meshed grid together with the mapping from shape coordinates to grid lines.
pub struct GridBuilder {
    config: GridBuilderConfig,
    grid: Grid,
    x_lines: LinesBuilder,
    y_lines: LinesBuilder,
    x_map: RegionToGridMap,
    y_map: RegionToGridMap,
}

impl GridBuilder {
    /// Meshes the regions and paints them onto a new grid.
    ///
    /// Regions are painted in order, so later regions overwrite earlier ones
    /// where they overlap. The grid is not baked.
    pub fn new(
        regions: &[Region],
        config: GridBuilderConfig,
        padding: GridBuilderPadding,
    ) -> Result<Self, Error> {
        let start = Instant::now();
        let mut x_lines = LinesBuilder::new();
        let mut y_lines = LinesBuilder::new();
        let mut x_min_grid_lines = Vec::new();
        let mut y_min_grid_lines = Vec::new();

        let mut painters: Vec<(Option<PaintTarget>, Vec<ShapeSdf>)> = Vec::with_capacity(regions.len());
        for region in regions.iter() {
            let mut sdfs = Vec::new();
            for shape in region.shapes().iter() {
                let shape_sdfs = create_shape_sdfs(&shape.kind, &mut x_lines, &mut y_lines);
                for sdf in shape_sdfs.iter() {
                    if let (Some(count), Some(lower), Some(upper)) = (shape.min_x_gridlines, sdf.rx_left, sdf.rx_right) {
                        x_min_grid_lines.push(MinGridLines { lower, upper, count });
                    }
                    if let (Some(count), Some(lower), Some(upper)) = (shape.min_y_gridlines, sdf.ry_top, sdf.ry_bottom) {
                        y_min_grid_lines.push(MinGridLines { lower, upper, count });
                    }
                }
                sdfs.extend(shape_sdfs);
            }
            painters.push((region.target(), sdfs));
        }

        add_padding(&mut x_lines, &mut y_lines, &config, &padding);

        // sizes are taken before merging so the rescale ignores collapsed gaps
        let merge_size = MERGE_FRACTION*config.minimum_grid_resolution;
        let mut region_sizes = x_lines.to_regions()?;
        region_sizes.extend(y_lines.to_regions()?);
        region_sizes.retain(|&size| size > merge_size);
        x_lines.merge(merge_size)?;
        y_lines.merge(merge_size)?;

        let scale = log_median(&mut region_sizes).map_or(1.0, |median| 1.0/median);
        x_lines.apply_scale(scale);
        y_lines.apply_scale(scale);

        let x_map = create_axis_map(
            &mut x_lines, &x_min_grid_lines, config.min_x_subdivisions, config.max_x_ratio,
        )?;
        let y_map = create_axis_map(
            &mut y_lines, &y_min_grid_lines, config.min_y_subdivisions, config.max_y_ratio,
        )?;
        debug!(
            "Created mesh ({}x{} cells from {}x{} regions) in {:.3e} s",
            y_map.total_grid_segments(), x_map.total_grid_segments(),
            y_map.total_region_segments(), x_map.total_region_segments(),
            start.elapsed().as_secs_f64(),
        );

        let paint_start = Instant::now();
        let mut grid = Grid::new(y_map.total_grid_segments(), x_map.total_grid_segments());
        grid.set_dx(x_map.grid_deltas())?;
        grid.set_dy(y_map.grid_deltas())?;
        for (target, sdfs) in painters.iter() {
            let target = match target {
                Some(target) => *target,
                None => continue,
            };
            for sdf in sdfs.iter() {
                paint_shape(&mut grid, &x_map, &y_map, sdf, target)?;
            }
        }
        debug!("Painted regions in {:.3e} s", paint_start.elapsed().as_secs_f64());

        Ok(Self { config, grid, x_lines, y_lines, x_map, y_map })
    }

    #[inline]
    pub fn config(&self) -> &GridBuilderConfig {
        &self.config
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[inline]
    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    #[inline]
    pub fn into_grid(self) -> Grid {
        self.grid
    }

    /// Factor from caller units to the internal grid units.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.x_lines.scale()
    }

    /// Region lines along x, in internal units.
    #[inline]
    pub fn x_region_lines(&self) -> &LinesBuilder {
        &self.x_lines
    }

    /// Region lines along y, in internal units.
    #[inline]
    pub fn y_region_lines(&self) -> &LinesBuilder {
        &self.y_lines
    }

    #[inline]
    pub fn x_region_to_grid_map(&self) -> &RegionToGridMap {
        &self.x_map
    }

    #[inline]
    pub fn y_region_to_grid_map(&self) -> &RegionToGridMap {
        &self.y_map
    }

    /// Grid line positions along x in caller units.
    pub fn x_grid_lines(&self) -> Vec<f64> {
        to_caller_units(&self.x_lines, &self.x_map)
    }

    /// Grid line positions along y in caller units.
    pub fn y_grid_lines(&self) -> Vec<f64> {
        to_caller_units(&self.y_lines, &self.y_map)
    }
}

fn to_caller_units(lines: &LinesBuilder, map: &RegionToGridMap) -> Vec<f64> {
    let origin = lines.lines().first().copied().unwrap_or(0.0);
    let scale = lines.scale();
    map.grid_lines().iter().map(|line| (origin+line)/scale).collect()
}

fn add_padding(
    x_lines: &mut LinesBuilder,
    y_lines: &mut LinesBuilder,
    config: &GridBuilderConfig,
    padding: &GridBuilderPadding,
) {
    let (x_min, x_max, y_min, y_max) = match (x_lines.min(), x_lines.max(), y_lines.min(), y_lines.max()) {
        (Some(x_min), Some(x_max), Some(y_min), Some(y_max)) => (x_min, x_max, y_min, y_max),
        _ => return,
    };
    let padding_size = (x_max-x_min).max(y_max-y_min)*config.padding_size_multiplier;
    if padding.x_left {
        x_lines.push(x_min-padding_size);
    }
    if padding.x_right {
        x_lines.push(x_max+padding_size);
    }
    if padding.y_top {
        y_lines.push(y_min-padding_size);
    }
    if padding.y_bottom {
        y_lines.push(y_max+padding_size);
    }
}

/// `10^median(log10(sizes))`, averaging the middle pair for an even count.
fn log_median(sizes: &mut [f64]) -> Option<f64> {
    if sizes.is_empty() {
        return None;
    }
    sizes.sort_by(f64::total_cmp);
    let n = sizes.len();
    let log_median = if n % 2 == 1 {
        sizes[n/2].log10()
    } else {
        (sizes[n/2-1].log10() + sizes[n/2].log10())/2.0
    };
    Some(10f64.powf(log_median))
}

fn create_axis_map(
    lines: &mut LinesBuilder,
    min_grid_lines: &[MinGridLines],
    min_subdivisions: usize,
    max_ratio: f64,
) -> Result<RegionToGridMap, Error> {
    let mut regions: Vec<RegionSpecification> = lines.to_regions()?
        .into_iter()
        .map(RegionSpecification::new)
        .collect();
    for entry in min_grid_lines.iter() {
        let lower = lines.get_index(entry.lower);
        let upper = lines.get_index(entry.upper);
        for region in regions[lower.min(upper)..lower.max(upper)].iter_mut() {
            let count = region.total_grid_lines.map_or(entry.count, |n| n.max(entry.count));
            region.total_grid_lines = Some(count);
        }
    }
    let segments = generate_region_mesh_segments(&regions, min_subdivisions, max_ratio);
    RegionToGridMap::new(lines, segments)
}

/// Grid index range covered along one axis, with the shape's bounds in grid units.
struct AxisSpan {
    start: usize,
    end: usize,
    bounds: Option<(f64, f64)>,
}

impl AxisSpan {
    fn new(
        lower: Option<LineId>,
        upper: Option<LineId>,
        map: &RegionToGridMap,
        is_node: bool,
        limit: usize,
    ) -> Self {
        let g_lower = lower.map(|id| map.id_to_grid_index(id));
        let g_upper = upper.map(|id| map.id_to_grid_index(id));
        let start = g_lower.unwrap_or(0).min(limit);
        let mut end = g_upper.unwrap_or(limit);
        // nodes on the far boundary belong to the shape
        if let Some(g_upper) = g_upper {
            if is_node {
                end = g_upper+1;
            }
        }
        let end = end.min(limit).max(start);
        let bounds = match (g_lower, g_upper) {
            (Some(a), Some(b)) => Some((map.grid_lines()[a], map.grid_lines()[b])),
            _ => None,
        };
        Self { start, end, bounds }
    }
}

/// Position of a grid element and the width it samples over.
fn sample_position(map: &RegionToGridMap, index: usize, is_node: bool) -> (f64, f64) {
    let lines = map.grid_lines();
    let deltas = map.grid_deltas();
    if !is_node {
        return (lines[index] + deltas[index]/2.0, deltas[index]);
    }
    let before = index.checked_sub(1).and_then(|i| deltas.get(i));
    let after = deltas.get(index);
    let width = match (before, after) {
        (Some(a), Some(b)) => (a+b)/2.0,
        (Some(a), None) => *a,
        (None, Some(b)) => *b,
        (None, None) => 0.0,
    };
    (lines[index], width)
}

fn paint_shape(
    grid: &mut Grid,
    x_map: &RegionToGridMap,
    y_map: &RegionToGridMap,
    sdf: &ShapeSdf,
    target: PaintTarget,
) -> Result<(), Error> {
    let (ny, nx) = grid.size();
    let (index, is_node) = match target {
        PaintTarget::Nodes(index) => (index, true),
        PaintTarget::Cells(index) => (index, false),
    };
    let (x_limit, y_limit) = if is_node { (nx+1, ny+1) } else { (nx, ny) };
    let x_span = AxisSpan::new(sdf.rx_left, sdf.rx_right, x_map, is_node, x_limit);
    let y_span = AxisSpan::new(sdf.ry_top, sdf.ry_bottom, y_map, is_node, y_limit);

    let start = [y_span.start, x_span.start];
    let end = [y_span.end, x_span.end];
    let mut view = if is_node {
        grid.v_index_beta_region(start, end)?
    } else {
        grid.ek_index_beta_region(start, end)?
    };

    let shape_sdf = match sdf.fill {
        Fill::Constant => {
            view.fill(IndexBeta::new(index, 1.0));
            return Ok(());
        },
        Fill::Multisample(shape_sdf) => shape_sdf,
    };
    let ((x0, x1), (y0, y1)) = match (x_span.bounds, y_span.bounds) {
        (Some(x_bounds), Some(y_bounds)) => (x_bounds, y_bounds),
        _ => return Ok(()),
    };
    let (width, height) = (x1-x0, y1-y0);
    if width <= 0.0 || height <= 0.0 {
        return Ok(());
    }

    for ((iy, ix), value) in view.indexed_iter_mut() {
        let (y, dy) = sample_position(y_map, y_span.start+iy, is_node);
        let (x, dx) = sample_position(x_map, x_span.start+ix, is_node);
        let beta = shape_sdf.multisample(
            (y-y0)/height, (x-x0)/width,
            dy/(4.0*height), dx/(4.0*width),
        );
        // elements outside the shape keep what earlier regions painted
        if beta > 0.0 {
            *value = IndexBeta::new(index, beta as f32);
        }
    }
    Ok(())
}
