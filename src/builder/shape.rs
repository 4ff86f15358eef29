use crate::mesher::{LineId, LinesBuilder};

/// Geometry of a shape. The y axis grows downwards, so `y_top < y_bottom`.
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeKind {
    Circle {
        x: f64,
        y: f64,
        radius: f64,
    },
    Donut {
        x: f64,
        y: f64,
        outer_radius: f64,
        inner_radius: f64,
    },
    /// Axis aligned rectangle, `None` sides extend to the grid edge.
    Rectangle {
        x_left: Option<f64>,
        x_right: Option<f64>,
        y_top: Option<f64>,
        y_bottom: Option<f64>,
    },
    /// Right triangle with corners `(x_base, y_base)`, `(x_tip, y_base)` and `(x_tip, y_tip)`.
    Triangle {
        x_base: f64,
        x_tip: f64,
        y_base: f64,
        y_tip: f64,
    },
    /// Etched trace: a base from `x_left` to `x_right` at `y_base` narrowing
    /// to `x_left_taper`..`x_right_taper` at `y_taper`.
    Trapezoid {
        x_left: f64,
        x_right: f64,
        x_left_taper: f64,
        x_right_taper: f64,
        y_base: f64,
        y_taper: f64,
    },
}

/// A shape painted into the grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub kind: ShapeKind,
    /// Forces every x region the shape spans to at least this many cells.
    pub min_x_gridlines: Option<usize>,
    /// Forces every y region the shape spans to at least this many cells.
    pub min_y_gridlines: Option<usize>,
}

impl Shape {
    #[inline]
    pub fn new(kind: ShapeKind) -> Self {
        Self { kind, min_x_gridlines: None, min_y_gridlines: None }
    }

    #[inline]
    pub fn circle(x: f64, y: f64, radius: f64) -> Self {
        Self::new(ShapeKind::Circle { x, y, radius })
    }

    #[inline]
    pub fn donut(x: f64, y: f64, outer_radius: f64, inner_radius: f64) -> Self {
        Self::new(ShapeKind::Donut { x, y, outer_radius, inner_radius })
    }

    /// A rectangle bounded on every side.
    #[inline]
    pub fn rectangle(x_left: f64, x_right: f64, y_top: f64, y_bottom: f64) -> Self {
        Self::new(ShapeKind::Rectangle {
            x_left: Some(x_left),
            x_right: Some(x_right),
            y_top: Some(y_top),
            y_bottom: Some(y_bottom),
        })
    }

    /// A rectangle spanning the full grid width.
    #[inline]
    pub fn horizontal_band(y_top: f64, y_bottom: f64) -> Self {
        Self::new(ShapeKind::Rectangle {
            x_left: None,
            x_right: None,
            y_top: Some(y_top),
            y_bottom: Some(y_bottom),
        })
    }

    #[inline]
    pub fn triangle(x_base: f64, x_tip: f64, y_base: f64, y_tip: f64) -> Self {
        Self::new(ShapeKind::Triangle { x_base, x_tip, y_base, y_tip })
    }

    #[inline]
    pub fn trapezoid(
        x_left: f64,
        x_right: f64,
        x_left_taper: f64,
        x_right_taper: f64,
        y_base: f64,
        y_taper: f64,
    ) -> Self {
        Self::new(ShapeKind::Trapezoid {
            x_left,
            x_right,
            x_left_taper,
            x_right_taper,
            y_base,
            y_taper,
        })
    }

    #[inline]
    pub fn with_min_gridlines(mut self, x: Option<usize>, y: Option<usize>) -> Self {
        self.min_x_gridlines = x;
        self.min_y_gridlines = y;
        self
    }
}

/// Which corner of the bounding box the triangle's hypotenuse faces away from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Slope {
    BottomLeft,
    BottomRight,
    TopLeft,
    TopRight,
}

/// Occupancy test in coordinates normalised to the shape's bounding box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Sdf {
    Circle,
    Donut { inner_radius_squared: f64 },
    Slope(Slope),
}

impl Sdf {
    const RADIUS_SQUARED: f64 = 0.25;

    /// 1 inside the shape, 0 outside, for `(y, x)` in `[0, 1]`.
    pub(crate) fn sample(&self, y: f64, x: f64) -> f64 {
        let inside = match *self {
            Self::Circle => (y-0.5).powi(2) + (x-0.5).powi(2) < Self::RADIUS_SQUARED,
            Self::Donut { inner_radius_squared } => {
                let r2 = (y-0.5).powi(2) + (x-0.5).powi(2);
                r2 > inner_radius_squared && r2 < Self::RADIUS_SQUARED
            },
            Self::Slope(Slope::BottomLeft) => y >= x,
            Self::Slope(Slope::BottomRight) => y >= 1.0-x,
            Self::Slope(Slope::TopLeft) => y <= 1.0-x,
            Self::Slope(Slope::TopRight) => y <= x,
        };
        if inside { 1.0 } else { 0.0 }
    }

    /// Mean of four samples at `(y +/- dy, x +/- dx)`.
    pub(crate) fn multisample(&self, y: f64, x: f64, dy: f64, dx: f64) -> f64 {
        let total = self.sample(y-dy, x-dx)
            + self.sample(y-dy, x+dx)
            + self.sample(y+dy, x-dx)
            + self.sample(y+dy, x+dx);
        total/4.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Fill {
    /// Every covered element is fully inside.
    Constant,
    Multisample(Sdf),
}

/// A shape reduced to its bounding lines and fill rule.
#[derive(Copy, Clone, Debug)]
pub(crate) struct ShapeSdf {
    pub rx_left: Option<LineId>,
    pub rx_right: Option<LineId>,
    pub ry_top: Option<LineId>,
    pub ry_bottom: Option<LineId>,
    pub fill: Fill,
}

impl ShapeSdf {
    fn bounded(
        x_lines: &mut LinesBuilder,
        y_lines: &mut LinesBuilder,
        (x_left, x_right, y_top, y_bottom): (f64, f64, f64, f64),
        fill: Fill,
    ) -> Self {
        Self {
            rx_left: Some(x_lines.push(x_left)),
            rx_right: Some(x_lines.push(x_right)),
            ry_top: Some(y_lines.push(y_top)),
            ry_bottom: Some(y_lines.push(y_bottom)),
            fill,
        }
    }
}

/// Pushes the lines of a shape and returns the fills that paint it.
pub(crate) fn create_shape_sdfs(
    kind: &ShapeKind,
    x_lines: &mut LinesBuilder,
    y_lines: &mut LinesBuilder,
) -> Vec<ShapeSdf> {
    match *kind {
        ShapeKind::Circle { x, y, radius } => {
            let bounds = (x-radius, x+radius, y-radius, y+radius);
            vec![ShapeSdf::bounded(x_lines, y_lines, bounds, Fill::Multisample(Sdf::Circle))]
        },
        ShapeKind::Donut { x, y, outer_radius, inner_radius } => {
            let bounds = (x-outer_radius, x+outer_radius, y-outer_radius, y+outer_radius);
            let inner_radius_norm = inner_radius/outer_radius;
            let sdf = Sdf::Donut { inner_radius_squared: (inner_radius_norm*0.5).powi(2) };
            vec![ShapeSdf::bounded(x_lines, y_lines, bounds, Fill::Multisample(sdf))]
        },
        ShapeKind::Rectangle { x_left, x_right, y_top, y_bottom } => {
            vec![ShapeSdf {
                rx_left: x_left.map(|x| x_lines.push(x)),
                rx_right: x_right.map(|x| x_lines.push(x)),
                ry_top: y_top.map(|y| y_lines.push(y)),
                ry_bottom: y_bottom.map(|y| y_lines.push(y)),
                fill: Fill::Constant,
            }]
        },
        ShapeKind::Triangle { x_base, x_tip, y_base, y_tip } => {
            let bounds = (x_base.min(x_tip), x_base.max(x_tip), y_base.min(y_tip), y_base.max(y_tip));
            let slope = match (y_tip > y_base, x_base > x_tip) {
                (true, true) => Slope::TopLeft,
                (true, false) => Slope::TopRight,
                (false, true) => Slope::BottomLeft,
                (false, false) => Slope::BottomRight,
            };
            vec![ShapeSdf::bounded(x_lines, y_lines, bounds, Fill::Multisample(Sdf::Slope(slope)))]
        },
        ShapeKind::Trapezoid { x_left, x_right, x_left_taper, x_right_taper, y_base, y_taper } => {
            let left = ShapeKind::Triangle { x_base: x_left, x_tip: x_left_taper, y_base, y_tip: y_taper };
            let body = ShapeKind::Rectangle {
                x_left: Some(x_left_taper),
                x_right: Some(x_right_taper),
                y_top: Some(y_base.min(y_taper)),
                y_bottom: Some(y_base.max(y_taper)),
            };
            let right = ShapeKind::Triangle { x_base: x_right, x_tip: x_right_taper, y_base, y_tip: y_taper };
            [left, body, right].iter()
                .flat_map(|kind| create_shape_sdfs(kind, x_lines, y_lines))
                .collect()
        },
    }
}
