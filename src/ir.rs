// Intermediate representation: a backend-independent description of a chart
//
// Coordinates in the IR are already in drawing space. Log axes hold log10
// values and time axes hold epoch seconds.

use plotters::style::RGBColor;

/// A complete chart: optional title over a grid of panels
#[derive(Debug, Clone)]
pub struct Figure {
    pub title: Option<String>,
    pub rows: usize,
    pub cols: usize,
    /// Row-major, `rows * cols` entries
    pub panels: Vec<Panel>,
}

#[derive(Debug, Clone)]
pub enum Panel {
    Cartesian(CartesianPanel),
    Scatter3d(Scatter3dPanel),
}

// =============================================================================
// Axes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisScale {
    Linear,
    Log,
    /// Epoch seconds shown as dates
    Time,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub title: Option<String>,
    pub scale: AxisScale,
    /// Fitted range in drawing space
    pub domain: (f64, f64),
}

impl Axis {
    pub fn new(title: Option<String>, scale: AxisScale, domain: (f64, f64)) -> Self {
        Self { title, scale, domain }
    }
}

// =============================================================================
// 2D panels
// =============================================================================

#[derive(Debug, Clone)]
pub struct CartesianPanel {
    pub x: Axis,
    pub y: Axis,
    /// Right-hand axis; traces in `secondary` are measured against it
    pub y2: Option<Axis>,
    pub traces: Vec<Trace>,
    pub secondary: Vec<Trace>,
    pub show_legend: bool,
}

impl CartesianPanel {
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty() && self.secondary.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Trace {
    /// Legend entry
    pub name: String,
    pub color: RGBColor,
    pub geometry: Geometry,
}

#[derive(Debug, Clone)]
pub enum Geometry {
    Line(Vec<(f64, f64)>),
    Markers { points: Vec<(f64, f64)>, size: f64 },
    Bars(Vec<Bar>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
}

// =============================================================================
// 3D panels
// =============================================================================

#[derive(Debug, Clone)]
pub struct Scatter3dPanel {
    pub x: Axis,
    pub y: Axis,
    pub z: Axis,
    pub traces: Vec<Trace3d>,
    pub marker_size: f64,
}

#[derive(Debug, Clone)]
pub struct Trace3d {
    pub name: String,
    pub color: RGBColor,
    pub points: Vec<(f64, f64, f64)>,
}
