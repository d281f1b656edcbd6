use geo_types::{Coord, LineString, MultiPoint, Point as GeoPoint, Polygon};
use image::{GrayImage, Luma};
use imageproc::{
    contours::{BorderType, Contour},
    point::Point,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    error::{MaskError, Result},
    region::Region,
    traits::MaskTransform,
};

/// Binarization cut on the 8-bit scale (strictly above 128).
const BINARY_CUT: f32 = 128.0 / 255.0;

/// Fractions of the hull perimeter tried as simplification tolerance.
const EPSILON_FRACTIONS: [f64; 6] = [0.01, 0.005, 0.01, 0.02, 0.03, 0.05];

const HUBER_C: f64 = 1.345;
const FIT_ITERATIONS: usize = 10;
const PARALLEL_EPS: f64 = 1e-10;

/// A fitted line: a point on it and a unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Line {
    x0: f64,
    y0: f64,
    vx: f64,
    vy: f64,
}

impl Line {
    fn intersect(&self, other: &Line) -> Option<(f64, f64)> {
        let d = self.vx * other.vy - self.vy * other.vx;
        if d.abs() < PARALLEL_EPS {
            return None;
        }
        let t = ((other.x0 - self.x0) * other.vy - (other.y0 - self.y0) * other.vx) / d;
        Some((self.x0 + t * self.vx, self.y0 + t * self.vy))
    }
}

/// Robust total least squares line fit.
///
/// Each round fits the principal axis of the weighted point cloud, then
/// reweights points by their distance to it with Huber weights.
fn fit_line(points: &[Point<i32>]) -> Line {
    let mut weights = vec![1.0_f64; points.len()];
    let mut line = Line {
        x0: 0.0,
        y0: 0.0,
        vx: 1.0,
        vy: 0.0,
    };

    for _ in 0..FIT_ITERATIONS {
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            break;
        }
        let (mut cx, mut cy) = (0.0, 0.0);
        for (p, w) in points.iter().zip(&weights) {
            cx += w * f64::from(p.x);
            cy += w * f64::from(p.y);
        }
        cx /= total;
        cy /= total;

        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for (p, w) in points.iter().zip(&weights) {
            let dx = f64::from(p.x) - cx;
            let dy = f64::from(p.y) - cy;
            sxx += w * dx * dx;
            syy += w * dy * dy;
            sxy += w * dx * dy;
        }
        let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
        let next = Line {
            x0: cx,
            y0: cy,
            vx: theta.cos(),
            vy: theta.sin(),
        };
        let converged = (next.vx * line.vy - next.vy * line.vx).abs() < 1e-9
            && (next.x0 - line.x0).abs() < 1e-9
            && (next.y0 - line.y0).abs() < 1e-9;
        line = next;
        if converged {
            break;
        }

        for (p, w) in points.iter().zip(weights.iter_mut()) {
            let r = ((f64::from(p.x) - cx) * -line.vy + (f64::from(p.y) - cy) * line.vx).abs();
            *w = if r <= HUBER_C { 1.0 } else { HUBER_C / r };
        }
    }
    line
}

fn to_coord(p: &Point<i32>) -> Coord<f64> {
    Coord {
        x: f64::from(p.x),
        y: f64::from(p.y),
    }
}

fn contour_area(contour: &Contour<i32>) -> f64 {
    use geo::Area;

    let ring: LineString<f64> = contour.points.iter().map(to_coord).collect();
    Polygon::new(ring, vec![]).unsigned_area()
}

/// Ring vertices without the closing duplicate and without repeats.
fn ring_vertices(ring: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut vertices: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for c in ring.coords() {
        if vertices.last() != Some(c) {
            vertices.push(*c);
        }
    }
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }
    vertices
}

/// Four vertices approximating the hull.
fn quadrilateral(hull: &Polygon<f64>) -> Vec<Coord<f64>> {
    use geo::{EuclideanLength, Simplify};

    let vertices = ring_vertices(hull.exterior());
    if vertices.len() == 4 {
        return vertices;
    }
    let perimeter = hull.exterior().euclidean_length();
    for fraction in EPSILON_FRACTIONS {
        let simplified = hull.simplify(&(fraction * perimeter));
        let candidate = ring_vertices(simplified.exterior());
        if candidate.len() == 4 {
            tracing::trace!(fraction, "hull simplified to a quadrilateral");
            return candidate;
        }
    }

    tracing::debug!(
        vertices = vertices.len(),
        "no 4-vertex simplification, using minimum area rectangle"
    );
    let points: Vec<Point<i32>> = vertices
        .iter()
        .map(|c| Point::new(c.x.round() as i32, c.y.round() as i32))
        .collect();
    imageproc::geometry::min_area_rect(&points)
        .iter()
        .map(to_coord)
        .collect()
}

/// Sort vertices by polar angle around their mean.
fn sort_by_angle(mut vertices: Vec<Coord<f64>>) -> Vec<Coord<f64>> {
    let n = vertices.len() as f64;
    let cx = vertices.iter().map(|c| c.x).sum::<f64>() / n;
    let cy = vertices.iter().map(|c| c.y).sum::<f64>() / n;
    vertices.sort_by(|a, b| {
        let ta = (a.y - cy).atan2(a.x - cx);
        let tb = (b.y - cy).atan2(b.x - cx);
        ta.total_cmp(&tb)
    });
    vertices
}

fn distance(p: &Point<i32>, target: Coord<f64>) -> f64 {
    let c = to_coord(p);
    (c.x - target.x).hypot(c.y - target.y)
}

fn closest_index(points: &[Point<i32>], target: Coord<f64>) -> usize {
    points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| distance(a, target).total_cmp(&distance(b, target)))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Split a closed contour into four arcs between the points nearest to the
/// given vertices. The last arc wraps around the start of the contour.
fn split_arcs(points: &[Point<i32>], vertices: &[Coord<f64>]) -> Vec<Vec<Point<i32>>> {
    let mut indices: Vec<usize> = vertices.iter().map(|v| closest_index(points, *v)).collect();
    indices.sort_unstable();

    (0..indices.len())
        .map(|i| {
            let start = indices[i];
            let end = indices[(i + 1) % indices.len()];
            if i + 1 < indices.len() && end >= start {
                points[start..=end].to_vec()
            } else {
                points[start..].iter().chain(&points[..=end]).copied().collect()
            }
        })
        .collect()
}

/// Drop the rounded ends of an arc so only its straight middle is fitted.
fn trim_arc(arc: &[Point<i32>], trim_fraction: f64) -> &[Point<i32>] {
    let n = arc.len();
    if n < 5 {
        return arc;
    }
    let trim = ((n as f64 * trim_fraction) as usize).max(1);
    let trimmed = &arc[trim..n - trim];
    if trimmed.len() < 2 { arc } else { trimmed }
}

fn fill_polygon(width: u32, height: u32, corners: &[Point<i32>]) -> Region {
    let mut canvas = GrayImage::new(width, height);
    imageproc::drawing::draw_polygon_mut(&mut canvas, corners, Luma([255u8]));
    Region::from_gray(&canvas)
}

fn distinct_corners(corners: Vec<Point<i32>>) -> Vec<Point<i32>> {
    let mut distinct: Vec<Point<i32>> = Vec::with_capacity(corners.len());
    for corner in corners {
        if !distinct.contains(&corner) {
            distinct.push(corner);
        }
    }
    distinct
}

/// Replace rounded corners of a roughly rectangular mask with sharp ones.
///
/// The four sides are re-fitted from the straight part of each edge of the
/// largest outer contour, and the quadrilateral formed by their
/// intersections is filled. Degenerate inputs come back binarized.
pub fn rectify(region: &Region, trim_fraction: f64) -> Result<Region> {
    use geo::ConvexHull;

    if !(trim_fraction > 0.0 && trim_fraction < 0.5) {
        return Err(MaskError::invalid(format!(
            "trim_fraction must be in (0, 0.5), got {trim_fraction}"
        )));
    }
    let binary = region.map(|v| if v > BINARY_CUT { 1.0 } else { 0.0 });
    if binary.is_empty() {
        return Ok(binary);
    }

    let contours = imageproc::contours::find_contours::<i32>(&binary.to_gray());
    let Some(largest) = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .max_by(|a, b| contour_area(a).total_cmp(&contour_area(b)))
    else {
        return Ok(binary);
    };

    let hull = MultiPoint::<f64>::from(
        largest
            .points
            .iter()
            .map(|p| GeoPoint::from(to_coord(p)))
            .collect::<Vec<_>>(),
    )
    .convex_hull();
    if ring_vertices(hull.exterior()).len() < 3 {
        tracing::debug!(points = largest.points.len(), "contour has no area, keeping input");
        return Ok(binary);
    }

    let vertices = sort_by_angle(quadrilateral(&hull));
    let arcs = split_arcs(&largest.points, &vertices);
    if arcs.iter().any(|arc| arc.len() < 2) {
        tracing::debug!("contour arc too short to fit, keeping input");
        return Ok(binary);
    }
    let lines: Vec<Line> = arcs.iter().map(|arc| fit_line(trim_arc(arc, trim_fraction))).collect();

    let corners: Vec<Point<i32>> = (0..lines.len())
        .map(|i| {
            let (x, y) = lines[i].intersect(&lines[(i + 1) % lines.len()]).unwrap_or_else(|| {
                tracing::debug!(edge = i, "parallel edges, using origin as corner");
                (0.0, 0.0)
            });
            Point::new(x.round() as i32, y.round() as i32)
        })
        .collect();

    let corners = distinct_corners(corners);
    if corners.len() < 3 {
        tracing::debug!(corners = corners.len(), "too few distinct corners, keeping input");
        return Ok(binary);
    }
    tracing::trace!(?corners, "rectified corners");
    Ok(fill_polygon(region.width(), region.height(), &corners))
}

/// Corner rectification as a pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CornerRectifier {
    /// Fraction of each edge trimmed from both ends before fitting
    #[schemars(range(min = 0.01, max = 0.4))]
    pub trim_fraction: f64,
}

impl Default for CornerRectifier {
    fn default() -> Self {
        Self {
            trim_fraction: 0.15,
        }
    }
}

impl MaskTransform for CornerRectifier {
    fn apply(&self, region: &Region) -> Result<Region> {
        rectify(region, self.trim_fraction)
    }

    fn name(&self) -> &'static str {
        "rectify"
    }
}
