//! LINESTRING WKT handling for route geometries.
//!
//! Only the subset routes need is supported: an optional `SRID=<n>;` prefix, the
//! `LINESTRING` keyword, and either `EMPTY` or a parenthesised list of at least two 2D
//! coordinates. The `routes.geom` column is `geometry(LineString, 4326)`, so Z and M
//! ordinates are refused here instead of at insert time.

use std::fmt;

use thiserror::Error;

/// SRID every stored route geometry is tagged with (WGS 84).
pub const ROUTE_SRID: i32 = 4326;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("geometry text is empty")]
    Empty,
    #[error("Only LINESTRING WKT is supported (got {0})")]
    UnsupportedType(String),
    #[error("malformed WKT: {0}")]
    Malformed(String),
    #[error("Invalid number of points in LineString (found {0} - must be 0 or >= 2)")]
    PointCount(usize),
    #[error("invalid coordinate '{0}'")]
    Coordinate(String),
    #[error("only 2D coordinates are supported (got {0})")]
    Dimension(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

/// A validated 2D line string. Always empty or at least two points.
#[derive(Debug, Clone, PartialEq)]
pub struct LineString {
    points: Vec<Coordinate>,
}

impl LineString {
    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Canonical WKT, e.g. `LINESTRING (-6.26 53.34, -6.25 53.35)`.
    pub fn to_wkt(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LineString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LINESTRING")?;
        if self.points.is_empty() {
            return f.write_str(" EMPTY");
        }
        f.write_str(" (")?;
        for (i, p) in self.points.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", p.x, p.y)?;
        }
        f.write_str(")")
    }
}

/// parse_line_string
///
/// Parses and validates LINESTRING WKT. An `SRID=<n>;` prefix (EWKT) is accepted and
/// dropped; stored geometries are always tagged with [`ROUTE_SRID`].
pub fn parse_line_string(text: &str) -> Result<LineString, GeometryError> {
    let text = strip_srid(text.trim())?.trim();
    if text.is_empty() {
        return Err(GeometryError::Empty);
    }

    let keyword_end = text
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let keyword = text[..keyword_end].to_ascii_uppercase();
    if keyword != "LINESTRING" {
        let found = if keyword.is_empty() { "nothing".to_string() } else { keyword };
        return Err(GeometryError::UnsupportedType(found));
    }

    let rest = text[keyword_end..].trim_start();
    if rest.eq_ignore_ascii_case("EMPTY") {
        return Ok(LineString { points: Vec::new() });
    }

    // `LINESTRING Z (...)`, `LINESTRING M (...)`, `LINESTRING ZM EMPTY`, ...
    let modifier_end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    if modifier_end > 0 {
        return Err(GeometryError::Dimension(
            rest[..modifier_end].to_ascii_uppercase(),
        ));
    }

    let body = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| GeometryError::Malformed("expected '(' coordinates ')'".to_string()))?;

    if body.trim().is_empty() {
        return Err(GeometryError::Malformed("empty coordinate list".to_string()));
    }

    let points = body
        .split(',')
        .map(parse_coordinate)
        .collect::<Result<Vec<_>, _>>()?;

    if points.len() < 2 {
        return Err(GeometryError::PointCount(points.len()));
    }

    Ok(LineString { points })
}

fn strip_srid(text: &str) -> Result<&str, GeometryError> {
    let Some(head) = text.get(..5) else {
        return Ok(text);
    };
    if !head.eq_ignore_ascii_case("SRID=") {
        return Ok(text);
    }
    let (srid, rest) = text[5..]
        .split_once(';')
        .ok_or_else(|| GeometryError::Malformed("SRID prefix without ';'".to_string()))?;
    srid.trim()
        .parse::<u32>()
        .map_err(|_| GeometryError::Malformed(format!("invalid SRID '{}'", srid.trim())))?;
    Ok(rest)
}

/// canonical_wkt
///
/// Re-renders WKT read back from PostGIS (`ST_AsText` writes `LINESTRING(1 2,3 4)`) in the
/// canonical form. Text that does not parse is returned unchanged.
pub fn canonical_wkt(stored: String) -> String {
    match parse_line_string(&stored) {
        Ok(line) => line.to_wkt(),
        Err(_) => stored,
    }
}

fn parse_coordinate(raw: &str) -> Result<Coordinate, GeometryError> {
    let parts = raw
        .split_whitespace()
        .map(|n| {
            n.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| GeometryError::Coordinate(raw.trim().to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match parts.as_slice() {
        [x, y] => Ok(Coordinate { x: *x, y: *y }),
        [_, _, _] | [_, _, _, _] => Err(GeometryError::Dimension(format!(
            "{} ordinates in '{}'",
            parts.len(),
            raw.trim()
        ))),
        _ => Err(GeometryError::Coordinate(raw.trim().to_string())),
    }
}
