//! Geo location filters given next to the query.
//!
//! A location string names the position field and a specification:
//!
//! - `field:(dim,x,y,radius,...)`: a point with optional radius and ranking
//!   parameters,
//! - `field:[dim,x1,y1,x2,y2]`: a distance cut-off bounding box.
//!
//! Either form turns into one location term searched in the field's z-curve
//! attribute.

use tessera_common::{Result, error::Error};

use crate::config::MatchingConfig;
use crate::tree::{Term, TermKind, Weight};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationShape {
    Point,
    BoundingBox,
}

/// A parsed location string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    field: String,
    spec: String,
    shape: LocationShape,
    params: Vec<i64>,
}

impl Location {
    /// Parses `field:(...)` or `field:[...]`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the field name is missing, the brackets are
    /// unbalanced, a parameter is not an integer, the dimensionality is not 1
    /// or 2, or the parameter count does not fit the shape.
    pub fn parse(location: &str) -> Result<Location> {
        let (field, spec) = location
            .split_once(':')
            .ok_or_else(|| invalid(location, "expected <field>:<spec>"))?;
        let field = field.trim();
        let spec = spec.trim();
        if field.is_empty() {
            return Err(invalid(location, "missing field name"));
        }
        let (shape, inner) = if let Some(inner) = spec.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
            (LocationShape::Point, inner)
        } else if let Some(inner) = spec.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            (LocationShape::BoundingBox, inner)
        } else {
            return Err(invalid(location, "spec must be enclosed in () or []"));
        };
        let params = inner
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<i64>()
                    .map_err(|e| invalid(location, format!("bad parameter '{p}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let dim = params[0];
        if !(1..=2).contains(&dim) {
            return Err(invalid(location, format!("unsupported dimensionality {dim}")));
        }
        let dim = dim as usize;
        let valid = match shape {
            LocationShape::Point => params.len() > dim,
            LocationShape::BoundingBox => params.len() == 1 + 2 * dim,
        };
        if !valid {
            return Err(invalid(
                location,
                format!("{} parameters do not describe a {shape:?}", params.len()),
            ));
        }
        Ok(Location {
            field: field.to_string(),
            spec: spec.to_string(),
            shape,
            params,
        })
    }

    /// The position field, without the z-curve suffix.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The specification as given, brackets included.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn shape(&self) -> LocationShape {
        self.shape
    }

    /// All parameters, dimensionality first.
    pub fn params(&self) -> &[i64] {
        &self.params
    }

    /// The attribute holding the z-curve encoded positions of the field.
    pub fn zcurve_field(&self, config: &MatchingConfig) -> String {
        format!("{}{}", self.field, config.zcurve_suffix)
    }

    /// Creates the filter term for this location: unranked, zero weight,
    /// searched in the z-curve attribute with the spec as term text.
    pub fn to_term(&self, config: &MatchingConfig) -> Term {
        let mut term = Term::new(
            TermKind::Location(self.spec.clone()),
            self.zcurve_field(config),
            0,
            Weight::new(0),
        );
        term.data_mut().set_ranked(false);
        term
    }
}

fn invalid(location: &str, message: impl Into<String>) -> Error {
    Error::invalid_format(format!("location '{location}'"), message)
}
