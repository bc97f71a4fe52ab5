//! Conversion of British and Irish national grid references to WGS84.
//!
//! Grid digits are scaled to metres here; the datum transformation itself is
//! left to PROJ, which picks the best operation it knows for each grid.

use geo_types::Point;
use proj::Proj;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordError {
    #[error("unsupported coordinate reference system EPSG:{0}")]
    UnsupportedSystem(u32),
    #[error("no transformation from EPSG:{epsg} to WGS84: {reason}")]
    Projection { epsg: u32, reason: String },
    #[error("grid reference '{0}' is not numeric")]
    NotNumeric(String),
    #[error("grid reference {easting} {northing} lands outside WGS84 bounds")]
    OutOfBounds { easting: String, northing: String },
}

/// Supported national grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceSystem {
    /// EPSG:27700, OSGB36 British National Grid.
    BritishNationalGrid,
    /// EPSG:29900, TM65 Irish Grid.
    IrishGridTm65,
    /// EPSG:29903, TM75 Irish Grid.
    IrishGrid,
    /// EPSG:2157, Irish Transverse Mercator.
    IrishTransverseMercator,
}

impl ReferenceSystem {
    pub fn from_epsg(code: u32) -> Result<Self, CoordError> {
        match code {
            27700 => Ok(ReferenceSystem::BritishNationalGrid),
            29900 => Ok(ReferenceSystem::IrishGridTm65),
            29903 => Ok(ReferenceSystem::IrishGrid),
            2157 => Ok(ReferenceSystem::IrishTransverseMercator),
            _ => Err(CoordError::UnsupportedSystem(code)),
        }
    }

    pub fn epsg(&self) -> u32 {
        match self {
            ReferenceSystem::BritishNationalGrid => 27700,
            ReferenceSystem::IrishGridTm65 => 29900,
            ReferenceSystem::IrishGrid => 29903,
            ReferenceSystem::IrishTransverseMercator => 2157,
        }
    }
}

impl fmt::Display for ReferenceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// PROJ transformation from one national grid to WGS84.
pub struct GridProjection {
    system: ReferenceSystem,
    proj: Proj,
}

impl GridProjection {
    pub fn new(system: ReferenceSystem) -> Result<Self, CoordError> {
        let proj = Proj::new_known_crs(&system.to_string(), "EPSG:4326", None).map_err(|e| {
            CoordError::Projection {
                epsg: system.epsg(),
                reason: e.to_string(),
            }
        })?;
        Ok(GridProjection { system, proj })
    }

    pub fn system(&self) -> ReferenceSystem {
        self.system
    }

    /// Convert grid metres to a WGS84 point (x = longitude, y = latitude), or
    /// `None` when the result is not a valid WGS84 position.
    pub fn to_wgs84(&self, easting: f64, northing: f64) -> Option<Point<f64>> {
        // Output axes are longitude, latitude for a known CRS pair.
        let (lon, lat) = self.proj.convert((easting, northing)).ok()?;
        let valid = lat.is_finite() && lon.is_finite() && lat.abs() <= 90.0 && lon.abs() <= 180.0;
        valid.then(|| Point::new(lon, lat))
    }
}

/// Raw easting and northing digits as they appear in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridRef {
    pub easting: String,
    pub northing: String,
}

impl GridRef {
    pub fn new(easting: &str, northing: &str) -> Self {
        GridRef {
            easting: easting.trim().to_owned(),
            northing: northing.trim().to_owned(),
        }
    }

    /// Figure count that fits both components of this reference.
    pub fn best_fit_figures(&self) -> u8 {
        self.easting.len().max(self.northing.len()).min(u8::MAX as usize) as u8
    }
}

/// Scale a grid component of `figures` digits to metres.
///
/// Values longer than `figures` are truncated to their leading digits, shorter
/// values are taken as having lost their leading zeros. A six-figure value
/// is already in metres.
pub fn grid_to_metres(digits: &str, figures: u8) -> Result<f64, CoordError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoordError::NotNumeric(digits.to_owned()));
    }
    let kept = &digits[..digits.len().min(figures as usize)];
    let value = kept.parse::<u64>().map_err(|_| CoordError::NotNumeric(digits.to_owned()))? as f64;
    Ok(value * 10f64.powi(6 - figures as i32))
}

/// Memoizing grid to WGS84 converter bound to one reference system.
pub struct GridTransformer {
    projection: Option<Result<GridProjection, CoordError>>,
    figures: Option<u8>,
    memo: HashMap<GridRef, Result<Point<f64>, CoordError>>,
}

impl GridTransformer {
    /// # Parameters
    /// - `system`: Grid the references are expressed in. `None` places every stop at 0/0.
    /// - `figures`: Fixed figure count, or `None` to pick the best fit per reference.
    pub fn new(system: Option<ReferenceSystem>, figures: Option<u8>) -> Self {
        GridTransformer {
            projection: system.map(GridProjection::new),
            figures,
            memo: HashMap::new(),
        }
    }

    pub fn system(&self) -> Option<ReferenceSystem> {
        match &self.projection {
            Some(Ok(projection)) => Some(projection.system()),
            _ => None,
        }
    }

    pub fn transform(&mut self, grid: &GridRef) -> Result<Point<f64>, CoordError> {
        let projection = match &self.projection {
            None => return Ok(Point::new(0.0, 0.0)),
            Some(Err(e)) => return Err(e.clone()),
            Some(Ok(projection)) => projection,
        };
        if let Some(cached) = self.memo.get(grid) {
            return cached.clone();
        }
        let figures = self.figures.unwrap_or_else(|| grid.best_fit_figures());
        let result = grid_to_metres(&grid.easting, figures).and_then(|easting| {
            let northing = grid_to_metres(&grid.northing, figures)?;
            projection
                .to_wgs84(easting, northing)
                .ok_or_else(|| CoordError::OutOfBounds {
                    easting: grid.easting.clone(),
                    northing: grid.northing.clone(),
                })
        });
        self.memo.insert(grid.clone(), result.clone());
        result
    }
}
