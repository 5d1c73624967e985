use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::error::{LotError, LotResult};

const WGS84: &str = "+proj=longlat +datum=WGS84 +no_defs";
const WGS84_CODE: u16 = 4326;
/// Web Mercator without the `+nadgrids=@null` grid reference of the registry definition
const WEB_MERCATOR: &str = "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs";
const WEB_MERCATOR_CODES: &[u16] = &[3857, 3785];

/// Converts coordinates of one source CRS to EPSG:4326 longitude/latitude
pub struct Reprojector {
    source: Option<Proj>,
    source_geographic: bool,
    target: Proj,
}

/// EPSG code from names like `EPSG:3857` or `urn:ogc:def:crs:EPSG::3857`
pub fn epsg_code(crs_name: &str) -> Option<u16> {
    let upper = crs_name.trim().to_ascii_uppercase();
    let (_, tail) = upper.rsplit_once("EPSG")?;
    tail.trim_start_matches(':').trim().parse().ok()
}

impl Reprojector {
    pub fn from_crs_name(crs_name: &str) -> LotResult<Self> {
        let code = epsg_code(crs_name).ok_or_else(|| LotError::UnsupportedCrs(crs_name.to_string()))?;
        let target = Proj::from_proj_string(WGS84).map_err(|e| LotError::Projection(format!("{e:?}")))?;

        if code == WGS84_CODE {
            return Ok(Self {
                source: None,
                source_geographic: true,
                target,
            });
        }

        let definition = if WEB_MERCATOR_CODES.contains(&code) {
            WEB_MERCATOR
        } else {
            crs_definitions::from_code(code)
                .ok_or_else(|| LotError::UnsupportedCrs(crs_name.to_string()))?
                .proj4
        };
        let source = Proj::from_proj_string(definition).map_err(|e| LotError::Projection(format!("{e:?}")))?;

        Ok(Self {
            source: Some(source),
            source_geographic: definition.contains("+proj=longlat"),
            target,
        })
    }

    /// `(x, y)` in the source CRS to `(lon, lat)` in degrees
    pub fn to_wgs84(&self, x: f64, y: f64) -> LotResult<(f64, f64)> {
        let Some(source) = &self.source else {
            return Ok((x, y));
        };

        let mut point = if self.source_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(source, &self.target, &mut point).map_err(|e| LotError::Projection(format!("{e:?}")))?;

        let (lon, lat) = (point.0.to_degrees(), point.1.to_degrees());
        if !lon.is_finite() || !lat.is_finite() {
            return Err(LotError::Projection(format!("({x}, {y}) is outside the source CRS")));
        }
        Ok((lon, lat))
    }
}
