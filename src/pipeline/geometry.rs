use geo::{Centroid, LineString, MultiPolygon, Point, Polygon};
use serde_json::Value;
use tracing::debug;

use crate::error::{LotError, LotResult};
use crate::models::Coordinates;
use crate::pipeline::projection::Reprojector;
use crate::scrapers::traits::GeometryApi;
use crate::scrapers::types::{scalar_text, Feature, GeoportalAnswer};

/// Key marking the canonical feature of a multi-feature answer
const ADDRESS_KEY: &str = "readable_address";

/// Where a parcel is
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub coords: Coordinates,
    pub address: Option<String>,
}

type Ring = Vec<Vec<f64>>;

fn reproject_ring(ring: &[Vec<f64>], reprojector: &Reprojector) -> LotResult<LineString<f64>> {
    ring.iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => reprojector.to_wgs84(*x, *y),
            _ => Err(LotError::MalformedGeometry(format!("position {position:?}"))),
        })
        .collect::<LotResult<Vec<(f64, f64)>>>()
        .map(LineString::from)
}

fn reproject_polygon(rings: &[Ring], reprojector: &Reprojector) -> LotResult<Polygon<f64>> {
    let (exterior, interiors) = rings
        .split_first()
        .ok_or_else(|| LotError::MalformedGeometry("polygon without rings".into()))?;

    Ok(Polygon::new(
        reproject_ring(exterior, reprojector)?,
        interiors
            .iter()
            .map(|ring| reproject_ring(ring, reprojector))
            .collect::<LotResult<Vec<_>>>()?,
    ))
}

fn coordinates<T: serde::de::DeserializeOwned>(value: &Value) -> LotResult<T> {
    serde_json::from_value(value.clone()).map_err(|e| LotError::MalformedGeometry(e.to_string()))
}

/// Centroid of a feature's geometry in EPSG:4326.
///
/// The source CRS is read from the feature; each feature may use its own.
pub fn feature_centroid(feature: &Feature) -> LotResult<Coordinates> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| LotError::MalformedGeometry("feature without geometry".into()))?;
    let crs = geometry
        .crs
        .as_ref()
        .ok_or_else(|| LotError::MalformedGeometry("geometry without crs".into()))?;
    let reprojector = Reprojector::from_crs_name(&crs.properties.name)?;

    let centroid: Option<Point<f64>> = match geometry.kind.as_str() {
        "Polygon" => {
            let rings: Vec<Ring> = coordinates(&geometry.coordinates)?;
            reproject_polygon(&rings, &reprojector)?.centroid()
        }
        "MultiPolygon" => {
            let polygons: Vec<Vec<Ring>> = coordinates(&geometry.coordinates)?;
            let polygons = polygons
                .iter()
                .map(|rings| reproject_polygon(rings, &reprojector))
                .collect::<LotResult<Vec<_>>>()?;
            MultiPolygon::new(polygons).centroid()
        }
        "Point" => {
            let position: Vec<f64> = coordinates(&geometry.coordinates)?;
            match position.as_slice() {
                [x, y, ..] => {
                    let (lon, lat) = reprojector.to_wgs84(*x, *y)?;
                    Some(Point::new(lon, lat))
                }
                _ => return Err(LotError::MalformedGeometry(format!("position {position:?}"))),
            }
        }
        other => return Err(LotError::UnsupportedGeometry(other.to_string())),
    };

    centroid
        .map(|p| Coordinates { lon: p.x(), lat: p.y() })
        .ok_or_else(|| LotError::MalformedGeometry("empty geometry".into()))
}

/// Pick the canonical feature of a geoportal answer and locate it
pub fn location_from_answer(answer: Value) -> LotResult<Location> {
    let answer: GeoportalAnswer = serde_json::from_value(answer)?;
    let collection = answer.data.ok_or(LotError::NotFound)?;

    let feature = collection
        .features
        .iter()
        .find(|f| f.properties.options.contains_key(ADDRESS_KEY))
        .ok_or(LotError::NoCanonicalFeature)?;

    Ok(Location {
        coords: feature_centroid(feature)?,
        address: feature.properties.options.get(ADDRESS_KEY).and_then(scalar_text),
    })
}

/// Resolve a cadastral number to its centroid and address. One attempt, no retry.
pub async fn resolve(api: &dyn GeometryApi, cadastral_number: &str) -> LotResult<Location> {
    let answer = api.search(cadastral_number).await.map_err(LotError::Request)?;
    let location = location_from_answer(answer)?;

    debug!("{} -> ({}, {})", cadastral_number, location.coords.lon, location.coords.lat);
    Ok(location)
}
