use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Config;
use crate::error::{AppError, AppResult};

use super::{GeoApi, GeoPoint, RouteEstimate};

/// Straight-line to road-distance correction applied when the routing
/// provider is unavailable.
const ROAD_FACTOR: f64 = 1.3;

/// Fallback travel speed for duration estimates, km/h.
const FALLBACK_SPEED_KMH: f64 = 30.0;

pub struct GeoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeoClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: config.geo_base_url.clone(),
            api_key: config.geo_api_key.clone(),
        }
    }
}

#[derive(Deserialize)]
struct GeocodeResponse {
    results: Vec<GeocodeHit>,
}

#[derive(Deserialize)]
struct GeocodeHit {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
struct RouteResponse {
    distance_m: f64,
    duration_s: f64,
}

#[async_trait]
impl GeoApi for GeoClient {
    async fn geocode(&self, address: &str) -> AppResult<Option<GeoPoint>> {
        let url = format!("{}/geocode", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("q", address), ("key", &self.api_key)])
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("geocode request: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "geocode returned {}",
                response.status()
            )));
        }

        let body: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("geocode body: {}", e)))?;

        Ok(body
            .results
            .into_iter()
            .next()
            .map(|hit| GeoPoint { lat: hit.lat, lon: hit.lon }))
    }

    async fn route(&self, from: GeoPoint, to: GeoPoint) -> AppResult<RouteEstimate> {
        let url = format!("{}/route", self.base_url);
        let result = self
            .http
            .get(&url)
            .query(&[
                ("from", format!("{},{}", from.lat, from.lon)),
                ("to", format!("{},{}", to.lat, to.lon)),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                let body: RouteResponse = response
                    .json()
                    .await
                    .map_err(|e| AppError::Gateway(format!("route body: {}", e)))?;
                Ok(RouteEstimate {
                    distance_m: body.distance_m,
                    duration_s: body.duration_s,
                })
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "routing provider error, using haversine estimate");
                Ok(haversine_estimate(from, to))
            }
            Err(e) => {
                tracing::warn!(error = %e, "routing provider unreachable, using haversine estimate");
                Ok(haversine_estimate(from, to))
            }
        }
    }
}

/// Distance between two coordinates by the Haversine formula, kilometers.
pub fn haversine_distance_km(from: GeoPoint, to: GeoPoint) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lon = (to.lon - from.lon).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Route estimate when the provider is down: straight line scaled by a
/// road factor, duration at a conservative city speed.
pub fn haversine_estimate(from: GeoPoint, to: GeoPoint) -> RouteEstimate {
    let distance_km = haversine_distance_km(from, to) * ROAD_FACTOR;
    RouteEstimate {
        distance_m: distance_km * 1000.0,
        duration_s: distance_km / FALLBACK_SPEED_KMH * 3600.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_moscow_podolsk() {
        let moscow = GeoPoint { lat: 55.7558, lon: 37.6173 };
        let podolsk = GeoPoint { lat: 55.4312, lon: 37.5457 };

        let distance = haversine_distance_km(moscow, podolsk);
        // Roughly 36 km apart.
        assert!(distance > 30.0 && distance < 45.0);
    }

    #[test]
    fn haversine_zero_for_same_point() {
        let p = GeoPoint { lat: 55.0, lon: 37.0 };
        assert!(haversine_distance_km(p, p) < 1e-9);
    }

    #[test]
    fn estimate_scales_distance_and_duration() {
        let from = GeoPoint { lat: 55.7558, lon: 37.6173 };
        let to = GeoPoint { lat: 55.7658, lon: 37.6173 };

        let est = haversine_estimate(from, to);
        assert!(est.distance_m > 0.0);
        // duration consistent with the fallback speed
        let km = est.distance_m / 1000.0;
        assert!((est.duration_s - km / FALLBACK_SPEED_KMH * 3600.0).abs() < 1e-6);
    }
}
