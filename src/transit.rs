//! Public-transit HTTP adapter.
//!
//! Speaks the ODsay `searchPubTransPathT` response shape: a list of candidate
//! paths, each with an `info` summary and ordered `subPath` legs whose
//! `trafficType` is 1 (subway), 2 (bus) or 3 (walk). The fastest candidate is
//! kept and its legs are carried through as `SubPath`s.

use serde::Deserialize;
use serde_json::Value;

use crate::error::RoutingError;
use crate::model::{Coordinate, LaneInfo, SubPath, TrafficType};
use crate::polyline::Polyline;
use crate::traits::TransitRoute;

/// Provider error code for "origin and destination are too close".
const TOO_CLOSE_CODE: &str = "-98";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransitConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.odsay.com/v1/api".to_string(),
            api_key: String::new(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransitClient {
    config: TransitConfig,
    client: reqwest::blocking::Client,
}

impl TransitClient {
    pub fn new(config: TransitConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Best public-transit itinerary with its leg breakdown.
    pub fn route(&self, from: Coordinate, to: Coordinate) -> Result<Option<TransitRoute>, RoutingError> {
        let url = format!("{}/searchPubTransPathT", self.config.base_url);
        let body = self
            .client
            .get(url)
            .query(&[
                ("SX", format!("{:.6}", from.lng)),
                ("SY", format!("{:.6}", from.lat)),
                ("EX", format!("{:.6}", to.lng)),
                ("EY", format!("{:.6}", to.lat)),
                ("apiKey", self.config.api_key.clone()),
            ])
            .send()
            .and_then(|resp| resp.error_for_status())?
            .json::<Value>()?;

        parse_transit_response(&body, from, to)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathInfo {
    #[serde(default)]
    total_time: f64,
    #[serde(default)]
    total_distance: f64,
    #[serde(default)]
    payment: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSubPath {
    traffic_type: i64,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    section_time: f64,
    #[serde(default)]
    lane: Vec<RawLane>,
    #[serde(default)]
    start_name: Option<String>,
    #[serde(default)]
    end_name: Option<String>,
    #[serde(default)]
    start_x: Option<Value>,
    #[serde(default)]
    start_y: Option<Value>,
    #[serde(default)]
    end_x: Option<Value>,
    #[serde(default)]
    end_y: Option<Value>,
    #[serde(default)]
    pass_stop_list: Option<PassStopList>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLane {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    bus_no: Option<String>,
    #[serde(default)]
    subway_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PassStopList {
    #[serde(default)]
    stations: Vec<RawStation>,
}

#[derive(Debug, Deserialize)]
struct RawStation {
    x: Value,
    y: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPath {
    info: PathInfo,
    #[serde(default)]
    sub_path: Vec<RawSubPath>,
}

/// Coordinates arrive as numbers or numeric strings depending on the field.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn point(x: Option<&Value>, y: Option<&Value>) -> Option<Coordinate> {
    Some(Coordinate::new(number(y?)?, number(x?)?))
}

/// Pull the provider error code, whichever of its two error shapes is used.
fn error_code(body: &Value) -> Option<(String, String)> {
    let error = body.get("error")?;
    let error = match error {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let code = match error.get("code")? {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let message = error
        .get("msg")
        .or_else(|| error.get("message"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some((code, message))
}

fn convert_sub_path(raw: RawSubPath) -> SubPath {
    let mut stops: Vec<Coordinate> = raw
        .pass_stop_list
        .map(|list| {
            list.stations
                .iter()
                .filter_map(|station| point(Some(&station.x), Some(&station.y)))
                .collect()
        })
        .unwrap_or_default();

    if stops.is_empty() {
        stops.extend(point(raw.start_x.as_ref(), raw.start_y.as_ref()));
        stops.extend(point(raw.end_x.as_ref(), raw.end_y.as_ref()));
    }

    let polyline = (stops.len() >= 2).then(|| Polyline::from_coordinates(&stops).encode());

    SubPath {
        traffic_type: TrafficType::from_code(raw.traffic_type),
        distance_meters: raw.distance.round().max(0.0) as u32,
        duration_minutes: raw.section_time.round().max(0.0) as u32,
        lanes: raw
            .lane
            .into_iter()
            .map(|lane| LaneInfo {
                name: lane.name,
                bus_no: lane.bus_no,
                subway_code: lane.subway_code,
            })
            .collect(),
        start_name: raw.start_name,
        end_name: raw.end_name,
        polyline,
        stops,
    }
}

pub(crate) fn parse_transit_response(
    body: &Value,
    from: Coordinate,
    to: Coordinate,
) -> Result<Option<TransitRoute>, RoutingError> {
    if let Some((code, message)) = error_code(body) {
        if code == TOO_CLOSE_CODE {
            return Ok(None);
        }
        if code == "429" {
            return Err(RoutingError::RateLimited);
        }
        return Err(RoutingError::Malformed(format!("transit error {}: {}", code, message)));
    }

    let paths = body
        .get("result")
        .and_then(|result| result.get("path"))
        .cloned()
        .ok_or_else(|| RoutingError::Malformed("missing result.path".to_string()))?;
    let paths: Vec<RawPath> =
        serde_json::from_value(paths).map_err(|err| RoutingError::Malformed(err.to_string()))?;

    let Some(best) = paths
        .into_iter()
        .min_by(|a, b| a.info.total_time.total_cmp(&b.info.total_time))
    else {
        return Ok(None);
    };

    let sub_paths: Vec<SubPath> = best.sub_path.into_iter().map(convert_sub_path).collect();

    let mut path = Polyline::from_coordinates(&[from]);
    for leg in &sub_paths {
        path.extend(&Polyline::from_coordinates(&leg.stops));
    }
    path.extend(&Polyline::from_coordinates(&[to]));

    Ok(Some(TransitRoute {
        distance_meters: best.info.total_distance.round().max(0.0) as u32,
        duration_minutes: best.info.total_time.round().max(0.0) as u32,
        fare: best.info.payment.map(|fare| fare.round().max(0.0) as u32),
        polyline: Some(path.encode()),
        sub_paths,
    }))
}
