use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub device_type: String,
    #[serde(default)]
    pub sensors: Vec<String>,
    pub segment: Segment,
    pub location: Location,
}

/// A time-bounded association between a device and a physical location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    pub name: String,
    pub started: Option<String>,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
    pub id: String,
    pub name: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub address: Option<String>,
    pub country_code: Option<String>,
    pub building_type: Option<String>,
    pub building_year: Option<u32>,
    pub ventilation_type: Option<String>,
    pub floors: Option<u32>,
    pub timezone: Option<String>,
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// Latest readings for one device, keyed by sensor channel. Channels the
/// device does not measure are `None`; values pass through unconverted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Samples {
    pub battery: Option<u32>,
    pub co2: Option<f64>,
    pub humidity: Option<f64>,
    pub light: Option<f64>,
    pub mold: Option<f64>,
    pub pm1: Option<f64>,
    pub pm10: Option<f64>,
    pub pm25: Option<f64>,
    pub pressure: Option<f64>,
    pub radon_short_term_avg: Option<f64>,
    pub rssi: Option<i32>,
    pub sla: Option<f64>,
    pub temp: Option<f64>,
    pub time: Option<i64>,
    pub voc: Option<f64>,
    pub relay_device_type: Option<String>,
    pub outdoor_temp: Option<f64>,
    pub outdoor_humidity: Option<f64>,
    pub outdoor_pressure: Option<f64>,
    pub outdoor_pm1: Option<f64>,
    pub outdoor_pm10: Option<f64>,
    pub outdoor_pm25: Option<f64>,
    pub outdoor_no2: Option<f64>,
    pub outdoor_o3: Option<f64>,
    pub outdoor_so2: Option<f64>,
    pub outdoor_co: Option<f64>,
    pub outdoor_aqi: Option<f64>,
    pub control_signal: Option<f64>,
    pub control_signal_01: Option<f64>,
    pub control_signal_02: Option<f64>,
    pub control_signal_03: Option<f64>,
    pub control_signal_04: Option<f64>,
    pub control_signal_05: Option<f64>,
    pub control_signal_06: Option<f64>,
    pub control_signal_07: Option<f64>,
    pub control_signal_08: Option<f64>,
    pub regulation_pressure: Option<f64>,
    pub regulation_height: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSamples {
    pub id: String,
    pub data: Samples,
    pub segment: Segment,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationSamples {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub devices: Vec<DeviceSamples>,
}

#[derive(Debug, Deserialize)]
pub struct DevicesResponse {
    pub devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
pub struct LocationsResponse {
    pub locations: Vec<Location>,
}

#[derive(Debug, Deserialize)]
pub struct LatestSamplesResponse {
    pub data: Samples,
}
