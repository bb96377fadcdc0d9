//!
//! The clock's popup: the feel temperature and a rain forecast graph from buienradar.
use std::time::Duration;

use image::RgbaImage;
use serde_json::Value;

use crate::{
    error::{Error, Res},
    popup::PopupContent,
    render::{Color, Rect, Surface},
};

const FEED_URL: &str = "https://data.buienradar.nl/2.0/feed/json";
const RAIN_URL: &str = "https://gpsgadget.buienradar.nl/data/raintext";
const TIMEOUT: Duration = Duration::from_secs(2);

/// Where the rain graph goes.
pub const GRAPH: Rect = Rect::new(14, 0, 211, 107);

pub struct Weather {
    agent: ureq::Agent,
    pub station: String,
    pub lat: String,
    pub lon: String,
    pub bg: Color,
    pub fg: Color,
    pub graph: Color,
    /// Drawn below everything else.
    pub background: Option<RgbaImage>,
}

impl Weather {
    #[must_use]
    pub fn new(station: &str, lat: &str, lon: &str, colors: [Color; 3], background: Option<RgbaImage>) -> Self {
        let [bg, fg, graph] = colors;
        Self {
            agent: ureq::AgentBuilder::new().timeout(TIMEOUT).build(),
            station: station.to_owned(),
            lat: lat.to_owned(),
            lon: lon.to_owned(),
            bg,
            fg,
            graph,
            background,
        }
    }

    fn fetch(&self, url: &str) -> Result<String, Error> {
        log::debug!("fetching {url}");
        Ok(self.agent.get(url).call()?.into_string()?)
    }
}

/// Finds the feel temperature the given station measured in buienradar's JSON feed.
///
/// # Errors
/// Returns an error if the station or its measurement is missing.
pub fn feel_temperature(feed: &Value, station: &str) -> Result<f64, Error> {
    let missing = |reason: String| Error::Data {
        source_name: "buienradar",
        reason,
    };
    let measurements = feed["actual"]["stationmeasurements"]
        .as_array()
        .ok_or_else(|| missing(String::from("no station measurements")))?;
    let measurement = measurements
        .iter()
        .find(|m| match &m["stationid"] {
            Value::Number(n) => n.to_string() == station,
            Value::String(s) => s == station,
            _ => false,
        })
        .ok_or_else(|| missing(format!("no station {station}")))?;
    measurement["feeltemperature"]
        .as_f64()
        .ok_or_else(|| missing(format!("station {station} has no feel temperature")))
}

/// Reads the rain intensities (0 to 255) out of `value|HH:MM` lines, skipping anything else.
#[must_use]
pub fn parse_rain(text: &str) -> Vec<u8> {
    text.lines()
        .filter_map(|line| {
            let (value, _) = line.split_once('|')?;
            value
                .trim()
                .parse::<u8>()
                .inspect_err(|e| log::trace!("skipping rain line {line:?}: {e}"))
                .ok()
        })
        .collect()
}

/// Draws one filled column per sample, spread evenly over `area`, growing from its bottom.
pub fn draw_rain_graph(surface: &mut dyn Surface, area: Rect, rain: &[u8], color: Color) {
    let n = rain.len() as i32;
    rain.iter().zip(0..).for_each(|(&value, i)| {
        let (left, right) = (area.x + i * area.width / n, area.x + (i + 1) * area.width / n);
        let height = i32::from(value) * area.height / 255;
        surface.fill_rect(
            Rect::new(left, area.bottom() - height, right - left, height),
            color,
        );
    });
}

impl PopupContent for Weather {
    fn update(&mut self, surface: &mut dyn Surface) -> Res {
        let feed: Value = serde_json::from_str(&self.fetch(FEED_URL)?)?;
        let temperature = feel_temperature(&feed, &self.station)?;
        let rain = parse_rain(&self.fetch(&format!(
            "{RAIN_URL}?lat={}&lon={}",
            self.lat, self.lon
        ))?);
        log::trace!("feel temperature {temperature}, {} rain samples", rain.len());

        surface.fill_rect(surface.bounds(), self.bg);
        if let Some(background) = &self.background {
            surface.draw_image(0, 0, background);
        }
        draw_rain_graph(surface, GRAPH, &rain, self.graph);
        surface.draw_text(
            11,
            101,
            self.fg,
            &format!("Rainfall graph, it's {temperature}°C."),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::render::testing::{Op, RecordingSurface};

    #[test]
    fn finds_the_station() {
        let feed = json!({
            "actual": {
                "stationmeasurements": [
                    { "stationid": 6275, "feeltemperature": 3.1 },
                    { "stationid": 6260, "feeltemperature": -1.5 },
                ]
            }
        });
        assert_eq!(feel_temperature(&feed, "6260").ok(), Some(-1.5));
        assert!(matches!(
            feel_temperature(&feed, "1"),
            Err(Error::Data { .. })
        ));
        assert!(feel_temperature(&json!({}), "6260").is_err());
    }

    #[test]
    fn parses_rain_text() {
        let text = "000|14:05\n077|14:10\r\n255|14:15\ngarbage\n300|14:20\n";
        assert_eq!(parse_rain(text), vec![0, 77, 255]);
        assert!(parse_rain("").is_empty());
    }

    #[test]
    fn columns_fill_the_graph_area() {
        let mut surface = RecordingSurface::new(239, 111);
        let color = Color::rgb(1, 2, 3);
        draw_rain_graph(&mut surface, Rect::new(10, 0, 100, 51), &[0, 255, 51], color);
        assert_eq!(
            surface.ops(),
            vec![
                Op::Fill(Rect::new(10, 51, 33, 0), color),
                Op::Fill(Rect::new(43, 0, 33, 51), color),
                Op::Fill(Rect::new(76, 41, 34, 10), color),
            ]
        );
    }

    #[test]
    fn no_samples_draw_nothing() {
        let mut surface = RecordingSurface::new(10, 10);
        draw_rain_graph(&mut surface, GRAPH, &[], Color::default());
        assert!(surface.ops().is_empty());
    }
}
