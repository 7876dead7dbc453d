//! Renders branch results and failures into the final answer text.

use crate::{
    agent::weather::celsius_to_fahrenheit,
    error::{AgentError, ErrorKind},
    model::{DistanceResult, Units, WeatherReport},
};

const MPH_PER_MPS: f64 = 2.236_94;

pub const CLARIFICATION: &str = "I can tell you the current weather in a city or the distance \
between two cities. Try something like \"What's the weather in London?\" or \"How far is \
Barcelona from Madrid?\"";

/// Weather text, then distance text, then one note per error. If nothing
/// succeeded the whole answer is an apology naming each failure.
pub fn compose(
    weather: Option<&WeatherReport>,
    distance: Option<&DistanceResult>,
    errors: &[AgentError],
) -> String {
    if weather.is_none() && distance.is_none() {
        return apology(errors);
    }

    let mut sections = Vec::with_capacity(2 + errors.len());
    sections.extend(weather.map(weather_text));
    sections.extend(distance.map(distance_text));
    sections.extend(errors.iter().map(|e| format!("Note: {}.", failure_text(e))));
    sections.join("\n")
}

pub fn weather_text(report: &WeatherReport) -> String {
    let feels_like_f = celsius_to_fahrenheit(report.feels_like_c);
    let (temp, feels, wind) = match report.units {
        Units::Metric => (
            format!("{:.1}°C ({:.1}°F)", report.temperature_c, report.temperature_f),
            format!("{:.1}°C", report.feels_like_c),
            format!("{:.1} m/s", report.wind_speed_mps),
        ),
        Units::Imperial => (
            format!("{:.1}°F ({:.1}°C)", report.temperature_f, report.temperature_c),
            format!("{feels_like_f:.1}°F"),
            format!("{:.1} mph", report.wind_speed_mps * MPH_PER_MPS),
        ),
    };

    format!(
        "Weather in {}: {temp}, {}. Feels like {feels}, humidity {}%, wind {wind}.",
        report.city.name, report.condition, report.humidity_pct,
    )
}

pub fn distance_text(result: &DistanceResult) -> String {
    format!(
        "Distance from {} to {}: {:.1} km ({:.1} miles).",
        result.from.name, result.to.name, result.kilometers, result.miles
    )
}

fn failure_text(err: &AgentError) -> String {
    match &err.city {
        Some(city) if err.kind == ErrorKind::AmbiguousQuery => {
            format!("{city} was left out, ask about it separately ({})", err.kind)
        }
        Some(city) => format!("couldn't get results for {city} ({})", err.kind),
        None => format!("part of your request couldn't be answered ({})", err.kind),
    }
}

fn apology(errors: &[AgentError]) -> String {
    if errors.is_empty() {
        return "Sorry, I couldn't find an answer to that.".to_string();
    }
    let failures: Vec<String> = errors
        .iter()
        .map(|e| match &e.city {
            Some(city) => format!("{city}: {}", e.kind),
            None => e.kind.to_string(),
        })
        .collect();
    format!("Sorry, I couldn't answer that ({}).", failures.join("; "))
}
