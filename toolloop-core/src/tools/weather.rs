// toolloop-core/src/tools/weather.rs

//! Demo tools: a user-location lookup driven purely by the execution context
//! and a city weather lookup. Both are backed by small static tables and have
//! no side effects, so they are safe to abandon mid-call.

use super::{Tool, ToolHandler, ToolOutput, ToolRegistry};
use crate::context::ExecutionContext;
use crate::errors::LoopError;
use crate::models::tools::{ToolInput, ToolParameterType, ToolParametersDefinition};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

pub const GET_USER_LOCATION: &str = "get_user_location";
pub const GET_WEATHER: &str = "get_weather";
pub const USER_ID_KEY: &str = "user_id";

const USER_LOCATIONS: &[(&str, &str)] = &[
    ("1", "New York"),
    ("2", "Paris"),
    ("3", "Tokyo"),
    ("4", "London"),
];

// (city, condition, temperature in °C)
const FORECASTS: &[(&str, &str, i64)] = &[
    ("new york", "Sunny", 24),
    ("paris", "Cloudy", 17),
    ("tokyo", "Rainy", 19),
    ("london", "Foggy", 12),
    ("san francisco", "Foggy", 15),
    ("sydney", "Windy", 21),
];

/// Resolves the requesting user's city from the `user_id` context key.
/// Takes no arguments: the model cannot and need not supply the user.
pub struct UserLocationHandler;

#[async_trait]
impl ToolHandler for UserLocationHandler {
    async fn call(&self, _input: ToolInput, context: &ExecutionContext) -> Result<ToolOutput> {
        let user_id = context.require(GET_USER_LOCATION, USER_ID_KEY)?;
        let city = USER_LOCATIONS
            .iter()
            .find(|(id, _)| *id == user_id)
            .map(|(_, city)| *city)
            .ok_or_else(|| anyhow!("no location is on record for the current user"))?;
        debug!(tool = GET_USER_LOCATION, "Resolved user location");
        Ok(ToolOutput::Text(city.to_string()))
    }
}

/// Looks up current conditions for a city.
pub struct WeatherHandler;

#[async_trait]
impl ToolHandler for WeatherHandler {
    async fn call(&self, input: ToolInput, _context: &ExecutionContext) -> Result<ToolOutput> {
        let city = input
            .get_str("city")
            .ok_or_else(|| anyhow!("'city' argument missing after validation"))?;
        let (name, condition, temp_c) = lookup_forecast(city)
            .ok_or_else(|| anyhow!("no weather data available for '{}'", city))?;
        debug!(tool = GET_WEATHER, city = %name, "Weather lookup succeeded");
        Ok(ToolOutput::Structured(json!({
            "city": name,
            "condition": condition,
            "temperature_c": temp_c,
        })))
    }
}

fn lookup_forecast(city: &str) -> Option<(String, &'static str, i64)> {
    let wanted = city.trim().to_lowercase();
    FORECASTS
        .iter()
        .find(|(name, _, _)| *name == wanted)
        .map(|(_, condition, temp)| (city.trim().to_string(), *condition, *temp))
}

pub fn user_location_tool() -> Tool {
    Tool::new(
        GET_USER_LOCATION,
        "Returns the city the current user is located in. Takes no arguments; \
         use it whenever the user refers to their own location (e.g. 'outside', 'here').",
        ToolParametersDefinition::empty(),
        Arc::new(UserLocationHandler),
    )
    .requires_context(USER_ID_KEY)
}

pub fn weather_tool() -> Tool {
    Tool::new(
        GET_WEATHER,
        "Returns the current weather condition and temperature for a city.",
        ToolParametersDefinition::empty().with_param(
            "city",
            ToolParameterType::String,
            "Name of the city, e.g. 'Paris'",
            true,
        ),
        Arc::new(WeatherHandler),
    )
}

/// The two-tool registry used by the weather demo.
pub fn weather_registry() -> Result<ToolRegistry, LoopError> {
    ToolRegistry::new()
        .with_tool(user_location_tool())?
        .with_tool(weather_tool())
}
