//! Local function tools.
//!
//! The registry maps function names to handlers and keeps the schemas the
//! model needs to call them. It is built once at startup and shared
//! immutably across sessions; the bridge dispatches against whatever was
//! registered, nothing global.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::upstream::SessionTool;

/// A tool handler: raw JSON arguments in, JSON string result out.
///
/// Handlers are synchronous and must not block; anything slow belongs on
/// an MCP server, which the service executes off our thread.
pub type ToolHandler = Arc<dyn Fn(&Map<String, Value>) -> String + Send + Sync>;

/// Immutable registry of locally dispatched function tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, ToolHandler>,
    schemas: Vec<SessionTool>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function tool with its schema and handler.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: impl Fn(&Map<String, Value>) -> String + Send + Sync + 'static,
    ) {
        let name = name.into();
        self.schemas.push(SessionTool::Function {
            name: name.clone(),
            description: Some(description.into()),
            parameters: Some(parameters),
        });
        self.handlers.insert(name, Arc::new(handler));
    }

    /// Look up the handler for a function name.
    pub fn handler(&self, name: &str) -> Option<&ToolHandler> {
        self.handlers.get(name)
    }

    /// Registered function names.
    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Schemas to advertise in the session configuration.
    pub fn session_tools(&self) -> Vec<SessionTool> {
        self.schemas.clone()
    }

    /// The built-in demo tools: a stock quote and a weather lookup, both
    /// returning canned data.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.register(
            "get_stock_price",
            "Get the current stock price for a given ticker symbol",
            json!({
                "type": "object",
                "properties": {
                    "symbol": {
                        "type": "string",
                        "description": "Stock ticker symbol, e.g. MSFT, AAPL, GOOGL",
                    },
                },
                "required": ["symbol"],
            }),
            get_stock_price,
        );

        registry.register(
            "get_weather",
            "Get the current weather for a city",
            json!({
                "type": "object",
                "properties": {
                    "city": {
                        "type": "string",
                        "description": "City name, e.g. Seattle, New York, London",
                    },
                },
                "required": ["city"],
            }),
            get_weather,
        );

        registry
    }
}

/// Canned stock quote. A real deployment would query a market-data API.
fn get_stock_price(arguments: &Map<String, Value>) -> String {
    let symbol = arguments
        .get("symbol")
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN")
        .to_uppercase();

    let (price, change) = match symbol.as_str() {
        "MSFT" => (425.30, "+1.2%"),
        "AAPL" => (198.50, "-0.4%"),
        "GOOGL" => (178.20, "+0.8%"),
        "AMZN" => (186.90, "+1.5%"),
        _ => (100.00, "0.0%"),
    };
    json!({"symbol": symbol, "price": price, "change": change}).to_string()
}

/// Canned weather report. A real deployment would query a weather API.
fn get_weather(arguments: &Map<String, Value>) -> String {
    let city = arguments
        .get("city")
        .and_then(Value::as_str)
        .unwrap_or("Unknown");

    json!({
        "city": city,
        "temperature": "62°F / 17°C",
        "condition": "Partly cloudy",
        "humidity": "58%",
    })
    .to_string()
}
