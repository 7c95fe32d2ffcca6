//! Stock price forecasting pipeline: fetch a ticker's daily history,
//! validate it into a clean `(date, close)` series, fit an additive
//! trend/seasonality model and shape the results for display.

pub mod cache;
pub mod config;
pub mod data;
pub mod forecast;
pub mod pipeline;
pub mod present;
pub mod source;
