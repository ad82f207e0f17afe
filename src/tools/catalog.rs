//! The assistant's built-in function set.

use super::dispatcher::ToolRegistry;
use super::remote::HttpFunctionTool;
use super::types::ToolParameters;
use crate::config::AssistantConfig;
use crate::error::Result;

const TICKER: &str = "Ticker symbol for the company (e.g., DOCU.US).";

/// Name, description and parameter schema of every built-in function.
pub fn function_catalog() -> Vec<(&'static str, &'static str, ToolParameters)> {
    let ticker_only = || ToolParameters::object().string("ticker", TICKER, true).build();
    let ticker_list = |example: &str| {
        ToolParameters::object()
            .string_list(
                "tickers",
                format!("List of ticker symbols (e.g., {example}) or a single comma-separated string."),
                true,
            )
            .build()
    };

    vec![
        (
            "get_company_overview",
            "Retrieve the overview of a company based on the ticker symbol. Retrieved information: name, ticker, sector, industry, market cap, market cap category, beta, most recent quarter.",
            ticker_only(),
        ),
        (
            "get_earnings_surprise",
            "Retrieve last five quarters reporting dates, actual vs estimated EPS and related surprise, price evolution 5 days before and after the reporting based on the ticker symbol.",
            ticker_only(),
        ),
        (
            "get_multiples",
            "Retrieve price multiples for ticker symbol and its peer companies: PE, Forward PE, PEG, price-to-book, price-to-sales, EV-to-Sales, EV-to-EBITDA.",
            ticker_only(),
        ),
        (
            "get_financial_ratios",
            "Retrieve financial ratios for ticker symbol and its related peer companies: ROA, ROE, operating margin, net margin, Y/Y evolution of last quarter revenues and net income, leverage, last reported period.",
            ticker_only(),
        ),
        (
            "get_multiples_list",
            "Retrieve valuation multiples for a list of tickers (no pre-set peers). Returns per-ticker: PE, Forward PE, PEG, price-to-book, price-to-sales, EV-to-Sales, EV-to-EBITDA.",
            ticker_list("AAPL.US,UBER.US"),
        ),
        (
            "get_financial_ratios_list",
            "Retrieve core financial ratios for a list of tickers (no pre-set peers). Returns per-ticker: ROA, ROE, operating margin, net margin, leverage, Y/Y evolution of last quarter revenues and net income, last reported period.",
            ticker_list("AAPL.US,AMZN.US"),
        ),
        (
            "get_summary_news",
            "Retrieve sentiment-scored news summaries for a company over a specified period. Supports filtering for latest, most positive, or most negative news items.",
            ToolParameters::object()
                .string("ticker", "Ticker symbol for the company (e.g., CAVA.US).", true)
                .string(
                    "period",
                    "Look-back period for the news query. Format is a number followed by a letter (d=days, w=weeks, m=months). Examples: 1d, 5w, 3m.",
                    false,
                )
                .string_enum(
                    "mode",
                    "Type of news to return: 'latest' for all, 'positive' for most positive 25%, or 'negative' for most negative 25%.",
                    &["latest", "positive", "negative"],
                    false,
                )
                .build(),
        ),
        (
            "get_weather",
            "Get the weather for a given location",
            ToolParameters::object()
                .string("location", "Location to get weather for", true)
                .string_enum("unit", "Unit to get weather in", &["celsius", "fahrenheit"], false)
                .build(),
        ),
        (
            "get_joke",
            "Get a programming joke",
            ToolParameters::object()
                .string("topic", "Optional topic or keyword to include in the joke", false)
                .build(),
        ),
    ]
}

/// A registry holding an [`HttpFunctionTool`] for every catalog entry.
pub fn http_function_registry(config: &AssistantConfig) -> Result<ToolRegistry> {
    let client = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .build()?;
    let mut registry = ToolRegistry::new();
    for (name, description, parameters) in function_catalog() {
        registry.register(
            HttpFunctionTool::new(
                name,
                description,
                parameters,
                config.functions_base_url.clone(),
                client.clone(),
            )
            .with_api_key(config.api_key.clone()),
        );
    }
    Ok(registry)
}
