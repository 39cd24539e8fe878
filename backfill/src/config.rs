use std::{str::FromStr, time::Duration};

use anyhow::Context;
use derive_builder::Builder;
use derive_getters::Getters;
use garde::Validate;
use types::{Market, Window};
use upbit_api::UPBIT_API_URL;

use crate::pipeline::{BackfillSettings, BackfillSettingsBuilder};

pub const DEFAULT_MARKET: &str = "KRW-ETH";
pub const DEFAULT_START: &str = "2022-12-07";

#[derive(Debug, Clone, Builder, Getters, Validate)]
pub struct BackfillConfig {
    #[garde(length(min = 1))]
    upbit_api_url: String,
    #[garde(length(min = 1))]
    database_url: String,
    #[builder(default)]
    #[garde(skip)]
    redis_url: Option<String>,
    #[garde(skip)]
    market: Market,
    #[builder(default = "200")]
    #[garde(range(min = 1, max = 200))]
    page_size: u16,
    #[builder(default = "3")]
    #[garde(range(min = 1))]
    stall_threshold: u32,
    #[builder(default = "100")]
    #[garde(skip)]
    page_delay_ms: u64,
    #[garde(skip)]
    window: Window,
}

impl BackfillConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        return Self::from_lookup(|name| std::env::var(name).ok());
    }

    /// Builds the configuration out of `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|x| !x.trim().is_empty());
        let mut builder = BackfillConfigBuilder::default();

        builder
            .upbit_api_url(var("UPBIT_API_URL").unwrap_or_else(|| UPBIT_API_URL.to_owned()))
            .database_url(var("DATABASE_URL").context("DATABASE_URL from .env file")?)
            .redis_url(var("REDIS_URL"))
            .market(
                Market::from_str(&var("BACKFILL_MARKET").unwrap_or_else(|| DEFAULT_MARKET.to_owned()))
                    .context("BACKFILL_MARKET")?,
            )
            .window(
                Window::parse(
                    &var("BACKFILL_START").unwrap_or_else(|| DEFAULT_START.to_owned()),
                    var("BACKFILL_END").as_deref(),
                )
                .context("BACKFILL_START / BACKFILL_END")?,
            );
        if let Some(x) = var("BACKFILL_PAGE_SIZE") {
            builder.page_size(x.trim().parse().context("BACKFILL_PAGE_SIZE")?);
        }
        if let Some(x) = var("BACKFILL_STALL_THRESHOLD") {
            builder.stall_threshold(x.trim().parse().context("BACKFILL_STALL_THRESHOLD")?);
        }
        if let Some(x) = var("BACKFILL_PAGE_DELAY_MS") {
            builder.page_delay_ms(x.trim().parse().context("BACKFILL_PAGE_DELAY_MS")?);
        }
        let config = builder.build().context("Building BackfillConfig")?;

        config
            .validate(&())
            .context("Validating BackfillConfig")?;
        return Ok(config);
    }

    pub fn settings(&self) -> anyhow::Result<BackfillSettings> {
        return BackfillSettingsBuilder::default()
            .page_size(self.page_size)
            .stall_threshold(self.stall_threshold)
            .page_delay(Duration::from_millis(self.page_delay_ms))
            .build()
            .context("Building BackfillSettings");
    }
}
