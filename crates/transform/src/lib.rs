//! Transformations for the trade-flow pipeline.
//!
//! This crate handles:
//! - Currency and price-basis conversion (via the `PriceConverter` seam)
//! - Display names for countries
//! - Country-group expansion with overlap exclusion
//! - GDP totals and shares (via the `GdpSource` seam)
//! - Reshaping to country/partner/flow rows

pub mod prices;
pub mod currency;
pub mod names;
pub mod groups;
pub mod gdp;
pub mod reshape;
pub mod pipeline;

pub use prices::{PriceConverter, PriceTable};
pub use currency::{CurrencyConverter, IdColumn};
pub use names::attach_display_names;
pub use groups::{GroupExpander, GroupIndex};
pub use gdp::{GdpShareCalculator, GdpSource, WeoTable};
pub use reshape::reshape_to_country_flow;
pub use pipeline::TradePipeline;
