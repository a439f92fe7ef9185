pub mod coingecko;
pub mod sentiment;

pub use coingecko::CoinGeckoClient;
pub use sentiment::FearGreedClient;
