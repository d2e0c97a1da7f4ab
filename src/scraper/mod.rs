pub mod collector;
pub mod extract;
pub mod renderer;
mod scraper;
mod scraper_error;

pub use extract::FieldExtractor;
pub use renderer::BrowserlessRenderer;
pub use scraper::{CrawlSettings, ListingScraper, DEFAULT_MIN_PRICE};
pub use scraper_error::ScraperError;
