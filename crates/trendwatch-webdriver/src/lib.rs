//! WebDriver backend for trendwatch
//!
//! Implements the browser capability traits against any W3C WebDriver server
//! (chromedriver, geckodriver, a Selenium grid). One browsing context maps to
//! one WebDriver session.

mod browser;
mod wire;

pub use browser::*;
pub use wire::{WebDriverConfig, BrowserKind};
