//! Domain types shared by the fetcher, the merger, and the store.

pub mod bar;

pub use bar::{BarKey, DailyBar};
