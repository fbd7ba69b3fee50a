pub mod news;

pub use news::{slugify, NewsService};
