pub mod charts;
pub mod newsletter;

pub use charts::{genre_distribution_svg, top_genres, weekly_listening_svg};
pub use newsletter::newsletter_page;
