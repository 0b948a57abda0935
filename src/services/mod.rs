pub mod charts;
pub mod mailer;
pub mod newsletter;
pub mod spotify;
pub mod token_refresher;

pub use charts::{ChartArtifact, ChartRenderer, SvgChartRenderer};
pub use mailer::{ComposedMessage, HttpMailer, InlineAttachment, Mailer, OutboxMailer};
pub use newsletter::{NewsletterService, NewsletterSettings};
pub use spotify::{
    PlayHistoryItem, SpotifyArtist, SpotifyProfile, SpotifyService, SpotifyTrack, TokenResponse,
    UserClient,
};
pub use token_refresher::TokenRefresher;
