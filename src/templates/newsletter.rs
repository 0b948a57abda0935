use chrono::NaiveDate;
use maud::{html, Markup, DOCTYPE};

use crate::models::TrackPlayCount;

pub const WEEKLY_CHART_CID: &str = "weekly_chart";
pub const GENRE_CHART_CID: &str = "genre_chart";

const ACCENT: &str = "#1DB954";

pub struct NewsletterView<'a> {
    pub display_name: &'a str,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_hours: f64,
    pub top_tracks: &'a [TrackPlayCount],
    pub has_weekly_chart: bool,
    pub has_genre_chart: bool,
    pub dashboard_url: &'a str,
}

pub fn newsletter_page(view: &NewsletterView) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { "Your Weekly Spotify Insights" }
            }
            body style="font-family: Arial, sans-serif; color: #333; margin: 0; padding: 20px;" {
                (header())

                div style="background-color: #f9f9f9; padding: 20px; border-radius: 0 0 5px 5px;" {
                    (key_metrics(view))

                    (section_heading("Listening Trends"))
                    @if view.has_weekly_chart {
                        p style="font-size: 16px;" { "Your weekly listening pattern:" }
                        img src=(format!("cid:{}", WEEKLY_CHART_CID)) alt="Weekly Listening"
                            style="max-width: 100%; border: 1px solid #ddd; border-radius: 5px;";
                    } @else {
                        p style="font-size: 16px; color: #666;" { "No listening activity recorded this week." }
                    }

                    (section_heading("Genre Distribution"))
                    @if view.has_genre_chart {
                        p style="font-size: 16px;" { "Check out your top genres this week:" }
                        img src=(format!("cid:{}", GENRE_CHART_CID)) alt="Genre Distribution"
                            style="max-width: 100%; border: 1px solid #ddd; border-radius: 5px;";
                    } @else {
                        p style="font-size: 16px; color: #666;" { "No genre information available yet." }
                    }

                    (section_heading("Explore More"))
                    p style="font-size: 16px;" { "Discover more detailed insights and explore your music trends." }
                    (button(view.dashboard_url, "Visit Your Dashboard"))

                    p style="margin-top: 30px; font-size: 14px; color: #666;" { "Keep rocking those tunes!" }
                }
            }
        }
    }
}

fn header() -> Markup {
    html! {
        div style=(format!("background-color: {}; padding: 15px; text-align: center; border-radius: 5px 5px 0 0;", ACCENT)) {
            h1 style="color: white; margin: 0; font-size: 24px;" { "Your Weekly Spotify Insights" }
        }
    }
}

fn key_metrics(view: &NewsletterView) -> Markup {
    html! {
        (section_heading("Key Metrics"))
        p style="font-size: 16px;" {
            "Hi " (view.display_name) ", here's your music summary for the week of "
            (view.period_start.format("%B %d")) " - " (view.period_end.format("%B %d, %Y")) ":"
        }
        p style="font-size: 18px; font-weight: bold;" {
            "Total Listening Time: " (format!("{:.1}", view.total_hours)) " hours"
        }

        h3 style="font-size: 18px; color: #333;" { "Top 5 Tracks This Week:" }
        @if view.top_tracks.is_empty() {
            p style="color: #666;" { "No plays recorded this week." }
        } @else {
            ul style="list-style-type: none; padding: 0;" {
                @for track in view.top_tracks {
                    li style="margin: 10px 0;" {
                        span style="font-weight: bold;" { (track.track_name) }
                        " by " (track.artist_name) " "
                        span style="color: #666;" {
                            "(" (track.play_count) @if track.play_count == 1 { " play)" } @else { " plays)" }
                        }
                    }
                }
            }
        }
    }
}

fn section_heading(title: &str) -> Markup {
    html! {
        h2 style=(format!(
            "color: {0}; font-size: 20px; border-bottom: 2px solid {0}; padding-bottom: 5px; margin-top: 30px;",
            ACCENT
        )) {
            (title)
        }
    }
}

fn button(href: &str, label: &str) -> Markup {
    html! {
        a href=(href)
            style=(format!(
                "display: inline-block; background-color: {}; color: white; padding: 10px 20px; text-decoration: none; border-radius: 5px; font-size: 16px; font-weight: bold;",
                ACCENT
            )) {
            (label)
        }
    }
}
