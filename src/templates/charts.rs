use maud::{html, Markup};

use crate::models::GenreCounts;

const WIDTH: f64 = 720.0;
const HEIGHT: f64 = 340.0;
const MARGIN_LEFT: f64 = 60.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 50.0;

const ACCENT: &str = "#1DB954";

/// Genres ordered by count (desc), then name, truncated to `limit`.
pub fn top_genres(genres: &GenreCounts, limit: usize) -> Vec<(String, u64)> {
    let mut ranked: Vec<(String, u64)> = genres
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(genre, count)| (genre.clone(), *count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}

/// Line chart of listening hours per weekday bucket.
pub fn weekly_listening_svg(hours: &[f64; 7], labels: &[String; 7]) -> Markup {
    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let max = hours.iter().cloned().fold(0.0_f64, f64::max);
    let scale = if max > 0.0 { max } else { 1.0 };

    let points: Vec<(f64, f64)> = hours
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let x = MARGIN_LEFT + plot_w * i as f64 / 6.0;
            let y = MARGIN_TOP + plot_h * (1.0 - value / scale);
            (x, y)
        })
        .collect();

    let polyline = points
        .iter()
        .map(|(x, y)| format!("{:.1},{:.1}", x, y))
        .collect::<Vec<_>>()
        .join(" ");

    let ticks = [0.0, scale / 2.0, scale];
    let baseline = MARGIN_TOP + plot_h;

    html! {
        svg xmlns="http://www.w3.org/2000/svg"
            width=(WIDTH) height=(HEIGHT)
            viewBox=(format!("0 0 {} {}", WIDTH, HEIGHT))
            font-family="Arial, sans-serif" {
            rect width=(WIDTH) height=(HEIGHT) fill="#ffffff" {}
            text x=(WIDTH / 2.0) y="24" text-anchor="middle" font-size="16" font-weight="bold" {
                "Weekly Listening Insights"
            }

            @for tick in ticks {
                @let y = MARGIN_TOP + plot_h * (1.0 - tick / scale);
                line x1=(MARGIN_LEFT) y1=(y) x2=(WIDTH - MARGIN_RIGHT) y2=(y)
                    stroke="#dddddd" stroke-dasharray="4 4" {}
                text x=(MARGIN_LEFT - 8.0) y=(y + 4.0) text-anchor="end" font-size="11" fill="#666666" {
                    (format!("{:.1}h", tick))
                }
            }

            line x1=(MARGIN_LEFT) y1=(baseline) x2=(WIDTH - MARGIN_RIGHT) y2=(baseline)
                stroke="#999999" {}

            polyline points=(polyline) fill="none" stroke=(ACCENT) stroke-width="2.5" {}

            @for ((x, y), label) in points.iter().zip(labels.iter()) {
                circle cx=(format!("{:.1}", x)) cy=(format!("{:.1}", y)) r="4" fill=(ACCENT) {}
                text x=(format!("{:.1}", x)) y=(baseline + 20.0) text-anchor="middle" font-size="11" fill="#333333" {
                    (label)
                }
            }
        }
    }
}

/// Horizontal bar chart of the most frequent genres.
pub fn genre_distribution_svg(genres: &GenreCounts, limit: usize) -> Markup {
    let ranked = top_genres(genres, limit);
    let total: u64 = ranked.iter().map(|(_, c)| c).sum();
    let max = ranked.first().map(|(_, c)| *c).unwrap_or(1).max(1);

    let label_w = 200.0;
    let bar_max_w = WIDTH - label_w - 110.0;
    let row_h = 28.0;
    let height = MARGIN_TOP + row_h * ranked.len() as f64 + 20.0;

    html! {
        svg xmlns="http://www.w3.org/2000/svg"
            width=(WIDTH) height=(height)
            viewBox=(format!("0 0 {} {}", WIDTH, height))
            font-family="Arial, sans-serif" {
            rect width=(WIDTH) height=(height) fill="#ffffff" {}
            text x=(WIDTH / 2.0) y="24" text-anchor="middle" font-size="16" font-weight="bold" {
                "Top " (ranked.len()) " Genre Distribution"
            }

            @for (i, (genre, count)) in ranked.iter().enumerate() {
                @let y = MARGIN_TOP + row_h * i as f64;
                @let bar_w = bar_max_w * *count as f64 / max as f64;
                @let share = 100.0 * *count as f64 / total.max(1) as f64;
                text x=(label_w - 10.0) y=(y + 17.0) text-anchor="end" font-size="12" fill="#333333" {
                    (genre)
                }
                rect x=(label_w) y=(y + 4.0) width=(format!("{:.1}", bar_w)) height=(row_h - 8.0)
                    rx="3" fill=(ACCENT) {}
                text x=(format!("{:.1}", label_w + bar_w + 8.0)) y=(y + 17.0) font-size="11" fill="#666666" {
                    (count) " (" (format!("{:.1}%", share)) ")"
                }
            }
        }
    }
}
