//! Colored terminal output for the person running the tool.
//!
//! Diagnostics go through `tracing`; this is the user-facing progress log.

use crate::playlist::{ProgressEvent, UpdateSummary, VideoOutcome};
use crossterm::style::{StyledContent, Stylize};

const TAG: &str = "[D2P]";

fn tag(outcome: VideoOutcome) -> StyledContent<&'static str> {
    match outcome {
        VideoOutcome::Added => TAG.blue().bold(),
        VideoOutcome::AlreadyInPlaylist => TAG.yellow().bold(),
        VideoOutcome::NotFound => TAG.red().bold(),
    }
}

/// One line describing what happened to a video.
pub fn progress_line(event: &ProgressEvent<'_>) -> String {
    let percent = event.percent_label();
    let video = event.video_id.green();
    match event.outcome {
        VideoOutcome::Added => format!(
            "{} {percent} Adding {video} to {}",
            tag(event.outcome),
            event.playlist_id.green()
        ),
        VideoOutcome::AlreadyInPlaylist => format!(
            "{} {percent} Skipping {video} Video already in playlist",
            tag(event.outcome)
        ),
        VideoOutcome::NotFound => {
            format!("{} {percent} Skipping {video} Video not found", tag(event.outcome))
        }
    }
}

pub fn print_progress(event: &ProgressEvent<'_>) {
    println!("{}", progress_line(event));
}

pub fn print_summary(playlist_id: &str, summary: &UpdateSummary) {
    println!(
        "{} Done with {}: {} added, {} already present, {} not found",
        TAG.green().bold(),
        playlist_id.green(),
        summary.added,
        summary.already_present,
        summary.not_found
    );
}

/// Tells the user there was nothing to do.
pub fn print_no_links() {
    println!(
        "{} No YouTube links found in the scanned range",
        TAG.yellow().bold()
    );
}

/// Prints `report` with its cause chain to stderr.
pub fn print_fatal(report: &eyre::Report) {
    eprintln!("{} {}", TAG.red().bold(), format!("{report:#}").red().bold());
}
