mod progress;
mod styling;
mod summary;
mod tables;

pub use progress::PhaseProgress;
pub use styling::{bright_green, bright_red, dim, magenta_bold};
pub use summary::{print_stages, print_summary, render_summary};

/// Prints the `cistatus` banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🚦 cistatus"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("CI pipeline status aggregation")
    );
}
