mod progress;
mod styling;
mod summary;
mod tables;

pub use progress::PhaseProgress;
pub use styling::{dim, magenta_bold};
pub use summary::{print_collection_summary, print_report, StoredUsage};

/// Prints the actionboard banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("📈 actionboard"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("GitHub Actions Usage Collector")
    );
}
