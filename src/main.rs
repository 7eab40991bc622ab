//! # anno-fetch CLI
//!
//! Command-line interface for export retrieval and image deduplication.
//!
//! ## Usage
//! ```bash
//! anno-fetch export bumper-2021 --dest annos --statuses review,complete
//! anno-fetch dedup ./images --output json
//! ```

mod cli;

use anno_fetch::Result;

fn main() -> Result<()> {
    cli::run()
}
