//! # Events Module
//!
//! Event-driven progress reporting for the export and dedup workflows.
//!
//! ## Design
//! The core library emits events through channels, allowing any UI
//! (CLI, GUI, web) to subscribe and display progress.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Export(ExportEvent::Waiting { attempt, .. }) => {
//!                 println!("Still waiting (poll {})", attempt)
//!             }
//!             Event::Dedup(DedupEvent::Progress(p)) => {
//!                 println!("Fingerprinted {}/{}", p.completed, p.total)
//!             }
//!             _ => {}
//!         }
//!     }
//! });
//!
//! manager.retrieve_with_events(&request, &sender)?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
