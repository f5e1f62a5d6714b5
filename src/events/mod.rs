//! # Events Module
//!
//! Progress reporting for long-running phases (walking, fingerprinting,
//! applying a plan).
//!
//! ## Design
//! The engine emits events through channels, so any front end (CLI, HTTP
//! service) can subscribe and display progress without the core knowing
//! about terminals or sockets.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Fingerprint(FingerprintEvent::Progress(p)) = event {
//!             println!("hashed {}/{}", p.completed, p.total);
//!         }
//!     }
//! });
//!
//! engine.fingerprint_all(&records, strategy, &sender);
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
