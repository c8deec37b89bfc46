//! cidretro - Retrofit Community ID flow hashes into recorded JSON logs.
//!
//! Zeek (and similar) JSON logs written without the `community_id` field can
//! be joined with logs that have it once the id is added after the fact.
//! This library builds a uid -> community id index from a connection log and
//! inserts the id into every companion record sharing that uid, without
//! re-encoding anything else on the line.
//!
//! # Example
//!
//! ```no_run
//! use cidretro::config::{OutputMode, RetrofitOptions};
//! use cidretro::flow::CommunityId;
//! use cidretro::index::{IndexOutcome, UidIndexBuilder};
//! use cidretro::retrofit::RetrofitWriter;
//!
//! fn main() -> cidretro::Result<()> {
//!     let options = RetrofitOptions::new(OutputMode::Sibling);
//!     let builder = UidIndexBuilder::new(&options.fields, CommunityId::default());
//!
//!     if let IndexOutcome::Built(index) = builder.build("logs/conn.log")? {
//!         let report = RetrofitWriter::new(&options).retrofit(&index, "logs/dns.log")?;
//!         println!("{:?}", report.outcome);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod flow;
pub mod index;
pub mod io;
pub mod record;
pub mod retrofit;

pub use error::{Error, Result};
