//! R and Deno guests for replbridge.
//!
//! Each guest module offers a launch recipe (`launch_spec`), shortcuts that
//! start an engine (`start`, `start_with`), and the guest type implementing
//! [`Dialect`](replbridge_core::Dialect) and [`Guest`](replbridge_core::Guest).
//!
//! ```rust,ignore
//! let deno = replbridge_guests::deno::start()?;
//! let joined = deno.handle("Array").call(&[4.into(), 5.into()])?.index("join")?.call(&[3.into()])?;
//! assert_eq!(joined.to_value()?, "435".into());
//! ```

mod check;
mod csv;
pub mod deno;
pub mod r;

pub use check::{check_deno, check_guest, check_r, GuestCheck};
pub use deno::DenoGuest;
pub use r::RGuest;
