//! Bounded fan-out of one job per host.
//!
//! Each job gets the host name and builds whatever it needs from it,
//! typically its own [`Session`](crate::Session). Nothing mutable is shared
//! between jobs, and one host's failure never stops the others.
//!
//! ```rust,no_run
//! use netops::{Credentials, Session, batch};
//!
//! # async fn example() {
//! let results = batch::run_per_host(["10.0.0.1", "10.0.0.2"], 8, |host| async move {
//!     let mut session = Session::builder(host).build()?;
//!     session.open(Credentials::new("admin", "secret")).await?;
//!     let version = session.get("version").await;
//!     session.close().await?;
//!     version
//! })
//! .await;
//!
//! for (host, result) in results {
//!     match result {
//!         Ok(output) => println!("{host}: {} bytes", output.len()),
//!         Err(e) => eprintln!("{host}: {e}"),
//!     }
//! }
//! # }
//! ```

use std::future::Future;

use futures_core::Stream;
use futures_util::stream::{self, StreamExt};

use crate::error::Result;

/// Run `job` for every host with at most `concurrency` in flight, yielding
/// `(host, result)` pairs as jobs complete.
///
/// A concurrency of zero is treated as one.
pub fn stream_per_host<I, H, F, Fut, T>(
    hosts: I,
    concurrency: usize,
    mut job: F,
) -> impl Stream<Item = (String, Result<T>)>
where
    I: IntoIterator<Item = H>,
    H: Into<String>,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    stream::iter(hosts.into_iter().map(|host| host.into()))
        .map(move |host: String| {
            let pending = job(host.clone());
            async move { (host, pending.await) }
        })
        .buffer_unordered(concurrency.max(1))
}

/// Run `job` for every host with at most `concurrency` in flight.
///
/// Results are returned in completion order, one per host.
pub async fn run_per_host<I, H, F, Fut, T>(
    hosts: I,
    concurrency: usize,
    job: F,
) -> Vec<(String, Result<T>)>
where
    I: IntoIterator<Item = H>,
    H: Into<String>,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    stream_per_host(hosts, concurrency, job).collect().await
}
