//! Policy document model and client core for TOS, an S3-compatible object
//! storage service.
//!
//! The crate has two halves:
//!
//! - [`policy`]: bucket policy documents ([`Rules`], [`Statement`],
//!   [`Principals`], [`Compact`]) that round-trip losslessly through the
//!   service's IAM-style JSON.
//! - [`Client`] and [`Session`]: an immutable, thread-safe client that
//!   resolves bucket hosts, acquires credentials, signs requests and
//!   translates service errors. A [`blocking::Client`] wraps it for
//!   synchronous code.
//!
//! # Quick Start (async)
//!
//! ```no_run
//! use rs_tos::policy::{Principals, Rules, Statement};
//! use rs_tos::{Context, Session, StaticProvider};
//!
//! # async fn example() -> rs_tos::Result<()> {
//! let session = Session::builder()
//!     .credentials(StaticProvider::new("your-access-key", "your-secret-key"))
//!     .build();
//! let client = session.new_client("tos-cn-beijing.volces.com")?;
//!
//! let rules = Rules::new().with_statement(
//!     Statement::allow()
//!         .with_principals(Principals::All)
//!         .with_actions("tos:GetObject")
//!         .with_resources("trn:tos:::my-bucket/*"),
//! );
//!
//! let ctx = Context::background();
//! client.put_bucket_policy(&ctx, "my-bucket", &rules).await?;
//! let stored = client.get_bucket_policy(&ctx, "my-bucket").await?;
//! println!("{}", stored.rules.to_json()?);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod credential;
pub mod error;
pub mod policy;
pub mod request;
pub mod response;
pub mod session;
pub mod sign;
pub mod transport;

#[cfg(feature = "blocking")]
pub mod blocking;

mod exec;

pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, TransportConfig};
pub use context::Context;
pub use credential::{
    ChainProvider, Credentials, CredentialsProvider, EnvProvider, HttpTokenSource,
    RefreshingProvider, StaticProvider, TokenSource,
};
pub use error::{ErrorKind, Result, TosError};
pub use policy::{Compact, Principals, Rules, Statement};
pub use request::OperationRequest;
pub use session::{Session, SessionBuilder};
pub use sign::{Signer, V4Signer};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Transport};

// Compile-time assertions: key types must be Send + Sync for use across threads.
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<Client>;
    let _ = assert_send_sync::<Session>;
    let _ = assert_send_sync::<TosError>;
    let _ = assert_send_sync::<Credentials>;
    let _ = assert_send_sync::<HttpTransport>;
    let _ = assert_send_sync::<Rules>;
};
