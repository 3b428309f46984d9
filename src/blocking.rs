//! Synchronous (blocking) client for the TOS API.
//!
//! This module is only available when the `blocking` feature is enabled.
//! It mirrors the async [`crate::Client`] API by driving it on an internal
//! current-thread tokio runtime.
//!
//! # When to Use
//!
//! Use the blocking client when:
//! - You're writing a CLI tool or simple script
//! - You prefer synchronous code style
//!
//! Use the async [`crate::Client`] when you need concurrency, or when the
//! caller already runs inside a tokio runtime: calling the blocking client
//! from async code panics.
//!
//! # Example
//!
//! ```no_run
//! use rs_tos::blocking::Client;
//! use rs_tos::Context;
//!
//! fn main() -> rs_tos::Result<()> {
//!     let client = Client::from_env()?;
//!     let policy = client.get_bucket_policy(&Context::background(), "my-bucket")?;
//!     println!("{}", policy.rules.to_json()?);
//!     Ok(())
//! }
//! ```

use std::fmt;

use bytes::Bytes;
use tokio::runtime::{Builder, Runtime};

use crate::context::Context;
use crate::error::{Result, TosError};
use crate::policy::Rules;
use crate::request::OperationRequest;
use crate::response::{
    DeleteBucketPolicyOutput, GetBucketPolicyOutput, GetObjectOutput, HeadBucketOutput,
    PutBucketPolicyOutput, PutObjectOutput,
};

/// Synchronous client for the TOS API.
pub struct Client {
    inner: crate::Client,
    runtime: Runtime,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").field("inner", &self.inner).finish_non_exhaustive()
    }
}

impl Client {
    /// Wraps an async client.
    pub fn new(inner: crate::Client) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TosError::InvalidArgument(format!("Failed to build runtime: {}", e)))?;
        Ok(Self { inner, runtime })
    }

    /// See [`crate::Client::from_env`].
    pub fn from_env() -> Result<Self> {
        Self::new(crate::Client::from_env()?)
    }

    /// The wrapped async client.
    pub fn inner(&self) -> &crate::Client {
        &self.inner
    }

    /// Runs a raw operation and returns the full response body.
    pub fn execute(&self, ctx: &Context, op: OperationRequest) -> Result<Bytes> {
        self.runtime.block_on(async {
            let response = self.inner.execute(ctx, op).await?;
            response.bytes().await
        })
    }

    pub fn head_bucket(&self, ctx: &Context, bucket: &str) -> Result<HeadBucketOutput> {
        self.runtime.block_on(self.inner.head_bucket(ctx, bucket))
    }

    pub fn put_bucket_policy(
        &self,
        ctx: &Context,
        bucket: &str,
        rules: &Rules,
    ) -> Result<PutBucketPolicyOutput> {
        self.runtime
            .block_on(self.inner.put_bucket_policy(ctx, bucket, rules))
    }

    pub fn get_bucket_policy(&self, ctx: &Context, bucket: &str) -> Result<GetBucketPolicyOutput> {
        self.runtime.block_on(self.inner.get_bucket_policy(ctx, bucket))
    }

    pub fn delete_bucket_policy(
        &self,
        ctx: &Context,
        bucket: &str,
    ) -> Result<DeleteBucketPolicyOutput> {
        self.runtime
            .block_on(self.inner.delete_bucket_policy(ctx, bucket))
    }

    pub fn put_object(
        &self,
        ctx: &Context,
        bucket: &str,
        key: &str,
        content: impl Into<Bytes>,
    ) -> Result<PutObjectOutput> {
        self.runtime
            .block_on(self.inner.put_object(ctx, bucket, key, content))
    }

    pub fn get_object(&self, ctx: &Context, bucket: &str, key: &str) -> Result<GetObjectOutput> {
        self.runtime.block_on(self.inner.get_object(ctx, bucket, key))
    }
}
