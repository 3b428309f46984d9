//! Live integration tests against a real TOS endpoint.
//!
//! These tests are ignored by default. Run with:
//! ```bash
//! # Set environment variables first
//! export TOS_ENDPOINT=tos-cn-beijing.volces.com
//! export TOS_ACCESS_KEY=your-access-key
//! export TOS_SECRET_KEY=your-secret-key
//! export TOS_BUCKET=your-test-bucket
//!
//! cargo test --test live -- --ignored --nocapture
//! ```

use rs_tos::policy::{Principals, Rules, Statement};
use rs_tos::{Client, Context};

/// Create client using configuration from environment variables
fn live_client() -> Client {
    Client::from_env().expect("failed to create client from environment")
}

/// Get the test bucket from environment variable
fn bucket() -> String {
    std::env::var("TOS_BUCKET").expect("TOS_BUCKET environment variable not set")
}

#[tokio::test]
#[ignore = "requires a real TOS bucket and credentials"]
async fn live_head_bucket() {
    let client = live_client();

    let output = client
        .head_bucket(&Context::background(), &bucket())
        .await
        .expect("head_bucket failed");

    println!("=== HeadBucket Response ===");
    println!("RequestId: {}", output.request_id);
    println!("Region: {:?}", output.region);
    println!("StorageClass: {:?}", output.storage_class);
}

#[tokio::test]
#[ignore = "requires a real TOS bucket and credentials"]
async fn live_bucket_policy_round_trip() {
    let client = live_client();
    let bucket = bucket();
    let ctx = Context::background();

    let rules = Rules::new().with_statement(
        Statement::allow()
            .with_sid("LiveTestRead")
            .with_principals(Principals::All)
            .with_actions("tos:GetObject")
            .with_resources(format!("trn:tos:::{}/live-test/*", bucket)),
    );

    client
        .put_bucket_policy(&ctx, &bucket, &rules)
        .await
        .expect("put_bucket_policy failed");

    let output = client
        .get_bucket_policy(&ctx, &bucket)
        .await
        .expect("get_bucket_policy failed");
    println!("=== GetBucketPolicy Response ===");
    println!("{}", output.rules.to_json().unwrap());
    assert_eq!(output.rules.statements.len(), 1);

    client
        .delete_bucket_policy(&ctx, &bucket)
        .await
        .expect("delete_bucket_policy failed");
}

#[tokio::test]
#[ignore = "requires a real TOS bucket and credentials"]
async fn live_object_round_trip() {
    let client = live_client();
    let bucket = bucket();
    let ctx = Context::background();

    let put = client
        .put_object(&ctx, &bucket, "live-test/hello.txt", "hello from rs-tos")
        .await
        .expect("put_object failed");
    println!("ETag: {:?}, CRC64: {:?}", put.etag, put.hash_crc64ecma);

    let get = client
        .get_object(&ctx, &bucket, "live-test/hello.txt")
        .await
        .expect("get_object failed");
    assert_eq!(get.content, "hello from rs-tos".as_bytes());
    assert_eq!(get.content_type.as_deref(), Some("text/plain"));
}
