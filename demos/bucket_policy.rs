//! Sets, reads back and removes a public-read policy on a bucket.
//!
//! ```bash
//! export TOS_ENDPOINT=tos-cn-beijing.volces.com
//! export TOS_ACCESS_KEY=your-access-key
//! export TOS_SECRET_KEY=your-secret-key
//! RUST_LOG=rs_tos=debug cargo run --example bucket_policy -- my-bucket
//! ```

use std::process::ExitCode;

use rs_tos::blocking::Client;
use rs_tos::policy::{Principals, Rules, Statement};
use rs_tos::{Context, TosError};
use tracing_subscriber::EnvFilter;

fn run(bucket: &str) -> Result<(), TosError> {
    let client = Client::from_env()?;
    let ctx = Context::background();

    let rules = Rules::new().with_statement(
        Statement::allow()
            .with_sid("PublicRead")
            .with_principals(Principals::All)
            .with_actions("tos:GetObject")
            .with_resources(format!("trn:tos:::{}/*", bucket)),
    );

    let put = client.put_bucket_policy(&ctx, bucket, &rules)?;
    println!("PutBucketPolicy RequestId: {}", put.request_id);

    let get = client.get_bucket_policy(&ctx, bucket)?;
    println!("GetBucketPolicy RequestId: {}", get.request_id);
    println!("{}", get.rules.to_json()?);

    let delete = client.delete_bucket_policy(&ctx, bucket)?;
    println!("DeleteBucketPolicy RequestId: {}", delete.request_id);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        let program = args.first().map(String::as_str).unwrap_or("bucket_policy");
        eprintln!("usage: {} <bucket>", program);
        return ExitCode::FAILURE;
    }

    match run(&args[1]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            if let Some(request_id) = e.request_id() {
                eprintln!("request id: {}", request_id);
            }
            ExitCode::FAILURE
        }
    }
}
