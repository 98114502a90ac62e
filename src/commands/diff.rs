//! `diff` (spec.md §4.4): print the merge-walk's classification of two
//! directories/prefixes without scheduling any transfer.

use crate::backend;
use crate::context::Context;
use crate::error::Result;
use crate::output::OutputMode;
use futures::StreamExt;
use haul_diff::Classification;

fn label(classification: Classification) -> &'static str {
    match classification {
        Classification::OnlyInFirst => "only-in-first",
        Classification::OnlyInSecond => "only-in-second",
        Classification::TypeDiffers => "type-differs",
        Classification::SizeDiffers => "size-differs",
    }
}

pub async fn run(ctx: &Context, mode: OutputMode, first_raw: String, second_raw: String) -> Result<i32> {
    let first = backend::resolve(ctx, &first_raw).await?;
    let second = backend::resolve(ctx, &second_raw).await?;

    let mut stream = haul_diff::diff(first.backend, second.backend);
    let mut count = 0u64;
    while let Some(record) = stream.next().await {
        let record = record?;
        count += 1;
        match mode {
            OutputMode::Json => {
                println!(
                    "{}",
                    serde_json::json!({"key": record.key, "classification": label(record.classification)})
                );
            },
            _ => println!("{}  {}", label(record.classification), record.key),
        }
    }
    if mode != OutputMode::Json && !matches!(mode, OutputMode::Quiet) {
        eprintln!("{count} difference(s)");
    }
    Ok(0)
}
