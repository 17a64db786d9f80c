//! Console text shown to the operator.
//!
//! Progress and results go to stdout; failures go to stderr. Log lines from
//! `tracing` are separate and always go to stderr.

use std::path::{Path, PathBuf};

use kuma_upload_lib::{RecordOutcome, RecordResult, UploadReport};

const RULE_WIDTH: usize = 40;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn print_banner(dry: bool) {
    if dry {
        println!("🔍 Kuma Uploader - dry run (nothing will be written)");
    } else {
        println!("🚀 Kuma Uploader");
    }
    println!("{}", rule());
}

/// Lists the detected input files before an upload starts.
pub fn print_confirmation(files: &[&Path]) {
    println!("⚠️  You are about to upload to Firestore");
    println!("📁 Files detected:");
    for file in files {
        println!("   ✅ {}", file.display());
    }
    println!();
}

/// One line per record, as soon as its outcome is known.
pub fn print_record(result: &RecordResult) {
    let id = result.id.as_deref().unwrap_or("no id");
    match &result.outcome {
        RecordOutcome::Uploaded => println!("✅ {} ({id})", result.title),
        RecordOutcome::Valid => println!("✓  {} ({id})", result.title),
        RecordOutcome::Rejected(error) => eprintln!(
            "❌ Skipped record #{} {}: {error}",
            result.index + 1,
            result.title
        ),
        RecordOutcome::Failed(error) => eprintln!("❌ Error {}: {error}", result.title),
    }
}

pub fn print_summary(report: &UploadReport, dry: bool) {
    println!();
    println!("{}", rule());
    println!("📊 Summary:");

    if dry {
        println!("✅ Would upload: {}", report.succeeded);
        println!("❌ Rejected: {}", report.rejected);
        if report.is_clean() {
            println!("🎉 All records are valid");
        } else {
            println!("⚠️  Rejected records will be skipped by a real upload");
        }
        return;
    }

    println!("✅ Succeeded: {}", report.succeeded);
    if report.is_clean() {
        println!("❌ Errors: 0");
        println!("🎉 Upload finished successfully!");
        println!("🔗 Check the Firebase console");
    } else {
        println!(
            "❌ Errors: {} ({} rejected, {} failed)",
            report.errors(),
            report.rejected,
            report.failed
        );
        println!("⚠️  Upload finished with errors");
    }
}

/// Reports absent input files with a short setup guide.
pub fn print_missing_files(missing: &[PathBuf]) {
    eprintln!("❌ Missing files:");
    for file in missing {
        eprintln!("   - {}", file.display());
    }
    println!();
    println!("💡 Quick guide:");
    println!("1. Download the service-account key from the Firebase console");
    println!("2. Create the stories JSON file with your stories");
    println!("3. Run this command again");
}

/// Reports a fatal error with the usual suspects.
pub fn print_fatal(error: &dyn std::error::Error, credentials: &Path, stories: &Path) {
    eprintln!("💥 Fatal error: {error}");
    println!();
    println!("🔧 Check that:");
    println!("- {} exists and is valid", credentials.display());
    println!("- {} exists and is valid", stories.display());
    println!("- you are connected to the internet");
}
