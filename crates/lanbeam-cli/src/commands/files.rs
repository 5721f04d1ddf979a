//! Files command implementation.

use anyhow::{Context, Result};

use lanbeam_core::file::{format_size, list_directory, ListedFile};

use super::FilesArgs;
use crate::ui::truncate_string;

/// Run the files command.
pub fn run(args: FilesArgs) -> Result<()> {
    let dir = match args.dir {
        Some(dir) => dir,
        None => super::load_config().output_dir(),
    };

    let files = list_directory(&dir).with_context(|| format!("Failed to read {}", dir.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&files)?);
    } else {
        display_files(&dir, &files);
    }

    Ok(())
}

fn display_files(dir: &std::path::Path, files: &[ListedFile]) {
    println!();
    println!("Files in {}:", dir.display());
    println!("{}", "─".repeat(70));

    if files.is_empty() {
        println!("  (no files)");
        println!("{}", "─".repeat(70));
        return;
    }

    println!("  {:40}  {:>10}  {:14}", "Name", "Size", "Type");
    println!("{}", "─".repeat(70));
    for file in files {
        println!(
            "  {:40}  {:>10}  {:14}",
            truncate_string(&file.name, 40),
            format_size(file.size),
            truncate_string(&file.mime_tag, 14)
        );
    }
    println!("{}", "─".repeat(70));

    let total: u64 = files.iter().map(|f| f.size).sum();
    println!("  {} file(s), {}", files.len(), format_size(total));
}
