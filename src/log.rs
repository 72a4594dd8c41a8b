use crate::package::PackageManifest;
use crate::plan::{CommandPlan, EnvMerge, Step};
use crate::source::SourceSpec;
use console::style;
use std::path::Path;

pub fn badge_success() -> String {
    style("[✓]").green().to_string()
}

pub fn format_step_kind(kind: &str) -> String {
    format!("{} ➜", style(kind).bold().on_color256(238))
}

pub fn print_source(spec: &SourceSpec, source_path: &Path) {
    println!(
        "{} {} {}",
        style("Source:").bold().green(),
        style(&spec.archive_url).italic(),
        badge_success(),
    );

    match &spec.checksum {
        Some(checksum) => println!("  {}: {}", checksum.algorithm, style(&checksum.value).dim()),
        None => println!("  {}", style("unverified").color256(208)),
    }

    println!("  {}", style(source_path.display().to_string()).green());
}

pub fn print_plan(plan: &CommandPlan) {
    println!("{}", style("Plan:").bold().green());

    for step in plan.steps() {
        match step {
            Step::Shell(command) => {
                let directory = command.directory.display().to_string();

                println!(
                    "{} {} {} {}",
                    format_step_kind("shell"),
                    style(format!("[{}]", if directory.is_empty() { "." } else { directory.as_str() })).dim(),
                    command.program,
                    command.arguments.join(" "),
                );
            }
            Step::EnvSet(set) => {
                let operator = match &set.merge {
                    EnvMerge::Overwrite => "=",
                    EnvMerge::KeepExisting => "?=",
                    EnvMerge::Append { .. } => "+=",
                };

                println!("{} {}{}{}", format_step_kind("env"), set.key, operator, set.value);
            }
            Step::FileRename { from, to } => {
                println!(
                    "{} {} -> {}",
                    format_step_kind("rename"),
                    from.display(),
                    to.display()
                );
            }
            Step::FileCopy { from, to } => {
                println!(
                    "{} {} -> {}",
                    format_step_kind("copy"),
                    from.display(),
                    to.display()
                );
            }
            Step::FilePatch { path, search, .. } => {
                println!(
                    "{} {} {}",
                    format_step_kind("patch"),
                    path.display(),
                    style(search).italic()
                );
            }
        }
    }

    println!("{} {} steps", style("Total:").bold().green(), style(plan.len()));
}

pub fn print_manifest(manifest: &PackageManifest, package_path: &Path) {
    println!(
        "{} {}",
        style("Package:").bold().green(),
        style(package_path.display().to_string()).green()
    );

    println!("  libraries: {}", style(manifest.libraries.join(", ")).cyan());

    if !manifest.defines.is_empty() {
        println!("  defines: {}", manifest.defines.join(", "));
    }

    println!(
        "  {} binaries, {} headers, {} license files {}",
        manifest.binaries.len(),
        manifest.headers.len(),
        manifest.license_files.len(),
        badge_success(),
    );
}
