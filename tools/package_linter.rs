/// Package Linter: validates package files and prints the findings.
///
/// Usage: package_linter <package_file_or_dir> [--deps <dir>]
///
/// Every package in a directory is validated against the other packages in
/// that directory plus anything under `--deps`. Exits 1 if any package has
/// errors.

use prompt_gen::core::loader::{load_package_from_ron, load_packages_from_dir};
use prompt_gen::{resolve_dependencies, validate_with_dependencies, Package, ValidationReport};
use std::collections::BTreeMap;
use std::path::Path;
use std::process;

fn main() {
    init_tracing();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: package_linter <package_file_or_dir> [--deps <dir>]");
        process::exit(0);
    }

    let package_path = Path::new(&args[1]);
    let mut deps_dir = None;

    let mut i = 2;
    while i < args.len() {
        if args[i] == "--deps" && i + 1 < args.len() {
            i += 1;
            deps_dir = Some(args[i].clone());
        } else {
            eprintln!("Unknown argument: {}", args[i]);
            process::exit(1);
        }
        i += 1;
    }

    let packages = if package_path.is_file() {
        match load_package_from_ron(package_path) {
            Ok(package) => vec![package],
            Err(e) => {
                eprintln!("ERROR: Failed to load package file: {}", e);
                process::exit(1);
            }
        }
    } else if package_path.is_dir() {
        match load_packages_from_dir(package_path) {
            Ok(packages) => packages,
            Err(e) => {
                eprintln!("ERROR: Failed to load packages: {}", e);
                process::exit(1);
            }
        }
    } else {
        eprintln!("ERROR: Path '{}' does not exist", package_path.display());
        process::exit(1);
    };

    let mut available = packages.clone();
    if let Some(ref dir) = deps_dir {
        match load_packages_from_dir(Path::new(dir)) {
            Ok(deps) => available.extend(deps),
            Err(e) => {
                eprintln!("ERROR: Failed to load dependencies from '{}': {}", dir, e);
                process::exit(1);
            }
        }
    }

    println!("Loaded {} package(s)", packages.len());

    let mut total_errors = 0;
    let mut total_warnings = 0;
    for package in &packages {
        let report = lint_package(package, &available);
        print_report(package, &report);
        total_errors += report.errors.len();
        total_warnings += report.warnings.len();
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        total_errors, total_warnings
    );

    if total_errors == 0 {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Validate with whichever declared dependencies can be found. Unresolved
/// dependencies are reported, and their references then fail validation.
fn lint_package(package: &Package, available: &[Package]) -> ValidationReport {
    let dependencies: BTreeMap<String, Package> = match resolve_dependencies(package, available) {
        Ok(found) => found
            .into_iter()
            .map(|p| (p.id.clone(), p.clone()))
            .collect(),
        Err(e) => {
            println!("WARNING: {}: {}", package.id, e);
            available
                .iter()
                .filter(|p| package.dependencies.iter().any(|d| d.package == p.id))
                .map(|p| (p.id.clone(), p.clone()))
                .collect()
        }
    };
    validate_with_dependencies(package, &dependencies)
}

fn print_report(package: &Package, report: &ValidationReport) {
    println!("\n=== {} {} ===\n", package.id, package.version);

    if report.is_valid() && !report.has_warnings() {
        println!("All checks passed!");
    }

    for warning in &report.warnings {
        print!("WARNING: {}", warning.message);
        if let Some(ref location) = warning.location {
            print!(" [{}]", location);
        }
        println!();
    }

    for error in &report.errors {
        print!("ERROR: {}", error.message);
        if let Some(ref location) = error.location {
            print!(" [{}]", location);
        }
        println!();
        if let Some(ref suggestion) = error.suggestion {
            println!("  suggestion: {}", suggestion);
        }
    }
}
