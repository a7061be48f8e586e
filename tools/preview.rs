/// Preview: interactive render shell for trying out a package.
///
/// Usage: preview --package <file> [--deps <dir>] [--seed <n>]
///
/// Commands:
///   render <target>       render a prompt section (or rulebook) address
///   rulebook <ns> <name>  render a rulebook entry point
///   seed <n>              set the seed
///   reroll                draw a fresh random seed and render the last target again
///   bulk <target> <n>     render n consecutive seeds with variety stats
///   help                  list commands
///   quit                  exit

use prompt_gen::core::loader::{load_package_from_ron, load_packages_from_dir};
use prompt_gen::{resolve_dependencies, Package, PackageGraph, RenderResult, Renderer};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::io::{self, BufRead, Write};
use std::path::Path;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut package_path = None;
    let mut deps_path = None;
    let mut seed: u64 = 42;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--package" if i + 1 < args.len() => {
                i += 1;
                package_path = Some(args[i].clone());
            }
            "--deps" if i + 1 < args.len() => {
                i += 1;
                deps_path = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = match parse_seed(&args[i]) {
                    Ok(seed) => seed,
                    Err(e) => {
                        eprintln!("{}", e);
                        print_usage();
                        std::process::exit(1);
                    }
                };
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(package_path) = package_path else {
        eprintln!("Missing --package <file>");
        print_usage();
        std::process::exit(1);
    };

    let package = match load_package_from_ron(Path::new(&package_path)) {
        Ok(package) => package,
        Err(e) => {
            eprintln!("ERROR loading package {}: {}", package_path, e);
            std::process::exit(1);
        }
    };

    let available: Vec<Package> = match deps_path {
        Some(ref dir) => load_packages_from_dir(Path::new(dir)).unwrap_or_else(|e| {
            eprintln!("ERROR loading dependencies from {}: {}", dir, e);
            Vec::new()
        }),
        None => Vec::new(),
    };
    let dependencies = resolve_dependencies(&package, &available).unwrap_or_else(|e| {
        eprintln!("WARNING: {}", e);
        Vec::new()
    });

    let graph = PackageGraph::new(&package, dependencies.iter().copied());
    let renderer = Renderer::new(&graph);

    println!("Loaded package {} {}", package.id, package.version);
    println!("Dependencies: {}", dependencies.len());
    print_targets(&package);
    println!("Seed: {}", seed);
    println!("Type 'help' for commands.\n");

    let mut current_seed = seed;
    let mut last_target: Option<String> = None;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("preview> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
            }
            "render" | "r" => {
                let target = parts.get(1).map(|s| s.to_string()).or(last_target.clone());
                let Some(target) = target else {
                    println!("Usage: render <namespace:section>");
                    continue;
                };
                print_result(renderer.render(&target, current_seed));
                last_target = Some(target);
            }
            "rulebook" => {
                if parts.len() < 3 {
                    println!("Usage: rulebook <namespace> <name>");
                    continue;
                }
                print_result(renderer.render_rulebook(parts[1], parts[2], current_seed));
                last_target = Some(format!("{}:{}", parts[1], parts[2]));
            }
            "seed" => {
                if parts.len() < 2 {
                    println!("Current seed: {}", current_seed);
                    continue;
                }
                match parse_seed(parts[1]) {
                    Ok(s) => {
                        current_seed = s;
                        println!("Seed set to {}", current_seed);
                    }
                    Err(e) => println!("{}", e),
                }
            }
            "reroll" => {
                current_seed = rand::thread_rng().gen();
                println!("Seed set to {}", current_seed);
                if let Some(ref target) = last_target {
                    print_result(renderer.render(target, current_seed));
                }
            }
            "bulk" => {
                if parts.len() < 3 {
                    println!("Usage: bulk <target> <n>");
                    continue;
                }
                let count: u64 = match parts[2].parse() {
                    Ok(n) if n > 0 => n,
                    _ => {
                        println!("Invalid count: {}", parts[2]);
                        continue;
                    }
                };
                print_bulk(&renderer, parts[1], current_seed, count);
            }
            _ => {
                println!("Unknown command: '{}'. Type 'help' for available commands.", cmd);
            }
        }
    }
}

fn parse_seed(raw: &str) -> Result<u64, String> {
    raw.parse().map_err(|_| format!("Invalid seed: {}", raw))
}

fn print_result(result: Result<RenderResult, prompt_gen::RenderError>) {
    match result {
        Ok(result) => {
            println!("\n--- Rendered (seed {}) ---", result.seed);
            println!("{}", result.text);
            println!("--- End ---\n");
        }
        Err(e) => {
            println!("ERROR: {}", e);
        }
    }
}

fn print_bulk(renderer: &Renderer<'_, '_>, target: &str, start: u64, count: u64) {
    let mut passages = Vec::new();
    let mut errors: HashMap<String, u32> = HashMap::new();

    for seed in start..start.saturating_add(count) {
        match renderer.render(target, seed) {
            Ok(result) => passages.push(result.text),
            Err(e) => *errors.entry(e.to_string()).or_insert(0) += 1,
        }
    }

    println!(
        "\n=== Bulk Render: {} passages ({} errors) ===\n",
        passages.len(),
        errors.values().sum::<u32>()
    );

    let unique: HashSet<&String> = passages.iter().collect();
    println!("Unique outputs: {} / {}", unique.len(), passages.len());

    let avg_len: f64 = if passages.is_empty() {
        0.0
    } else {
        passages.iter().map(|p| p.len() as f64).sum::<f64>() / passages.len() as f64
    };
    println!("Average length: {:.0} chars", avg_len);

    for (error, n) in &errors {
        println!("  {}x {}", n, error);
    }

    if let Some(first) = passages.first() {
        println!("\nSample passage:");
        println!("  {}", first);
    }
    println!();
}

fn print_targets(package: &Package) {
    for (namespace_id, namespace) in &package.namespaces {
        for name in namespace.prompt_sections.keys() {
            println!("  section  {}:{}", namespace_id, name);
        }
        for name in namespace.rulebooks.keys() {
            println!("  rulebook {}:{}", namespace_id, name);
        }
    }
}

fn print_usage() {
    println!("Preview: interactive render shell for trying out a package.");
    println!();
    println!("Usage: preview --package <file> [--deps <dir>] [--seed <n>]");
    println!();
    println!("  --package <file>  Package RON file");
    println!("  --deps <dir>      Directory of dependency packages (optional)");
    println!("  --seed <n>        Initial seed (default: 42)");
}

fn print_help() {
    println!("Commands:");
    println!("  render <target>       Render a section or rulebook (default: last target)");
    println!("  rulebook <ns> <name>  Render a rulebook entry point");
    println!("  seed <n>              Set the seed");
    println!("  reroll                Draw a fresh seed and render the last target");
    println!("  bulk <target> <n>     Render n consecutive seeds with variety statistics");
    println!("  help                  Show this help");
    println!("  quit                  Exit");
    println!();
    println!("Set RUST_LOG=prompt_gen=debug to trace lookups and rules.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_seed_accepts_unsigned_integers() {
        assert_eq!(parse_seed("7"), Ok(7));
        assert_eq!(parse_seed("18446744073709551615"), Ok(u64::MAX));
    }

    #[test]
    fn parse_seed_rejects_garbage() {
        assert_eq!(parse_seed("abc"), Err("Invalid seed: abc".to_string()));
        assert!(parse_seed("-1").is_err());
        assert!(parse_seed("").is_err());
    }
}
